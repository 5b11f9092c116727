//! 翻译服务 - 业务能力层
//!
//! 基于对话能力实现的翻译，调用方只关心 `translate(text, from, to)`。

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use super::llm_service::{ChatMessage, ChatProvider};
use crate::error::LlmError;

/// 翻译结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Translation {
    /// 原文
    pub text: String,
    /// 译文
    pub translation: String,
}

/// 翻译能力
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, from: &str, to: &str) -> Result<Translation, LlmError>;
}

/// 基于 LLM 的翻译
pub struct LlmTranslator {
    chat: Arc<dyn ChatProvider>,
}

impl LlmTranslator {
    pub fn new(chat: Arc<dyn ChatProvider>) -> Self {
        Self { chat }
    }

    fn build_messages(text: &str, from: &str, to: &str) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(format!(
                "你是专业的学术翻译。把用户给出的 {} 文本翻译成 {}，\
                 保留专业术语、公式和缩写，只输出译文，不要任何解释。",
                language_name(from),
                language_name(to)
            )),
            ChatMessage::user(text),
        ]
    }
}

fn language_name(code: &str) -> &str {
    match code {
        "en" => "英文",
        "zh" | "zh-Hans" => "简体中文",
        "zh-Hant" => "繁体中文",
        "ja" => "日文",
        other => other,
    }
}

#[async_trait]
impl Translator for LlmTranslator {
    async fn translate(&self, text: &str, from: &str, to: &str) -> Result<Translation, LlmError> {
        if text.trim().is_empty() {
            return Ok(Translation {
                text: text.to_string(),
                translation: String::new(),
            });
        }

        debug!("翻译 {} → {}，{} 字符", from, to, text.chars().count());
        let response = self
            .chat
            .chat(&Self::build_messages(text, from, to))
            .await?;

        Ok(Translation {
            text: text.to_string(),
            translation: response.content,
        })
    }
}
