//! LLM 服务 - 业务能力层
//!
//! 只负责"对话"能力，不关心流程
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 支持自定义 API 端点和模型
//! - 兼容 OpenAI API 的服务（如 Azure, Gemini, Doubao 等）

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::LlmError;

/// 论文分析提示词，`##paper_content##` 会被替换为论文内容
pub const PAPER_ANALYSIS_PROMPT: &str = r#"请阅读下面的论文信息，用中文回答以下问题，每个问题以 "Q<序号>:" 开头，答案另起一行以 "A:" 开头：
Q1: 这篇论文试图解决什么问题？
Q2: 有哪些相关研究？
Q3: 论文如何解决这个问题？
Q4: 论文做了哪些实验？
Q5: 有什么可以进一步探索的点？
Q6: 总结一下论文的主要内容

论文信息：
##paper_content##"#;

/// 消息角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// 一条对话消息
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// token 用量
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// 对话结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub content: String,
    pub usage: Option<ChatUsage>,
    pub finish_reason: Option<String>,
}

/// 对话能力
#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<ChatResponse, LlmError>;
}

/// 用论文信息填充分析提示词
pub fn build_analysis_messages(paper_content: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system("你是一个擅长阅读学术论文的研究助手，回答简洁准确。"),
        ChatMessage::user(PAPER_ANALYSIS_PROMPT.replace("##paper_content##", paper_content)),
    ]
}

/// LLM 服务
///
/// 职责：
/// - 调用 OpenAI 兼容 API
/// - 提供通用的对话接口
/// - 不认识 Item / 流水线
pub struct LlmService {
    client: Client<OpenAIConfig>,
    model_name: String,
    temperature: f32,
    max_tokens: u32,
}

impl LlmService {
    /// 创建新的 LLM 服务
    pub fn new(config: &Config) -> Self {
        // 配置 OpenAI 客户端（兼容 OpenAI API 的服务）
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        Self {
            client: Client::with_config(openai_config),
            model_name: config.llm_model_name.clone(),
            temperature: 0.3,
            max_tokens: 4096,
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    fn build_messages(
        messages: &[ChatMessage],
    ) -> Result<Vec<ChatCompletionRequestMessage>, LlmError> {
        messages
            .iter()
            .map(|message| -> Result<ChatCompletionRequestMessage, LlmError> {
                let content = message.content.as_str();
                Ok(match message.role {
                    ChatRole::System => ChatCompletionRequestMessage::System(
                        ChatCompletionRequestSystemMessageArgs::default()
                            .content(content)
                            .build()
                            .map_err(|e| LlmError::RequestBuildFailed(e.to_string()))?,
                    ),
                    ChatRole::User => ChatCompletionRequestMessage::User(
                        ChatCompletionRequestUserMessageArgs::default()
                            .content(content)
                            .build()
                            .map_err(|e| LlmError::RequestBuildFailed(e.to_string()))?,
                    ),
                    ChatRole::Assistant => ChatCompletionRequestMessage::Assistant(
                        ChatCompletionRequestAssistantMessageArgs::default()
                            .content(content)
                            .build()
                            .map_err(|e| LlmError::RequestBuildFailed(e.to_string()))?,
                    ),
                })
            })
            .collect()
    }
}

#[async_trait]
impl ChatProvider for LlmService {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<ChatResponse, LlmError> {
        debug!("调用 LLM API，模型: {}，消息 {} 条", self.model_name, messages.len());

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(Self::build_messages(messages)?)
            .temperature(self.temperature)
            .max_tokens(self.max_tokens)
            .build()
            .map_err(|e| LlmError::RequestBuildFailed(e.to_string()))?;

        // 调用 API
        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!("LLM API 调用失败: {}", e);
            LlmError::ApiCallFailed {
                model: self.model_name.clone(),
                reason: e.to_string(),
            }
        })?;

        debug!("LLM API 调用成功");

        let choice = response
            .choices
            .first()
            .ok_or_else(|| LlmError::EmptyContent {
                model: self.model_name.clone(),
            })?;
        let content = choice
            .message
            .content
            .clone()
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| LlmError::EmptyContent {
                model: self.model_name.clone(),
            })?;

        Ok(ChatResponse {
            content: content.trim().to_string(),
            usage: response.usage.as_ref().map(|u| ChatUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
            finish_reason: choice
                .finish_reason
                .as_ref()
                .map(|r| format!("{:?}", r).to_lowercase()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_analysis_messages_fills_template() {
        let messages = build_analysis_messages("Title: Attention");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, ChatRole::System);
        assert!(messages[1].content.contains("Title: Attention"));
        assert!(!messages[1].content.contains("##paper_content##"));
    }

    #[test]
    fn test_build_messages_keeps_roles() {
        let built = LlmService::build_messages(&[
            ChatMessage::system("s"),
            ChatMessage::user("u"),
            ChatMessage::assistant("a"),
        ])
        .unwrap();
        assert!(matches!(built[0], ChatCompletionRequestMessage::System(_)));
        assert!(matches!(built[1], ChatCompletionRequestMessage::User(_)));
        assert!(matches!(built[2], ChatCompletionRequestMessage::Assistant(_)));
    }

    /// 测试通用 LLM 调用
    ///
    /// 运行方式：
    /// ```bash
    /// LLM_API_KEY=... cargo test test_chat_live -- --ignored --nocapture
    /// ```
    #[tokio::test]
    #[ignore]
    async fn test_chat_live() {
        let _ = tracing_subscriber::fmt::try_init();

        let service = LlmService::new(&Config::from_env());
        let response = service
            .chat(&[
                ChatMessage::system("你是一个简洁的助手，回答要简短。"),
                ChatMessage::user("你好，请介绍一下你自己"),
            ])
            .await;

        match response {
            Ok(response) => {
                println!("\n========== LLM 响应 ==========");
                println!("{}", response.content);
                println!("finish_reason: {:?}, usage: {:?}", response.finish_reason, response.usage);
                assert!(!response.content.is_empty());
            }
            Err(e) => panic!("LLM 调用失败: {}", e),
        }
    }
}
