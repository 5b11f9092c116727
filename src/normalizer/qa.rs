//! 问答文本解析
//!
//! 解读内容通常是 "Q: ... / A: ..." 的形式，这里把它拆成有序的问答对，
//! 供 JSON 导出时附带结构化数据。

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

static QUESTION_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:\*\*)?Q\d*(?:\*\*)?\s*[:：]\s*(?:\*\*)?\s*").unwrap());
static ANSWER_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:\*\*)?A\d*(?:\*\*)?\s*[:：]\s*(?:\*\*)?\s*").unwrap());
static MARKDOWN_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*([QA])\*\*\s*[:：]").unwrap());

/// 一个问答对
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QaPair {
    pub question: String,
    pub answer: String,
}

/// 解析普通问答文本
///
/// 以 `Q:` 开头的行开始新问题，`A:` 开头的行开始答案，
/// 答案可以跨多行；没有答案的问题被丢弃。
pub fn parse_qa_text(text: &str) -> Vec<QaPair> {
    let mut pairs = Vec::new();
    let mut question = String::new();
    let mut answer = String::new();
    let mut in_answer = false;

    let mut flush = |question: &mut String, answer: &mut String| {
        if !question.is_empty() && !answer.trim().is_empty() {
            pairs.push(QaPair {
                question: std::mem::take(question),
                answer: answer.trim().to_string(),
            });
        }
        question.clear();
        answer.clear();
    };

    for line in text.lines().map(str::trim) {
        if let Some(m) = QUESTION_LINE.find(line) {
            flush(&mut question, &mut answer);
            question = line[m.end()..].trim().to_string();
            in_answer = false;
        } else if let Some(m) = ANSWER_LINE.find(line) {
            answer = line[m.end()..].to_string();
            in_answer = true;
        } else if in_answer && !line.is_empty() {
            answer.push('\n');
            answer.push_str(line);
        }
    }
    flush(&mut question, &mut answer);
    pairs
}

/// 解析 `**Q**: ... **A**: ...` 形式的 Markdown 问答
///
/// 问题与答案按出现顺序配对，数量不等时以较少的一方为准。
pub fn parse_markdown_qa(text: &str) -> Vec<QaPair> {
    let markers: Vec<(usize, usize, bool)> = MARKDOWN_MARKER
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            Some((whole.start(), whole.end(), &caps[1] == "Q"))
        })
        .collect();

    let mut questions = Vec::new();
    let mut answers = Vec::new();
    for (i, &(_, end, is_question)) in markers.iter().enumerate() {
        let next_start = markers.get(i + 1).map(|m| m.0).unwrap_or(text.len());
        let body = text[end..next_start].trim().to_string();
        if is_question {
            questions.push(body);
        } else {
            answers.push(body);
        }
    }

    questions
        .into_iter()
        .zip(answers)
        .map(|(question, answer)| QaPair { question, answer })
        .collect()
}
