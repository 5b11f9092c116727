//! Markdown 导出
//!
//! 按来源分组（保持首次出现的顺序），已知来源使用各自的版式，
//! 未知来源使用通用报告版式。

use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::LazyLock;

use async_trait::async_trait;
use chrono::{DateTime, Local};
use regex::Regex;
use serde_json::Value as JsonValue;
use tracing::{error, info};

use super::{dated_path, write_file, Exporter};
use crate::error::ExportError;
use crate::models::{keys, ExportResult, Item};
use crate::normalizer::parse_markdown_qa;
use crate::services::{ArxivDomainSource, GitHubTrendingSource, HuggingFacePapersSource};

const QUESTION_STYLE: &str = "background-color: rgba(135, 206, 235, 0.3);border-radius: 0.4rem;padding: 10px;margin: 10px 0;margin-left: -10px;font-weight: bold;";

static QUESTION_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^(?:\*\*Q\d+\*\*:|Q\d+:)[ \t]*(.*)$").unwrap());

/// 导出为 Markdown 文件
pub struct MarkdownExporter {
    root: PathBuf,
    pipeline: String,
}

impl MarkdownExporter {
    pub fn new(root: impl Into<PathBuf>, pipeline: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            pipeline: pipeline.into(),
        }
    }

    /// 当天的输出路径
    pub fn output_path(&self) -> PathBuf {
        dated_path(&self.root, &self.pipeline, Local::now().date_naive(), "md")
    }

    /// 渲染整份文档
    pub fn render(items: &[Item], processed: Option<&JsonValue>, now: DateTime<Local>) -> String {
        let mut md = String::new();
        for (source, group) in group_by_source(items) {
            match source {
                HuggingFacePapersSource::NAME => render_huggingface(&mut md, &group, now),
                ArxivDomainSource::NAME => render_arxiv_domain(&mut md, &group, now),
                GitHubTrendingSource::NAME => render_github_trending(&mut md, &group, now),
                other => render_default(&mut md, other, &group, now),
            }
        }

        if let Some(content) = processed
            .and_then(|p| p.get("content"))
            .and_then(JsonValue::as_str)
        {
            let _ = write!(md, "## AI 分析摘要\n\n{}\n\n", content);
        }
        md
    }

    async fn write(&self, items: &[Item], processed: Option<&JsonValue>) -> Result<PathBuf, ExportError> {
        let path = self.output_path();
        write_file(&path, &Self::render(items, processed, Local::now())).await?;
        Ok(path)
    }
}

#[async_trait]
impl Exporter for MarkdownExporter {
    fn name(&self) -> &str {
        "markdown"
    }

    async fn export(&self, items: &[Item], processed: Option<&JsonValue>) -> ExportResult {
        match self.write(items, processed).await {
            Ok(path) => {
                info!("📝 Markdown 导出成功: {}", path.display());
                ExportResult::ok(self.name(), path)
            }
            Err(e) => {
                error!("❌ Markdown 导出失败: {}", e);
                ExportResult::failed(self.name(), e.to_string())
            }
        }
    }
}

/// 按来源分组，组的顺序为来源首次出现的顺序
fn group_by_source(items: &[Item]) -> Vec<(&str, Vec<&Item>)> {
    let mut groups: Vec<(&str, Vec<&Item>)> = Vec::new();
    for item in items {
        match groups.iter_mut().find(|(source, _)| *source == item.source) {
            Some((_, group)) => group.push(item),
            None => groups.push((item.source.as_str(), vec![item])),
        }
    }
    groups
}

fn front_matter(md: &mut String, title: &str, tags: &str, now: DateTime<Local>) {
    let _ = write!(
        md,
        "---\ntitle: {} {}\ndate: {}\ntags: [{}]\ncategories: \n- AI\nhidden: true\ncomments: false\n---\n\n",
        title,
        now.format("%Y-%m-%d"),
        now.format("%Y-%m-%d %H:%M:%S"),
        tags
    );
}

fn render_huggingface(md: &mut String, items: &[&Item], now: DateTime<Local>) {
    front_matter(md, "HuggingFace Papers", "HuggingFace, Papers, AI", now);
    md.push_str("> 数据来源：[HuggingFace Papers](https://huggingface.co/papers)\n\n");
    md.push_str("## Latest Papers\n\n");

    for (i, item) in items.iter().enumerate() {
        let _ = writeln!(md, "### {}. [{}]({})\n", i + 1, item.title, link_of(item));
        render_paper_body(md, item);
    }
}

fn render_arxiv_domain(md: &mut String, items: &[&Item], now: DateTime<Local>) {
    front_matter(md, "ArXiv Domain", "ArXiv, Domain, AI", now);
    md.push_str("> 数据来源：[ArXiv Domain](https://arxiv.org)\n\n");

    let mut previous_domain: Option<String> = None;
    for item in items {
        let domain = item.meta_str(keys::DOMAIN).unwrap_or_default();
        if previous_domain.as_deref() != Some(domain.as_str()) {
            let _ = write!(md, "## {} Domain Papers\n\n", domain);
            previous_domain = Some(domain);
        }
        let rank = item.meta_str(keys::RANK).unwrap_or_else(|| "0".to_string());
        let _ = writeln!(md, "### {}. [{}]({})\n", rank, item.title, link_of(item));
        render_paper_body(md, item);
    }
}

/// 按榜单范围分节（全站榜在前，语言榜依次在后）
fn render_github_trending(md: &mut String, items: &[&Item], now: DateTime<Local>) {
    front_matter(md, "GitHub Trending", "GitHub, Trending", now);
    md.push_str("> 数据来源：[github.com/trending](https://github.com/trending)\n\n");

    let mut previous_scope: Option<String> = None;
    for item in items {
        let scope = item.meta_str(keys::TRENDING_SCOPE).unwrap_or_default();
        if previous_scope.as_deref() != Some(scope.as_str()) {
            let _ = write!(md, "## {} Languages\n\n", scope);
            previous_scope = Some(scope);
        }
        let _ = writeln!(md, "### [{}]({})", item.title, link_of(item));
        if let Some(description) = &item.description {
            let _ = write!(md, "{}\n\n", description);
        }
        let count = |key: &str| item.meta_str(key).unwrap_or_else(|| "0".to_string());
        let _ = writeln!(md, "- ⭐ Stars: {}", count(keys::STARS));
        let _ = writeln!(md, "- 🍴 Forks: {}", count(keys::FORKS));
        let language = item.meta_str(keys::LANGUAGE).unwrap_or_else(|| "N/A".to_string());
        let _ = write!(md, "- 📝 Language: {}\n\n---\n\n", language);
    }
}

fn render_paper_body(md: &mut String, item: &Item) {
    if let Some(description) = &item.description {
        let _ = write!(md, "{}\n\n", description);
    }
    if let Some(summary) = item.meta_str(keys::ZH_SUMMARY) {
        let _ = write!(md, "{{% hideToggle 中文摘要 %}} \n\n{}\n\n{{% endhideToggle %}}\n\n", summary);
    }
    if let Some(analysis) = item.meta_str(keys::LLM_ANALYSIS) {
        let _ = write!(
            md,
            "{{% hideToggle LLM Analysis %}} \n\n{}\n\n{{% endhideToggle %}}\n\n",
            render_analysis(&analysis)
        );
    }

    let fields = [
        ("Authors", keys::AUTHORS),
        ("Categories", keys::CATEGORIES),
        ("PDF URL", keys::PDF_URL),
        ("Arxiv URL", keys::ARXIV_URL),
        ("Arxiv ID", keys::ARXIV_ID),
        ("CoolPaper URL", keys::COOL_PAPER_URL),
        ("Published", keys::PUBLISHED),
        ("Updated", keys::UPDATED),
    ];
    for (label, key) in fields {
        if let Some(value) = item.meta_str(key) {
            let _ = write!(md, "**{}**: {}\n\n", label, value);
        }
    }
    md.push_str("---\n\n");
}

fn render_default(md: &mut String, source: &str, items: &[&Item], now: DateTime<Local>) {
    let _ = write!(md, "# {} 趋势报告\n\n", source);
    let _ = write!(md, "**生成时间**: {}\n\n", now.format("%Y-%m-%d %H:%M:%S"));
    let _ = write!(md, "**数据总量**: {} 条\n\n", items.len());

    for (i, item) in items.iter().enumerate() {
        let _ = write!(md, "### {}. {}\n\n", i + 1, item.title);
        if let Some(description) = &item.description {
            let _ = write!(md, "{}\n\n", description);
        }
        if let Some(url) = &item.url {
            let _ = write!(md, "🔗 [查看详情]({})\n\n", url);
        }
        if !item.metadata.is_empty() {
            let metadata = serde_json::to_string(&item.metadata).unwrap_or_default();
            let _ = write!(md, "**元数据**: {}\n\n", metadata);
        }
        md.push_str("---\n\n");
    }
}

fn link_of(item: &Item) -> &str {
    item.url.as_deref().unwrap_or("#")
}

/// 渲染解读文本
///
/// `**Q**: ... **A**: ...` 形式按问答对重排；其余情况只把 `Q<n>:` 行高亮。
pub fn render_analysis(text: &str) -> String {
    let pairs = parse_markdown_qa(text);
    if !pairs.is_empty() {
        return pairs
            .iter()
            .map(|pair| format!("{}\n\n{}", question_block(&pair.question), pair.answer))
            .collect::<Vec<_>>()
            .join("\n\n");
    }
    highlight_questions(text)
}

/// 行首的 `Q<n>:` / `**Q<n>**:` 统一成 `Q:` 并包进高亮段落
pub fn highlight_questions(text: &str) -> String {
    QUESTION_LINE
        .replace_all(text, |caps: &regex::Captures| question_block(caps[1].trim()))
        .into_owned()
}

fn question_block(question: &str) -> String {
    format!("<p style=\"{}\">\nQ: {}\n</p>", QUESTION_STYLE, question)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paper(source: &str, title: &str) -> Item {
        Item::new(title, title, source).with_url(format!("https://x/{}", title))
    }

    #[test]
    fn test_groups_keep_first_seen_order() {
        let items = vec![
            paper("B", "b1"),
            paper("A", "a1"),
            paper("B", "b2"),
        ];
        let groups = group_by_source(&items);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, "B");
        assert_eq!(groups[0].1.len(), 2);
        assert_eq!(groups[1].0, "A");
    }

    #[test]
    fn test_huggingface_section() {
        let item = paper(HuggingFacePapersSource::NAME, "Scaling")
            .with_description("Abstract.")
            .with_meta(keys::ZH_SUMMARY, "摘要")
            .with_meta(keys::LLM_ANALYSIS, "Q1: 问题？\nA: 回答。")
            .with_meta(keys::ARXIV_ID, "2401.00001");
        let md = MarkdownExporter::render(&[item], None, Local::now());

        assert!(md.starts_with("---\ntitle: HuggingFace Papers "));
        assert!(md.contains("### 1. [Scaling](https://x/Scaling)\n\n"));
        assert!(md.contains("{% hideToggle 中文摘要 %} \n\n摘要\n\n{% endhideToggle %}"));
        assert!(md.contains("{% hideToggle LLM Analysis %}"));
        assert!(md.contains("\nQ: 问题？\n</p>\nA: 回答。"));
        assert!(md.contains("**Arxiv ID**: 2401.00001"));
        assert!(!md.contains("**Authors**"));
    }

    #[test]
    fn test_arxiv_domain_subheadings() {
        let items = vec![
            paper(ArxivDomainSource::NAME, "a").with_meta(keys::DOMAIN, "LLM").with_meta(keys::RANK, 1),
            paper(ArxivDomainSource::NAME, "b").with_meta(keys::DOMAIN, "LLM").with_meta(keys::RANK, 2),
            paper(ArxivDomainSource::NAME, "c").with_meta(keys::DOMAIN, "CV").with_meta(keys::RANK, 1),
        ];
        let md = MarkdownExporter::render(&items, None, Local::now());
        assert_eq!(md.matches("Domain Papers").count(), 2);
        assert!(md.contains("## LLM Domain Papers\n\n### 1. [a]"));
        assert!(md.contains("### 2. [b]"));
        assert!(md.contains("## CV Domain Papers\n\n### 1. [c]"));
    }

    #[test]
    fn test_github_trending_sections() {
        let repo = |title: &str, scope: &str| {
            paper(GitHubTrendingSource::NAME, title)
                .with_meta(keys::TRENDING_SCOPE, scope)
                .with_meta(keys::STARS, 120)
                .with_meta(keys::LANGUAGE, "Rust")
        };
        let items = vec![repo("a/b", "global"), repo("c/d", "global"), repo("e/f", "python")];
        let md = MarkdownExporter::render(&items, None, Local::now());

        assert!(md.starts_with("---\ntitle: GitHub Trending "), "{}", md);
        assert_eq!(md.matches("## global Languages").count(), 1);
        assert_eq!(md.matches("## python Languages").count(), 1);
        assert!(md.contains("### [a/b](https://x/a/b)\n"), "{}", md);
        assert!(md.contains("- ⭐ Stars: 120\n- 🍴 Forks: 0\n- 📝 Language: Rust"), "{}", md);
    }

    #[test]
    fn test_default_layout_for_unknown_source() {
        let md = MarkdownExporter::render(&[paper("Weibo", "hot")], None, Local::now());
        assert!(md.starts_with("# Weibo 趋势报告"));
        assert!(md.contains("**数据总量**: 1 条"));
        assert!(md.contains("🔗 [查看详情](https://x/hot)"));
    }

    #[test]
    fn test_processed_content_appended() {
        let processed = serde_json::json!({"content": "总结"});
        let md = MarkdownExporter::render(&[], Some(&processed), Local::now());
        assert_eq!(md, "## AI 分析摘要\n\n总结\n\n");
    }

    #[test]
    fn test_highlight_questions() {
        let out = highlight_questions("intro\n**Q2**: Why?\nA: Because.\nQ3: How?");
        assert_eq!(out.matches("<p style=").count(), 2);
        assert!(out.contains("\nQ: Why?\n</p>"));
        assert!(out.contains("\nQ: How?\n</p>"));
        assert!(out.starts_with("intro\n"));
    }

    #[test]
    fn test_render_analysis_markdown_pairs() {
        let out = render_analysis("**Q**: first? **A**: one.");
        assert!(out.contains("\nQ: first?\n</p>\n\none."));
    }
}
