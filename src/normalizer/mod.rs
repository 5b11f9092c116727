//! 内容规整 - 纯函数层
//!
//! HTML（含公式与表格）→ 纯 Markdown。没有任何 I/O。
//!
//! 流程：
//! 1. 解析为树
//! 2. 公式脚手架清理，公式（包括正文里的 `\(...\)` / `\[...\]`）替换为 `$...$` / `$$...$$`
//! 3. FAQ 结构展开
//! 4. 表格预先转换并替换为占位符
//! 5. 通用 HTML→Markdown 转换（htmd），再还原占位符
//! 6. 去掉标题标记
//! 7. 空白规整
//! 8. 公式转文本
//! 9. 链接修复
//! 10. 排版修饰
//!
//! 树处理（1-5）任何一步失败或 panic，都退化为直接转换原始 HTML，
//! 规整永远不会阻塞导出。

pub mod dom;
pub mod latex;
pub mod markdown;
pub mod qa;

use std::panic::{self, UnwindSafe};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

pub use latex::convert_latex_to_text;
pub use markdown::tidy_markdown;
pub use qa::{parse_markdown_qa, parse_qa_text, QaPair};

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());

/// 把解读 HTML 规整为纯 Markdown，任何输入都不会 panic
pub fn normalize(html: &str) -> String {
    normalize_with(html, convert_tree)
}

/// 以指定的树转换函数执行规整，失败时退化为原始 HTML 直接转换
pub fn normalize_with<F>(html: &str, tree_step: F) -> String
where
    F: FnOnce(&str) -> Result<String, std::io::Error> + UnwindSafe,
{
    match panic::catch_unwind(move || tree_step(html)) {
        Ok(Ok(markdown)) => finish(&markdown),
        Ok(Err(e)) => {
            warn!("⚠️ 树结构转换失败，退化为原始 HTML 转换: {}", e);
            normalize_fallback(html)
        }
        Err(_) => {
            warn!("⚠️ 树结构转换 panic，退化为原始 HTML 转换");
            normalize_fallback(html)
        }
    }
}

/// 步骤 1-5：树处理 + 通用转换 + 占位符还原
fn convert_tree(html: &str) -> Result<String, std::io::Error> {
    let prepared = dom::prepare(html);
    debug!("树处理完成，占位符 {} 个", prepared.placeholders.len());
    let markdown = htmd::convert(&prepared.html)?;
    Ok(dom::restore(&markdown, &prepared.placeholders))
}

/// 退化路径：不做表格/公式的专门处理，直接转换原始 HTML
pub fn normalize_fallback(html: &str) -> String {
    let attempt = panic::catch_unwind(|| {
        let markdown = htmd::convert(html)
            .map(|md| literal_brackets(&md))
            .unwrap_or_else(|e| {
                warn!("⚠️ 通用转换失败，改为去除标签: {}", e);
                strip_tags(html)
            });
        finish(&markdown)
    });
    attempt.unwrap_or_else(|_| strip_tags(html).trim().to_string())
}

/// 步骤 6-10
fn finish(markdown: &str) -> String {
    let text = markdown::strip_headings(markdown);
    let text = markdown::normalize_whitespace(&text);
    let text = markdown::math_to_text(&text);
    tidy_markdown(&text)
}

/// 转换器转义过的方括号还原为字面方括号，不再被当作公式定界符
fn literal_brackets(markdown: &str) -> String {
    markdown.replace("\\[", "[").replace("\\]", "]")
}

fn strip_tags(html: &str) -> String {
    TAG.replace_all(html, " ")
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headings_become_paragraphs() {
        let out = normalize("<h2>Overview</h2><p>Body text.</p>");
        assert_eq!(out, "Overview\n\nBody text.");
    }

    #[test]
    fn test_table_shape() {
        let html = "<p>intro</p><table>\
            <tr><th>Model</th><th>Score</th><th>Size</th></tr>\
            <tr><td>A</td><td>1</td><td>7B</td></tr>\
            <tr><td>B</td><td>2</td><td>13B</td></tr>\
            </table><p>outro</p>";
        let out = normalize(html);
        let table: Vec<&str> = out.lines().filter(|l| l.starts_with('|')).collect();

        // 表头 + 分隔行 + 2 行数据
        assert_eq!(table.len(), 4);
        assert_eq!(table[0].matches('|').count(), 4);
        assert_eq!(table[1].matches('|').count(), 4);
        assert!(table[1].contains("---"));
        assert_eq!(table[0], "| Model | Score | Size |");
        assert_eq!(table[2], "| A | 1 | 7B |");
        assert!(out.starts_with("intro"));
        assert!(out.ends_with("outro"));
    }

    #[test]
    fn test_inline_math_becomes_text() {
        let html = r#"<p>We minimize <span data-latex="\frac{a}{b}"></span> over all inputs.</p>"#;
        assert_eq!(normalize(html), "We minimize (a) / (b) over all inputs.");
    }

    #[test]
    fn test_citation_brackets_survive() {
        let html = "<p>As shown in [1] and [2], the loss [see Eq. 3] drops.</p>";
        assert_eq!(
            normalize(html),
            "As shown in [1] and [2], the loss [see Eq. 3] drops."
        );

        let fallback = normalize_fallback(html);
        assert!(fallback.contains("[1]"), "{}", fallback);
        assert!(fallback.contains("[see Eq. 3]"), "{}", fallback);
    }

    #[test]
    fn test_text_delimited_math_becomes_text() {
        let out = normalize(r"<p>Energy \(E = mc^{2}\) holds, see [4].</p>");
        assert!(out.contains("mc^(2)"), "{}", out);
        assert!(!out.contains('\\'), "{}", out);
        assert!(out.ends_with("see [4]."), "{}", out);
    }

    #[test]
    fn test_katex_block_math() {
        let html = r#"<p>Objective:</p><span class="katex-display"><span class="katex"><span class="katex-mathml"><math><semantics><annotation encoding="application/x-tex">\alpha \leq \beta</annotation></semantics></math></span><span class="katex-html">α≤β</span></span></span>"#;
        let out = normalize(html);
        assert!(out.contains("α ≤ β"), "{}", out);
        assert!(!out.contains("α≤β"), "{}", out);
    }

    #[test]
    fn test_faq_question_on_own_paragraph() {
        let html = r#"<div class="faq"><div class="faq-q">Q1: What is proposed?</div><div class="faq-a"><p>A new method.</p></div></div>"#;
        let out = normalize(html);
        assert!(out.contains("Q1: What is proposed?\n\nA new method."), "{}", out);
    }

    #[test]
    fn test_never_panics_on_garbage() {
        let inputs = [
            "",
            "<",
            "</div></div>",
            "<table><tr></tr></table>",
            "<<<>>>&&&",
            "$$unterminated",
            r"\frac{",
            "<p>\u{0}</p>",
        ];
        for input in inputs {
            let _ = normalize(input);
        }
    }

    #[test]
    fn test_tree_panic_uses_fallback() {
        let html = "<p>Plain <b>text</b></p>";
        let out = normalize_with(html, |_| panic!("tree step exploded"));
        assert_eq!(out, normalize_fallback(html));
        assert!(out.contains("Plain"));
    }

    #[test]
    fn test_tree_error_uses_fallback() {
        let html = "<p>x</p>";
        let out = normalize_with(html, |_| {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "boom"))
        });
        assert_eq!(out, normalize_fallback(html));
    }

    #[test]
    fn test_strip_tags() {
        assert_eq!(strip_tags("<p>a &amp; b</p>").trim(), "a & b");
    }
}
