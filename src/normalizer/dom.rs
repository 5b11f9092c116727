//! 树结构处理
//!
//! 解析 HTML 后做一次只读遍历，重新序列化出交给通用转换器的 HTML：
//! - 删除公式的辅助/预览节点
//! - 公式节点替换为占位符，占位符之后还原为 `$...$` / `$$...$$`
//! - 正文里的 `\(...\)` / `\[...\]` 同样换成公式占位符
//! - 其余方括号换成占位符，避免被转换器转义后误当作公式定界符
//! - FAQ 结构：问题变成独立段落，答案与外层容器只保留内容
//! - 表格预先生成 Markdown 文本并替换为占位符
//!
//! 占位符由调用方生成（uuid），只含字母数字，不会被转换器转义，
//! 也不会和正文冲突。

use std::sync::LazyLock;

use regex::Regex;
use scraper::node::Element;
use scraper::{ElementRef, Html, Node, Selector};
use uuid::Uuid;

static ROW: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static TEXT_MATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\\\[(.+?)\\\]|\\\((.+?)\\\)").unwrap());
static TEX_ANNOTATION: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"annotation[encoding="application/x-tex"]"#).unwrap());
static MATH_ALTTEXT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("math[alttext]").unwrap());
static MATH_BLOCK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"math[display="block"]"#).unwrap());

const ASSISTIVE_TAGS: &[&str] = &["mjx-assistive-mml"];
const ASSISTIVE_CLASSES: &[&str] = &["MathJax_Preview", "MJX_Assistive_MathML", "katex-mathml"];

const MATH_TAGS: &[&str] = &["mjx-container", "math"];
const MATH_CLASSES: &[&str] = &[
    "katex",
    "katex-display",
    "MathJax",
    "MathJax_Display",
    "MathJax_SVG",
    "MathJax_CHTML",
    "math",
    "math-inline",
    "math-display",
    "arithmatex",
];
const BLOCK_MATH_CLASSES: &[&str] = &["katex-display", "MathJax_Display", "math-display"];

const QUESTION_CLASSES: &[&str] = &["faq-q", "faq-question", "question", "qa-question"];
const ANSWER_CLASSES: &[&str] = &["faq-a", "faq-answer", "answer", "qa-answer"];
const CONTAINER_CLASSES: &[&str] = &[
    "faq",
    "faq-item",
    "faq-list",
    "qa",
    "qa-item",
    "container",
    "kimi-container",
];

const SKIPPED_TAGS: &[&str] = &["script", "style", "noscript", "template", "button", "svg"];
const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// 占位符及其替换文本
#[derive(Debug, Clone, PartialEq)]
pub struct Placeholder {
    pub token: String,
    pub replacement: String,
}

/// 树处理的结果：待转换的 HTML 与占位符表
#[derive(Debug, Default)]
pub struct Prepared {
    pub html: String,
    pub placeholders: Vec<Placeholder>,
}

/// 解析并处理 HTML
pub fn prepare(html: &str) -> Prepared {
    let fragment = Html::parse_fragment(html);
    let mut pass = DomPass::default();
    pass.walk_children(fragment.root_element());
    Prepared {
        html: pass.out,
        placeholders: pass.placeholders,
    }
}

/// 把转换后文本里的占位符还原
pub fn restore(markdown: &str, placeholders: &[Placeholder]) -> String {
    placeholders
        .iter()
        .fold(markdown.to_string(), |text, p| text.replace(&p.token, &p.replacement))
}

#[derive(Default)]
struct DomPass {
    out: String,
    placeholders: Vec<Placeholder>,
    brackets: Option<(String, String)>,
}

impl DomPass {
    fn walk_children(&mut self, parent: ElementRef) {
        for child in parent.children() {
            match child.value() {
                Node::Text(text) => self.emit_text(text),
                Node::Element(_) => {
                    if let Some(el) = ElementRef::wrap(child) {
                        self.walk_element(el);
                    }
                }
                _ => {}
            }
        }
    }

    fn walk_element(&mut self, el: ElementRef) {
        let e = el.value();
        if is_assistive(e) {
            return;
        }
        if is_math_container(e) {
            self.emit_math(el);
            return;
        }
        if SKIPPED_TAGS.contains(&e.name()) {
            return;
        }
        if e.name() == "table" {
            self.emit_table(el);
            return;
        }
        if has_any_class(e, QUESTION_CLASSES) {
            self.out.push_str("\n<p>");
            self.walk_children(el);
            self.out.push_str("</p>\n");
            return;
        }
        if has_any_class(e, ANSWER_CLASSES) || is_container(e) {
            self.walk_children(el);
            return;
        }

        self.out.push('<');
        self.out.push_str(e.name());
        for (name, value) in e.attrs() {
            self.out.push(' ');
            self.out.push_str(name);
            self.out.push_str("=\"");
            self.out.push_str(&escape_attr(value));
            self.out.push('"');
        }
        self.out.push('>');
        if VOID_TAGS.contains(&e.name()) {
            return;
        }
        self.walk_children(el);
        self.out.push_str("</");
        self.out.push_str(e.name());
        self.out.push('>');
    }

    /// 正文文本：带定界符的公式换成占位符，其余按普通文本输出
    fn emit_text(&mut self, text: &str) {
        let mut last = 0;
        for caps in TEXT_MATH.captures_iter(text) {
            let (Some(whole), Some(source)) = (caps.get(0), caps.get(1).or_else(|| caps.get(2)))
            else {
                continue;
            };
            // 空公式按原文输出
            let source = source.as_str().trim();
            if source.is_empty() {
                continue;
            }
            self.emit_plain(&text[last..whole.start()]);
            let token = self.math_token(source, caps.get(1).is_some());
            self.out.push_str(&token);
            last = whole.end();
        }
        self.emit_plain(&text[last..]);
    }

    fn emit_plain(&mut self, text: &str) {
        let escaped = escape_text(text);
        if !escaped.contains(['[', ']']) {
            self.out.push_str(&escaped);
            return;
        }
        let (open, close) = self.bracket_tokens();
        let escaped = escaped.replace('[', &open).replace(']', &close);
        self.out.push_str(&escaped);
    }

    /// 登记一个公式占位符，返回占位符
    fn math_token(&mut self, source: &str, block: bool) -> String {
        let token = format!("ZZMATH{}ZZ", Uuid::new_v4().simple());
        let replacement = if block {
            format!("$${}$$", source)
        } else {
            format!("${}$", source)
        };
        self.placeholders.push(Placeholder {
            token: token.clone(),
            replacement,
        });
        token
    }

    /// 方括号占位符，整次遍历共用一对
    fn bracket_tokens(&mut self) -> (String, String) {
        if let Some(tokens) = &self.brackets {
            return tokens.clone();
        }
        let id = Uuid::new_v4().simple().to_string();
        let tokens = (format!("ZZLB{}ZZ", id), format!("ZZRB{}ZZ", id));
        for (token, replacement) in [(&tokens.0, "["), (&tokens.1, "]")] {
            self.placeholders.push(Placeholder {
                token: token.clone(),
                replacement: replacement.to_string(),
            });
        }
        self.brackets = Some(tokens.clone());
        tokens
    }

    fn emit_math(&mut self, el: ElementRef) {
        match formula_source(el) {
            Some(source) => {
                let block = is_block_math(el);
                let token = self.math_token(&source, block);
                if block {
                    self.out.push_str(&format!("\n<p>{}</p>\n", token));
                } else {
                    self.out.push_str(&token);
                }
            }
            None => {
                // MathJax v2：渲染结果后面紧跟着源码 script，由 script 负责输出
                if followed_by_math_script(el) {
                    return;
                }
                let mut text = String::new();
                collect_text(el, &mut text);
                let text = collapse_whitespace(&text);
                if !text.is_empty() {
                    self.emit_plain(&text);
                }
            }
        }
    }

    fn emit_table(&mut self, table: ElementRef) {
        let Some(markdown) = table_to_markdown(table) else {
            return;
        };
        let token = format!("ZZTABLE{}ZZ", Uuid::new_v4().simple());
        self.out.push_str(&format!("\n<p>{}</p>\n", token));
        self.placeholders.push(Placeholder {
            token,
            replacement: markdown,
        });
    }
}

/// 表格 → Markdown（表头、分隔行、数据行）
pub fn table_to_markdown(table: ElementRef) -> Option<String> {
    let rows: Vec<Vec<String>> = table
        .select(&ROW)
        .filter(|tr| owning_table(*tr).is_some_and(|owner| owner.id() == table.id()))
        .map(|tr| {
            tr.children()
                .filter_map(ElementRef::wrap)
                .filter(|cell| matches!(cell.value().name(), "td" | "th"))
                .map(cell_text)
                .collect::<Vec<_>>()
        })
        .filter(|cells| !cells.is_empty())
        .collect();

    let columns = rows.iter().map(Vec::len).max()?;
    let render = |cells: &[String]| {
        let padded: Vec<&str> = (0..columns)
            .map(|i| cells.get(i).map(String::as_str).unwrap_or(""))
            .collect();
        format!("| {} |", padded.join(" | "))
    };

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(render(&rows[0]));
    lines.push(format!("| {} |", vec!["---"; columns].join(" | ")));
    for row in &rows[1..] {
        lines.push(render(row));
    }
    Some(lines.join("\n"))
}

/// 行所属的最近一层表格（嵌套表格的行不算外层表格的行）
fn owning_table(row: ElementRef) -> Option<ElementRef> {
    row.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "table")
}

fn cell_text(cell: ElementRef) -> String {
    let mut text = String::new();
    collect_inline(cell, &mut text);
    collapse_whitespace(&text).replace('|', "\\|")
}

/// 收集行内文本，公式保留为 `$源码$`
fn collect_inline(el: ElementRef, out: &mut String) {
    for child in el.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(e) => {
                let Some(child_el) = ElementRef::wrap(child) else {
                    continue;
                };
                if is_assistive(e) {
                    continue;
                }
                if is_math_container(e) {
                    match formula_source(child_el) {
                        Some(source) => out.push_str(&format!("${}$", source)),
                        None if followed_by_math_script(child_el) => {}
                        None => collect_text(child_el, out),
                    }
                    continue;
                }
                if SKIPPED_TAGS.contains(&e.name()) {
                    continue;
                }
                if e.name() == "br" {
                    out.push(' ');
                    continue;
                }
                collect_inline(child_el, out);
            }
            _ => {}
        }
    }
}

/// 收集渲染出来的可见文本（跳过辅助节点）
fn collect_text(el: ElementRef, out: &mut String) {
    for child in el.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(e) => {
                if is_assistive(e) || SKIPPED_TAGS.contains(&e.name()) {
                    continue;
                }
                if let Some(child_el) = ElementRef::wrap(child) {
                    collect_text(child_el, out);
                }
            }
            _ => {}
        }
    }
}

/// 提取机器可读的公式源码
fn formula_source(el: ElementRef) -> Option<String> {
    let e = el.value();
    let non_empty = |s: &str| {
        let s = s.trim();
        (!s.is_empty()).then(|| s.to_string())
    };

    for attr in ["data-latex", "data-tex", "alttext"] {
        if let Some(source) = e.attr(attr).and_then(non_empty) {
            return Some(source);
        }
    }
    if is_math_script(e) {
        return non_empty(&el.text().collect::<String>());
    }
    if let Some(annotation) = el.select(&TEX_ANNOTATION).next() {
        if let Some(source) = non_empty(&annotation.text().collect::<String>()) {
            return Some(source);
        }
    }
    el.select(&MATH_ALTTEXT)
        .next()
        .and_then(|m| m.value().attr("alttext"))
        .and_then(non_empty)
}

fn is_block_math(el: ElementRef) -> bool {
    let e = el.value();
    matches!(e.attr("display"), Some("block") | Some("true"))
        || matches!(e.attr("data-display"), Some("block") | Some("true"))
        || e.attr("mode") == Some("display")
        || e.attr("type").is_some_and(|t| t.contains("mode=display"))
        || has_any_class(e, BLOCK_MATH_CLASSES)
        || el.select(&MATH_BLOCK).next().is_some()
}

fn followed_by_math_script(el: ElementRef) -> bool {
    el.next_siblings()
        .filter_map(ElementRef::wrap)
        .next()
        .is_some_and(|sibling| is_math_script(sibling.value()))
}

fn has_any_class(e: &Element, names: &[&str]) -> bool {
    e.classes().any(|c| names.contains(&c))
}

fn is_assistive(e: &Element) -> bool {
    ASSISTIVE_TAGS.contains(&e.name()) || has_any_class(e, ASSISTIVE_CLASSES)
}

fn is_math_script(e: &Element) -> bool {
    e.name() == "script" && e.attr("type").is_some_and(|t| t.starts_with("math/tex"))
}

fn is_math_container(e: &Element) -> bool {
    MATH_TAGS.contains(&e.name())
        || has_any_class(e, MATH_CLASSES)
        || e.attr("data-latex").is_some()
        || e.attr("data-tex").is_some()
        || is_math_script(e)
}

fn is_container(e: &Element) -> bool {
    has_any_class(e, CONTAINER_CLASSES) || e.id().is_some_and(|id| id.starts_with("kimi-container"))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(text: &str) -> String {
    escape_text(text).replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prepared_with_restore(html: &str) -> String {
        let prepared = prepare(html);
        restore(&prepared.html, &prepared.placeholders)
    }

    #[test]
    fn test_assistive_nodes_removed() {
        let html = r#"<p>a<span class="MathJax_Preview">preview</span>b<mjx-assistive-mml>mml</mjx-assistive-mml></p>"#;
        assert_eq!(prepared_with_restore(html), "<p>ab</p>");
    }

    #[test]
    fn test_inline_math_from_annotation() {
        let html = r#"<p>loss <span class="katex"><span class="katex-mathml"><math><semantics><annotation encoding="application/x-tex">x^2</annotation></semantics></math></span><span class="katex-html">x2</span></span> end</p>"#;
        assert_eq!(prepared_with_restore(html), "<p>loss $x^2$ end</p>");
    }

    #[test]
    fn test_block_math_from_data_attribute() {
        let html = r#"<div data-latex="\sum_i x_i" data-display="block">rendered</div>"#;
        let out = prepared_with_restore(html);
        assert!(out.contains("<p>$$\\sum_i x_i$$</p>"), "{}", out);
    }

    #[test]
    fn test_mjx_container_display() {
        let html = r#"<mjx-container display="true"><mjx-assistive-mml><math alttext="a+b"></math></mjx-assistive-mml></mjx-container>"#;
        // 辅助节点里的 alttext 仍可作为源码
        let out = prepared_with_restore(html);
        assert!(out.contains("$$a+b$$"), "{}", out);
    }

    #[test]
    fn test_mathjax_v2_script_is_source() {
        let html = r#"<p><span class="MathJax_Preview">x</span><span class="MathJax">rendered x</span><script type="math/tex">\alpha</script></p>"#;
        assert_eq!(prepared_with_restore(html), "<p>$\\alpha$</p>");
    }

    #[test]
    fn test_math_without_source_falls_back_to_text() {
        let html = r#"<p><span class="math">  E = mc </span><span class="math"> </span></p>"#;
        assert_eq!(prepared_with_restore(html), "<p>E = mc</p>");
    }

    #[test]
    fn test_faq_unwrapped() {
        let html = r#"<div class="faq"><div class="faq-q">Q1: 这篇论文解决什么问题？</div><div class="faq-a"><p>答案</p></div></div>"#;
        assert_eq!(
            prepared_with_restore(html),
            "\n<p>Q1: 这篇论文解决什么问题？</p>\n<p>答案</p>"
        );
    }

    #[test]
    fn test_table_placeholder() {
        let html = "<table><tr><th>A</th><th>B</th></tr><tr><td>1</td><td>x|y</td></tr></table>";
        let prepared = prepare(html);
        assert_eq!(prepared.placeholders.len(), 1);
        assert!(prepared.html.contains(&prepared.placeholders[0].token));
        assert_eq!(
            prepared.placeholders[0].replacement,
            "| A | B |\n| --- | --- |\n| 1 | x\\|y |"
        );
    }

    #[test]
    fn test_ragged_table_is_padded() {
        let html = "<table><tr><td>a</td></tr><tr><td>b</td><td>c</td></tr></table>";
        let prepared = prepare(html);
        assert_eq!(
            prepared.placeholders[0].replacement,
            "| a |  |\n| --- | --- |\n| b | c |"
        );
    }

    #[test]
    fn test_empty_table_dropped() {
        let prepared = prepare("<p>x</p><table></table>");
        assert!(prepared.placeholders.is_empty());
        assert_eq!(prepared.html, "<p>x</p>");
    }

    #[test]
    fn test_nested_table_rows_stay_in_inner_table() {
        let html = "<table><tr><th>Model</th><th>Scores</th></tr>\
                    <tr><td>A</td><td><table><tr><td>1</td><td>2</td></tr></table></td></tr></table>";
        let prepared = prepare(html);
        assert_eq!(prepared.placeholders.len(), 1);
        let markdown = &prepared.placeholders[0].replacement;
        assert_eq!(markdown.lines().count(), 3, "{}", markdown);
        assert!(markdown.starts_with("| Model | Scores |"), "{}", markdown);
        assert!(!markdown.contains("| 1 | 2 |"), "{}", markdown);
    }

    #[test]
    fn test_text_delimited_math_becomes_placeholder() {
        let html = r"<p>Energy \(E = mc^2\) and \[ a+b \] hold</p>";
        let prepared = prepare(html);
        assert!(!prepared.html.contains('\\'), "{}", prepared.html);
        assert_eq!(
            restore(&prepared.html, &prepared.placeholders),
            "<p>Energy $E = mc^2$ and $$a+b$$ hold</p>"
        );
    }

    #[test]
    fn test_literal_brackets_hidden_from_converter() {
        let html = "<p>As shown in [1] and [2], see [Eq. 3].</p>";
        let prepared = prepare(html);
        assert!(!prepared.html.contains(['[', ']']), "{}", prepared.html);
        assert_eq!(prepared.placeholders.len(), 2);
        assert_eq!(restore(&prepared.html, &prepared.placeholders), html);
    }

    #[test]
    fn test_text_is_escaped() {
        assert_eq!(
            prepared_with_restore("<p>a &lt; b &amp; c</p>"),
            "<p>a &lt; b &amp; c</p>"
        );
    }
}
