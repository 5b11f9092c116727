//! Markdown 文本层面的整理
//!
//! 在通用 HTML→Markdown 转换之后执行：去标题、空白规整、公式转文本、
//! 链接修复、排版修饰。全部是纯字符串操作。

use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::latex::convert_latex_to_text;

static HEADING_MARKER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^[ \t]*#+[ \t]?").unwrap());
static INNER_SPACES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]{2,}").unwrap());

static DISPLAY_DOLLAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)\$\$(.+?)\$\$").unwrap());
static DISPLAY_BRACKET: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)\\\[(.+?)\\\]").unwrap());
static INLINE_PAREN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)\\\((.+?)\\\)").unwrap());
static INLINE_DOLLAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$([^\s$](?:[^$\n]*?[^\s$])?)\$").unwrap());
static BARE_COMMAND_RUN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\[A-Za-z]+(?:\{[^{}\n]*\}|[_^]\{[^{}\n]*\}|[_^][A-Za-z0-9])*").unwrap()
});

static SPLIT_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]\n]*)\][ \t]*\n[ \t]*\(([^)\n]*)\)").unwrap());
static LINK_TARGET: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\]\(([^)]*)\)").unwrap());
static LIST_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:[-*+]|\d+[.)])\s+").unwrap());
static HEADING_LIKE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:\*\*[^*\n]+\*\*|__[^_\n]+__)[:：]?$").unwrap());
static ESCAPE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\\(.)").unwrap());

/// 中文标点（省略号是合法的连用，不在此列）
const CJK_PUNCTUATION: &[char] = &['，', '。', '！', '？', '；', '：', '、'];

/// 真正需要反斜杠转义的 Markdown 字符
const MARKDOWN_SPECIALS: &[char] = &[
    '\\', '`', '*', '_', '{', '}', '[', ']', '(', ')', '#', '+', '-', '.', '!', '|', '<', '>',
    '~', '$',
];

/// 去掉行首的 `#` 标题标记
pub fn strip_headings(text: &str) -> String {
    HEADING_MARKER.replace_all(text, "").into_owned()
}

/// 空白规整：去行尾空白、行内连续空白合并、空行最多连续两行
pub fn normalize_whitespace(text: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut blank_run = 0;

    for raw in text.lines() {
        let line = raw.trim_end();
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 2 {
                continue;
            }
            lines.push(String::new());
            continue;
        }
        blank_run = 0;

        // 保留行首缩进（嵌套列表依赖它）
        let indent_len = line.len() - line.trim_start().len();
        let (indent, body) = line.split_at(indent_len);
        let body = INNER_SPACES.replace_all(body, " ");
        lines.push(format!("{}{}", indent, body));
    }

    lines.join("\n").trim_matches('\n').to_string()
}

fn convert_delimited(caps: &Captures) -> String {
    convert_latex_to_text(&caps[1])
}

/// 公式转文本：先处理带定界符的公式，再处理裸露的命令序列
pub fn math_to_text(text: &str) -> String {
    let text = DISPLAY_DOLLAR.replace_all(text, convert_delimited);
    let text = DISPLAY_BRACKET.replace_all(&text, convert_delimited);
    let text = INLINE_PAREN.replace_all(&text, convert_delimited);
    let text = INLINE_DOLLAR.replace_all(&text, convert_delimited);

    let mut in_fence = false;
    text.lines()
        .map(|line| {
            if line.trim_start().starts_with("```") {
                in_fence = !in_fence;
                return line.to_string();
            }
            if in_fence {
                return line.to_string();
            }
            BARE_COMMAND_RUN
                .replace_all(line, |caps: &Captures| convert_latex_to_text(&caps[0]))
                .into_owned()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// 链接修复：`[text]\n(url)` 合并，去掉 URL 内部的空白
pub fn repair_links(text: &str) -> String {
    let text = SPLIT_LINK.replace_all(text, "[$1]($2)");
    LINK_TARGET
        .replace_all(&text, |caps: &Captures| {
            let target = &caps[1];
            // 带标题的链接保持原样
            if target.contains('"') {
                return caps[0].to_string();
            }
            let cleaned: String = target.chars().filter(|c| !c.is_whitespace()).collect();
            format!("]({})", cleaned)
        })
        .into_owned()
}

/// 合并重复的中文标点
pub fn collapse_cjk_punctuation(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev: Option<char> = None;
    for ch in text.chars() {
        if prev == Some(ch) && CJK_PUNCTUATION.contains(&ch) {
            continue;
        }
        out.push(ch);
        prev = Some(ch);
    }
    out
}

/// 去掉相邻列表项之间多余的空行
pub fn tighten_lists(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let mut out: Vec<&str> = Vec::with_capacity(lines.len());

    for (i, &line) in lines.iter().enumerate() {
        if line.trim().is_empty() {
            let prev_is_item = out.last().is_some_and(|l| LIST_ITEM.is_match(l));
            let next_is_item = lines[i + 1..]
                .iter()
                .find(|l| !l.trim().is_empty())
                .is_some_and(|l| LIST_ITEM.is_match(l));
            if prev_is_item && next_is_item {
                continue;
            }
        }
        out.push(line);
    }
    out.join("\n")
}

/// 标题样式的行（整行加粗）前后各保证一个空行，其余空行数量不变
pub fn space_heading_like_lines(text: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut blanks = 0;

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            if !out.is_empty() {
                blanks += 1;
            }
            continue;
        }

        if !out.is_empty() {
            let heading_like = HEADING_LIKE.is_match(trimmed);
            let prev_heading_like = out
                .last()
                .is_some_and(|l: &String| HEADING_LIKE.is_match(l.trim()));
            let needed = if heading_like || prev_heading_like { 1 } else { blanks };
            out.extend(std::iter::repeat(String::new()).take(needed));
        }
        blanks = 0;
        out.push(line.to_string());
    }
    out.join("\n")
}

/// 去掉不是在转义 Markdown 特殊字符的反斜杠
pub fn drop_spurious_escapes(text: &str) -> String {
    ESCAPE
        .replace_all(text, |caps: &Captures| {
            let escaped = &caps[1];
            match escaped.chars().next() {
                Some(c) if MARKDOWN_SPECIALS.contains(&c) => caps[0].to_string(),
                _ => escaped.to_string(),
            }
        })
        .into_owned()
}

/// 排版整理：链接修复 → 修饰 → 空白规整
///
/// 空白规整放在最后，保证重复执行结果不变。
pub fn tidy_markdown(text: &str) -> String {
    let text = repair_links(text);
    let text = drop_spurious_escapes(&text);
    let text = collapse_cjk_punctuation(&text);
    let text = tighten_lists(&text);
    let text = space_heading_like_lines(&text);
    normalize_whitespace(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_headings() {
        assert_eq!(strip_headings("## Title\ntext\n#Tight"), "Title\ntext\nTight");
    }

    #[test]
    fn test_normalize_whitespace() {
        let input = "a  b\t\tc   \n\n\n\n\nnext\n  - nested  item";
        assert_eq!(normalize_whitespace(input), "a b c\n\n\nnext\n  - nested item");
    }

    #[test]
    fn test_math_to_text_delimiters() {
        assert_eq!(math_to_text(r"loss $\frac{a}{b}$ here"), "loss (a) / (b) here");
        assert_eq!(math_to_text(r"$$\alpha + \beta$$"), "α + β");
        assert_eq!(math_to_text(r"\(x^{2}\) and \[\sum_{i} x_i\]"), "x^(2) and ∑_(i) x_i");
    }

    #[test]
    fn test_math_to_text_leaves_prices_alone() {
        assert_eq!(math_to_text("costs $5 and $10"), "costs $5 and $10");
    }

    #[test]
    fn test_bare_commands_outside_delimiters() {
        assert_eq!(
            math_to_text(r"where \alpha_i is \mathbf{w}"),
            "where α_i is w"
        );
    }

    #[test]
    fn test_fenced_code_untouched() {
        let input = "```\n\\alpha\n```";
        assert_eq!(math_to_text(input), input);
    }

    #[test]
    fn test_repair_links() {
        assert_eq!(
            repair_links("[paper]\n(https://arxiv.org/ abs/1)"),
            "[paper](https://arxiv.org/abs/1)"
        );
    }

    #[test]
    fn test_collapse_cjk_punctuation() {
        assert_eq!(collapse_cjk_punctuation("好。。。对，，吗……"), "好。对，吗……");
    }

    #[test]
    fn test_tighten_lists() {
        assert_eq!(tighten_lists("- a\n\n- b\n\ntext"), "- a\n- b\n\ntext");
    }

    #[test]
    fn test_space_heading_like_lines() {
        assert_eq!(
            space_heading_like_lines("intro\n**方法**\nbody"),
            "intro\n\n**方法**\n\nbody"
        );
    }

    #[test]
    fn test_drop_spurious_escapes() {
        assert_eq!(drop_spurious_escapes(r"a\_b \q \* c"), r"a\_b q \* c");
    }

    #[test]
    fn test_escaped_cjk_punctuation_collapses_in_one_pass() {
        assert_eq!(tidy_markdown("好，\\，"), "好，");
    }

    #[test]
    fn test_tidy_is_idempotent() {
        let samples = [
            "Intro text  with   spaces\n**Summary**\n- one\n\n- two\n\n\n\n\n[link]\n(http://x. y/z)\n好。。\\q",
            "plain",
            "",
            "**A**\n**B**\n\n\n- x\n\n\n- y",
            "好，\\，",
            "结果。\\。\\q。",
        ];
        for sample in samples {
            let once = tidy_markdown(sample);
            let twice = tidy_markdown(&once);
            assert_eq!(once, twice, "input: {:?}", sample);
        }
    }
}
