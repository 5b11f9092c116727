//! LaTeX → 纯文本
//!
//! 一组按固定顺序执行的字符串改写规则，不是 LaTeX 语法分析器。
//! 后面的规则依赖前面的规则已经消解了嵌套结构，所以顺序不能调整。
//! 不在符号表里的命令会以去掉反斜杠的原文形式保留下来。

use std::borrow::Cow;
use std::sync::LazyLock;

use phf::phf_map;
use regex::{Captures, Regex};

/// 允许两层嵌套的花括号参数
const ARG: &str = r"(?:[^{}]|\{(?:[^{}]|\{[^{}]*\})*\})*";

/// 嵌套改写的最大轮数
const MAX_PASSES: usize = 16;

/// 转义花括号 `\{` `\}` 的占位字符，避免被花括号折叠规则吃掉
const OPEN_BRACE: char = '\u{E000}';
const CLOSE_BRACE: char = '\u{E001}';

/// 常用宏 → Unicode 字符
pub static SYMBOLS: phf::Map<&'static str, &'static str> = phf_map! {
    // 希腊字母
    "alpha" => "α", "beta" => "β", "gamma" => "γ", "delta" => "δ",
    "epsilon" => "ϵ", "varepsilon" => "ε", "zeta" => "ζ", "eta" => "η",
    "theta" => "θ", "vartheta" => "ϑ", "iota" => "ι", "kappa" => "κ",
    "lambda" => "λ", "mu" => "μ", "nu" => "ν", "xi" => "ξ",
    "pi" => "π", "rho" => "ρ", "sigma" => "σ", "tau" => "τ",
    "upsilon" => "υ", "phi" => "ϕ", "varphi" => "φ", "chi" => "χ",
    "psi" => "ψ", "omega" => "ω",
    "Gamma" => "Γ", "Delta" => "Δ", "Theta" => "Θ", "Lambda" => "Λ",
    "Xi" => "Ξ", "Pi" => "Π", "Sigma" => "Σ", "Phi" => "Φ",
    "Psi" => "Ψ", "Omega" => "Ω",
    // 关系
    "leq" => "≤", "le" => "≤", "geq" => "≥", "ge" => "≥",
    "neq" => "≠", "ne" => "≠", "approx" => "≈", "equiv" => "≡",
    "sim" => "∼", "simeq" => "≃", "propto" => "∝", "ll" => "≪", "gg" => "≫",
    // 箭头
    "to" => "→", "rightarrow" => "→", "leftarrow" => "←", "Rightarrow" => "⇒",
    "Leftarrow" => "⇐", "leftrightarrow" => "↔", "Leftrightarrow" => "⇔",
    "mapsto" => "↦", "implies" => "⟹", "iff" => "⟺", "uparrow" => "↑", "downarrow" => "↓",
    // 集合与逻辑
    "in" => "∈", "notin" => "∉", "subset" => "⊂", "subseteq" => "⊆",
    "supset" => "⊃", "supseteq" => "⊇", "cup" => "∪", "cap" => "∩",
    "emptyset" => "∅", "varnothing" => "∅", "forall" => "∀", "exists" => "∃",
    "neg" => "¬", "land" => "∧", "lor" => "∨",
    // 运算
    "times" => "×", "cdot" => "·", "div" => "÷", "pm" => "±", "mp" => "∓",
    "infty" => "∞", "partial" => "∂", "nabla" => "∇", "sum" => "∑",
    "prod" => "∏", "int" => "∫", "oint" => "∮", "circ" => "∘",
    "oplus" => "⊕", "otimes" => "⊗", "ast" => "∗", "star" => "⋆",
    "ldots" => "…", "cdots" => "⋯", "dots" => "…", "vdots" => "⋮",
    "perp" => "⊥", "parallel" => "∥", "mid" => "∣", "angle" => "∠",
    "top" => "⊤", "dagger" => "†", "hbar" => "ℏ", "ell" => "ℓ",
};

static FRAC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\\[dt]?frac\s*\{{({ARG})\}}\s*\{{({ARG})\}}")).unwrap()
});
static FRAC_DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\[dt]?frac\s*([0-9A-Za-z])([0-9A-Za-z])\b").unwrap());
// 上一轮已经去掉反斜杠的写法
static FRAC_BARE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\b[dt]?frac\{{({ARG})\}}\{{({ARG})\}}")).unwrap()
});
static FRAC_BARE_DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[dt]?frac([0-9])([0-9])\b").unwrap());

static SUPERSCRIPT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"\^\s*\{{({ARG})\}}")).unwrap());
static SUBSCRIPT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"_\s*\{{({ARG})\}}")).unwrap());

static SIZED_DELIMITER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\\(?:left|right|Biggl|Biggr|biggl|biggr|Bigl|Bigr|bigl|bigr|Bigg|bigg|Big|big)\s*(\\\{|\\\}|\\langle|\\rangle|\\lvert|\\rvert|\\lVert|\\rVert|\\\||[()\[\]|./])",
    )
    .unwrap()
});

static STYLE_COMMAND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"\\(?:mathbf|mathit|mathrm|mathbb|mathcal|mathsf|mathtt|mathfrak|mathscr|boldsymbol|bm|textbf|textit|textrm|textsf|texttt|textnormal|text|emph|operatorname\*?|mbox|hbox|underline|overline)\s*\{{({ARG})\}}"
    ))
    .unwrap()
});

static NAMED_FUNCTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\\(arcsin|arccos|arctan|sinh|cosh|tanh|sin|cos|tan|cot|sec|csc|log|ln|lg|exp|limsup|liminf|lim|max|min|sup|inf|argmax|argmin|arg|det|dim|ker|deg|gcd|Pr|bmod|mod)\b",
    )
    .unwrap()
});

static PHANTOM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\\(?:phantom|hphantom|vphantom|smash)\s*\{{({ARG})\}}")).unwrap()
});
static SPACING_WIDE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\(?:qquad|quad)\b|\\[,;: ]").unwrap());
static SIZE_COMMAND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\\(?:Biggl|Biggr|biggl|biggr|Bigl|Bigr|bigl|bigr|Bigg|bigg|Big|big|middle|displaystyle|textstyle|scriptstyle|scriptscriptstyle|nolimits|limits|hfill|vfill|allowbreak|nonumber|notag)\b|\\!",
    )
    .unwrap()
});

static SYMBOL_COMMAND: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\\([A-Za-z]+)").unwrap());

static BEGIN_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\(?:begin|end)\s*\{[^{}]*\}").unwrap());
static COMMAND_WITH_ARG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"\\[A-Za-z]+\*?\s*\{{({ARG})\}}")).unwrap());
static BARE_COMMAND: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\\([A-Za-z]+)").unwrap());
static BRACE_PAIR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{([^{}]*)\}").unwrap());
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// 反复执行同一条规则直到结果稳定（用于逐层剥离嵌套）
fn replace_until_stable<F>(re: &Regex, text: String, mut rewrite: F) -> String
where
    F: FnMut(&Captures) -> String,
{
    let mut current = text;
    for _ in 0..MAX_PASSES {
        let next = match re.replace_all(&current, |caps: &Captures| rewrite(caps)) {
            Cow::Borrowed(_) => return current,
            Cow::Owned(s) => s,
        };
        current = next;
    }
    current
}

fn sized_delimiter(caps: &Captures) -> String {
    match &caps[1] {
        r"\{" => OPEN_BRACE.to_string(),
        r"\}" => CLOSE_BRACE.to_string(),
        r"\langle" => "⟨".to_string(),
        r"\rangle" => "⟩".to_string(),
        r"\lvert" | r"\rvert" => "|".to_string(),
        r"\lVert" | r"\rVert" | r"\|" => "‖".to_string(),
        "." => String::new(),
        other => other.to_string(),
    }
}

/// 把一段 LaTeX 源码近似转换为可读的纯文本
///
/// # 示例
/// ```
/// use paper_digest::normalizer::convert_latex_to_text;
/// assert_eq!(convert_latex_to_text(r"\frac{a}{b}"), "(a) / (b)");
/// assert_eq!(convert_latex_to_text(r"\alpha"), "α");
/// ```
pub fn convert_latex_to_text(latex: &str) -> String {
    // a. 分式
    let text = replace_until_stable(&FRAC, latex.to_string(), |c| {
        format!("({}) / ({})", &c[1], &c[2])
    });
    let text = FRAC_DIGITS.replace_all(&text, "($1) / ($2)").into_owned();
    let text = replace_until_stable(&FRAC_BARE, text, |c| format!("({}) / ({})", &c[1], &c[2]));
    let text = FRAC_BARE_DIGITS.replace_all(&text, "($1) / ($2)").into_owned();

    // b. 上下标
    let text = replace_until_stable(&SUPERSCRIPT, text, |c| format!("^({})", &c[1]));
    let text = replace_until_stable(&SUBSCRIPT, text, |c| format!("_({})", &c[1]));

    // c. 定界符
    let text = SIZED_DELIMITER
        .replace_all(&text, |c: &Captures| sized_delimiter(c))
        .into_owned();

    // d. 字体/格式命令
    let text = replace_until_stable(&STYLE_COMMAND, text, |c| c[1].to_string());

    // e. 函数名
    let text = NAMED_FUNCTION.replace_all(&text, "$1").into_owned();

    // f. 尺寸与间距
    let text = replace_until_stable(&PHANTOM, text, |c| c[1].to_string());
    let text = SPACING_WIDE.replace_all(&text, " ").into_owned();
    let text = SIZE_COMMAND.replace_all(&text, "").into_owned();

    // g. 符号表
    let text = SYMBOL_COMMAND
        .replace_all(&text, |c: &Captures| match SYMBOLS.get(&c[1]) {
            Some(glyph) => (*glyph).to_string(),
            None => c[0].to_string(),
        })
        .into_owned();

    // h. 残余命令与花括号
    let text = text
        .replace(r"\{", &OPEN_BRACE.to_string())
        .replace(r"\}", &CLOSE_BRACE.to_string())
        .replace(r"\|", "‖");
    let text = BEGIN_END.replace_all(&text, " ").into_owned();
    let text = replace_until_stable(&COMMAND_WITH_ARG, text, |c| c[1].to_string());
    let text = BARE_COMMAND.replace_all(&text, "$1").into_owned();
    let text = replace_until_stable(&BRACE_PAIR, text, |c| c[1].to_string());
    let text: String = text
        .chars()
        .filter(|&ch| ch != '\\')
        .map(|ch| match ch {
            OPEN_BRACE => '{',
            CLOSE_BRACE => '}',
            other => other,
        })
        .collect();

    // i. 空白
    WHITESPACE.replace_all(&text, " ").trim().to_string()
}
