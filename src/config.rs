use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// 程序配置文件
///
/// 加载顺序：默认值 → TOML 文件（可选）→ 环境变量。
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    // --- 输出配置 ---
    /// JSON 文件输出根目录
    pub json_output_dir: String,
    /// Markdown 文件输出根目录
    pub markdown_output_dir: String,
    /// 日志级别（RUST_LOG 优先）
    pub log_level: String,

    // --- 浏览器配置 ---
    /// 页面池容量
    pub pool_capacity: usize,
    /// 浏览器可执行文件路径（为空时由 chromiumoxide 自动查找）
    pub chrome_executable: Option<String>,
    /// 是否使用无头模式
    pub headless: bool,
    /// 需要拦截的资源 URL 模式（图片、字体、样式表、统计脚本）
    pub blocked_url_patterns: Vec<String>,
    /// 归还页面时重置的超时，超时的页面直接关闭
    pub page_reset_timeout_ms: u64,

    // --- 解读抓取配置 ---
    /// 解读站点前缀，文档 ID 直接拼接在后面
    pub interpretation_base_url: String,
    /// 导航超时（页面外壳是静态的，加载很快）
    pub navigation_timeout_ms: u64,
    /// 等待触发按钮出现的超时
    pub selector_timeout_ms: u64,
    /// 等待生成完成的轮询总超时
    pub poll_timeout_ms: u64,
    /// 轮询间隔
    pub poll_interval_ms: u64,
    /// 认为生成完成的最小文本长度
    pub min_content_length: usize,
    /// 整体重试次数（不含首次）
    pub fetch_retries: u32,
    /// 重试基础延迟，第 n 次重试等待 base * n
    pub retry_base_delay_ms: u64,
    /// 仅触发模式下点击后的固定停顿
    pub trigger_pause_ms: u64,

    // --- 速率配置 ---
    /// 启用解读/LLM 分析时的每秒调用数
    pub llm_rate_per_second: f64,
    /// 仅翻译时的每秒调用数
    pub default_rate_per_second: f64,

    // --- 数据源配置 ---
    /// HuggingFace 论文最多条数
    pub hf_max_items: usize,
    /// arXiv 领域列表
    pub arxiv_domains: Vec<String>,
    /// 每个领域最多条数
    pub arxiv_max_results: usize,
    /// 是否运行 GitHub Trending 流水线
    pub enable_github_trending: bool,
    /// 除全站榜外额外抓取的语言榜
    pub github_languages: Vec<String>,
    /// 时间范围：daily / weekly / monthly
    pub github_time_range: String,
    /// 每个榜单最多条数
    pub github_max_items: usize,

    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    /// 没有解读时是否调用 LLM 自行分析
    pub enable_llm_analysis: bool,
    /// 是否抓取第三方解读
    pub enable_interpretation: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            json_output_dir: "data/json".to_string(),
            markdown_output_dir: "data/markdown".to_string(),
            log_level: "info".to_string(),
            pool_capacity: 3,
            chrome_executable: None,
            headless: true,
            blocked_url_patterns: default_blocked_patterns(),
            page_reset_timeout_ms: 5000,
            interpretation_base_url: "https://papers.cool/arxiv/".to_string(),
            navigation_timeout_ms: 3000,
            selector_timeout_ms: 1000,
            poll_timeout_ms: 30000,
            poll_interval_ms: 500,
            min_content_length: 1000,
            fetch_retries: 2,
            retry_base_delay_ms: 1000,
            trigger_pause_ms: 2000,
            llm_rate_per_second: 2.0,
            default_rate_per_second: 10.0,
            hf_max_items: 20,
            arxiv_domains: ["NLP", "LLM", "Agent", "CV", "Multimodal"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            arxiv_max_results: 10,
            enable_github_trending: true,
            github_languages: vec!["python".to_string()],
            github_time_range: "daily".to_string(),
            github_max_items: 25,
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            llm_model_name: "gpt-4o-mini".to_string(),
            enable_llm_analysis: false,
            enable_interpretation: true,
        }
    }
}

fn default_blocked_patterns() -> Vec<String> {
    [
        "*.png", "*.jpg", "*.jpeg", "*.gif", "*.webp", "*.svg", "*.ico", "*.woff", "*.woff2",
        "*.ttf", "*.otf", "*.css", "*google-analytics.com*", "*googletagmanager.com*",
        "*doubleclick.net*", "*hm.baidu.com*",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// 读取并解析环境变量，缺失或无法解析时保留原值
fn env_or<T: FromStr>(name: &str, current: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(current)
}

/// 读取逗号分隔的列表
fn env_list_or(name: &str, current: Vec<String>) -> Vec<String> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => v
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        _ => current,
    }
}

impl Config {
    /// 仅从环境变量加载（以默认值为基础）
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// 从 TOML 文件加载，再用环境变量覆盖
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml_str(&content).map_err(|source| ConfigError::TomlParseFailed {
            path: path.display().to_string(),
            source,
        })?;
        let config = config.with_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// 解析 TOML 字符串，未出现的字段取默认值
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// 用环境变量覆盖当前配置
    pub fn with_env_overrides(self) -> Self {
        let c = self;
        Self {
            json_output_dir: env_or("JSON_OUTPUT_DIR", c.json_output_dir),
            markdown_output_dir: env_or("MARKDOWN_OUTPUT_DIR", c.markdown_output_dir),
            log_level: env_or("LOG_LEVEL", c.log_level),
            pool_capacity: env_or("POOL_CAPACITY", c.pool_capacity),
            chrome_executable: std::env::var("CHROME_EXECUTABLE").ok().or(c.chrome_executable),
            headless: env_or("HEADLESS", c.headless),
            blocked_url_patterns: env_list_or("BLOCKED_URL_PATTERNS", c.blocked_url_patterns),
            page_reset_timeout_ms: env_or("PAGE_RESET_TIMEOUT_MS", c.page_reset_timeout_ms),
            interpretation_base_url: env_or("INTERPRETATION_BASE_URL", c.interpretation_base_url),
            navigation_timeout_ms: env_or("NAVIGATION_TIMEOUT_MS", c.navigation_timeout_ms),
            selector_timeout_ms: env_or("SELECTOR_TIMEOUT_MS", c.selector_timeout_ms),
            poll_timeout_ms: env_or("POLL_TIMEOUT_MS", c.poll_timeout_ms),
            poll_interval_ms: env_or("POLL_INTERVAL_MS", c.poll_interval_ms),
            min_content_length: env_or("MIN_CONTENT_LENGTH", c.min_content_length),
            fetch_retries: env_or("FETCH_RETRIES", c.fetch_retries),
            retry_base_delay_ms: env_or("RETRY_BASE_DELAY_MS", c.retry_base_delay_ms),
            trigger_pause_ms: env_or("TRIGGER_PAUSE_MS", c.trigger_pause_ms),
            llm_rate_per_second: env_or("LLM_RATE_PER_SECOND", c.llm_rate_per_second),
            default_rate_per_second: env_or("DEFAULT_RATE_PER_SECOND", c.default_rate_per_second),
            hf_max_items: env_or("HF_MAX_ITEMS", c.hf_max_items),
            arxiv_domains: env_list_or("ARXIV_DOMAINS", c.arxiv_domains),
            arxiv_max_results: env_or("ARXIV_MAX_RESULTS", c.arxiv_max_results),
            enable_github_trending: env_or("ENABLE_GITHUB_TRENDING", c.enable_github_trending),
            github_languages: env_list_or("GITHUB_LANGUAGES", c.github_languages),
            github_time_range: env_or("GITHUB_TIME_RANGE", c.github_time_range),
            github_max_items: env_or("GITHUB_MAX_ITEMS", c.github_max_items),
            llm_api_key: env_or("LLM_API_KEY", c.llm_api_key),
            llm_api_base_url: env_or("LLM_API_BASE_URL", c.llm_api_base_url),
            llm_model_name: env_or("LLM_MODEL_NAME", c.llm_model_name),
            enable_llm_analysis: env_or("ENABLE_LLM_ANALYSIS", c.enable_llm_analysis),
            enable_interpretation: env_or("ENABLE_INTERPRETATION", c.enable_interpretation),
        }
    }

    /// 校验配置
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pool_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                key: "pool_capacity".to_string(),
                reason: "页面池容量必须大于 0".to_string(),
            });
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "poll_interval_ms".to_string(),
                reason: "轮询间隔必须大于 0".to_string(),
            });
        }
        if !matches!(self.github_time_range.as_str(), "daily" | "weekly" | "monthly") {
            return Err(ConfigError::InvalidValue {
                key: "github_time_range".to_string(),
                reason: format!("不支持的时间范围: {}", self.github_time_range),
            });
        }
        Ok(())
    }

    /// 是否需要慢速调用（解读或 LLM 分析会打到限流的第三方接口）
    pub fn enrichment_rate(&self) -> f64 {
        if self.enable_interpretation || self.enable_llm_analysis {
            self.llm_rate_per_second
        } else {
            self.default_rate_per_second
        }
    }

    pub fn page_reset_timeout(&self) -> Duration {
        Duration::from_millis(self.page_reset_timeout_ms)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    pub fn selector_timeout(&self) -> Duration {
        Duration::from_millis(self.selector_timeout_ms)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn trigger_pause(&self) -> Duration {
        Duration::from_millis(self.trigger_pause_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.pool_capacity, 3);
        assert_eq!(config.fetch_retries, 2);
        assert_eq!(config.min_content_length, 1000);
        assert_eq!(config.navigation_timeout(), Duration::from_millis(3000));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_overlay_keeps_missing_fields() {
        let config = Config::from_toml_str(
            r#"
            pool_capacity = 5
            min_content_length = 800
            arxiv_domains = ["CV"]
            "#,
        )
        .expect("合法 TOML");
        assert_eq!(config.pool_capacity, 5);
        assert_eq!(config.min_content_length, 800);
        assert_eq!(config.arxiv_domains, vec!["CV".to_string()]);
        assert_eq!(config.poll_interval_ms, 500);
    }

    #[test]
    fn test_invalid_toml_is_error() {
        assert!(Config::from_toml_str("pool_capacity = \"many\"").is_err());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let config = Config {
            pool_capacity: 0,
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_unknown_time_range_rejected() {
        let config = Config {
            github_time_range: "yearly".to_string(),
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref key, .. }) if key == "github_time_range"
        ));
    }

    #[test]
    fn test_enrichment_rate() {
        let mut config = Config::default();
        assert_eq!(config.enrichment_rate(), 2.0);
        config.enable_interpretation = false;
        assert_eq!(config.enrichment_rate(), 10.0);
    }
}
