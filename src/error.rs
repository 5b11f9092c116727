use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 浏览器相关错误
    #[error("浏览器错误: {0}")]
    Browser(#[from] BrowserError),
    /// 解读抓取错误
    #[error("解读抓取错误: {0}")]
    Fetch(#[from] FetchError),
    /// 数据源错误
    #[error("数据源错误: {0}")]
    Source(#[from] SourceError),
    /// 导出错误
    #[error("导出错误: {0}")]
    Export(#[from] ExportError),
    /// LLM 服务错误
    #[error("LLM错误: {0}")]
    Llm(#[from] LlmError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 其他错误（用于包装第三方库错误）
    #[error("错误: {0}")]
    Other(String),
}

/// 浏览器相关错误
///
/// 所有等待都有上限，超时也只是一种普通失败，交给上层重试。
#[derive(Debug, Clone, Error)]
pub enum BrowserError {
    /// 浏览器配置失败
    #[error("浏览器配置失败: {0}")]
    ConfigurationFailed(String),
    /// 启动浏览器失败
    #[error("启动浏览器失败: {0}")]
    LaunchFailed(String),
    /// 创建页面失败
    #[error("创建页面失败: {0}")]
    PageCreationFailed(String),
    /// 导航失败
    #[error("导航到 {url} 失败: {reason}")]
    NavigationFailed { url: String, reason: String },
    /// 等待超时
    #[error("等待{what}超时 ({timeout_ms}ms)")]
    Timeout { what: String, timeout_ms: u64 },
    /// 元素不存在
    #[error("未找到元素: {selector}")]
    ElementNotFound { selector: String },
    /// 执行脚本失败
    #[error("执行脚本失败: {0}")]
    ScriptFailed(String),
    /// 页面已关闭
    #[error("页面已关闭")]
    PageClosed,
    /// 页面池已关闭
    #[error("浏览器页面池已关闭")]
    Shutdown,
}

impl BrowserError {
    /// 创建超时错误
    pub fn timeout(what: impl Into<String>, timeout: std::time::Duration) -> Self {
        BrowserError::Timeout {
            what: what.into(),
            timeout_ms: timeout.as_millis() as u64,
        }
    }
}

impl From<chromiumoxide::error::CdpError> for BrowserError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        BrowserError::ScriptFailed(err.to_string())
    }
}

/// 解读抓取错误
#[derive(Debug, Error)]
pub enum FetchError {
    /// 重试耗尽，携带最后一次失败原因
    #[error("获取解读失败 ({document_id})，共尝试 {attempts} 次，最后一次错误: {last_error}")]
    RetriesExhausted {
        document_id: String,
        attempts: u32,
        #[source]
        last_error: BrowserError,
    },
    /// 文档 ID 为空
    #[error("文档ID不能为空")]
    EmptyDocumentId,
}

/// 数据源错误
#[derive(Debug, Error)]
pub enum SourceError {
    /// 网络请求失败
    #[error("请求失败 ({endpoint}): {source}")]
    RequestFailed {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    /// 返回非成功状态码
    #[error("请求返回错误状态 ({endpoint}): {status}")]
    BadStatus { endpoint: String, status: u16 },
    /// 页面结构无法解析
    #[error("解析失败 ({endpoint}): {reason}")]
    ParseFailed { endpoint: String, reason: String },
}

/// 导出错误
#[derive(Debug, Error)]
pub enum ExportError {
    /// 写入文件失败
    #[error("写入文件失败 ({path}): {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 创建目录失败
    #[error("创建目录失败 ({path}): {source}")]
    CreateDirFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 读取目录失败
    #[error("读取目录失败 ({path}): {source}")]
    ReadDirFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 序列化失败
    #[error("序列化失败: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// LLM 服务错误
#[derive(Debug, Error)]
pub enum LlmError {
    /// API 调用失败
    #[error("LLM API调用失败 (模型: {model}): {reason}")]
    ApiCallFailed { model: String, reason: String },
    /// 请求构建失败
    #[error("构建LLM请求失败: {0}")]
    RequestBuildFailed(String),
    /// 返回内容为空
    #[error("LLM返回内容为空 (模型: {model})")]
    EmptyContent { model: String },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 读取配置文件失败
    #[error("读取配置文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    /// 配置值非法
    #[error("配置项 {key} 的值非法: {reason}")]
    InvalidValue { key: String, reason: String },
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_retries_exhausted_mentions_last_cause() {
        let err = FetchError::RetriesExhausted {
            document_id: "2401.00001".to_string(),
            attempts: 3,
            last_error: BrowserError::timeout("元素 #kimi-2401\\.00001", Duration::from_millis(1000)),
        };
        let msg = err.to_string();
        assert!(msg.contains("2401.00001"));
        assert!(msg.contains("超时"));
        assert!(msg.contains("1000ms"));
    }

    #[test]
    fn test_app_error_wraps_layers() {
        let err: AppError = BrowserError::PageClosed.into();
        assert_eq!(err.to_string(), "浏览器错误: 页面已关闭");
    }
}
