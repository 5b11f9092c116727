/// 日志工具模块
///
/// 提供日志初始化以及格式化输出的辅助函数
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::models::PipelineResult;

/// 初始化 tracing 日志
///
/// `RUST_LOG` 优先，其次使用配置中的级别。重复调用是安全的（测试中会多次调用）。
pub fn init(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录程序启动信息
///
/// # 参数
/// - `pipelines`: 将要运行的流水线名称
/// - `mode`: 运行模式描述
pub fn log_startup(pipelines: &[String], mode: &str) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - {}", mode);
    info!("📋 流水线: {}", pipelines.join(", "));
    info!(
        "🕐 启动时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
}

/// 记录单条流水线的执行结果
pub fn log_pipeline_result(name: &str, result: &PipelineResult) {
    info!("\n{}", "─".repeat(60));
    if result.success {
        info!(
            "✓ [{}] 完成: {} 条数据, {} 个导出, 耗时 {}ms",
            name,
            result.items.len(),
            result.export_results.len(),
            result.duration_ms
        );
    } else {
        info!(
            "✗ [{}] 失败: {} 个错误, 耗时 {}ms",
            name,
            result.errors.len(),
            result.duration_ms
        );
        for error in &result.errors {
            info!("   - {}", error);
        }
    }
    info!("{}", "─".repeat(60));
}

/// 打印最终统计信息
///
/// # 参数
/// - `success`: 成功数量
/// - `failed`: 失败数量
/// - `total`: 总数
pub fn print_final_stats(success: usize, failed: usize, total: usize) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部流水线完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 成功: {}/{}", success, total);
    info!("❌ 失败: {}", failed);
    info!("{}", "=".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度（按字符计）
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
