use anyhow::{Context, Result};
use clap::Parser;
use paper_digest::utils::logging;
use paper_digest::{App, Cli, Config};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 加载配置
    let config = match &cli.config {
        Some(path) => Config::load(path).context("加载配置文件失败")?,
        None => Config::from_env(),
    };

    // 初始化日志
    logging::init(&config.log_level);

    // 初始化并运行应用
    let app = App::initialize(config)?;
    let results = app.run(cli.mode()).await;
    app.shutdown().await;

    if results.iter().any(|r| !r.success) {
        std::process::exit(1);
    }
    Ok(())
}
