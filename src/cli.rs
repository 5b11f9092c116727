//! 命令行参数

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::orchestrator::RunMode;

#[derive(Parser, Debug)]
#[command(name = "paper_digest")]
#[command(version, about = "论文聚合流水线：抓取、翻译、收集解读并导出")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// TOML 配置文件，未指定时只读取环境变量
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// 抓取 → 富化 → 导出 → 索引（默认）
    Run,
    /// 只触发远端解读生成，稍后再运行完整模式收集
    Trigger,
}

impl Cli {
    pub fn mode(&self) -> RunMode {
        match self.command {
            Some(Command::Trigger) => RunMode::TriggerOnly,
            Some(Command::Run) | None => RunMode::Full,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_full_run() {
        let cli = Cli::try_parse_from(["paper_digest"]).unwrap();
        assert_eq!(cli.mode(), RunMode::Full);
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_trigger_with_config() {
        let cli =
            Cli::try_parse_from(["paper_digest", "trigger", "--config", "digest.toml"]).unwrap();
        assert_eq!(cli.mode(), RunMode::TriggerOnly);
        assert_eq!(cli.config, Some(PathBuf::from("digest.toml")));

        let cli = Cli::try_parse_from(["paper_digest", "--config", "a.toml", "run"]).unwrap();
        assert_eq!(cli.mode(), RunMode::Full);
        assert_eq!(cli.config, Some(PathBuf::from("a.toml")));
    }

    #[test]
    fn test_rejects_unknown_arguments() {
        assert!(Cli::try_parse_from(["paper_digest", "--trigger"]).is_err());
        assert!(Cli::try_parse_from(["paper_digest", "triger"]).is_err());
        assert!(Cli::try_parse_from(["paper_digest", "--config"]).is_err());
    }
}
