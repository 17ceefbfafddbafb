mod cli;
mod config;
mod error;
mod package_manager;
mod report;
mod tui;

use anyhow::Result;
use clap::Parser;
use package_manager::{PackageManager, PackageService};
use std::fs::{self, OpenOptions};

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();
    init_logging(args.command.is_none());

    // 加载配置
    let config = config::Config::load_or_default()?;
    let service = PackageService::new(PackageManager::from_config(&config), config.refresh_delay());

    match args.command {
        None => tui::run(service).await,
        Some(command) => {
            let ok = cli::run(command, service).await;
            if !ok {
                std::process::exit(1);
            }
            Ok(())
        }
    }
}

/// TUI 模式下日志写入文件，避免破坏备用屏幕；命令行模式写到 stderr
fn init_logging(to_file: bool) {
    let default_level = if to_file { "info" } else { "warn" };
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level));

    if to_file {
        let dir = config::Config::log_dir();
        let file = fs::create_dir_all(&dir).and_then(|_| {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(dir.join("lian-winget.log"))
        });
        match file {
            Ok(file) => {
                builder.target(env_logger::Target::Pipe(Box::new(file)));
            }
            Err(_) => {
                // 无法写日志文件时关闭日志，stderr 会被 TUI 覆盖
                builder.filter_level(log::LevelFilter::Off);
            }
        }
    }

    builder.init();
}
