use anyhow::{Context, Result};
use clap::{Arg, Command};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use analytics::app::{AppMode, Application};
use analytics::config::AppConfig;
use analytics::shutdown::ShutdownManager;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    // 解析命令行参数
    let matches = Command::new("analytics")
        .version("1.0.0")
        .about("学习分析预计算与缓存服务")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("配置文件路径")
                .default_value("config/analytics"),
        )
        .arg(
            Arg::new("mode")
                .short('m')
                .long("mode")
                .value_name("MODE")
                .help("运行模式")
                .value_parser(["api", "worker", "all"])
                .default_value("all"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("日志级别")
                .value_parser(["trace", "debug", "info", "warn", "error"])
                .default_value("info"),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .help("日志格式")
                .value_parser(["json", "pretty"])
                .default_value("pretty"),
        )
        .get_matches();

    let config_path = matches.get_one::<String>("config").unwrap();
    let mode_str = matches.get_one::<String>("mode").unwrap();
    let log_level = matches.get_one::<String>("log-level").unwrap();
    let log_format = matches.get_one::<String>("log-format").unwrap();

    // 初始化日志系统
    init_logging(log_level, log_format)?;

    info!("启动学习分析服务");
    info!("配置文件: {config_path}");
    info!("运行模式: {mode_str}");

    let mode = AppMode::parse(mode_str)
        .with_context(|| format!("无效的运行模式: {mode_str}"))?;
    let config = AppConfig::load(config_path)?;

    let app = Application::new(config, mode).await?;

    // 关闭信号管理
    let shutdown_manager = Arc::new(ShutdownManager::new());
    let shutdown_rx = shutdown_manager.subscribe();
    {
        let shutdown_manager = shutdown_manager.clone();
        tokio::spawn(async move {
            shutdown_manager.listen_for_signals().await;
        });
    }

    app.run(shutdown_rx).await?;

    info!("学习分析服务已退出");
    Ok(())
}

/// 初始化tracing日志
fn init_logging(level: &str, format: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("analytics={level},info")));

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()
                .context("初始化日志失败")?;
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .try_init()
                .context("初始化日志失败")?;
        }
    }

    Ok(())
}
