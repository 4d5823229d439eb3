//! 日志基础设施

use std::io;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::infrastructure::config::LoggingConfig;

/// 初始化日志系统
///
/// 控制台始终输出；配置了 `log_path` 时额外写入按日期分割的文件。
/// 环境变量 `RUST_LOG` 优先于配置中的日志级别。
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match &config.log_path {
        Some(log_dir) => {
            std::fs::create_dir_all(log_dir)?;

            let file_appender = rolling::daily(log_dir, &config.file_prefix);
            let (writer, guard) = non_blocking(file_appender);

            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_writer(writer)
                        .with_ansi(false)
                        .with_target(false)
                        .with_thread_names(true),
                )
                .with(fmt::layer().with_writer(io::stdout).with_ansi(true))
                .try_init()?;

            // guard 需要与进程同寿命
            std::mem::forget(guard);
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(io::stdout).with_ansi(true))
                .try_init()?;
        }
    }

    Ok(())
}

/// 便捷函数：只输出到控制台
pub fn init_default_logging() -> anyhow::Result<()> {
    init_logging(&LoggingConfig::default())
}
