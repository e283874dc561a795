use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use gtidflow_config::{LogConfig, Rotation};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{self, RollingFileAppender};
use tracing_subscriber::EnvFilter;

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over the configured level. When logging to a
/// file the returned guard must live until the process exits, or buffered
/// lines are lost.
pub fn init(config: &LogConfig) -> Result<Option<WorkerGuard>> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)
            .with_context(|| format!("Invalid log level '{}'", config.level))?,
    };

    if config.is_stdout() {
        tracing_subscriber::fmt().with_env_filter(filter).init();
        return Ok(None);
    }

    let (directory, prefix) = file_location(&config.output);
    let appender = RollingFileAppender::builder()
        .rotation(rotation(config.rotation))
        .filename_prefix(prefix)
        .max_log_files(config.max_files.max(1))
        .build(&directory)
        .with_context(|| format!("Failed to open log directory {}", directory.display()))?;

    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();

    Ok(Some(guard))
}

/// Plain stdout logging for commands that run without a config file.
pub fn init_default() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

fn rotation(rotation: Rotation) -> rolling::Rotation {
    match rotation {
        Rotation::Minutely => rolling::Rotation::MINUTELY,
        Rotation::Hourly => rolling::Rotation::HOURLY,
        Rotation::Daily => rolling::Rotation::DAILY,
        Rotation::Never => rolling::Rotation::NEVER,
    }
}

/// Split `log/agent.log` into the directory and the file name prefix.
fn file_location(output: &str) -> (PathBuf, String) {
    let path = Path::new(output);
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let prefix = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "gtidflow.log".to_string());
    (directory, prefix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_location() {
        assert_eq!(
            file_location("log/agent.log"),
            (PathBuf::from("log"), "agent.log".to_string())
        );
        assert_eq!(
            file_location("agent.log"),
            (PathBuf::from("."), "agent.log".to_string())
        );
    }

    #[test]
    fn test_rotation_mapping() {
        assert_eq!(rotation(Rotation::Hourly), rolling::Rotation::HOURLY);
        assert_eq!(rotation(Rotation::Never), rolling::Rotation::NEVER);
    }
}
