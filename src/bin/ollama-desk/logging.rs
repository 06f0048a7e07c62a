use std::path::{Path, PathBuf};

use flexi_logger::{
    Cleanup, Criterion, Duplicate, FileSpec, Logger, LoggerHandle, Naming, WriteMode,
};

use crate::config::{ConfigPaths, LoggingConfig};

const DEFAULT_LOG_FILE: &str = "ollama-desk.log";

/// Starts the file logger. The returned handle must stay alive until exit
/// so buffered records reach the file.
pub fn init_logging(config: &LoggingConfig, paths: &ConfigPaths) -> anyhow::Result<LoggerHandle> {
    let log_path = resolve_log_path(config, paths);
    let directory = log_path
        .parent()
        .map_or_else(|| paths.logs_dir.clone(), Path::to_path_buf);
    let basename = log_path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("ollama-desk")
        .to_string();
    std::fs::create_dir_all(&directory)?;

    let handle = Logger::try_with_env_or_str(&config.level)?
        .log_to_file(FileSpec::default().directory(directory).basename(basename))
        .write_mode(WriteMode::BufferAndFlush)
        .duplicate_to_stderr(Duplicate::Error)
        .rotate(
            Criterion::Size(config.rotate_size),
            Naming::Numbers,
            Cleanup::KeepLogFiles(config.rotate_keep),
        )
        .start()?;
    Ok(handle)
}

fn resolve_log_path(config: &LoggingConfig, paths: &ConfigPaths) -> PathBuf {
    match &config.path {
        Some(path) => PathBuf::from(path),
        None => paths.logs_dir.join(DEFAULT_LOG_FILE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths() -> ConfigPaths {
        ConfigPaths {
            config_file: PathBuf::from("/cfg/config.toml"),
            logs_dir: PathBuf::from("/logs"),
        }
    }

    #[test]
    fn defaults_to_file_in_logs_dir() {
        let config = LoggingConfig::default();
        assert_eq!(
            resolve_log_path(&config, &paths()),
            PathBuf::from("/logs/ollama-desk.log")
        );
    }

    #[test]
    fn configured_path_wins() {
        let config = LoggingConfig {
            path: Some("/tmp/desk/run.log".into()),
            ..LoggingConfig::default()
        };
        assert_eq!(
            resolve_log_path(&config, &paths()),
            PathBuf::from("/tmp/desk/run.log")
        );
    }
}
