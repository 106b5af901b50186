//! Tracing subscriber setup
//!
//! Console output stays quiet by default so log lines do not fight the
//! progress bars. `--debug` sends structured JSON logs to a timestamped file
//! instead, and `--json` keeps stdout clean for machine-readable output.

use std::path::Path;
use tracing_subscriber::EnvFilter;

const DEBUG_FILTER: &str = "info,provision=debug,provision_provisioner=debug,provision_progress=debug";

/// Install the global subscriber.
///
/// `filter` is used when `RUST_LOG` is unset.
pub fn init_tracing(json_mode: bool, debug_flag: bool, filter: &str, log_dir: &Path) {
    let debug_enabled = std::env::var("RUST_LOG").is_ok() || debug_flag;

    if debug_enabled {
        match create_log_file(log_dir) {
            Ok((file, path)) => {
                tracing_subscriber::fmt()
                    .json()
                    .with_writer(file)
                    .with_env_filter(env_filter(DEBUG_FILTER))
                    .init();
                if !json_mode {
                    eprintln!("Debug logging enabled: {}", path.display());
                }
                return;
            }
            Err(e) => {
                if !json_mode {
                    eprintln!("Warning: Failed to create log file: {e}");
                }
            }
        }
    }

    if json_mode {
        // Nothing may reach the terminal besides the JSON document
        tracing_subscriber::fmt()
            .with_writer(std::io::sink)
            .with_env_filter("off")
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(env_filter(filter))
            .init();
    }
}

fn env_filter(fallback: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

fn create_log_file(log_dir: &Path) -> std::io::Result<(std::fs::File, std::path::PathBuf)> {
    std::fs::create_dir_all(log_dir)?;
    let path = log_dir.join(log_file_name(chrono::Utc::now()));
    let file = std::fs::File::create(&path)?;
    Ok((file, path))
}

fn log_file_name(now: chrono::DateTime<chrono::Utc>) -> String {
    format!("provision-{}.log", now.format("%Y%m%d-%H%M%S"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_log_file_name() {
        let now = chrono::Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(log_file_name(now), "provision-20240309-070501.log");
    }

    #[test]
    fn test_create_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("nested").join("logs");
        let (_file, path) = create_log_file(&logs).unwrap();
        assert!(path.exists());
        assert_eq!(path.parent(), Some(logs.as_path()));
    }
}
