use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

pub const LOG_FILE: &str = "pac-console.log";

/// Where log output goes. The interactive console owns the terminal, so it
/// never logs to stdout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    File(PathBuf),
    Stderr,
    Sink,
}

pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| {
            std::env::var("PAC_LOG_LEVEL")
                .map_err(|err| err.to_string())
                .and_then(|level| EnvFilter::try_new(level).map_err(|err| err.to_string()))
        })
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

pub fn stderr_requested() -> bool {
    matches!(
        std::env::var("PAC_LOG_STDOUT").ok().as_deref(),
        Some("1") | Some("true") | Some("TRUE") | Some("yes") | Some("YES")
    )
}

pub fn init_logging(log_dir: &Path, allow_stderr: bool) -> LogTarget {
    let filter = env_filter();
    if allow_stderr && stderr_requested() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .try_init();
        return LogTarget::Stderr;
    }
    match open_log_file(log_dir) {
        Ok((file, path)) => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init();
            LogTarget::File(path)
        }
        Err(_) => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(io::sink)
                .try_init();
            LogTarget::Sink
        }
    }
}

fn open_log_file(log_dir: &Path) -> io::Result<(fs::File, PathBuf)> {
    fs::create_dir_all(log_dir)?;
    let path = log_dir.join(LOG_FILE);
    let file = OpenOptions::new().create(true).append(true).open(&path)?;
    Ok((file, path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_file_is_created_under_the_log_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("state/pac");
        let (_file, path) = open_log_file(&nested).unwrap();
        assert_eq!(path, nested.join(LOG_FILE));
        assert!(path.exists());
    }

    #[test]
    fn unwritable_log_dir_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "x").unwrap();
        assert!(open_log_file(&blocker.join("pac")).is_err());
    }
}
