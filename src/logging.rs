use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use env_logger::{Builder, Env, Target};

use crate::app_dirs::AppDirs;

/// Route the `log` facade into a file so log lines never land on the TUI.
///
/// `level` wins over `RUST_LOG`; without either only warnings are kept.
pub fn init(level: Option<&str>) -> io::Result<PathBuf> {
    let path = AppDirs::log_path().unwrap_or_else(|| PathBuf::from("keyglow.log"));
    init_at(&path, level)?;
    Ok(path)
}

pub fn init_at(path: &Path, level: Option<&str>) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;

    let mut builder = Builder::from_env(Env::default().default_filter_or("warn"));
    if let Some(level) = level {
        builder.parse_filters(level);
    }
    builder
        .target(Target::Pipe(Box::new(file)))
        .format_timestamp_millis()
        .try_init()
        .map_err(|e| io::Error::new(io::ErrorKind::AlreadyExists, e))
}
