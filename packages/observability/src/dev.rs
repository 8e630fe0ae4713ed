//! Dev-mode logging: JSONL appended to one file per machine, so the sync
//! engine can be followed with `tail -f` while the app runs.

use crate::json_layer::JsonLayer;
use crate::LogConfig;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// `~/.wellness/logs/dev.jsonl`, or the temp dir when there is no home.
pub(crate) fn default_log_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".wellness")
        .join("logs")
        .join("dev.jsonl")
}

/// Append-only log file, flushed after every line. Clones share the handle.
#[derive(Clone)]
pub struct LogFile {
    file: Arc<Mutex<BufWriter<File>>>,
}

impl LogFile {
    pub fn open(path: &Path) -> io::Result<Self> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Arc::new(Mutex::new(BufWriter::new(file))),
        })
    }
}

impl Write for LogFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut file = self.file.lock();
        let written = file.write(buf)?;
        file.flush()?;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.lock().flush()
    }
}

impl<'a> MakeWriter<'a> for LogFile {
    type Writer = LogFile;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Install the JSONL subscriber plus the optional stderr mirror.
///
/// When the log file cannot be opened, events go to stderr only.
pub fn init_dev_subscriber(config: &LogConfig) {
    let log_path = config.log_path.clone().unwrap_or_else(default_log_path);
    let (file, open_error) = match LogFile::open(&log_path) {
        Ok(file) => (Some(file), None),
        Err(err) => (None, Some(err)),
    };
    let mirror = config.also_stderr || file.is_none();

    let json_layer = file.map(|file| {
        JsonLayer::new(config.service_name.as_str(), file)
            .with_filter(filter(&config.default_level))
    });
    let stderr_layer = mirror.then(|| {
        tracing_subscriber::fmt::layer()
            .compact()
            .with_target(true)
            .with_writer(io::stderr)
            .with_filter(filter(&config.default_level))
    });

    let installed = tracing_subscriber::registry()
        .with(json_layer)
        .with(stderr_layer)
        .try_init()
        .is_ok();

    match (installed, open_error) {
        (false, _) => {}
        (true, None) => {
            tracing::info!(log_path = %log_path.display(), "Logging to file");
        }
        (true, Some(err)) => {
            tracing::warn!(log_path = %log_path.display(), error = %err, "Cannot open log file, logging to stderr");
        }
    }
}
