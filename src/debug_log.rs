//! Session-owned diagnostic log.
//!
//! Entries are ordinary leveled `tracing` events. While the log file is open,
//! they are rendered by a `tracing_subscriber::fmt` subscriber scoped to the
//! session, one line per event, written straight to the unbuffered file so
//! ordering survives an abrupt exit. Without a file they fall through to
//! whatever subscriber the process installed.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{dispatcher, info, Dispatch, Level};

const OPENING_BANNER: &str = "---------- AudioSession | Debug Log Starts ----------";
const CLOSING_BANNER: &str = "---------- AudioSession | Debug Log Ends ----------";

/// Plain-text diagnostic sink for one session
pub struct SessionLog {
    path: PathBuf,
    sink: Option<Dispatch>,
}

impl SessionLog {
    /// Open the log file and write the opening banner.
    ///
    /// The file is truncated unless `append` is set. Failing to open it is not
    /// an error: a notice goes to stdout and the log runs without a file sink.
    pub fn open(path: impl AsRef<Path>, append: bool, max_level: Level) -> Self {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(&path);

        let sink = match file {
            Ok(file) => {
                let subscriber = tracing_subscriber::fmt()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_target(false)
                    .with_max_level(max_level)
                    .finish();
                Some(Dispatch::new(subscriber))
            }
            Err(err) => {
                println!(
                    "\nNot able to open audio session debug log {}: {}\n",
                    path.display(),
                    err
                );
                None
            }
        };

        let log = Self { path, sink };
        log.emit(|| info!("{}", OPENING_BANNER));
        log
    }

    /// Whether entries are currently written to the log file
    pub fn is_open(&self) -> bool {
        self.sink.is_some()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `event` with this log as the active subscriber.
    ///
    /// ```ignore
    /// log.emit(|| tracing::info!(path = %path.display(), "wav file loaded"));
    /// ```
    pub fn emit<T>(&self, event: impl FnOnce() -> T) -> T {
        match &self.sink {
            Some(dispatch) => dispatcher::with_default(dispatch, event),
            None => event(),
        }
    }

    /// Write the closing banner and close the file. No-op once closed.
    pub fn close(&mut self) {
        if self.sink.is_some() {
            self.emit(|| info!("{}", CLOSING_BANNER));
            // Dropping the only dispatch handle drops the subscriber and its file.
            self.sink = None;
        }
    }
}

impl Drop for SessionLog {
    fn drop(&mut self) {
        self.close();
    }
}
