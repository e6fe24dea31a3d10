//! Durable chat event log
//!
//! Every relayed message leaves one line in an append-only file:
//!
//! ```text
//! [2026-10-17T14:03:11.482] [RECV] [alice]: hello
//! ```
//!
//! A line is formatted completely before it reaches the sink and written with
//! a single call, so concurrent relay loops never interleave within a record.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Local};
use tracing::warn;

use crate::errors::{ChatError, ChatResult};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

// ----------------------------------------------------------------------------
// Records
// ----------------------------------------------------------------------------

/// What kind of relay event a record describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogTag {
    /// Console line sent to the peer
    ConsoleSend,
    /// Message received from the peer
    PeerReceive,
    /// GUI message forwarded to the peer
    GuiSend,
}

impl fmt::Display for LogTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogTag::ConsoleSend => write!(f, "SEND"),
            LogTag::PeerReceive => write!(f, "RECV"),
            LogTag::GuiSend => write!(f, "GUI_SEND"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub timestamp: DateTime<Local>,
    pub tag: LogTag,
    pub text: String,
}

impl LogRecord {
    pub fn now(tag: LogTag, text: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            tag,
            text: text.into(),
        }
    }

    /// The record as one newline-terminated log line.
    ///
    /// Line breaks inside the text are written as `\n` / `\r` escapes.
    pub fn to_line(&self) -> String {
        format!(
            "[{}] [{}] {}\n",
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.tag,
            self.text.replace('\r', "\\r").replace('\n', "\\n")
        )
    }
}

// ----------------------------------------------------------------------------
// Sinks
// ----------------------------------------------------------------------------

/// Destination for log records
pub trait EventSink: Send + Sync {
    fn append(&self, record: &LogRecord) -> io::Result<()>;
}

/// Append-only log file
#[derive(Debug)]
pub struct FileEventLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileEventLog {
    /// Open `path` for appending, creating it if needed
    pub fn open(path: impl AsRef<Path>) -> ChatResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| ChatError::EventLog {
                path: path.display().to_string(),
                source,
            })?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventSink for FileEventLog {
    fn append(&self, record: &LogRecord) -> io::Result<()> {
        let line = record.to_line();
        let mut file = self
            .file
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "event log lock poisoned"))?;
        file.write_all(line.as_bytes())?;
        file.flush()
    }
}

/// Keeps records in memory
#[derive(Debug, Default)]
pub struct MemoryEventLog {
    records: Mutex<Vec<LogRecord>>,
}

impl MemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    pub fn records_tagged(&self, tag: LogTag) -> Vec<LogRecord> {
        self.records()
            .into_iter()
            .filter(|record| record.tag == tag)
            .collect()
    }
}

impl EventSink for MemoryEventLog {
    fn append(&self, record: &LogRecord) -> io::Result<()> {
        self.records
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "event log lock poisoned"))?
            .push(record.clone());
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Logger
// ----------------------------------------------------------------------------

/// Cheap, cloneable front end shared by the relay loops
#[derive(Clone)]
pub struct EventLogger {
    sink: Arc<dyn EventSink>,
}

impl EventLogger {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self { sink }
    }

    /// Append one record. A failing sink is reported and otherwise ignored.
    pub fn record(&self, tag: LogTag, text: &str) {
        let record = LogRecord::now(tag, text);
        if let Err(e) = self.sink.append(&record) {
            warn!("Failed to append {} event to log: {}", tag, e);
        }
    }
}

impl fmt::Debug for EventLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLogger").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn line_format() {
        let record = LogRecord {
            timestamp: Local.with_ymd_and_hms(2026, 10, 17, 9, 5, 3).unwrap(),
            tag: LogTag::PeerReceive,
            text: "[alice]: hello".into(),
        };
        assert_eq!(
            record.to_line(),
            "[2026-10-17T09:05:03.000] [RECV] [alice]: hello\n"
        );
    }

    #[test]
    fn embedded_line_breaks_stay_on_one_line() {
        let record = LogRecord {
            timestamp: Local.with_ymd_and_hms(2026, 10, 17, 9, 5, 3).unwrap(),
            tag: LogTag::GuiSend,
            text: "[alice]: one\ntwo\r\nthree".into(),
        };
        let line = record.to_line();
        assert_eq!(line.lines().count(), 1);
        assert!(line.ends_with("[GUI_SEND] [alice]: one\\ntwo\\r\\nthree\n"));
    }

    #[test]
    fn tags_render_distinctly() {
        assert_eq!(LogTag::ConsoleSend.to_string(), "SEND");
        assert_eq!(LogTag::PeerReceive.to_string(), "RECV");
        assert_eq!(LogTag::GuiSend.to_string(), "GUI_SEND");
    }

    #[test]
    fn file_log_appends_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ipc_log.txt");

        FileEventLog::open(&path)
            .unwrap()
            .append(&LogRecord::now(LogTag::ConsoleSend, "first"))
            .unwrap();
        let log = EventLogger::new(Arc::new(FileEventLog::open(&path).unwrap()));
        log.record(LogTag::GuiSend, "second");

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("[SEND] first"));
        assert!(lines[1].ends_with("[GUI_SEND] second"));
    }

    #[test]
    fn concurrent_appends_keep_lines_whole() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ipc_log.txt");
        let log = EventLogger::new(Arc::new(FileEventLog::open(&path).unwrap()));

        let writers: Vec<_> = (0..4)
            .map(|writer| {
                let log = log.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        log.record(LogTag::ConsoleSend, &format!("writer-{writer} message-{i}"));
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 200);
        assert!(lines
            .iter()
            .all(|line| line.starts_with('[') && line.contains("] [SEND] writer-")));
    }

    #[test]
    fn unwritable_path_is_a_setup_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = FileEventLog::open(dir.path().join("missing").join("log.txt")).unwrap_err();
        assert!(matches!(err, ChatError::EventLog { .. }));
    }
}
