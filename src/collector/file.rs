//! File-backed record collection.
//!
//! The header row is read synchronously when the file is opened so that field
//! positions can be resolved before the scan starts. Rows are then read on a
//! background thread and delivered over a bounded channel.

use crate::collector::delimited::split_line;
use crate::collector::headers::Headers;
use crate::collector::types::Record;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;

/// Capacity of the channel between the reader thread and the scan loop.
const CHANNEL_CAPACITY: usize = 10_000;

/// Something the reader thread observed.
#[derive(Debug, Clone)]
pub enum CollectorEvent {
    /// A well-formed row.
    Record(Record),
    /// A row that could not be split into the expected number of fields.
    Malformed { line: usize, reason: String },
    /// End of file; no further events follow.
    Finished,
}

/// Errors that can occur while opening or starting a collector.
#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("collector is already running")]
    AlreadyRunning,
    #[error("cannot open {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{0:?} contains no header row")]
    MissingHeader(PathBuf),
    #[error("collector has already been drained")]
    Exhausted,
}

/// Reads position reports from a delimited file.
pub struct FileCollector {
    path: PathBuf,
    headers: Headers,
    lines: Option<(Lines<BufReader<File>>, usize)>,
    sender: Sender<CollectorEvent>,
    receiver: Receiver<CollectorEvent>,
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl FileCollector {
    /// Open `path` and read its header row.
    ///
    /// Lines starting with `#` and blank lines before the header are skipped.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CollectorError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|source| CollectorError::Open {
            path: path.clone(),
            source,
        })?;
        let mut lines = BufReader::new(file).lines();
        let mut line_number = 0;

        let headers = loop {
            line_number += 1;
            match lines.next() {
                Some(Ok(line)) if is_skippable(&line) => continue,
                Some(Ok(line)) => match split_line(&line) {
                    Some(fields) => {
                        let names = fields.into_iter().map(|f| f.trim().to_string()).collect();
                        break Headers::new(names);
                    }
                    None => return Err(CollectorError::MissingHeader(path)),
                },
                Some(Err(source)) => return Err(CollectorError::Open { path, source }),
                None => return Err(CollectorError::MissingHeader(path)),
            }
        };

        let (sender, receiver) = bounded(CHANNEL_CAPACITY);
        Ok(Self {
            path,
            headers,
            lines: Some((lines, line_number)),
            sender,
            receiver,
            running: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The header registry read from the first row.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Start reading rows on a background thread.
    pub fn start(&mut self) -> Result<(), CollectorError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(CollectorError::AlreadyRunning);
        }
        let (lines, line_number) = self.lines.take().ok_or(CollectorError::Exhausted)?;

        self.running.store(true, Ordering::SeqCst);

        let sender = self.sender.clone();
        let running = self.running.clone();
        let arity = self.headers.len();

        let handle = thread::spawn(move || {
            run_reader(lines, line_number, arity, &sender, &running);
            running.store(false, Ordering::SeqCst);
            let _ = sender.send(CollectorEvent::Finished);
        });

        self.thread_handle = Some(handle);
        Ok(())
    }

    /// Stop reading. Rows already queued stay in the channel.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        // Unblock a reader waiting on a full channel.
        while self.receiver.try_recv().is_ok() {}
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }

    /// Check if the reader thread is still producing rows.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Get the receiver for collected events.
    pub fn receiver(&self) -> &Receiver<CollectorEvent> {
        &self.receiver
    }

    /// Try to receive an event without blocking.
    pub fn try_recv(&self) -> Option<CollectorEvent> {
        self.receiver.try_recv().ok()
    }
}

impl Drop for FileCollector {
    fn drop(&mut self) {
        self.stop();
    }
}

fn is_skippable(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty() || trimmed.starts_with('#')
}

fn run_reader(
    lines: Lines<BufReader<File>>,
    mut line_number: usize,
    arity: usize,
    sender: &Sender<CollectorEvent>,
    running: &AtomicBool,
) {
    for line in lines {
        line_number += 1;
        if !running.load(Ordering::SeqCst) {
            return;
        }

        let event = match line {
            Ok(line) if is_skippable(&line) => continue,
            Ok(line) => match split_line(&line) {
                Some(fields) if fields.len() == arity => CollectorEvent::Record(Record::new(fields)),
                Some(fields) => CollectorEvent::Malformed {
                    line: line_number,
                    reason: format!("expected {arity} fields, found {}", fields.len()),
                },
                None => CollectorEvent::Malformed {
                    line: line_number,
                    reason: "unterminated quoted field".to_string(),
                },
            },
            Err(e) => CollectorEvent::Malformed {
                line: line_number,
                reason: e.to_string(),
            },
        };

        if !send_while_running(sender, event, running) {
            return;
        }
    }
}

/// Block on a full channel, but give up once the collector is stopped.
fn send_while_running(
    sender: &Sender<CollectorEvent>,
    mut event: CollectorEvent,
    running: &AtomicBool,
) -> bool {
    loop {
        match sender.send_timeout(event, Duration::from_millis(100)) {
            Ok(()) => return true,
            Err(crossbeam_channel::SendTimeoutError::Timeout(e)) => {
                if !running.load(Ordering::SeqCst) {
                    return false;
                }
                event = e;
            }
            Err(crossbeam_channel::SendTimeoutError::Disconnected(_)) => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    fn drain(collector: &FileCollector) -> Vec<CollectorEvent> {
        let mut events = Vec::new();
        loop {
            let event = collector
                .receiver()
                .recv_timeout(Duration::from_secs(5))
                .unwrap();
            if matches!(event, CollectorEvent::Finished) {
                return events;
            }
            events.push(event);
        }
    }

    #[test]
    fn test_reads_header_and_rows() {
        let file = write_file(
            "# comment line\n\
             MMSI,BaseDateTime,LAT,LON\n\
             1,2017-12-01T00:00:01,31.9,-76.3\n\
             \n\
             2,2017-12-01T00:00:02,42.8,-73.7\n",
        );
        let mut collector = FileCollector::open(file.path()).unwrap();
        assert_eq!(collector.headers().contains("LON"), Some(3));

        collector.start().unwrap();
        let events = drain(&collector);
        assert_eq!(events.len(), 2);
        match &events[1] {
            CollectorEvent::Record(r) => assert_eq!(r.field(0), Some("2")),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_reports_wrong_arity() {
        let file = write_file("A,B,C\n1,2,3\n1,2\n");
        let mut collector = FileCollector::open(file.path()).unwrap();
        collector.start().unwrap();
        let events = drain(&collector);
        assert_eq!(events.len(), 2);
        match &events[1] {
            CollectorEvent::Malformed { line, reason } => {
                assert_eq!(*line, 3);
                assert!(reason.contains("expected 3"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_missing_header() {
        let file = write_file("# only comments\n\n");
        assert!(matches!(
            FileCollector::open(file.path()),
            Err(CollectorError::MissingHeader(_))
        ));
    }

    #[test]
    fn test_start_twice() {
        let file = write_file("A\n1\n");
        let mut collector = FileCollector::open(file.path()).unwrap();
        collector.start().unwrap();
        let _ = drain(&collector);
        collector.stop();
        assert!(matches!(collector.start(), Err(CollectorError::Exhausted)));
    }
}
