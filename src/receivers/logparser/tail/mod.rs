// SPDX-License-Identifier: Apache-2.0

//! Follow a single file and stream its new lines.
//!
//! Each [`TailSession`] owns a dedicated OS thread that holds the file handle
//! and its change watch. The thread reads appended lines, reopens the path
//! when the file is rotated, rewinds when it is truncated, and pushes
//! [`TailEvent`]s into a bounded channel until the session is stopped.

mod file_id;
mod reader;
mod watcher;

pub use file_id::FileId;
pub use watcher::WatchMode;

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::bounded_channel::{self, BoundedReceiver, BoundedSender, TrySendError};
use crate::receivers::logparser::error::TailError;
use reader::LineReader;
use watcher::ChangeWaiter;

/// Where to start reading a newly opened file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StartAt {
    Beginning,
    #[default]
    End,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TailConfig {
    pub start_at: StartAt,
    pub watch_mode: WatchMode,
    /// Upper bound on how long the reader sleeps between checks
    pub poll_interval: Duration,
    /// Lines longer than this many characters are truncated
    pub max_line_size: usize,
    /// Events buffered between the reader thread and its consumer
    pub channel_size: usize,
}

impl Default for TailConfig {
    fn default() -> Self {
        Self {
            start_at: StartAt::End,
            watch_mode: WatchMode::Auto,
            poll_interval: Duration::from_millis(250),
            max_line_size: 65536,
            channel_size: 1000,
        }
    }
}

/// One item from a followed file.
#[derive(Debug)]
pub enum TailEvent {
    Line(String),
    Error(io::Error),
}

/// A followed file.
///
/// Lifecycle: [`TailSession::open`] starts following, [`TailSession::stop`]
/// asks the reader thread to finish, [`TailSession::cleanup`] waits for it and
/// releases the file. The event stream closes once the thread has exited.
pub struct TailSession {
    path: PathBuf,
    stop: Arc<AtomicBool>,
    events: Option<BoundedReceiver<TailEvent>>,
    handle: Option<JoinHandle<()>>,
}

impl TailSession {
    /// Open `path` and start following it.
    ///
    /// The file is opened (and positioned) before this returns, so a missing
    /// or unreadable file is reported here rather than on the event stream.
    pub fn open(path: impl AsRef<Path>, config: &TailConfig) -> Result<Self, TailError> {
        let path = path.as_ref().to_path_buf();
        let reader = LineReader::open(&path, config.start_at, config.max_line_size)?;
        let waiter =
            ChangeWaiter::new(config.watch_mode, &path, config.poll_interval).map_err(|e| {
                TailError::Watch {
                    path: path.clone(),
                    source: e,
                }
            })?;

        let (tx, rx) = bounded_channel::bounded(config.channel_size.max(1));
        let stop = Arc::new(AtomicBool::new(false));

        let follower = Follower {
            reader,
            waiter,
            tx,
            stop: stop.clone(),
            send_timeout: config.poll_interval,
            max_line_size: config.max_line_size,
        };

        let name = path
            .file_name()
            .map(|n| format!("tail-{}", n.to_string_lossy()))
            .unwrap_or_else(|| "tail".to_string());
        let handle = std::thread::Builder::new()
            .name(name)
            .spawn(move || follower.run())
            .map_err(|source| TailError::Open {
                path: path.clone(),
                source,
            })?;

        debug!(path = %path.display(), start_at = ?config.start_at, "Started tailing file");

        Ok(Self {
            path,
            stop,
            events: Some(rx),
            handle: Some(handle),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Take the event stream. Returns `None` if it was already taken.
    pub fn take_events(&mut self) -> Option<BoundedReceiver<TailEvent>> {
        self.events.take()
    }

    /// Ask the reader thread to stop. Idempotent.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// Wait for the reader thread to exit, releasing the file and its watch.
    /// Blocks; call from a blocking context after [`TailSession::stop`].
    pub fn cleanup(&mut self) -> Result<(), TailError> {
        self.stop();
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| TailError::ThreadPanicked(self.path.clone())),
            None => Ok(()),
        }
    }

    /// True once cleanup has joined the reader thread.
    pub fn is_released(&self) -> bool {
        self.handle.is_none()
    }
}

impl Drop for TailSession {
    fn drop(&mut self) {
        // The thread notices within one poll interval and exits on its own.
        self.stop();
    }
}

struct Follower {
    reader: LineReader,
    waiter: ChangeWaiter,
    tx: BoundedSender<TailEvent>,
    stop: Arc<AtomicBool>,
    send_timeout: Duration,
    max_line_size: usize,
}

impl Follower {
    fn run(mut self) {
        let mut lines = Vec::new();

        while !self.stopped() {
            lines.clear();
            let read = self.reader.read_lines(&mut lines);
            for line in lines.drain(..) {
                if !self.send(TailEvent::Line(line)) {
                    return;
                }
            }
            if let Err(e) = read {
                if !self.send(TailEvent::Error(e)) {
                    return;
                }
                self.waiter.wait();
                continue;
            }

            match self.check_replaced() {
                Ok(true) => continue,
                Ok(false) => {}
                Err(e) => {
                    if !self.send(TailEvent::Error(e)) {
                        return;
                    }
                }
            }

            self.waiter.wait();
        }

        debug!(path = %self.reader.path().display(), offset = self.reader.offset(), "Stopped tailing file");
    }

    /// Detect rotation or truncation at EOF. Returns true when reading
    /// should resume immediately from a new position.
    fn check_replaced(&mut self) -> io::Result<bool> {
        let current = match FileId::from_path(self.reader.path()) {
            Ok(id) => id,
            // Rotated away and not yet recreated
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e),
        };

        if current.is_some() && current != self.reader.id() {
            // The old file is fully read; anything left is a final unterminated line.
            if let Some(partial) = self.reader.flush_partial() {
                if !self.send(TailEvent::Line(partial)) {
                    return Ok(false);
                }
            }

            let path = self.reader.path().to_path_buf();
            match LineReader::open(&path, StartAt::Beginning, self.max_line_size) {
                Ok(reader) => {
                    info!(path = %path.display(), "File rotated, reopening");
                    self.reader = reader;
                    return Ok(true);
                }
                Err(TailError::Open { source, .. }) | Err(TailError::Seek { source, .. }) => {
                    return Err(source);
                }
                Err(e) => return Err(io::Error::other(e.to_string())),
            }
        }

        if self.reader.rewind_if_truncated()? {
            warn!(path = %self.reader.path().display(), "File truncated, reading from the beginning");
            return Ok(true);
        }
        Ok(false)
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// Deliver an event, waiting for capacity. Returns false when the session
    /// is stopping or nobody is listening any more.
    fn send(&self, mut event: TailEvent) -> bool {
        loop {
            if self.stopped() {
                return false;
            }
            match self.tx.send_timeout(event, self.send_timeout) {
                Ok(()) => return true,
                Err(TrySendError::Full(returned)) => event = returned,
                Err(TrySendError::Disconnected) => return false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, OpenOptions};
    use std::io::Write;
    use tempfile::TempDir;

    fn poll_config(start_at: StartAt) -> TailConfig {
        TailConfig {
            start_at,
            watch_mode: WatchMode::Poll,
            poll_interval: Duration::from_millis(20),
            ..Default::default()
        }
    }

    fn append(path: &Path, data: &str) {
        let mut f = OpenOptions::new().append(true).open(path).unwrap();
        f.write_all(data.as_bytes()).unwrap();
    }

    fn next_line(rx: &BoundedReceiver<TailEvent>) -> String {
        match rx.recv_timeout(Duration::from_secs(5)) {
            Ok(Some(TailEvent::Line(line))) => line,
            other => panic!("expected a line, got {:?}", other),
        }
    }

    #[test]
    fn test_follow_appends() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        fs::write(&path, "existing\n").unwrap();

        let mut session = TailSession::open(&path, &poll_config(StartAt::End)).unwrap();
        let rx = session.take_events().unwrap();
        assert!(session.take_events().is_none());

        append(&path, "first\nsecond\n");
        assert_eq!(next_line(&rx), "first");
        assert_eq!(next_line(&rx), "second");

        session.stop();
        session.cleanup().unwrap();
        assert!(session.is_released());
    }

    #[test]
    fn test_from_beginning() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        fs::write(&path, "existing\n").unwrap();

        let mut session = TailSession::open(&path, &poll_config(StartAt::Beginning)).unwrap();
        let rx = session.take_events().unwrap();
        assert_eq!(next_line(&rx), "existing");
        session.cleanup().unwrap();
    }

    #[test]
    fn test_stream_closes_after_stop() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        fs::write(&path, "").unwrap();

        let mut session = TailSession::open(&path, &poll_config(StartAt::End)).unwrap();
        let rx = session.take_events().unwrap();

        session.stop();
        assert!(session.is_stopped());
        session.cleanup().unwrap();

        assert!(rx.recv_timeout(Duration::from_secs(1)).is_err());
    }

    #[test]
    fn test_reopens_after_rotation() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        fs::write(&path, "").unwrap();

        let mut session = TailSession::open(&path, &poll_config(StartAt::End)).unwrap();
        let rx = session.take_events().unwrap();

        append(&path, "before\n");
        assert_eq!(next_line(&rx), "before");

        fs::rename(&path, dir.path().join("app.log.1")).unwrap();
        fs::write(&path, "after\n").unwrap();
        assert_eq!(next_line(&rx), "after");

        session.cleanup().unwrap();
    }

    #[test]
    fn test_rewinds_after_truncation() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        fs::write(&path, "a fairly long existing line\n").unwrap();

        let mut session = TailSession::open(&path, &poll_config(StartAt::End)).unwrap();
        let rx = session.take_events().unwrap();

        let f = OpenOptions::new().write(true).open(&path).unwrap();
        f.set_len(0).unwrap();
        std::thread::sleep(Duration::from_millis(100));
        append(&path, "short\n");
        assert_eq!(next_line(&rx), "short");

        session.cleanup().unwrap();
    }

    #[test]
    fn test_open_missing_file() {
        let err = TailSession::open("/no/such/dir/app.log", &poll_config(StartAt::End)).err();
        assert!(matches!(err, Some(TailError::Open { .. })));
    }
}
