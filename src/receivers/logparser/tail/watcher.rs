// SPDX-License-Identifier: Apache-2.0

//! Change notification for a followed file.
//!
//! Native mode watches the file's directory with OS notifications (inotify,
//! FSEvents, ReadDirectoryChangesW) so both appends and rotation wake the
//! reader; the poll interval is still used as an upper bound on each wait.
//! Poll mode simply sleeps, for file systems where notifications are
//! unreliable (NFS, network shares).

use std::path::Path;
use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError, channel};
use std::time::Duration;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::Deserialize;
use tracing::{debug, warn};

/// Watch mode configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchMode {
    /// Native watching, falling back to polling if it cannot be set up.
    #[default]
    Auto,
    /// Native watching only. Opening a file fails if it cannot be watched.
    Native,
    /// Periodic polling.
    Poll,
}

impl std::str::FromStr for WatchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(WatchMode::Auto),
            "native" => Ok(WatchMode::Native),
            "poll" | "polling" => Ok(WatchMode::Poll),
            _ => Err(format!(
                "Invalid watch mode '{}'. Valid options: auto, native, poll",
                s
            )),
        }
    }
}

/// Blocks a tail thread until its file may have changed.
pub(crate) enum ChangeWaiter {
    Native {
        // Dropping the watcher removes the watch.
        _watcher: RecommendedWatcher,
        rx: Receiver<notify::Result<Event>>,
        timeout: Duration,
    },
    Poll {
        interval: Duration,
    },
}

impl ChangeWaiter {
    pub(crate) fn new(
        mode: WatchMode,
        path: &Path,
        poll_interval: Duration,
    ) -> Result<Self, notify::Error> {
        match mode {
            WatchMode::Poll => Ok(ChangeWaiter::Poll {
                interval: poll_interval,
            }),
            WatchMode::Native => Self::native(path, poll_interval),
            WatchMode::Auto => match Self::native(path, poll_interval) {
                Ok(waiter) => Ok(waiter),
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "Native file watching unavailable, falling back to polling"
                    );
                    Ok(ChangeWaiter::Poll {
                        interval: poll_interval,
                    })
                }
            },
        }
    }

    fn native(path: &Path, timeout: Duration) -> Result<Self, notify::Error> {
        let (tx, rx) = channel();
        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = tx.send(res);
            },
            Config::default(),
        )?;

        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        watcher.watch(dir, RecursiveMode::NonRecursive)?;

        Ok(ChangeWaiter::Native {
            _watcher: watcher,
            rx,
            timeout,
        })
    }

    pub(crate) fn is_native(&self) -> bool {
        matches!(self, ChangeWaiter::Native { .. })
    }

    /// Wait for a change notification or until the poll interval elapses.
    pub(crate) fn wait(&mut self) {
        match self {
            ChangeWaiter::Poll { interval } => std::thread::sleep(*interval),
            ChangeWaiter::Native { rx, timeout, .. } => {
                match rx.recv_timeout(*timeout) {
                    Ok(res) => log_event(res),
                    Err(RecvTimeoutError::Timeout) => return,
                    Err(RecvTimeoutError::Disconnected) => {
                        // Watcher thread is gone; degrade to polling.
                        std::thread::sleep(*timeout);
                        return;
                    }
                }
                // Coalesce whatever else arrived.
                loop {
                    match rx.try_recv() {
                        Ok(res) => log_event(res),
                        Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
                    }
                }
            }
        }
    }
}

fn log_event(res: notify::Result<Event>) {
    match res {
        Ok(event) => {
            if !matches!(event.kind, EventKind::Access(_)) {
                debug!(kind = ?event.kind, paths = ?event.paths, "File change notification");
            }
        }
        Err(e) => warn!(error = %e, "File watcher error"),
    }
}
