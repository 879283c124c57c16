// SPDX-License-Identifier: Apache-2.0

use std::fs::File;
use std::io::{self, BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use super::StartAt;
use super::file_id::FileId;
use crate::receivers::logparser::error::TailError;

/// Reads complete lines from one open file, remembering its byte offset.
///
/// A trailing line without a newline is held back until the rest of it is
/// written, so a line is never split across two events. At most
/// `4 * max_line_size` bytes of a line are buffered; the rest of an
/// oversized line is skipped up to its newline.
pub(crate) struct LineReader {
    path: PathBuf,
    reader: BufReader<File>,
    id: Option<FileId>,
    offset: u64,
    pending: Vec<u8>,
    max_line_size: usize,
    discarding: bool,
}

impl LineReader {
    pub(crate) fn open(
        path: &Path,
        start_at: StartAt,
        max_line_size: usize,
    ) -> Result<Self, TailError> {
        let file = File::open(path).map_err(|source| TailError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let metadata = file.metadata().map_err(|source| TailError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        let mut reader = BufReader::new(file);
        let offset = match start_at {
            StartAt::Beginning => 0,
            StartAt::End => metadata.len(),
        };
        reader
            .seek(SeekFrom::Start(offset))
            .map_err(|source| TailError::Seek {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(Self {
            path: path.to_path_buf(),
            reader,
            id: FileId::from_metadata(&metadata),
            offset,
            pending: Vec::new(),
            max_line_size,
            discarding: false,
        })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn id(&self) -> Option<FileId> {
        self.id
    }

    pub(crate) fn offset(&self) -> u64 {
        self.offset
    }

    /// Append every complete line available up to EOF to `out`.
    pub(crate) fn read_lines(&mut self, out: &mut Vec<String>) -> io::Result<()> {
        // Enough bytes for max_line_size chars of any width.
        let max_pending = self.max_line_size.saturating_mul(4);

        loop {
            let buf = self.reader.fill_buf()?;
            if buf.is_empty() {
                // Partial line, if any, stays pending
                return Ok(());
            }

            let (consumed, complete) = match buf.iter().position(|b| *b == b'\n') {
                Some(idx) => (idx + 1, true),
                None => (buf.len(), false),
            };

            if !self.discarding {
                let room = max_pending.saturating_sub(self.pending.len());
                let keep = consumed.min(room);
                self.pending.extend_from_slice(&buf[..keep]);
                self.discarding = keep < consumed;
            }

            self.reader.consume(consumed);
            self.offset += consumed as u64;

            if complete {
                self.discarding = false;
                out.push(self.take_line());
            }
        }
    }

    /// Emit a held-back partial line, used once the file has been rotated
    /// away and no more data will be appended to it.
    pub(crate) fn flush_partial(&mut self) -> Option<String> {
        self.discarding = false;
        if self.pending.is_empty() {
            None
        } else {
            Some(self.take_line())
        }
    }

    /// Rewind to the start if the file shrank below the read offset.
    pub(crate) fn rewind_if_truncated(&mut self) -> io::Result<bool> {
        let len = self.reader.get_ref().metadata()?.len();
        if len >= self.offset {
            return Ok(false);
        }
        self.reader.seek(SeekFrom::Start(0))?;
        self.offset = 0;
        self.pending.clear();
        self.discarding = false;
        Ok(true)
    }

    fn take_line(&mut self) -> String {
        if self.pending.last() == Some(&b'\n') {
            self.pending.pop();
            if self.pending.last() == Some(&b'\r') {
                self.pending.pop();
            }
        }

        let mut line = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();

        if let Some((idx, _)) = line.char_indices().nth(self.max_line_size) {
            line.truncate(idx);
        }
        line
    }
}
