//! Incremental reader for a recording that is still being written.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Lines returned by one [`LogTailer::poll`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TailRead {
    /// Complete lines, without line terminators.
    pub lines: Vec<String>,
    /// True when `lines` starts at byte 0 of the file, so it begins with the
    /// header lines.
    pub from_start: bool,
}

impl TailRead {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Follows an append-only text file.
///
/// The first poll reads the whole file; later polls read only bytes appended
/// since. A trailing line without a newline is held back until it is
/// completed by a later write.
///
/// Usage:
/// ```ignore
/// let mut tailer = LogTailer::new("recording.scc");
/// let first = tailer.poll()?;       // header + everything so far
/// let more = tailer.poll_if_changed()?; // only new complete lines
/// ```
#[derive(Debug)]
pub struct LogTailer {
    path: PathBuf,
    file: Option<File>,
    /// Bytes consumed so far; always the file length seen by the last read.
    offset: u64,
    /// Bytes of an unterminated last line.
    partial: Vec<u8>,
    started: bool,
    /// Whether any complete line has been handed out yet.
    delivered: bool,
}

impl LogTailer {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            file: None,
            offset: 0,
            partial: Vec::new(),
            started: false,
            delivered: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Byte offset the next read starts from.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Current length of the underlying file.
    pub fn file_len(&mut self) -> io::Result<u64> {
        Ok(self.file()?.metadata()?.len())
    }

    /// True when the file length differs from what was last consumed.
    pub fn has_changed(&mut self) -> io::Result<bool> {
        Ok(!self.started || self.file_len()? != self.offset)
    }

    /// Read lines appended since the last poll, but only touch the file
    /// contents when its length has changed.
    pub fn poll_if_changed(&mut self) -> io::Result<TailRead> {
        if self.has_changed()? {
            self.poll()
        } else {
            Ok(TailRead::default())
        }
    }

    /// Read every complete line appended since the last poll.
    ///
    /// Errors are returned as-is; the offset only advances on success.
    pub fn poll(&mut self) -> io::Result<TailRead> {
        let from_start = !self.delivered;
        let offset = self.offset;

        let file = self.file()?;
        file.seek(SeekFrom::Start(offset))?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;

        self.offset = offset + buf.len() as u64;
        self.started = true;

        if buf.is_empty() {
            return Ok(TailRead {
                lines: Vec::new(),
                from_start,
            });
        }

        let mut data = std::mem::take(&mut self.partial);
        data.extend_from_slice(&buf);

        let complete = match data.iter().rposition(|&b| b == b'\n') {
            Some(i) => i + 1,
            None => {
                self.partial = data;
                return Ok(TailRead {
                    lines: Vec::new(),
                    from_start,
                });
            }
        };
        self.partial = data.split_off(complete);

        let lines = split_lines(&data);
        self.delivered = true;
        log::debug!(
            "Read {} lines from {} (offset {})",
            lines.len(),
            self.path.display(),
            self.offset
        );

        Ok(TailRead { lines, from_start })
    }

    /// Forget all progress so the next poll starts from byte 0.
    pub fn reset(&mut self) {
        self.file = None;
        self.offset = 0;
        self.partial.clear();
        self.started = false;
        self.delivered = false;
    }

    fn file(&mut self) -> io::Result<&mut File> {
        let file = match self.file.take() {
            Some(file) => file,
            None => File::open(&self.path)?,
        };
        Ok(self.file.insert(file))
    }
}

/// Split newline-terminated bytes into lines, dropping `\r\n` terminators.
fn split_lines(data: &[u8]) -> Vec<String> {
    data.strip_suffix(b"\n")
        .unwrap_or(data)
        .split(|&b| b == b'\n')
        .map(|line| {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            String::from_utf8_lossy(line).into_owned()
        })
        .collect()
}
