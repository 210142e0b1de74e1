use crate::record::EventRecord;
use fs2::FileExt;
use log::warn;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

const JOURNAL_FILE: &str = "events.jsonl";
const SCAN_CHUNK: u64 = 8192;

/// Durable, append-only copy of the event log.
///
/// Each delivered record is written as one JSON line to `events.jsonl` and
/// synced before `append` returns. Only one `Journal` may hold a directory
/// at a time; the exclusive lock is released when the journal is dropped.
#[derive(Debug)]
pub struct Journal {
    dir: PathBuf,
    path: PathBuf,
    file: File,
}

impl Journal {
    /// Open or create the journal in `dir`.
    ///
    /// A partial line left at the end of the file by an interrupted write is
    /// truncated away so later appends start on a clean line.
    ///
    /// # Errors
    ///
    /// Fails with [`io::ErrorKind::AlreadyExists`] if another journal holds
    /// the lock on this directory.
    pub fn open(dir: impl AsRef<Path>) -> io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let path = dir.join(JOURNAL_FILE);
        fs::create_dir_all(&dir)?;

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;

        file.try_lock_exclusive().map_err(|_| {
            io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("another writer holds the lock on {}", path.display()),
            )
        })?;

        repair_tail(&mut file, &path)?;

        Ok(Journal { dir, path, file })
    }

    /// Append one record and return the byte offset where it starts.
    ///
    /// The line is synced before returning, so a record whose offset was
    /// handed out survives a crash.
    pub fn append(&mut self, record: &EventRecord) -> io::Result<u64> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let offset = self.file.metadata()?.len();
        self.file.write_all(&line)?;
        self.file.sync_data()?;
        Ok(offset)
    }

    /// Iterate over journaled records starting at byte `offset`.
    ///
    /// Yields `(record, next_offset)` per complete line. Empty lines are
    /// skipped, and reading stops at a line with no newline yet. A line that
    /// does not parse is an [`io::ErrorKind::InvalidData`] error.
    pub fn read_from(&self, offset: u64) -> io::Result<JournalRecords> {
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(offset))?;

        Ok(JournalRecords {
            reader: BufReader::new(file),
            path: self.path.clone(),
            offset,
            line: Vec::new(),
        })
    }

    /// Read every journaled record, in append order.
    pub fn read_all(&self) -> io::Result<Vec<EventRecord>> {
        self.read_from(0)?
            .map(|result| result.map(|(record, _)| record))
            .collect()
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current size of the journal file in bytes.
    pub fn size(&self) -> io::Result<u64> {
        Ok(fs::metadata(&self.path)?.len())
    }
}

/// Truncate anything after the last newline.
fn repair_tail(file: &mut File, path: &Path) -> io::Result<()> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(());
    }

    let mut last = [0u8; 1];
    file.seek(SeekFrom::Start(len - 1))?;
    file.read_exact(&mut last)?;
    if last[0] == b'\n' {
        return Ok(());
    }

    let mut end = len;
    let mut keep = 0u64;
    while end > 0 {
        let start = end.saturating_sub(SCAN_CHUNK);
        let mut buf = vec![0u8; (end - start) as usize];
        file.seek(SeekFrom::Start(start))?;
        file.read_exact(&mut buf)?;
        if let Some(pos) = buf.iter().rposition(|&b| b == b'\n') {
            keep = start + pos as u64 + 1;
            break;
        }
        end = start;
    }

    warn!(
        "bountyfold: dropping {} bytes of partial line at the end of {}",
        len - keep,
        path.display()
    );
    file.set_len(keep)?;
    file.sync_data()
}

/// Records read back from a [`Journal`], with the offset after each one.
///
/// Returned by [`Journal::read_from`].
#[derive(Debug)]
pub struct JournalRecords {
    reader: BufReader<File>,
    path: PathBuf,
    offset: u64,
    line: Vec<u8>,
}

impl Iterator for JournalRecords {
    type Item = io::Result<(EventRecord, u64)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.line.clear();
            let read = match self.reader.read_until(b'\n', &mut self.line) {
                Ok(0) => return None,
                Ok(read) => read as u64,
                Err(e) => return Some(Err(e)),
            };

            if self.line.last() != Some(&b'\n') {
                warn!(
                    "bountyfold: stopping at unterminated record at offset {} of {}",
                    self.offset,
                    self.path.display()
                );
                return None;
            }

            let start = self.offset;
            self.offset += read;
            let body = self.line[..self.line.len() - 1].trim_ascii();
            if body.is_empty() {
                continue;
            }

            return Some(serde_json::from_slice(body).map(|record| (record, self.offset)).map_err(
                |e| {
                    io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!(
                            "bad record at offset {start} of {}: {e}",
                            self.path.display()
                        ),
                    )
                },
            ));
        }
    }
}
