//! Archive reading and writing
//!
//! Archives are newline-delimited JSON, optionally zstd-compressed (files
//! ending in `.zst`). Readers pull one entry at a time; writers always
//! compress.

use crate::error::IntervalError;
use crate::schema::{Event, EventAdapter};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Lines, Read, Write};
use std::path::{Path, PathBuf};

/// File extension of compressed archives written by [`ArchiveWriter`]
pub const ARCHIVE_EXTENSION: &str = "ndjson.zst";

const COMPRESSION_LEVEL: i32 = 3;

/// Whether a path looks like an event archive
pub fn is_archive(path: &Path) -> bool {
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default();
    name.ends_with(".ndjson") || name.ends_with(".ndjson.zst") || name.ends_with(".jsonl")
}

/// Lazy reader over the events of one archive.
///
/// Lines that are not valid events are skipped and counted; only I/O
/// failures end the iteration with an error.
pub struct ArchiveReader<R> {
    lines: Lines<R>,
    line: usize,
    malformed: usize,
    failed: bool,
}

impl ArchiveReader<Box<dyn BufRead + Send>> {
    /// Open an archive, decompressing it if the file name ends in `.zst`
    pub fn open(path: &Path) -> Result<Self, IntervalError> {
        let file = File::open(path)?;
        let compressed = path.extension().is_some_and(|ext| ext == "zst");
        let reader: Box<dyn Read + Send> = if compressed {
            Box::new(zstd::stream::read::Decoder::new(file)?)
        } else {
            Box::new(file)
        };
        Ok(Self::new(Box::new(BufReader::new(reader))))
    }
}

impl<R: BufRead> ArchiveReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line: 0,
            malformed: 0,
            failed: false,
        }
    }

    /// Number of lines skipped because they held no valid event
    pub fn malformed(&self) -> usize {
        self.malformed
    }
}

impl<R: BufRead> Iterator for ArchiveReader<R> {
    type Item = Result<Event, IntervalError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e.into()));
                }
            };
            self.line += 1;

            match EventAdapter::parse_line(&line) {
                Ok(Some(event)) => return Some(Ok(event)),
                Ok(None) => continue,
                Err(e) => {
                    log::debug!("skipping malformed entry on line {}: {}", self.line, e);
                    self.malformed += 1;
                }
            }
        }
    }
}

/// Compressed NDJSON writer for one output archive.
///
/// The archive file is created when the writer is; existing files are never
/// overwritten. Dropping an unfinished writer finishes it.
pub struct ArchiveWriter {
    path: PathBuf,
    encoder: Option<zstd::stream::write::Encoder<'static, BufWriter<File>>>,
    entries: usize,
}

impl ArchiveWriter {
    pub fn create(path: impl Into<PathBuf>) -> Result<Self, IntervalError> {
        let path = path.into();
        let file = OpenOptions::new().write(true).create_new(true).open(&path)?;
        let encoder = zstd::stream::write::Encoder::new(BufWriter::new(file), COMPRESSION_LEVEL)?;
        log::debug!("opened archive {}", path.display());
        Ok(Self {
            path,
            encoder: Some(encoder),
            entries: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of entries written so far
    pub fn entries(&self) -> usize {
        self.entries
    }

    pub fn is_finished(&self) -> bool {
        self.encoder.is_none()
    }

    /// Append one entry
    pub fn add<T: Serialize>(&mut self, entry: &T) -> Result<(), IntervalError> {
        let encoder = self.encoder.as_mut().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::BrokenPipe,
                format!("archive {} is already finished", self.path.display()),
            )
        })?;
        serde_json::to_writer(&mut *encoder, entry)?;
        encoder.write_all(b"\n")?;
        self.entries += 1;
        Ok(())
    }

    /// Flush and close the archive. Finishing twice is a no-op.
    pub fn finish(&mut self) -> Result<(), IntervalError> {
        if let Some(encoder) = self.encoder.take() {
            let mut inner = encoder.finish()?;
            inner.flush()?;
            log::debug!(
                "closed archive {} with {} entries",
                self.path.display(),
                self.entries
            );
        }
        Ok(())
    }
}

impl Drop for ArchiveWriter {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            log::warn!("failed to finish archive {}: {}", self.path.display(), e);
        }
    }
}
