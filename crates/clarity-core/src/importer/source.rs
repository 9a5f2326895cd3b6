//! Byte sources an import can read from.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

/// A sequential, range-addressable input with a known total length.
pub trait ByteSource: Send {
    /// Declared file name, used for validation and re-import detection.
    fn name(&self) -> &str;

    /// Total length in bytes, fixed for the lifetime of the source.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read the half-open range `[start, end)`.
    fn read_range(&mut self, start: u64, end: u64) -> io::Result<Vec<u8>>;
}

fn check_range(start: u64, end: u64, len: u64) -> io::Result<usize> {
    if start > end || end > len {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("range {start}..{end} outside source of {len} bytes"),
        ));
    }
    usize::try_from(end - start).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("range {start}..{end} does not fit in memory"),
        )
    })
}

// ---------------------------------------------------------------------------
// FileSource
// ---------------------------------------------------------------------------

/// A model file on disk.
#[derive(Debug)]
pub struct FileSource {
    file: File,
    name: String,
    len: u64,
}

impl FileSource {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        let name = path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self { file, name, len })
    }
}

impl ByteSource for FileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn len(&self) -> u64 {
        self.len
    }

    fn read_range(&mut self, start: u64, end: u64) -> io::Result<Vec<u8>> {
        let size = check_range(start, end, self.len)?;
        self.file.seek(SeekFrom::Start(start))?;
        let mut buf = vec![0u8; size];
        self.file.read_exact(&mut buf)?;
        Ok(buf)
    }
}

// ---------------------------------------------------------------------------
// MemorySource
// ---------------------------------------------------------------------------

/// An in-memory buffer with a declared name.
#[derive(Debug, Clone)]
pub struct MemorySource {
    name: String,
    data: Vec<u8>,
}

impl MemorySource {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }
}

impl ByteSource for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_range(&mut self, start: u64, end: u64) -> io::Result<Vec<u8>> {
        check_range(start, end, self.len())?;
        Ok(self.data[start as usize..end as usize].to_vec())
    }
}
