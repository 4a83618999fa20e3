//! UploadSource - アップロードされた生データ
//!
//! The payload outlives the submitting call (it is moved into the job), so
//! it is owned data rather than a borrowed stream. The worker opens it once
//! and drops the reader on every exit path.

use std::fs::File;
use std::io::{self, Cursor, Read};
use std::path::PathBuf;

pub trait UploadSource: Send + 'static {
    /// Original file name as sent by the client.
    fn name(&self) -> &str;

    fn open(&self) -> io::Result<Box<dyn Read + Send>>;
}

/// An upload held in memory (e.g. a multipart body).
#[derive(Debug, Clone)]
pub struct MemoryUpload {
    name: String,
    bytes: Vec<u8>,
}

impl MemoryUpload {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

impl UploadSource for MemoryUpload {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(Cursor::new(self.bytes.clone())))
    }
}

/// An upload already spooled to disk.
#[derive(Debug, Clone)]
pub struct FileUpload {
    name: String,
    path: PathBuf,
}

impl FileUpload {
    /// Use the file name of `path` as the upload name.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { name, path }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl UploadSource for FileUpload {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(File::open(&self.path)?))
    }
}
