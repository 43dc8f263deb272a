//! Where feed files come from: a directory or a zip archive.
//!
//! Only the top level is searched. An archive that unzips into a
//! subdirectory of GTFS files is not a feed.

use std::fs::{self, File};
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::{Path, PathBuf};

use serde::Serialize;
use zip::result::ZipError;
use zip::ZipArchive;

use crate::models::types::{FeedError, Result};
use crate::schema::TableName;

pub(crate) trait ReadSeek: Read + Seek {}

impl<T: Read + Seek> ReadSeek for T {}

pub(crate) enum FeedSource {
    Directory(PathBuf),
    Archive(ZipArchive<Box<dyn ReadSeek>>),
}

/// A file found in a feed, as reported by [`list_feed`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FileEntry {
    pub file_name: String,
    pub file_size: u64,
}

impl FeedSource {
    /// Open a directory, or a zip archive if `path` is a file.
    pub(crate) fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(FeedError::PathNotFound(path.to_path_buf()));
        }

        if path.is_file() {
            let file = BufReader::new(File::open(path)?);
            let reader: Box<dyn ReadSeek> = Box::new(file);
            Ok(Self::Archive(ZipArchive::new(reader)?))
        } else {
            Ok(Self::Directory(path.to_path_buf()))
        }
    }

    /// A zip archive held in memory, e.g. downloaded from a URL.
    pub(crate) fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let reader: Box<dyn ReadSeek> = Box::new(Cursor::new(bytes));
        Ok(Self::Archive(ZipArchive::new(reader)?))
    }

    pub(crate) fn entries(&mut self) -> Result<Vec<FileEntry>> {
        let mut entries = Vec::new();
        match self {
            Self::Directory(dir) => {
                for entry in fs::read_dir(dir)? {
                    let entry = entry?;
                    entries.push(FileEntry {
                        file_name: entry.file_name().to_string_lossy().into_owned(),
                        file_size: entry.metadata()?.len(),
                    });
                }
                entries.sort_by(|a, b| a.file_name.cmp(&b.file_name));
            }
            Self::Archive(archive) => {
                for i in 0..archive.len() {
                    let file = archive.by_index(i)?;
                    if file.name() == "./" {
                        continue;
                    }
                    entries.push(FileEntry {
                        file_name: file.name().to_string(),
                        file_size: file.size(),
                    });
                }
            }
        }
        Ok(entries)
    }

    /// Run `f` over the contents of `table`'s file.
    ///
    /// Returns `Ok(None)` when the file is missing, is not a regular file,
    /// or is empty.
    pub(crate) fn read_table<T>(
        &mut self,
        table: TableName,
        f: impl FnOnce(&mut dyn Read) -> Result<T>,
    ) -> Result<Option<T>> {
        let file_name = table.file_name();
        match self {
            Self::Directory(dir) => {
                let path = dir.join(&file_name);
                let metadata = match fs::metadata(&path) {
                    Ok(m) => m,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
                    Err(e) => return Err(e.into()),
                };
                if !metadata.is_file() || metadata.len() == 0 {
                    return Ok(None);
                }
                let mut reader = BufReader::new(File::open(&path)?);
                f(&mut reader).map(Some)
            }
            Self::Archive(archive) => {
                let mut file = match archive.by_name(&file_name) {
                    Ok(file) => file,
                    Err(ZipError::FileNotFound) => return Ok(None),
                    Err(e) => return Err(e.into()),
                };
                if file.is_dir() || file.size() == 0 {
                    return Ok(None);
                }
                f(&mut file).map(Some)
            }
        }
    }
}

/// Name and size of every file in a feed directory or zip archive.
///
/// Directory listings are sorted by name; archives keep their stored order.
pub fn list_feed(path: impl AsRef<Path>) -> Result<Vec<FileEntry>> {
    FeedSource::open(path.as_ref())?.entries()
}
