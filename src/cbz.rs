//! Comic book archive (CBZ) format
//!
//! A CBZ file is a zip archive of page images. The format carries no embedded
//! metadata, so the title is the base name of the file, and by convention the
//! first entry of the archive directory is the cover.
//!
//! Loading a CBZ file only stats, hashes and enumerates the archive; the cover is
//! decoded on demand by [`BookInfo::cover`].

use std::{
    any::Any,
    fs::File,
    io::{self, Read, Seek, SeekFrom},
    panic::{self, AssertUnwindSafe},
    path::{Path, PathBuf},
};

use image::{DynamicImage, GenericImageView};
use log::{debug, warn};
use zip::{ZipArchive, result::ZipError};

use crate::{
    error::BookError,
    format::{BookInfo, FormatLoader, FormatRegistry},
    hashing::hash_stream,
    types::BookMetadata,
};

/// Identifier under which the CBZ loader is registered
pub const FORMAT_IDENTIFIER: &str = "archive-comic";

/// Signature of a zip local file header
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// Largest cover entry, in uncompressed bytes, that is read into memory
pub const MAX_COVER_SIZE: u64 = 64 * 1024 * 1024;

/// Position of the cover entry in the archive directory
const COVER_INDEX: usize = 0;

const EOCD_SIGNATURE: &[u8] = b"PK\x05\x06";
const ZIP64_LOCATOR_SIGNATURE: &[u8] = b"PK\x06\x07";
const ZIP64_EOCD_SIGNATURE: &[u8] = b"PK\x06\x06";
const EOCD_LEN: usize = 22;
const ZIP64_LOCATOR_LEN: usize = 20;
const ZIP64_EOCD_LEN: usize = 56;

/// The archive entry holding the cover
#[derive(Debug, Clone, PartialEq, Eq)]
struct CoverReference {
    /// Position in the archive directory
    index: usize,

    /// Entry name, used to detect a replaced archive and for error context
    name: String,
}

/// A loaded CBZ file
#[derive(Debug, Clone)]
pub struct CbzBook {
    book: BookMetadata,

    /// The cover entry, if one was identified
    cover: Option<CoverReference>,
}

impl CbzBook {
    /// Loads a CBZ file
    ///
    /// The file is stat'ed and hashed through a single open handle, which is closed
    /// before the file is opened again as a zip archive to find the cover entry.
    ///
    /// # Parameters
    /// - `path`: The path to the CBZ file
    ///
    /// # Return
    /// - `Ok(CbzBook)`: The loaded book
    /// - `Err(BookError::IOError)`: The file could not be opened or stat'ed
    /// - `Err(BookError::HashError)`: The content could not be hashed completely
    /// - `Err(BookError::FormatError)`: The file is not a zip archive, or it is empty
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, BookError> {
        let path = path.as_ref();

        let file = File::open(path).map_err(|err| BookError::io(path, err))?;
        let stat = file.metadata().map_err(|err| BookError::io(path, err))?;
        let mod_time = stat.modified().map_err(|err| BookError::io(path, err))?;
        let file_size = stat.len();

        // consumes the handle, so it is closed whether hashing succeeds or not
        let hash = hash_file_content(path, file, file_size)?;

        let (mut archive, declared_entries) = open_archive(path)?;
        if archive.len() == 0 {
            return Err(BookError::format(path, "archive contains no entries"));
        }
        if has_duplicate_names(&archive, declared_entries) {
            warn!(
                "\"{}\" repeats entry names; its cover may not be readable",
                path.display()
            );
        }

        let cover = {
            let first = archive
                .by_index_raw(COVER_INDEX)
                .map_err(|err| BookError::archive(path, "could not read first entry", err))?;
            Some(first.name().to_string())
                .filter(|name| !name.is_empty())
                .map(|name| CoverReference {
                    index: COVER_INDEX,
                    name,
                })
        };

        let book = BookMetadata {
            file_path: PathBuf::from(path),
            file_size,
            mod_time,
            hash,
            title: base_name(path),
        };

        debug!(
            "Loaded \"{}\" ({} bytes, sha1 {}, cover {:?})",
            path.display(),
            book.file_size,
            book.hash,
            cover.as_ref().map(|cover| cover.name.as_str())
        );

        Ok(Self { book, cover })
    }
}

impl BookInfo for CbzBook {
    fn book(&self) -> &BookMetadata {
        &self.book
    }

    fn has_cover(&self) -> bool {
        self.cover.is_some()
    }

    fn cover(&self) -> Result<DynamicImage, BookError> {
        let path = self.book.file_path.as_path();
        let reference = self
            .cover
            .as_ref()
            .ok_or_else(|| BookError::NoCoverError {
                path: path.display().to_string(),
            })?;
        let entry_name = reference.name.as_str();

        let (mut archive, declared_entries) = open_archive(path)?;
        if has_duplicate_names(&archive, declared_entries) {
            return Err(BookError::format(
                path,
                format!(
                    "could not open cover \"{}\": the archive repeats entry names, \
                     so the entry at position {} is ambiguous",
                    entry_name, reference.index
                ),
            ));
        }

        let mut entry = archive.by_index(reference.index).map_err(|err| {
            BookError::archive(path, format!("could not open cover \"{}\"", entry_name), err)
        })?;
        if entry.name() != entry_name {
            return Err(BookError::format(
                path,
                format!(
                    "could not open cover \"{}\": entry {} is now \"{}\"",
                    entry_name,
                    reference.index,
                    entry.name()
                ),
            ));
        }

        let cover = decode_contained(path, entry_name, || {
            let declared_size = entry.size();
            let data = read_cover_entry(&mut entry, declared_size)?;
            image::load_from_memory(&data).map_err(|err| err.to_string())
        })?;

        let (width, height) = cover.dimensions();
        debug!(
            "Decoded cover \"{}\" of \"{}\" ({}x{})",
            entry_name,
            path.display(),
            width,
            height
        );

        Ok(cover)
    }
}

/// Loader for the CBZ format
#[derive(Debug, Default, Clone, Copy)]
pub struct CbzLoader;

impl FormatLoader for CbzLoader {
    fn extensions(&self) -> &'static [&'static str] {
        &["cbz"]
    }

    fn can_load(&self, header: &[u8]) -> bool {
        header.starts_with(ZIP_MAGIC)
    }

    fn load(&self, path: &Path) -> Result<Box<dyn BookInfo>, BookError> {
        load(path)
    }
}

/// Loads a CBZ file as a [BookInfo] handle
pub fn load(path: &Path) -> Result<Box<dyn BookInfo>, BookError> {
    Ok(Box::new(CbzBook::new(path)?))
}

/// Registers the CBZ loader under [FORMAT_IDENTIFIER]
pub fn register(registry: &mut FormatRegistry) {
    registry.register(FORMAT_IDENTIFIER, CbzLoader);
}

/// Hashes the whole content of `reader`, which must yield exactly `expected_size` bytes
///
/// A different byte count means the file changed between stat and hash, e.g. it
/// was truncated or appended to while being loaded.
fn hash_file_content<R: Read>(
    path: &Path,
    reader: R,
    expected_size: u64,
) -> Result<String, BookError> {
    let digest = hash_stream(reader)
        .map_err(|err| BookError::hash(path, format!("read failed: {}", err)))?;

    if digest.bytes_read != expected_size {
        return Err(BookError::hash(
            path,
            format!(
                "could not read whole file: hashed {} bytes, expected {}",
                digest.bytes_read, expected_size
            ),
        ));
    }

    Ok(digest.hex)
}

/// Reads a cover entry, refusing entries larger than [MAX_COVER_SIZE]
///
/// The declared size comes from the archive directory and is checked before any
/// buffer is allocated; the read itself is bounded too, since the declared size
/// may understate what the compressed stream expands to.
fn read_cover_entry<R: Read>(entry: R, declared_size: u64) -> Result<Vec<u8>, String> {
    if declared_size > MAX_COVER_SIZE {
        return Err(format!(
            "entry declares {} bytes, over the limit of {} bytes",
            declared_size, MAX_COVER_SIZE
        ));
    }

    let mut data = Vec::new();
    entry
        .take(MAX_COVER_SIZE + 1)
        .read_to_end(&mut data)
        .map_err(|err| format!("could not read entry: {}", err))?;

    if data.len() as u64 > MAX_COVER_SIZE {
        return Err(format!(
            "entry expands past the limit of {} bytes",
            MAX_COVER_SIZE
        ));
    }

    Ok(data)
}

/// Opens `path` as a zip archive
///
/// Also returns the number of records the central directory declares, when it
/// can be read, for [has_duplicate_names].
fn open_archive(path: &Path) -> Result<(ZipArchive<File>, Option<u64>), BookError> {
    let mut file = File::open(path)
        .map_err(|err| BookError::archive(path, "error opening as zip", ZipError::from(err)))?;

    let declared_entries = match directory_record_count(&mut file) {
        Ok(count) => Some(count),
        Err(err) => {
            debug!(
                "Could not count directory records of \"{}\": {}",
                path.display(),
                err
            );
            None
        }
    };

    let archive = ZipArchive::new(file)
        .map_err(|err| BookError::archive(path, "error opening as zip", err))?;

    Ok((archive, declared_entries))
}

/// Whether the central directory declares more records than the archive exposes
///
/// The zip reader keys entries by name, so records sharing a name collapse into a
/// single entry holding the data of the last one.
fn has_duplicate_names<R: Read + Seek>(archive: &ZipArchive<R>, declared: Option<u64>) -> bool {
    declared.is_some_and(|count| count > archive.len() as u64)
}

/// Reads the total record count from the end of central directory record
fn directory_record_count<R: Read + Seek>(reader: &mut R) -> io::Result<u64> {
    let file_len = reader.seek(SeekFrom::End(0))?;
    let tail_len = file_len.min((EOCD_LEN + u16::MAX as usize) as u64);
    reader.seek(SeekFrom::Start(file_len - tail_len))?;

    let mut tail = Vec::new();
    reader.by_ref().take(tail_len).read_to_end(&mut tail)?;

    let eocd = tail
        .len()
        .checked_sub(EOCD_LEN)
        .and_then(|last| (0..=last).rev().find(|&pos| tail[pos..].starts_with(EOCD_SIGNATURE)))
        .ok_or_else(|| invalid_data("end of central directory not found"))?;

    let total = read_le(&tail[eocd + 10..eocd + 12]);
    if total != u64::from(u16::MAX) {
        return Ok(total);
    }

    // zip64 archives keep the real count in a second record, found through a
    // locator placed right before the classic one
    let locator = eocd
        .checked_sub(ZIP64_LOCATOR_LEN)
        .filter(|&pos| tail[pos..].starts_with(ZIP64_LOCATOR_SIGNATURE))
        .ok_or_else(|| invalid_data("zip64 locator not found"))?;
    let record_offset = read_le(&tail[locator + 8..locator + 16]);

    let mut record = [0u8; ZIP64_EOCD_LEN];
    reader.seek(SeekFrom::Start(record_offset))?;
    reader.read_exact(&mut record)?;
    if !record.starts_with(ZIP64_EOCD_SIGNATURE) {
        return Err(invalid_data("zip64 end of central directory not found"));
    }

    Ok(read_le(&record[32..40]))
}

fn read_le(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .rev()
        .fold(0, |value, &byte| (value << 8) | u64::from(byte))
}

fn invalid_data(message: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message.to_string())
}

/// Runs `decode`, turning both its errors and any panic it raises into [BookError::DecodeError]
///
/// Cover payloads are untrusted input; a decoder bug triggered by a malformed
/// image must not take the calling process down.
fn decode_contained<F>(path: &Path, entry: &str, decode: F) -> Result<DynamicImage, BookError>
where
    F: FnOnce() -> Result<DynamicImage, String>,
{
    let reason = match panic::catch_unwind(AssertUnwindSafe(decode)) {
        Ok(Ok(image)) => return Ok(image),
        Ok(Err(reason)) => reason,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            warn!(
                "Decoder panicked on cover \"{}\" of \"{}\": {}",
                entry,
                path.display(),
                message
            );
            format!("panic while decoding cover image: {}", message)
        }
    };

    Err(BookError::DecodeError {
        path: path.display().to_string(),
        entry: entry.to_string(),
        reason,
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}

fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
