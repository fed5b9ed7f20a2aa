use std::{path::PathBuf, time::SystemTime};

/// Length of the short identifier returned by [BookMetadata::id]
const SHORT_ID_LEN: usize = 10;

/// File identity and display information of a loaded book
///
/// A `BookMetadata` is filled in once, when the book file is loaded, and is never
/// updated afterwards. In particular the size, modification time and hash describe
/// the file as it was when it was loaded, even if it has changed since.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookMetadata {
    /// The path to the book file, as given to the loader
    pub file_path: PathBuf,

    /// Size of the file in bytes at load time
    pub file_size: u64,

    /// Last modification time of the file at load time
    pub mod_time: SystemTime,

    /// Lowercase hexadecimal SHA-1 digest of the whole file content
    ///
    /// The digest depends on the file bytes only, so it identifies the same
    /// book under different names or locations.
    pub hash: String,

    /// The display title
    ///
    /// Formats without embedded metadata use the base name of the file.
    pub title: String,
}

impl BookMetadata {
    /// Returns a short identifier of the book
    ///
    /// The identifier is the first 10 characters of [`hash`](Self::hash), which is
    /// compact enough for URLs and file names while still being practically unique
    /// within a library.
    pub fn id(&self) -> &str {
        match self.hash.char_indices().nth(SHORT_ID_LEN) {
            Some((end, _)) => &self.hash[..end],
            None => &self.hash,
        }
    }
}
