//! Format registry
//!
//! Book formats are pluggable. Each format provides a [FormatLoader] that turns a
//! file path into a [BookInfo] handle, and is added to a [FormatRegistry] under a
//! format identifier. Callers hold a registry and never need to know which formats
//! exist; the registry dispatches by file extension and falls back to sniffing the
//! first bytes of the file.
//!
//! ## Usage
//!
//! ```rust, no_run
//! # fn main() -> Result<(), lib_cbz::error::BookError> {
//! use image::GenericImageView;
//! use lib_cbz::format::FormatRegistry;
//!
//! let registry = FormatRegistry::with_default_formats();
//! let book = registry.load("path/to/comic.cbz")?;
//!
//! println!("Title: {}", book.book().title);
//! if book.has_cover() {
//!     let cover = book.cover()?;
//!     let (width, height) = cover.dimensions();
//!     println!("Cover: {}x{}", width, height);
//! }
//! # Ok(())
//! # }
//! ```

use std::{fs::File, io::Read, path::Path};

use image::DynamicImage;
use log::{debug, warn};

use crate::{error::BookError, types::BookMetadata};

/// Number of leading bytes handed to [FormatLoader::can_load]
pub const SNIFF_LEN: usize = 512;

/// A loaded book file
///
/// Each book format provides its own implementation. A handle is read-only once
/// created; the cover is resolved lazily and may be requested any number of times.
pub trait BookInfo: Send + Sync {
    /// File identity and display information gathered at load time
    fn book(&self) -> &BookMetadata;

    /// Whether a cover entry was identified at load time
    ///
    /// `true` does not guarantee that [cover](Self::cover) succeeds: the entry
    /// may have become unreadable or may not decode.
    fn has_cover(&self) -> bool;

    /// Decodes the cover image
    ///
    /// Every call re-reads and re-decodes the cover; nothing is cached. A failed
    /// call leaves the handle usable.
    fn cover(&self) -> Result<DynamicImage, BookError>;
}

/// A loader for one book format
pub trait FormatLoader: Send + Sync {
    /// File extensions handled by this loader, lowercase and without the leading dot
    fn extensions(&self) -> &'static [&'static str];

    /// Checks whether the leading bytes of a file look like this format
    fn can_load(&self, header: &[u8]) -> bool;

    /// Loads the book file at `path`
    fn load(&self, path: &Path) -> Result<Box<dyn BookInfo>, BookError>;
}

/// Table of book formats keyed by format identifier
///
/// The registry is constructed and populated explicitly, usually once at startup,
/// and is only read afterwards.
#[derive(Default)]
pub struct FormatRegistry {
    formats: Vec<(String, Box<dyn FormatLoader>)>,
}

impl FormatRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding every format compiled into this crate
    pub fn with_default_formats() -> Self {
        #[allow(unused_mut)]
        let mut registry = Self::new();

        #[cfg(feature = "cbz")]
        crate::cbz::register(&mut registry);

        registry
    }

    /// Registers a loader under a format identifier
    ///
    /// Registering an identifier twice replaces the previous loader.
    pub fn register<L>(&mut self, identifier: &str, loader: L) -> &mut Self
    where
        L: FormatLoader + 'static,
    {
        let loader: Box<dyn FormatLoader> = Box::new(loader);
        match self.formats.iter_mut().find(|(id, _)| id == identifier) {
            Some(entry) => {
                warn!("Replacing loader registered for format \"{}\"", identifier);
                entry.1 = loader;
            }
            None => self.formats.push((identifier.to_string(), loader)),
        }

        self
    }

    /// Returns the registered format identifiers in registration order
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.formats.iter().map(|(id, _)| id.as_str())
    }

    /// Returns every file extension handled by a registered format
    pub fn extensions(&self) -> Vec<&'static str> {
        self.formats
            .iter()
            .flat_map(|(_, loader)| loader.extensions().iter().copied())
            .collect()
    }

    /// Returns the loader registered under `identifier`
    pub fn get(&self, identifier: &str) -> Option<&dyn FormatLoader> {
        self.formats
            .iter()
            .find(|(id, _)| id == identifier)
            .map(|(_, loader)| loader.as_ref())
    }

    /// Finds the loader whose extensions match the extension of `path`
    ///
    /// The comparison ignores ASCII case.
    pub fn loader_for<P: AsRef<Path>>(&self, path: P) -> Option<(&str, &dyn FormatLoader)> {
        let extension = path.as_ref().extension()?.to_str()?;

        self.formats
            .iter()
            .find(|(_, loader)| {
                loader
                    .extensions()
                    .iter()
                    .any(|ext| ext.eq_ignore_ascii_case(extension))
            })
            .map(|(id, loader)| (id.as_str(), loader.as_ref()))
    }

    /// Loads a book file with the matching format loader
    ///
    /// The loader is chosen by file extension first. When no extension matches,
    /// the first [SNIFF_LEN] bytes of the file are offered to every loader in
    /// registration order.
    ///
    /// # Return
    /// - `Ok(Box<dyn BookInfo>)`: The loaded book
    /// - `Err(BookError::UnknownFormat)`: No registered loader accepts the file
    /// - `Err(BookError)`: Any error reported by the selected loader
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<Box<dyn BookInfo>, BookError> {
        let path = path.as_ref();

        if let Some((identifier, loader)) = self.loader_for(path) {
            debug!("Loading \"{}\" as {}", path.display(), identifier);
            return loader.load(path);
        }

        let header = read_header(path)?;
        for (identifier, loader) in &self.formats {
            if loader.can_load(&header) {
                debug!("Loading \"{}\" as sniffed {}", path.display(), identifier);
                return loader.load(path);
            }
        }

        Err(BookError::UnknownFormat {
            path: path.display().to_string(),
        })
    }
}

fn read_header(path: &Path) -> Result<Vec<u8>, BookError> {
    let file = File::open(path).map_err(|err| BookError::io(path, err))?;

    let mut header = Vec::with_capacity(SNIFF_LEN);
    file.take(SNIFF_LEN as u64)
        .read_to_end(&mut header)
        .map_err(|err| BookError::io(path, err))?;

    Ok(header)
}
