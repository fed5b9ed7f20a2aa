//! Cbz library
//!
//! A Rust library for loading book files into a normalized description and
//! extracting their covers on demand.
//!
//! Loading a file is cheap: it records the file size and modification time,
//! hashes the whole content with SHA-1 and locates the cover entry, but it does
//! not decode any image. The cover is decoded only when it is asked for, and a
//! malformed cover image is reported as an error instead of crashing the caller.
//!
//! ## Features
//!
//! - Pluggable formats behind the [format::FormatLoader] trait, dispatched by a
//!   [format::FormatRegistry] through file extension or content sniffing.
//! - Content hashes for deduplicating books independently of their file names.
//! - Comic book archives (CBZ) with PNG and GIF covers.
//!
//! ## Quick Start
//!
//! ```rust, no_run
//! # use lib_cbz::format::FormatRegistry;
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = FormatRegistry::with_default_formats();
//! let book = registry.load("path/to/comic.cbz")?;
//!
//! println!("Title: {}", book.book().title);
//! println!("Hash: {}", book.book().hash);
//!
//! if book.has_cover() {
//!     let cover = book.cover()?;
//!     cover.save("cover.png")?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature flags
//!
//! Each book format sits behind its own feature flag, enabled by default.
//! [format::FormatRegistry::with_default_formats] registers every format
//! that is compiled in.
//!
//! - `cbz`: Enable `lib_cbz::cbz`, the comic book archive format, registered
//!   as `"archive-comic"` for the `.cbz` extension.

#[cfg(feature = "cbz")]
pub mod cbz;
pub mod error;
pub mod format;
pub mod hashing;
pub mod types;

pub use image::DynamicImage;
