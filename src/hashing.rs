//! Content hashing
//!
//! Streams book files through SHA-1 to produce the content identity stored in
//! [`BookMetadata::hash`](crate::types::BookMetadata::hash). The data is hashed
//! incrementally while it is read, so files of any size are hashed without
//! being held in memory.

use std::io::{self, Read};

use sha1::{Digest, Sha1};

/// Result of hashing a byte stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDigest {
    /// Lowercase hexadecimal digest, 40 characters for SHA-1
    pub hex: String,

    /// Number of bytes that went into the digest
    pub bytes_read: u64,
}

/// A reader wrapper that computes a SHA-1 digest while data is read through it.
pub struct HashingReader<R> {
    inner: R,
    hasher: Sha1,
    bytes_read: u64,
}

impl<R: Read> HashingReader<R> {
    /// Create a new hashing reader wrapping the given reader.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            hasher: Sha1::new(),
            bytes_read: 0,
        }
    }

    /// Get the total number of bytes read through this reader.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Get the hash as a lowercase hex string (finalizes the hasher).
    pub fn finalize_hex(self) -> String {
        to_hex(&self.hasher.finalize())
    }

    /// Finalizes the hasher into a [ContentDigest].
    pub fn into_digest(self) -> ContentDigest {
        let bytes_read = self.bytes_read;
        ContentDigest {
            hex: self.finalize_hex(),
            bytes_read,
        }
    }
}

impl<R: Read> Read for HashingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n > 0 {
            self.hasher.update(&buf[..n]);
            self.bytes_read += n as u64;
        }
        Ok(n)
    }
}

/// Hashes everything the reader yields until end of stream
///
/// # Parameters
/// - `reader`: The byte stream to hash
///
/// # Return
/// - `Ok(ContentDigest)`: The digest and the number of bytes consumed
/// - `Err(io::Error)`: The underlying read failed
pub fn hash_stream<R: Read>(reader: R) -> io::Result<ContentDigest> {
    let mut hashing = HashingReader::new(reader);
    io::copy(&mut hashing, &mut io::sink())?;
    Ok(hashing.into_digest())
}

fn to_hex(bytes: &[u8]) -> String {
    use std::fmt::Write;

    bytes
        .iter()
        .fold(String::with_capacity(bytes.len() * 2), |mut out, byte| {
            let _ = write!(out, "{:02x}", byte);
            out
        })
}
