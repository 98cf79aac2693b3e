//! Content fingerprinting using BLAKE3
//!
//! A [`VersionToken`] is what gets compared across runs to tell whether a
//! tracked remote artifact changed. Digests are computed in a single forward
//! pass over the stream, so nothing ever has to be buffered in full.

use std::fmt;
use std::io::{self, Read, Write};

use serde::{Deserialize, Serialize, Serializer};

/// A content hash using BLAKE3 (256-bit)
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Hash arbitrary bytes
    #[must_use]
    pub fn from_bytes(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Parse a 64-character hex digest
    #[must_use]
    pub fn from_hex(s: &str) -> Option<Self> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes).ok()?;
        Some(Self(bytes))
    }

    /// Get raw bytes
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.to_hex();
        write!(f, "ContentHash({})", hex.get(..16).unwrap_or(&hex))
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Version of a tracked remote artifact.
///
/// `Empty` means the artifact does not exist yet. It never compares equal to
/// a digest, not even the digest of zero-length content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VersionToken {
    Empty,
    Digest(ContentHash),
}

impl VersionToken {
    /// Sentinel for "artifact does not exist"
    #[must_use]
    pub fn empty() -> Self {
        Self::Empty
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Parse the hex form written by [`fmt::Display`]; the empty string maps to `Empty`
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        if s.is_empty() {
            return Some(Self::Empty);
        }
        ContentHash::from_hex(s).map(Self::Digest)
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => Ok(()),
            Self::Digest(hash) => write!(f, "{hash}"),
        }
    }
}

impl Serialize for VersionToken {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Incremental fingerprint over a byte stream.
///
/// Implements [`Write`] so it can sit on the receiving end of [`io::copy`].
#[derive(Default)]
pub struct Fingerprinter {
    hasher: blake3::Hasher,
    len: u64,
}

impl Fingerprinter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
        self.len += data.len() as u64;
    }

    /// Number of bytes fed so far
    #[must_use]
    pub fn len(&self) -> u64 {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn finish(&self) -> VersionToken {
        VersionToken::Digest(ContentHash(*self.hasher.finalize().as_bytes()))
    }
}

impl Write for Fingerprinter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Drain `reader` and return the digest of everything it produced.
///
/// # Errors
/// Returns the reader's error if it fails mid-stream
pub fn fingerprint<R: Read + ?Sized>(reader: &mut R) -> io::Result<VersionToken> {
    let mut fp = Fingerprinter::new();
    io::copy(reader, &mut fp)?;
    Ok(fp.finish())
}

/// Copy `reader` into `writer`, fingerprinting the bytes on the way through.
///
/// Returns the token and the number of bytes copied.
///
/// # Errors
/// Returns an error if reading or writing fails
pub fn fingerprint_copy<R, W>(reader: &mut R, writer: &mut W) -> io::Result<(VersionToken, u64)>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let mut fp = Fingerprinter::new();
    let mut buffer = [0u8; 64 * 1024]; // 64KB buffer

    loop {
        let bytes_read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        let chunk = &buffer[..bytes_read];
        writer.write_all(chunk)?;
        fp.update(chunk);
    }
    writer.flush()?;

    Ok((fp.finish(), fp.len()))
}

/// Reader adapter that fingerprints every byte read through it
pub struct HashingReader<R> {
    inner: R,
    fp: Fingerprinter,
}

impl<R: Read> HashingReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            fp: Fingerprinter::new(),
        }
    }

    /// Bytes read so far
    #[must_use]
    pub fn bytes_read(&self) -> u64 {
        self.fp.len()
    }

    /// Digest of everything read so far
    #[must_use]
    pub fn finish(&self) -> VersionToken {
        self.fp.finish()
    }
}

impl<R: Read> Read for HashingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.fp.update(&buf[..n]);
        Ok(n)
    }
}
