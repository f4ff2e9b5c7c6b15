//! Content-sniffing binary file detection.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use sievefile_core::DEFAULT_BINARY_SIZE_LIMIT;

/// Number of leading bytes sampled from each file.
///
/// Large enough to reach the `ustar` marker of tar archives at offset 257.
pub const SAMPLE_SIZE: usize = 262;

/// A magic number at a fixed offset, optionally confirmed by a second one.
struct Signature {
    offset: usize,
    magic: &'static [u8],
    confirm: Option<(usize, &'static [u8])>,
}

const fn sig(offset: usize, magic: &'static [u8]) -> Signature {
    Signature {
        offset,
        magic,
        confirm: None,
    }
}

/// For magics short enough to open ordinary text.
const fn sig_confirmed(
    offset: usize,
    magic: &'static [u8],
    at: usize,
    then: &'static [u8],
) -> Signature {
    Signature {
        offset,
        magic,
        confirm: Some((at, then)),
    }
}

impl Signature {
    fn matches(&self, sample: &[u8]) -> bool {
        window_is(sample, self.offset, self.magic)
            && self
                .confirm
                .is_none_or(|(at, then)| window_is(sample, at, then))
    }
}

fn window_is(sample: &[u8], offset: usize, magic: &[u8]) -> bool {
    offset
        .checked_add(magic.len())
        .and_then(|end| sample.get(offset..end))
        .is_some_and(|window| window == magic)
}

/// Offset of the `e_lfanew` field in a DOS header.
const PE_POINTER_OFFSET: usize = 0x3c;

/// A DOS stub whose `e_lfanew` points at a `PE\0\0` header inside the sample.
fn is_portable_executable(sample: &[u8]) -> bool {
    if !sample.starts_with(b"MZ") {
        return false;
    }
    let Some(pointer) = sample.get(PE_POINTER_OFFSET..PE_POINTER_OFFSET + 4) else {
        return false;
    };
    let offset = u32::from_le_bytes([pointer[0], pointer[1], pointer[2], pointer[3]]) as usize;
    window_is(sample, offset, b"PE\x00\x00")
}

/// Known binary file signatures.
const SIGNATURES: &[Signature] = &[
    // Images
    sig(0, b"\x89PNG\r\n\x1a\n"),
    sig(0, b"\xff\xd8\xff"),
    sig(0, b"GIF87a"),
    sig(0, b"GIF89a"),
    sig(0, b"II*\x00"),
    sig(0, b"MM\x00*"),
    sig(0, b"\x00\x00\x01\x00"),
    sig(8, b"WEBP"),
    // Documents
    sig(0, b"%PDF-"),
    // Archives and compression
    sig(0, b"PK\x03\x04"),
    sig(0, b"PK\x05\x06"),
    sig(0, b"\x1f\x8b"),
    sig_confirmed(0, b"BZh", 4, b"1AY&SY"),
    sig(0, b"\xfd7zXZ\x00"),
    sig(0, b"7z\xbc\xaf\x27\x1c"),
    sig(0, b"Rar!\x1a\x07"),
    sig(0, b"\x28\xb5\x2f\xfd"),
    sig(257, b"ustar"),
    // Executables and object code
    sig(0, b"\x7fELF"),
    sig(0, b"\xfe\xed\xfa\xce"),
    sig(0, b"\xfe\xed\xfa\xcf"),
    sig(0, b"\xce\xfa\xed\xfe"),
    sig(0, b"\xcf\xfa\xed\xfe"),
    sig(0, b"\xca\xfe\xba\xbe"),
    sig(0, b"\x00asm"),
    // Databases
    sig(0, b"SQLite format 3\x00"),
    // Audio and video
    sig(0, b"OggS"),
    sig(0, b"ID3\x02"),
    sig(0, b"ID3\x03"),
    sig(0, b"ID3\x04"),
    sig(0, b"fLaC"),
    sig(4, b"ftyp"),
    // Fonts
    sig(0, b"wOFF"),
    sig(0, b"wOF2"),
    sig(0, b"\x00\x01\x00\x00"),
    sig(0, b"OTTO"),
];

/// Heuristic binary/text classifier.
///
/// Holds no state besides the size limit, so it is freely shared across
/// workers.
#[derive(Debug, Clone, Copy)]
pub struct BinaryDetector {
    max_size: u64,
}

impl BinaryDetector {
    /// Create a detector that skips files larger than `max_size` bytes.
    pub fn new(max_size: u64) -> Self {
        Self { max_size }
    }

    /// The configured size limit.
    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    /// Whether a file of `size` bytes is eligible for sampling.
    pub fn within_limit(&self, size: u64) -> bool {
        size <= self.max_size
    }

    /// Classify the file at `path`.
    ///
    /// Oversized files and any I/O failure yield `false`: a file is never
    /// excluded from text handling because it could not be read.
    pub fn is_binary(&self, path: &Path) -> bool {
        let Ok(metadata) = std::fs::metadata(path) else {
            return false;
        };
        if !self.within_limit(metadata.len()) {
            return false;
        }

        match read_sample(path) {
            Ok(sample) => Self::is_binary_sample(&sample),
            Err(err) => {
                tracing::debug!(path = %path.display(), %err, "binary sniff failed, treating as text");
                false
            }
        }
    }

    /// Classify a leading sample of file content.
    pub fn is_binary_sample(sample: &[u8]) -> bool {
        SIGNATURES.iter().any(|s| s.matches(sample))
            || is_portable_executable(sample)
            || sample.contains(&0)
    }
}

impl Default for BinaryDetector {
    fn default() -> Self {
        Self::new(DEFAULT_BINARY_SIZE_LIMIT)
    }
}

fn read_sample(path: &Path) -> std::io::Result<Vec<u8>> {
    let mut sample = Vec::with_capacity(SAMPLE_SIZE);
    File::open(path)?
        .take(SAMPLE_SIZE as u64)
        .read_to_end(&mut sample)?;
    Ok(sample)
}
