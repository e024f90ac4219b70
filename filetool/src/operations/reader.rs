use memmap2::Mmap;
use std::fs::File;
use std::ops::Deref;
use std::path::Path;
use tracing::{trace, warn};

use crate::config::EncodingMode;
use crate::errors::{ProcessError, ProcessResult};

/// Files at or above this size are memory-mapped instead of read into a buffer
pub(crate) const LARGE_FILE_THRESHOLD: u64 = 10 * 1024 * 1024; // 10MB

/// Decodes bytes into a String according to the encoding mode
fn decode_bytes(bytes: &[u8], path: &Path, encoding_mode: EncodingMode) -> ProcessResult<String> {
    match encoding_mode {
        EncodingMode::FailFast => match std::str::from_utf8(bytes) {
            Ok(valid_str) => Ok(valid_str.to_owned()),
            Err(_) => {
                // Rebuild as FromUtf8Error so the error keeps the offending bytes
                let from_utf8_err = match String::from_utf8(bytes.to_vec()) {
                    Ok(s) => return Ok(s),
                    Err(e) => e,
                };
                Err(ProcessError::encoding(path, from_utf8_err))
            }
        },
        EncodingMode::Lossy => {
            let cow = String::from_utf8_lossy(bytes);
            if let std::borrow::Cow::Owned(_) = cow {
                warn!("Invalid UTF-8 replaced in file: {}", path.display());
            }
            Ok(cow.into_owned())
        }
    }
}

/// Raw file contents, either read into memory or memory-mapped
pub enum FileBytes {
    Buffered(Vec<u8>),
    Mapped(Mmap),
}

impl Deref for FileBytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            FileBytes::Buffered(bytes) => bytes,
            FileBytes::Mapped(mmap) => mmap,
        }
    }
}

/// Reads a whole file without decoding it, choosing the read strategy by size
pub fn read_bytes(path: &Path) -> ProcessResult<FileBytes> {
    let size = match path.metadata() {
        Ok(metadata) => metadata.len(),
        Err(e) => return Err(ProcessError::from_io(path, e)),
    };

    if size >= LARGE_FILE_THRESHOLD {
        trace!("Memory mapping {} ({} bytes)", path.display(), size);
        let file = File::open(path).map_err(|e| ProcessError::from_io(path, e))?;
        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| ProcessError::from_io(path, e))?;
        Ok(FileBytes::Mapped(mmap))
    } else {
        trace!("Reading {} ({} bytes)", path.display(), size);
        let bytes = std::fs::read(path).map_err(|e| ProcessError::from_io(path, e))?;
        Ok(FileBytes::Buffered(bytes))
    }
}

/// Reads a whole file as text
pub fn read_text(path: &Path, encoding_mode: EncodingMode) -> ProcessResult<String> {
    let bytes = read_bytes(path)?;
    decode_bytes(&bytes, path, encoding_mode)
}
