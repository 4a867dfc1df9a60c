//! The hard-link/gzip copy helper shared by artifact insertion and the
//! cache-hit copy-out path.

use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use filetime::FileTime;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::StoreError;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Environment-derived settings governing how [`copy_in`]/[`copy_out`]
/// move bytes between a build directory and the store.
#[derive(Debug, Clone, Copy)]
pub struct CopyOptions {
    /// Honor `CLCACHE_HARDLINK`: prefer a hard link over a byte copy.
    pub hardlink: bool,
    /// Honor `CLCACHE_COMPRESS`: store the payload gzip-compressed.
    pub compress: bool,
    /// `CLCACHE_COMPRESSLEVEL`, 0-9, default 6.
    pub compress_level: u32,
}

impl Default for CopyOptions {
    fn default() -> Self {
        Self {
            hardlink: false,
            compress: false,
            compress_level: 6,
        }
    }
}

fn io_err(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn link_or_copy(src: &Path, dst: &Path, hardlink: bool) -> Result<(), StoreError> {
    if hardlink {
        match fs::hard_link(src, dst) {
            Ok(()) => {
                let now = FileTime::now();
                filetime::set_file_mtime(dst, now).map_err(|e| io_err(dst, e))?;
                return Ok(());
            }
            Err(_) => {
                // Cross-device link or platform refusal: fall through to a
                // byte copy, matching the original's EXDEV fallback.
            }
        }
    }
    fs::copy(src, dst).map_err(|e| io_err(dst, e))?;
    Ok(())
}

/// Copies `src` (a build-directory object file) into `dst` (the store),
/// hard-linking or gzip-compressing per `opts`.
pub fn copy_in(src: &Path, dst: &Path, opts: &CopyOptions) -> Result<u64, StoreError> {
    if opts.compress {
        let data = fs::read(src).map_err(|e| io_err(src, e))?;
        let mut encoder = GzEncoder::new(Vec::new(), Compression::new(opts.compress_level));
        encoder.write_all(&data).map_err(|e| io_err(dst, e))?;
        let compressed = encoder.finish().map_err(|e| io_err(dst, e))?;
        let len = compressed.len() as u64;
        fs::write(dst, compressed).map_err(|e| io_err(dst, e))?;
        Ok(len)
    } else {
        link_or_copy(src, dst, opts.hardlink)?;
        fs::metadata(dst).map(|m| m.len()).map_err(|e| io_err(dst, e))
    }
}

/// Copies `src` (a store entry) out to `dst` (the build directory),
/// decompressing per `opts`. Detects a mismatch between the compressed-ness
/// of the stored payload and `opts.compress` via the gzip magic bytes.
pub fn copy_out(src: &Path, dst: &Path, opts: &CopyOptions) -> Result<(), StoreError> {
    let header = {
        let mut buf = [0u8; 2];
        let mut file = fs::File::open(src).map_err(|e| io_err(src, e))?;
        let n = file.read(&mut buf).map_err(|e| io_err(src, e))?;
        n >= 2 && buf == GZIP_MAGIC
    };

    if header != opts.compress {
        return Err(StoreError::CompressionMismatch {
            path: src.to_path_buf(),
        });
    }

    if opts.compress {
        let data = fs::read(src).map_err(|e| io_err(src, e))?;
        let mut decoder = GzDecoder::new(&data[..]);
        let mut out = Vec::new();
        decoder.read_to_end(&mut out).map_err(|e| io_err(src, e))?;
        fs::write(dst, out).map_err(|e| io_err(dst, e))
    } else {
        link_or_copy(src, dst, opts.hardlink)
    }
}
