//! Reading and writing containers on disk.
//!
//! Files whose first bytes are the gzip magic are inflated on read, and paths
//! ending in `.gz` are deflated on write. Both need the `gzip` feature.

use std::fs::File;
#[cfg(feature = "gzip")]
use std::io::Read;
use std::io::{BufWriter, Write};
use std::path::Path;

#[cfg(feature = "gzip")]
use flate2::{read::MultiGzDecoder, write::GzEncoder, Compression};
use log::debug;

use crate::error::{Error, Result};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Does this buffer start with the gzip magic bytes?
pub fn is_gzip(data: &[u8]) -> bool {
    data.starts_with(&GZIP_MAGIC)
}

/// Read a whole file, inflating it if it is gzip-compressed.
pub fn read_file(path: &Path) -> Result<Vec<u8>> {
    let data = std::fs::read(path)?;
    if is_gzip(&data) {
        debug!("{} is gzip-compressed", path.display());
        return gunzip(&data);
    }
    Ok(data)
}

/// Write `bytes` to `path`, gzip-compressing them when the name ends in `.gz`.
pub fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let compress = path.extension().is_some_and(|ext| ext == "gz");
    let mut file = BufWriter::new(File::create(path)?);
    if compress {
        file.write_all(&gzip(bytes)?)?;
    } else {
        file.write_all(bytes)?;
    }
    file.flush()?;
    debug!("wrote {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}

/// Inflate a gzip stream. Concatenated members (as written by `pigz` or
/// `bgzip`) are inflated in turn; each member's CRC is checked.
#[cfg(feature = "gzip")]
pub fn gunzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len().saturating_mul(4));
    MultiGzDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(|e| Error::Decompression(e.to_string()))?;
    Ok(out)
}

#[cfg(not(feature = "gzip"))]
pub fn gunzip(_data: &[u8]) -> Result<Vec<u8>> {
    Err(Error::UnsupportedFormat(
        "gzip-compressed file (built without the gzip feature)".into(),
    ))
}

/// Compress `data` into a single gzip member.
#[cfg(feature = "gzip")]
pub fn gzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 2), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

#[cfg(not(feature = "gzip"))]
pub fn gzip(_data: &[u8]) -> Result<Vec<u8>> {
    Err(Error::UnsupportedFormat(
        "writing .gz (built without the gzip feature)".into(),
    ))
}

#[cfg(all(test, feature = "gzip"))]
mod tests {
    use super::*;

    #[test]
    fn gzip_round_trip() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let packed = gzip(&data).unwrap();
        assert!(is_gzip(&packed));
        assert!(packed.len() < data.len());
        assert_eq!(gunzip(&packed).unwrap(), data);
    }

    #[test]
    fn gunzip_reads_concatenated_members() {
        let data: Vec<u8> = (0..5760u32).map(|i| (i % 97) as u8).collect();
        let (head, tail) = data.split_at(1000);
        let mut packed = gzip(head).unwrap();
        packed.extend(gzip(tail).unwrap());
        assert_eq!(gunzip(&packed).unwrap(), data);
    }

    #[test]
    fn gunzip_detects_corruption() {
        let mut packed = gzip(b"some header text, long enough").unwrap();
        let n = packed.len();
        packed[n - 8] ^= 0xff;
        assert!(matches!(gunzip(&packed), Err(Error::Decompression(_))));
        assert!(gunzip(&[0x1f, 0x8b, 0x08]).is_err());
    }

    #[test]
    fn files_are_compressed_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let data = vec![b' '; 2880];

        let plain = dir.path().join("a.fits");
        write_file(&plain, &data).unwrap();
        assert_eq!(std::fs::read(&plain).unwrap(), data);

        let packed = dir.path().join("a.fits.gz");
        write_file(&packed, &data).unwrap();
        let raw = std::fs::read(&packed).unwrap();
        assert!(is_gzip(&raw));
        assert_eq!(read_file(&packed).unwrap(), data);
    }
}
