//! Header Data Units: walking a FITS byte stream, and assembling a new one.

use std::path::Path;

use log::{debug, warn};

use crate::bintable::{read_binary_table, BinaryTable};
use crate::block::{padded_byte_len, BLOCK_SIZE};
use crate::error::{Error, Result};
use crate::header::{
    card_integer, card_string, find_card, is_reserved_keyword, parse_header, require_integer,
    serialize_header, Card,
};
use crate::value::Value;

/// A single Header Data Unit located inside a FITS byte stream.
#[derive(Debug, Clone)]
pub struct Hdu {
    /// All header cards (END excluded).
    pub cards: Vec<Card>,
    /// Byte offset where the header begins.
    pub header_start: usize,
    /// Byte offset where the data segment begins.
    pub data_start: usize,
    /// Length of the data segment in bytes (unpadded, heap included).
    pub data_len: usize,
}

impl Hdu {
    /// The EXTNAME of this HDU, if any.
    pub fn extname(&self) -> Option<&str> {
        card_string(&self.cards, "EXTNAME")
    }

    /// The XTENSION type (`BINTABLE`, `IMAGE`, ...); `None` for the primary HDU.
    pub fn xtension(&self) -> Option<&str> {
        card_string(&self.cards, "XTENSION")
    }
}

/// Number of data bytes that follow a header, per the standard formula
/// `|BITPIX|/8 * GCOUNT * (PCOUNT + NAXIS1 * ... * NAXISn)`.
fn compute_data_len(cards: &[Card], is_primary: bool) -> Result<usize> {
    let bitpix = require_integer(cards, "BITPIX")?;
    if !matches!(bitpix, 8 | 16 | 32 | 64 | -32 | -64) {
        return Err(Error::InvalidHeader("invalid BITPIX"));
    }
    let naxis = require_integer(cards, "NAXIS")?;
    if !(0..=999).contains(&naxis) {
        return Err(Error::InvalidHeader("NAXIS out of range"));
    }
    if naxis == 0 {
        return Ok(0);
    }

    let mut count: usize = 1;
    for i in 1..=naxis {
        let n = require_integer(cards, &format!("NAXIS{i}"))?;
        let n = usize::try_from(n).map_err(|_| Error::InvalidHeader("negative NAXISn"))?;
        count = count
            .checked_mul(n)
            .ok_or(Error::InvalidHeader("data size overflows"))?;
    }

    if !is_primary {
        let pcount = card_integer(cards, "PCOUNT").unwrap_or(0);
        let gcount = card_integer(cards, "GCOUNT").unwrap_or(1);
        let (pcount, gcount) = match (usize::try_from(pcount), usize::try_from(gcount)) {
            (Ok(p), Ok(g)) => (p, g),
            _ => return Err(Error::InvalidHeader("negative PCOUNT or GCOUNT")),
        };
        count = count
            .checked_add(pcount)
            .and_then(|n| n.checked_mul(gcount))
            .ok_or(Error::InvalidHeader("data size overflows"))?;
    }

    count
        .checked_mul(bitpix.unsigned_abs() as usize / 8)
        .ok_or(Error::InvalidHeader("data size overflows"))
}

/// Split a complete FITS byte stream into its HDUs.
///
/// Bytes after the last complete HDU that do not form a valid header are
/// ignored (with a warning), as many writers leave trailing padding behind.
pub fn parse_fits(data: &[u8]) -> Result<Vec<Hdu>> {
    if data.len() < BLOCK_SIZE {
        return Err(Error::UnexpectedEof);
    }

    let mut hdus: Vec<Hdu> = Vec::new();
    let mut offset = 0usize;

    while offset + BLOCK_SIZE <= data.len() {
        let is_primary = hdus.is_empty();
        let (cards, header_len) = match parse_header(&data[offset..]) {
            Ok(parts) => parts,
            Err(e) if !is_primary => {
                warn!("ignoring {} trailing bytes: {e}", data.len() - offset);
                break;
            }
            Err(e) => return Err(e),
        };
        let data_len = compute_data_len(&cards, is_primary)?;

        if is_primary && find_card(&cards, "SIMPLE").is_none() {
            return Err(Error::InvalidHeader("first HDU must be primary"));
        }

        let data_start = offset + header_len;
        let data_end = data_start
            .checked_add(data_len)
            .ok_or(Error::InvalidHeader("data size overflows"))?;
        if data_end > data.len() {
            return Err(Error::UnexpectedEof);
        }

        hdus.push(Hdu {
            cards,
            header_start: offset,
            data_start,
            data_len,
        });
        offset = data_start + padded_byte_len(data_len);
    }

    Ok(hdus)
}

/// A FITS container held in memory.
#[derive(Debug, Clone)]
pub struct FitsFile {
    data: Vec<u8>,
    hdus: Vec<Hdu>,
}

impl FitsFile {
    /// Parse a container from bytes.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let hdus = parse_fits(&data)?;
        Ok(FitsFile { data, hdus })
    }

    /// Read a container from disk (gzip-wrapped files are inflated).
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = crate::io::read_file(path.as_ref())?;
        let fits = Self::from_bytes(data)?;
        debug!(
            "opened {} with {} HDUs",
            path.as_ref().display(),
            fits.hdus.len()
        );
        Ok(fits)
    }

    /// The raw bytes of the container.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The primary HDU.
    pub fn primary(&self) -> &Hdu {
        &self.hdus[0]
    }

    /// All HDUs, primary first.
    pub fn hdus(&self) -> &[Hdu] {
        &self.hdus
    }

    /// The first HDU whose EXTNAME is `name`.
    pub fn hdu_by_name(&self, name: &str) -> Result<&Hdu> {
        self.hdus
            .iter()
            .find(|hdu| hdu.extname() == Some(name))
            .ok_or_else(|| Error::MissingExtension(name.to_string()))
    }

    /// Decode the binary table extension called `name`.
    pub fn read_table(&self, name: &str) -> Result<BinaryTable> {
        read_binary_table(&self.data, self.hdu_by_name(name)?)
    }
}

/// Assembles a FITS container: a data-less primary HDU followed by binary
/// table extensions.
#[derive(Debug)]
pub struct FitsBuilder {
    buf: Vec<u8>,
}

impl FitsBuilder {
    /// Start a container whose primary header carries `cards` after the
    /// mandatory `SIMPLE`/`BITPIX`/`NAXIS`/`EXTEND` keywords.
    pub fn new(cards: &[Card]) -> Result<Self> {
        let mut primary = vec![
            Card::new("SIMPLE", Value::Logical(true)).with_comment("conforms to FITS standard"),
            Card::new("BITPIX", Value::Integer(8)),
            Card::new("NAXIS", Value::Integer(0)),
            Card::new("EXTEND", Value::Logical(true)),
        ];
        for card in cards {
            if is_reserved_keyword(&card.keyword) {
                return Err(Error::InvalidKeyword(card.keyword.clone()));
            }
            primary.push(card.clone());
        }
        let buf = serialize_header(&primary)?;
        Ok(FitsBuilder { buf })
    }

    /// Append a binary table extension.
    pub fn add_table(&mut self, table: &BinaryTable) -> Result<&mut Self> {
        let bytes = table.to_bytes()?;
        self.buf.extend_from_slice(&bytes);
        Ok(self)
    }

    /// The finished container.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Write the finished container to `path`, replacing any existing file.
    pub fn write_to<P: AsRef<Path>>(self, path: P) -> Result<()> {
        crate::io::write_file(path.as_ref(), &self.buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bintable::ColumnData;

    #[test]
    fn primary_only_container() {
        let bytes = FitsBuilder::new(&[Card::new("OBSTYPE", Value::String("test".into()))])
            .unwrap()
            .into_bytes();
        assert_eq!(bytes.len(), BLOCK_SIZE);

        let fits = FitsFile::from_bytes(bytes).unwrap();
        assert_eq!(fits.hdus().len(), 1);
        assert_eq!(fits.primary().data_len, 0);
        assert_eq!(card_string(&fits.primary().cards, "OBSTYPE"), Some("test"));
        assert!(fits.primary().xtension().is_none());
    }

    #[test]
    fn builder_rejects_structural_keywords() {
        let result = FitsBuilder::new(&[Card::new("NAXIS", Value::Integer(2))]);
        assert!(matches!(result, Err(Error::InvalidKeyword(_))));
    }

    #[test]
    fn tables_are_found_by_name() {
        let mut builder = FitsBuilder::new(&[]).unwrap();
        builder
            .add_table(&BinaryTable::new("FIRST").with_column("a", ColumnData::Int(vec![1, 2])))
            .unwrap()
            .add_table(&BinaryTable::new("SECOND").with_column("b", ColumnData::Int(vec![3])))
            .unwrap();
        let fits = FitsFile::from_bytes(builder.into_bytes()).unwrap();

        assert_eq!(fits.hdus().len(), 3);
        let second = fits.hdu_by_name("SECOND").unwrap();
        assert_eq!(second.xtension(), Some("BINTABLE"));
        assert!(matches!(
            fits.hdu_by_name("THIRD"),
            Err(Error::MissingExtension(_))
        ));
    }

    #[test]
    fn image_data_length_follows_naxis() {
        let cards = vec![
            Card::new("SIMPLE", Value::Logical(true)),
            Card::new("BITPIX", Value::Integer(-32)),
            Card::new("NAXIS", Value::Integer(2)),
            Card::new("NAXIS1", Value::Integer(10)),
            Card::new("NAXIS2", Value::Integer(3)),
        ];
        assert_eq!(compute_data_len(&cards, true).unwrap(), 120);
    }

    #[test]
    fn rejects_non_primary_start_and_truncation() {
        let table = BinaryTable::new("T").with_column("a", ColumnData::Int(vec![1]));
        let bytes = table.to_bytes().unwrap();
        assert!(matches!(
            parse_fits(&bytes),
            Err(Error::InvalidHeader(_))
        ));

        assert!(matches!(parse_fits(&[0u8; 100]), Err(Error::UnexpectedEof)));
    }

    fn table_header(naxis1: i64, naxis2: i64, pcount: i64) -> Vec<Card> {
        vec![
            Card::new("XTENSION", Value::String("BINTABLE".into())),
            Card::new("BITPIX", Value::Integer(8)),
            Card::new("NAXIS", Value::Integer(2)),
            Card::new("NAXIS1", Value::Integer(naxis1)),
            Card::new("NAXIS2", Value::Integer(naxis2)),
            Card::new("PCOUNT", Value::Integer(pcount)),
            Card::new("GCOUNT", Value::Integer(1)),
            Card::new("TFIELDS", Value::Integer(0)),
        ]
    }

    #[test]
    fn oversized_headers_are_errors() {
        let overflow = |cards: &[Card]| {
            matches!(
                compute_data_len(cards, false),
                Err(Error::InvalidHeader("data size overflows"))
            )
        };
        assert!(overflow(&table_header(i64::MAX, 2, i64::MAX)));
        assert!(overflow(&table_header(i64::MAX, 1, i64::MAX)));
        assert!(overflow(&table_header(1 << 40, 1 << 40, 0)));

        let mut bytes = FitsBuilder::new(&[]).unwrap().into_bytes();
        bytes.extend(serialize_header(&table_header(i64::MAX, 2, i64::MAX)).unwrap());
        assert!(matches!(
            FitsFile::from_bytes(bytes),
            Err(Error::InvalidHeader("data size overflows"))
        ));
    }

    #[test]
    fn data_past_the_end_is_truncation() {
        let mut bytes = FitsBuilder::new(&[]).unwrap().into_bytes();
        bytes.extend(serialize_header(&table_header(8, 1 << 30, 0)).unwrap());
        assert!(matches!(
            FitsFile::from_bytes(bytes),
            Err(Error::UnexpectedEof)
        ));
    }

    #[test]
    fn trailing_garbage_is_ignored() {
        let mut bytes = FitsBuilder::new(&[]).unwrap().into_bytes();
        bytes.extend(std::iter::repeat(0u8).take(BLOCK_SIZE));
        let hdus = parse_fits(&bytes).unwrap();
        assert_eq!(hdus.len(), 1);
    }
}
