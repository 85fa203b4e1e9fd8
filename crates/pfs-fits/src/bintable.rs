//! FITS binary table extension reading and writing.
//!
//! Scalar columns (`L I J K E D`, plus `A` strings) live in the fixed-width
//! row area. Variable-length columns (`PL PJ PE PD`) store a 32-bit
//! descriptor `(count, heap offset)` in the row and their elements in the heap
//! that follows the main table; the heap starts at `THEAP` bytes into the data
//! segment (by default immediately after the last row).

use log::debug;

use crate::block::{pad_to_block, DATA_PAD_BYTE};
use crate::endian::{decode_be, extend_be, BeElement};
use crate::error::{Error, Result};
use crate::hdu::Hdu;
use crate::header::{
    card_integer, card_string, is_reserved_keyword, require_integer, serialize_header, Card,
};
use crate::value::Value;

/// Element type of a column (the letter of its TFORM code).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    /// `L`: logical, one byte (`T`/`F`).
    Logical,
    /// `I`: 16-bit signed integer.
    Short,
    /// `J`: 32-bit signed integer.
    Int,
    /// `K`: 64-bit signed integer.
    Long,
    /// `E`: 32-bit IEEE float.
    Float,
    /// `D`: 64-bit IEEE float.
    Double,
    /// `A`: ASCII character.
    Ascii,
}

impl ElementType {
    fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            b'L' => ElementType::Logical,
            b'I' => ElementType::Short,
            b'J' => ElementType::Int,
            b'K' => ElementType::Long,
            b'E' => ElementType::Float,
            b'D' => ElementType::Double,
            b'A' => ElementType::Ascii,
            _ => return None,
        })
    }

    fn code(self) -> char {
        match self {
            ElementType::Logical => 'L',
            ElementType::Short => 'I',
            ElementType::Int => 'J',
            ElementType::Long => 'K',
            ElementType::Float => 'E',
            ElementType::Double => 'D',
            ElementType::Ascii => 'A',
        }
    }
}

/// Byte size of one element of a TFORM type code, for every code the
/// standard defines (including the ones this codec does not decode).
fn element_size(code: u8) -> Option<usize> {
    Some(match code {
        b'L' | b'B' | b'A' => 1,
        b'I' => 2,
        b'J' | b'E' => 4,
        b'K' | b'D' | b'C' | b'P' => 8,
        b'M' | b'Q' => 16,
        _ => return None,
    })
}

/// Layout of one column as declared by its TFORM value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnFormat {
    /// `rT`: `repeat` elements stored inline in every row.
    Fixed { element: ElementType, repeat: usize },
    /// `1PT(max)`: a heap descriptor in the row; `max_len` is the longest cell.
    Variable { element: ElementType, max_len: usize },
}

impl ColumnFormat {
    /// The TFORM string for this format.
    pub fn tform(&self) -> String {
        match self {
            ColumnFormat::Fixed { element, repeat } => format!("{repeat}{}", element.code()),
            ColumnFormat::Variable { element, max_len } => {
                format!("1P{}({max_len})", element.code())
            }
        }
    }

    /// Bytes occupied in each row.
    pub fn byte_width(&self) -> usize {
        match self {
            ColumnFormat::Fixed { element, repeat } => {
                repeat * element_size(element.code() as u8).unwrap_or(1)
            }
            ColumnFormat::Variable { .. } => 8,
        }
    }
}

/// Split a TFORM value into `(repeat, type code, variable element code)`.
fn split_tform(tform: &str) -> Result<(usize, u8, Option<u8>)> {
    let unsupported = || Error::UnsupportedFormat(format!("TFORM {tform:?}"));
    let s = tform.trim();
    let s = s.find('(').map_or(s, |paren| &s[..paren]);
    let digits = s.bytes().take_while(|b| b.is_ascii_digit()).count();
    let repeat = if digits == 0 {
        1
    } else {
        s[..digits].parse::<usize>().map_err(|_| unsupported())?
    };
    let rest = s[digits..].as_bytes();
    match rest {
        [code] => Ok((repeat, *code, None)),
        [desc @ (b'P' | b'Q'), code] => Ok((repeat, *desc, Some(*code))),
        _ => Err(unsupported()),
    }
}

/// Bytes a TFORM value occupies in each row.
fn tform_byte_width(tform: &str) -> Result<usize> {
    let (repeat, code, _) = split_tform(tform)?;
    if code == b'X' {
        return Ok(repeat.div_ceil(8));
    }
    let size = element_size(code).ok_or_else(|| Error::UnsupportedFormat(tform.to_string()))?;
    repeat
        .checked_mul(size)
        .ok_or_else(|| Error::UnsupportedFormat(tform.to_string()))
}

/// Parse a TFORM value into a format this codec can decode, or `None` for
/// valid but undecoded layouts (bit arrays, complex numbers, 64-bit
/// descriptors, multi-element numeric cells).
pub fn parse_tform(tform: &str) -> Result<Option<ColumnFormat>> {
    let (repeat, code, var_code) = split_tform(tform)?;
    let format = match var_code {
        Some(var_code) if code == b'P' && repeat == 1 => {
            match ElementType::from_code(var_code) {
                Some(element @ (ElementType::Logical
                | ElementType::Int
                | ElementType::Float
                | ElementType::Double)) => Some(ColumnFormat::Variable { element, max_len: 0 }),
                _ => None,
            }
        }
        Some(_) => None,
        None => match ElementType::from_code(code) {
            Some(ElementType::Ascii) => Some(ColumnFormat::Fixed {
                element: ElementType::Ascii,
                repeat,
            }),
            Some(element) if repeat == 1 => Some(ColumnFormat::Fixed { element, repeat }),
            _ => None,
        },
    };
    if format.is_none() {
        // Still has to be a legal code so the row layout can be computed.
        tform_byte_width(tform)?;
    }
    Ok(format)
}

/// Values of one column, one entry per row.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Logical(Vec<bool>),
    Short(Vec<i16>),
    Int(Vec<i32>),
    Long(Vec<i64>),
    Float(Vec<f32>),
    Double(Vec<f64>),
    Ascii(Vec<String>),
    VarLogical(Vec<Vec<bool>>),
    VarInt(Vec<Vec<i32>>),
    VarFloat(Vec<Vec<f32>>),
    VarDouble(Vec<Vec<f64>>),
}

impl ColumnData {
    /// Number of rows.
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Logical(v) => v.len(),
            ColumnData::Short(v) => v.len(),
            ColumnData::Int(v) => v.len(),
            ColumnData::Long(v) => v.len(),
            ColumnData::Float(v) => v.len(),
            ColumnData::Double(v) => v.len(),
            ColumnData::Ascii(v) => v.len(),
            ColumnData::VarLogical(v) => v.len(),
            ColumnData::VarInt(v) => v.len(),
            ColumnData::VarFloat(v) => v.len(),
            ColumnData::VarDouble(v) => v.len(),
        }
    }

    /// Returns `true` if there are no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// TFORM-style name of the stored type, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            ColumnData::Logical(_) => "L",
            ColumnData::Short(_) => "I",
            ColumnData::Int(_) => "J",
            ColumnData::Long(_) => "K",
            ColumnData::Float(_) => "E",
            ColumnData::Double(_) => "D",
            ColumnData::Ascii(_) => "A",
            ColumnData::VarLogical(_) => "PL",
            ColumnData::VarInt(_) => "PJ",
            ColumnData::VarFloat(_) => "PE",
            ColumnData::VarDouble(_) => "PD",
        }
    }

    /// The format this data is written with.
    fn format(&self) -> ColumnFormat {
        fn longest<T>(cells: &[Vec<T>]) -> usize {
            cells.iter().map(Vec::len).max().unwrap_or(0)
        }
        let fixed = |element| ColumnFormat::Fixed { element, repeat: 1 };
        let variable = |element, max_len| ColumnFormat::Variable { element, max_len };
        match self {
            ColumnData::Logical(_) => fixed(ElementType::Logical),
            ColumnData::Short(_) => fixed(ElementType::Short),
            ColumnData::Int(_) => fixed(ElementType::Int),
            ColumnData::Long(_) => fixed(ElementType::Long),
            ColumnData::Float(_) => fixed(ElementType::Float),
            ColumnData::Double(_) => fixed(ElementType::Double),
            ColumnData::Ascii(v) => ColumnFormat::Fixed {
                element: ElementType::Ascii,
                repeat: v.iter().map(String::len).max().unwrap_or(0).max(1),
            },
            ColumnData::VarLogical(v) => variable(ElementType::Logical, longest(v)),
            ColumnData::VarInt(v) => variable(ElementType::Int, longest(v)),
            ColumnData::VarFloat(v) => variable(ElementType::Float, longest(v)),
            ColumnData::VarDouble(v) => variable(ElementType::Double, longest(v)),
        }
    }
}

/// A named column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// Column name (TTYPEn).
    pub name: String,
    /// Column values.
    pub data: ColumnData,
}

/// A binary table extension, either built for writing or decoded from a file.
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryTable {
    name: String,
    nrows: usize,
    columns: Vec<Column>,
    cards: Vec<Card>,
}

macro_rules! typed_accessor {
    ($(#[$doc:meta])* $fn_name:ident, $variant:ident, $elem:ty) => {
        $(#[$doc])*
        pub fn $fn_name(&self, name: &str) -> Result<&[$elem]> {
            match self.column(name)? {
                ColumnData::$variant(values) => Ok(values),
                other => Err(Error::ColumnType {
                    column: name.to_string(),
                    expected: ColumnData::$variant(Vec::new()).type_name(),
                    found: other.type_name(),
                }),
            }
        }
    };
}

impl BinaryTable {
    /// An empty table that will be written with `EXTNAME = name`.
    pub fn new(name: impl Into<String>) -> Self {
        BinaryTable {
            name: name.into(),
            nrows: 0,
            columns: Vec::new(),
            cards: Vec::new(),
        }
    }

    /// Append a column. The first column fixes the row count.
    pub fn with_column(mut self, name: impl Into<String>, data: ColumnData) -> Self {
        if self.columns.is_empty() {
            self.nrows = data.len();
        }
        self.columns.push(Column {
            name: name.into(),
            data,
        });
        self
    }

    /// Append an extra header card.
    pub fn with_card(mut self, card: Card) -> Self {
        self.cards.push(card);
        self
    }

    /// EXTNAME of the table.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of rows.
    pub fn nrows(&self) -> usize {
        self.nrows
    }

    /// All decoded columns in TFIELDS order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Header cards that are not part of the table structure.
    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    /// The column called `name`.
    pub fn column(&self, name: &str) -> Result<&ColumnData> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| &c.data)
            .ok_or_else(|| Error::MissingColumn {
                extname: self.name.clone(),
                column: name.to_string(),
            })
    }

    typed_accessor!(
        /// A `J` column.
        int_column, Int, i32
    );
    typed_accessor!(
        /// A `K` column.
        long_column, Long, i64
    );
    typed_accessor!(
        /// An `E` column.
        float_column, Float, f32
    );
    typed_accessor!(
        /// A `D` column.
        double_column, Double, f64
    );
    typed_accessor!(
        /// An `L` column.
        logical_column, Logical, bool
    );
    typed_accessor!(
        /// A `PJ()` column.
        var_int_column, VarInt, Vec<i32>
    );
    typed_accessor!(
        /// A `PE()` column.
        var_float_column, VarFloat, Vec<f32>
    );
    typed_accessor!(
        /// A `PD()` column.
        var_double_column, VarDouble, Vec<f64>
    );
    typed_accessor!(
        /// A `PL()` column.
        var_logical_column, VarLogical, Vec<bool>
    );

    /// Serialize the extension: header, rows and heap, padded to whole blocks.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        for column in &self.columns {
            if column.data.len() != self.nrows {
                return Err(Error::invalid_value(
                    "NAXIS2",
                    format!(
                        "column {:?} has {} rows, table has {}",
                        column.name,
                        column.data.len(),
                        self.nrows
                    ),
                ));
            }
        }

        let formats: Vec<ColumnFormat> = self.columns.iter().map(|c| c.data.format()).collect();
        let naxis1: usize = formats.iter().map(ColumnFormat::byte_width).sum();

        let mut rows = vec![0u8; naxis1 * self.nrows];
        let mut heap = Vec::new();
        let mut offset = 0;
        for (column, format) in self.columns.iter().zip(&formats) {
            write_column(&mut rows, &mut heap, naxis1, offset, format, column)?;
            offset += format.byte_width();
        }

        let mut cards = vec![
            Card::new("XTENSION", Value::String("BINTABLE".into()))
                .with_comment("binary table extension"),
            Card::new("BITPIX", Value::Integer(8)),
            Card::new("NAXIS", Value::Integer(2)),
            Card::new("NAXIS1", Value::Integer(naxis1 as i64)),
            Card::new("NAXIS2", Value::Integer(self.nrows as i64)),
            Card::new("PCOUNT", Value::Integer(heap.len() as i64)),
            Card::new("GCOUNT", Value::Integer(1)),
            Card::new("TFIELDS", Value::Integer(self.columns.len() as i64)),
        ];
        for (i, (column, format)) in self.columns.iter().zip(&formats).enumerate() {
            let n = i + 1;
            cards.push(Card::new(format!("TTYPE{n}"), Value::String(column.name.clone())));
            cards.push(Card::new(format!("TFORM{n}"), Value::String(format.tform())));
        }
        cards.push(Card::new("EXTNAME", Value::String(self.name.clone())));
        cards.push(Card::new("INHERIT", Value::Logical(true)));
        for card in &self.cards {
            if is_reserved_keyword(&card.keyword) {
                return Err(Error::InvalidKeyword(card.keyword.clone()));
            }
            cards.push(card.clone());
        }

        let mut out = serialize_header(&cards)?;
        let mut data = rows;
        data.extend_from_slice(&heap);
        pad_to_block(&mut data, DATA_PAD_BYTE);
        out.extend_from_slice(&data);

        debug!(
            "serialized table {} ({} rows, {} heap bytes)",
            self.name,
            self.nrows,
            heap.len()
        );
        Ok(out)
    }
}

// ── Writing ──

fn write_fixed<T: BeElement>(rows: &mut [u8], naxis1: usize, offset: usize, values: &[T]) {
    for (row, value) in values.iter().enumerate() {
        value.write_be(&mut rows[row * naxis1 + offset..]);
    }
}

fn push_descriptor(
    rows: &mut [u8],
    heap: &mut Vec<u8>,
    naxis1: usize,
    offset: usize,
    row: usize,
    count: usize,
    column: &str,
) -> Result<()> {
    let heap_offset = heap.len();
    let (count, heap_offset) = match (i32::try_from(count), i32::try_from(heap_offset)) {
        (Ok(c), Ok(o)) => (c, o),
        _ => {
            return Err(Error::HeapOverflow {
                column: column.to_string(),
                row,
            })
        }
    };
    let base = row * naxis1 + offset;
    count.write_be(&mut rows[base..]);
    heap_offset.write_be(&mut rows[base + 4..]);
    Ok(())
}

fn write_var<T: BeElement>(
    rows: &mut [u8],
    heap: &mut Vec<u8>,
    naxis1: usize,
    offset: usize,
    cells: &[Vec<T>],
    column: &str,
) -> Result<()> {
    for (row, cell) in cells.iter().enumerate() {
        push_descriptor(rows, heap, naxis1, offset, row, cell.len(), column)?;
        extend_be(heap, cell);
    }
    Ok(())
}

fn write_column(
    rows: &mut [u8],
    heap: &mut Vec<u8>,
    naxis1: usize,
    offset: usize,
    format: &ColumnFormat,
    column: &Column,
) -> Result<()> {
    let name = column.name.as_str();
    match &column.data {
        ColumnData::Logical(values) => {
            for (row, &b) in values.iter().enumerate() {
                rows[row * naxis1 + offset] = if b { b'T' } else { b'F' };
            }
        }
        ColumnData::Short(values) => write_fixed(rows, naxis1, offset, values),
        ColumnData::Int(values) => write_fixed(rows, naxis1, offset, values),
        ColumnData::Long(values) => write_fixed(rows, naxis1, offset, values),
        ColumnData::Float(values) => write_fixed(rows, naxis1, offset, values),
        ColumnData::Double(values) => write_fixed(rows, naxis1, offset, values),
        ColumnData::Ascii(values) => {
            let width = format.byte_width();
            for (row, s) in values.iter().enumerate() {
                if !s.is_ascii() {
                    return Err(Error::invalid_value(name, "string cell is not ASCII"));
                }
                let base = row * naxis1 + offset;
                let cell = &mut rows[base..base + width];
                cell.fill(b' ');
                cell[..s.len()].copy_from_slice(s.as_bytes());
            }
        }
        ColumnData::VarLogical(cells) => {
            for (row, cell) in cells.iter().enumerate() {
                push_descriptor(rows, heap, naxis1, offset, row, cell.len(), name)?;
                heap.extend(cell.iter().map(|&b| if b { b'T' } else { b'F' }));
            }
        }
        ColumnData::VarInt(cells) => write_var(rows, heap, naxis1, offset, cells, name)?,
        ColumnData::VarFloat(cells) => write_var(rows, heap, naxis1, offset, cells, name)?,
        ColumnData::VarDouble(cells) => write_var(rows, heap, naxis1, offset, cells, name)?,
    }
    Ok(())
}

// ── Reading ──

/// Location of the table pieces inside the data segment.
struct TableLayout<'a> {
    rows: &'a [u8],
    heap: &'a [u8],
    naxis1: usize,
    naxis2: usize,
}

impl TableLayout<'_> {
    fn read_fixed<T: BeElement>(&self, offset: usize) -> Vec<T> {
        (0..self.naxis2)
            .map(|row| T::read_be(&self.rows[row * self.naxis1 + offset..]))
            .collect()
    }

    /// Heap bytes for every row of a variable-length column.
    fn var_cells(&self, offset: usize, elem_size: usize, column: &str) -> Result<Vec<&[u8]>> {
        (0..self.naxis2)
            .map(|row| {
                let base = row * self.naxis1 + offset;
                let count = i32::read_be(&self.rows[base..]) as u32 as usize;
                let start = i32::read_be(&self.rows[base + 4..]) as u32 as usize;
                let end = count
                    .checked_mul(elem_size)
                    .and_then(|len| start.checked_add(len))
                    .filter(|&end| end <= self.heap.len())
                    .ok_or_else(|| Error::HeapOverflow {
                        column: column.to_string(),
                        row,
                    })?;
                Ok(&self.heap[start..end])
            })
            .collect()
    }

    fn read_var<T: BeElement>(&self, offset: usize, column: &str) -> Result<Vec<Vec<T>>> {
        Ok(self
            .var_cells(offset, T::SIZE, column)?
            .into_iter()
            .map(decode_be::<T>)
            .collect())
    }

    fn read_column(&self, offset: usize, format: ColumnFormat, column: &str) -> Result<ColumnData> {
        let is_true = |b: &u8| *b == b'T';
        Ok(match format {
            ColumnFormat::Fixed { element, repeat } => match element {
                ElementType::Logical => ColumnData::Logical(
                    (0..self.naxis2)
                        .map(|row| is_true(&self.rows[row * self.naxis1 + offset]))
                        .collect(),
                ),
                ElementType::Short => ColumnData::Short(self.read_fixed(offset)),
                ElementType::Int => ColumnData::Int(self.read_fixed(offset)),
                ElementType::Long => ColumnData::Long(self.read_fixed(offset)),
                ElementType::Float => ColumnData::Float(self.read_fixed(offset)),
                ElementType::Double => ColumnData::Double(self.read_fixed(offset)),
                ElementType::Ascii => ColumnData::Ascii(
                    (0..self.naxis2)
                        .map(|row| {
                            let base = row * self.naxis1 + offset;
                            let cell = &self.rows[base..base + repeat];
                            let end = cell.iter().position(|&b| b == 0).unwrap_or(repeat);
                            String::from_utf8_lossy(&cell[..end]).trim_end().to_string()
                        })
                        .collect(),
                ),
            },
            ColumnFormat::Variable { element, .. } => match element {
                ElementType::Logical => ColumnData::VarLogical(
                    self.var_cells(offset, 1, column)?
                        .into_iter()
                        .map(|cell| cell.iter().map(is_true).collect())
                        .collect(),
                ),
                ElementType::Int => ColumnData::VarInt(self.read_var(offset, column)?),
                ElementType::Float => ColumnData::VarFloat(self.read_var(offset, column)?),
                ElementType::Double => ColumnData::VarDouble(self.read_var(offset, column)?),
                other => {
                    return Err(Error::UnsupportedFormat(format!(
                        "variable-length {other:?} column {column:?}"
                    )))
                }
            },
        })
    }
}

fn to_usize(value: i64, keyword: &str) -> Result<usize> {
    usize::try_from(value).map_err(|_| Error::invalid_value(keyword, "must not be negative"))
}

/// Decode a binary table HDU located in `fits_data`.
///
/// Columns whose layout this codec does not decode are skipped; asking for
/// them later yields [`Error::MissingColumn`].
pub fn read_binary_table(fits_data: &[u8], hdu: &Hdu) -> Result<BinaryTable> {
    let cards = &hdu.cards;
    if hdu.xtension() != Some("BINTABLE") {
        return Err(Error::UnsupportedFormat(format!(
            "extension {:?} is not a binary table",
            hdu.extname().unwrap_or("")
        )));
    }

    let naxis1 = to_usize(require_integer(cards, "NAXIS1")?, "NAXIS1")?;
    let naxis2 = to_usize(require_integer(cards, "NAXIS2")?, "NAXIS2")?;
    let tfields = to_usize(require_integer(cards, "TFIELDS")?, "TFIELDS")?;
    let main_len = naxis1
        .checked_mul(naxis2)
        .ok_or(Error::InvalidHeader("data size overflows"))?;
    let theap = match card_integer(cards, "THEAP") {
        Some(theap) => to_usize(theap, "THEAP")?,
        None => main_len,
    };

    let data = fits_data
        .get(hdu.data_start..)
        .and_then(|rest| rest.get(..hdu.data_len))
        .ok_or(Error::UnexpectedEof)?;
    if main_len > data.len() || theap < main_len || theap > data.len() {
        return Err(Error::InvalidHeader("table size disagrees with data segment"));
    }
    let layout = TableLayout {
        rows: &data[..main_len],
        heap: &data[theap..],
        naxis1,
        naxis2,
    };

    let name = hdu.extname().unwrap_or_default().to_string();
    let mut table = BinaryTable::new(name.clone());
    table.nrows = naxis2;

    let mut offset = 0usize;
    for n in 1..=tfields {
        let tform_key = format!("TFORM{n}");
        let tform = card_string(cards, &tform_key)
            .ok_or_else(|| Error::MissingKeyword(tform_key.clone()))?;
        let column = card_string(cards, &format!("TTYPE{n}"))
            .map(str::to_string)
            .unwrap_or_else(|| format!("COL{n}"));
        let width = tform_byte_width(tform)?;
        if offset.checked_add(width).map_or(true, |end| end > naxis1) {
            return Err(Error::InvalidHeader("columns are wider than NAXIS1"));
        }

        match parse_tform(tform)? {
            Some(format) => {
                let data = layout.read_column(offset, format, &column)?;
                table.columns.push(Column { name: column, data });
            }
            None => debug!("{name}: skipping column {column:?} with TFORM {tform:?}"),
        }
        offset += width;
    }
    if offset != naxis1 {
        return Err(Error::InvalidHeader("column widths do not add up to NAXIS1"));
    }

    table.cards = cards
        .iter()
        .filter(|c| !c.is_commentary() && !is_reserved_keyword(&c.keyword))
        .cloned()
        .collect();
    Ok(table)
}
