//! A small FITS container codec: primary headers with keyword cards, and
//! binary table extensions with fixed-width and variable-length columns.
//!
//! ```no_run
//! use pfs_fits::{BinaryTable, ColumnData, FitsBuilder, FitsFile};
//!
//! let table = BinaryTable::new("FIBERS")
//!     .with_column("fiberId", ColumnData::Int(vec![1, 2, 3]));
//! let mut builder = FitsBuilder::new(&[])?;
//! builder.add_table(&table)?;
//! builder.write_to("fibers.fits.gz")?;
//!
//! let fits = FitsFile::open("fibers.fits.gz")?;
//! let fibers = fits.read_table("FIBERS")?;
//! assert_eq!(fibers.int_column("fiberId")?, &[1, 2, 3]);
//! # Ok::<(), pfs_fits::Error>(())
//! ```

pub mod bintable;
pub mod block;
pub mod endian;
pub mod error;
pub mod hdu;
pub mod header;
pub mod io;
pub mod value;

pub use bintable::{BinaryTable, Column, ColumnData};
pub use block::{BLOCK_SIZE, CARDS_PER_BLOCK, CARD_SIZE};
pub use error::{Error, Result};
pub use hdu::{FitsBuilder, FitsFile, Hdu};
pub use header::Card;
pub use value::Value;
