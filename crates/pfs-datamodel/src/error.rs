//! Error types for the data model.

use thiserror::Error;

/// Ways the arrays of a product can disagree with each other.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ShapeError {
    #[error("{array} has {actual} entries, expected {expected} (one per fiber)")]
    Length {
        array: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("fiber {fiber_id}: {rows} rows but {profiles} profiles")]
    RowCount {
        fiber_id: i32,
        rows: usize,
        profiles: usize,
    },

    #[error("fiber {fiber_id}: profile {row} has width {actual}, expected {expected}")]
    ProfileWidth {
        fiber_id: i32,
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("fiber {fiber_id}: radius {radius} and oversample {oversample} give no valid profile width")]
    InvalidGeometry {
        fiber_id: i32,
        radius: i32,
        oversample: f32,
    },

    #[error("mask of shape {mask:?} does not match data of shape {data:?}")]
    MaskShape {
        data: (usize, usize),
        mask: (usize, usize),
    },

    #[error("row {row} has {actual} values, expected {expected}")]
    RaggedRows {
        row: usize,
        expected: usize,
        actual: usize,
    },
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Unable to parse filename {filename:?} as {product}")]
    Parse {
        product: &'static str,
        filename: String,
    },

    #[error(transparent)]
    Shape(#[from] ShapeError),

    #[error("fiberId {0} appears more than once")]
    DuplicateId(i32),

    #[error("Unknown {kind} {value:?}")]
    Enum { kind: &'static str, value: String },

    #[error("Identity is missing key {0:?}")]
    MissingKey(String),

    #[error("Bad identity: {0}")]
    Identity(String),

    #[error("Bad metadata keyword {keyword:?}: {reason}")]
    Metadata { keyword: String, reason: String },

    #[error(transparent)]
    Fits(pfs_fits::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<pfs_fits::Error> for Error {
    fn from(e: pfs_fits::Error) -> Self {
        // Keep filesystem failures distinguishable from malformed containers.
        match e {
            pfs_fits::Error::Io(io) => Error::Io(io),
            other => Error::Fits(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fits_io_errors_become_io_errors() {
        let e: Error = pfs_fits::Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "gone",
        ))
        .into();
        assert!(matches!(e, Error::Io(_)));

        let e: Error = pfs_fits::Error::MissingExtension("FIBERS".into()).into();
        assert!(matches!(e, Error::Fits(_)));
        assert_eq!(e.to_string(), "no extension named \"FIBERS\"");
    }

    #[test]
    fn shape_error_messages() {
        let e: Error = ShapeError::ProfileWidth {
            fiber_id: 3,
            row: 0,
            expected: 13,
            actual: 12,
        }
        .into();
        assert_eq!(
            e.to_string(),
            "fiber 3: profile 0 has width 12, expected 13"
        );
    }
}
