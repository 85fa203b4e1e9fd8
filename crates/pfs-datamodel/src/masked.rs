//! Two-dimensional `f32` data with an optional boolean mask (`true` marks a
//! value to be ignored).

use ndarray::{Array2, ArrayView1, Axis};

use crate::error::ShapeError;

#[derive(Debug, Clone)]
pub struct MaskedArray {
    data: Array2<f32>,
    mask: Option<Array2<bool>>,
}

impl MaskedArray {
    /// Pair `data` with a mask of the same shape.
    pub fn new(data: Array2<f32>, mask: Option<Array2<bool>>) -> Result<Self, ShapeError> {
        if let Some(mask) = &mask {
            if mask.dim() != data.dim() {
                return Err(ShapeError::MaskShape {
                    data: data.dim(),
                    mask: mask.dim(),
                });
            }
        }
        Ok(MaskedArray { data, mask })
    }

    /// Data with nothing masked.
    pub fn unmasked(data: Array2<f32>) -> Self {
        MaskedArray { data, mask: None }
    }

    /// No rows, `width` columns.
    pub fn empty(width: usize) -> Self {
        Self::unmasked(Array2::zeros((0, width)))
    }

    /// Assemble from per-row data and per-row masks. An empty mask row means
    /// nothing in that row is masked; if every mask row is empty the result
    /// carries no mask at all. With no rows the array is `(0, empty_width)`.
    pub fn from_rows(
        rows: &[Vec<f32>],
        masks: &[Vec<bool>],
        empty_width: usize,
    ) -> Result<Self, ShapeError> {
        if masks.len() != rows.len() {
            return Err(ShapeError::Length {
                array: "masks",
                expected: rows.len(),
                actual: masks.len(),
            });
        }
        let width = rows.first().map_or(empty_width, Vec::len);

        let mut data = Array2::<f32>::zeros((rows.len(), width));
        for (i, (row, mut out)) in rows.iter().zip(data.axis_iter_mut(Axis(0))).enumerate() {
            if row.len() != width {
                return Err(ShapeError::RaggedRows {
                    row: i,
                    expected: width,
                    actual: row.len(),
                });
            }
            out.assign(&ArrayView1::from(row.as_slice()));
        }

        let mask = if masks.iter().all(Vec::is_empty) {
            None
        } else {
            let mut mask = Array2::from_elem((rows.len(), width), false);
            for (i, (row, mut out)) in masks.iter().zip(mask.axis_iter_mut(Axis(0))).enumerate() {
                if row.is_empty() {
                    continue;
                }
                if row.len() != width {
                    return Err(ShapeError::MaskShape {
                        data: (i, width),
                        mask: (i, row.len()),
                    });
                }
                out.assign(&ArrayView1::from(row.as_slice()));
            }
            Some(mask)
        };

        Ok(MaskedArray { data, mask })
    }

    /// Split into per-row data and per-row masks; mask rows are empty when
    /// there is no mask.
    pub fn to_rows(&self) -> (Vec<Vec<f32>>, Vec<Vec<bool>>) {
        let data = self.data.rows().into_iter().map(|r| r.to_vec()).collect();
        let masks = match &self.mask {
            Some(mask) => mask.rows().into_iter().map(|r| r.to_vec()).collect(),
            None => vec![Vec::new(); self.data.nrows()],
        };
        (data, masks)
    }

    /// The values, masked or not.
    pub fn data(&self) -> &Array2<f32> {
        &self.data
    }

    /// The mask; `None` means nothing is masked.
    pub fn mask(&self) -> Option<&Array2<bool>> {
        self.mask.as_ref()
    }

    /// Number of rows.
    pub fn nrows(&self) -> usize {
        self.data.nrows()
    }

    /// Number of columns.
    pub fn ncols(&self) -> usize {
        self.data.ncols()
    }

    /// Is the value at `(row, col)` masked?
    pub fn is_masked(&self, row: usize, col: usize) -> bool {
        self.mask
            .as_ref()
            .and_then(|m| m.get((row, col)).copied())
            .unwrap_or(false)
    }

    /// Number of masked values.
    pub fn count_masked(&self) -> usize {
        self.mask
            .as_ref()
            .map_or(0, |m| m.iter().filter(|&&b| b).count())
    }

    /// Give a row-less array `width` columns.
    pub(crate) fn set_empty_width(&mut self, width: usize) {
        if self.nrows() == 0 && self.ncols() != width {
            *self = Self::empty(width);
        }
    }
}

/// "No mask" and "nothing masked" are the same thing. Data are compared bit
/// for bit, so NaN samples equal themselves and `-0.0 != 0.0`.
impl PartialEq for MaskedArray {
    fn eq(&self, other: &Self) -> bool {
        let same_data = self.data.dim() == other.data.dim()
            && self
                .data
                .iter()
                .zip(other.data.iter())
                .all(|(a, b)| a.to_bits() == b.to_bits());
        if !same_data {
            return false;
        }
        match (&self.mask, &other.mask) {
            (Some(a), Some(b)) => a == b,
            (Some(m), None) | (None, Some(m)) => !m.iter().any(|&b| b),
            (None, None) => true,
        }
    }
}
