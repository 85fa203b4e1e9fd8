//! Fiber trace profiles.
//!
//! The cross-section of each fiber trace is modelled empirically by
//! oversampled vectors measured at a number of detector rows. Each fiber owns
//! a variable number of such profiles, so the collection is jagged; on disk it
//! is flattened into two binary tables joined by `fiberId`:
//!
//! * `FIBERS`, one row per fiber: `fiberId`, `radius`, `oversample`, `norm`.
//! * `PROFILES`, one row per profile: `fiberId`, `rows`, `profiles`, `masks`.

use std::collections::HashMap;
use std::collections::HashSet;
use std::fmt;

use lazy_static::lazy_static;
use log::{debug, warn};
use pfs_fits::{BinaryTable, ColumnData, FitsBuilder, FitsFile};

use crate::error::{Error, Result, ShapeError};
use crate::grammar::{Grammar, KeyType};
use crate::identity::CalibIdentity;
use crate::masked::MaskedArray;
use crate::metadata::{Metadata, MetadataValue};
use crate::product::{FitsProduct, Product};

/// Value of the `OBSTYPE` header keyword marking this product.
pub const OBSTYPE: &str = "fiberProfiles";

lazy_static! {
    static ref GRAMMAR: Grammar = Grammar::new(
        "PfsFiberProfiles",
        "pfsFiberProfiles-%(obsDate)10s-%(visit0)06d-%(arm)1s%(spectrograph)1d.fits",
        r"^pfsFiberProfiles-(?P<obsDate>\S{10})-(?P<visit0>\d{6})-(?P<arm>\S)(?P<spectrograph>\d)\.fits.*$",
        &[
            ("obsDate", KeyType::Str),
            ("visit0", KeyType::Int),
            ("arm", KeyType::Str),
            ("spectrograph", KeyType::Int),
        ],
    )
    .unwrap();
}

/// Number of samples in a profile: `int(2·(radius + 1)·oversample) + 1`.
///
/// `None` when the geometry gives a negative or non-finite width.
pub fn profile_width(radius: i32, oversample: f32) -> Option<usize> {
    let span = 2.0 * (f64::from(radius) + 1.0) * f64::from(oversample);
    if !span.is_finite() || span < 0.0 || span >= usize::MAX as f64 {
        return None;
    }
    Some(span as usize + 1)
}

/// Fiber trace profiles for one calibration.
#[derive(Debug, Clone, PartialEq)]
pub struct PfsFiberProfiles {
    identity: CalibIdentity,
    fiber_id: Vec<i32>,
    radius: Vec<i32>,
    oversample: Vec<f32>,
    rows: Vec<Vec<f32>>,
    profiles: Vec<MaskedArray>,
    norm: Vec<Vec<f32>>,
    metadata: Metadata,
}

impl PfsFiberProfiles {
    /// Assemble and validate.
    ///
    /// For fiber `i`, `rows[i]` lists the detector rows at which the profiles
    /// in `profiles[i]` were measured (one matrix row per entry), and
    /// `norm[i]` is either empty or one value per detector row.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        identity: CalibIdentity,
        fiber_id: Vec<i32>,
        radius: Vec<i32>,
        oversample: Vec<f32>,
        rows: Vec<Vec<f32>>,
        profiles: Vec<MaskedArray>,
        norm: Vec<Vec<f32>>,
        metadata: Metadata,
    ) -> Result<Self> {
        let mut new = PfsFiberProfiles {
            identity,
            fiber_id,
            radius,
            oversample,
            rows,
            profiles,
            norm,
            metadata,
        };
        new.validate()?;
        let geometry = new.radius.iter().zip(&new.oversample);
        for (profile, (&radius, &oversample)) in new.profiles.iter_mut().zip(geometry) {
            profile.set_empty_width(profile_width(radius, oversample).unwrap_or(0));
        }
        Ok(new)
    }

    fn validate(&self) -> Result<()> {
        let n = self.fiber_id.len();
        let lengths = [
            ("radius", self.radius.len()),
            ("oversample", self.oversample.len()),
            ("rows", self.rows.len()),
            ("profiles", self.profiles.len()),
            ("norm", self.norm.len()),
        ];
        for (array, actual) in lengths {
            if actual != n {
                return Err(ShapeError::Length {
                    array,
                    expected: n,
                    actual,
                }
                .into());
            }
        }

        let mut seen = HashSet::with_capacity(n);
        for &fiber_id in &self.fiber_id {
            if !seen.insert(fiber_id) {
                return Err(Error::DuplicateId(fiber_id));
            }
        }

        for i in 0..n {
            let fiber_id = self.fiber_id[i];
            let profile = &self.profiles[i];
            if self.rows[i].len() != profile.nrows() {
                return Err(ShapeError::RowCount {
                    fiber_id,
                    rows: self.rows[i].len(),
                    profiles: profile.nrows(),
                }
                .into());
            }
            // Geometry only constrains the profiles a fiber actually has.
            if profile.nrows() == 0 {
                continue;
            }

            let (radius, oversample) = (self.radius[i], self.oversample[i]);
            let width = profile_width(radius, oversample).ok_or(ShapeError::InvalidGeometry {
                fiber_id,
                radius,
                oversample,
            })?;
            if profile.ncols() != width {
                return Err(ShapeError::ProfileWidth {
                    fiber_id,
                    row: 0,
                    expected: width,
                    actual: profile.ncols(),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Fiber identifiers, one per fiber.
    pub fn fiber_id(&self) -> &[i32] {
        &self.fiber_id
    }

    /// Profile half-width in detector pixels, per fiber.
    pub fn radius(&self) -> &[i32] {
        &self.radius
    }

    /// Samples per detector pixel, per fiber.
    pub fn oversample(&self) -> &[f32] {
        &self.oversample
    }

    /// Detector rows at which each fiber's profiles were measured.
    pub fn rows(&self) -> &[Vec<f32>] {
        &self.rows
    }

    /// Profile matrices, one row per entry of [`rows`](Self::rows).
    pub fn profiles(&self) -> &[MaskedArray] {
        &self.profiles
    }

    /// Flux normalisation per detector row; empty when absent.
    pub fn norm(&self) -> &[Vec<f32>] {
        &self.norm
    }

    /// Header keywords carried alongside the profiles.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Number of fibers.
    pub fn len(&self) -> usize {
        self.fiber_id.len()
    }

    /// `true` when there are no fibers.
    pub fn is_empty(&self) -> bool {
        self.fiber_id.is_empty()
    }

    /// Position of `fiber_id`, if present.
    pub fn index_of(&self, fiber_id: i32) -> Option<usize> {
        self.fiber_id.iter().position(|&f| f == fiber_id)
    }

    /// Flatten into the `FIBERS` and `PROFILES` tables.
    pub fn to_tables(&self) -> (BinaryTable, BinaryTable) {
        let fibers = BinaryTable::new("FIBERS")
            .with_column("fiberId", ColumnData::Int(self.fiber_id.clone()))
            .with_column("radius", ColumnData::Int(self.radius.clone()))
            .with_column("oversample", ColumnData::Float(self.oversample.clone()))
            .with_column("norm", ColumnData::VarFloat(self.norm.clone()));

        let total: usize = self.rows.iter().map(Vec::len).sum();
        let mut fiber_id = Vec::with_capacity(total);
        let mut rows = Vec::with_capacity(total);
        let mut data = Vec::with_capacity(total);
        let mut masks = Vec::with_capacity(total);
        for (i, profile) in self.profiles.iter().enumerate() {
            let (profile_rows, mask_rows) = profile.to_rows();
            fiber_id.extend(std::iter::repeat(self.fiber_id[i]).take(profile_rows.len()));
            rows.extend_from_slice(&self.rows[i]);
            data.extend(profile_rows);
            masks.extend(mask_rows);
        }

        let profiles = BinaryTable::new("PROFILES")
            .with_column("fiberId", ColumnData::Int(fiber_id))
            .with_column("rows", ColumnData::Float(rows))
            .with_column("profiles", ColumnData::VarFloat(data))
            .with_column("masks", ColumnData::VarLogical(masks));

        (fibers, profiles)
    }

    /// Regroup the `FIBERS` and `PROFILES` tables and validate the result.
    ///
    /// Profiles keep their order within each fiber. Profiles whose `fiberId`
    /// is not listed in `FIBERS` are dropped.
    pub fn from_tables(
        identity: CalibIdentity,
        metadata: Metadata,
        fibers: &BinaryTable,
        profiles: &BinaryTable,
    ) -> Result<Self> {
        let fiber_id = fibers.int_column("fiberId")?.to_vec();
        let radius = fibers.int_column("radius")?.to_vec();
        let oversample = fibers.float_column("oversample")?.to_vec();
        let norm = fibers.var_float_column("norm")?.to_vec();

        let profile_fiber_id = profiles.int_column("fiberId")?;
        let profile_rows = profiles.float_column("rows")?;
        let profile_data = profiles.var_float_column("profiles")?;
        let profile_masks = profiles.var_logical_column("masks")?;

        let mut index = HashMap::with_capacity(fiber_id.len());
        for (i, &f) in fiber_id.iter().enumerate() {
            index.entry(f).or_insert(i);
        }

        #[derive(Default)]
        struct Group {
            rows: Vec<f32>,
            data: Vec<Vec<f32>>,
            masks: Vec<Vec<bool>>,
        }
        let mut groups: Vec<Group> = (0..fiber_id.len()).map(|_| Group::default()).collect();

        let mut orphans = 0usize;
        for (j, f) in profile_fiber_id.iter().enumerate() {
            let Some(&i) = index.get(f) else {
                orphans += 1;
                continue;
            };
            let group = &mut groups[i];
            group.rows.push(profile_rows[j]);
            group.data.push(profile_data[j].clone());
            group.masks.push(profile_masks[j].clone());
        }
        if orphans > 0 {
            warn!("ignoring {orphans} PROFILES rows whose fiberId is not in FIBERS");
        }

        let mut rows = Vec::with_capacity(groups.len());
        let mut matrices = Vec::with_capacity(groups.len());
        for (i, group) in groups.into_iter().enumerate() {
            let width = profile_width(radius[i], oversample[i]).unwrap_or(0);
            matrices.push(MaskedArray::from_rows(&group.data, &group.masks, width)?);
            rows.push(group.rows);
        }

        PfsFiberProfiles::new(
            identity, fiber_id, radius, oversample, rows, matrices, norm, metadata,
        )
    }
}

impl fmt::Display for PfsFiberProfiles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PfsFiberProfiles{{{} profiles}}", self.len())
    }
}

impl Product for PfsFiberProfiles {
    type Identity = CalibIdentity;

    fn grammar() -> &'static Grammar {
        &GRAMMAR
    }
}

impl FitsProduct for PfsFiberProfiles {
    fn identity(&self) -> &CalibIdentity {
        &self.identity
    }

    fn from_fits(fits: &FitsFile, identity: CalibIdentity) -> Result<Self> {
        let mut metadata = Metadata::from_cards(&fits.primary().cards);
        if metadata.get("OBSTYPE") == Some(&MetadataValue::Str(OBSTYPE.to_string())) {
            metadata.remove("OBSTYPE");
        }
        let fibers = fits.read_table("FIBERS")?;
        let profiles = fits.read_table("PROFILES")?;
        let new = PfsFiberProfiles::from_tables(identity, metadata, &fibers, &profiles)?;
        debug!("read {new} ({} profile rows)", profiles.nrows());
        Ok(new)
    }

    fn to_fits(&self) -> Result<FitsBuilder> {
        let mut metadata = self.metadata.clone();
        metadata.insert("OBSTYPE", OBSTYPE);
        let mut builder = FitsBuilder::new(&metadata.to_cards()?)?;
        let (fibers, profiles) = self.to_tables();
        builder.add_table(&fibers)?.add_table(&profiles)?;
        Ok(builder)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{array, Array2};

    use super::*;
    use crate::identity::{Arm, IdentityRecord};

    fn calib() -> CalibIdentity {
        CalibIdentity::new("2024-01-02", 1, Arm::Blue, 42).unwrap()
    }

    /// Two fibers with radius 1 and oversample 3 (13 samples); the first has
    /// two profiles with one masked value, the second has none.
    fn sample() -> PfsFiberProfiles {
        let data = Array2::from_shape_fn((2, 13), |(r, c)| (r * 13 + c) as f32 * 0.1);
        let mut mask = Array2::from_elem((2, 13), false);
        mask[(1, 0)] = true;
        PfsFiberProfiles::new(
            calib(),
            vec![10, 20],
            vec![1, 1],
            vec![3.0, 3.0],
            vec![vec![100.0, 200.0], vec![]],
            vec![
                MaskedArray::new(data, Some(mask)).unwrap(),
                MaskedArray::empty(0),
            ],
            vec![vec![], vec![]],
            Metadata::new().with("VISIT0", 42),
        )
        .unwrap()
    }

    #[test]
    fn widths() {
        assert_eq!(profile_width(1, 3.0), Some(13));
        assert_eq!(profile_width(5, 2.5), Some(31));
        assert_eq!(profile_width(2, 0.3), Some(2));
        assert_eq!(profile_width(-1, 3.0), Some(1));
        assert_eq!(profile_width(-3, 3.0), None);
        assert_eq!(profile_width(1, f32::NAN), None);
    }

    #[test]
    fn accessors_and_display() {
        let p = sample();
        assert_eq!(p.len(), 2);
        assert!(!p.is_empty());
        assert_eq!(p.to_string(), "PfsFiberProfiles{2 profiles}");
        assert_eq!(p.index_of(20), Some(1));
        assert_eq!(p.index_of(30), None);
        // Empty profile sets take the fiber's width.
        assert_eq!(p.profiles()[1].data().dim(), (0, 13));
        assert_eq!(p.filename().unwrap(), "pfsFiberProfiles-2024-01-02-000042-b1.fits");
    }

    #[test]
    fn packed_tables() {
        let (fibers, profiles) = sample().to_tables();
        assert_eq!(fibers.nrows(), 2);
        assert_eq!(profiles.nrows(), 2);
        assert_eq!(profiles.int_column("fiberId").unwrap(), &[10, 10]);
        assert_eq!(profiles.float_column("rows").unwrap(), &[100.0, 200.0]);
        let masks = profiles.var_logical_column("masks").unwrap();
        assert!(masks[1][0]);
        assert_eq!(masks[1].iter().filter(|&&b| b).count(), 1);
    }

    #[test]
    fn unmasked_profiles_pack_empty_masks() {
        let p = PfsFiberProfiles::new(
            calib(),
            vec![1],
            vec![0],
            vec![1.0],
            vec![vec![5.0]],
            vec![MaskedArray::unmasked(array![[1.0, 2.0, 3.0]])],
            vec![vec![1.0; 4]],
            Metadata::new(),
        )
        .unwrap();
        let (_, profiles) = p.to_tables();
        assert_eq!(
            profiles.var_logical_column("masks").unwrap(),
            &[Vec::<bool>::new()]
        );
    }

    #[test]
    fn tables_round_trip() {
        let p = sample();
        let (fibers, profiles) = p.to_tables();
        let back =
            PfsFiberProfiles::from_tables(calib(), p.metadata().clone(), &fibers, &profiles)
                .unwrap();
        assert_eq!(back, p);
        assert!(back.profiles()[0].is_masked(1, 0));
        assert_eq!(back.profiles()[0].count_masked(), 1);
    }

    #[test]
    fn profiles_are_regrouped_in_order() {
        let fibers = BinaryTable::new("FIBERS")
            .with_column("fiberId", ColumnData::Int(vec![2, 1]))
            .with_column("radius", ColumnData::Int(vec![-1, -1]))
            .with_column("oversample", ColumnData::Float(vec![1.0, 1.0]))
            .with_column("norm", ColumnData::VarFloat(vec![vec![], vec![]]));
        let profiles = BinaryTable::new("PROFILES")
            .with_column("fiberId", ColumnData::Int(vec![1, 2, 99, 1]))
            .with_column("rows", ColumnData::Float(vec![10.0, 20.0, 30.0, 40.0]))
            .with_column(
                "profiles",
                ColumnData::VarFloat(vec![vec![1.0], vec![2.0], vec![3.0], vec![4.0]]),
            )
            .with_column(
                "masks",
                ColumnData::VarLogical(vec![vec![], vec![], vec![], vec![]]),
            );
        let p =
            PfsFiberProfiles::from_tables(calib(), Metadata::new(), &fibers, &profiles).unwrap();
        assert_eq!(p.rows(), &[vec![20.0], vec![10.0, 40.0]]);
        assert_eq!(p.profiles()[1].data(), &array![[1.0], [4.0]]);
    }

    #[test]
    fn duplicate_fiber_ids_are_rejected() {
        let result = PfsFiberProfiles::new(
            calib(),
            vec![10, 10],
            vec![1, 1],
            vec![3.0, 3.0],
            vec![vec![], vec![]],
            vec![MaskedArray::empty(13), MaskedArray::empty(13)],
            vec![vec![], vec![]],
            Metadata::new(),
        );
        assert!(matches!(result, Err(Error::DuplicateId(10))));
    }

    #[test]
    fn wrong_profile_width_is_rejected() {
        let result = PfsFiberProfiles::new(
            calib(),
            vec![1],
            vec![1],
            vec![3.0],
            vec![vec![0.0]],
            vec![MaskedArray::unmasked(Array2::zeros((1, 12)))],
            vec![vec![]],
            Metadata::new(),
        );
        assert!(matches!(
            result,
            Err(Error::Shape(ShapeError::ProfileWidth {
                expected: 13,
                actual: 12,
                ..
            }))
        ));
    }

    #[test]
    fn shape_errors_are_distinct() {
        let length = PfsFiberProfiles::new(
            calib(),
            vec![1, 2],
            vec![1],
            vec![3.0, 3.0],
            vec![vec![], vec![]],
            vec![MaskedArray::empty(13), MaskedArray::empty(13)],
            vec![vec![], vec![]],
            Metadata::new(),
        );
        assert!(matches!(
            length,
            Err(Error::Shape(ShapeError::Length { array: "radius", .. }))
        ));

        let row_count = PfsFiberProfiles::new(
            calib(),
            vec![1],
            vec![1],
            vec![3.0],
            vec![vec![1.0, 2.0]],
            vec![MaskedArray::unmasked(Array2::zeros((1, 13)))],
            vec![vec![]],
            Metadata::new(),
        );
        assert!(matches!(
            row_count,
            Err(Error::Shape(ShapeError::RowCount { .. }))
        ));

        let geometry = PfsFiberProfiles::new(
            calib(),
            vec![1],
            vec![-5],
            vec![3.0],
            vec![vec![0.0]],
            vec![MaskedArray::unmasked(Array2::zeros((1, 1)))],
            vec![vec![]],
            Metadata::new(),
        );
        assert!(matches!(
            geometry,
            Err(Error::Shape(ShapeError::InvalidGeometry { .. }))
        ));
    }

    #[test]
    fn fibers_without_profiles_need_no_geometry() {
        let p = PfsFiberProfiles::new(
            calib(),
            vec![1, 2],
            vec![-5, 1],
            vec![3.0, f32::NAN],
            vec![vec![], vec![]],
            vec![MaskedArray::empty(13), MaskedArray::empty(0)],
            vec![vec![], vec![2.0]],
            Metadata::new(),
        )
        .unwrap();
        assert_eq!(p.profiles()[0].data().dim(), (0, 0));

        let (fibers, profiles) = p.to_tables();
        let back =
            PfsFiberProfiles::from_tables(calib(), Metadata::new(), &fibers, &profiles).unwrap();
        assert_eq!(back.profiles(), p.profiles());
        assert_eq!(back.radius(), &[-5, 1]);
        assert!(back.oversample()[1].is_nan());
    }

    #[test]
    fn filename_grammar() {
        let name = "pfsFiberProfiles-2024-01-02-000042-b1.fits";
        let identity = PfsFiberProfiles::parse_filename(name).unwrap();
        assert_eq!(identity, calib());
        assert_eq!(PfsFiberProfiles::get_filename(&identity).unwrap(), name);
        assert_eq!(
            PfsFiberProfiles::parse_filename(format!("/calib/{name}.gz")).unwrap(),
            calib()
        );
        assert!(matches!(
            PfsFiberProfiles::parse_filename("pfsFiberProfiles-2024-01-02-000042-x1.fits"),
            Err(Error::Enum { kind: "arm", .. })
        ));
        assert!(matches!(
            PfsFiberProfiles::parse_filename("pfsFiberProfiles-2024-01-02.fits"),
            Err(Error::Parse { .. })
        ));
        assert_eq!(calib().to_identity().len(), 4);
    }
}
