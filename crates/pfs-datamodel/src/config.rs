//! Fiber configuration: the design (which target each fiber should be put
//! on) and the configuration actually realised for a visit.

use std::str::FromStr;

use lazy_static::lazy_static;
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::drp::named_product;
use crate::error::{Error, Result};
use crate::grammar::{Grammar, KeyType};
use crate::identity::{ConfigIdentity, DesignIdentity};

lazy_static! {
    static ref PFS_DESIGN: Grammar = Grammar::new(
        "PfsDesign",
        "pfsDesign-0x%(pfsDesignId)016x.fits",
        r"^pfsDesign-(?P<pfsDesignId>0x[0-9a-fA-F]{16})\.fits.*$",
        &[("pfsDesignId", KeyType::Hex)],
    )
    .unwrap();

    static ref PFS_CONFIG: Grammar = Grammar::new(
        "PfsConfig",
        "pfsConfig-0x%(pfsDesignId)016x-%(visit0)06d.fits",
        r"^pfsConfig-(?P<pfsDesignId>0x[0-9a-fA-F]{16})-(?P<visit0>\d{6})\.fits.*$",
        &[("pfsDesignId", KeyType::Hex), ("visit0", KeyType::Int)],
    )
    .unwrap();
}

named_product!(
    /// The planned assignment of targets to fibers.
    PfsDesign, DesignIdentity, PFS_DESIGN
);
named_product!(
    /// A design as realised for a particular visit.
    PfsConfig, ConfigIdentity, PFS_CONFIG
);

/// Categorical values stored as integer codes in a table column.
pub trait CodedEnum: Sized + Copy + IntoEnumIterator + Into<&'static str> + FromStr {
    /// What the codes describe, for error messages.
    const KIND: &'static str;

    fn code(self) -> i32;

    fn from_code(code: i32) -> Result<Self> {
        Self::iter()
            .find(|v| v.code() == code)
            .ok_or_else(|| Error::Enum {
                kind: Self::KIND,
                value: code.to_string(),
            })
    }

    /// Look up by upper-case name (e.g. `"FLUXSTD"`).
    fn from_name(name: &str) -> Result<Self> {
        name.parse().map_err(|_| Error::Enum {
            kind: Self::KIND,
            value: name.to_string(),
        })
    }

    /// Decode a whole column of codes.
    fn decode_all(codes: &[i32]) -> Result<Vec<Self>> {
        codes.iter().map(|&c| Self::from_code(c)).collect()
    }
}

/// What a fiber is pointed at.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumString, IntoStaticStr,
)]
#[strum(serialize_all = "UPPERCASE")]
pub enum TargetType {
    Science = 1,
    Sky = 2,
    /// Flux standard star.
    FluxStd = 3,
    /// No target assigned.
    Unassigned = 4,
    Engineering = 5,
    #[strum(serialize = "SUNSS_IMAGING")]
    SunssImaging = 6,
    #[strum(serialize = "SUNSS_DIFFUSE")]
    SunssDiffuse = 7,
}

impl CodedEnum for TargetType {
    const KIND: &'static str = "target type";

    fn code(self) -> i32 {
        self as i32
    }
}

/// Hardware state of a fiber.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumString, IntoStaticStr,
)]
#[strum(serialize_all = "UPPERCASE")]
pub enum FiberStatus {
    Good = 1,
    BrokenFiber = 2,
    /// Blocked by its cobra.
    Blocked = 3,
    /// Hidden behind a black spot.
    BlackSpot = 4,
    Unilluminated = 5,
}

impl CodedEnum for FiberStatus {
    const KIND: &'static str = "fiber status";

    fn code(self) -> i32 {
        self as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::product::Product;

    #[test]
    fn design_and_config_filenames() {
        let design = DesignIdentity {
            pfs_design_id: 0x1234_abcd,
        };
        let name = PfsDesign::get_filename(&design).unwrap();
        assert_eq!(name, "pfsDesign-0x000000001234abcd.fits");
        assert_eq!(PfsDesign::parse_filename(&name).unwrap(), design);

        let config = ConfigIdentity {
            pfs_design_id: u64::MAX,
            visit0: 12,
        };
        let name = PfsConfig::get_filename(&config).unwrap();
        assert_eq!(name, "pfsConfig-0xffffffffffffffff-000012.fits");
        assert_eq!(PfsConfig::parse_filename(&name).unwrap(), config);
    }

    #[test]
    fn codes_round_trip() {
        for t in TargetType::iter() {
            assert_eq!(TargetType::from_code(t.code()).unwrap(), t);
        }
        for s in FiberStatus::iter() {
            assert_eq!(FiberStatus::from_code(s.code()).unwrap(), s);
        }
    }

    #[test]
    fn names() {
        assert_eq!(TargetType::FluxStd.to_string(), "FLUXSTD");
        assert_eq!(TargetType::SunssDiffuse.to_string(), "SUNSS_DIFFUSE");
        assert_eq!(FiberStatus::BrokenFiber.to_string(), "BROKENFIBER");
        for t in TargetType::iter() {
            assert_eq!(TargetType::from_name(<&str>::from(t)).unwrap(), t);
        }
        for s in FiberStatus::iter() {
            assert_eq!(FiberStatus::from_name(&s.to_string()).unwrap(), s);
        }
        assert_eq!(TargetType::from_name("SKY").unwrap(), TargetType::Sky);
        assert!(TargetType::from_name("sky").is_err());
    }

    #[test]
    fn unknown_codes_are_enum_errors() {
        assert!(matches!(
            TargetType::from_code(0),
            Err(Error::Enum {
                kind: "target type",
                ..
            })
        ));
        assert!(matches!(
            FiberStatus::decode_all(&[1, 2, 99]),
            Err(Error::Enum { kind: "fiber status", value }) if value == "99"
        ));
        assert_eq!(
            FiberStatus::decode_all(&[1, 4]).unwrap(),
            vec![FiberStatus::Good, FiberStatus::BlackSpot]
        );
    }
}
