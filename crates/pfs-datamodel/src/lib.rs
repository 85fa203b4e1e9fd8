//! On-disk data model of the PFS spectroscopic pipeline.
//!
//! Products are named by identities that are encoded in their filenames
//! ([`Product`]); some are also read and written as FITS containers
//! ([`FitsProduct`]). [`PfsFiberProfiles`] is stored in full here; the
//! reduction and fiber-configuration products only carry their naming.
//!
//! ```no_run
//! use pfs_datamodel::{Arm, CalibIdentity, FitsProduct, PfsFiberProfiles};
//!
//! let identity = CalibIdentity::new("2024-01-02", 1, Arm::Blue, 42)?;
//! let profiles = PfsFiberProfiles::read(&identity, "/data/calib")?;
//! println!("{profiles}");
//! # Ok::<(), pfs_datamodel::Error>(())
//! ```

pub mod config;
pub mod drp;
pub mod error;
pub mod grammar;
pub mod identity;
pub mod masked;
pub mod metadata;
pub mod product;
pub mod profiles;

pub use config::{CodedEnum, FiberStatus, PfsConfig, PfsDesign, TargetType};
pub use drp::{PfsArm, PfsMerged, PfsObject, PfsReference, PfsSingle};
pub use error::{Error, Result, ShapeError};
pub use grammar::{Grammar, KeyType};
pub use identity::{
    Arm, ArmIdentity, CalibIdentity, ConfigIdentity, DesignIdentity, IdValue, Identity,
    IdentityRecord, MergedIdentity, ObjectIdentity, SingleIdentity, TargetIdentity,
};
pub use masked::MaskedArray;
pub use metadata::{Metadata, MetadataValue};
pub use product::{FitsProduct, Product};
pub use profiles::{profile_width, PfsFiberProfiles};
