//! Filename grammars of the spectral reduction products.
//!
//! Only naming is handled here: the spectra themselves are read and written
//! elsewhere.

use lazy_static::lazy_static;

use crate::grammar::{Grammar, KeyType};
use crate::identity::{ArmIdentity, MergedIdentity, ObjectIdentity, SingleIdentity, TargetIdentity};
lazy_static! {
    static ref PFS_ARM: Grammar = Grammar::new(
        "PfsArm",
        "pfsArm-%(expId)06d-%(arm)1s%(spectrograph)1d.fits",
        r"^pfsArm-(?P<expId>\d{6})-(?P<arm>[brnm])(?P<spectrograph>\d)\.fits.*$",
        &[
            ("expId", KeyType::Int),
            ("arm", KeyType::Str),
            ("spectrograph", KeyType::Int),
        ],
    )
    .unwrap();

    static ref PFS_MERGED: Grammar = Grammar::new(
        "PfsMerged",
        "pfsMerged-%(expId)06d.fits",
        r"^pfsMerged-(?P<expId>\d{6})\.fits.*$",
        &[("expId", KeyType::Int)],
    )
    .unwrap();

    static ref PFS_REFERENCE: Grammar = Grammar::new(
        "PfsReference",
        "pfsReference-%(catId)03d-%(tract)05d-%(patch)s-0x%(objId)016x.fits",
        r"^pfsReference-(?P<catId>\d{3})-(?P<tract>\d{5})-(?P<patch>.*)-(?P<objId>0x[0-9a-fA-F]{16})\.fits.*$",
        &[
            ("catId", KeyType::Int),
            ("tract", KeyType::Int),
            ("patch", KeyType::Str),
            ("objId", KeyType::Hex),
        ],
    )
    .unwrap();

    static ref PFS_SINGLE: Grammar = Grammar::new(
        "PfsSingle",
        "pfsSingle-%(catId)03d-%(tract)05d-%(patch)s-0x%(objId)016x-%(expId)06d.fits",
        r"^pfsSingle-(?P<catId>\d{3})-(?P<tract>\d{5})-(?P<patch>.*)-(?P<objId>0x[0-9a-fA-F]{16})-(?P<expId>\d{6})\.fits.*$",
        &[
            ("catId", KeyType::Int),
            ("tract", KeyType::Int),
            ("patch", KeyType::Str),
            ("objId", KeyType::Hex),
            ("expId", KeyType::Int),
        ],
    )
    .unwrap();

    static ref PFS_OBJECT: Grammar = Grammar::new(
        "PfsObject",
        "pfsObject-%(catId)03d-%(tract)05d-%(patch)s-0x%(objId)016x-%(numExp)03d-0x%(expHash)08x.fits",
        r"^pfsObject-(?P<catId>\d{3})-(?P<tract>\d{5})-(?P<patch>.*)-(?P<objId>0x[0-9a-fA-F]{16})-(?P<numExp>\d{3})-(?P<expHash>0x[0-9a-fA-F]{8})\.fits.*$",
        &[
            ("catId", KeyType::Int),
            ("tract", KeyType::Int),
            ("patch", KeyType::Str),
            ("objId", KeyType::Hex),
            ("numExp", KeyType::Int),
            ("expHash", KeyType::Hex),
        ],
    )
    .unwrap();
}

macro_rules! named_product {
    ($(#[$doc:meta])* $name:ident, $identity:ty, $grammar:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct $name;

        impl $crate::product::Product for $name {
            type Identity = $identity;

            fn grammar() -> &'static $crate::grammar::Grammar {
                &$grammar
            }
        }
    };
}

named_product!(
    /// Spectra from one arm of one spectrograph for a single exposure.
    PfsArm, ArmIdentity, PFS_ARM
);
named_product!(
    /// Spectra from all arms and spectrographs of an exposure, merged.
    PfsMerged, MergedIdentity, PFS_MERGED
);
named_product!(
    /// Reference spectrum of a target.
    PfsReference, TargetIdentity, PFS_REFERENCE
);
named_product!(
    /// Flux-calibrated spectrum of a target from a single exposure.
    PfsSingle, SingleIdentity, PFS_SINGLE
);
named_product!(
    /// Coadded spectrum of a target.
    PfsObject, ObjectIdentity, PFS_OBJECT
);

pub(crate) use named_product;
