//! Identities: the keyed records that name a data product and are embedded
//! verbatim in its filename.
//!
//! [`Identity`] is the untyped, ordered form that filename grammars read and
//! write. Each product family has a typed record (e.g. [`ArmIdentity`],
//! [`CalibIdentity`]) that converts to and from it via [`IdentityRecord`].

use indexmap::IndexMap;
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::error::{Error, Result};

/// One value of an identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IdValue {
    Int(i64),
    /// Unsigned values, typically captured from hexadecimal filename fields.
    UInt(u64),
    Str(String),
}

impl From<i64> for IdValue {
    fn from(v: i64) -> Self {
        IdValue::Int(v)
    }
}

impl From<i32> for IdValue {
    fn from(v: i32) -> Self {
        IdValue::Int(v.into())
    }
}

impl From<u64> for IdValue {
    fn from(v: u64) -> Self {
        IdValue::UInt(v)
    }
}

impl From<u32> for IdValue {
    fn from(v: u32) -> Self {
        IdValue::UInt(v.into())
    }
}

impl From<&str> for IdValue {
    fn from(v: &str) -> Self {
        IdValue::Str(v.to_string())
    }
}

impl From<String> for IdValue {
    fn from(v: String) -> Self {
        IdValue::Str(v)
    }
}

impl From<Arm> for IdValue {
    fn from(v: Arm) -> Self {
        IdValue::Str(v.to_string())
    }
}

/// An ordered keyword → value mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity(IndexMap<String, IdValue>);

impl Identity {
    /// An identity with no keys.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`Identity::insert`].
    pub fn with(mut self, key: &str, value: impl Into<IdValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Set `key`, returning its previous value.
    pub fn insert(&mut self, key: &str, value: impl Into<IdValue>) -> Option<IdValue> {
        self.0.insert(key.to_string(), value.into())
    }

    /// The raw value of `key`.
    pub fn get(&self, key: &str) -> Option<&IdValue> {
        self.0.get(key)
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `true` when no key is set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Keys and values in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &IdValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    fn require(&self, key: &str) -> Result<&IdValue> {
        self.get(key).ok_or_else(|| Error::MissingKey(key.to_string()))
    }

    /// A signed integer; unsigned values and numeric strings are coerced.
    pub fn int(&self, key: &str) -> Result<i64> {
        let not_int = |what: String| Error::Identity(format!("{key} = {what} is not an integer"));
        match self.require(key)? {
            IdValue::Int(v) => Ok(*v),
            IdValue::UInt(v) => i64::try_from(*v).map_err(|_| not_int(v.to_string())),
            IdValue::Str(s) => s.trim().parse().map_err(|_| not_int(format!("{s:?}"))),
        }
    }

    /// An unsigned integer; non-negative signed values and numeric strings
    /// (decimal, or hexadecimal with a `0x` prefix) are coerced.
    pub fn uint(&self, key: &str) -> Result<u64> {
        let not_uint =
            |what: String| Error::Identity(format!("{key} = {what} is not an unsigned integer"));
        match self.require(key)? {
            IdValue::UInt(v) => Ok(*v),
            IdValue::Int(v) => u64::try_from(*v).map_err(|_| not_uint(v.to_string())),
            IdValue::Str(s) => parse_unsigned(s).ok_or_else(|| not_uint(format!("{s:?}"))),
        }
    }

    /// A string; integers are rendered in decimal.
    pub fn string(&self, key: &str) -> Result<String> {
        Ok(match self.require(key)? {
            IdValue::Str(s) => s.clone(),
            IdValue::Int(v) => v.to_string(),
            IdValue::UInt(v) => v.to_string(),
        })
    }
}

impl<K: Into<String>, V: Into<IdValue>> FromIterator<(K, V)> for Identity {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Identity(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Parse `123` or `0x7b`.
pub(crate) fn parse_unsigned(s: &str) -> Option<u64> {
    let s = s.trim();
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}

/// Conversion between a typed identity record and the generic [`Identity`].
pub trait IdentityRecord: Sized + Clone {
    fn to_identity(&self) -> Identity;
    fn from_identity(identity: &Identity) -> Result<Self>;
}

/// A spectrograph arm (wavelength channel).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumString, IntoStaticStr,
)]
pub enum Arm {
    #[strum(serialize = "b")]
    Blue,
    #[strum(serialize = "r")]
    Red,
    #[strum(serialize = "n")]
    NearInfrared,
    /// Medium-resolution red.
    #[strum(serialize = "m")]
    Medium,
}

impl Arm {
    /// Parse an arm letter.
    pub fn from_letter(letter: &str) -> Result<Self> {
        letter.parse().map_err(|_| Error::Enum {
            kind: "arm",
            value: letter.to_string(),
        })
    }

    /// The single-letter code used in filenames.
    pub fn letter(self) -> &'static str {
        self.into()
    }
}

fn non_negative(key: &str, value: i64) -> Result<i64> {
    if value < 0 {
        return Err(Error::Identity(format!("{key} must not be negative, got {value}")));
    }
    Ok(value)
}

/// Identity of a calibration product.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CalibIdentity {
    obs_date: String,
    spectrograph: i64,
    arm: Arm,
    visit0: i64,
}

impl CalibIdentity {
    /// `obs_date` is an ISO-8601 date (`YYYY-MM-DD`); `visit0` is the first
    /// visit the calibration was built from.
    pub fn new(obs_date: &str, spectrograph: i64, arm: Arm, visit0: i64) -> Result<Self> {
        if obs_date.len() != 10 || !obs_date.is_ascii() {
            return Err(Error::Identity(format!(
                "obsDate {obs_date:?} is not a 10-character ISO-8601 date"
            )));
        }
        Ok(CalibIdentity {
            obs_date: obs_date.to_string(),
            spectrograph,
            arm,
            visit0: non_negative("visit0", visit0)?,
        })
    }

    /// Observation date, `YYYY-MM-DD`.
    pub fn obs_date(&self) -> &str {
        &self.obs_date
    }

    /// Spectrograph module number.
    pub fn spectrograph(&self) -> i64 {
        self.spectrograph
    }

    /// Spectrograph arm.
    pub fn arm(&self) -> Arm {
        self.arm
    }

    /// First visit the calibration was built from.
    pub fn visit0(&self) -> i64 {
        self.visit0
    }
}

impl IdentityRecord for CalibIdentity {
    fn to_identity(&self) -> Identity {
        Identity::new()
            .with("obsDate", self.obs_date.as_str())
            .with("spectrograph", self.spectrograph)
            .with("arm", self.arm)
            .with("visit0", self.visit0)
    }

    fn from_identity(identity: &Identity) -> Result<Self> {
        CalibIdentity::new(
            &identity.string("obsDate")?,
            identity.int("spectrograph")?,
            Arm::from_letter(&identity.string("arm")?)?,
            identity.int("visit0")?,
        )
    }
}

/// Identity of a single-arm, single-spectrograph exposure product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArmIdentity {
    pub exp_id: i64,
    pub arm: Arm,
    pub spectrograph: i64,
}

impl IdentityRecord for ArmIdentity {
    fn to_identity(&self) -> Identity {
        Identity::new()
            .with("expId", self.exp_id)
            .with("arm", self.arm)
            .with("spectrograph", self.spectrograph)
    }

    fn from_identity(identity: &Identity) -> Result<Self> {
        let spectrograph = identity.int("spectrograph")?;
        if spectrograph < 1 {
            return Err(Error::Identity(format!(
                "spectrograph must be at least 1, got {spectrograph}"
            )));
        }
        Ok(ArmIdentity {
            exp_id: identity.int("expId")?,
            arm: Arm::from_letter(&identity.string("arm")?)?,
            spectrograph,
        })
    }
}

/// Identity of an exposure product merged over arms and spectrographs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MergedIdentity {
    pub exp_id: i64,
}

impl IdentityRecord for MergedIdentity {
    fn to_identity(&self) -> Identity {
        Identity::new().with("expId", self.exp_id)
    }

    fn from_identity(identity: &Identity) -> Result<Self> {
        Ok(MergedIdentity {
            exp_id: identity.int("expId")?,
        })
    }
}

/// Identity of an astronomical target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetIdentity {
    pub cat_id: i64,
    pub tract: i64,
    pub patch: String,
    pub obj_id: u64,
}

impl TargetIdentity {
    fn extend(&self, identity: Identity) -> Identity {
        identity
            .with("catId", self.cat_id)
            .with("tract", self.tract)
            .with("patch", self.patch.as_str())
            .with("objId", self.obj_id)
    }

    fn read(identity: &Identity) -> Result<Self> {
        Ok(TargetIdentity {
            cat_id: identity.int("catId")?,
            tract: identity.int("tract")?,
            patch: identity.string("patch")?,
            obj_id: identity.uint("objId")?,
        })
    }
}

impl IdentityRecord for TargetIdentity {
    fn to_identity(&self) -> Identity {
        self.extend(Identity::new())
    }

    fn from_identity(identity: &Identity) -> Result<Self> {
        TargetIdentity::read(identity)
    }
}

/// Identity of one target observed in one exposure.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SingleIdentity {
    pub target: TargetIdentity,
    pub exp_id: i64,
}

impl IdentityRecord for SingleIdentity {
    fn to_identity(&self) -> Identity {
        self.target.extend(Identity::new()).with("expId", self.exp_id)
    }

    fn from_identity(identity: &Identity) -> Result<Self> {
        Ok(SingleIdentity {
            target: TargetIdentity::read(identity)?,
            exp_id: identity.int("expId")?,
        })
    }
}

/// Identity of one target coadded over a set of exposures.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectIdentity {
    pub target: TargetIdentity,
    pub num_exp: i64,
    /// Hash of the list of contributing exposures.
    pub exp_hash: u32,
}

impl IdentityRecord for ObjectIdentity {
    fn to_identity(&self) -> Identity {
        self.target
            .extend(Identity::new())
            .with("numExp", self.num_exp)
            .with("expHash", self.exp_hash)
    }

    fn from_identity(identity: &Identity) -> Result<Self> {
        let exp_hash = identity.uint("expHash")?;
        Ok(ObjectIdentity {
            target: TargetIdentity::read(identity)?,
            num_exp: identity.int("numExp")?,
            exp_hash: u32::try_from(exp_hash)
                .map_err(|_| Error::Identity(format!("expHash {exp_hash:#x} exceeds 32 bits")))?,
        })
    }
}

/// Identity of a fiber-configuration design.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DesignIdentity {
    pub pfs_design_id: u64,
}

impl IdentityRecord for DesignIdentity {
    fn to_identity(&self) -> Identity {
        Identity::new().with("pfsDesignId", self.pfs_design_id)
    }

    fn from_identity(identity: &Identity) -> Result<Self> {
        Ok(DesignIdentity {
            pfs_design_id: identity.uint("pfsDesignId")?,
        })
    }
}

/// Identity of the fiber configuration as realised for a visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConfigIdentity {
    pub pfs_design_id: u64,
    pub visit0: i64,
}

impl IdentityRecord for ConfigIdentity {
    fn to_identity(&self) -> Identity {
        Identity::new()
            .with("pfsDesignId", self.pfs_design_id)
            .with("visit0", self.visit0)
    }

    fn from_identity(identity: &Identity) -> Result<Self> {
        Ok(ConfigIdentity {
            pfs_design_id: identity.uint("pfsDesignId")?,
            visit0: non_negative("visit0", identity.int("visit0")?)?,
        })
    }
}
