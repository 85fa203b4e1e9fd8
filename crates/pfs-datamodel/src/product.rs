//! Product capabilities: naming files after identities, and reading and
//! writing whole products.

use std::path::{Path, PathBuf};

use log::debug;
use pfs_fits::{FitsBuilder, FitsFile};

use crate::error::Result;
use crate::grammar::Grammar;
use crate::identity::IdentityRecord;

/// A data product named by an identity.
pub trait Product {
    type Identity: IdentityRecord;

    fn grammar() -> &'static Grammar;

    /// Filename (without directory) for `identity`.
    fn get_filename(identity: &Self::Identity) -> Result<String> {
        Self::grammar().render(&identity.to_identity())
    }

    /// Identity of the product stored at `path`; only the basename is used.
    fn parse_filename<P: AsRef<Path>>(path: P) -> Result<Self::Identity> {
        Self::Identity::from_identity(&Self::grammar().parse(path)?)
    }
}

/// A product persisted as a FITS container.
pub trait FitsProduct: Product + Sized {
    fn identity(&self) -> &Self::Identity;

    /// Decode from an open container.
    fn from_fits(fits: &FitsFile, identity: Self::Identity) -> Result<Self>;

    /// Encode into a container ready to be written.
    fn to_fits(&self) -> Result<FitsBuilder>;

    fn filename(&self) -> Result<String> {
        Self::get_filename(self.identity())
    }

    /// Read the product named by `identity` from `dir`.
    fn read<P: AsRef<Path>>(identity: &Self::Identity, dir: P) -> Result<Self> {
        let path = dir.as_ref().join(Self::get_filename(identity)?);
        let fits = FitsFile::open(&path)?;
        Self::from_fits(&fits, identity.clone())
    }

    /// Read a file, taking the identity from its name.
    fn read_fits<P: AsRef<Path>>(path: P) -> Result<Self> {
        let identity = Self::parse_filename(&path)?;
        let fits = FitsFile::open(path.as_ref())?;
        Self::from_fits(&fits, identity)
    }

    /// Write into `dir` under the canonical filename, returning the path.
    fn write<P: AsRef<Path>>(&self, dir: P) -> Result<PathBuf> {
        let path = dir.as_ref().join(self.filename()?);
        self.write_fits(&path)?;
        Ok(path)
    }

    /// Write to `path`, replacing any existing file. A `.gz` suffix compresses.
    fn write_fits<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.to_fits()?.write_to(path.as_ref())?;
        debug!("wrote {} to {}", Self::grammar().product(), path.as_ref().display());
        Ok(())
    }
}
