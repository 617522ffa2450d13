//! Object IDs and their on-disk file names.
//!
//! Object ID layout (64 bits):
//! - Bits  0-31: data object index (32 bits)
//! - Bits 32-55: VDI id (24 bits)
//! - Bit  63: VDI (inode) object flag
//!
//! Sheep stores each object as a file named after its ID in 16 lower-case
//! hex digits under `{disk}/obj/`, so tests can compute exactly which file a
//! given VDI block lands in.

use std::fmt;

use serde::{Deserialize, Serialize};

const VDI_SPACE_SHIFT: u64 = 32;
const SD_VDI_MASK: u64 = 0x00FF_FFFF_0000_0000;
const VDI_BIT: u64 = 1u64 << 63;
const MAX_DATA_OBJS: u64 = 1 << 32;

/// A 64-bit object identifier in the sheepdog object store.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectId(pub u64);

impl ObjectId {
    #[inline]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// The inode object of VDI `vid`.
    #[inline]
    pub const fn from_vid(vid: u32) -> Self {
        Self(VDI_BIT | ((vid as u64) << VDI_SPACE_SHIFT))
    }

    /// The `idx`-th data object of VDI `vid`.
    #[inline]
    pub const fn data(vid: u32, idx: u32) -> Self {
        Self(((vid as u64) << VDI_SPACE_SHIFT) | idx as u64)
    }

    #[inline]
    pub const fn is_vdi_obj(self) -> bool {
        self.0 & VDI_BIT != 0
    }

    #[inline]
    pub const fn to_vid(self) -> u32 {
        ((self.0 & SD_VDI_MASK) >> VDI_SPACE_SHIFT) as u32
    }

    #[inline]
    pub const fn data_index(self) -> u64 {
        self.0 & (MAX_DATA_OBJS - 1)
    }

    /// File name sheep uses for this object.
    ///
    /// A non-zero `ec_index` names an erasure-coded shard (`_XX` suffix).
    pub fn file_name(self, ec_index: u8) -> String {
        if ec_index == 0 {
            format!("{:016x}", self.0)
        } else {
            format!("{:016x}_{:02x}", self.0, ec_index)
        }
    }

    /// Parse a file name produced by [`ObjectId::file_name`].
    pub fn from_file_name(name: &str) -> Option<(Self, u8)> {
        let (oid_hex, ec) = match name.split_once('_') {
            Some((oid_hex, ec_hex)) if is_hex(ec_hex) => {
                (oid_hex, u8::from_str_radix(ec_hex, 16).ok()?)
            }
            Some(_) => return None,
            None => (name, 0),
        };
        if oid_hex.len() != 16 || !is_hex(oid_hex) {
            return None;
        }
        let raw = u64::from_str_radix(oid_hex, 16).ok()?;
        Some((Self(raw), ec))
    }
}

// from_str_radix alone would also take a leading sign.
fn is_hex(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_hexdigit())
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({:016x})", self.0)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}
