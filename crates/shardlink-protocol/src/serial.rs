//! World-object identifiers.
//!
//! Every thing in the world (a mobile that walks around, or an item lying on
//! the ground or sitting in a backpack) is named by a 32-bit `Serial`. The
//! category is never sent separately: it is encoded in the value itself.
//!
//! ```text
//! 0x0000_0000 ..= 0x3FFF_FFFF   mobiles
//! 0x4000_0000 ..= 0xFFFF_FFFE   items
//! 0xFFFF_FFFF                   "no entity"
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// The category a valid [`Serial`] falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SerialKind {
    /// A living actor: player, monster, vendor.
    Mobile,
    /// A static or dynamic object.
    Item,
}

/// A 32-bit world-object identifier.
///
/// Equality, ordering and hashing all come from the raw value. A `Serial`
/// is `Copy` and has no mutating methods; "changing" one means building a
/// new one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct Serial(u32);

impl Serial {
    /// The reserved "no entity" value.
    pub const INVALID: Serial = Serial(u32::MAX);

    /// First value in the item range. Everything below it is a mobile.
    pub const ITEM_BOUNDARY: u32 = 0x4000_0000;

    /// Wraps a raw wire value.
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw value, for re-encoding.
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// `false` only for [`Serial::INVALID`].
    pub const fn is_valid(self) -> bool {
        self.0 != Self::INVALID.0
    }

    pub const fn is_mobile(self) -> bool {
        self.is_valid() && self.0 < Self::ITEM_BOUNDARY
    }

    pub const fn is_item(self) -> bool {
        self.is_valid() && self.0 >= Self::ITEM_BOUNDARY
    }

    /// Returns the category, or `None` for the sentinel.
    pub const fn kind(self) -> Option<SerialKind> {
        if !self.is_valid() {
            None
        } else if self.0 < Self::ITEM_BOUNDARY {
            Some(SerialKind::Mobile)
        } else {
            Some(SerialKind::Item)
        }
    }
}

impl From<u32> for Serial {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl From<Serial> for u32 {
    fn from(serial: Serial) -> Self {
        serial.0
    }
}

impl fmt::Display for Serial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}
