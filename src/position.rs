// model = "claude-opus-4-5"
// created = "2026-08-01"
// modified = "2026-08-02"
// driver = "Isaac Clayton"

//! Position and bunch-metadata value types.
//!
//! A *position* is an immutable, globally unique identifier for one slot in
//! a shared ordered sequence. It names a bunch (a node in the position tree)
//! and an inner index within that bunch's unbounded index space.
//!
//! Positions deliberately do not implement `Ord`: their order is defined by
//! an [`Order`](crate::order::Order) tree, not by the pair of fields. Two
//! replicas that have installed the same bunch metas agree on the order.

use std::fmt;

use rand_core::OsRng;
use rand_core::RngCore;
use serde::Deserialize;
use serde::Serialize;

use crate::error::Error;

/// The reserved id of the root bunch. Never assignable by user code and
/// rejected on `receive`.
pub const ROOT: &str = "ROOT";

/// An identifier for one slot in the shared sequence.
///
/// The root bunch carries exactly two positions: the minimum and maximum
/// sentinels. All real positions live in non-root bunches and may use any
/// inner index.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    /// The bunch this position belongs to.
    pub bunch_id: String,
    /// Offset within the bunch's index space.
    pub inner_index: u32,
}

impl Position {
    /// Create a position from its parts.
    pub fn new(bunch_id: impl Into<String>, inner_index: u32) -> Position {
        return Position {
            bunch_id: bunch_id.into(),
            inner_index,
        };
    }

    /// The sentinel less than every other position.
    pub fn min() -> Position {
        return Position::new(ROOT, 0);
    }

    /// The sentinel greater than every other position.
    pub fn max() -> Position {
        return Position::new(ROOT, 1);
    }

    /// True for the minimum sentinel.
    pub fn is_min(&self) -> bool {
        return self.bunch_id == ROOT && self.inner_index == 0;
    }

    /// True for the maximum sentinel.
    pub fn is_max(&self) -> bool {
        return self.bunch_id == ROOT && self.inner_index == 1;
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return write!(f, "{}[{}]", self.bunch_id, self.inner_index);
    }
}

/// The serialized shape of a non-root bunch: the unit of metadata exchange
/// between replicas.
///
/// A replica must install a bunch's meta (via `Order::receive`) before it
/// can interpret positions that reference the bunch.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BunchMeta {
    /// Globally unique bunch id.
    pub bunch_id: String,
    /// Id of the parent bunch (`ROOT` for top-level bunches).
    pub parent_id: String,
    /// `2 * parent_inner_index + side`, where side is 0 for a left child
    /// and 1 for a right child.
    pub offset: u32,
}

/// Enumerate the run of `count` adjacent positions starting at `start`.
///
/// Bulk creation returns only the first position of a run; the rest share
/// its bunch and follow at consecutive inner indices.
pub fn expand_positions(start: &Position, count: u32) -> Vec<Position> {
    let mut out = Vec::with_capacity(count as usize);
    for i in 0..count {
        out.push(Position::new(
            start.bunch_id.clone(),
            start.inner_index + i,
        ));
    }
    return out;
}

/// Check a bunch id against the character rules the lexicographic encoding
/// depends on: non-empty, every character strictly greater than `','`
/// (which terminates id fields in encoded strings), no `'.'` (which
/// separates an offset from an id), and a first character below `'~'`
/// (so every encoded position sorts under the maximum sentinel).
pub(crate) fn validate_bunch_id(id: &str) -> Result<(), Error> {
    if id.is_empty() {
        return Err(Error::InvalidId {
            id: id.to_string(),
            reason: "empty id",
        });
    }
    let first = id.chars().next().expect("non-empty id");
    if first >= '~' {
        return Err(Error::InvalidId {
            id: id.to_string(),
            reason: "first character must be below '~'",
        });
    }
    for c in id.chars() {
        if c <= ',' {
            return Err(Error::InvalidId {
                id: id.to_string(),
                reason: "characters must be above ','",
            });
        }
        if c == '.' {
            return Err(Error::InvalidId {
                id: id.to_string(),
                reason: "'.' is reserved for offset separators",
            });
        }
    }
    return Ok(());
}

/// Alphabet for random ids: 64 symbols, all legal in bunch ids.
const ID_ALPHABET: &[u8; 64] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz-_";

/// Number of random symbols in a generated id.
const ID_LENGTH: usize = 8;

/// Generate a random bunch or replica id.
///
/// Eight symbols from a 64-symbol alphabet give 48 bits, which keeps the
/// collision probability negligible for the federation sizes this scheme
/// targets. Uniqueness is still checked locally on mint.
pub(crate) fn random_id() -> String {
    let mut bytes = [0u8; ID_LENGTH];
    OsRng.fill_bytes(&mut bytes);
    return bytes
        .iter()
        .map(|b| ID_ALPHABET[(b & 0x3f) as usize] as char)
        .collect();
}
