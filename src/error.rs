// model = "claude-opus-4-5"
// created = "2026-08-01"
// modified = "2026-08-02"
// driver = "Isaac Clayton"

//! Errors surfaced by the position tree and its views.
//!
//! Every failure carries the offending input. The library never retries and
//! never logs; callers decide what to do with a rejected operation.

use thiserror::Error;

/// Any error produced by this crate.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// A position is malformed: the root bunch only carries the two
    /// sentinel inner indices.
    #[error("invalid position `{bunch_id}`[{inner_index}]: {reason}")]
    InvalidPosition {
        bunch_id: String,
        inner_index: u32,
        reason: &'static str,
    },

    /// A position references a bunch that is not installed locally.
    #[error("unknown bunch `{bunch_id}`")]
    UnknownBunch { bunch_id: String },

    /// A received meta references a parent that is neither installed nor
    /// elsewhere in the same batch.
    #[error("meta for `{bunch_id}` references unknown parent `{parent_id}`")]
    UnknownParent {
        bunch_id: String,
        parent_id: String,
    },

    /// A received meta duplicates an existing bunch id with a different
    /// parent or offset.
    #[error("conflicting metas for bunch `{bunch_id}`")]
    Conflict { bunch_id: String },

    /// The parent relation among received metas contains a cycle.
    #[error("cycle in received metas involving bunch `{bunch_id}`")]
    Cycle { bunch_id: String },

    /// A received meta attempts to redefine the root bunch.
    #[error("received meta attempts to redefine the root bunch")]
    InvalidRoot,

    /// A bunch id fails character validation.
    #[error("invalid bunch id `{id}`: {reason}")]
    InvalidId { id: String, reason: &'static str },

    /// The id generator returned an id that is already installed.
    #[error("bunch id generator returned existing id `{id}`")]
    IdCollision { id: String },

    /// `create_positions` was called with `prev >= next`, or with a
    /// zero count.
    #[error("cannot create positions between `{prev}` and `{next}`")]
    Inversion { prev: String, next: String },

    /// An index fell outside the valid range.
    #[error("index {index} out of bounds for length {length}")]
    IndexOutOfBounds { index: u64, length: u64 },

    /// A lexicographic position string failed to parse.
    #[error("malformed lex position `{input}`: {reason}")]
    MalformedLex { input: String, reason: &'static str },
}
