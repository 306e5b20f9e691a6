// model = "claude-opus-4-5"
// created = "2026-08-01"
// modified = "2026-08-02"
// driver = "Isaac Clayton"

//! Between - globally ordered positions for collaborative lists.
//!
//! Replicas of a shared sequence need stable names for its slots: names
//! that survive concurrent edits, compare the same everywhere, and keep a
//! run of typing contiguous even when two people type into the same spot
//! at once. This crate provides those names and nothing else - values,
//! transport, and persistence stay with the caller.
//!
//! # Pieces
//!
//! | Type | Role |
//! |------|------|
//! | [`Order`] | The bunch tree: creates and compares positions, receives peer metadata |
//! | [`Position`] / [`BunchMeta`] | The identifiers and the metadata replicas exchange |
//! | [`List`], [`Outline`], [`Text`] | Indexed presence views over one `Order` |
//! | [`PositionSource`] | Tree-free generator of order-preserving strings |
//! | [`lex`] | Self-describing string codec whose byte order matches `Order::compare` |
//!
//! # Quick Start
//!
//! ```
//! use between::{List, Order};
//!
//! let mut order = Order::new();
//! let mut list: List<String> = List::new();
//!
//! // Insert at an index; broadcast the returned meta (if any) plus the
//! // position, and peers can place the value identically.
//! let (pos, _meta) = list
//!     .insert_at(&mut order, 0, vec!["hello".to_string()])
//!     .unwrap();
//! assert_eq!(list.get(&pos), Some(&"hello".to_string()));
//! assert_eq!(list.index_of_position(&order, &pos, between::Bias::None).unwrap(), 0);
//! ```
//!
//! Positions are plain data. Their order lives in the [`Order`] tree, so
//! a replica must install a bunch's [`BunchMeta`] (delivered by the
//! caller's transport, parents before children or in one batch) before
//! touching positions that mention it.

pub mod encoding;
pub mod error;
mod items;
pub mod lex;
pub mod list;
pub mod order;
pub mod outline;
pub mod position;
pub mod source;
pub mod text;

pub use error::Error;
pub use items::Bias;
pub use list::List;
pub use order::BunchRef;
pub use order::Order;
pub use order::OrderSave;
pub use outline::Outline;
pub use position::expand_positions;
pub use position::BunchMeta;
pub use position::Position;
pub use position::ROOT;
pub use source::PositionSource;
pub use text::Text;
