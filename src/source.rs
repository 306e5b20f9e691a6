// model = "claude-opus-4-5"
// created = 2026-08-02
// modified = 2026-08-02
// driver = "Isaac Clayton"

//! Standalone generator of ordered position strings.
//!
//! A `PositionSource` hands out strings that sort byte-wise in insertion
//! order, with no tree kept anywhere: each string carries its whole
//! ancestry. Use it when positions only ever need comparing as strings
//! and nobody tracks presence; keep an [`Order`](crate::order::Order)
//! when index lookups or compact positions matter.
//!
//! A fresh spot in the sequence becomes a *waypoint*: `",id,counter,"`
//! followed by an encoded value index and a direction letter. Appending
//! after our own newest value at a waypoint just bumps the value index,
//! so a forward typing run grows its string by O(log n) rather than
//! gaining a waypoint per character. `'l'` and `'r'` mark descents left
//! and right; `'l' < 'r'` in ASCII does the rest.
//!
//! # Example
//!
//! ```
//! use between::source::{PositionSource, FIRST, LAST};
//!
//! let mut source = PositionSource::with_id("A").unwrap();
//! let p1 = source.create_between(FIRST, LAST).unwrap();
//! let p2 = source.create_between(&p1, LAST).unwrap();
//! let p3 = source.create_between(&p1, &p2).unwrap();
//! assert!(p1 < p3 && p3 < p2);
//! ```

use crate::encoding::decode_offset;
use crate::encoding::encode_offset;
use crate::error::Error;
use crate::position::random_id;
use crate::position::validate_bunch_id;

/// Sorts before every position any source creates.
pub const FIRST: &str = "";

/// Sorts after every position any source creates.
pub const LAST: &str = "~";

/// A generator of ordered strings for one replica.
#[derive(Clone, Debug)]
pub struct PositionSource {
    id: String,
    /// Per-waypoint frontier: the value index of the newest position we
    /// created at each of our waypoints.
    last_value_indices: Vec<u64>,
}

impl PositionSource {
    /// Create a source with a random replica id.
    pub fn new() -> PositionSource {
        return PositionSource {
            id: random_id(),
            last_value_indices: Vec::new(),
        };
    }

    /// Create a source with a caller-chosen id. Ids follow the bunch id
    /// rules and must be unique per source across the federation.
    pub fn with_id(id: impl Into<String>) -> Result<PositionSource, Error> {
        let id = id.into();
        validate_bunch_id(&id)?;
        return Ok(PositionSource {
            id,
            last_value_indices: Vec::new(),
        });
    }

    /// This source's replica id.
    pub fn id(&self) -> &str {
        return &self.id;
    }

    /// Create a position strictly between `left` and `right`, both of
    /// which are `FIRST`, `LAST`, or positions from any source.
    pub fn create_between(&mut self, left: &str, right: &str) -> Result<String, Error> {
        if left >= right {
            return Err(Error::Inversion {
                prev: left.to_string(),
                next: right.to_string(),
            });
        }

        // Descend left of `right` when it hems us in: either the sequence
        // is empty on our left, or `right` extends `left` (so appending
        // to `left` could leapfrog it).
        if right != LAST && (left == FIRST || right.starts_with(left)) {
            let stem = trim_last_char(right);
            let waypoint = self.new_waypoint();
            return Ok(format!("{}l,{}", stem, waypoint));
        }

        if left == FIRST {
            return Ok(self.new_waypoint());
        }

        // Append: if `left` is the newest value at one of our waypoints,
        // bump the value index in place instead of growing the string.
        if let Some(appended) = self.try_append(left) {
            return Ok(appended);
        }

        // Otherwise descend right of `left` with a fresh waypoint.
        let waypoint = self.new_waypoint();
        return Ok(format!("{},{}", left, waypoint));
    }

    /// Allocate a waypoint: `id , counter , first-value 'r'`.
    fn new_waypoint(&mut self) -> String {
        let counter = self.last_value_indices.len() as u64;
        self.last_value_indices.push(0);
        return format!(
            "{},{},{}r",
            self.id,
            encode_offset(counter),
            encode_offset(0)
        );
    }

    /// Parse the trailing `sender, counter, value` triple of `left`; if
    /// the sender is us and the value is that waypoint's frontier, emit
    /// the successor value and advance the frontier.
    fn try_append(&mut self, left: &str) -> Option<String> {
        let mut tail = left.rsplit(',');
        let value_part = tail.next()?;
        let counter_part = tail.next()?;
        let sender = tail.next()?;
        if sender != self.id {
            return None;
        }

        let side = value_part.chars().last()?;
        if side != 'l' && side != 'r' {
            return None;
        }
        let value = decode_offset(&value_part[..value_part.len() - 1])?;
        let counter = decode_offset(counter_part)? as usize;
        if self.last_value_indices.get(counter) != Some(&value) {
            return None;
        }

        self.last_value_indices[counter] = value + 1;
        let keep = left.len() - value_part.len();
        return Some(format!("{}{}r", &left[..keep], encode_offset(value + 1)));
    }
}

impl Default for PositionSource {
    fn default() -> Self {
        return Self::new();
    }
}

/// The string minus its final character.
fn trim_last_char(s: &str) -> &str {
    let cut = s
        .char_indices()
        .last()
        .map(|(i, _)| i)
        .unwrap_or(0);
    return &s[..cut];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_append_reuses_the_waypoint() {
        let mut source = PositionSource::with_id("A").unwrap();
        let p1 = source.create_between(FIRST, LAST).unwrap();
        assert_eq!(p1, "A,0,0r");
        let p2 = source.create_between(&p1, LAST).unwrap();
        assert_eq!(p2, "A,0,1r");
        let p3 = source.create_between(&p2, LAST).unwrap();
        assert_eq!(p3, "A,0,2r");
        assert!(p1 < p2 && p2 < p3);
    }

    #[test]
    fn concurrent_first_positions_order_by_id() {
        let mut a = PositionSource::with_id("A").unwrap();
        let mut b = PositionSource::with_id("B").unwrap();
        let pa = a.create_between(FIRST, LAST).unwrap();
        let pb = b.create_between(FIRST, LAST).unwrap();
        assert_eq!(pa, "A,0,0r");
        assert_eq!(pb, "B,0,0r");
        assert!(pa < pb);
    }

    #[test]
    fn concurrent_runs_do_not_interleave() {
        let mut origin = PositionSource::with_id("O").unwrap();
        let fixed = origin.create_between(FIRST, LAST).unwrap();

        let mut a = PositionSource::with_id("A").unwrap();
        let mut b = PositionSource::with_id("B").unwrap();
        let mut a_run = Vec::new();
        let mut b_run = Vec::new();
        let mut prev = FIRST.to_string();
        for _ in 0..3 {
            prev = a.create_between(&prev, &fixed).unwrap();
            a_run.push(prev.clone());
        }
        prev = FIRST.to_string();
        for _ in 0..3 {
            prev = b.create_between(&prev, &fixed).unwrap();
            b_run.push(prev.clone());
        }

        let mut merged: Vec<&String> = a_run.iter().chain(b_run.iter()).collect();
        merged.sort();
        let joined: Vec<bool> = merged.iter().map(|p| a_run.contains(p)).collect();
        // One contiguous block of A positions, in run order.
        assert_eq!(joined, vec![true, true, true, false, false, false]);
        assert!(a_run.windows(2).all(|w| w[0] < w[1]));
        assert!(b_run.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn dense_insertion_stays_ordered() {
        let mut source = PositionSource::with_id("A").unwrap();
        let mut positions = vec![
            source.create_between(FIRST, LAST).unwrap(),
        ];
        // Repeatedly split every gap, checking order each round.
        for _ in 0..4 {
            let mut next_round = Vec::new();
            let mut left = FIRST.to_string();
            for p in &positions {
                let mid = source.create_between(&left, p).unwrap();
                assert!(left.as_str() < mid.as_str() && mid.as_str() < p.as_str());
                next_round.push(mid);
                next_round.push(p.clone());
                left = p.clone();
            }
            next_round.push(source.create_between(&left, LAST).unwrap());
            positions = next_round;
            assert!(positions.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn appending_after_a_stale_value_takes_a_new_waypoint() {
        let mut source = PositionSource::with_id("A").unwrap();
        let p1 = source.create_between(FIRST, LAST).unwrap();
        let p2 = source.create_between(&p1, LAST).unwrap();
        // p1 is no longer the frontier of waypoint 0, so a position after
        // it (but before p2) must not bump the shared value index.
        let mid = source.create_between(&p1, &p2).unwrap();
        assert!(p1 < mid && mid < p2);
        assert_ne!(mid, "A,0,1r");
    }

    #[test]
    fn inversion_and_bad_ids_are_rejected() {
        let mut source = PositionSource::with_id("A").unwrap();
        let p = source.create_between(FIRST, LAST).unwrap();
        assert!(matches!(
            source.create_between(&p, &p),
            Err(Error::Inversion { .. })
        ));
        assert!(matches!(
            source.create_between(LAST, FIRST),
            Err(Error::Inversion { .. })
        ));
        assert!(PositionSource::with_id("a,b").is_err());
        assert!(PositionSource::with_id("").is_err());
    }

    #[test]
    fn foreign_positions_are_usable_anchors() {
        let mut a = PositionSource::with_id("A").unwrap();
        let mut b = PositionSource::with_id("B").unwrap();
        let pa = a.create_between(FIRST, LAST).unwrap();
        // B inserts before and after A's position.
        let before = b.create_between(FIRST, &pa).unwrap();
        let after = b.create_between(&pa, LAST).unwrap();
        assert!(before < pa && pa < after);
    }
}
