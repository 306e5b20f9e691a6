// model = "claude-opus-4-5"
// created = 2026-08-01
// modified = 2026-08-02
// driver = "Isaac Clayton"

//! A local view of the shared sequence holding a value per position.
//!
//! A `List<T>` maps positions to values and maintains the index side of
//! the bargain: `position_at` and `index_of_position` run in O(bunch
//! items + tree depth) thanks to the subtree totals kept by the presence
//! core. The list itself is plain local state; only positions and bunch
//! metas ever travel between replicas.
//!
//! Every operation that needs tree structure takes the [`Order`] the
//! positions were created against. One order may back any number of
//! views.
//!
//! # Example
//!
//! ```
//! use between::{List, Order};
//!
//! let mut order = Order::new();
//! let mut list: List<char> = List::new();
//!
//! let (pos, _meta) = list.insert_at(&mut order, 0, vec!['h', 'i']).unwrap();
//! assert_eq!(list.len(), 2);
//! assert_eq!(list.get(&pos), Some(&'h'));
//! assert_eq!(list.get_at(&order, 1).unwrap(), &'i');
//!
//! list.delete(&order, &pos).unwrap();
//! assert_eq!(list.values(&order).collect::<String>(), "i");
//! ```

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::error::Error;
use crate::items::Bias;
use crate::items::Entries as RawEntries;
use crate::items::ItemList;
use crate::items::Run;
use crate::order::Order;
use crate::position::BunchMeta;
use crate::position::Position;

/// Serialized shape of a list: bunch id to alternating present/deleted
/// runs, present first, trailing deleted omitted. `BTreeMap` keeps key
/// order stable so identical states serialize identically.
pub type ListSave<T> = BTreeMap<String, Vec<ListRun<T>>>;

/// One run in a serialized list: an array of values or a deleted count.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ListRun<T> {
    Values(Vec<T>),
    Deleted(u32),
}

/// A per-replica list of values addressed by positions.
#[derive(Clone, Debug)]
pub struct List<T> {
    items: ItemList<Vec<T>>,
}

impl<T: Clone> Default for List<T> {
    fn default() -> Self {
        return Self::new();
    }
}

impl<T: Clone> List<T> {
    /// Create an empty list.
    pub fn new() -> List<T> {
        return List {
            items: ItemList::new(),
        };
    }

    /// Number of present values.
    pub fn len(&self) -> u64 {
        return self.items.len();
    }

    pub fn is_empty(&self) -> bool {
        return self.items.len() == 0;
    }

    /// Store a value at a position, present or not. Rejects the
    /// sentinels.
    pub fn set(&mut self, order: &Order, pos: &Position, value: T) -> Result<(), Error> {
        return self.items.set(order, pos, vec![value]);
    }

    /// Remove the value at a position, if any. The position itself is
    /// permanent and can be set again later.
    pub fn delete(&mut self, order: &Order, pos: &Position) -> Result<(), Error> {
        return self.items.delete(order, pos, 1);
    }

    /// Is there a value at this position?
    pub fn has(&self, pos: &Position) -> bool {
        return self.items.has(pos);
    }

    /// The value at this position, if present.
    pub fn get(&self, pos: &Position) -> Option<&T> {
        let (item, offset) = self.items.get(pos)?;
        return Some(&item[offset as usize]);
    }

    /// The value at a list index.
    pub fn get_at(&self, order: &Order, index: u64) -> Result<&T, Error> {
        let pos = self.position_at(order, index)?;
        return Ok(self
            .get(&pos)
            .expect("position_at returns present positions"));
    }

    /// Create positions for `values` immediately after `prev` and store
    /// them. Returns the first new position and the minted meta, if any.
    pub fn insert(
        &mut self,
        order: &mut Order,
        prev: &Position,
        values: Vec<T>,
    ) -> Result<(Position, Option<BunchMeta>), Error> {
        let next_index = (self.index_of_position(order, prev, Bias::Left)? + 1) as u64;
        let next = if next_index == self.len() {
            Position::max()
        } else {
            self.position_at(order, next_index)?
        };
        return self.insert_between(order, prev, &next, values);
    }

    /// Create positions for `values` at a list index in `[0, len]` and
    /// store them.
    pub fn insert_at(
        &mut self,
        order: &mut Order,
        index: u64,
        values: Vec<T>,
    ) -> Result<(Position, Option<BunchMeta>), Error> {
        if index > self.len() {
            return Err(Error::IndexOutOfBounds {
                index,
                length: self.len(),
            });
        }
        let prev = if index == 0 {
            Position::min()
        } else {
            self.position_at(order, index - 1)?
        };
        let next = if index == self.len() {
            Position::max()
        } else {
            self.position_at(order, index)?
        };
        return self.insert_between(order, &prev, &next, values);
    }

    fn insert_between(
        &mut self,
        order: &mut Order,
        prev: &Position,
        next: &Position,
        values: Vec<T>,
    ) -> Result<(Position, Option<BunchMeta>), Error> {
        let count = values.len() as u32;
        let (start, meta) = order.create_positions(prev, next, count)?;
        self.items.set(order, &start, values)?;
        return Ok((start, meta));
    }

    /// The index of `pos` per the bias convention: its own index when a
    /// value is present, otherwise -1 (`Bias::None`), the index of the
    /// nearest present value to the left (`Bias::Left`, -1 if none), or
    /// to the right (`Bias::Right`, the length if none).
    pub fn index_of_position(
        &self,
        order: &Order,
        pos: &Position,
        bias: Bias,
    ) -> Result<i64, Error> {
        return self.items.index_of(order, pos, bias);
    }

    /// The position holding the `index`-th value.
    pub fn position_at(&self, order: &Order, index: u64) -> Result<Position, Error> {
        return self.items.position_at(order, index);
    }

    /// The cursor sitting at a gap index in `[0, len]`: the position of
    /// the value on its left, or the minimum sentinel at the front. A
    /// cursor stays attached to its left neighbor as the list changes.
    pub fn cursor_at(&self, order: &Order, index: u64) -> Result<Position, Error> {
        if index > self.len() {
            return Err(Error::IndexOutOfBounds {
                index,
                length: self.len(),
            });
        }
        if index == 0 {
            return Ok(Position::min());
        }
        return self.position_at(order, index - 1);
    }

    /// The current gap index of a cursor.
    pub fn index_of_cursor(&self, order: &Order, cursor: &Position) -> Result<u64, Error> {
        return Ok((self.index_of_position(order, cursor, Bias::Left)? + 1) as u64);
    }

    /// Present values in list order.
    pub fn values<'a>(&'a self, order: &'a Order) -> Values<'a, T> {
        return Values {
            inner: self.items.entries(order),
        };
    }

    /// Present positions in list order.
    pub fn positions<'a>(&'a self, order: &'a Order) -> Positions<'a, T> {
        return Positions {
            inner: self.items.entries(order),
        };
    }

    /// `(position, value)` pairs in list order.
    pub fn entries<'a>(&'a self, order: &'a Order) -> Entries<'a, T> {
        return Entries {
            inner: self.items.entries(order),
        };
    }

    /// The values at indices `[start, end)`.
    pub fn slice<'a>(
        &'a self,
        order: &'a Order,
        start: u64,
        end: u64,
    ) -> Result<Vec<&'a T>, Error> {
        if start > end || end > self.len() {
            return Err(Error::IndexOutOfBounds {
                index: end,
                length: self.len(),
            });
        }
        return Ok(self
            .values(order)
            .skip(start as usize)
            .take((end - start) as usize)
            .collect());
    }

    /// Serialize the presence state. Requires the same order (or a
    /// superset) on load.
    pub fn save(&self) -> ListSave<T> {
        let mut out = ListSave::new();
        for (id, runs) in self.items.saved_runs() {
            let mut saved: Vec<ListRun<T>> = Vec::with_capacity(runs.len() + 1);
            if let Some(Run::Gap(_)) = runs.first() {
                // The wire shape leads with a present run.
                saved.push(ListRun::Values(Vec::new()));
            }
            for run in runs {
                saved.push(match run {
                    Run::Present(item) => ListRun::Values(item.clone()),
                    Run::Gap(n) => ListRun::Deleted(*n),
                });
            }
            out.insert(id.to_string(), saved);
        }
        return out;
    }

    /// Replace the whole state with a previously saved one. Every bunch
    /// named by the save must already be installed in `order`.
    pub fn load(&mut self, order: &Order, save: ListSave<T>) -> Result<(), Error> {
        let data = save.into_iter().map(|(id, runs)| {
            let converted: Vec<Run<Vec<T>>> = runs
                .into_iter()
                .map(|run| match run {
                    ListRun::Values(values) => Run::Present(values),
                    ListRun::Deleted(n) => Run::Gap(n),
                })
                .collect();
            return (id, converted);
        });
        return self.items.load_from(order, data);
    }

    /// Forget every value. The order is untouched; positions remain
    /// usable.
    pub fn clear(&mut self) {
        self.items.clear();
    }
}

/// Iterator over present values. Borrows the list and the order, so
/// neither can be mutated while it is alive.
pub struct Values<'a, T> {
    inner: RawEntries<'a, Vec<T>>,
}

impl<'a, T: Clone> Iterator for Values<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        let (_, _, item, offset) = self.inner.next()?;
        return Some(&item[offset as usize]);
    }
}

/// Iterator over present positions.
pub struct Positions<'a, T> {
    inner: RawEntries<'a, Vec<T>>,
}

impl<'a, T: Clone> Iterator for Positions<'a, T> {
    type Item = Position;

    fn next(&mut self) -> Option<Position> {
        let (bunch_id, inner_index, _, _) = self.inner.next()?;
        return Some(Position::new(bunch_id, inner_index));
    }
}

/// Iterator over `(position, value)` pairs.
pub struct Entries<'a, T> {
    inner: RawEntries<'a, Vec<T>>,
}

impl<'a, T: Clone> Iterator for Entries<'a, T> {
    type Item = (Position, &'a T);

    fn next(&mut self) -> Option<(Position, &'a T)> {
        let (bunch_id, inner_index, item, offset) = self.inner.next()?;
        return Some((
            Position::new(bunch_id, inner_index),
            &item[offset as usize],
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_order() -> Order {
        let mut n = 0u32;
        return Order::with_id_generator(move || {
            let id = format!("b{:02}", n);
            n += 1;
            return id;
        });
    }

    #[test]
    fn insert_at_front_middle_back() {
        let mut order = test_order();
        let mut list: List<char> = List::new();

        list.insert_at(&mut order, 0, vec!['h', 'd']).unwrap();
        list.insert_at(&mut order, 1, vec!['e', 'l', 'l', 'o', ' ', 'w', 'o', 'r', 'l'])
            .unwrap();
        assert_eq!(list.values(&order).collect::<String>(), "hello world");
        assert_eq!(list.len(), 11);
    }

    #[test]
    fn set_and_delete_by_position() {
        let mut order = test_order();
        let mut list: List<&str> = List::new();
        let (pos, _) = list.insert_at(&mut order, 0, vec!["a", "b", "c"]).unwrap();

        let second = Position::new(pos.bunch_id.clone(), 1);
        list.set(&order, &second, "B").unwrap();
        assert_eq!(list.get(&second), Some(&"B"));

        list.delete(&order, &second).unwrap();
        assert_eq!(list.len(), 2);
        assert!(!list.has(&second));
        // The position is permanent: setting it again revives the slot.
        list.set(&order, &second, "b2").unwrap();
        assert_eq!(list.get_at(&order, 1).unwrap(), &"b2");
    }

    #[test]
    fn insert_after_a_position() {
        let mut order = test_order();
        let mut list: List<char> = List::new();
        let (first, _) = list.insert_at(&mut order, 0, vec!['a', 'c']).unwrap();

        list.insert(&mut order, &first, vec!['b']).unwrap();
        assert_eq!(list.values(&order).collect::<String>(), "abc");

        // Inserting after the minimum sentinel prepends.
        list.insert(&mut order, &Position::min(), vec!['_']).unwrap();
        assert_eq!(list.values(&order).collect::<String>(), "_abc");
    }

    #[test]
    fn insert_at_bounds() {
        let mut order = test_order();
        let mut list: List<char> = List::new();
        assert!(matches!(
            list.insert_at(&mut order, 1, vec!['x']),
            Err(Error::IndexOutOfBounds { .. })
        ));
        list.insert_at(&mut order, 0, vec!['x']).unwrap();
        // Appending at index == len is fine.
        list.insert_at(&mut order, 1, vec!['y']).unwrap();
        assert_eq!(list.values(&order).collect::<String>(), "xy");
    }

    #[test]
    fn index_round_trips() {
        let mut order = test_order();
        let mut list: List<u32> = List::new();
        for i in 0..20u64 {
            let at = (i * 7) % (list.len() + 1);
            list.insert_at(&mut order, at, vec![i as u32]).unwrap();
        }
        for i in 0..list.len() {
            let pos = list.position_at(&order, i).unwrap();
            assert_eq!(
                list.index_of_position(&order, &pos, Bias::None).unwrap(),
                i as i64
            );
        }
    }

    #[test]
    fn cursors_stick_to_their_left_neighbor() {
        let mut order = test_order();
        let mut list: List<char> = List::new();
        list.insert_at(&mut order, 0, vec!['a', 'b', 'c']).unwrap();

        let cursor = list.cursor_at(&order, 2).unwrap();
        assert_eq!(list.index_of_cursor(&order, &cursor).unwrap(), 2);

        // An insertion before the cursor shifts it right.
        list.insert_at(&mut order, 0, vec!['_']).unwrap();
        assert_eq!(list.index_of_cursor(&order, &cursor).unwrap(), 3);

        // Deleting the anchor leaves the cursor at the same gap.
        let anchor = list.position_at(&order, 2).unwrap();
        list.delete(&order, &anchor).unwrap();
        assert_eq!(list.index_of_cursor(&order, &cursor).unwrap(), 2);

        // Front cursor is the minimum sentinel.
        assert_eq!(list.cursor_at(&order, 0).unwrap(), Position::min());
        assert_eq!(list.index_of_cursor(&order, &Position::min()).unwrap(), 0);
    }

    #[test]
    fn slice_and_iterators_agree() {
        let mut order = test_order();
        let mut list: List<char> = List::new();
        list.insert_at(&mut order, 0, vec!['a', 'b', 'c', 'd']).unwrap();

        let slice: String = list.slice(&order, 1, 3).unwrap().into_iter().collect();
        assert_eq!(slice, "bc");
        assert!(list.slice(&order, 2, 9).is_err());

        let by_entries: Vec<char> = list.entries(&order).map(|(_, v)| *v).collect();
        let by_positions: Vec<char> = list
            .positions(&order)
            .map(|p| *list.get(&p).unwrap())
            .collect();
        assert_eq!(by_entries, by_positions);
    }

    #[test]
    fn save_load_round_trip() {
        let mut order = test_order();
        let mut list: List<char> = List::new();
        let (pos, _) = list
            .insert_at(&mut order, 0, vec!['a', 'b', 'c', 'd'])
            .unwrap();
        list.delete(&order, &Position::new(pos.bunch_id.clone(), 1))
            .unwrap();

        let saved = list.save();
        let mut other: List<char> = List::new();
        other.load(&order, saved.clone()).unwrap();
        assert_eq!(other.len(), 3);
        assert_eq!(other.values(&order).collect::<String>(), "acd");
        assert_eq!(other.save(), saved);

        list.clear();
        assert_eq!(list.len(), 0);
        assert!(list.save().is_empty());
    }
}
