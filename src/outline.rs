// model = "claude-opus-4-5"
// created = 2026-08-01
// modified = 2026-08-02
// driver = "Isaac Clayton"

//! Presence-only view of the shared sequence.
//!
//! An `Outline` is a [`List`](crate::list::List) without the values: it
//! tracks which positions are present and answers the same index queries,
//! at a fraction of the memory. Useful when values live elsewhere (a
//! database, a rope) keyed by position, and the replica only needs the
//! index arithmetic.

use std::collections::BTreeMap;

use crate::error::Error;
use crate::items::Bias;
use crate::items::Entries as RawEntries;
use crate::items::ItemList;
use crate::items::Run;
use crate::order::Order;
use crate::position::BunchMeta;
use crate::position::Position;

/// Serialized shape of an outline: bunch id to alternating
/// present/deleted counts, present first, trailing deleted omitted. A
/// leading `0` marks a bunch that starts deleted.
pub type OutlineSave = BTreeMap<String, Vec<u32>>;

/// A per-replica presence set over positions, with index lookups.
#[derive(Clone, Debug)]
pub struct Outline {
    items: ItemList<u32>,
}

impl Default for Outline {
    fn default() -> Self {
        return Self::new();
    }
}

impl Outline {
    /// Create an empty outline.
    pub fn new() -> Outline {
        return Outline {
            items: ItemList::new(),
        };
    }

    /// Number of present positions.
    pub fn len(&self) -> u64 {
        return self.items.len();
    }

    pub fn is_empty(&self) -> bool {
        return self.items.len() == 0;
    }

    /// Mark a position present. Rejects the sentinels.
    pub fn add(&mut self, order: &Order, pos: &Position) -> Result<(), Error> {
        return self.items.set(order, pos, 1);
    }

    /// Mark `count` adjacent positions present, starting at `start`.
    pub fn add_run(&mut self, order: &Order, start: &Position, count: u32) -> Result<(), Error> {
        return self.items.set(order, start, count);
    }

    /// Mark a position absent.
    pub fn delete(&mut self, order: &Order, pos: &Position) -> Result<(), Error> {
        return self.items.delete(order, pos, 1);
    }

    pub fn has(&self, pos: &Position) -> bool {
        return self.items.has(pos);
    }

    /// Create `count` positions immediately after `prev` and mark them
    /// present.
    pub fn insert(
        &mut self,
        order: &mut Order,
        prev: &Position,
        count: u32,
    ) -> Result<(Position, Option<BunchMeta>), Error> {
        let next_index = (self.index_of_position(order, prev, Bias::Left)? + 1) as u64;
        let next = if next_index == self.len() {
            Position::max()
        } else {
            self.position_at(order, next_index)?
        };
        let (start, meta) = order.create_positions(prev, &next, count)?;
        self.items.set(order, &start, count)?;
        return Ok((start, meta));
    }

    /// Create `count` positions at a gap index in `[0, len]` and mark
    /// them present.
    pub fn insert_at(
        &mut self,
        order: &mut Order,
        index: u64,
        count: u32,
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
        let (start, meta) = order.create_positions(&prev, &next, count)?;
        self.items.set(order, &start, count)?;
        return Ok((start, meta));
    }

    /// See [`List::index_of_position`](crate::list::List::index_of_position).
    pub fn index_of_position(
        &self,
        order: &Order,
        pos: &Position,
        bias: Bias,
    ) -> Result<i64, Error> {
        return self.items.index_of(order, pos, bias);
    }

    /// The `index`-th present position.
    pub fn position_at(&self, order: &Order, index: u64) -> Result<Position, Error> {
        return self.items.position_at(order, index);
    }

    /// See [`List::cursor_at`](crate::list::List::cursor_at).
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

    /// See [`List::index_of_cursor`](crate::list::List::index_of_cursor).
    pub fn index_of_cursor(&self, order: &Order, cursor: &Position) -> Result<u64, Error> {
        return Ok((self.index_of_position(order, cursor, Bias::Left)? + 1) as u64);
    }

    /// Present positions in list order.
    pub fn positions<'a>(&'a self, order: &'a Order) -> Positions<'a> {
        return Positions {
            inner: self.items.entries(order),
        };
    }

    /// Serialize the presence state.
    pub fn save(&self) -> OutlineSave {
        let mut out = OutlineSave::new();
        for (id, runs) in self.items.saved_runs() {
            let mut saved: Vec<u32> = Vec::with_capacity(runs.len() + 1);
            if let Some(Run::Gap(_)) = runs.first() {
                saved.push(0);
            }
            for run in runs {
                saved.push(match run {
                    Run::Present(count) => *count,
                    Run::Gap(n) => *n,
                });
            }
            out.insert(id.to_string(), saved);
        }
        return out;
    }

    /// Replace the whole state with a previously saved one.
    pub fn load(&mut self, order: &Order, save: OutlineSave) -> Result<(), Error> {
        let data = save.into_iter().map(|(id, counts)| {
            let converted: Vec<Run<u32>> = counts
                .into_iter()
                .enumerate()
                .map(|(i, n)| {
                    if i % 2 == 0 {
                        return Run::Present(n);
                    }
                    return Run::Gap(n);
                })
                .collect();
            return (id, converted);
        });
        return self.items.load_from(order, data);
    }

    /// Forget every position. The order is untouched.
    pub fn clear(&mut self) {
        self.items.clear();
    }
}

/// Iterator over present positions in list order.
pub struct Positions<'a> {
    inner: RawEntries<'a, u32>,
}

impl<'a> Iterator for Positions<'a> {
    type Item = Position;

    fn next(&mut self) -> Option<Position> {
        let (bunch_id, inner_index, _, _) = self.inner.next()?;
        return Some(Position::new(bunch_id, inner_index));
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
    fn add_and_index() {
        let mut order = test_order();
        let mut outline = Outline::new();
        let (start, _) = outline.insert_at(&mut order, 0, 3).unwrap();
        assert_eq!(outline.len(), 3);

        let middle = Position::new(start.bunch_id.clone(), 1);
        assert!(outline.has(&middle));
        assert_eq!(
            outline.index_of_position(&order, &middle, Bias::None).unwrap(),
            1
        );

        outline.delete(&order, &middle).unwrap();
        assert_eq!(outline.len(), 2);
        assert_eq!(
            outline.index_of_position(&order, &middle, Bias::Right).unwrap(),
            1
        );
    }

    #[test]
    fn mirrors_a_list() {
        // An outline fed the same positions as a list answers the same
        // index queries.
        let mut order = test_order();
        let mut list: crate::list::List<u32> = crate::list::List::new();
        let mut outline = Outline::new();

        for i in 0..12u64 {
            let at = (i * 5) % (list.len() + 1);
            let (pos, _) = list.insert_at(&mut order, at, vec![i as u32]).unwrap();
            outline.add(&order, &pos).unwrap();
        }
        assert_eq!(outline.len(), list.len());
        for i in 0..list.len() {
            assert_eq!(
                outline.position_at(&order, i).unwrap(),
                list.position_at(&order, i).unwrap()
            );
        }
        let from_list: Vec<Position> = list.positions(&order).collect();
        let from_outline: Vec<Position> = outline.positions(&order).collect();
        assert_eq!(from_list, from_outline);
    }

    #[test]
    fn save_load_round_trip() {
        let mut order = test_order();
        let mut outline = Outline::new();
        let (start, _) = outline.insert_at(&mut order, 0, 4).unwrap();
        outline
            .delete(&order, &Position::new(start.bunch_id.clone(), 0))
            .unwrap();

        let saved = outline.save();
        // Leading deletion shows up as a leading zero present count.
        assert_eq!(saved[&start.bunch_id][0], 0);

        let mut other = Outline::new();
        other.load(&order, saved.clone()).unwrap();
        assert_eq!(other.len(), 3);
        assert_eq!(other.save(), saved);
    }
}
