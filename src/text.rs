// model = "claude-opus-4-5"
// created = 2026-08-02
// modified = 2026-08-02
// driver = "Isaac Clayton"

//! Character view of the shared sequence.
//!
//! `Text` is a [`List`](crate::list::List) of characters whose runs are
//! stored as strings, which is the natural shape for collaborative text:
//! inserts take `&str`, saves carry string runs, and `to_string_with`
//! reassembles the document. Indices count characters, not bytes.
//!
//! # Example
//!
//! ```
//! use between::{Order, Text};
//!
//! let mut order = Order::new();
//! let mut text = Text::new();
//!
//! text.insert_at(&mut order, 0, "hllo").unwrap();
//! text.insert_at(&mut order, 1, "e").unwrap();
//! assert_eq!(text.to_string_with(&order), "hello");
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

/// Serialized shape of a text: bunch id to alternating string/deleted
/// runs, present first, trailing deleted omitted.
pub type TextSave = BTreeMap<String, Vec<TextRun>>;

/// One run in a serialized text: a string of characters or a deleted
/// count.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TextRun {
    Chars(String),
    Deleted(u32),
}

/// A per-replica text document addressed by positions.
#[derive(Clone, Debug)]
pub struct Text {
    items: ItemList<String>,
}

impl Default for Text {
    fn default() -> Self {
        return Self::new();
    }
}

impl Text {
    /// Create an empty text.
    pub fn new() -> Text {
        return Text {
            items: ItemList::new(),
        };
    }

    /// Number of present characters.
    pub fn len(&self) -> u64 {
        return self.items.len();
    }

    pub fn is_empty(&self) -> bool {
        return self.items.len() == 0;
    }

    /// Store a character at a position. Rejects the sentinels.
    pub fn set(&mut self, order: &Order, pos: &Position, c: char) -> Result<(), Error> {
        return self.items.set(order, pos, c.to_string());
    }

    /// Remove the character at a position, if any.
    pub fn delete(&mut self, order: &Order, pos: &Position) -> Result<(), Error> {
        return self.items.delete(order, pos, 1);
    }

    pub fn has(&self, pos: &Position) -> bool {
        return self.items.has(pos);
    }

    /// The character at a position, if present.
    pub fn get(&self, pos: &Position) -> Option<char> {
        let (run, offset) = self.items.get(pos)?;
        return run.chars().nth(offset as usize);
    }

    /// The character at a text index.
    pub fn get_at(&self, order: &Order, index: u64) -> Result<char, Error> {
        let pos = self.position_at(order, index)?;
        return Ok(self
            .get(&pos)
            .expect("position_at returns present positions"));
    }

    /// Create positions for `text` at a character index in `[0, len]` and
    /// store it. Returns the first new position and the minted meta.
    pub fn insert_at(
        &mut self,
        order: &mut Order,
        index: u64,
        text: &str,
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
        let count = text.chars().count() as u32;
        let (start, meta) = order.create_positions(&prev, &next, count)?;
        self.items.set(order, &start, text.to_string())?;
        return Ok((start, meta));
    }

    /// Delete `count` characters starting at a text index.
    pub fn delete_at(&mut self, order: &Order, index: u64, count: u64) -> Result<(), Error> {
        if index + count > self.len() {
            return Err(Error::IndexOutOfBounds {
                index: index + count,
                length: self.len(),
            });
        }
        // Positions are deleted one at a time: the range is contiguous in
        // the text but not necessarily within one bunch.
        for _ in 0..count {
            let pos = self.position_at(order, index)?;
            self.items.delete(order, &pos, 1)?;
        }
        return Ok(());
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

    /// The position of the `index`-th character.
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

    /// The characters at indices `[start, end)` as a string.
    pub fn slice(&self, order: &Order, start: u64, end: u64) -> Result<String, Error> {
        if start > end || end > self.len() {
            return Err(Error::IndexOutOfBounds {
                index: end,
                length: self.len(),
            });
        }
        return Ok(self
            .chars(order)
            .skip(start as usize)
            .take((end - start) as usize)
            .collect());
    }

    /// Present characters in text order.
    pub fn chars<'a>(&'a self, order: &'a Order) -> Chars<'a> {
        return Chars {
            inner: self.items.entries(order),
        };
    }

    /// Present positions in text order.
    pub fn positions<'a>(&'a self, order: &'a Order) -> Positions<'a> {
        return Positions {
            inner: self.items.entries(order),
        };
    }

    /// Render the whole document. This walks the tree; prefer `chars`
    /// when streaming.
    pub fn to_string_with(&self, order: &Order) -> String {
        return self.chars(order).collect();
    }

    /// Serialize the presence state.
    pub fn save(&self) -> TextSave {
        let mut out = TextSave::new();
        for (id, runs) in self.items.saved_runs() {
            let mut saved: Vec<TextRun> = Vec::with_capacity(runs.len() + 1);
            if let Some(Run::Gap(_)) = runs.first() {
                saved.push(TextRun::Chars(String::new()));
            }
            for run in runs {
                saved.push(match run {
                    Run::Present(s) => TextRun::Chars(s.clone()),
                    Run::Gap(n) => TextRun::Deleted(*n),
                });
            }
            out.insert(id.to_string(), saved);
        }
        return out;
    }

    /// Replace the whole state with a previously saved one.
    pub fn load(&mut self, order: &Order, save: TextSave) -> Result<(), Error> {
        let data = save.into_iter().map(|(id, runs)| {
            let converted: Vec<Run<String>> = runs
                .into_iter()
                .map(|run| match run {
                    TextRun::Chars(s) => Run::Present(s),
                    TextRun::Deleted(n) => Run::Gap(n),
                })
                .collect();
            return (id, converted);
        });
        return self.items.load_from(order, data);
    }

    /// Forget every character. The order is untouched.
    pub fn clear(&mut self) {
        self.items.clear();
    }
}

/// Iterator over present characters.
pub struct Chars<'a> {
    inner: RawEntries<'a, String>,
}

impl<'a> Iterator for Chars<'a> {
    type Item = char;

    fn next(&mut self) -> Option<char> {
        let (_, _, run, offset) = self.inner.next()?;
        return run.chars().nth(offset as usize);
    }
}

/// Iterator over present positions.
pub struct Positions<'a> {
    inner: RawEntries<'a, String>,
}

impl<'a> Iterator for Positions<'a> {
    type Item = Position;

    fn next(&mut self) -> Option<Position> {
        let (bunch_id, inner_index, _, _) = self.inner.next()?;
        return Some(Position::new(bunch_id, inner_index));
    }
}
