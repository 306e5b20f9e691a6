// model = "claude-opus-4-5"
// created = 2026-08-01
// modified = 2026-08-02
// driver = "Isaac Clayton"

//! Run-length presence storage shared by the indexed views.
//!
//! A view tracks which positions currently hold values. Per bunch it keeps
//! an alternating sequence of present and deleted runs, and a `total`: the
//! number of present values in the bunch plus all of its descendants. The
//! totals turn the bunch tree into a weight-augmented index, so
//! index-to-position and position-to-index both run in time proportional
//! to the bunch's item count plus the tree depth.
//!
//! Run invariants (hold after every operation):
//!
//! - Runs strictly alternate between present and deleted.
//! - No zero-length runs.
//! - No trailing deleted run (a leading one is fine).
//!
//! The payload of a present run is abstracted by [`Itemer`]: a `Vec<T>`
//! for value lists, a bare count for outlines, a `String` for text. All
//! index arithmetic lives here, written once.

use rustc_hash::FxHashMap;

use crate::error::Error;
use crate::order::NodeIdx;
use crate::order::Order;
use crate::position::Position;

/// Where to land when asking for the index of a position that holds no
/// value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Bias {
    /// Report absence: the query returns -1.
    None,
    /// The index of the closest present value on the left (-1 if none).
    Left,
    /// The index of the closest present value on the right (the length if
    /// none).
    Right,
}

// =============================================================================
// Items
// =============================================================================

/// The payload of a present run.
pub(crate) trait Itemer: Clone {
    /// Number of consecutive slots this item covers.
    fn length(&self) -> u32;
    /// The sub-item covering `[start, end)`.
    fn slice(&self, start: u32, end: u32) -> Self;
    /// Extend with another item of the same kind.
    fn append(&mut self, other: Self);
}

impl<T: Clone> Itemer for Vec<T> {
    fn length(&self) -> u32 {
        return self.len() as u32;
    }

    fn slice(&self, start: u32, end: u32) -> Vec<T> {
        return self[start as usize..end as usize].to_vec();
    }

    fn append(&mut self, mut other: Vec<T>) {
        self.extend(other.drain(..));
    }
}

/// An outline stores no values, only how many slots are present.
impl Itemer for u32 {
    fn length(&self) -> u32 {
        return *self;
    }

    fn slice(&self, start: u32, end: u32) -> u32 {
        return end - start;
    }

    fn append(&mut self, other: u32) {
        *self += other;
    }
}

/// Text runs are strings; lengths count characters, not bytes.
impl Itemer for String {
    fn length(&self) -> u32 {
        return self.chars().count() as u32;
    }

    fn slice(&self, start: u32, end: u32) -> String {
        return self
            .chars()
            .skip(start as usize)
            .take((end - start) as usize)
            .collect();
    }

    fn append(&mut self, other: String) {
        self.push_str(&other);
    }
}

// =============================================================================
// Runs
// =============================================================================

/// One run in a bunch's presence array.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Run<I> {
    Present(I),
    Gap(u32),
}

impl<I: Itemer> Run<I> {
    pub(crate) fn len(&self) -> u32 {
        return match self {
            Run::Present(item) => item.length(),
            Run::Gap(n) => *n,
        };
    }
}

/// Append a run, merging with the tail and dropping empty runs, so the
/// alternation invariant is maintained by construction.
fn push_run<I: Itemer>(runs: &mut Vec<Run<I>>, run: Run<I>) {
    if run.len() == 0 {
        return;
    }
    match (runs.last_mut(), run) {
        (Some(Run::Present(tail)), Run::Present(item)) => tail.append(item),
        (Some(Run::Gap(tail)), Run::Gap(n)) => *tail += n,
        (_, run) => runs.push(run),
    }
}

/// The presence state of one bunch.
#[derive(Clone, Debug)]
pub(crate) struct BunchRuns<I> {
    pub(crate) runs: Vec<Run<I>>,
    /// Present values in this bunch plus all descendant bunches.
    pub(crate) total: u64,
}

impl<I> Default for BunchRuns<I> {
    fn default() -> Self {
        return BunchRuns {
            runs: Vec::new(),
            total: 0,
        };
    }
}

impl<I: Itemer> BunchRuns<I> {
    /// Replace the slots `[start, start + span)` with `with` (`None` for a
    /// gap) and return the change in the bunch's own present count.
    fn replace_range(&mut self, start: u32, span: u32, with: Option<I>) -> i64 {
        let end = start + span;
        let mut before: Vec<Run<I>> = Vec::new();
        let mut after: Vec<Run<I>> = Vec::new();
        let mut removed: u64 = 0;
        let mut at: u32 = 0;

        for run in std::mem::take(&mut self.runs) {
            let len = run.len();
            let (run_start, run_end) = (at, at + len);
            at = run_end;

            let cut = run_end.min(start);
            if cut > run_start {
                push_run(&mut before, part(&run, 0, cut - run_start));
            }
            let mid_start = run_start.max(start);
            let mid_end = run_end.min(end);
            if mid_end > mid_start {
                if let Run::Present(_) = run {
                    removed += (mid_end - mid_start) as u64;
                }
            }
            let keep = run_start.max(end);
            if run_end > keep {
                push_run(&mut after, part(&run, keep - run_start, len));
            }
        }

        // Writing past the tracked tail: pad the gap up to `start`.
        if at < start {
            push_run(&mut before, Run::Gap(start - at));
        }

        let mut runs = before;
        let added: u64 = match with {
            Some(item) => {
                let n = item.length() as u64;
                push_run(&mut runs, Run::Present(item));
                n
            }
            None => {
                push_run(&mut runs, Run::Gap(span));
                0
            }
        };
        for run in after {
            push_run(&mut runs, run);
        }
        while let Some(Run::Gap(_)) = runs.last() {
            runs.pop();
        }
        self.runs = runs;
        return added as i64 - removed as i64;
    }

    /// Present values strictly before `inner`.
    fn present_before(&self, inner: u32) -> u64 {
        let mut acc: u64 = 0;
        let mut at: u32 = 0;
        for run in &self.runs {
            if at >= inner {
                break;
            }
            let take = run.len().min(inner - at);
            if let Run::Present(_) = run {
                acc += take as u64;
            }
            at += run.len();
        }
        return acc;
    }

    /// Present values in this bunch alone.
    fn present_count(&self) -> u64 {
        let mut acc: u64 = 0;
        for run in &self.runs {
            if let Run::Present(item) = run {
                acc += item.length() as u64;
            }
        }
        return acc;
    }
}

/// The sub-run covering `[from, to)` of `run`.
fn part<I: Itemer>(run: &Run<I>, from: u32, to: u32) -> Run<I> {
    return match run {
        Run::Present(item) => Run::Present(item.slice(from, to)),
        Run::Gap(_) => Run::Gap(to - from),
    };
}

// =============================================================================
// ItemList
// =============================================================================

/// The generic presence map: bunch id to runs-plus-total, with all of the
/// index arithmetic. Views wrap this with typed APIs.
#[derive(Clone, Debug)]
pub(crate) struct ItemList<I> {
    bunches: FxHashMap<String, BunchRuns<I>>,
    len: u64,
}

impl<I: Itemer> ItemList<I> {
    pub(crate) fn new() -> ItemList<I> {
        return ItemList {
            bunches: FxHashMap::default(),
            len: 0,
        };
    }

    /// Present values across every bunch.
    pub(crate) fn len(&self) -> u64 {
        return self.len;
    }

    /// Store `item` starting at `pos`, overwriting whatever the covered
    /// slots held.
    pub(crate) fn set(&mut self, order: &Order, pos: &Position, item: I) -> Result<(), Error> {
        let span = item.length();
        return self.apply(order, pos, span, Some(item));
    }

    /// Clear `span` slots starting at `pos`.
    pub(crate) fn delete(
        &mut self,
        order: &Order,
        pos: &Position,
        span: u32,
    ) -> Result<(), Error> {
        return self.apply(order, pos, span, None);
    }

    fn apply(
        &mut self,
        order: &Order,
        pos: &Position,
        span: u32,
        item: Option<I>,
    ) -> Result<(), Error> {
        let idx = order.node_for(pos)?;
        if idx == order.root() {
            return Err(Error::InvalidPosition {
                bunch_id: pos.bunch_id.clone(),
                inner_index: pos.inner_index,
                reason: "the sentinel positions are not slots",
            });
        }

        let delta = {
            let bunch = self.bunches.entry(pos.bunch_id.clone()).or_default();
            let delta = bunch.replace_range(pos.inner_index, span, item);
            bunch.total = (bunch.total as i64 + delta) as u64;
            delta
        };
        if let Some(bunch) = self.bunches.get(&pos.bunch_id) {
            if bunch.total == 0 && bunch.runs.is_empty() {
                self.bunches.remove(&pos.bunch_id);
            }
        }
        if delta == 0 {
            return Ok(());
        }

        // Propagate the change to every ancestor's subtree total. The
        // root's total is the list length, tracked separately.
        let mut cur = order.node(idx).parent;
        while let Some(parent) = cur {
            let node = order.node(parent);
            if node.parent.is_none() {
                break;
            }
            let bunch = self.bunches.entry(node.id.clone()).or_default();
            bunch.total = (bunch.total as i64 + delta) as u64;
            let prune = bunch.total == 0 && bunch.runs.is_empty();
            if prune {
                self.bunches.remove(&node.id);
            }
            cur = node.parent;
        }
        self.len = (self.len as i64 + delta) as u64;
        return Ok(());
    }

    /// The item covering `pos` and the offset of `pos` within it.
    pub(crate) fn get(&self, pos: &Position) -> Option<(&I, u32)> {
        let bunch = self.bunches.get(&pos.bunch_id)?;
        let mut at = pos.inner_index;
        for run in &bunch.runs {
            let len = run.len();
            if at < len {
                return match run {
                    Run::Present(item) => Some((item, at)),
                    Run::Gap(_) => None,
                };
            }
            at -= len;
        }
        return None;
    }

    pub(crate) fn has(&self, pos: &Position) -> bool {
        return self.get(pos).is_some();
    }

    fn total_of(&self, bunch_id: &str) -> u64 {
        return self.bunches.get(bunch_id).map(|b| b.total).unwrap_or(0);
    }

    // -------------------------------------------------------------------------
    // Index arithmetic
    // -------------------------------------------------------------------------

    /// The list index of `pos`: the number of present values before it,
    /// which is its own index when present. Otherwise `bias` picks the
    /// -1 / left-neighbor / right-neighbor convention.
    pub(crate) fn index_of(
        &self,
        order: &Order,
        pos: &Position,
        bias: Bias,
    ) -> Result<i64, Error> {
        let idx = order.node_for(pos)?;
        let mut acc: u64 = 0;

        // Values of this bunch before pos, and child subtrees hanging at
        // or below pos's inner index. Children are in ascending offset
        // order, so the scan can stop at the first one past the position.
        if let Some(bunch) = self.bunches.get(&pos.bunch_id) {
            acc += bunch.present_before(pos.inner_index);
        }
        for &child in order.node(idx).children.iter() {
            if order.node(child).next_inner() <= pos.inner_index {
                acc += self.total_of(&order.node(child).id);
            } else {
                break;
            }
        }

        // Climb to the root: everything before the current subtree.
        let mut cur = idx;
        while let Some(parent) = order.node(cur).parent {
            let boundary = order.node(cur).next_inner();
            let pnode = order.node(parent);
            if let Some(bunch) = self.bunches.get(&pnode.id) {
                acc += bunch.present_before(boundary);
            }
            for &sibling in pnode.children.iter() {
                if sibling == cur {
                    break;
                }
                acc += self.total_of(&order.node(sibling).id);
            }
            cur = parent;
        }

        if self.get(pos).is_some() {
            return Ok(acc as i64);
        }
        return Ok(match bias {
            Bias::None => -1,
            Bias::Left => acc as i64 - 1,
            Bias::Right => acc as i64,
        });
    }

    /// The position of the `index`-th present value. Descends from the
    /// root, debiting the index against value pieces and child totals.
    pub(crate) fn position_at(&self, order: &Order, index: u64) -> Result<Position, Error> {
        if index >= self.len {
            return Err(Error::IndexOutOfBounds {
                index,
                length: self.len,
            });
        }
        let mut remaining = index;
        let mut node = order.root();
        'descend: loop {
            for piece in self.walk(order, node) {
                match piece {
                    Piece::Values { inner, start, end, .. } => {
                        let span = (end - start) as u64;
                        if remaining < span {
                            let id = order.node(node).id.clone();
                            return Ok(Position::new(id, inner + remaining as u32));
                        }
                        remaining -= span;
                    }
                    Piece::Child(child) => {
                        let total = self.total_of(&order.node(child).id);
                        if remaining < total {
                            node = child;
                            continue 'descend;
                        }
                        remaining -= total;
                    }
                }
            }
            unreachable!("presence totals disagree with stored runs");
        }
    }

    // -------------------------------------------------------------------------
    // Traversal
    // -------------------------------------------------------------------------

    /// The pieces of one bunch in list order: present-value slices split
    /// at child boundaries, interleaved with non-empty child subtrees.
    pub(crate) fn walk<'a>(&'a self, order: &'a Order, idx: NodeIdx) -> BunchWalk<'a, I> {
        let node = order.node(idx);
        let runs = self
            .bunches
            .get(&node.id)
            .map(|b| b.runs.as_slice())
            .unwrap_or(&[]);
        return BunchWalk {
            list: self,
            order,
            bunch_id: &node.id,
            runs,
            run_i: 0,
            run_off: 0,
            inner: 0,
            children: &node.children,
            child_i: 0,
        };
    }

    /// Every present value in list order, as
    /// `(bunch_id, inner_index, item, offset_in_item)`.
    pub(crate) fn entries<'a>(&'a self, order: &'a Order) -> Entries<'a, I> {
        return Entries {
            list: self,
            order,
            stack: vec![self.walk(order, order.root())],
            current: None,
        };
    }

    // -------------------------------------------------------------------------
    // Durability
    // -------------------------------------------------------------------------

    /// Bunches with stored runs, for serialization.
    pub(crate) fn saved_runs(&self) -> impl Iterator<Item = (&str, &[Run<I>])> {
        return self
            .bunches
            .iter()
            .filter(|(_, bunch)| !bunch.runs.is_empty())
            .map(|(id, bunch)| (id.as_str(), bunch.runs.as_slice()));
    }

    /// Replace the whole state from deserialized runs. Every named bunch
    /// must already be installed in `order`; totals are rebuilt.
    pub(crate) fn load_from(
        &mut self,
        order: &Order,
        data: impl IntoIterator<Item = (String, Vec<Run<I>>)>,
    ) -> Result<(), Error> {
        let mut bunches: FxHashMap<String, BunchRuns<I>> = FxHashMap::default();
        let mut counts: Vec<(NodeIdx, u64)> = Vec::new();

        for (id, raw) in data {
            let idx = order.index(&id).ok_or_else(|| Error::UnknownBunch {
                bunch_id: id.clone(),
            })?;
            if idx == order.root() {
                return Err(Error::InvalidPosition {
                    bunch_id: id,
                    inner_index: 0,
                    reason: "the sentinel positions are not slots",
                });
            }
            // Re-normalize: merge adjacent runs of one kind, drop empties
            // and the trailing gap.
            let mut runs: Vec<Run<I>> = Vec::with_capacity(raw.len());
            for run in raw {
                push_run(&mut runs, run);
            }
            while let Some(Run::Gap(_)) = runs.last() {
                runs.pop();
            }
            if runs.is_empty() {
                continue;
            }
            let bunch = BunchRuns { runs, total: 0 };
            counts.push((idx, bunch.present_count()));
            bunches.insert(id, bunch);
        }

        self.bunches = bunches;
        self.len = 0;
        for (idx, count) in counts {
            if count == 0 {
                continue;
            }
            self.len += count;
            let mut cur = idx;
            while let Some(parent) = order.node(cur).parent {
                let id = &order.node(cur).id;
                self.bunches.entry(id.clone()).or_default().total += count;
                cur = parent;
            }
        }
        return Ok(());
    }

    pub(crate) fn clear(&mut self) {
        self.bunches.clear();
        self.len = 0;
    }
}

// =============================================================================
// Walk iterators
// =============================================================================

/// One emission of [`BunchWalk`].
pub(crate) enum Piece<'a, I> {
    /// A slice of a present run: slots `inner ..` hold
    /// `item[start..end]`.
    Values {
        inner: u32,
        item: &'a I,
        start: u32,
        end: u32,
    },
    /// A non-empty child subtree in its slot between two values.
    Child(NodeIdx),
}

/// Iterator over one bunch's pieces in list order.
pub(crate) struct BunchWalk<'a, I> {
    list: &'a ItemList<I>,
    order: &'a Order,
    bunch_id: &'a str,
    runs: &'a [Run<I>],
    run_i: usize,
    run_off: u32,
    inner: u32,
    children: &'a [NodeIdx],
    child_i: usize,
}

impl<'a, I: Itemer> BunchWalk<'a, I> {
    /// Advance through the current run up to `limit`, returning a values
    /// piece if the run is present, `None` after swallowing gap content.
    fn take_values(&mut self, limit: u32) -> Option<Piece<'a, I>> {
        let runs = self.runs;
        let run = &runs[self.run_i];
        let len = run.len();
        let take = (len - self.run_off).min(limit - self.inner);
        let piece = match run {
            Run::Present(item) => Some(Piece::Values {
                inner: self.inner,
                item,
                start: self.run_off,
                end: self.run_off + take,
            }),
            Run::Gap(_) => None,
        };
        self.inner += take;
        self.run_off += take;
        if self.run_off == len {
            self.run_i += 1;
            self.run_off = 0;
        }
        return piece;
    }
}

impl<'a, I: Itemer> Iterator for BunchWalk<'a, I> {
    type Item = Piece<'a, I>;

    fn next(&mut self) -> Option<Piece<'a, I>> {
        loop {
            if self.child_i < self.children.len() {
                let child = self.children[self.child_i];
                let boundary = self.order.node(child).next_inner();
                // A child hanging at boundary k sits in the gap between
                // inner indices k - 1 and k; children past the final run
                // are emitted after the tail.
                if boundary <= self.inner || self.run_i >= self.runs.len() {
                    self.child_i += 1;
                    if self.list.total_of(&self.order.node(child).id) > 0 {
                        return Some(Piece::Child(child));
                    }
                    continue;
                }
                if let Some(piece) = self.take_values(boundary) {
                    return Some(piece);
                }
                continue;
            }
            if self.run_i >= self.runs.len() {
                return None;
            }
            if let Some(piece) = self.take_values(u32::MAX) {
                return Some(piece);
            }
        }
    }
}

/// Depth-first traversal of every present value, on an explicit stack so
/// deep trees cannot overflow the call stack. Holding this iterator
/// borrows both the view and the order, so neither can change while it is
/// alive.
pub(crate) struct Entries<'a, I> {
    list: &'a ItemList<I>,
    order: &'a Order,
    stack: Vec<BunchWalk<'a, I>>,
    current: Option<CurrentValues<'a, I>>,
}

struct CurrentValues<'a, I> {
    bunch_id: &'a str,
    inner: u32,
    item: &'a I,
    start: u32,
    end: u32,
    emitted: u32,
}

impl<'a, I: Itemer> Iterator for Entries<'a, I> {
    /// `(bunch_id, inner_index, item, offset_in_item)`
    type Item = (&'a str, u32, &'a I, u32);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(cur) = &mut self.current {
                if cur.emitted < cur.end - cur.start {
                    let k = cur.emitted;
                    cur.emitted += 1;
                    return Some((cur.bunch_id, cur.inner + k, cur.item, cur.start + k));
                }
                self.current = None;
            }

            let (bunch_id, piece) = match self.stack.last_mut() {
                None => return None,
                Some(top) => (top.bunch_id, top.next()),
            };
            match piece {
                Some(Piece::Values { inner, item, start, end }) => {
                    self.current = Some(CurrentValues {
                        bunch_id,
                        inner,
                        item,
                        start,
                        end,
                        emitted: 0,
                    });
                }
                Some(Piece::Child(child)) => {
                    self.stack.push(self.list.walk(self.order, child));
                }
                None => {
                    self.stack.pop();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::Order;

    fn test_order() -> Order {
        let mut n = 0u32;
        return Order::with_id_generator(move || {
            let id = format!("b{:02}", n);
            n += 1;
            return id;
        });
    }

    fn runs_of(list: &ItemList<Vec<char>>, bunch: &str) -> Vec<Run<Vec<char>>> {
        return list
            .bunches
            .get(bunch)
            .map(|b| b.runs.clone())
            .unwrap_or_default();
    }

    /// The run invariants: strict alternation, no zero runs, no trailing
    /// gap, and totals consistent with the tree.
    fn check_invariants(list: &ItemList<Vec<char>>, order: &Order) {
        for (id, bunch) in &list.bunches {
            let mut last_was_gap = None;
            for run in &bunch.runs {
                assert!(run.len() > 0, "zero run in {}", id);
                let is_gap = matches!(run, Run::Gap(_));
                assert_ne!(Some(is_gap), last_was_gap, "no alternation in {}", id);
                last_was_gap = Some(is_gap);
            }
            assert!(
                !matches!(bunch.runs.last(), Some(Run::Gap(_))),
                "trailing gap in {}",
                id
            );
            let own = bunch.present_count();
            let child_sum: u64 = order
                .get_node(id)
                .expect("tracked bunch is installed")
                .children()
                .map(|c| list.total_of(c.bunch_id()))
                .sum();
            assert_eq!(bunch.total, own + child_sum, "total of {}", id);
        }
    }

    #[test]
    fn replace_range_splits_and_merges() {
        let mut bunch: BunchRuns<Vec<char>> = BunchRuns::default();
        assert_eq!(bunch.replace_range(0, 3, Some(vec!['a', 'b', 'c'])), 3);
        assert_eq!(bunch.runs, vec![Run::Present(vec!['a', 'b', 'c'])]);

        // Punch a hole in the middle.
        assert_eq!(bunch.replace_range(1, 1, None), -1);
        assert_eq!(
            bunch.runs,
            vec![
                Run::Present(vec!['a']),
                Run::Gap(1),
                Run::Present(vec!['c']),
            ]
        );

        // Refill it: neighbors merge back into one run.
        assert_eq!(bunch.replace_range(1, 1, Some(vec!['B'])), 1);
        assert_eq!(bunch.runs, vec![Run::Present(vec!['a', 'B', 'c'])]);

        // Clearing the tail trims the trailing gap entirely.
        assert_eq!(bunch.replace_range(2, 1, None), -1);
        assert_eq!(bunch.runs, vec![Run::Present(vec!['a', 'B'])]);

        // A write far past the tail pads with a gap.
        assert_eq!(bunch.replace_range(5, 1, Some(vec!['z'])), 1);
        assert_eq!(
            bunch.runs,
            vec![
                Run::Present(vec!['a', 'B']),
                Run::Gap(3),
                Run::Present(vec!['z']),
            ]
        );
    }

    #[test]
    fn leading_gap_is_representable() {
        let mut bunch: BunchRuns<Vec<char>> = BunchRuns::default();
        bunch.replace_range(2, 1, Some(vec!['x']));
        assert_eq!(bunch.runs, vec![Run::Gap(2), Run::Present(vec!['x'])]);
        assert_eq!(bunch.present_before(2), 0);
        assert_eq!(bunch.present_before(3), 1);
    }

    #[test]
    fn set_get_delete_round_trip() {
        let mut order = test_order();
        let mut list: ItemList<Vec<char>> = ItemList::new();
        let (pos, _) = order
            .create_positions(&Position::min(), &Position::max(), 3)
            .unwrap();

        list.set(&order, &pos, vec!['x', 'y', 'z']).unwrap();
        assert_eq!(list.len(), 3);
        let second = Position::new(pos.bunch_id.clone(), 1);
        assert!(list.has(&second));
        let (item, offset) = list.get(&second).unwrap();
        assert_eq!(item[offset as usize], 'y');

        list.delete(&order, &second, 1).unwrap();
        assert_eq!(list.len(), 2);
        assert!(!list.has(&second));
        check_invariants(&list, &order);

        // Deleting everything prunes the bunch entirely.
        list.delete(&order, &pos, 3).unwrap();
        assert_eq!(list.len(), 0);
        assert!(runs_of(&list, &pos.bunch_id).is_empty());
        assert!(list.bunches.is_empty());
    }

    #[test]
    fn sentinels_are_not_slots() {
        let order = test_order();
        let mut list: ItemList<Vec<char>> = ItemList::new();
        assert!(matches!(
            list.set(&order, &Position::min(), vec!['x']),
            Err(Error::InvalidPosition { .. })
        ));
        assert!(matches!(
            list.delete(&order, &Position::max(), 1),
            Err(Error::InvalidPosition { .. })
        ));
    }

    #[test]
    fn totals_propagate_to_ancestors() {
        let mut order = test_order();
        let mut list: ItemList<Vec<char>> = ItemList::new();

        let (outer, _) = order
            .create_position(&Position::min(), &Position::max())
            .unwrap();
        // A bunch nested under `outer`.
        let (inner_pos, _) = order.create_position(&Position::min(), &outer).unwrap();

        list.set(&order, &outer, vec!['o']).unwrap();
        list.set(&order, &inner_pos, vec!['i']).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list.total_of(&outer.bunch_id), 2);
        assert_eq!(list.total_of(&inner_pos.bunch_id), 1);
        check_invariants(&list, &order);

        // The nested bunch sorts before its parent's position 0.
        assert_eq!(list.index_of(&order, &inner_pos, Bias::None).unwrap(), 0);
        assert_eq!(list.index_of(&order, &outer, Bias::None).unwrap(), 1);
        assert_eq!(list.position_at(&order, 0).unwrap(), inner_pos);
        assert_eq!(list.position_at(&order, 1).unwrap(), outer);

        // Deleting the nested value updates the ancestor total and prunes
        // the now-empty tracked bunch.
        list.delete(&order, &inner_pos, 1).unwrap();
        assert_eq!(list.total_of(&outer.bunch_id), 1);
        assert_eq!(list.total_of(&inner_pos.bunch_id), 0);
        check_invariants(&list, &order);
    }

    #[test]
    fn index_of_bias_conventions() {
        let mut order = test_order();
        let mut list: ItemList<Vec<char>> = ItemList::new();
        let (start, _) = order
            .create_positions(&Position::min(), &Position::max(), 3)
            .unwrap();
        list.set(&order, &start, vec!['a', 'b', 'c']).unwrap();

        let middle = Position::new(start.bunch_id.clone(), 1);
        list.delete(&order, &middle, 1).unwrap();

        assert_eq!(list.index_of(&order, &middle, Bias::None).unwrap(), -1);
        assert_eq!(list.index_of(&order, &middle, Bias::Left).unwrap(), 0);
        assert_eq!(list.index_of(&order, &middle, Bias::Right).unwrap(), 1);

        // Before everything: Left lands at -1; after everything: Right
        // lands at the length.
        assert_eq!(
            list.index_of(&order, &Position::min(), Bias::Left).unwrap(),
            -1
        );
        assert_eq!(
            list.index_of(&order, &Position::max(), Bias::Right).unwrap(),
            2
        );
    }

    #[test]
    fn entries_walk_in_list_order() {
        let mut order = test_order();
        let mut list: ItemList<Vec<char>> = ItemList::new();

        let (p0, _) = order
            .create_position(&Position::min(), &Position::max())
            .unwrap();
        list.set(&order, &p0, vec!['b']).unwrap();
        let (before, _) = order.create_position(&Position::min(), &p0).unwrap();
        list.set(&order, &before, vec!['a']).unwrap();
        let (after, _) = order.create_position(&p0, &Position::max()).unwrap();
        list.set(&order, &after, vec!['c']).unwrap();

        let values: Vec<char> = list
            .entries(&order)
            .map(|(_, _, item, off)| item[off as usize])
            .collect();
        assert_eq!(values, vec!['a', 'b', 'c']);

        // And the walk agrees with position_at.
        for (i, (bunch, inner, _, _)) in list.entries(&order).enumerate() {
            let pos = Position::new(bunch, inner);
            assert_eq!(list.position_at(&order, i as u64).unwrap(), pos);
            assert_eq!(list.index_of(&order, &pos, Bias::None).unwrap(), i as i64);
        }
    }

    #[test]
    fn out_of_bounds_index() {
        let order = test_order();
        let list: ItemList<Vec<char>> = ItemList::new();
        assert!(matches!(
            list.position_at(&order, 0),
            Err(Error::IndexOutOfBounds { .. })
        ));
    }

    #[test]
    fn load_rebuilds_totals() {
        let mut order = test_order();
        let mut list: ItemList<Vec<char>> = ItemList::new();
        let (outer, _) = order
            .create_position(&Position::min(), &Position::max())
            .unwrap();
        let (nested, _) = order.create_position(&Position::min(), &outer).unwrap();
        list.set(&order, &outer, vec!['o']).unwrap();
        list.set(&order, &nested, vec!['n']).unwrap();

        let saved: Vec<(String, Vec<Run<Vec<char>>>)> = list
            .saved_runs()
            .map(|(id, runs)| (id.to_string(), runs.to_vec()))
            .collect();

        let mut loaded: ItemList<Vec<char>> = ItemList::new();
        loaded.load_from(&order, saved).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.total_of(&outer.bunch_id), 2);
        check_invariants(&loaded, &order);

        // Unknown bunches are rejected.
        let mut fresh: ItemList<Vec<char>> = ItemList::new();
        let bad = vec![("ghost".to_string(), vec![Run::Present(vec!['x'])])];
        assert!(matches!(
            fresh.load_from(&order, bad),
            Err(Error::UnknownBunch { .. })
        ));
    }
}
