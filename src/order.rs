// model = "claude-opus-4-5"
// created = 2026-08-01
// modified = 2026-08-02
// driver = "Isaac Clayton"

//! The position tree and its total order.
//!
//! An [`Order`] is a replica's authoritative, grow-only tree of *bunches*.
//! Each bunch owns an unbounded space of inner indices, and the traversal
//! order of the tree induces a deterministic total order over every
//! position any replica ever creates. Key design decisions:
//!
//! 1. **Arena storage**: bunches live in a flat vector addressed by index
//!    handles, with an id map alongside. Parent links and child lists are
//!    handles, so the cyclic parent/child structure needs no reference
//!    counting and no unsafe code.
//!
//! 2. **Dual origins without tombstones**: position creation is a variant
//!    of the Fugue list CRDT in which the `next` position itself serves as
//!    the right origin, so no deleted-item bookkeeping is needed. Forward
//!    runs of insertions by one replica extend a single bunch; concurrent
//!    runs at the same spot never interleave.
//!
//! 3. **Offsets carry sidedness**: a bunch's `offset` is
//!    `2 * parent_inner_index + side`. The low bit says whether the bunch
//!    hangs left or right of its parent position, which is exactly the
//!    information `compare` needs while climbing.
//!
//! 4. **Lex agreement**: sibling order is `(offset, id)`, matching the
//!    byte order of the lexicographic encoding (see [`crate::lex`]), so
//!    `compare` and string comparison of encoded positions always agree.
//!
//! # Example
//!
//! ```
//! use between::{Order, Position};
//! use std::cmp::Ordering;
//!
//! let mut order = Order::new();
//! let (a, meta) = order
//!     .create_position(&Position::min(), &Position::max())
//!     .unwrap();
//! assert!(meta.is_some()); // a fresh bunch to broadcast
//!
//! let (b, _) = order.create_position(&a, &Position::max()).unwrap();
//! assert_eq!(order.compare(&a, &b).unwrap(), Ordering::Less);
//! ```

use std::cmp::Ordering;
use std::fmt;

use rustc_hash::FxHashMap;

use crate::encoding;
use crate::error::Error;
use crate::lex;
use crate::position::random_id;
use crate::position::validate_bunch_id;
use crate::position::BunchMeta;
use crate::position::Position;
use crate::position::ROOT;

/// Serialized shape of an order: every non-root bunch meta, parents before
/// children.
pub type OrderSave = Vec<BunchMeta>;

// =============================================================================
// Nodes
// =============================================================================

/// Handle into the bunch arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct NodeIdx(u32);

/// A bunch: one node of the position tree.
#[derive(Debug)]
pub(crate) struct BunchNode {
    pub(crate) id: String,
    /// `None` only for the root.
    pub(crate) parent: Option<NodeIdx>,
    /// `2 * parent_inner_index + side`; root children store 1.
    pub(crate) offset: u32,
    pub(crate) depth: u32,
    /// Children in sibling order: ascending `(offset, id)`.
    pub(crate) children: Vec<NodeIdx>,
    /// Next inner index to allocate; `Some` only for locally minted bunches.
    pub(crate) created_counter: Option<u32>,
    /// Locally minted children by offset. Lives on every node (the parent
    /// of a minted bunch may itself be remote, the root included) so the
    /// reuse rule can find them.
    pub(crate) created_children: FxHashMap<u32, NodeIdx>,
}

impl BunchNode {
    /// The smallest parent inner index strictly greater than every
    /// position in this bunch's subtree.
    pub(crate) fn next_inner(&self) -> u32 {
        return (self.offset + 1) >> 1;
    }
}

/// A subtree hanging at boundary `k` lies strictly between the parent's
/// inner indices `k - 1` and `k`.
fn boundary_cmp(boundary: u32, inner: u32) -> Ordering {
    if boundary > inner {
        return Ordering::Greater;
    }
    return Ordering::Less;
}

/// Sibling order: offset first, then id. Ids contain no characters at or
/// below `','`, so plain string order agrees with the encoded form, where
/// `','` terminates an id field.
fn sibling_cmp(a: &BunchNode, b: &BunchNode) -> Ordering {
    return a.offset.cmp(&b.offset).then_with(|| a.id.cmp(&b.id));
}

// =============================================================================
// Public node view
// =============================================================================

/// A borrowed view of one bunch in an [`Order`].
#[derive(Clone, Copy)]
pub struct BunchRef<'a> {
    order: &'a Order,
    idx: NodeIdx,
}

impl<'a> BunchRef<'a> {
    pub fn bunch_id(&self) -> &'a str {
        return &self.order.node(self.idx).id;
    }

    pub fn is_root(&self) -> bool {
        return self.order.node(self.idx).parent.is_none();
    }

    pub fn offset(&self) -> u32 {
        return self.order.node(self.idx).offset;
    }

    pub fn depth(&self) -> u32 {
        return self.order.node(self.idx).depth;
    }

    pub fn parent(&self) -> Option<BunchRef<'a>> {
        let parent = self.order.node(self.idx).parent?;
        return Some(BunchRef { order: self.order, idx: parent });
    }

    /// Children in sibling order.
    pub fn children(&self) -> impl Iterator<Item = BunchRef<'a>> + 'a {
        let order = self.order;
        return order
            .node(self.idx)
            .children
            .iter()
            .map(move |&idx| BunchRef { order, idx });
    }

    /// The meta this bunch was announced with; `None` for the root.
    pub fn meta(&self) -> Option<BunchMeta> {
        let node = self.order.node(self.idx);
        let parent = node.parent?;
        return Some(BunchMeta {
            bunch_id: node.id.clone(),
            parent_id: self.order.node(parent).id.clone(),
            offset: node.offset,
        });
    }
}

impl fmt::Debug for BunchRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return write!(f, "BunchRef({} @ depth {})", self.bunch_id(), self.depth());
    }
}

// =============================================================================
// Order
// =============================================================================

/// A replica's bunch tree: the total order over positions, the position
/// factory, and the metadata receiver.
///
/// Bunches are installed exactly once and never removed. Multiple presence
/// views ([`List`](crate::list::List), [`Outline`](crate::outline::Outline),
/// [`Text`](crate::text::Text)) may read one `Order`; the borrow checker
/// serializes mutation against those reads.
pub struct Order {
    nodes: Vec<BunchNode>,
    by_id: FxHashMap<String, NodeIdx>,
    new_bunch_id: Box<dyn FnMut() -> String>,
    on_create_node: Option<Box<dyn FnMut(&BunchMeta)>>,
}

impl fmt::Debug for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return f
            .debug_struct("Order")
            .field("bunches", &self.nodes.len())
            .finish_non_exhaustive();
    }
}

impl Default for Order {
    fn default() -> Self {
        return Self::new();
    }
}

const ROOT_IDX: NodeIdx = NodeIdx(0);

impl Order {
    /// Create an order that mints random bunch ids.
    pub fn new() -> Order {
        return Order::with_id_generator(random_id);
    }

    /// Create an order with a custom bunch id generator. Generated ids
    /// must be unique across the federation; replicas typically embed a
    /// replica id plus a counter.
    pub fn with_id_generator(gen: impl FnMut() -> String + 'static) -> Order {
        let root = BunchNode {
            id: ROOT.to_string(),
            parent: None,
            offset: 0,
            depth: 0,
            children: Vec::new(),
            created_counter: None,
            created_children: FxHashMap::default(),
        };
        let mut by_id = FxHashMap::default();
        by_id.insert(ROOT.to_string(), ROOT_IDX);
        return Order {
            nodes: vec![root],
            by_id,
            new_bunch_id: Box::new(gen),
            on_create_node: None,
        };
    }

    /// Register a callback invoked with every freshly minted bunch meta,
    /// in creation order. Useful when inserts happen through a view and
    /// the metas still need broadcasting.
    pub fn set_on_create_node(&mut self, f: impl FnMut(&BunchMeta) + 'static) {
        self.on_create_node = Some(Box::new(f));
    }

    // -------------------------------------------------------------------------
    // Lookup
    // -------------------------------------------------------------------------

    pub(crate) fn node(&self, idx: NodeIdx) -> &BunchNode {
        return &self.nodes[idx.0 as usize];
    }

    fn node_mut(&mut self, idx: NodeIdx) -> &mut BunchNode {
        return &mut self.nodes[idx.0 as usize];
    }

    pub(crate) fn root(&self) -> NodeIdx {
        return ROOT_IDX;
    }

    pub(crate) fn index(&self, bunch_id: &str) -> Option<NodeIdx> {
        return self.by_id.get(bunch_id).copied();
    }

    /// Look up a bunch by id.
    pub fn get_node(&self, bunch_id: &str) -> Option<BunchRef<'_>> {
        let idx = self.index(bunch_id)?;
        return Some(BunchRef { order: self, idx });
    }

    /// Validate a position and return its bunch.
    pub fn get_node_for(&self, pos: &Position) -> Result<BunchRef<'_>, Error> {
        let idx = self.node_for(pos)?;
        return Ok(BunchRef { order: self, idx });
    }

    /// Validated lookup used by everything that walks the tree: the bunch
    /// must be installed, and the root only carries the two sentinels.
    pub(crate) fn node_for(&self, pos: &Position) -> Result<NodeIdx, Error> {
        let idx = self
            .index(&pos.bunch_id)
            .ok_or_else(|| Error::UnknownBunch {
                bunch_id: pos.bunch_id.clone(),
            })?;
        if self.node(idx).parent.is_none() && pos.inner_index > 1 {
            return Err(Error::InvalidPosition {
                bunch_id: pos.bunch_id.clone(),
                inner_index: pos.inner_index,
                reason: "the root bunch only carries inner indices 0 and 1",
            });
        }
        return Ok(idx);
    }

    // -------------------------------------------------------------------------
    // Comparison
    // -------------------------------------------------------------------------

    /// Compare two positions in the replicated total order.
    ///
    /// Deterministic and replica-independent: any two replicas that have
    /// installed the same metas return the same answer.
    pub fn compare(&self, a: &Position, b: &Position) -> Result<Ordering, Error> {
        let a_idx = self.node_for(a)?;
        let b_idx = self.node_for(b)?;
        if a_idx == b_idx {
            return Ok(a.inner_index.cmp(&b.inner_index));
        }

        // Walk the deeper chain up to the other's depth. If it passes
        // through the other position's bunch, the subtree boundary index
        // settles the comparison.
        let mut a_anc = a_idx;
        let mut b_anc = b_idx;
        while self.node(a_anc).depth > self.node(b_anc).depth {
            let node = self.node(a_anc);
            let parent = node.parent.expect("deeper than the root");
            if parent == b_idx {
                return Ok(boundary_cmp(node.next_inner(), b.inner_index));
            }
            a_anc = parent;
        }
        while self.node(b_anc).depth > self.node(a_anc).depth {
            let node = self.node(b_anc);
            let parent = node.parent.expect("deeper than the root");
            if parent == a_idx {
                return Ok(boundary_cmp(node.next_inner(), a.inner_index).reverse());
            }
            b_anc = parent;
        }

        // Equal depth, different bunches: climb in lockstep until the
        // chains become siblings.
        loop {
            let an = self.node(a_anc);
            let bn = self.node(b_anc);
            if an.parent == bn.parent {
                return Ok(sibling_cmp(an, bn));
            }
            a_anc = an.parent.expect("chains meet at the root at the latest");
            b_anc = bn.parent.expect("chains meet at the root at the latest");
        }
    }

    /// Does `a` descend from `b` through the rightward chain: is `a`
    /// inside the subtree hanging at or to the right of `b`'s inner index?
    fn is_descendant(&self, a_idx: NodeIdx, a_inner: u32, b_idx: NodeIdx, b_inner: u32) -> bool {
        let mut anc = a_idx;
        let mut inner = a_inner;
        while self.node(anc).depth > self.node(b_idx).depth {
            let node = self.node(anc);
            inner = node.offset >> 1;
            anc = node.parent.expect("deeper than the root");
        }
        return anc == b_idx && inner >= b_inner;
    }

    // -------------------------------------------------------------------------
    // Creation
    // -------------------------------------------------------------------------

    /// Create one position strictly between `prev` and `next`.
    ///
    /// Returns the position and, when a fresh bunch had to be minted, the
    /// meta to broadcast to other replicas.
    pub fn create_position(
        &mut self,
        prev: &Position,
        next: &Position,
    ) -> Result<(Position, Option<BunchMeta>), Error> {
        return self.create_positions(prev, next, 1);
    }

    /// Create a run of `count` adjacent positions strictly between `prev`
    /// and `next`. The run shares one bunch: the returned position starts
    /// it, and the rest follow at consecutive inner indices (see
    /// [`expand_positions`](crate::position::expand_positions)).
    ///
    /// No state changes on error.
    pub fn create_positions(
        &mut self,
        prev: &Position,
        next: &Position,
        count: u32,
    ) -> Result<(Position, Option<BunchMeta>), Error> {
        if self.compare(prev, next)? != Ordering::Less || count == 0 {
            return Err(Error::Inversion {
                prev: prev.to_string(),
                next: next.to_string(),
            });
        }
        let prev_idx = self.node_for(prev)?;
        let next_idx = self.node_for(next)?;

        let (parent_idx, raw_offset) = if self.is_descendant(
            next_idx,
            next.inner_index,
            prev_idx,
            prev.inner_index,
        ) {
            // prev is an ancestor of next: the run becomes a left
            // descendant of next, landing just inside next's lower edge.
            (next_idx, 2 * next.inner_index)
        } else {
            // next lies outside prev's subtree, so everything hanging to
            // the right of prev stays below next. Extend prev's bunch if
            // we minted it; otherwise hang a right child off prev.
            if self.node(prev_idx).created_counter.is_some() {
                let start = self.append_to(prev_idx, count);
                debug_assert!(self.run_in_bounds(prev, &start, count, next));
                return Ok((start, None));
            }
            (prev_idx, 2 * prev.inner_index + 1)
        };

        // Root children all store offset 1; any computed offset lands
        // between the two sentinels anyway.
        let offset = if parent_idx == ROOT_IDX { 1 } else { raw_offset };

        // Reuse rule: a bunch we already minted at this (parent, offset)
        // absorbs the run instead of gaining a sibling, so repeated
        // type-delete-retype at one spot stays clustered in time order.
        if let Some(&child) = self.node(parent_idx).created_children.get(&offset) {
            let start = self.append_to(child, count);
            debug_assert!(self.run_in_bounds(prev, &start, count, next));
            return Ok((start, None));
        }

        // Mint a fresh bunch.
        let id = (self.new_bunch_id)();
        validate_bunch_id(&id)?;
        if self.by_id.contains_key(&id) {
            return Err(Error::IdCollision { id });
        }

        let depth = self.node(parent_idx).depth + 1;
        let idx = NodeIdx(self.nodes.len() as u32);
        self.nodes.push(BunchNode {
            id: id.clone(),
            parent: Some(parent_idx),
            offset,
            depth,
            children: Vec::new(),
            created_counter: Some(count),
            created_children: FxHashMap::default(),
        });
        self.by_id.insert(id.clone(), idx);
        self.insert_child_sorted(parent_idx, idx);
        self.node_mut(parent_idx).created_children.insert(offset, idx);

        let meta = BunchMeta {
            bunch_id: id.clone(),
            parent_id: self.node(parent_idx).id.clone(),
            offset,
        };
        if let Some(on_create) = self.on_create_node.as_mut() {
            on_create(&meta);
        }

        let start = Position::new(id, 0);
        debug_assert!(self.run_in_bounds(prev, &start, count, next));
        return Ok((start, Some(meta)));
    }

    /// Allocate `count` inner indices from a locally minted bunch.
    fn append_to(&mut self, idx: NodeIdx, count: u32) -> Position {
        let node = self.node_mut(idx);
        let counter = node.created_counter.expect("append target was minted locally");
        node.created_counter = Some(counter + count);
        return Position::new(node.id.clone(), counter);
    }

    fn run_in_bounds(&self, prev: &Position, start: &Position, count: u32, next: &Position) -> bool {
        let last = Position::new(start.bunch_id.clone(), start.inner_index + count - 1);
        return matches!(self.compare(prev, start), Ok(Ordering::Less))
            && matches!(self.compare(&last, next), Ok(Ordering::Less));
    }

    // -------------------------------------------------------------------------
    // Receiving metas
    // -------------------------------------------------------------------------

    /// Validate and install a batch of bunch metas.
    ///
    /// The batch may arrive in any order; parents are installed before
    /// children. Exact duplicates of installed bunches are skipped. The
    /// batch applies atomically: on any error, nothing is installed.
    pub fn receive(&mut self, metas: impl IntoIterator<Item = BunchMeta>) -> Result<(), Error> {
        // Pass 1: validate each meta alone; keep the genuinely new ones.
        let mut pending: FxHashMap<String, BunchMeta> = FxHashMap::default();
        let mut arrival: Vec<String> = Vec::new();
        for meta in metas {
            if meta.bunch_id == ROOT {
                return Err(Error::InvalidRoot);
            }
            validate_bunch_id(&meta.bunch_id)?;
            if let Some(&idx) = self.by_id.get(&meta.bunch_id) {
                let node = self.node(idx);
                let parent = node.parent.expect("only the root lacks a parent");
                if self.node(parent).id == meta.parent_id && node.offset == meta.offset {
                    continue;
                }
                return Err(Error::Conflict {
                    bunch_id: meta.bunch_id,
                });
            }
            match pending.get(&meta.bunch_id) {
                Some(seen) if *seen == meta => {}
                Some(_) => {
                    return Err(Error::Conflict {
                        bunch_id: meta.bunch_id,
                    })
                }
                None => {
                    arrival.push(meta.bunch_id.clone());
                    pending.insert(meta.bunch_id.clone(), meta);
                }
            }
        }

        // Pass 2: order parents before children. Each new bunch names one
        // parent, so this is a chain walk with an on-stack mark for cycle
        // detection. Nothing installs until the whole batch checks out.
        const VISITING: u8 = 1;
        const DONE: u8 = 2;
        let mut marks: FxHashMap<String, u8> = FxHashMap::default();
        let mut topo: Vec<String> = Vec::with_capacity(arrival.len());
        for start in &arrival {
            if marks.get(start) == Some(&DONE) {
                continue;
            }
            let mut chain: Vec<String> = Vec::new();
            let mut cur: String = start.clone();
            loop {
                match marks.get(&cur) {
                    Some(&DONE) => break,
                    Some(&VISITING) => return Err(Error::Cycle { bunch_id: cur }),
                    _ => {}
                }
                marks.insert(cur.clone(), VISITING);
                chain.push(cur.clone());
                let parent = &pending[&cur].parent_id;
                if self.by_id.contains_key(parent) {
                    break;
                }
                if !pending.contains_key(parent) {
                    return Err(Error::UnknownParent {
                        bunch_id: cur.clone(),
                        parent_id: parent.clone(),
                    });
                }
                cur = parent.clone();
            }
            for id in chain.into_iter().rev() {
                *marks.get_mut(&id).expect("marked while walking") = DONE;
                topo.push(id);
            }
        }

        // Pass 3: install, parents first.
        for id in topo {
            let meta = pending.remove(&id).expect("topo lists each pending meta once");
            self.install(meta);
        }
        return Ok(());
    }

    fn install(&mut self, meta: BunchMeta) {
        let parent_idx = *self
            .by_id
            .get(&meta.parent_id)
            .expect("parent installed before child");
        let depth = self.node(parent_idx).depth + 1;
        let idx = NodeIdx(self.nodes.len() as u32);
        self.nodes.push(BunchNode {
            id: meta.bunch_id.clone(),
            parent: Some(parent_idx),
            offset: meta.offset,
            depth,
            children: Vec::new(),
            created_counter: None,
            created_children: FxHashMap::default(),
        });
        self.by_id.insert(meta.bunch_id, idx);
        self.insert_child_sorted(parent_idx, idx);
    }

    fn insert_child_sorted(&mut self, parent: NodeIdx, child: NodeIdx) {
        let at = {
            let nodes = &self.nodes;
            let new = &nodes[child.0 as usize];
            let key = (new.offset, new.id.as_str());
            nodes[parent.0 as usize].children.partition_point(|&c| {
                let n = &nodes[c.0 as usize];
                (n.offset, n.id.as_str()) < key
            })
        };
        self.node_mut(parent).children.insert(at, child);
    }

    // -------------------------------------------------------------------------
    // Lexicographic strings
    // -------------------------------------------------------------------------

    /// Render a position as its lexicographic string.
    pub fn lex(&self, pos: &Position) -> Result<String, Error> {
        let idx = self.node_for(pos)?;
        if idx == ROOT_IDX {
            let s = if pos.inner_index == 0 {
                lex::MIN_LEX_POSITION
            } else {
                lex::MAX_LEX_POSITION
            };
            return Ok(s.to_string());
        }
        return Ok(lex::combine_pos(&self.node_prefix(idx), pos.inner_index));
    }

    /// Decode a lexicographic string, installing its embedded tree path if
    /// any of it is unknown.
    pub fn unlex(&mut self, s: &str) -> Result<Position, Error> {
        if s == lex::MIN_LEX_POSITION {
            return Ok(Position::min());
        }
        if s == lex::MAX_LEX_POSITION {
            return Ok(Position::max());
        }
        let (prefix, inner) = lex::split_pos(s)?;
        let metas = lex::split_node_prefix(prefix)?;
        let bunch_id = metas.last().expect("split prefix is non-empty").bunch_id.clone();
        self.receive(metas)?;
        return Ok(Position::new(bunch_id, inner));
    }

    /// The comma-joined path encoding from a root child down to `idx`.
    fn node_prefix(&self, idx: NodeIdx) -> String {
        let mut segments: Vec<String> = Vec::new();
        let mut cur = idx;
        loop {
            let node = self.node(cur);
            let parent = node.parent.expect("prefixes name non-root bunches");
            if parent == ROOT_IDX {
                segments.push(node.id.clone());
                break;
            }
            segments.push(format!(
                "{}.{}",
                encoding::encode_offset(node.offset as u64),
                node.id
            ));
            cur = parent;
        }
        segments.reverse();
        return segments.join(",");
    }

    // -------------------------------------------------------------------------
    // Iteration and durability
    // -------------------------------------------------------------------------

    /// All bunches, root included, in pre-order (parents before children,
    /// siblings in sibling order).
    pub fn nodes(&self) -> Nodes<'_> {
        return Nodes {
            order: self,
            stack: vec![ROOT_IDX],
        };
    }

    /// Every non-root bunch meta, parents before children. The shape a
    /// peer needs to reconstruct this order.
    pub fn node_metas(&self) -> impl Iterator<Item = BunchMeta> + '_ {
        return self
            .nodes()
            .filter(|n| !n.is_root())
            .map(|n| n.meta().expect("non-root bunches carry a meta"));
    }

    /// Serialize: every non-root meta, parents before children.
    pub fn save(&self) -> OrderSave {
        return self.node_metas().collect();
    }

    /// Install a previously saved order. Equivalent to `receive`.
    pub fn load(&mut self, save: OrderSave) -> Result<(), Error> {
        return self.receive(save);
    }
}

/// Pre-order traversal over the bunches of an [`Order`]. Uses an explicit
/// stack so arbitrarily deep trees cannot overflow the call stack.
pub struct Nodes<'a> {
    order: &'a Order,
    stack: Vec<NodeIdx>,
}

impl<'a> Iterator for Nodes<'a> {
    type Item = BunchRef<'a>;

    fn next(&mut self) -> Option<BunchRef<'a>> {
        let idx = self.stack.pop()?;
        let node = self.order.node(idx);
        self.stack.extend(node.children.iter().rev().copied());
        return Some(BunchRef { order: self.order, idx });
    }
}
