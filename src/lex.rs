// model = "claude-opus-4-5"
// created = 2026-08-01
// modified = 2026-08-02
// driver = "Isaac Clayton"

//! Lexicographic position strings.
//!
//! A lex position is a self-describing rendering of a position: it carries
//! the whole tree path from a root child down to the position's bunch, so
//! a receiver can install the path without any side channel. Its defining
//! property is that byte order on the strings equals the tree order on the
//! decoded positions.
//!
//! Grammar (segments joined by `','`):
//!
//! - *node prefix*: `root_child_id` followed by zero or more
//!   `encode_offset(offset) "." bunch_id` segments, one per tree level.
//! - *lex position*: node prefix, `','`, `encode_value_index(inner_index)`.
//!
//! `','` sorts below every character allowed in ids and codes, so a bunch
//! whose id prefixes a sibling's id sorts first, exactly as the sibling
//! order requires. The prefix-free codes (see [`crate::encoding`]) make a
//! bunch's own inner-index codes sort between the offset codes of its left
//! and right children.
//!
//! The functions here are pure string manipulation. Use
//! [`Order::lex`](crate::order::Order::lex) and
//! [`Order::unlex`](crate::order::Order::unlex) to convert against a tree.

use crate::encoding;
use crate::error::Error;
use crate::position::validate_bunch_id;
use crate::position::BunchMeta;
use crate::position::ROOT;

/// The lex rendering of the minimum sentinel; sorts below every encoding.
pub const MIN_LEX_POSITION: &str = "";

/// The lex rendering of the maximum sentinel; `'~'` sorts above every
/// character a node prefix can start with.
pub const MAX_LEX_POSITION: &str = "~";

/// Append an inner index to a node prefix, producing a full lex position.
pub fn combine_pos(node_prefix: &str, inner_index: u32) -> String {
    return format!(
        "{},{}",
        node_prefix,
        encoding::encode_value_index(inner_index as u64)
    );
}

/// Split a lex position into its node prefix and inner index.
///
/// The sentinels `""` and `"~"` have no prefix and are rejected here;
/// `Order::unlex` handles them before calling this.
pub fn split_pos(lex: &str) -> Result<(&str, u32), Error> {
    let comma = lex.rfind(',').ok_or_else(|| Error::MalformedLex {
        input: lex.to_string(),
        reason: "no inner-index separator",
    })?;
    let (prefix, value) = (&lex[..comma], &lex[comma + 1..]);
    if prefix.is_empty() {
        return Err(Error::MalformedLex {
            input: lex.to_string(),
            reason: "empty node prefix",
        });
    }
    let inner = encoding::decode_value_index(value).ok_or_else(|| Error::MalformedLex {
        input: lex.to_string(),
        reason: "inner index is not a value code",
    })?;
    if inner > u32::MAX as u64 {
        return Err(Error::MalformedLex {
            input: lex.to_string(),
            reason: "inner index exceeds u32",
        });
    }
    return Ok((prefix, inner as u32));
}

/// Render the tree path `metas` (root child first) as a node prefix.
///
/// The path must be linked: the first meta's parent is the root, and each
/// subsequent meta's parent is its predecessor.
pub fn combine_node_prefix(metas: &[BunchMeta]) -> Result<String, Error> {
    let first = metas.first().ok_or_else(|| Error::MalformedLex {
        input: String::new(),
        reason: "empty path",
    })?;
    if first.parent_id != ROOT {
        return Err(Error::MalformedLex {
            input: first.bunch_id.clone(),
            reason: "path does not start at a root child",
        });
    }

    let mut out = String::new();
    let mut parent: &str = ROOT;
    for meta in metas {
        validate_bunch_id(&meta.bunch_id)?;
        if meta.parent_id != parent {
            return Err(Error::MalformedLex {
                input: meta.bunch_id.clone(),
                reason: "path segment does not link to its predecessor",
            });
        }
        if parent == ROOT {
            out.push_str(&meta.bunch_id);
        } else {
            out.push(',');
            out.push_str(&encoding::encode_offset(meta.offset as u64));
            out.push('.');
            out.push_str(&meta.bunch_id);
        }
        parent = &meta.bunch_id;
    }
    return Ok(out);
}

/// Parse a node prefix back into the tree path it describes, root child
/// first. The inverse of `combine_node_prefix`.
pub fn split_node_prefix(prefix: &str) -> Result<Vec<BunchMeta>, Error> {
    let mut metas: Vec<BunchMeta> = Vec::new();
    let mut parent = ROOT.to_string();

    for (i, segment) in prefix.split(',').enumerate() {
        let (offset, id) = if i == 0 {
            // Root children never write their offset; it is 1 by convention.
            (1u32, segment)
        } else {
            let (code, id) = segment.split_once('.').ok_or_else(|| Error::MalformedLex {
                input: prefix.to_string(),
                reason: "segment is missing its offset",
            })?;
            let offset = encoding::decode_offset(code).ok_or_else(|| Error::MalformedLex {
                input: prefix.to_string(),
                reason: "segment offset is not a code",
            })?;
            if offset > u32::MAX as u64 {
                return Err(Error::MalformedLex {
                    input: prefix.to_string(),
                    reason: "segment offset exceeds u32",
                });
            }
            (offset as u32, id)
        };

        if id == ROOT {
            return Err(Error::InvalidRoot);
        }
        validate_bunch_id(id)?;
        metas.push(BunchMeta {
            bunch_id: id.to_string(),
            parent_id: parent,
            offset,
        });
        parent = id.to_string();
    }
    return Ok(metas);
}

/// The bunch id a node prefix points at: the id of its last segment.
pub fn bunch_id_for(prefix: &str) -> Result<&str, Error> {
    let last = prefix.rsplit(',').next().expect("rsplit yields at least once");
    let id = match last.split_once('.') {
        Some((_, id)) => id,
        None => last,
    };
    validate_bunch_id(id)?;
    return Ok(id);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(id: &str, parent: &str, offset: u32) -> BunchMeta {
        return BunchMeta {
            bunch_id: id.to_string(),
            parent_id: parent.to_string(),
            offset,
        };
    }

    #[test]
    fn pos_round_trip() {
        let lex = combine_pos("abc", 0);
        assert_eq!(lex, "abc,1");
        let (prefix, inner) = split_pos(&lex).unwrap();
        assert_eq!(prefix, "abc");
        assert_eq!(inner, 0);
    }

    #[test]
    fn split_pos_rejects_sentinels_and_junk() {
        assert!(split_pos("").is_err());
        assert!(split_pos("~").is_err());
        assert!(split_pos("abc").is_err());
        assert!(split_pos(",1").is_err());
        // Even code in the value slot.
        assert!(split_pos("abc,0").is_err());
    }

    #[test]
    fn node_prefix_round_trip() {
        let path = vec![
            meta("abc", ROOT, 1),
            meta("def", "abc", 3),
            meta("ghi", "def", 0),
        ];
        let prefix = combine_node_prefix(&path).unwrap();
        assert_eq!(prefix, "abc,3.def,0.ghi");
        assert_eq!(split_node_prefix(&prefix).unwrap(), path);
        assert_eq!(bunch_id_for(&prefix).unwrap(), "ghi");
    }

    #[test]
    fn single_segment_prefix() {
        let path = vec![meta("abc", ROOT, 1)];
        let prefix = combine_node_prefix(&path).unwrap();
        assert_eq!(prefix, "abc");
        assert_eq!(split_node_prefix(&prefix).unwrap(), path);
        assert_eq!(bunch_id_for(&prefix).unwrap(), "abc");
    }

    #[test]
    fn combine_rejects_broken_links() {
        let path = vec![meta("abc", ROOT, 1), meta("def", "xyz", 3)];
        assert!(combine_node_prefix(&path).is_err());
        assert!(combine_node_prefix(&[meta("abc", "other", 1)]).is_err());
        assert!(combine_node_prefix(&[]).is_err());
    }

    #[test]
    fn split_rejects_root_redefinition() {
        assert_eq!(split_node_prefix("ROOT"), Err(Error::InvalidRoot));
    }

    #[test]
    fn deep_offsets_use_codes() {
        // Offset 20 lands in the two-digit length class.
        let path = vec![meta("abc", ROOT, 1), meta("def", "abc", 20)];
        let prefix = combine_node_prefix(&path).unwrap();
        assert_eq!(prefix, "abc,I2.def");
        assert_eq!(split_node_prefix(&prefix).unwrap(), path);
    }
}
