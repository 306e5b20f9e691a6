// model = "claude-opus-4-5"
// created = 2026-08-01
// modified = 2026-08-02
// driver = "Isaac Clayton"

//! Prefix-free, order-preserving number codes.
//!
//! The lexicographic position encoding needs numbers written so that:
//!
//! 1. String order matches numeric order.
//! 2. No code is a prefix of another, so a bunch's own inner-index code
//!    sorts correctly between the codes of its left and right subtrees.
//!
//! Both follow from enumerating codes by length in base `B = 36`, with
//! exactly `(B/2)^d` codewords of each length `d`:
//!
//! - Length-1 codes are the values `[0, B/2)`.
//! - Length-d codes start at the integer `B^d - B * (B/2)^(d-1)` and run
//!   for `(B/2)^d` values. Equivalently, the first length-(d+1) code is
//!   `(last length-d code + 1) * B`.
//!
//! Successive length classes occupy disjoint, ascending digit ranges at
//! the first position where they can collide: at that position a shorter
//! code always holds a digit below `B/2` while a longer one holds a digit
//! at or above `B/2`. Hence no code prefixes another, and enumeration
//! order equals lexicographic order.
//!
//! Digits are uppercase (`0-9A-Z`) to avoid `l`/`r`, which are reserved
//! as direction markers elsewhere.
//!
//! Offsets are encoded directly. Inner indices use `encode_value_index`,
//! which maps `i` to the code of `2i + 1`: value codes are the odd entries
//! of the enumeration, leaving the even entries for the child offsets that
//! must interleave with them.

/// The encoding base.
pub const BASE: u64 = 36;

/// Codewords per length class grow by this factor.
const HALF: u64 = BASE / 2;

/// Longest code `decode_offset` accepts; `36^12` still fits in a `u64`.
const MAX_DIGITS: u32 = 12;

const DIGITS: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// First integer whose base-36 rendering is a length-`d` code.
fn class_start(d: u32) -> u64 {
    return BASE.pow(d) - BASE * HALF.pow(d - 1);
}

/// Encode an offset as a prefix-free code.
pub fn encode_offset(n: u64) -> String {
    // Find the length class containing the n-th codeword.
    let mut d = 1u32;
    let mut first = 0u64; // index of the first codeword of length d
    let mut count = HALF; // codewords of length d
    while n >= first + count {
        first += count;
        count *= HALF;
        d += 1;
    }

    let mut value = class_start(d) + (n - first);
    let mut out = vec![0u8; d as usize];
    for slot in out.iter_mut().rev() {
        *slot = DIGITS[(value % BASE) as usize];
        value /= BASE;
    }
    debug_assert_eq!(value, 0, "codeword wider than its length class");
    return String::from_utf8(out).expect("digits are ASCII");
}

/// Encode an inner index: the odd half of the enumeration.
pub fn encode_value_index(i: u64) -> String {
    return encode_offset(2 * i + 1);
}

/// Decode a code produced by `encode_offset`. Returns `None` for strings
/// that are not exactly one codeword.
pub fn decode_offset(s: &str) -> Option<u64> {
    let d = s.len() as u32;
    if d == 0 || d > MAX_DIGITS {
        return None;
    }

    let mut value = 0u64;
    for c in s.bytes() {
        let digit = match c {
            b'0'..=b'9' => (c - b'0') as u64,
            b'A'..=b'Z' => (c - b'A') as u64 + 10,
            _ => return None,
        };
        value = value * BASE + digit;
    }

    // The rendering must land inside its own length class; anything else
    // is a shorter code padded with junk or a truncated longer one.
    let start = class_start(d);
    if value < start || value - start >= HALF.pow(d) {
        return None;
    }

    let mut first = 0u64;
    for k in 1..d {
        first += HALF.pow(k);
    }
    return Some(first + (value - start));
}

/// Decode an inner-index code: accepts only odd enumeration entries.
pub fn decode_value_index(s: &str) -> Option<u64> {
    let n = decode_offset(s)?;
    if n % 2 == 0 {
        return None;
    }
    return Some((n - 1) / 2);
}
