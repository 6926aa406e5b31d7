//! Short, stable, non-cryptographic string hashes used for island ids.

const DICTIONARY: &[u8; 62] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// 32-bit rolling hash (`hash * 31 + unit`) over UTF-16 code units,
/// matching the value a browser computes for the same string.
fn bitwise(text: &str) -> i32 {
    text.encode_utf16().fold(0i32, |hash, unit| {
        (hash << 5).wrapping_sub(hash).wrapping_add(i32::from(unit))
    })
}

/// Base-62 encoding of [`bitwise`], prefixed with `Z` when the hash is
/// negative. The empty string hashes to the empty string.
pub fn shorthash(text: &str) -> String {
    let hash = bitwise(text);
    let mut n = i64::from(hash).unsigned_abs();
    let mut digits = Vec::new();
    while n > 0 {
        digits.push(DICTIONARY[(n % 62) as usize]);
        n /= 62;
    }
    if hash < 0 {
        digits.push(b'Z');
    }
    digits.iter().rev().map(|&b| b as char).collect()
}
