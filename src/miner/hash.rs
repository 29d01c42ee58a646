// src/miner/hash.rs
//! Candidate generation and difficulty test
//!
//! A candidate is a fixed prefix followed by a suffix drawn from a
//! 62-character alphanumeric set. Suffixes are produced by a xorshift
//! chain so a generator only ever carries one `u64` of state.

use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

/// Characters a candidate suffix is drawn from
pub const CHARACTER_SET: &[u8; 62] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ1234567890";

/// Advances a xorshift seed by one step
///
/// Zero is a fixed point, so generators must start from a non-zero seed
/// (see [`seed_from_clock`]).
#[inline]
pub fn next_seed(mut seed: u64) -> u64 {
    seed ^= seed << 21;
    seed ^= seed >> 35;
    seed ^= seed << 4;
    seed
}

/// Overwrites `buffer[offset..]` with characters drawn from the seed chain
///
/// Returns the last seed so the next call continues the same chain.
#[inline]
pub fn mutate_suffix(buffer: &mut [u8], offset: usize, mut seed: u64) -> u64 {
    for byte in buffer.iter_mut().skip(offset) {
        seed = next_seed(seed);
        *byte = CHARACTER_SET[(seed % CHARACTER_SET.len() as u64) as usize];
    }
    seed
}

/// SHA-256 digest of `data`
#[inline]
pub fn digest(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Returns true when the digest of `buffer` starts with `bits` zero bits
///
/// Whole bytes are compared first, the remaining bits are checked by
/// shifting the next byte. `bits == 0` always holds; anything beyond the
/// digest width never does.
#[inline]
pub fn meets_difficulty(buffer: &[u8], bits: u32) -> bool {
    if bits == 0 {
        return true;
    }
    if bits > 256 {
        return false;
    }
    let hash = digest(buffer);
    let full_bytes = (bits / 8) as usize;
    let rem_bits = bits % 8;

    if hash[..full_bytes].iter().any(|&b| b != 0) {
        return false;
    }
    rem_bits == 0 || hash[full_bytes] >> (8 - rem_bits) == 0
}

/// Number of leading zero bits in a digest
pub fn leading_zero_bits(hash: &[u8]) -> u32 {
    let mut count = 0;
    for &byte in hash {
        if byte == 0 {
            count += 8;
        } else {
            return count + byte.leading_zeros();
        }
    }
    count
}

/// Non-zero seed derived from the wall clock and a generator index
pub fn seed_from_clock(index: usize) -> u64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0x9E37_79B9_7F4A_7C15);
    // Spread indices apart so pipelines started in the same tick diverge.
    let mixed = nanos ^ (index as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    if mixed == 0 { 1 } else { mixed }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn next_seed_known_value() {
        assert_eq!(next_seed(1), 0x0220_0011);
        assert_eq!(next_seed(0), 0);
    }

    #[test]
    fn mutate_suffix_is_deterministic() {
        let mut a = *b"pre\0\0\0\0\0\0\0\0\0\0";
        let mut b = a;
        let seed_a = mutate_suffix(&mut a, 3, 42);
        let seed_b = mutate_suffix(&mut b, 3, 42);
        assert_eq!(a, b);
        assert_eq!(seed_a, seed_b);
        assert_eq!(&a[..3], b"pre");
        assert!(a[3..].iter().all(|c| CHARACTER_SET.contains(c)));
    }

    #[test]
    fn mutate_suffix_first_character() {
        // next_seed(1) = 35651601, 35651601 % 62 = 51 -> 'Z'
        let mut buf = [0u8; 3];
        mutate_suffix(&mut buf, 2, 1);
        assert_eq!(buf[2], b'Z');
        assert_eq!(&buf[..2], &[0, 0]);
    }

    #[test]
    fn mutate_suffix_chain_resumes_across_calls() {
        let mut whole = [0u8; 8];
        let end_whole = mutate_suffix(&mut whole, 0, 7);

        let mut first = [0u8; 4];
        let mut second = [0u8; 4];
        let mid = mutate_suffix(&mut first, 0, 7);
        let end_split = mutate_suffix(&mut second, 0, mid);

        assert_eq!(&whole[..4], &first);
        assert_eq!(&whole[4..], &second);
        assert_eq!(end_whole, end_split);
    }

    #[test]
    fn mutate_suffix_offset_past_end_is_noop() {
        let mut buf = *b"abc";
        assert_eq!(mutate_suffix(&mut buf, 5, 99), 99);
        assert_eq!(&buf, b"abc");
    }

    #[test]
    fn digest_matches_known_vectors() {
        assert_eq!(
            digest(b"abc"),
            hex!("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
        );
        assert_eq!(
            digest(b""),
            hex!("e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855")
        );
    }

    #[test]
    fn leading_zero_bits_counts_across_bytes() {
        assert_eq!(leading_zero_bits(&[0x00, 0x00, 0x1f, 0xff]), 19);
        assert_eq!(leading_zero_bits(&[0x80]), 0);
        assert_eq!(leading_zero_bits(&[0x00; 4]), 32);
    }

    #[test]
    fn meets_difficulty_agrees_with_bit_count() {
        // Walk a seed chain until we have digests with a spread of zero prefixes.
        let mut buf = b"test".to_vec();
        buf.resize(24, 0);
        let mut seed = 12345;
        let mut best = 0;
        for _ in 0..200_000 {
            seed = mutate_suffix(&mut buf, 4, seed);
            let zeros = leading_zero_bits(&digest(&buf));
            for d in 0..=20 {
                assert_eq!(
                    meets_difficulty(&buf, d),
                    zeros >= d,
                    "difficulty {} with {} leading zeros",
                    d,
                    zeros
                );
            }
            best = best.max(zeros);
            if best >= 12 {
                break;
            }
        }
        assert!(best >= 12, "expected to see at least 12 leading zero bits");
    }

    #[test]
    fn meets_difficulty_edges() {
        assert!(meets_difficulty(b"anything", 0));
        assert!(!meets_difficulty(b"abc", 1)); // digest starts with 0xba
        assert!(!meets_difficulty(b"abc", 257));
    }

    #[test]
    fn clock_seed_is_never_zero() {
        for i in 0..16 {
            assert_ne!(seed_from_clock(i), 0);
        }
    }
}
