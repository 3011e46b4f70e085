//! # Stable Type Hashing
//!
//! Component wire ids are the 32-bit FNV-1a hash of the component's
//! registered name. The hash is computed at compile time so both peers agree
//! on ids without any handshake.

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// Computes the 32-bit FNV-1a hash of `bytes`.
#[inline]
#[must_use]
pub const fn fnv1a_32(bytes: &[u8]) -> u32 {
    let mut hash = FNV_OFFSET_BASIS;
    let mut i = 0;
    while i < bytes.len() {
        hash ^= bytes[i] as u32;
        hash = hash.wrapping_mul(FNV_PRIME);
        i += 1;
    }
    hash
}
