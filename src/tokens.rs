//! Verification token generation.

use rand::{Rng, distr::Alphanumeric};

/// Generate a random URL-safe token of exactly `length` characters.
///
/// Characters are drawn from `[A-Za-z0-9]` using the thread-local CSPRNG,
/// so the token can be embedded in a link without escaping.
pub fn token_generate(length: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}
