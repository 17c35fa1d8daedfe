//! Random join codes.

use rand::Rng;

/// Join code alphabet: upper-case letters and digits without `I`, `O`, `0` and `1`
pub const JOIN_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Length of a join code
pub const JOIN_CODE_LEN: usize = 8;

/// Generate a random join code
pub fn generate_join_code() -> String {
    let mut rng = rand::rng();
    (0..JOIN_CODE_LEN)
        .map(|_| JOIN_CODE_ALPHABET[rng.random_range(0..JOIN_CODE_ALPHABET.len())] as char)
        .collect()
}

/// Trim and upper-case a join code as typed by a user
pub fn normalize_join_code(code: &str) -> String {
    code.trim().to_uppercase()
}
