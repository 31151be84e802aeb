//! Certificate code generation.
//!
//! A code has the shape `<PREFIX>-<TIME>-<RAND>`: the organisation prefix,
//! the creation time in milliseconds encoded in base 36, and five base-36
//! random characters, all upper-case (e.g. `AWW-LTB3K9QZ-7F2QX`). Codes made
//! at different instants are very unlikely to collide, but nothing here
//! guarantees uniqueness; the certificate store checks before writing.

use chrono::{DateTime, Utc};

/// Default organisation prefix.
pub const DEFAULT_PREFIX: &str = "AWW";

/// Number of random characters at the end of a code.
pub const SUFFIX_LEN: usize = 5;

const ALPHABET: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// A source of fresh certificate codes.
pub trait CodeSource: Send + Sync {
    /// Produce a new code.
    fn next_code(&self) -> String;
}

/// Codes from the system clock and UUID v4 randomness.
#[derive(Debug, Clone)]
pub struct SystemCodeSource {
    prefix: String,
}

impl SystemCodeSource {
    /// Create a source that stamps codes with `prefix`.
    #[must_use]
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_owned(),
        }
    }
}

impl Default for SystemCodeSource {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

impl CodeSource for SystemCodeSource {
    fn next_code(&self) -> String {
        generate_code(&self.prefix, Utc::now(), uuid::Uuid::new_v4().as_u128())
    }
}

/// Build a code from a prefix, a creation time, and random entropy.
///
/// Times before the Unix epoch encode as `0`.
///
/// ```
/// # use certdesk_core::code::generate_code;
/// # use chrono::TimeZone;
/// let at = chrono::Utc.timestamp_millis_opt(1_709_337_600_000).unwrap();
/// assert_eq!(generate_code("aww", at, 35), "AWW-LT9BH1C0-0000Z");
/// ```
#[must_use]
pub fn generate_code(prefix: &str, at: DateTime<Utc>, entropy: u128) -> String {
    let millis = u128::try_from(at.timestamp_millis()).unwrap_or(0);
    let suffix_space = 36u128.pow(u32::try_from(SUFFIX_LEN).unwrap_or(5));
    let mut suffix = base36(entropy % suffix_space);
    while suffix.len() < SUFFIX_LEN {
        suffix.insert(0, '0');
    }
    format!("{}-{}-{suffix}", prefix.to_uppercase(), base36(millis))
}

/// Whether `code` has the shape produced by [`generate_code`] for `prefix`.
#[must_use]
pub fn is_well_formed(prefix: &str, code: &str) -> bool {
    let upper_digit = |c: char| c.is_ascii_digit() || c.is_ascii_uppercase();
    let mut parts = code.split('-');
    let (Some(p), Some(time), Some(rand), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    p == prefix.to_uppercase()
        && !time.is_empty()
        && time.chars().all(upper_digit)
        && rand.len() == SUFFIX_LEN
        && rand.chars().all(upper_digit)
}

fn base36(mut n: u128) -> String {
    if n == 0 {
        return "0".to_owned();
    }
    let mut digits = Vec::new();
    while n > 0 {
        let idx = usize::try_from(n % 36).unwrap_or(0);
        digits.push(char::from(ALPHABET[idx]));
        n /= 36;
    }
    digits.iter().rev().collect()
}
