//! # Test Subdomain Allocator
//!
//! Test hostnames for the test migration modes.
//!
//! - `*.shop.example.com` becomes `*.wc-<N>.<base>` with the smallest `N` not yet assigned
//! - anything else becomes `<8 random [a-z0-9]>.<base>`

use std::collections::BTreeMap;

use rand::rngs::OsRng;
use rand::RngCore;

use crate::constants::TEST_HOST_PREFIX_LEN;
use crate::error::RunError;

const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Source of random hostname prefixes
pub trait RandomSource: Send {
    /// `len` characters from `[a-z0-9]`
    fn random_string(&mut self, len: usize) -> Result<String, RunError>;
}

/// Operating system randomness
#[derive(Debug, Default)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn random_string(&mut self, len: usize) -> Result<String, RunError> {
        // Largest multiple of the alphabet size that fits in a byte
        let limit = u8::try_from(256 - 256 % ALPHABET.len())
            .map_err(|e| RunError::Randomness(e.to_string()))?;
        let mut out = String::with_capacity(len);
        let mut buf = [0u8; 32];
        while out.len() < len {
            OsRng
                .try_fill_bytes(&mut buf)
                .map_err(|e| RunError::Randomness(e.to_string()))?;
            for byte in buf.iter().copied().filter(|b| *b < limit) {
                if out.len() == len {
                    break;
                }
                out.push(char::from(ALPHABET[usize::from(byte) % ALPHABET.len()]));
            }
        }
        Ok(out)
    }
}

fn is_wildcard(host: &str) -> bool {
    host.split('.').next() == Some("*")
}

/// Test hostname for `host`
///
/// `existing` holds every assignment known so far, persisted and from this run.
///
/// # Errors
///
/// [`RunError::Randomness`] when the random source fails.
pub fn allocate(
    base: &str,
    host: &str,
    existing: &BTreeMap<String, String>,
    random: &mut dyn RandomSource,
) -> Result<String, RunError> {
    if is_wildcard(host) {
        let mut id = 0usize;
        loop {
            let candidate = format!("*.wc-{id}.{base}");
            if !existing.values().any(|value| *value == candidate) {
                return Ok(candidate);
            }
            id += 1;
        }
    }
    let prefix = random.random_string(TEST_HOST_PREFIX_LEN)?;
    Ok(format!("{prefix}.{base}"))
}
