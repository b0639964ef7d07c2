//! Per-run session token sent with every question so the backend can keep one
//! conversation history per front-end lifetime.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::rngs::OsRng;
use rand::RngCore;
use serde::Serialize;

const SUFFIX_LEN: usize = 7;
const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Opaque correlation key. Created once at startup and never regenerated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    /// Build a token from the current time plus OS entropy.
    ///
    /// Falls back to a timestamp-only token when the entropy source fails, so
    /// this never errors.
    pub fn generate() -> Self {
        let mut entropy = [0u8; SUFFIX_LEN];
        match OsRng.try_fill_bytes(&mut entropy) {
            Ok(()) => {
                let suffix: String = entropy
                    .iter()
                    .map(|b| BASE36[usize::from(*b) % BASE36.len()] as char)
                    .collect();
                Self(format!("session_{}_{}", epoch_millis(), suffix))
            }
            Err(e) => {
                tracing::warn!(error = %e, "entropy source unavailable, using timestamp-only session token");
                Self::from_timestamp()
            }
        }
    }

    /// Timestamp-only token: epoch millis plus the sub-second nanos in base 36.
    pub fn from_timestamp() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.subsec_nanos())
            .unwrap_or(0);
        Self(format!("session_{}_{}", epoch_millis(), to_base36(u64::from(nanos))))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn epoch_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

fn to_base36(mut n: u64) -> String {
    if n == 0 {
        return "0".into();
    }
    let mut digits = Vec::new();
    while n > 0 {
        digits.push(BASE36[(n % 36) as usize]);
        n /= 36;
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}
