//! Process-local bearer token issuance, TTL rotation, and grace-window
//! verification (spec §4.1). Grounded on `original_source/src/api/auth.py`'s
//! `TokenManager` (same rotation policy: a single lock serializes both
//! rotation and verification, rotation runs lazily on access).

use std::time::{Duration, Instant};

use base64::Engine;
use parking_lot::Mutex;
use rand::RngCore;

const TOKEN_BYTES: usize = 32;

/// Default TTL: 60 minutes (spec §5, overridable via `KOTOBA_TOKEN_TTL_MINUTES`).
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);
/// Default grace window: 5 minutes (spec §5).
pub const DEFAULT_GRACE: Duration = Duration::from_secs(5 * 60);

struct TokenState {
    current: String,
    previous: Option<String>,
    issued_at: Instant,
}

/// Issues, verifies, and lazily rotates a bearer token.
///
/// A token is valid iff it equals `current`, or it equals `previous` and
/// `now - issued_at <= grace`. Rotation moves `current` to `previous` and
/// mints a fresh `current` the first time either `current_token` or
/// `verify` is called after `ttl` has elapsed.
pub struct TokenManager {
    state: Mutex<TokenState>,
    ttl: Duration,
    grace: Duration,
}

impl TokenManager {
    /// Generates the initial token and starts the TTL clock. Entropy-source
    /// failure is fatal at startup, per spec §4.1 — `rand::rngs::OsRng` is
    /// infallible in practice so this never returns an error, but callers
    /// should treat token generation as part of the startup critical path.
    pub fn new(ttl: Duration, grace: Duration) -> Self {
        Self {
            state: Mutex::new(TokenState {
                current: generate_token(),
                previous: None,
                issued_at: Instant::now(),
            }),
            ttl,
            grace,
        }
    }

    /// Returns the token currently valid for new issuance, rotating first
    /// if the TTL has elapsed.
    pub fn current_token(&self) -> String {
        let mut state = self.state.lock();
        self.rotate_if_needed(&mut state);
        state.current.clone()
    }

    /// Verifies a candidate token. Never panics; malformed input (too
    /// short, empty) simply fails verification.
    pub fn verify(&self, candidate: &str) -> bool {
        let mut state = self.state.lock();
        self.rotate_if_needed(&mut state);

        if constant_time_eq(candidate, &state.current) {
            return true;
        }

        if let Some(previous) = &state.previous {
            if constant_time_eq(candidate, previous) {
                return state.issued_at.elapsed() <= self.grace;
            }
        }

        false
    }

    fn rotate_if_needed(&self, state: &mut TokenState) {
        if state.issued_at.elapsed() >= self.ttl {
            state.previous = Some(std::mem::replace(&mut state.current, generate_token()));
            state.issued_at = Instant::now();
            tracing::info!("bearer token rotated (ttl elapsed)");
        }
    }
}

impl Default for TokenManager {
    fn default() -> Self {
        Self::new(DEFAULT_TTL, DEFAULT_GRACE)
    }
}

fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Constant-time string comparison so verification timing doesn't leak
/// how much of a candidate token matched.
fn constant_time_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_is_at_least_32_bytes_of_entropy() {
        let manager = TokenManager::default();
        let token = manager.current_token();
        // base64url w/o padding of 32 bytes is 43 chars.
        assert!(token.len() >= 32);
    }

    #[test]
    fn current_token_verifies() {
        let manager = TokenManager::default();
        let token = manager.current_token();
        assert!(manager.verify(&token));
    }

    #[test]
    fn wrong_token_does_not_verify() {
        let manager = TokenManager::default();
        assert!(!manager.verify("not-the-token"));
    }

    #[test]
    fn empty_token_does_not_panic_or_verify() {
        let manager = TokenManager::default();
        assert!(!manager.verify(""));
    }

    #[test]
    fn rotation_moves_current_to_previous_within_grace() {
        let manager = TokenManager::new(Duration::from_millis(20), Duration::from_secs(5));
        let first = manager.current_token();
        std::thread::sleep(Duration::from_millis(40));
        // Triggers rotation as a side effect.
        let second = manager.current_token();
        assert_ne!(first, second);
        // The old token is still valid within the grace window.
        assert!(manager.verify(&first));
        assert!(manager.verify(&second));
    }

    #[test]
    fn previous_token_invalid_after_grace_elapses() {
        let manager = TokenManager::new(Duration::from_millis(10), Duration::from_millis(20));
        let first = manager.current_token();
        std::thread::sleep(Duration::from_millis(20));
        manager.current_token(); // rotates; first -> previous
        std::thread::sleep(Duration::from_millis(40)); // exceeds grace
        assert!(!manager.verify(&first));
    }
}
