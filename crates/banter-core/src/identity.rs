//! Anonymous display handles.
//!
//! Handles attribute messages to a sender; they are not authentication
//! principals. Collisions are tolerated since no authorization decision is
//! ever made from a handle.

use rand::Rng;

/// Default handle namespace prefix.
pub const DEFAULT_HANDLE_PREFIX: &str = "guest";

/// Generate a fresh anonymous handle: a fixed prefix plus a random
/// zero-padded numeric suffix (`guest-04217`).
#[must_use]
pub fn generate_handle(prefix: &str) -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0..100_000);
    format!("{prefix}-{suffix:05}")
}
