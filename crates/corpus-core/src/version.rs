//! Version string generation
//!
//! Produces unique, time-sortable version strings: the current millisecond
//! timestamp is encoded big-endian (leading zero bytes stripped) as
//! unpadded base64url, and same-millisecond collisions get a `.<seq>`
//! suffix. Process-wide state lives behind a mutex; cross-process
//! uniqueness is not claimed.

use std::sync::Mutex;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::Utc;

struct VersionState {
    last_ms: i64,
    seq: u32,
}

static STATE: Mutex<VersionState> = Mutex::new(VersionState { last_ms: 0, seq: 0 });

/// Allocate the next version string for this process
///
/// Successive calls produce strictly increasing strings. If the wall clock
/// regresses, the previous millisecond is reused with a bumped sequence so
/// the ordering property still holds.
pub fn next_version() -> String {
    let now = Utc::now().timestamp_millis();
    let mut state = STATE.lock().expect("version state poisoned");

    if now <= state.last_ms {
        state.seq += 1;
    } else {
        state.last_ms = now;
        state.seq = 0;
    }

    encode_version(state.last_ms, state.seq)
}

/// Encode a millisecond timestamp and collision sequence as a version string
fn encode_version(ms: i64, seq: u32) -> String {
    let be = (ms as u64).to_be_bytes();
    let first = be
        .iter()
        .position(|&b| b != 0)
        .unwrap_or(be.len() - 1);
    let token = URL_SAFE_NO_PAD.encode(&be[first..]);

    if seq > 0 {
        format!("{}.{}", token, seq)
    } else {
        token
    }
}
