use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::Instant;

use chrono::{DateTime, Duration, Utc};

// A stable anchor captured on first use: a wall clock snapshot paired with a
// monotonic reading.
static ANCHOR: OnceLock<(DateTime<Utc>, Instant)> = OnceLock::new();
// Tie-breaker for same-nanosecond events.
static SEQ: AtomicU64 = AtomicU64::new(0);

fn anchor() -> &'static (DateTime<Utc>, Instant) {
    ANCHOR.get_or_init(|| (Utc::now(), Instant::now()))
}

/// Returns a time derived from the anchor wall time plus monotonic elapsed
/// time. Immune to wall-clock jumps.
pub fn now_stable() -> DateTime<Utc> {
    let (wall, mono) = anchor();
    *wall + Duration::from_std(mono.elapsed()).unwrap_or_else(|_| Duration::zero())
}

/// Returns a filename-safe timestamp like
/// `2025-09-14T22-11-33.123456789Z-0001` derived from [`now_stable`]. The
/// suffix prevents collisions within the same nanosecond.
pub fn file_stamp() -> String {
    let stamp = now_stable().format("%Y-%m-%dT%H-%M-%S%.9fZ");
    let seq = SEQ.fetch_add(1, Ordering::SeqCst) + 1;
    format!("{stamp}-{seq:04}")
}

/// Builds `<stem>_<stamp>.<ext>` with the stable timestamp, e.g.
/// `plants_2025-09-14T22-11-33.123456789Z-0001.wal`.
pub fn file_name_monotonic(stem: &str, ext: &str) -> String {
    let ext = ext.trim_start_matches('.');
    format!("{stem}_{}.{ext}", file_stamp())
}
