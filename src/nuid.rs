//! Process-wide monotonic unique-id source.
//!
//! Durable DLS fetch consumers and metadata record ids both need names that
//! are unique within the lifetime of the cluster. Ids combine a per-process
//! base-36 timestamp prefix with an atomic counter, so concurrent handlers
//! never collide and restarts roll the prefix forward.

use std::sync::atomic::{AtomicU64, Ordering};

use once_cell::sync::Lazy;

/// Monotonic unique-id generator.
///
/// Cheap to share: `next` is a single atomic increment.
#[derive(Debug)]
pub struct Nuid {
    prefix: String,
    counter: AtomicU64,
}

impl Nuid {
    /// Create a generator with a fresh time-derived prefix.
    pub fn new() -> Self {
        let now = chrono::Utc::now().timestamp_micros().max(0) as u64;
        Nuid {
            prefix: to_base36(now),
            counter: AtomicU64::new(0),
        }
    }

    /// Mint the next unique id.
    pub fn next(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("{}{}", self.prefix, to_base36(n))
    }
}

impl Default for Nuid {
    fn default() -> Self {
        Nuid::new()
    }
}

static GLOBAL: Lazy<Nuid> = Lazy::new(Nuid::new);

/// Mint an id from the process-wide generator.
pub fn next() -> String {
    GLOBAL.next()
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).expect("base36 digits are ascii")
}
