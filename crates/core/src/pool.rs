use std::{collections::HashMap, sync::OnceLock};

use parking_lot::Mutex;

/// Caps how many idle buffers of a given size we keep around per bucket;
/// beyond this we just let the buffer drop instead of growing unbounded.
const MAX_IDLE_PER_BUCKET: usize = 64;

/// Process-wide pool of splice buffers, bucketed by the configured
/// socket buffer size. Acquisition never blocks: a miss falls back to a
/// fresh allocation.
struct BufferPool {
    buckets: Mutex<HashMap<usize, Vec<Vec<u8>>>>,
}

static POOL: OnceLock<BufferPool> = OnceLock::new();

fn pool() -> &'static BufferPool {
    POOL.get_or_init(|| BufferPool {
        buckets: Mutex::new(HashMap::new()),
    })
}

/// Take a zeroed buffer of exactly `size` bytes, reusing a pooled one
/// when available.
pub fn acquire(size: usize) -> Vec<u8> {
    if let Some(buf) = pool().buckets.lock().get_mut(&size).and_then(Vec::pop) {
        return buf;
    }

    vec![0u8; size]
}

/// Return a buffer to the pool for reuse. The buffer's capacity is used
/// as the bucket key, so always pair this with the `size` passed to
/// [`acquire`].
pub fn release(buf: Vec<u8>) {
    let size = buf.len();
    let mut buckets = pool().buckets.lock();
    let bucket = buckets.entry(size).or_default();
    if bucket.len() < MAX_IDLE_PER_BUCKET {
        bucket.push(buf);
    }
}
