use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::window::{Bucket, Window};

/// Time-based rolling rule for a ring [`Window`].
///
/// The policy maps wall-clock time to bucket offsets: whenever at least one
/// bucket duration has passed since the last write, the stale buckets in
/// between are lazily reset and the current offset moves forward. One
/// reader/writer lock scoped to the policy serializes writers against each
/// other and against readers; [`reduce`](RollingPolicy::reduce) takes the
/// lock in shared mode so reducers never block one another.
pub struct RollingPolicy<W: Window> {
    size: usize,
    bucket_duration: Duration,
    inner: RwLock<Inner<W>>,
}

struct Inner<W> {
    window: W,
    offset: usize,
    last_append: Instant,
}

impl<W: Window> RollingPolicy<W> {
    /// Bind the policy 1:1 to `window`; `bucket_duration` is fixed
    /// thereafter and must be non-zero.
    pub fn new(window: W, bucket_duration: Duration) -> Self {
        assert!(
            bucket_duration > Duration::ZERO,
            "bucket duration must be non-zero"
        );
        Self {
            size: window.size(),
            bucket_duration,
            inner: RwLock::new(Inner {
                window,
                offset: 0,
                last_append: Instant::now(),
            }),
        }
    }

    /// Number of whole bucket durations elapsed since `last_append`.
    ///
    /// If `now` precedes `last_append` the wall clock has apparently moved
    /// backward; the whole window is treated as expired.
    fn timespan(&self, now: Instant, last_append: Instant) -> usize {
        match now.checked_duration_since(last_append) {
            Some(elapsed) => {
                let spans = elapsed.as_nanos() / self.bucket_duration.as_nanos();
                usize::try_from(spans).unwrap_or(usize::MAX)
            }
            None => self.size,
        }
    }

    /// Overwrite the current bucket with `value`.
    pub fn append(&self, value: f64) {
        self.mutate_at(Instant::now(), W::append, value);
    }

    /// Accumulate `value` into the current bucket.
    pub fn add(&self, value: f64) {
        self.mutate_at(Instant::now(), W::add, value);
    }

    /// Apply `reduce_fn` to the live buckets in chronological order, oldest
    /// first. Never resets buckets; a fully stale window yields `0.0`
    /// without invoking `reduce_fn`.
    pub fn reduce<F>(&self, reduce_fn: F) -> f64
    where
        F: FnOnce(&mut dyn Iterator<Item = &Bucket>) -> f64,
    {
        self.reduce_at(Instant::now(), reduce_fn)
    }

    fn mutate_at<F>(&self, now: Instant, mutate_fn: F, value: f64)
    where
        F: Fn(&mut W, usize, f64),
    {
        let mut inner = self.inner.write();
        let timespan = self.timespan(now, inner.last_append);
        if timespan > 0 {
            // Advance by whole bucket spans rather than snapping to `now`,
            // so bucket boundaries stay aligned and no drift accumulates.
            let nanos = (timespan as u128).saturating_mul(self.bucket_duration.as_nanos());
            let advance = Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX));
            inner.last_append = inner.last_append.checked_add(advance).unwrap_or(now);

            // Reset the expired buckets, walking forward from the old
            // offset with wraparound; a long idle stretch never resets more
            // than one full turn of the ring.
            let steps = timespan.min(self.size);
            let base = inner.offset;
            let mut offset = base;
            for i in 1..=steps {
                let idx = (base + i) % self.size;
                inner.window.reset_bucket(idx);
                offset = idx;
            }
            inner.offset = offset;
        }
        let offset = inner.offset;
        mutate_fn(&mut inner.window, offset, value);
    }

    fn reduce_at<F>(&self, now: Instant, reduce_fn: F) -> f64
    where
        F: FnOnce(&mut dyn Iterator<Item = &Bucket>) -> f64,
    {
        let inner = self.inner.read();
        let timespan = self.timespan(now, inner.last_append);
        if timespan >= self.size {
            return 0.0;
        }
        let count = self.size - timespan;
        let start = (inner.offset + timespan + 1) % self.size;
        let mut iter = inner.window.iter(start, count);
        reduce_fn(&mut *iter)
    }

    #[cfg(test)]
    fn offset(&self) -> usize {
        self.inner.read().offset
    }

    #[cfg(test)]
    fn last_append(&self) -> Instant {
        self.inner.read().last_append
    }
}
