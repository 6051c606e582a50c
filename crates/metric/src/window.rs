/// A single per-interval aggregate inside a window.
#[derive(Debug, Clone, Default)]
pub struct Bucket {
    pub points: Vec<f64>,
    pub count: u64,
}

impl Bucket {
    /// Overwrite the bucket with a fresh single-point representation.
    pub fn append(&mut self, value: f64) {
        self.points.clear();
        self.points.push(value);
        self.count = 1;
    }

    /// Accumulate `value` into the bucket.
    pub fn add(&mut self, value: f64) {
        match self.points.first_mut() {
            Some(point) => *point += value,
            None => self.points.push(value),
        }
        self.count += 1;
    }

    /// Clear the bucket back to its zero aggregate.
    pub fn reset(&mut self) {
        self.points.clear();
        self.count = 0;
    }
}

/// Fixed-capacity, index-addressed bucket store.
///
/// A [`RollingPolicy`](crate::RollingPolicy) serializes all of its own calls
/// into the window; implementations only need to be consistent for one
/// writer or many concurrent readers.
pub trait Window {
    /// Fixed capacity, set at construction.
    fn size(&self) -> usize;

    /// Overwrite the bucket at `offset` with a fresh single point.
    fn append(&mut self, offset: usize, value: f64);

    /// Accumulate `value` into the bucket at `offset`.
    fn add(&mut self, offset: usize, value: f64);

    /// Clear the bucket at `offset` to its zero aggregate.
    fn reset_bucket(&mut self, offset: usize);

    /// Iterate exactly `count` buckets starting at `start`, advancing
    /// circularly modulo [`size`](Window::size), oldest first.
    fn iter(&self, start: usize, count: usize) -> Box<dyn Iterator<Item = &Bucket> + '_>;
}

/// The concrete ring-array window backing a rolling policy.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    buckets: Vec<Bucket>,
}

impl RollingWindow {
    /// Create a window of `size` empty buckets.
    pub fn new(size: usize) -> Self {
        assert!(size > 0, "window size must be non-zero");
        Self {
            buckets: vec![Bucket::default(); size],
        }
    }
}

impl Window for RollingWindow {
    fn size(&self) -> usize {
        self.buckets.len()
    }

    fn append(&mut self, offset: usize, value: f64) {
        self.buckets[offset].append(value);
    }

    fn add(&mut self, offset: usize, value: f64) {
        self.buckets[offset].add(value);
    }

    fn reset_bucket(&mut self, offset: usize) {
        self.buckets[offset].reset();
    }

    fn iter(&self, start: usize, count: usize) -> Box<dyn Iterator<Item = &Bucket> + '_> {
        let size = self.buckets.len();
        Box::new((0..count).map(move |i| &self.buckets[(start + i) % size]))
    }
}
