//! Connector: the growable sample buffer owned by one output port.

/// Growable sample buffer with a logical length.
///
/// Capacity only ever grows. Every stage overwrites its whole output each
/// frame, so growing discards the old contents instead of copying them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Connector {
    samples: Vec<f32>,
    sample_count: usize,
    reallocations: usize,
}

impl Connector {
    /// Create an empty connector with zero capacity.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of samples written this frame.
    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    /// Allocated length.
    pub fn capacity(&self) -> usize {
        self.samples.len()
    }

    /// How many times the buffer has been reallocated.
    pub fn reallocations(&self) -> usize {
        self.reallocations
    }

    /// The samples written this frame.
    pub fn as_slice(&self) -> &[f32] {
        &self.samples[..self.sample_count]
    }

    /// Make room for `count` samples, discarding old contents on growth.
    fn reserve(&mut self, count: usize) {
        if count > self.samples.len() {
            self.samples = vec![0.0; count];
            self.reallocations += 1;
        }
    }

    /// Grow to `count` if needed, set the logical length and hand out the
    /// writable region.
    pub fn prepare(&mut self, count: usize) -> &mut [f32] {
        self.reserve(count);
        self.sample_count = count;
        &mut self.samples[..count]
    }

    /// Drop the logical contents; capacity is kept.
    pub fn clear(&mut self) {
        self.sample_count = 0;
    }
}
