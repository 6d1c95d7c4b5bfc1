/// Snapshot of [`BufferPool`](crate::BufferPool) counters, suitable for profiling/telemetry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Buffers constructed because the idle queue was empty.
    pub allocated: u64,
    /// Acquisitions served from the idle queue.
    pub reused: u64,
    /// Releases that put the buffer back on the idle queue.
    pub recycled: u64,
    /// Buffers destroyed by the pool: stale releases, resizes and clears.
    pub discarded: u64,
}

impl PoolStats {
    pub(crate) fn inc_allocated(&mut self) {
        self.allocated += 1;
    }

    pub(crate) fn inc_reused(&mut self) {
        self.reused += 1;
    }

    pub(crate) fn inc_recycled(&mut self) {
        self.recycled += 1;
    }

    pub(crate) fn add_discarded(&mut self, count: usize) {
        self.discarded += count as u64;
    }

    /// Share of acquisitions that did not need a new buffer.
    pub fn reuse_ratio(&self) -> f64 {
        let total = self.allocated + self.reused;
        if total == 0 {
            return 0.0;
        }
        self.reused as f64 / total as f64
    }
}
