//! Fixed-capacity sample storage for one capture or manual session.

/// One timestamped measurement: elapsed time since the run epoch, the duty
/// applied at that instant, and the speed reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub elapsed_ms: u32,
    pub duty_pct: u8,
    pub rpm: f32,
}

impl Sample {
    /// Delimited record in the wire format: `tiempo_ms,pwm_porcentaje,rpm`.
    pub fn csv_row(&self) -> String {
        format!("{},{},{:.2}", self.elapsed_ms, self.duty_pct, self.rpm)
    }
}

/// Append-only store with a fixed capacity allocated once for the process
/// lifetime. `clear` resets the logical length per run; once full, further
/// samples are dropped rather than overwriting. Overflow is a soft-fail:
/// the run completes and reports a truncated record stream.
#[derive(Debug)]
pub struct SampleBuffer {
    samples: Vec<Sample>,
    capacity: usize,
    dropped: u32,
}

impl SampleBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: Vec::with_capacity(capacity),
            capacity,
            dropped: 0,
        }
    }

    /// Reset the logical length for a new run; the allocation is kept.
    pub fn clear(&mut self) {
        self.samples.clear();
        self.dropped = 0;
    }

    /// Append one sample; returns false when the buffer is already full.
    pub fn push(&mut self, sample: Sample) -> bool {
        if self.samples.len() < self.capacity {
            self.samples.push(sample);
            true
        } else {
            if self.dropped == 0 {
                tracing::warn!(capacity = self.capacity, "sample buffer full, dropping samples");
            }
            self.dropped = self.dropped.saturating_add(1);
            false
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Samples dropped since the last `clear`.
    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }
}
