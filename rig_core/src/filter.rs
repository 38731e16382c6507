//! Display smoothing for the live manual-mode readout.

/// Fixed-window moving average over the last K speed readings.
///
/// The window starts filled with zeros, so the first K-1 averages
/// under-report true speed; this is a bounded startup transient accepted
/// for a display-only value. Control and capture paths read the raw speed
/// cell, never this filter.
#[derive(Debug, Clone)]
pub struct SpeedFilter {
    window: Vec<f32>,
    idx: usize,
}

impl SpeedFilter {
    pub fn new(window: usize) -> Self {
        Self {
            window: vec![0.0; window.max(1)],
            idx: 0,
        }
    }

    /// Insert one reading (evicting the oldest) and return the mean of the
    /// current window.
    pub fn push(&mut self, rpm: f32) -> f32 {
        self.window[self.idx] = rpm;
        self.idx = (self.idx + 1) % self.window.len();
        self.window.iter().sum::<f32>() / self.window.len() as f32
    }

    /// Zero the window, e.g. when entering a fresh manual session.
    pub fn reset(&mut self) {
        self.window.fill(0.0);
        self.idx = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn startup_transient_under_reports() {
        let mut f = SpeedFilter::new(4);
        // one reading over a window of four: mean includes three zeros
        assert_eq!(f.push(100.0), 25.0);
    }

    #[test]
    fn full_window_is_plain_mean_and_evicts_oldest() {
        let mut f = SpeedFilter::new(3);
        f.push(1.0);
        f.push(2.0);
        assert_eq!(f.push(3.0), 2.0); // mean(1,2,3)
        assert_eq!(f.push(4.0), 3.0); // mean(2,3,4), 1.0 evicted
    }

    #[test]
    fn reset_clears_history() {
        let mut f = SpeedFilter::new(2);
        f.push(10.0);
        f.reset();
        assert_eq!(f.push(10.0), 5.0);
    }
}
