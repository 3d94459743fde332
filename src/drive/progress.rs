//! Whole-percent progress reporting for chunked transfers.

/// Turns transferred byte counts into whole-percent increases.
///
/// Each percentage is yielded at most once, and only when it is higher than
/// the last one yielded.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    total: u64,
    last_percent: u8,
}

impl ProgressTracker {
    pub fn new(total: u64) -> Self {
        Self {
            total,
            last_percent: 0,
        }
    }

    /// Record `transferred` bytes; returns the new percentage if it increased.
    pub fn update(&mut self, transferred: u64) -> Option<u8> {
        let percent = if self.total == 0 {
            100
        } else {
            (transferred.min(self.total) * 100 / self.total) as u8
        };

        if percent > self.last_percent {
            self.last_percent = percent;
            Some(percent)
        } else {
            None
        }
    }

    pub fn last_percent(&self) -> u8 {
        self.last_percent
    }
}
