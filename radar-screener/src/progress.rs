use serde::Serialize;

/// Observable progress of a running scan, published after every batch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ScanProgress {
    pub total_batches: usize,
    pub completed_batches: usize,
    pub failed_batches: usize,
    pub candidates_found: usize,
    pub finished: bool,
}

impl ScanProgress {
    pub fn started(total_batches: usize) -> Self {
        Self {
            total_batches,
            ..Self::default()
        }
    }

    /// Completed share of batches in `[0, 1]`; an empty scan counts as done.
    pub fn fraction(&self) -> f64 {
        if self.total_batches == 0 {
            return 1.0;
        }
        self.completed_batches as f64 / self.total_batches as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fraction_tracks_batches() {
        let mut progress = ScanProgress::started(4);
        assert_eq!(progress.fraction(), 0.0);
        progress.completed_batches = 1;
        assert_eq!(progress.fraction(), 0.25);
        assert_eq!(ScanProgress::default().fraction(), 1.0);
    }
}
