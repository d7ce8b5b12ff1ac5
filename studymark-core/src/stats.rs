use crate::progress::ProgressStore;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Completion figures for a set of links.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub completed: usize,
    pub total: usize,
    pub percentage: u8,
}

impl ProgressSnapshot {
    pub fn new(completed: usize, total: usize) -> Self {
        Self {
            completed,
            total,
            percentage: percentage(completed, total),
        }
    }

    pub fn ratio(&self) -> f64 {
        f64::from(self.percentage) / 100.0
    }
}

impl fmt::Display for ProgressSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}% ({}/{})", self.percentage, self.completed, self.total)
    }
}

/// `completed / total` as a whole percentage, rounded half up.
///
/// Zero when `total` is zero, never above 100.
pub fn percentage(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let completed = completed.min(total) as u128;
    let total = total as u128;
    ((completed * 200 + total) / (total * 2)) as u8
}

/// Computes progress figures from a [`ProgressStore`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ProgressAggregator {
    manifest_total: Option<usize>,
}

impl ProgressAggregator {
    pub fn new(manifest_total: Option<usize>) -> Self {
        Self { manifest_total }
    }

    pub fn set_manifest_total(&mut self, total: Option<usize>) {
        debug!("Set total links from manifest: {:?}", total);
        self.manifest_total = total;
    }

    pub fn manifest_total(&self) -> Option<usize> {
        self.manifest_total
    }

    /// Progress over every link. The manifest total, when known, wins over
    /// the number of links discovered so far.
    pub fn global_stats(&self, store: &ProgressStore) -> ProgressSnapshot {
        let total = self.manifest_total.unwrap_or_else(|| store.registry().len());
        let snapshot = ProgressSnapshot::new(store.completed_count(), total);
        debug!(
            "Global progress: {} {}",
            snapshot,
            if self.manifest_total.is_some() {
                "[using manifest total]"
            } else {
                "[using discovered links]"
            }
        );
        snapshot
    }

    /// Progress over the registered links of one document.
    pub fn file_stats(&self, store: &ProgressStore, document_path: &str) -> ProgressSnapshot {
        let (completed, total) = store
            .registry()
            .iter()
            .filter(|(_, record)| record.document_path == document_path)
            .fold((0, 0), |(completed, total), (id, _)| {
                let done = usize::from(store.is_completed(id));
                (completed + done, total + 1)
            });
        ProgressSnapshot::new(completed, total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage_rounds_half_up() {
        assert_eq!(percentage(4, 10), 40);
        assert_eq!(percentage(1, 3), 33);
        assert_eq!(percentage(2, 3), 67);
        assert_eq!(percentage(1, 8), 13); // 12.5
        assert_eq!(percentage(1, 200), 1); // 0.5
        assert_eq!(percentage(0, 5), 0);
        assert_eq!(percentage(5, 5), 100);
    }

    #[test]
    fn test_percentage_edges() {
        assert_eq!(percentage(0, 0), 0);
        assert_eq!(percentage(3, 0), 0);
        assert_eq!(percentage(12, 10), 100);
    }

    #[test]
    fn test_snapshot_display() {
        assert_eq!(ProgressSnapshot::new(4, 10).to_string(), "40% (4/10)");
    }
}
