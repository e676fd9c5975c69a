//! Sample tracking.
//!
//! Samples are append-only records. Ids are sequential (`S0001`, `S0002`, ...)
//! and only the status of a sample may change after it is recorded.

use chrono::{DateTime, Local};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{AppResult, WorkcellError};

/// Locations a manually added sample may be placed in.
pub const SAMPLE_LOCATIONS: [&str; 4] = ["Incubator A", "Storage -80C", "Workcell 1", "Reader Station"];

/// Kind of material a sample record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleKind {
    /// Chinese hamster ovary clone.
    ChoClone,
    /// Culture media sample.
    MediaSample,
    /// Assay plate.
    AssayPlate,
    /// Quality-control sample.
    QcSample,
}

impl SampleKind {
    /// Every kind, in display order.
    pub const ALL: [SampleKind; 4] = [
        SampleKind::ChoClone,
        SampleKind::MediaSample,
        SampleKind::AssayPlate,
        SampleKind::QcSample,
    ];
}

impl fmt::Display for SampleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SampleKind::ChoClone => "CHO Clone",
            SampleKind::MediaSample => "Media Sample",
            SampleKind::AssayPlate => "Assay Plate",
            SampleKind::QcSample => "QC Sample",
        };
        f.pad(s)
    }
}

/// A tracked sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Sequential id, e.g. `S0007`.
    pub id: String,
    /// Material kind.
    pub kind: SampleKind,
    /// Where the sample is.
    pub location: String,
    /// Free-form status.
    pub status: String,
    /// Creation time.
    pub timestamp: DateTime<Local>,
}

/// Append-only list of samples for the session.
#[derive(Debug, Clone, Default)]
pub struct SampleTracker {
    samples: Vec<Sample>,
}

impl SampleTracker {
    /// Empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sample and return a reference to it.
    pub fn record(
        &mut self,
        kind: SampleKind,
        location: impl Into<String>,
        status: impl Into<String>,
    ) -> &Sample {
        let id = format!("S{:04}", self.samples.len() + 1);
        self.samples.push(Sample {
            id,
            kind,
            location: location.into(),
            status: status.into(),
            timestamp: Local::now(),
        });
        &self.samples[self.samples.len() - 1]
    }

    /// Append a manually added test sample with a random kind and location.
    pub fn record_random<R: Rng + ?Sized>(&mut self, rng: &mut R) -> &Sample {
        let kind = *SampleKind::ALL.choose(rng).unwrap_or(&SampleKind::QcSample);
        let location = *SAMPLE_LOCATIONS.choose(rng).unwrap_or(&"Workcell 1");
        self.record(kind, location, "Active")
    }

    /// Change the status of an existing sample.
    pub fn set_status(&mut self, id: &str, status: impl Into<String>) -> AppResult<()> {
        let sample = self
            .samples
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| WorkcellError::UnknownSample(id.to_string()))?;
        sample.status = status.into();
        Ok(())
    }

    /// All samples in creation order.
    pub fn all(&self) -> &[Sample] {
        &self.samples
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True when nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_sequential_ids() {
        let mut tracker = SampleTracker::new();
        tracker.record(SampleKind::AssayPlate, "Centrifuge", "Centrifuging samples");
        let second = tracker.record(SampleKind::QcSample, "Workcell 1", "Active");
        assert_eq!(second.id, "S0002");
        assert_eq!(tracker.all()[0].id, "S0001");
    }

    #[test]
    fn test_random_sample_uses_known_values() {
        let mut tracker = SampleTracker::new();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            tracker.record_random(&mut rng);
        }
        for sample in tracker.all() {
            assert!(SAMPLE_LOCATIONS.contains(&sample.location.as_str()));
            assert_eq!(sample.status, "Active");
        }
        assert_eq!(tracker.len(), 20);
    }

    #[test]
    fn test_only_status_changes() {
        let mut tracker = SampleTracker::new();
        let original = tracker.record(SampleKind::ChoClone, "Incubator A", "Active").clone();

        tracker.set_status("S0001", "Archived").unwrap();
        let updated = &tracker.all()[0];
        assert_eq!(updated.status, "Archived");
        assert_eq!(updated.location, original.location);
        assert_eq!(updated.timestamp, original.timestamp);
    }

    #[test]
    fn test_unknown_sample_status() {
        let mut tracker = SampleTracker::new();
        let err = tracker.set_status("S0042", "Lost").unwrap_err();
        assert!(matches!(err, WorkcellError::UnknownSample(_)));
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(SampleKind::ChoClone.to_string(), "CHO Clone");
        assert_eq!(SampleKind::QcSample.to_string(), "QC Sample");
    }
}
