use crate::types::{AssetCounters, EventCode, EventSummary};
use std::collections::BTreeMap;
use std::sync::RwLock;

/// Running per-kind tallies, written by the upload layer and read by the reporter.
///
/// Writers take the write lock for a single increment; `snapshot` copies every
/// tally under one read lock so a reader never sees a half-applied update.
#[derive(Debug, Default)]
pub struct EventCounters {
    tallies: RwLock<[EventSummary; EventCode::COUNT]>,
}

impl EventCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, code: EventCode, size: u64) {
        let mut guard = self.tallies.write().unwrap_or_else(|e| e.into_inner());
        let tally = &mut guard[code.index()];
        tally.count += 1;
        tally.size += size;
    }

    pub fn snapshot(&self) -> EventSnapshot {
        let guard = self.tallies.read().unwrap_or_else(|e| e.into_inner());
        EventSnapshot { tallies: *guard }
    }
}

/// Point-in-time copy of [`EventCounters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventSnapshot {
    tallies: [EventSummary; EventCode::COUNT],
}

impl EventSnapshot {
    pub fn get(&self, code: EventCode) -> EventSummary {
        self.tallies[code.index()]
    }

    pub fn count(&self, code: EventCode) -> u64 {
        self.get(code).count
    }

    pub fn size(&self, code: EventCode) -> u64 {
        self.get(code).size
    }

    fn sum(&self, codes: &[EventCode]) -> u64 {
        codes.iter().map(|&c| self.count(c)).sum()
    }

    fn sum_size(&self, codes: &[EventCode]) -> u64 {
        codes.iter().map(|&c| self.size(c)).sum()
    }

    pub fn assets_found(&self) -> u64 {
        self.sum(&[EventCode::DiscoveredImage, EventCode::DiscoveredVideo])
    }

    pub fn upload_errors(&self) -> u64 {
        self.sum(&[EventCode::UploadFailed, EventCode::ServerError])
    }

    pub fn uploaded(&self) -> u64 {
        self.sum(&[EventCode::UploadSuccess, EventCode::Upgraded])
    }

    /// Total of the error-class kinds (upload failed, server, file access, incomplete).
    pub fn errors(&self) -> u64 {
        self.sum(&EventCode::ERRORS)
    }

    pub fn asset_counters(&self) -> AssetCounters {
        let processed = self.uploaded();
        let discarded = self.sum(&[
            EventCode::DiscoveredDiscarded,
            EventCode::DiscoveredUnsupported,
            EventCode::ServerDuplicate,
            EventCode::ServerHasBetter,
        ]);
        let errors = self.errors();
        AssetCounters {
            pending: self
                .assets_found()
                .saturating_sub(processed)
                .saturating_sub(discarded)
                .saturating_sub(errors),
            processed,
            discarded,
            errors,
            asset_size: self.sum_size(&[EventCode::DiscoveredImage, EventCode::DiscoveredVideo]),
            processed_size: self.sum_size(&[EventCode::UploadSuccess, EventCode::Upgraded]),
        }
    }

    /// Event kinds with a non-zero count, keyed by their snake_case name.
    pub fn by_name(&self) -> BTreeMap<String, EventSummary> {
        EventCode::ALL
            .iter()
            .filter(|&&c| self.count(c) > 0)
            .map(|&c| (c.as_str().to_string(), self.get(c)))
            .collect()
    }
}
