use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Classification of a single file-processing outcome.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EventCode {
    DiscoveredImage,
    DiscoveredVideo,
    DiscoveredSidecar,
    DiscoveredDiscarded,
    DiscoveredUnsupported,
    UploadSuccess,
    Upgraded,
    ServerDuplicate,
    ServerHasBetter,
    UploadFailed,
    ServerError,
    FileAccessError,
    Incomplete,
}

impl EventCode {
    pub const COUNT: usize = 13;

    pub const ALL: [EventCode; Self::COUNT] = [
        EventCode::DiscoveredImage,
        EventCode::DiscoveredVideo,
        EventCode::DiscoveredSidecar,
        EventCode::DiscoveredDiscarded,
        EventCode::DiscoveredUnsupported,
        EventCode::UploadSuccess,
        EventCode::Upgraded,
        EventCode::ServerDuplicate,
        EventCode::ServerHasBetter,
        EventCode::UploadFailed,
        EventCode::ServerError,
        EventCode::FileAccessError,
        EventCode::Incomplete,
    ];

    /// Kinds that make a run end with an error status.
    pub const ERRORS: [EventCode; 4] = [
        EventCode::UploadFailed,
        EventCode::ServerError,
        EventCode::FileAccessError,
        EventCode::Incomplete,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventCode::DiscoveredImage => "discovered_image",
            EventCode::DiscoveredVideo => "discovered_video",
            EventCode::DiscoveredSidecar => "discovered_sidecar",
            EventCode::DiscoveredDiscarded => "discovered_discarded",
            EventCode::DiscoveredUnsupported => "discovered_unsupported",
            EventCode::UploadSuccess => "upload_success",
            EventCode::Upgraded => "upgraded",
            EventCode::ServerDuplicate => "server_duplicate",
            EventCode::ServerHasBetter => "server_has_better",
            EventCode::UploadFailed => "upload_failed",
            EventCode::ServerError => "server_error",
            EventCode::FileAccessError => "file_access_error",
            EventCode::Incomplete => "incomplete",
        }
    }

    pub fn is_error(self) -> bool {
        Self::ERRORS.contains(&self)
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for EventCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Count and byte total for one event kind.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventSummary {
    pub count: u64,
    pub size: u64,
}

/// Per-asset rollup derived from the event tallies.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssetCounters {
    pub pending: u64,
    pub processed: u64,
    pub discarded: u64,
    pub errors: u64,
    pub asset_size: u64,
    pub processed_size: u64,
}

/// One structured progress line.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    #[serde(rename = "type")]
    pub kind: String,
    pub timestamp: String,
    pub remote_read_pct: u32,
    pub assets_found: u64,
    pub upload_errors: u64,
    pub uploaded: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    Error,
}

/// Terminal record of a run.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FinalSummary {
    #[serde(rename = "type")]
    pub kind: String,
    pub status: RunStatus,
    pub exit_code: i32,
    pub counters: AssetCounters,
    pub events: BTreeMap<String, EventSummary>,
    pub duration_seconds: f64,
    pub timestamp: String,
}
