use crate::cancel::CauseToken;
use crate::events::EventCounters;
use crate::phases::UploadPipeline;
use crate::progress::ProgressFn;
use crate::types::EventCode;
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

const IMAGE_EXT: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "heic", "heif", "webp", "tif", "tiff", "dng", "cr2", "cr3", "nef",
    "arw", "raf", "orf", "rw2",
];
const VIDEO_EXT: &[&str] = &["mp4", "mov", "m4v", "avi", "mkv", "3gp", "mts", "m2ts", "webm"];
const SIDECAR_EXT: &[&str] = &["xmp", "json"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Image,
    Video,
    Sidecar,
    Unsupported,
    Hidden,
}

impl FileKind {
    fn event(self) -> EventCode {
        match self {
            FileKind::Image => EventCode::DiscoveredImage,
            FileKind::Video => EventCode::DiscoveredVideo,
            FileKind::Sidecar => EventCode::DiscoveredSidecar,
            FileKind::Unsupported => EventCode::DiscoveredUnsupported,
            FileKind::Hidden => EventCode::DiscoveredDiscarded,
        }
    }

    fn is_media(self) -> bool {
        matches!(self, FileKind::Image | FileKind::Video)
    }
}

pub fn classify(path: &Path) -> FileKind {
    let hidden = path
        .file_name()
        .and_then(|n| n.to_str())
        .map_or(true, |n| n.starts_with('.'));
    if hidden {
        return FileKind::Hidden;
    }
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if IMAGE_EXT.contains(&ext.as_str()) {
        FileKind::Image
    } else if VIDEO_EXT.contains(&ext.as_str()) {
        FileKind::Video
    } else if SIDECAR_EXT.contains(&ext.as_str()) {
        FileKind::Sidecar
    } else {
        FileKind::Unsupported
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    pub path: PathBuf,
    pub kind: FileKind,
}

/// Files of one directory sharing a file stem (e.g. `IMG_1.jpg` + `IMG_1.xmp`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalGroup {
    pub key: String,
    pub files: Vec<LocalFile>,
}

/// Pipeline that walks a local directory and "uploads" by stat-ing each asset.
/// Nothing is sent anywhere; there is no remote inventory nor albums.
pub struct DryRunPipeline {
    root: PathBuf,
    events: Arc<EventCounters>,
    concurrency: usize,
    groups_done: AtomicU64,
}

impl DryRunPipeline {
    pub fn new(root: impl Into<PathBuf>, events: Arc<EventCounters>, concurrency: usize) -> Self {
        Self {
            root: root.into(),
            events,
            concurrency: concurrency.max(1),
            groups_done: AtomicU64::new(0),
        }
    }

    pub fn groups_done(&self) -> u64 {
        self.groups_done.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl UploadPipeline for DryRunPipeline {
    type Group = LocalGroup;

    async fn fetch_remote_inventory(&self, _cancel: CauseToken, on_progress: ProgressFn) -> Result<()> {
        on_progress(0, 0);
        Ok(())
    }

    async fn fetch_remote_albums(&self, _cancel: CauseToken) -> Result<()> {
        Ok(())
    }

    async fn browse(&self, cancel: CauseToken) -> Result<mpsc::Receiver<LocalGroup>> {
        let meta = tokio::fs::metadata(&self.root)
            .await
            .with_context(|| format!("cannot read source: {}", self.root.display()))?;
        if !meta.is_dir() {
            bail!("source is not a directory: {}", self.root.display());
        }

        let (tx, rx) = mpsc::channel(64);
        let held = tx.clone();
        let walker = {
            let root = self.root.clone();
            let events = self.events.clone();
            let cancel = cancel.clone();
            tokio::task::spawn_blocking(move || walk(&root, &events, &cancel, &tx))
        };
        tokio::spawn(watch_walker(walker, held, self.events.clone(), cancel));
        Ok(rx)
    }

    async fn upload_loop(&self, cancel: CauseToken, mut groups: mpsc::Receiver<LocalGroup>) -> Result<()> {
        let sem = Arc::new(Semaphore::new(self.concurrency));
        let mut set = JoinSet::new();

        loop {
            let group = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                g = groups.recv() => match g {
                    Some(g) => g,
                    None => break,
                },
            };
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                p = sem.clone().acquire_owned() => p.context("upload semaphore closed")?,
            };
            let events = self.events.clone();
            let cancel = cancel.clone();
            set.spawn(async move {
                let _permit = permit; // keep permit until the group is done
                upload_group(&group, &events, &cancel).await
            });
        }

        while let Some(res) = set.join_next().await {
            settle_group(res, &self.events, &self.groups_done);
        }
        Ok(())
    }

    async fn finishing(&self, _cancel: CauseToken) -> Result<()> {
        info!(groups = self.groups_done(), "dry run finished, nothing was sent");
        Ok(())
    }
}

fn settle_group(res: Result<bool, JoinError>, events: &EventCounters, done: &AtomicU64) {
    match res {
        Ok(true) => {
            done.fetch_add(1, Ordering::Relaxed);
        }
        Ok(false) => {}
        Err(e) => {
            warn!(error = %e, "upload task failed");
            events.record(EventCode::Incomplete, 0);
        }
    }
}

/// Wait for the walker thread. `held` keeps the group channel open until a
/// walker failure has been recorded, so the upload loop cannot finish first.
async fn watch_walker(
    walker: JoinHandle<()>,
    held: mpsc::Sender<LocalGroup>,
    events: Arc<EventCounters>,
    cancel: CauseToken,
) {
    if let Err(e) = walker.await {
        warn!(error = %e, "local browse failed");
        events.record(EventCode::Incomplete, 0);
        cancel.cancel_with(anyhow!("local browse failed: {e}"));
    }
    drop(held);
}

/// Returns `true` when every media file of the group was handled.
async fn upload_group(group: &LocalGroup, events: &EventCounters, cancel: &CauseToken) -> bool {
    for file in group.files.iter().filter(|f| f.kind.is_media()) {
        if cancel.is_cancelled() {
            return false;
        }
        match tokio::fs::metadata(&file.path).await {
            Ok(m) => {
                debug!(file = %file.path.display(), size = m.len(), "uploaded (dry run)");
                events.record(EventCode::UploadSuccess, m.len());
            }
            Err(e) => {
                warn!(file = %file.path.display(), error = %e, "cannot access file");
                events.record(EventCode::FileAccessError, 0);
            }
        }
    }
    true
}

fn walk(root: &Path, events: &EventCounters, cancel: &CauseToken, tx: &mpsc::Sender<LocalGroup>) {
    let dirs = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_type().is_dir() || classify(e.path()) != FileKind::Hidden);

    for entry in dirs {
        if cancel.is_cancelled() {
            return;
        }
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "cannot browse entry");
                events.record(EventCode::FileAccessError, 0);
                continue;
            }
        };
        if !entry.file_type().is_dir() {
            continue;
        }
        for group in group_dir(entry.path(), events) {
            if tx.blocking_send(group).is_err() {
                return;
            }
        }
    }
}

/// Classify the files of `dir` (not recursive) and group media with their sidecars by stem.
pub fn group_dir(dir: &Path, events: &EventCounters) -> Vec<LocalGroup> {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "cannot read directory");
            events.record(EventCode::FileAccessError, 0);
            return Vec::new();
        }
    };

    let mut by_stem: BTreeMap<String, Vec<LocalFile>> = BTreeMap::new();
    for entry in entries.flatten() {
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        let path = entry.path();
        let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
        let kind = classify(&path);
        events.record(kind.event(), size);
        if matches!(kind, FileKind::Hidden | FileKind::Unsupported) {
            continue;
        }
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        by_stem.entry(stem).or_default().push(LocalFile { path, kind });
    }

    by_stem
        .into_iter()
        .filter(|(_, files)| files.iter().any(|f| f.kind.is_media()))
        .map(|(stem, mut files)| {
            files.sort_by(|a, b| a.path.cmp(&b.path));
            LocalGroup {
                key: dir.join(&stem).display().to_string(),
                files,
            }
        })
        .collect()
}
