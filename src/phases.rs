use crate::cancel::CauseToken;
use crate::progress::ProgressFn;
use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

/// The collaborators driven by the supervisor.
///
/// Implementations are expected to watch `cancel` and return promptly once it fires.
#[async_trait]
pub trait UploadPipeline: Send + Sync + 'static {
    type Group: Send + 'static;

    /// Read the remote inventory, reporting `(current, total)` through `on_progress`.
    async fn fetch_remote_inventory(&self, cancel: CauseToken, on_progress: ProgressFn) -> Result<()>;

    async fn fetch_remote_albums(&self, cancel: CauseToken) -> Result<()>;

    /// Start enumerating local sources. Groups are produced in the background.
    async fn browse(&self, cancel: CauseToken) -> Result<mpsc::Receiver<Self::Group>>;

    async fn upload_loop(&self, cancel: CauseToken, groups: mpsc::Receiver<Self::Group>) -> Result<()>;

    /// Flush pending work (albums, stacks) once the loop is done.
    async fn finishing(&self, cancel: CauseToken) -> Result<()>;
}

/// Run the three discovery phases concurrently and wait for all of them.
///
/// A failing phase cancels `cancel` with its error as soon as it returns, so the
/// earliest failure becomes the run's cause. Returns `None` when any phase
/// failed or the run was cancelled meanwhile; the browse channel is then dropped.
pub async fn run_phases<P: UploadPipeline>(
    pipeline: &P,
    on_progress: ProgressFn,
    cancel: &CauseToken,
) -> Option<mpsc::Receiver<P::Group>> {
    let inventory = async {
        let res = pipeline.fetch_remote_inventory(cancel.clone(), on_progress).await;
        settle("remote inventory", res, cancel)
    };
    let albums = async {
        let res = pipeline.fetch_remote_albums(cancel.clone()).await;
        settle("remote albums", res, cancel)
    };
    let browse = async {
        let res = pipeline.browse(cancel.clone()).await;
        settle("browse", res, cancel)
    };

    let (inventory, albums, groups) = tokio::join!(inventory, albums, browse);
    if inventory.is_none() || albums.is_none() || cancel.is_cancelled() {
        return None;
    }
    groups
}

fn settle<T>(phase: &'static str, res: Result<T>, cancel: &CauseToken) -> Option<T> {
    match res {
        Ok(v) => {
            debug!(phase, "phase done");
            Some(v)
        }
        Err(e) => {
            debug!(phase, error = %e, "phase failed");
            cancel.cancel_with(e);
            None
        }
    }
}
