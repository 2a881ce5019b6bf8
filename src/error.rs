use thiserror::Error;

/// Failures raised by the supervisor itself, as opposed to its collaborators.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("interrupted")]
    Interrupted,

    #[error("Some errors have occurred. Look at the log file for details")]
    UploadErrors { errors: u64 },

    #[error("{}", join_messages(.0))]
    Joined(Vec<anyhow::Error>),

    #[error("{task} task panicked")]
    TaskPanicked { task: &'static str },
}

fn join_messages(errors: &[anyhow::Error]) -> String {
    errors
        .iter()
        .map(|e| format!("{e:#}"))
        .collect::<Vec<_>>()
        .join("\n")
}
