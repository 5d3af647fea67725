// src/error.rs
use thiserror::Error;

/// Errors from the capture source. `Unavailable` is fatal: the frame loop
/// must not start without a camera. `Frame` drops the current iteration;
/// a long run of them stalls the loop out.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("camera unavailable: {0}")]
    Unavailable(String),
    #[error("frame capture failed: {0}")]
    Frame(String),
}

/// Errors from a perception backend. These are transient: the orchestrator
/// abandons the current iteration and retries on the next frame.
#[derive(Debug, Error)]
pub enum PerceptionError {
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("malformed geometry: {0}")]
    Malformed(String),
}

/// Errors from the score store. Logged and never allowed to block gameplay.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("no project directory available for the score store")]
    NoProjectDir,
}
