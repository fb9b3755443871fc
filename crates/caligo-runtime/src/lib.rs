#![deny(missing_docs)]
//! Caligo transmission runtime.
//!
//! Tracks running transfers, executes them with cancellation and progress,
//! and exposes the download/upload/abort entry points.

/// Transfer execution and result aggregation.
pub mod executor;
/// Download, upload and abort entry points.
pub mod manager;
/// Registry of running transfer tasks.
pub mod registry;

pub use executor::{ItemOutcome, TransferExecutor, TransferOptions, TransferReport, TransferResult};
pub use manager::{AbortResult, DownloadRequest, DownloadTarget, TransmissionManager, UploadRequest};
pub use registry::{TaskId, TaskRegistry, TaskStatus, TransferTask};
