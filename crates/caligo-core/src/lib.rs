#![deny(missing_docs)]
//! Caligo transmission core.
//!
//! Transport-agnostic pieces of the transmission manager: media resolution,
//! progress reporting, upload routing and the collaborator contracts.

/// Collaborator contracts (chat client, responder, local storage).
pub mod client;
/// Configuration management.
pub mod config;
/// Error types surfaced to callers.
pub mod error;
/// Media kinds, items and the resolver.
pub mod media;
/// Progress computation and throttled rendering.
pub mod progress;
/// Request and message identity types.
pub mod request;
/// Upload representation routing.
pub mod routing;
/// Utility functions.
pub mod utils;

#[cfg(test)]
pub mod testing;

pub use client::{ChatClient, FsStorage, LocalStorage, Responder};
pub use error::{ClientError, ItemFailure, TransmissionError};
pub use media::{MediaItem, MediaKind, MediaResolver, RemoteMedia, RemoteMessage};
pub use progress::{Direction, ProgressReporter, ProgressState, RenderedUpdate};
pub use request::{ChatRef, MessageRef, RequestId};
pub use routing::UploadKind;
