/// Gemini Protocol Module
///
/// This module provides the client side of the Gemini request/response protocol as used to
/// discover git refs, and the git remote-helper loop built on top of it. The transport is
/// abstracted behind [`GeminiTransport`] so the redirect/backoff driver and the helper can run
/// over TLS or over a scripted test transport.
pub mod fetch;
pub mod helper;
pub mod refs;
pub mod transport;
pub mod types;

// Re-export main interfaces
pub use fetch::Fetcher;
pub use helper::{Command, RemoteHelper};
pub use refs::{RefDiscovery, RefMap};
pub use transport::{GeminiTransport, TlsTransport};
pub use types::*;
