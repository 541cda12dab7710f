//! git-remote-gemini: a git remote helper that discovers repository refs over the Gemini protocol.
//!
//! Goals
//! - Let `git clone gemini://host/repo` enumerate refs from a capsule serving a dumb git layout.
//! - Trust servers without a certificate authority, using a persistent Trust-On-First-Use store.
//! - Follow redirects and slow-down responses safely (cycle, depth and backoff bounded).
//!
//! Modules
//! - `tofu`: certificate fingerprints and the SQLite-backed trust store.
//! - `protocol`: TLS transport, response parsing, the redirect/backoff driver, ref discovery and
//!   the remote-helper command loop.
//! - `hash`: object format inference.
//! - `session`: one helper process, from argument parsing to closing the trust store.
//! - `config`: environment driven configuration.
//! - `errors`: unified error type.
//!
//! Object transfer (`fetch`) and push are not implemented; `fetch` is advertised so git will
//! ask for the ref list, and fails explicitly when invoked.

pub mod config;
pub mod errors;
pub mod hash;
pub mod protocol;
pub mod session;
pub mod tofu;

pub use config::HelperConfig;
pub use errors::HelperError;
pub use protocol::{Fetcher, GeminiTransport, RefDiscovery, RemoteHelper, TlsTransport};
pub use tofu::{CertificateValidator, Fingerprinter, TofuStore};
