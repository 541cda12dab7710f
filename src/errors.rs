//! Error types for the git-remote-gemini crate.
//!
//! This module defines a unified error enumeration used across certificate trust, the Gemini
//! request/response cycle, ref discovery, and the remote-helper command loop. It integrates
//! with `thiserror` to provide rich `Display` implementations and error source chaining where
//! applicable.
//!
//! Notes:
//! - Every variant ends the helper process. Gemini status `44` is retried and only surfaces,
//!   as `ServerUnavailable`, once the backoff cap is reached.
//! - Protocol-level errors (a failing server status, an unknown command) are reported to git
//!   with an `error:` prefix, everything else with `fatal:`.

use thiserror::Error;

#[derive(Error, Debug)]
/// Unified error enumeration for the remote helper.
///
/// - Used across the trust store, transport, fetch driver, ref discovery and dispatcher.
/// - Implements `std::error::Error` via `thiserror`.
pub enum HelperError {
    /// The peer presented a certificate that does not match any stored trust record.
    #[error(
        "untrusted certificate for {hostname} ({address}); certificate fingerprint is sha256:{fingerprint}. \
         Verify it out of band, then set GIT_REMOTE_GEMINI_RETRUST=1 to trust it"
    )]
    UntrustedCertificate {
        hostname: String,
        address: String,
        fingerprint: String,
    },

    /// A redirect pointed back to a URL already visited in this request.
    #[error("redirect loop detected at {0}")]
    RedirectLoop(String),

    /// The redirect chain grew past the allowed number of hops.
    #[error("too many redirects while fetching {0}")]
    TooManyRedirects(String),

    /// The URL does not use the `gemini` scheme.
    #[error("unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    /// Connecting and completing the TLS handshake took too long.
    #[error("timed out connecting to {host}:{port}")]
    ConnectTimeout { host: String, port: u16 },

    /// The server response is structurally invalid.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The server answered with a 4x or 5x status; carries the literal status line.
    #[error("{0}")]
    ServerError(String),

    /// The server kept asking to slow down until the backoff limit was reached.
    #[error("server unavailable: gave up on {0} after backing off")]
    ServerUnavailable(String),

    /// An input line from git could not be parsed as a command.
    #[error("malformed command: {0:?}")]
    MalformedCommand(String),

    /// git sent a command this helper does not know.
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// A resource body or status line was not valid UTF-8.
    #[error("could not decode {0} as UTF-8")]
    DecodeFailure(String),

    /// The ref listing or the HEAD pointer is not in the expected format.
    #[error("malformed ref data: {0}")]
    RefFormatError(String),

    /// Object transfer is not implemented by this helper.
    #[error("fetching objects over gemini is not supported yet")]
    FetchUnsupported,

    /// A required command line argument is missing.
    #[error("missing argument: {0}")]
    MissingArgument(String),

    /// The URL could not be parsed.
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// I/O error from the socket, stdin/stdout or the filesystem.
    #[error("IO Error: {0}")]
    IOError(#[from] std::io::Error),

    /// Error reported by the trust store database.
    #[error("trust store error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

impl HelperError {
    /// Whether this error is reported as a protocol-level `error:` rather than a `fatal:`.
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            HelperError::ServerError(_) | HelperError::UnknownCommand(_)
        )
    }

    /// One-line diagnostic as printed on stderr.
    pub fn diagnostic(&self) -> String {
        if self.is_protocol_error() {
            format!("error: {self}")
        } else {
            format!("fatal: {self}")
        }
    }

    /// Process exit status for this error.
    pub fn exit_code(&self) -> u8 {
        if self.is_protocol_error() { 1 } else { 128 }
    }
}
