/// Trust-On-First-Use certificate handling
///
/// Gemini servers overwhelmingly use self-signed certificates, so instead of a certificate
/// authority the helper remembers which certificate (or public key) it saw for each host and
/// address the first time, and refuses anything else afterwards unless retrust mode is on.
pub mod fingerprint;
pub mod store;

use async_trait::async_trait;

use crate::errors::HelperError;

pub use fingerprint::{FingerprintSource, Fingerprinter};
pub use store::{TofuStore, TrustRecord};

/// Decides whether a peer certificate may be used for a connection.
///
/// The transport calls this right after the TLS handshake and before any request bytes are
/// written; returning an error aborts the connection.
#[async_trait]
pub trait CertificateValidator: Send + Sync {
    async fn validate(
        &self,
        cert_der: &[u8],
        hostname: &str,
        address: &str,
    ) -> Result<(), HelperError>;
}
