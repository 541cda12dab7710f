//! Certificate fingerprints used as trust identities.
//!
//! A fingerprint is the lowercase hex SHA-256 digest of either the whole DER certificate or,
//! when public-key pinning is enabled, the DER `SubjectPublicKeyInfo` embedded in it. Pinning
//! the key lets a server renew its certificate without tripping the trust check as long as it
//! keeps the same key pair.

use sha2::{Digest, Sha256};

/// Which bytes a fingerprint was computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FingerprintSource {
    PublicKey,
    WholeCertificate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fingerprinter {
    prefer_public_key: bool,
}

impl Fingerprinter {
    /// `prefer_public_key` only has an effect when the crate is built with the `x509` feature.
    pub fn new(prefer_public_key: bool) -> Self {
        Self {
            prefer_public_key: prefer_public_key && cfg!(feature = "x509"),
        }
    }

    /// Fingerprint used for trust decisions.
    pub fn fingerprint(&self, cert_der: &[u8]) -> String {
        self.fingerprint_with_source(cert_der).0
    }

    pub fn fingerprint_with_source(&self, cert_der: &[u8]) -> (String, FingerprintSource) {
        if self.prefer_public_key {
            match extract_spki_der(cert_der) {
                Some(spki) => return (sha256_hex(spki), FingerprintSource::PublicKey),
                None => {
                    tracing::warn!("could not parse peer certificate, fingerprinting it whole");
                }
            }
        }
        (
            self.certificate_fingerprint(cert_der),
            FingerprintSource::WholeCertificate,
        )
    }

    /// Fingerprint of the whole certificate, regardless of the pinning mode. This is what users
    /// compare against fingerprints obtained out of band.
    pub fn certificate_fingerprint(&self, cert_der: &[u8]) -> String {
        sha256_hex(cert_der)
    }
}

impl Default for Fingerprinter {
    fn default() -> Self {
        Self::new(true)
    }
}

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

#[cfg(feature = "x509")]
fn extract_spki_der(cert_der: &[u8]) -> Option<&[u8]> {
    use x509_parser::prelude::*;

    let (_, cert) = X509Certificate::from_der(cert_der).ok()?;
    // `raw` is the complete DER encoding of the SubjectPublicKeyInfo
    Some(cert.tbs_certificate.subject_pki.raw)
}

#[cfg(not(feature = "x509"))]
fn extract_spki_der(_cert_der: &[u8]) -> Option<&[u8]> {
    None
}
