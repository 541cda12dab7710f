//! TLS transport for single Gemini requests.
//!
//! Certificate chains are deliberately not verified by rustls: Gemini capsules are mostly
//! self-signed, so trust is decided by a [`CertificateValidator`] once the handshake is done and
//! before the request line is written.

use std::{io, net::SocketAddr, sync::Arc, time::Duration};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use rustls::{
    Certificate, ClientConfig, Error as TlsError, ServerName,
    client::{ServerCertVerified, ServerCertVerifier},
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    time::timeout,
};
use tokio_rustls::{TlsConnector, client::TlsStream};
use url::Url;

use super::types::CRLF;
use crate::{config::HelperConfig, errors::HelperError, tofu::CertificateValidator};

/// Sends one request and returns the raw, unparsed response.
#[async_trait]
pub trait GeminiTransport: Send + Sync {
    async fn request(&self, url: &Url) -> Result<Bytes, HelperError>;
}

/// Accepts every certificate chain; trust is decided after the handshake.
pub struct AcceptAnyCertificate;

impl ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &Certificate,
        _intermediates: &[Certificate],
        _server_name: &ServerName,
        _scts: &mut dyn Iterator<Item = &[u8]>,
        _ocsp_response: &[u8],
        _now: std::time::SystemTime,
    ) -> Result<ServerCertVerified, TlsError> {
        Ok(ServerCertVerified::assertion())
    }
}

/// Builds the client TLS configuration shared by every connection of the process.
pub fn client_config() -> Arc<ClientConfig> {
    let config = ClientConfig::builder()
        .with_safe_defaults()
        .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate))
        .with_no_client_auth();
    Arc::new(config)
}

pub struct TlsTransport<'a, V: CertificateValidator> {
    tls: Arc<ClientConfig>,
    validator: &'a V,
    connect_timeout: Duration,
    default_port: u16,
}

impl<'a, V: CertificateValidator> TlsTransport<'a, V> {
    pub fn new(tls: Arc<ClientConfig>, validator: &'a V, config: &HelperConfig) -> Self {
        Self {
            tls,
            validator,
            connect_timeout: config.connect_timeout,
            default_port: config.default_port,
        }
    }

    async fn connect(
        &self,
        host: &str,
        port: u16,
    ) -> Result<(TlsStream<TcpStream>, SocketAddr), HelperError> {
        let server_name = ServerName::try_from(host)
            .map_err(|e| HelperError::InvalidResponse(format!("invalid server name {host}: {e}")))?;
        let connector = TlsConnector::from(self.tls.clone());
        let handshake = async {
            let tcp = TcpStream::connect((host, port)).await?;
            let peer = tcp.peer_addr()?;
            let stream = connector.connect(server_name, tcp).await?;
            Ok::<_, io::Error>((stream, peer))
        };
        match timeout(self.connect_timeout, handshake).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(HelperError::ConnectTimeout {
                host: host.to_string(),
                port,
            }),
        }
    }
}

#[async_trait]
impl<V: CertificateValidator> GeminiTransport for TlsTransport<'_, V> {
    async fn request(&self, url: &Url) -> Result<Bytes, HelperError> {
        let host = url
            .host_str()
            .ok_or_else(|| HelperError::InvalidResponse(format!("no host in URL {url}")))?;
        // IPv6 literals come back bracketed from the URL
        let host = host.trim_start_matches('[').trim_end_matches(']');
        let port = url.port().unwrap_or(self.default_port);

        let (mut stream, peer) = self.connect(host, port).await?;
        let cert = {
            let (_, conn) = stream.get_ref();
            conn.peer_certificates()
                .and_then(|chain| chain.first())
                .map(|cert| cert.0.clone())
                .ok_or_else(|| {
                    HelperError::InvalidResponse(format!("{host} presented no certificate"))
                })?
        };
        self.validator
            .validate(&cert, host, &peer.ip().to_string())
            .await?;

        tracing::debug!("request {} via {}", url, peer);
        let mut request = Vec::with_capacity(url.as_str().len() + CRLF.len());
        request.extend_from_slice(url.as_str().as_bytes());
        request.extend_from_slice(CRLF);
        stream.write_all(&request).await?;
        stream.flush().await?;

        read_to_close(&mut stream).await
    }
}

/// Reads until the server closes the connection. Many Gemini servers drop the socket without a
/// TLS close_notify; that is treated as a normal end of response.
async fn read_to_close(stream: &mut TlsStream<TcpStream>) -> Result<Bytes, HelperError> {
    let mut buf = BytesMut::with_capacity(8 * 1024);
    loop {
        match stream.read_buf(&mut buf).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(buf.freeze())
}
