//! End-to-end tests that run a local Gemini server over real TLS and check the Trust-On-First-Use
//! behaviour of the transport: first contact, repeat visits, a changed certificate, retrust mode
//! and the connect timeout.

use std::{collections::HashMap, sync::Arc, time::Duration};

use git_remote_gemini::{
    Fetcher, Fingerprinter, HelperConfig, HelperError, RefDiscovery, RemoteHelper, TlsTransport,
    TofuStore, protocol::transport::client_config,
};
use rcgen::generate_simple_self_signed;
use rustls::{Certificate, PrivateKey, ServerConfig};
use tempfile::TempDir;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt, BufReader},
    net::TcpListener,
};
use tokio_rustls::TlsAcceptor;
use url::Url;

const SHA1_MAIN: &str = "8ab686eafeb1f44702738c8b0f24f2567c36da6d";

/// Starts a Gemini server with a fresh self-signed certificate. Responses are keyed by request
/// path; unknown paths get `51 Not found`. Returns the port and the certificate DER.
async fn spawn_server(responses: HashMap<&'static str, Vec<u8>>) -> (u16, Vec<u8>) {
    let cert = generate_simple_self_signed(vec!["localhost".into()]).unwrap();
    let cert_der = cert.serialize_der().unwrap();
    let key_der = cert.serialize_private_key_der();
    let config = ServerConfig::builder()
        .with_safe_defaults()
        .with_no_client_auth()
        .with_single_cert(vec![Certificate(cert_der.clone())], PrivateKey(key_der))
        .unwrap();
    let acceptor = TlsAcceptor::from(Arc::new(config));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let responses = Arc::new(responses);

    tokio::spawn(async move {
        loop {
            let Ok((tcp, _)) = listener.accept().await else {
                return;
            };
            let acceptor = acceptor.clone();
            let responses = responses.clone();
            tokio::spawn(async move {
                let Ok(mut tls) = acceptor.accept(tcp).await else {
                    return;
                };
                let mut request = Vec::new();
                let mut byte = [0u8; 1];
                while !request.ends_with(b"\r\n") {
                    match tls.read(&mut byte).await {
                        Ok(1) => request.push(byte[0]),
                        _ => return,
                    }
                }
                let line = String::from_utf8_lossy(&request[..request.len() - 2]).to_string();
                let path = Url::parse(&line).map(|u| u.path().to_string()).unwrap_or_default();
                let response = responses
                    .get(path.as_str())
                    .cloned()
                    .unwrap_or_else(|| b"51 Not found\r\n".to_vec());
                let _ = tls.write_all(&response).await;
                let _ = tls.shutdown().await;
            });
        }
    });

    (port, cert_der)
}

fn repo_responses() -> HashMap<&'static str, Vec<u8>> {
    HashMap::from([
        (
            "/repo/info/refs",
            format!("20 text/plain\r\n{SHA1_MAIN}\trefs/heads/main\n").into_bytes(),
        ),
        (
            "/repo/HEAD",
            b"20 text/plain\r\nref: refs/heads/main\n".to_vec(),
        ),
    ])
}

async fn open_store(dir: &TempDir, retrust: bool) -> TofuStore {
    TofuStore::open(
        &dir.path().join("tofu.db"),
        Fingerprinter::new(true),
        retrust,
    )
    .await
    .unwrap()
}

async fn fetch_refs(store: &TofuStore, port: u16) -> Result<bytes::Bytes, HelperError> {
    let config = HelperConfig::default();
    let transport = TlsTransport::new(client_config(), store, &config);
    let fetcher = Fetcher::new(transport, &config);
    let url = Url::parse(&format!("gemini://127.0.0.1:{port}/repo/info/refs")).unwrap();
    fetcher.fetch(&url).await
}

#[tokio::test]
async fn test_first_contact_then_repeat_visit() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir, false).await;
    let (port, cert_der) = spawn_server(repo_responses()).await;

    let body = fetch_refs(&store, port).await.unwrap();
    assert_eq!(body, format!("{SHA1_MAIN}\trefs/heads/main\n").as_bytes());

    let records = store.records().await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].hostname, "127.0.0.1");
    assert_eq!(records[0].address, "127.0.0.1");
    assert_eq!(
        records[0].fingerprint,
        Fingerprinter::new(true).fingerprint(&cert_der)
    );

    fetch_refs(&store, port).await.unwrap();
    assert_eq!(store.records().await.unwrap().len(), 1);
    store.close().await.unwrap();
}

#[tokio::test]
async fn test_changed_certificate_is_rejected_until_retrust() {
    let dir = TempDir::new().unwrap();
    let (first_port, _) = spawn_server(repo_responses()).await;
    let (second_port, second_der) = spawn_server(repo_responses()).await;

    let store = open_store(&dir, false).await;
    fetch_refs(&store, first_port).await.unwrap();

    // same hostname and address, different key pair
    let err = fetch_refs(&store, second_port).await.unwrap_err();
    match &err {
        HelperError::UntrustedCertificate {
            hostname,
            fingerprint,
            ..
        } => {
            assert_eq!(hostname, "127.0.0.1");
            assert_eq!(
                fingerprint,
                &Fingerprinter::new(false).fingerprint(&second_der)
            );
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.diagnostic().starts_with("fatal: untrusted certificate"));
    assert_eq!(store.records().await.unwrap().len(), 1);
    store.close().await.unwrap();

    let store = open_store(&dir, true).await;
    fetch_refs(&store, second_port).await.unwrap();
    assert_eq!(store.records().await.unwrap().len(), 2);
    store.close().await.unwrap();

    // both certificates are trusted afterwards
    let store = open_store(&dir, false).await;
    fetch_refs(&store, first_port).await.unwrap();
    fetch_refs(&store, second_port).await.unwrap();
    assert_eq!(store.records().await.unwrap().len(), 2);
    store.close().await.unwrap();
}

#[tokio::test]
async fn test_list_over_tls() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir, false).await;
    let (port, _) = spawn_server(repo_responses()).await;

    let config = HelperConfig::default();
    let transport = TlsTransport::new(client_config(), &store, &config);
    let discovery = RefDiscovery::new(Fetcher::new(transport, &config));
    let url = Url::parse(&format!("gemini://127.0.0.1:{port}/repo")).unwrap();
    let helper = RemoteHelper::new(discovery, url);

    let mut output = Vec::new();
    helper
        .run(BufReader::new(&b"capabilities\nlist\n"[..]), &mut output)
        .await
        .unwrap();
    assert_eq!(
        String::from_utf8(output).unwrap(),
        format!("fetch\n\n:object-format sha1\n{SHA1_MAIN} refs/heads/main\n@refs/heads/main HEAD\n\n")
    );
    store.close().await.unwrap();
}

#[tokio::test]
async fn test_silent_server_times_out() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir, false).await;
    // the kernel completes the TCP handshake but nobody ever answers the TLS ClientHello
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let config = HelperConfig {
        connect_timeout: Duration::from_millis(200),
        ..HelperConfig::default()
    };
    let transport = TlsTransport::new(client_config(), &store, &config);
    let fetcher = Fetcher::new(transport, &config);
    let url = Url::parse(&format!("gemini://127.0.0.1:{port}/repo/HEAD")).unwrap();

    let err = fetcher.fetch(&url).await.unwrap_err();
    assert!(matches!(err, HelperError::ConnectTimeout { port: p, .. } if p == port));
    assert!(store.records().await.unwrap().is_empty());
    drop(listener);
    store.close().await.unwrap();
}
