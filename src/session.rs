//! One helper process from git's point of view: `<remote-name> <url>` arguments, a trust store
//! that lives exactly as long as the session, and the command loop in between.

use tokio::io::{AsyncBufRead, AsyncWrite};
use url::Url;

use crate::{
    config::HelperConfig,
    errors::HelperError,
    protocol::{
        fetch::Fetcher,
        helper::RemoteHelper,
        refs::RefDiscovery,
        transport::{TlsTransport, client_config},
    },
    tofu::{fingerprint::Fingerprinter, store::TofuStore},
};

/// Runs a session for the process arguments `args` (`args[0]` is the program name).
///
/// The trust store is closed before returning, whether the session succeeded or not.
pub async fn run<R, W>(
    args: &[String],
    config: &HelperConfig,
    input: R,
    output: &mut W,
) -> Result<(), HelperError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let remote = args
        .get(1)
        .ok_or_else(|| HelperError::MissingArgument("remote name".to_string()))?;
    let url = args
        .get(2)
        .ok_or_else(|| HelperError::MissingArgument("URL".to_string()))?;
    let url = Url::parse(url)?;
    tracing::debug!("remote {} -> {}", remote, url);

    let store = TofuStore::open(
        &config.trust_store_path,
        Fingerprinter::new(config.prefer_public_key),
        config.retrust,
    )
    .await?;

    let served = serve(config, &store, url, input, output).await;
    let closed = store.close().await;
    served.and(closed)
}

async fn serve<R, W>(
    config: &HelperConfig,
    store: &TofuStore,
    url: Url,
    input: R,
    output: &mut W,
) -> Result<(), HelperError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let transport = TlsTransport::new(client_config(), store, config);
    let discovery = RefDiscovery::new(Fetcher::new(transport, config));
    RemoteHelper::new(discovery, url).run(input, output).await
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tempfile::TempDir;
    use tokio::{io::BufReader, net::TcpListener};

    use super::run;
    use crate::{
        config::HelperConfig,
        errors::HelperError,
        tofu::{fingerprint::Fingerprinter, store::TofuStore},
    };

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|a| a.to_string()).collect()
    }

    fn config_in(dir: &TempDir) -> HelperConfig {
        HelperConfig {
            trust_store_path: dir.path().join("tofu.db"),
            connect_timeout: Duration::from_millis(200),
            ..HelperConfig::default()
        }
    }

    #[tokio::test]
    async fn test_missing_url_is_fatal() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        let mut output = Vec::new();

        let err = run(
            &args(&["git-remote-gemini", "origin"]),
            &config,
            BufReader::new(&b"capabilities\n"[..]),
            &mut output,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, HelperError::MissingArgument(ref a) if a == "URL"));
        assert_eq!(err.exit_code(), 128);
        assert!(output.is_empty());
        // argument errors come before the store is touched
        assert!(!config.trust_store_path.exists());
    }

    #[tokio::test]
    async fn test_missing_remote_name_is_fatal() {
        let dir = TempDir::new().unwrap();
        let mut output = Vec::new();
        let err = run(
            &args(&["git-remote-gemini"]),
            &config_in(&dir),
            BufReader::new(&b""[..]),
            &mut output,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, HelperError::MissingArgument(a) if a == "remote name"));
    }

    #[tokio::test]
    async fn test_store_is_closed_and_unchanged_after_failed_list() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);

        let store = TofuStore::open(&config.trust_store_path, Fingerprinter::new(false), false)
            .await
            .unwrap();
        store
            .check(b"cert-one", "gemini.example", "192.0.2.10")
            .await
            .unwrap();
        let before = store.records().await.unwrap();
        store.close().await.unwrap();

        // accepts TCP but never answers the TLS handshake
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let url = format!("gemini://127.0.0.1:{port}/repo");

        let mut output = Vec::new();
        let err = run(
            &args(&["git-remote-gemini", "origin", url.as_str()]),
            &config,
            BufReader::new(&b"capabilities\nlist\n"[..]),
            &mut output,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, HelperError::ConnectTimeout { .. }));
        assert_eq!(String::from_utf8(output).unwrap(), "fetch\n\n");
        drop(listener);

        let store = TofuStore::open(&config.trust_store_path, Fingerprinter::new(false), false)
            .await
            .unwrap();
        assert_eq!(store.records().await.unwrap(), before);
        store.close().await.unwrap();
    }
}
