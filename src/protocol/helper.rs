//! The git remote-helper side of the process: reads commands from git on stdin and answers on
//! stdout. Every answer is a block of lines terminated by one blank line.

use std::str::FromStr;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use url::Url;

use super::{refs::RefDiscovery, transport::GeminiTransport};
use crate::errors::HelperError;

/// Capabilities advertised in answer to `capabilities`.
pub const CAPABILITIES: &[&str] = &["fetch"];
pub const FOR_PUSH: &str = "for-push";

/// Commands git may send to the helper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Capabilities,
    /// `list [for-push]`; the flag is accepted but changes nothing since push is unsupported.
    List { for_push: bool },
    /// `fetch <hash> <name>`
    Fetch { hash: String, name: String },
}

impl FromStr for Command {
    type Err = HelperError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut tokens = line.split_whitespace();
        let name = tokens
            .next()
            .ok_or_else(|| HelperError::MalformedCommand(line.to_string()))?;
        let args: Vec<&str> = tokens.collect();

        match name {
            "capabilities" => match args.as_slice() {
                [] => Ok(Command::Capabilities),
                _ => Err(HelperError::MalformedCommand(line.to_string())),
            },
            "list" => match args.as_slice() {
                [] => Ok(Command::List { for_push: false }),
                [FOR_PUSH] => Ok(Command::List { for_push: true }),
                _ => Err(HelperError::MalformedCommand(line.to_string())),
            },
            "fetch" => match args.as_slice() {
                [hash, name, ..] => Ok(Command::Fetch {
                    hash: hash.to_string(),
                    name: name.to_string(),
                }),
                _ => Err(HelperError::MalformedCommand(line.to_string())),
            },
            _ => Err(HelperError::UnknownCommand(name.to_string())),
        }
    }
}

pub struct RemoteHelper<T: GeminiTransport> {
    discovery: RefDiscovery<T>,
    url: Url,
}

impl<T: GeminiTransport> RemoteHelper<T> {
    pub fn new(discovery: RefDiscovery<T>, url: Url) -> Self {
        Self { discovery, url }
    }

    /// Runs one command and returns its complete answer, blank terminator included.
    pub async fn handle(&self, command: &Command) -> Result<Vec<String>, HelperError> {
        match command {
            Command::Capabilities => {
                let mut lines: Vec<String> = CAPABILITIES.iter().map(|c| c.to_string()).collect();
                lines.push(String::new());
                Ok(lines)
            }
            Command::List { for_push } => {
                tracing::debug!("listing refs of {} (for-push: {})", self.url, for_push);
                let (refs, kind) = self.discovery.discover(&self.url).await?;
                let mut lines = Vec::with_capacity(refs.len() + 2);
                lines.push(format!(":object-format {kind}"));
                lines.extend(refs.iter().map(|(name, value)| format!("{value} {name}")));
                lines.push(String::new());
                Ok(lines)
            }
            // object transfer has no Gemini counterpart yet
            Command::Fetch { hash, name } => {
                tracing::debug!("fetch {} {} requested", hash, name);
                Err(HelperError::FetchUnsupported)
            }
        }
    }

    /// Serves commands from `input` until end of stream.
    pub async fn run<R, W>(&self, input: R, output: &mut W) -> Result<(), HelperError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = input.lines();
        while let Some(line) = lines.next_line().await? {
            let command = Command::from_str(&line)?;
            tracing::debug!("command: {:?}", command);
            for answer in self.handle(&command).await? {
                output.write_all(answer.as_bytes()).await?;
                output.write_all(b"\n").await?;
                output.flush().await?;
            }
        }
        Ok(())
    }
}
