//! Ref discovery over the dumb-HTTP style layout a Gemini capsule serves: `info/refs` lists
//! `<hash>\t<refname>` lines and `HEAD` holds `ref: <refname>`.

use std::collections::HashMap;

use bytes::Bytes;
use url::Url;

use super::{fetch::Fetcher, transport::GeminiTransport};
use crate::{errors::HelperError, hash::HashKind};

pub const SYMREF_PREFIX: &str = "ref: ";

/// Ref name to value mapping that keeps the order refs were advertised in.
///
/// A value is either a hex object id or `@<refname>` for a symbolic ref.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefMap {
    entries: Vec<(String, String)>,
    // name -> position in `entries`
    index: HashMap<String, usize>,
}

impl RefMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces `name`; a replaced ref keeps its original position.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.index.get(&name) {
            Some(&pos) => self.entries[pos].1 = value,
            None => {
                self.index.insert(name.clone(), self.entries.len());
                self.entries.push((name, value));
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.index
            .get(name)
            .map(|&pos| self.entries[pos].1.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(name, value)` pairs in advertisement order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

pub struct RefDiscovery<T: GeminiTransport> {
    fetcher: Fetcher<T>,
}

impl<T: GeminiTransport> RefDiscovery<T> {
    pub fn new(fetcher: Fetcher<T>) -> Self {
        Self { fetcher }
    }

    /// Lists the refs of the repository at `base` along with its object format.
    pub async fn discover(&self, base: &Url) -> Result<(RefMap, HashKind), HelperError> {
        let refs_url = resource_url(base, "info/refs")?;
        let listing = self.fetch_text(&refs_url).await?;
        let (mut refs, kind) = parse_ref_listing(&listing)?;

        let head_url = resource_url(base, "HEAD")?;
        let head = self.fetch_text(&head_url).await?;
        refs.insert("HEAD", format!("@{}", parse_symref(&head)?));

        Ok((refs, kind))
    }

    async fn fetch_text(&self, url: &Url) -> Result<String, HelperError> {
        let body = self.fetcher.fetch(url).await?;
        decode_utf8(url, body)
    }
}

fn decode_utf8(url: &Url, body: Bytes) -> Result<String, HelperError> {
    String::from_utf8(body.to_vec()).map_err(|_| HelperError::DecodeFailure(url.to_string()))
}

/// `<base>/<name>`, without doubling a trailing slash on `base`.
pub fn resource_url(base: &Url, name: &str) -> Result<Url, HelperError> {
    let base = base.as_str().trim_end_matches('/');
    Ok(Url::parse(&format!("{base}/{name}"))?)
}

/// Parses an `info/refs` body. The object format is taken from the first hash only.
pub fn parse_ref_listing(listing: &str) -> Result<(RefMap, HashKind), HelperError> {
    let mut refs = RefMap::new();
    let mut kind = None;

    for line in listing.lines().filter(|line| !line.is_empty()) {
        let (hash, name) = line.split_once('\t').ok_or_else(|| {
            HelperError::RefFormatError(format!("expected <hash>\\t<ref>, got {line:?}"))
        })?;
        if kind.is_none() {
            kind = Some(HashKind::from_hex_len(hash.len()).ok_or_else(|| {
                HelperError::RefFormatError(format!(
                    "cannot infer object format from {}-character hash {hash:?}",
                    hash.len()
                ))
            })?);
        }
        refs.insert(name, hash);
    }

    let kind = kind.unwrap_or_else(|| {
        tracing::warn!("remote advertised no refs, assuming {}", HashKind::default());
        HashKind::default()
    });
    Ok((refs, kind))
}

/// Extracts the target of a `ref: <refname>` symbolic ref.
pub fn parse_symref(head: &str) -> Result<&str, HelperError> {
    let start = head.find(SYMREF_PREFIX).ok_or_else(|| {
        HelperError::RefFormatError(format!("HEAD is not a symbolic ref: {:?}", head.trim_end()))
    })?;
    Ok(head[start + SYMREF_PREFIX.len()..].trim_end())
}
