//! Request driver: follows redirects and honours slow-down responses for one logical fetch.
//!
//! State carried across attempts is the current target, the breadcrumb trail of URLs visited so
//! far and the current backoff. The trail never holds a URL twice and never grows beyond
//! `max_redirects` entries.

use std::time::Duration;

use bytes::Bytes;
use url::Url;

use super::{
    transport::GeminiTransport,
    types::{GEMINI_SCHEME, GeminiResponse, StatusFamily},
};
use crate::{config::HelperConfig, errors::HelperError};

pub const INITIAL_BACKOFF: u64 = 1;

pub struct Fetcher<T: GeminiTransport> {
    transport: T,
    max_backoff: u64,
    max_redirects: usize,
}

impl<T: GeminiTransport> Fetcher<T> {
    pub fn new(transport: T, config: &HelperConfig) -> Self {
        Self {
            transport,
            max_backoff: config.max_backoff,
            max_redirects: config.max_redirects,
        }
    }

    /// Fetches `url` and returns the body of the eventual `2x` response.
    pub async fn fetch(&self, url: &Url) -> Result<Bytes, HelperError> {
        let mut target = url.clone();
        let mut trail: Vec<Url> = Vec::with_capacity(self.max_redirects);
        let mut backoff = INITIAL_BACKOFF;

        loop {
            if target.scheme() != GEMINI_SCHEME {
                return Err(HelperError::UnsupportedScheme(target.to_string()));
            }
            if trail.contains(&target) {
                return Err(HelperError::RedirectLoop(target.to_string()));
            }
            if trail.len() >= self.max_redirects {
                return Err(HelperError::TooManyRedirects(url.to_string()));
            }
            trail.push(target.clone());

            let raw = self.transport.request(&target).await?;
            let response = GeminiResponse::parse(target.as_str(), raw)?;
            tracing::debug!("{} -> {}", target, response.status_line);

            match response.family {
                StatusFamily::Success => return Ok(response.body),
                StatusFamily::Redirect => {
                    let next = response.redirect_target.ok_or_else(|| {
                        HelperError::InvalidResponse(format!(
                            "redirect without target from {target}"
                        ))
                    })?;
                    target = target.join(&next)?;
                    tracing::debug!("redirected to {}", target);
                }
                StatusFamily::TemporaryFailure if response.is_slow_down() => {
                    if backoff >= self.max_backoff {
                        return Err(HelperError::ServerUnavailable(target.to_string()));
                    }
                    tracing::warn!("{} asked to slow down, retrying in {}s", target, backoff);
                    tokio::time::sleep(Duration::from_secs(backoff)).await;
                    // a retry of the same URL is not a new hop
                    trail.pop();
                    backoff = (backoff * 2).min(self.max_backoff);
                }
                StatusFamily::TemporaryFailure | StatusFamily::PermanentFailure => {
                    return Err(HelperError::ServerError(response.status_line));
                }
            }
        }
    }
}
