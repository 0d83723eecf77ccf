//! Source retrieval for dashboard datasets.
//!
//! A source is either a local path or an `http(s)` URL. Payloads ending in
//! `.gz` are decompressed before they reach the parsers.

mod basic;
mod client;

pub use basic::BasicClient;
pub use client::HttpClient;

use std::io::Read;

use flate2::read::GzDecoder;
use tracing::debug;

use crate::error::LoadError;

/// Fetches the body at `url` with a GET request through `client`.
pub async fn fetch_bytes<C: HttpClient>(client: &C, url: &str) -> Result<Vec<u8>, LoadError> {
    let unreachable = |reason: String| LoadError::Unreachable {
        source_ref: url.to_string(),
        reason,
    };

    let parsed = reqwest::Url::parse(url).map_err(|e| unreachable(e.to_string()))?;
    let req = reqwest::Request::new(reqwest::Method::GET, parsed);

    let resp = client
        .execute(req)
        .await
        .map_err(|e| unreachable(e.to_string()))?;

    if !resp.status().is_success() {
        return Err(unreachable(format!("status {}", resp.status())));
    }

    let bytes = resp.bytes().await.map_err(|e| unreachable(e.to_string()))?;
    Ok(bytes.to_vec())
}

/// Loads a source from a local file path or fetches it over HTTP.
#[tracing::instrument(skip(client))]
pub async fn fetch_source<C: HttpClient>(client: &C, source: &str) -> Result<Vec<u8>, LoadError> {
    let bytes = if source.starts_with("http://") || source.starts_with("https://") {
        fetch_bytes(client, source).await?
    } else {
        tokio::fs::read(source)
            .await
            .map_err(|e| LoadError::Unreachable {
                source_ref: source.to_string(),
                reason: e.to_string(),
            })?
    };

    debug!(bytes = bytes.len(), "Source bytes received");

    if source.ends_with(".gz") {
        return gunzip(&bytes);
    }
    Ok(bytes)
}

fn gunzip(bytes: &[u8]) -> Result<Vec<u8>, LoadError> {
    let mut decoder = GzDecoder::new(bytes);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}
