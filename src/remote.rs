// src/remote.rs

//! Remote bundle source: catalog resolution and downloads.
//!
//! The game publishes a catalog mapping logical keys to bundle names and
//! version hashes, and serves the bundles themselves from a CDN. Both are
//! plain HTTPS GETs; transient failures are retried with a bounded, growing
//! delay before escalating to `SourceUnavailable`.

use crate::error::{Error, Result};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default timeout for HTTP requests (30 seconds)
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum retry attempts for failed requests
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Base retry delay in milliseconds; grows linearly per attempt
const RETRY_DELAY_MS: u64 = 1000;

/// Buffer size for streaming downloads (8 KB)
const STREAM_BUFFER_SIZE: usize = 8192;

/// One bundle as published in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    #[serde(rename = "bundleName")]
    pub bundle_name: String,
    #[serde(rename = "readableName")]
    pub readable_name: String,
    /// Version hash; changes whenever the game republishes the bundle.
    pub hash: String,
    #[serde(default)]
    pub size: u64,
}

#[derive(Debug, Deserialize)]
struct Catalog {
    bundles: Vec<CatalogEntry>,
}

/// Where source bundles come from. The engine only ever talks to this trait;
/// tests substitute an in-memory implementation.
pub trait RemoteSource: Send + Sync {
    /// Resolve a catalog key to its published bundle entry.
    fn resolve(&self, catalog_key: &str) -> Result<CatalogEntry>;

    /// Download the bundle bytes for a resolved entry.
    fn fetch(&self, entry: &CatalogEntry) -> Result<Vec<u8>>;
}

/// HTTPS-backed source with bounded retries.
pub struct CdnClient {
    client: Client,
    catalog_url: String,
    cdn_base_url: String,
    max_retries: u32,
    show_progress: bool,
}

impl CdnClient {
    pub fn new(catalog_url: &str, cdn_base_url: &str) -> Result<Self> {
        Self::with_retries(catalog_url, cdn_base_url, DEFAULT_MAX_RETRIES)
    }

    pub fn with_retries(
        catalog_url: &str,
        cdn_base_url: &str,
        max_retries: u32,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::Config(format!("building HTTP client: {e}")))?;
        Ok(CdnClient {
            client,
            catalog_url: catalog_url.trim_end_matches('/').to_string(),
            cdn_base_url: cdn_base_url.trim_end_matches('/').to_string(),
            max_retries,
            show_progress: true,
        })
    }

    /// Disable progress bars (tests, non-interactive runs).
    pub fn quiet(mut self) -> Self {
        self.show_progress = false;
        self
    }

    /// GET with bounded retries and linear backoff.
    fn get_with_retries(&self, url: &str, what: &str) -> Result<reqwest::blocking::Response> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let outcome = self.client.get(url).send().and_then(|r| r.error_for_status());
            match outcome {
                Ok(response) => return Ok(response),
                Err(e) if attempt <= self.max_retries => {
                    let delay = RETRY_DELAY_MS * u64::from(attempt);
                    warn!(
                        "fetching {what} failed (attempt {attempt}/{}): {e}; retrying in {delay} ms",
                        self.max_retries
                    );
                    std::thread::sleep(Duration::from_millis(delay));
                }
                Err(e) => {
                    return Err(Error::SourceUnavailable {
                        identifier: what.to_string(),
                        reason: format!("{e} (after {attempt} attempts)"),
                    });
                }
            }
        }
    }
}

impl RemoteSource for CdnClient {
    fn resolve(&self, catalog_key: &str) -> Result<CatalogEntry> {
        debug!("resolving '{catalog_key}' via {}", self.catalog_url);
        let response = self.get_with_retries(&self.catalog_url, catalog_key)?;
        let catalog: Catalog = response.json().map_err(|e| Error::SourceUnavailable {
            identifier: catalog_key.to_string(),
            reason: format!("parsing catalog: {e}"),
        })?;

        catalog
            .bundles
            .into_iter()
            .find(|b| b.bundle_name == catalog_key)
            .ok_or_else(|| Error::SourceUnavailable {
                identifier: catalog_key.to_string(),
                reason: "not present in the catalog".to_string(),
            })
    }

    fn fetch(&self, entry: &CatalogEntry) -> Result<Vec<u8>> {
        let url = format!(
            "{}/{}/{}",
            self.cdn_base_url, entry.hash, entry.readable_name
        );
        info!("downloading {} from {url}", entry.readable_name);

        let mut response = self.get_with_retries(&url, &entry.readable_name)?;

        let total = if entry.size > 0 {
            entry.size
        } else {
            response.content_length().unwrap_or(0)
        };

        let progress = if self.show_progress && total > 0 {
            let pb = ProgressBar::new(total);
            pb.set_style(
                ProgressStyle::with_template(
                    "{msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec})",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            pb.set_message(entry.readable_name.clone());
            Some(pb)
        } else {
            None
        };

        let mut bytes = Vec::with_capacity(total as usize);
        let mut buffer = [0u8; STREAM_BUFFER_SIZE];
        loop {
            let n = response.read(&mut buffer).map_err(|e| Error::SourceUnavailable {
                identifier: entry.readable_name.clone(),
                reason: format!("reading response body: {e}"),
            })?;
            if n == 0 {
                break;
            }
            bytes.extend_from_slice(&buffer[..n]);
            if let Some(pb) = &progress {
                pb.set_position(bytes.len() as u64);
            }
        }
        if let Some(pb) = progress {
            pb.finish_and_clear();
        }

        if entry.size > 0 && bytes.len() as u64 != entry.size {
            return Err(Error::SourceUnavailable {
                identifier: entry.readable_name.clone(),
                reason: format!(
                    "short download: got {} of {} bytes",
                    bytes.len(),
                    entry.size
                ),
            });
        }

        debug!("downloaded {} ({} bytes)", entry.readable_name, bytes.len());
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_entry_parses_game_field_names() {
        let json = r#"{
            "bundleName": "idle-key",
            "readableName": "char000101_idle.bundle",
            "hash": "a1b2c3",
            "size": 4096
        }"#;
        let entry: CatalogEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.bundle_name, "idle-key");
        assert_eq!(entry.readable_name, "char000101_idle.bundle");
        assert_eq!(entry.hash, "a1b2c3");
        assert_eq!(entry.size, 4096);
    }

    #[test]
    fn catalog_entry_size_defaults_to_zero() {
        let json = r#"{"bundleName": "k", "readableName": "r", "hash": "h"}"#;
        let entry: CatalogEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.size, 0);
    }

    #[test]
    fn unreachable_host_escalates_to_source_unavailable() {
        // Zero retries so the test does not sit through backoff sleeps.
        let client = CdnClient::with_retries(
            "http://127.0.0.1:1/catalog.json",
            "http://127.0.0.1:1/cdn",
            0,
        )
        .unwrap()
        .quiet();

        let err = client.resolve("anything").unwrap_err();
        assert!(matches!(err, Error::SourceUnavailable { .. }));
    }
}
