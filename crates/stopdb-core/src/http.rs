//! Attachment fetching.

use std::time::Duration;

use anyhow::Context;

/// Fetches the bytes behind a URL. The import step goes through this trait
/// so tests never touch the network.
pub trait Fetcher {
    fn fetch(&self, url: &str) -> anyhow::Result<Vec<u8>>;
}

/// Blocking HTTP fetcher used in production.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new() -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("stopdb/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("build http client")?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> anyhow::Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .with_context(|| format!("fetch {}", url))?;
        let response = response
            .error_for_status()
            .with_context(|| format!("fetch {}", url))?;
        let bytes = response
            .bytes()
            .with_context(|| format!("read body of {}", url))?;
        Ok(bytes.to_vec())
    }
}
