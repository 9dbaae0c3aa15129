use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::StatusCode;

use super::ImageSource;
use crate::error::{Error, Result, SourceError};

/// Fetches renditions with a plain GET against `base_url + relative_path`.
pub struct HttpSource {
    client: Client,
    base_url: String,
}

impl HttpSource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("bwtag/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.to_string(),
        })
    }

    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl ImageSource for HttpSource {
    fn fetch(&self, path: &str) -> std::result::Result<Vec<u8>, SourceError> {
        let response = self
            .client
            .get(self.url_for(path))
            .send()
            .map_err(|e| SourceError::Transport(e.to_string()))?;
        if response.status() != StatusCode::OK {
            return Err(SourceError::Status(response.status().as_u16()));
        }
        let bytes = response
            .bytes()
            .map_err(|e| SourceError::Transport(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}
