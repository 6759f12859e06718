use crate::error::{Result, TastebaseError};
use log::debug;
use reqwest::Client;
use std::time::Duration;

pub struct PageFetcher {
    client: Client,
    max_bytes: usize,
}

impl PageFetcher {
    pub fn new(timeout: Duration, user_agent: &str, max_bytes: usize) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;

        Ok(Self { client, max_bytes })
    }

    /// Download a page as text, refusing error statuses and oversized bodies.
    pub async fn fetch(&self, url: &str) -> Result<String> {
        debug!("Fetching {}", url);
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| TastebaseError::Fetch(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TastebaseError::Fetch(format!(
                "{url} returned status {status}"
            )));
        }

        if let Some(length) = response.content_length() {
            if length as usize > self.max_bytes {
                return Err(TastebaseError::Fetch(format!(
                    "{url} is {length} bytes, limit is {}",
                    self.max_bytes
                )));
            }
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            body.extend_from_slice(&chunk);
            if body.len() > self.max_bytes {
                return Err(TastebaseError::Fetch(format!(
                    "{url} exceeds the {} byte page limit",
                    self.max_bytes
                )));
            }
        }

        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}
