use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("feed returned status {0}")]
    Status(StatusCode),

    #[error("malformed feed body: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// One current giveaway, as announced to the free-games channel.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Giveaway {
    pub title: String,
    pub url: String,
}

pub struct FreeGamesClient {
    http: reqwest::Client,
    feed_url: String,
}

impl FreeGamesClient {
    pub fn new(feed_url: String) -> Result<Self, FeedError> {
        Ok(Self {
            http: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()?,
            feed_url,
        })
    }

    /// Fetch the current giveaway list.
    ///
    /// A body that isn't a JSON array fails the whole poll; individual entries
    /// without the expected fields are logged and dropped.
    pub async fn fetch_current(&self) -> Result<Vec<Giveaway>, FeedError> {
        let resp = self.http.get(&self.feed_url).send().await?;

        if !resp.status().is_success() {
            return Err(FeedError::Status(resp.status()));
        }

        let raw: Vec<serde_json::Value> = serde_json::from_str(&resp.text().await?)?;
        Ok(parse_entries(raw))
    }
}

/// Keep only entries with the expected shape, dropping the rest.
fn parse_entries(raw: Vec<serde_json::Value>) -> Vec<Giveaway> {
    raw.into_iter()
        .filter_map(|value| match serde_json::from_value::<Giveaway>(value) {
            Ok(giveaway) => Some(giveaway),
            Err(e) => {
                warn!("Dropping malformed feed entry: {e}");
                None
            }
        })
        .collect()
}
