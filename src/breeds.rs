//! Breed classification.
//!
//! Cats must be of a recognized breed when they are hired. The catalogue lives
//! in a third-party service, so lookups fail closed: a timeout, transport
//! error, non-2xx status or garbled body all mean "not a valid breed".

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

/// Default catalogue endpoint (TheCatAPI).
pub const DEFAULT_BREEDS_URL: &str = "https://api.thecatapi.com";

/// Default upper bound for one catalogue lookup.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Answers whether a breed name is recognized.
#[async_trait]
pub trait BreedClassifier: Send + Sync {
    /// Never errors: any failure to classify resolves to `false`.
    async fn is_valid_breed(&self, name: &str) -> bool;
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

// ============================================================
// Remote catalogue
// ============================================================

#[derive(Debug, Deserialize)]
struct BreedRecord {
    name: String,
}

/// Classifier backed by TheCatAPI's `/v1/breeds` listing.
#[derive(Debug, Clone)]
pub struct CatApiClassifier {
    base_url: String,
    api_key: Option<String>,
    client: Client,
}

impl CatApiClassifier {
    /// Create a classifier whose requests give up after `timeout`.
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }

    async fn fetch_breeds(&self) -> Result<Vec<BreedRecord>, reqwest::Error> {
        let url = format!("{}/v1/breeds", self.base_url);
        let mut req = self.client.get(&url);
        if let Some(ref key) = self.api_key {
            req = req.header("x-api-key", key);
        }
        req.send().await?.error_for_status()?.json().await
    }
}

#[async_trait]
impl BreedClassifier for CatApiClassifier {
    async fn is_valid_breed(&self, name: &str) -> bool {
        let wanted = normalize(name);
        match self.fetch_breeds().await {
            Ok(breeds) => breeds.iter().any(|b| normalize(&b.name) == wanted),
            Err(e) => {
                tracing::warn!("Breed lookup failed, treating '{}' as invalid: {}", name, e);
                false
            }
        }
    }
}

// ============================================================
// Fixed list
// ============================================================

/// Classifier over a fixed set of breed names, compared case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct StaticBreedClassifier {
    breeds: HashSet<String>,
}

impl StaticBreedClassifier {
    pub fn new<I, S>(breeds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            breeds: breeds.into_iter().map(|b| normalize(b.as_ref())).collect(),
        }
    }
}

#[async_trait]
impl BreedClassifier for StaticBreedClassifier {
    async fn is_valid_breed(&self, name: &str) -> bool {
        self.breeds.contains(&normalize(name))
    }
}
