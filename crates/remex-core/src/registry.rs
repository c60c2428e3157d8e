//! Provider routing and language catalog cache
//!
//! Maps each flavor to its base URL (a pure lookup over the startup config)
//! and caches per-language metadata for the process lifetime. The cache is
//! written at most once per `(flavor, id)` key and read-mostly afterwards;
//! concurrent first lookups may each fetch, but the provider's response is
//! idempotent for a fixed id so the cached value is identical either way.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::join_all;
use reqwest::Client;
use tokio::sync::Mutex;

use crate::config::ClientConfig;
use crate::core_types::{Flavor, LanguageDescriptor};
use crate::errors::ClientError;
use crate::workspace::editor_mode_for;

/// Catalog entry excluded unconditionally (disabled upstream).
const DISABLED_LANGUAGE_ID: i64 = 89;

pub struct ProviderRegistry {
    config: Arc<ClientConfig>,
    http: Client,
    languages: Mutex<HashMap<Flavor, HashMap<i64, LanguageDescriptor>>>,
}

impl ProviderRegistry {
    pub fn new(config: Arc<ClientConfig>, http: Client) -> Self {
        Self { config, http, languages: Mutex::new(HashMap::new()) }
    }

    /// Pure lookup; no network.
    pub fn base_url(&self, flavor: Flavor) -> &str {
        &self.config.flavor(flavor).base_url
    }

    /// Language metadata for one `(flavor, id)` pair, fetched on first use
    /// and cached for the process lifetime. A failed fetch leaves the cache
    /// unpopulated so a later call can retry.
    pub async fn get_language(
        &self,
        flavor: Flavor,
        id: i64,
    ) -> Result<LanguageDescriptor, ClientError> {
        {
            let cache = self.languages.lock().await;
            if let Some(descriptor) = cache.get(&flavor).and_then(|per_id| per_id.get(&id)) {
                return Ok(descriptor.clone());
            }
        }

        let url = format!("{}/languages/{}", self.base_url(flavor), id);
        log::debug!("fetching language metadata from {}", url);
        let response = self.http.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(ClientError::Transport(format!(
                "language metadata request failed with HTTP {} for {}",
                response.status(),
                url
            )));
        }

        let mut descriptor: LanguageDescriptor = response
            .json()
            .await
            .map_err(|e| ClientError::Parsing(format!("invalid language metadata: {}", e)))?;
        descriptor.flavor = Some(flavor);
        descriptor.editor_mode = Some(editor_mode_for(&descriptor.name).to_string());

        let mut cache = self.languages.lock().await;
        cache.entry(flavor).or_default().insert(id, descriptor.clone());
        Ok(descriptor)
    }

    /// Aggregate the language catalogs of all flavors into one sequence,
    /// sorted by display name.
    ///
    /// A flavor whose catalog fetch fails is skipped with a warning so the
    /// client keeps working against the remaining providers; only all
    /// flavors failing is an error.
    pub async fn list_languages(&self) -> Result<Vec<LanguageDescriptor>, ClientError> {
        let fetches = Flavor::ALL
            .into_iter()
            .map(|flavor| async move { (flavor, self.fetch_catalog(flavor).await) });

        let mut catalogs = Vec::new();
        let mut last_error = None;
        for (flavor, outcome) in join_all(fetches).await {
            match outcome {
                Ok(catalog) => catalogs.push((flavor, catalog)),
                Err(err) => {
                    log::warn!("language catalog for flavor {} unavailable: {}", flavor, err);
                    last_error = Some(err);
                }
            }
        }

        if catalogs.is_empty() {
            return Err(last_error.unwrap_or_else(|| {
                ClientError::Transport("no provider catalog reachable".to_string())
            }));
        }

        Ok(merge_catalogs(catalogs))
    }

    async fn fetch_catalog(&self, flavor: Flavor) -> Result<Vec<LanguageDescriptor>, ClientError> {
        let url = format!("{}/languages", self.base_url(flavor));
        let response = self.http.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(ClientError::Transport(format!(
                "catalog request failed with HTTP {} for {}",
                response.status(),
                url
            )));
        }

        let mut catalog: Vec<LanguageDescriptor> = response
            .json()
            .await
            .map_err(|e| ClientError::Parsing(format!("invalid language catalog: {}", e)))?;
        for descriptor in &mut catalog {
            descriptor.flavor = Some(flavor);
            descriptor.editor_mode = Some(editor_mode_for(&descriptor.name).to_string());
        }
        Ok(catalog)
    }
}

/// Merge per-flavor catalogs: drop the disabled entry, let the
/// first-registered flavor win on duplicate display names, sort by name.
fn merge_catalogs(catalogs: Vec<(Flavor, Vec<LanguageDescriptor>)>) -> Vec<LanguageDescriptor> {
    let mut merged: Vec<LanguageDescriptor> = Vec::new();

    for (_, catalog) in catalogs {
        for descriptor in catalog {
            if descriptor.id == DISABLED_LANGUAGE_ID {
                continue;
            }
            if merged.iter().any(|existing| existing.name == descriptor.name) {
                continue;
            }
            merged.push(descriptor);
        }
    }

    merged.sort_by(|a, b| a.name.cmp(&b.name));
    merged
}
