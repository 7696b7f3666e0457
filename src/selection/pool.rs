use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::error::{GameError, GameResult};
use crate::models::{SubjectPool, SubjectRecord};
use crate::utils::{retry_with_delay, RetryPolicy};

const ENABLE_LOGS: bool = true;

use crate::log_info;

/// Delivers the ordered candidate list. Filtering happens here, never in the
/// selector.
#[async_trait]
pub trait PoolSource: Send + Sync {
    async fn fetch_records(&self) -> Result<Vec<SubjectRecord>>;
}

#[derive(Debug, Deserialize)]
struct CountryName {
    common: String,
}

#[derive(Debug, Deserialize)]
struct CountryFlags {
    png: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CountryJson {
    name: CountryName,
    flags: Option<CountryFlags>,
    #[serde(default)]
    capital: Vec<String>,
    region: Option<String>,
    population: Option<u64>,
    cca2: Option<String>,
}

impl CountryJson {
    fn into_record(self) -> SubjectRecord {
        SubjectRecord {
            display_name: self.name.common,
            source_image_ref: self.flags.and_then(|flags| flags.png).unwrap_or_default(),
            capital: self
                .capital
                .into_iter()
                .next()
                .unwrap_or_else(|| "N/A".to_string()),
            region: self
                .region
                .filter(|region| !region.is_empty())
                .unwrap_or_else(|| "Unknown".to_string()),
            population: self.population.unwrap_or(0),
        }
    }
}

/// Countries from the REST Countries API, keeping those above
/// `min_population` that carry an ISO alpha-2 code.
#[derive(Clone)]
pub struct RestCountriesSource {
    client: reqwest::Client,
    url: String,
    min_population: u64,
}

impl RestCountriesSource {
    pub fn new(client: reqwest::Client, url: impl Into<String>, min_population: u64) -> Self {
        Self {
            client,
            url: url.into(),
            min_population,
        }
    }
}

/// Parses a REST Countries payload, applying the population and code filter.
pub fn parse_countries(body: &str, min_population: u64) -> Result<Vec<SubjectRecord>> {
    let countries: Vec<CountryJson> =
        serde_json::from_str(body).context("country list is not valid JSON")?;
    Ok(countries
        .into_iter()
        .filter(|country| {
            country.population.unwrap_or(0) > min_population
                && country.cca2.as_deref().is_some_and(|code| !code.is_empty())
        })
        .map(CountryJson::into_record)
        .collect())
}

#[async_trait]
impl PoolSource for RestCountriesSource {
    async fn fetch_records(&self) -> Result<Vec<SubjectRecord>> {
        let body = self
            .client
            .get(&self.url)
            .header("Accept", "application/json")
            .send()
            .await
            .context("Failed to fetch countries")?
            .error_for_status()
            .context("country API returned an error status")?
            .text()
            .await
            .context("failed to read country list")?;

        parse_countries(&body, self.min_population)
    }
}

/// A JSON array of subject records on disk.
#[derive(Debug, Clone)]
pub struct FilePoolSource {
    path: PathBuf,
}

impl FilePoolSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl PoolSource for FilePoolSource {
    async fn fetch_records(&self) -> Result<Vec<SubjectRecord>> {
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("failed to read pool file {}", self.path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("pool file {} is not a record list", self.path.display()))
    }
}

/// A fixed list, handy for embedding and tests.
#[derive(Debug, Clone)]
pub struct StaticPoolSource {
    records: Vec<SubjectRecord>,
}

impl StaticPoolSource {
    pub fn new(records: Vec<SubjectRecord>) -> Self {
        Self { records }
    }
}

#[async_trait]
impl PoolSource for StaticPoolSource {
    async fn fetch_records(&self) -> Result<Vec<SubjectRecord>> {
        Ok(self.records.clone())
    }
}

/// Loads the pool with bounded retries. An empty list counts as a failure.
pub async fn load_pool(
    source: &dyn PoolSource,
    policy: RetryPolicy,
    cancel: &CancellationToken,
) -> GameResult<SubjectPool> {
    let pool = retry_with_delay("loadCountries", policy, cancel, |_| async move {
        let records = source.fetch_records().await?;
        SubjectPool::new(records).ok_or_else(|| anyhow!("subject pool is empty"))
    })
    .await
    .map_err(|err| GameError::PoolUnavailable(format!("{err:#}")))?;

    log_info!("Loaded subject pool with {} entries", pool.len());
    Ok(pool)
}
