//! Blocking HTTP client for the Sisu curriculum API.

use std::{thread, time::Duration};

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::cache::{Cache, CacheError};
use crate::domain::rule::{CourseUnitRecord, DegreeProgramme, ModuleGroupVariant};

const DEFAULT_BASE_URL: &str = "https://sis-tuni.funidata.fi";
const UNIVERSITY_ID: &str = "tuni-university-root-id";

/// Transport errors are retried this many times before the entity is treated
/// as absent.
const RETRY_ATTEMPTS: u32 = 3;

/// Errors raised by the API layer.
///
/// Note that a failed fetch (non-success status, transport failure after
/// retries) is *not* an error: the pipeline tolerates partial results and
/// such entities are reported as absent instead.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The local response cache failed.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// A response (fresh or cached) did not match the expected shape.
    #[error("unexpected payload for {id}: {source}")]
    Payload {
        /// The identifier that was being fetched.
        id: String,
        /// The underlying deserialization error.
        #[source]
        source: serde_json::Error,
    },
}

/// The three Sisu lookups the pipeline needs.
///
/// Splitting this from [`SisuClient`] keeps the resolver testable against an
/// in-memory implementation.
pub trait SisuApi {
    /// Fetches a degree programme by its otm id.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on cache failures or malformed payloads; a failed
    /// fetch is `Ok(None)`.
    fn degree_programme(&self, id: &str) -> Result<Option<DegreeProgramme>, ApiError>;

    /// Fetches the grouping variants of a module group.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on cache failures or malformed payloads; a failed
    /// fetch is `Ok(None)`.
    fn module_group(&self, group_id: &str) -> Result<Option<Vec<ModuleGroupVariant>>, ApiError>;

    /// Fetches the course-unit variants of a course-unit group.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on cache failures or malformed payloads; a failed
    /// fetch is `Ok(None)`.
    fn course_units(&self, group_id: &str) -> Result<Option<Vec<CourseUnitRecord>>, ApiError>;
}

/// Cache-first client for the Sisu API.
///
/// Every fetch blocks until a response arrives or the retry budget is
/// exhausted; the pipeline is purely sequential by design.
#[derive(Debug)]
pub struct SisuClient {
    http: reqwest::blocking::Client,
    cache: Cache,
    base_url: String,
}

impl SisuClient {
    /// Creates a client against the production Sisu instance.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Client`] if the underlying HTTP client cannot be
    /// constructed.
    pub fn new(cache: Cache, timeout: Duration) -> Result<Self, ApiError> {
        Self::with_base_url(cache, timeout, DEFAULT_BASE_URL)
    }

    /// Creates a client against an alternative base URL.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Client`] if the underlying HTTP client cannot be
    /// constructed.
    pub fn with_base_url(
        cache: Cache,
        timeout: Duration,
        base_url: impl Into<String>,
    ) -> Result<Self, ApiError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ApiError::Client)?;
        Ok(Self {
            http,
            cache,
            base_url: base_url.into(),
        })
    }

    /// Returns the cached document for `id`, or fetches and caches it.
    ///
    /// Fetch failures degrade to `Ok(None)` with a warning.
    fn fetch(
        &self,
        id: &str,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<Option<Value>, ApiError> {
        if let Some(hit) = self.cache.get(id)? {
            debug!(id, "cache hit");
            return Ok(Some(hit));
        }
        let Some(document) = self.request(url, query) else {
            return Ok(None);
        };
        self.cache.store(id, &document)?;
        Ok(Some(document))
    }

    /// Performs a GET with bounded retries for transport failures.
    fn request(&self, url: &str, query: &[(&str, &str)]) -> Option<Value> {
        let mut delay = Duration::from_millis(500);
        for attempt in 1..=RETRY_ATTEMPTS {
            match self.http.get(url).query(query).send() {
                Ok(response) => {
                    info!(url = %response.url(), "hit Sisu endpoint");
                    if !response.status().is_success() {
                        warn!(
                            url,
                            status = %response.status(),
                            "non-success response, treating entity as absent"
                        );
                        return None;
                    }
                    match response.json::<Value>() {
                        Ok(document) => return Some(document),
                        Err(error) => {
                            warn!(url, %error, "undecodable response body, treating entity as absent");
                            return None;
                        }
                    }
                }
                Err(error) if attempt < RETRY_ATTEMPTS => {
                    warn!(url, %error, attempt, "request failed, retrying");
                    thread::sleep(delay);
                    delay *= 2;
                }
                Err(error) => {
                    warn!(url, %error, "request failed, treating entity as absent");
                }
            }
        }
        None
    }
}

fn decode<T: DeserializeOwned>(id: &str, document: Value) -> Result<T, ApiError> {
    serde_json::from_value(document).map_err(|source| ApiError::Payload {
        id: id.to_string(),
        source,
    })
}

impl SisuApi for SisuClient {
    fn degree_programme(&self, id: &str) -> Result<Option<DegreeProgramme>, ApiError> {
        let url = format!("{}/kori/api/modules/{id}", self.base_url);
        self.fetch(id, &url, &[])?
            .map(|document| decode(id, document))
            .transpose()
    }

    fn module_group(&self, group_id: &str) -> Result<Option<Vec<ModuleGroupVariant>>, ApiError> {
        let url = format!("{}/kori/api/modules/by-group-id", self.base_url);
        let query = [("groupId", group_id), ("universityId", UNIVERSITY_ID)];
        self.fetch(group_id, &url, &query)?
            .map(|document| decode(group_id, document))
            .transpose()
    }

    fn course_units(&self, group_id: &str) -> Result<Option<Vec<CourseUnitRecord>>, ApiError> {
        let url = format!("{}/kori/api/course-units/by-group-id", self.base_url);
        let query = [("groupId", group_id), ("universityId", UNIVERSITY_ID)];
        self.fetch(group_id, &url, &query)?
            .map(|document| decode(group_id, document))
            .transpose()
    }
}
