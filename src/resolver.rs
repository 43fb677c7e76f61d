use std::collections::HashSet;
use std::thread;
use std::time::Duration;

use rayon::ThreadPoolBuilder;
use rayon::iter::{IndexedParallelIterator, IntoParallelRefIterator, ParallelIterator};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::domain::Accession;
use crate::error::KiraError;
use crate::manifest::{ManifestPatch, ManifestStore};
use crate::throttle::Throttle;

pub const SDL_BASE_URL: &str = "https://locate.ncbi.nlm.nih.gov/sdl/2/retrieve?accept-alternate-locations=yes&filetype=sraalign&acc=";

pub trait LocationClient: Send + Sync {
    /// Performs one GET and returns the response body.
    fn query(&self, url: &str) -> Result<String, KiraError>;
}

impl<C: LocationClient> LocationClient for &C {
    fn query(&self, url: &str) -> Result<String, KiraError> {
        (**self).query(url)
    }
}

#[derive(Clone)]
pub struct SdlHttpClient {
    client: Client,
}

impl SdlHttpClient {
    pub fn new() -> Result<Self, KiraError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("kira-af/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| KiraError::SdlHttp(err.to_string()))?,
        );
        if let Ok(api_key) = std::env::var("NCBI_API_KEY") {
            if !api_key.trim().is_empty() {
                headers.insert(
                    "api-key",
                    HeaderValue::from_str(api_key.trim())
                        .map_err(|err| KiraError::SdlHttp(err.to_string()))?,
                );
            }
        }
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|err| KiraError::SdlHttp(err.to_string()))?;
        Ok(Self { client })
    }

    fn send_with_retries(&self, url: &str) -> Result<reqwest::blocking::Response, KiraError> {
        const MAX_RETRIES: usize = 3;
        const BASE_DELAY_MS: u64 = 500;
        let mut attempt = 0usize;
        loop {
            match self.client.get(url).send() {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < MAX_RETRIES && is_retryable_status(status) {
                        debug!(status, attempt, "retrying SDL request");
                        thread::sleep(Duration::from_millis(BASE_DELAY_MS * (attempt as u64 + 1)));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < MAX_RETRIES && is_retryable_error(&err) {
                        debug!(attempt, "retrying SDL request after {err}");
                        thread::sleep(Duration::from_millis(BASE_DELAY_MS * (attempt as u64 + 1)));
                        attempt += 1;
                        continue;
                    }
                    return Err(KiraError::SdlHttp(err.to_string()));
                }
            }
        }
    }
}

impl LocationClient for SdlHttpClient {
    fn query(&self, url: &str) -> Result<String, KiraError> {
        let response = self.send_with_retries(url)?;
        let status = response.status();
        info!(status = status.as_u16(), "SDL response");
        if !status.is_success() {
            let message = response
                .text()
                .unwrap_or_else(|_| "SDL request failed".to_string());
            return Err(KiraError::SdlStatus {
                status: status.as_u16(),
                message,
            });
        }
        response
            .text()
            .map_err(|err| KiraError::SdlHttp(err.to_string()))
    }
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

#[derive(Debug, Deserialize)]
struct SdlResponse {
    result: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct SdlBundle {
    #[serde(default)]
    bundle: Option<String>,
    #[serde(default)]
    status: Option<Value>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    files: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SdlFile {
    accession: String,
    #[serde(default)]
    size: Option<u64>,
    #[serde(default)]
    md5: Option<String>,
    #[serde(default)]
    modification_date: Option<String>,
    locations: Vec<Value>,
}

/// One file entry recovered from a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFile {
    pub accession: String,
    pub size: u64,
    pub md5: Option<String>,
    pub modification_date: Option<String>,
    pub links: Vec<String>,
}

/// Parses an SDL body. A body without a `result` array is an error; bundles,
/// files and locations that do not have the expected shape are skipped.
pub fn parse_response(body: &str) -> Result<Vec<ResolvedFile>, KiraError> {
    if body.trim().is_empty() {
        return Err(KiraError::MalformedResponse("empty body".to_string()));
    }
    let response: SdlResponse = serde_json::from_str(body)
        .map_err(|err| KiraError::MalformedResponse(err.to_string()))?;

    let mut out = Vec::new();
    for bundle in response.result {
        let bundle: SdlBundle = match serde_json::from_value(bundle) {
            Ok(bundle) => bundle,
            Err(err) => {
                warn!("skipping malformed bundle: {err}");
                continue;
            }
        };
        let Some(files) = bundle.files else {
            let status = bundle.status.unwrap_or(Value::Null);
            warn!(
                bundle = bundle.bundle.as_deref().unwrap_or("?"),
                status = %status,
                "bundle without files: {}",
                bundle.msg.as_deref().unwrap_or("no message")
            );
            continue;
        };
        for file in files {
            let file: SdlFile = match serde_json::from_value(file) {
                Ok(file) => file,
                Err(err) => {
                    warn!("skipping malformed file entry: {err}");
                    continue;
                }
            };
            if file.size.is_none() || file.md5.is_none() || file.modification_date.is_none() {
                warn!(
                    accession = file.accession.as_str(),
                    "file entry is missing size, md5 or modification date"
                );
            }
            let links = file
                .locations
                .iter()
                .filter_map(|location| {
                    let link = location.get("link").and_then(Value::as_str);
                    if link.is_none() {
                        warn!(
                            accession = file.accession.as_str(),
                            "malformed location without link: {location}"
                        );
                    }
                    link.map(str::to_string)
                })
                .collect();
            out.push(ResolvedFile {
                accession: file.accession,
                size: file.size.unwrap_or_default(),
                md5: file.md5,
                modification_date: file.modification_date,
                links,
            });
        }
    }
    Ok(out)
}

pub fn partition_batches(accessions: &[Accession], batch_size: usize) -> Vec<&[Accession]> {
    accessions.chunks(batch_size.max(1)).collect()
}

pub fn query_url(base_url: &str, batch: &[Accession]) -> String {
    let joined = batch
        .iter()
        .map(Accession::as_str)
        .collect::<Vec<_>>()
        .join(",");
    format!("{base_url}{joined}")
}

#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub index: usize,
    pub error: Option<String>,
    pub files: Vec<ResolvedFile>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionSummary {
    pub batches: usize,
    pub failed_batches: usize,
    pub resolved: usize,
    pub unmatched: Vec<String>,
}

pub struct Resolver<'a, C: LocationClient> {
    client: &'a C,
    base_url: &'a str,
    batch_size: usize,
    threads: usize,
    throttle: Throttle,
}

impl<'a, C: LocationClient> Resolver<'a, C> {
    pub fn new(
        client: &'a C,
        base_url: &'a str,
        batch_size: usize,
        threads: usize,
        throttle: Throttle,
    ) -> Self {
        Self {
            client,
            base_url,
            batch_size,
            threads: threads.max(1),
            throttle,
        }
    }

    /// Runs every batch to completion; failures are captured per batch.
    pub fn fetch_batches(&self, accessions: &[Accession]) -> Result<Vec<BatchOutcome>, KiraError> {
        let batches = partition_batches(accessions, self.batch_size);
        let pool = ThreadPoolBuilder::new()
            .num_threads(self.threads.min(batches.len()).max(1))
            .build()
            .map_err(|err| KiraError::WorkerPool(err.to_string()))?;
        Ok(pool.install(|| {
            batches
                .par_iter()
                .enumerate()
                .map(|(index, batch)| self.run_batch(index, batch))
                .collect()
        }))
    }

    fn run_batch(&self, index: usize, batch: &[Accession]) -> BatchOutcome {
        let url = query_url(self.base_url, batch);
        self.throttle.pause();
        info!(batch = index, size = batch.len(), url = url.as_str(), "querying SDL");
        let result = self
            .client
            .query(&url)
            .and_then(|body| parse_response(&body));
        match result {
            Ok(files) => BatchOutcome {
                index,
                error: None,
                files,
            },
            Err(err) => {
                warn!(
                    batch = index,
                    url = url.as_str(),
                    "batch contributed no records: {err}"
                );
                BatchOutcome {
                    index,
                    error: Some(err.to_string()),
                    files: Vec::new(),
                }
            }
        }
    }

    /// Resolves every accession, then merges results once all batches joined.
    pub fn resolve(
        &self,
        accessions: &[Accession],
        store: &mut ManifestStore,
    ) -> Result<ResolutionSummary, KiraError> {
        let outcomes = self.fetch_batches(accessions)?;
        Ok(merge_outcomes(store, outcomes))
    }
}

pub fn merge_outcomes(store: &mut ManifestStore, outcomes: Vec<BatchOutcome>) -> ResolutionSummary {
    let mut summary = ResolutionSummary {
        batches: outcomes.len(),
        ..ResolutionSummary::default()
    };
    let mut merged = HashSet::new();
    for outcome in outcomes {
        if outcome.error.is_some() {
            summary.failed_batches += 1;
        }
        for file in outcome.files {
            let Some(key) = store.resolve_key(&file.accession) else {
                warn!(
                    batch = outcome.index,
                    accession = file.accession.as_str(),
                    "response accession matches no requested accession"
                );
                summary.unmatched.push(file.accession);
                continue;
            };
            if !merged.insert(key.clone()) {
                debug!(accession = key.as_str(), "ignoring repeated file entry");
                continue;
            }
            store.merge(
                &key,
                ManifestPatch {
                    accession: Some(file.accession),
                    size: Some(file.size),
                    md5: file.md5,
                    modification_date: file.modification_date,
                    links: Some(file.links),
                    ..ManifestPatch::default()
                },
            );
            summary.resolved += 1;
        }
    }
    summary
}
