use std::panic::{self, AssertUnwindSafe};

use rayon::ThreadPoolBuilder;
use rayon::iter::{IndexedParallelIterator, IntoParallelRefIterator, ParallelIterator};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::domain::Accession;
use crate::error::KiraError;
use crate::extract::Extractor;
use crate::fs_util;
use crate::manifest::ManifestStore;
use crate::throttle::Throttle;

/// Splits `accessions` into at most `workers` contiguous, disjoint chunks
/// whose lengths differ by at most one.
pub fn partition_workers(accessions: &[Accession], workers: usize) -> Vec<&[Accession]> {
    if accessions.is_empty() {
        return Vec::new();
    }
    let workers = workers.clamp(1, accessions.len());
    let base = accessions.len() / workers;
    let extra = accessions.len() % workers;
    let mut chunks = Vec::with_capacity(workers);
    let mut start = 0;
    for index in 0..workers {
        let len = base + usize::from(index < extra);
        chunks.push(&accessions[start..start + len]);
        start += len;
    }
    chunks
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    pub accession: Accession,
    pub is_ok: bool,
    pub attempts: usize,
}

#[derive(Debug, Clone)]
pub enum PartitionReport {
    Completed {
        index: usize,
        outcomes: Vec<FetchOutcome>,
    },
    Failed {
        index: usize,
        accessions: Vec<Accession>,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedPartition {
    pub index: usize,
    pub accessions: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchSummary {
    pub attempted: usize,
    pub skipped: usize,
    pub ok: usize,
    pub failed: usize,
    pub failed_partitions: Vec<FailedPartition>,
}

pub struct FetchOrchestrator<'a, E: Extractor> {
    extractor: &'a E,
    workers: usize,
    throttle: Throttle,
}

impl<'a, E: Extractor> FetchOrchestrator<'a, E> {
    pub fn new(extractor: &'a E, workers: usize, throttle: Throttle) -> Self {
        Self {
            extractor,
            workers: workers.max(1),
            throttle,
        }
    }

    /// Fetches every accession, records the outcomes and re-validates every
    /// assigned file on disk. Links must be final before this is called.
    pub fn run(
        &self,
        accessions: &[Accession],
        store: &mut ManifestStore,
    ) -> Result<FetchSummary, KiraError> {
        let reports = self.dispatch(accessions, store)?;
        let mut summary = FetchSummary::default();
        for report in reports {
            match report {
                PartitionReport::Completed { outcomes, .. } => {
                    for outcome in outcomes {
                        if outcome.attempts == 0 {
                            summary.skipped += 1;
                        } else {
                            summary.attempted += 1;
                        }
                        store.record_fetch_outcome(&outcome.accession, outcome.is_ok);
                    }
                }
                PartitionReport::Failed {
                    index,
                    accessions,
                    reason,
                } => {
                    error!(
                        partition = index,
                        accessions = accessions.len(),
                        "fetch worker failed: {reason}"
                    );
                    for accession in &accessions {
                        store.record_fetch_outcome(accession, false);
                    }
                    summary.failed_partitions.push(FailedPartition {
                        index,
                        accessions: accessions.len(),
                        reason,
                    });
                }
            }
        }

        revalidate(accessions, store);
        for accession in accessions {
            match store.get(accession) {
                Some(record) if record.is_ok => summary.ok += 1,
                _ => summary.failed += 1,
            }
        }
        Ok(summary)
    }

    /// Runs one worker per partition. The store is only read here.
    pub fn dispatch(
        &self,
        accessions: &[Accession],
        store: &ManifestStore,
    ) -> Result<Vec<PartitionReport>, KiraError> {
        let partitions = partition_workers(accessions, self.workers);
        if partitions.is_empty() {
            return Ok(Vec::new());
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(partitions.len())
            .build()
            .map_err(|err| KiraError::WorkerPool(err.to_string()))?;
        Ok(pool.install(|| {
            partitions
                .par_iter()
                .enumerate()
                .map(|(index, partition)| self.supervise(index, partition, store))
                .collect()
        }))
    }

    fn supervise(
        &self,
        index: usize,
        partition: &[Accession],
        store: &ManifestStore,
    ) -> PartitionReport {
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            partition
                .iter()
                .map(|accession| self.fetch_one(accession, store))
                .collect::<Vec<_>>()
        }));
        match result {
            Ok(outcomes) => PartitionReport::Completed { index, outcomes },
            Err(payload) => {
                let reason = if let Some(msg) = payload.downcast_ref::<&str>() {
                    msg.to_string()
                } else if let Some(msg) = payload.downcast_ref::<String>() {
                    msg.clone()
                } else {
                    "unknown panic".to_string()
                };
                PartitionReport::Failed {
                    index,
                    accessions: partition.to_vec(),
                    reason,
                }
            }
        }
    }

    fn fetch_one(&self, accession: &Accession, store: &ManifestStore) -> FetchOutcome {
        let Some(record) = store.get(accession) else {
            warn!(accession = accession.as_str(), "accession missing from manifest");
            return FetchOutcome {
                accession: accession.clone(),
                is_ok: false,
                attempts: 0,
            };
        };
        // A file left by an earlier run must not count for this one.
        let destination = record.filename.as_std_path();
        if let Err(err) = fs_util::remove_stale_file(destination) {
            warn!(accession = accession.as_str(), "{err}");
            return FetchOutcome {
                accession: accession.clone(),
                is_ok: false,
                attempts: 0,
            };
        }
        if record.links.is_empty() {
            debug!(accession = accession.as_str(), "no links resolved, skipping");
            return FetchOutcome {
                accession: accession.clone(),
                is_ok: false,
                attempts: 0,
            };
        }

        let mut attempts = 0usize;
        let mut is_ok = false;
        for link in &record.links {
            attempts += 1;
            if let Err(err) = self.extractor.extract(link, destination) {
                debug!(
                    accession = accession.as_str(),
                    link = link.as_str(),
                    "extraction failed: {err}"
                );
            }
            if fs_util::validate_file(destination) {
                is_ok = true;
                break;
            }
        }
        if is_ok {
            info!(accession = accession.as_str(), attempts, "fetched");
        } else {
            warn!(accession = accession.as_str(), attempts, "all links failed");
        }
        self.throttle.pause();
        FetchOutcome {
            accession: accession.clone(),
            is_ok,
            attempts,
        }
    }
}

/// Overwrites `is_ok` with what is actually on disk. Accessions that never
/// resolved a link stay failed.
pub fn revalidate(accessions: &[Accession], store: &mut ManifestStore) {
    for accession in accessions {
        let is_ok = store
            .get(accession)
            .map(|record| {
                !record.links.is_empty()
                    && !record.filename.as_str().is_empty()
                    && fs_util::validate_file(record.filename.as_std_path())
            })
            .unwrap_or(false);
        store.record_fetch_outcome(accession, is_ok);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accs(n: usize) -> Vec<Accession> {
        (0..n).map(|i| format!("SRR{i}").parse().unwrap()).collect()
    }

    #[test]
    fn partitions_are_disjoint_and_complete() {
        let list = accs(10);
        let parts = partition_workers(&list, 3);
        let lens = parts.iter().map(|part| part.len()).collect::<Vec<_>>();
        assert_eq!(lens, vec![4, 3, 3]);
        assert_eq!(parts.concat(), list);
    }

    #[test]
    fn never_more_partitions_than_accessions() {
        let list = accs(2);
        assert_eq!(partition_workers(&list, 8).len(), 2);
        assert_eq!(partition_workers(&list, 0).len(), 1);
        assert!(partition_workers(&[], 4).is_empty());
    }
}
