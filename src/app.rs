use std::time::{Duration, Instant};

use camino::Utf8PathBuf;
use serde::Serialize;
use tracing::info;

use crate::config::ResolvedConfig;
use crate::domain::AccessionSet;
use crate::error::KiraError;
use crate::extract::Extractor;
use crate::fetch::{FailedPartition, FetchOrchestrator};
use crate::fs_util;
use crate::loader;
use crate::manifest::ManifestStore;
use crate::report;
use crate::resolver::{LocationClient, Resolver};
use crate::shard;

#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub requested: usize,
    pub unique: usize,
    pub duplicates: Vec<String>,
    pub folders: usize,
    pub batches: usize,
    pub failed_batches: usize,
    pub resolved: usize,
    pub unmatched: Vec<String>,
    pub ok: usize,
    pub failed: usize,
    pub skipped: usize,
    pub failed_partitions: Vec<FailedPartition>,
    pub manifest_path: String,
    #[serde(skip)]
    pub manifest: ManifestStore,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

/// Forwards progress to the log.
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => {
                info!(elapsed_ms = elapsed.as_millis() as u64, "{}", event.message)
            }
            None => info!("{}", event.message),
        }
    }
}

#[derive(Clone)]
pub struct App<L: LocationClient, E: Extractor> {
    locator: L,
    extractor: E,
}

impl<L: LocationClient, E: Extractor> App<L, E> {
    pub fn new(locator: L, extractor: E) -> Self {
        Self { locator, extractor }
    }

    /// Reads the accession file named by `config` and runs the pipeline.
    pub fn run(
        &self,
        config: &ResolvedConfig,
        sink: &dyn ProgressSink,
    ) -> Result<RunResult, KiraError> {
        sink.event(ProgressEvent {
            message: format!("phase=Load; reading {}", config.acs.display()),
            elapsed: None,
        });
        let accessions = loader::read_accessions(&config.acs)?;
        self.run_accessions(accessions, config, sink)
    }

    /// Load → shard → resolve → fetch → verify → report. Only setup errors
    /// are returned; everything else ends up in the manifest.
    pub fn run_accessions(
        &self,
        accessions: AccessionSet,
        config: &ResolvedConfig,
        sink: &dyn ProgressSink,
    ) -> Result<RunResult, KiraError> {
        config.validate()?;
        if accessions.is_empty() {
            return Err(KiraError::EmptyInput(config.acs.clone()));
        }
        fs_util::prepare_output_dir(&config.outdir, config.force)?;
        let outdir = Utf8PathBuf::from_path_buf(config.outdir.clone())
            .map_err(|_| KiraError::Filesystem("non-utf8 output directory".to_string()))?;
        let list = accessions.as_slice();
        let threads = config.worker_threads();
        let mut store = ManifestStore::initialize(list);

        sink.event(ProgressEvent {
            message: format!("phase=Shard; {} accessions", list.len()),
            elapsed: None,
        });
        let plan = shard::plan(list, config.folder_size, &config.folder_prefix, &outdir)?;
        shard::create_folders(&plan)?;
        let download_date = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
        shard::apply(&plan, &mut store, &download_date);

        sink.event(ProgressEvent {
            message: "phase=Resolve; querying SDL".to_string(),
            elapsed: None,
        });
        let start = Instant::now();
        let resolver = Resolver::new(
            &self.locator,
            &config.sdl_url,
            config.batch_size,
            threads,
            config.throttle,
        );
        let resolution = resolver.resolve(list, &mut store)?;
        sink.event(ProgressEvent {
            message: format!(
                "phase=Resolve; {} of {} accessions resolved",
                resolution.resolved,
                list.len()
            ),
            elapsed: Some(start.elapsed()),
        });

        sink.event(ProgressEvent {
            message: format!("phase=Fetch; {threads} workers"),
            elapsed: None,
        });
        let start = Instant::now();
        let orchestrator = FetchOrchestrator::new(&self.extractor, threads, config.throttle);
        let fetch = orchestrator.run(list, &mut store)?;
        sink.event(ProgressEvent {
            message: format!("phase=Verify; {} ok, {} failed", fetch.ok, fetch.failed),
            elapsed: Some(start.elapsed()),
        });

        sink.event(ProgressEvent {
            message: "phase=Report; writing manifest".to_string(),
            elapsed: None,
        });
        let manifest_path = report::write_manifest(&store, &config.outdir)?;

        Ok(RunResult {
            requested: accessions.read_count(),
            unique: list.len(),
            duplicates: accessions
                .duplicates()
                .iter()
                .map(|accession| accession.to_string())
                .collect(),
            folders: plan.folders.len(),
            batches: resolution.batches,
            failed_batches: resolution.failed_batches,
            resolved: resolution.resolved,
            unmatched: resolution.unmatched,
            ok: fetch.ok,
            failed: fetch.failed,
            skipped: fetch.skipped,
            failed_partitions: fetch.failed_partitions,
            manifest_path: manifest_path.display().to_string(),
            manifest: store,
        })
    }
}
