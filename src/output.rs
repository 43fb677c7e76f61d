use std::io::{self, Write};

use serde::Serialize;

use crate::app::RunResult;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Human,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_run(result: &RunResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl crate::app::ProgressSink for JsonOutput {
    fn event(&self, _event: crate::app::ProgressEvent) {}
}

pub fn print_run_summary(result: &RunResult) {
    println!("Manifest: {}", result.manifest_path);
    println!(
        "Accessions: {} read, {} unique, {} duplicated",
        result.requested,
        result.unique,
        result.duplicates.len()
    );
    println!(
        "Resolution: {} of {} resolved in {} batches ({} failed)",
        result.resolved, result.unique, result.batches, result.failed_batches
    );
    println!(
        "Fetch: {} ok, {} failed ({} without links)",
        result.ok, result.failed, result.skipped
    );
    for partition in &result.failed_partitions {
        println!(
            "Worker {} lost {} accessions: {}",
            partition.index, partition.accessions, partition.reason
        );
    }
}
