use std::io;
use std::path::Path;

use csv::ReaderBuilder;
use tracing::{info, warn};

use crate::domain::{Accession, AccessionSet};
use crate::error::KiraError;
use crate::fs_util;

/// Reads the first column of a tab-delimited file with a header row.
///
/// A missing or near-empty file yields an empty set; the caller decides
/// whether that is fatal.
pub fn read_accessions(path: &Path) -> Result<AccessionSet, KiraError> {
    if !fs_util::validate_file(path) {
        warn!("accession file {} is missing or empty", path.display());
        return Ok(AccessionSet::default());
    }
    let reader = reader_builder()
        .from_path(path)
        .map_err(|_| KiraError::AccessionRead(path.to_path_buf()))?;
    let set = collect_accessions(reader);
    info!("read {} accessions from {}", set.read_count(), path.display());
    if !set.duplicates().is_empty() {
        warn!(
            "found duplicate accessions in input list: {}",
            set.duplicates()
                .iter()
                .map(Accession::as_str)
                .collect::<Vec<_>>()
                .join(",")
        );
    }
    Ok(set)
}

pub fn parse_accessions(content: &str) -> AccessionSet {
    collect_accessions(reader_builder().from_reader(content.as_bytes()))
}

fn reader_builder() -> ReaderBuilder {
    let mut builder = ReaderBuilder::new();
    builder.has_headers(true).delimiter(b'\t').flexible(true);
    builder
}

fn collect_accessions<R: io::Read>(mut reader: csv::Reader<R>) -> AccessionSet {
    let accessions = reader
        .records()
        .filter_map(|row| {
            let row = match row {
                Ok(row) => row,
                Err(err) => {
                    warn!("skipping unreadable row: {err}");
                    return None;
                }
            };
            let first = row.get(0).unwrap_or_default();
            if first.trim().is_empty() {
                return None;
            }
            match first.parse::<Accession>() {
                Ok(accession) => Some(accession),
                Err(err) => {
                    warn!("skipping row: {err}");
                    None
                }
            }
        })
        .collect::<Vec<_>>();
    AccessionSet::from_accessions(accessions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_is_skipped_and_first_column_used() {
        let set = parse_accessions("run\tnote\nSRR2\tx\nSRR1\ty\n\nSRR2\tz\n");
        let ids = set
            .as_slice()
            .iter()
            .map(Accession::as_str)
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["SRR1", "SRR2"]);
        assert_eq!(set.duplicates().len(), 1);
    }

    #[test]
    fn quoted_fields_are_unquoted() {
        let set = parse_accessions("\"run\"\t\"note\"\n\"SRR1\"\t\"x\ty\"\nSRR2\n");
        let ids = set
            .as_slice()
            .iter()
            .map(Accession::as_str)
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["SRR1", "SRR2"]);
    }

    #[test]
    fn tiny_file_reads_as_empty() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("acs.tsv");
        std::fs::write(&path, "run\nA1\n").unwrap();
        assert!(read_accessions(&path).unwrap().is_empty());
        assert!(read_accessions(&temp.path().join("absent.tsv")).unwrap().is_empty());
    }
}
