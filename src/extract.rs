use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::KiraError;

/// Materializes a local file from one resolved link.
///
/// The return value only reports whether the tool could be run; the
/// orchestrator decides success by validating `destination` afterwards.
pub trait Extractor: Send + Sync {
    fn extract(&self, link: &str, destination: &Path) -> Result<(), KiraError>;
}

impl<E: Extractor> Extractor for &E {
    fn extract(&self, link: &str, destination: &Path) -> Result<(), KiraError> {
        (**self).extract(link, destination)
    }
}

#[derive(Debug, Clone)]
pub enum ExtractorStatus {
    Ready,
    Missing { message: String },
}

/// Dumps the reference (contig) table of an SRA alignment object as FASTA.
#[derive(Clone)]
pub struct VdbDumpExtractor {
    vdb_dump: Option<PathBuf>,
}

impl VdbDumpExtractor {
    pub fn new() -> Self {
        Self {
            vdb_dump: find_in_path("vdb-dump"),
        }
    }

    pub fn with_program(program: PathBuf) -> Self {
        Self {
            vdb_dump: Some(program),
        }
    }

    pub fn tool_status(&self) -> ExtractorStatus {
        match self.vdb_dump {
            Some(_) => ExtractorStatus::Ready,
            None => ExtractorStatus::Missing {
                message: "missing vdb-dump (SRA Toolkit)".to_string(),
            },
        }
    }

    fn require_vdb_dump(&self) -> Result<&PathBuf, KiraError> {
        self.vdb_dump
            .as_ref()
            .ok_or_else(|| KiraError::MissingTool("vdb-dump".to_string()))
    }
}

impl Default for VdbDumpExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor for VdbDumpExtractor {
    fn extract(&self, link: &str, destination: &Path) -> Result<(), KiraError> {
        let program = self.require_vdb_dump()?;
        let output = Command::new(program)
            .args(["-T", "REFERENCE", "-f", "fasta2", link])
            .output()
            .map_err(|err| KiraError::Extraction(err.to_string()))?;
        // stdout is written even on a non-zero exit; validity is checked later.
        let mut file =
            File::create(destination).map_err(|err| KiraError::Filesystem(err.to_string()))?;
        file.write_all(&output.stdout)
            .map_err(|err| KiraError::Filesystem(err.to_string()))?;
        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let message = if stderr.is_empty() {
            format!("command failed: {}", program.display())
        } else {
            stderr
        };
        Err(KiraError::Extraction(message))
    }
}

fn find_in_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for path in std::env::split_paths(&path_var) {
        let exe = path.join(format!("{name}.exe"));
        if exe.exists() {
            return Some(exe);
        }
        let plain = path.join(name);
        if plain.exists() {
            return Some(plain);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn missing_program_is_reported() {
        let extractor = VdbDumpExtractor { vdb_dump: None };
        assert_matches!(extractor.tool_status(), ExtractorStatus::Missing { .. });
        let temp = tempfile::tempdir().unwrap();
        let err = extractor
            .extract("https://example/SRR1", &temp.path().join("SRR1.fasta"))
            .unwrap_err();
        assert_matches!(err, KiraError::MissingTool(_));
    }

    #[cfg(unix)]
    #[test]
    fn stdout_is_captured_into_destination() {
        let temp = tempfile::tempdir().unwrap();
        // `echo` stands in for vdb-dump and prints its arguments.
        let extractor = VdbDumpExtractor::with_program(PathBuf::from("echo"));
        let destination = temp.path().join("SRR1.fasta");
        extractor.extract("https://example/SRR1", &destination).unwrap();
        let content = std::fs::read_to_string(&destination).unwrap();
        assert_eq!(content.trim(), "-T REFERENCE -f fasta2 https://example/SRR1");
    }
}
