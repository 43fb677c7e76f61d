use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum KiraError {
    #[error("invalid accession: {0:?}")]
    InvalidAccession(String),

    #[error("no accessions found in input file {0}")]
    #[diagnostic(help("the file needs a header row and at least one accession in the first column"))]
    EmptyInput(PathBuf),

    #[error("failed to read accession file at {0}")]
    AccessionRead(PathBuf),

    #[error("output directory {0} already exists")]
    #[diagnostic(help("pass --force to overwrite existing results"))]
    OutputExists(PathBuf),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("SDL request failed: {0}")]
    SdlHttp(String),

    #[error("SDL returned status {status}: {message}")]
    SdlStatus { status: u16, message: String },

    #[error("malformed SDL response: {0}")]
    MalformedResponse(String),

    #[error("required tool not found: {0}")]
    MissingTool(String),

    #[error("extraction failed: {0}")]
    Extraction(String),

    #[error("worker pool error: {0}")]
    WorkerPool(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
