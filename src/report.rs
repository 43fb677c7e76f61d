use std::path::{Path, PathBuf};

use csv::WriterBuilder;

use crate::error::KiraError;
use crate::fs_util;
use crate::manifest::{ManifestRecord, ManifestStore};

pub const MANIFEST_FILE: &str = "manifest.txt";

const COLUMNS: [&str; 10] = [
    "query",
    "accession",
    "size",
    "md5",
    "modification_date",
    "download_date",
    "links",
    "folder",
    "filename",
    "is_ok",
];

pub fn manifest_path(outdir: &Path) -> PathBuf {
    outdir.join(MANIFEST_FILE)
}

/// Tab-delimited, one row per record, header first. Cells holding tabs,
/// newlines or quotes are quoted.
pub fn render_manifest(store: &ManifestStore) -> Result<Vec<u8>, KiraError> {
    let mut writer = WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(Vec::new());
    writer.write_record(COLUMNS).map_err(manifest_error)?;
    for record in store.records() {
        writer.write_record(row(record)).map_err(manifest_error)?;
    }
    writer
        .into_inner()
        .map_err(|err| KiraError::Filesystem(format!("manifest: {err}")))
}

fn row(record: &ManifestRecord) -> [String; 10] {
    [
        record.query.to_string(),
        record.accession.clone().unwrap_or_default(),
        record.size.to_string(),
        record.md5.clone().unwrap_or_default(),
        record.modification_date.clone().unwrap_or_default(),
        record.download_date.clone().unwrap_or_default(),
        record.links.join(";"),
        record.folder.to_string(),
        record.filename.to_string(),
        record.is_ok.to_string(),
    ]
}

fn manifest_error(err: csv::Error) -> KiraError {
    KiraError::Filesystem(format!("manifest: {err}"))
}

pub fn write_manifest(store: &ManifestStore, outdir: &Path) -> Result<PathBuf, KiraError> {
    let path = manifest_path(outdir);
    fs_util::write_bytes_atomic(&path, &render_manifest(store)?)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use camino::Utf8PathBuf;

    use super::*;
    use crate::domain::Accession;
    use crate::manifest::ManifestPatch;

    #[test]
    fn renders_header_and_rows() {
        let list: Vec<Accession> = vec!["SRR1".parse().unwrap(), "SRR2".parse().unwrap()];
        let mut store = ManifestStore::initialize(&list);
        store.merge(
            &list[0],
            ManifestPatch {
                accession: Some("SRR1".to_string()),
                size: Some(10),
                links: Some(vec!["a".to_string(), "b".to_string()]),
                filename: Some(Utf8PathBuf::from("out/X_0/SRR1.fasta")),
                ..ManifestPatch::default()
            },
        );
        store.record_fetch_outcome(&list[0], true);

        let text = String::from_utf8(render_manifest(&store).unwrap()).unwrap();
        let lines = text.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("query\taccession\tsize"));
        assert_eq!(lines[1], "SRR1\tSRR1\t10\t\t\t\ta;b\t\tout/X_0/SRR1.fasta\ttrue");
        assert_eq!(lines[2], "SRR2\t\t0\t\t\t\t\t\t\tfalse");
    }

    #[test]
    fn awkward_cells_are_quoted_not_rewritten() {
        let list: Vec<Accession> = vec!["SRR1".parse().unwrap()];
        let mut store = ManifestStore::initialize(&list);
        store.merge(
            &list[0],
            ManifestPatch {
                md5: Some("a\tb".to_string()),
                ..ManifestPatch::default()
            },
        );

        let bytes = render_manifest(&store).unwrap();
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .from_reader(bytes.as_slice());
        let rows = reader
            .records()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(&rows[0][3], "a\tb");
        assert_eq!(&rows[0][9], "false");
    }
}
