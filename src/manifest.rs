use std::collections::BTreeMap;

use camino::Utf8PathBuf;

use crate::domain::Accession;

/// Per-accession state of a run: resolution, placement and fetch outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestRecord {
    pub query: Accession,
    pub accession: Option<String>,
    pub size: u64,
    pub md5: Option<String>,
    pub modification_date: Option<String>,
    pub download_date: Option<String>,
    pub links: Vec<String>,
    pub folder: Utf8PathBuf,
    pub filename: Utf8PathBuf,
    pub is_ok: bool,
}

impl ManifestRecord {
    fn empty(query: Accession) -> Self {
        Self {
            query,
            accession: None,
            size: 0,
            md5: None,
            modification_date: None,
            download_date: None,
            links: Vec::new(),
            folder: Utf8PathBuf::new(),
            filename: Utf8PathBuf::new(),
            is_ok: false,
        }
    }
}

/// Partial update; `None` fields leave the record untouched.
#[derive(Debug, Clone, Default)]
pub struct ManifestPatch {
    pub accession: Option<String>,
    pub size: Option<u64>,
    pub md5: Option<String>,
    pub modification_date: Option<String>,
    pub download_date: Option<String>,
    pub links: Option<Vec<String>>,
    pub folder: Option<Utf8PathBuf>,
    pub filename: Option<Utf8PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct ManifestStore {
    records: BTreeMap<Accession, ManifestRecord>,
}

impl ManifestStore {
    pub fn initialize(accessions: &[Accession]) -> Self {
        let records = accessions
            .iter()
            .map(|accession| (accession.clone(), ManifestRecord::empty(accession.clone())))
            .collect();
        Self { records }
    }

    /// Applies `patch` to an existing record. Returns false for unknown keys;
    /// the store never grows after `initialize`.
    pub fn merge(&mut self, accession: &Accession, patch: ManifestPatch) -> bool {
        let Some(record) = self.records.get_mut(accession) else {
            return false;
        };
        if let Some(value) = patch.accession {
            record.accession = Some(value);
        }
        if let Some(value) = patch.size {
            record.size = value;
        }
        if let Some(value) = patch.md5 {
            record.md5 = Some(value);
        }
        if let Some(value) = patch.modification_date {
            record.modification_date = Some(value);
        }
        if let Some(value) = patch.download_date {
            record.download_date = Some(value);
        }
        if let Some(value) = patch.links {
            record.links = value;
        }
        if let Some(value) = patch.folder {
            record.folder = value;
        }
        if let Some(value) = patch.filename {
            record.filename = value;
        }
        true
    }

    pub fn get(&self, accession: &Accession) -> Option<&ManifestRecord> {
        self.records.get(accession)
    }

    pub fn record_fetch_outcome(&mut self, accession: &Accession, is_ok: bool) -> bool {
        match self.records.get_mut(accession) {
            Some(record) => {
                record.is_ok = is_ok;
                true
            }
            None => false,
        }
    }

    /// Maps an accession spelled by a remote service onto a manifest key:
    /// exact match first, then ASCII case-insensitive.
    pub fn resolve_key(&self, returned: &str) -> Option<Accession> {
        let trimmed = returned.trim();
        if let Ok(candidate) = trimmed.parse::<Accession>() {
            if self.records.contains_key(&candidate) {
                return Some(candidate);
            }
        }
        self.records
            .keys()
            .find(|key| key.as_str().eq_ignore_ascii_case(trimmed))
            .cloned()
    }

    /// Records in sorted key order.
    pub fn records(&self) -> impl Iterator<Item = &ManifestRecord> {
        self.records.values()
    }
}
