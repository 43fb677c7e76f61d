use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::debug;

use crate::domain::Accession;
use crate::error::KiraError;
use crate::manifest::{ManifestPatch, ManifestStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderAssignment {
    pub accession: Accession,
    pub folder: Utf8PathBuf,
    pub filename: Utf8PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardPlan {
    pub folders: Vec<Utf8PathBuf>,
    pub assignments: Vec<FolderAssignment>,
}

pub fn folder_count(num_accessions: usize, folder_size: usize) -> usize {
    num_accessions.div_ceil(folder_size)
}

pub fn folder_path(outdir: &Utf8Path, prefix: &str, index: usize) -> Utf8PathBuf {
    outdir.join(format!("{prefix}_{index}"))
}

pub fn assembly_path(folder: &Utf8Path, accession: &Accession) -> Utf8PathBuf {
    folder.join(format!("{}.fasta", accession.as_str()))
}

/// Placement depends only on list position, never on resolution results.
pub fn plan(
    accessions: &[Accession],
    folder_size: usize,
    prefix: &str,
    outdir: &Utf8Path,
) -> Result<ShardPlan, KiraError> {
    if folder_size == 0 {
        return Err(KiraError::InvalidConfig(
            "folder size must be positive".to_string(),
        ));
    }
    let folders = (0..folder_count(accessions.len(), folder_size))
        .map(|index| folder_path(outdir, prefix, index))
        .collect::<Vec<_>>();
    let assignments = accessions
        .iter()
        .enumerate()
        .map(|(position, accession)| {
            let folder = folders[position / folder_size].clone();
            FolderAssignment {
                accession: accession.clone(),
                filename: assembly_path(&folder, accession),
                folder,
            }
        })
        .collect();
    Ok(ShardPlan {
        folders,
        assignments,
    })
}

pub fn create_folders(plan: &ShardPlan) -> Result<(), KiraError> {
    for folder in &plan.folders {
        debug!(folder = %folder, "creating output folder");
        fs::create_dir_all(folder.as_std_path())
            .map_err(|err| KiraError::Filesystem(format!("create {folder}: {err}")))?;
    }
    Ok(())
}

pub fn apply(plan: &ShardPlan, store: &mut ManifestStore, download_date: &str) {
    for assignment in &plan.assignments {
        store.merge(
            &assignment.accession,
            ManifestPatch {
                download_date: Some(download_date.to_string()),
                folder: Some(assignment.folder.clone()),
                filename: Some(assignment.filename.clone()),
                ..ManifestPatch::default()
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn accs(values: &[&str]) -> Vec<Accession> {
        values.iter().map(|value| value.parse().unwrap()).collect()
    }

    #[test]
    fn three_accessions_two_per_folder() {
        let list = accs(&["ACC1", "ACC2", "ACC3"]);
        let plan = plan(&list, 2, "X", Utf8Path::new("out")).unwrap();

        assert_eq!(plan.folders, vec!["out/X_0", "out/X_1"]);
        let folders = plan
            .assignments
            .iter()
            .map(|item| item.folder.as_str())
            .collect::<Vec<_>>();
        assert_eq!(folders, vec!["out/X_0", "out/X_0", "out/X_1"]);
        assert_eq!(plan.assignments[2].filename, "out/X_1/ACC3.fasta");
    }

    #[test]
    fn last_folder_fill_matches_remainder() {
        let names = (0..23).map(|i| format!("SRR{i:03}")).collect::<Vec<_>>();
        let refs = names.iter().map(String::as_str).collect::<Vec<_>>();
        let list = accs(&refs);
        for folder_size in [1, 4, 5, 23, 50] {
            let plan = plan(&list, folder_size, "P", Utf8Path::new("o")).unwrap();
            assert_eq!(plan.folders.len(), list.len().div_ceil(folder_size));
            let last = plan.folders.last().unwrap();
            let in_last = plan
                .assignments
                .iter()
                .filter(|item| &item.folder == last)
                .count();
            let expected = match list.len() % folder_size {
                0 => folder_size,
                rem => rem,
            };
            assert_eq!(in_last, expected.min(list.len()));
        }
    }

    #[test]
    fn plan_is_deterministic() {
        let list = accs(&["A", "B", "C", "D"]);
        let first = plan(&list, 3, "X", Utf8Path::new("out")).unwrap();
        let second = plan(&list, 3, "X", Utf8Path::new("out")).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn zero_folder_size_is_rejected() {
        let list = accs(&["A"]);
        assert_matches!(
            plan(&list, 0, "X", Utf8Path::new("out")),
            Err(KiraError::InvalidConfig(_))
        );
    }

    #[test]
    fn create_and_apply() {
        let temp = tempfile::tempdir().unwrap();
        let outdir = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let list = accs(&["A", "B", "C"]);
        let plan = plan(&list, 2, "X", &outdir).unwrap();
        create_folders(&plan).unwrap();
        assert!(outdir.join("X_0").is_dir());
        assert!(outdir.join("X_1").is_dir());

        let mut store = ManifestStore::initialize(&list);
        apply(&plan, &mut store, "2024-01-01T00:00:00Z");
        let record = store.get(&list[2]).unwrap();
        assert_eq!(record.folder, outdir.join("X_1"));
        assert_eq!(record.download_date.as_deref(), Some("2024-01-01T00:00:00Z"));
    }
}
