use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::KiraError;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Accession(String);

impl Accession {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Accession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Accession {
    type Err = KiraError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim();
        // Joined with ',' into the SDL query string and used as a file stem.
        let is_valid = !normalized.is_empty()
            && !normalized.chars().any(|ch| {
                ch.is_whitespace()
                    || ch.is_control()
                    || matches!(ch, ',' | '/' | '\\' | '#' | '&' | '?' | '%' | '+' | '=')
            });
        if !is_valid {
            return Err(KiraError::InvalidAccession(value.to_string()));
        }
        Ok(Self(normalized.to_string()))
    }
}

/// Sorted, duplicate-free working set of a run.
#[derive(Debug, Clone, Default)]
pub struct AccessionSet {
    unique: Vec<Accession>,
    duplicates: Vec<Accession>,
    read: usize,
}

impl AccessionSet {
    pub fn from_accessions(accessions: impl IntoIterator<Item = Accession>) -> Self {
        let mut counts = BTreeMap::<Accession, usize>::new();
        let mut read = 0usize;
        for accession in accessions {
            read += 1;
            *counts.entry(accession).or_default() += 1;
        }
        let duplicates = counts
            .iter()
            .filter(|(_, count)| **count > 1)
            .map(|(accession, _)| accession.clone())
            .collect();
        Self {
            unique: counts.into_keys().collect(),
            duplicates,
            read,
        }
    }

    pub fn as_slice(&self) -> &[Accession] {
        &self.unique
    }

    pub fn len(&self) -> usize {
        self.unique.len()
    }

    pub fn is_empty(&self) -> bool {
        self.unique.is_empty()
    }

    /// Accessions that appeared more than once in the input.
    pub fn duplicates(&self) -> &[Accession] {
        &self.duplicates
    }

    /// Number of rows read before deduplication.
    pub fn read_count(&self) -> usize {
        self.read
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn acc(value: &str) -> Accession {
        value.parse().unwrap()
    }

    #[test]
    fn parse_accession_trims() {
        assert_eq!(acc("  SRR014966\t").as_str(), "SRR014966");
    }

    #[test]
    fn parse_accession_rejects_separators() {
        assert_matches!(
            "SRR1,SRR2".parse::<Accession>(),
            Err(KiraError::InvalidAccession(_))
        );
        assert_matches!("   ".parse::<Accession>(), Err(KiraError::InvalidAccession(_)));
    }

    #[test]
    fn parse_accession_rejects_query_string_characters() {
        for value in ["SRR1#x", "SRR1&acc=SRR2", "SRR1?", "SRR%201", "SRR1+2", "a=b"] {
            assert_matches!(
                value.parse::<Accession>(),
                Err(KiraError::InvalidAccession(_)),
                "{value}"
            );
        }
        assert_eq!(acc("SRR_1-2.3").as_str(), "SRR_1-2.3");
    }

    #[test]
    fn set_is_sorted_and_unique() {
        let set = AccessionSet::from_accessions(vec![acc("ACC3"), acc("ACC1"), acc("ACC1")]);
        assert_eq!(set.as_slice(), &[acc("ACC1"), acc("ACC3")]);
        assert_eq!(set.duplicates(), &[acc("ACC1")]);
        assert_eq!(set.read_count(), 3);
    }
}
