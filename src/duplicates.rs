use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::models::MentorRecord;
use crate::normalize::duplicate_key;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Similarity {
    Exact,
    Similar,
}

#[derive(Debug, Clone, Serialize)]
pub struct DuplicateGroup {
    pub key: String,
    pub similarity: Similarity,
    pub mentors: Vec<MentorRecord>,
}

/// Groups for manual review. Nothing here deletes or merges records.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DuplicateReport {
    pub exact: Vec<DuplicateGroup>,
    pub similar: Vec<DuplicateGroup>,
}

impl DuplicateReport {
    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.similar.is_empty()
    }

    /// Records beyond the first of every exact group.
    pub fn redundant_count(&self) -> usize {
        self.exact.iter().map(|g| g.mentors.len() - 1).sum()
    }

    /// Ids of every exact-group member except the first. Similar groups are
    /// left for manual review.
    pub fn redundant_ids(&self) -> Vec<i64> {
        self.exact
            .iter()
            .flat_map(|g| g.mentors.iter().skip(1).map(|m| m.id))
            .collect()
    }
}

/// Group records by key, keeping groups in first-seen order.
fn group_by<F>(records: &[MentorRecord], key_of: F) -> Vec<(String, Vec<MentorRecord>)>
where
    F: Fn(&MentorRecord) -> Option<String>,
{
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(String, Vec<MentorRecord>)> = Vec::new();

    for record in records {
        let Some(key) = key_of(record) else {
            continue;
        };
        match index.get(&key) {
            Some(&pos) => groups[pos].1.push(record.clone()),
            None => {
                index.insert(key.clone(), groups.len());
                groups.push((key, vec![record.clone()]));
            }
        }
    }

    groups
}

/// "first-last" key from the lowercase name; single-token names have none.
fn first_last_key(name: &str) -> Option<String> {
    let lowered = name.trim().to_lowercase();
    let parts: Vec<&str> = lowered.split_whitespace().collect();
    match (parts.first(), parts.last()) {
        (Some(first), Some(last)) if parts.len() >= 2 => Some(format!("{}-{}", first, last)),
        _ => None,
    }
}

pub fn find_duplicates(records: &[MentorRecord]) -> DuplicateReport {
    let mut exact: Vec<DuplicateGroup> = group_by(records, |r| Some(duplicate_key(&r.name)))
        .into_iter()
        .filter(|(_, mentors)| mentors.len() > 1)
        .map(|(key, mentors)| DuplicateGroup {
            key,
            similarity: Similarity::Exact,
            mentors,
        })
        .collect();

    let mut similar: Vec<DuplicateGroup> = group_by(records, |r| first_last_key(&r.name))
        .into_iter()
        .filter(|(_, mentors)| {
            let distinct: HashSet<String> = mentors.iter().map(|m| duplicate_key(&m.name)).collect();
            mentors.len() > 1 && distinct.len() > 1
        })
        .map(|(key, mentors)| DuplicateGroup {
            key,
            similarity: Similarity::Similar,
            mentors,
        })
        .collect();

    // Largest groups first; sort_by is stable so ties keep first-seen order
    exact.sort_by(|a, b| b.mentors.len().cmp(&a.mentors.len()));
    similar.sort_by(|a, b| b.mentors.len().cmp(&a.mentors.len()));

    DuplicateReport { exact, similar }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;

    fn mentor(id: i64, name: &str) -> MentorRecord {
        MentorRecord {
            id,
            name: name.to_string(),
            university: "Universitas Gadjah Mada".to_string(),
            major: "Farmasi".to_string(),
            path: "SNBT".to_string(),
            category: Category::Ptn,
            angkatan: 2024,
            whatsapp: None,
            instagram: None,
            email: None,
            achievements: vec![],
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_exact_group_of_three() {
        let records = vec![
            mentor(1, "Budi Santoso"),
            mentor(2, "budi  santoso"),
            mentor(3, "BUDI SANTOSO."),
            mentor(4, "Siti Aminah"),
        ];
        let report = find_duplicates(&records);

        assert_eq!(report.exact.len(), 1);
        assert_eq!(report.exact[0].key, "budi santoso");
        assert_eq!(report.exact[0].mentors.len(), 3);
        assert_eq!(report.redundant_count(), 2);
        assert_eq!(report.redundant_ids(), vec![2, 3]);
        // all three share one normalized name, so they are not "similar"
        assert!(report.similar.is_empty());
    }

    #[test]
    fn test_similar_names_need_distinct_spellings() {
        let records = vec![
            mentor(1, "Muhammad Rizki"),
            mentor(2, "Muhammad Fajar Rizki"),
            mentor(3, "Dewi"),
            mentor(4, "Dewi"),
        ];
        let report = find_duplicates(&records);

        assert_eq!(report.similar.len(), 1);
        assert_eq!(report.similar[0].key, "muhammad-rizki");
        assert_eq!(report.similar[0].similarity, Similarity::Similar);
        assert_eq!(report.exact.len(), 1);
        assert_eq!(report.exact[0].key, "dewi");
        // the similar "muhammad-rizki" pair is never selected for removal
        assert_eq!(report.redundant_ids(), vec![4]);
    }

    #[test]
    fn test_groups_sorted_by_size() {
        let records = vec![
            mentor(1, "Ani Lestari"),
            mentor(2, "Ani Lestari"),
            mentor(3, "Joko Widodo"),
            mentor(4, "Joko Widodo"),
            mentor(5, "Joko Widodo"),
        ];
        let report = find_duplicates(&records);
        assert_eq!(report.exact[0].key, "joko widodo");
        assert_eq!(report.exact[1].key, "ani lestari");
    }

    #[test]
    fn test_no_duplicates() {
        let report = find_duplicates(&[mentor(1, "Ani"), mentor(2, "Budi")]);
        assert!(report.is_empty());
    }
}
