use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::locator::{self, Branch, ColumnLayout, Field, GroupKind, LocatorDecision};
use crate::models::{AdmissionPath, Classification, ImportCandidate, ImportRules, MentorInput, MentorRecord};
use crate::normalize::{
    identity_key, normalize_email, normalize_instagram, normalize_name, normalize_university, normalize_whatsapp,
};
use crate::tokenizer;

#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub layout: Vec<LocatorDecision>,
    pub candidates: Vec<ImportCandidate>,
    /// Data rows dropped before classification (blank submissions, no name)
    pub skipped_rows: usize,
    pub total_rows: usize,
}

impl ImportReport {
    fn empty() -> Self {
        Self {
            layout: Vec::new(),
            candidates: Vec::new(),
            skipped_rows: 0,
            total_rows: 0,
        }
    }

    pub fn with_classification(&self, classification: Classification) -> impl Iterator<Item = &ImportCandidate> {
        self.candidates.iter().filter(move |c| c.classification == classification)
    }

    pub fn new_count(&self) -> usize {
        self.with_classification(Classification::New).count()
    }

    pub fn existing_count(&self) -> usize {
        self.with_classification(Classification::Existing).count()
    }

    pub fn invalid_count(&self) -> usize {
        self.with_classification(Classification::Invalid).count()
    }

    /// New candidates that carry a university.
    pub fn importable(&self) -> impl Iterator<Item = &ImportCandidate> {
        self.candidates.iter().filter(|c| c.is_importable())
    }

    pub fn inputs(&self) -> Vec<MentorInput> {
        self.importable().filter_map(|c| c.to_input()).collect()
    }
}

pub struct ImportClassifier<'a> {
    rules: &'a ImportRules,
    existing: HashMap<String, &'a MentorRecord>,
}

impl<'a> ImportClassifier<'a> {
    /// `existing` is the snapshot of the directory taken before the import.
    pub fn new(existing: &'a [MentorRecord], rules: &'a ImportRules) -> Self {
        let mut by_name = HashMap::new();
        for record in existing {
            by_name.entry(identity_key(&record.name)).or_insert(record);
        }

        Self {
            rules,
            existing: by_name,
        }
    }

    pub fn classify_text(&self, text: &str) -> ImportReport {
        let rows = tokenizer::tokenize(text);
        match tokenizer::split_header(rows) {
            Some((header, rows)) => self.classify_rows(&header, &rows),
            None => {
                warn!("CSV has no data rows");
                ImportReport::empty()
            }
        }
    }

    pub fn classify_rows(&self, header: &[String], rows: &[Vec<String>]) -> ImportReport {
        let layout = ColumnLayout::from_header(header);
        if layout.column(Field::Name).is_none() {
            warn!("No name column found; every row will be skipped");
        }

        let mut candidates = Vec::with_capacity(rows.len());
        let mut skipped_rows = 0;

        for (idx, row) in rows.iter().enumerate() {
            // header is record 1
            match self.classify_row(&layout, row, idx + 2) {
                Some(candidate) => candidates.push(candidate),
                None => skipped_rows += 1,
            }
        }

        let report = ImportReport {
            layout: layout.decisions().to_vec(),
            candidates,
            skipped_rows,
            total_rows: rows.len(),
        };

        info!(
            total = report.total_rows,
            new = report.new_count(),
            existing = report.existing_count(),
            invalid = report.invalid_count(),
            skipped = report.skipped_rows,
            "Classified import file"
        );

        report
    }

    fn classify_row(&self, layout: &ColumnLayout, row: &[String], row_number: usize) -> Option<ImportCandidate> {
        if row.len() < self.rules.min_columns {
            debug!(row_number, cells = row.len(), "Skipping short row");
            return None;
        }

        let raw_name = layout.value(row, Field::Name);
        if raw_name.is_empty() {
            debug!(row_number, "Skipping row without a name");
            return None;
        }

        let name = normalize_name(raw_name);
        let email = normalize_email(layout.value(row, Field::Email));
        let angkatan = parse_angkatan(layout.value(row, Field::Angkatan), self.rules.default_angkatan);

        // Step 1: eligibility gate
        let status = layout.value(row, Field::Status);
        let consent = layout.value(row, Field::Consent);
        let mut reasons = Vec::new();

        if !status.contains(&self.rules.student_marker) {
            reasons.push(format!(
                "status '{}' does not contain '{}'",
                status, self.rules.student_marker
            ));
        }
        if !consent.contains(&self.rules.consent_marker) {
            reasons.push(format!(
                "consent '{}' does not contain '{}'",
                consent, self.rules.consent_marker
            ));
        }

        if !reasons.is_empty() {
            return Some(ImportCandidate {
                row_number,
                name,
                email,
                whatsapp: String::new(),
                instagram: String::new(),
                university: String::new(),
                major: String::new(),
                path: None,
                category: None,
                angkatan,
                achievements: Vec::new(),
                classification: Classification::Invalid,
                existing: None,
                reasons,
                warnings: Vec::new(),
            });
        }

        // Step 2: institution group for this row
        let institution_type = layout.value(row, Field::InstitutionType);
        let branch = locator::resolve_branch(institution_type);
        reasons.push(format!("institution type '{}' -> {} group", institution_type, branch));

        let mut skip = layout.fixed_columns();
        let mut warnings = Vec::new();

        // Step 3: university and major, with content fallback
        let university = match self.extract_group(layout, row, GroupKind::University, branch, &skip, &mut reasons) {
            Some((column, value)) => {
                skip.push(column);
                normalize_university(&value)
            }
            None => String::new(),
        };
        let major = self
            .extract_group(layout, row, GroupKind::Major, branch, &skip, &mut reasons)
            .map(|(_, value)| value)
            .unwrap_or_default();

        // Step 4: admission path
        let raw_path = layout
            .group_value(row, GroupKind::Path, branch)
            .map(|(_, value)| value)
            .unwrap_or("");
        let path = match AdmissionPath::parse(raw_path) {
            Some(path) => path,
            None => {
                if !raw_path.is_empty() {
                    warnings.push(format!("unrecognised admission path '{}', using Mandiri", raw_path));
                }
                AdmissionPath::Mandiri
            }
        };

        // Step 5: contacts
        let whatsapp = normalize_whatsapp(layout.value(row, Field::Whatsapp));
        let instagram = normalize_instagram(layout.value(row, Field::Instagram));
        let achievements = parse_achievements(layout.value(row, Field::Achievements));

        for (label, value) in [
            ("whatsapp", &whatsapp),
            ("instagram", &instagram),
            ("email", &email),
            ("university", &university),
            ("major", &major),
        ] {
            if value.is_empty() {
                warnings.push(format!("missing {}", label));
            }
        }

        // Step 6: match against the directory
        let existing = self.existing.get(&identity_key(&name)).map(|record| (*record).clone());
        let classification = match &existing {
            Some(record) => {
                reasons.push(format!("name matches existing mentor #{} ({})", record.id, record.university));
                Classification::Existing
            }
            None => {
                reasons.push(format!("no existing mentor named '{}'", name));
                Classification::New
            }
        };

        Some(ImportCandidate {
            row_number,
            name,
            email,
            whatsapp,
            instagram,
            university,
            major,
            path: Some(path),
            category: Some(branch.category()),
            angkatan,
            achievements,
            classification,
            existing,
            reasons,
            warnings,
        })
    }

    /// Group column for the branch first, then the content-pattern scan.
    fn extract_group(
        &self,
        layout: &ColumnLayout,
        row: &[String],
        kind: GroupKind,
        branch: Branch,
        skip: &[usize],
        reasons: &mut Vec<String>,
    ) -> Option<(usize, String)> {
        let label = match kind {
            GroupKind::University => "university",
            GroupKind::Major => "major",
            GroupKind::Path => "path",
        };

        if let Some((column, value)) = layout.group_value(row, kind, branch) {
            reasons.push(format!("{}: column {} ('{}')", label, column, layout.header_name(column)));
            return Some((column, value.to_string()));
        }

        let found = match kind {
            GroupKind::University => locator::smart_university(row, skip),
            GroupKind::Major => locator::smart_major(row, skip),
            GroupKind::Path => None,
        };

        match found {
            Some(m) => {
                reasons.push(format!(
                    "{}: column {} via content pattern '{}'",
                    label, m.column, m.keyword
                ));
                Some((m.column, m.value))
            }
            None => {
                reasons.push(format!("{}: not found", label));
                None
            }
        }
    }
}

/// Leading year digits, e.g. "2024 (gelombang 2)" -> 2024.
fn parse_angkatan(raw: &str, default: i32) -> i32 {
    let digits: String = raw.trim().chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().unwrap_or(default)
}

/// Split on commas and newlines; drop "-" and entries shorter than 3 characters.
pub fn parse_achievements(raw: &str) -> Vec<String> {
    raw.split([',', '\n'])
        .map(str::trim)
        .filter(|a| *a != "-" && a.chars().count() >= 3)
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;

    fn strings(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    fn header() -> Vec<String> {
        strings(&[
            "Timestamp",
            "Email Address",
            "Nama Lengkap",
            "Status Saat Ini",
            "Nomor WhatsApp",
            "Username Instagram",
            "Jenis Perguruan Tinggi",
            "Nama Universitas",
            "Program Studi",
            "Jalur Masuk",
            "Nama Politeknik",
            "Program Studi Politeknik",
            "Apakah kamu bersedia menjadi mentor AMP?",
            "Angkatan",
            "Prestasi",
        ])
    }

    #[allow(clippy::too_many_arguments)]
    fn row(name: &str, status: &str, jenis: &str, uni: &str, major: &str, poli: &str, poli_major: &str, consent: &str) -> Vec<String> {
        strings(&[
            "1/1/2025",
            "Budi@Mail.com ",
            name,
            status,
            "0812-3456-7890",
            "@budi.s",
            jenis,
            uni,
            major,
            "SNBT 2024",
            poli,
            poli_major,
            consent,
            "2024",
            "Juara 1 OSN Fisika, -\nxy",
        ])
    }

    fn record(id: i64, name: &str) -> MentorRecord {
        MentorRecord {
            id,
            name: name.to_string(),
            university: "Universitas Indonesia".to_string(),
            major: "Hukum".to_string(),
            path: "SNBP".to_string(),
            category: Category::Ptn,
            angkatan: 2023,
            whatsapp: None,
            instagram: None,
            email: None,
            achievements: vec![],
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_non_student_is_invalid() {
        let rules = ImportRules::default();
        let classifier = ImportClassifier::new(&[], &rules);
        let rows = vec![row("Budi", "Alumni", "PTN", "UI", "Hukum", "", "", "Ya")];

        let report = classifier.classify_rows(&header(), &rows);
        let candidate = &report.candidates[0];

        assert_eq!(candidate.classification, Classification::Invalid);
        assert!(candidate.reasons.iter().any(|r| r.contains("status")));
        assert!(candidate.university.is_empty());
        assert!(candidate.whatsapp.is_empty());
        assert!(candidate.warnings.is_empty());
        assert_eq!(candidate.category, None);
    }

    #[test]
    fn test_missing_consent_is_invalid() {
        let rules = ImportRules::default();
        let classifier = ImportClassifier::new(&[], &rules);
        let rows = vec![row("Budi", "Mahasiswa Aktif", "PTN", "UI", "Hukum", "", "", "Tidak")];

        let report = classifier.classify_rows(&header(), &rows);
        let candidate = &report.candidates[0];
        assert_eq!(candidate.classification, Classification::Invalid);
        assert_eq!(candidate.reasons.len(), 1);
        assert!(candidate.reasons[0].contains("consent"));
    }

    #[test]
    fn test_known_name_is_existing() {
        let rules = ImportRules::default();
        let existing = vec![record(7, "Budi Santoso")];
        let classifier = ImportClassifier::new(&existing, &rules);
        let rows = vec![row("  budi SANTOSO", "Mahasiswa", "Perguruan Tinggi Negeri", "universitas indonesia", "Hukum", "", "", "Ya, saya bersedia")];

        let report = classifier.classify_rows(&header(), &rows);
        let candidate = &report.candidates[0];
        assert_eq!(candidate.classification, Classification::Existing);
        assert_eq!(candidate.existing.as_ref().map(|r| r.id), Some(7));
        assert_eq!(candidate.name, "Budi Santoso");
    }

    #[test]
    fn test_new_row_is_normalized() {
        let rules = ImportRules::default();
        let classifier = ImportClassifier::new(&[], &rules);
        let rows = vec![row("siti aminah", "Mahasiswa", "Perguruan Tinggi Negeri", "universitas indonesia", "Hukum", "", "", "Ya")];

        let report = classifier.classify_rows(&header(), &rows);
        let c = &report.candidates[0];
        assert_eq!(c.classification, Classification::New);
        assert_eq!(c.row_number, 2);
        assert_eq!(c.email, "budi@mail.com");
        assert_eq!(c.whatsapp, "wa.me/6281234567890");
        assert_eq!(c.instagram, "budi.s");
        assert_eq!(c.university, "Universitas Indonesia");
        assert_eq!(c.major, "Hukum");
        assert_eq!(c.path, Some(AdmissionPath::Snbt));
        assert_eq!(c.category, Some(Category::Ptn));
        assert_eq!(c.angkatan, 2024);
        assert_eq!(c.achievements, vec!["Juara 1 OSN Fisika"]);
        assert!(c.warnings.is_empty());
        assert_eq!(report.inputs().len(), 1);
    }

    #[test]
    fn test_polytechnic_uses_polytechnic_group() {
        let rules = ImportRules::default();
        let classifier = ImportClassifier::new(&[], &rules);
        let rows = vec![row(
            "Dedi",
            "Mahasiswa",
            "Politeknik Negeri",
            "Universitas Salah",
            "Jurusan Salah",
            "Politeknik Negeri Bandung",
            "Teknik Kimia",
            "Ya",
        )];

        let report = classifier.classify_rows(&header(), &rows);
        let c = &report.candidates[0];
        assert_eq!(c.university, "Politeknik Negeri Bandung");
        assert_eq!(c.major, "Teknik Kimia");
        assert_eq!(c.category, Some(Category::Ptn));
    }

    /// A survey-form export row: generic headers, so every column comes from its form position.
    fn form_row(cells: &[(usize, &str)]) -> (Vec<String>, Vec<String>) {
        let header = (0..locator::FORM_WIDTH).map(|i| format!("Pertanyaan {}", i)).collect();
        let mut row = vec![String::new(); locator::FORM_WIDTH];
        for (idx, value) in cells {
            row[*idx] = value.to_string();
        }
        (header, row)
    }

    #[test]
    fn test_overseas_row_reads_overseas_group() {
        let rules = ImportRules::default();
        let classifier = ImportClassifier::new(&[], &rules);
        let (header, row) = form_row(&[
            (2, "Fajar Nugroho"),
            (6, "Mahasiswa"),
            (7, "Perguruan Tinggi Luar Negeri"),
            (8, "Universitas Salah"),
            (9, "Jurusan Salah"),
            (11, "SNBP"),
            (24, "Universiti Malaya"),
            (25, "Kejuruteraan Awam"),
            (27, "Beasiswa LPDP"),
            (42, "Ya"),
        ]);

        let report = classifier.classify_rows(&header, &[row]);
        let c = &report.candidates[0];
        assert_eq!(c.classification, Classification::New);
        assert_eq!(c.university, "Universiti Malaya");
        assert_eq!(c.major, "Kejuruteraan Awam");
        assert_eq!(c.path, Some(AdmissionPath::Beasiswa));
        assert_eq!(c.category, Some(Category::Ptln));
    }

    #[test]
    fn test_civil_service_row_reads_civil_service_group() {
        let rules = ImportRules::default();
        let classifier = ImportClassifier::new(&[], &rules);
        let (header, row) = form_row(&[
            (2, "Gita Savitri"),
            (6, "Mahasiswa"),
            (7, "Sekolah Kedinasan"),
            (8, "Universitas Salah"),
            (12, "Institut Pemerintahan Dalam Negeri"),
            (13, "Manajemen Pemerintahan"),
            (15, "Jalur Reguler"),
            (42, "Ya"),
        ]);

        let report = classifier.classify_rows(&header, &[row]);
        let c = &report.candidates[0];
        assert_eq!(c.university, "Institut Pemerintahan Dalam Negeri");
        assert_eq!(c.major, "Manajemen Pemerintahan");
        assert_eq!(c.path, Some(AdmissionPath::Reguler));
        assert_eq!(c.category, Some(Category::Ptn));
        assert!(c.reasons.iter().any(|r| r.contains("civil-service academy group")));
    }

    #[test]
    fn test_content_fallback_and_warnings() {
        let rules = ImportRules::default();
        let classifier = ImportClassifier::new(&[], &rules);
        let header = strings(&["Email", "Nama", "Status", "Bersedia", "Catatan 1", "Catatan 2", "Catatan 3"]);
        let rows = vec![strings(&[
            "",
            "Rina",
            "Mahasiswa",
            "Ya",
            "Perguruan Tinggi Negeri",
            "Institut Teknologi Sepuluh Nopember",
            "Sistem Informasi",
        ])];

        let report = classifier.classify_rows(&header, &rows);
        let c = &report.candidates[0];
        assert_eq!(c.classification, Classification::New);
        assert_eq!(c.university, "Institut Teknologi Sepuluh Nopember");
        assert_eq!(c.major, "Sistem Informasi");
        assert!(c.reasons.iter().any(|r| r.contains("content pattern 'institut'")));
        assert!(c.warnings.contains(&"missing whatsapp".to_string()));
        assert!(c.warnings.contains(&"missing email".to_string()));
        assert_eq!(c.path, Some(AdmissionPath::Mandiri));
    }

    #[test]
    fn test_short_and_nameless_rows_are_skipped() {
        let rules = ImportRules::default();
        let classifier = ImportClassifier::new(&[], &rules);
        let rows = vec![
            strings(&["x"]),
            row("", "Mahasiswa", "PTN", "UI", "Hukum", "", "", "Ya"),
            row("Ani", "Mahasiswa", "PTN", "UI", "Hukum", "", "", "Ya"),
        ];

        let report = classifier.classify_rows(&header(), &rows);
        assert_eq!(report.total_rows, 3);
        assert_eq!(report.skipped_rows, 2);
        assert_eq!(report.candidates.len(), 1);
        assert_eq!(report.candidates[0].row_number, 4);
    }

    #[test]
    fn test_unrecognised_path_defaults_with_warning() {
        let rules = ImportRules::default();
        let classifier = ImportClassifier::new(&[], &rules);
        let mut cells = row("Ani", "Mahasiswa", "PTN", "UI", "Hukum", "", "", "Ya");
        cells[9] = "Jalur Prestasi".to_string();

        let report = classifier.classify_rows(&header(), &[cells]);
        let c = &report.candidates[0];
        assert_eq!(c.path, Some(AdmissionPath::Mandiri));
        assert!(c.warnings.iter().any(|w| w.contains("Jalur Prestasi")));
    }

    #[test]
    fn test_classify_text_without_rows() {
        let rules = ImportRules::default();
        let classifier = ImportClassifier::new(&[], &rules);
        let report = classifier.classify_text("Nama,Email\n");
        assert!(report.candidates.is_empty());
        assert_eq!(report.total_rows, 0);
    }

    #[test]
    fn test_parse_helpers() {
        assert_eq!(parse_angkatan("2023 (gelombang 2)", 2025), 2023);
        assert_eq!(parse_angkatan("", 2025), 2025);
        assert_eq!(parse_angkatan("angkatan 24", 2025), 2025);
        assert_eq!(
            parse_achievements("Juara 1 LKTI\nFinalis PIMNAS, -, ok"),
            vec!["Juara 1 LKTI", "Finalis PIMNAS"]
        );
        assert!(parse_achievements("-").is_empty());
    }
}
