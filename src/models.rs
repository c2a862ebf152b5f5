use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub store_mode: StoreMode,
    // Local snapshot configuration
    pub snapshot_path: Option<String>,
    // Hosted table configuration
    pub remote_url: Option<String>,
    pub remote_table: Option<String>,
    pub remote_key_env: Option<String>,
    pub output_directory: Option<String>,
    #[serde(default)]
    pub import: ImportRules,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreMode {
    #[serde(rename = "local")]
    Local,
    #[serde(rename = "remote")]
    Remote,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_mode: StoreMode::Local,
            snapshot_path: Some("data/mentors.json".to_string()),
            remote_url: Some("https://your-project.supabase.co".to_string()),
            remote_table: Some("mentors".to_string()),
            remote_key_env: Some("MENTOR_STORE_KEY".to_string()),
            output_directory: Some("output".to_string()),
            import: ImportRules::default(),
        }
    }
}

impl Config {
    pub fn load_from_file(file_path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(file_path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file(&self, file_path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(file_path, content)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.import.student_marker.is_empty() || self.import.consent_marker.is_empty() {
            return Err(Error::Config(
                "import.student_marker and import.consent_marker must not be empty".to_string(),
            ));
        }
        if self.store_mode == StoreMode::Remote && self.remote_url.as_deref().unwrap_or("").is_empty() {
            return Err(Error::Config("remote_url is required when store_mode = \"remote\"".to_string()));
        }
        Ok(())
    }
}

/// Eligibility and defaulting rules applied to every imported row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportRules {
    /// Substring the status answer must contain (case-sensitive)
    pub student_marker: String,
    /// Substring the consent answer must contain (case-sensitive)
    pub consent_marker: String,
    /// Rows with fewer cells are treated as blank submissions
    pub min_columns: usize,
    pub default_angkatan: i32,
}

impl Default for ImportRules {
    fn default() -> Self {
        Self {
            student_marker: "Mahasiswa".to_string(),
            consent_marker: "Ya".to_string(),
            min_columns: 3,
            default_angkatan: 2025,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "PTN")]
    Ptn,
    #[serde(rename = "PTS")]
    Pts,
    #[serde(rename = "PTLN")]
    Ptln,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Ptn => "PTN",
            Category::Pts => "PTS",
            Category::Ptln => "PTLN",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "PTN" => Ok(Category::Ptn),
            "PTS" => Ok(Category::Pts),
            "PTLN" => Ok(Category::Ptln),
            other => Err(Error::Config(format!("unknown category: {}", other))),
        }
    }
}

/// Admission route into the institution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdmissionPath {
    #[serde(rename = "SNBP")]
    Snbp,
    #[serde(rename = "SNBT")]
    Snbt,
    Mandiri,
    Beasiswa,
    Reguler,
}

impl AdmissionPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdmissionPath::Snbp => "SNBP",
            AdmissionPath::Snbt => "SNBT",
            AdmissionPath::Mandiri => "Mandiri",
            AdmissionPath::Beasiswa => "Beasiswa",
            AdmissionPath::Reguler => "Reguler",
        }
    }

    /// First match wins: SNBP, SNBT, then the case-insensitive word markers.
    pub fn parse(raw: &str) -> Option<Self> {
        let lower = raw.to_lowercase();
        if raw.contains("SNBP") {
            Some(AdmissionPath::Snbp)
        } else if raw.contains("SNBT") {
            Some(AdmissionPath::Snbt)
        } else if lower.contains("mandiri") {
            Some(AdmissionPath::Mandiri)
        } else if lower.contains("beasiswa") {
            Some(AdmissionPath::Beasiswa)
        } else if lower.contains("reguler") {
            Some(AdmissionPath::Reguler)
        } else {
            None
        }
    }
}

impl fmt::Display for AdmissionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A mentor row as stored in the directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MentorRecord {
    pub id: i64,
    pub name: String,
    pub university: String,
    pub major: String,
    pub path: String,
    pub category: Category,
    pub angkatan: i32,
    pub whatsapp: Option<String>,
    pub instagram: Option<String>,
    pub email: Option<String>,
    #[serde(default)]
    pub achievements: Vec<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Creation request sent to the store for each accepted row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MentorInput {
    pub name: String,
    pub university: String,
    pub major: String,
    pub path: AdmissionPath,
    pub category: Category,
    pub angkatan: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub whatsapp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instagram: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub achievements: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    New,
    Existing,
    Invalid,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Classification::New => "new",
            Classification::Existing => "existing",
            Classification::Invalid => "invalid",
        };
        f.write_str(label)
    }
}

/// Outcome of classifying one survey row. Built once, never mutated afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct ImportCandidate {
    /// 1-based record number in the source file, header = 1
    pub row_number: usize,
    pub name: String,
    pub email: String,
    pub whatsapp: String,
    pub instagram: String,
    pub university: String,
    pub major: String,
    pub path: Option<AdmissionPath>,
    pub category: Option<Category>,
    pub angkatan: i32,
    pub achievements: Vec<String>,
    pub classification: Classification,
    pub existing: Option<MentorRecord>,
    pub reasons: Vec<String>,
    pub warnings: Vec<String>,
}

impl ImportCandidate {
    /// Rows that get submitted: new, with a university.
    pub fn is_importable(&self) -> bool {
        self.classification == Classification::New && !self.university.is_empty()
    }

    pub fn to_input(&self) -> Option<MentorInput> {
        if self.classification != Classification::New {
            return None;
        }

        Some(MentorInput {
            name: self.name.clone(),
            university: self.university.clone(),
            major: self.major.clone(),
            path: self.path.unwrap_or(AdmissionPath::Mandiri),
            category: self.category.unwrap_or(Category::Ptn),
            angkatan: self.angkatan,
            whatsapp: non_empty(&self.whatsapp),
            instagram: non_empty(&self.instagram),
            email: non_empty(&self.email),
            achievements: self.achievements.clone(),
        })
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
