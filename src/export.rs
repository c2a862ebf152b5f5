use chrono::NaiveDate;
use csv::{QuoteStyle, Terminator, WriterBuilder};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::models::{Category, MentorRecord};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

const CSV_HEADERS: [&str; 10] = [
    "Nama",
    "Universitas",
    "Jurusan",
    "Jalur",
    "Kategori",
    "Angkatan",
    "WhatsApp",
    "Instagram",
    "Email",
    "Prestasi",
];

/// Narrow the directory before exporting. `None` means "All".
#[derive(Debug, Clone, Default)]
pub struct ExportFilter {
    pub category: Option<Category>,
    pub angkatan: Option<i32>,
    pub university: Option<String>,
}

impl ExportFilter {
    pub fn matches(&self, record: &MentorRecord) -> bool {
        if self.category.is_some_and(|c| c != record.category) {
            return false;
        }
        if self.angkatan.is_some_and(|a| a != record.angkatan) {
            return false;
        }
        if let Some(university) = &self.university {
            if &record.university != university {
                return false;
            }
        }
        true
    }

    pub fn apply<'a>(&self, records: &'a [MentorRecord]) -> Vec<&'a MentorRecord> {
        records.iter().filter(|r| self.matches(r)).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
    Whatsapp,
}

impl ExportFormat {
    pub fn default_file_name(&self, date: NaiveDate) -> String {
        let date = date.format("%Y-%m-%d");
        match self {
            ExportFormat::Csv => format!("mentor_data_{}.csv", date),
            ExportFormat::Json => format!("mentor_data_{}.json", date),
            ExportFormat::Whatsapp => format!("whatsapp_contacts_{}.txt", date),
        }
    }
}

impl FromStr for ExportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            "whatsapp" | "wa" | "txt" => Ok(ExportFormat::Whatsapp),
            other => Err(Error::Config(format!("unknown export format: {}", other))),
        }
    }
}

/// Spreadsheet-friendly CSV: BOM, every cell quoted, achievements joined by "; ".
pub fn write_csv<W: Write>(records: &[&MentorRecord], mut out: W) -> Result<()> {
    out.write_all(UTF8_BOM)?;

    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(out);

    writer.write_record(CSV_HEADERS)?;
    for record in records {
        let angkatan = record.angkatan.to_string();
        let achievements = record.achievements.join("; ");
        writer.write_record([
            record.name.as_str(),
            record.university.as_str(),
            record.major.as_str(),
            record.path.as_str(),
            record.category.as_str(),
            angkatan.as_str(),
            record.whatsapp.as_deref().unwrap_or(""),
            record.instagram.as_deref().unwrap_or(""),
            record.email.as_deref().unwrap_or(""),
            achievements.as_str(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

pub fn to_json(records: &[&MentorRecord]) -> Result<String> {
    Ok(serde_json::to_string_pretty(records)?)
}

/// "name - university - phone" per mentor that has a WhatsApp number.
pub fn whatsapp_contacts(records: &[&MentorRecord]) -> Vec<String> {
    records
        .iter()
        .filter_map(|r| {
            r.whatsapp
                .as_deref()
                .filter(|wa| !wa.is_empty())
                .map(|wa| format!("{} - {} - {}", r.name, r.university, wa))
        })
        .collect()
}

/// Write `records` to `path` in `format`. Returns the number of entries written.
pub fn write_export(records: &[&MentorRecord], format: ExportFormat, path: &Path) -> Result<usize> {
    match format {
        ExportFormat::Csv => {
            let file = BufWriter::new(File::create(path)?);
            write_csv(records, file)?;
            Ok(records.len())
        }
        ExportFormat::Json => {
            std::fs::write(path, to_json(records)?)?;
            Ok(records.len())
        }
        ExportFormat::Whatsapp => {
            let lines = whatsapp_contacts(records);
            std::fs::write(path, lines.join("\n"))?;
            Ok(lines.len())
        }
    }
}
