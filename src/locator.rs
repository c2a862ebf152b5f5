//! Maps the semantic fields of the mentor survey onto spreadsheet columns.
//!
//! The survey form has been revised several times, so the export does not have
//! a fixed column order. Every institution type (public, private, polytechnic,
//! overseas, civil-service) also has its own repeated group of university /
//! major / admission-path questions. Columns are located by header text first,
//! then by their position in the known form layout, and per row by scanning
//! cell contents for institution or field-of-study vocabulary. Every choice is
//! kept in a decision log so a reviewer can see how each value was found.

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::debug;

use crate::models::Category;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Branch {
    Public,
    Private,
    Polytechnic,
    Overseas,
    CivilService,
    Unknown,
}

impl Branch {
    /// Column groups in the order they appear in the survey export.
    pub const GROUPS: [Branch; 5] = [
        Branch::Public,
        Branch::CivilService,
        Branch::Private,
        Branch::Polytechnic,
        Branch::Overseas,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Branch::Public => "public university",
            Branch::Private => "private university",
            Branch::Polytechnic => "polytechnic",
            Branch::Overseas => "overseas",
            Branch::CivilService => "civil-service academy",
            Branch::Unknown => "unknown",
        }
    }

    pub fn category(&self) -> Category {
        match self {
            Branch::Private => Category::Pts,
            Branch::Overseas => Category::Ptln,
            _ => Category::Ptn,
        }
    }

    /// Groups consulted for university and major, most specific first.
    fn search_order(&self) -> &'static [Branch] {
        match self {
            Branch::Public => &[Branch::Public],
            Branch::Private => &[Branch::Private, Branch::Public],
            Branch::Polytechnic => &[Branch::Polytechnic],
            Branch::Overseas => &[Branch::Overseas],
            Branch::CivilService => &[Branch::CivilService],
            Branch::Unknown => &[Branch::Public, Branch::Private, Branch::Polytechnic],
        }
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum GroupKind {
    University,
    Major,
    Path,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Field {
    Name,
    Email,
    Whatsapp,
    Instagram,
    Status,
    InstitutionType,
    Consent,
    Angkatan,
    Achievements,
    Group(GroupKind, Branch),
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Name => f.write_str("name"),
            Field::Email => f.write_str("email"),
            Field::Whatsapp => f.write_str("whatsapp"),
            Field::Instagram => f.write_str("instagram"),
            Field::Status => f.write_str("status"),
            Field::InstitutionType => f.write_str("institution type"),
            Field::Consent => f.write_str("consent"),
            Field::Angkatan => f.write_str("angkatan"),
            Field::Achievements => f.write_str("achievements"),
            Field::Group(GroupKind::University, branch) => write!(f, "university ({})", branch),
            Field::Group(GroupKind::Major, branch) => write!(f, "major ({})", branch),
            Field::Group(GroupKind::Path, branch) => write!(f, "path ({})", branch),
        }
    }
}

/// Fields that are not part of an institution group. Their columns are never
/// scanned by the content-pattern fallback.
pub const FIXED_FIELDS: [Field; 9] = [
    Field::Name,
    Field::Email,
    Field::Whatsapp,
    Field::Instagram,
    Field::Status,
    Field::InstitutionType,
    Field::Consent,
    Field::Angkatan,
    Field::Achievements,
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum LocateMethod {
    Header { phrase: &'static str },
    Position,
    ContentPattern { keyword: &'static str },
    NotFound,
}

impl fmt::Display for LocateMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocateMethod::Header { phrase } => write!(f, "header match '{}'", phrase),
            LocateMethod::Position => f.write_str("form position"),
            LocateMethod::ContentPattern { keyword } => write!(f, "content pattern '{}'", keyword),
            LocateMethod::NotFound => f.write_str("not found"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocatorDecision {
    pub field: Field,
    pub method: LocateMethod,
    pub column: Option<usize>,
}

impl fmt::Display for LocatorDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.column {
            Some(column) => write!(f, "{}: column {} via {}", self.field, column, self.method),
            None => write!(f, "{}: {}", self.field, self.method),
        }
    }
}

/// Number of columns in the survey export the default positions refer to.
pub const FORM_WIDTH: usize = 47;

struct FieldSpec {
    phrases: &'static [&'static str],
    excludes: &'static [&'static str],
    position: usize,
}

const GROUP_EXCLUDES_PUBLIC: &[&str] = &["jenis", "swasta", "pts", "luar negeri", "ptln", "politeknik", "kedinasan"];
const GROUP_EXCLUDES: &[&str] = &["jenis"];

fn field_spec(field: Field) -> FieldSpec {
    use Branch::*;
    use GroupKind::*;

    match field {
        Field::Name => FieldSpec {
            phrases: &["nama lengkap", "full name", "nama"],
            excludes: &[
                "universitas", "perguruan", "politeknik", "kampus", "sekolah", "program", "jurusan",
                "prodi", "instansi", "panggilan", "ptn", "pts", "ptln",
            ],
            position: 2,
        },
        Field::Email => FieldSpec { phrases: &["email", "e-mail", "surel"], excludes: &[], position: 1 },
        Field::Whatsapp => FieldSpec {
            phrases: &["whatsapp", "nomor wa", "no. wa", "no wa", "nomor hp", "no. hp", "no hp"],
            excludes: &[],
            position: 4,
        },
        Field::Instagram => FieldSpec {
            phrases: &["instagram", "username ig", "akun ig"],
            excludes: &[],
            position: 5,
        },
        Field::Status => FieldSpec { phrases: &["status saat ini", "status"], excludes: &[], position: 6 },
        Field::InstitutionType => FieldSpec {
            phrases: &["jenis perguruan tinggi", "jenis pt", "jenis kampus", "tipe perguruan tinggi"],
            excludes: &[],
            position: 7,
        },
        Field::Consent => FieldSpec {
            phrases: &["bersedia", "persetujuan", "consent"],
            excludes: &[],
            position: 42,
        },
        Field::Angkatan => FieldSpec { phrases: &["angkatan", "tahun masuk"], excludes: &[], position: 44 },
        Field::Achievements => FieldSpec { phrases: &["prestasi", "achievement"], excludes: &[], position: 46 },

        Field::Group(University, Public) | Field::Group(University, Unknown) => FieldSpec {
            phrases: &[
                "nama ptn",
                "nama universitas negeri",
                "nama perguruan tinggi negeri",
                "nama universitas",
                "nama perguruan tinggi",
                "universitas",
            ],
            excludes: GROUP_EXCLUDES_PUBLIC,
            position: 8,
        },
        Field::Group(Major, Public) | Field::Group(Major, Unknown) => FieldSpec {
            phrases: &["program studi", "prodi", "jurusan"],
            excludes: GROUP_EXCLUDES_PUBLIC,
            position: 9,
        },
        Field::Group(Path, Public) | Field::Group(Path, Unknown) => FieldSpec {
            phrases: &["jalur masuk", "jalur penerimaan", "jalur"],
            excludes: GROUP_EXCLUDES_PUBLIC,
            position: 11,
        },

        Field::Group(University, CivilService) => FieldSpec {
            phrases: &["nama sekolah kedinasan", "nama kedinasan", "sekolah kedinasan"],
            excludes: GROUP_EXCLUDES,
            position: 12,
        },
        Field::Group(Major, CivilService) => FieldSpec {
            phrases: &["program studi kedinasan", "prodi kedinasan", "jurusan kedinasan"],
            excludes: GROUP_EXCLUDES,
            position: 13,
        },
        Field::Group(Path, CivilService) => FieldSpec {
            phrases: &["jalur masuk kedinasan", "jalur kedinasan"],
            excludes: GROUP_EXCLUDES,
            position: 15,
        },

        Field::Group(University, Private) => FieldSpec {
            phrases: &["nama pts", "nama universitas swasta", "nama perguruan tinggi swasta"],
            excludes: GROUP_EXCLUDES,
            position: 16,
        },
        Field::Group(Major, Private) => FieldSpec {
            phrases: &[
                "program studi pts",
                "prodi pts",
                "jurusan pts",
                "program studi swasta",
                "prodi swasta",
                "jurusan swasta",
            ],
            excludes: GROUP_EXCLUDES,
            position: 17,
        },
        Field::Group(Path, Private) => FieldSpec {
            phrases: &["jalur masuk pts", "jalur pts", "jalur masuk swasta", "jalur swasta"],
            excludes: GROUP_EXCLUDES,
            position: 19,
        },

        Field::Group(University, Polytechnic) => FieldSpec {
            phrases: &["nama politeknik"],
            excludes: GROUP_EXCLUDES,
            position: 20,
        },
        Field::Group(Major, Polytechnic) => FieldSpec {
            phrases: &["program studi politeknik", "prodi politeknik", "jurusan politeknik"],
            excludes: GROUP_EXCLUDES,
            position: 21,
        },
        Field::Group(Path, Polytechnic) => FieldSpec {
            phrases: &["jalur masuk politeknik", "jalur politeknik"],
            excludes: GROUP_EXCLUDES,
            position: 23,
        },

        Field::Group(University, Overseas) => FieldSpec {
            phrases: &["nama universitas luar negeri", "nama ptln", "universitas luar negeri"],
            excludes: GROUP_EXCLUDES,
            position: 24,
        },
        Field::Group(Major, Overseas) => FieldSpec {
            phrases: &["program studi luar negeri", "prodi luar negeri", "jurusan luar negeri", "prodi ptln"],
            excludes: GROUP_EXCLUDES,
            position: 25,
        },
        Field::Group(Path, Overseas) => FieldSpec {
            phrases: &["jalur masuk luar negeri", "jalur luar negeri", "jalur ptln"],
            excludes: GROUP_EXCLUDES,
            position: 27,
        },
    }
}

/// Resolution order. Specific groups claim their columns before the generic
/// public group and the identity fields, whose phrases are broader.
fn resolution_order() -> Vec<Field> {
    let mut order = vec![Field::InstitutionType];
    for branch in [Branch::Polytechnic, Branch::CivilService, Branch::Overseas, Branch::Private, Branch::Public] {
        for kind in [GroupKind::University, GroupKind::Major, GroupKind::Path] {
            order.push(Field::Group(kind, branch));
        }
    }
    order.extend([
        Field::Email,
        Field::Whatsapp,
        Field::Instagram,
        Field::Status,
        Field::Consent,
        Field::Angkatan,
        Field::Achievements,
        Field::Name,
    ]);
    order
}

/// Column assignments for one header row. Indices hold for every row of the file.
#[derive(Debug, Clone)]
pub struct ColumnLayout {
    header: Vec<String>,
    columns: HashMap<Field, usize>,
    decisions: Vec<LocatorDecision>,
}

impl ColumnLayout {
    pub fn from_header(header: &[String]) -> Self {
        let lowered: Vec<String> = header.iter().map(|h| h.to_lowercase()).collect();
        let order = resolution_order();

        let mut claimed: HashSet<usize> = HashSet::new();
        let mut methods: HashMap<Field, (LocateMethod, Option<usize>)> = HashMap::new();

        // Header text
        for field in &order {
            let spec = field_spec(*field);
            let found = lowered.iter().enumerate().find_map(|(idx, text)| {
                if claimed.contains(&idx) || spec.excludes.iter().any(|ex| text.contains(ex)) {
                    return None;
                }
                spec.phrases.iter().find(|phrase| text.contains(*phrase)).map(|phrase| (idx, *phrase))
            });
            if let Some((idx, phrase)) = found {
                claimed.insert(idx);
                methods.insert(*field, (LocateMethod::Header { phrase }, Some(idx)));
            }
        }

        // Known form position, only for exports as wide as the survey form
        for field in &order {
            if header.len() < FORM_WIDTH || methods.contains_key(field) {
                continue;
            }
            let position = field_spec(*field).position;
            if position < header.len() && !claimed.contains(&position) {
                claimed.insert(position);
                methods.insert(*field, (LocateMethod::Position, Some(position)));
            }
        }

        let mut columns = HashMap::new();
        let mut decisions = Vec::with_capacity(order.len());
        for field in order {
            let (method, column) = methods.remove(&field).unwrap_or((LocateMethod::NotFound, None));
            if let Some(column) = column {
                columns.insert(field, column);
            }
            let decision = LocatorDecision { field, method, column };
            debug!("{}", decision);
            decisions.push(decision);
        }

        Self {
            header: header.to_vec(),
            columns,
            decisions,
        }
    }

    pub fn column(&self, field: Field) -> Option<usize> {
        let field = match field {
            Field::Group(kind, Branch::Unknown) => Field::Group(kind, Branch::Public),
            other => other,
        };
        self.columns.get(&field).copied()
    }

    pub fn decisions(&self) -> &[LocatorDecision] {
        &self.decisions
    }

    pub fn header_name(&self, column: usize) -> &str {
        self.header.get(column).map(String::as_str).unwrap_or("")
    }

    /// Trimmed cell for `field`, or "" when the column is unknown or the row is short.
    pub fn value<'r>(&self, row: &'r [String], field: Field) -> &'r str {
        self.column(field)
            .and_then(|idx| row.get(idx))
            .map(|cell| cell.trim())
            .unwrap_or("")
    }

    /// Columns assigned to identity and status fields.
    pub fn fixed_columns(&self) -> Vec<usize> {
        FIXED_FIELDS.iter().filter_map(|field| self.column(*field)).collect()
    }

    /// First non-empty group value for the row's branch, falling back through
    /// related groups. Returns the column and the value.
    pub fn group_value<'r>(&self, row: &'r [String], kind: GroupKind, branch: Branch) -> Option<(usize, &'r str)> {
        let mut order: Vec<Branch> = branch.search_order().to_vec();
        if kind == GroupKind::Path {
            for group in Branch::GROUPS {
                if !order.contains(&group) {
                    order.push(group);
                }
            }
        }

        order.into_iter().find_map(|group| {
            let column = self.column(Field::Group(kind, group))?;
            let value = row.get(column)?.trim();
            if value.is_empty() {
                None
            } else {
                Some((column, value))
            }
        })
    }
}

/// Pick the column group from the institution-type answer. Most specific
/// keywords are checked first: "Politeknik Negeri" is a polytechnic and
/// "Perguruan Tinggi Luar Negeri" is overseas, even though both say "Negeri".
pub fn resolve_branch(institution_type: &str) -> Branch {
    let value = institution_type.trim().to_lowercase();
    if value.is_empty() {
        return Branch::Unknown;
    }

    let table: [(Branch, &[&str]); 5] = [
        (Branch::Polytechnic, &["politeknik", "polytechnic"]),
        (Branch::CivilService, &["kedinasan"]),
        (Branch::Overseas, &["luar negeri", "ptln", "overseas"]),
        (Branch::Private, &["swasta", "pts"]),
        (Branch::Public, &["negeri", "ptn"]),
    ];

    table
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|kw| value.contains(kw)))
        .map(|(branch, _)| *branch)
        .unwrap_or(Branch::Unknown)
}

const INSTITUTION_KEYWORDS: &[&str] = &[
    "universitas",
    "university",
    "institut",
    "institute",
    "politeknik",
    "polytechnic",
    "sekolah tinggi",
    "akademi",
    "college",
    "atma jaya",
    "telkom university",
];

/// Abbreviations matched as whole words so "ui" does not hit "guitar".
const INSTITUTION_ABBREVIATIONS: &[&str] = &[
    "ui", "itb", "ugm", "its", "ipb", "unair", "undip", "unpad", "uns", "ub", "unhas", "unand", "unsri",
    "usu", "upi", "uny", "unj", "unnes", "unesa", "uin", "unila", "unram", "unsoed", "unej", "untan",
    "unsrat", "unud", "unsyiah", "usk", "uii", "umy", "ums", "umm", "binus", "trisakti", "unpar",
    "ukdw", "untar", "pens", "polban", "pnj", "pknstan", "stan", "ipdn", "stis", "stmkg", "itera",
    "itk", "itts",
];

const MAJOR_KEYWORDS: &[&str] = &[
    "teknik", "kedokteran", "farmasi", "hukum", "ekonomi", "akuntansi", "manajemen", "psikologi",
    "informatika", "sistem informasi", "ilmu komputer", "matematika", "fisika", "kimia", "biologi",
    "statistika", "aktuaria", "arsitektur", "keperawatan", "kebidanan", "gizi", "kesehatan",
    "pendidikan", "sastra", "bahasa", "komunikasi", "hubungan internasional", "ilmu politik",
    "sosiologi", "antropologi", "administrasi", "agribisnis", "agroteknologi", "pertanian",
    "peternakan", "kehutanan", "perikanan", "kelautan", "geografi", "geologi", "geofisika",
    "desain", "seni", "musik", "pariwisata", "perhotelan", "bisnis", "bioteknologi", "teknologi pangan",
    "astronomi", "meteorologi", "perencanaan wilayah", "sejarah", "filsafat", "kriminologi",
    "engineering", "medicine", "computer science",
];

/// Category labels that are answers to "institution type", not institution
/// names. Compared after lowercasing and removing whitespace.
const CATEGORY_LABELS: &[&str] = &[
    "perguruantingginegeri",
    "perguruantinggiswasta",
    "perguruantinggiluarnegeri",
    "perguruantinggikedinasan",
    "sekolahkedinasan",
    "kedinasan",
    "politeknik",
    "politekniknegeri",
    "politeknikswasta",
    "universitasnegeri",
    "universitasswasta",
    "universitasluarnegeri",
    "luarnegeri",
    "ptn",
    "pts",
    "ptln",
];

fn compact(value: &str) -> String {
    value.to_lowercase().chars().filter(|c| !c.is_whitespace()).collect()
}

pub fn is_category_label(value: &str) -> bool {
    let compacted = compact(value);
    CATEGORY_LABELS.iter().any(|label| *label == compacted)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentMatch {
    pub column: usize,
    pub value: String,
    pub keyword: &'static str,
}

fn institution_keyword(value: &str) -> Option<&'static str> {
    let lower = value.to_lowercase();
    if let Some(kw) = INSTITUTION_KEYWORDS.iter().find(|kw| lower.contains(*kw)) {
        return Some(*kw);
    }
    let words: Vec<&str> = lower.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()).collect();
    INSTITUTION_ABBREVIATIONS.iter().find(|abbr| words.contains(*abbr)).copied()
}

fn major_keyword(value: &str) -> Option<&'static str> {
    let lower = value.to_lowercase();
    MAJOR_KEYWORDS.iter().find(|kw| lower.contains(*kw)).copied()
}

fn scan<F>(row: &[String], skip: &[usize], matcher: F) -> Option<ContentMatch>
where
    F: Fn(&str) -> Option<&'static str>,
{
    row.iter().enumerate().find_map(|(column, cell)| {
        let value = cell.trim();
        if value.is_empty() || skip.contains(&column) {
            return None;
        }
        matcher(value).map(|keyword| ContentMatch {
            column,
            value: value.to_string(),
            keyword,
        })
    })
}

/// Leftmost cell that reads like an institution name. Category labels such
/// as "Perguruan Tinggi Negeri" are never accepted.
pub fn smart_university(row: &[String], skip: &[usize]) -> Option<ContentMatch> {
    scan(row, skip, |value| {
        if is_category_label(value) {
            None
        } else {
            institution_keyword(value)
        }
    })
}

/// Leftmost cell that reads like a field of study.
pub fn smart_major(row: &[String], skip: &[usize]) -> Option<ContentMatch> {
    scan(row, skip, major_keyword)
}
