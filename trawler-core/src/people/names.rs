use indexmap::{IndexMap, IndexSet};
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

const NAME_PREFIXES: &[&str] = &["mr", "mrs", "ms", "dr", "prof"];
const NAME_SUFFIXES: &[&str] = &["jr", "sr", "ii", "iii", "iv", "phd", "md"];

const BUILTIN_FIRST_NAMES: &[&str] = &[
    "John", "Jane", "Michael", "Sarah", "David", "Emily", "James", "Jessica", "Robert",
    "Jennifer", "William", "Elizabeth", "Richard", "Susan", "Thomas", "Mary", "Daniel",
    "Laura", "Mark", "Anna", "Peter", "Lisa", "Paul", "Karen", "Chris", "Maria",
];

const BUILTIN_LAST_NAMES: &[&str] = &[
    "Smith", "Johnson", "Williams", "Brown", "Jones", "Miller", "Davis", "Garcia",
    "Rodriguez", "Wilson", "Martinez", "Anderson", "Taylor", "Thomas", "Moore", "Jackson",
    "White", "Harris", "Clark", "Lewis", "Walker", "Young", "King", "Wright",
];

const BUILTIN_ROLES: &[&str] = &[
    "CEO", "CTO", "CFO", "COO", "CMO", "CIO", "VP", "Manager", "Director", "President",
    "Founder", "Co-Founder", "Owner", "Partner", "Developer", "Designer", "Analyst",
    "Engineer", "Specialist", "Consultant", "Vice President", "Head of Sales",
    "Managing Director", "Chief Executive Officer", "Chief Technology Officer",
];

#[derive(Error, Debug)]
pub enum NameDbError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, NameDbError>;

#[derive(Debug, Deserialize)]
struct NameRow {
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    variations: Option<String>,
}

/// Known first names, last names and roles. Lookups are case-insensitive;
/// each name keeps the first spelling it was loaded with.
#[derive(Debug, Clone, Default)]
pub struct NameDatabase {
    first_names: IndexMap<String, String>,
    last_names: IndexMap<String, String>,
    roles: IndexSet<String>,
}

impl NameDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a CSV with a `first_name,last_name,role,variations` header.
    pub fn from_csv(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let db = Self::from_reader(file)?;
        info!(
            "Name database loaded from {}: {} first names, {} last names, {} roles",
            path.display(),
            db.first_name_count(),
            db.last_name_count(),
            db.role_count()
        );
        Ok(db)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut db = Self::new();
        for (index, row) in csv_reader.deserialize::<NameRow>().enumerate() {
            match row {
                Ok(row) => db.add_row(row),
                // header is line 1
                Err(e) => warn!("Skipping name row {}: {}", index + 2, e),
            }
        }
        Ok(db)
    }

    /// Common English names and job titles.
    pub fn builtin() -> Self {
        let mut db = Self::new();
        for name in BUILTIN_FIRST_NAMES {
            db.add_first_name(name);
        }
        for name in BUILTIN_LAST_NAMES {
            db.add_last_name(name);
        }
        for role in BUILTIN_ROLES {
            db.add_role(role);
        }
        db
    }

    /// `from_csv`, or the builtin lists when there is no usable file.
    pub fn load_or_builtin(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            info!("No name database configured, using builtin names");
            return Self::builtin();
        };

        match Self::from_csv(path) {
            Ok(db) if db.first_name_count() > 0 => db,
            Ok(_) => {
                warn!("Name database {} has no usable names, using builtin names", path.display());
                Self::builtin()
            }
            Err(e) => {
                warn!("Failed to load name database {}: {}, using builtin names", path.display(), e);
                Self::builtin()
            }
        }
    }

    fn add_row(&mut self, row: NameRow) {
        if let Some(first) = row.first_name.as_deref() {
            self.add_first_name(first);
        }
        if let Some(last) = row.last_name.as_deref() {
            self.add_last_name(last);
        }
        if let Some(role) = row.role.as_deref() {
            self.add_role(role);
        }
        if let Some(variations) = row.variations.as_deref() {
            for variation in variations.split(',') {
                self.add_first_name(variation);
            }
        }
    }

    pub fn add_first_name(&mut self, name: &str) -> bool {
        let name = name.trim();
        if !is_valid_name(name) {
            return false;
        }
        self.first_names
            .entry(name.to_lowercase())
            .or_insert_with(|| name.to_string());
        true
    }

    pub fn add_last_name(&mut self, name: &str) -> bool {
        let name = name.trim();
        if !is_valid_name(name) {
            return false;
        }
        self.last_names
            .entry(name.to_lowercase())
            .or_insert_with(|| name.to_string());
        true
    }

    pub fn add_role(&mut self, role: &str) -> bool {
        let role = role.trim();
        if !is_valid_role(role) {
            return false;
        }
        self.roles.insert(role.to_lowercase());
        true
    }

    pub fn is_first_name(&self, word: &str) -> bool {
        self.first_names.contains_key(&word.trim().to_lowercase())
    }

    pub fn is_last_name(&self, word: &str) -> bool {
        self.last_names.contains_key(&word.trim().to_lowercase())
    }

    pub fn contains(&self, word: &str) -> bool {
        self.is_first_name(word) || self.is_last_name(word)
    }

    pub fn canonical_first(&self, word: &str) -> Option<&str> {
        self.first_names
            .get(&word.trim().to_lowercase())
            .map(String::as_str)
    }

    pub fn canonical_last(&self, word: &str) -> Option<&str> {
        self.last_names
            .get(&word.trim().to_lowercase())
            .map(String::as_str)
    }

    pub fn is_role(&self, text: &str) -> bool {
        self.roles.contains(&text.trim().to_lowercase())
    }

    pub fn first_name_count(&self) -> usize {
        self.first_names.len()
    }

    pub fn last_name_count(&self) -> usize {
        self.last_names.len()
    }

    pub fn role_count(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.first_names.is_empty() && self.last_names.is_empty() && self.roles.is_empty()
    }
}

/// 2..=20 letters, hyphens or apostrophes, and not an honorific.
pub fn is_valid_name(name: &str) -> bool {
    let len = name.chars().count();
    if !(2..=20).contains(&len) {
        return false;
    }
    let lower = name.to_lowercase();
    if NAME_PREFIXES.contains(&lower.as_str()) || NAME_SUFFIXES.contains(&lower.as_str()) {
        return false;
    }
    name.chars()
        .all(|c| c.is_ascii_alphabetic() || c == '-' || c == '\'')
}

pub fn is_valid_role(role: &str) -> bool {
    role.chars().count() >= 2
        && role
            .chars()
            .all(|c| c.is_ascii_alphabetic() || c.is_whitespace() || c == '-' || c == '&')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = "\
first_name,last_name,role,variations
Jonathan,Okafor,Head of Sales,\"Jon,Johnny\"
Priya,Raman,CTO,
Dr,Who,Time Lord,
X,Y7,R2-D2,
";

    #[test]
    fn test_csv_rows_and_variations() {
        let db = NameDatabase::from_reader(SAMPLE.as_bytes()).unwrap();

        assert!(db.is_first_name("jonathan"));
        assert!(db.is_first_name("Jon"));
        assert!(db.is_first_name("JOHNNY"));
        assert!(db.is_last_name("Okafor"));
        assert!(db.is_role("head of sales"));
        assert!(db.is_role("cto"));
        assert_eq!(db.canonical_first("PRIYA"), Some("Priya"));
        assert_eq!(db.canonical_last("raman"), Some("Raman"));
    }

    #[test]
    fn test_invalid_entries_are_skipped() {
        let db = NameDatabase::from_reader(SAMPLE.as_bytes()).unwrap();

        // honorific, too short, digits
        assert!(!db.is_first_name("Dr"));
        assert!(!db.is_first_name("X"));
        assert!(!db.is_last_name("Y7"));
        assert!(!db.is_role("R2-D2"));
        // the honorific row still contributes its valid columns
        assert!(db.is_last_name("Who"));
        assert!(db.is_role("time lord"));
    }

    #[test]
    fn test_first_spelling_wins() {
        let mut db = NameDatabase::new();
        assert!(db.add_first_name("McKenzie"));
        assert!(db.add_first_name("MCKENZIE"));
        assert_eq!(db.first_name_count(), 1);
        assert_eq!(db.canonical_first("mckenzie"), Some("McKenzie"));
    }

    #[test]
    fn test_name_rules() {
        assert!(is_valid_name("O'Brien"));
        assert!(is_valid_name("Jean-Luc"));
        assert!(!is_valid_name("J"));
        assert!(!is_valid_name("Abcdefghijklmnopqrstu"));
        assert!(!is_valid_name("phd"));
        assert!(!is_valid_name("Anne Marie"));
    }

    #[test]
    fn test_role_rules() {
        assert!(is_valid_role("R&D Lead"));
        assert!(is_valid_role("Co-Founder"));
        assert!(!is_valid_role("A"));
        assert!(!is_valid_role("Engineer II (L5)"));
    }

    #[test]
    fn test_builtin_lists() {
        let db = NameDatabase::builtin();
        assert!(db.is_first_name("John"));
        assert!(db.is_last_name("Smith"));
        assert!(db.is_role("ceo"));
        assert!(db.contains("smith"));
        assert!(!db.contains("Zebulon"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let db = NameDatabase::load_or_builtin(Some(file.path()));
        assert!(db.is_first_name("Priya"));
        assert!(!db.is_first_name("John"));
    }

    #[test]
    fn test_missing_file_falls_back_to_builtin() {
        let db = NameDatabase::load_or_builtin(Some(Path::new("/nonexistent/names.csv")));
        assert!(db.is_first_name("John"));

        let db = NameDatabase::load_or_builtin(None);
        assert!(db.is_last_name("Smith"));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result = NameDatabase::from_csv(Path::new("/nonexistent/names.csv"));
        assert!(matches!(result, Err(NameDbError::Io(_))));
    }
}
