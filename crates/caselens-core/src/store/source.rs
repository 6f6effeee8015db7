//! Source file discovery and parsing for case and account collections

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use csv::ReaderBuilder;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::LoadError;
use crate::models::{Account, Case, RawTimestamp};

/// Ordered set of directories searched for source files (first match wins)
#[derive(Debug, Clone, Default)]
pub struct SourceLocator {
    dirs: Vec<PathBuf>,
}

impl SourceLocator {
    /// Standard search order: working directory, `data/` under it, sibling
    /// `data/` of the working directory, then `data/` next to and above the
    /// executable.
    pub fn standard() -> Self {
        let mut dirs = Vec::new();

        if let Ok(cwd) = std::env::current_dir() {
            dirs.push(cwd.join("data"));
            if let Some(parent) = cwd.parent() {
                dirs.push(parent.join("data"));
            }
            dirs.insert(0, cwd);
        }

        if let Some(exe_dir) = std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(Path::to_path_buf))
        {
            dirs.push(exe_dir.join("data"));
            if let Some(parent) = exe_dir.parent() {
                dirs.push(parent.join("data"));
            }
        }

        Self::with_dirs(dirs)
    }

    /// Search exactly these directories, in order
    pub fn with_dirs(dirs: impl IntoIterator<Item = PathBuf>) -> Self {
        let mut seen = HashSet::new();
        let dirs = dirs
            .into_iter()
            .filter(|d| seen.insert(d.clone()))
            .collect();
        Self { dirs }
    }

    /// Add directories that are searched before the standard ones
    pub fn prepend(mut self, extra: impl IntoIterator<Item = PathBuf>) -> Self {
        let mut dirs: Vec<PathBuf> = extra.into_iter().collect();
        dirs.append(&mut self.dirs);
        Self::with_dirs(dirs)
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Resolve a file name against the search directories
    ///
    /// Absolute paths are only checked as given. Returns the list of
    /// candidates tried when nothing matches.
    pub fn locate(&self, file: &Path) -> std::result::Result<PathBuf, Vec<PathBuf>> {
        let candidates: Vec<PathBuf> = if file.is_absolute() {
            vec![file.to_path_buf()]
        } else {
            self.dirs.iter().map(|d| d.join(file)).collect()
        };

        match candidates.iter().find(|c| c.is_file()) {
            Some(found) => {
                debug!(path = %found.display(), "Resolved source file");
                Ok(found.clone())
            }
            None => Err(candidates),
        }
    }
}

/// Supported source encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Json,
    Csv,
}

impl SourceFormat {
    /// Pick the format from the file extension (JSON unless it says csv)
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("csv") => Self::Csv,
            _ => Self::Json,
        }
    }
}

/// Case record as it appears in a source file
#[derive(Debug, Deserialize)]
struct RawCase {
    case_sfid: String,
    case_product: String,
    case_type: String,
    case_severity: String,
    case_status: String,
    case_created_date: RawTimestamp,
    #[serde(default)]
    case_closed_date: Option<RawTimestamp>,
    account_sfid: String,
}

/// Account record as it appears in a source file
#[derive(Debug, Deserialize)]
struct RawAccount {
    account_sfid: String,
    account_country: String,
    account_industry: String,
    account_created_date: RawTimestamp,
}

/// Cases read from a source file
#[derive(Debug, Default)]
pub struct CaseRecords {
    pub cases: Vec<Case>,
    /// Rows dropped for inconsistent closed dates
    pub skipped: usize,
}

/// Read and validate the case collection
///
/// Unparseable rows fail the whole file. Rows that parse but break the
/// closed-date invariants are logged and dropped.
pub fn read_cases(path: &Path) -> std::result::Result<CaseRecords, LoadError> {
    let malformed = |reason: String| LoadError::Malformed {
        what: "cases",
        path: path.to_path_buf(),
        reason,
    };

    let raw: Vec<RawCase> = read_records(path).map_err(malformed)?;
    let mut records = CaseRecords {
        cases: Vec::with_capacity(raw.len()),
        skipped: 0,
    };

    for (row, r) in raw.into_iter().enumerate() {
        let created = r
            .case_created_date
            .parse()
            .map_err(|e| malformed(format!("record {}: case_created_date: {}", row + 1, e)))?
            .ok_or_else(|| malformed(format!("record {}: case_created_date is empty", row + 1)))?;
        let closed = match r.case_closed_date {
            Some(ref ts) => ts
                .parse()
                .map_err(|e| malformed(format!("record {}: case_closed_date: {}", row + 1, e)))?,
            None => None,
        };
        let severity = r
            .case_severity
            .parse()
            .map_err(|e| malformed(format!("record {}: {}", row + 1, e)))?;

        let case = Case {
            id: r.case_sfid,
            product: r.case_product,
            case_type: r.case_type,
            severity,
            status: r.case_status,
            created,
            closed,
            account_id: r.account_sfid,
        };
        if let Err(reason) = case.validate() {
            warn!(record = row + 1, reason = %reason, "Skipping inconsistent case");
            records.skipped += 1;
            continue;
        }
        records.cases.push(case);
    }

    if records.skipped > 0 {
        warn!(
            skipped = records.skipped,
            path = %path.display(),
            "Some case records were skipped"
        );
    }
    Ok(records)
}

/// Read and validate the account collection
pub fn read_accounts(path: &Path) -> std::result::Result<Vec<Account>, LoadError> {
    let malformed = |reason: String| LoadError::Malformed {
        what: "accounts",
        path: path.to_path_buf(),
        reason,
    };

    let raw: Vec<RawAccount> = read_records(path).map_err(malformed)?;
    let mut seen = HashSet::with_capacity(raw.len());
    let mut accounts = Vec::with_capacity(raw.len());

    for (row, r) in raw.into_iter().enumerate() {
        if !seen.insert(r.account_sfid.clone()) {
            return Err(malformed(format!(
                "record {}: duplicate account_sfid '{}'",
                row + 1,
                r.account_sfid
            )));
        }
        let created = r
            .account_created_date
            .parse()
            .map_err(|e| malformed(format!("record {}: account_created_date: {}", row + 1, e)))?
            .ok_or_else(|| {
                malformed(format!("record {}: account_created_date is empty", row + 1))
            })?;

        accounts.push(Account {
            id: r.account_sfid,
            country: r.account_country,
            industry: r.account_industry,
            created,
        });
    }

    Ok(accounts)
}

fn read_records<T: DeserializeOwned>(path: &Path) -> std::result::Result<Vec<T>, String> {
    let file = File::open(path).map_err(|e| format!("cannot open file: {}", e))?;
    let reader = BufReader::new(file);

    match SourceFormat::from_path(path) {
        SourceFormat::Json => parse_json(reader),
        SourceFormat::Csv => parse_csv(reader),
    }
}

/// Parse a JSON array of flat records
pub(crate) fn parse_json<T: DeserializeOwned, R: Read>(
    reader: R,
) -> std::result::Result<Vec<T>, String> {
    serde_json::from_reader(reader).map_err(|e| e.to_string())
}

/// Parse CSV with a header row
pub(crate) fn parse_csv<T: DeserializeOwned, R: Read>(
    reader: R,
) -> std::result::Result<Vec<T>, String> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    rdr.deserialize()
        .enumerate()
        .map(|(i, record)| record.map_err(|e| format!("record {}: {}", i + 1, e)))
        .collect()
}
