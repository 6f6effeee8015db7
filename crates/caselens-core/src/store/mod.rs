//! In-memory relational store for cases and accounts
//!
//! Both collections are materialized once into a named shared-cache SQLite
//! database that lives only in memory. After loading, every pooled
//! connection runs with `query_only`, so the store is read-only for the rest
//! of the process and can be shared between threads without locking.

use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection};
use tracing::{debug, info, warn};

use crate::error::{LoadError, QueryError};
use crate::models::{Account, Case, LoadSummary, TIMESTAMP_FORMAT};

mod source;
mod table;

pub use source::{read_accounts, read_cases, CaseRecords, SourceFormat, SourceLocator};
pub use table::{Table, Value};

type StorePool = Pool<SqliteConnectionManager>;

const SCHEMA: &str = r#"
    CREATE TABLE cases (
        case_sfid TEXT NOT NULL,
        case_product TEXT NOT NULL,
        case_type TEXT NOT NULL,
        case_severity TEXT NOT NULL,
        case_status TEXT NOT NULL,
        case_created_date TEXT NOT NULL,
        case_closed_date TEXT,
        account_sfid TEXT NOT NULL
    );

    CREATE TABLE accounts (
        account_sfid TEXT PRIMARY KEY,
        account_country TEXT NOT NULL,
        account_industry TEXT NOT NULL,
        account_created_date TEXT NOT NULL
    );

    CREATE INDEX idx_cases_product ON cases(case_product);
    CREATE INDEX idx_cases_account ON cases(account_sfid);
    CREATE INDEX idx_cases_created ON cases(case_created_date);
    CREATE INDEX idx_accounts_country ON accounts(account_country);
    CREATE INDEX idx_accounts_industry ON accounts(account_industry);
"#;

/// Loaded state shared by every clone of the store
struct Loaded {
    pool: StorePool,
    summary: LoadSummary,
    /// Keeps the shared in-memory database alive independent of the pool
    _anchor: Mutex<Connection>,
}

/// Queryable store of the case and account collections
///
/// Starts empty; [`RecordStore::load`] populates it once. Queries against an
/// empty store fail with [`QueryError::NotReady`].
#[derive(Clone, Default)]
pub struct RecordStore {
    inner: Option<Arc<Loaded>>,
}

impl fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordStore")
            .field("ready", &self.is_ready())
            .field("summary", &self.summary())
            .finish()
    }
}

impl RecordStore {
    /// Create an empty (not ready) store
    pub fn new() -> Self {
        Self::default()
    }

    /// Load both collections, resolving the paths with the standard locator
    pub fn load(&mut self, cases: &Path, accounts: &Path) -> Result<LoadSummary, LoadError> {
        self.load_with(cases, accounts, &SourceLocator::standard())
    }

    /// Load both collections, resolving the paths with `locator`
    ///
    /// On failure the store is left empty.
    pub fn load_with(
        &mut self,
        cases: &Path,
        accounts: &Path,
        locator: &SourceLocator,
    ) -> Result<LoadSummary, LoadError> {
        self.inner = None;
        info!("Loading case and account data");

        let cases_path = locator
            .locate(cases)
            .map_err(|searched| LoadError::NotFound {
                what: "cases",
                name: cases.display().to_string(),
                searched,
            })?;
        let accounts_path =
            locator
                .locate(accounts)
                .map_err(|searched| LoadError::NotFound {
                    what: "accounts",
                    name: accounts.display().to_string(),
                    searched,
                })?;

        let case_records = read_cases(&cases_path)?;
        let account_records = read_accounts(&accounts_path)?;

        let summary = LoadSummary {
            cases: case_records.cases.len(),
            accounts: account_records.len(),
            skipped_cases: case_records.skipped,
            cases_path,
            accounts_path,
        };
        let loaded = materialize(&case_records.cases, &account_records, summary)?;

        info!(
            cases = loaded.summary.cases,
            accounts = loaded.summary.accounts,
            skipped = loaded.summary.skipped_cases,
            "Record store ready"
        );
        let summary = loaded.summary.clone();
        self.inner = Some(Arc::new(loaded));
        Ok(summary)
    }

    /// Build a store directly from records (used by tests and embedders)
    pub fn from_records(cases: &[Case], accounts: &[Account]) -> Result<Self, LoadError> {
        let summary = LoadSummary {
            cases: cases.len(),
            accounts: accounts.len(),
            skipped_cases: 0,
            cases_path: Default::default(),
            accounts_path: Default::default(),
        };
        let loaded = materialize(cases, accounts, summary)?;
        Ok(Self {
            inner: Some(Arc::new(loaded)),
        })
    }

    /// Whether data has been loaded successfully
    pub fn is_ready(&self) -> bool {
        self.inner.is_some()
    }

    /// Counts from the last successful load
    pub fn summary(&self) -> Option<&LoadSummary> {
        self.inner.as_ref().map(|l| &l.summary)
    }

    /// Execute a read-only query
    pub fn query(&self, sql: &str) -> Result<Table, QueryError> {
        let loaded = self.inner.as_ref().ok_or(QueryError::NotReady)?;
        let conn = loaded
            .pool
            .get()
            .map_err(|e| QueryError::Execution(e.to_string()))?;

        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| QueryError::Invalid(e.to_string()))?;
        if !stmt.readonly() {
            return Err(QueryError::Invalid(
                "only read statements are accepted".to_string(),
            ));
        }

        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let width = columns.len();
        debug!(sql = sql.trim(), "Running query");

        let rows = stmt
            .query_map([], |row| {
                (0..width)
                    .map(|i| row.get_ref(i).map(Value::from))
                    .collect::<rusqlite::Result<Vec<_>>>()
            })
            .map_err(|e| QueryError::Execution(e.to_string()))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| QueryError::Execution(e.to_string()))?;

        Ok(Table { columns, rows })
    }
}

/// Name for a fresh shared in-memory database
fn memory_uri() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let id = COUNTER.fetch_add(1, Ordering::SeqCst);
    format!(
        "file:caselens-{}-{}?mode=memory&cache=shared",
        std::process::id(),
        id
    )
}

fn materialize(
    cases: &[Case],
    accounts: &[Account],
    summary: LoadSummary,
) -> Result<Loaded, LoadError> {
    let failed = |reason: String| LoadError::Malformed {
        what: "store",
        path: summary.cases_path.clone(),
        reason,
    };

    let uri = memory_uri();
    let mut anchor = Connection::open(&uri).map_err(|e| failed(e.to_string()))?;
    insert_records(&mut anchor, cases, accounts).map_err(|e| failed(e.to_string()))?;

    let orphans: i64 = anchor
        .query_row(
            "SELECT COUNT(*) FROM cases c LEFT JOIN accounts a ON c.account_sfid = a.account_sfid WHERE a.account_sfid IS NULL",
            [],
            |row| row.get(0),
        )
        .map_err(|e| failed(e.to_string()))?;
    if orphans > 0 {
        warn!(
            cases = orphans,
            "Cases reference unknown accounts; they are excluded from account-joined reports"
        );
    }

    let manager = SqliteConnectionManager::file(&uri).with_init(|conn| {
        conn.execute_batch("PRAGMA query_only = ON;")?;
        Ok(())
    });
    let pool = Pool::builder()
        .max_size(4)
        .idle_timeout(None)
        .max_lifetime(None)
        .build(manager)
        .map_err(|e| failed(e.to_string()))?;

    Ok(Loaded {
        pool,
        summary,
        _anchor: Mutex::new(anchor),
    })
}

fn insert_records(
    conn: &mut Connection,
    cases: &[Case],
    accounts: &[Account],
) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA)?;
    let tx = conn.transaction()?;
    {
        let mut insert_case = tx.prepare(
            "INSERT INTO cases (case_sfid, case_product, case_type, case_severity, case_status, case_created_date, case_closed_date, account_sfid)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )?;
        for c in cases {
            insert_case.execute(params![
                c.id,
                c.product,
                c.case_type,
                c.severity.as_str(),
                c.status,
                c.created.format(TIMESTAMP_FORMAT).to_string(),
                c.closed.map(|d| d.format(TIMESTAMP_FORMAT).to_string()),
                c.account_id,
            ])?;
        }

        let mut insert_account = tx.prepare(
            "INSERT INTO accounts (account_sfid, account_country, account_industry, account_created_date)
             VALUES (?1, ?2, ?3, ?4)",
        )?;
        for a in accounts {
            insert_account.execute(params![
                a.id,
                a.country,
                a.industry,
                a.created.format(TIMESTAMP_FORMAT).to_string(),
            ])?;
        }
    }
    tx.commit()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::fixtures::{account, closed_case, open_case};

    fn sample_store() -> RecordStore {
        RecordStore::from_records(
            &[
                open_case("C1", "Verify", "A1", "2023-01-02"),
                closed_case("C2", "Verify", "A1", "2023-01-02", "2023-01-05"),
                open_case("C3", "Collaborate", "A2", "2023-01-03"),
            ],
            &[account("A1", "Canada", "Pharma"), account("A2", "Brazil", "Food")],
        )
        .unwrap()
    }

    #[test]
    fn test_empty_store_is_not_ready() {
        let store = RecordStore::new();
        assert!(!store.is_ready());
        assert!(store.summary().is_none());
        assert!(matches!(
            store.query("SELECT 1"),
            Err(QueryError::NotReady)
        ));
    }

    #[test]
    fn test_debug_shows_readiness() {
        assert_eq!(
            format!("{:?}", RecordStore::new()),
            "RecordStore { ready: false, summary: None }"
        );
        let shown = format!("{:?}", sample_store());
        assert!(shown.contains("ready: true"));
        assert!(shown.contains("cases: 3"));
    }

    #[test]
    fn test_query_returns_ordered_columns_and_rows() {
        let store = sample_store();
        let table = store
            .query("SELECT case_product, COUNT(*) AS count FROM cases GROUP BY case_product ORDER BY count DESC")
            .unwrap();
        assert_eq!(table.columns, vec!["case_product", "count"]);
        assert_eq!(
            table.rows,
            vec![
                vec![Value::Text("Verify".into()), Value::Integer(2)],
                vec![Value::Text("Collaborate".into()), Value::Integer(1)],
            ]
        );
    }

    #[test]
    fn test_timestamps_support_date_functions() {
        let store = sample_store();
        let table = store
            .query("SELECT julianday(case_closed_date) - julianday(case_created_date) FROM cases WHERE case_sfid = 'C2'")
            .unwrap();
        assert_eq!(table.rows[0][0].as_f64(), Some(3.0));
    }

    #[test]
    fn test_rejects_write_statements() {
        let store = sample_store();
        for sql in [
            "DELETE FROM cases",
            "INSERT INTO accounts VALUES ('A9', 'X', 'Y', '2020-01-01 00:00:00')",
            "DROP TABLE cases",
            "UPDATE cases SET case_status = 'Closed'",
        ] {
            let err = store.query(sql).unwrap_err();
            assert!(matches!(err, QueryError::Invalid(_)), "{} accepted", sql);
        }
        // Data untouched
        let table = store.query("SELECT COUNT(*) FROM cases").unwrap();
        assert_eq!(table.rows[0][0], Value::Integer(3));
    }

    #[test]
    fn test_rejects_garbage() {
        let store = sample_store();
        assert!(matches!(
            store.query("SELEKT nothing"),
            Err(QueryError::Invalid(_))
        ));
    }

    #[test]
    fn test_clones_share_data_across_threads() {
        let store = sample_store();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || {
                    store
                        .query("SELECT COUNT(*) FROM accounts")
                        .unwrap()
                        .rows[0][0]
                        .clone()
                })
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), Value::Integer(2));
        }
    }

    #[test]
    fn test_stores_are_isolated() {
        let a = sample_store();
        let b = RecordStore::from_records(&[], &[]).unwrap();
        assert_eq!(
            a.query("SELECT COUNT(*) FROM cases").unwrap().rows[0][0],
            Value::Integer(3)
        );
        assert_eq!(
            b.query("SELECT COUNT(*) FROM cases").unwrap().rows[0][0],
            Value::Integer(0)
        );
    }
}
