#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::PathBuf;

use block_combine::BlockCombine;
use block_combine::catalog::{BlockRecord, CatalogInput, StockRecord};
use block_combine::config::Settings;
use block_combine::db::{connection, migrate};
use diesel::QueryableByName;
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Integer, Nullable, Text};
use tempfile::TempDir;

#[derive(QueryableByName)]
struct JournalMode {
    #[diesel(sql_type = Text)]
    journal_mode: String,
}
#[derive(QueryableByName)]
struct ForeignKeys {
    #[diesel(sql_type = Integer)]
    foreign_keys: i32,
}
#[derive(QueryableByName)]
struct BusyTimeout {
    #[diesel(sql_type = Integer, column_name = "timeout")]
    busy_timeout: i32,
}
#[derive(QueryableByName)]
struct Cnt {
    #[diesel(sql_type = BigInt)]
    cnt: i64,
}
#[derive(QueryableByName, Debug)]
struct FkViolation {
    #[diesel(sql_type = Text)]
    table: String,
    #[diesel(sql_type = Nullable<BigInt>)]
    rowid: Option<i64>,
}

pub struct TestDb {
    pub dir: TempDir,  // keep alive for the life of the test
    pub path: String,  // <tmpdir>/test.db
}

impl TestDb {
    pub fn export_dir(&self) -> PathBuf {
        self.dir.path().join("export")
    }
}

pub fn setup_db() -> (TestDb, SqliteConnection) {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("test.db").to_string_lossy().to_string();

    migrate::run_all(&path).expect("migrations");

    let conn = connection::connect_sqlite(&path).expect("connect");
    (TestDb { dir, path }, conn)
}

pub fn settings_for(db: &TestDb) -> Settings {
    let mut settings = Settings::default();
    settings.database_url = format!("sqlite://{}", db.path);
    settings.export.dir = db.export_dir();
    settings
}

/// A migrated temp database plus a service over it.
pub fn setup_service() -> (TestDb, BlockCombine) {
    let (db, _conn) = setup_db();
    let svc = BlockCombine::open(settings_for(&db)).expect("open service");
    (db, svc)
}

pub fn assert_sqlite_pragmas(conn: &mut SqliteConnection) {
    use diesel::sql_query;

    let jm: JournalMode = sql_query("PRAGMA journal_mode;").get_result(conn).unwrap();
    assert_eq!(jm.journal_mode.to_lowercase(), "wal"); // persistent per DB file

    let fk: ForeignKeys = sql_query("PRAGMA foreign_keys;").get_result(conn).unwrap();
    assert_eq!(fk.foreign_keys, 1);

    let bt: BusyTimeout = sql_query("PRAGMA busy_timeout;").get_result(conn).unwrap();
    assert_eq!(bt.busy_timeout, 5000);
}

pub fn count(conn: &mut SqliteConnection, table: &str) -> i64 {
    let c: Cnt = diesel::sql_query(format!("SELECT COUNT(*) AS cnt FROM {table};"))
        .get_result(conn)
        .unwrap();
    c.cnt
}

pub fn fk_check_empty(conn: &mut SqliteConnection) {
    let rows: Vec<FkViolation> = diesel::sql_query("PRAGMA foreign_key_check;")
        .load(conn)
        .unwrap();
    assert!(rows.is_empty(), "foreign key violations: {rows:?}");
}

/// Region marker the way the vendor assigns it: Shanghai codes start with 6.
pub fn region_of(stock_code: &str) -> i32 {
    if stock_code.starts_with('6') { 1 } else { 0 }
}

/// Catalog input from `(block code, member stock codes)` pairs.
///
/// Blocks are named `Block <code>`; stocks get their region from [`region_of`].
pub fn catalog(memberships: &[(&str, &[&str])]) -> CatalogInput {
    let mut stocks: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for (block, members) in memberships {
        for s in *members {
            stocks.entry(*s).or_default().push(block.to_string());
        }
    }
    CatalogInput {
        blocks: memberships
            .iter()
            .map(|(code, _)| BlockRecord {
                code: code.to_string(),
                name: format!("Block {code}"),
            })
            .collect(),
        stocks: stocks
            .into_iter()
            .map(|(code, blocks)| StockRecord {
                code: code.to_string(),
                region: region_of(code),
                name: None,
                blocks,
            })
            .collect(),
        extra: Vec::new(),
    }
}

pub fn codes(list: &[&str]) -> Vec<String> {
    list.iter().map(|c| c.to_string()).collect()
}

// Four blocks:
//   A = {s1, s2, s4}, B = {s1, s2, s3}, C = {s1, s2, s3}, D = {s3, s4}
// so A∩B∩C = {s1, s2}, B∩C∩D = {s3}, A∩B∩D = A∩C∩D = {}.
pub const A: &str = "880001";
pub const B: &str = "880002";
pub const C: &str = "880003";
pub const D: &str = "880004";
pub const S1: &str = "600001";
pub const S2: &str = "600002";
pub const S3: &str = "000003";
pub const S4: &str = "000004";

pub fn abcd() -> CatalogInput {
    catalog(&[
        (A, &[S1, S2, S4]),
        (B, &[S1, S2, S3]),
        (C, &[S1, S2, S3]),
        (D, &[S3, S4]),
    ])
}
