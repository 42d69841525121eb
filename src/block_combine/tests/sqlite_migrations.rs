mod common;
use common::{assert_sqlite_pragmas, fk_check_empty, setup_db};

use block_combine::db::connection::connect_sqlite;
use diesel::QueryableByName;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error};
use diesel::sql_query;
use diesel::sql_types::{Integer, Text};

#[derive(QueryableByName)]
struct TblCnt {
    #[diesel(sql_type = Integer)]
    cnt: i32,
}
#[derive(QueryableByName)]
struct TimeStr {
    #[diesel(sql_type = Text)]
    t: String,
}

#[test]
fn migrations_apply_and_pragmas_are_set() {
    let (db, mut conn) = setup_db();

    // WAL is persistent per file; FKs/timeout are per connection
    assert_sqlite_pragmas(&mut conn);
    let mut second = connect_sqlite(&db.path).expect("connect second");
    assert_sqlite_pragmas(&mut second);

    let tbls: TblCnt = sql_query(
        "SELECT COUNT(*) AS cnt
            FROM sqlite_master
            WHERE type='table'
            AND name IN ('blocks','stocks','stock_block_association',
                         'working_set','calc_result','engine_kv');",
    )
    .get_result(&mut conn)
    .unwrap();
    assert_eq!(tbls.cnt, 6, "expected six tables to be present");
    fk_check_empty(&mut conn);
}

#[test]
fn stock_updated_at_defaults_on_insert() {
    let (_db, mut conn) = setup_db();

    sql_query("INSERT INTO stocks (code, region) VALUES ('600519', 1);")
        .execute(&mut conn)
        .unwrap();
    let row: TimeStr = sql_query("SELECT updated_at AS t FROM stocks WHERE code='600519';")
        .get_result(&mut conn)
        .unwrap();
    assert!(row.t.ends_with('Z'), "unexpected timestamp {}", row.t);
}

#[test]
fn associations_cannot_dangle() {
    let (_db, mut conn) = setup_db();

    let err = sql_query("INSERT INTO stock_block_association (stock_id, block_id) VALUES (1, 1);")
        .execute(&mut conn)
        .unwrap_err();
    assert!(
        matches!(
            err,
            Error::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _)
        ),
        "got {err:?}"
    );

    sql_query("INSERT INTO blocks (code, name) VALUES ('880001', 'x');")
        .execute(&mut conn)
        .unwrap();
    sql_query("INSERT INTO stocks (code, region) VALUES ('600519', 1);")
        .execute(&mut conn)
        .unwrap();
    sql_query("INSERT INTO stock_block_association (stock_id, block_id) VALUES (1, 1);")
        .execute(&mut conn)
        .unwrap();

    // RESTRICT: a linked block cannot be deleted out from under its members
    let err = sql_query("DELETE FROM blocks WHERE code='880001';")
        .execute(&mut conn)
        .unwrap_err();
    assert!(matches!(
        err,
        Error::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _)
    ));
}

#[test]
fn result_ranks_are_unique() {
    let (_db, mut conn) = setup_db();

    sql_query("INSERT INTO calc_result (rank, blocks, stocks, stock_count) VALUES (1, '[]', '[]', 0);")
        .execute(&mut conn)
        .unwrap();
    let err = sql_query("INSERT INTO calc_result (rank, blocks, stocks, stock_count) VALUES (1, '[]', '[]', 0);")
        .execute(&mut conn)
        .unwrap_err();
    assert!(matches!(
        err,
        Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _)
    ));
}
