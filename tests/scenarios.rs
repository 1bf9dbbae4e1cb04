//! End-to-end scenarios (spec.md §8 S1-S7) driven through `command::parse_line`
//! and `Session::execute`, the same path the REPL uses.

use shelfdb::command::{self, Statement};
use shelfdb::session::{Outcome, Session};

fn db_path(dir: &tempfile::TempDir, name: &str) -> std::path::PathBuf {
    dir.path().join(name)
}

fn run(session: &mut Session, line: &str) -> shelfdb::error::Result<Outcome> {
    let statement = command::parse_line(line).expect("line parses");
    session.execute(statement)
}

fn rows_of(outcome: Outcome) -> Vec<String> {
    match outcome {
        Outcome::Rows(rows) => rows.iter().map(|r| r.to_string()).collect(),
        other => panic!("expected rows, got a different outcome: {}", describe(&other)),
    }
}

fn describe(outcome: &Outcome) -> &'static str {
    match outcome {
        Outcome::Rows(_) => "Rows",
        Outcome::AffectedRows(_) => "AffectedRows",
        Outcome::Message(_) => "Message",
        Outcome::Exit => "Exit",
    }
}

#[test]
fn s1_basic_crud() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = Session::open(db_path(&dir, "s1.db")).unwrap();

    run(&mut session, "insert 1 alice a@x").unwrap();
    run(&mut session, "insert 2 bob b@x").unwrap();
    assert_eq!(
        rows_of(run(&mut session, "select").unwrap()),
        vec!["(1, alice, a@x)", "(2, bob, b@x)"]
    );

    run(&mut session, "update 2 bobby bb@x").unwrap();
    assert_eq!(
        rows_of(run(&mut session, "select where id = 2").unwrap()),
        vec!["(2, bobby, bb@x)"]
    );

    run(&mut session, "delete 1").unwrap();
    assert_eq!(
        rows_of(run(&mut session, "select").unwrap()),
        vec!["(2, bobby, bb@x)"]
    );
}

#[test]
fn s2_insert_forces_a_split() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = Session::open(db_path(&dir, "s2.db")).unwrap();

    for id in 1..=15u32 {
        run(&mut session, &format!("insert {} user{} u{}@x", id, id, id)).unwrap();
    }
    let rows = rows_of(run(&mut session, "select").unwrap());
    assert_eq!(rows.len(), 15);

    let Outcome::Message(dump) = run(&mut session, ".btree").unwrap() else {
        panic!("expected a message outcome for .btree");
    };
    assert!(dump.contains("internal"), "root should have split into an internal page:\n{}", dump);
}

#[test]
fn s3_delete_range_triggers_merge_and_keeps_order() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = Session::open(db_path(&dir, "s3.db")).unwrap();

    for id in 1..=80u32 {
        run(&mut session, &format!("insert {} u{} u{}@x", id, id, id)).unwrap();
    }
    for id in 11..=49u32 {
        run(&mut session, &format!("delete {}", id)).unwrap();
    }

    let rows = rows_of(run(&mut session, "select").unwrap());
    let expected_ids: Vec<u32> = (1..=10).chain(50..=80).collect();
    let got_ids: Vec<u32> = rows
        .iter()
        .map(|r| {
            r.trim_start_matches('(')
                .split(',')
                .next()
                .unwrap()
                .parse()
                .unwrap()
        })
        .collect();
    assert_eq!(got_ids, expected_ids);
}

#[test]
fn s4_transactions_roll_back_and_commit() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = Session::open(db_path(&dir, "s4.db")).unwrap();

    run(&mut session, "insert 1 a a@x").unwrap();
    run(&mut session, "BEGIN").unwrap();
    run(&mut session, "insert 2 b b@x").unwrap();
    run(&mut session, "ROLLBACK").unwrap();
    assert_eq!(rows_of(run(&mut session, "select").unwrap()), vec!["(1, a, a@x)"]);

    // No leaked uniqueness: id 2 can be inserted again after the rollback.
    run(&mut session, "BEGIN").unwrap();
    run(&mut session, "insert 2 b b@x").unwrap();
    run(&mut session, "COMMIT").unwrap();
    assert_eq!(
        rows_of(run(&mut session, "select").unwrap()),
        vec!["(1, a, a@x)", "(2, b, b@x)"]
    );
}

#[test]
fn s5_predicate_and_planner_results_match() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = Session::open(db_path(&dir, "s5.db")).unwrap();

    for id in 1..=50u32 {
        run(&mut session, &format!("insert {} user{} u{}@x", id, id, id)).unwrap();
    }

    assert_eq!(rows_of(run(&mut session, "select where id = 25").unwrap()).len(), 1);
    assert_eq!(rows_of(run(&mut session, "select where id > 45").unwrap()).len(), 5);

    // Operators glued directly to their operands, as spec.md §8's S5
    // literal command text has them.
    let rows = rows_of(
        run(
            &mut session,
            "select where (id<3 OR id>48) AND username != user1",
        )
        .unwrap(),
    );
    assert_eq!(rows, vec!["(2, user2, u2@x)", "(49, user49, u49@x)", "(50, user50, u50@x)"]);
}

#[test]
fn s6_partial_update_honors_unchanged_sentinel() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = Session::open(db_path(&dir, "s6.db")).unwrap();

    run(&mut session, "insert 1 alice a@x").unwrap();
    run(&mut session, "update - new@x where id = 1").unwrap();
    assert_eq!(
        rows_of(run(&mut session, "select where id = 1").unwrap()),
        vec!["(1, alice, new@x)"]
    );

    run(&mut session, "update zed - where id = 1").unwrap();
    assert_eq!(
        rows_of(run(&mut session, "select").unwrap()),
        vec!["(1, zed, new@x)"]
    );
}

#[test]
fn s7_persists_across_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let path = db_path(&dir, "s7.db");

    {
        let mut a = Session::open(&path).unwrap();
        for id in 1..=3u32 {
            run(&mut a, &format!("insert {} u{} u{}@x", id, id, id)).unwrap();
        }
        run(&mut a, ".exit").unwrap();
    }
    {
        let mut b = Session::open(&path).unwrap();
        assert_eq!(rows_of(run(&mut b, "select").unwrap()).len(), 3);
        run(&mut b, "insert 4 u4 u4@x").unwrap();
        run(&mut b, ".exit").unwrap();
    }
    {
        let mut c = Session::open(&path).unwrap();
        assert_eq!(rows_of(run(&mut c, "select").unwrap()).len(), 4);
    }
}

#[test]
fn duplicate_insert_errors_without_corrupting_existing_rows() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = Session::open(db_path(&dir, "dup.db")).unwrap();

    run(&mut session, "insert 1 alice a@x").unwrap();
    let err = run(&mut session, "insert 1 someone else@x").unwrap_err();
    assert_eq!(err.class(), "Duplicate key");
    assert_eq!(
        rows_of(run(&mut session, "select").unwrap()),
        vec!["(1, alice, a@x)"]
    );
}

#[test]
fn analyze_reports_row_count_and_id_bounds() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = Session::open(db_path(&dir, "analyze.db")).unwrap();

    for id in [5u32, 1, 9, 3] {
        run(&mut session, &format!("insert {} u{} u{}@x", id, id, id)).unwrap();
    }
    run(&mut session, ".analyze").unwrap();
    let Outcome::Message(stats) = run(&mut session, ".stats").unwrap() else {
        panic!("expected a message outcome for .stats");
    };
    assert!(stats.contains("row_count: 4"));
    assert!(stats.contains("min_id: 1"));
    assert!(stats.contains("max_id: 9"));
}

#[test]
fn begin_twice_is_a_transaction_state_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = Session::open(db_path(&dir, "txn.db")).unwrap();

    run(&mut session, "BEGIN").unwrap();
    let err = run(&mut session, "BEGIN").unwrap_err();
    assert_eq!(err.class(), "Transaction error");
}

#[test]
fn ensure_statement_enum_is_exhaustively_constructible() {
    // Compile-time sanity: every Statement variant parses from its own
    // canonical line (guards command.rs and this test staying in sync).
    let lines = [
        "insert 1 a a@x",
        "select",
        "select where id = 1",
        "update 1 a a@x",
        "update - - where id = 1",
        "delete 1",
        "delete where id = 1",
        "BEGIN",
        "COMMIT",
        "ROLLBACK",
        ".analyze",
        ".stats",
        ".btree",
        ".constants",
        ".exit",
    ];
    for line in lines {
        let _: Statement = command::parse_line(line).unwrap();
    }
}
