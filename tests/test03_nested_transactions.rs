use std::cell::RefCell;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use sql_marshal::prelude::*;
use tempfile::tempdir;

#[derive(Default)]
struct CountingHook {
    after_begin: AtomicUsize,
    before_commit: AtomicUsize,
    after_commit: AtomicUsize,
    after_rollback: AtomicUsize,
}

impl CountingHook {
    fn counts(&self) -> [usize; 4] {
        [
            self.after_begin.load(Ordering::SeqCst),
            self.before_commit.load(Ordering::SeqCst),
            self.after_commit.load(Ordering::SeqCst),
            self.after_rollback.load(Ordering::SeqCst),
        ]
    }
}

impl TransactionHook for CountingHook {
    fn after_begin(&self) {
        self.after_begin.fetch_add(1, Ordering::SeqCst);
    }

    fn before_commit(&self) {
        self.before_commit.fetch_add(1, Ordering::SeqCst);
    }

    fn after_commit(&self) {
        self.after_commit.fetch_add(1, Ordering::SeqCst);
    }

    fn after_rollback(&self) {
        self.after_rollback.fetch_add(1, Ordering::SeqCst);
    }
}

fn with_hook() -> Result<(Connection, Arc<CountingHook>), SqlMarshalError> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch("CREATE TABLE log (msg TEXT NOT NULL)")?;
    let hook = Arc::new(CountingHook::default());
    conn.set_transaction_hook(Some(hook.clone()));
    Ok((conn, hook))
}

thread_local! {
    static EXECUTED: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

fn record_statement(sql: &str) {
    EXECUTED.with(|log| log.borrow_mut().push(sql.to_owned()));
}

fn start_tracing(conn: &mut Connection) {
    EXECUTED.with(|log| log.borrow_mut().clear());
    conn.trace(Some(record_statement));
}

/// Transaction control statements SQLite actually ran on this thread.
fn engine_boundaries() -> Vec<String> {
    EXECUTED.with(|log| {
        log.borrow()
            .iter()
            .filter(|sql| matches!(sql.as_str(), "BEGIN" | "COMMIT" | "ROLLBACK"))
            .cloned()
            .collect()
    })
}

fn count_rows(conn: &Connection) -> Result<i64, SqlMarshalError> {
    let mut count = Statement::new("SELECT count(*) FROM log");
    conn.execute_for_one(&mut count, ())
}

#[test]
fn nested_begin_commit_crosses_the_engine_once() -> Result<(), Box<dyn std::error::Error>> {
    let (mut conn, hook) = with_hook()?;
    start_tracing(&mut conn);

    conn.begin()?;
    assert_eq!(conn.transaction_depth(), 1);
    conn.begin()?;
    assert_eq!(conn.transaction_depth(), 2);
    assert_eq!(hook.counts(), [1, 0, 0, 0]);
    assert_eq!(engine_boundaries(), ["BEGIN"]);

    conn.commit()?;
    assert_eq!(conn.transaction_depth(), 1);
    assert!(conn.in_transaction());
    assert_eq!(hook.counts(), [1, 0, 0, 0]);
    assert_eq!(engine_boundaries(), ["BEGIN"]);

    conn.commit()?;
    assert_eq!(conn.transaction_depth(), 0);
    assert_eq!(hook.counts(), [1, 1, 1, 0]);
    assert_eq!(engine_boundaries(), ["BEGIN", "COMMIT"]);
    Ok(())
}

#[test]
fn inner_commit_is_not_visible_until_outer_commit() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let path = dir.path().join("visibility.db").to_string_lossy().into_owned();
    let writer = Connection::builder(path.clone())
        .journal_mode("wal")
        .busy_timeout_ms(1000)
        .open()?;
    writer.execute_batch("CREATE TABLE log (msg TEXT NOT NULL)")?;
    let reader = Connection::open(path)?;

    let mut insert = Statement::new("INSERT INTO log (msg) VALUES (?)");
    writer.begin()?;
    writer.begin()?;
    writer.execute(&mut insert, "inner")?;
    writer.commit()?;
    assert_eq!(count_rows(&reader)?, 0);

    writer.commit()?;
    assert_eq!(count_rows(&reader)?, 1);
    Ok(())
}

#[test]
fn commit_and_rollback_at_depth_zero_are_usage_errors() -> Result<(), Box<dyn std::error::Error>> {
    let (conn, hook) = with_hook()?;

    let err = conn.commit().unwrap_err();
    assert!(matches!(err, SqlMarshalError::TransactionState(_)));
    assert!(err.is_usage_error());

    let err = conn.rollback().unwrap_err();
    assert!(matches!(err, SqlMarshalError::TransactionState(_)));
    assert_eq!(hook.counts(), [0, 0, 0, 0]);
    assert_eq!(conn.transaction_depth(), 0);
    Ok(())
}

#[test]
fn nested_rollback_defers_to_outer_scope() -> Result<(), Box<dyn std::error::Error>> {
    let (mut conn, hook) = with_hook()?;
    start_tracing(&mut conn);
    let mut insert = Statement::new("INSERT INTO log (msg) VALUES (?)");

    conn.begin()?;
    conn.execute(&mut insert, "outer")?;
    conn.begin()?;
    conn.execute(&mut insert, "inner")?;
    conn.rollback()?;

    // Only the logical level unwound; the engine transaction is still open.
    assert_eq!(conn.transaction_depth(), 1);
    assert_eq!(hook.counts(), [1, 0, 0, 0]);
    assert_eq!(count_rows(&conn)?, 2);
    assert_eq!(engine_boundaries(), ["BEGIN"]);

    conn.rollback()?;
    assert_eq!(hook.counts(), [1, 0, 0, 1]);
    assert_eq!(count_rows(&conn)?, 0);
    assert_eq!(engine_boundaries(), ["BEGIN", "ROLLBACK"]);
    Ok(())
}

#[test]
fn scoped_transaction_commits_on_success() -> Result<(), Box<dyn std::error::Error>> {
    let (conn, hook) = with_hook()?;
    let mut insert = Statement::new("INSERT INTO log (msg) VALUES (?)");

    let written = conn.transaction(|conn| -> Result<usize, SqlMarshalError> {
        for msg in ["a", "b", "c"] {
            conn.execute(&mut insert, msg)?;
        }
        Ok(3)
    })?;

    assert_eq!(written, 3);
    assert_eq!(count_rows(&conn)?, 3);
    assert_eq!(hook.counts(), [1, 1, 1, 0]);
    Ok(())
}

#[derive(Debug, PartialEq)]
enum AppError {
    Db(String),
    Rejected(&'static str),
}

impl From<SqlMarshalError> for AppError {
    fn from(err: SqlMarshalError) -> Self {
        AppError::Db(err.to_string())
    }
}

#[test]
fn scoped_transaction_rolls_back_and_returns_the_original_error()
-> Result<(), Box<dyn std::error::Error>> {
    let (conn, hook) = with_hook()?;
    let mut insert = Statement::new("INSERT INTO log (msg) VALUES (?)");

    let result: Result<(), AppError> = conn.transaction(|conn| {
        conn.execute(&mut insert, "doomed")?;
        Err(AppError::Rejected("validation failed"))
    });

    assert_eq!(result, Err(AppError::Rejected("validation failed")));
    assert_eq!(conn.transaction_depth(), 0);
    assert_eq!(count_rows(&conn)?, 0);
    assert_eq!(hook.counts(), [1, 0, 0, 1]);
    Ok(())
}

#[test]
fn inner_scope_failure_rolls_back_once_at_the_outer_boundary()
-> Result<(), Box<dyn std::error::Error>> {
    let (conn, hook) = with_hook()?;
    let mut insert = Statement::new("INSERT INTO log (msg) VALUES (?)");

    let result: Result<(), AppError> = conn.transaction(|conn| {
        conn.execute(&mut insert, "outer")?;
        conn.transaction(|conn| -> Result<(), AppError> {
            conn.execute(&mut insert, "inner")?;
            assert_eq!(conn.transaction_depth(), 2);
            Err(AppError::Rejected("inner failed"))
        })?;
        unreachable!("inner failure propagates");
    });

    assert_eq!(result, Err(AppError::Rejected("inner failed")));
    assert_eq!(hook.counts(), [1, 0, 0, 1]);
    assert_eq!(count_rows(&conn)?, 0);
    Ok(())
}

#[test]
fn outer_scope_may_recover_from_inner_failure() -> Result<(), Box<dyn std::error::Error>> {
    let (conn, hook) = with_hook()?;
    let mut insert = Statement::new("INSERT INTO log (msg) VALUES (?)");

    conn.transaction(|conn| -> Result<(), AppError> {
        conn.execute(&mut insert, "kept")?;
        let inner: Result<(), AppError> =
            conn.transaction(|_| Err(AppError::Rejected("ignored")));
        assert!(inner.is_err());
        assert_eq!(conn.transaction_depth(), 1);
        Ok(())
    })
    .map_err(|e| format!("{e:?}"))?;

    assert_eq!(hook.counts(), [1, 1, 1, 0]);
    assert_eq!(count_rows(&conn)?, 1);
    Ok(())
}

#[test]
fn panic_inside_scope_rolls_back() -> Result<(), Box<dyn std::error::Error>> {
    let (conn, hook) = with_hook()?;
    let mut insert = Statement::new("INSERT INTO log (msg) VALUES (?)");

    let outcome = catch_unwind(AssertUnwindSafe(|| {
        let _: Result<(), SqlMarshalError> = conn.transaction(|conn| {
            conn.execute(&mut insert, "half")?;
            panic!("boom");
        });
    }));

    assert!(outcome.is_err());
    assert_eq!(conn.transaction_depth(), 0);
    assert_eq!(hook.counts(), [1, 0, 0, 1]);
    assert_eq!(count_rows(&conn)?, 0);
    Ok(())
}

struct PanicsAfterBegin;

impl TransactionHook for PanicsAfterBegin {
    fn after_begin(&self) {
        panic!("hook failed");
    }
}

#[test]
fn panic_in_after_begin_hook_rolls_back() -> Result<(), Box<dyn std::error::Error>> {
    let (mut conn, _) = with_hook()?;
    start_tracing(&mut conn);
    conn.set_transaction_hook(Some(Arc::new(PanicsAfterBegin)));

    let outcome = catch_unwind(AssertUnwindSafe(|| {
        let _: Result<(), SqlMarshalError> = conn.transaction(|_| Ok(()));
    }));
    assert!(outcome.is_err());
    assert_eq!(conn.transaction_depth(), 0);
    assert_eq!(engine_boundaries(), ["BEGIN", "ROLLBACK"]);

    // The engine is back in autocommit, so a fresh transaction can open.
    conn.set_transaction_hook(None);
    conn.transaction(|_| Ok::<_, SqlMarshalError>(()))?;
    assert_eq!(engine_boundaries(), ["BEGIN", "ROLLBACK", "BEGIN", "COMMIT"]);
    Ok(())
}

#[test]
fn failed_outer_commit_rolls_back() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Connection::builder(":memory:").foreign_keys(true).open()?;
    conn.execute_batch(
        "CREATE TABLE parent (id INTEGER PRIMARY KEY);
         CREATE TABLE child (
            parent_id INTEGER REFERENCES parent(id) DEFERRABLE INITIALLY DEFERRED
         );",
    )?;
    let hook = Arc::new(CountingHook::default());
    conn.set_transaction_hook(Some(hook.clone()));
    let mut orphan = Statement::new("INSERT INTO child (parent_id) VALUES (?)");

    let result = conn.transaction(|conn| conn.execute(&mut orphan, 404_i64));
    assert!(matches!(result, Err(SqlMarshalError::SqliteError(_))));
    assert_eq!(conn.transaction_depth(), 0);
    assert_eq!(hook.counts(), [1, 1, 0, 1]);

    let mut count = Statement::new("SELECT count(*) FROM child");
    assert_eq!(conn.execute_for_one::<i64>(&mut count, ())?, 0);
    Ok(())
}

#[test]
fn replacing_the_hook_returns_the_previous_one() -> Result<(), Box<dyn std::error::Error>> {
    let (conn, first) = with_hook()?;
    let second = Arc::new(CountingHook::default());

    let previous = conn.set_transaction_hook(Some(second.clone()));
    assert!(previous.is_some());

    conn.transaction(|_| Ok::<_, SqlMarshalError>(()))?;
    assert_eq!(first.counts(), [0, 0, 0, 0]);
    assert_eq!(second.counts(), [1, 1, 1, 0]);

    assert!(conn.set_transaction_hook(None).is_some());
    conn.transaction(|_| Ok::<_, SqlMarshalError>(()))?;
    assert_eq!(second.counts(), [1, 1, 1, 0]);
    Ok(())
}

#[test]
fn connection_with_a_hook_moves_to_a_worker_thread() -> Result<(), Box<dyn std::error::Error>> {
    let (conn, hook) = with_hook()?;

    let worker = std::thread::spawn(move || {
        let mut insert = Statement::new("INSERT INTO log (msg) VALUES (?)");
        conn.transaction(|conn| conn.execute(&mut insert, "from worker"))?;
        count_rows(&conn)
    });
    let rows = worker.join().map_err(|_| "worker panicked")??;

    assert_eq!(rows, 1);
    assert_eq!(hook.counts(), [1, 1, 1, 0]);
    Ok(())
}
