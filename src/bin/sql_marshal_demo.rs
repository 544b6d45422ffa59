//! Walks a small table through insert, lookup, update, listing and delete using
//! typed statements.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use clap::Parser;
use sql_marshal::prelude::*;
use tracing::Level;

#[derive(Parser, Debug)]
#[command(author, version, about = "Typed statement walkthrough on an SQLite file")]
struct Args {
    /// Database file; created if missing.
    #[arg(long, default_value = "example.db")]
    db: PathBuf,
    /// Options as JSON, overriding the defaults (db path still comes from --db).
    #[arg(long)]
    options: Option<String>,
    #[arg(long)]
    verbose: bool,
}

#[derive(Default)]
struct CountingHook {
    commits: AtomicUsize,
    rollbacks: AtomicUsize,
}

impl TransactionHook for CountingHook {
    fn after_commit(&self) {
        self.commits.fetch_add(1, Ordering::Relaxed);
    }

    fn after_rollback(&self) {
        self.rollbacks.fetch_add(1, Ordering::Relaxed);
    }
}

fn main() {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .init();

    if let Err(err) = run(&args) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), SqlMarshalError> {
    let mut opts = match &args.options {
        Some(json) => ConnectionOptions::from_json(json)?,
        None => ConnectionOptions::default(),
    };
    opts.db_path = args.db.to_string_lossy().into_owned();
    let conn = Connection::open_with(opts)?;

    let hook = Arc::new(CountingHook::default());
    conn.set_transaction_hook(Some(hook.clone()));

    let mut create =
        Statement::new("create table if not exists EXAMPLE (id INTEGER primary key, data TEXT)");
    let mut insert = Statement::new("insert into EXAMPLE (data) values (?)");
    let mut insert_returning = Statement::new("insert into EXAMPLE (data) values (?) returning id");
    let mut select_count = Statement::new("select count(*) from EXAMPLE");
    let mut select_all = Statement::new("select id, data from EXAMPLE");
    let mut select_data = Statement::new("select data from EXAMPLE where id = ?");
    let mut update_data = Statement::new("update EXAMPLE set data = ? where id = ?");
    let mut delete_id = Statement::new("delete from EXAMPLE where id = ?");

    conn.execute(&mut create, ())?;

    let id = conn.transaction(|conn| {
        conn.execute(&mut insert, "Hello")?;
        conn.execute_for_one::<i64>(&mut insert_returning, "World")
    })?;
    let data: String = conn.execute_for_one(&mut select_data, id)?;
    tracing::info!(id, %data, "inserted");

    conn.execute(&mut update_data, ("World !", id))?;
    tracing::info!(changes = conn.changes(), "updated");

    for (id, data) in conn.execute_for_multiple::<(i64, String)>(&mut select_all, ())? {
        println!("{id} {data}");
    }

    conn.execute(&mut delete_id, id)?;
    let remaining: i64 = conn.execute_for_one(&mut select_count, ())?;
    println!("{remaining}");

    tracing::info!(
        commits = hook.commits.load(Ordering::Relaxed),
        rollbacks = hook.rollbacks.load(Ordering::Relaxed),
        "transaction hook summary"
    );
    Ok(())
}
