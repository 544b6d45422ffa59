//! Typed parameter/result marshalling and nested transaction scopes over `rusqlite`.
//!
//! ```rust
//! use sql_marshal::prelude::*;
//!
//! # fn main() -> Result<(), SqlMarshalError> {
//! let conn = Connection::open_in_memory()?;
//! conn.execute_batch("create table notes (id INTEGER primary key, body TEXT)")?;
//!
//! let mut insert = Statement::new("insert into notes (body) values (?) returning id");
//! let mut select_all = Statement::new("select id, body from notes order by id");
//!
//! let id = conn.transaction(|conn| conn.execute_for_one::<i64>(&mut insert, "hello"))?;
//! let rows: Vec<(i64, String)> = conn.execute_for_multiple(&mut select_all, ())?;
//! assert_eq!(rows, vec![(id, "hello".to_string())]);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod marshal;
pub mod prelude;
pub mod primitive;
pub mod statement;

pub use config::{ConnectionOptions, ConnectionOptionsBuilder, DEFAULT_MAX_BLOB_LEN};
pub use connection::{Connection, ConnectionId, TransactionHook};
pub use error::{Result, SqlMarshalError};
pub use marshal::{Datum, Element, Elements, FromColumns, Param, Shape, ToParam};
pub use statement::Statement;
