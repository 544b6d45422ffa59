//! Convenient imports for common functionality.
//!
//! This module re-exports the types most callers need to open a connection,
//! run typed statements and compose transaction scopes.

pub use crate::config::{ConnectionOptions, ConnectionOptionsBuilder, DEFAULT_MAX_BLOB_LEN};
pub use crate::connection::{Connection, TransactionHook};
pub use crate::error::SqlMarshalError;
pub use crate::marshal::{Datum, Element, Elements, FromColumns, Param, Shape, ToParam};
pub use crate::statement::Statement;
