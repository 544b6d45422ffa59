// Connection module - owns the rusqlite handle and everything that runs on it.
//
// - core: opening/closing, identity, pass-through helpers
// - execute: the four calling conventions over a `Statement`
// - tx: nested transaction coordinator and lifecycle hooks

mod core;
mod execute;
mod tx;

pub use self::core::{Connection, ConnectionId};
pub use self::tx::TransactionHook;
