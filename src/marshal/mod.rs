//! Typed parameter and result marshalling.
//!
//! Parameters become a [`Param`] tree and results are described by a [`Shape`];
//! [`visit`] walks either tree against an explicit cursor, so composite types
//! flatten onto consecutive positions without shared state.

pub mod cursor;
pub mod element;
pub mod param;
pub mod shape;
pub mod visit;

pub use cursor::{BindCursor, ReadCursor};
pub use element::{Element, Elements};
pub use param::{Param, ToParam};
pub use shape::{Datum, FromColumns, Shape};
pub use visit::{bind_param, read_datum, read_row};
