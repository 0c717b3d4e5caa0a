mod command;
mod dispatch;
mod document;
mod ops;
mod schema;
mod snapshot;

pub use crate::command::*;
pub use crate::dispatch::*;
pub use crate::document::*;
pub use crate::ops::*;
pub use crate::schema::*;
pub use crate::snapshot::*;
