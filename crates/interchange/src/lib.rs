pub mod html;
pub mod ingest;
pub mod markdown;
pub mod session;

pub use crate::ingest::{ContentFormat, ImageSource, IngestError};
pub use crate::session::EditorSession;
