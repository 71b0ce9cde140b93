pub mod events;
pub mod language;
pub mod prompt;
pub mod query;

pub use events::{EventStatus, QueryEvent};
pub use query::{QueryPipeline, QueryRequest};
