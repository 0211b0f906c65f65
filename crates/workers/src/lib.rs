//! `workers` crate — the `BatchWorker` trait and the worker invokers.
//!
//! The orchestrator never scrapes anything itself: every batch is handed to a
//! [`BatchWorker`], which reports completion or failure back to the driver.

pub mod error;
pub mod traits;
pub mod http;
pub mod mock;

pub use error::WorkerError;
pub use traits::{BatchWorker, InvocationContext, WorkerResult, WorkerStatus};
pub use http::HttpWorker;

/// Default object-store prefix the scraper writes under.
pub const DEFAULT_OBJECT_PREFIX: &str = "syllabus/";

/// Object-store key a worker writes the scraped result of `school` to.
pub fn object_key(prefix: &str, school: &str) -> String {
    format!("{prefix}{school}.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_key_is_keyed_by_school_code() {
        assert_eq!(object_key(DEFAULT_OBJECT_PREFIX, "G_SICCS"), "syllabus/G_SICCS.json");
        assert_eq!(object_key("", "GEC"), "GEC.json");
    }
}
