pub mod address;
pub mod auth_results;
pub mod checks;
pub mod config;
pub mod domain_utils;
pub mod engine;
pub mod error;
pub mod headers;
pub mod milter;
pub mod results;
pub mod transaction;

pub use auth_results::{AuthResults, Mechanism};
pub use checks::{Action, HeaderCheck};
pub use config::HeadersConfig;
pub use engine::{Engine, EngineHandle};
pub use error::HeadersError;
pub use headers::HeaderStore;
pub use milter::Milter;
pub use results::{CheckResults, ResultEntry, ResultSink, RESULT_SOURCE};
pub use transaction::{EnvelopeAddress, Transaction};
