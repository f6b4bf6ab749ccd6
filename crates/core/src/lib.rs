pub mod config;
pub mod credential;
pub mod error;
pub mod text;
pub mod types;

pub use config::AppConfig;
pub use credential::Credential;
pub use error::{ResolveError, SolveError};
pub use types::*;
