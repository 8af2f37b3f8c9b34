pub mod chunker;
pub mod config;
pub mod error;
pub mod frontmatter;
pub mod hook;
pub mod index;
pub mod io;
pub mod paths;
pub mod policy;
pub mod schema;
pub mod state;
pub mod store;
pub mod task;
pub mod transcript;
pub mod walk;

pub use error::{Result, SessionsError};
