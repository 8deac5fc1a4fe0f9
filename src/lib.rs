pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod utils;

pub use error::{Result, VocabError};
