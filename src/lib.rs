pub mod config;
pub mod profile;
pub mod scanner;
pub mod transport;
pub mod resolver;
pub mod archive;
pub mod ledger;
pub mod audit;
pub mod error;
pub mod engine;

pub use error::PoUploadError;
pub type Result<T> = std::result::Result<T, PoUploadError>;
