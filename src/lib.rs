pub mod codec;
pub mod commands;
pub mod crypto;
pub mod error;
pub mod models;
pub mod output;
pub mod parser;
pub mod session;
pub mod store;
pub mod template;

pub use error::KvError;
