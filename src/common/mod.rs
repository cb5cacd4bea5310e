pub mod config;
pub mod error;
pub mod vector_io;

pub use config::Config;
