//! Local SQLite database

pub mod init;

pub use init::*;
