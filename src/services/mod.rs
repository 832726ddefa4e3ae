pub mod connection;
pub mod file_transfer;
pub mod prompt;
