//! Command handlers.

pub mod cache;
pub mod init;
pub mod key;
pub mod object;
