//! CLI commands

pub mod delete;
pub mod init;
pub mod new;
