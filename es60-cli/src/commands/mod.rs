//! Subcommand implementations

pub mod analyse;
pub mod correct;
pub mod info;
