pub mod cli;
pub mod host;
