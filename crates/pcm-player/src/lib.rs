pub mod cli;
pub mod config;
pub mod decode;
pub mod runtime;
