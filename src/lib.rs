pub mod build;
pub mod config;
pub mod db;
pub mod env;
pub mod error;
pub mod graph;
pub mod import_path;
pub mod package;
pub mod runtime;
pub mod vcs;
