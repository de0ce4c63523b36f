pub mod config;
pub mod db;
pub mod error;
pub mod github_pull;
pub mod sync;
pub mod types;
