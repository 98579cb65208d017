pub mod answer;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod ingest;
pub mod output;
pub mod search;
