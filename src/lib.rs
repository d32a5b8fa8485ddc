pub mod api;
pub mod calc;
pub mod config;
pub mod db;
pub mod error;
pub mod fetcher;
pub mod importer;
pub mod stakes;
pub mod types;
