// Library for tests to access modules

pub mod aggregation;
pub mod config;
pub mod cycle;
pub mod error;
pub mod models;
pub mod snapshot_source;
pub mod state_repo;
pub mod version;
