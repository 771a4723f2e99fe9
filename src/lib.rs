// Library for tests to access modules

pub mod config;
pub mod config_repo;
pub mod error;
pub mod models;
pub mod monitor;
pub mod prober;
pub mod reconciler;
pub mod routes;
pub mod tracker;
pub mod wg_repo;
