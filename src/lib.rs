pub mod config;
pub mod engine;
pub mod import;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
pub mod policy;
pub mod seed;
pub mod ticker;
pub mod time;
