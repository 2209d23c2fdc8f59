pub mod app;
pub mod backend;
pub mod config;
pub mod context;
pub mod error;
pub mod model;
