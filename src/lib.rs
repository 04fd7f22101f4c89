pub mod app;
pub mod auth;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod images;
pub mod models;
pub mod seed;
pub mod state;
pub mod store;

pub use app::build_router;
