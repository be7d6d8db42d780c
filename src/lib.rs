pub mod app;
pub mod auth;
pub mod composer;
pub mod config;
pub mod draft;
pub mod error;
pub mod logs;
pub mod models;
pub mod payload;
pub mod service;
pub mod ui;

#[cfg(test)]
mod testing;
