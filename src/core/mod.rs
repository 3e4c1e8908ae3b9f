// src/core/mod.rs

pub mod cache;
pub mod environment;
pub mod health;
pub mod loader;
pub mod manifest;
pub mod orchestrator;
pub mod parser;
pub mod paths;
pub mod queries;
pub mod registry;
pub mod settings;
pub mod unit;
