// src/cli/handlers/mod.rs

// One module per CLI command.

pub mod check;
pub mod commons;
pub mod edit;
pub mod list;
pub mod load;
pub mod reload;
pub mod shell;
pub mod status;
pub mod toggle;
