// src/system/mod.rs

//! # System Interaction Layer
//!
//! Boundary between the module system and the operating system.
//!
//! ## Modules
//!
//! - **`executor`**: Spawns external processes. Interactive commands (the editor) inherit the
//!   terminal; query commands run with captured output and a hard timeout.
//! - **`shell`**: Launches an interactive shell session (`shellmods shell`) whose startup file is
//!   the rendered module environment.
//! - **`shells_config`**: Known shells, detected from `PATH` and overridable from `config.toml`.

pub mod executor;
pub mod shell;
pub mod shells_config;
