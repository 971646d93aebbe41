// src/cli/handlers/mod.rs

// One module per group of console commands.

pub mod catalog;
pub mod commons;
pub mod general;
pub mod metadata;
pub mod run;
pub mod search;
pub mod sessions;
