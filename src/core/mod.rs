// src/core/mod.rs

pub mod catalog;
pub mod config;
pub mod discovery;
pub mod dispatcher;
pub mod handlers;
pub mod metadata;
pub mod output;
pub mod paths;
pub mod project;
pub mod prompt;
pub mod quick_commands;
pub mod registry;
pub mod session_runner;
pub mod spec_builder;
pub mod specialization;
pub mod surface;
