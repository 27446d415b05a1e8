//! CLI commands

pub mod render;
pub mod repo;
