#![forbid(unsafe_code)]

//! HTTP daemon for per-identity onboarding progress: configuration, caller authentication,
//! checklist routes and admin commands.

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod service;

/// Departments, tasks and employee records applied by `seed`.
pub const BUNDLED_CATALOG: &str = include_str!("../seed/catalog.json");
