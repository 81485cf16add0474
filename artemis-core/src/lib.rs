//! Core library for Artemis spawn import and mob matching.

pub mod catalog;
pub mod config;
pub mod database;
pub mod error;
pub mod feed;
pub mod geo;
pub mod hp_match;
pub mod models;
pub mod proximity;
pub mod session;
pub mod sync;

pub use error::{ArtemisError, Result};
pub use geo::Coordinate;
