//! # AAC Common Library
//!
//! Shared code for the AAC picture board crates including:
//! - Canonical category/card model
//! - Configuration loading
//! - Board event bus
//! - Signed request helpers for the media host

pub mod config;
pub mod error;
pub mod events;
pub mod models;
pub mod signing;

pub use error::{Error, Result};
pub use models::{Card, CardPatch, Category, CategoryPatch, MediaRef, UserId};
