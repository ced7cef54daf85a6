//! API request/response models.
//!
//! These are the wire types for the HTTP surface, kept separate from the
//! database models in [`crate::db::models`]. Conversions between the two
//! live here so handlers stay thin.

pub mod habits;
pub mod pagination;
pub mod tokens;
pub mod users;
