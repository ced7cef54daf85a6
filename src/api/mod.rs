//! HTTP API surface.
//!
//! Handlers are thin: they authenticate, validate the request models, call
//! into the repositories, and convert database models to response models.
//! Routing lives in [`crate::build_router`].

pub mod handlers;
pub mod models;
