//! Database layer: repositories, entity models, and error categorization.
//!
//! The database layer follows the repository pattern. Each entity has a
//! repository in [`handlers`] that wraps a `PgConnection` and exposes
//! strongly-typed CRUD operations, and a set of request/response structs in
//! [`models`] that are distinct from the API-facing models in
//! [`crate::api::models`].

pub mod errors;
pub mod handlers;
pub mod models;
