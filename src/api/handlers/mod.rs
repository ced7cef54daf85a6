//! Request handlers for the HTTP API.
//!
//! - [`tokens`]: credential login and token refresh
//! - [`users`]: account registration and user CRUD
//! - [`habits`]: habit CRUD with owner/public visibility scoping

pub mod habits;
pub mod tokens;
pub mod users;
