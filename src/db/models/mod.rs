//! Database request/response models.
//!
//! These structs shape what goes into and comes out of the repositories in
//! [`crate::db::handlers`]. They are deliberately separate from the API
//! models so that the storage representation can evolve independently of the
//! public contract.

pub mod habits;
pub mod users;
