//! Repository implementations for database access.
//!
//! Each repository:
//! - Wraps a SQLx connection or transaction
//! - Provides strongly-typed CRUD operations
//! - Handles query construction and parameter binding
//! - Returns domain models from [`crate::db::models`]
//!
//! # Available Repositories
//!
//! - [`Users`]: User account management and credential lookup
//! - [`Habits`]: Habit records with ownership/visibility scoping
//!
//! [`Users`] implements the [`Repository`] trait; [`Habits`] exposes inherent
//! methods instead because its writes are owner-scoped and take two keys.
//! Both wrap a connection the same way:
//!
//! ```ignore
//! use habitctl::db::handlers::{Users, Repository};
//!
//! async fn example(pool: &sqlx::PgPool) -> Result<(), Box<dyn std::error::Error>> {
//!     let mut conn = pool.acquire().await?;
//!     let mut repo = Users::new(&mut conn);
//!     let user = repo.get_by_id(some_id).await?;
//!     Ok(())
//! }
//! ```

pub mod habits;
pub mod repository;
pub mod users;

pub use habits::{HabitFilter, HabitScope, Habits};
pub use repository::Repository;
pub use users::{UserFilter, Users};
