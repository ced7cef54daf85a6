//! Database models for habits.

use crate::types::{HabitId, UserId};
use chrono::{DateTime, NaiveTime, Utc};

/// Database request for creating a new habit
///
/// The owner is always set by the caller from the authenticated request;
/// there is no way for a request body to choose a different owner.
#[derive(Debug, Clone)]
pub struct HabitCreateDBRequest {
    pub owner_id: UserId,
    pub place: String,
    pub time: NaiveTime,
    pub action: String,
    pub is_pleasant: bool,
    pub related_habit_id: Option<HabitId>,
    pub periodicity_days: i32,
    pub reward: Option<String>,
    pub duration_seconds: i32,
    pub is_published: bool,
}

/// Database request for updating a habit
///
/// `None` fields are left untouched. `reward` and `related_habit_id` use a
/// double Option so a caller can distinguish "leave as is" from "clear".
#[derive(Debug, Clone, Default)]
pub struct HabitUpdateDBRequest {
    pub place: Option<String>,
    pub time: Option<NaiveTime>,
    pub action: Option<String>,
    pub is_pleasant: Option<bool>,
    pub related_habit_id: Option<Option<HabitId>>,
    pub periodicity_days: Option<i32>,
    pub reward: Option<Option<String>>,
    pub duration_seconds: Option<i32>,
    pub is_published: Option<bool>,
}

/// Database response for a habit
#[derive(Debug, Clone)]
pub struct HabitDBResponse {
    pub id: HabitId,
    pub owner_id: UserId,
    pub place: String,
    pub time: NaiveTime,
    pub action: String,
    pub is_pleasant: bool,
    pub related_habit_id: Option<HabitId>,
    pub periodicity_days: i32,
    pub reward: Option<String>,
    pub duration_seconds: i32,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
