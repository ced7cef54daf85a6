//! API request/response models for habits.
//!
//! A habit is stored in one table but validated against one of two shapes,
//! chosen per request by the `is_pleasant_habit` body field. The flag-to-shape
//! mapping is kept exactly as shipped (`is_pleasant_habit = true` selects the
//! useful-habit rules); existing clients depend on it.

use super::pagination::Pagination;
use crate::db::models::habits::{HabitCreateDBRequest, HabitDBResponse, HabitUpdateDBRequest};
use crate::errors::FieldError;
use crate::types::{HabitId, UserId};
use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};
use utoipa::{IntoParams, ToSchema};

/// Longest allowed execution time for a habit, in seconds.
pub const MAX_DURATION_SECONDS: i32 = 120;

/// Widest allowed repeat interval, in days.
pub const MAX_PERIODICITY_DAYS: i32 = 7;

fn default_periodicity() -> i32 {
    1
}

/// Which validation rules apply to a habit payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationShape {
    /// Useful habit: reward or related habit, never both.
    Useful,
    /// Pleasant habit: no reward, no related habit.
    Pleasant,
}

impl ValidationShape {
    /// Select the shape for a request's `is_pleasant_habit` flag.
    pub fn for_flag(is_pleasant_habit: bool) -> Self {
        if is_pleasant_habit {
            ValidationShape::Useful
        } else {
            ValidationShape::Pleasant
        }
    }

    fn check_links(&self, errors: &mut Vec<FieldError>, has_reward: bool, has_related: bool) {
        match self {
            ValidationShape::Useful => {
                if has_reward && has_related {
                    errors.push(FieldError::new(
                        "reward",
                        "reward and related_habit_id cannot be set together",
                    ));
                }
            }
            ValidationShape::Pleasant => {
                if has_reward {
                    errors.push(FieldError::new("reward", "a pleasant habit cannot have a reward"));
                }
                if has_related {
                    errors.push(FieldError::new(
                        "related_habit_id",
                        "a pleasant habit cannot have a related habit",
                    ));
                }
            }
        }
    }
}

fn check_duration(errors: &mut Vec<FieldError>, duration_seconds: i32) {
    if !(1..=MAX_DURATION_SECONDS).contains(&duration_seconds) {
        errors.push(FieldError::new(
            "duration_seconds",
            format!("must be between 1 and {MAX_DURATION_SECONDS} seconds"),
        ));
    }
}

fn check_periodicity(errors: &mut Vec<FieldError>, periodicity_days: i32) {
    if !(1..=MAX_PERIODICITY_DAYS).contains(&periodicity_days) {
        errors.push(FieldError::new(
            "periodicity_days",
            format!("must be between 1 and {MAX_PERIODICITY_DAYS} days"),
        ));
    }
}

// Habit request models
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HabitCreate {
    pub place: String,
    #[schema(value_type = String, format = "time", example = "07:30:00")]
    pub time: NaiveTime,
    pub action: String,
    #[serde(default)]
    pub is_pleasant_habit: bool,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub related_habit_id: Option<HabitId>,
    #[serde(default = "default_periodicity")]
    pub periodicity_days: i32,
    pub reward: Option<String>,
    pub duration_seconds: i32,
    #[serde(default)]
    pub is_published: bool,
}

impl HabitCreate {
    pub fn shape(&self) -> ValidationShape {
        ValidationShape::for_flag(self.is_pleasant_habit)
    }

    /// Field-level validation that needs no database access.
    ///
    /// The related-habit checks (existence, visibility, pleasantness) happen
    /// in the handler where a connection is available.
    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        check_duration(&mut errors, self.duration_seconds);
        check_periodicity(&mut errors, self.periodicity_days);
        self.shape()
            .check_links(&mut errors, self.reward.is_some(), self.related_habit_id.is_some());
        errors
    }

    pub fn into_db_request(self, owner_id: UserId) -> HabitCreateDBRequest {
        HabitCreateDBRequest {
            owner_id,
            place: self.place,
            time: self.time,
            action: self.action,
            is_pleasant: self.is_pleasant_habit,
            related_habit_id: self.related_habit_id,
            periodicity_days: self.periodicity_days,
            reward: self.reward,
            duration_seconds: self.duration_seconds,
            is_published: self.is_published,
        }
    }
}

/// Partial update. Omitted fields are left untouched; `related_habit_id` and
/// `reward` distinguish omitted from explicit `null` (which clears them).
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct HabitUpdate {
    pub place: Option<String>,
    #[schema(value_type = Option<String>, format = "time")]
    pub time: Option<NaiveTime>,
    pub action: Option<String>,
    pub is_pleasant_habit: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<String>, format = "uuid")]
    pub related_habit_id: Option<Option<HabitId>>,
    pub periodicity_days: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "::serde_with::rust::double_option")]
    pub reward: Option<Option<String>>,
    pub duration_seconds: Option<i32>,
    pub is_published: Option<bool>,
}

impl HabitUpdate {
    /// Shape selection reads the request flag only; an omitted flag means the
    /// pleasant-habit rules, regardless of what is stored.
    pub fn shape(&self) -> ValidationShape {
        ValidationShape::for_flag(self.is_pleasant_habit.unwrap_or(false))
    }

    /// Validate the fields supplied in the patch.
    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        if let Some(duration_seconds) = self.duration_seconds {
            check_duration(&mut errors, duration_seconds);
        }
        if let Some(periodicity_days) = self.periodicity_days {
            check_periodicity(&mut errors, periodicity_days);
        }
        let sets_reward = matches!(self.reward, Some(Some(_)));
        let sets_related = matches!(self.related_habit_id, Some(Some(_)));
        self.shape().check_links(&mut errors, sets_reward, sets_related);
        errors
    }

    pub fn into_db_request(self) -> HabitUpdateDBRequest {
        HabitUpdateDBRequest {
            place: self.place,
            time: self.time,
            action: self.action,
            is_pleasant: self.is_pleasant_habit,
            related_habit_id: self.related_habit_id,
            periodicity_days: self.periodicity_days,
            reward: self.reward,
            duration_seconds: self.duration_seconds,
            is_published: self.is_published,
        }
    }
}

// Habit response model
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HabitResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: HabitId,
    #[schema(value_type = String, format = "uuid")]
    pub owner_id: UserId,
    pub place: String,
    #[schema(value_type = String, format = "time")]
    pub time: NaiveTime,
    pub action: String,
    pub is_pleasant_habit: bool,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub related_habit_id: Option<HabitId>,
    pub periodicity_days: i32,
    pub reward: Option<String>,
    pub duration_seconds: i32,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<HabitDBResponse> for HabitResponse {
    fn from(db: HabitDBResponse) -> Self {
        Self {
            id: db.id,
            owner_id: db.owner_id,
            place: db.place,
            time: db.time,
            action: db.action,
            is_pleasant_habit: db.is_pleasant,
            related_habit_id: db.related_habit_id,
            periodicity_days: db.periodicity_days,
            reward: db.reward,
            duration_seconds: db.duration_seconds,
            is_published: db.is_published,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

/// Query parameters for listing habits
///
/// The flattened pagination forces query values through serde's string
/// buffering, so the non-string filters deserialize via `DisplayFromStr`.
#[serde_as]
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct ListHabitsQuery {
    /// Pagination parameters
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    /// Filter by owning user
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[param(value_type = Option<uuid::Uuid>)]
    #[schema(value_type = Option<String>, format = "uuid")]
    pub owner_id: Option<UserId>,

    /// Filter by exact place
    pub place: Option<String>,

    /// Filter by exact time of day
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[param(value_type = Option<String>)]
    pub time: Option<NaiveTime>,

    /// Filter by exact action
    pub action: Option<String>,

    /// Filter by the pleasant/useful variant flag
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[param(value_type = Option<bool>)]
    pub is_pleasant_habit: Option<bool>,

    /// Filter by visibility flag
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[param(value_type = Option<bool>)]
    pub is_published: Option<bool>,

    /// Filter by linked related habit
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[param(value_type = Option<uuid::Uuid>)]
    #[schema(value_type = Option<String>, format = "uuid")]
    pub related_habit_id: Option<HabitId>,

    /// Filter by repeat interval in days
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[param(value_type = Option<i32>)]
    pub periodicity_days: Option<i32>,

    /// Filter by exact reward text
    pub reward: Option<String>,

    /// Filter by exact duration in seconds
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[param(value_type = Option<i32>)]
    pub duration_seconds: Option<i32>,

    /// Case-insensitive substring search over place, action, and reward
    pub search: Option<String>,

    /// Sort order: "id" (ascending, default) or "-id" (descending)
    pub ordering: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn base_create() -> HabitCreate {
        HabitCreate {
            place: "home".to_string(),
            time: NaiveTime::from_hms_opt(7, 30, 0).unwrap(),
            action: "stretch".to_string(),
            is_pleasant_habit: false,
            related_habit_id: None,
            periodicity_days: 1,
            reward: None,
            duration_seconds: 60,
            is_published: false,
        }
    }

    #[test]
    fn test_flag_selects_shape_as_shipped() {
        assert_eq!(ValidationShape::for_flag(true), ValidationShape::Useful);
        assert_eq!(ValidationShape::for_flag(false), ValidationShape::Pleasant);
    }

    #[test]
    fn test_flag_true_allows_reward() {
        let create = HabitCreate {
            is_pleasant_habit: true,
            reward: Some("tea".to_string()),
            ..base_create()
        };
        assert!(create.validate().is_empty());
    }

    #[test]
    fn test_flag_true_rejects_reward_with_related() {
        let create = HabitCreate {
            is_pleasant_habit: true,
            reward: Some("tea".to_string()),
            related_habit_id: Some(Uuid::new_v4()),
            ..base_create()
        };
        let errors = create.validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "reward");
    }

    #[test]
    fn test_flag_false_rejects_reward_and_related() {
        let create = HabitCreate {
            reward: Some("tea".to_string()),
            related_habit_id: Some(Uuid::new_v4()),
            ..base_create()
        };
        let errors = create.validate();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"reward"));
        assert!(fields.contains(&"related_habit_id"));
    }

    #[test]
    fn test_duration_and_periodicity_bounds() {
        let create = HabitCreate {
            duration_seconds: 121,
            periodicity_days: 8,
            ..base_create()
        };
        let errors = create.validate();
        assert_eq!(errors.len(), 2);

        let create = HabitCreate {
            duration_seconds: 0,
            periodicity_days: 0,
            ..base_create()
        };
        assert_eq!(create.validate().len(), 2);

        let create = HabitCreate {
            duration_seconds: 120,
            periodicity_days: 7,
            ..base_create()
        };
        assert!(create.validate().is_empty());
    }

    #[test]
    fn test_create_defaults_from_json() {
        let create: HabitCreate = serde_json::from_str(
            r#"{"place": "park", "time": "08:00:00", "action": "run", "duration_seconds": 90}"#,
        )
        .unwrap();
        assert!(!create.is_pleasant_habit);
        assert_eq!(create.periodicity_days, 1);
        assert!(!create.is_published);
        // Omitted flag means the pleasant-habit rules
        assert_eq!(create.shape(), ValidationShape::Pleasant);
    }

    #[test]
    fn test_update_distinguishes_null_from_omitted() {
        let update: HabitUpdate = serde_json::from_str(r#"{"reward": null}"#).unwrap();
        assert_eq!(update.reward, Some(None));
        assert_eq!(update.related_habit_id, None);

        let update: HabitUpdate = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(update.reward, None);
    }

    #[test]
    fn test_update_validates_supplied_fields_only() {
        let update = HabitUpdate {
            duration_seconds: Some(200),
            ..Default::default()
        };
        assert_eq!(update.validate().len(), 1);

        // Clearing a reward is fine under the pleasant-habit rules
        let update = HabitUpdate {
            reward: Some(None),
            ..Default::default()
        };
        assert!(update.validate().is_empty());

        // Setting one is not
        let update = HabitUpdate {
            reward: Some(Some("tea".to_string())),
            ..Default::default()
        };
        assert_eq!(update.validate().len(), 1);
    }

    #[test]
    fn test_list_query_from_query_string() {
        let q: ListHabitsQuery =
            serde_urlencoded::from_str("skip=2&limit=10&is_pleasant_habit=true&periodicity_days=3&search=water").unwrap();
        assert_eq!(q.pagination.params(), (2, 10));
        assert_eq!(q.is_pleasant_habit, Some(true));
        assert_eq!(q.periodicity_days, Some(3));
        assert_eq!(q.search.as_deref(), Some("water"));
        assert!(q.ordering.is_none());
    }

    #[test]
    fn test_list_query_parses_typed_filters() {
        let owner = Uuid::new_v4();
        let related = Uuid::new_v4();
        let q: ListHabitsQuery = serde_urlencoded::from_str(&format!(
            "owner_id={owner}&time=07:30:00&related_habit_id={related}&reward=tea"
        ))
        .unwrap();
        assert_eq!(q.owner_id, Some(owner));
        assert_eq!(q.time, NaiveTime::from_hms_opt(7, 30, 0));
        assert_eq!(q.related_habit_id, Some(related));
        assert_eq!(q.reward.as_deref(), Some("tea"));
    }

    #[test]
    fn test_response_uses_request_flag_name() {
        let json = serde_json::to_value(HabitResponse::from(HabitDBResponse {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            place: "home".to_string(),
            time: NaiveTime::from_hms_opt(7, 30, 0).unwrap(),
            action: "stretch".to_string(),
            is_pleasant: true,
            related_habit_id: None,
            periodicity_days: 1,
            reward: None,
            duration_seconds: 60,
            is_published: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }))
        .unwrap();
        assert_eq!(json["is_pleasant_habit"], true);
        assert!(json.get("is_pleasant").is_none());
    }
}
