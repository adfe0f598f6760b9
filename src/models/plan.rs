//! Workout plan documents.
//!
//! Plans are produced by an external planner and stored as uploaded. Only the
//! outer shape is checked; every field the client sends is kept, in order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::utils::validation::deserialize_datetime;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Exercise {
    pub id: String,
    pub name: String,
    pub sets: i64,
    /// Timed exercises carry a duration instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reps: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PlanDay {
    #[serde(rename = "dayIndex")]
    pub day_index: i64,
    pub part: String,
    pub exercises: Vec<Exercise>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PlanDocument {
    #[serde(deserialize_with = "deserialize_datetime")]
    pub start_date: DateTime<Utc>,
    pub days: Vec<PlanDay>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Serialize, Debug, Clone)]
pub struct Plan {
    #[serde(skip_serializing)]
    pub user_id: i64,
    #[serde(flatten)]
    pub document: PlanDocument,
    #[serde(skip_serializing)]
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_fields_survive_round_trip_in_order() {
        let body = json!({
            "start_date": "2025-03-01T08:00:00Z",
            "days": [{
                "dayIndex": 0,
                "part": "legs",
                "exercises": [{
                    "id": "squat",
                    "name": "Squat",
                    "sets": 4,
                    "reps": "8-10",
                    "gifUrl": "https://cdn.example.com/squat.gif",
                    "bodyPart": "upper legs",
                    "instructions": ["brace", "descend"]
                }],
                "focus": "strength"
            }],
            "generator": {"version": 3}
        });
        let plan: PlanDocument = serde_json::from_value(body).unwrap();
        let exercise = &plan.days[0].exercises[0];
        let keys: Vec<&String> = exercise.extra.keys().collect();
        assert_eq!(keys, ["gifUrl", "bodyPart", "instructions"]);

        let out = serde_json::to_value(&plan).unwrap();
        assert_eq!(out["days"][0]["focus"], "strength");
        assert_eq!(out["days"][0]["exercises"][0]["instructions"][1], "descend");
        assert_eq!(out["generator"]["version"], 3);
    }

    #[test]
    fn missing_required_shape_is_rejected() {
        let body = json!({
            "start_date": "2025-03-01",
            "days": [{"dayIndex": 0, "exercises": []}]
        });
        assert!(serde_json::from_value::<PlanDocument>(body).is_err());
    }

    #[test]
    fn exercise_without_reps_is_accepted() {
        let body = json!({
            "start_date": "2025-03-01T08:00:00",
            "days": [{
                "dayIndex": 0,
                "part": "cardio",
                "exercises": [{"id": "run", "name": "Run", "sets": 1, "durationSec": 600}]
            }]
        });
        let plan: PlanDocument = serde_json::from_value(body).unwrap();
        let run = &plan.days[0].exercises[0];
        assert!(run.reps.is_none());
        assert_eq!(run.extra["durationSec"], 600);

        let out = serde_json::to_value(&plan).unwrap();
        let exercise = out["days"][0]["exercises"][0].as_object().unwrap();
        assert!(!exercise.contains_key("reps"));
        assert_eq!(exercise["durationSec"], 600);
    }
}
