//! Per-entity-type metadata validation, grounded on `nebula_mcp/models.py`'s
//! `BaseMetadata` family and `validate_entity_metadata` dispatcher.
//!
//! Every entity type gets a typed shape with a shared base (`description`,
//! `urls`, `aliases`, `context_segments`) plus its own fields; unknown extra
//! keys are preserved via `#[serde(flatten)]` so schema evolution doesn't
//! block writes, matching the source's `extra="allow"`.

use crate::sanitize::reject_banned_metadata_keys;
use nebula_core::{ContextSegment, ExecutorError, NebulaResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BaseMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urls: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aliases: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_segments: Option<Vec<ContextSegment>>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersonMetadata {
    #[serde(flatten)]
    pub base: BaseMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub second_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_year: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_month: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_day: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uni: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<serde_json::Map<String, Value>>,
}

fn is_leap_year(year: i64) -> bool {
    year % 400 == 0 || (year % 4 == 0 && year % 100 != 0)
}

impl PersonMetadata {
    /// `_month_range`/`_day_range`/`_validate_date_combo`: month in 1-12, day
    /// in 1-31, then re-checked against the actual days-in-month for that
    /// year (leap years included) once both are present.
    fn validate_birth_date(&self) -> NebulaResult<()> {
        if let Some(month) = self.birth_month {
            if !(1..=12).contains(&month) {
                return Err(invalid("birth month out of range"));
            }
        }
        if let Some(day) = self.birth_day {
            if !(1..=31).contains(&day) {
                return Err(invalid("birth day out of range"));
            }
        }
        if let (Some(month), Some(day)) = (self.birth_month, self.birth_day) {
            let max_day = match month {
                4 | 6 | 9 | 11 => 30,
                2 => match self.birth_year {
                    Some(year) if is_leap_year(year) => 29,
                    Some(_) => 28,
                    None => 29,
                },
                _ => 31,
            };
            if day > max_day {
                return Err(invalid("birth day invalid for birth month"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectMetadata {
    #[serde(flatten)]
    pub base: BaseMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tech_stack: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolMetadata {
    #[serde(flatten)]
    pub base: BaseMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrganizationMetadata {
    #[serde(flatten)]
    pub base: BaseMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CourseMetadata {
    #[serde(flatten)]
    pub base: BaseMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub institution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub term: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructor: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdeaMetadata {
    #[serde(flatten)]
    pub base: BaseMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FrameworkMetadata {
    #[serde(flatten)]
    pub base: BaseMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaperMetadata {
    #[serde(flatten)]
    pub base: BaseMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authors: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub venue: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UniversityMetadata {
    #[serde(flatten)]
    pub base: BaseMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
}

fn invalid(reason: &str) -> nebula_core::NebulaError {
    ExecutorError::Invalid {
        reason: reason.to_string(),
    }
    .into()
}

fn from_value<T: for<'de> Deserialize<'de>>(metadata: &Value) -> NebulaResult<T> {
    serde_json::from_value(metadata.clone()).map_err(|e| invalid(&e.to_string()))
}

/// `validate_entity_metadata`: dispatches by entity type name to a typed
/// shape, validates it, and returns the normalized JSON (`None` fields
/// dropped, matching `model_dump(exclude_none=True)`). Types with no
/// dedicated model fall back to the base shape, same as the source's
/// `type_map.get(entity_type, BaseMetadata)`.
pub fn validate_entity_metadata(entity_type: &str, metadata: &Value) -> NebulaResult<Value> {
    if !metadata.is_object() {
        return Err(invalid("metadata must be a JSON object"));
    }
    reject_banned_metadata_keys(metadata)?;

    let normalized = match entity_type {
        "person" => {
            let person: PersonMetadata = from_value(metadata)?;
            person.validate_birth_date()?;
            serde_json::to_value(person)
        }
        "project" => serde_json::to_value(from_value::<ProjectMetadata>(metadata)?),
        "tool" => serde_json::to_value(from_value::<ToolMetadata>(metadata)?),
        "organization" => serde_json::to_value(from_value::<OrganizationMetadata>(metadata)?),
        "course" => serde_json::to_value(from_value::<CourseMetadata>(metadata)?),
        "idea" => serde_json::to_value(from_value::<IdeaMetadata>(metadata)?),
        "framework" => serde_json::to_value(from_value::<FrameworkMetadata>(metadata)?),
        "paper" => serde_json::to_value(from_value::<PaperMetadata>(metadata)?),
        "university" => serde_json::to_value(from_value::<UniversityMetadata>(metadata)?),
        _ => serde_json::to_value(from_value::<BaseMetadata>(metadata)?),
    };
    normalized.map_err(|e| invalid(&e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn person_rejects_feb_30() {
        let metadata = json!({"birth_year": 2023, "birth_month": 2, "birth_day": 30});
        assert!(validate_entity_metadata("person", &metadata).is_err());
    }

    #[test]
    fn person_accepts_leap_day() {
        let metadata = json!({"birth_year": 2024, "birth_month": 2, "birth_day": 29});
        assert!(validate_entity_metadata("person", &metadata).is_ok());
    }

    #[test]
    fn person_rejects_non_leap_day() {
        let metadata = json!({"birth_year": 2023, "birth_month": 2, "birth_day": 29});
        assert!(validate_entity_metadata("person", &metadata).is_err());
    }

    #[test]
    fn person_rejects_century_non_leap_year() {
        let metadata = json!({"birth_year": 1900, "birth_month": 2, "birth_day": 29});
        assert!(validate_entity_metadata("person", &metadata).is_err());
    }

    #[test]
    fn person_accepts_400_year_leap() {
        let metadata = json!({"birth_year": 2000, "birth_month": 2, "birth_day": 29});
        assert!(validate_entity_metadata("person", &metadata).is_ok());
    }

    #[test]
    fn unknown_entity_type_falls_back_to_base_and_keeps_extra_fields() {
        let metadata = json!({"description": "unscoped note", "custom_field": "kept"});
        let result = validate_entity_metadata("widget", &metadata).unwrap();
        assert_eq!(result["description"], "unscoped note");
        assert_eq!(result["custom_field"], "kept");
    }

    #[test]
    fn rejects_banned_key_before_type_dispatch() {
        let metadata = json!({"__proto__": {}});
        assert!(validate_entity_metadata("project", &metadata).is_err());
    }
}
