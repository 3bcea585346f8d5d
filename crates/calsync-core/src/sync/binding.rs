//! Context/type to calendar binding table.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// One `(context, type) -> calendar` binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarBinding {
    pub context: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub calendar_id: String,
    /// Human-readable source label; defaults to the calendar id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl CalendarBinding {
    pub fn new(context: &str, kind: &str, calendar_id: &str) -> Self {
        Self {
            context: context.to_string(),
            kind: kind.to_string(),
            calendar_id: calendar_id.to_string(),
            label: None,
        }
    }

    pub fn source_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.calendar_id)
    }
}

/// Validated binding table.
///
/// Both directions are unique: no `(context, type)` pair maps to two
/// calendars and no calendar is claimed by two pairs. Enumeration follows
/// configuration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindingTable {
    bindings: Vec<CalendarBinding>,
}

impl BindingTable {
    pub fn new(bindings: Vec<CalendarBinding>) -> Result<Self, ConfigError> {
        for (i, binding) in bindings.iter().enumerate() {
            if binding.calendar_id.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: format!("bindings[{i}].calendar_id"),
                    message: "must not be empty".into(),
                });
            }
            for earlier in &bindings[..i] {
                if earlier.context == binding.context && earlier.kind == binding.kind {
                    return Err(ConfigError::DuplicateBinding {
                        what: format!("({}, {})", binding.context, binding.kind),
                    });
                }
                if earlier.calendar_id == binding.calendar_id {
                    return Err(ConfigError::DuplicateBinding {
                        what: format!("calendar {}", binding.calendar_id),
                    });
                }
            }
        }
        Ok(Self { bindings })
    }

    /// Calendar receiving pushed records labelled `(context, kind)`.
    pub fn calendar_for(&self, context: &str, kind: &str) -> Option<&str> {
        self.bindings
            .iter()
            .find(|b| b.context == context && b.kind == kind)
            .map(|b| b.calendar_id.as_str())
    }

    /// Binding labelling events pulled from `calendar_id`.
    pub fn binding_for_calendar(&self, calendar_id: &str) -> Option<&CalendarBinding> {
        self.bindings.iter().find(|b| b.calendar_id == calendar_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CalendarBinding> {
        self.bindings.iter()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
