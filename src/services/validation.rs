use chrono::NaiveDateTime;

use crate::errors::StepError;
use crate::utils::text::is_blank;

#[derive(Clone)]
pub struct Validation;

impl Validation {
    pub fn new() -> Self {
        Self
    }

    pub fn ensure_not_blank(
        &self,
        value: Option<&str>,
        label: &str,
    ) -> Result<String, StepError> {
        let text = value.unwrap_or("");
        if is_blank(text) {
            return Err(StepError::invalid_params(format!(
                "`{}` cannot be blank",
                label
            )));
        }
        Ok(text.trim().to_string())
    }

    pub fn ensure_one_of(
        &self,
        value: &str,
        allowed: &[&str],
        label: &str,
    ) -> Result<String, StepError> {
        if !allowed.contains(&value) {
            return Err(StepError::invalid_params(format!(
                "`{}` must be one of {}",
                label,
                allowed
                    .iter()
                    .map(|v| format!("'{}'", v))
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        }
        Ok(value.to_string())
    }

    /// Parses an optional ISO local date-time (`2023-01-01T00:00:00`, seconds
    /// optional). Blank and absent values are both treated as unset.
    pub fn ensure_date(
        &self,
        value: Option<&str>,
        label: &str,
    ) -> Result<Option<NaiveDateTime>, StepError> {
        let Some(raw) = value else {
            return Ok(None);
        };
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        let parsed = trimmed
            .parse::<NaiveDateTime>()
            .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M"))
            .map_err(|_| {
                StepError::invalid_params(format!(
                    "Cannot parse value `{}` from `{}`.",
                    trimmed, label
                ))
            })?;
        Ok(Some(parsed))
    }
}

impl Default for Validation {
    fn default() -> Self {
        Self::new()
    }
}
