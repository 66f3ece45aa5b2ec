use chrono::NaiveDate;
use rocket::serde::json::Json;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::instrument;
use validator::Validate;

use crate::error::AppError;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug)]
pub struct ValidationErrorWrapper(pub validator::ValidationErrors);

impl From<ValidationErrorWrapper> for AppError {
    #[instrument]
    fn from(wrapper: ValidationErrorWrapper) -> Self {
        let mut messages: Vec<String> = Vec::new();

        let mut fields: Vec<_> = wrapper.0.field_errors().into_iter().collect();
        fields.sort_by(|a, b| a.0.cmp(&b.0));

        for (field, field_errors) in fields {
            for error in field_errors {
                let message = error
                    .message
                    .clone()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Campo inválido: {}.", field));

                if !messages.contains(&message) {
                    messages.push(message);
                }
            }
        }

        AppError::Validation(messages.join(" "))
    }
}

pub trait ValidateExt: Validate + Sized {
    fn validate_custom(self) -> Result<Self, AppError> {
        self.validate().map_err(ValidationErrorWrapper)?;
        Ok(self)
    }
}

impl<T: Validate> ValidateExt for T {}

/// Decodes a JSON body into a request type. Shape errors are client errors.
pub fn parse_body<T: DeserializeOwned>(body: Json<Value>) -> Result<T, AppError> {
    serde_json::from_value(body.into_inner())
        .map_err(|e| AppError::Validation(format!("Cuerpo de la solicitud inválido: {}.", e)))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(i64),
    Text(String),
}

/// Accepts ids as JSON numbers or numeric strings. Empty, `null` and
/// non-positive values count as absent.
pub fn lenient_id<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<RawId>::deserialize(deserializer)?;

    let id = match raw {
        None => None,
        Some(RawId::Number(n)) => Some(n),
        Some(RawId::Text(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.parse::<i64>().map_err(|_| {
                    serde::de::Error::custom(format!("identificador inválido: {:?}", s))
                })?)
            }
        }
    };

    Ok(id.filter(|n| *n > 0))
}

/// Trims text fields; blank strings count as absent.
pub fn non_blank<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty()))
}

/// Date filter for the history. Applied only when both bounds are present.
pub fn date_range(
    start: Option<&str>,
    end: Option<&str>,
) -> Result<Option<(NaiveDate, NaiveDate)>, AppError> {
    let start = start.map(str::trim).filter(|s| !s.is_empty());
    let end = end.map(str::trim).filter(|s| !s.is_empty());

    match (start, end) {
        (Some(start), Some(end)) => Ok(Some((parse_date(start)?, parse_date(end)?))),
        _ => Ok(None),
    }
}

fn parse_date(value: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
        AppError::Validation(format!(
            "Fecha inválida: {}. Use el formato AAAA-MM-DD.",
            value
        ))
    })
}
