use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Authentication error: {0}")]
    AuthError(#[from] AuthError),

    #[error("Validation error: {0}")]
    ValidationError(ValidationErrors),

    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid response: {0}")]
    DecodeError(String),

    #[error("Geo error: {0}")]
    GeoError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl AppError {
    /// Classify a non-success backend response.
    pub fn from_response(status: u16, body: &str) -> Self {
        let parsed = serde_json::from_str::<Value>(body).ok();
        match status {
            400 => {
                let errors = parsed
                    .as_ref()
                    .map(ValidationErrors::from_json)
                    .unwrap_or_else(|| ValidationErrors::message("The request could not be understood by the server."));
                AppError::ValidationError(errors)
            }
            401 => {
                let message = parsed
                    .as_ref()
                    .and_then(extract_message)
                    .unwrap_or_else(|| "Authentication credentials were not provided.".to_string());
                AppError::AuthError(AuthError::Unauthorized(message))
            }
            _ => {
                let message = parsed
                    .as_ref()
                    .and_then(extract_message)
                    .unwrap_or_else(|| default_status_message(status).to_string());
                AppError::ApiError { status, message }
            }
        }
    }

    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        AppError::ValidationError(ValidationErrors::field(field, message))
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, AppError::TransportError(_))
    }

    pub fn is_session_expired(&self) -> bool {
        matches!(self, AppError::AuthError(AuthError::SessionExpired))
    }

    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            AppError::ValidationError(errors) => Some(errors),
            _ => None,
        }
    }

    /// Message fit for showing next to a form.
    pub fn user_message(&self) -> String {
        match self {
            AppError::ValidationError(errors) => errors.summary(),
            AppError::AuthError(AuthError::Unauthorized(message)) => message.clone(),
            AppError::ApiError { message, .. } => message.clone(),
            AppError::TransportError(_) => "Network error. Please try again.".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            AppError::DecodeError(err.to_string())
        } else if err.is_timeout() {
            AppError::TransportError(format!("request timed out: {}", err))
        } else {
            AppError::TransportError(err.to_string())
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::DecodeError(err.to_string())
    }
}

impl From<url::ParseError> for AppError {
    fn from(err: url::ParseError) -> Self {
        AppError::ConfigError(format!("invalid url: {}", err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(err.to_string())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Session expired")]
    SessionExpired,

    #[error("Invalid token")]
    InvalidToken,
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt session data: {0}")]
    Corrupt(String),

    #[error("Encryption error: {0}")]
    Crypto(String),
}

/// Field-level messages from a rejected request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    pub general: Vec<String>,
    pub fields: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            general: vec![message.into()],
            fields: BTreeMap::new(),
        }
    }

    pub fn field(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::default();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.fields.entry(field.to_string()).or_default().push(message.into());
    }

    pub fn add_general(&mut self, message: impl Into<String>) {
        self.general.push(message.into());
    }

    pub fn extend(&mut self, other: ValidationErrors) {
        self.general.extend(other.general);
        for (field, messages) in other.fields {
            self.fields.entry(field).or_default().extend(messages);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.general.is_empty() && self.fields.is_empty()
    }

    /// `Ok` when nothing was recorded.
    pub fn into_result(self) -> Result<(), AppError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AppError::ValidationError(self))
        }
    }

    pub fn field_messages(&self, field: &str) -> &[String] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Parse a DRF-style error body.
    pub fn from_json(body: &Value) -> Self {
        let mut errors = Self::default();
        match body {
            Value::Object(map) => {
                for (key, value) in map {
                    match key.as_str() {
                        "detail" | "non_field_errors" | "message" | "error" => {}
                        _ => {
                            let messages = flatten_messages(value);
                            if !messages.is_empty() {
                                errors.fields.insert(key.clone(), messages);
                            }
                        }
                    }
                }
                if let Some(message) = extract_message(body) {
                    errors.general.push(message);
                }
                if let Some(extra) = map.get("non_field_errors") {
                    for message in flatten_messages(extra) {
                        if !errors.general.contains(&message) {
                            errors.general.push(message);
                        }
                    }
                }
            }
            other => errors.general.extend(flatten_messages(other)),
        }
        if errors.is_empty() {
            errors.general.push("Invalid request.".to_string());
        }
        errors
    }

    /// Most relevant single line.
    pub fn summary(&self) -> String {
        if let Some(first) = self.general.first() {
            return first.clone();
        }
        self.fields
            .iter()
            .find_map(|(field, messages)| messages.first().map(|m| format!("{}: {}", field, m)))
            .unwrap_or_else(|| "Invalid request.".to_string())
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

fn flatten_messages(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => vec![s.clone()],
        Value::Array(items) => items.iter().flat_map(flatten_messages).collect(),
        Value::Object(map) => map
            .iter()
            .flat_map(|(key, nested)| {
                flatten_messages(nested)
                    .into_iter()
                    .map(move |m| format!("{}: {}", key, m))
            })
            .collect(),
        Value::Null => Vec::new(),
        other => vec![other.to_string()],
    }
}

/// Pick the human-readable message out of the shapes the backend emits:
/// `{"detail"}`, `{"non_field_errors": [..]}`, `{"error": {"message"}}`,
/// `{"error": ".."}`, `{"message"}`.
pub(crate) fn extract_message(body: &Value) -> Option<String> {
    if let Some(detail) = body.get("detail").and_then(Value::as_str) {
        return Some(detail.to_string());
    }
    if let Some(first) = body
        .get("non_field_errors")
        .and_then(|v| flatten_messages(v).into_iter().next())
    {
        return Some(first);
    }
    match body.get("error") {
        Some(Value::Object(inner)) => {
            if let Some(message) = inner.get("message").and_then(Value::as_str) {
                return Some(message.to_string());
            }
        }
        Some(Value::String(message)) => {
            if let Some(detail) = body.get("message").and_then(Value::as_str) {
                return Some(detail.to_string());
            }
            return Some(message.clone());
        }
        _ => {}
    }
    body.get("message").and_then(Value::as_str).map(str::to_string)
}

fn default_status_message(status: u16) -> &'static str {
    match status {
        403 => "You do not have permission to perform this action.",
        404 => "Not found.",
        429 => "Too many requests. Please slow down.",
        500..=599 => "The server encountered an error. Please try again later.",
        _ => "Request failed.",
    }
}
