pub mod advice;
pub mod assessment;
pub mod case;
pub mod enums;
pub mod patient;
pub mod symptom;
pub mod vitals;

pub use advice::*;
pub use assessment::*;
pub use case::*;
pub use enums::*;
pub use patient::*;
pub use symptom::*;
pub use vitals::*;

use serde::Serialize;

/// A single validation failure, named after the offending input field.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Render field errors as one `detail` string for error responses.
pub fn field_errors_detail(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}
