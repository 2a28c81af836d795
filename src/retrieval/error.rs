//! Caller-visible search errors
//!
//! Every variant maps to a stable machine code and an HTTP-equivalent status
//! class so a transport layer can render it without inspecting messages.

use crate::embedding::EmbeddingError;
use crate::language::LanguageError;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SearchError {
    #[error("Empty query")]
    EmptyQuery,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("{message}")]
    LanguageNotSupported {
        message: String,
        code: &'static str,
    },

    #[error("No collection found for this language {lang}")]
    CollectionNotFound { lang: String },

    #[error("Model not found: {model}")]
    ModelNotFound { model: String },

    #[error("Subject not found: {subject}")]
    SubjectNotFound { subject: String },

    #[error("No results found")]
    NoResults,

    #[error("Partial response result: {completed} of {total} queries answered")]
    PartialResult { completed: usize, total: usize },

    #[error("Not able to create embed: {0}")]
    Embedding(String),
}

/// HTTP-equivalent outcome class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusClass {
    BadRequest,
    NotFound,
    NoContent,
    PartialContent,
    Internal,
}

impl StatusClass {
    pub fn http_status(self) -> u16 {
        match self {
            StatusClass::BadRequest => 400,
            StatusClass::NotFound => 404,
            StatusClass::NoContent => 204,
            StatusClass::PartialContent => 206,
            StatusClass::Internal => 500,
        }
    }
}

/// Serializable error body: machine code plus human message
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    pub status: u16,
}

impl SearchError {
    pub fn language_not_supported(lang: &str) -> Self {
        SearchError::LanguageNotSupported {
            message: format!("Language not supported: {}", lang),
            code: "LANG_NOT_SUPPORTED",
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            SearchError::EmptyQuery => "EMPTY_QUERY",
            SearchError::InvalidRequest(_) => "INVALID_REQUEST",
            SearchError::LanguageNotSupported { code, .. } => code,
            SearchError::CollectionNotFound { .. } => "COLL_NOT_FOUND",
            SearchError::ModelNotFound { .. } => "MODEL_NOT_FOUND",
            SearchError::SubjectNotFound { .. } => "SUBJECT_NOT_FOUND",
            SearchError::NoResults => "NO_RESULTS",
            SearchError::PartialResult { .. } => "PARTIAL_RESULT",
            SearchError::Embedding(_) => "EMBED_ERROR",
        }
    }

    pub fn status(&self) -> StatusClass {
        match self {
            SearchError::EmptyQuery
            | SearchError::InvalidRequest(_)
            | SearchError::LanguageNotSupported { .. } => StatusClass::BadRequest,
            SearchError::CollectionNotFound { .. }
            | SearchError::ModelNotFound { .. }
            | SearchError::SubjectNotFound { .. } => StatusClass::NotFound,
            SearchError::NoResults => StatusClass::NoContent,
            SearchError::PartialResult { .. } => StatusClass::PartialContent,
            SearchError::Embedding(_) => StatusClass::Internal,
        }
    }

    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            code: self.code().to_string(),
            message: self.to_string(),
            status: self.status().http_status(),
        }
    }
}

impl From<EmbeddingError> for SearchError {
    fn from(e: EmbeddingError) -> Self {
        match e {
            EmbeddingError::ModelNotFound(model) => SearchError::ModelNotFound { model },
            other => SearchError::Embedding(other.to_string()),
        }
    }
}

impl From<LanguageError> for SearchError {
    fn from(e: LanguageError) -> Self {
        match e {
            LanguageError::NotDetected => SearchError::LanguageNotSupported {
                message: "No language detected".to_string(),
                code: "LANG_NOT_DETECTED",
            },
            LanguageError::Unmapped(lang) => SearchError::language_not_supported(&lang),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_and_statuses() {
        let cases = [
            (SearchError::EmptyQuery, "EMPTY_QUERY", 400),
            (SearchError::language_not_supported("xx"), "LANG_NOT_SUPPORTED", 400),
            (
                SearchError::CollectionNotFound {
                    lang: "de".to_string(),
                },
                "COLL_NOT_FOUND",
                404,
            ),
            (
                SearchError::ModelNotFound {
                    model: "m".to_string(),
                },
                "MODEL_NOT_FOUND",
                404,
            ),
            (SearchError::NoResults, "NO_RESULTS", 204),
            (
                SearchError::PartialResult {
                    completed: 1,
                    total: 2,
                },
                "PARTIAL_RESULT",
                206,
            ),
        ];

        for (error, code, status) in cases {
            let response = error.to_response();
            assert_eq!(response.code, code);
            assert_eq!(response.status, status);
            assert!(!response.message.is_empty());
        }
    }

    #[test]
    fn test_embedding_model_not_found_maps_to_404() {
        let error: SearchError = EmbeddingError::ModelNotFound("e5".to_string()).into();
        assert_eq!(error.code(), "MODEL_NOT_FOUND");

        let error: SearchError = EmbeddingError::GenerationError("oom".to_string()).into();
        assert_eq!(error.status(), StatusClass::Internal);
    }

    #[test]
    fn test_undetected_language_code() {
        let error: SearchError = LanguageError::NotDetected.into();
        assert_eq!(error.code(), "LANG_NOT_DETECTED");
        assert_eq!(error.status(), StatusClass::BadRequest);
    }
}
