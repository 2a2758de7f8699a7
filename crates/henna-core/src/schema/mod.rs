//! Gallery manifest schema.
//!
//! This module provides:
//! - Detection of legacy and current manifest shapes
//! - Keyword field normalization
//! - Transformation of any shape into the current one
//! - Structural validation with path-prefixed error messages

mod coerce;
mod format;
mod keywords;
mod validator;

pub use coerce::{transform, TransformContext};
pub use format::{detect_format, DetectedFormat};
pub use keywords::{normalize_keywords, normalize_labels, KEYWORD_FIELDS};
pub use validator::SchemaValidator;
