//! Utility functions for common operations.
//!
//! - **URL validation**: reject feed sources that are not http(s) URLs, and
//!   collapse duplicates before workers are launched

mod url_validator;

pub use url_validator::{validate_sources, validate_url, UrlValidationError};
