//! Error catalog and definitions for repogate
//!
//! This module provides the error catalog with unique error codes,
//! categorized by subsystem. Each error includes remediation steps and
//! documentation links.
//!
//! # Error Code Ranges
//!
//! | Range      | Category    | Description                          |
//! |------------|-------------|--------------------------------------|
//! | E001-E099  | Config      | Configuration and trust persistence  |
//! | E100-E199  | Network     | Transport failures                   |
//! | E200-E299  | Trust       | Host keys and certificates           |
//! | E300-E399  | Auth        | Credentials                          |
//! | E400-E499  | Repository  | Repository location and records      |
//! | E500-E599  | Internal    | Internal/unexpected errors           |

pub mod catalog;

pub use catalog::{ErrorCategory, ErrorCode, ErrorEntry};
