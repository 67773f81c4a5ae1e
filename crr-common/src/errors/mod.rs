//! Error catalog and definitions for the Case Run Reporter
//!
//! This module provides the error catalog with unique error codes,
//! categorized by subsystem. Each error includes remediation steps.
//!
//! # Error Code Ranges
//!
//! | Range      | Category    | Description                          |
//! |------------|-------------|--------------------------------------|
//! | E001-E099  | Config      | Configuration and setup errors       |
//! | E100-E199  | Transport   | HTTP and wire-level failures         |
//! | E200-E299  | Auth        | Login and identity resolution        |
//! | E300-E399  | Remote      | Service application faults           |
//! | E400-E499  | Reconcile   | Lookup and context state errors      |
//! | E500-E599  | Internal    | Internal/unexpected errors           |

pub mod catalog;

pub use catalog::{ErrorCategory, ErrorCode, ErrorEntry};
