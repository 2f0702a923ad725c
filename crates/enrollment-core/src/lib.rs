//! Core types for the enrollment report pipeline.
//!
//! Report layouts, the record model, errors, subject vocabulary, settings
//! and the small formatting and time helpers shared by the data crate and
//! the command line tool.

pub mod error;
pub mod formatting;
pub mod layout;
pub mod models;
pub mod retrieval;
pub mod settings;
pub mod time_utils;
pub mod vocabulary;
