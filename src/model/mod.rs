//! Core data model types for library items and labels.

pub mod item;
pub mod label;
