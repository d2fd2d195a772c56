//! Command handlers

pub mod bookmark;
pub mod config;
pub mod list;
pub mod prefs;
pub mod tag;
