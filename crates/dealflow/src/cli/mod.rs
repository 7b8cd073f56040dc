//! Terminal front end for the search and notification clients

pub mod commands;
pub mod display;
