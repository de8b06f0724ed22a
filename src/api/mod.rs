//! API module - REST handlers and wire DTOs

pub mod dto;
pub mod rest;

pub use rest::{create_router, AppState};
