//! Presentation layer: HTTP controllers, DTO models and routing

pub mod controllers;
pub mod models;
pub mod routes;

pub use controllers::AppState;
pub use routes::create_router;
