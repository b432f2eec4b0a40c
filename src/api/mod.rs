pub mod error;
pub mod health;
pub mod interpret;
pub mod openapi;
pub mod sources;
