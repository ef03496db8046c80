pub mod actor;
pub mod models;
pub mod scripted;
