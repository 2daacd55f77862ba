//! Application services layer.

pub mod admin;
pub mod email;
pub mod error;
pub mod repos;
