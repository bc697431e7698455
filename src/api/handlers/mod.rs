//! Route handlers for the recipes API.

pub mod auth;
pub mod health;
pub mod recipes;
