//! storefront-auth - Authentication and role-based authorization for a storefront back office
//!
//! Customers, staff members and administrators live in separate principal
//! directories. This crate logs them in, issues signed bearer tokens and
//! guards HTTP routes by authentication and role.

pub mod auth;
pub mod config;
pub mod directory;
pub mod error;
pub mod models;
pub mod server;
pub mod telemetry;
