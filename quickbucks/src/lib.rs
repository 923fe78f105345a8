//! Task marketplace domain service for `QuickBucks`.
//!
//! Holds the marketplace rules (posting, applying, assignment, review,
//! search) behind backend-agnostic collaborator traits in [`store`].

pub mod accounts;
pub mod chat;
pub mod config;
pub mod device;
pub mod profile;
pub mod store;
pub mod tasks;
pub mod validation;
