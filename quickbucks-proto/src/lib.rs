//! Shared document model for `QuickBucks`.
//!
//! These types mirror the documents kept in the backend collections
//! (`tasks`, `users`, `chats/{threadId}/messages`). Field names on the wire
//! are preserved exactly so existing stored data stays readable.

pub mod codec;
pub mod message;
pub mod task;
pub mod user;
