//! Shared primitive types used across the dashboard.

/// Unique customer identifier (`SK_ID_CURR`).
pub type CustomerId = i64;

/// Signed day count relative to the application date. Past = negative.
pub type Days = i64;

/// Controller session identifier.
pub type SessionId = String;
