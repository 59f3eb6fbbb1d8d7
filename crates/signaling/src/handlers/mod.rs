//! Handler fuer die einzelnen Event-Familien.

pub mod auth_handler;
pub mod call_handler;
pub mod chat_handler;
