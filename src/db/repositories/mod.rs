pub mod listeners;
pub mod listening_sessions;
