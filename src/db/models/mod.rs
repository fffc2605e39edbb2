pub mod listening;

pub use listening::{DailyListeningSummary, ListeningSessionRecord, StationListeners};
