pub mod clock;
pub mod config;
pub mod error;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::DeskpilotConfig;
pub use error::{DeskpilotError, Result};
