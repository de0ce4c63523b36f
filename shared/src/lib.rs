mod contribution;
mod event;
mod streak;
mod xp;

#[cfg(feature = "github")]
pub mod github;

pub use contribution::*;
pub use event::*;
pub use streak::*;
pub use xp::*;

/// Default and maximum number of events requested from the source per sync.
pub const EVENTS_PAGE_SIZE: u8 = 100;
