// Market request lifecycle
//
// draft -> published -> {closed, awarded}; published -> active.
// published and active together form the "open" superstate in which
// proposals are accepted. closed, awarded and cancelled are terminal.

pub mod lifecycle;
pub mod types;

pub use types::{MarketRequest, MarketRequestDraft, MarketRequestStatus, MarketRequestUpdate};
