// Contract lifecycle
//
// draft -> pending -> active -> {completed, expired}; draft | pending |
// active -> terminated. Contracts are never deleted. Awarding a market
// request creates a pending contract; audits accumulate on active ones.

pub mod lifecycle;
pub mod types;

pub use lifecycle::ExpiryOutcome;
pub use types::{Contract, ContractDraft, ContractStatus, ContractType};
