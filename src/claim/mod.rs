mod lock;
mod ownership;

pub use lock::{NameLockGuard, NameLocks};
pub use ownership::{ClaimDecision, check_claim};
