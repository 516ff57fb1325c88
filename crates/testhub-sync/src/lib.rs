pub mod aggregator;
pub mod branches;
pub mod change_requests;
pub mod engine;
pub mod mapper;
pub mod memberships;
pub mod push;

pub use engine::{BranchOutcome, SyncEngine, SyncReport, SyncSettings};
pub use push::PushPayload;
