pub mod types;
pub mod traits;
pub mod config;
pub mod state;
pub mod reconcile;
pub mod fetcher;
pub mod parser;
pub mod similarity;
pub mod dedup;
pub mod publish;
pub mod notify;
pub mod tracker;
pub mod scheduler;
pub mod utils;

pub use types::*;
pub use config::{PublishFailurePolicy, RelayConfig};
pub use state::Database;
pub use reconcile::reconcile;
pub use fetcher::FeedFetcher;
pub use parser::FeedParser;
pub use similarity::TokenCosine;
pub use dedup::{DuplicateGate, GateConfig};
pub use tracker::{Collaborators, TrackerPolicy, Transition};
pub use scheduler::Scheduler;
