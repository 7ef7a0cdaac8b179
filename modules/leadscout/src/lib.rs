pub mod activity;
pub mod checkpoint;
pub mod classifier;
pub mod enrichment;
pub mod extract;
pub mod render;
pub mod scheduler;
pub mod session;
pub mod stats;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use checkpoint::CheckpointStore;
pub use classifier::{Classifier, LocationVerdict};
pub use enrichment::{Enricher, EnrichmentBudget};
pub use scheduler::{plan_batches, BatchScheduler, BatchState, RunContext};
pub use session::{Operator, SessionStore, StdinOperator};
pub use stats::RunStats;
