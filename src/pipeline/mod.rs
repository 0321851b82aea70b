/*!
 * Manifest reconciliation pipeline.
 *
 * # Architecture
 *
 * - `reconciler`: one cycle for one app, in stage order
 * - `mutator`: transactional writes of an accepted manifest
 * - `status`: release status transition table and recomputation
 * - `retry`: fetch/validation failure decisions
 * - `review_queue`: the human review escalation queue
 * - `effects`: side-effect descriptors and their executor
 * - `scheduler`: periodic batches, worker pool and delayed retries
 */

pub mod status;
pub mod mutator;
pub mod retry;
pub mod review_queue;
pub mod effects;
pub mod reconciler;
pub mod scheduler;

// Re-export main types
pub use effects::{EffectExecutor, ExecutionReport, RetryPayload, SideEffect};
pub use mutator::{AppliedMutation, MutationOutcome, MutationRequest, VersionMutator};
pub use reconciler::{CycleOutcome, CycleResult, Reconciler};
pub use retry::RetryController;
pub use review_queue::ReviewEscalationQueue;
pub use scheduler::{BatchReport, Scheduler};
pub use status::{FileAggregate, StatusChange, StatusStateMachine};
