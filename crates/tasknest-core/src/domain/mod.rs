//! Domain model (IDs, records, ordering keys, outcomes, errors).

pub mod bucket;
pub mod errors;
pub mod ids;
pub mod outcome;
pub mod position;
pub mod query;
pub mod task;
pub mod user;

pub use bucket::{Bucket, DEFAULT_PROJECT_ID, initial_buckets};
pub use errors::{CodecError, PersistenceError, StoreError, TransportError};
pub use ids::{BucketId, ProjectId, TaskId};
pub use outcome::{InvariantViolation, Outcome};
pub use position::{DEFAULT_POSITION, default_position_if_zero, ensure_finite};
pub use query::{DateRange, SortField, SortOrder, TaskQuery};
pub use task::{Label, Task};
pub use user::User;
