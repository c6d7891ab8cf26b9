//! Ports - 抽象化レイヤー
//!
//! Every external collaborator sits behind a trait here: the work queue, blob
//! storage, the external transport executable, time and ID generation. The
//! application layer only sees these traits, so tests swap in fakes without
//! touching disposition logic.

pub mod blob_store;
pub mod clock;
pub mod decider;
pub mod delivery_queue;
pub mod id_generator;
pub mod process_runner;

pub use self::blob_store::{BlobStore, StoreError};
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::decider::Decider;
pub use self::delivery_queue::{DeliveryQueue, QueueError};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::process_runner::{ProcessError, ProcessOutput, ProcessRunner, ProcessSpec};
