//! IdGenerator port - ID 生成の抽象化
//!
//! Attempt IDs name scratch files, so they must not collide across
//! concurrent workers. ULIDs carry 80 random bits per millisecond, which is
//! plenty for that.

use ulid::Ulid;

use crate::domain::ids::{AttemptId, CycleId};
use crate::ports::Clock;

pub trait IdGenerator: Send + Sync {
    fn generate_attempt_id(&self) -> AttemptId;

    fn generate_cycle_id(&self) -> CycleId;
}

/// ULID based generator driven by a [`Clock`].
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    fn next_ulid(&self) -> Ulid {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_attempt_id(&self) -> AttemptId {
        AttemptId::from(self.next_ulid())
    }

    fn generate_cycle_id(&self) -> CycleId {
        CycleId::from(self.next_ulid())
    }
}
