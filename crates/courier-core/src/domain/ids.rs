//! Domain identifiers (strongly-typed IDs).
//!
//! Identifiers the daemon mints itself are ULID based: sortable by creation
//! time and carrying 80 random bits, so two attempts started in the same
//! millisecond still get distinct names. Queue backends hand out their own
//! opaque identifiers; those are kept as strings (`MessageId`, `PopReceipt`).
//!
//! ## Phantom Type パターン
//! `Id<T>` で共通実装を持ち、`T` はマーカー型としてコンパイル時にだけ使う。
//! `AttemptId` と `CycleId` は同じ表現でも混同できない。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use ulid::Ulid;

/// Marker trait supplying the display prefix of an ID type.
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

/// Generic ULID-backed identifier.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

/// One processing attempt of one queue item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Attempt {}

impl IdMarker for Attempt {
    fn prefix() -> &'static str {
        "attempt-"
    }
}

/// One poll cycle (list + process batch).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Cycle {}

impl IdMarker for Cycle {
    fn prefix() -> &'static str {
        "cycle-"
    }
}

/// Identifier of a processing attempt. Also names the attempt's scratch files.
pub type AttemptId = Id<Attempt>;

/// Identifier of a poll cycle, used to group log lines.
pub type CycleId = Id<Cycle>;

/// Queue-assigned message identifier (opaque).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Acknowledgment token handed out with each delivery of a message.
///
/// A receipt is only valid for the delivery it came with; once the message
/// has been redelivered, the old receipt no longer acknowledges it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PopReceipt(String);

impl PopReceipt {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PopReceipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_distinct_types_with_prefixes() {
        let ulid = Ulid::new();
        let attempt = AttemptId::from_ulid(ulid);
        let cycle = CycleId::from_ulid(ulid);

        assert_eq!(attempt.as_ulid(), cycle.as_ulid());
        assert!(attempt.to_string().starts_with("attempt-"));
        assert!(cycle.to_string().starts_with("cycle-"));
        // let _: CycleId = attempt; // <- does not compile
    }

    #[test]
    fn attempt_ids_are_sortable() {
        let id1 = AttemptId::from_ulid(Ulid::new());
        std::thread::sleep(std::time::Duration::from_millis(2));
        let id2 = AttemptId::from_ulid(Ulid::new());

        assert!(id1 < id2);
    }

    #[test]
    fn phantom_data_does_not_consume_memory() {
        use std::mem::size_of;

        assert_eq!(size_of::<AttemptId>(), size_of::<Ulid>());
        assert_eq!(size_of::<CycleId>(), 16);
    }

    #[test]
    fn message_ids_display_verbatim() {
        let id = MessageId::new("b6a1c0de-0001");
        assert_eq!(id.to_string(), "b6a1c0de-0001");
        assert_eq!(PopReceipt::new("AgAAAA==").as_str(), "AgAAAA==");
    }
}
