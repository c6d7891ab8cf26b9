//! Decider port - OutcomeKind から DispositionPlan を生成
//!
//! # 設計原則
//! - pure function (outcome -> plan), no side effects
//! - execution of the plan belongs to the pipeline

use crate::domain::{DispositionPlan, OutcomeKind};

pub trait Decider: Send + Sync {
    fn decide(&self, outcome: OutcomeKind) -> DispositionPlan;
}
