//! Lifecycle stage enumeration.
//!
//! # Responsibilities
//! - Define the closed set of request lifecycle stages
//! - Provide canonical execution order (declaration order)
//! - Map stage names appearing in definition trees back to variants
//!
//! # Design Decisions
//! - Closed enum rather than strings: stage typos fail at compile time
//! - `Ord` follows declaration order, which is the execution order

use serde::{Deserialize, Serialize};

/// A stage in the per-request execution lifecycle.
///
/// Variant order is the canonical order stages run in for a single request.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum LifecycleStage {
    OnRequest,
    PreParsing,
    PreValidation,
    PreHandler,
    PreSerialization,
    OnError,
    OnSend,
    OnResponse,
    OnTimeout,
    OnRequestAbort,
}

impl LifecycleStage {
    /// All stages, in canonical execution order.
    pub const ALL: [LifecycleStage; 10] = [
        LifecycleStage::OnRequest,
        LifecycleStage::PreParsing,
        LifecycleStage::PreValidation,
        LifecycleStage::PreHandler,
        LifecycleStage::PreSerialization,
        LifecycleStage::OnError,
        LifecycleStage::OnSend,
        LifecycleStage::OnResponse,
        LifecycleStage::OnTimeout,
        LifecycleStage::OnRequestAbort,
    ];

    /// Stage name as it appears in definition trees and summaries.
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleStage::OnRequest => "onRequest",
            LifecycleStage::PreParsing => "preParsing",
            LifecycleStage::PreValidation => "preValidation",
            LifecycleStage::PreHandler => "preHandler",
            LifecycleStage::PreSerialization => "preSerialization",
            LifecycleStage::OnError => "onError",
            LifecycleStage::OnSend => "onSend",
            LifecycleStage::OnResponse => "onResponse",
            LifecycleStage::OnTimeout => "onTimeout",
            LifecycleStage::OnRequestAbort => "onRequestAbort",
        }
    }

    /// Resolve a tree key to a stage, if it names one.
    ///
    /// Used by the walker to keep lifecycle names out of path traversal.
    pub fn from_key(key: &str) -> Option<LifecycleStage> {
        LifecycleStage::ALL
            .iter()
            .copied()
            .find(|stage| stage.as_str() == key)
    }
}

impl std::fmt::Display for LifecycleStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
