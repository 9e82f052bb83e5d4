//! The common contract every extraction strategy implements and the
//! orchestration that runs them.
//!
//! Strategies are pure and synchronous. A strategy is never allowed to take
//! down a pass: the orchestrator downgrades both `Err` returns and panics to
//! diagnostic notes and moves on.

use std::panic::{self, AssertUnwindSafe};

use crate::Result;
use crate::extraction::context::ExtractionContext;

pub trait ExtractionStrategy: Send + Sync {
    type Output;

    fn name(&self) -> &'static str;

    fn extract(&self, ctx: &ExtractionContext) -> Result<Option<Self::Output>>;
}

/// Outcome of one orchestrated pass: the winning result (if any) plus every
/// diagnostic note the strategies produced along the way.
#[derive(Debug)]
pub struct StrategyRun<T> {
    pub result: Option<T>,
    pub notes: Vec<String>,
}

/// Runs strategies in declaration order and stops at the first one that
/// produces a result. Used where trust is ordered: structured data over DOM
/// over free-text heuristics.
pub fn first_match<T>(
    strategies: &[Box<dyn ExtractionStrategy<Output = T>>],
    ctx: &ExtractionContext,
) -> StrategyRun<T> {
    let mut notes = Vec::new();
    for strategy in strategies {
        if let Some(result) = run_guarded(strategy.as_ref(), ctx, &mut notes) {
            return StrategyRun {
                result: Some(result),
                notes,
            };
        }
    }
    StrategyRun {
        result: None,
        notes,
    }
}

/// Runs one strategy with failure isolation. `Err` and panics both turn
/// into notes; the caller only ever sees a clean `Option`.
pub(crate) fn run_guarded<T>(
    strategy: &dyn ExtractionStrategy<Output = T>,
    ctx: &ExtractionContext,
    notes: &mut Vec<String>,
) -> Option<T> {
    match panic::catch_unwind(AssertUnwindSafe(|| strategy.extract(ctx))) {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => {
            tracing::debug!("Strategy {} failed: {}", strategy.name(), e);
            notes.push(format!("{} failed: {e}", strategy.name()));
            None
        }
        Err(_) => {
            tracing::warn!("Strategy {} panicked, skipping", strategy.name());
            notes.push(format!("{} panicked", strategy.name()));
            None
        }
    }
}
