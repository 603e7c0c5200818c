//! Full-trip planning orchestration
//!
//! Segments are independent once their candidate pools are computed, so
//! each one assembles on its own task over a shared distance cache. A
//! failed or infeasible segment is reported in place; it never takes
//! its siblings down. The whole rebuild runs under a caller-supplied
//! timeout and commits nothing when it trips.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinSet;
use tracing::warn;

use super::assembler::{self, AssembleError};
use super::distance_cache::{CacheStore, DistanceCache};
use super::eligibility;
use crate::types::{HotspotCatalog, PlanningConfig, RouteSegment, TimelineEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PlanError {
    /// The rebuild exceeded its ceiling. Retryable; nothing was
    /// committed.
    #[error("plan rebuild timed out after {0:?}")]
    Timeout(Duration),
}

/// Outcome of assembling one segment.
#[derive(Debug)]
pub struct SegmentPlan {
    pub segment_id: i64,
    pub result: Result<Vec<TimelineEntry>, AssembleError>,
}

/// Assemble every segment of a trip in parallel. Results come back in
/// trip order.
pub async fn plan_trip<S: CacheStore + 'static>(
    segments: &[RouteSegment],
    catalog: Arc<HotspotCatalog>,
    cache: Arc<DistanceCache<S>>,
    config: &PlanningConfig,
) -> Result<Vec<SegmentPlan>, PlanError> {
    if segments.is_empty() {
        return Ok(Vec::new());
    }

    let mut ordered: Vec<RouteSegment> = segments.to_vec();
    ordered.sort_by_key(|s| (s.seq, s.id));
    let last_segment_id = ordered.last().map(|s| s.id).unwrap_or_default();
    let seq_index: HashMap<i64, usize> =
        ordered.iter().enumerate().map(|(i, s)| (s.id, i)).collect();

    let mut tasks: JoinSet<SegmentPlan> = JoinSet::new();
    for segment in ordered {
        let catalog = Arc::clone(&catalog);
        let cache = Arc::clone(&cache);
        let config = config.clone();
        let is_final = segment.id == last_segment_id;

        tasks.spawn(async move {
            let sets = eligibility::eligible_candidates(&segment, &catalog);
            let result =
                assembler::assemble_segment(&segment, &sets, &catalog, &cache, &config, is_final)
                    .await;
            SegmentPlan { segment_id: segment.id, result }
        });
    }

    let timeout = Duration::from_secs(config.rebuild_timeout_seconds);
    let collect = async {
        let mut plans = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(plan) => plans.push(plan),
                Err(e) => warn!("segment assembly task failed: {e}"),
            }
        }
        plans
    };

    // Dropping the JoinSet on timeout aborts the in-flight tasks.
    let mut plans = tokio::time::timeout(timeout, collect)
        .await
        .map_err(|_| PlanError::Timeout(timeout))?;

    plans.sort_by_key(|p| seq_index.get(&p.segment_id).copied().unwrap_or(usize::MAX));
    Ok(plans)
}
