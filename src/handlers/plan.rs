//! Plan build handler: full-trip timeline regeneration

use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};
use futures::StreamExt;
use sqlx::PgPool;
use tracing::{error, info};
use uuid::Uuid;

use crate::db::queries;
use crate::db::queries::distance_cache::PgCacheStore;
use crate::services::distance_cache::DistanceCache;
use crate::services::planner::{self, PlanError};
use crate::types::{
    ErrorResponse, PlanBuildRequest, PlanBuildResponse, Request, SegmentOutcome, SuccessResponse,
};

/// Handle plan.build requests
pub async fn handle_build(client: Client, mut subscriber: Subscriber, pool: PgPool) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        let reply = match msg.reply {
            Some(ref r) => r.clone(),
            None => continue,
        };

        let request: Request<PlanBuildRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse plan build request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        match build_plan(&pool, &request.payload).await {
            Ok(response) => {
                let success = SuccessResponse::new(request.id, response);
                let _ = client.publish(reply, serde_json::to_vec(&success)?.into()).await;
            }
            Err(e) => {
                // A timed-out rebuild is retryable and commits nothing.
                let code = if e.downcast_ref::<PlanError>().is_some() {
                    "REBUILD_TIMEOUT"
                } else {
                    "BUILD_ERROR"
                };
                error!("Plan build failed: {}", e);
                let error = ErrorResponse::new(request.id, code, e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

async fn build_plan(pool: &PgPool, payload: &PlanBuildRequest) -> Result<PlanBuildResponse> {
    let catalog = Arc::new(queries::hotspot::load_catalog(pool).await?);
    let cache = Arc::new(DistanceCache::new(PgCacheStore::new(pool.clone())));

    // Assemble everything up-front; nothing is written until the whole
    // trip came back inside the timeout.
    let plans = planner::plan_trip(&payload.segments, catalog, cache, &payload.config).await?;

    let mut tx = pool.begin().await?;
    queries::segment::upsert_plan_segments(&mut tx, payload.plan_id, &payload.segments).await?;
    tx.commit().await?;

    let mut outcomes = Vec::with_capacity(plans.len());
    for plan in plans {
        match plan.result {
            Ok(entries) => {
                queries::timeline::replace_segment_timeline(
                    pool,
                    payload.plan_id,
                    plan.segment_id,
                    &entries,
                )
                .await?;
                outcomes.push(SegmentOutcome {
                    segment_id: plan.segment_id,
                    entries,
                    error: None,
                });
            }
            // One infeasible segment is reported in place; its siblings
            // keep their timelines.
            Err(e) => outcomes.push(SegmentOutcome {
                segment_id: plan.segment_id,
                entries: Vec::new(),
                error: Some(e.to_string()),
            }),
        }
    }

    info!(
        plan_id = payload.plan_id,
        segments = outcomes.len(),
        "plan build complete"
    );

    Ok(PlanBuildResponse { plan_id: payload.plan_id, segments: outcomes })
}
