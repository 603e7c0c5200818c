//! Manual-edit handlers: preview and commit of single-hotspot changes

use anyhow::Result;
use async_nats::{Client, Subscriber};
use futures::StreamExt;
use sqlx::PgPool;
use tracing::error;
use uuid::Uuid;

use crate::db::queries;
use crate::db::queries::distance_cache::PgCacheStore;
use crate::db::queries::timeline::CommitError;
use crate::services::distance_cache::DistanceCache;
use crate::services::preview::{self, PreviewResult};
use crate::types::{
    CommitInsertRequest, CommitResult, ErrorResponse, PlanningConfig, PreviewInsertRequest,
    PreviewRemoveRequest, Request, SuccessResponse,
};

async fn send_error(
    client: &Client,
    reply: async_nats::Subject,
    request_id: Uuid,
    code: &str,
    message: impl Into<String>,
) {
    let error = ErrorResponse::new(request_id, code, message);
    if let Ok(bytes) = serde_json::to_vec(&error) {
        let _ = client.publish(reply, bytes.into()).await;
    }
}

/// Compute a preview of inserting `hotspot_id` against current state.
async fn compute_insert_preview(
    pool: &PgPool,
    plan_id: i64,
    segment_id: i64,
    hotspot_id: i64,
    config: &PlanningConfig,
) -> Result<Result<PreviewResult, &'static str>> {
    let Some(segment) = queries::segment::get_segment(pool, segment_id).await? else {
        return Ok(Err("SEGMENT_NOT_FOUND"));
    };
    if segment.plan_id != plan_id {
        return Ok(Err("SEGMENT_NOT_FOUND"));
    }

    let catalog = queries::hotspot::load_catalog(pool).await?;
    let Some(hotspot) = catalog.hotspot(hotspot_id).cloned() else {
        return Ok(Err("HOTSPOT_NOT_FOUND"));
    };

    let entries = queries::timeline::fetch_active_entries(pool, segment_id).await?;
    let snapshot = queries::timeline::snapshot_fingerprint(pool, segment_id).await?;

    let cache = DistanceCache::new(PgCacheStore::new(pool.clone()));
    let result =
        preview::preview_insert(&segment, &entries, &hotspot, &catalog, &cache, config, snapshot)
            .await;
    Ok(Ok(result))
}

/// Handle hotspot.preview requests
pub async fn handle_preview_insert(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        let reply = match msg.reply {
            Some(ref r) => r.clone(),
            None => continue,
        };

        let request: Request<PreviewInsertRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                send_error(&client, reply, Uuid::nil(), "INVALID_REQUEST", e.to_string()).await;
                continue;
            }
        };
        let p = &request.payload;

        match compute_insert_preview(&pool, p.plan_id, p.segment_id, p.hotspot_id, &p.config).await
        {
            Ok(Ok(result)) => {
                let success = SuccessResponse::new(request.id, result);
                let _ = client.publish(reply, serde_json::to_vec(&success)?.into()).await;
            }
            Ok(Err(code)) => {
                send_error(&client, reply, request.id, code, "lookup failed").await;
            }
            Err(e) => {
                error!("Preview insert failed: {}", e);
                send_error(&client, reply, request.id, "PREVIEW_ERROR", e.to_string()).await;
            }
        }
    }

    Ok(())
}

/// Handle hotspot.add requests: re-validate the preview's snapshot and
/// apply the change under the segment's advisory lock.
pub async fn handle_commit_insert(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        let reply = match msg.reply {
            Some(ref r) => r.clone(),
            None => continue,
        };

        let request: Request<CommitInsertRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                send_error(&client, reply, Uuid::nil(), "INVALID_REQUEST", e.to_string()).await;
                continue;
            }
        };
        let p = &request.payload;

        // Recompute against current state; the caller's fingerprint
        // must still match or the preview is stale.
        let preview =
            match compute_insert_preview(&pool, p.plan_id, p.segment_id, p.hotspot_id, &p.config)
                .await
            {
                Ok(Ok(result)) => result,
                Ok(Err(code)) => {
                    send_error(&client, reply, request.id, code, "lookup failed").await;
                    continue;
                }
                Err(e) => {
                    error!("Commit insert failed: {}", e);
                    send_error(&client, reply, request.id, "COMMIT_ERROR", e.to_string()).await;
                    continue;
                }
            };

        if preview.snapshot != p.snapshot {
            send_error(
                &client,
                reply,
                request.id,
                "STALE_TIMELINE",
                "timeline changed since preview; re-preview required",
            )
            .await;
            continue;
        }

        if let Some(reason) = preview.rejection {
            send_error(&client, reply, request.id, "INSERT_REJECTED", reason.as_str()).await;
            continue;
        }

        match queries::timeline::commit_insert(&pool, p.plan_id, p.segment_id, &preview).await {
            Ok(()) => {
                let success =
                    SuccessResponse::new(request.id, CommitResult { committed: true, preview });
                let _ = client.publish(reply, serde_json::to_vec(&success)?.into()).await;
            }
            Err(CommitError::StaleTimeline) => {
                send_error(
                    &client,
                    reply,
                    request.id,
                    "STALE_TIMELINE",
                    "timeline changed since preview; re-preview required",
                )
                .await;
            }
            Err(e) => {
                error!("Commit insert failed: {}", e);
                send_error(&client, reply, request.id, "COMMIT_ERROR", e.to_string()).await;
            }
        }
    }

    Ok(())
}

async fn compute_remove_preview(
    pool: &PgPool,
    plan_id: i64,
    segment_id: i64,
    entry_id: i64,
    config: &PlanningConfig,
) -> Result<Result<PreviewResult, String>> {
    let Some(segment) = queries::segment::get_segment(pool, segment_id).await? else {
        return Ok(Err("SEGMENT_NOT_FOUND".to_string()));
    };
    if segment.plan_id != plan_id {
        return Ok(Err("SEGMENT_NOT_FOUND".to_string()));
    }

    let catalog = queries::hotspot::load_catalog(pool).await?;
    let entries = queries::timeline::fetch_active_entries(pool, segment_id).await?;
    let snapshot = queries::timeline::snapshot_fingerprint(pool, segment_id).await?;
    let cache = DistanceCache::new(PgCacheStore::new(pool.clone()));

    match preview::preview_remove(&segment, &entries, entry_id, &catalog, &cache, config, snapshot)
        .await
    {
        Ok(result) => Ok(Ok(result)),
        Err(e) => Ok(Err(format!("ENTRY_NOT_FOUND:{e}"))),
    }
}

/// Handle hotspot.remove.preview requests
pub async fn handle_preview_remove(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        let reply = match msg.reply {
            Some(ref r) => r.clone(),
            None => continue,
        };

        let request: Request<PreviewRemoveRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                send_error(&client, reply, Uuid::nil(), "INVALID_REQUEST", e.to_string()).await;
                continue;
            }
        };
        let p = &request.payload;

        match compute_remove_preview(&pool, p.plan_id, p.segment_id, p.entry_id, &p.config).await {
            Ok(Ok(result)) => {
                let success = SuccessResponse::new(request.id, result);
                let _ = client.publish(reply, serde_json::to_vec(&success)?.into()).await;
            }
            Ok(Err(code)) => {
                let code = code.split(':').next().unwrap_or("PREVIEW_ERROR").to_string();
                send_error(&client, reply, request.id, &code, "lookup failed").await;
            }
            Err(e) => {
                error!("Preview remove failed: {}", e);
                send_error(&client, reply, request.id, "PREVIEW_ERROR", e.to_string()).await;
            }
        }
    }

    Ok(())
}

/// Handle hotspot.remove requests (commit a previewed removal).
pub async fn handle_commit_remove(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        let reply = match msg.reply {
            Some(ref r) => r.clone(),
            None => continue,
        };

        let request: Request<PreviewRemoveRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                send_error(&client, reply, Uuid::nil(), "INVALID_REQUEST", e.to_string()).await;
                continue;
            }
        };
        let p = &request.payload;

        let preview =
            match compute_remove_preview(&pool, p.plan_id, p.segment_id, p.entry_id, &p.config)
                .await
            {
                Ok(Ok(result)) => result,
                Ok(Err(code)) => {
                    let code = code.split(':').next().unwrap_or("PREVIEW_ERROR").to_string();
                    send_error(&client, reply, request.id, &code, "lookup failed").await;
                    continue;
                }
                Err(e) => {
                    error!("Commit remove failed: {}", e);
                    send_error(&client, reply, request.id, "COMMIT_ERROR", e.to_string()).await;
                    continue;
                }
            };

        match queries::timeline::commit_remove(&pool, p.plan_id, p.segment_id, &preview).await {
            Ok(()) => {
                let success =
                    SuccessResponse::new(request.id, CommitResult { committed: true, preview });
                let _ = client.publish(reply, serde_json::to_vec(&success)?.into()).await;
            }
            Err(CommitError::StaleTimeline) => {
                send_error(
                    &client,
                    reply,
                    request.id,
                    "STALE_TIMELINE",
                    "timeline changed since preview; re-preview required",
                )
                .await;
            }
            Err(e) => {
                error!("Commit remove failed: {}", e);
                send_error(&client, reply, request.id, "COMMIT_ERROR", e.to_string()).await;
            }
        }
    }

    Ok(())
}
