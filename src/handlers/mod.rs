//! NATS message handlers

pub mod hotspot;
pub mod ping;
pub mod plan;

use anyhow::Result;
use async_nats::Client;
use sqlx::PgPool;
use tokio::select;
use tracing::{error, info};

/// Start all message handlers
pub async fn start_handlers(client: Client, pool: PgPool) -> Result<()> {
    info!("Starting message handlers...");

    let ping_sub = client.subscribe("safar.ping").await?;
    let plan_build_sub = client.subscribe("safar.plan.build").await?;
    let hotspot_preview_sub = client.subscribe("safar.hotspot.preview").await?;
    let hotspot_add_sub = client.subscribe("safar.hotspot.add").await?;
    let hotspot_remove_preview_sub = client.subscribe("safar.hotspot.remove.preview").await?;
    let hotspot_remove_sub = client.subscribe("safar.hotspot.remove").await?;

    info!("Subscribed to NATS subjects");

    let client_ping = client.clone();
    let client_plan_build = client.clone();
    let client_hotspot_preview = client.clone();
    let client_hotspot_add = client.clone();
    let client_hotspot_remove_preview = client.clone();
    let client_hotspot_remove = client.clone();

    let pool_plan_build = pool.clone();
    let pool_hotspot_preview = pool.clone();
    let pool_hotspot_add = pool.clone();
    let pool_hotspot_remove_preview = pool.clone();
    let pool_hotspot_remove = pool.clone();

    let ping_handle = tokio::spawn(async move {
        ping::handle_ping(client_ping, ping_sub).await
    });

    let plan_build_handle = tokio::spawn(async move {
        plan::handle_build(client_plan_build, plan_build_sub, pool_plan_build).await
    });

    let hotspot_preview_handle = tokio::spawn(async move {
        hotspot::handle_preview_insert(client_hotspot_preview, hotspot_preview_sub, pool_hotspot_preview).await
    });

    let hotspot_add_handle = tokio::spawn(async move {
        hotspot::handle_commit_insert(client_hotspot_add, hotspot_add_sub, pool_hotspot_add).await
    });

    let hotspot_remove_preview_handle = tokio::spawn(async move {
        hotspot::handle_preview_remove(client_hotspot_remove_preview, hotspot_remove_preview_sub, pool_hotspot_remove_preview).await
    });

    let hotspot_remove_handle = tokio::spawn(async move {
        hotspot::handle_commit_remove(client_hotspot_remove, hotspot_remove_sub, pool_hotspot_remove).await
    });

    info!("All handlers started, waiting for messages...");

    // Wait for any handler to finish (which means an error occurred)
    select! {
        result = ping_handle => {
            error!("Ping handler finished: {:?}", result);
        }
        result = plan_build_handle => {
            error!("Plan build handler finished: {:?}", result);
        }
        result = hotspot_preview_handle => {
            error!("Hotspot preview handler finished: {:?}", result);
        }
        result = hotspot_add_handle => {
            error!("Hotspot add handler finished: {:?}", result);
        }
        result = hotspot_remove_preview_handle => {
            error!("Hotspot remove preview handler finished: {:?}", result);
        }
        result = hotspot_remove_handle => {
            error!("Hotspot remove handler finished: {:?}", result);
        }
    }

    Ok(())
}
