use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};

use crewdesk_db::Database;
use crewdesk_types::api::Claims;
use crewdesk_types::events::{GatewayCommand, GatewayEvent};
use crewdesk_types::models::email_domain;

use crate::dispatcher::Dispatcher;
use crate::feed::{ChannelWatch, FeedFilter};

/// Clients must identify within this window or the socket is closed.
const IDENTIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Items the recv task hands to the send task. An OpenFeed carries the watch,
/// the history batch, and the broadcast receiver snapshotted before the
/// history load, so the batch is always written to the socket before any live
/// event for that channel.
enum Outbound {
    OpenFeed {
        watch: ChannelWatch,
        batch: GatewayEvent,
        events: broadcast::Receiver<GatewayEvent>,
    },
    CloseFeed,
}

/// Handle a single WebSocket connection: Identify handshake, Ready, then the
/// watch/feed loop until either side drops.
pub async fn handle_connection(
    socket: WebSocket,
    dispatcher: Dispatcher,
    db: Arc<Database>,
    jwt_secret: String,
) {
    let (mut sender, mut receiver) = socket.split();

    // Step 1: Wait for Identify command with JWT
    let claims = match wait_for_identify(&mut receiver, &jwt_secret).await {
        Some(claims) => claims,
        None => {
            warn!("WebSocket client failed to identify, closing");
            return;
        }
    };
    let user_id = claims.sub;
    let name = claims.name.clone();

    info!("{} ({}) connected to gateway", name, user_id);

    // Step 2: Send Ready event
    let ready = GatewayEvent::Ready {
        user_id,
        name: name.clone(),
    };
    if sender
        .send(Message::Text(serde_json::to_string(&ready).unwrap().into()))
        .await
        .is_err()
    {
        return;
    }

    // Connection-level subscription. Each Watch snapshots its own receiver
    // before the history load; this one only matters while no feed is open,
    // when the filter blocks all channel traffic anyway.
    let mut broadcast_rx = dispatcher.subscribe();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Outbound>();

    // Send task: owns the socket sink and the feed filter. OpenFeed installs
    // the watch, swaps in the receiver snapshotted before the history load,
    // and writes the batch; anything broadcast during the load is waiting on
    // that receiver, and the batch-id dedupe drops the overlap.
    let mut send_task = tokio::spawn(async move {
        let mut filter = FeedFilter::new();
        loop {
            tokio::select! {
                biased;

                item = out_rx.recv() => {
                    let item = match item {
                        Some(item) => item,
                        None => break,
                    };
                    match item {
                        Outbound::OpenFeed { watch, batch, events } => {
                            filter.install(watch);
                            broadcast_rx = events;
                            let text = serde_json::to_string(&batch).unwrap();
                            if sender.send(Message::Text(text.into())).await.is_err() {
                                break;
                            }
                        }
                        Outbound::CloseFeed => {
                            filter.release();
                        }
                    }
                }
                result = broadcast_rx.recv() => {
                    let event = match result {
                        Ok(event) => event,
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            warn!("Broadcast receiver lagged by {} events", n);
                            continue;
                        }
                        Err(_) => break,
                    };
                    if !filter.allows(&event) {
                        continue;
                    }
                    let text = serde_json::to_string(&event).unwrap();
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
            }
        }
        // released on every exit path, including socket errors
        filter.release();
    });

    // Recv task: reads commands from the client.
    let dispatcher_cmd = dispatcher.clone();
    let claims_recv = claims.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<GatewayCommand>(&text) {
                    Ok(cmd) => {
                        if handle_command(&db, &out_tx, &claims_recv, &dispatcher_cmd, cmd)
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(
                            "{} ({}) bad command: {} -- raw: {}",
                            claims_recv.name,
                            claims_recv.sub,
                            e,
                            &text[..text.len().min(200)]
                        );
                    }
                },
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    info!("{} ({}) disconnected from gateway", name, user_id);
}

async fn wait_for_identify(
    receiver: &mut futures_util::stream::SplitStream<WebSocket>,
    jwt_secret: &str,
) -> Option<Claims> {
    use jsonwebtoken::{decode, DecodingKey, Validation};

    let timeout = tokio::time::timeout(IDENTIFY_TIMEOUT, async {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Text(text) = msg {
                if let Ok(GatewayCommand::Identify { token }) =
                    serde_json::from_str::<GatewayCommand>(&text)
                {
                    let token_data = decode::<Claims>(
                        &token,
                        &DecodingKey::from_secret(jwt_secret.as_bytes()),
                        &Validation::default(),
                    )
                    .ok()?;

                    return Some(token_data.claims);
                }
            }
        }
        None
    });

    timeout.await.ok().flatten()
}

async fn handle_command(
    db: &Arc<Database>,
    out_tx: &mpsc::UnboundedSender<Outbound>,
    claims: &Claims,
    dispatcher: &Dispatcher,
    cmd: GatewayCommand,
) -> Result<(), ()> {
    match cmd {
        GatewayCommand::Identify { .. } => Ok(()), // Already handled

        GatewayCommand::Watch { channel_id } => {
            info!(
                "{} ({}) watching channel {}",
                claims.name, claims.sub, channel_id
            );

            let Some(domain) = email_domain(&claims.email) else {
                warn!("{} has no usable email domain, refusing watch", claims.sub);
                return Ok(());
            };

            // Same row policy as the REST message endpoints: the channel
            // must exist and live in the caller's domain.
            let db_lookup = db.clone();
            let cid = channel_id.to_string();
            let channel =
                match tokio::task::spawn_blocking(move || db_lookup.get_channel(&cid)).await {
                    Ok(Ok(Some(channel))) => channel,
                    Ok(Ok(None)) => {
                        warn!("watch on unknown channel {}", channel_id);
                        return Ok(());
                    }
                    Ok(Err(e)) => {
                        warn!("channel lookup failed for {}: {}", channel_id, e);
                        return Ok(());
                    }
                    Err(e) => {
                        warn!("spawn_blocking join error: {}", e);
                        return Ok(());
                    }
                };
            if channel.domain != domain {
                warn!(
                    "{} ({}) refused watch on foreign-domain channel {}",
                    claims.name, claims.sub, channel_id
                );
                return Ok(());
            }

            // Snapshot a receiver before the history SELECT: a message
            // inserted during the load is either in the batch or queued
            // here, never lost.
            let events = dispatcher.subscribe();

            let db_history = db.clone();
            let cid = channel_id.to_string();
            let rows =
                match tokio::task::spawn_blocking(move || db_history.get_channel_messages(&cid))
                    .await
                {
                    Ok(Ok(rows)) => rows,
                    Ok(Err(e)) => {
                        warn!("history load failed for channel {}: {}", channel_id, e);
                        return Ok(());
                    }
                    Err(e) => {
                        warn!("spawn_blocking join error: {}", e);
                        return Ok(());
                    }
                };

            let messages: Vec<_> = rows.into_iter().map(|r| r.into_response()).collect();
            let watch = ChannelWatch::new(channel_id, &messages);
            let batch = GatewayEvent::HistoryBatch {
                channel_id,
                messages,
            };

            out_tx
                .send(Outbound::OpenFeed {
                    watch,
                    batch,
                    events,
                })
                .map_err(|_| ())
        }

        GatewayCommand::Unwatch => out_tx.send(Outbound::CloseFeed).map_err(|_| ()),
    }
}
