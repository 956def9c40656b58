//! Connector change feed over `LISTEN`/`NOTIFY`.

use async_trait::async_trait;
use sqlx::postgres::PgListener;
use tracing::{debug, info, warn};

use dirsync_connector::error::{ConnectorError, ConnectorResult};
use dirsync_connector::store::ConnectorChangeFeed;
use dirsync_core::{ChangeNotification, ConnectorEvent};

use crate::pool::DbPool;

/// Channel the `connectors` trigger publishes on.
pub const DEFAULT_CHANGE_CHANNEL: &str = "connectors_changes";

/// Listens for `{table, action, id}` notifications.
///
/// The listener reconnects on its own after a dropped connection.
/// Notifications sent while disconnected are lost, so the caller should
/// re-bootstrap if it needs a complete view.
pub struct PgChangeFeed {
    listener: PgListener,
    channel: String,
}

impl PgChangeFeed {
    pub async fn connect(pool: &DbPool, channel: &str) -> ConnectorResult<Self> {
        let mut listener = PgListener::connect_with(pool.inner())
            .await
            .map_err(|e| ConnectorError::store_with_source("change feed connect failed", e))?;
        listener
            .listen(channel)
            .await
            .map_err(|e| ConnectorError::store_with_source("LISTEN failed", e))?;

        info!(channel = %channel, "Listening for connector changes");
        Ok(Self {
            listener,
            channel: channel.to_string(),
        })
    }
}

#[async_trait]
impl ConnectorChangeFeed for PgChangeFeed {
    async fn next_event(&mut self) -> ConnectorResult<Option<ConnectorEvent>> {
        loop {
            let notification = match self.listener.try_recv().await {
                Ok(Some(notification)) => notification,
                Ok(None) => {
                    warn!(channel = %self.channel, "Change feed connection lost, reconnecting");
                    continue;
                }
                Err(e) => {
                    return Err(ConnectorError::store_with_source(
                        "change feed receive failed",
                        e,
                    ))
                }
            };

            match ChangeNotification::parse(notification.payload()) {
                Ok(change) => match change.into_event() {
                    Some(event) => return Ok(Some(event)),
                    None => debug!(payload = notification.payload(), "Ignoring non-connector change"),
                },
                Err(e) => warn!(
                    payload = notification.payload(),
                    error = %e,
                    "Malformed change notification"
                ),
            }
        }
    }
}
