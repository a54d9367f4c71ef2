//! Connection management for WebSocket clients.
//!
//! Tracks connected clients and which table each connection has joined.

use std::collections::HashMap;

use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use gridhall_domain::{TableId, UserId};
use gridhall_protocol::ServerMessage;

/// Information about a connected client.
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    /// Unique ID for this connection
    pub connection_id: Uuid,
    /// The authenticated user behind this connection
    pub user_id: UserId,
    /// The table this connection is subscribed to (if joined)
    pub table_id: Option<TableId>,
}

/// Manages all active WebSocket connections.
///
/// One user may hold several connections (two browser tabs, a reconnect
/// overlapping the old socket); room membership is therefore tracked per
/// connection and collapsed to users only where the wire needs it.
pub struct ConnectionManager {
    /// Map of connection_id -> (ConnectionInfo, sender channel)
    connections: RwLock<HashMap<Uuid, (ConnectionInfo, mpsc::Sender<ServerMessage>)>>,
}

impl ConnectionManager {
    /// Create a new connection manager.
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new connection.
    pub async fn register(
        &self,
        connection_id: Uuid,
        user_id: UserId,
        sender: mpsc::Sender<ServerMessage>,
    ) {
        let info = ConnectionInfo {
            connection_id,
            user_id,
            table_id: None,
        };
        let mut connections = self.connections.write().await;
        connections.insert(connection_id, (info, sender));
        tracing::debug!(connection_id = %connection_id, "Connection registered");
    }

    /// Unregister a connection, returning its last known info.
    pub async fn unregister(&self, connection_id: Uuid) -> Option<ConnectionInfo> {
        let mut connections = self.connections.write().await;
        let removed = connections.remove(&connection_id).map(|(info, _)| info);
        if removed.is_some() {
            tracing::debug!(connection_id = %connection_id, "Connection unregistered");
        }
        removed
    }

    /// Get connection info by ID.
    pub async fn get(&self, connection_id: Uuid) -> Option<ConnectionInfo> {
        let connections = self.connections.read().await;
        connections.get(&connection_id).map(|(info, _)| info.clone())
    }

    /// Subscribe the connection to a table's room.
    pub async fn join_table(&self, connection_id: Uuid, table_id: TableId) {
        let mut connections = self.connections.write().await;
        if let Some((info, _)) = connections.get_mut(&connection_id) {
            info.table_id = Some(table_id);
            tracing::info!(
                connection_id = %connection_id,
                table_id = %table_id,
                "Connection joined table"
            );
        }
    }

    /// Get all connections in a table's room.
    pub async fn connections_in_table(&self, table_id: TableId) -> Vec<ConnectionInfo> {
        let connections = self.connections.read().await;
        connections
            .values()
            .filter(|(info, _)| info.table_id == Some(table_id))
            .map(|(info, _)| info.clone())
            .collect()
    }

    /// Distinct users with at least one live connection in the room.
    pub async fn users_in_table(&self, table_id: TableId) -> Vec<UserId> {
        let connections = self.connections.read().await;
        let mut users = Vec::new();
        for (info, _) in connections.values() {
            if info.table_id == Some(table_id) && !users.contains(&info.user_id) {
                users.push(info.user_id);
            }
        }
        users
    }

    /// Whether the user still has a live connection in the room.
    ///
    /// Used after a disconnect to decide if a `PlayerLeft` is due: a user
    /// with a second tab open has not actually left.
    pub async fn user_still_connected(&self, table_id: TableId, user_id: UserId) -> bool {
        let connections = self.connections.read().await;
        connections
            .values()
            .any(|(info, _)| info.table_id == Some(table_id) && info.user_id == user_id)
    }

    /// Broadcast a message to all connections in a table's room.
    pub async fn broadcast_to_table(&self, table_id: TableId, message: ServerMessage) {
        let connections = self.connections.read().await;
        for (info, sender) in connections.values() {
            if info.table_id == Some(table_id) {
                if let Err(e) = sender.try_send(message.clone()) {
                    tracing::warn!(
                        connection_id = %info.connection_id,
                        error = %e,
                        "Failed to broadcast message"
                    );
                }
            }
        }
    }

    /// Broadcast to the room, skipping one connection.
    pub async fn broadcast_to_table_except(
        &self,
        table_id: TableId,
        except: Uuid,
        message: ServerMessage,
    ) {
        let connections = self.connections.read().await;
        for (info, sender) in connections.values() {
            if info.table_id == Some(table_id) && info.connection_id != except {
                if let Err(e) = sender.try_send(message.clone()) {
                    tracing::warn!(
                        connection_id = %info.connection_id,
                        error = %e,
                        "Failed to broadcast message"
                    );
                }
            }
        }
    }

    /// Send a message to a single connection.
    pub async fn send_to_connection(&self, connection_id: Uuid, message: ServerMessage) {
        let connections = self.connections.read().await;
        if let Some((info, sender)) = connections.get(&connection_id) {
            if let Err(e) = sender.try_send(message) {
                tracing::warn!(
                    connection_id = %info.connection_id,
                    error = %e,
                    "Failed to send message"
                );
            }
        }
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}
