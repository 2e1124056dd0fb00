use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
        RwLock,
        RwLockReadGuard,
        RwLockWriteGuard,
    },
};

use chrono::{DateTime, Utc};
use log::*;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::db_types::Role;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self { message: message.into(), created_at: Utc::now() }
    }
}

struct Client {
    connection_id: u64,
    role: Role,
    sender: UnboundedSender<Notification>,
}

#[derive(Default)]
struct HubState {
    clients: RwLock<HashMap<i64, Client>>,
    next_connection_id: AtomicU64,
}

/// Tracks one live connection per user. A new registration for the same user replaces the old one.
#[derive(Clone, Default)]
pub struct NotificationHub {
    state: Arc<HubState>,
}

/// The receiving end of a registration. Dropping it removes the connection from the hub, unless the user has since
/// reconnected.
pub struct Subscription {
    user_id: i64,
    connection_id: u64,
    receiver: UnboundedReceiver<Notification>,
    hub: NotificationHub,
}

impl Subscription {
    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    /// Waits for the next notification. Returns `None` once the connection has been replaced or unregistered.
    pub async fn recv(&mut self) -> Option<Notification> {
        self.receiver.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.hub.remove_connection(self.user_id, self.connection_id);
    }
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, user_id: i64, role: Role) -> Subscription {
        let connection_id = self.state.next_connection_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = unbounded_channel();
        let previous = self.write().insert(user_id, Client { connection_id, role, sender });
        if previous.is_some() {
            debug!("📬️ User #{user_id} reconnected. The previous connection is closed.");
        }
        info!("📬️ User #{user_id} connected ({role})");
        Subscription { user_id, connection_id, receiver, hub: self.clone() }
    }

    pub fn unregister(&self, user_id: i64) {
        if self.write().remove(&user_id).is_some() {
            info!("📬️ User #{user_id} disconnected");
        }
    }

    /// Delivers the message to the user if they are connected. Returns whether it was delivered.
    pub fn send_to_user<S: Into<String>>(&self, user_id: i64, message: S) -> bool {
        let notification = Notification::new(message);
        let delivered = self.read().get(&user_id).map(|c| c.sender.send(notification).is_ok()).unwrap_or(false);
        if !delivered {
            trace!("📬️ User #{user_id} is not connected. Notification dropped.");
        }
        delivered
    }

    /// Delivers the message to every connected user holding exactly this role. Returns the number of recipients.
    pub fn broadcast_to_role<S: Into<String>>(&self, role: Role, message: S) -> usize {
        self.broadcast_where(message, |_, r| r == role)
    }

    pub fn broadcast_where<S, P>(&self, message: S, predicate: P) -> usize
    where
        S: Into<String>,
        P: Fn(i64, Role) -> bool,
    {
        let notification = Notification::new(message);
        let count = self
            .read()
            .iter()
            .filter(|(id, c)| predicate(**id, c.role))
            .filter(|(_, c)| c.sender.send(notification.clone()).is_ok())
            .count();
        debug!("📬️ Broadcast delivered to {count} connection(s)");
        count
    }

    pub fn connected_count(&self) -> usize {
        self.read().len()
    }

    fn remove_connection(&self, user_id: i64, connection_id: u64) {
        let mut clients = self.write();
        if clients.get(&user_id).map(|c| c.connection_id == connection_id).unwrap_or(false) {
            clients.remove(&user_id);
            info!("📬️ User #{user_id} disconnected");
        }
    }

    // A panic while holding the lock leaves the map itself consistent, so poisoning is ignored.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<i64, Client>> {
        self.state.clients.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<i64, Client>> {
        self.state.clients.write().unwrap_or_else(|e| e.into_inner())
    }
}
