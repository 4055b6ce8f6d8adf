//! Live connection registry: which connections each user holds.
//!
//! Process-local and rebuilt from scratch on restart. A user may hold any
//! number of connections (one per device or tab). A secondary
//! connection → user index keeps `unregister` O(1).

use std::collections::{HashMap, HashSet};

use tokio::sync::RwLock;

use crate::domain::foundation::UserId;

use super::connection::ConnectionId;

/// Result of removing a connection from the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unregistered {
    pub user_id: UserId,
    /// True when this was the user's last connection.
    pub went_offline: bool,
}

#[derive(Default)]
struct RegistryState {
    by_user: HashMap<UserId, HashSet<ConnectionId>>,
    by_connection: HashMap<ConnectionId, UserId>,
}

impl RegistryState {
    fn detach(&mut self, connection_id: &ConnectionId) -> Option<Unregistered> {
        let user_id = self.by_connection.remove(connection_id)?;

        let went_offline = match self.by_user.get_mut(&user_id) {
            Some(set) => {
                set.remove(connection_id);
                set.is_empty()
            }
            None => true,
        };
        if went_offline {
            self.by_user.remove(&user_id);
        }

        Some(Unregistered {
            user_id,
            went_offline,
        })
    }
}

/// Maps users to their live connection ids.
#[derive(Default)]
pub struct ConnectionRegistry {
    state: RwLock<RegistryState>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a connection to the user's set. Idempotent.
    ///
    /// A connection belongs to at most one user; registering it under a
    /// different user moves it.
    pub async fn register(&self, user_id: &UserId, connection_id: ConnectionId) {
        let mut state = self.state.write().await;

        if state.by_connection.get(&connection_id) == Some(user_id) {
            return;
        }
        state.detach(&connection_id);

        state
            .by_user
            .entry(user_id.clone())
            .or_default()
            .insert(connection_id);
        state.by_connection.insert(connection_id, user_id.clone());
    }

    /// Removes a connection; drops the user entry when its set empties.
    ///
    /// Returns `None` for a connection that never registered.
    pub async fn unregister(&self, connection_id: &ConnectionId) -> Option<Unregistered> {
        self.state.write().await.detach(connection_id)
    }

    /// Live connections of a user; empty when offline.
    pub async fn connections_for(&self, user_id: &UserId) -> HashSet<ConnectionId> {
        self.state
            .read()
            .await
            .by_user
            .get(user_id)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn is_online(&self, user_id: &UserId) -> bool {
        self.state.read().await.by_user.contains_key(user_id)
    }

    /// The user a connection registered as, if any.
    #[cfg(test)]
    pub async fn user_of(&self, connection_id: &ConnectionId) -> Option<UserId> {
        self.state
            .read()
            .await
            .by_connection
            .get(connection_id)
            .cloned()
    }

    pub async fn online_user_count(&self) -> usize {
        self.state.read().await.by_user.len()
    }

    pub async fn connection_count(&self) -> usize {
        self.state.read().await.by_connection.len()
    }
}
