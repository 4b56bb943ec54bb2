//! Per-user active connections.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::Utc;
use querypilot_core::connection::ConnectionProfile;
use querypilot_core::types::{DbId, Timestamp};
use uuid::Uuid;

use crate::error::TargetError;
use crate::pool::TargetPool;
use crate::schema::SchemaCache;

/// The connection a user is currently working against.
#[derive(Debug)]
pub struct ActiveConnection {
    /// Fresh for every successful connect, so statements generated against
    /// an earlier connection can be recognised as stale.
    pub id: Uuid,
    pub profile: ConnectionProfile,
    pub pool: TargetPool,
    pub schema: SchemaCache,
    pub connected_at: Timestamp,
}

impl ActiveConnection {
    pub fn new(profile: ConnectionProfile, pool: TargetPool) -> Self {
        Self {
            id: Uuid::new_v4(),
            profile,
            pool,
            schema: SchemaCache::default(),
            connected_at: Utc::now(),
        }
    }

    pub async fn schema_description(&self) -> Result<String, TargetError> {
        self.schema.get_or_load(&self.pool).await
    }
}

/// Map of user id to that user's active connection.
#[derive(Debug, Default, Clone)]
pub struct ConnectionRegistry {
    inner: Arc<RwLock<HashMap<DbId, Arc<ActiveConnection>>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a connection for `user_id`, returning the one it replaced.
    ///
    /// The caller is responsible for closing the replaced pool.
    pub fn attach(
        &self,
        user_id: DbId,
        profile: ConnectionProfile,
        pool: TargetPool,
    ) -> (Arc<ActiveConnection>, Option<Arc<ActiveConnection>>) {
        let active = Arc::new(ActiveConnection::new(profile, pool));
        let previous = self
            .inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(user_id, Arc::clone(&active));
        (active, previous)
    }

    pub fn get(&self, user_id: DbId) -> Option<Arc<ActiveConnection>> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&user_id)
            .cloned()
    }

    pub fn active_id(&self, user_id: DbId) -> Option<Uuid> {
        self.get(user_id).map(|c| c.id)
    }

    pub fn remove(&self, user_id: DbId) -> Option<Arc<ActiveConnection>> {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&user_id)
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Detach every connection, e.g. on shutdown.
    pub fn drain(&self) -> Vec<Arc<ActiveConnection>> {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .map(|(_, c)| c)
            .collect()
    }
}
