//! Session store: one indexed resume per session, held in memory.
//!
//! A session owns its retriever (and therefore its index). Sessions expire
//! after a period without use; expired ones are purged on every access and
//! by a periodic sweeper.

pub mod handlers;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::retrieval::retriever::Retriever;

pub struct Session {
    pub id: Uuid,
    pub file_name: String,
    pub page_count: usize,
    pub chunk_count: usize,
    pub created_at: DateTime<Utc>,
    pub retriever: Retriever,
}

struct Entry {
    session: Arc<Session>,
    last_used: DateTime<Utc>,
}

pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, Entry>>,
    ttl: chrono::Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX),
        }
    }

    pub async fn insert(&self, session: Session) -> Arc<Session> {
        self.insert_at(session, Utc::now()).await
    }

    /// Returns the session and marks it as used.
    pub async fn get(&self, id: Uuid) -> Option<Arc<Session>> {
        self.get_at(id, Utc::now()).await
    }

    pub async fn remove(&self, id: Uuid) -> bool {
        self.sessions.write().await.remove(&id).is_some()
    }

    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn purge_expired(&self) -> usize {
        self.purge_at(Utc::now()).await
    }

    async fn insert_at(&self, session: Session, now: DateTime<Utc>) -> Arc<Session> {
        let session = Arc::new(session);
        let mut sessions = self.sessions.write().await;
        Self::purge_locked(&mut sessions, self.ttl, now);
        sessions.insert(
            session.id,
            Entry {
                session: session.clone(),
                last_used: now,
            },
        );
        session
    }

    async fn get_at(&self, id: Uuid, now: DateTime<Utc>) -> Option<Arc<Session>> {
        let mut sessions = self.sessions.write().await;
        Self::purge_locked(&mut sessions, self.ttl, now);
        let entry = sessions.get_mut(&id)?;
        entry.last_used = now;
        Some(entry.session.clone())
    }

    async fn purge_at(&self, now: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.write().await;
        Self::purge_locked(&mut sessions, self.ttl, now)
    }

    fn purge_locked(
        sessions: &mut HashMap<Uuid, Entry>,
        ttl: chrono::Duration,
        now: DateTime<Utc>,
    ) -> usize {
        let before = sessions.len();
        sessions.retain(|id, entry| {
            let alive = now.signed_duration_since(entry.last_used) < ttl;
            if !alive {
                debug!("Session {id} expired");
            }
            alive
        });
        before - sessions.len()
    }
}

/// Purges expired sessions every `period` until the process exits.
pub fn spawn_sweeper(store: Arc<SessionStore>, period: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            let purged = store.purge_expired().await;
            if purged > 0 {
                info!("Purged {purged} expired session(s)");
            }
        }
    })
}
