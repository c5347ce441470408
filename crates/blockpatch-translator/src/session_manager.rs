use crate::session::ViewerSession;
use blockpatch_common::ViewerId;
use dashmap::mapref::one::Ref;
use dashmap::DashMap;

/// Connected viewers. Lookups for different viewers never contend on a
/// single lock.
#[derive(Debug, Default)]
pub struct SessionManager {
    sessions: DashMap<ViewerId, ViewerSession>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Adds a session, replacing any previous one for the same viewer.
    pub fn add_session(&self, session: ViewerSession) -> Option<ViewerSession> {
        self.sessions.insert(session.viewer, session)
    }

    pub fn remove_session(&self, viewer: ViewerId) -> Option<ViewerSession> {
        self.sessions.remove(&viewer).map(|(_, session)| session)
    }

    pub fn get_session(&self, viewer: ViewerId) -> Option<Ref<'_, ViewerId, ViewerSession>> {
        self.sessions.get(&viewer)
    }

    pub fn is_connected(&self, viewer: ViewerId) -> bool {
        self.sessions.contains_key(&viewer)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
