use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use parking_lot::RwLock;
use base64::Engine;
use tracing::debug;

use super::principal::Principal;

pub type SessionToken = String;

/// Per-session storage the reconciler reads and writes.
pub trait SessionStore {
    /// Principal already authenticated in this session, if any.
    fn principal(&self) -> Option<Principal>;
    fn set_principal(&self, principal: Principal);
    fn clear_logged_out(&self);
}

#[derive(Debug, Clone)]
struct SessionEntry {
    principal: Option<Principal>,
    logged_out: bool,
    expires_at: Instant,
}

fn gen_id() -> Result<SessionToken, getrandom::Error> {
    // 256-bit random token, base64url without padding
    let mut buf = [0u8; 32];
    getrandom::getrandom(&mut buf)?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf))
}

/// In-memory session table keyed by bearer token.
#[derive(Clone)]
pub struct SessionManager {
    pub ttl: Duration,
    sessions: Arc<RwLock<HashMap<SessionToken, SessionEntry>>>,
}

impl Default for SessionManager {
    fn default() -> Self { Self::new(Duration::from_secs(60 * 60)) }
}

impl SessionManager {
    pub fn new(ttl: Duration) -> Self { Self { ttl, sessions: Arc::new(RwLock::new(HashMap::new())) } }

    /// Handle for the session named by `token`, or a fresh token when the
    /// caller had none or it expired. Fresh sessions are stored on first write.
    pub fn open(&self, token: Option<&str>) -> Result<SessionHandle, getrandom::Error> {
        if let Some(t) = token {
            if self.is_live(t) {
                return Ok(SessionHandle { manager: self.clone(), token: t.to_string(), fresh: false });
            }
        }
        Ok(SessionHandle { manager: self.clone(), token: gen_id()?, fresh: true })
    }

    fn is_live(&self, token: &str) -> bool {
        let now = Instant::now();
        let expired = match self.sessions.read().get(token) {
            Some(ent) if ent.expires_at > now => return true,
            Some(_) => true,
            None => false,
        };
        if expired {
            self.sessions.write().remove(token);
        }
        false
    }

    /// Drop the principal and mark the session logged out.
    pub fn logout(&self, token: &str) -> bool {
        let mut map = self.sessions.write();
        match map.get_mut(token) {
            Some(ent) => {
                let user = ent.principal.take().map(|p| p.user_id);
                ent.logged_out = true;
                debug!(user = ?user, "session.logout");
                true
            }
            None => false,
        }
    }

    pub fn is_logged_out(&self, token: &str) -> bool {
        self.sessions.read().get(token).map(|e| e.logged_out).unwrap_or(false)
    }

    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut map = self.sessions.write();
        let before = map.len();
        map.retain(|_, e| e.expires_at > now);
        before - map.len()
    }

    pub fn len(&self) -> usize { self.sessions.read().len() }

    pub fn is_empty(&self) -> bool { self.sessions.read().is_empty() }
}

/// One session as seen by one request.
pub struct SessionHandle {
    manager: SessionManager,
    token: SessionToken,
    fresh: bool,
}

impl SessionHandle {
    pub fn token(&self) -> &str { &self.token }

    /// True when the caller presented no usable token.
    pub fn is_fresh(&self) -> bool { self.fresh }
}

impl SessionStore for SessionHandle {
    fn principal(&self) -> Option<Principal> {
        let now = Instant::now();
        self.manager
            .sessions
            .read()
            .get(&self.token)
            .filter(|e| e.expires_at > now)
            .and_then(|e| e.principal.clone())
    }

    fn set_principal(&self, principal: Principal) {
        let expires_at = Instant::now() + self.manager.ttl;
        let mut map = self.manager.sessions.write();
        let ent = map
            .entry(self.token.clone())
            .or_insert(SessionEntry { principal: None, logged_out: false, expires_at });
        ent.principal = Some(principal);
        ent.expires_at = expires_at;
    }

    fn clear_logged_out(&self) {
        if let Some(ent) = self.manager.sessions.write().get_mut(&self.token) {
            ent.logged_out = false;
        }
    }
}
