use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use dashmap::DashMap;
use log::info;
use parking_lot::Mutex;
use tokenhub_core::Config;
use tokenhub_store::{session_token, ImageGenerator, Session, Tokenhub};

/// A signed-in client, and the path it last visited
pub struct SessionEntry {
    pub client: Session,
    pub last_path: Mutex<Option<String>>,
    last_seen: Mutex<Instant>,
}

impl SessionEntry {
    fn is_idle(&self, timeout: Duration) -> bool {
        self.last_seen.lock().elapsed() >= timeout
    }

    fn touch(&self) {
        *self.last_seen.lock() = Instant::now();
    }
}

#[derive(Clone)]
pub struct ServerContext {
    pub hub: Arc<Tokenhub>,
    pub generator: Arc<ImageGenerator>,
    pub config: Arc<Config>,
    sessions: Arc<DashMap<String, Arc<SessionEntry>>>,
}

impl ServerContext {
    pub fn new(hub: Tokenhub, config: Config) -> Self {
        Self {
            hub: Arc::new(hub),
            generator: Arc::new(ImageGenerator::from_config(&config)),
            config: Arc::new(config),
            sessions: Default::default(),
        }
    }

    /// Keeps a signed-in client around and returns the token that identifies it.
    /// Sessions that went idle are dropped on the way.
    pub fn register(&self, client: Session) -> String {
        self.drop_idle_sessions();

        let token = session_token();

        self.sessions.insert(
            token.clone(),
            Arc::new(SessionEntry {
                client,
                last_path: Default::default(),
                last_seen: Mutex::new(Instant::now()),
            }),
        );

        token
    }

    /// Looks up a session, counting the lookup as activity
    pub fn session(&self, token: &str) -> Option<Arc<SessionEntry>> {
        let entry = self.sessions.get(token).map(|entry| entry.value().clone())?;

        if entry.is_idle(self.config.session_idle_timeout) {
            self.forget(token);
            return None;
        }

        entry.touch();
        Some(entry)
    }

    pub fn forget(&self, token: &str) {
        self.sessions.remove(token);
    }

    fn drop_idle_sessions(&self) {
        let timeout = self.config.session_idle_timeout;
        let before = self.sessions.len();

        self.sessions.retain(|_, entry| !entry.is_idle(timeout));

        let dropped = before.saturating_sub(self.sessions.len());
        if dropped > 0 {
            info!("Dropped {} idle sessions", dropped);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn context(session_idle_timeout: Duration) -> ServerContext {
        let config = Config {
            session_idle_timeout,
            ..Default::default()
        };

        let hub = Tokenhub::from_config(&config).unwrap();
        ServerContext::new(hub, config)
    }

    #[test]
    fn test_sessions_are_kept_while_active() {
        let context = context(Duration::from_secs(60));

        let token = context.register(context.hub.session());

        assert!(context.session(&token).is_some());
        assert!(context.session("unknown").is_none());

        context.forget(&token);
        assert!(context.session(&token).is_none());
    }

    #[test]
    fn test_idle_sessions_are_dropped() {
        let context = context(Duration::ZERO);

        let first = context.register(context.hub.session());
        assert!(context.session(&first).is_none());

        context.register(context.hub.session());
        context.register(context.hub.session());

        // Each registration sweeps the sessions that went idle before it
        assert_eq!(context.sessions.len(), 1);
    }
}
