//! Pooled session leasing.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::{Endpoint, SessionError};

/// Produces fresh sessions for one schema.
///
/// Implementations hold whatever connection parameters they need; the pool
/// only calls [`connect`](SessionFactory::connect) when it has room for a
/// new live session.
pub trait SessionFactory: Send + Sync {
    /// Establishes a new session.
    fn connect(&self) -> Result<Box<dyn Endpoint>, SessionError>;
}

/// Pool sizing and borrow behaviour for one schema.
#[derive(Clone, Copy, Debug)]
pub struct PoolConfig {
    /// Maximum live sessions.
    pub size: usize,
    /// How long a borrow may wait for a free session.
    pub wait_timeout: Duration,
    /// Probe sessions before handing them out, evicting broken ones.
    pub test_on_borrow: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            size: 8,
            wait_timeout: Duration::from_secs(10),
            test_on_borrow: false,
        }
    }
}

struct PoolState {
    idle: Vec<Box<dyn Endpoint>>,
    live: usize,
}

struct Pool {
    schema: String,
    factory: Box<dyn SessionFactory>,
    config: PoolConfig,
    state: Mutex<PoolState>,
    available: Condvar,
}

impl Pool {
    fn new(schema: String, factory: Box<dyn SessionFactory>, config: PoolConfig) -> Self {
        Self {
            schema,
            factory,
            config,
            state: Mutex::new(PoolState {
                idle: Vec::new(),
                live: 0,
            }),
            available: Condvar::new(),
        }
    }

    /// Takes an idle session or permission to create one, honouring the
    /// wait timeout. Returns `Ok(Some(session))` for an idle session and
    /// `Ok(None)` when the caller should connect a fresh one.
    fn acquire(&self) -> Result<Option<Box<dyn Endpoint>>, SessionError> {
        let deadline = Instant::now() + self.config.wait_timeout;
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            if let Some(session) = state.idle.pop() {
                return Ok(Some(session));
            }
            if state.live < self.config.size {
                state.live += 1;
                return Ok(None);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(SessionError::PoolExhausted {
                    schema: self.schema.clone(),
                    waited_ms: self.config.wait_timeout.as_millis() as u64,
                });
            }
            let (next, timeout) = self
                .available
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(|e| e.into_inner());
            state = next;
            if timeout.timed_out() && state.idle.is_empty() && state.live >= self.config.size {
                return Err(SessionError::PoolExhausted {
                    schema: self.schema.clone(),
                    waited_ms: self.config.wait_timeout.as_millis() as u64,
                });
            }
        }
    }

    fn connect(&self) -> Result<Box<dyn Endpoint>, SessionError> {
        match self.factory.connect() {
            Ok(session) => Ok(session),
            Err(err) => {
                self.forget_one();
                Err(err)
            }
        }
    }

    fn give_back(&self, session: Box<dyn Endpoint>) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.idle.push(session);
        drop(state);
        self.available.notify_one();
    }

    /// Drops a live-session slot after an eviction or failed connect.
    fn forget_one(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.live = state.live.saturating_sub(1);
        drop(state);
        self.available.notify_one();
    }

    fn borrow(self: &Arc<Self>) -> Result<SessionHandle, SessionError> {
        loop {
            let session = match self.acquire()? {
                Some(idle) => {
                    if self.config.test_on_borrow && idle.probe().is_err() {
                        debug!(schema = %self.schema, "evicting session that failed its borrow probe");
                        drop(idle);
                        self.forget_one();
                        // Retry: another idle session or a fresh connect.
                        continue;
                    }
                    idle
                }
                None => self.connect()?,
            };
            return Ok(SessionHandle {
                session: Some(session),
                pool: Arc::clone(self),
            });
        }
    }
}

/// A leased session.
///
/// Dropping the handle returns the session to its pool. Call
/// [`evict`](SessionHandle::evict) instead when the session is suspected
/// broken, so the connection is discarded and its pool slot freed.
pub struct SessionHandle {
    session: Option<Box<dyn Endpoint>>,
    pool: Arc<Pool>,
}

impl SessionHandle {
    /// The leased endpoint.
    pub fn endpoint(&self) -> &dyn Endpoint {
        self.session
            .as_deref()
            .expect("session present until drop or evict")
    }

    /// Discards the session instead of returning it to the pool.
    pub fn evict(mut self) {
        if let Some(session) = self.session.take() {
            warn!(schema = %self.pool.schema, "evicting session from pool");
            drop(session);
            self.pool.forget_one();
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            self.pool.give_back(session);
        }
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("schema", &self.pool.schema)
            .finish_non_exhaustive()
    }
}

/// One pool per schema, shared by every rule naming that schema.
///
/// Pools are registered up front (from the connection section of the
/// configuration) and the provider is then shared immutably across all
/// rule pipelines.
#[derive(Default)]
pub struct SessionProvider {
    pools: HashMap<String, Arc<Pool>>,
}

impl SessionProvider {
    /// Creates an empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a pool for `schema`. Replaces any earlier registration of
    /// the same schema.
    pub fn add_pool(
        &mut self,
        schema: impl Into<String>,
        config: PoolConfig,
        factory: Box<dyn SessionFactory>,
    ) {
        let schema = schema.into();
        self.pools.insert(
            schema.clone(),
            Arc::new(Pool::new(schema, factory, config)),
        );
    }

    /// Leases a session for `schema`, waiting up to the pool's configured
    /// borrow timeout.
    pub fn borrow(&self, schema: &str) -> Result<SessionHandle, SessionError> {
        let pool = self
            .pools
            .get(schema)
            .ok_or_else(|| SessionError::NoSuchSchema(schema.to_owned()))?;
        pool.borrow()
    }

    /// Schemas with a registered pool.
    pub fn schemas(&self) -> impl Iterator<Item = &str> {
        self.pools.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for SessionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionProvider")
            .field("schemas", &self.pools.keys().collect::<Vec<_>>())
            .finish()
    }
}
