//! Engine registry: one cached prototype engine per game type.
//!
//! Engines are built lazily through an [`EngineFactory`], health-checked on
//! every lookup and rebuilt when unhealthy. Construction is retried with
//! exponential backoff, and concurrent first use of a type builds it only
//! once. New matches are clones of the cached prototype with
//! their own id and RNG, so no two matches ever share engine state.

use crate::config::RetryPolicy;
use crate::error::RegistryError;
use dashmap::DashMap;
use gamehall_core::{AnyGame, GameRng, GameType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Shared handle to a cached engine
pub type EngineHandle = Arc<Mutex<AnyGame>>;

/// Builds fresh engines by game type.
pub trait EngineFactory: Send + Sync + 'static {
    fn create(&self, game_type: GameType) -> Result<AnyGame, RegistryError>;
}

/// Factory for the built-in engines
#[derive(Debug, Default)]
pub struct StandardFactory;

impl EngineFactory for StandardFactory {
    fn create(&self, game_type: GameType) -> Result<AnyGame, RegistryError> {
        let engine = AnyGame::new(game_type, Uuid::nil(), GameRng::with_seed(0));
        if !engine.is_healthy() {
            return Err(RegistryError::Construction {
                game: game_type,
                reason: "fresh engine failed its health check".into(),
            });
        }
        Ok(engine)
    }
}

/// Per-type cache statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
    pub initialized: bool,
    pub healthy: bool,
    pub usage_count: u64,
    pub last_used_secs_ago: Option<u64>,
}

struct CachedEngine {
    engine: EngineHandle,
    last_used: Instant,
    usage_count: u64,
}

impl CachedEngine {
    fn new(engine: EngineHandle) -> Self {
        Self {
            engine,
            last_used: Instant::now(),
            usage_count: 1,
        }
    }

    fn touch(&mut self) {
        self.last_used = Instant::now();
        self.usage_count += 1;
    }
}

/// A poisoned lock or a failed invariant check both count as unhealthy
fn is_healthy(engine: &EngineHandle) -> bool {
    match engine.lock() {
        Ok(game) => game.is_healthy(),
        Err(_) => false,
    }
}

pub struct EngineRegistry {
    cache: DashMap<GameType, CachedEngine>,
    /// Held while a type is being built
    build_locks: DashMap<GameType, Arc<tokio::sync::Mutex<()>>>,
    factory: Box<dyn EngineFactory>,
    capacity: usize,
    retry: RetryPolicy,
    rng: Mutex<GameRng>,
}

impl EngineRegistry {
    pub fn new(
        factory: impl EngineFactory,
        capacity: usize,
        retry: RetryPolicy,
        rng: GameRng,
    ) -> Self {
        Self {
            cache: DashMap::new(),
            build_locks: DashMap::new(),
            factory: Box::new(factory),
            capacity: capacity.max(1),
            retry,
            rng: Mutex::new(rng),
        }
    }

    /// Resolve a game type by name and return its cached engine
    pub async fn get_engine(&self, game_type: &str) -> Result<EngineHandle, RegistryError> {
        let game_type: GameType = game_type
            .parse()
            .map_err(|e: gamehall_core::UnsupportedGameType| RegistryError::UnsupportedGameType(e.0))?;
        self.engine_for(game_type).await
    }

    /// Return the cached engine for `game_type`, building it if missing or
    /// rebuilding it if unhealthy
    pub async fn engine_for(&self, game_type: GameType) -> Result<EngineHandle, RegistryError> {
        if let Some(engine) = self.cached_healthy(game_type) {
            return Ok(engine);
        }

        let build = Arc::clone(&*self.build_locks.entry(game_type).or_default());
        let _building = build.lock().await;
        // Another caller may have finished the build while we waited
        if let Some(engine) = self.cached_healthy(game_type) {
            return Ok(engine);
        }
        if self.cache.remove(&game_type).is_some() {
            warn!(game = %game_type, "cached engine unhealthy, rebuilding");
        }

        let engine = Arc::new(Mutex::new(self.construct(game_type).await?));
        self.make_room_for(game_type);
        self.cache
            .insert(game_type, CachedEngine::new(Arc::clone(&engine)));
        Ok(engine)
    }

    fn cached_healthy(&self, game_type: GameType) -> Option<EngineHandle> {
        let mut cached = self.cache.get_mut(&game_type)?;
        if !is_healthy(&cached.engine) {
            return None;
        }
        cached.touch();
        Some(Arc::clone(&cached.engine))
    }

    /// A new, empty match cloned from the healthy prototype
    pub async fn create_match(&self, game_type: GameType) -> Result<AnyGame, RegistryError> {
        let prototype = self.engine_for(game_type).await?;
        let mut game = prototype
            .lock()
            .map_err(|_| RegistryError::EngineUnavailable {
                game: game_type,
                attempts: 0,
                reason: "prototype lock poisoned".into(),
            })?
            .clone();

        let rng = self
            .rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .fork();
        game.rebind(Uuid::new_v4(), rng);
        debug!(game = %game_type, match_id = %game.match_id(), "match created");
        Ok(game)
    }

    async fn construct(&self, game_type: GameType) -> Result<AnyGame, RegistryError> {
        let mut attempt = 1;
        loop {
            match self.factory.create(game_type) {
                Ok(engine) => {
                    info!(game = %game_type, attempt, "engine constructed");
                    return Ok(engine);
                }
                Err(e @ RegistryError::UnsupportedGameType(_)) => return Err(e),
                Err(e) if attempt >= self.retry.max_attempts => {
                    error!(game = %game_type, attempt, error = %e, "engine construction failed");
                    return Err(RegistryError::EngineUnavailable {
                        game: game_type,
                        attempts: attempt,
                        reason: e.to_string(),
                    });
                }
                Err(e) => {
                    let delay = self.retry.delay_for(attempt);
                    warn!(game = %game_type, attempt, ?delay, error = %e, "engine construction failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Evict the least recently used type if inserting `incoming` would
    /// exceed the capacity
    fn make_room_for(&self, incoming: GameType) {
        if self.cache.contains_key(&incoming) || self.cache.len() < self.capacity {
            return;
        }
        let oldest = self
            .cache
            .iter()
            .min_by_key(|entry| entry.last_used)
            .map(|entry| *entry.key());
        if let Some(evicted) = oldest {
            self.cache.remove(&evicted);
            debug!(game = %evicted, "evicted least recently used engine");
        }
    }

    /// Statistics for every game type, cached or not
    pub fn get_stats(&self) -> BTreeMap<GameType, EngineStats> {
        GameType::ALL
            .into_iter()
            .map(|game_type| {
                let stats = match self.cache.get(&game_type) {
                    Some(cached) => EngineStats {
                        initialized: true,
                        healthy: is_healthy(&cached.engine),
                        usage_count: cached.usage_count,
                        last_used_secs_ago: Some(cached.last_used.elapsed().as_secs()),
                    },
                    None => EngineStats {
                        initialized: false,
                        healthy: false,
                        usage_count: 0,
                        last_used_secs_ago: None,
                    },
                };
                (game_type, stats)
            })
            .collect()
    }

    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Fails the first `failures` calls, then delegates to the standard factory
    struct FlakyFactory {
        failures: u32,
        calls: Arc<AtomicU32>,
    }

    impl EngineFactory for FlakyFactory {
        fn create(&self, game_type: GameType) -> Result<AnyGame, RegistryError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(RegistryError::Construction {
                    game: game_type,
                    reason: format!("simulated failure {call}"),
                });
            }
            StandardFactory.create(game_type)
        }
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        }
    }

    fn registry(capacity: usize) -> EngineRegistry {
        EngineRegistry::new(StandardFactory, capacity, fast_retry(), GameRng::with_seed(9))
    }

    fn flaky(failures: u32) -> (EngineRegistry, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        let factory = FlakyFactory {
            failures,
            calls: Arc::clone(&calls),
        };
        (
            EngineRegistry::new(factory, 10, fast_retry(), GameRng::with_seed(9)),
            calls,
        )
    }

    #[tokio::test]
    async fn test_same_instance_while_healthy() {
        let registry = registry(10);
        let a = registry.get_engine("gomoku").await.unwrap();
        let b = registry.get_engine("five_in_a_row").await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.get_stats()[&GameType::Gomoku].usage_count, 2);
    }

    #[tokio::test]
    async fn test_poisoned_engine_is_rebuilt() {
        let registry = registry(10);
        let first = registry.get_engine("go").await.unwrap();

        let poisoner = Arc::clone(&first);
        let joined = std::thread::spawn(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("poison the engine lock");
        })
        .join();
        assert!(joined.is_err());
        assert!(!registry.get_stats()[&GameType::Go].healthy);

        let second = registry.get_engine("go").await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(registry.get_stats()[&GameType::Go].healthy);
    }

    #[tokio::test]
    async fn test_unsupported_type_is_not_retried() {
        let (registry, calls) = flaky(0);
        let err = registry.get_engine("js_red_alert").await.unwrap_err();
        assert!(matches!(err, RegistryError::UnsupportedGameType(name) if name == "js_red_alert"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let (registry, calls) = flaky(2);
        assert!(registry.get_engine("chess").await.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_concurrent_first_use_builds_once() {
        let (registry, calls) = flaky(1);
        let (a, b) = tokio::join!(
            registry.engine_for(GameType::Chess),
            registry.engine_for(GameType::Chess)
        );
        let (a, b) = (a.unwrap(), b.unwrap());
        assert!(Arc::ptr_eq(&a, &b));
        // One failed attempt plus one successful build
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(registry.get_stats()[&GameType::Chess].usage_count, 2);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let (registry, calls) = flaky(u32::MAX);
        let err = registry.get_engine("poker").await.unwrap_err();
        assert!(matches!(
            err,
            RegistryError::EngineUnavailable { attempts: 3, .. }
        ));
        assert_eq!(err.code(), "service_unavailable");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(!registry.get_stats()[&GameType::Poker].initialized);
    }

    #[tokio::test]
    async fn test_least_recently_used_is_evicted() {
        let registry = registry(2);
        registry.engine_for(GameType::Gomoku).await.unwrap();
        tokio::time::sleep(Duration::from_millis(2)).await;
        registry.engine_for(GameType::Chess).await.unwrap();
        tokio::time::sleep(Duration::from_millis(2)).await;
        registry.engine_for(GameType::Gomoku).await.unwrap();
        tokio::time::sleep(Duration::from_millis(2)).await;
        registry.engine_for(GameType::Go).await.unwrap();

        let stats = registry.get_stats();
        assert_eq!(registry.cached_count(), 2);
        assert!(stats[&GameType::Gomoku].initialized);
        assert!(stats[&GameType::Go].initialized);
        assert!(!stats[&GameType::Chess].initialized);
    }

    #[tokio::test]
    async fn test_matches_are_independent_clones() {
        let registry = registry(10);
        let mut a = registry.create_match(GameType::Gomoku).await.unwrap();
        let b = registry.create_match(GameType::Gomoku).await.unwrap();
        assert_ne!(a.match_id(), b.match_id());

        a.add_player("x", "X").unwrap();
        assert!(b.players().is_empty());
        let prototype = registry.engine_for(GameType::Gomoku).await.unwrap();
        assert!(prototype.lock().unwrap().players().is_empty());
    }
}
