//! Sized TTL Cache - demonstration driver
//!
//! Hammers a cache from several tasks at once, the way an application would.

use std::env;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sized_ttl_cache::{CacheConfig, SizedTtlCache};

type DemoCache = SizedTtlCache<u32, i64>;

/// Driver settings, loaded from the environment.
#[derive(Debug, Clone)]
struct DemoConfig {
    /// Keys written by the main fill loop
    fill_keys: u32,
    /// TTL given to every written entry
    entry_ttl: Duration,
    /// How long the workers run after the fill loop
    run_for: Duration,
}

impl DemoConfig {
    /// # Environment Variables
    /// - `DEMO_FILL_KEYS` - Keys written by the fill loop (default: 57)
    /// - `DEMO_ENTRY_TTL_MS` - Entry TTL in milliseconds (default: 100)
    /// - `DEMO_RUN_SECS` - Worker run time in seconds (default: 5)
    fn from_env() -> Self {
        Self {
            fill_keys: env_parse("DEMO_FILL_KEYS").unwrap_or(57),
            entry_ttl: Duration::from_millis(env_parse("DEMO_ENTRY_TTL_MS").unwrap_or(100)),
            run_for: Duration::from_secs(env_parse("DEMO_RUN_SECS").unwrap_or(5)),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sized_ttl_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = CacheConfig::from_env();
    let demo = DemoConfig::from_env();
    info!("Configuration loaded: {:?}, {:?}", config, demo);

    let cache: Arc<DemoCache> = Arc::new(SizedTtlCache::new(config)?);
    let (stop_tx, stop_rx) = watch::channel(false);

    let workers = vec![
        spawn_reader(cache.clone(), stop_rx.clone()),
        spawn_writer(cache.clone(), demo.entry_ttl, stop_rx.clone()),
        spawn_inspector(cache.clone(), stop_rx),
    ];
    info!("Started {} worker tasks", workers.len());

    for key in 0..demo.fill_keys {
        if let Err(err) = cache.put(key, i64::from(key), demo.entry_ttl).await {
            warn!("Can't add ({}, {}) to cache: {}", key, key, err);
        }
        report_free_space(&cache).await;
    }

    for key in 0..demo.fill_keys {
        match cache.get(&key).await {
            Ok(value) => info!("From cache: <{}, {}>", key, value),
            Err(err) => warn!("Can't get key {} from cache: {}", key, err),
        }
        report_free_space(&cache).await;
    }

    tokio::time::sleep(demo.run_for).await;

    stop_tx.send_replace(true);
    for worker in workers {
        worker.await?;
    }
    cache.close().await;

    info!("Demo complete");
    Ok(())
}

async fn report_free_space(cache: &DemoCache) {
    match cache.free_space().await {
        Ok(space) => info!("Free space: {} bytes", space),
        Err(err) => warn!("Can't get free space: {}", err),
    }
}

fn random_key(bound: u32) -> u32 {
    rand::thread_rng().gen_range(0..bound)
}

/// Runs `step` every 10ms until `stop` flips.
fn spawn_worker<F, Fut>(mut stop: watch::Receiver<bool>, mut step: F) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_millis(10));
        loop {
            tokio::select! {
                _ = ticker.tick() => step().await,
                _ = stop.changed() => break,
            }
        }
    })
}

fn spawn_reader(cache: Arc<DemoCache>, stop: watch::Receiver<bool>) -> JoinHandle<()> {
    spawn_worker(stop, move || {
        let cache = cache.clone();
        async move {
            let key = random_key(100);
            match cache.get(&key).await {
                Ok(value) => info!("Reader got <{}, {}>", key, value),
                Err(err) => info!("Reader can't get key {}: {}", key, err),
            }
        }
    })
}

fn spawn_writer(
    cache: Arc<DemoCache>,
    ttl: Duration,
    stop: watch::Receiver<bool>,
) -> JoinHandle<()> {
    spawn_worker(stop, move || {
        let cache = cache.clone();
        async move {
            let key = random_key(50);
            match cache.put(key, i64::from(key), ttl).await {
                Ok(()) => info!("Writer put ({}, {})", key, key),
                Err(err) => info!("Writer can't put ({}, {}): {}", key, key, err),
            }
        }
    })
}

fn spawn_inspector(cache: Arc<DemoCache>, stop: watch::Receiver<bool>) -> JoinHandle<()> {
    spawn_worker(stop, move || {
        let cache = cache.clone();
        async move {
            let key = random_key(50);
            match cache.exists(&key).await {
                Ok(exists) => info!("Inspector: key {} exists = {}", key, exists),
                Err(err) => info!("Inspector can't check key {}: {}", key, err),
            }
            match (cache.cap().await, cache.count().await) {
                (Ok(cap), Ok(count)) => info!("Inspector: capacity {}, count {}", cap, count),
                (Err(err), _) | (_, Err(err)) => info!("Inspector can't read sizes: {}", err),
            }
        }
    })
}
