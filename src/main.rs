use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use prometheus::Registry;
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use introspector::cache::{CacheStore, MemoryStore, RedisStore, TieredCache};
use introspector::config::{self, Config};
use introspector::metrics::{prom, CounterSink, PrometheusSink, StatsdSink};
use introspector::{Cached, Introspection, Introspector, MetricsCollection, Permission, Warden};

mod cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries the command's JSON, logs go to stderr
    let json_logs = std::env::var("INTROSPECTOR_LOG_FORMAT").is_ok_and(|v| v == "json");
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "introspector=info".into()),
        ))
        .with((!json_logs).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)))
        .init();

    let cfg = config::load()?;
    let args = cli::Cli::parse();

    let registry = Registry::new();
    let sink: Arc<dyn CounterSink> = if cfg.statsd {
        Arc::new(StatsdSink::from_env().context("open DogStatsD sink")?)
    } else {
        Arc::new(PrometheusSink::new(&registry).context("register introspector counter")?)
    };

    let result = match args.command {
        cli::Commands::Introspect { token, no_cache } => {
            run_introspect(&cfg, sink, &token, no_cache).await
        }
        cli::Commands::Allowed {
            token,
            action,
            resource,
            context,
            scopes,
            no_cache,
        } => {
            let permission = Permission {
                resource,
                action,
                context: context.into_iter().collect::<BTreeMap<_, _>>(),
            };
            run_allowed(&cfg, sink, &token, &permission, &scopes, no_cache).await
        }
    };

    if args.print_metrics {
        if let Some(text) = metrics_report(cfg.statsd, &registry) {
            print!("{}", text);
        }
    }

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

/// Counters only live in the registry when the Prometheus sink is in use.
fn metrics_report(statsd: bool, registry: &Registry) -> Option<String> {
    if statsd {
        tracing::warn!("--print-metrics is ignored: counters are sent to DogStatsD");
        return None;
    }
    Some(prom::encode(registry))
}

/// Redis-backed two-tier cache when REDIS_URL is set, in-memory otherwise.
async fn open_store(cfg: &Config) -> Arc<dyn CacheStore> {
    if let Some(url) = &cfg.redis_url {
        tracing::info!("Connecting to Redis...");
        match RedisStore::connect(url, cfg.cache_ttl_secs).await {
            Ok(redis) => return Arc::new(TieredCache::new(redis)),
            Err(e) => tracing::warn!("Redis unavailable, using in-memory cache only: {}", e),
        }
    }
    Arc::new(MemoryStore::new(cfg.cache_ttl()))
}

async fn run_introspect(
    cfg: &Config,
    sink: Arc<dyn CounterSink>,
    token: &str,
    no_cache: bool,
) -> anyhow::Result<()> {
    let mut chain = MetricsCollection::new(config::build_chain(cfg)?, sink);
    if let Some(ns) = &cfg.metrics_namespace {
        chain = chain.with_namespace(ns);
    }

    let introspection = if no_cache {
        chain.introspect(token).await?
    } else {
        Cached::new(chain, open_store(cfg).await).introspect(token).await?
    };

    print_result(&introspection, None)
}

async fn run_allowed(
    cfg: &Config,
    sink: Arc<dyn CounterSink>,
    token: &str,
    permission: &Permission,
    scopes: &[String],
    no_cache: bool,
) -> anyhow::Result<()> {
    let mut chain = MetricsCollection::new(config::build_warden_chain(cfg)?, sink);
    if let Some(ns) = &cfg.metrics_namespace {
        chain = chain.with_namespace(ns);
    }

    let (introspection, can) = if no_cache {
        chain.allowed(token, permission, scopes).await?
    } else {
        Cached::new(chain, open_store(cfg).await)
            .allowed(token, permission, scopes)
            .await?
    };

    print_result(&introspection, Some(can))
}

fn print_result(introspection: &Introspection, allowed: Option<bool>) -> anyhow::Result<()> {
    let mut out = json!({
        "introspection": introspection,
        "valid": introspection.valid().is_ok(),
    });
    if let Err(reason) = introspection.valid() {
        out["invalid_reason"] = json!(reason.to_string());
    }
    if let Some(can) = allowed {
        out["allowed"] = json!(can);
    }
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
