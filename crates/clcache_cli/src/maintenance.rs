//! The three maintenance subcommands: `clcache stats`, `clcache clean`,
//! `clcache reset`. Thin wrappers over the store/stats/config crates — no
//! cache semantics live here.

use std::path::Path;

use anyhow::Result;
use clap::Parser;
use clcache_compile::CacheHandles;
use clcache_config::Configuration;
use clcache_stats::Statistics;
use clcache_store::evict;

/// `clcache stats` takes no flags; it only prints the current counters.
#[derive(Parser, Debug)]
#[command(name = "clcache stats")]
pub struct StatsArgs {}

/// `clcache clean` evicts down to the configured (or overridden) maximum
/// cache size.
#[derive(Parser, Debug)]
#[command(name = "clcache clean")]
pub struct CleanArgs {
    /// Evict to this many bytes instead of the configured maximum.
    #[arg(long)]
    pub max_size: Option<u64>,
}

/// `clcache reset` zeroes every counter, leaving the gauges untouched.
#[derive(Parser, Debug)]
#[command(name = "clcache reset")]
pub struct ResetArgs {}

fn parse_args<T: Parser>(name: &str, argv: &[String]) -> Result<T> {
    let full = std::iter::once(name.to_string()).chain(argv.iter().cloned());
    Ok(T::try_parse_from(full)?)
}

/// Prints every counter and gauge in `cache_dir/stats.txt`.
pub fn run_stats(cache_dir: &Path, argv: &[String]) -> Result<i32> {
    let _args: StatsArgs = parse_args("clcache stats", argv)?;
    let stats = Statistics::open(cache_dir);
    let config = Configuration::open(cache_dir);

    println!("cache directory    {}", cache_dir.display());
    println!("cache size         {}", stats.cache_size());
    println!("cache entries      {}", stats.cache_entries());
    println!("max cache size     {}", config.maximum_cache_size());
    println!("cache hits         {}", stats.counter("CacheHits"));
    println!("cache misses       {}", stats.counter("CacheMisses"));
    println!("  evicted          {}", stats.counter("EvictedMisses"));
    println!("  header changed   {}", stats.counter("HeaderChangedMisses"));
    println!("  source changed   {}", stats.counter("SourceChangedMisses"));
    println!("invalid argument   {}", stats.counter("CallsWithInvalidArgument"));
    println!("no source file     {}", stats.counter("CallsWithNoSource"));
    println!("multiple sources   {}", stats.counter("CallsWithMultipleSources"));
    println!("precompiled header {}", stats.counter("CallsWithPch"));
    println!("called for linking {}", stats.counter("CallsForLinking"));
    println!("external debug info{}", stats.counter("CallsForExternalDebugInfo"));
    println!("preprocessing only {}", stats.counter("CallsForPreprocessing"));

    Ok(0)
}

/// Evicts the object and manifest stores down to the maximum cache size,
/// reconciling the `CacheSize`/`CacheEntries` gauges afterward.
pub fn run_clean(cache_dir: &Path, argv: &[String]) -> Result<i32> {
    let args: CleanArgs = parse_args("clcache clean", argv)?;
    let handles = CacheHandles::new(cache_dir);

    let max_size = match args.max_size {
        Some(bytes) => bytes,
        None => Configuration::open(cache_dir).maximum_cache_size(),
    };

    let result = evict(&handles.objects, &handles.manifests, max_size)?;
    handles.with_stats(|stats, _config| {
        stats.set_cache_size(result.cache_size);
        stats.set_cache_entries(result.cache_entries);
    })?;

    println!("evicted to {} bytes, {} entries", result.cache_size, result.cache_entries);
    Ok(0)
}

/// Zeroes every counter. Gauges are left alone — they track on-disk state,
/// not activity history.
pub fn run_reset(cache_dir: &Path, argv: &[String]) -> Result<i32> {
    let _args: ResetArgs = parse_args("clcache reset", argv)?;
    let handles = CacheHandles::new(cache_dir);
    handles.with_stats(|stats, _config| stats.reset_counters())?;
    println!("counters reset");
    Ok(0)
}
