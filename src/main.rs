use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use delivery_optimizer::models::{GeoPoint, RouteMetrics};
use delivery_optimizer::oracle::{DISTANCE_CACHE_FILE, TIME_CACHE_FILE};
use delivery_optimizer::utils::memo_cache::MemoCache;
use delivery_optimizer::utils::order_gen::OrderGenerator;
use delivery_optimizer::{Arbiter, Dispatcher, OptimizerConfig, TravelCostOracle};

#[derive(Parser)]
#[command(name = "delivery-optimizer")]
#[command(version = "0.1")]
#[command(about = "Simulates couriers delivering batches of pizza orders from one depot")]
struct Args {
    /// JSON configuration file; defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Orders present when the simulation starts
    #[arg(long, default_value_t = 30)]
    initial_orders: usize,

    /// Orders arriving while couriers are out
    #[arg(long, default_value_t = 30)]
    incoming_orders: usize,

    /// Delay between two incoming orders
    #[arg(long, default_value_t = 50)]
    arrival_ms: u64,

    /// Number of courier threads
    #[arg(long, default_value_t = 3)]
    couriers: usize,

    /// Seed for order generation and the genetic strategies
    #[arg(long)]
    seed: Option<u64>,

    /// Never call the routing service
    #[arg(long)]
    offline: bool,

    /// Resolve depot and order-to-order legs before dispatching
    #[arg(long)]
    prefetch: bool,

    /// Wall-clock milliseconds a courier sleeps per route minute
    #[arg(long, default_value_t = 10)]
    ms_per_minute: u64,
}

fn build_oracle(config: &OptimizerConfig, offline: bool) -> Result<TravelCostOracle> {
    if offline {
        let times = MemoCache::load(config.cache_dir.join(TIME_CACHE_FILE));
        let distances = MemoCache::load(config.cache_dir.join(DISTANCE_CACHE_FILE));
        return Ok(TravelCostOracle::new(config.depot, None, times, distances)
            .with_speed(config.nominal_speed_kmh));
    }
    TravelCostOracle::from_config(config).context("failed to set up the routing client")
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => OptimizerConfig::from_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => OptimizerConfig::default(),
    };
    if args.seed.is_some() {
        config.genetic.seed = args.seed;
    }

    let oracle = Arc::new(build_oracle(&config, args.offline)?);
    let arbiter = Arc::new(Arbiter::new(Arc::clone(&oracle), &config));
    let dispatcher = Dispatcher::new(arbiter);

    let mut generator = OrderGenerator::new(args.seed);
    let initial = generator.generate(args.initial_orders, Utc::now());

    if args.prefetch {
        let points: Vec<GeoPoint> = initial.iter().map(|order| order.location()).collect();
        let mut legs: Vec<(GeoPoint, GeoPoint)> = points.iter().map(|p| (oracle.depot(), *p)).collect();
        for from in &points {
            for to in &points {
                if from != to {
                    legs.push((*from, *to));
                }
            }
        }
        let started = std::time::Instant::now();
        let cached = oracle.prefetch(&legs);
        info!(legs = legs.len(), cached, elapsed = ?started.elapsed(), "travel times prefetched");
    }

    dispatcher.submit_all(initial);
    info!(
        pending = dispatcher.pending_len(),
        couriers = args.couriers,
        "simulation started"
    );

    let feed_done = AtomicBool::new(false);
    let batches = AtomicUsize::new(0);
    let grade_sum = AtomicUsize::new(0);

    thread::scope(|scope| {
        scope.spawn(|| {
            for _ in 0..args.incoming_orders {
                thread::sleep(Duration::from_millis(args.arrival_ms));
                dispatcher.submit(generator.next_order(Utc::now()));
            }
            feed_done.store(true, Ordering::SeqCst);
        });

        for courier in 0..args.couriers {
            let (dispatcher, oracle) = (&dispatcher, &oracle);
            let (feed_done, batches, grade_sum) = (&feed_done, &batches, &grade_sum);
            let ms_per_minute = args.ms_per_minute;

            scope.spawn(move || loop {
                let draining = feed_done.load(Ordering::SeqCst);
                if draining && dispatcher.pending_len() == 0 {
                    break;
                }

                match dispatcher.next_batch(Utc::now(), draining) {
                    Ok(Some((batch, grade))) => {
                        let minutes = RouteMetrics::new(oracle).total_time(&batch);
                        let ids: Vec<_> = batch.iter().map(|order| order.id()).collect();
                        info!(courier, ?ids, grade, minutes, "courier leaving the depot");

                        batches.fetch_add(1, Ordering::SeqCst);
                        grade_sum.fetch_add(grade.max(0) as usize, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis((minutes * ms_per_minute as f64) as u64));
                    }
                    Ok(None) => thread::sleep(Duration::from_millis(20)),
                    Err(e) => {
                        warn!(courier, error = %e, "no batch this round");
                        thread::sleep(Duration::from_millis(20));
                    }
                }
            });
        }
    });

    let delivered = batches.load(Ordering::SeqCst);
    let mean_grade = if delivered == 0 {
        0.0
    } else {
        grade_sum.load(Ordering::SeqCst) as f64 / delivered as f64
    };
    let (times, distances) = oracle.cached_entries();
    info!(
        batches = delivered,
        mean_grade,
        cached_times = times,
        cached_distances = distances,
        "simulation finished"
    );

    Ok(())
}
