//! Standardised `tracing` initialisation for the Keel engine (human-readable
//! and JSON variants, both `RUST_LOG`-filterable) with one addition: a span
//! filter that silences
//! the per-tick `instance_tick` span (see [`crate::instance`]) when it has
//! been downgraded to `TRACE`, so a default `RUST_LOG=debug` run doesn't
//! drown in one line per candle during a backtest sweep.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// The span name [`crate::instance::Instance::tick_once`] opens around a
/// single tick. Exposed so [`TickSpanFilter`] and callers configuring
/// `RUST_LOG` agree on the name.
pub const INSTANCE_TICK_SPAN_NAME: &str = "instance_tick";

/// Human-readable logging to stdout, `RUST_LOG`-filterable, `INFO` by
/// default.
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::filter::EnvFilter::builder()
                .with_default_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(TickSpanFilter)
        .init()
}

/// JSON logging, for log aggregators. Same filtering as [`init_logging`].
pub fn init_json_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::filter::EnvFilter::builder()
                .with_default_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with(tracing_subscriber::fmt::layer().json().flatten_event(true))
        .with(TickSpanFilter)
        .init()
}

struct TickSpanFilter;

impl<S> tracing_subscriber::layer::Layer<S> for TickSpanFilter
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fn event_enabled(&self, event: &tracing::Event<'_>, ctx: tracing_subscriber::layer::Context<'_, S>) -> bool {
        if *event.metadata().level() != tracing::Level::TRACE {
            return true;
        }
        ctx.lookup_current()
            .map(|span| span.name() != INSTANCE_TICK_SPAN_NAME)
            .unwrap_or(true)
    }
}
