//! Tail a chat server's event stream
//!
//! Connects with the configured credential and logs every lifecycle
//! callback and push event until Ctrl+C.
//!
//! Usage: `stream_tail [config.yaml]` (default `config/stream.yaml`, or
//! `STREAM_CONFIG_PATH`). The token comes from `STREAM_TOKEN`.

use anyhow::{Context, Result};
use chat_stream_client::bin_common::{
    parse_args, resolve_config_path, BinaryRunner, RunConfig, ShutdownManager,
};
use chat_stream_client::config::StreamConfig;
use chat_stream_client::eventsocket::{self, Callbacks, ClientEvent, StreamClient};
use chat_stream_client::logging::init_tracing;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

struct StreamTail {
    run_config: RunConfig,
    stream_config: StreamConfig,
    shutdown: ShutdownManager,
}

impl StreamTail {
    fn new(stream_config: StreamConfig) -> Self {
        Self {
            run_config: RunConfig::new("stream_tail")
                .with_stats_interval(stream_config.stats_interval_secs),
            stream_config,
            shutdown: ShutdownManager::new(),
        }
    }

    fn callbacks() -> Callbacks {
        Callbacks::new()
            .with_connecting(|| info!("Connecting..."))
            .with_first_connect(|| info!("Stream connected"))
            .with_reconnect(|| warn!("Stream reconnected; local state may be stale, refetch"))
            .with_missed_events(|| info!("Stream resumed; missed events will be replayed"))
            .with_event(|event| {
                info!(
                    "#{} {} {}",
                    event.seq,
                    event.event,
                    serde_json::to_string(&event.data).unwrap_or_default()
                )
            })
            .with_close(|failures, last_disconnect| {
                info!(
                    "Stream closed (failures: {}, last disconnect: {})",
                    failures, last_disconnect
                )
            })
            .with_error(|e| error!("Stream error: {}", e))
    }

    fn build_client(&self) -> StreamClient {
        let mut builder = eventsocket::builder()
            .server(self.stream_config.server_config())
            .reconnect_strategy(self.stream_config.reconnect_strategy())
            .handler(Self::callbacks());

        if let Some(token) = &self.stream_config.token {
            builder = builder.token(token.clone());
        } else {
            warn!("No token configured; connecting unauthenticated");
        }

        builder.build()
    }

    fn log_stats(client: &StreamClient) {
        let metrics = client.metrics();
        info!(
            "state={:?} sent={} received={} reconnects={} gaps={} dropped={}",
            metrics.session_state,
            metrics.messages_sent,
            metrics.messages_received,
            metrics.reconnect_count,
            metrics.sequence_gaps,
            metrics.dropped_frames
        );
    }
}

impl BinaryRunner for StreamTail {
    async fn run(&mut self) -> Result<()> {
        self.shutdown.spawn_signal_handler();

        let client = self.build_client();
        client.start().context("starting stream client")?;

        let stats_interval = Duration::from_secs(self.run_config.stats_interval_secs.max(1));
        let mut last_stats = Instant::now();

        while self.shutdown.is_running() {
            while let Some(event) = client.try_recv_event() {
                match event {
                    ClientEvent::SequenceGap { expected, actual } => {
                        warn!("Sequence gap: expected {}, got {}", expected, actual)
                    }
                    ClientEvent::Stopped => {
                        warn!("Stream stopped; no further reconnects");
                        self.shutdown.trigger();
                    }
                    _ => {}
                }
            }

            if last_stats.elapsed() >= stats_interval {
                Self::log_stats(&client);
                last_stats = Instant::now();
            }

            self.shutdown.interruptible_sleep(POLL_INTERVAL).await;
        }

        Self::log_stats(&client);
        client.shutdown().await.context("shutting down stream client")?;
        Ok(())
    }

    fn config(&self) -> &RunConfig {
        &self.run_config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = resolve_config_path(&parse_args());
    let config = StreamConfig::load(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    init_tracing(&config.log_level);
    info!("Using config {}", config_path.display());

    let mut app = StreamTail::new(config);
    app.execute().await
}
