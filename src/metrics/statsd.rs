//! DogStatsD counter sink.
//!
//! Config env vars:
//!   DD_AGENT_HOST   = 127.0.0.1 (default)
//!   DD_AGENT_PORT   = 8125 (default)

use std::collections::BTreeMap;
use std::net::UdpSocket;

use cadence::prelude::*;
use cadence::{BufferedUdpMetricSink, QueuingMetricSink, StatsdClient};

use super::CounterSink;

const METRIC: &str = "counts";

pub struct StatsdSink {
    client: StatsdClient,
}

impl StatsdSink {
    pub fn new(client: StatsdClient) -> Self {
        Self { client }
    }

    /// Create from environment variables. Metrics are prefixed `introspector.`.
    pub fn from_env() -> anyhow::Result<Self> {
        let host = std::env::var("DD_AGENT_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = std::env::var("DD_AGENT_PORT")
            .unwrap_or_else(|_| "8125".to_string())
            .parse()
            .unwrap_or(8125);

        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.set_nonblocking(true)?;

        let udp_sink = BufferedUdpMetricSink::from(format!("{}:{}", host, port), socket)?;
        let queuing_sink = QueuingMetricSink::from(udp_sink);
        Ok(Self::new(StatsdClient::from_sink("introspector", queuing_sink)))
    }
}

impl CounterSink for StatsdSink {
    fn increment_counter(&self, labels: &BTreeMap<String, String>) {
        let mut builder = self.client.count_with_tags(METRIC, 1);
        for (k, v) in labels {
            builder = builder.with_tag(k, v);
        }
        if let Err(e) = builder.try_send() {
            tracing::debug!(error = %e, "statsd send failed");
        }
    }
}
