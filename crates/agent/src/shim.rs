//! Execd shim loop
//!
//! Runs the configured collectors on a fixed interval (or once per line
//! read from stdin when polling is disabled) and writes every record to the
//! output as line protocol. Cycles never overlap. The loop ends when stdin
//! closes or a shutdown signal arrives.

use anyhow::{Context, Result};
use hcloud_lib::accumulator::write_metrics;
use hcloud_lib::{
    AgentMetrics, BufferedAccumulator, Collector, GatherReport, HealthRegistry, StructuredLogger,
};
use std::io::Write;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::broadcast;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::debug;

/// When gather cycles run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// One cycle per interval, starting immediately
    Interval(Duration),
    /// One cycle per line received on stdin
    OnDemand,
}

impl Schedule {
    pub fn interval(&self) -> Option<Duration> {
        match self {
            Schedule::Interval(d) => Some(*d),
            Schedule::OnDemand => None,
        }
    }
}

/// Why the loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    StdinClosed,
    Shutdown,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::StdinClosed => "stdin closed",
            StopReason::Shutdown => "shutdown signal received",
        }
    }
}

/// Drives collectors and writes their output
pub struct Shim<W> {
    collectors: Vec<Collector>,
    output: W,
    metrics: AgentMetrics,
    health: HealthRegistry,
    logger: StructuredLogger,
}

impl<W: Write + Send> Shim<W> {
    pub fn new(
        collectors: Vec<Collector>,
        output: W,
        metrics: AgentMetrics,
        health: HealthRegistry,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            collectors,
            output,
            metrics,
            health,
            logger,
        }
    }

    /// Run until stdin closes or `shutdown` fires
    pub async fn run<R>(
        &mut self,
        schedule: Schedule,
        stdin: R,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<StopReason>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = stdin.lines();

        match schedule {
            Schedule::Interval(period) => {
                let mut ticker = interval(period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            self.gather_once().await?;
                        }
                        line = lines.next_line() => {
                            if !matches!(line, Ok(Some(_))) {
                                return Ok(StopReason::StdinClosed);
                            }
                        }
                        _ = shutdown.recv() => {
                            return Ok(StopReason::Shutdown);
                        }
                    }
                }
            }
            Schedule::OnDemand => loop {
                tokio::select! {
                    line = lines.next_line() => {
                        match line {
                            Ok(Some(_)) => { self.gather_once().await?; }
                            _ => return Ok(StopReason::StdinClosed),
                        }
                    }
                    _ = shutdown.recv() => {
                        return Ok(StopReason::Shutdown);
                    }
                }
            },
        }
    }

    /// Run every collector once, in order, and flush their records
    pub async fn gather_once(&mut self) -> Result<GatherReport> {
        let mut report = GatherReport::default();

        for (index, collector) in self.collectors.iter().enumerate() {
            let started = Instant::now();
            let mut acc = BufferedAccumulator::new();
            let summary = collector.gather(&mut acc).await;
            let elapsed = started.elapsed();

            let (records, errors) = acc.drain();
            for error in &errors {
                self.logger.log_gather_error(index, error);
            }

            if let Err(e) = write_metrics(&mut self.output, &records) {
                self.health.record_output_failure(e.to_string()).await;
                return Err(e).context("Failed to write line protocol to output");
            }

            self.metrics.observe_gather(&summary, elapsed);
            self.logger.log_gather(index, &summary, elapsed);
            report.add(&summary, &errors);
        }

        let report = report.finish();
        self.health.record_gather(report.clone()).await;
        debug!(
            collectors = report.collectors,
            records = report.records,
            errors = report.errors,
            "Gather round complete"
        );

        Ok(report)
    }

    pub fn output(&self) -> &W {
        &self.output
    }
}
