//! Consumer-facing side of a crawl.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::domain::{Edge, Stop, StopId};
use crate::provider::ProviderError;

use super::error::DiscoverError;
use super::stats::Stats;

/// Something the crawl found out.
#[derive(Debug)]
pub enum DiscoveryEvent {
    /// A stop or station seen for the first time.
    Stop(Stop),
    /// An edge seen for the first time.
    Edge(Edge),
    /// A provider-flagged failure. The task that hit it is abandoned; the
    /// crawl goes on.
    ProviderError { task: String, error: ProviderError },
}

/// Control messages from consumers to the running crawl.
#[derive(Debug)]
pub(crate) enum Command {
    Stop,
    MarkVisited(StopId),
    AddStart(StopId),
}

/// Cloneable handle for steering a running crawl.
#[derive(Debug, Clone)]
pub struct Controller {
    commands: mpsc::UnboundedSender<Command>,
}

impl Controller {
    pub(crate) fn new(commands: mpsc::UnboundedSender<Command>) -> Self {
        Self { commands }
    }

    /// Stop dispatching new queries. Queries in flight finish and their
    /// results are still emitted; then the stream ends without error.
    pub fn stop(&self) {
        // A closed channel means the crawl has already ended
        let _ = self.commands.send(Command::Stop);
    }

    /// Treat a stop as already discovered: it will not be emitted or
    /// expanded.
    pub fn mark_visited(&self, id: StopId) {
        let _ = self.commands.send(Command::MarkVisited(id));
    }

    /// Start expanding from an additional stop.
    pub fn add_start(&self, id: StopId) {
        let _ = self.commands.send(Command::AddStart(id));
    }
}

/// A running crawl.
///
/// Yields discovered stops, edges and flagged provider errors in the order
/// they happen. The stream ends after the queue drains, after [`stop`], or
/// right after yielding a fatal [`DiscoverError`]. The event channel is
/// bounded: a consumer that falls behind pauses the crawl.
///
/// Dropping the handle aborts the crawl.
///
/// [`stop`]: Discovery::stop
pub struct Discovery {
    events: mpsc::Receiver<Result<DiscoveryEvent, DiscoverError>>,
    stats: watch::Receiver<Stats>,
    controller: Controller,
    task: JoinHandle<()>,
}

impl Discovery {
    pub(crate) fn new(
        events: mpsc::Receiver<Result<DiscoveryEvent, DiscoverError>>,
        stats: watch::Receiver<Stats>,
        controller: Controller,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            events,
            stats,
            controller,
            task,
        }
    }

    /// Wait for the next event. `None` once the crawl has ended.
    pub async fn next_event(&mut self) -> Option<Result<DiscoveryEvent, DiscoverError>> {
        self.events.recv().await
    }

    /// Latest statistics; updated whenever a query resolves or something
    /// new is discovered.
    pub fn stats(&self) -> watch::Receiver<Stats> {
        self.stats.clone()
    }

    /// Handle for stopping or seeding the crawl from elsewhere.
    pub fn controller(&self) -> Controller {
        self.controller.clone()
    }

    /// See [`Controller::stop`].
    pub fn stop(&self) {
        self.controller.stop();
    }

    /// Drain the stream, keeping only stops. Fails on the first fatal error.
    pub async fn collect_stops(mut self) -> Result<Vec<Stop>, DiscoverError> {
        let mut stops = Vec::new();
        while let Some(event) = self.next_event().await {
            if let DiscoveryEvent::Stop(stop) = event? {
                stops.push(stop);
            }
        }
        Ok(stops)
    }
}

impl Stream for Discovery {
    type Item = Result<DiscoveryEvent, DiscoverError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().events.poll_recv(cx)
    }
}

impl Drop for Discovery {
    fn drop(&mut self) {
        self.task.abort();
    }
}
