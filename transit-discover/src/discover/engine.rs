//! The crawl loop.
//!
//! One engine owns all state of a crawl: the work queue, the visited sets
//! and the throughput tracker. It runs as a single tokio task. Provider
//! calls run on tasks of their own, spawned by the queue, so they keep
//! going while the engine waits for a slow consumer. Their results are
//! processed one at a time here, so checking and marking a visited set
//! never races.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, trace, warn};

use crate::domain::{Edge, Line, Stop, StopId};
use crate::provider::TransitProvider;

use super::config::DiscoverConfig;
use super::error::DiscoverError;
use super::queue::{Finished, WorkQueue};
use super::stats::{Stats, ThroughputTracker};
use super::strategy::{self, Outcome, Plan, Response};
use super::stream::{Command, Controller, Discovery, DiscoveryEvent};
use super::task::Task;
use super::visited::{EdgeSignature, JourneySignature, VisitedSets};

type EventSender = mpsc::Sender<Result<DiscoveryEvent, DiscoverError>>;
type EventReceiver = mpsc::Receiver<Result<DiscoveryEvent, DiscoverError>>;

/// Why the loop stopped early.
enum Halt {
    Fatal(DiscoverError),
    /// The consumer dropped the stream.
    Closed,
}

/// What woke the loop up.
enum Step {
    Command(Option<Command>),
    Finished(Option<Finished<Task, Outcome>>),
}

/// Entry point: crawls the network of one provider.
///
/// # Examples
///
/// ```no_run
/// use transit_discover::discover::{DiscoverConfig, Discoverer, DiscoveryEvent};
/// use transit_discover::domain::StopId;
/// use transit_discover::provider::{Profile, RestClient, RestClientConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let profile = Profile::new("Europe/Berlin", "de-DE")?;
/// let client = RestClient::new(RestClientConfig::new(profile))?;
///
/// let discoverer = Discoverer::new(client);
/// let mut crawl = discoverer.discover(StopId::parse("900000007102")?, DiscoverConfig::default())?;
///
/// while let Some(event) = crawl.next_event().await {
///     if let DiscoveryEvent::Stop(stop) = event? {
///         println!("{}", stop.id);
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub struct Discoverer<P> {
    provider: Arc<P>,
}

impl<P> Clone for Discoverer<P> {
    fn clone(&self) -> Self {
        Self {
            provider: self.provider.clone(),
        }
    }
}

impl<P: TransitProvider> Discoverer<P> {
    pub fn new(provider: P) -> Self {
        Self::from_arc(Arc::new(provider))
    }

    /// Share a provider that is also used elsewhere.
    pub fn from_arc(provider: Arc<P>) -> Self {
        Self { provider }
    }

    /// Prepare a crawl from `first` without starting it.
    ///
    /// Fails if the configuration is invalid.
    pub fn walk(&self, first: StopId, config: DiscoverConfig) -> Result<Crawl<P>, DiscoverError> {
        config.validate()?;
        let when = config
            .when
            .unwrap_or_else(|| self.provider.profile().next_week_reference(Utc::now()));
        let mut crawl = Engine::new(self.provider.clone(), Plan { config, when });
        crawl.add_start(first);
        Ok(crawl)
    }

    /// Prepare and start a crawl from `first`.
    pub fn discover(
        &self,
        first: StopId,
        config: DiscoverConfig,
    ) -> Result<Discovery, DiscoverError> {
        Ok(self.walk(first, config)?.start())
    }
}

/// A crawl that has been set up but not started.
///
/// Stops can be pre-seeded here, e.g. to resume from state saved by an
/// earlier run.
pub struct Crawl<P> {
    engine: Engine<P>,
    events: EventReceiver,
    stats: watch::Receiver<Stats>,
    controller: Controller,
}

impl<P: TransitProvider> Crawl<P> {
    /// Treat a stop as already discovered.
    pub fn mark_visited(&mut self, id: StopId) {
        self.engine.mark_visited(id);
    }

    /// Expand from an additional stop.
    pub fn add_start(&mut self, id: StopId) {
        self.engine.seed(id);
    }

    /// Spawn the crawl onto the current tokio runtime.
    pub fn start(self) -> Discovery {
        let task = tokio::spawn(self.engine.run());
        Discovery::new(self.events, self.stats, self.controller, task)
    }
}

struct Engine<P> {
    provider: Arc<P>,
    plan: Arc<Plan>,
    queue: WorkQueue<Task, Outcome>,
    visited: VisitedSets,
    /// Stops whose departures were queued by seeding rather than discovery.
    seeded: HashSet<StopId>,
    tracker: ThroughputTracker,
    events: EventSender,
    stats: watch::Sender<Stats>,
    commands: mpsc::UnboundedReceiver<Command>,
    commands_open: bool,
}

impl<P: TransitProvider> Engine<P> {
    fn new(provider: Arc<P>, plan: Plan) -> Crawl<P> {
        let (events, events_rx) = mpsc::channel(plan.config.channel_capacity);
        let (stats, stats_rx) = watch::channel(Stats::empty());
        let (commands_tx, commands) = mpsc::unbounded_channel();

        let engine = Self {
            provider,
            queue: WorkQueue::new(plan.config.concurrency, plan.config.timeout),
            plan: Arc::new(plan),
            visited: VisitedSets::default(),
            seeded: HashSet::new(),
            tracker: ThroughputTracker::new(Instant::now()),
            events,
            stats,
            commands,
            commands_open: true,
        };

        Crawl {
            engine,
            events: events_rx,
            stats: stats_rx,
            controller: Controller::new(commands_tx),
        }
    }

    fn canonical(&self, id: &StopId) -> StopId {
        self.plan.config.canonical(id)
    }

    fn mark_visited(&mut self, id: StopId) {
        let id = self.canonical(&id);
        self.visited.stops.mark_seen(id);
    }

    /// Queue departures for a starting stop. The stop is still emitted when
    /// a response mentions it, but is not expanded a second time.
    fn seed(&mut self, id: StopId) {
        let id = self.canonical(&id);
        if self.visited.stops.seen(&id) || !self.seeded.insert(id.clone()) {
            return;
        }
        debug!(stop = %id, "seeding");
        self.queue.push(Task::Departures { stop: id, hops: 0 });
    }

    async fn run(mut self) {
        self.queue.start();
        info!(when = %self.plan.when, concurrency = self.plan.config.concurrency, "crawl started");

        match self.drive().await {
            Ok(()) => {
                self.broadcast();
                let stats = self.stats.borrow().clone();
                info!(
                    nodes = stats.nodes,
                    edges = stats.edges,
                    requests = stats.requests,
                    "crawl finished"
                );
            }
            Err(Halt::Fatal(err)) => {
                warn!(error = %err, "crawl failed");
                self.queue.drain();
                let _ = self.events.send(Err(err)).await;
            }
            Err(Halt::Closed) => {
                debug!("consumer went away, abandoning crawl");
            }
        }
    }

    async fn drive(&mut self) -> Result<(), Halt> {
        loop {
            let provider = &self.provider;
            let plan = &self.plan;
            let issued = self.tracker.requests();
            let dispatched = self
                .queue
                .dispatch(|task| {
                    trace!(kind = task.kind(), task = %task, hops = task.hops(), "dispatch");
                    strategy::run(provider.clone(), plan.clone(), issued.clone(), task)
                });
            if dispatched > 0 {
                self.broadcast();
            }

            if self.queue.is_done() {
                return Ok(());
            }

            let step = tokio::select! {
                biased;
                command = self.commands.recv(), if self.commands_open => Step::Command(command),
                finished = self.queue.next_finished() => Step::Finished(finished),
            };

            match step {
                Step::Command(Some(command)) => self.on_command(command),
                Step::Command(None) => self.commands_open = false,
                Step::Finished(Some(finished)) => self.on_finished(finished).await?,
                Step::Finished(None) => {}
            }
        }
    }

    fn on_command(&mut self, command: Command) {
        match command {
            Command::Stop => {
                info!(in_flight = self.queue.in_flight(), "stop requested");
                self.queue.drain();
                self.broadcast();
            }
            Command::MarkVisited(id) => self.mark_visited(id),
            Command::AddStart(id) => self.seed(id),
        }
    }

    async fn on_finished(&mut self, finished: Finished<Task, Outcome>) -> Result<(), Halt> {
        let outcome = match finished {
            Finished::Completed(outcome) => outcome,
            Finished::TimedOut(task) => {
                return Err(Halt::Fatal(DiscoverError::Timeout {
                    task: task.to_string(),
                    after: self.plan.config.timeout,
                }));
            }
        };

        let now = Instant::now();
        for took in &outcome.requests {
            self.tracker.record_duration(*took, now);
        }
        self.broadcast();

        match outcome.result {
            Ok(response) => self.on_response(outcome.task, response).await?,
            Err(error) if error.is_flagged() => {
                warn!(task = %outcome.task, error = %error, "provider error");
                self.emit(DiscoveryEvent::ProviderError {
                    task: outcome.task.to_string(),
                    error,
                })
                .await?;
            }
            Err(error) => {
                return Err(Halt::Fatal(DiscoverError::Provider {
                    task: outcome.task.to_string(),
                    source: error,
                }));
            }
        }

        self.broadcast();
        Ok(())
    }

    async fn on_response(&mut self, task: Task, response: Response) -> Result<(), Halt> {
        let hops = task.hops();

        match (task, response) {
            (Task::Departures { .. }, Response::Departures(departures)) => {
                for dep in departures {
                    self.on_stop(dep.stop.clone(), hops).await?;

                    if !self.visited.trips.insert(dep.trip_id.clone()) {
                        continue;
                    }
                    let departs = dep.departs_at().unwrap_or(self.plan.when);
                    let origin = self.canonical(&dep.stop.id);
                    let line_name = dep.line_name().to_string();
                    self.queue.push_front(Task::Trip {
                        trip_id: dep.trip_id,
                        line_name,
                        direction: dep.direction,
                        when: departs - self.plan.config.trip_lookback,
                        origin,
                        hops,
                    });
                }
            }

            (Task::Trip { line_name, .. }, Response::Trip(trip)) => {
                let line = trip.line.clone().or_else(|| {
                    (!line_name.is_empty()).then(|| Line::named(line_name))
                });
                let (edges, stops) = strategy::extract(trip.stopovers.as_deref(), line.as_ref());
                self.on_extracted(edges, stops, hops).await?;
            }

            (
                Task::Trip {
                    trip_id,
                    when,
                    origin,
                    ..
                },
                Response::TripFallback { cause, candidates },
            ) => {
                debug!(
                    trip_id = %trip_id,
                    cause = %cause,
                    candidates = candidates.len(),
                    "fallback locations resolved"
                );
                for candidate in &candidates {
                    self.on_stop(candidate.clone(), hops).await?;
                }
                for candidate in candidates {
                    let target = self.canonical(&candidate.id);
                    let signature = JourneySignature::new(origin.clone(), target.clone(), when);
                    if self.visited.journeys.insert(signature) {
                        self.queue.push_front(Task::Journeys {
                            origin: origin.clone(),
                            target,
                            when,
                            hops,
                        });
                    }
                }
            }

            (Task::Journeys { .. }, Response::Journeys(journeys)) => {
                for journey in &journeys {
                    for leg in journey.vehicle_legs() {
                        let (edges, stops) =
                            strategy::extract(leg.stopovers.as_deref(), leg.line.as_ref());
                        self.on_extracted(edges, stops, hops).await?;
                    }
                }
            }

            (task, response) => {
                // strategy::run answers each task with its own response kind
                warn!(task = %task, response = ?response, "mismatched response, ignoring");
            }
        }

        Ok(())
    }

    async fn on_extracted(
        &mut self,
        edges: Vec<Edge>,
        stops: Vec<Stop>,
        hops: u32,
    ) -> Result<(), Halt> {
        for edge in edges {
            self.on_edge(edge).await?;
        }
        for stop in stops {
            self.on_stop(stop, hops).await?;
        }
        Ok(())
    }

    /// Intake of a stop found by a task at `hops`. Parent stations go
    /// first, outermost first.
    async fn on_stop(&mut self, stop: Stop, hops: u32) -> Result<(), Halt> {
        let mut chain = vec![stop];
        while let Some(parent) = chain.last_mut().and_then(|s| s.station.take()) {
            chain.push(*parent);
        }

        // Emitted stops keep their parent reference
        let mut child_parent: Option<Stop> = None;
        for mut stop in chain.into_iter().rev() {
            stop.station = child_parent.take().map(Box::new);
            child_parent = Some(stop.clone());
            self.intake(stop, hops).await?;
        }
        Ok(())
    }

    async fn intake(&mut self, stop: Stop, hops: u32) -> Result<(), Halt> {
        let id = self.canonical(&stop.id);
        if !self.visited.stops.insert(id.clone()) {
            return Ok(());
        }
        self.tracker.record_node(Instant::now());

        let stop_hops = hops + 1;
        if !self.seeded.contains(&id) && (self.plan.config.should_expand)(&id, stop_hops) {
            self.queue.push(Task::Departures {
                stop: id,
                hops: stop_hops,
            });
        }

        self.emit(DiscoveryEvent::Stop(stop)).await?;
        self.broadcast();
        Ok(())
    }

    async fn on_edge(&mut self, edge: Edge) -> Result<(), Halt> {
        let signature = EdgeSignature {
            source: self.canonical(&edge.source.id),
            target: self.canonical(&edge.target.id),
            duration_ms: edge.duration_ms,
            line: edge.line.name_or_empty().to_string(),
        };
        if !self.visited.edges.insert(signature) {
            return Ok(());
        }
        self.tracker.record_edge();
        self.emit(DiscoveryEvent::Edge(edge)).await
    }

    async fn emit(&mut self, event: DiscoveryEvent) -> Result<(), Halt> {
        self.events.send(Ok(event)).await.map_err(|_| Halt::Closed)
    }

    fn broadcast(&mut self) {
        let snapshot = self.tracker.snapshot(self.queue.queued(), Instant::now());
        self.stats.send_replace(snapshot);
    }
}
