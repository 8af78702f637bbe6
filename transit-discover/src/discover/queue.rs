//! Bounded-concurrency work queue.
//!
//! Tasks wait in a deque and are spawned onto the runtime when a slot frees
//! up. Front insertions run before anything appended at the back. Each
//! running task has its own timeout and keeps making progress while the
//! owner of the queue is busy elsewhere.

use std::collections::VecDeque;
use std::future::Future;
use std::time::Duration;

use tokio::task::JoinSet;

/// How a dispatched task ended.
#[derive(Debug)]
pub enum Finished<T, O> {
    /// The task's future resolved.
    Completed(O),
    /// The task exceeded its timeout and was dropped.
    TimedOut(T),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Running,
    Draining,
}

/// Work queue with a cap on in-flight tasks.
pub struct WorkQueue<T, O> {
    pending: VecDeque<T>,
    in_flight: JoinSet<Finished<T, O>>,
    concurrency: usize,
    timeout: Duration,
    state: State,
}

impl<T, O> WorkQueue<T, O>
where
    T: Clone + Send + 'static,
    O: Send + 'static,
{
    pub fn new(concurrency: usize, timeout: Duration) -> Self {
        Self {
            pending: VecDeque::new(),
            in_flight: JoinSet::new(),
            concurrency: concurrency.max(1),
            timeout,
            state: State::Idle,
        }
    }

    /// Append a task at the back. Ignored while draining.
    pub fn push(&mut self, task: T) -> bool {
        if self.state == State::Draining {
            return false;
        }
        self.pending.push_back(task);
        true
    }

    /// Insert a task at the front. Ignored while draining.
    pub fn push_front(&mut self, task: T) -> bool {
        if self.state == State::Draining {
            return false;
        }
        self.pending.push_front(task);
        true
    }

    /// Allow dispatching.
    pub fn start(&mut self) {
        if self.state == State::Idle {
            self.state = State::Running;
        }
    }

    /// Stop dispatching and discard waiting tasks. In-flight tasks run to
    /// completion.
    pub fn drain(&mut self) {
        self.state = State::Draining;
        self.pending.clear();
    }

    pub fn is_draining(&self) -> bool {
        self.state == State::Draining
    }

    /// Tasks waiting for a slot.
    pub fn queued(&self) -> usize {
        self.pending.len()
    }

    /// Tasks currently running.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Nothing is running and nothing more will be dispatched.
    pub fn is_done(&self) -> bool {
        self.in_flight.is_empty() && (self.pending.is_empty() || self.state != State::Running)
    }

    /// Fill free slots with waiting tasks, spawning the future `run` makes
    /// of each. Returns how many tasks were dispatched.
    ///
    /// Must be called from within a tokio runtime.
    pub fn dispatch<F, Fut>(&mut self, mut run: F) -> usize
    where
        F: FnMut(T) -> Fut,
        Fut: Future<Output = O> + Send + 'static,
    {
        if self.state != State::Running {
            return 0;
        }

        let mut dispatched = 0;
        while self.in_flight.len() < self.concurrency {
            let Some(task) = self.pending.pop_front() else {
                break;
            };
            let label = task.clone();
            let timeout = self.timeout;
            let fut = run(task);
            self.in_flight.spawn(async move {
                match tokio::time::timeout(timeout, fut).await {
                    Ok(output) => Finished::Completed(output),
                    Err(_) => Finished::TimedOut(label),
                }
            });
            dispatched += 1;
        }
        dispatched
    }

    /// Wait for the next in-flight task to end. `None` if nothing is running.
    ///
    /// A panic inside a task is resumed on the caller. Dropping the queue
    /// aborts whatever is still running.
    pub async fn next_finished(&mut self) -> Option<Finished<T, O>> {
        loop {
            match self.in_flight.join_next().await? {
                Ok(finished) => return Some(finished),
                Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
                // only happens while the set is being dropped
                Err(_) => continue,
            }
        }
    }
}
