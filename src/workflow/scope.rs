use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Owns every timer of a session phase so teardown is a single call.
pub struct SessionScope {
    cancel_token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl SessionScope {
    pub fn new() -> Self {
        Self {
            cancel_token: CancellationToken::new(),
            tasks: Vec::new(),
        }
    }

    /// Run `task` until it completes or the scope is cancelled.
    pub fn spawn<F>(&mut self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let cancel_token = self.cancel_token.clone();
        self.tasks.retain(|t| !t.is_finished());
        self.tasks.push(tokio::spawn(async move {
            tokio::select! {
                _ = cancel_token.cancelled() => {}
                _ = task => {}
            }
        }));
    }

    pub fn after<F>(&mut self, delay: Duration, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.spawn(async move {
            time::sleep(delay).await;
            callback();
        });
    }

    /// Fire `callback` every `period`, first after `first`, until it returns false.
    pub fn every<F>(&mut self, first: Duration, period: Duration, mut callback: F)
    where
        F: FnMut() -> bool + Send + 'static,
    {
        self.spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + first, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if !callback() {
                    break;
                }
            }
        });
    }

    pub fn pending(&self) -> usize {
        self.tasks.iter().filter(|t| !t.is_finished()).count()
    }

    /// Stop every task and leave the scope ready for reuse.
    pub fn cancel_all(&mut self) {
        self.cancel_token.cancel();
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.cancel_token = CancellationToken::new();
    }
}

impl Default for SessionScope {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SessionScope {
    fn drop(&mut self) {
        self.cancel_token.cancel();
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}
