use std::{future::Future, sync::Arc};

use anyhow::anyhow;
use futures::future::{BoxFuture, FutureExt, join_all};

use crate::{debug, error};

/// Well-known stages, started in ascending order and stopped in descending
/// order.
pub mod stage {
    pub const FIRST: i32 = i32::MIN;
    pub const RUNTIME_INITIALIZE: i32 = 2000;
    pub const RUNTIME_SERVICES: i32 = 4000;
    pub const RUNTIME_STORAGE_SERVICES: i32 = 6000;
    pub const APPLICATION_SERVICES: i32 = 10000;
    pub const BECOME_ACTIVE: i32 = ACTIVE - 1;
    pub const ACTIVE: i32 = 20000;
    pub const LAST: i32 = i32::MAX;
}

pub type Hook = Box<dyn Fn() -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Something that hooks its own start and stop into a [`ServiceLifecycle`].
pub trait LifecycleParticipant {
    fn participate(self: &Arc<Self>, lifecycle: &mut ServiceLifecycle);
}

/// Ordered start/stop of subscribed observers.
///
/// Observers of one stage start concurrently; the next stage only begins
/// once every observer of the current one succeeded. Only observers that
/// started are stopped.
#[derive(Default)]
pub struct ServiceLifecycle {
    observers: Vec<Observer>,
    started: Vec<usize>,
}

struct Observer {
    stage: i32,
    name: String,
    on_start: Hook,
    on_stop: Hook,
}

// Implementations

impl ServiceLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<Start, StartFut, Stop, StopFut>(
        &mut self,
        stage: i32,
        name: impl Into<String>,
        on_start: Start,
        on_stop: Stop,
    ) where
        Start: Fn() -> StartFut + Send + Sync + 'static,
        StartFut: Future<Output = anyhow::Result<()>> + Send + 'static,
        Stop: Fn() -> StopFut + Send + Sync + 'static,
        StopFut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.observers.push(Observer {
            stage,
            name: name.into(),
            on_start: Box::new(move || on_start().boxed()),
            on_stop: Box::new(move || on_stop().boxed()),
        });
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    pub fn is_started(&self) -> bool {
        !self.started.is_empty()
    }

    /// Run start hooks stage by stage. Stops at the first stage with a
    /// failing observer and returns that failure; observers that did start
    /// stay recorded for [`stop`](Self::stop). Observers already started are
    /// skipped.
    pub async fn start(&mut self) -> anyhow::Result<()> {
        for stage in self.stages() {
            let indices = self.indices_at(stage);
            debug!("starting lifecycle stage {stage} ({} observers)", indices.len());

            let results = join_all(indices.iter().map(|&i| (self.observers[i].on_start)())).await;

            let mut failure = None;
            for (i, result) in indices.into_iter().zip(results) {
                match result {
                    Ok(()) => self.started.push(i),
                    Err(e) => {
                        let observer = &self.observers[i];
                        error!("{} failed to start at stage {stage}: {e:#}", observer.name);
                        failure.get_or_insert_with(|| {
                            anyhow!("{} failed to start at stage {stage}: {e:#}", observer.name)
                        });
                    }
                }
            }

            if let Some(e) = failure {
                return Err(e);
            }
        }

        Ok(())
    }

    /// Run stop hooks of started observers, highest stage first. Failures
    /// are logged and do not prevent the remaining observers from stopping.
    pub async fn stop(&mut self) {
        let mut started = std::mem::take(&mut self.started);
        started.sort_by_key(|&i| std::cmp::Reverse(self.observers[i].stage));

        for group in started.chunk_by(|&a, &b| self.observers[a].stage == self.observers[b].stage) {
            let results = join_all(group.iter().map(|&i| (self.observers[i].on_stop)())).await;

            for (&_i, result) in group.iter().zip(results) {
                if let Err(_e) = result {
                    error!("{} failed to stop: {_e:#}", self.observers[_i].name);
                }
            }
        }
    }

    fn stages(&self) -> Vec<i32> {
        let mut stages: Vec<_> = self.observers.iter().map(|o| o.stage).collect();
        stages.sort_unstable();
        stages.dedup();
        stages
    }

    fn indices_at(&self, stage: i32) -> Vec<usize> {
        self.observers
            .iter()
            .enumerate()
            .filter(|(i, o)| o.stage == stage && !self.started.contains(i))
            .map(|(i, _)| i)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    type Journal = Arc<Mutex<Vec<String>>>;

    fn record(lifecycle: &mut ServiceLifecycle, journal: &Journal, stage: i32, name: &'static str, fail: bool) {
        let on_start = {
            let journal = journal.clone();
            move || {
                let journal = journal.clone();
                async move {
                    journal.lock().unwrap().push(format!("start {name}"));
                    if fail {
                        anyhow::bail!("{name} refused");
                    }
                    Ok(())
                }
            }
        };
        let on_stop = {
            let journal = journal.clone();
            move || {
                let journal = journal.clone();
                async move {
                    journal.lock().unwrap().push(format!("stop {name}"));
                    Ok(())
                }
            }
        };

        lifecycle.subscribe(stage, name, on_start, on_stop);
    }

    #[tokio::test]
    async fn test_start_ascending_stop_descending() {
        let journal = Journal::default();
        let mut lifecycle = ServiceLifecycle::new();

        record(&mut lifecycle, &journal, stage::ACTIVE, "active", false);
        record(&mut lifecycle, &journal, stage::RUNTIME_INITIALIZE, "runtime", false);
        record(&mut lifecycle, &journal, stage::APPLICATION_SERVICES, "storage", false);

        lifecycle.start().await.unwrap();
        assert!(lifecycle.is_started());
        lifecycle.stop().await;
        assert!(!lifecycle.is_started());

        assert_eq!(
            *journal.lock().unwrap(),
            vec![
                "start runtime",
                "start storage",
                "start active",
                "stop active",
                "stop storage",
                "stop runtime",
            ]
        );
    }

    #[tokio::test]
    async fn test_repeated_start_stops_each_observer_once() {
        let journal = Journal::default();
        let mut lifecycle = ServiceLifecycle::new();

        record(&mut lifecycle, &journal, stage::RUNTIME_INITIALIZE, "runtime", false);
        record(&mut lifecycle, &journal, stage::APPLICATION_SERVICES, "storage", false);

        lifecycle.start().await.unwrap();
        lifecycle.start().await.unwrap();
        lifecycle.stop().await;

        assert_eq!(
            *journal.lock().unwrap(),
            vec!["start runtime", "start storage", "stop storage", "stop runtime"]
        );
    }

    #[tokio::test]
    async fn test_failed_stage_aborts_start() {
        let journal = Journal::default();
        let mut lifecycle = ServiceLifecycle::new();

        record(&mut lifecycle, &journal, stage::RUNTIME_INITIALIZE, "runtime", false);
        record(&mut lifecycle, &journal, stage::APPLICATION_SERVICES, "storage", true);
        record(&mut lifecycle, &journal, stage::ACTIVE, "active", false);

        let err = lifecycle.start().await.unwrap_err();
        assert!(err.to_string().contains("storage failed to start"));

        lifecycle.stop().await;

        assert_eq!(
            *journal.lock().unwrap(),
            vec!["start runtime", "start storage", "stop runtime"]
        );
    }
}
