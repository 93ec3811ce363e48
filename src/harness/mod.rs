// ============================================================================
// Concurrency Harness
// ============================================================================
//
// Several actors hammer one employee row with read-then-write cycles at their
// own cadence until a shared stop signal fires. Version conflicts are counted;
// any other error aborts the run. Afterwards the row's version must equal its
// starting version plus the number of successful writes.
//
// ============================================================================

pub mod clock;

pub use clock::{Clock, TokioClock};

use crate::connection::Datastore;
use crate::store::{EntityStore, StoreError};
use serde::{Serialize, Serializer};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("invalid harness configuration: {0}")]
    InvalidConfig(String),

    #[error("actor {actor} aborted: {source}")]
    Actor { actor: usize, source: StoreError },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("lost update: version {initial} -> {final_version} after {writes} successful writes")]
    LostUpdate {
        initial: i64,
        final_version: i64,
        writes: u64,
    },

    #[error("actor task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("start gate closed before the run began")]
    GateClosed,
}

/// Cadence of one actor: it waits `index * offset`, then cycles every `rate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActorConfig {
    pub rate: Duration,
    pub offset: Duration,
}

impl ActorConfig {
    pub fn new(rate: Duration, offset: Duration) -> Self {
        Self { rate, offset }
    }

    /// `index * offset`, or `None` when that does not fit in a `Duration`.
    pub fn start_delay(&self, index: usize) -> Option<Duration> {
        self.offset.checked_mul(u32::try_from(index).ok()?)
    }
}

#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub actors: Vec<ActorConfig>,
    pub observation: Duration,
}

impl HarnessConfig {
    pub fn new(actors: Vec<ActorConfig>, observation: Duration) -> Self {
        Self { actors, observation }
    }

    pub fn observation(mut self, observation: Duration) -> Self {
        self.observation = observation;
        self
    }

    pub fn validate(&self) -> Result<(), HarnessError> {
        if self.actors.is_empty() {
            return Err(HarnessError::InvalidConfig("at least one actor is required".to_string()));
        }
        if let Some(index) = self.actors.iter().position(|actor| actor.rate.is_zero()) {
            return Err(HarnessError::InvalidConfig(format!("actor {} has a zero rate", index)));
        }
        for (index, actor) in self.actors.iter().enumerate() {
            if actor.start_delay(index).is_none() {
                return Err(HarnessError::InvalidConfig(format!(
                    "actor {} start delay overflows ({:?} * {})",
                    index, actor.offset, index
                )));
            }
        }
        if self.observation.is_zero() {
            return Err(HarnessError::InvalidConfig("observation window must be positive".to_string()));
        }
        Ok(())
    }
}

impl Default for HarnessConfig {
    /// Two actors, every 2s and every 1s, one second apart, watched for 10s.
    fn default() -> Self {
        Self::new(
            vec![
                ActorConfig::new(Duration::from_secs(2), Duration::from_secs(1)),
                ActorConfig::new(Duration::from_secs(1), Duration::from_secs(1)),
            ],
            Duration::from_secs(10),
        )
    }
}

fn as_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActorReport {
    pub index: usize,
    #[serde(rename = "rate_ms", serialize_with = "as_millis")]
    pub rate: Duration,
    #[serde(rename = "offset_ms", serialize_with = "as_millis")]
    pub offset: Duration,
    pub writes: u64,
    pub conflicts: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HarnessReport {
    pub employee_id: String,
    #[serde(rename = "observation_ms", serialize_with = "as_millis")]
    pub observation: Duration,
    pub actors: Vec<ActorReport>,
    pub initial_version: i64,
    pub final_version: i64,
}

impl HarnessReport {
    pub fn total_writes(&self) -> u64 {
        self.actors.iter().map(|actor| actor.writes).sum()
    }

    pub fn total_conflicts(&self) -> u64 {
        self.actors.iter().map(|actor| actor.conflicts).sum()
    }
}

pub struct Harness {
    store: EntityStore,
    datastore: Arc<dyn Datastore>,
    clock: Arc<dyn Clock>,
}

impl Harness {
    pub fn new(store: EntityStore, datastore: Arc<dyn Datastore>) -> Self {
        Self::with_clock(store, datastore, Arc::new(TokioClock))
    }

    pub fn with_clock(store: EntityStore, datastore: Arc<dyn Datastore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            datastore,
            clock,
        }
    }

    /// Runs every configured actor against `employee_id` for the observation
    /// window and checks that no successful write was lost.
    pub async fn run(&self, config: &HarnessConfig, employee_id: &str) -> Result<HarnessReport, HarnessError> {
        config.validate()?;
        let initial_version = self
            .store
            .employee_read(self.datastore.as_ref(), employee_id)
            .await?
            .version;

        let (start_tx, start_rx) = watch::channel(false);
        let (stop_tx, stop_rx) = watch::channel(false);
        let stop_tx = Arc::new(stop_tx);

        let mut actors = JoinSet::new();
        for (index, actor) in config.actors.iter().copied().enumerate() {
            let ctx = ActorContext {
                index,
                config: actor,
                employee_id: employee_id.to_string(),
                store: self.store.clone(),
                datastore: Arc::clone(&self.datastore),
                clock: Arc::clone(&self.clock),
                start: start_rx.clone(),
                stop: stop_rx.clone(),
            };
            actors.spawn(ctx.run());
        }

        let observation = config.observation;
        let clock = Arc::clone(&self.clock);
        let mut gate = start_rx;
        let stop = Arc::clone(&stop_tx);
        let timer = tokio::spawn(async move {
            if gate.wait_for(|open| *open).await.is_ok() {
                clock.sleep(observation).await;
            }
            stop.send_replace(true);
        });

        start_tx.send_replace(true);

        let mut reports = Vec::with_capacity(config.actors.len());
        let mut failure = None;
        while let Some(joined) = actors.join_next().await {
            match joined? {
                Ok(report) => reports.push(report),
                Err(err) => {
                    warn!(error = %err, "harness actor aborted");
                    stop_tx.send_replace(true);
                    if failure.is_none() {
                        failure = Some(err);
                    }
                }
            }
        }
        if let Some(err) = failure {
            timer.abort();
            return Err(err);
        }
        timer.await?;
        reports.sort_by_key(|report| report.index);

        let final_version = self
            .store
            .employee_read(self.datastore.as_ref(), employee_id)
            .await?
            .version;
        let report = HarnessReport {
            employee_id: employee_id.to_string(),
            observation,
            actors: reports,
            initial_version,
            final_version,
        };

        let writes = report.total_writes();
        if final_version != initial_version + writes as i64 {
            return Err(HarnessError::LostUpdate {
                initial: initial_version,
                final_version,
                writes,
            });
        }
        debug!(
            employee = %employee_id,
            writes,
            conflicts = report.total_conflicts(),
            final_version,
            "harness finished"
        );
        Ok(report)
    }
}

struct ActorContext {
    index: usize,
    config: ActorConfig,
    employee_id: String,
    store: EntityStore,
    datastore: Arc<dyn Datastore>,
    clock: Arc<dyn Clock>,
    start: watch::Receiver<bool>,
    stop: watch::Receiver<bool>,
}

impl ActorContext {
    async fn run(mut self) -> Result<ActorReport, HarnessError> {
        self.start
            .wait_for(|open| *open)
            .await
            .map_err(|_| HarnessError::GateClosed)?;

        let delay = self.config.start_delay(self.index).unwrap_or(Duration::MAX);
        if !delay.is_zero() && self.wait(delay).await {
            return Ok(self.report(0, 0));
        }

        let (mut writes, mut conflicts) = (0, 0);
        loop {
            if self.wait(self.config.rate).await {
                break;
            }
            match self.cycle().await {
                Ok(()) => writes += 1,
                Err(err) if err.is_version_conflict() => conflicts += 1,
                Err(source) => {
                    return Err(HarnessError::Actor {
                        actor: self.index,
                        source,
                    });
                }
            }
        }

        debug!(actor = self.index, writes, conflicts, "actor stopped");
        Ok(self.report(writes, conflicts))
    }

    /// One read followed by a write of the unchanged row at the version read.
    async fn cycle(&self) -> Result<(), StoreError> {
        let db = self.datastore.as_ref();
        let employee = self.store.employee_read(db, &self.employee_id).await?;
        self.store.employee_write(db, &employee).await?;
        Ok(())
    }

    /// Sleeps for `duration`; returns true if the stop signal fired first.
    async fn wait(&mut self, duration: Duration) -> bool {
        if *self.stop.borrow_and_update() {
            return true;
        }
        let stopped = tokio::select! {
            _ = self.clock.sleep(duration) => false,
            _ = self.stop.changed() => true,
        };
        stopped || *self.stop.borrow()
    }

    fn report(&self, writes: u64, conflicts: u64) -> ActorReport {
        ActorReport {
            index: self.index,
            rate: self.config.rate,
            offset: self.config.offset,
            writes,
            conflicts,
        }
    }
}
