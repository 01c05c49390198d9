//! Actor that owns the [`Scheduler`] and drives the worker.
//!
//! All control requests and all worker completions arrive on one mpsc
//! queue and are applied in arrival order, so the scheduler never sees two
//! transitions at once and never has more than one task in flight.

use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::SchedulerSettings;
use crate::error::{AppResult, TaskError};
use crate::scheduler::events::SchedulerEvent;
use crate::scheduler::messages::SchedulerCommand;
use crate::scheduler::state::{Dispatch, Scheduler, SchedulerSnapshot};
use crate::taskset::{TaskSetConfig, TaskSetSummary};
use crate::worker::{ControlFlags, TaskOutcome, TaskWorker, WorkerError};

/// Owns the [`Scheduler`] and the worker; see [`SchedulerActor::spawn`].
pub struct SchedulerActor {
    scheduler: Scheduler,
    worker: Arc<dyn TaskWorker>,
    flags: ControlFlags,
    events: broadcast::Sender<SchedulerEvent>,
    mailbox: mpsc::WeakSender<SchedulerCommand>,
}

impl SchedulerActor {
    /// Start the actor on the current tokio runtime.
    pub fn spawn(
        scheduler: Scheduler,
        worker: Arc<dyn TaskWorker>,
        settings: &SchedulerSettings,
    ) -> (SchedulerHandle, JoinHandle<()>) {
        let (command_tx, command_rx) = mpsc::channel(settings.command_capacity.max(1));
        let (event_tx, _) = broadcast::channel(settings.event_capacity.max(1));

        let actor = Self {
            scheduler,
            worker,
            flags: ControlFlags::new(),
            events: event_tx.clone(),
            mailbox: command_tx.downgrade(),
        };
        let join = tokio::spawn(actor.run(command_rx));

        let handle = SchedulerHandle {
            commands: command_tx,
            events: event_tx,
        };
        (handle, join)
    }

    /// Process commands until shutdown or until every handle is dropped.
    pub async fn run(mut self, mut command_rx: mpsc::Receiver<SchedulerCommand>) {
        info!("Scheduler actor started");

        while let Some(command) = command_rx.recv().await {
            match command {
                SchedulerCommand::AddTaskSet { config, response } => {
                    let _ = response.send(self.scheduler.add(config));
                }
                SchedulerCommand::RemoveTaskSet { uid, response } => {
                    let _ = response.send(self.remove(uid));
                }
                SchedulerCommand::SetTaskEnabled {
                    uid,
                    ordinal,
                    enabled,
                    response,
                } => {
                    let result = self
                        .index_of(uid)
                        .and_then(|i| self.scheduler.set_task_enabled(i, ordinal, enabled));
                    let _ = response.send(result);
                }
                SchedulerCommand::Play { response } => {
                    let next = self.scheduler.play();
                    self.launch(next);
                    let _ = response.send(());
                }
                SchedulerCommand::Pause { response } => {
                    self.scheduler.pause();
                    self.sync_flags();
                    let _ = response.send(());
                }
                SchedulerCommand::Stop { response } => {
                    self.scheduler.stop();
                    self.sync_flags();
                    let _ = response.send(());
                }
                SchedulerCommand::Snapshot { response } => {
                    let _ = response.send(self.scheduler.snapshot());
                }
                SchedulerCommand::TaskFinished { outcome } => {
                    let next = self.scheduler.on_task_complete(outcome);
                    self.launch(next);
                }
                SchedulerCommand::Shutdown { response } => {
                    info!("Shutting down scheduler actor");
                    self.flags.set_stopped(true);
                    self.publish_events();
                    let _ = response.send(());
                    break;
                }
            }
            self.publish_events();
        }

        debug!("Scheduler actor stopped");
    }

    fn index_of(&self, uid: Uuid) -> AppResult<usize> {
        self.scheduler
            .sets()
            .position(uid)
            .ok_or(TaskError::UnknownTaskSet(uid))
    }

    fn remove(&mut self, uid: Uuid) -> AppResult<TaskSetSummary> {
        let index = self.index_of(uid)?;
        let removed = self.scheduler.remove(index, |_| true)?;
        Ok(removed.summary())
    }

    fn sync_flags(&self) {
        self.flags.set_paused(self.scheduler.is_paused());
        self.flags.set_stopped(self.scheduler.is_stopped());
    }

    /// Hand `next` to the worker on its own task; the outcome comes back
    /// through the mailbox as `TaskFinished`.
    ///
    /// A worker that panics is reported as a device failure, so the set is
    /// handled by the failure policy instead of staying in flight.
    fn launch(&self, next: Option<Dispatch>) {
        self.sync_flags();
        let Some(dispatch) = next else {
            return;
        };

        let worker = Arc::clone(&self.worker);
        let flags = self.flags.clone();
        let mailbox = self.mailbox.clone();
        let job = dispatch.clone();
        let execution = tokio::spawn(async move { worker.execute(&job, &flags).await });
        tokio::spawn(async move {
            let outcome = match execution.await {
                Ok(result) => TaskOutcome::from(result),
                Err(e) => {
                    warn!(task_set = %dispatch.set_name, error = %e, "Worker task did not finish");
                    TaskOutcome::Failed(WorkerError::Device(format!("worker task failed: {e}")))
                }
            };
            match mailbox.upgrade() {
                Some(tx) => {
                    if tx.send(SchedulerCommand::TaskFinished { outcome }).await.is_err() {
                        warn!(task_set = %dispatch.set_name, "Scheduler gone before task finished");
                    }
                }
                None => {
                    warn!(task_set = %dispatch.set_name, "Scheduler gone before task finished");
                }
            }
        });
    }

    fn publish_events(&mut self) {
        for event in self.scheduler.drain_events() {
            // No subscribers is fine.
            let _ = self.events.send(event);
        }
    }
}

/// Cloneable client of the scheduler actor.
#[derive(Clone)]
pub struct SchedulerHandle {
    commands: mpsc::Sender<SchedulerCommand>,
    events: broadcast::Sender<SchedulerEvent>,
}

impl SchedulerHandle {
    /// Progress events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.events.subscribe()
    }

    async fn request<T>(
        &self,
        (command, reply): (SchedulerCommand, tokio::sync::oneshot::Receiver<T>),
    ) -> AppResult<T> {
        self.commands
            .send(command)
            .await
            .map_err(|_| TaskError::SchedulerUnavailable)?;
        reply.await.map_err(|_| TaskError::SchedulerUnavailable)
    }

    /// Expand and append a task set.
    pub async fn add(&self, config: TaskSetConfig) -> AppResult<TaskSetSummary> {
        self.request(SchedulerCommand::add_task_set(config)).await?
    }

    /// Remove a task set once `confirm` approves its summary.
    pub async fn remove<F>(&self, uid: Uuid, confirm: F) -> AppResult<TaskSetSummary>
    where
        F: FnOnce(&TaskSetSummary) -> bool,
    {
        let snapshot = self.snapshot().await?;
        let summary = snapshot
            .sets
            .iter()
            .find(|s| s.uid == uid)
            .ok_or(TaskError::UnknownTaskSet(uid))?;
        if !confirm(summary) {
            return Err(TaskError::RemovalDeclined(summary.name.clone()));
        }
        self.request(SchedulerCommand::remove_task_set(uid)).await?
    }

    /// Enable or disable one task of a set that has not started.
    pub async fn set_task_enabled(&self, uid: Uuid, ordinal: usize, enabled: bool) -> AppResult<()> {
        self.request(SchedulerCommand::set_task_enabled(uid, ordinal, enabled))
            .await?
    }

    /// Start running, or resume when paused.
    pub async fn play(&self) -> AppResult<()> {
        self.request(SchedulerCommand::play()).await
    }

    /// Same request as [`SchedulerHandle::play`].
    pub async fn resume(&self) -> AppResult<()> {
        self.play().await
    }

    /// Hold before the next task; the current one runs to its end.
    pub async fn pause(&self) -> AppResult<()> {
        self.request(SchedulerCommand::pause()).await
    }

    /// Terminate the current set after its in-flight task.
    pub async fn stop(&self) -> AppResult<()> {
        self.request(SchedulerCommand::stop()).await
    }

    /// Current state of every set.
    pub async fn snapshot(&self) -> AppResult<SchedulerSnapshot> {
        self.request(SchedulerCommand::snapshot()).await
    }

    /// Stop the actor loop.
    pub async fn shutdown(&self) -> AppResult<()> {
        self.request(SchedulerCommand::shutdown()).await
    }
}
