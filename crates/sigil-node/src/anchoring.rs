//! Background anchoring of newly issued DIDs.
//!
//! Each DID gets a durable [`AnchorJob`]. The worker pins the document,
//! records a `create` operation, submits it to the ledger, writes the
//! self-verification and moves the DID to `anchored`. Every satellite record
//! is keyed by the job id, so a retried attempt never duplicates one.
//!
//! The queue is only a hint. Jobs live in the store, and the worker rescans
//! it for queued jobs on an interval, so a hand-off dropped because the queue
//! was full is picked up on the next rescan.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sigil_core::{DidEvent, DidStateMachine, DidStatus, JobEvent, JobState, OperationType};
use sigil_identity::{
    create_operation_payload, AnchorJob, AnchorOperation, Checks, DidRecord, LedgerReceipt,
    PinRecord, VerificationRecord,
};
use tokio::sync::mpsc::{self, error::TrySendError};
use uuid::Uuid;

use crate::config::AnchoringConfig;
use crate::error::{ServiceError, StoreError};
use crate::ledger::Ledger;
use crate::store::Store;

const SELF_VERIFICATION_METHOD: &str = "self-verification";

/// Cloneable sender of job ids to the worker.
#[derive(Clone)]
pub struct AnchorHandle {
    tx: mpsc::Sender<Uuid>,
}

impl AnchorHandle {
    /// Hand a persisted job to the worker without waiting for queue space.
    pub fn enqueue(&self, job_id: Uuid) -> Result<(), ServiceError> {
        self.tx.try_send(job_id).map_err(|e| match e {
            TrySendError::Full(_) => ServiceError::Storage("anchoring queue is full".into()),
            TrySendError::Closed(_) => {
                ServiceError::Storage("anchoring worker is not running".into())
            }
        })
    }

    /// Re-enqueue `job_id` after `delay` without blocking the caller.
    pub fn schedule_retry(&self, job_id: Uuid, delay: Duration) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if tx.send(job_id).await.is_err() {
                tracing::warn!(job_id = %job_id, "worker stopped before retry");
            }
        });
    }
}

/// Consumes anchoring jobs one at a time.
pub struct AnchorWorker {
    store: Arc<Store>,
    ledger: Arc<dyn Ledger>,
    config: AnchoringConfig,
    rx: mpsc::Receiver<Uuid>,
    handle: AnchorHandle,
    backlog: VecDeque<Uuid>,
}

/// Create a worker and the handle feeding it.
pub fn channel(
    store: Arc<Store>,
    ledger: Arc<dyn Ledger>,
    config: AnchoringConfig,
) -> (AnchorWorker, AnchorHandle) {
    let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
    let handle = AnchorHandle { tx };
    let worker = AnchorWorker {
        store,
        ledger,
        config,
        rx,
        handle: handle.clone(),
        backlog: VecDeque::new(),
    };
    (worker, handle)
}

#[derive(Debug, PartialEq)]
enum Outcome {
    Done,
    Closed,
    Retrying(Duration),
    Abandoned,
}

impl AnchorWorker {
    /// Return jobs left `running` by a previous process to `queued` and put
    /// every unfinished job on the backlog. Call before the API accepts
    /// requests. Returns the number of jobs recovered.
    pub fn recover(&mut self) -> Result<usize, StoreError> {
        let mut recovered = 0;
        for job in self.store.unfinished_jobs()? {
            if job.state == JobState::Running {
                self.store.update_job(job.id, |j| {
                    j.last_error = Some("interrupted by restart".into());
                    Ok(j.apply(JobEvent::Retry)?)
                })?;
            }
            if self.push_backlog(job.id) {
                recovered += 1;
            }
        }
        if recovered > 0 {
            tracing::info!(jobs = recovered, "recovered unfinished anchoring jobs");
        }
        Ok(recovered)
    }

    /// Put queued jobs that are due on the backlog. Returns how many were
    /// added.
    fn rescan(&mut self) -> Result<usize, StoreError> {
        let now = Utc::now();
        let mut added = 0;
        for job in self.store.unfinished_jobs()? {
            if job.is_due(now) && self.push_backlog(job.id) {
                added += 1;
            }
        }
        if added > 0 {
            tracing::debug!(jobs = added, "rescan found queued anchoring jobs");
        }
        Ok(added)
    }

    fn push_backlog(&mut self, job_id: Uuid) -> bool {
        if self.backlog.contains(&job_id) {
            return false;
        }
        self.backlog.push_back(job_id);
        true
    }

    /// Run until every handle is dropped.
    pub async fn run(mut self) {
        let every = Duration::from_secs(self.config.rescan_secs.max(1));
        let mut rescan = tokio::time::interval(every);
        rescan.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately.
        rescan.tick().await;

        tracing::info!(backlog = self.backlog.len(), "anchoring worker started");
        loop {
            let job_id = match self.backlog.pop_front() {
                Some(id) => id,
                None => {
                    tokio::select! {
                        received = self.rx.recv() => match received {
                            Some(id) => id,
                            None => break,
                        },
                        _ = rescan.tick() => {
                            if let Err(e) = self.rescan() {
                                tracing::error!(error = %e, "anchoring job rescan failed");
                            }
                            continue;
                        }
                    }
                }
            };
            if let Err(e) = self.process(job_id).await {
                tracing::error!(job_id = %job_id, error = %e, "anchoring job bookkeeping failed");
            }
        }
        tracing::info!("anchoring worker stopped");
    }

    /// Run one attempt of a job. Jobs not queued, or still backing off, are
    /// ignored.
    async fn process(&self, job_id: Uuid) -> Result<(), ServiceError> {
        let Some(job) = self.store.get_job(job_id)? else {
            tracing::warn!(job_id = %job_id, "anchoring job not found");
            return Ok(());
        };
        if !job.is_due(Utc::now()) {
            tracing::debug!(job_id = %job_id, state = %job.state, "skipping job");
            return Ok(());
        }

        if let Outcome::Retrying(delay) = self.attempt(job).await? {
            self.handle.schedule_retry(job_id, delay);
        }
        Ok(())
    }

    async fn attempt(&self, job: AnchorJob) -> Result<Outcome, ServiceError> {
        let job = self.store.update_job(job.id, |j| {
            j.not_before = None;
            Ok(j.apply(JobEvent::Start)?)
        })?;

        let did = match self.store.get_did(job.did_id)? {
            Some(did) if did.status == DidStatus::Pending => did,
            other => {
                tracing::info!(
                    job_id = %job.id,
                    status = ?other.map(|d| d.status),
                    "DID no longer pending; closing job"
                );
                self.store
                    .update_job(job.id, |j| Ok(j.apply(JobEvent::Complete)?))?;
                return Ok(Outcome::Closed);
            }
        };

        match self.anchor(&job, &did).await {
            Ok(receipt) => {
                self.store.update_job(job.id, |j| {
                    j.last_error = None;
                    Ok(j.apply(JobEvent::Complete)?)
                })?;
                tracing::info!(
                    did = %did.did_identifier,
                    job_id = %job.id,
                    tx = %receipt.transaction_id,
                    block_height = receipt.block_height,
                    attempts = job.attempts,
                    "DID anchored"
                );
                Ok(Outcome::Done)
            }
            Err(e) if job.attempts >= self.config.max_attempts => {
                self.abandon(&job, &did, &e)?;
                Ok(Outcome::Abandoned)
            }
            Err(e) => {
                let delay = self.backoff(job.attempts);
                let not_before = chrono::Duration::from_std(delay)
                    .ok()
                    .and_then(|d| Utc::now().checked_add_signed(d));
                self.store.update_job(job.id, |j| {
                    j.last_error = Some(e.to_string());
                    j.not_before = not_before;
                    Ok(j.apply(JobEvent::Retry)?)
                })?;
                tracing::warn!(
                    did = %did.did_identifier,
                    job_id = %job.id,
                    attempt = job.attempts,
                    retry_in_ms = delay.as_millis() as u64,
                    error = %e,
                    "anchoring attempt failed"
                );
                Ok(Outcome::Retrying(delay))
            }
        }
    }

    /// The anchoring pipeline. Safe to run again after a partial failure.
    async fn anchor(&self, job: &AnchorJob, did: &DidRecord) -> Result<LedgerReceipt, ServiceError> {
        self.store.insert_pin_once(PinRecord::pinned(
            job.id,
            did.id,
            &did.did_document,
            &self.config.ipfs_gateway,
        )?)?;

        let payload = create_operation_payload(&did.did()?, &did.did_document)?;
        let op = self.store.insert_operation_once(AnchorOperation::pending(
            job.id,
            did.id,
            OperationType::Create,
            payload,
        ))?;

        let receipt = match op.receipt().filter(|_| op.is_anchored()) {
            Some(receipt) => receipt,
            None => {
                let Some(_claim) = self.store.begin_submission(op.id) else {
                    return Err(ServiceError::Conflict(
                        "Operation submission already in progress".into(),
                    ));
                };
                // An on-demand submission may have landed since the first read.
                let op = self
                    .store
                    .get_operation(op.id)?
                    .ok_or_else(|| ServiceError::NotFound("Operation not found".into()))?;
                match op.receipt().filter(|_| op.is_anchored()) {
                    Some(receipt) => receipt,
                    None => {
                        let receipt = self.submit_with_timeout(&op.operation_data).await?;
                        let stored = self.store.update_operation(op.id, |o| {
                            if !o.is_anchored() {
                                o.mark_anchored(&receipt)?;
                            }
                            Ok(())
                        })?;
                        stored.receipt().unwrap_or(receipt)
                    }
                }
            }
        };

        self.store
            .insert_verification_once(VerificationRecord::from_checks(
                job.id,
                did.id,
                SELF_VERIFICATION_METHOD,
                Checks::anchoring_completed(),
            ))?;

        self.store.update_did(did.id, |d| {
            if d.status != DidStatus::Anchored {
                d.apply(DidEvent::Anchor)?;
            }
            Ok(())
        })?;

        Ok(receipt)
    }

    async fn submit_with_timeout(
        &self,
        payload: &serde_json::Value,
    ) -> Result<LedgerReceipt, ServiceError> {
        let limit = Duration::from_millis(self.config.ledger_timeout_ms);
        tokio::time::timeout(limit, self.ledger.submit(payload))
            .await
            .map_err(|_| {
                ServiceError::ExternalService(format!(
                    "ledger did not respond within {} ms",
                    self.config.ledger_timeout_ms
                ))
            })?
    }

    fn abandon(&self, job: &AnchorJob, did: &DidRecord, cause: &ServiceError) -> Result<(), ServiceError> {
        self.store.update_job(job.id, |j| {
            j.last_error = Some(cause.to_string());
            Ok(j.apply(JobEvent::Abandon)?)
        })?;

        if let Some(op) = self.store.get_operation(job.id)? {
            if op.status == DidStatus::Pending {
                self.store
                    .update_operation(op.id, |o| Ok(o.mark_failed()?))?;
            }
        }
        self.store.update_did(did.id, |d| {
            if d.status == DidStatus::Pending {
                d.apply(DidEvent::Fail)?;
            }
            Ok(())
        })?;

        tracing::error!(
            did = %did.did_identifier,
            job_id = %job.id,
            attempts = job.attempts,
            error = %cause,
            "anchoring abandoned; DID failed"
        );
        Ok(())
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        Duration::from_millis(self.config.base_backoff_ms.saturating_mul(1u64 << exp))
    }
}

/// Submit a stored operation to the ledger on demand.
///
/// An operation is anchored at most once: a second submission is rejected
/// and leaves the stored receipt untouched. Ledger failures change nothing.
pub async fn submit_operation(
    store: &Store,
    ledger: &dyn Ledger,
    operation_id: &str,
) -> Result<LedgerReceipt, ServiceError> {
    let operation_id = operation_id.trim();
    if operation_id.is_empty() {
        return Err(ServiceError::Validation("Operation ID is required".into()));
    }
    let op_id = Uuid::parse_str(operation_id)
        .map_err(|_| ServiceError::Validation(format!("Invalid operation ID: {}", operation_id)))?;

    if store.get_operation(op_id)?.is_none() {
        return Err(ServiceError::NotFound("Operation not found".into()));
    }
    let Some(_claim) = store.begin_submission(op_id) else {
        return Err(ServiceError::Conflict(
            "Operation submission already in progress".into(),
        ));
    };
    let op = store
        .get_operation(op_id)?
        .ok_or_else(|| ServiceError::NotFound("Operation not found".into()))?;
    if op.is_anchored() {
        return Err(ServiceError::Conflict("Operation already anchored".into()));
    }

    let did = store
        .get_did(op.did_id)?
        .ok_or_else(|| ServiceError::NotFound("DID not found".into()))?;
    if !DidStateMachine::can_transition(did.status, DidEvent::Anchor) {
        return Err(ServiceError::InvalidState(format!(
            "DID {} is {} and cannot be anchored",
            did.did_identifier, did.status
        )));
    }

    let receipt = ledger.submit(&op.operation_data).await?;
    store.anchor_operation(op.id, &receipt)?;

    tracing::info!(
        operation = %op.id,
        did = %did.did_identifier,
        tx = %receipt.transaction_id,
        "operation submitted"
    );
    Ok(receipt)
}
