//! Typed identity store.
//!
//! Records are JSON documents keyed by id. Uniqueness rules (one DID per
//! owner, unique DID identifiers, one open issuer application per applicant,
//! unique profile emails) are enforced here through index entries written in
//! the same batch as the record, under a single writer lock.

use std::sync::{Arc, Mutex, MutexGuard};

use dashmap::DashSet;
use serde::{de::DeserializeOwned, Serialize};
use sigil_core::{ApplicationStatus, CredentialStatus, DidEvent, JobState, Role};
use sigil_credentials::{IssuerApplication, Profile, ReviewDecision, StoredCredential};
use sigil_identity::{
    AnchorJob, AnchorOperation, DidRecord, LedgerReceipt, PinRecord, VerificationRecord,
};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::config::{StorageBackend, StorageConfig};
use crate::error::StoreError;
use crate::storage::{Backend, BatchOp, MemoryBackend, RocksBackend, Table};

const IDX_DID_OWNER: &str = "did_owner";
const IDX_DID_IDENTIFIER: &str = "did_identifier";
const IDX_APPLICATION_OPEN: &str = "application_open";
const IDX_PROFILE_EMAIL: &str = "profile_email";

const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// Kind of write carried by a [`ChangeEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

/// Notification emitted for every committed record write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeEvent {
    pub table: Table,
    pub op: ChangeOp,
    pub id: String,
}

impl ChangeEvent {
    fn new(table: Table, op: ChangeOp, id: impl Into<String>) -> Self {
        Self {
            table,
            op,
            id: id.into(),
        }
    }
}

/// A record stored under its own id.
pub trait Keyed: Serialize + DeserializeOwned {
    const TABLE: Table;
    fn key(&self) -> String;
}

macro_rules! keyed {
    ($ty:ty, $table:expr) => {
        impl Keyed for $ty {
            const TABLE: Table = $table;
            fn key(&self) -> String {
                self.id.to_string()
            }
        }
    };
}

keyed!(Profile, Table::Profiles);
keyed!(DidRecord, Table::Dids);
keyed!(AnchorOperation, Table::Operations);
keyed!(PinRecord, Table::Pins);
keyed!(VerificationRecord, Table::Verifications);
keyed!(IssuerApplication, Table::Applications);
keyed!(StoredCredential, Table::Credentials);
keyed!(AnchorJob, Table::Jobs);

fn index_key(kind: &str, value: &str) -> String {
    format!("{}:{}", kind, value)
}

fn put_index(kind: &str, value: &str, target: &str) -> BatchOp {
    BatchOp::Put {
        table: Table::Indexes,
        key: index_key(kind, value),
        value: target.as_bytes().to_vec(),
    }
}

fn delete_index(kind: &str, value: &str) -> BatchOp {
    BatchOp::Delete {
        table: Table::Indexes,
        key: index_key(kind, value),
    }
}

fn put_record<T: Keyed>(record: &T) -> Result<BatchOp, StoreError> {
    Ok(BatchOp::Put {
        table: T::TABLE,
        key: record.key(),
        value: serde_json::to_vec(record)?,
    })
}

fn delete_record<T: Keyed>(record: &T) -> BatchOp {
    BatchOp::Delete {
        table: T::TABLE,
        key: record.key(),
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Typed access to every table of the node.
pub struct Store {
    backend: Arc<dyn Backend>,
    write_lock: Mutex<()>,
    changes: broadcast::Sender<ChangeEvent>,
    /// Operations currently out at the ledger.
    submitting: DashSet<Uuid>,
}

/// Exclusive claim on submitting one operation to the ledger. Released on
/// drop.
pub struct SubmissionGuard<'a> {
    store: &'a Store,
    op_id: Uuid,
}

impl Drop for SubmissionGuard<'_> {
    fn drop(&mut self) {
        self.store.submitting.remove(&self.op_id);
    }
}

impl Store {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            backend,
            write_lock: Mutex::new(()),
            changes,
            submitting: DashSet::new(),
        }
    }

    /// Store over a fresh in-memory backend.
    pub fn memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    /// Open the backend selected in config.
    pub fn open(config: &StorageConfig) -> Result<Self, StoreError> {
        let backend: Arc<dyn Backend> = match config.backend {
            StorageBackend::Memory => Arc::new(MemoryBackend::new()),
            StorageBackend::Rocksdb => Arc::new(RocksBackend::open(&config.data_dir)?),
        };
        Ok(Self::new(backend))
    }

    /// Subscribe to change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }

    // --- plumbing ---

    fn writer(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn read<T: Keyed>(&self, key: &str) -> Result<Option<T>, StoreError> {
        match self.backend.get(T::TABLE, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn require<T: Keyed>(&self, key: &str) -> Result<T, StoreError> {
        self.read(key)?
            .ok_or_else(|| StoreError::NotFound(format!("{} {}", T::TABLE, key)))
    }

    fn read_all<T: Keyed>(&self) -> Result<Vec<T>, StoreError> {
        self.backend
            .scan(T::TABLE)?
            .into_iter()
            .map(|(_, bytes)| serde_json::from_slice(&bytes).map_err(StoreError::from))
            .collect()
    }

    fn read_index(&self, kind: &str, value: &str) -> Result<Option<String>, StoreError> {
        match self.backend.get(Table::Indexes, &index_key(kind, value))? {
            Some(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|e| StoreError::Backend(format!("corrupt index {}: {}", kind, e))),
            None => Ok(None),
        }
    }

    fn commit(&self, batch: Vec<BatchOp>, events: Vec<ChangeEvent>) -> Result<(), StoreError> {
        self.backend.write(batch)?;
        for event in events {
            // No subscribers is fine.
            let _ = self.changes.send(event);
        }
        Ok(())
    }

    fn insert<T: Keyed>(&self, record: &T) -> Result<(), StoreError> {
        let _guard = self.writer();
        self.commit(
            vec![put_record(record)?],
            vec![ChangeEvent::new(T::TABLE, ChangeOp::Insert, record.key())],
        )
    }

    /// Insert unless a record with the same id exists; returns the stored record.
    fn insert_once<T: Keyed>(&self, record: T) -> Result<T, StoreError> {
        let _guard = self.writer();
        if let Some(existing) = self.read::<T>(&record.key())? {
            return Ok(existing);
        }
        self.commit(
            vec![put_record(&record)?],
            vec![ChangeEvent::new(T::TABLE, ChangeOp::Insert, record.key())],
        )?;
        Ok(record)
    }

    /// Read-modify-write of one record under the writer lock.
    fn modify<T: Keyed>(
        &self,
        key: &str,
        f: impl FnOnce(&mut T) -> Result<(), StoreError>,
    ) -> Result<T, StoreError> {
        let _guard = self.writer();
        let mut record: T = self.require(key)?;
        f(&mut record)?;
        self.commit(
            vec![put_record(&record)?],
            vec![ChangeEvent::new(T::TABLE, ChangeOp::Update, key)],
        )?;
        Ok(record)
    }

    // --- profiles ---

    pub fn get_profile(&self, id: &str) -> Result<Option<Profile>, StoreError> {
        self.read(id)
    }

    /// Load the profile, creating it with `role` on first sign-in.
    pub fn ensure_profile(
        &self,
        id: &str,
        email: Option<&str>,
        role: Role,
    ) -> Result<Profile, StoreError> {
        if let Some(profile) = self.read::<Profile>(id)? {
            return Ok(profile);
        }

        let _guard = self.writer();
        if let Some(profile) = self.read::<Profile>(id)? {
            return Ok(profile);
        }

        let profile = Profile::first_sign_in(id, email.map(str::to_string), role);
        let mut batch = vec![put_record(&profile)?];
        if let Some(email) = profile.email.as_deref() {
            if self.read_index(IDX_PROFILE_EMAIL, email)?.is_some() {
                return Err(StoreError::Conflict(
                    "Email already belongs to another profile".into(),
                ));
            }
            batch.push(put_index(IDX_PROFILE_EMAIL, email, &profile.id));
        }
        self.commit(
            batch,
            vec![ChangeEvent::new(Table::Profiles, ChangeOp::Insert, &profile.id)],
        )?;

        tracing::info!(profile = %profile.id, role = %profile.role, "profile created");
        Ok(profile)
    }

    pub fn find_profile_by_email(&self, email: &str) -> Result<Option<Profile>, StoreError> {
        match self.read_index(IDX_PROFILE_EMAIL, &normalize_email(email))? {
            Some(id) => self.read(&id),
            None => Ok(None),
        }
    }

    pub fn list_profiles(&self) -> Result<Vec<Profile>, StoreError> {
        let mut profiles: Vec<Profile> = self.read_all()?;
        profiles.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(profiles)
    }

    pub fn set_role(&self, profile_id: &str, role: Role) -> Result<Profile, StoreError> {
        self.modify(profile_id, |p: &mut Profile| {
            p.set_role(role);
            Ok(())
        })
    }

    // --- DIDs ---

    /// Insert a new DID together with its anchoring job.
    ///
    /// Fails with `Conflict` when the owner already has a DID or the
    /// identifier is taken; nothing is written in that case.
    pub fn insert_did(&self, record: &DidRecord, job: &AnchorJob) -> Result<(), StoreError> {
        let _guard = self.writer();

        if self.read_index(IDX_DID_OWNER, &record.owner_id)?.is_some() {
            return Err(StoreError::Conflict("User already has a DID".into()));
        }
        if self
            .read_index(IDX_DID_IDENTIFIER, &record.did_identifier)?
            .is_some()
        {
            return Err(StoreError::Conflict("DID identifier already exists".into()));
        }

        let id = record.id.to_string();
        self.commit(
            vec![
                put_record(record)?,
                put_index(IDX_DID_OWNER, &record.owner_id, &id),
                put_index(IDX_DID_IDENTIFIER, &record.did_identifier, &id),
                put_record(job)?,
            ],
            vec![
                ChangeEvent::new(Table::Dids, ChangeOp::Insert, &id),
                ChangeEvent::new(Table::Jobs, ChangeOp::Insert, job.key()),
            ],
        )
    }

    pub fn get_did(&self, id: Uuid) -> Result<Option<DidRecord>, StoreError> {
        self.read(&id.to_string())
    }

    pub fn did_by_owner(&self, owner_id: &str) -> Result<Option<DidRecord>, StoreError> {
        match self.read_index(IDX_DID_OWNER, owner_id)? {
            Some(id) => self.read(&id),
            None => Ok(None),
        }
    }

    pub fn did_by_identifier(&self, identifier: &str) -> Result<Option<DidRecord>, StoreError> {
        match self.read_index(IDX_DID_IDENTIFIER, identifier)? {
            Some(id) => self.read(&id),
            None => Ok(None),
        }
    }

    /// All DIDs, newest first.
    pub fn list_dids(&self) -> Result<Vec<DidRecord>, StoreError> {
        let mut dids: Vec<DidRecord> = self.read_all()?;
        dids.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(dids)
    }

    /// DIDs whose identifier or public key contains `query` (case-insensitive),
    /// newest first.
    pub fn search_dids(&self, query: &str) -> Result<Vec<DidRecord>, StoreError> {
        let needle = query.trim().to_lowercase();
        Ok(self
            .list_dids()?
            .into_iter()
            .filter(|d| {
                d.did_identifier.to_lowercase().contains(&needle)
                    || d.public_key.to_lowercase().contains(&needle)
            })
            .collect())
    }

    pub fn update_did(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut DidRecord) -> Result<(), StoreError>,
    ) -> Result<DidRecord, StoreError> {
        self.modify(&id.to_string(), f)
    }

    /// Delete a DID with its operations, pins, verifications and jobs.
    pub fn delete_did_cascade(&self, id: Uuid) -> Result<DidRecord, StoreError> {
        let _guard = self.writer();
        let record: DidRecord = self.require(&id.to_string())?;

        let mut batch = vec![
            delete_record(&record),
            delete_index(IDX_DID_OWNER, &record.owner_id),
            delete_index(IDX_DID_IDENTIFIER, &record.did_identifier),
        ];
        let mut events = vec![ChangeEvent::new(Table::Dids, ChangeOp::Delete, record.key())];

        fn cascade<T: Keyed>(
            items: Vec<T>,
            batch: &mut Vec<BatchOp>,
            events: &mut Vec<ChangeEvent>,
        ) {
            for item in items {
                events.push(ChangeEvent::new(T::TABLE, ChangeOp::Delete, item.key()));
                batch.push(delete_record(&item));
            }
        }
        cascade(self.operations_for_did(id)?, &mut batch, &mut events);
        cascade(self.pins_for_did(id)?, &mut batch, &mut events);
        cascade(self.verifications_for_did(id)?, &mut batch, &mut events);
        cascade(self.jobs_for_did(id)?, &mut batch, &mut events);

        self.commit(batch, events)?;
        tracing::info!(did = %record.did_identifier, "DID deleted");
        Ok(record)
    }

    // --- anchoring operations ---

    pub fn insert_operation_once(&self, op: AnchorOperation) -> Result<AnchorOperation, StoreError> {
        self.insert_once(op)
    }

    pub fn get_operation(&self, id: Uuid) -> Result<Option<AnchorOperation>, StoreError> {
        self.read(&id.to_string())
    }

    pub fn operations_for_did(&self, did_id: Uuid) -> Result<Vec<AnchorOperation>, StoreError> {
        let mut ops: Vec<AnchorOperation> = self
            .read_all::<AnchorOperation>()?
            .into_iter()
            .filter(|o| o.did_id == did_id)
            .collect();
        ops.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(ops)
    }

    pub fn list_operations(&self) -> Result<Vec<AnchorOperation>, StoreError> {
        self.read_all()
    }

    pub fn update_operation(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut AnchorOperation) -> Result<(), StoreError>,
    ) -> Result<AnchorOperation, StoreError> {
        self.modify(&id.to_string(), f)
    }

    /// Claim the right to submit `op_id` to the ledger. `None` while another
    /// caller holds the claim.
    pub fn begin_submission(&self, op_id: Uuid) -> Option<SubmissionGuard<'_>> {
        self.submitting.insert(op_id).then(|| SubmissionGuard {
            store: self,
            op_id,
        })
    }

    /// Record a ledger receipt on an operation and move its DID to
    /// `anchored`, in one batch.
    ///
    /// An operation that is already anchored is rejected with `Conflict` and
    /// left untouched. A DID that cannot take `pending -> anchored` yields
    /// `InvalidState`.
    pub fn anchor_operation(
        &self,
        op_id: Uuid,
        receipt: &LedgerReceipt,
    ) -> Result<(AnchorOperation, DidRecord), StoreError> {
        let _guard = self.writer();
        let mut op: AnchorOperation = self.require(&op_id.to_string())?;
        if op.is_anchored() {
            return Err(StoreError::Conflict(format!(
                "Operation {} is already anchored",
                op_id
            )));
        }
        let mut did: DidRecord = self.require(&op.did_id.to_string())?;

        did.apply(DidEvent::Anchor)?;
        op.mark_anchored(receipt)?;

        self.commit(
            vec![put_record(&op)?, put_record(&did)?],
            vec![
                ChangeEvent::new(Table::Operations, ChangeOp::Update, op.key()),
                ChangeEvent::new(Table::Dids, ChangeOp::Update, did.key()),
            ],
        )?;
        Ok((op, did))
    }

    // --- pins ---

    pub fn insert_pin_once(&self, pin: PinRecord) -> Result<PinRecord, StoreError> {
        self.insert_once(pin)
    }

    pub fn pins_for_did(&self, did_id: Uuid) -> Result<Vec<PinRecord>, StoreError> {
        let mut pins: Vec<PinRecord> = self
            .read_all::<PinRecord>()?
            .into_iter()
            .filter(|p| p.did_id == did_id)
            .collect();
        pins.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(pins)
    }

    pub fn list_pins(&self) -> Result<Vec<PinRecord>, StoreError> {
        self.read_all()
    }

    // --- verifications ---

    pub fn insert_verification_once(
        &self,
        verification: VerificationRecord,
    ) -> Result<VerificationRecord, StoreError> {
        self.insert_once(verification)
    }

    pub fn insert_verification(&self, verification: &VerificationRecord) -> Result<(), StoreError> {
        self.insert(verification)
    }

    pub fn verifications_for_did(
        &self,
        did_id: Uuid,
    ) -> Result<Vec<VerificationRecord>, StoreError> {
        let mut verifications: Vec<VerificationRecord> = self
            .read_all::<VerificationRecord>()?
            .into_iter()
            .filter(|v| v.did_id == did_id)
            .collect();
        verifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(verifications)
    }

    pub fn list_verifications(&self) -> Result<Vec<VerificationRecord>, StoreError> {
        self.read_all()
    }

    // --- anchoring jobs ---

    pub fn get_job(&self, id: Uuid) -> Result<Option<AnchorJob>, StoreError> {
        self.read(&id.to_string())
    }

    pub fn update_job(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut AnchorJob) -> Result<(), StoreError>,
    ) -> Result<AnchorJob, StoreError> {
        self.modify(&id.to_string(), f)
    }

    pub fn jobs_for_did(&self, did_id: Uuid) -> Result<Vec<AnchorJob>, StoreError> {
        Ok(self
            .read_all::<AnchorJob>()?
            .into_iter()
            .filter(|j| j.did_id == did_id)
            .collect())
    }

    /// Jobs in `queued` or `running`, oldest first.
    pub fn unfinished_jobs(&self) -> Result<Vec<AnchorJob>, StoreError> {
        let mut jobs: Vec<AnchorJob> = self
            .read_all::<AnchorJob>()?
            .into_iter()
            .filter(|j| matches!(j.state, JobState::Queued | JobState::Running))
            .collect();
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(jobs)
    }

    // --- issuer applications ---

    /// Insert a pending application; an applicant may hold one open
    /// (pending or approved) application at a time.
    pub fn insert_application(&self, application: &IssuerApplication) -> Result<(), StoreError> {
        let _guard = self.writer();
        if self
            .read_index(IDX_APPLICATION_OPEN, &application.applicant_id)?
            .is_some()
        {
            return Err(StoreError::Conflict(
                "An issuer application is already open for this user".into(),
            ));
        }
        self.commit(
            vec![
                put_record(application)?,
                put_index(
                    IDX_APPLICATION_OPEN,
                    &application.applicant_id,
                    &application.key(),
                ),
            ],
            vec![ChangeEvent::new(
                Table::Applications,
                ChangeOp::Insert,
                application.key(),
            )],
        )
    }

    pub fn get_application(&self, id: Uuid) -> Result<Option<IssuerApplication>, StoreError> {
        self.read(&id.to_string())
    }

    /// The applicant's most recent application.
    pub fn application_for_applicant(
        &self,
        applicant_id: &str,
    ) -> Result<Option<IssuerApplication>, StoreError> {
        Ok(self
            .read_all::<IssuerApplication>()?
            .into_iter()
            .filter(|a| a.applicant_id == applicant_id)
            .max_by_key(|a| a.created_at))
    }

    pub fn list_applications(&self) -> Result<Vec<IssuerApplication>, StoreError> {
        self.read_all()
    }

    /// Review a pending application. Approval elevates the applicant to
    /// `issuer` in the same batch.
    pub fn review_application(
        &self,
        id: Uuid,
        decision: ReviewDecision,
        reviewer: &str,
    ) -> Result<IssuerApplication, StoreError> {
        let _guard = self.writer();
        let mut application: IssuerApplication = self.require(&id.to_string())?;
        application.review(decision, reviewer)?;

        let mut batch = vec![put_record(&application)?];
        let mut events = vec![ChangeEvent::new(
            Table::Applications,
            ChangeOp::Update,
            application.key(),
        )];

        match application.status {
            ApplicationStatus::Approved => {
                let mut profile: Profile = self.require(&application.applicant_id)?;
                profile.set_role(Role::Issuer);
                batch.push(put_record(&profile)?);
                events.push(ChangeEvent::new(Table::Profiles, ChangeOp::Update, profile.key()));
            }
            _ => batch.push(delete_index(IDX_APPLICATION_OPEN, &application.applicant_id)),
        }

        self.commit(batch, events)?;
        Ok(application)
    }

    /// Delete an application that has not been approved.
    pub fn withdraw_application(&self, id: Uuid) -> Result<IssuerApplication, StoreError> {
        let _guard = self.writer();
        let application: IssuerApplication = self.require(&id.to_string())?;
        if application.status == ApplicationStatus::Approved {
            return Err(StoreError::InvalidState(
                "Approved applications cannot be withdrawn".into(),
            ));
        }

        let mut batch = vec![delete_record(&application)];
        if self.read_index(IDX_APPLICATION_OPEN, &application.applicant_id)?
            == Some(application.key())
        {
            batch.push(delete_index(IDX_APPLICATION_OPEN, &application.applicant_id));
        }
        self.commit(
            batch,
            vec![ChangeEvent::new(
                Table::Applications,
                ChangeOp::Delete,
                application.key(),
            )],
        )?;
        Ok(application)
    }

    // --- verifiable credentials ---

    pub fn insert_credential(&self, credential: &StoredCredential) -> Result<(), StoreError> {
        self.insert(credential)
    }

    pub fn get_credential(&self, id: Uuid) -> Result<Option<StoredCredential>, StoreError> {
        self.read(&id.to_string())
    }

    /// Credentials held by `holder_id`, oldest issuance first.
    pub fn credentials_for_holder(
        &self,
        holder_id: &str,
        only_active: bool,
    ) -> Result<Vec<StoredCredential>, StoreError> {
        let mut credentials: Vec<StoredCredential> = self
            .read_all::<StoredCredential>()?
            .into_iter()
            .filter(|c| c.holder_id == holder_id)
            .filter(|c| !only_active || c.status == CredentialStatus::Active)
            .collect();
        credentials.sort_by(|a, b| a.issued_at.cmp(&b.issued_at));
        Ok(credentials)
    }

    /// Credentials issued by `issuer_id`, newest first.
    pub fn credentials_issued_by(
        &self,
        issuer_id: &str,
    ) -> Result<Vec<StoredCredential>, StoreError> {
        let mut credentials: Vec<StoredCredential> = self
            .read_all::<StoredCredential>()?
            .into_iter()
            .filter(|c| c.issuer_id == issuer_id)
            .collect();
        credentials.sort_by(|a, b| b.issued_at.cmp(&a.issued_at));
        Ok(credentials)
    }

    pub fn list_credentials(&self) -> Result<Vec<StoredCredential>, StoreError> {
        self.read_all()
    }

    pub fn update_credential(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut StoredCredential) -> Result<(), StoreError>,
    ) -> Result<StoredCredential, StoreError> {
        self.modify(&id.to_string(), f)
    }
}
