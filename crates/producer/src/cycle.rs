//! Orchestrates one producer cycle end to end.
//!
//! Generic over the concrete write/read engine pair so a user's domain model
//! drives the same state machine the reference `cadence-state` engines
//! exercise in tests. The populator closure receives the minted version, the
//! write engine, and the prior read state directly — constructing any
//! engine-specific staging wrapper (e.g. `cadence_state::WriteState`) is the
//! concrete engine's concern, not the cycle state machine's.

use crate::artifacts::Artifacts;
use crate::executor::SnapshotPublishExecutor;
use crate::integrity::check_integrity;
use crate::listener::ListenerBroadcaster;
use crate::read_state_holder::ReadStateHolder;
use crate::validator::ValidatorRunner;
use cadence_core::{
    Announcer, BlobKind, BlobStager, CadenceError, CadenceResult, CycleOutcome, CycleStatus, PhaseTiming,
    Publisher, ReadEngine, ReadState, RestoreInto, Version, VersionMinter, WriteEngine,
};
use std::io::Write as _;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

/// Runs the producer cycle state machine over a `(W, R)` write/read engine
/// pair, plus every collaborator injected at construction.
///
/// Built exclusively by [`crate::builder::ProducerBuilder`].
pub struct Producer<W, R>
where
    W: WriteEngine + RestoreInto<R>,
    R: ReadEngine,
{
    pub(crate) write_engine: W,
    pub(crate) read_state_holder: ReadStateHolder<R>,
    pub(crate) version_minter: Arc<dyn VersionMinter>,
    pub(crate) blob_stager: Arc<dyn BlobStager>,
    pub(crate) publisher: Arc<dyn Publisher>,
    pub(crate) announcer: Arc<dyn Announcer>,
    pub(crate) validators: ValidatorRunner<R>,
    pub(crate) listeners: Arc<ListenerBroadcaster>,
    pub(crate) snapshot_publish_executor: Arc<dyn SnapshotPublishExecutor>,
    pub(crate) num_states_between_snapshots: i64,
    pub(crate) num_states_until_next_snapshot: i64,
    pub(crate) target_max_type_shard_size_bytes: u64,
    pub(crate) last_minted: Option<Version>,
}

impl<W, R> Producer<W, R>
where
    W: WriteEngine + RestoreInto<R>,
    R: ReadEngine,
{
    /// The currently published read state, if any cycle has ever committed.
    pub fn current(&self) -> Option<Arc<ReadState<R>>> {
        self.read_state_holder.current()
    }

    /// The configured shard-sizing hint, forwarded to the write engine at
    /// construction time but not enforced by the reference engine.
    pub fn target_max_type_shard_size_bytes(&self) -> u64 {
        self.target_max_type_shard_size_bytes
    }

    /// A direct, mutable view of the underlying write engine. Exposed for
    /// [`crate::restore::restore`], which must replace it wholesale on
    /// success.
    pub fn write_engine_mut(&mut self) -> &mut W {
        &mut self.write_engine
    }

    /// A direct, mutable view of the read-state holder, for
    /// [`crate::restore::restore`].
    pub fn read_state_holder_mut(&mut self) -> &mut ReadStateHolder<R> {
        &mut self.read_state_holder
    }

    /// Run one cycle. `populator` receives the minted `to_version`, the
    /// mutable write engine, and the prior read state (`None` on the first
    /// cycle). Returns normally for every outcome except
    /// [`CadenceError::ValidationFailed`], the one error kind that escapes
    /// out.
    pub fn run_cycle<F>(&mut self, populator: F) -> CadenceResult<CycleOutcome>
    where
        F: FnOnce(Version, &mut W, Option<Arc<ReadState<R>>>) -> CadenceResult<()>,
    {
        let mut phases = Vec::new();

        let to_version = self.version_minter.mint();
        if let Some(previous) = self.last_minted {
            if to_version <= previous {
                return Err(CadenceError::NonMonotonicVersion {
                    previous,
                    next: to_version,
                });
            }
        }
        debug_assert!(self.last_minted.map_or(true, |p| to_version > p));
        self.last_minted = Some(to_version);

        self.listeners.cycle_start(to_version);
        let prior = self.read_state_holder.current();
        if prior.is_none() {
            self.listeners.new_delta_chain(to_version);
        }

        self.write_engine.prepare_for_next_cycle();
        let artifacts = Arc::new(Artifacts::new());

        let populate_started = Instant::now();
        self.listeners.populate_start(to_version);
        let populate_result = populator(to_version, &mut self.write_engine, prior.clone());
        let populate_duration = populate_started.elapsed();
        self.listeners
            .populate_complete(to_version, populate_duration, &populate_result);
        phases.push(PhaseTiming {
            phase: "populate",
            duration: populate_duration,
        });
        if let Err(e) = populate_result {
            return self.finish_failed(to_version, phases, &artifacts, e);
        }

        if !self.write_engine.has_changed_since_last_cycle() {
            self.write_engine.reset_to_last_prepare();
            self.listeners.no_delta(to_version);
            let status = CycleStatus {
                to_version,
                outcome: CycleOutcome::NoDelta,
                phases,
            };
            self.listeners.cycle_complete(&status);
            return Ok(CycleOutcome::NoDelta);
        }

        let publish_started = Instant::now();
        self.listeners.publish_start(to_version);
        if let Err(e) = self.stage_and_publish(to_version, prior.as_ref(), &artifacts) {
            return self.finish_failed(to_version, phases, &artifacts, e);
        }
        let publish_duration = publish_started.elapsed();
        self.listeners.publish_complete(to_version, publish_duration);
        phases.push(PhaseTiming {
            phase: "publish",
            duration: publish_duration,
        });

        let integrity_started = Instant::now();
        self.listeners.integrity_start(to_version);
        let integrity_result = check_integrity(&mut self.read_state_holder, &artifacts, to_version);
        let integrity_duration = integrity_started.elapsed();
        self.listeners
            .integrity_complete(to_version, integrity_duration, &integrity_result);
        phases.push(PhaseTiming {
            phase: "integrity",
            duration: integrity_duration,
        });
        if let Err(e) = integrity_result {
            return self.finish_failed(to_version, phases, &artifacts, e);
        }

        let pending = self
            .read_state_holder
            .pending()
            .expect("integrity check always populates pending on success");
        let validate_started = Instant::now();
        self.listeners.validation_start(to_version);
        let validate_result = self.validators.run(&pending);
        let validate_duration = validate_started.elapsed();
        self.listeners
            .validation_complete(to_version, validate_duration, &validate_result);
        phases.push(PhaseTiming {
            phase: "validate",
            duration: validate_duration,
        });
        if let Err(e) = validate_result {
            return self.finish_failed(to_version, phases, &artifacts, e);
        }

        let announce_started = Instant::now();
        self.listeners.announcement_start(to_version);
        let announce_result = self.announcer.announce(to_version);
        let announce_duration = announce_started.elapsed();
        self.listeners
            .announcement_complete(to_version, announce_duration, &announce_result);
        phases.push(PhaseTiming {
            phase: "announce",
            duration: announce_duration,
        });
        if let Err(e) = announce_result {
            return self.finish_failed(to_version, phases, &artifacts, e);
        }

        self.read_state_holder.commit();
        artifacts.cleanup();
        let status = CycleStatus {
            to_version,
            outcome: CycleOutcome::Produced { version: to_version },
            phases,
        };
        self.listeners.cycle_complete(&status);
        Ok(CycleOutcome::Produced { version: to_version })
    }

    /// Abort path shared by every phase at or past populate: reset the write engine, discard the cycle's holder
    /// scratch state, release staged artifacts, and record the failure.
    /// Only `ValidationFailed` is re-raised to the caller.
    fn finish_failed(
        &mut self,
        to_version: Version,
        phases: Vec<PhaseTiming>,
        artifacts: &Artifacts,
        error: CadenceError,
    ) -> CadenceResult<CycleOutcome> {
        self.write_engine.reset_to_last_prepare();
        self.read_state_holder.rollback();
        artifacts.cleanup();
        let status = CycleStatus {
            to_version,
            outcome: CycleOutcome::Failed {
                reason: error.to_string(),
            },
            phases,
        };
        self.listeners.cycle_complete(&status);
        if matches!(error, CadenceError::ValidationFailed { .. }) {
            Err(error)
        } else {
            Ok(CycleOutcome::Failed {
                reason: error.to_string(),
            })
        }
    }

    /// Stage every needed blob kind and publish DELTA/REVERSE_DELTA
    /// synchronously; SNAPSHOT is published synchronously on the first
    /// cycle or whenever the cadence counter fires, otherwise it is handed
    /// to the snapshot-publish executor.
    fn stage_and_publish(
        &mut self,
        to_version: Version,
        prior: Option<&Arc<ReadState<R>>>,
        artifacts: &Arc<Artifacts>,
    ) -> CadenceResult<()> {
        let mut snapshot_bytes = Vec::new();
        self.write_engine.write_snapshot(&mut snapshot_bytes)?;
        let snapshot_blob = {
            let mut writer = self.blob_stager.open_snapshot(to_version)?;
            writer
                .write_all(&snapshot_bytes)
                .map_err(|e| CadenceError::PublisherIo(e.to_string()))?;
            writer.finish()?
        };

        if let Some(prior) = prior {
            let mut delta_bytes = Vec::new();
            self.write_engine.write_delta(&mut delta_bytes)?;
            let delta_blob = {
                let mut writer = self.blob_stager.open_delta(prior.version, to_version)?;
                writer
                    .write_all(&delta_bytes)
                    .map_err(|e| CadenceError::PublisherIo(e.to_string()))?;
                writer.finish()?
            };
            self.publish_artifact(BlobKind::Delta, to_version, &delta_blob)?;
            artifacts.set(delta_blob);

            let mut reverse_bytes = Vec::new();
            self.write_engine.write_reverse_delta(&mut reverse_bytes)?;
            let reverse_blob = {
                let mut writer = self.blob_stager.open_reverse_delta(to_version, prior.version)?;
                writer
                    .write_all(&reverse_bytes)
                    .map_err(|e| CadenceError::PublisherIo(e.to_string()))?;
                writer.finish()?
            };
            self.publish_artifact(BlobKind::ReverseDelta, to_version, &reverse_blob)?;
            artifacts.set(reverse_blob);
        }

        let synchronous = if prior.is_none() {
            true
        } else {
            self.num_states_until_next_snapshot -= 1;
            if self.num_states_until_next_snapshot < 0 {
                self.num_states_until_next_snapshot = self.num_states_between_snapshots;
                true
            } else {
                false
            }
        };

        artifacts.set(snapshot_blob.clone());
        if synchronous {
            self.publish_artifact(BlobKind::Snapshot, to_version, &snapshot_blob)?;
            artifacts.mark_snapshot_publish_complete();
        } else {
            let publisher = self.publisher.clone();
            let listeners = self.listeners.clone();
            let artifacts = artifacts.clone();
            let blob = snapshot_blob.clone();
            self.snapshot_publish_executor.execute(Box::new(move || {
                let started = Instant::now();
                let result = publisher.publish(&blob);
                let duration = started.elapsed();
                let reported: CadenceResult<()> = match &result {
                    Ok(()) => Ok(()),
                    Err(e) => Err(CadenceError::AsyncSnapshotPublish {
                        version: to_version,
                        reason: e.to_string(),
                    }),
                };
                listeners.artifact_publish(BlobKind::Snapshot, to_version, duration, &reported);
                if let Err(e) = result {
                    warn!(target: "cadence::cycle", %to_version, error = %e, "deferred snapshot publish failed");
                }
                artifacts.mark_snapshot_publish_complete();
            }));
        }

        Ok(())
    }

    fn publish_artifact(&self, kind: BlobKind, to_version: Version, blob: &cadence_core::Blob) -> CadenceResult<()> {
        let started = Instant::now();
        let result = self.publisher.publish(blob);
        let duration = started.elapsed();
        self.listeners.artifact_publish(kind, to_version, duration, &result);
        result
    }
}

#[allow(dead_code)]
fn _phase_name_is_static(_d: Duration) {}
