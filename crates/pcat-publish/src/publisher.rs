//! The per-request publish state machine.
//!
//! ```text
//! Received -> Resolving -> CompleteCommit   -> Responded
//!                       -> CompleteNoCommit -> Responded
//!                       -> Incomplete       -> Responded
//! ```
//!
//! Nothing is persisted between requests: every publish takes its own
//! existence snapshot and owns its staged files.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use pcat_store::{ExistenceIndex, FileStore};
use pcat_types::{SaveMode, TempSuffix, ROOT_FILE_NAME};

use crate::commit::{CommitCoordinator, CommitReport, RemovalReport};
use crate::config::PublishConfig;
use crate::error::{PublishError, PublishResult};
use crate::hooks::{LogHook, PublishHook};
use crate::resolver::{Resolution, Resolver, StagedBatch};

/// Where a publish request is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PublishState {
    Received,
    Resolving,
    /// Nothing missing; staged files were renamed into place.
    CompleteCommit,
    /// Nothing missing; nothing was renamed (dry run or direct upload).
    CompleteNoCommit,
    /// Files are missing; staged files are left for a later round.
    Incomplete,
    Responded,
}

impl fmt::Display for PublishState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Received => "received",
            Self::Resolving => "resolving",
            Self::CompleteCommit => "complete-commit",
            Self::CompleteNoCommit => "complete-no-commit",
            Self::Incomplete => "incomplete",
            Self::Responded => "responded",
        };
        f.write_str(s)
    }
}

/// One batch of uploaded files, already written to the database.
#[derive(Clone, Debug)]
pub struct PublishRequest {
    pub database_id: String,
    /// The names the uploads were written under (staged names when `save`
    /// stages).
    pub uploaded: Vec<String>,
    pub save: SaveMode,
    /// The suffix staged names carry; required when `save` stages.
    pub suffix: Option<TempSuffix>,
}

impl PublishRequest {
    /// Uploads written directly under their final names.
    pub fn direct(database_id: impl Into<String>, uploaded: Vec<String>) -> Self {
        Self {
            database_id: database_id.into(),
            uploaded,
            save: SaveMode::Direct,
            suffix: None,
        }
    }

    /// Uploads written under `suffix`-staged names.
    pub fn staged(
        database_id: impl Into<String>,
        uploaded: Vec<String>,
        save: SaveMode,
        suffix: TempSuffix,
    ) -> Self {
        Self {
            database_id: database_id.into(),
            uploaded,
            save,
            suffix: Some(suffix),
        }
    }
}

/// What a publish request did.
#[derive(Clone, Debug)]
pub struct PublishOutcome {
    /// Files the client still has to upload, sorted.
    pub missing_files: Vec<String>,
    /// The terminal decision: complete with or without commit, or incomplete.
    pub state: PublishState,
    pub commit: Option<CommitReport>,
    pub prune: Option<RemovalReport>,
    /// Staged uploads deleted by a dry run.
    pub discard: Option<RemovalReport>,
    /// Files staged by earlier rounds that joined this publish.
    pub pending: usize,
    /// Set when the completion hook failed. The new version is visible
    /// regardless.
    pub hook_error: Option<String>,
    pub files_read: usize,
}

/// Drives publish requests against one store at a time.
pub struct Publisher {
    config: PublishConfig,
    hook: Arc<dyn PublishHook>,
}

impl Publisher {
    pub fn new(config: PublishConfig) -> Self {
        Self::with_hook(config, Arc::new(LogHook))
    }

    pub fn with_hook(config: PublishConfig, hook: Arc<dyn PublishHook>) -> Self {
        Self { config, hook }
    }

    pub fn config(&self) -> &PublishConfig {
        &self.config
    }

    /// Resolve a batch and, depending on the save mode, commit, prune, or
    /// discard it.
    ///
    /// - `IfComplete`: files staged by earlier rounds join the batch; commit
    ///   and prune only when nothing is missing, otherwise leave every staged
    ///   file for a later round.
    /// - `No`: always delete the staged files; the store is never changed.
    /// - `Direct`: files are already final; prune when complete.
    ///
    /// A failed rename yields [`PublishError::PartialCommit`]. Nothing that
    /// happens after the renames fails the publish: failed deletions are
    /// reported in the outcome and so is a failed completion hook.
    #[instrument(skip_all, fields(database_id = %request.database_id, save = ?request.save))]
    pub async fn publish(
        &self,
        store: &dyn FileStore,
        request: PublishRequest,
    ) -> PublishResult<PublishOutcome> {
        let mut state = PublishState::Received;
        debug!(%state, uploaded = request.uploaded.len(), "publish received");

        let mut existing = ExistenceIndex::snapshot(store).await?;
        let mut staged = match (&request.suffix, request.save.is_staged()) {
            (Some(suffix), true) => StagedBatch::from_staged_names(suffix, &request.uploaded),
            _ => StagedBatch::direct(),
        };
        let pending = if request.save == SaveMode::IfComplete {
            staged.include_pending(store, &existing).await?
        } else {
            0
        };
        if pending > 0 {
            debug!(pending, "earlier staged files joined the batch");
        }
        let frontier: Vec<String> = if request.save.is_staged() {
            staged.final_names().map(String::from).collect()
        } else {
            request.uploaded.clone()
        };
        let rooted = frontier.iter().any(|name| name == ROOT_FILE_NAME);

        transition(&mut state, PublishState::Resolving);
        let resolved = Resolver::new(store, &self.config)
            .resolve(&existing, &staged, frontier)
            .await;

        let coordinator = CommitCoordinator::new(store);
        let outcome = match request.save {
            SaveMode::No => {
                let discarded = coordinator.discard(&staged, &mut existing).await;
                if !discarded.is_complete() {
                    warn!(
                        failed = discarded.failed.len(),
                        "dry-run uploads left behind, the sweep will remove them"
                    );
                }
                let resolution = resolved?;
                let next = if resolution.is_complete() {
                    PublishState::CompleteNoCommit
                } else {
                    PublishState::Incomplete
                };
                let mut outcome = outcome_for(&resolution, next);
                outcome.discard = Some(discarded);
                outcome
            }
            SaveMode::IfComplete => {
                let resolution = resolved?;
                if resolution.is_complete() {
                    let mut referenced = resolution.referenced.clone();
                    let report = coordinator
                        .commit(&staged, &mut existing, &mut referenced)
                        .await;
                    if !report.is_complete() {
                        return Err(PublishError::PartialCommit(report));
                    }
                    let mut outcome = outcome_for(&resolution, PublishState::CompleteCommit);
                    outcome.commit = Some(report);
                    if self.config.prune_files && rooted {
                        outcome.prune = Some(coordinator.prune(&mut existing, &referenced).await);
                    }
                    outcome.hook_error = self.complete(&request.database_id).await;
                    outcome
                } else {
                    outcome_for(&resolution, PublishState::Incomplete)
                }
            }
            SaveMode::Direct => {
                let resolution = resolved?;
                if resolution.is_complete() {
                    let mut outcome = outcome_for(&resolution, PublishState::CompleteNoCommit);
                    if self.config.prune_files && self.config.prune_direct_mode && rooted {
                        outcome.prune = Some(
                            coordinator
                                .prune(&mut existing, &resolution.referenced)
                                .await,
                        );
                    }
                    outcome.hook_error = self.complete(&request.database_id).await;
                    outcome
                } else {
                    outcome_for(&resolution, PublishState::Incomplete)
                }
            }
        };

        let mut outcome = outcome;
        outcome.pending = pending;
        transition(&mut state, outcome.state);
        info!(
            %state,
            missing = outcome.missing_files.len(),
            files_read = outcome.files_read,
            "publish resolved"
        );
        transition(&mut state, PublishState::Responded);
        Ok(outcome)
    }
}

impl Publisher {
    /// Run the completion hook. Its failure is logged and returned, never
    /// propagated: the new version is already visible.
    async fn complete(&self, database_id: &str) -> Option<String> {
        match self.hook.on_publish_complete(database_id).await {
            Ok(()) => None,
            Err(e) => {
                warn!(database_id, error = %e, "publish hook failed");
                Some(e.to_string())
            }
        }
    }
}

fn outcome_for(resolution: &Resolution, state: PublishState) -> PublishOutcome {
    PublishOutcome {
        missing_files: resolution.missing_files(),
        state,
        commit: None,
        prune: None,
        discard: None,
        pending: 0,
        hook_error: None,
        files_read: resolution.files_read,
    }
}

fn transition(state: &mut PublishState, next: PublishState) {
    debug!(from = %state, to = %next, "publish state");
    *state = next;
}
