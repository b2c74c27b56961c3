//! Publish protocol for the product catalog store.
//!
//! A client publishes a new catalog version by uploading files in rounds.
//! After each round the server answers with the files that are still
//! missing from the graph rooted at what was uploaded; the client uploads
//! exactly those and repeats until the answer is empty. Only then are the
//! staged files renamed into place and the files the new root no longer
//! reaches are deleted.
//!
//! # Components
//!
//! - [`Resolver`] -- level-by-level reachability over `refs`, with bounded
//!   concurrent reads and an explicit depth cap
//! - [`CommitCoordinator`] -- renames staged files into place and prunes orphans
//! - [`Publisher`] -- the per-request state machine tying both together
//! - [`DatabaseLocks`] -- serialises publishes to the same database
//! - [`sweep_stale_temp_files`] -- removes staged files abandoned by clients

pub mod commit;
pub mod config;
pub mod error;
pub mod hooks;
pub mod lock;
pub mod publisher;
pub mod resolver;
pub mod sweep;

pub use commit::{CommitCoordinator, CommitReport, FailedFile, RemovalReport};
pub use config::PublishConfig;
pub use error::{PublishError, PublishResult};
pub use hooks::{LogHook, PublishHook};
pub use lock::DatabaseLocks;
pub use publisher::{PublishOutcome, PublishRequest, PublishState, Publisher};
pub use resolver::{Resolution, Resolver, StagedBatch};
pub use sweep::sweep_stale_temp_files;
