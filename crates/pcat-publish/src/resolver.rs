//! Reachability resolution over the `refs` graph.
//!
//! Starting from a frontier of file names, the resolver walks the graph one
//! level at a time. Each level is split into three buckets:
//!
//! 1. present JSON objects -- read, and their `refs` become the next level
//! 2. present leaves (no `.json` suffix) -- never read
//! 3. absent names -- reported as missing
//!
//! Reads within a level run concurrently in chunks of at most
//! `read_files_in_parallel`; each chunk is awaited before the next starts and
//! a level completes before the next begins. The chunk size affects timing
//! only, never the result.

use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap};
use std::time::SystemTime;

use futures::future::join_all;
use tracing::{debug, instrument, warn};

use pcat_store::{ExistenceIndex, FileStore, StoreResult};
use pcat_types::{is_leaf, normalize, split_staged_name, FileWithRefs, TempSuffix};

use crate::config::PublishConfig;
use crate::error::{PublishError, PublishResult};

/// Files stored under temp names that a publish resolves and commits.
///
/// Maps each final name to the staged name it is stored under, so that
/// sibling uploads referencing each other by final name resolve to the
/// staged copies. Besides the current request's uploads a batch may carry
/// files staged by earlier rounds of the same publish (see
/// [`include_pending`](Self::include_pending)).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StagedBatch {
    staged: HashMap<String, String>,
}

impl StagedBatch {
    /// A batch with nothing staged: uploads were written under final names.
    pub fn direct() -> Self {
        Self::default()
    }

    /// Build from the names the uploads were written under. Names that do
    /// not carry `suffix` are ignored.
    pub fn from_staged_names<I, S>(suffix: &TempSuffix, staged_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut staged = HashMap::new();
        for staged_name in staged_names {
            let staged_name = staged_name.as_ref();
            match suffix.strip(staged_name) {
                Some(final_name) => {
                    staged.insert(final_name.to_string(), staged_name.to_string());
                }
                None => warn!(name = staged_name, "upload does not carry the request's temp suffix"),
            }
        }
        Self { staged }
    }

    /// Add files staged by earlier requests that were never committed.
    ///
    /// A client completes a publish by uploading only what the previous
    /// round reported missing, so the rest of the new version is still
    /// waiting under earlier suffixes. Uploads already in the batch win;
    /// among earlier copies of one final name the most recently modified
    /// wins. Returns the number of files added.
    pub async fn include_pending(
        &mut self,
        store: &dyn FileStore,
        existing: &ExistenceIndex,
    ) -> StoreResult<usize> {
        let candidates: Vec<(&str, &str)> = existing
            .iter()
            .filter_map(|name| split_staged_name(name).map(|(final_name, _)| (final_name, name)))
            .filter(|(final_name, _)| !self.staged.contains_key(*final_name))
            .collect();
        let modified = join_all(candidates.iter().map(|&(_, staged)| store.modified(staged))).await;

        let mut newest: HashMap<&str, (Option<SystemTime>, &str)> = HashMap::new();
        for ((final_name, staged), modified) in candidates.into_iter().zip(modified) {
            let copy = (modified?, staged);
            match newest.entry(final_name) {
                Entry::Vacant(entry) => {
                    entry.insert(copy);
                }
                Entry::Occupied(mut entry) => {
                    if copy > *entry.get() {
                        debug!(superseded = entry.get().1, by = staged, "newer staged copy");
                        entry.insert(copy);
                    }
                }
            }
        }

        let added = newest.len();
        for (final_name, (_, staged)) in newest {
            self.staged.insert(final_name.to_string(), staged.to_string());
        }
        Ok(added)
    }

    /// The staged name a final name is stored under in this batch.
    pub fn staged_name(&self, final_name: &str) -> Option<&str> {
        self.staged.get(final_name).map(String::as_str)
    }

    /// Final names of every staged file.
    pub fn final_names(&self) -> impl Iterator<Item = &str> {
        self.staged.keys().map(String::as_str)
    }

    /// `(staged, final)` pairs.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.staged
            .iter()
            .map(|(final_name, staged)| (staged.as_str(), final_name.as_str()))
    }

    pub fn contains(&self, final_name: &str) -> bool {
        self.staged.contains_key(final_name)
    }

    pub fn len(&self) -> usize {
        self.staged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }
}

/// Outcome of a resolution, in final names.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Names reachable from the frontier that are absent or unreadable.
    pub missing: BTreeSet<String>,
    /// Every name seen on any level, the initial frontier included.
    pub referenced: BTreeSet<String>,
    /// Number of objects read.
    pub files_read: usize,
    /// Number of levels visited.
    pub levels: usize,
}

impl Resolution {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }

    /// Missing names as an ordered list for the response body.
    pub fn missing_files(&self) -> Vec<String> {
        self.missing.iter().cloned().collect()
    }
}

/// Breadth-first reachability resolver over one database.
pub struct Resolver<'a> {
    store: &'a dyn FileStore,
    read_parallel: usize,
    max_depth: usize,
}

impl<'a> Resolver<'a> {
    pub fn new(store: &'a dyn FileStore, config: &PublishConfig) -> Self {
        Self::with_limits(store, config.read_chunk_size(), config.max_depth)
    }

    pub fn with_limits(store: &'a dyn FileStore, read_parallel: usize, max_depth: usize) -> Self {
        Self {
            store,
            read_parallel: read_parallel.max(1),
            max_depth,
        }
    }

    /// Determine which files reachable from `frontier` are missing.
    ///
    /// A JSON object that cannot be parsed counts as missing so the client
    /// uploads it again. Exceeding `max_depth` levels below the frontier is
    /// [`PublishError::RecursionTooDeep`] and no partial result is returned.
    #[instrument(skip_all, fields(read_parallel = self.read_parallel, max_depth = self.max_depth))]
    pub async fn resolve<I, S>(
        &self,
        existing: &ExistenceIndex,
        staged: &StagedBatch,
        frontier: I,
    ) -> PublishResult<Resolution>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut resolution = Resolution::default();
        let mut level: BTreeSet<String> = frontier.into_iter().map(Into::into).collect();
        let mut depth = 0;

        while !level.is_empty() {
            if depth > self.max_depth {
                return Err(PublishError::RecursionTooDeep {
                    depth,
                    limit: self.max_depth,
                });
            }

            let mut to_read: Vec<(&str, &str)> = Vec::new();
            for name in &level {
                match stored_name(existing, staged, name) {
                    Some(stored) if !is_leaf(name) => to_read.push((name.as_str(), stored)),
                    Some(_) => {}
                    None => {
                        resolution.missing.insert(name.clone());
                    }
                }
            }

            let mut next = BTreeSet::new();
            for chunk in to_read.chunks(self.read_parallel) {
                let reads = join_all(chunk.iter().map(|&(_, stored)| self.read_refs(stored))).await;
                resolution.files_read += chunk.len();
                for (&(name, _), read) in chunk.iter().zip(reads) {
                    match read? {
                        Some(file) => next.extend(file.child_names().map(normalize)),
                        None => {
                            resolution.missing.insert(name.to_string());
                        }
                    }
                }
            }

            debug!(
                depth,
                level_size = level.len(),
                read = to_read.len(),
                next_size = next.len(),
                "resolved level"
            );

            resolution.referenced.extend(level);
            level = next;
            depth += 1;
        }

        resolution.levels = depth;
        debug!(
            missing = resolution.missing.len(),
            referenced = resolution.referenced.len(),
            files_read = resolution.files_read,
            "resolution finished"
        );
        Ok(resolution)
    }

    /// Read and parse one object's refs. `Ok(None)` means the object must be
    /// treated as missing: it vanished or does not parse.
    async fn read_refs(&self, stored: &str) -> StoreResult<Option<FileWithRefs>> {
        let Some(bytes) = self.store.read(stored).await? else {
            warn!(name = stored, "file listed but gone when read");
            return Ok(None);
        };
        match FileWithRefs::from_slice(&bytes) {
            Ok(file) => Ok(Some(file)),
            Err(e) => {
                warn!(name = stored, error = %e, "malformed object, treating as missing");
                Ok(None)
            }
        }
    }
}

/// The name a final name is stored under, if it exists at all. A staged
/// copy from the current batch wins over an older committed file.
fn stored_name<'n>(existing: &ExistenceIndex, staged: &'n StagedBatch, name: &'n str) -> Option<&'n str> {
    if let Some(staged_name) = staged.staged_name(name) {
        if existing.contains(staged_name) {
            return Some(staged_name);
        }
    }
    existing.contains(name).then_some(name)
}
