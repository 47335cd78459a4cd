//! Decides which external data files must be downloaded and which may be
//! purged.
//!
//! The manager scans its data root once for link sidecars. Each call to
//! [`Manager::prepare_downloads`] takes a reference on every external file a
//! batch of entities needs and returns the jobs to fetch the stale ones,
//! plus a [`Release`] that drops those references again. Files with no
//! outstanding references are [purgeable](Manager::purgeable).

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use extdata_fs::{atomic_write, remove_file_if_exists};
use tracing::{debug, info, warn};

use crate::entity::Entity;
use crate::error::ManagerError;
use crate::link::{LINK_SUFFIX, ResolvedLink, error_path, link_path};
use crate::verify::verify;

/// One object to fetch and every local path that should receive it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadJob {
    pub link:  ResolvedLink,
    /// Absolute destination paths, sorted.
    pub dests: Vec<PathBuf>,
}

type InUse = Arc<Mutex<HashMap<PathBuf, usize>>>;

fn lock(in_use: &InUse) -> MutexGuard<'_, HashMap<PathBuf, usize>> {
    in_use.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct Manager {
    data_root:     PathBuf,
    artifacts_url: String,
    /// Every destination with a link sidecar under `data_root`, sorted.
    all:           Vec<PathBuf>,
    in_use:        InUse,
}

impl Manager {
    /// Scans `data_root` for link sidecars.
    ///
    /// A missing `data_root` yields an empty manager; any other scan failure
    /// is an error.
    pub fn new(
        data_root: impl Into<PathBuf>,
        artifacts_url: impl Into<String>,
    ) -> Result<Self, ManagerError> {
        let data_root = data_root.into();
        let mut all = Vec::new();
        match std::fs::metadata(&data_root) {
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(root = %data_root.display(), "data root does not exist");
            }
            Err(source) => {
                return Err(ManagerError::Walk {
                    path: data_root,
                    source,
                });
            }
            Ok(_) => walk(&data_root, &mut all)?,
        }
        all.sort();

        Ok(Self {
            data_root,
            artifacts_url: artifacts_url.into(),
            all,
            in_use: Arc::default(),
        })
    }

    pub fn data_root(&self) -> &Path { &self.data_root }

    pub fn artifacts_url(&self) -> &str { &self.artifacts_url }

    /// Destinations found while scanning, sorted.
    pub fn known_destinations(&self) -> &[PathBuf] { &self.all }

    /// Absolute path of data file `name` of `entity`.
    pub fn destination<E: Entity + ?Sized>(&self, entity: &E, name: &str) -> PathBuf {
        self.data_root.join(entity.data_dir()).join(name)
    }

    /// Computes the download jobs `entities` need and takes a reference on
    /// each external file they declare.
    ///
    /// Per-file problems never fail the batch: the file gets a
    /// `.external-error` sidecar describing the problem and is skipped. Stale
    /// files are deleted right away, even if the refetch later fails. Jobs are
    /// sorted by URL.
    ///
    /// The returned [`Release`] must be released once the entities are done
    /// with the files; dropping it has the same effect.
    pub fn prepare_downloads<E: Entity>(&self, entities: &[E]) -> (Vec<DownloadJob>, Release) {
        let mut links = Vec::new();
        let mut errors = 0;
        for entity in entities {
            for name in entity.data() {
                let dest = self.destination(entity, name);
                if let Err(e) = remove_file_if_exists(error_path(&dest)) {
                    warn!(dest = %dest.display(), error = %e, "failed to clear old error file");
                }

                match ResolvedLink::load(&link_path(&dest), &self.artifacts_url) {
                    Ok(Some(link)) => links.push((dest, link)),
                    Ok(None) => {}
                    Err(e) => {
                        errors += 1;
                        record_error(&dest, &format!("failed to load external data link: {e}"));
                    }
                }
            }
        }

        // References are taken before any stale file is deleted.
        let held: Vec<PathBuf> = links.iter().map(|(dest, _)| dest.clone()).collect();
        {
            let mut in_use = lock(&self.in_use);
            for dest in &held {
                *in_use.entry(dest.clone()).or_default() += 1;
            }
        }

        let mut jobs: BTreeMap<String, (ResolvedLink, BTreeSet<PathBuf>)> = BTreeMap::new();
        for (dest, link) in links {
            if !is_stale(&dest, &link) {
                continue;
            }

            match jobs.entry(link.computed_url().to_string()) {
                Entry::Vacant(v) => {
                    v.insert((link, BTreeSet::from([dest])));
                }
                Entry::Occupied(mut o) => {
                    let (existing, dests) = o.get_mut();
                    if existing.data() == link.data() {
                        dests.insert(dest);
                    } else {
                        errors += 1;
                        record_error(
                            &dest,
                            &format!(
                                "conflicting external data links for {}: {:?} vs. {:?}",
                                link.computed_url(),
                                existing.data(),
                                link.data()
                            ),
                        );
                    }
                }
            }
        }

        if errors > 0 {
            warn!(errors, "some external data files could not be prepared");
        }
        let jobs: Vec<DownloadJob> = jobs
            .into_values()
            .filter(|(_, dests)| !dests.is_empty())
            .map(|(link, dests)| DownloadJob {
                link,
                dests: dests.into_iter().collect(),
            })
            .collect();
        info!(jobs = jobs.len(), "external data download jobs prepared");

        let release = Release {
            in_use: Arc::clone(&self.in_use),
            held,
        };
        (jobs, release)
    }

    /// Known destinations that exist on disk and are not referenced by any
    /// outstanding [`Release`], sorted.
    pub fn purgeable(&self) -> Vec<PathBuf> {
        let in_use = lock(&self.in_use);
        self.all
            .iter()
            .filter(|dest| in_use.get(*dest).copied().unwrap_or(0) == 0)
            .filter(|dest| dest.exists())
            .cloned()
            .collect()
    }

    /// Error sidecar contents for every declared file of `entities` that has
    /// one, i.e. the files these entities will find unavailable.
    pub fn failures<E: Entity>(&self, entities: &[E]) -> Vec<(PathBuf, String)> {
        let mut failures = Vec::new();
        for entity in entities {
            for name in entity.data() {
                let dest = self.destination(entity, name);
                if let Ok(msg) = std::fs::read_to_string(error_path(&dest)) {
                    failures.push((dest, msg));
                }
            }
        }
        failures
    }
}

/// References taken by one [`Manager::prepare_downloads`] call.
#[must_use = "dropping a Release immediately makes its files purgeable"]
pub struct Release {
    in_use: InUse,
    held:   Vec<PathBuf>,
}

impl Release {
    /// Drops the references. Consuming `self` makes a double release impossible.
    pub fn release(mut self) { self.release_held(); }

    fn release_held(&mut self) {
        if self.held.is_empty() {
            return;
        }
        let mut in_use = lock(&self.in_use);
        for dest in self.held.drain(..) {
            if let Some(count) = in_use.get_mut(&dest) {
                *count -= 1;
                if *count == 0 {
                    in_use.remove(&dest);
                }
            }
        }
    }
}

impl Drop for Release {
    fn drop(&mut self) { self.release_held(); }
}

/// Missing or mismatching files are stale. Stale files that exist are
/// deleted so a known-bad file is never left in place.
fn is_stale(dest: &Path, link: &ResolvedLink) -> bool {
    match std::fs::symlink_metadata(dest) {
        Err(e) if e.kind() == ErrorKind::NotFound => return true,
        Err(e) => debug!(dest = %dest.display(), error = %e, "cannot stat data file"),
        Ok(_) => match verify(dest, link) {
            Ok(()) => return false,
            Err(e) => debug!(dest = %dest.display(), error = %e, "data file is stale"),
        },
    }
    if let Err(e) = remove_file_if_exists(dest) {
        warn!(dest = %dest.display(), error = %e, "failed to remove stale data file");
    }
    true
}

/// Writes the error sidecar for `dest` and logs the failure.
pub(crate) fn record_error(dest: &Path, msg: &str) {
    warn!(dest = %dest.display(), "{msg}");
    if let Err(e) = atomic_write(error_path(dest), msg.as_bytes()) {
        warn!(dest = %dest.display(), error = %e, "failed to write error file");
    }
}

fn walk(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), ManagerError> {
    let walk_err = |source| ManagerError::Walk {
        path: dir.to_path_buf(),
        source,
    };
    for entry in std::fs::read_dir(dir).map_err(walk_err)? {
        let entry = entry.map_err(walk_err)?;
        let path = entry.path();
        if entry.file_type().map_err(walk_err)?.is_dir() {
            walk(&path, out)?;
            continue;
        }
        let name = entry.file_name();
        if let Some(dest_name) = name.to_str().and_then(|n| n.strip_suffix(LINK_SUFFIX))
            && !dest_name.is_empty()
        {
            out.push(path.with_file_name(dest_name));
        }
    }
    Ok(())
}
