//! Annotation store.
//!
//! # Responsibility
//! - Serve default-expanded entries for any objective id.
//! - Apply partial entry updates, revision switches, resets and full
//!   snapshot replacement (import).
//! - Notify registered listeners synchronously after each commit.
//!
//! # Invariants
//! - The store is catalog-agnostic: ids are never validated.
//! - Absence of an entry means `Entry::default()`; nothing is pre-populated.
//! - Changing the revision never touches entries.
//! - Persist happens before commit; listeners run after commit.

use crate::model::entry::{Entry, EntryLookup, EntryMap, EntryPatch, Responsibility, Revision};
use crate::repo::snapshot_repo::{RepoResult, Snapshot, SnapshotRepository};
use log::{debug, error, info};
use std::collections::BTreeMap;

const PREF_INCLUDE_IMPLEMENTATION: &str = "include_implementation";

/// Change notification delivered to listeners after a commit.
#[derive(Debug, Clone, Copy)]
pub enum StoreEvent<'a> {
    /// Entries changed through `set_entry` or `reset`.
    EntriesChanged(&'a EntryMap),
    /// Only the revision changed; entries are untouched.
    RevisionChanged(Revision),
    /// The whole state was replaced and reloaded from the durable slot.
    Replaced {
        revision: Revision,
        entries: &'a EntryMap,
    },
}

impl StoreEvent<'_> {
    /// Entries after the change, if the change touched them.
    pub fn entries(&self) -> Option<&EntryMap> {
        match self {
            Self::EntriesChanged(entries) => Some(*entries),
            Self::Replaced { entries, .. } => Some(*entries),
            Self::RevisionChanged(_) => None,
        }
    }
}

/// Handle returned by [`AnnotationStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(&StoreEvent<'_>)>;

/// Persistent objective annotations for one running instance.
pub struct AnnotationStore<R: SnapshotRepository> {
    repo: R,
    revision: Revision,
    entries: EntryMap,
    listeners: BTreeMap<SubscriptionId, Listener>,
    next_subscription: u64,
}

impl<R: SnapshotRepository> AnnotationStore<R> {
    /// Hydrates the store from the durable slot.
    ///
    /// A missing snapshot starts with no entries and the default revision.
    pub fn open(repo: R) -> RepoResult<Self> {
        let snapshot = repo.load_snapshot()?;
        let hydrated = snapshot.is_some();
        let Snapshot { revision, entries } = snapshot.unwrap_or_default();
        info!(
            "event=store_load module=store status=ok hydrated={} revision={} entry_count={}",
            hydrated,
            revision,
            entries.len()
        );
        Ok(Self {
            repo,
            revision,
            entries,
            listeners: BTreeMap::new(),
            next_subscription: 0,
        })
    }

    pub fn revision(&self) -> Revision {
        self.revision
    }

    /// Stored (non-default) entries.
    pub fn entries(&self) -> &EntryMap {
        &self.entries
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot::new(self.revision, self.entries.clone())
    }

    /// Returns the stored entry or the default `{ Customer, "" }`.
    pub fn get_entry(&self, objective_id: &str) -> Entry {
        self.entries.effective_entry(objective_id)
    }

    /// Merges `patch` into the entry for `objective_id`.
    ///
    /// Fields unset in both the patch and the stored entry take default values.
    pub fn set_entry(&mut self, objective_id: &str, patch: EntryPatch) -> RepoResult<()> {
        let merged = Entry::merged(self.entries.get(objective_id), &patch);
        let mut next = self.entries.clone();
        next.insert(objective_id.to_string(), merged);
        Self::persist(&mut self.repo, self.revision, &next, "set_entry")?;
        self.entries = next;

        debug!(
            "event=entry_set module=store status=ok objective_id={} responsibility_changed={} implementation_changed={}",
            objective_id,
            patch.responsibility.is_some(),
            patch.implementation.is_some()
        );
        Self::notify(&mut self.listeners, StoreEvent::EntriesChanged(&self.entries));
        Ok(())
    }

    /// Switches the active revision without touching entries.
    pub fn set_revision(&mut self, revision: Revision) -> RepoResult<()> {
        if revision == self.revision {
            return Ok(());
        }
        Self::persist(&mut self.repo, revision, &self.entries, "set_revision")?;
        let previous = std::mem::replace(&mut self.revision, revision);

        info!(
            "event=revision_set module=store status=ok from={} to={}",
            previous, revision
        );
        Self::notify(&mut self.listeners, StoreEvent::RevisionChanged(revision));
        Ok(())
    }

    /// Clears every entry; the revision is kept.
    pub fn reset(&mut self) -> RepoResult<()> {
        let empty = EntryMap::new();
        Self::persist(&mut self.repo, self.revision, &empty, "reset")?;
        let cleared = std::mem::take(&mut self.entries).len();

        info!(
            "event=store_reset module=store status=ok cleared_count={}",
            cleared
        );
        Self::notify(&mut self.listeners, StoreEvent::EntriesChanged(&self.entries));
        Ok(())
    }

    /// Replaces the whole state and reloads it from the durable slot.
    ///
    /// Nothing of the previous state survives, including entries whose keys
    /// are absent from `snapshot`.
    pub fn replace_snapshot(&mut self, snapshot: Snapshot) -> RepoResult<()> {
        Self::persist(&mut self.repo, snapshot.revision, &snapshot.entries, "replace")?;
        let Snapshot { revision, entries } = self.repo.load_snapshot()?.unwrap_or_default();
        self.revision = revision;
        self.entries = entries;

        info!(
            "event=store_replace module=store status=ok revision={} entry_count={}",
            self.revision,
            self.entries.len()
        );
        Self::notify(
            &mut self.listeners,
            StoreEvent::Replaced {
                revision: self.revision,
                entries: &self.entries,
            },
        );
        Ok(())
    }

    /// Registers a listener called after every committed mutation.
    pub fn subscribe(
        &mut self,
        listener: impl FnMut(&StoreEvent<'_>) + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.listeners.insert(id, Box::new(listener));
        id
    }

    /// Removes a listener; returns `false` when it was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.listeners.remove(&id).is_some()
    }

    pub fn subscriber_count(&self) -> usize {
        self.listeners.len()
    }

    /// Whether reports include the implementation column. Defaults to `true`.
    pub fn include_implementation(&self) -> RepoResult<bool> {
        Ok(self
            .repo
            .load_preference(PREF_INCLUDE_IMPLEMENTATION)?
            .map_or(true, |value| value == "true"))
    }

    pub fn set_include_implementation(&mut self, include: bool) -> RepoResult<()> {
        let value = if include { "true" } else { "false" };
        self.repo.save_preference(PREF_INCLUDE_IMPLEMENTATION, value)
    }

    fn persist(repo: &mut R, revision: Revision, entries: &EntryMap, op: &str) -> RepoResult<()> {
        let snapshot = Snapshot::new(revision, entries.clone());
        repo.save_snapshot(&snapshot).map_err(|err| {
            error!(
                "event=store_persist module=store status=error op={} error={}",
                op, err
            );
            err
        })
    }

    fn notify(listeners: &mut BTreeMap<SubscriptionId, Listener>, event: StoreEvent<'_>) {
        for listener in listeners.values_mut() {
            listener(&event);
        }
    }
}

impl<R: SnapshotRepository> EntryLookup for AnnotationStore<R> {
    fn effective_entry(&self, id: &str) -> Entry {
        self.get_entry(id)
    }

    fn effective_responsibility(&self, id: &str) -> Responsibility {
        self.entries.effective_responsibility(id)
    }
}
