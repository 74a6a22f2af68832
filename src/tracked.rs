//! Lists with optimistic updates that can be rolled back.
//!
//! Every entry carries a `SyncState`. Local changes are applied right away
//! in a pending state and are either committed with the server's answer or
//! rolled back when the request fails, so the list never shows a change the
//! server refused.
use std::error::Error;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Committed,
    /// Created locally, not yet confirmed.
    PendingInsert,
    /// Edited locally; the previous value is kept for rollback.
    PendingUpdate,
    /// Deleted locally, still shown until confirmed.
    PendingRemoval,
}

/// Local handle of an entry, stable across commits.
pub type EntryKey = u64;

#[derive(Debug, Clone, PartialEq)]
pub struct Tracked<T> {
    pub key: EntryKey,
    pub item: T,
    pub state: SyncState,
    previous: Option<T>,
}

impl<T> Tracked<T> {
    pub fn is_pending(&self) -> bool {
        self.state != SyncState::Committed
    }
}

/// Where a pending insert goes: streams show newest first, comment threads oldest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Front,
    Back,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackedList<T> {
    entries: Vec<Tracked<T>>,
    next_key: EntryKey,
}

impl<T> Default for TrackedList<T> {
    fn default() -> Self {
        TrackedList {
            entries: Vec::new(),
            next_key: 1,
        }
    }
}

impl<T: Clone> TrackedList<T> {
    pub fn from_committed(items: Vec<T>) -> Self {
        let mut list = TrackedList::default();
        list.replace_committed(items);
        list
    }

    fn allocate_key(&mut self) -> EntryKey {
        let key = self.next_key;
        self.next_key += 1;
        key
    }

    /// Replaces the committed entries with a fresh server listing. Pending inserts are kept.
    pub fn replace_committed(&mut self, items: Vec<T>) {
        let pending: Vec<Tracked<T>> = self
            .entries
            .drain(..)
            .filter(|e| e.state == SyncState::PendingInsert)
            .collect();
        let mut entries = Vec::with_capacity(items.len() + pending.len());
        for item in items {
            let key = self.allocate_key();
            entries.push(Tracked {
                key,
                item,
                state: SyncState::Committed,
                previous: None,
            });
        }
        entries.extend(pending);
        self.entries = entries;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Tracked<T>] {
        &self.entries
    }

    /// Items to display, pending removals excluded.
    pub fn visible(&self) -> Vec<&T> {
        self.entries
            .iter()
            .filter(|e| e.state != SyncState::PendingRemoval)
            .map(|e| &e.item)
            .collect()
    }

    pub fn get(&self, key: EntryKey) -> Option<&Tracked<T>> {
        self.entries.iter().find(|e| e.key == key)
    }

    /// Key of the first entry matching `predicate`.
    pub fn find_key<P: Fn(&T) -> bool>(&self, predicate: P) -> Option<EntryKey> {
        self.entries.iter().find(|e| predicate(&e.item)).map(|e| e.key)
    }

    fn position(&self, key: EntryKey) -> Option<usize> {
        self.entries.iter().position(|e| e.key == key)
    }

    pub fn insert_pending(&mut self, item: T, position: Position) -> EntryKey {
        let key = self.allocate_key();
        let entry = Tracked {
            key,
            item,
            state: SyncState::PendingInsert,
            previous: None,
        };
        match position {
            Position::Front => self.entries.insert(0, entry),
            Position::Back => self.entries.push(entry),
        }
        key
    }

    /// Applies a local edit to a committed entry. Returns false for unknown or already pending entries.
    pub fn update_pending(&mut self, key: EntryKey, item: T) -> bool {
        match self.position(key) {
            Some(i) if self.entries[i].state == SyncState::Committed => {
                let entry = &mut self.entries[i];
                entry.previous = Some(std::mem::replace(&mut entry.item, item));
                entry.state = SyncState::PendingUpdate;
                true
            }
            _ => false,
        }
    }

    /// Hides a committed entry until the deletion is confirmed.
    pub fn remove_pending(&mut self, key: EntryKey) -> bool {
        match self.position(key) {
            Some(i) if self.entries[i].state == SyncState::Committed => {
                self.entries[i].state = SyncState::PendingRemoval;
                true
            }
            _ => false,
        }
    }

    /// Confirms a pending insert or update with the server's version of the item.
    pub fn commit(&mut self, key: EntryKey, confirmed: T) -> bool {
        match self.position(key) {
            Some(i)
                if matches!(
                    self.entries[i].state,
                    SyncState::PendingInsert | SyncState::PendingUpdate
                ) =>
            {
                let entry = &mut self.entries[i];
                entry.item = confirmed;
                entry.previous = None;
                entry.state = SyncState::Committed;
                true
            }
            _ => false,
        }
    }

    /// Drops an entry whose deletion the server confirmed.
    pub fn commit_removal(&mut self, key: EntryKey) -> Option<T> {
        let i = self.position(key)?;
        if self.entries[i].state != SyncState::PendingRemoval {
            return None;
        }
        Some(self.entries.remove(i).item)
    }

    /// Undoes whatever is pending on the entry: inserts disappear, updates
    /// get their previous value back, removals become visible again.
    pub fn rollback(&mut self, key: EntryKey) -> bool {
        let i = match self.position(key) {
            Some(i) => i,
            None => return false,
        };
        match self.entries[i].state {
            SyncState::Committed => false,
            SyncState::PendingInsert => {
                self.entries.remove(i);
                true
            }
            SyncState::PendingUpdate => {
                let entry = &mut self.entries[i];
                if let Some(previous) = entry.previous.take() {
                    entry.item = previous;
                }
                entry.state = SyncState::Committed;
                true
            }
            SyncState::PendingRemoval => {
                self.entries[i].state = SyncState::Committed;
                true
            }
        }
    }
}

/// Inserts `item` optimistically and runs `send`; commits its answer or rolls back on error.
///
/// The list stays mutably borrowed while `send` blocks. When other code must
/// see the pending entry meanwhile, use the `*_shared` variants below.
pub fn optimistic_insert<T, F>(
    list: &mut TrackedList<T>,
    item: T,
    position: Position,
    send: F,
) -> Result<EntryKey, Box<dyn Error>>
where
    T: Clone,
    F: FnOnce(&T) -> Result<T, Box<dyn Error>>,
{
    let key = list.insert_pending(item.clone(), position);
    match send(&item) {
        Ok(confirmed) => {
            list.commit(key, confirmed);
            Ok(key)
        }
        Err(e) => {
            list.rollback(key);
            Err(e)
        }
    }
}

/// Applies an edit optimistically; the old value comes back if `send` fails.
pub fn optimistic_update<T, F>(
    list: &mut TrackedList<T>,
    key: EntryKey,
    item: T,
    send: F,
) -> Result<(), Box<dyn Error>>
where
    T: Clone,
    F: FnOnce(&T) -> Result<T, Box<dyn Error>>,
{
    if !list.update_pending(key, item.clone()) {
        return Err(format!("entry {} cannot be edited right now", key).into());
    }
    match send(&item) {
        Ok(confirmed) => {
            list.commit(key, confirmed);
            Ok(())
        }
        Err(e) => {
            list.rollback(key);
            Err(e)
        }
    }
}

/// Hides the entry, runs `send`, and drops or restores it depending on the outcome.
pub fn optimistic_remove<T, F>(list: &mut TrackedList<T>, key: EntryKey, send: F) -> Result<T, Box<dyn Error>>
where
    T: Clone,
    F: FnOnce(&T) -> Result<(), Box<dyn Error>>,
{
    let item = match list.get(key) {
        Some(entry) if entry.state == SyncState::Committed => entry.item.clone(),
        _ => return Err(format!("entry {} cannot be removed right now", key).into()),
    };
    list.remove_pending(key);
    match send(&item) {
        Ok(()) => list
            .commit_removal(key)
            .ok_or_else(|| format!("entry {} vanished during removal", key).into()),
        Err(e) => {
            list.rollback(key);
            Err(e)
        }
    }
}

fn lock<T>(list: &Mutex<TrackedList<T>>) -> Result<MutexGuard<'_, TrackedList<T>>, Box<dyn Error>> {
    list.lock().map_err(|_| "tracked list lock poisoned".into())
}

/// Like `optimistic_insert`, but the lock is released while `send` runs so
/// readers see the pending entry.
pub fn optimistic_insert_shared<T, F>(
    list: &Mutex<TrackedList<T>>,
    item: T,
    position: Position,
    send: F,
) -> Result<EntryKey, Box<dyn Error>>
where
    T: Clone,
    F: FnOnce(&T) -> Result<T, Box<dyn Error>>,
{
    let key = lock(list)?.insert_pending(item.clone(), position);
    let outcome = send(&item);
    let mut guard = lock(list)?;
    match outcome {
        Ok(confirmed) => {
            guard.commit(key, confirmed);
            Ok(key)
        }
        Err(e) => {
            guard.rollback(key);
            Err(e)
        }
    }
}

/// Like `optimistic_update`, without holding the lock during `send`.
pub fn optimistic_update_shared<T, F>(
    list: &Mutex<TrackedList<T>>,
    key: EntryKey,
    item: T,
    send: F,
) -> Result<(), Box<dyn Error>>
where
    T: Clone,
    F: FnOnce(&T) -> Result<T, Box<dyn Error>>,
{
    if !lock(list)?.update_pending(key, item.clone()) {
        return Err(format!("entry {} cannot be edited right now", key).into());
    }
    let outcome = send(&item);
    let mut guard = lock(list)?;
    match outcome {
        Ok(confirmed) => {
            guard.commit(key, confirmed);
            Ok(())
        }
        Err(e) => {
            guard.rollback(key);
            Err(e)
        }
    }
}

/// Like `optimistic_remove`, without holding the lock during `send`.
pub fn optimistic_remove_shared<T, F>(list: &Mutex<TrackedList<T>>, key: EntryKey, send: F) -> Result<T, Box<dyn Error>>
where
    T: Clone,
    F: FnOnce(&T) -> Result<(), Box<dyn Error>>,
{
    let item = {
        let mut guard = lock(list)?;
        let item = match guard.get(key) {
            Some(entry) if entry.state == SyncState::Committed => entry.item.clone(),
            _ => return Err(format!("entry {} cannot be removed right now", key).into()),
        };
        guard.remove_pending(key);
        item
    };
    let outcome = send(&item);
    let mut guard = lock(list)?;
    match outcome {
        Ok(()) => guard
            .commit_removal(key)
            .ok_or_else(|| format!("entry {} vanished during removal", key).into()),
        Err(e) => {
            guard.rollback(key);
            Err(e)
        }
    }
}
