use bytes::Bytes;
use itertools::Itertools;
use num_traits::CheckedAdd;
use rand::seq::IteratorRandom;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::ops::Deref;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};
use strum_macros::{Display, IntoStaticStr};
use thiserror::Error as ThisError;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Notify;
use tokio::time::{sleep_until, Duration, Instant};
use tracing::debug;

use crate::replication::Change;
use crate::seed::SeedEntry;
use crate::snapshot::{self, FormatError, Snapshot};

pub const DEFAULT_DB: &str = "0";

/// Longest TTL kept as an exact deadline. Longer ones are clamped to it.
const MAX_TTL: Duration = Duration::from_secs(100 * 365 * 86_400);

/// The Store holds every database of the node together with its expiry table, the version counter
/// and the operation counters. Keys with a TTL are removed by a background task when they expire.
/// The store is shared and cloned cheaply using reference counting; every operation runs under one
/// exclusive lock.
#[derive(Clone)]
pub struct Store {
    inner: Arc<InnerStore>,
}

impl Store {
    /// Creates an empty store. `authority` marks the node that accepts client writes; expired keys
    /// are only recorded as deletions there.
    pub fn new(authority: bool) -> Store {
        let mut dbs = BTreeMap::new();
        dbs.insert(DEFAULT_DB.to_string(), HashMap::new());

        let state = State {
            dbs,
            expires: BTreeMap::new(),
            ttls: BTreeSet::new(),
            version: 0,
            total_operations: 0,
            total_change_operations: 0,
            save_mark: 0,
            last_save: 0,
            changed: false,
            authority,
            journal: Journal::default(),
        };

        let waker = Notify::new();
        let inner = Arc::new(InnerStore {
            state: Mutex::new(state),
            waker,
        });

        tokio::spawn({
            let inner = inner.clone();
            async move { remove_expired_keys(inner).await }
        });

        Self { inner }
    }

    /// Writes a snapshot of the whole store to `path`.
    pub fn save(&self, path: &Path) -> Result<(), FormatError> {
        let (snapshot, mark) = {
            let store = self.lock();
            (store.snapshot(), store.state.total_change_operations)
        };

        snapshot::write_file(path, &snapshot.encode()?)?;
        self.lock().mark_saved(mark);
        debug!(path = %path.display(), "dumped database to backing store");

        Ok(())
    }

    /// Replaces the contents of the store with the snapshot stored at `path`.
    pub fn load(&self, path: &Path) -> Result<(), FormatError> {
        let snapshot = snapshot::read_file(path)?;
        self.lock().restore(snapshot);
        Ok(())
    }
}

pub struct InnerStore {
    state: Mutex<State>,
    waker: Notify,
}

impl InnerStore {
    pub fn lock(&self) -> InnerStoreLocked<'_> {
        // A panic while holding the lock never leaves a half-applied primitive behind that later
        // commands could not cope with, so a poisoned lock is still usable.
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        InnerStoreLocked {
            state,
            waker: &self.waker,
        }
    }
}

impl Deref for Store {
    type Target = InnerStore;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    String(Bytes),
    List(VecDeque<Bytes>),
    Set(BTreeSet<Bytes>),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::String(_) => ValueType::String,
            Value::List(_) => ValueType::List,
            Value::Set(_) => ValueType::Set,
        }
    }

    fn size(&self) -> usize {
        match self {
            Value::String(data) => data.len(),
            Value::List(items) => items.iter().map(Bytes::len).sum(),
            Value::Set(members) => members.iter().map(Bytes::len).sum(),
        }
    }
}

#[derive(Clone, Copy, Debug, Display, IntoStaticStr, PartialEq, Eq)]
#[strum(serialize_all = "lowercase")]
pub enum ValueType {
    None,
    String,
    List,
    Set,
}

/// Which end of a list an operation works on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum End {
    Head,
    Tail,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SortOptions {
    pub by: Option<String>,
    pub get: Option<String>,
    pub limit: Option<(usize, usize)>,
    pub descending: bool,
    pub alpha: bool,
}

#[derive(Debug, ThisError, PartialEq)]
pub enum StoreError {
    #[error("no such key")]
    NoSuchKey,
    #[error("Operation against a key holding the wrong kind of value")]
    WrongType,
    #[error("{0} doesn't exist")]
    Missing(String),
    #[error("{key} not known in {db}")]
    NotKnown { key: String, db: String },
    #[error("{key} already known in {db}")]
    AlreadyExists { key: String, db: String },
    #[error("same names")]
    SameName,
    #[error("value is not an integer or out of range")]
    NotAnInteger,
    #[error("index out of range")]
    IndexOutOfRange,
    #[error("version mismatch")]
    VersionMismatch { expected: u64, actual: u64 },
    #[error("invalid pattern [{0}]")]
    InvalidPattern(String),
    #[error("{0}")]
    Sort(String),
    #[error("invalid snapshot [{0}]")]
    Snapshot(String),
}

/// Counters reported by INFO and LASTSAVE.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Stats {
    pub version: u64,
    pub total_operations: u64,
    pub total_change_operations: u64,
    pub changes_since_save: u64,
    pub last_save: u64,
    pub used_memory: usize,
}

type Key = String;
type Db = HashMap<Key, Value>;

#[derive(Default)]
struct Journal {
    tx: Option<UnboundedSender<Change>>,
    enabled: bool,
}

pub struct State {
    dbs: BTreeMap<String, Db>,
    expires: BTreeMap<String, HashMap<Key, Instant>>,
    ttls: BTreeSet<(Instant, String, Key)>,
    version: u64,
    total_operations: u64,
    total_change_operations: u64,
    save_mark: u64,
    last_save: u64,
    changed: bool,
    authority: bool,
    journal: Journal,
}

pub struct InnerStoreLocked<'a> {
    state: MutexGuard<'a, State>,
    waker: &'a Notify,
}

impl<'a> InnerStoreLocked<'a> {
    pub fn version(&self) -> u64 {
        self.state.version
    }

    pub fn is_authority(&self) -> bool {
        self.state.authority
    }

    pub fn stats(&self) -> Stats {
        Stats {
            version: self.state.version,
            total_operations: self.state.total_operations,
            total_change_operations: self.state.total_change_operations,
            changes_since_save: self.changes_since_save(),
            last_save: self.state.last_save,
            used_memory: self.used_memory(),
        }
    }

    pub fn record_operation(&mut self) {
        self.state.total_operations += 1;
    }

    pub fn changes_since_save(&self) -> u64 {
        self.state
            .total_change_operations
            .saturating_sub(self.state.save_mark)
    }

    /// Returns whether anything changed since the last call and clears the flag.
    pub fn take_changed(&mut self) -> bool {
        std::mem::take(&mut self.state.changed)
    }

    pub fn last_save(&self) -> u64 {
        self.state.last_save
    }

    /// Connects the change stream consumed by replica links. Nothing is recorded until the journal
    /// is enabled.
    pub fn attach_journal(&mut self, tx: UnboundedSender<Change>) {
        self.state.journal.tx = Some(tx);
    }

    pub fn set_journal_enabled(&mut self, enabled: bool) {
        self.state.journal.enabled = enabled;
    }

    /// Records a command that replicas must apply but that carries no version, such as SAVE.
    pub fn journal_unversioned(&mut self, db: &str, command: &str) {
        self.send_change(Change {
            db: db.to_string(),
            command: command.to_string(),
            args: Vec::new(),
            version: None,
        });
    }

    pub fn value_type(&self, db: &str, key: &str) -> ValueType {
        self.value(db, key)
            .map(Value::value_type)
            .unwrap_or(ValueType::None)
    }

    pub fn exists(&self, db: &str, key: &str) -> bool {
        self.value(db, key).is_some()
    }

    pub fn size(&self, db: &str) -> usize {
        self.state.dbs.get(db).map_or(0, HashMap::len)
    }

    pub fn db_names(&self) -> impl Iterator<Item = &String> {
        self.state.dbs.keys()
    }

    /// Makes sure `db` exists without counting as a change.
    pub fn ensure_db(&mut self, db: &str) {
        self.db_mut(db);
    }

    /// Makes sure `db` exists. Counted as a change even when the database is already present.
    pub fn select(&mut self, db: &str) {
        self.db_mut(db);
        self.commit(db, "select", vec![arg(db)]);
    }

    pub fn get(&self, db: &str, key: &str) -> Option<Bytes> {
        match self.value(db, key) {
            Some(Value::String(data)) => Some(data.clone()),
            _ => None,
        }
    }

    pub fn set(&mut self, db: &str, key: String, data: Bytes) {
        let args = vec![arg(&key), data.clone()];
        self.clear_expire(db, &key);
        self.db_mut(db).insert(key, Value::String(data));
        self.commit(db, "set", args);
    }

    pub fn getset(&mut self, db: &str, key: String, data: Bytes) -> Option<Bytes> {
        let old = self.get(db, &key);
        self.set(db, key, data);
        old
    }

    pub fn setnx(&mut self, db: &str, key: String, data: Bytes) -> bool {
        let absent = !self.exists(db, &key);
        if absent {
            self.clear_expire(db, &key);
            self.db_mut(db).insert(key.clone(), Value::String(data.clone()));
        }
        self.commit(db, "setnx", vec![arg(&key), data]);
        absent
    }

    /// Adds `delta` to the integer stored at `key`. A missing or non-numeric value counts as 0.
    pub fn add(&mut self, db: &str, key: String, delta: i64) -> Result<i64, StoreError> {
        let current = self
            .get(db, &key)
            .and_then(|data| parse_number::<i64>(&data))
            .unwrap_or_default();
        let value = checked_add(current, delta)?;

        self.clear_expire(db, &key);
        let args = vec![arg(&key), arg(&delta.to_string())];
        self.db_mut(db)
            .insert(key, Value::String(Bytes::from(value.to_string())));
        self.commit(db, "incrby", args);

        Ok(value)
    }

    /// Removes every existing key in `keys` and returns how many there were.
    pub fn remove(&mut self, db: &str, keys: &[String]) -> usize {
        let removed = keys.iter().filter(|key| self.discard(db, key)).count();
        self.commit(db, "del", keys.iter().map(|key| arg(key)).collect());
        removed
    }

    pub fn rename(&mut self, db: &str, from: String, to: String) -> Result<(), StoreError> {
        if from == to {
            return Err(StoreError::SameName);
        }
        let value = self
            .db_mut(db)
            .remove(&from)
            .ok_or_else(|| StoreError::Missing(from.clone()))?;
        self.clear_expire(db, &from);
        self.clear_expire(db, &to);

        let args = vec![arg(&from), arg(&to)];
        self.db_mut(db).insert(to, value);
        self.commit(db, "rename", args);

        Ok(())
    }

    /// Renames `from` only when `to` does not exist yet.
    pub fn renamenx(&mut self, db: &str, from: String, to: String) -> Result<bool, StoreError> {
        if self.exists(db, &to) {
            self.commit(db, "renamenx", vec![arg(&from), arg(&to)]);
            return Ok(false);
        }
        if from == to {
            return Err(StoreError::SameName);
        }
        let value = self
            .db_mut(db)
            .remove(&from)
            .ok_or_else(|| StoreError::Missing(from.clone()))?;
        self.clear_expire(db, &from);

        let args = vec![arg(&from), arg(&to)];
        self.db_mut(db).insert(to, value);
        self.commit(db, "renamenx", args);

        Ok(true)
    }

    /// Moves `key` from `db` into `target`. The key must exist in `db` and must not exist in
    /// `target`.
    pub fn move_key(&mut self, db: &str, key: String, target: &str) -> Result<(), StoreError> {
        self.db_mut(target);
        if !self.exists(db, &key) {
            return Err(StoreError::NotKnown {
                key,
                db: db.to_string(),
            });
        }
        if self.exists(target, &key) {
            return Err(StoreError::AlreadyExists {
                key,
                db: target.to_string(),
            });
        }

        let args = vec![arg(&key), arg(target)];
        self.clear_expire(db, &key);
        if let Some(value) = self.db_mut(db).remove(&key) {
            self.db_mut(target).insert(key, value);
        }
        self.commit(db, "move", args);

        Ok(())
    }

    /// Sets a TTL on an existing key. A key that already has a TTL keeps it.
    pub fn expire(&mut self, db: &str, key: String, seconds: i64) -> Result<(), StoreError> {
        if !self.exists(db, &key) {
            return Err(StoreError::NoSuchKey);
        }

        let args = vec![arg(&key), arg(&seconds.to_string())];
        if self.deadline(db, &key).is_none() {
            let ttl = Duration::from_secs(seconds.max(0) as u64);
            self.set_expire(db, key, deadline_after(Instant::now(), ttl));
        }
        self.commit(db, "expire", args);

        Ok(())
    }

    /// Remaining time to live of `key` in whole seconds, rounded up, or -1 when the key has no TTL.
    pub fn ttl(&self, db: &str, key: &str) -> i64 {
        match self.deadline(db, key) {
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                ((remaining.as_millis() + 999) / 1000) as i64
            }
            None => -1,
        }
    }

    /// Names in `db` matching the glob `pattern`, sorted and joined by spaces.
    pub fn keys(&self, db: &str, pattern: &str) -> String {
        self.matching_keys(db, |key| glob_match::glob_match(pattern, key))
    }

    /// Names in `db` that the regular expression `pattern` matches at their start.
    pub fn re(&self, db: &str, pattern: &str) -> Result<String, StoreError> {
        let regex = Regex::new(&format!("^(?:{pattern})"))
            .map_err(|_| StoreError::InvalidPattern(pattern.to_string()))?;
        Ok(self.matching_keys(db, |key| regex.is_match(key)))
    }

    pub fn random_key(&self, db: &str) -> Option<String> {
        self.state
            .dbs
            .get(db)?
            .keys()
            .choose(&mut rand::thread_rng())
            .cloned()
    }

    pub fn flush(&mut self, db: &str) {
        self.state.dbs.insert(db.to_string(), HashMap::new());
        self.state.expires.remove(db);
        self.state.ttls.retain(|(_, ttl_db, _)| ttl_db != db);
        self.commit(db, "flushdb", Vec::new());
    }

    pub fn flush_all(&mut self, db: &str) {
        self.state.dbs.clear();
        self.state.dbs.insert(DEFAULT_DB.to_string(), HashMap::new());
        self.state.expires.clear();
        self.state.ttls.clear();
        self.commit(db, "flushall", Vec::new());
    }

    pub fn push(&mut self, db: &str, key: String, item: Bytes, end: End) -> Result<(), StoreError> {
        let args = vec![arg(&key), item.clone()];
        let list = match self
            .db_mut(db)
            .entry(key)
            .or_insert_with(|| Value::List(VecDeque::new()))
        {
            Value::List(list) => list,
            _ => return Err(StoreError::WrongType),
        };

        let command = match end {
            End::Head => {
                list.push_front(item);
                "lpush"
            }
            End::Tail => {
                list.push_back(item);
                "rpush"
            }
        };
        self.commit(db, command, args);

        Ok(())
    }

    pub fn llen(&self, db: &str, key: &str) -> Result<usize, StoreError> {
        Ok(self.list_at(db, key)?.map_or(0, VecDeque::len))
    }

    /// Items between `start` and `end` inclusive. Negative indices count from the end.
    pub fn lrange(&self, db: &str, key: &str, start: i64, end: i64) -> Result<Vec<Bytes>, StoreError> {
        let list = match self.list_at(db, key)? {
            Some(list) => list,
            None => return Ok(Vec::new()),
        };

        Ok(match normalize_range(list.len(), start, end) {
            Some((start, end)) => list.range(start..=end).cloned().collect(),
            None => Vec::new(),
        })
    }

    /// Keeps only the items between `start` and `end` inclusive.
    pub fn ltrim(&mut self, db: &str, key: String, start: i64, end: i64) -> Result<(), StoreError> {
        let list = self.list_at_mut(db, &key)?.ok_or(StoreError::NoSuchKey)?;

        match normalize_range(list.len(), start, end) {
            Some((start, end)) => {
                list.truncate(end + 1);
                list.drain(..start);
            }
            None => list.clear(),
        }
        self.commit(
            db,
            "ltrim",
            vec![arg(&key), arg(&start.to_string()), arg(&end.to_string())],
        );

        Ok(())
    }

    pub fn lindex(&self, db: &str, key: &str, index: i64) -> Result<Option<Bytes>, StoreError> {
        let list = match self.list_at(db, key)? {
            Some(list) => list,
            None => return Ok(None),
        };
        Ok(normalize_index(list.len(), index).and_then(|index| list.get(index).cloned()))
    }

    pub fn lset(&mut self, db: &str, key: String, index: i64, item: Bytes) -> Result<(), StoreError> {
        let args = vec![arg(&key), arg(&index.to_string()), item.clone()];
        let list = self.list_at_mut(db, &key)?.ok_or(StoreError::NoSuchKey)?;
        let slot = normalize_index(list.len(), index)
            .and_then(|index| list.get_mut(index))
            .ok_or(StoreError::IndexOutOfRange)?;
        *slot = item;
        self.commit(db, "lset", args);

        Ok(())
    }

    /// Removes occurrences of `item`. A positive `count` removes the first `count` matches, a
    /// negative one the last `|count|` matches and zero removes all of them. Returns the number
    /// of removed items.
    pub fn lrem(&mut self, db: &str, key: String, count: i64, item: Bytes) -> Result<usize, StoreError> {
        let args = vec![arg(&key), arg(&count.to_string()), item.clone()];
        let list = self.list_at_mut(db, &key)?.ok_or(StoreError::NoSuchKey)?;

        let mut budget = match count {
            0 => usize::MAX,
            count => count.unsigned_abs() as usize,
        };
        let mut keep = |candidate: &Bytes| {
            if *candidate == item && budget > 0 {
                budget -= 1;
                false
            } else {
                true
            }
        };

        let before = list.len();
        let kept: VecDeque<Bytes> = if count >= 0 {
            list.drain(..).filter(|candidate| keep(candidate)).collect()
        } else {
            let mut kept: VecDeque<Bytes> = list
                .drain(..)
                .rev()
                .filter(|candidate| keep(candidate))
                .collect();
            kept.make_contiguous().reverse();
            kept
        };
        let removed = before - kept.len();
        *list = kept;
        self.commit(db, "lrem", args);

        Ok(removed)
    }

    pub fn pop(&mut self, db: &str, key: String, end: End) -> Result<Option<Bytes>, StoreError> {
        let item = match self.list_at_mut(db, &key)? {
            Some(list) => match end {
                End::Head => list.pop_front(),
                End::Tail => list.pop_back(),
            },
            None => None,
        };
        let command = match end {
            End::Head => "lpop",
            End::Tail => "rpop",
        };
        self.commit(db, command, vec![arg(&key)]);

        Ok(item)
    }

    pub fn sadd(&mut self, db: &str, key: String, member: Bytes) -> Result<bool, StoreError> {
        let args = vec![arg(&key), member.clone()];
        let set = match self
            .db_mut(db)
            .entry(key)
            .or_insert_with(|| Value::Set(BTreeSet::new()))
        {
            Value::Set(set) => set,
            _ => return Err(StoreError::WrongType),
        };
        let added = set.insert(member);
        self.commit(db, "sadd", args);

        Ok(added)
    }

    pub fn srem(&mut self, db: &str, key: String, member: Bytes) -> Result<bool, StoreError> {
        let args = vec![arg(&key), member.clone()];
        let removed = match self.set_at_mut(db, &key)? {
            Some(set) => set.remove(&member),
            None => false,
        };
        self.commit(db, "srem", args);

        Ok(removed)
    }

    pub fn scard(&self, db: &str, key: &str) -> Result<usize, StoreError> {
        Ok(self.set_at(db, key)?.map_or(0, BTreeSet::len))
    }

    pub fn sismember(&self, db: &str, key: &str, member: &[u8]) -> Result<bool, StoreError> {
        Ok(self.set_at(db, key)?.is_some_and(|set| set.contains(member)))
    }

    pub fn smembers(&self, db: &str, key: &str) -> Result<Vec<Bytes>, StoreError> {
        Ok(self
            .set_at(db, key)?
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }

    /// Removes a random member. Recorded as the SREM it amounts to, so replicas remove the same
    /// member.
    pub fn spop(&mut self, db: &str, key: String) -> Result<Option<Bytes>, StoreError> {
        let member = match self.set_at_mut(db, &key)? {
            Some(set) => {
                let member = set.iter().choose(&mut rand::thread_rng()).cloned();
                if let Some(member) = &member {
                    set.remove(member);
                }
                member
            }
            None => None,
        };

        match &member {
            Some(member) => self.commit(db, "srem", vec![arg(&key), member.clone()]),
            None => self.commit(db, "spop", vec![arg(&key)]),
        }

        Ok(member)
    }

    /// Moves `member` from the set at `source` into the set at `destination`, creating it if
    /// needed. Returns whether `member` was present in `source`.
    pub fn smove(
        &mut self,
        db: &str,
        source: String,
        destination: String,
        member: Bytes,
    ) -> Result<bool, StoreError> {
        // Both keys must be sets when they exist.
        self.set_at(db, &destination)?;
        let moved = match self.set_at_mut(db, &source)? {
            Some(set) => set.remove(&member),
            None => false,
        };

        let args = vec![arg(&source), arg(&destination), member.clone()];
        if moved {
            if let Value::Set(set) = self
                .db_mut(db)
                .entry(destination)
                .or_insert_with(|| Value::Set(BTreeSet::new()))
            {
                set.insert(member);
            }
        }
        self.commit(db, "smove", args);

        Ok(moved)
    }

    /// Intersection of the sets at `keys`. A missing or non-set operand makes the result empty.
    pub fn sinter(&self, db: &str, keys: &[String]) -> BTreeSet<Bytes> {
        let mut result: Option<BTreeSet<Bytes>> = None;
        for key in keys {
            let set = match self.value(db, key) {
                Some(Value::Set(set)) => set,
                _ => return BTreeSet::new(),
            };
            result = Some(match result {
                None => set.clone(),
                Some(acc) => acc.intersection(set).cloned().collect(),
            });
        }
        result.unwrap_or_default()
    }

    /// Union of the sets at `keys`. Missing and non-set operands are skipped.
    pub fn sunion(&self, db: &str, keys: &[String]) -> BTreeSet<Bytes> {
        self.operand_sets(db, keys).flatten().cloned().collect()
    }

    /// Members of the first set operand that are in none of the following ones. Missing and
    /// non-set operands are skipped.
    pub fn sdiff(&self, db: &str, keys: &[String]) -> BTreeSet<Bytes> {
        let mut sets = self.operand_sets(db, keys);
        let mut result = sets.next().cloned().unwrap_or_default();
        for set in sets {
            result.retain(|member| !set.contains(member));
        }
        result
    }

    pub fn sinterstore(&mut self, db: &str, destination: String, keys: &[String]) {
        let result = self.sinter(db, keys);
        self.store_set(db, "sinterstore", destination, keys, result);
    }

    pub fn sunionstore(&mut self, db: &str, destination: String, keys: &[String]) {
        let result = self.sunion(db, keys);
        self.store_set(db, "sunionstore", destination, keys, result);
    }

    pub fn sdiffstore(&mut self, db: &str, destination: String, keys: &[String]) {
        let result = self.sdiff(db, keys);
        self.store_set(db, "sdiffstore", destination, keys, result);
    }

    /// Sorts the items of the list or set at `key`. Items compare as numbers unless
    /// `options.alpha` is set. Entries of the result are `None` where a GET pattern points at a
    /// missing key.
    pub fn sort(&self, db: &str, key: &str, options: &SortOptions) -> Result<Vec<Option<Bytes>>, StoreError> {
        let items: Vec<Bytes> = match self.value(db, key) {
            Some(Value::List(list)) => list.iter().cloned().collect(),
            Some(Value::Set(set)) => set.iter().cloned().collect(),
            Some(Value::String(_)) => return Err(StoreError::WrongType),
            None => return Err(StoreError::NoSuchKey),
        };

        // A BY pattern without a wildcard does not reference any key and is ignored.
        let by = options.by.as_deref().filter(|pattern| pattern.contains('*'));
        let mut weighted = Vec::with_capacity(items.len());
        for item in items {
            let weight = match by {
                Some(pattern) => {
                    let name = substitute(pattern, &item);
                    self.get(db, &name).ok_or_else(|| {
                        StoreError::Sort(format!("sort aborted because of missing key '{name}'"))
                    })?
                }
                None => item.clone(),
            };
            weighted.push((weight, item));
        }

        if options.alpha {
            weighted.sort_by(|(a, _), (b, _)| a.cmp(b));
        } else {
            let mut numeric = Vec::with_capacity(weighted.len());
            for (weight, item) in weighted {
                let number = parse_number::<f64>(&weight).ok_or_else(|| {
                    StoreError::Sort(format!(
                        "sort value '{}' is not a number",
                        String::from_utf8_lossy(&weight)
                    ))
                })?;
                numeric.push((number, item));
            }
            numeric.sort_by(|(a, _), (b, _)| a.total_cmp(b));
            weighted = numeric
                .into_iter()
                .map(|(_, item)| (Bytes::new(), item))
                .collect();
        }

        if options.descending {
            weighted.reverse();
        }

        let (start, count) = options.limit.unwrap_or((0, usize::MAX));
        Ok(weighted
            .into_iter()
            .skip(start)
            .take(count)
            .map(|(_, item)| match options.get.as_deref() {
                Some("#") | None => Some(item),
                Some(pattern) => self.get(db, &substitute(pattern, &item)),
            })
            .collect())
    }

    /// Current version and snapshot bytes, as shipped to a newly attached replica.
    pub fn dump(&self) -> Result<(u64, Bytes), FormatError> {
        Ok((self.state.version, self.snapshot().encode()?))
    }

    /// Replaces the whole store with the snapshot in `data` and adopts `version`.
    pub fn replace(&mut self, version: u64, data: &[u8]) -> Result<(), StoreError> {
        let snapshot =
            Snapshot::decode(data).map_err(|err| StoreError::Snapshot(err.to_string()))?;
        self.restore(snapshot);
        self.state.version = version;
        self.state.changed = true;
        Ok(())
    }

    /// Value and expiry tables with deadlines converted to unix milliseconds.
    pub fn snapshot(&self) -> Snapshot {
        let now = Instant::now();
        let wall = unix_millis();

        let expires = self
            .state
            .expires
            .iter()
            .filter(|(_, keys)| !keys.is_empty())
            .map(|(db, keys)| {
                let keys = keys
                    .iter()
                    .map(|(key, deadline)| {
                        let remaining = deadline.saturating_duration_since(now).as_millis() as u64;
                        (key.clone(), wall + remaining)
                    })
                    .collect();
                (db.clone(), keys)
            })
            .collect();

        Snapshot {
            values: self.state.dbs.clone(),
            expires,
        }
    }

    /// Loads `snapshot` in place of the current contents. Deadlines already in the past delete
    /// their key; the others are scheduled again.
    pub fn restore(&mut self, snapshot: Snapshot) {
        let Snapshot { values, expires } = snapshot;
        self.state.dbs = values;
        self.state.dbs.entry(DEFAULT_DB.to_string()).or_default();
        self.state.expires.clear();
        self.state.ttls.clear();

        let now = Instant::now();
        let wall = unix_millis();
        for (db, keys) in expires {
            for (key, deadline) in keys {
                if !self.exists(&db, &key) {
                    continue;
                }
                if deadline <= wall {
                    debug!(db, key, "removing variable that already expired");
                    self.discard(&db, &key);
                } else {
                    let remaining = Duration::from_millis(deadline - wall);
                    self.set_expire(&db, key, deadline_after(now, remaining));
                }
            }
        }
        self.state.total_operations += 1;
    }

    pub fn mark_saved(&mut self, mark: u64) {
        self.state.last_save = unix_millis() / 1000;
        self.state.save_mark = mark;
        self.state.changed = false;
    }

    /// Stores entries read from a bootstrap file. The whole load counts as one version step.
    pub fn load_seed(&mut self, entries: Vec<SeedEntry>) {
        for entry in entries {
            match entry {
                SeedEntry::Select(db) => self.ensure_db(&db),
                SeedEntry::Value { db, key, value } => {
                    self.clear_expire(&db, &key);
                    self.db_mut(&db).insert(key, Value::String(value));
                    self.state.total_change_operations += 1;
                }
            }
        }
        self.state.changed = true;
        self.state.version += 1;
    }

    pub fn remove_expired_keys(&mut self) -> Option<Instant> {
        let now = Instant::now();

        let expired: Vec<(Instant, String, Key)> = self
            .state
            .ttls
            .iter()
            .take_while(|(expires_at, _, _)| expires_at <= &now)
            .cloned()
            .collect();

        for (_, db, key) in expired {
            debug!(db, key, "deleting key because of expiration");
            if self.state.authority {
                self.remove(&db, &[key]);
            } else {
                // The deletion arrives from the authority as a versioned DEL.
                self.discard(&db, &key);
            }
        }

        self.state
            .ttls
            .iter()
            .next()
            .map(|&(expires_at, _, _)| expires_at)
    }

    fn commit(&mut self, db: &str, command: &str, args: Vec<Bytes>) {
        self.state.version += 1;
        self.state.total_change_operations += 1;
        self.state.changed = true;

        let version = self.state.version;
        self.send_change(Change {
            db: db.to_string(),
            command: command.to_string(),
            args,
            version: Some(version),
        });
    }

    fn send_change(&mut self, change: Change) {
        let journal = &mut self.state.journal;
        if !journal.enabled {
            return;
        }
        if let Some(tx) = &journal.tx {
            if tx.send(change).is_err() {
                journal.enabled = false;
            }
        }
    }

    fn value(&self, db: &str, key: &str) -> Option<&Value> {
        self.state.dbs.get(db)?.get(key)
    }

    fn db_mut(&mut self, db: &str) -> &mut Db {
        self.state.dbs.entry(db.to_string()).or_default()
    }

    fn list_at(&self, db: &str, key: &str) -> Result<Option<&VecDeque<Bytes>>, StoreError> {
        match self.value(db, key) {
            Some(Value::List(list)) => Ok(Some(list)),
            Some(_) => Err(StoreError::WrongType),
            None => Ok(None),
        }
    }

    fn list_at_mut(&mut self, db: &str, key: &str) -> Result<Option<&mut VecDeque<Bytes>>, StoreError> {
        match self.state.dbs.get_mut(db).and_then(|keys| keys.get_mut(key)) {
            Some(Value::List(list)) => Ok(Some(list)),
            Some(_) => Err(StoreError::WrongType),
            None => Ok(None),
        }
    }

    fn set_at(&self, db: &str, key: &str) -> Result<Option<&BTreeSet<Bytes>>, StoreError> {
        match self.value(db, key) {
            Some(Value::Set(set)) => Ok(Some(set)),
            Some(_) => Err(StoreError::WrongType),
            None => Ok(None),
        }
    }

    fn set_at_mut(&mut self, db: &str, key: &str) -> Result<Option<&mut BTreeSet<Bytes>>, StoreError> {
        match self.state.dbs.get_mut(db).and_then(|keys| keys.get_mut(key)) {
            Some(Value::Set(set)) => Ok(Some(set)),
            Some(_) => Err(StoreError::WrongType),
            None => Ok(None),
        }
    }

    fn operand_sets<'s>(&'s self, db: &str, keys: &'s [String]) -> impl Iterator<Item = &'s BTreeSet<Bytes>> + 's {
        let db = self.state.dbs.get(db);
        keys.iter()
            .filter_map(move |key| match db?.get(key) {
                Some(Value::Set(set)) => Some(set),
                _ => None,
            })
    }

    fn store_set(
        &mut self,
        db: &str,
        command: &str,
        destination: String,
        keys: &[String],
        result: BTreeSet<Bytes>,
    ) {
        let args = std::iter::once(&destination)
            .chain(keys)
            .map(|key| arg(key))
            .collect();
        self.clear_expire(db, &destination);
        self.db_mut(db).insert(destination, Value::Set(result));
        self.commit(db, command, args);
    }

    fn matching_keys(&self, db: &str, matches: impl Fn(&str) -> bool) -> String {
        self.state
            .dbs
            .get(db)
            .map(|keys| {
                keys.keys()
                    .filter(|key| matches(key.as_str()))
                    .sorted()
                    .join(" ")
            })
            .unwrap_or_default()
    }

    /// Removes `key` and its TTL without counting a change.
    fn discard(&mut self, db: &str, key: &str) -> bool {
        self.clear_expire(db, key);
        self.state
            .dbs
            .get_mut(db)
            .and_then(|keys| keys.remove(key))
            .is_some()
    }

    fn deadline(&self, db: &str, key: &str) -> Option<Instant> {
        self.state.expires.get(db)?.get(key).copied()
    }

    fn set_expire(&mut self, db: &str, key: Key, expires_at: Instant) {
        self.clear_expire(db, &key);
        self.state
            .expires
            .entry(db.to_string())
            .or_default()
            .insert(key.clone(), expires_at);
        self.state
            .ttls
            .insert((expires_at, db.to_string(), key.clone()));

        let next_to_expire = self.state.ttls.iter().next().map(|(_, _, next)| next);
        let expires_next = next_to_expire == Some(&key);
        if expires_next {
            self.waker.notify_one();
        }
    }

    fn clear_expire(&mut self, db: &str, key: &str) {
        let expires_at = self
            .state
            .expires
            .get_mut(db)
            .and_then(|keys| keys.remove(key));
        if let Some(expires_at) = expires_at {
            self.state
                .ttls
                .remove(&(expires_at, db.to_string(), key.to_string()));
        }
    }

    fn used_memory(&self) -> usize {
        self.state
            .dbs
            .values()
            .flat_map(|keys| keys.iter())
            .map(|(key, value)| key.len() + value.size())
            .sum()
    }
}

fn arg(s: &str) -> Bytes {
    Bytes::copy_from_slice(s.as_bytes())
}

fn substitute(pattern: &str, item: &[u8]) -> String {
    pattern.replace('*', &String::from_utf8_lossy(item))
}

fn parse_number<T: std::str::FromStr>(data: &[u8]) -> Option<T> {
    std::str::from_utf8(data).ok()?.trim().parse::<T>().ok()
}

fn checked_add<T: CheckedAdd>(current: T, delta: T) -> Result<T, StoreError> {
    current.checked_add(&delta).ok_or(StoreError::NotAnInteger)
}

/// Maps a possibly negative index into `0..len`.
fn normalize_index(len: usize, index: i64) -> Option<usize> {
    let index = if index < 0 { len as i64 + index } else { index };
    (0..len as i64).contains(&index).then_some(index as usize)
}

/// Maps an inclusive, possibly negative range into bounds valid for a list of `len` items.
fn normalize_range(len: usize, start: i64, end: i64) -> Option<(usize, usize)> {
    let len = len as i64;
    let start = if start < 0 { len + start } else { start }.max(0);
    let end = if end < 0 { len + end } else { end }.min(len - 1);
    (start <= end).then_some((start as usize, end as usize))
}

fn deadline_after(now: Instant, ttl: Duration) -> Instant {
    let ttl = ttl.min(MAX_TTL);
    now.checked_add(ttl).unwrap_or(now)
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}

async fn remove_expired_keys(store: Arc<InnerStore>) {
    loop {
        let (next_expiration, waker) = {
            let mut store = store.lock();
            let next_expiration = store.remove_expired_keys();
            (next_expiration, store.waker)
        };

        if let Some(next_expiration) = next_expiration {
            tokio::select! {
                _ = sleep_until(next_expiration) => {}
                _ = waker.notified() => {}
            }
        } else {
            waker.notified().await;
        }
    }
}
