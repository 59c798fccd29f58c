//! Per-identity activation state persisted across process restarts.
//!
//! The state file is a JSON object keyed by lowercase identity address. It is
//! best-effort bookkeeping: a missing, corrupt or unwritable file degrades to
//! in-memory state and never fails the caller.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const STATE_DIR: &str = "infer-broker";
const STATE_FILE: &str = "state.json";

/// On-disk record for one identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationRecord {
    pub auto_deposit_completed: bool,
    pub created_at: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
    pub rpc_url: String,
    pub total_requests: u64,
}

impl ActivationRecord {
    fn new(rpc_url: &str) -> Self {
        let now = Utc::now();
        Self {
            auto_deposit_completed: false,
            created_at: now,
            last_used: now,
            rpc_url: rpc_url.to_string(),
            total_requests: 0,
        }
    }
}

/// Activation records for every identity used on this machine.
pub struct ActivationStore {
    /// `None` when no writable location was found.
    path: Option<PathBuf>,
    records: Mutex<HashMap<String, ActivationRecord>>,
}

impl std::fmt::Debug for ActivationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivationStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl ActivationStore {
    /// Open the store at `preferred` (or the per-user config location),
    /// falling back to the system temp directory when that is not writable.
    pub fn open(preferred: Option<PathBuf>) -> Self {
        let fallback = std::env::temp_dir().join(STATE_DIR).join(STATE_FILE);
        Self::open_with_fallback(preferred.or_else(default_path), Some(fallback))
    }

    /// Open with an explicit fallback location.
    pub fn open_with_fallback(preferred: Option<PathBuf>, fallback: Option<PathBuf>) -> Self {
        let path = preferred
            .into_iter()
            .chain(fallback)
            .find(|candidate| is_writable(candidate));

        match &path {
            Some(p) => tracing::debug!(path = %p.display(), "activation state location"),
            None => tracing::warn!("no writable location for activation state, keeping it in memory"),
        }

        let records = path.as_deref().map(load).unwrap_or_default();
        Self {
            path,
            records: Mutex::new(records),
        }
    }

    /// Store that never touches the filesystem.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            records: Mutex::new(HashMap::new()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Record for `address`, created on first access.
    pub fn get(&self, address: Address, rpc_url: &str) -> ActivationRecord {
        self.update(address, rpc_url, |_| {})
    }

    /// Whether the one-time activation deposit has completed for `address`.
    pub fn is_activated(&self, address: Address) -> bool {
        let mut records = self.lock();
        self.refresh(&mut records);
        records
            .get(&key(address))
            .map(|r| r.auto_deposit_completed)
            .unwrap_or(false)
    }

    /// Bump the request counter and last-used timestamp.
    pub fn record_request(&self, address: Address, rpc_url: &str) -> ActivationRecord {
        self.update(address, rpc_url, |record| {
            record.total_requests = record.total_requests.saturating_add(1);
            record.last_used = Utc::now();
        })
    }

    /// Persist that the activation deposit succeeded.
    pub fn mark_activated(&self, address: Address, rpc_url: &str) -> ActivationRecord {
        self.update(address, rpc_url, |record| {
            record.auto_deposit_completed = true;
            record.last_used = Utc::now();
        })
    }

    /// Read-modify-write of one record. No cross-process locking; a lost
    /// counter increment is acceptable.
    fn update<F>(&self, address: Address, rpc_url: &str, mutate: F) -> ActivationRecord
    where
        F: FnOnce(&mut ActivationRecord),
    {
        let mut records = self.lock();
        self.refresh(&mut records);

        let key = key(address);
        let existed = records.contains_key(&key);
        let record = records
            .entry(key)
            .or_insert_with(|| ActivationRecord::new(rpc_url));
        let before = record.clone();
        mutate(record);
        let after = record.clone();

        if !existed || before != after {
            self.persist(&records);
        }
        after
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, ActivationRecord>> {
        // The map is plain data; a panic elsewhere cannot leave it inconsistent.
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Merge in records written by other processes since we last looked.
    fn refresh(&self, records: &mut HashMap<String, ActivationRecord>) {
        let Some(path) = &self.path else { return };
        if !path.exists() {
            return;
        }
        for (k, on_disk) in load(path) {
            match records.get_mut(&k) {
                Some(mine) => {
                    mine.auto_deposit_completed |= on_disk.auto_deposit_completed;
                    mine.total_requests = mine.total_requests.max(on_disk.total_requests);
                    mine.last_used = mine.last_used.max(on_disk.last_used);
                    mine.created_at = mine.created_at.min(on_disk.created_at);
                }
                None => {
                    records.insert(k, on_disk);
                }
            }
        }
    }

    fn persist(&self, records: &HashMap<String, ActivationRecord>) {
        let Some(path) = &self.path else { return };
        if let Err(e) = write_records(path, records) {
            tracing::warn!(path = %path.display(), error = %e, "failed to persist activation state");
        }
    }
}

/// `<config dir>/infer-broker/state.json`, when the platform has a config dir.
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(STATE_DIR).join(STATE_FILE))
}

fn key(address: Address) -> String {
    format!("{:#x}", address)
}

fn is_writable(path: &Path) -> bool {
    if let Some(parent) = path.parent() {
        if std::fs::create_dir_all(parent).is_err() {
            return false;
        }
    }
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .is_ok()
}

fn load(path: &Path) -> HashMap<String, ActivationRecord> {
    let data = match std::fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "no activation state to load");
            return HashMap::new();
        }
    };
    if data.trim().is_empty() {
        return HashMap::new();
    }
    match serde_json::from_str(&data) {
        Ok(records) => records,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "corrupt activation state, starting fresh");
            HashMap::new()
        }
    }
}

fn write_records(
    path: &Path,
    records: &HashMap<String, ActivationRecord>,
) -> Result<(), std::io::Error> {
    let json = serde_json::to_string_pretty(records)?;

    // Replace by rename so a crash mid-write never leaves a truncated file.
    let tmp = tmp_path(path);
    std::fs::write(&tmp, json)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600))?;
    }

    std::fs::rename(&tmp, path)
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
