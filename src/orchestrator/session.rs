//! Process-local session store (spec.md §6). The orchestrator is the only
//! writer for a given session; the HTTP collaborator's status endpoint is a
//! many-reader. `RwLock` gives that access pattern without a writer ever
//! blocking behind a fan of readers for longer than one mutation.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ScanError;

/// `SID-XXXXXXXX`: 8 uppercase hex characters from a fresh 128-bit random
/// source (spec.md §6). Derived from a UUIDv4 rather than hand-rolled
/// randomness — the teacher reaches for `uuid` wherever it needs a random
/// identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        let hex = Uuid::new_v4().simple().to_string().to_uppercase();
        SessionId(format!("SID-{}", &hex[..8]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse a session id that arrived as a string (e.g. from the CLI or an
    /// HTTP path segment), without re-validating hex content — callers
    /// outside this crate mint ids via [`SessionId::new`]; this just wraps
    /// whatever identifier was handed back to us.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        SessionId(raw.into())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Pending,
    Running,
    Done,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub status: SessionStatus,
    pub progress: u8,
    pub stored_path: PathBuf,
    pub filename: String,
    pub sha256: Option<String>,
    pub result_path: Option<PathBuf>,
    pub error: Option<String>,
}

impl SessionRecord {
    pub fn new_pending(stored_path: PathBuf, filename: String, sha256: Option<String>) -> Self {
        SessionRecord {
            status: SessionStatus::Pending,
            progress: 0,
            stored_path,
            filename,
            sha256,
            result_path: None,
            error: None,
        }
    }
}

/// A process-wide `session_id -> SessionRecord` mapping (spec.md §6).
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<SessionId, SessionRecord>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, id: SessionId, record: SessionRecord) {
        self.sessions.write().expect("session store lock poisoned").insert(id, record);
    }

    pub fn get(&self, id: &SessionId) -> Option<SessionRecord> {
        self.sessions.read().expect("session store lock poisoned").get(id).cloned()
    }

    /// Atomically transition a known session from `Pending` to `Running`.
    /// Returns `false` (no mutation) if the session is unknown or not
    /// `Pending` — the caller maps that to the 404/409 split in spec.md §6.
    pub fn start_running(&self, id: &SessionId) -> bool {
        let mut guard = self.sessions.write().expect("session store lock poisoned");
        match guard.get_mut(id) {
            Some(record) if record.status == SessionStatus::Pending => {
                record.status = SessionStatus::Running;
                true
            }
            _ => false,
        }
    }

    pub fn set_progress(&self, id: &SessionId, progress: u8) {
        if let Some(record) = self.sessions.write().expect("session store lock poisoned").get_mut(id) {
            record.progress = progress;
        }
    }

    pub fn finish_ok(&self, id: &SessionId, result_path: PathBuf) {
        if let Some(record) = self.sessions.write().expect("session store lock poisoned").get_mut(id) {
            record.status = SessionStatus::Done;
            record.progress = 100;
            record.result_path = Some(result_path);
        }
    }

    pub fn finish_err(&self, id: &SessionId, message: String) {
        if let Some(record) = self.sessions.write().expect("session store lock poisoned").get_mut(id) {
            record.status = SessionStatus::Error;
            record.error = Some(message);
        }
    }

    pub fn remove(&self, id: &SessionId) -> Option<SessionRecord> {
        self.sessions.write().expect("session store lock poisoned").remove(id)
    }
}

/// Deletes every file under `uploads_dir` whose name carries `id` (the
/// stored upload plus its `analysis_<id>.json` result document), for
/// `DELETE /session/{session_id}` (spec.md §6). Unlike `finish_ok`'s
/// `result_path`, this doesn't require the caller to still hold the
/// `SessionRecord` around — it finds artifacts by naming convention, the
/// way the teacher rescans `/sys/class/scsi_host/host*/scan` by glob
/// instead of tracking host bus paths explicitly.
pub fn delete_session_artifacts(uploads_dir: &Path, id: &SessionId) -> Result<usize, ScanError> {
    let pattern = format!("{}/*{}*", uploads_dir.display(), id.as_str());
    let paths = glob::glob(&pattern)
        .map_err(|e| ScanError::Internal(format!("invalid session cleanup glob: {e}")))?;

    let mut removed = 0;
    for entry in paths.flatten() {
        std::fs::remove_file(&entry)?;
        removed += 1;
    }
    Ok(removed)
}
