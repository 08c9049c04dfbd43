// SPDX-License-Identifier: AGPL-3.0
// Artify Core - Image library projection
//
// A local, non-authoritative copy of the server's image list. Refresh swaps
// the whole snapshot; local patches keep the UI responsive until the next
// refresh overwrites them. The snapshot may be cached in a JSON file.

use crate::gateway::ImageGateway;
use crate::types::{AppError, ImageKind, ImageRecord, OperationOutcome, UploadReport};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

#[derive(serde::Serialize, serde::Deserialize)]
struct LibraryFile {
    records: Vec<ImageRecord>,
}

/// Monotonic request tickets used to drop stale responses
#[derive(Default)]
struct Sequencer {
    next: u64,
    installed_refresh: u64,
    latest_by_id: HashMap<String, u64>,
}

impl Sequencer {
    fn issue(&mut self) -> u64 {
        self.next += 1;
        self.next
    }

    fn issue_for(&mut self, id: &str) -> u64 {
        let ticket = self.issue();
        self.latest_by_id.insert(id.to_string(), ticket);
        ticket
    }

    fn is_latest_for(&self, id: &str, ticket: u64) -> bool {
        self.latest_by_id.get(id).copied() == Some(ticket)
    }

    /// A request for `id` was issued after `ticket`
    fn newer_than(&self, id: &str, ticket: u64) -> bool {
        self.latest_by_id.get(id).is_some_and(|latest| *latest > ticket)
    }

    /// Accept a refresh unless a newer one is already installed
    fn try_install_refresh(&mut self, ticket: u64) -> bool {
        if ticket < self.installed_refresh {
            return false;
        }
        self.installed_refresh = ticket;
        true
    }

    fn forget(&mut self, id: &str) {
        self.latest_by_id.remove(id);
    }

    /// Drop tickets of ids the projection no longer holds
    fn retain_held(&mut self, records: &[ImageRecord]) {
        self.latest_by_id
            .retain(|id, _| records.iter().any(|r| &r.id == id));
    }
}

/// Server snapshot from refresh `ticket`, except that ids with a later
/// request keep their current local record
fn merge_refresh(
    fetched: Vec<ImageRecord>,
    current: &[ImageRecord],
    sequencer: &Sequencer,
    ticket: u64,
) -> Vec<ImageRecord> {
    let local = |id: &str| current.iter().find(|r| r.id == id).cloned();

    let mut merged: Vec<ImageRecord> = fetched
        .into_iter()
        .filter_map(|record| {
            if sequencer.newer_than(&record.id, ticket) {
                local(&record.id)
            } else {
                Some(record)
            }
        })
        .collect();

    for record in current {
        if sequencer.newer_than(&record.id, ticket) && !merged.iter().any(|r| r.id == record.id) {
            merged.push(record.clone());
        }
    }
    merged
}

/// Client-side projection of the user's images
pub struct ImageLibrary {
    gateway: Arc<ImageGateway>,
    records: RwLock<Arc<Vec<ImageRecord>>>,
    sequencer: Mutex<Sequencer>,
    cache_path: Option<PathBuf>,
}

impl ImageLibrary {
    /// Empty projection without a disk cache
    pub fn new(gateway: Arc<ImageGateway>) -> Self {
        Self {
            gateway,
            records: RwLock::new(Arc::new(Vec::new())),
            sequencer: Mutex::new(Sequencer::default()),
            cache_path: None,
        }
    }

    /// Projection seeded from (and saved to) a JSON cache file
    pub fn with_cache(gateway: Arc<ImageGateway>, cache_path: impl AsRef<Path>) -> Self {
        let cache_path = cache_path.as_ref().to_path_buf();
        let records = load_cache(&cache_path);
        if !records.is_empty() {
            tracing::info!("Seeded library with {} cached record(s)", records.len());
        }

        Self {
            gateway,
            records: RwLock::new(Arc::new(records)),
            sequencer: Mutex::new(Sequencer::default()),
            cache_path: Some(cache_path),
        }
    }

    pub fn gateway(&self) -> &ImageGateway {
        &self.gateway
    }

    /// Replace the whole collection with the server's current list
    pub async fn refresh(&self) -> Result<usize, AppError> {
        let ticket = self.sequencer().issue();
        let fetched = self.gateway.list_images().await?;

        // Check and swap under the sequencer lock so refreshes cannot interleave
        let installed = {
            let mut sequencer = self.sequencer();
            if sequencer.try_install_refresh(ticket) {
                let mut guard = self.records.write().unwrap_or_else(|e| e.into_inner());
                let merged = merge_refresh(fetched, &guard, &sequencer, ticket);
                sequencer.retain_held(&merged);
                let count = merged.len();
                *guard = Arc::new(merged);
                Some(count)
            } else {
                None
            }
        };

        match installed {
            Some(count) => {
                self.save_cache();
                tracing::info!("Library refreshed with {} image(s)", count);
                Ok(count)
            }
            None => {
                tracing::debug!("Discarding stale refresh #{}", ticket);
                Ok(self.len())
            }
        }
    }

    /// Current collection; never observed half-updated
    pub fn snapshot(&self) -> Arc<Vec<ImageRecord>> {
        self.records.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Edit one record in place; returns false when the id is not held
    pub fn apply_local_patch<F>(&self, id: &str, patch: F) -> bool
    where
        F: FnOnce(&mut ImageRecord),
    {
        let patched = self.patch_record(id, patch);
        if patched {
            self.save_cache();
        }
        patched
    }

    /// Drop one record locally; returns false when it was already absent
    pub fn remove_local(&self, id: &str) -> bool {
        let removed = {
            let mut sequencer = self.sequencer();
            sequencer.forget(id);
            self.remove_record(id)
        };
        if removed {
            self.save_cache();
        }
        removed
    }

    /// Forget every held record, e.g. after logout
    pub fn clear_local(&self) {
        {
            // Refreshes already in flight must not bring the records back
            let mut sequencer = self.sequencer();
            let ticket = sequencer.issue();
            sequencer.installed_refresh = ticket;
            sequencer.latest_by_id.clear();
            let mut guard = self.records.write().unwrap_or_else(|e| e.into_inner());
            *guard = Arc::new(Vec::new());
        }
        self.save_cache();
    }

    pub fn get(&self, id: &str) -> Option<ImageRecord> {
        self.snapshot().iter().find(|r| r.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    pub fn favorites(&self) -> Vec<ImageRecord> {
        self.filtered(|r| r.is_favorite)
    }

    pub fn processed(&self) -> Vec<ImageRecord> {
        self.filtered(|r| r.kind == ImageKind::Processed)
    }

    pub fn uploaded(&self) -> Vec<ImageRecord> {
        self.filtered(|r| r.kind == ImageKind::Uploaded)
    }

    /// Newest first, undated records last, at most `limit`
    pub fn recent(&self, limit: usize) -> Vec<ImageRecord> {
        let mut records: Vec<ImageRecord> = self.snapshot().as_ref().clone();
        records.sort_by(|a, b| match (&a.created_at, &b.created_at) {
            (Some(a), Some(b)) => b.cmp(a),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });
        records.truncate(limit);
        records
    }

    /// Flip the favorite flag on the server, then patch the local copy
    pub async fn toggle_favorite(&self, id: &str) -> Result<ImageRecord, AppError> {
        let record = self.require(id)?;
        let ticket = self.sequencer().issue_for(id);

        let updated = self.gateway.toggle_favorite(&record).await?;

        let value = updated.is_favorite;
        let patched = {
            let sequencer = self.sequencer();
            if sequencer.is_latest_for(id, ticket) {
                self.patch_record(id, |r| r.is_favorite = value)
            } else {
                tracing::debug!("Discarding stale favorite response for {}", id);
                false
            }
        };
        if patched {
            self.save_cache();
        }
        Ok(updated)
    }

    /// Delete on the server; a server-side "not found" still removes the local copy
    pub async fn delete(&self, id: &str) -> Result<(), AppError> {
        let record = self.require(id)?;
        let ticket = self.sequencer().issue_for(id);

        match self.gateway.delete_image(&record).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                tracing::info!("Image {} was already gone on the server", id);
            }
            Err(e) => return Err(e),
        }

        let removed = {
            let mut sequencer = self.sequencer();
            if sequencer.is_latest_for(id, ticket) {
                sequencer.forget(id);
                self.remove_record(id)
            } else {
                false
            }
        };
        if removed {
            self.save_cache();
        }
        Ok(())
    }

    /// Upload files, then reload the list when anything went through
    pub async fn upload(&self, uris: &[String]) -> Result<UploadReport, AppError> {
        let report = self.gateway.upload_images(uris).await?;
        if !report.uploaded.is_empty() {
            self.refresh_quietly().await;
        }
        Ok(report)
    }

    /// Run a named operation on a held record, then reload the list
    pub async fn apply(
        &self,
        name: &str,
        id: &str,
        params: &[f64],
    ) -> Result<OperationOutcome, AppError> {
        let record = self.require(id)?;
        let outcome = self.gateway.apply_operation(name, &record, params).await?;
        self.refresh_quietly().await;
        Ok(outcome)
    }

    async fn refresh_quietly(&self) {
        if let Err(e) = self.refresh().await {
            tracing::warn!("Library refresh after change failed: {}", e);
        }
    }

    fn require(&self, id: &str) -> Result<ImageRecord, AppError> {
        self.get(id)
            .ok_or_else(|| AppError::NotFound("image not found".to_string()))
    }

    fn filtered<F>(&self, keep: F) -> Vec<ImageRecord>
    where
        F: Fn(&ImageRecord) -> bool,
    {
        self.snapshot().iter().filter(|r| keep(r)).cloned().collect()
    }

    fn sequencer(&self) -> std::sync::MutexGuard<'_, Sequencer> {
        self.sequencer.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Copy-on-write edit of one record; callers persist the cache
    fn patch_record<F>(&self, id: &str, patch: F) -> bool
    where
        F: FnOnce(&mut ImageRecord),
    {
        let mut guard = self.records.write().unwrap_or_else(|e| e.into_inner());
        let mut next: Vec<ImageRecord> = guard.as_ref().clone();
        match next.iter_mut().find(|r| r.id == id) {
            Some(record) => {
                patch(record);
                *guard = Arc::new(next);
                true
            }
            None => false,
        }
    }

    fn remove_record(&self, id: &str) -> bool {
        let mut guard = self.records.write().unwrap_or_else(|e| e.into_inner());
        if !guard.iter().any(|r| r.id == id) {
            return false;
        }
        let next: Vec<ImageRecord> = guard.iter().filter(|r| r.id != id).cloned().collect();
        *guard = Arc::new(next);
        true
    }

    #[cfg(test)]
    fn install(&self, records: Vec<ImageRecord>) {
        {
            let mut guard = self.records.write().unwrap_or_else(|e| e.into_inner());
            *guard = Arc::new(records);
        }
        self.save_cache();
    }

    fn save_cache(&self) {
        let Some(path) = &self.cache_path else {
            return;
        };
        let file = LibraryFile {
            records: self.snapshot().as_ref().clone(),
        };
        if let Err(e) = write_cache(path, &file) {
            tracing::warn!("Failed to save library cache: {}", e);
        }
    }
}

fn load_cache(path: &Path) -> Vec<ImageRecord> {
    if !path.exists() {
        return Vec::new();
    }

    let parsed = fs::read_to_string(path)
        .map_err(AppError::from)
        .and_then(|content| serde_json::from_str::<LibraryFile>(&content).map_err(AppError::from));

    match parsed {
        Ok(file) => crate::records::dedupe_by_id(file.records),
        Err(e) => {
            tracing::warn!("Failed to read library cache, starting empty: {}", e);
            Vec::new()
        }
    }
}

fn write_cache(path: &Path, file: &LibraryFile) -> Result<(), AppError> {
    let content = serde_json::to_string_pretty(file)
        .map_err(|e| AppError::Serialization(format!("Failed to serialize library: {}", e)))?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)
        .map_err(|e| AppError::FileIo(format!("Failed to write library: {}", e)))
}
