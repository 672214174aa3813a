//! RocksDB-backed persistence for pastes and the view-dedup ledger.
//!
//! Two column families: `pastes` maps ids to bincode-encoded records and
//! `views` holds one row per `(paste, viewer fingerprint)` pair. All
//! mutations are serialized by a store-wide lock, which stands in for the
//! unique-constraint and atomic-increment primitives a relational backend
//! would provide; concurrent view requests from one viewer advance the
//! counter by exactly one, requests from distinct viewers by one each.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use rocksdb::{ColumnFamily, Direction, IteratorMode, Options, WriteBatch, DB};
use thiserror::Error;
use tokio::task;
use tracing::{info, warn};

use pastegate_common::{Paste, UpdatePasteRequest};

const PASTES_CF: &str = "pastes";
const VIEWS_CF: &str = "views";

/// Separator between the paste id and the viewer fingerprint in ledger
/// keys. Ids are alphanumeric, so NUL never appears in one.
const LEDGER_KEY_SEPARATOR: u8 = 0;

/// Hard cap on `list` page sizes.
pub const MAX_PAGE_LIMIT: u64 = 100;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("paste not found")]
    NotFound,
    #[error("paste id already exists")]
    Conflict,
    #[error("storage backend error: {0}")]
    Backend(#[from] rocksdb::Error),
    #[error("column family {0} is unavailable")]
    MissingColumnFamily(&'static str),
    #[error("failed to encode paste record: {0}")]
    Codec(#[from] bincode::Error),
    #[error("storage task failed to complete: {0}")]
    Join(#[from] task::JoinError),
}

#[derive(Debug, Clone, Copy)]
pub struct ViewOutcome {
    /// Whether this call advanced the counter.
    pub counted: bool,
    pub views: u64,
}

#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub page: u64,
    pub limit: u64,
    /// Case-insensitive substring match over title and content.
    pub search: Option<String>,
    pub language: Option<String>,
    /// Owner scope: includes that owner's private pastes. Without it only
    /// public pastes are listed.
    pub owner: Option<String>,
}

pub struct PasteStore {
    db: Arc<DB>,
    /// Taken by every mutation; id uniqueness and the view counter depend
    /// on it.
    write_serial: Arc<Mutex<()>>,
}

fn pastes_cf(db: &DB) -> Result<&ColumnFamily, StoreError> {
    db.cf_handle(PASTES_CF)
        .ok_or(StoreError::MissingColumnFamily(PASTES_CF))
}

fn ledger_key(id: &str, fingerprint: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(id.len() + fingerprint.len() + 1);
    key.extend_from_slice(id.as_bytes());
    key.push(LEDGER_KEY_SEPARATOR);
    key.extend_from_slice(fingerprint.as_bytes());
    key
}

impl PasteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let mut options = Options::default();
        options.create_if_missing(true);
        options.create_missing_column_families(true);
        let db = DB::open_cf(&options, path, [PASTES_CF, VIEWS_CF])?;
        Ok(Self {
            db: Arc::new(db),
            write_serial: Arc::new(Mutex::new(())),
        })
    }

    /// Opens a store with no view ledger, forcing the degraded counting
    /// path.
    #[cfg(test)]
    fn open_without_ledger(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let mut options = Options::default();
        options.create_if_missing(true);
        options.create_missing_column_families(true);
        let db = DB::open_cf(&options, path, [PASTES_CF])?;
        Ok(Self {
            db: Arc::new(db),
            write_serial: Arc::new(Mutex::new(())),
        })
    }

    /// Persists a new paste, stamping its timestamps and zeroing the view
    /// counter. Fails with [`StoreError::Conflict`] if the id is taken.
    pub async fn create(&self, mut paste: Paste) -> Result<Paste, StoreError> {
        let db = Arc::clone(&self.db);
        let lock = Arc::clone(&self.write_serial);
        task::spawn_blocking(move || {
            let now = Utc::now();
            paste.created_at = now;
            paste.updated_at = now;
            paste.views = 0;
            let encoded = bincode::serialize(&paste)?;

            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            let cf = pastes_cf(&db)?;
            if db.get_pinned_cf(cf, paste.id.as_bytes())?.is_some() {
                return Err(StoreError::Conflict);
            }
            db.put_cf(cf, paste.id.as_bytes(), encoded)?;
            Ok(paste)
        })
        .await?
    }

    /// Returns the full record, stored credential included; protection
    /// enforcement is the access gate's job, not the store's.
    pub async fn get(&self, id: &str) -> Result<Option<Paste>, StoreError> {
        let db = Arc::clone(&self.db);
        let id = id.to_owned();
        task::spawn_blocking(move || {
            let cf = pastes_cf(&db)?;
            match db.get_pinned_cf(cf, id.as_bytes())? {
                Some(raw) => Ok(Some(bincode::deserialize(&raw)?)),
                None => Ok(None),
            }
        })
        .await?
    }

    pub async fn exists(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.get(id).await?.is_some())
    }

    /// Applies a patch: only supplied fields are replaced, the id never
    /// changes, and `updated_at` is restamped.
    pub async fn update(&self, id: &str, patch: UpdatePasteRequest) -> Result<Paste, StoreError> {
        let db = Arc::clone(&self.db);
        let lock = Arc::clone(&self.write_serial);
        let id = id.to_owned();
        task::spawn_blocking(move || {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            let cf = pastes_cf(&db)?;
            let raw = db
                .get_pinned_cf(cf, id.as_bytes())?
                .ok_or(StoreError::NotFound)?;
            let mut paste: Paste = bincode::deserialize(&raw)?;

            paste.content = patch.content;
            if let Some(title) = patch.title {
                paste.title = Some(title);
            }
            if let Some(language) = patch.language {
                paste.language = Some(language);
            }
            if let Some(visibility) = patch.visibility {
                paste.visibility = visibility;
            }
            if let Some(protection) = patch.protection {
                paste.protection = protection;
            }
            if let Some(password) = patch.password {
                paste.password = Some(password);
            }
            if let Some(expires_at) = patch.expires_at {
                paste.expires_at = Some(expires_at);
            }
            paste.updated_at = Utc::now();

            db.put_cf(cf, id.as_bytes(), bincode::serialize(&paste)?)?;
            Ok(paste)
        })
        .await?
    }

    /// Removes a paste and its view-ledger rows.
    pub async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let db = Arc::clone(&self.db);
        let lock = Arc::clone(&self.write_serial);
        let id = id.to_owned();
        task::spawn_blocking(move || {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            let cf = pastes_cf(&db)?;
            if db.get_pinned_cf(cf, id.as_bytes())?.is_none() {
                return Err(StoreError::NotFound);
            }

            let mut batch = WriteBatch::default();
            batch.delete_cf(cf, id.as_bytes());
            if let Some(views) = db.cf_handle(VIEWS_CF) {
                let mut prefix = id.clone().into_bytes();
                prefix.push(LEDGER_KEY_SEPARATOR);
                for (key, _) in
                    db.iterator_cf(views, IteratorMode::From(&prefix, Direction::Forward))
                {
                    if !key.starts_with(&prefix) {
                        break;
                    }
                    batch.delete_cf(views, key);
                }
            }
            db.write(batch)?;
            Ok(())
        })
        .await?
    }

    /// Filtered, paginated listing ordered by creation time descending
    /// (id ascending on ties). Expired pastes never appear.
    pub async fn list(&self, filter: ListFilter) -> Result<(Vec<Paste>, u64), StoreError> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || {
            let page = filter.page.max(1);
            let limit = filter.limit.clamp(1, MAX_PAGE_LIMIT);
            let needle = filter.search.map(|s| s.to_lowercase());

            let cf = pastes_cf(&db)?;
            let mut matches = Vec::new();
            for (_, value) in db.snapshot().iterator_cf(cf, IteratorMode::Start) {
                let paste: Paste = match bincode::deserialize(&value) {
                    Ok(paste) => paste,
                    Err(e) => {
                        warn!("skipping undecodable paste record: {}", e);
                        continue;
                    }
                };
                if paste.expired() {
                    continue;
                }
                if let Some(owner) = &filter.owner {
                    if paste.owner_id.as_deref() != Some(owner.as_str()) {
                        continue;
                    }
                } else if !paste.visibility {
                    continue;
                }
                if let Some(language) = &filter.language {
                    if paste.language.as_deref() != Some(language.as_str()) {
                        continue;
                    }
                }
                if let Some(needle) = &needle {
                    let title_hit = paste
                        .title
                        .as_deref()
                        .map(|title| title.to_lowercase().contains(needle))
                        .unwrap_or_default();
                    if !title_hit && !paste.content.to_lowercase().contains(needle) {
                        continue;
                    }
                }
                matches.push(paste);
            }

            matches.sort_by(|a, b| {
                b.created_at
                    .cmp(&a.created_at)
                    .then_with(|| a.id.cmp(&b.id))
            });

            let total = matches.len() as u64;
            let start = usize::try_from((page - 1).saturating_mul(limit)).unwrap_or(usize::MAX);
            let items = matches
                .into_iter()
                .skip(start)
                .take(usize::try_from(limit).unwrap_or(usize::MAX))
                .collect();
            Ok((items, total))
        })
        .await?
    }

    /// Inserts a view-ledger row and bumps the counter as one atomic
    /// operation; an existing row means the pair was already counted and
    /// the counter is left alone. When the ledger is unusable the counter
    /// is bumped unconditionally instead of failing the read.
    pub async fn record_view_if_absent(
        &self,
        id: &str,
        fingerprint: &str,
    ) -> Result<ViewOutcome, StoreError> {
        let db = Arc::clone(&self.db);
        let lock = Arc::clone(&self.write_serial);
        let id = id.to_owned();
        let fingerprint = fingerprint.to_owned();
        task::spawn_blocking(move || {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            let pastes = pastes_cf(&db)?;
            let raw = db
                .get_pinned_cf(pastes, id.as_bytes())?
                .ok_or(StoreError::NotFound)?;
            let mut paste: Paste = bincode::deserialize(&raw)?;

            let key = ledger_key(&id, &fingerprint);
            if let Some(views) = db.cf_handle(VIEWS_CF) {
                match db.get_pinned_cf(views, &key) {
                    Ok(Some(_)) => {
                        return Ok(ViewOutcome {
                            counted: false,
                            views: paste.views,
                        })
                    }
                    Ok(None) => {
                        paste.views += 1;
                        let mut batch = WriteBatch::default();
                        batch.put_cf(views, &key, Utc::now().to_rfc3339().as_bytes());
                        batch.put_cf(pastes, id.as_bytes(), bincode::serialize(&paste)?);
                        db.write(batch)?;
                        return Ok(ViewOutcome {
                            counted: true,
                            views: paste.views,
                        });
                    }
                    Err(e) => warn!("view ledger read failed, counting without dedup: {}", e),
                }
            } else {
                warn!("view ledger unavailable, counting without dedup");
            }

            // Degraded mode: available but inexact.
            paste.views += 1;
            db.put_cf(pastes, id.as_bytes(), bincode::serialize(&paste)?)?;
            Ok(ViewOutcome {
                counted: true,
                views: paste.views,
            })
        })
        .await?
    }

    /// Deletes every expired paste and its ledger rows in one batch.
    /// Returns the number of pastes reaped.
    pub async fn purge_expired(&self) -> Result<usize, StoreError> {
        let db = Arc::clone(&self.db);
        let lock = Arc::clone(&self.write_serial);
        task::spawn_blocking(move || {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            let cf = pastes_cf(&db)?;
            let mut batch = WriteBatch::default();
            let mut reaped = 0;
            for (key, value) in db.snapshot().iterator_cf(cf, IteratorMode::Start) {
                let expired = bincode::deserialize::<Paste>(&value)
                    .map(|paste| paste.expired())
                    .unwrap_or_default();
                if !expired {
                    continue;
                }

                if let Some(views) = db.cf_handle(VIEWS_CF) {
                    let mut prefix = key.to_vec();
                    prefix.push(LEDGER_KEY_SEPARATOR);
                    for (view_key, _) in
                        db.iterator_cf(views, IteratorMode::From(&prefix, Direction::Forward))
                    {
                        if !view_key.starts_with(&prefix) {
                            break;
                        }
                        batch.delete_cf(views, view_key);
                    }
                }
                batch.delete_cf(cf, key);
                reaped += 1;
            }
            db.write(batch)?;
            Ok(reaped)
        })
        .await?
    }
}

/// Periodic clean-up task that deletes expired entries.
pub async fn reaper(store: Arc<PasteStore>, interval: Duration, stop_signal: Arc<AtomicBool>) {
    while !stop_signal.load(Ordering::Acquire) {
        tokio::time::sleep(interval).await;
        match store.purge_expired().await {
            Ok(0) => {}
            Ok(reaped) => info!("reaped {} expired pastes", reaped),
            Err(e) => warn!("failed to reap expired pastes: {}", e),
        }
    }
}
