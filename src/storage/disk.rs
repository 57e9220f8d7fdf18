//! Directory-backed cache storage
//!
//! Layout under the storage root:
//!
//! ```text
//! <root>/<sha256(namespace)[..16]>/ledger.json
//! <root>/<sha256(namespace)[..16]>/<sha256(key)[..16]>.entry
//! ```
//!
//! The ledger holds the namespace name and the entries in insertion order.
//! An entry file is a big-endian `u32` metadata length, the JSON metadata,
//! then the raw body, so status, headers and body are replaced together.
//! Files are written to a temporary name and renamed into place, and the
//! ledger is only updated after an entry's file is complete.

use super::CacheStorage;
use crate::error::{SwCacheError, SwCacheResult};
use crate::http::{RequestKey, Response, ResponseKind};
use async_trait::async_trait;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

const LEDGER_FILE: &str = "ledger.json";

/// Hash a name to a short, filesystem-safe hex string
fn short_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    hex::encode(&digest[..8])
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LedgerEntry {
    seq: u64,
    key: RequestKey,
    file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Ledger {
    name: String,
    next_seq: u64,
    entries: Vec<LedgerEntry>,
}

impl Ledger {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            next_seq: 0,
            entries: Vec::new(),
        }
    }

    fn position(&self, key: &RequestKey) -> Option<usize> {
        self.entries.iter().position(|e| &e.key == key)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct EntryMeta {
    key: RequestKey,
    status: u16,
    headers: Vec<(String, String)>,
    kind: ResponseKind,
    stored_at: DateTime<Utc>,
}

fn encode_entry(meta: &EntryMeta, body: &[u8]) -> SwCacheResult<Vec<u8>> {
    let meta = serde_json::to_vec(meta)?;
    let len = u32::try_from(meta.len())
        .map_err(|_| SwCacheError::Storage("entry metadata too large".to_string()))?;

    let mut out = BytesMut::with_capacity(4 + meta.len() + body.len());
    out.put_u32(len);
    out.put_slice(&meta);
    out.put_slice(body);
    Ok(out.to_vec())
}

fn decode_entry(mut raw: Bytes, path: &Path) -> SwCacheResult<(EntryMeta, Bytes)> {
    let corrupt = || SwCacheError::Storage(format!("corrupt cache entry {}", path.display()));
    if raw.remaining() < 4 {
        return Err(corrupt());
    }
    let len = raw.get_u32() as usize;
    if raw.remaining() < len {
        return Err(corrupt());
    }
    let meta = raw.split_to(len);
    Ok((serde_json::from_slice(&meta)?, raw))
}

/// Storage persisted as a directory tree
pub struct DiskStorage {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl DiskStorage {
    /// Open storage rooted at `root`, creating the directory
    pub async fn new(root: &Path) -> SwCacheResult<Self> {
        fs::create_dir_all(root).await.map_err(|e| {
            SwCacheError::io(format!("creating cache storage {}", root.display()), e)
        })?;
        Ok(Self {
            root: root.to_path_buf(),
            write_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn namespace_dir(&self, namespace: &str) -> PathBuf {
        self.root.join(short_hash(namespace))
    }

    async fn load_ledger(dir: &Path) -> SwCacheResult<Option<Ledger>> {
        let path = dir.join(LEDGER_FILE);
        match fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SwCacheError::io(format!("reading {}", path.display()), e)),
        }
    }

    async fn save_ledger(dir: &Path, ledger: &Ledger) -> SwCacheResult<()> {
        let content = serde_json::to_vec_pretty(ledger)?;
        write_atomic(&dir.join(LEDGER_FILE), &content).await
    }

    async fn ensure_namespace(&self, namespace: &str) -> SwCacheResult<(PathBuf, Ledger)> {
        let dir = self.namespace_dir(namespace);
        if let Some(ledger) = Self::load_ledger(&dir).await? {
            return Ok((dir, ledger));
        }

        fs::create_dir_all(&dir)
            .await
            .map_err(|e| SwCacheError::io(format!("creating {}", dir.display()), e))?;
        let ledger = Ledger::new(namespace);
        Self::save_ledger(&dir, &ledger).await?;
        debug!("Created namespace {}", namespace);
        Ok((dir, ledger))
    }
}

async fn write_atomic(path: &Path, content: &[u8]) -> SwCacheResult<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, content)
        .await
        .map_err(|e| SwCacheError::io(format!("writing {}", tmp.display()), e))?;
    fs::rename(&tmp, path)
        .await
        .map_err(|e| SwCacheError::io(format!("renaming into {}", path.display()), e))
}

async fn remove_if_exists(path: &Path) -> SwCacheResult<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(SwCacheError::io(format!("removing {}", path.display()), e)),
    }
}

#[async_trait]
impl CacheStorage for DiskStorage {
    async fn open(&self, namespace: &str) -> SwCacheResult<()> {
        let _guard = self.write_lock.lock().await;
        self.ensure_namespace(namespace).await.map(|_| ())
    }

    async fn has(&self, namespace: &str) -> SwCacheResult<bool> {
        Ok(Self::load_ledger(&self.namespace_dir(namespace))
            .await?
            .is_some())
    }

    async fn namespaces(&self) -> SwCacheResult<Vec<String>> {
        let mut names = Vec::new();
        let mut dir = fs::read_dir(&self.root).await.map_err(|e| {
            SwCacheError::io(format!("listing {}", self.root.display()), e)
        })?;

        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| SwCacheError::io(format!("listing {}", self.root.display()), e))?
        {
            if !entry.path().is_dir() {
                continue;
            }
            if let Some(ledger) = Self::load_ledger(&entry.path()).await? {
                names.push(ledger.name);
            }
        }

        names.sort();
        Ok(names)
    }

    async fn delete_namespace(&self, namespace: &str) -> SwCacheResult<bool> {
        let _guard = self.write_lock.lock().await;
        let dir = self.namespace_dir(namespace);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(SwCacheError::io(format!("removing {}", dir.display()), e)),
        }
    }

    async fn match_entry(
        &self,
        namespace: &str,
        key: &RequestKey,
    ) -> SwCacheResult<Option<Response>> {
        let dir = self.namespace_dir(namespace);
        let Some(ledger) = Self::load_ledger(&dir).await? else {
            return Ok(None);
        };
        let Some(entry) = ledger.entries.iter().find(|e| &e.key == key) else {
            return Ok(None);
        };

        let path = dir.join(format!("{}.entry", entry.file));
        let raw = match fs::read(&path).await {
            Ok(raw) => Bytes::from(raw),
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(SwCacheError::io(format!("reading {}", path.display()), e)),
        };
        let (meta, body) = decode_entry(raw, &path)?;

        Ok(Some(Response {
            status: meta.status,
            headers: meta.headers,
            body,
            kind: meta.kind,
        }))
    }

    async fn put(&self, namespace: &str, key: RequestKey, response: Response) -> SwCacheResult<()> {
        let _guard = self.write_lock.lock().await;
        let (dir, mut ledger) = self.ensure_namespace(namespace).await?;

        let file = short_hash(&key.to_string());
        let meta = EntryMeta {
            key: key.clone(),
            status: response.status,
            headers: response.headers,
            kind: response.kind,
            stored_at: Utc::now(),
        };

        let content = encode_entry(&meta, &response.body)?;
        write_atomic(&dir.join(format!("{}.entry", file)), &content).await?;

        if let Some(pos) = ledger.position(&key) {
            ledger.entries.remove(pos);
        }
        let seq = ledger.next_seq;
        ledger.next_seq += 1;
        ledger.entries.push(LedgerEntry { seq, key, file });
        Self::save_ledger(&dir, &ledger).await
    }

    async fn delete_entry(&self, namespace: &str, key: &RequestKey) -> SwCacheResult<bool> {
        let _guard = self.write_lock.lock().await;
        let dir = self.namespace_dir(namespace);
        let Some(mut ledger) = Self::load_ledger(&dir).await? else {
            return Ok(false);
        };
        let Some(pos) = ledger.position(key) else {
            return Ok(false);
        };

        let entry = ledger.entries.remove(pos);
        Self::save_ledger(&dir, &ledger).await?;
        remove_if_exists(&dir.join(format!("{}.entry", entry.file))).await?;
        Ok(true)
    }

    async fn keys(&self, namespace: &str) -> SwCacheResult<Vec<RequestKey>> {
        let ledger = Self::load_ledger(&self.namespace_dir(namespace)).await?;
        Ok(ledger
            .map(|l| {
                let mut entries = l.entries;
                entries.sort_by_key(|e| e.seq);
                entries.into_iter().map(|e| e.key).collect()
            })
            .unwrap_or_default())
    }
}
