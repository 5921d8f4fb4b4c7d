use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use reqwest::StatusCode;
use reqwest::Url;
use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};

pub trait BlobStore {
    fn get(&self, key: &str) -> Result<Vec<u8>>;

    fn put(&self, key: &str, bytes: &[u8]) -> Result<()>;

    fn list_keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>>;

    fn describe(&self) -> String;
}

impl<B: BlobStore + ?Sized> BlobStore for Box<B> {
    fn get(&self, key: &str) -> Result<Vec<u8>> {
        (**self).get(key)
    }

    fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        (**self).put(key, bytes)
    }

    fn list_keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        (**self).list_keys_with_prefix(prefix)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    blobs: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlobStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Vec<u8>> {
        let guard = self.blobs.lock().expect("memory store lock poisoned");
        guard.get(key).cloned().ok_or_else(|| Error::NotFound {
            key: key.to_string(),
        })
    }

    fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let mut guard = self.blobs.lock().expect("memory store lock poisoned");
        guard.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn list_keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let guard = self.blobs.lock().expect("memory store lock poisoned");
        Ok(guard
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }

    fn describe(&self) -> String {
        "memory://".to_string()
    }
}

#[derive(Debug, Clone)]
pub struct LocalStore {
    dir: PathBuf,
}

impl LocalStore {
    pub fn new(root: &Path, bucket: &str) -> Self {
        Self {
            dir: root.join(bucket),
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        key.split('/')
            .filter(|seg| !seg.is_empty())
            .fold(self.dir.clone(), |path, seg| path.join(seg))
    }
}

impl BlobStore for LocalStore {
    fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.path_for(key);
        match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(Error::NotFound {
                key: key.to_string(),
            }),
            Err(err) => Err(Error::io(path.display().to_string(), err)),
        }
    }

    fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path_for(key);
        let Some(dir) = path.parent() else {
            return Err(Error::Storage {
                key: key.to_string(),
                message: "key has no parent directory".to_string(),
            });
        };
        fs::create_dir_all(dir).map_err(|e| Error::io(dir.display().to_string(), e))?;

        // Staged next to the target so the rename stays on one filesystem;
        // dropped (and removed) on any early return.
        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .map_err(|e| Error::io(dir.display().to_string(), e))?;
        tmp.write_all(bytes)
            .map_err(|e| Error::io(tmp.path().display().to_string(), e))?;
        tmp.persist(&path)
            .map_err(|e| Error::io(path.display().to_string(), e.error))?;
        debug!(key, bytes = bytes.len(), "local put");
        Ok(())
    }

    fn list_keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        collect_keys(&self.dir, "", &mut keys)?;
        keys.retain(|k| k.starts_with(prefix));
        keys.sort();
        Ok(keys)
    }

    fn describe(&self) -> String {
        format!("file://{}", self.dir.display())
    }
}

fn collect_keys(dir: &Path, key_prefix: &str, out: &mut Vec<String>) -> Result<()> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(Error::io(dir.display().to_string(), err)),
    };
    for entry in entries {
        let entry = entry.map_err(|e| Error::io(dir.display().to_string(), e))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        // Leftover staging files from an interrupted put.
        if name.starts_with(".tmp") {
            continue;
        }
        let key = if key_prefix.is_empty() {
            name
        } else {
            format!("{key_prefix}/{name}")
        };
        let file_type = entry
            .file_type()
            .map_err(|e| Error::io(entry.path().display().to_string(), e))?;
        if file_type.is_dir() {
            collect_keys(&entry.path(), &key, out)?;
        } else {
            out.push(key);
        }
    }
    Ok(())
}

pub const DEFAULT_GCS_API_BASE: &str = "https://storage.googleapis.com";

pub struct GcsStore {
    client: Client,
    api_base: Url,
    bucket: String,
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListObjectsPage {
    #[serde(default)]
    items: Vec<ObjectItem>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObjectItem {
    name: String,
}

impl GcsStore {
    pub fn new(
        client: Client,
        api_base: &str,
        bucket: &str,
        access_token: Option<String>,
    ) -> Result<Self> {
        let api_base = Url::parse(api_base).map_err(|e| Error::Storage {
            key: String::new(),
            message: format!("invalid storage api base {api_base:?}: {e}"),
        })?;
        Ok(Self {
            client,
            api_base,
            bucket: bucket.to_string(),
            access_token,
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Storage {
                key: String::new(),
                message: format!("storage api base {} cannot hold a path", self.api_base),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorized(
        &self,
        req: reqwest::blocking::RequestBuilder,
    ) -> reqwest::blocking::RequestBuilder {
        match self.access_token.as_deref() {
            Some(token) => req.header(AUTHORIZATION, format!("Bearer {token}")),
            None => req,
        }
    }
}

impl BlobStore for GcsStore {
    fn get(&self, key: &str) -> Result<Vec<u8>> {
        let mut url = self.url(&["storage", "v1", "b", &self.bucket, "o", key])?;
        url.query_pairs_mut().append_pair("alt", "media");
        let resp = self.authorized(self.client.get(url)).send()?;
        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(Error::NotFound {
                key: key.to_string(),
            });
        }
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(Error::Storage {
                key: key.to_string(),
                message: format!("http {status}: {body}"),
            });
        }
        Ok(resp.bytes()?.to_vec())
    }

    fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let mut url = self.url(&["upload", "storage", "v1", "b", &self.bucket, "o"])?;
        url.query_pairs_mut()
            .append_pair("uploadType", "media")
            .append_pair("name", key);
        let req = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(bytes.to_vec());
        let resp = self.authorized(req).send()?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(Error::Storage {
                key: key.to_string(),
                message: format!("upload http {status}: {body}"),
            });
        }
        debug!(key, bytes = bytes.len(), "gcs put");
        Ok(())
    }

    fn list_keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut url = self.url(&["storage", "v1", "b", &self.bucket, "o"])?;
            {
                let mut query = url.query_pairs_mut();
                query
                    .append_pair("prefix", prefix)
                    .append_pair("fields", "items(name),nextPageToken");
                if let Some(token) = page_token.as_deref() {
                    query.append_pair("pageToken", token);
                }
            }
            let resp = self.authorized(self.client.get(url)).send()?;
            let status = resp.status();
            // A bucket that does not exist lists as empty.
            if status == StatusCode::NOT_FOUND {
                return Ok(Vec::new());
            }
            if !status.is_success() {
                let body = resp.text().unwrap_or_default();
                return Err(Error::Storage {
                    key: prefix.to_string(),
                    message: format!("list http {status}: {body}"),
                });
            }
            let body = resp.text()?;
            let page: ListObjectsPage = serde_json::from_str(&body)?;
            keys.extend(page.items.into_iter().map(|item| item.name));
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn describe(&self) -> String {
        format!("gs://{}", self.bucket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_prefix_listing_is_exact() {
        let store = MemoryStore::new();
        store.put("gold/season=2024-25/kpis", b"a").unwrap();
        store.put("gold/season=2024-25/team_totals", b"b").unwrap();
        store.put("gold/league_season_kpis", b"c").unwrap();
        store.put("raw/season=2024-25/x", b"d").unwrap();

        let keys = store.list_keys_with_prefix("gold/season=").unwrap();
        assert_eq!(
            keys,
            vec!["gold/season=2024-25/kpis", "gold/season=2024-25/team_totals"]
        );
        assert!(store.list_keys_with_prefix("nope/").unwrap().is_empty());
    }

    #[test]
    fn gcs_object_urls_escape_slashes() {
        let store = GcsStore::new(Client::new(), DEFAULT_GCS_API_BASE, "b", None).unwrap();
        let url = store
            .url(&["storage", "v1", "b", "b", "o", "raw/season=2024-25/data"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://storage.googleapis.com/storage/v1/b/b/o/raw%2Fseason=2024-25%2Fdata"
        );
    }
}
