// Copyright 2019 Dmitry Tantsur <dtantsur@protonmail.com>
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Persistent cache of authentication results.

use std::collections::{BTreeMap, HashMap};
use std::fmt::{self, Debug};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::trace;
use static_assertions::{assert_impl_all, assert_obj_safe};

use super::{Error, ErrorKind};

/// Separator of values in a cache record.
const RECORD_SEPARATOR: char = '|';

/// Authentication results worth keeping between runs.
#[derive(Clone, PartialEq, Eq)]
pub struct CachedToken {
    /// Authentication token.
    pub auth_token: String,
    /// Management URL of the compute service.
    pub management_url: String,
    /// Tenant ID.
    pub tenant_id: String,
}

/// Storage for cached tokens.
pub trait TokenStore: Debug + Send + Sync {
    /// Load a token by its key.
    fn load(&self, key: &str) -> Result<Option<CachedToken>, Error>;

    /// Save a token under the key.
    fn save(&self, key: &str, token: &CachedToken) -> Result<(), Error>;
}

assert_obj_safe!(TokenStore);

/// In-memory token store.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    records: Mutex<HashMap<String, String>>,
}

/// Token store backed by a YAML file.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

assert_impl_all!(MemoryTokenStore: Send, Sync);
assert_impl_all!(FileTokenStore: Send, Sync);

/// Build a cache key from its parts, `?` stands for a missing part.
pub fn cache_key(parts: &[Option<&str>]) -> String {
    parts
        .iter()
        .map(|part| part.unwrap_or("?"))
        .collect::<Vec<_>>()
        .join("/")
}

impl CachedToken {
    /// Serialize into a `token|management_url|tenant_id` record.
    pub fn to_record(&self) -> String {
        [
            self.auth_token.as_str(),
            self.management_url.as_str(),
            self.tenant_id.as_str(),
        ]
        .join("|")
    }

    /// Parse a record, returns `None` if it is malformed or has empty parts.
    pub fn from_record(record: &str) -> Option<CachedToken> {
        let mut parts = record.splitn(3, RECORD_SEPARATOR);
        let auth_token = parts.next()?;
        let management_url = parts.next()?;
        let tenant_id = parts.next()?;
        if auth_token.is_empty() || management_url.is_empty() || tenant_id.is_empty() {
            return None;
        }

        Some(CachedToken {
            auth_token: auth_token.to_string(),
            management_url: management_url.to_string(),
            tenant_id: tenant_id.to_string(),
        })
    }
}

impl fmt::Debug for CachedToken {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("CachedToken")
            .field("auth_token", &"***")
            .field("management_url", &self.management_url)
            .field("tenant_id", &self.tenant_id)
            .finish()
    }
}

impl MemoryTokenStore {
    /// Create an empty store.
    #[inline]
    pub fn new() -> MemoryTokenStore {
        MemoryTokenStore::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self, key: &str) -> Result<Option<CachedToken>, Error> {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        Ok(records
            .get(key)
            .and_then(|record| CachedToken::from_record(record)))
    }

    fn save(&self, key: &str, token: &CachedToken) -> Result<(), Error> {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        let _ = records.insert(key.to_string(), token.to_record());
        Ok(())
    }
}

impl FileTokenStore {
    /// Create a store using the provided file.
    #[inline]
    pub fn new<P: Into<PathBuf>>(path: P) -> FileTokenStore {
        FileTokenStore { path: path.into() }
    }

    /// Create a store in the user cache directory.
    pub fn default_location() -> Result<FileTokenStore, Error> {
        let mut path = dirs::cache_dir().ok_or_else(|| {
            Error::new(
                ErrorKind::InvalidConfig,
                "Cannot find the user cache directory",
            )
        })?;
        path.push("osnova");
        path.push("tokens.yaml");
        Ok(FileTokenStore::new(path))
    }

    /// Path to the backing file.
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_records(&self) -> Result<BTreeMap<String, String>, Error> {
        if !self.path.is_file() {
            return Ok(BTreeMap::new());
        }

        let content = fs::read_to_string(&self.path).map_err(|e| {
            Error::new(
                ErrorKind::InvalidConfig,
                format!("Cannot read {}: {}", self.path.display(), e),
            )
        })?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        serde_yaml::from_str(&content).map_err(|e| {
            Error::new(
                ErrorKind::InvalidConfig,
                format!("Cannot parse {}: {}", self.path.display(), e),
            )
        })
    }

    fn write_error<E: fmt::Display>(&self, error: E) -> Error {
        Error::new(
            ErrorKind::InvalidConfig,
            format!("Cannot write {}: {}", self.path.display(), error),
        )
    }

    fn write_records(&self, records: &BTreeMap<String, String>) -> Result<(), Error> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.write_error(e))?;
        }
        let content = serde_yaml::to_string(records).map_err(|e| self.write_error(e))?;

        let mut options = OpenOptions::new();
        let _ = options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            let _ = options.mode(0o600);
        }
        let mut file = options.open(&self.path).map_err(|e| self.write_error(e))?;

        // The mode only applies to new files.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(fs::Permissions::from_mode(0o600))
                .map_err(|e| self.write_error(e))?;
        }

        file.write_all(content.as_bytes())
            .map_err(|e| self.write_error(e))
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self, key: &str) -> Result<Option<CachedToken>, Error> {
        let records = self.read_records()?;
        trace!("Looking up {} in {}", key, self.path.display());
        Ok(records
            .get(key)
            .and_then(|record| CachedToken::from_record(record)))
    }

    fn save(&self, key: &str, token: &CachedToken) -> Result<(), Error> {
        let mut records = self.read_records()?;
        let _ = records.insert(key.to_string(), token.to_record());
        self.write_records(&records)
    }
}

#[cfg(test)]
pub mod test {
    use super::{cache_key, CachedToken, FileTokenStore, MemoryTokenStore, TokenStore};

    fn token() -> CachedToken {
        CachedToken {
            auth_token: "tok".to_string(),
            management_url: "http://nova.example.com/v2/1".to_string(),
            tenant_id: "1".to_string(),
        }
    }

    #[test]
    fn test_cache_key() {
        assert_eq!(
            cache_key(&[
                Some("http://example.com/v2.0"),
                Some("demo"),
                None,
                Some("RegionOne"),
                Some("publicURL"),
                Some("compute"),
                None,
                None
            ]),
            "http://example.com/v2.0/demo/?/RegionOne/publicURL/compute/?/?"
        );
    }

    #[test]
    fn test_record() {
        let record = token().to_record();
        assert_eq!(record, "tok|http://nova.example.com/v2/1|1");
        assert_eq!(CachedToken::from_record(&record), Some(token()));
        assert_eq!(CachedToken::from_record("tok|url"), None);
        assert_eq!(CachedToken::from_record("tok||1"), None);
        assert!(!format!("{:?}", token()).contains("tok,"));
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryTokenStore::new();
        assert_eq!(store.load("key").unwrap(), None);
        store.save("key", &token()).unwrap();
        assert_eq!(store.load("key").unwrap(), Some(token()));
        assert_eq!(store.load("other").unwrap(), None);
    }

    #[test]
    fn test_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("sub").join("tokens.yaml"));
        assert_eq!(store.load("a/b").unwrap(), None);
        store.save("a/b", &token()).unwrap();
        store.save("c/d", &token()).unwrap();

        let reopened = FileTokenStore::new(store.path());
        assert_eq!(reopened.load("a/b").unwrap(), Some(token()));
        assert_eq!(reopened.load("c/d").unwrap(), Some(token()));
        assert_eq!(reopened.load("e/f").unwrap(), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_file_store_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("tokens.yaml"));
        store.save("key", &token()).unwrap();
        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[cfg(unix)]
    #[test]
    fn test_file_store_existing_file_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.yaml");
        std::fs::write(&path, "").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        let store = FileTokenStore::new(path.clone());
        store.save("key", &token()).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(store.load("key").unwrap(), Some(token()));
    }
}
