//! In-memory policy store with exact version checking.
//!
//! Backs the test-suite and local dry runs. Writes can be made to fail or to
//! collide with a simulated concurrent writer.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{DocumentKey, IdentityResolver, PolicyStore, PolicyVersion, Versioned};
use crate::aws::{AwsError, AwsResult};
use crate::types::PolicyDocument;

#[derive(Debug, Default)]
struct State {
    documents: HashMap<DocumentKey, (u64, PolicyDocument)>,
    last_version: u64,
    key_aliases: HashMap<(String, String, String), String>,
    roles: HashMap<(String, String), String>,
    pending_conflicts: HashMap<DocumentKey, u32>,
    failing: HashSet<DocumentKey>,
    writes: usize,
}

impl State {
    fn next_version(&mut self) -> u64 {
        self.last_version += 1;
        self.last_version
    }
}

fn version_token(version: u64) -> PolicyVersion {
    PolicyVersion::new(format!("v{version}"))
}

#[derive(Debug, Default)]
pub struct InMemoryPolicyStore {
    state: Mutex<State>,
}

impl InMemoryPolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_document(mut self, key: DocumentKey, document: PolicyDocument) -> Self {
        let state = self.state.get_mut();
        let version = state.next_version();
        state.documents.insert(key, (version, document));
        self
    }

    #[must_use]
    pub fn with_key_alias(
        mut self,
        account_id: &str,
        region: &str,
        alias: &str,
        key_id: &str,
    ) -> Self {
        self.state.get_mut().key_aliases.insert(
            (account_id.to_string(), region.to_string(), alias.to_string()),
            key_id.to_string(),
        );
        self
    }

    #[must_use]
    pub fn with_role(mut self, account_id: &str, role_name: &str, role_id: &str) -> Self {
        self.state
            .get_mut()
            .roles
            .insert((account_id.to_string(), role_name.to_string()), role_id.to_string());
        self
    }

    pub async fn document(&self, key: &DocumentKey) -> Option<PolicyDocument> {
        self.state
            .lock()
            .await
            .documents
            .get(key)
            .map(|(_, document)| document.clone())
    }

    /// Replace a document as an external writer would.
    pub async fn set_document(&self, key: DocumentKey, document: PolicyDocument) {
        let mut state = self.state.lock().await;
        let version = state.next_version();
        state.documents.insert(key, (version, document));
    }

    /// Number of successful puts and deletes so far.
    pub async fn write_count(&self) -> usize {
        self.state.lock().await.writes
    }

    /// Make the next `count` writes to `key` lose a race against another
    /// writer: the stored version moves on and the write is refused.
    pub async fn inject_conflicts(&self, key: DocumentKey, count: u32) {
        self.state.lock().await.pending_conflicts.insert(key, count);
    }

    pub async fn fail_writes_to(&self, key: DocumentKey) {
        self.state.lock().await.failing.insert(key);
    }

    fn check_write(
        state: &mut State,
        key: &DocumentKey,
        expected: Option<&PolicyVersion>,
    ) -> AwsResult<()> {
        if state.failing.contains(key) {
            return Err(AwsError::SdkError(format!("simulated failure writing {key}")));
        }
        if let Some(remaining) = state.pending_conflicts.get_mut(key) {
            if *remaining > 0 {
                *remaining -= 1;
                let version = state.next_version();
                if let Some((current, _)) = state.documents.get_mut(key) {
                    *current = version;
                }
                return Err(AwsError::Conflict(format!("{key} was modified concurrently")));
            }
        }
        let current = state.documents.get(key).map(|(version, _)| version_token(*version));
        if current.as_ref() != expected {
            return Err(AwsError::Conflict(format!(
                "{key} is at {:?}, write expected {:?}",
                current.as_ref().map(PolicyVersion::as_str),
                expected.map(PolicyVersion::as_str)
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl PolicyStore for InMemoryPolicyStore {
    async fn get(&self, key: &DocumentKey) -> AwsResult<Option<Versioned<PolicyDocument>>> {
        Ok(self
            .state
            .lock()
            .await
            .documents
            .get(key)
            .map(|(version, document)| Versioned {
                document: document.clone(),
                version: version_token(*version),
            }))
    }

    async fn put(
        &self,
        key: &DocumentKey,
        document: &PolicyDocument,
        expected: Option<&PolicyVersion>,
    ) -> AwsResult<()> {
        let mut state = self.state.lock().await;
        Self::check_write(&mut state, key, expected)?;
        let version = state.next_version();
        state.documents.insert(key.clone(), (version, document.clone()));
        state.writes += 1;
        Ok(())
    }

    async fn delete(&self, key: &DocumentKey, expected: &PolicyVersion) -> AwsResult<()> {
        if matches!(key, DocumentKey::KeyPolicy { .. }) {
            return Err(AwsError::KmsError(format!("{key} cannot be deleted")));
        }
        let mut state = self.state.lock().await;
        Self::check_write(&mut state, key, Some(expected))?;
        state.documents.remove(key);
        state.writes += 1;
        Ok(())
    }
}

#[async_trait]
impl IdentityResolver for InMemoryPolicyStore {
    async fn resolve_key_id(
        &self,
        account_id: &str,
        region: &str,
        alias: &str,
    ) -> AwsResult<Option<String>> {
        Ok(self
            .state
            .lock()
            .await
            .key_aliases
            .get(&(account_id.to_string(), region.to_string(), alias.to_string()))
            .cloned())
    }

    async fn resolve_role_id(
        &self,
        account_id: &str,
        role_name: &str,
    ) -> AwsResult<Option<String>> {
        Ok(self
            .state
            .lock()
            .await
            .roles
            .get(&(account_id.to_string(), role_name.to_string()))
            .cloned())
    }
}
