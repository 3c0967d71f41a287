//! Dependency kinds: the three ways a step can declare an input.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::artifact::Artifact;
use crate::config::EngineConfig;
use crate::error::{CoreError, CoreResult};
use crate::hash_cache::HashCache;
use crate::hashing::hash_bytes;

#[derive(Debug, Clone)]
pub enum DependencyKind {
    ArtifactRef,
    InlineData { data: Vec<u8> },
    FileOnDisk { path: PathBuf },
}

#[derive(Debug, Clone)]
pub struct Dependency {
    pub id: String,
    pub kind: DependencyKind,
    cache: HashCache,
}

impl Dependency {
    pub fn artifact_ref(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: DependencyKind::ArtifactRef,
            cache: HashCache::new(),
        }
    }

    pub fn inline_data(id: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            id: id.into(),
            kind: DependencyKind::InlineData { data },
            cache: HashCache::new(),
        }
    }

    pub fn file_on_disk(id: impl Into<String>, path: PathBuf) -> Self {
        Self {
            id: id.into(),
            kind: DependencyKind::FileOnDisk { path },
            cache: HashCache::new(),
        }
    }

    pub fn type_str(&self) -> &'static str {
        match self.kind {
            DependencyKind::ArtifactRef => "artifact",
            DependencyKind::InlineData { .. } => "data",
            DependencyKind::FileOnDisk { .. } => "file",
        }
    }

    pub fn stored_hash(&self) -> &str {
        self.cache.get_hash()
    }

    pub fn restore_hash(&mut self, hash: impl Into<String>) {
        self.cache.store_hash(hash);
    }

    fn artifact<'a>(
        &self,
        artifacts: &'a BTreeMap<String, Artifact>,
    ) -> CoreResult<&'a Artifact> {
        artifacts
            .get(&self.id)
            .ok_or_else(|| CoreError::UnknownArtifact {
                name: self.id.clone(),
            })
    }

    /// The dependency's own content hash, ignoring any cached comparison
    /// semantics. For `ArtifactRef` this is the *artifact's* current hash.
    pub fn calculate_hash(
        &self,
        artifacts: &BTreeMap<String, Artifact>,
        config: &EngineConfig,
    ) -> CoreResult<String> {
        match &self.kind {
            DependencyKind::ArtifactRef => self.artifact(artifacts)?.calculate_hash(config),
            DependencyKind::InlineData { data } => hash_bytes(data, config),
            DependencyKind::FileOnDisk { path } => match std::fs::read(path) {
                Ok(bytes) => hash_bytes(&bytes, config),
                Err(_) => Ok(crate::hash_cache::SENTINEL.to_string()),
            },
        }
    }

    /// `ArtifactRef` compares the artifact's current hash against the
    /// *artifact's own* stored hash; the other two compare against this
    /// dependency's own stored hash.
    pub fn is_up_to_date(
        &self,
        artifacts: &BTreeMap<String, Artifact>,
        config: &EngineConfig,
    ) -> CoreResult<bool> {
        match &self.kind {
            DependencyKind::ArtifactRef => {
                let artifact = self.artifact(artifacts)?;
                let current = artifact.calculate_hash(config)?;
                Ok(artifact.hash_cache().compare(&current, false))
            }
            _ => {
                let current = self.calculate_hash(artifacts, config)?;
                Ok(self.cache.compare(&current, false))
            }
        }
    }

    /// Store the dependency's currently computed hash (called by
    /// `recalculateHashes`).
    pub fn store_current_hash(
        &mut self,
        artifacts: &BTreeMap<String, Artifact>,
        config: &EngineConfig,
    ) -> CoreResult<()> {
        let hash = self.calculate_hash(artifacts, config)?;
        self.cache.store_hash(hash);
        Ok(())
    }
}
