// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Input manifest parsing (§6).

use oj_core::StoryId;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// One story as declared in the input manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryEntry {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub passes: Option<bool>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub depends_on: Vec<String>,
}

/// The full manifest: an ordered list of stories.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub stories: Vec<StoryEntry>,
}

/// Errors from loading or validating a manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("could not read manifest at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("could not parse manifest at {path} as JSON: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("could not parse manifest at {path} as TOML: {source}")]
    Toml {
        path: String,
        #[source]
        source: Box<toml::de::Error>,
    },
    #[error("manifest is empty: no stories declared")]
    Empty,
    #[error("duplicate story id: {0}")]
    DuplicateId(String),
    #[error("story {story} depends on unknown story {dependency}")]
    UnknownDependency { story: String, dependency: String },
}

impl Manifest {
    /// Load a manifest from disk, detecting JSON vs. TOML by file extension
    /// (defaulting to JSON when the extension is absent or unrecognized).
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let manifest = if path.extension().and_then(|e| e.to_str()) == Some("toml") {
            toml::from_str(&contents).map_err(|source| ManifestError::Toml {
                path: path.display().to_string(),
                source: Box::new(source),
            })?
        } else {
            serde_json::from_str(&contents).map_err(|source| ManifestError::Json {
                path: path.display().to_string(),
                source,
            })?
        };

        Self::validate(&manifest)?;
        Ok(manifest)
    }

    /// Structural validation independent of the dependency-DAG cycle check
    /// (performed separately by `oj_manifest::graph`): non-empty, unique IDs,
    /// and every `depends_on` reference resolves to a declared story.
    pub fn validate(&self) -> Result<(), ManifestError> {
        if self.stories.is_empty() {
            return Err(ManifestError::Empty);
        }

        let mut seen = std::collections::HashSet::new();
        for story in &self.stories {
            if !seen.insert(story.id.as_str()) {
                return Err(ManifestError::DuplicateId(story.id.clone()));
            }
        }

        for story in &self.stories {
            for dep in &story.depends_on {
                if !seen.contains(dep.as_str()) {
                    return Err(ManifestError::UnknownDependency {
                        story: story.id.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }

        Ok(())
    }

    pub fn story_ids(&self) -> Vec<StoryId> {
        self.stories.iter().map(|s| StoryId::new(s.id.clone())).collect()
    }
}
