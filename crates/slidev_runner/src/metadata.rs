//! Embedded package metadata and the image reference derived from it.
//!
//! The image tag pins both the wrapper's own release and the `@slidev/cli`
//! version baked into the image, so a new Slidev release always produces a
//! new tag.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{RunnerError, RunnerResult};

/// Repository part of the image reference.
pub const IMAGE_NAME: &str = "nnynn/slidev";

/// npm package whose version is part of the image tag.
pub const SLIDEV_PACKAGE: &str = "@slidev/cli";

/// `package.json` installed into the image.
pub const PACKAGE_JSON: &str = include_str!("../assets/package.json");

/// Dockerfile the image is built from.
pub const DOCKERFILE: &str = include_str!("../assets/Dockerfile");

/// A tagged image identifier, `name:version`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageReference {
    name: String,
    version: String,
}

impl ImageReference {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Check whether a repo tag reported by the engine designates this image.
    ///
    /// Podman reports fully qualified tags (`docker.io/nnynn/slidev:1`), Docker
    /// short ones; both forms match.
    pub fn matches_tag(&self, tag: &str) -> bool {
        tag.parse::<ImageReference>()
            .map(|other| {
                other.version == self.version
                    && short_name(&other.name) == short_name(&self.name)
            })
            .unwrap_or(false)
    }
}

/// Repository name without the default registry and namespace.
fn short_name(name: &str) -> &str {
    let name = ["docker.io/", "index.docker.io/", "localhost/"]
        .iter()
        .find_map(|prefix| name.strip_prefix(prefix))
        .unwrap_or(name);

    match name.strip_prefix("library/") {
        Some(rest) if !rest.contains('/') => rest,
        _ => name,
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.version)
    }
}

impl FromStr for ImageReference {
    type Err = RunnerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // A colon inside the registry host (localhost:5000/foo) is not a tag separator.
        match s.rsplit_once(':') {
            Some((name, tag)) if !name.is_empty() && !tag.is_empty() && !tag.contains('/') => {
                Ok(Self::new(name, tag))
            }
            _ => Err(RunnerError::InvalidOption(format!(
                "image reference '{}' has no tag",
                s
            ))),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PackageManifest {
    version: String,
    #[serde(default)]
    dependencies: BTreeMap<String, String>,
}

/// Wrapper release plus the pinned Slidev version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolVersion {
    pub script: String,
    pub slidev: String,
}

impl ToolVersion {
    /// Read the version pair from the `package.json` compiled into the binary.
    pub fn embedded() -> RunnerResult<Self> {
        Self::from_manifest(PACKAGE_JSON)
    }

    /// Parse the version pair from a `package.json` document.
    pub fn from_manifest(json: &str) -> RunnerResult<Self> {
        let manifest: PackageManifest = serde_json::from_str(json)?;

        let slidev = manifest
            .dependencies
            .get(SLIDEV_PACKAGE)
            .ok_or_else(|| {
                RunnerError::Metadata(format!("dependency {} is missing", SLIDEV_PACKAGE))
            })?
            // Range operators are not valid in an image tag.
            .trim_start_matches(['^', '~', '=', 'v'])
            .to_string();

        if manifest.version.is_empty() || slidev.is_empty() {
            return Err(RunnerError::Metadata("empty version string".into()));
        }

        Ok(Self {
            script: manifest.version,
            slidev,
        })
    }

    /// `<script>-<slidev>`, used as the image tag.
    pub fn combined(&self) -> String {
        format!("{}-{}", self.script, self.slidev)
    }

    pub fn image_reference(&self) -> ImageReference {
        ImageReference::new(IMAGE_NAME, self.combined())
    }
}
