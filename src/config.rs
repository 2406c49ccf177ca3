//! Cafeteria registry: which cafeterias exist and where their menus come from.
//!
//! The registry is plain data loaded once at startup, either from the copy
//! embedded in the binary (`res/mensen.yaml`) or from a user supplied YAML
//! file, and then handed to the fetcher and runner. Loading validates it:
//! ids must be non-empty and unique, and no two ids may map to the same
//! output directory.
//!
//! # Format
//!
//! ```yaml
//! cafeterias:
//!   - id: bistro-templergraben
//!     name: Bistro Templergraben
//!     provider:
//!       kind: stw-aachen
//!       base_url: https://www.studierendenwerk-aachen.de/
//!       page: bistro_templergraben
//!   - id: mensa-nord
//!     name: Mensa Nord
//!     provider:
//!       kind: open-mensa
//!       base_url: https://openmensa.org/api/v2/
//!       canteen_id: 42
//! ```

use crate::error::{ConfigError, FetchError};
use crate::utils::sanitize_id;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{debug, instrument};
use url::Url;

const BUILTIN_REGISTRY: &str = include_str!("../res/mensen.yaml");

/// Upstream source of a cafeteria's menus, with the provider's quirks.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Provider {
    /// Studierendenwerk Aachen: one HTML page per week, Monday to Friday as
    /// table columns.
    StwAachen { base_url: Url, page: String },
    /// OpenMensa v2 JSON API.
    OpenMensa { base_url: Url, canteen_id: u32 },
}

/// Discriminant of [`Provider`], used to pick the payload parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    StwAachen,
    OpenMensa,
}

impl Provider {
    pub fn kind(&self) -> ProviderKind {
        match self {
            Provider::StwAachen { .. } => ProviderKind::StwAachen,
            Provider::OpenMensa { .. } => ProviderKind::OpenMensa,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Cafeteria {
    pub id: String,
    pub name: String,
    pub provider: Provider,
}

impl Cafeteria {
    /// Name of the cafeteria's directory below the export base directory.
    pub fn output_dir_name(&self) -> String {
        sanitize_id(&self.id)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Registry {
    cafeterias: Vec<Cafeteria>,
}

impl Registry {
    /// Build a registry from cafeterias, validating it.
    pub fn new(cafeterias: Vec<Cafeteria>) -> Result<Self, ConfigError> {
        let registry = Self { cafeterias };
        registry.validate()?;
        Ok(registry)
    }

    /// The registry shipped with the binary.
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_yaml_str(BUILTIN_REGISTRY)
    }

    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let Registry { cafeterias } = serde_yaml::from_str(text)?;
        let registry = Self::new(cafeterias)?;
        debug!(count = registry.cafeterias.len(), "Loaded cafeteria registry");
        Ok(registry)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.cafeterias.is_empty() {
            return Err(ConfigError::Empty);
        }

        let mut ids: HashSet<&str> = HashSet::new();
        let mut dirs: HashMap<String, &str> = HashMap::new();
        for cafeteria in &self.cafeterias {
            if cafeteria.id.trim().is_empty() {
                return Err(ConfigError::EmptyId);
            }
            if !ids.insert(cafeteria.id.as_str()) {
                return Err(ConfigError::DuplicateId(cafeteria.id.clone()));
            }
            let dir = cafeteria.output_dir_name();
            if let Some(first) = dirs.insert(dir.clone(), cafeteria.id.as_str()) {
                return Err(ConfigError::OutputCollision {
                    first: first.to_string(),
                    second: cafeteria.id.clone(),
                    dir,
                });
            }
        }
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<&Cafeteria, FetchError> {
        self.cafeterias
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| FetchError::UnknownSource(id.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cafeteria> {
        self.cafeterias.iter()
    }

    pub fn len(&self) -> usize {
        self.cafeterias.len()
    }

    /// Restrict the registry to the given ids, in registry order. An empty
    /// selection keeps every cafeteria.
    pub fn select(&self, ids: &[String]) -> Result<Registry, ConfigError> {
        if ids.is_empty() {
            return Ok(self.clone());
        }
        for id in ids {
            self.get(id)?;
        }
        let cafeterias = self
            .cafeterias
            .iter()
            .filter(|c| ids.contains(&c.id))
            .cloned()
            .collect();
        Ok(Registry { cafeterias })
    }
}
