//! Loading rules from YAML/JSON files, singly or from a directory.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::rule::Rule;

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("failed to read rule file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse rule file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: ParseError,
    },
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct RuleFile {
    rules: Vec<Rule>,
}

/// Load rules from a single YAML or JSON file (extension-dispatched).
pub fn load_file(path: &Path) -> Result<Vec<Rule>, LoaderError> {
    let contents = fs::read_to_string(path).map_err(|source| LoaderError::Io {
        path: path.display().to_string(),
        source,
    })?;

    let is_json = path.extension().and_then(|e| e.to_str()) == Some("json");

    let file: RuleFile = if is_json {
        serde_json::from_str(&contents).map_err(|e| LoaderError::Parse {
            path: path.display().to_string(),
            source: ParseError::Json(e),
        })?
    } else {
        serde_yaml::from_str(&contents).map_err(|e| LoaderError::Parse {
            path: path.display().to_string(),
            source: ParseError::Yaml(e),
        })?
    };

    Ok(file.rules)
}

/// Load every `.yaml`/`.yml`/`.json` file in `dir`, concatenating them in
/// sorted filename order for deterministic `priority` tie-breaking.
pub fn load_directory(dir: &Path) -> Result<Vec<Rule>, LoaderError> {
    let mut entries: Vec<_> = fs::read_dir(dir)
        .map_err(|source| LoaderError::Io {
            path: dir.display().to_string(),
            source,
        })?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            matches!(
                p.extension().and_then(|e| e.to_str()),
                Some("yaml") | Some("yml") | Some("json")
            )
        })
        .collect();
    entries.sort();

    let mut rules = Vec::new();
    for path in entries {
        rules.extend(load_file(&path)?);
    }
    Ok(rules)
}
