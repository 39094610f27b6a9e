//! Baseline loading and validation.
//!
//! A baseline is a versioned YAML document (JSON is accepted as a YAML subset):
//!
//! ```yaml
//! version: 1
//! items:
//!   - id: ssh.permit_root_login
//!     kind: KeyValueSetting
//!     target: /etc/ssh/sshd_config
//!     key: PermitRootLogin
//!     desired: "no"
//!   - id: ssh.service
//!     kind: ServiceState
//!     target: ssh
//!     desired: { enabled: true, running: true }
//!     depends_on: [ssh.permit_root_login]
//! ```
//!
//! Loading fails fast: any error yields no baseline, and therefore no actions.
use std::collections::HashSet;
use std::path::Path;

pub mod graph;
mod schema;

pub use graph::topo_order;

use crate::constants::SUPPORTED_BASELINE_VERSIONS;
use crate::types::errors::ParseError;
use crate::types::Baseline;

/// Parse and validate a baseline document.
///
/// # Errors
///
/// Returns the first [`ParseError`] found: syntax, unsupported version, duplicate ids,
/// unknown dependencies, dependency cycles, per-kind value mismatches or invalid targets.
pub fn load(source: &str) -> Result<Baseline, ParseError> {
    let raw: schema::RawBaseline =
        serde_yaml::from_str(source).map_err(|e| ParseError::Syntax(e.to_string()))?;
    if !SUPPORTED_BASELINE_VERSIONS.contains(&raw.version) {
        return Err(ParseError::UnsupportedVersion(raw.version));
    }
    let mut seen = HashSet::new();
    for it in &raw.items {
        if !seen.insert(it.id.as_str()) {
            return Err(ParseError::DuplicateId(it.id.clone()));
        }
    }
    let items = raw
        .items
        .into_iter()
        .map(schema::RawItem::into_item)
        .collect::<Result<Vec<_>, _>>()?;
    // Surfaces unknown dependencies and cycles; the order itself is recomputed by the planner.
    topo_order(&items)?;
    Ok(Baseline {
        version: raw.version,
        items,
    })
}

/// Read and [`load`] a baseline file.
///
/// # Errors
///
/// `ParseError::Io` when the file cannot be read, otherwise as [`load`].
pub fn load_file(path: &Path) -> Result<Baseline, ParseError> {
    let source = std::fs::read_to_string(path)
        .map_err(|e| ParseError::Io(format!("{}: {e}", path.display())))?;
    load(&source)
}
