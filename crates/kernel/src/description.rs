//! Helpers for reading YAML descriptions.
//!
//! World and layer entries are checked field by field on the parsed
//! [`serde_yaml::Value`]; model bodies deserialize straight into typed entries.

use std::path::{Path, PathBuf};

use planeworld_common::{Color, Pose};
use serde_yaml::Value;

use crate::error::DescriptionError;

/// Read and parse a description file.
pub fn load_yaml(path: &Path) -> Result<Value, DescriptionError> {
    let text = std::fs::read_to_string(path).map_err(|source| DescriptionError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&text).map_err(|source| DescriptionError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Directory that relative sub-resource paths in `description` resolve against.
pub fn base_dir(description: &Path) -> PathBuf {
    description
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default()
}

/// Resolve `reference` against `base_dir` unless it is already absolute.
pub fn resolve_path(base_dir: &Path, reference: &str) -> PathBuf {
    let reference = Path::new(reference);
    if reference.is_absolute() {
        reference.to_path_buf()
    } else {
        base_dir.join(reference)
    }
}

/// Scalar rendered as a string: strings as-is, numbers and booleans printed.
pub(crate) fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Exactly `N` numbers.
pub(crate) fn numbers<const N: usize>(value: &Value) -> Option<[f64; N]> {
    let seq = value.as_sequence()?;
    if seq.len() != N {
        return None;
    }
    let mut out = [0.0; N];
    for (slot, v) in out.iter_mut().zip(seq) {
        *slot = v.as_f64()?;
    }
    Some(out)
}

/// `[x, y, theta]`.
pub(crate) fn pose(value: &Value) -> Option<Pose> {
    numbers::<3>(value).map(Pose::from)
}

/// `[r, g, b, a]`.
pub(crate) fn color(value: &Value) -> Option<Color> {
    numbers::<4>(value).map(|[r, g, b, a]| Color {
        r: r as f32,
        g: g as f32,
        b: b as f32,
        a: a as f32,
    })
}
