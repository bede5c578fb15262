//! Input discovery from paths, glob patterns, and comma-separated lists.

use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

use globset::GlobBuilder;
use walkdir::WalkDir;

use crate::error::SamplerError;

const GLOB_META: &[char] = &['*', '?', '[', '{'];

/// Resolves an input argument into a sorted list of existing files.
///
/// The argument may be a single path, a glob pattern, or a comma-separated
/// list of either. Entries that match nothing are skipped.
pub fn resolve_inputs(input: &str) -> Result<Vec<PathBuf>, SamplerError> {
    let mut found = BTreeSet::new();

    for part in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        if part.contains(GLOB_META) {
            found.extend(expand_glob(part)?);
        } else {
            let path = PathBuf::from(part);
            if path.is_file() {
                found.insert(path);
            } else {
                tracing::debug!(path = %part, "Input path does not exist");
            }
        }
    }

    Ok(found.into_iter().collect())
}

fn expand_glob(pattern: &str) -> Result<Vec<PathBuf>, SamplerError> {
    let matcher = GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()?
        .compile_matcher();

    let base = glob_base(pattern);
    let (root, strip_dot) = if base.as_os_str().is_empty() {
        (PathBuf::from("."), true)
    } else {
        (base, false)
    };

    let mut matches = Vec::new();
    for entry in WalkDir::new(&root).follow_links(true).into_iter().filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let candidate = if strip_dot {
            path.strip_prefix(".").unwrap_or(path)
        } else {
            path
        };
        if matcher.is_match(candidate) {
            matches.push(candidate.to_path_buf());
        }
    }
    Ok(matches)
}

/// Longest leading directory of `pattern` without glob metacharacters.
fn glob_base(pattern: &str) -> PathBuf {
    let mut base = PathBuf::new();
    let components: Vec<Component<'_>> = Path::new(pattern).components().collect();
    // the last component names files, never a directory to walk
    for component in components.iter().take(components.len().saturating_sub(1)) {
        if component.as_os_str().to_string_lossy().contains(GLOB_META) {
            break;
        }
        base.push(component);
    }
    base
}
