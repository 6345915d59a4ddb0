use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::AppPaths;

use super::types::{ContentDiscoveryError, ContentRequest};

pub(crate) const BASE_MOD_ID: &str = "base";

#[derive(Debug, Clone)]
pub(crate) struct ModSource {
    pub mod_id: String,
    pub mod_load_index: u32,
    pub source_dir: PathBuf,
}

/// Base content first, then enabled mods in request order.
pub(crate) fn discover_mod_sources(
    app_paths: &AppPaths,
    request: &ContentRequest,
) -> Result<Vec<ModSource>, ContentDiscoveryError> {
    if !app_paths.base_content_dir.is_dir() {
        return Err(ContentDiscoveryError::BaseContentMissing {
            expected_dir: app_paths.base_content_dir.clone(),
        });
    }

    let mut seen = HashSet::<String>::new();
    let mut sources = vec![ModSource {
        mod_id: BASE_MOD_ID.to_string(),
        mod_load_index: 0,
        source_dir: app_paths.base_content_dir.clone(),
    }];

    for (idx, mod_id) in request.enabled_mods.iter().enumerate() {
        let trimmed = mod_id.trim();
        if trimmed.is_empty() {
            return Err(ContentDiscoveryError::EmptyEnabledMod);
        }
        if !seen.insert(trimmed.to_string()) {
            return Err(ContentDiscoveryError::DuplicateEnabledMod {
                mod_id: trimmed.to_string(),
            });
        }
        let mod_dir = app_paths.mods_dir.join(trimmed);
        ensure_dir_exists(trimmed, &mod_dir)?;
        sources.push(ModSource {
            mod_id: trimmed.to_string(),
            mod_load_index: (idx + 1) as u32,
            source_dir: mod_dir,
        });
    }

    Ok(sources)
}

fn ensure_dir_exists(mod_id: &str, path: &Path) -> Result<(), ContentDiscoveryError> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(ContentDiscoveryError::EnabledModMissing {
            mod_id: mod_id.to_string(),
            expected_dir: path.to_path_buf(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn base_is_first_then_enabled_order() {
        let temp = TempDir::new().expect("tempdir");
        let app_paths = AppPaths::under_root(temp.path(), None);
        fs::create_dir_all(&app_paths.base_content_dir).expect("create base");
        fs::create_dir_all(app_paths.mods_dir.join("b")).expect("create mod b");
        fs::create_dir_all(app_paths.mods_dir.join("a")).expect("create mod a");

        let sources = discover_mod_sources(&app_paths, &ContentRequest::with_mods(["b", "a"]))
            .expect("discover");
        assert_eq!(sources[0].mod_id, "base");
        assert_eq!(sources[1].mod_id, "b");
        assert_eq!(sources[2].mod_id, "a");
        assert_eq!(sources[0].mod_load_index, 0);
        assert_eq!(sources[1].mod_load_index, 1);
        assert_eq!(sources[2].mod_load_index, 2);
    }

    #[test]
    fn duplicate_and_missing_mods_are_rejected() {
        let temp = TempDir::new().expect("tempdir");
        let app_paths = AppPaths::under_root(temp.path(), None);
        fs::create_dir_all(&app_paths.base_content_dir).expect("create base");
        fs::create_dir_all(app_paths.mods_dir.join("a")).expect("create mod a");

        let err = discover_mod_sources(&app_paths, &ContentRequest::with_mods(["a", " a "]))
            .expect_err("duplicate");
        assert!(matches!(
            err,
            ContentDiscoveryError::DuplicateEnabledMod { ref mod_id } if mod_id == "a"
        ));

        let err = discover_mod_sources(&app_paths, &ContentRequest::with_mods(["ghost"]))
            .expect_err("missing");
        assert!(matches!(
            err,
            ContentDiscoveryError::EnabledModMissing { .. }
        ));
    }
}
