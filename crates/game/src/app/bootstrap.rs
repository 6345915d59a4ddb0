use std::io;
use std::sync::Arc;
use std::time::Duration;

use outpost_engine::{
    compile_catalog, resolve_app_paths, AppPaths, BackgroundSaver, ContentCompileError,
    ContentRequest, PersistenceError, SaveGateway, SaveGatewayConfig, StartupError,
};
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use super::demo_world;
use super::session::{HostSession, SaveService};

const ENABLED_MODS_ENV_VAR: &str = "OUTPOST_ENABLED_MODS";
const AUTOSAVE_SECONDS_ENV_VAR: &str = "OUTPOST_AUTOSAVE_SECONDS";

#[derive(Debug, Error)]
pub(crate) enum BootstrapError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error("content compile failed: {0}")]
    Content(#[from] ContentCompileError),
    #[error(transparent)]
    Saves(#[from] PersistenceError),
    #[error("failed to start save writer thread: {0}")]
    SaveWriter(#[source] io::Error),
    #[error("OUTPOST_AUTOSAVE_SECONDS must be a whole number of seconds, got {value:?}")]
    InvalidAutosaveInterval { value: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct AppConfig {
    pub(crate) enabled_mods: Vec<String>,
    pub(crate) autosave_interval: Option<Duration>,
}

impl AppConfig {
    fn from_env() -> Result<Self, BootstrapError> {
        Ok(Self {
            enabled_mods: parse_enabled_mods(std::env::var(ENABLED_MODS_ENV_VAR).ok().as_deref()),
            autosave_interval: parse_autosave_interval(
                std::env::var(AUTOSAVE_SECONDS_ENV_VAR).ok().as_deref(),
            )?,
        })
    }
}

pub(crate) struct AppWiring {
    pub(crate) session: HostSession,
    pub(crate) autosave_interval: Option<Duration>,
}

pub(crate) fn build_app() -> Result<AppWiring, BootstrapError> {
    init_tracing();
    info!("=== Outpost Startup ===");

    let config = AppConfig::from_env()?;
    let paths = resolve_app_paths()?;
    info!(
        root = %paths.root.display(),
        saves = %paths.save_dir.display(),
        mods = ?config.enabled_mods,
        "app_paths_resolved"
    );
    wire(&paths, &config)
}

/// Compiles content, opens the save directory, starts the save writer and
/// seeds the starting world.
pub(crate) fn wire(paths: &AppPaths, config: &AppConfig) -> Result<AppWiring, BootstrapError> {
    let catalog = compile_catalog(paths, &ContentRequest::with_mods(config.enabled_mods.clone()))?;
    let gateway = Arc::new(SaveGateway::new(SaveGatewayConfig::new(&paths.save_dir))?);
    let saver = BackgroundSaver::spawn(Arc::clone(&gateway)).map_err(BootstrapError::SaveWriter)?;
    let world = demo_world::seed_world(&catalog);
    info!(
        buildings = catalog.building_defs().count(),
        quests = catalog.quest_defs().count(),
        autosave_seconds = config.autosave_interval.map(|interval| interval.as_secs()),
        "session_ready"
    );

    Ok(AppWiring {
        session: HostSession::new(world, catalog, SaveService::new(gateway, Some(saver))),
        autosave_interval: config.autosave_interval,
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

fn parse_enabled_mods(raw: Option<&str>) -> Vec<String> {
    raw.map(|raw| {
        raw.split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(ToString::to_string)
            .collect::<Vec<_>>()
    })
    .unwrap_or_default()
}

/// Unset, blank or `0` disables autosave.
fn parse_autosave_interval(raw: Option<&str>) -> Result<Option<Duration>, BootstrapError> {
    let Some(value) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
        return Ok(None);
    };
    let seconds = value
        .parse::<u64>()
        .map_err(|_| BootstrapError::InvalidAutosaveInterval {
            value: value.to_string(),
        })?;
    Ok((seconds > 0).then(|| Duration::from_secs(seconds)))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use outpost_engine::WorldHandle;
    use tempfile::TempDir;

    use super::*;

    const DEFS: &str = r#"<Defs>
  <BuildingDef>
    <defName>hut</defName>
    <label>Hut</label>
    <prefab>Hut</prefab>
    <tier>1</tier>
  </BuildingDef>
  <QuestDef>
    <id>3</id>
    <title>Start</title>
    <objectives>
      <objective><description>look around</description><targetAmount>1</targetAmount></objective>
    </objectives>
  </QuestDef>
</Defs>"#;

    #[test]
    fn enabled_mods_are_split_and_trimmed() {
        assert_eq!(
            parse_enabled_mods(Some(" tools , ,extra")),
            vec!["tools".to_string(), "extra".to_string()]
        );
        assert!(parse_enabled_mods(None).is_empty());
    }

    #[test]
    fn autosave_interval_parsing() {
        assert_eq!(parse_autosave_interval(None).expect("unset"), None);
        assert_eq!(parse_autosave_interval(Some("0")).expect("zero"), None);
        assert_eq!(
            parse_autosave_interval(Some(" 30 ")).expect("thirty"),
            Some(Duration::from_secs(30))
        );
        assert!(matches!(
            parse_autosave_interval(Some("soon")),
            Err(BootstrapError::InvalidAutosaveInterval { .. })
        ));
    }

    #[test]
    fn wiring_builds_a_session_from_content_on_disk() {
        let temp = TempDir::new().expect("temp");
        let paths = AppPaths::under_root(temp.path(), None);
        fs::create_dir_all(&paths.base_content_dir).expect("base dir");
        fs::write(paths.base_content_dir.join("defs.xml"), DEFS).expect("defs");

        let app = wire(&paths, &AppConfig::default()).expect("wire");
        assert!(app.autosave_interval.is_none());
        let world = app.session.world();
        assert_eq!(world.buildings().len(), 1);
        assert!(world.quest_log().and_then(|log| log.quest(3)).expect("quest").is_active);
        assert!(paths.save_dir.is_dir());
    }

    #[test]
    fn missing_mod_fails_wiring() {
        let temp = TempDir::new().expect("temp");
        let paths = AppPaths::under_root(temp.path(), None);
        fs::create_dir_all(&paths.base_content_dir).expect("base dir");
        fs::write(paths.base_content_dir.join("defs.xml"), DEFS).expect("defs");

        let config = AppConfig {
            enabled_mods: vec!["absent".to_string()],
            autosave_interval: None,
        };
        assert!(matches!(
            wire(&paths, &config),
            Err(BootstrapError::Content(_))
        ));
    }
}
