use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use outpost_engine::{
    capture_world, restore_world, BackgroundSaveOutcome, BackgroundSaver, BuildingTier,
    CaptureError, Catalog, EntityKind, HostEvent, PersistenceError, Pose, RestoreError,
    RestoreReport, SaveGateway, SaveReceipt, SaveSlot, SceneWorld, SlotMetadata, WorldHandle,
};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::console::{ConsoleCommand, ConsoleCommandRegistry, MenuKind};
use super::demo_world;
use super::input::InputAction;
use super::menu::{MenuScreen, MenuSelection, PauseMenu};

pub(crate) const NOTIFICATION_TTL: Duration = Duration::from_secs(2);
pub(crate) const SAVE_SUCCEEDED_TEXT: &str = "Game saved successfully!";
pub(crate) const SAVE_FAILED_TEXT: &str = "Error saving game!";
pub(crate) const LOAD_FAILED_TEXT: &str = "Error loading game!";

#[derive(Debug, Error)]
pub(crate) enum SessionError {
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Restore(#[from] RestoreError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Binds capture and restore to the gateway. Loads wait for the background
/// writer so a restore never reads a slot that is still being written.
pub(crate) struct SaveService {
    gateway: Arc<SaveGateway>,
    saver: Option<BackgroundSaver>,
}

impl SaveService {
    pub(crate) fn new(gateway: Arc<SaveGateway>, saver: Option<BackgroundSaver>) -> Self {
        Self { gateway, saver }
    }

    pub(crate) fn save(
        &self,
        world: &SceneWorld,
        slot: &SaveSlot,
    ) -> Result<SaveReceipt, SessionError> {
        let snapshot = capture_world(world, slot.file_stem(), Utc::now())?;
        self.wait_for_background_writes();
        Ok(self.gateway.save(slot, &snapshot)?)
    }

    pub(crate) fn load(
        &self,
        world: &mut SceneWorld,
        slot: &SaveSlot,
    ) -> Result<RestoreReport, SessionError> {
        self.wait_for_background_writes();
        let snapshot = self.gateway.load(slot)?;
        Ok(restore_world(world, &snapshot)?)
    }

    /// Writes the autosave slot off the main loop when a background writer
    /// is running, inline otherwise.
    pub(crate) fn autosave(&self, world: &SceneWorld) -> Result<(), SessionError> {
        let snapshot = capture_world(world, SaveSlot::Auto.file_stem(), Utc::now())?;
        match &self.saver {
            Some(saver) => saver.submit(SaveSlot::Auto, snapshot),
            None => {
                self.gateway.save(&SaveSlot::Auto, &snapshot)?;
            }
        }
        Ok(())
    }

    pub(crate) fn list_slots(&self) -> Result<Vec<SlotMetadata>, SessionError> {
        Ok(self.gateway.list_slots()?)
    }

    pub(crate) fn quicksave_metadata(&self) -> Option<SlotMetadata> {
        self.gateway.quicksave_metadata()
    }

    pub(crate) fn autosave_metadata(&self) -> Option<SlotMetadata> {
        self.gateway.autosave_metadata()
    }

    pub(crate) fn drain_outcomes_into(&self, out: &mut Vec<BackgroundSaveOutcome>) {
        if let Some(saver) = &self.saver {
            saver.drain_outcomes_into(out);
        }
    }

    fn wait_for_background_writes(&self) {
        if let Some(saver) = &self.saver {
            saver.wait_idle();
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Notification {
    text: String,
    expires_at: Instant,
}

/// One running game: the live world plus the save bindings and pause menu.
/// Every entry point returns the lines to show the player.
pub(crate) struct HostSession {
    world: SceneWorld,
    catalog: Catalog,
    saves: SaveService,
    menu: PauseMenu,
    registry: ConsoleCommandRegistry,
    notification: Option<Notification>,
    quit_requested: bool,
}

impl HostSession {
    pub(crate) fn new(world: SceneWorld, catalog: Catalog, saves: SaveService) -> Self {
        Self {
            world,
            catalog,
            saves,
            menu: PauseMenu::default(),
            registry: ConsoleCommandRegistry::with_builtins(),
            notification: None,
            quit_requested: false,
        }
    }

    pub(crate) fn world(&self) -> &SceneWorld {
        &self.world
    }

    pub(crate) fn quit_requested(&self) -> bool {
        self.quit_requested
    }

    pub(crate) fn is_paused(&self) -> bool {
        self.menu.is_open()
    }

    pub(crate) fn active_notification(&self) -> Option<&str> {
        self.notification.as_ref().map(|notice| notice.text.as_str())
    }

    pub(crate) fn handle_line(&mut self, line: &str, now: Instant) -> Vec<String> {
        let mut out = Vec::new();
        match self.registry.parse_line(line) {
            Ok(Some(command)) => self.apply(command, now, &mut out),
            Ok(None) => {}
            Err(message) => out.push(message),
        }
        out
    }

    pub(crate) fn handle_action(&mut self, action: InputAction, now: Instant) -> Vec<String> {
        let mut out = Vec::new();
        self.apply_action(action, now, &mut out);
        out
    }

    /// Expires notifications and reports finished background writes.
    pub(crate) fn tick(&mut self, now: Instant) -> Vec<String> {
        let mut out = Vec::new();
        if self
            .notification
            .as_ref()
            .is_some_and(|notice| notice.expires_at <= now)
        {
            self.notification = None;
        }

        let mut outcomes = Vec::new();
        self.saves.drain_outcomes_into(&mut outcomes);
        for outcome in outcomes {
            match outcome.result {
                Ok(receipt) => {
                    debug!(slot = %outcome.slot, saved_at = %receipt.saved_at, "autosave_written");
                }
                Err(err) => {
                    warn!(slot = %outcome.slot, error = %err, "autosave_failed");
                    self.notify(SAVE_FAILED_TEXT, now, &mut out);
                }
            }
        }

        let mut events = Vec::new();
        self.world.drain_host_events_into(&mut events);
        for event in events {
            debug!(event = ?event, "host_event");
            if let HostEvent::HealthChanged { current, max } = event {
                if current <= 0.0 {
                    out.push(format!("The player has fallen ({current:.0}/{max:.0})."));
                }
            }
        }
        out
    }

    /// Autosaves are skipped while paused.
    pub(crate) fn autosave(&mut self, now: Instant) -> Vec<String> {
        let mut out = Vec::new();
        if self.is_paused() {
            return out;
        }
        if let Err(err) = self.saves.autosave(&self.world) {
            warn!(error = %err, "autosave_failed");
            self.notify(SAVE_FAILED_TEXT, now, &mut out);
        }
        out
    }

    fn apply(&mut self, command: ConsoleCommand, now: Instant, out: &mut Vec<String>) {
        match command {
            ConsoleCommand::Help => out.extend(self.registry.help_lines()),
            ConsoleCommand::Status => self.status(out),
            ConsoleCommand::QuickSave => self.apply_action(InputAction::QuickSave, now, out),
            ConsoleCommand::QuickLoad => self.apply_action(InputAction::QuickLoad, now, out),
            ConsoleCommand::Pause => self.apply_action(InputAction::TogglePause, now, out),
            ConsoleCommand::Press { action } => self.apply_action(action, now, out),
            ConsoleCommand::Save { slot } => match SaveSlot::manual(&slot) {
                Ok(slot) => self.save_into(&slot, now, out),
                Err(err) => out.push(format!("error: {err}")),
            },
            ConsoleCommand::Load { slot } => match SaveSlot::named(&slot) {
                Ok(slot) => self.load_from(&slot, now, out),
                Err(err) => out.push(format!("error: {err}")),
            },
            ConsoleCommand::ListSaves => self.list_saves(out),
            ConsoleCommand::Menu { kind } => self.open_slot_menu(kind, out),
            ConsoleCommand::Select { index } => self.select(index, now, out),
            ConsoleCommand::Back => {
                let screen = self.menu.back();
                out.push(format!("menu: {}", screen_label(screen)));
            }
            ConsoleCommand::Give { resource, amount } => {
                match demo_world::give_resource(&mut self.world, &resource, amount) {
                    Some(value) => out.push(format!("{resource}: {value}")),
                    None => out.push("error: this world has no economy".to_string()),
                }
            }
            ConsoleCommand::Build { position } => self.build(Pose::at(position), out),
            ConsoleCommand::Hurt { amount } => {
                self.world.damage_player(amount);
                if let Some(player) = self.world.player() {
                    out.push(format!("health: {:.0}/{:.0}", player.health, player.max_health));
                }
            }
            ConsoleCommand::Kill { name } => self.kill(&name, out),
            ConsoleCommand::Quest {
                id,
                objective,
                amount,
            } => match demo_world::advance_quest(&mut self.world, id, objective, amount) {
                Some(progress) => out.push(format!("quest {id}: {progress:?}")),
                None => out.push(format!("error: quest {id} objective {objective} is not active")),
            },
            ConsoleCommand::Quit => {
                self.quit_requested = true;
                out.push("bye".to_string());
            }
        }
    }

    fn apply_action(&mut self, action: InputAction, now: Instant, out: &mut Vec<String>) {
        debug!(key = action.key_name(), "input_action");
        match action {
            InputAction::QuickSave => self.save_into(&SaveSlot::Quick, now, out),
            InputAction::QuickLoad => self.load_from(&SaveSlot::Quick, now, out),
            InputAction::TogglePause => {
                let screen = self.menu.toggle();
                out.push(format!("menu: {}", screen_label(screen)));
            }
        }
    }

    fn save_into(&mut self, slot: &SaveSlot, now: Instant, out: &mut Vec<String>) {
        match self.saves.save(&self.world, slot) {
            Ok(receipt) => {
                info!(slot = %slot, pruned = receipt.pruned.len(), "game_saved");
                self.notify(SAVE_SUCCEEDED_TEXT, now, out);
            }
            Err(err) => {
                warn!(slot = %slot, error = %err, "game_save_failed");
                out.push(format!("error: {err}"));
                self.notify(SAVE_FAILED_TEXT, now, out);
            }
        }
    }

    fn load_from(&mut self, slot: &SaveSlot, now: Instant, out: &mut Vec<String>) {
        match self.saves.load(&mut self.world, slot) {
            Ok(report) => {
                out.push(format!("loaded {slot}"));
                for mismatch in &report.mismatches {
                    out.push(format!("warning: {mismatch}"));
                }
                if !slot.is_quick() {
                    self.menu.close();
                }
            }
            Err(err) => {
                warn!(slot = %slot, error = %err, "game_load_failed");
                out.push(format!("error: {err}"));
                self.notify(LOAD_FAILED_TEXT, now, out);
            }
        }
    }

    fn list_saves(&self, out: &mut Vec<String>) {
        match self.saves.list_slots() {
            Ok(slots) if slots.is_empty() => out.push("no manual saves".to_string()),
            Ok(slots) => {
                for metadata in slots {
                    out.push(format!(
                        "{} - {}",
                        metadata.display_name,
                        metadata.display_timestamp()
                    ));
                }
            }
            Err(err) => out.push(format!("error: {err}")),
        }
        for reserved in [self.saves.quicksave_metadata(), self.saves.autosave_metadata()]
            .into_iter()
            .flatten()
        {
            out.push(format!(
                "{} - {}",
                reserved.display_name,
                reserved.display_timestamp()
            ));
        }
    }

    fn open_slot_menu(&mut self, kind: MenuKind, out: &mut Vec<String>) {
        let slots = match self.saves.list_slots() {
            Ok(slots) => slots,
            Err(err) => {
                out.push(format!("error: {err}"));
                return;
            }
        };
        match kind {
            MenuKind::Save => self.menu.open_save_menu(&slots),
            MenuKind::Load => self.menu.open_load_menu(&slots),
        }
        out.push(format!("menu: {}", screen_label(self.menu.screen())));
        for (index, entry) in self.menu.entries().iter().enumerate() {
            out.push(format!("  [{index}] {}", entry.label));
        }
    }

    fn select(&mut self, index: usize, now: Instant, out: &mut Vec<String>) {
        match self.menu.select(index) {
            Some(MenuSelection::Save(slot)) => {
                self.save_into(&slot, now, out);
                self.menu.back();
            }
            Some(MenuSelection::Load(slot)) => self.load_from(&slot, now, out),
            None => out.push(format!("error: no menu entry {index}")),
        }
    }

    fn build(&mut self, pose: Pose, out: &mut Vec<String>) {
        let tiers = self.catalog.building_tiers();
        let Some(def) = tiers.get(BuildingTier::Base) else {
            out.push("error: no base building is defined".to_string());
            return;
        };
        let id = self.world.spawn_building(def, pose, 1);
        self.world.set_building_colliders_enabled(id, true);
        self.world.register_current_building(id);
        self.world.apply_pending();
        out.push(format!("built {} at {:?}", def.label, pose.position));
    }

    fn kill(&mut self, name: &str, out: &mut Vec<String>) {
        let Some(id) = self
            .world
            .find_by_name(EntityKind::Enemy, name)
            .map(|entity| entity.id)
        else {
            out.push(format!("error: no enemy named '{name}'"));
            return;
        };
        self.world.set_enemy_health(id, 0.0);
        self.world.destroy_entity(id);
        self.world.apply_pending();
        out.push(format!("{name} killed"));
    }

    fn status(&self, out: &mut Vec<String>) {
        if let Some(player) = self.world.player() {
            let position = player.pose.position;
            out.push(format!(
                "player: ({:.1}, {:.1}, {:.1}) health {:.0}/{:.0}",
                position.x, position.y, position.z, player.health, player.max_health
            ));
        }
        if let Some(counters) = self.world.resources() {
            out.push(format!(
                "resources: wood {} stone {} gold {}",
                counters.wood, counters.stone, counters.gold
            ));
        }
        out.push(format!(
            "buildings: {}, npcs: {}, enemies: {}",
            self.world.buildings().len(),
            self.world.npcs().len(),
            self.world.enemies().len()
        ));
        if let Some(log) = self.world.quest_log() {
            for quest in log.active() {
                let progress = quest
                    .objectives
                    .iter()
                    .map(|objective| format!("{}/{}", objective.current_amount, objective.target_amount))
                    .collect::<Vec<_>>()
                    .join(", ");
                out.push(format!("quest {} '{}': {progress}", quest.id, quest.title));
            }
        }
        out.push(format!("menu: {}", screen_label(self.menu.screen())));
        if let Some(text) = self.active_notification() {
            out.push(format!("notice: {text}"));
        }
    }

    fn notify(&mut self, text: &str, now: Instant, out: &mut Vec<String>) {
        out.push(text.to_string());
        self.notification = Some(Notification {
            text: text.to_string(),
            expires_at: now + NOTIFICATION_TTL,
        });
    }
}

fn screen_label(screen: MenuScreen) -> &'static str {
    match screen {
        MenuScreen::Closed => "closed",
        MenuScreen::Paused => "paused",
        MenuScreen::SaveMenu => "save slots",
        MenuScreen::LoadMenu => "load slots",
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::TimeZone;
    use outpost_engine::{
        BuildingDef, ManualClock, QuestDef, QuestObjectiveDef, SaveGatewayConfig,
    };
    use tempfile::TempDir;

    use super::*;

    fn catalog() -> Catalog {
        Catalog::from_defs(
            vec![BuildingDef {
                def_name: "hut".to_string(),
                label: "Hut".to_string(),
                prefab: "Hut".to_string(),
                tier: BuildingTier::Base,
                wood_cost: 0,
                stone_cost: 0,
                gold_cost: 0,
                upgrade_to: None,
            }],
            vec![QuestDef {
                id: 7,
                title: "Clear the Road".to_string(),
                description: String::new(),
                objectives: vec![
                    QuestObjectiveDef {
                        description: "scout".to_string(),
                        target_amount: 3,
                    },
                    QuestObjectiveDef {
                        description: "fight".to_string(),
                        target_amount: 5,
                    },
                ],
                experience_reward: 10,
                gold_reward: 40,
            }],
        )
    }

    fn session_in(temp: &TempDir, background: bool) -> (HostSession, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::starting_at(
            Utc.with_ymd_and_hms(2026, 4, 1, 8, 0, 0).single().expect("time"),
        ));
        let gateway = Arc::new(
            SaveGateway::with_clock(
                SaveGatewayConfig::new(temp.path().join("saves")),
                clock.clone(),
            )
            .expect("gateway"),
        );
        let saver = background
            .then(|| BackgroundSaver::spawn(Arc::clone(&gateway)).expect("saver"));
        let catalog = catalog();
        let world = demo_world::seed_world(&catalog);
        (
            HostSession::new(world, catalog, SaveService::new(gateway, saver)),
            clock,
        )
    }

    #[test]
    fn quicksave_then_quickload_rolls_back_changes() {
        let temp = TempDir::new().expect("temp");
        let (mut session, _clock) = session_in(&temp, false);
        let now = Instant::now();

        let out = session.handle_action(InputAction::QuickSave, now);
        assert_eq!(out, vec![SAVE_SUCCEEDED_TEXT.to_string()]);
        assert_eq!(session.active_notification(), Some(SAVE_SUCCEEDED_TEXT));

        session.handle_line("give wood 500", now);
        session.handle_line("build 1 0 2", now);
        session.handle_line("kill Enemy_03", now);
        assert_eq!(session.world().buildings().len(), 2);

        let out = session.handle_line("press f9", now);
        assert_eq!(out[0], "loaded quicksave");
        assert_eq!(out.len(), 2);
        assert!(out[1].contains("Enemy_03"));
        assert_eq!(session.world().buildings().len(), 1);
        assert_eq!(session.world().resources().expect("economy").wood, 50);
        // Enemies destroyed after the save are not recreated.
        assert!(session
            .world()
            .find_by_name(EntityKind::Enemy, "Enemy_03")
            .is_none());
    }

    #[test]
    fn notification_expires_after_ttl() {
        let temp = TempDir::new().expect("temp");
        let (mut session, _clock) = session_in(&temp, false);
        let now = Instant::now();
        session.handle_line("quicksave", now);

        session.tick(now + NOTIFICATION_TTL / 2);
        assert!(session.active_notification().is_some());
        session.tick(now + NOTIFICATION_TTL);
        assert!(session.active_notification().is_none());
    }

    #[test]
    fn failed_load_leaves_world_alone_and_notifies() {
        let temp = TempDir::new().expect("temp");
        let (mut session, _clock) = session_in(&temp, false);
        fs::write(temp.path().join("saves").join("broken.json"), "not json").expect("write");
        let before = session.world().resources();

        let out = session.handle_line("load broken", Instant::now());
        assert_eq!(out.last().map(String::as_str), Some(LOAD_FAILED_TEXT));
        assert!(out[0].starts_with("error: corrupt save"));
        assert_eq!(session.world().resources(), before);
    }

    #[test]
    fn reserved_slot_name_is_rejected() {
        let temp = TempDir::new().expect("temp");
        let (mut session, _clock) = session_in(&temp, false);
        let out = session.handle_line("save QuickSave", Instant::now());
        assert_eq!(out.len(), 1);
        assert!(out[0].contains("reserved"));
        assert!(session.saves.list_slots().expect("list").is_empty());
    }

    #[test]
    fn menu_flow_saves_new_slot_then_loads_and_closes() {
        let temp = TempDir::new().expect("temp");
        let (mut session, clock) = session_in(&temp, false);
        let now = Instant::now();

        session.handle_action(InputAction::TogglePause, now);
        assert!(session.is_paused());
        let out = session.handle_line("menu save", now);
        assert_eq!(
            out,
            vec![
                "menu: save slots".to_string(),
                "  [0] New save (save_1)".to_string(),
                "  [1] Quicksave".to_string(),
            ]
        );
        let out = session.handle_line("select 0", now);
        assert_eq!(out, vec![SAVE_SUCCEEDED_TEXT.to_string()]);
        assert_eq!(session.menu.screen(), MenuScreen::Paused);

        clock.advance(chrono::Duration::minutes(5));
        session.handle_line("quest 7 0 3", now);
        session.handle_line("menu load", now);
        assert_eq!(session.menu.entries().len(), 1);
        let out = session.handle_line("select 0", now);
        assert_eq!(out, vec!["loaded save_1".to_string()]);
        assert!(!session.is_paused());

        let quest = session
            .world()
            .quest_log()
            .and_then(|log| log.quest(7))
            .expect("quest");
        assert_eq!(quest.objectives[0].current_amount, 0);
    }

    #[test]
    fn background_autosave_lands_before_load() {
        let temp = TempDir::new().expect("temp");
        let (mut session, _clock) = session_in(&temp, true);
        let now = Instant::now();

        session.handle_line("build 3 0 3", now);
        assert!(session.autosave(now).is_empty());
        session.handle_line("give stone 5", now);
        let out = session.handle_line("load autosave", now);

        assert_eq!(out[0], "loaded autosave");
        assert_eq!(session.world().buildings().len(), 2);
        assert_eq!(session.world().resources().expect("economy").stone, 20);
        assert!(session.tick(now).is_empty());
    }

    #[test]
    fn autosave_does_not_replace_quicksave() {
        let temp = TempDir::new().expect("temp");
        let (mut session, _clock) = session_in(&temp, false);
        let now = Instant::now();

        session.handle_action(InputAction::QuickSave, now);
        session.handle_line("give wood 500", now);
        session.autosave(now);
        assert!(session.saves.autosave_metadata().is_some());

        session.handle_action(InputAction::QuickLoad, now);
        assert_eq!(session.world().resources().expect("economy").wood, 50);
        assert!(session.saves.list_slots().expect("list").is_empty());

        let out = session.handle_line("saves", now);
        assert!(out.iter().any(|line| line.starts_with("quicksave - ")));
        assert!(out.iter().any(|line| line.starts_with("autosave - ")));
    }

    #[test]
    fn autosave_is_skipped_while_paused() {
        let temp = TempDir::new().expect("temp");
        let (mut session, _clock) = session_in(&temp, false);
        let now = Instant::now();
        session.handle_line("pause", now);
        session.autosave(now);
        assert!(session.saves.autosave_metadata().is_none());

        session.handle_line("pause", now);
        session.autosave(now);
        assert!(session.saves.autosave_metadata().is_some());
    }
}
