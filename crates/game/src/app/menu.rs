use outpost_engine::{SaveSlot, SlotMetadata};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MenuScreen {
    Closed,
    Paused,
    SaveMenu,
    LoadMenu,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MenuEntry {
    pub(crate) label: String,
    pub(crate) slot: SaveSlot,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum MenuSelection {
    Save(SaveSlot),
    Load(SaveSlot),
}

/// Pause menu and its save/load slot lists.
///
/// The world counts as paused whenever the menu is not `Closed`.
#[derive(Debug)]
pub(crate) struct PauseMenu {
    screen: MenuScreen,
    entries: Vec<MenuEntry>,
}

impl Default for PauseMenu {
    fn default() -> Self {
        Self {
            screen: MenuScreen::Closed,
            entries: Vec::new(),
        }
    }
}

impl PauseMenu {
    pub(crate) fn screen(&self) -> MenuScreen {
        self.screen
    }

    pub(crate) fn is_open(&self) -> bool {
        self.screen != MenuScreen::Closed
    }

    pub(crate) fn entries(&self) -> &[MenuEntry] {
        &self.entries
    }

    pub(crate) fn toggle(&mut self) -> MenuScreen {
        if self.is_open() {
            self.close();
        } else {
            self.screen = MenuScreen::Paused;
        }
        self.screen
    }

    pub(crate) fn close(&mut self) {
        self.screen = MenuScreen::Closed;
        self.entries.clear();
    }

    /// `slots` is expected newest first, as the gateway lists them.
    pub(crate) fn open_save_menu(&mut self, slots: &[SlotMetadata]) {
        let mut entries = slot_entries(slots);
        if let Some(slot) = next_new_slot(slots) {
            entries.push(MenuEntry {
                label: format!("New save ({slot})"),
                slot,
            });
        }
        entries.push(MenuEntry {
            label: "Quicksave".to_string(),
            slot: SaveSlot::Quick,
        });
        self.entries = entries;
        self.screen = MenuScreen::SaveMenu;
    }

    pub(crate) fn open_load_menu(&mut self, slots: &[SlotMetadata]) {
        self.entries = slot_entries(slots);
        self.screen = MenuScreen::LoadMenu;
    }

    pub(crate) fn back(&mut self) -> MenuScreen {
        match self.screen {
            MenuScreen::SaveMenu | MenuScreen::LoadMenu => {
                self.entries.clear();
                self.screen = MenuScreen::Paused;
            }
            MenuScreen::Paused => self.close(),
            MenuScreen::Closed => {}
        }
        self.screen
    }

    /// Index is zero-based into [`PauseMenu::entries`].
    pub(crate) fn select(&self, index: usize) -> Option<MenuSelection> {
        let entry = self.entries.get(index)?;
        match self.screen {
            MenuScreen::SaveMenu => Some(MenuSelection::Save(entry.slot.clone())),
            MenuScreen::LoadMenu => Some(MenuSelection::Load(entry.slot.clone())),
            MenuScreen::Closed | MenuScreen::Paused => None,
        }
    }
}

fn slot_entries(slots: &[SlotMetadata]) -> Vec<MenuEntry> {
    slots
        .iter()
        .map(|metadata| MenuEntry {
            label: format!("{} - {}", metadata.display_name, metadata.display_timestamp()),
            slot: metadata.slot.clone(),
        })
        .collect()
}

/// `save_{n+1}` for `n` existing slots, skipping numbers already taken.
fn next_new_slot(slots: &[SlotMetadata]) -> Option<SaveSlot> {
    (slots.len() + 1..)
        .take(slots.len() + 1)
        .map(|number| format!("save_{number}"))
        .find(|name| !slots.iter().any(|metadata| metadata.display_name == *name))
        .and_then(|name| SaveSlot::manual(&name).ok())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use chrono::{TimeZone, Utc};

    use super::*;

    fn metadata(name: &str) -> SlotMetadata {
        let at = Utc.with_ymd_and_hms(2026, 2, 3, 4, 5, 0).single().expect("time");
        SlotMetadata {
            slot: SaveSlot::manual(name).expect("slot"),
            display_name: name.to_string(),
            saved_at: at,
            modified_at: at,
            path: PathBuf::from(format!("{name}.json")),
        }
    }

    #[test]
    fn toggle_and_back_walk_the_screens() {
        let mut menu = PauseMenu::default();
        assert_eq!(menu.toggle(), MenuScreen::Paused);
        menu.open_load_menu(&[]);
        assert_eq!(menu.screen(), MenuScreen::LoadMenu);
        assert_eq!(menu.back(), MenuScreen::Paused);
        assert_eq!(menu.back(), MenuScreen::Closed);
        assert!(!menu.is_open());

        menu.open_save_menu(&[]);
        assert_eq!(menu.toggle(), MenuScreen::Closed);
        assert!(menu.entries().is_empty());
    }

    #[test]
    fn save_menu_lists_slots_then_new_then_quicksave() {
        let mut menu = PauseMenu::default();
        menu.open_save_menu(&[metadata("base"), metadata("save_1")]);

        let labels: Vec<&str> = menu.entries().iter().map(|e| e.label.as_str()).collect();
        assert_eq!(
            labels,
            vec![
                "base - 03.02.2026 04:05",
                "save_1 - 03.02.2026 04:05",
                "New save (save_3)",
                "Quicksave",
            ]
        );
        assert_eq!(
            menu.select(2),
            Some(MenuSelection::Save(SaveSlot::manual("save_3").expect("slot")))
        );
        assert_eq!(menu.select(3), Some(MenuSelection::Save(SaveSlot::Quick)));
        assert_eq!(menu.select(4), None);
    }

    #[test]
    fn new_save_skips_taken_names() {
        let slots = [metadata("save_2"), metadata("other")];
        assert_eq!(
            next_new_slot(&slots),
            Some(SaveSlot::manual("save_3").expect("slot"))
        );
    }

    #[test]
    fn load_menu_only_lists_existing_slots() {
        let mut menu = PauseMenu::default();
        menu.open_load_menu(&[metadata("camp")]);
        assert_eq!(menu.entries().len(), 1);
        assert_eq!(
            menu.select(0),
            Some(MenuSelection::Load(SaveSlot::manual("camp").expect("slot")))
        );

        menu.back();
        assert_eq!(menu.select(0), None);
    }
}
