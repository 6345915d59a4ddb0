#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum InputAction {
    QuickSave,
    QuickLoad,
    TogglePause,
}

impl InputAction {
    pub(crate) fn from_key(key: &str) -> Option<Self> {
        match key.to_ascii_lowercase().as_str() {
            "f5" => Some(InputAction::QuickSave),
            "f9" => Some(InputAction::QuickLoad),
            "escape" | "esc" => Some(InputAction::TogglePause),
            _ => None,
        }
    }

    pub(crate) const fn key_name(self) -> &'static str {
        match self {
            InputAction::QuickSave => "F5",
            InputAction::QuickLoad => "F9",
            InputAction::TogglePause => "Escape",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_map_to_actions_case_insensitively() {
        assert_eq!(InputAction::from_key("F5"), Some(InputAction::QuickSave));
        assert_eq!(InputAction::from_key("f9"), Some(InputAction::QuickLoad));
        assert_eq!(InputAction::from_key("Esc"), Some(InputAction::TogglePause));
        assert_eq!(InputAction::from_key("f6"), None);
    }

    #[test]
    fn key_names_round_trip() {
        for action in [
            InputAction::QuickSave,
            InputAction::QuickLoad,
            InputAction::TogglePause,
        ] {
            assert_eq!(InputAction::from_key(action.key_name()), Some(action));
        }
    }
}
