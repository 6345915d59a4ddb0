use std::collections::HashMap;

use outpost_engine::Vec3;
use tracing::warn;

use super::input::InputAction;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MenuKind {
    Save,
    Load,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ConsoleCommand {
    Help,
    Status,
    QuickSave,
    QuickLoad,
    Save { slot: String },
    Load { slot: String },
    ListSaves,
    Press { action: InputAction },
    Pause,
    Menu { kind: MenuKind },
    Select { index: usize },
    Back,
    Give { resource: String, amount: i64 },
    Build { position: Vec3 },
    Hurt { amount: f32 },
    Kill { name: String },
    Quest { id: i32, objective: usize, amount: u32 },
    Quit,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CommandParseError {
    reason: String,
    usage: String,
}

impl CommandParseError {
    fn new(reason: impl Into<String>, usage: &str) -> Self {
        Self {
            reason: reason.into(),
            usage: usage.to_string(),
        }
    }
}

type ParseFn = dyn Fn(&[String]) -> Result<ConsoleCommand, CommandParseError> + Send + Sync;
type BuiltinParse = fn(&[String]) -> Result<ConsoleCommand, CommandParseError>;

struct CommandSpec {
    name: String,
    help: String,
    arg_schema: String,
    parse: Box<ParseFn>,
}

const BUILTIN_COMMANDS: &[(&str, &str, &str, BuiltinParse)] = &[
    ("help", "List commands", "", parse_help),
    ("status", "Show player, resources, quests and menu", "", parse_status),
    ("quicksave", "Save into the quicksave slot (F5)", "", parse_quicksave),
    ("quickload", "Load the quicksave slot (F9)", "", parse_quickload),
    ("save", "Save into a named slot", "<slot:string>", parse_save),
    ("load", "Load a named slot, quicksave or autosave", "<slot:string>", parse_load),
    ("saves", "List manual save slots, newest first", "", parse_saves),
    ("press", "Simulate a key press", "<key:f5|f9|escape>", parse_press),
    ("pause", "Toggle the pause menu (Escape)", "", parse_pause),
    ("menu", "Open the save or load slot list", "<kind:save|load>", parse_menu),
    ("select", "Pick an entry of the open slot list", "<index:usize>", parse_select),
    ("back", "Leave the current menu screen", "", parse_back),
    (
        "give",
        "Add resources (negative amounts remove)",
        "<resource:wood|stone|gold> <amount:i64>",
        parse_give,
    ),
    ("build", "Place a base-tier building", "<x:f32> <y:f32> <z:f32>", parse_build),
    ("hurt", "Damage the player", "<amount:f32>", parse_hurt),
    ("kill", "Kill an enemy by name", "<name:string>", parse_kill),
    (
        "quest",
        "Add progress to a quest objective",
        "<id:i32> <objective:usize> <amount:u32>",
        parse_quest,
    ),
    ("quit", "Quit", "", parse_quit),
];

pub(crate) struct ConsoleCommandRegistry {
    specs: Vec<CommandSpec>,
    lookup_by_lower_name: HashMap<String, usize>,
}

impl ConsoleCommandRegistry {
    pub(crate) fn new() -> Self {
        Self {
            specs: Vec::new(),
            lookup_by_lower_name: HashMap::new(),
        }
    }

    pub(crate) fn with_builtins() -> Self {
        let mut registry = Self::new();
        for (name, help, arg_schema, parse) in BUILTIN_COMMANDS {
            if let Err(reason) = registry.register(*name, *help, *arg_schema, *parse) {
                warn!(command = *name, reason = %reason, "console_builtin_rejected");
            }
        }
        registry
    }

    pub(crate) fn register<F>(
        &mut self,
        name: impl Into<String>,
        help: impl Into<String>,
        arg_schema: impl Into<String>,
        parse: F,
    ) -> Result<(), String>
    where
        F: Fn(&[String]) -> Result<ConsoleCommand, CommandParseError> + Send + Sync + 'static,
    {
        let name = name.into();
        if name.trim().is_empty() {
            return Err("command name cannot be empty".to_string());
        }
        let lower = name.to_ascii_lowercase();
        if self.lookup_by_lower_name.contains_key(&lower) {
            return Err(format!("duplicate command registration: {name}"));
        }

        self.specs.push(CommandSpec {
            name,
            help: help.into(),
            arg_schema: arg_schema.into(),
            parse: Box::new(parse),
        });
        self.lookup_by_lower_name
            .insert(lower, self.specs.len() - 1);
        Ok(())
    }

    fn lookup(&self, input_name: &str) -> Option<&CommandSpec> {
        let lower = input_name.to_ascii_lowercase();
        let index = self.lookup_by_lower_name.get(&lower)?;
        self.specs.get(*index)
    }

    /// Registration order.
    pub(crate) fn help_lines(&self) -> Vec<String> {
        self.specs
            .iter()
            .map(|spec| {
                if spec.arg_schema.is_empty() {
                    format!("{} - {}", spec.name, spec.help)
                } else {
                    format!("{} {} - {}", spec.name, spec.arg_schema, spec.help)
                }
            })
            .collect()
    }

    /// `Ok(None)` for blank lines. Errors are ready to print.
    pub(crate) fn parse_line(&self, raw_line: &str) -> Result<Option<ConsoleCommand>, String> {
        let trimmed = raw_line.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }

        let tokens =
            tokenize_line(trimmed).map_err(|reason| format!("error: {reason}. usage: help"))?;
        let Some((command_name, args)) = tokens.split_first() else {
            return Ok(None);
        };
        let Some(spec) = self.lookup(command_name) else {
            return Err(format!(
                "error: unknown command '{command_name}'. try: help"
            ));
        };

        (spec.parse)(args)
            .map(Some)
            .map_err(|error| format!("error: {}. usage: {}", error.reason, error.usage))
    }
}

fn tokenize_line(line: &str) -> Result<Vec<String>, String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut seen_token_content = false;

    for ch in line.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                seen_token_content = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if seen_token_content {
                    tokens.push(std::mem::take(&mut current));
                    seen_token_content = false;
                }
            }
            _ => {
                current.push(ch);
                seen_token_content = true;
            }
        }
    }

    if in_quotes {
        return Err("unterminated quoted string".to_string());
    }
    if seen_token_content {
        tokens.push(current);
    }
    Ok(tokens)
}

fn require_no_args(args: &[String], usage: &str) -> Result<(), CommandParseError> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(CommandParseError::new("unexpected extra arguments", usage))
    }
}

fn require_args<'a>(
    args: &'a [String],
    count: usize,
    usage: &str,
) -> Result<&'a [String], CommandParseError> {
    if args.len() == count {
        Ok(args)
    } else {
        Err(CommandParseError::new(
            format!("expected {count} argument(s), got {}", args.len()),
            usage,
        ))
    }
}

fn parse_arg<T: std::str::FromStr>(
    raw: &str,
    what: &str,
    expected: &str,
    usage: &str,
) -> Result<T, CommandParseError> {
    raw.parse::<T>().map_err(|_| {
        CommandParseError::new(format!("invalid {what} '{raw}' (expected {expected})"), usage)
    })
}

fn parse_help(args: &[String]) -> Result<ConsoleCommand, CommandParseError> {
    require_no_args(args, "help")?;
    Ok(ConsoleCommand::Help)
}

fn parse_status(args: &[String]) -> Result<ConsoleCommand, CommandParseError> {
    require_no_args(args, "status")?;
    Ok(ConsoleCommand::Status)
}

fn parse_quicksave(args: &[String]) -> Result<ConsoleCommand, CommandParseError> {
    require_no_args(args, "quicksave")?;
    Ok(ConsoleCommand::QuickSave)
}

fn parse_quickload(args: &[String]) -> Result<ConsoleCommand, CommandParseError> {
    require_no_args(args, "quickload")?;
    Ok(ConsoleCommand::QuickLoad)
}

fn parse_save(args: &[String]) -> Result<ConsoleCommand, CommandParseError> {
    let args = require_args(args, 1, "save <slot>")?;
    Ok(ConsoleCommand::Save {
        slot: args[0].clone(),
    })
}

fn parse_load(args: &[String]) -> Result<ConsoleCommand, CommandParseError> {
    let args = require_args(args, 1, "load <slot>")?;
    Ok(ConsoleCommand::Load {
        slot: args[0].clone(),
    })
}

fn parse_saves(args: &[String]) -> Result<ConsoleCommand, CommandParseError> {
    require_no_args(args, "saves")?;
    Ok(ConsoleCommand::ListSaves)
}

fn parse_press(args: &[String]) -> Result<ConsoleCommand, CommandParseError> {
    const USAGE: &str = "press <f5|f9|escape>";
    let args = require_args(args, 1, USAGE)?;
    let action = InputAction::from_key(&args[0]).ok_or_else(|| {
        CommandParseError::new(format!("unbound key '{}' (expected f5|f9|escape)", args[0]), USAGE)
    })?;
    Ok(ConsoleCommand::Press { action })
}

fn parse_pause(args: &[String]) -> Result<ConsoleCommand, CommandParseError> {
    require_no_args(args, "pause")?;
    Ok(ConsoleCommand::Pause)
}

fn parse_menu(args: &[String]) -> Result<ConsoleCommand, CommandParseError> {
    const USAGE: &str = "menu <save|load>";
    let args = require_args(args, 1, USAGE)?;
    let kind = match args[0].to_ascii_lowercase().as_str() {
        "save" => MenuKind::Save,
        "load" => MenuKind::Load,
        _ => {
            return Err(CommandParseError::new(
                format!("unknown menu '{}' (expected save|load)", args[0]),
                USAGE,
            ))
        }
    };
    Ok(ConsoleCommand::Menu { kind })
}

fn parse_select(args: &[String]) -> Result<ConsoleCommand, CommandParseError> {
    const USAGE: &str = "select <index>";
    let args = require_args(args, 1, USAGE)?;
    let index = parse_arg::<usize>(&args[0], "index", "usize", USAGE)?;
    Ok(ConsoleCommand::Select { index })
}

fn parse_back(args: &[String]) -> Result<ConsoleCommand, CommandParseError> {
    require_no_args(args, "back")?;
    Ok(ConsoleCommand::Back)
}

fn parse_give(args: &[String]) -> Result<ConsoleCommand, CommandParseError> {
    const USAGE: &str = "give <wood|stone|gold> <amount>";
    let args = require_args(args, 2, USAGE)?;
    let resource = args[0].to_ascii_lowercase();
    if !matches!(resource.as_str(), "wood" | "stone" | "gold") {
        return Err(CommandParseError::new(
            format!("unknown resource '{}' (expected wood|stone|gold)", args[0]),
            USAGE,
        ));
    }
    let amount = parse_arg::<i64>(&args[1], "amount", "i64", USAGE)?;
    Ok(ConsoleCommand::Give { resource, amount })
}

fn parse_build(args: &[String]) -> Result<ConsoleCommand, CommandParseError> {
    const USAGE: &str = "build <x> <y> <z>";
    let args = require_args(args, 3, USAGE)?;
    let x = parse_arg::<f32>(&args[0], "x coordinate", "f32", USAGE)?;
    let y = parse_arg::<f32>(&args[1], "y coordinate", "f32", USAGE)?;
    let z = parse_arg::<f32>(&args[2], "z coordinate", "f32", USAGE)?;
    let position = Vec3::new(x, y, z);
    if !position.is_finite() {
        return Err(CommandParseError::new("coordinates must be finite", USAGE));
    }
    Ok(ConsoleCommand::Build { position })
}

fn parse_hurt(args: &[String]) -> Result<ConsoleCommand, CommandParseError> {
    const USAGE: &str = "hurt <amount>";
    let args = require_args(args, 1, USAGE)?;
    let amount = parse_arg::<f32>(&args[0], "amount", "f32", USAGE)?;
    if !amount.is_finite() || amount < 0.0 {
        return Err(CommandParseError::new(
            format!("invalid amount '{}' (expected a finite value >= 0)", args[0]),
            USAGE,
        ));
    }
    Ok(ConsoleCommand::Hurt { amount })
}

fn parse_kill(args: &[String]) -> Result<ConsoleCommand, CommandParseError> {
    let args = require_args(args, 1, "kill <enemy-name>")?;
    Ok(ConsoleCommand::Kill {
        name: args[0].clone(),
    })
}

fn parse_quest(args: &[String]) -> Result<ConsoleCommand, CommandParseError> {
    const USAGE: &str = "quest <id> <objective> <amount>";
    let args = require_args(args, 3, USAGE)?;
    Ok(ConsoleCommand::Quest {
        id: parse_arg::<i32>(&args[0], "quest id", "i32", USAGE)?,
        objective: parse_arg::<usize>(&args[1], "objective index", "usize", USAGE)?,
        amount: parse_arg::<u32>(&args[2], "amount", "u32", USAGE)?,
    })
}

fn parse_quit(args: &[String]) -> Result<ConsoleCommand, CommandParseError> {
    require_no_args(args, "quit")?;
    Ok(ConsoleCommand::Quit)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Result<Option<ConsoleCommand>, String> {
        ConsoleCommandRegistry::with_builtins().parse_line(line)
    }

    #[test]
    fn every_builtin_is_registered_in_order() {
        let registry = ConsoleCommandRegistry::with_builtins();
        let lines = registry.help_lines();
        assert_eq!(lines.len(), BUILTIN_COMMANDS.len());
        assert_eq!(lines[0], "help - List commands");
        assert_eq!(lines[4], "save <slot:string> - Save into a named slot");
        assert_eq!(lines.last().map(String::as_str), Some("quit - Quit"));
    }

    #[test]
    fn duplicate_registration_is_rejected_case_insensitively() {
        let mut registry = ConsoleCommandRegistry::with_builtins();
        assert!(registry.register("SAVE", "again", "", parse_save).is_err());
        assert!(registry.register(" ", "blank", "", parse_save).is_err());
    }

    #[test]
    fn slot_commands_accept_quoted_names() {
        assert_eq!(
            parse("save \"Base Camp\""),
            Ok(Some(ConsoleCommand::Save {
                slot: "Base Camp".to_string()
            }))
        );
        assert_eq!(
            parse("LOAD camp"),
            Ok(Some(ConsoleCommand::Load {
                slot: "camp".to_string()
            }))
        );
        assert_eq!(parse("   "), Ok(None));
    }

    #[test]
    fn bad_arguments_report_usage() {
        assert_eq!(
            parse("select two"),
            Err("error: invalid index 'two' (expected usize). usage: select <index>".to_string())
        );
        assert_eq!(
            parse("quicksave now"),
            Err("error: unexpected extra arguments. usage: quicksave".to_string())
        );
        assert_eq!(
            parse("nope"),
            Err("error: unknown command 'nope'. try: help".to_string())
        );
        assert!(parse("give iron 5").is_err());
        assert!(parse("hurt -3").is_err());
        assert!(parse("build 1 NaN 2").is_err());
        assert!(parse("save \"open").is_err());
    }

    #[test]
    fn gameplay_commands_parse_typed_arguments() {
        assert_eq!(
            parse("give Wood -5"),
            Ok(Some(ConsoleCommand::Give {
                resource: "wood".to_string(),
                amount: -5
            }))
        );
        assert_eq!(
            parse("build 1 0 2.5"),
            Ok(Some(ConsoleCommand::Build {
                position: Vec3::new(1.0, 0.0, 2.5)
            }))
        );
        assert_eq!(
            parse("quest 7 1 3"),
            Ok(Some(ConsoleCommand::Quest {
                id: 7,
                objective: 1,
                amount: 3
            }))
        );
        assert_eq!(
            parse("press F9"),
            Ok(Some(ConsoleCommand::Press {
                action: InputAction::QuickLoad
            }))
        );
        assert_eq!(
            parse("menu load"),
            Ok(Some(ConsoleCommand::Menu {
                kind: MenuKind::Load
            }))
        );
    }

    #[test]
    fn tokenizer_keeps_empty_quoted_tokens() {
        assert_eq!(
            tokenize_line("kill \"\" x").expect("tokens"),
            vec!["kill", "", "x"]
        );
    }
}
