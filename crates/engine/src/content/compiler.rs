use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use roxmltree::{Document, Node};
use tracing::debug;

use crate::AppPaths;

use super::database::{BuildingDef, BuildingTier, Catalog, QuestDef, QuestObjectiveDef};
use super::discovery::discover_mod_sources;
use super::types::{ContentDiscoveryError, ContentRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentErrorCode {
    Discovery,
    ReadFile,
    XmlMalformed,
    InvalidRoot,
    UnknownDefType,
    UnknownField,
    DuplicateField,
    MissingField,
    InvalidValue,
    DuplicateDefInMod,
    UnknownReference,
}

#[derive(Debug, Clone)]
pub struct ContentCompileError {
    pub code: ContentErrorCode,
    pub message: String,
    pub mod_id: String,
    pub file_path: PathBuf,
    pub location: Option<SourceLocation>,
}

impl fmt::Display for ContentCompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            Some(loc) => write!(
                f,
                "{:?}: {} (mod={}, file={}, line={}, column={})",
                self.code,
                self.message,
                self.mod_id,
                self.file_path.display(),
                loc.line,
                loc.column
            ),
            None => write!(
                f,
                "{:?}: {} (mod={}, file={})",
                self.code,
                self.message,
                self.mod_id,
                self.file_path.display()
            ),
        }
    }
}

impl std::error::Error for ContentCompileError {}

#[derive(Debug, Clone)]
struct Origin {
    mod_id: String,
    file_path: PathBuf,
    location: Option<SourceLocation>,
}

#[derive(Debug, Clone)]
enum ParsedDef {
    Building(BuildingDef, Origin),
    Quest(QuestDef),
}

/// Reads every `*.xml` under base content and each enabled mod, merging
/// definitions by key. A key may appear once per mod; across mods the last
/// mod wins.
pub fn compile_catalog(
    app_paths: &AppPaths,
    request: &ContentRequest,
) -> Result<Catalog, ContentCompileError> {
    let sources = discover_mod_sources(app_paths, request)
        .map_err(|error| map_discovery_error(error, &app_paths.root))?;

    let mut buildings = BTreeMap::<String, (BuildingDef, Origin)>::new();
    let mut quests = BTreeMap::<i32, QuestDef>::new();

    for source in sources {
        let xml_files = collect_xml_files_sorted(&source.source_dir)
            .map_err(|error| read_error(&source.mod_id, error.path, error.source))?;
        let mut buildings_in_mod = HashSet::<String>::new();
        let mut quests_in_mod = HashSet::<i32>::new();

        for xml_file in xml_files {
            let raw = fs::read_to_string(&xml_file)
                .map_err(|source_err| read_error(&source.mod_id, xml_file.clone(), source_err))?;
            for def in parse_defs_document(&source.mod_id, &xml_file, &raw)? {
                match def {
                    ParsedDef::Building(def, origin) => {
                        if !buildings_in_mod.insert(def.def_name.clone()) {
                            return Err(duplicate_in_mod(
                                format!("BuildingDef '{}'", def.def_name),
                                &source.mod_id,
                                &xml_file,
                            ));
                        }
                        buildings.insert(def.def_name.clone(), (def, origin));
                    }
                    ParsedDef::Quest(def) => {
                        if !quests_in_mod.insert(def.id) {
                            return Err(duplicate_in_mod(
                                format!("QuestDef id {}", def.id),
                                &source.mod_id,
                                &xml_file,
                            ));
                        }
                        quests.insert(def.id, def);
                    }
                }
            }
        }
        debug!(
            mod_id = %source.mod_id,
            mod_load_index = source.mod_load_index,
            "content_mod_compiled"
        );
    }

    for (def, origin) in buildings.values() {
        if let Some(target) = &def.upgrade_to {
            if !buildings.contains_key(target) {
                return Err(ContentCompileError {
                    code: ContentErrorCode::UnknownReference,
                    message: format!(
                        "BuildingDef '{}' upgrades to unknown BuildingDef '{}'",
                        def.def_name, target
                    ),
                    mod_id: origin.mod_id.clone(),
                    file_path: origin.file_path.clone(),
                    location: origin.location,
                });
            }
        }
    }

    Ok(Catalog::from_defs(
        buildings.into_values().map(|(def, _)| def).collect(),
        quests.into_values().collect(),
    ))
}

fn parse_defs_document(
    mod_id: &str,
    file_path: &Path,
    raw: &str,
) -> Result<Vec<ParsedDef>, ContentCompileError> {
    let doc = Document::parse(raw).map_err(|error| ContentCompileError {
        code: ContentErrorCode::XmlMalformed,
        message: format!("malformed XML: {error}"),
        mod_id: mod_id.to_string(),
        file_path: file_path.to_path_buf(),
        location: Some(SourceLocation {
            line: error.pos().row as usize,
            column: error.pos().col as usize,
        }),
    })?;

    let root = doc.root_element();
    if root.tag_name().name() != "Defs" {
        return Err(error_at_node(
            ContentErrorCode::InvalidRoot,
            "root element must be <Defs>".to_string(),
            mod_id,
            file_path,
            &doc,
            root,
        ));
    }

    let ctx = ParseContext {
        mod_id,
        file_path,
        doc: &doc,
    };
    let mut defs = Vec::<ParsedDef>::new();
    for child in root.children().filter(|node| node.is_element()) {
        match child.tag_name().name() {
            "BuildingDef" => {
                let def = parse_building_def(&ctx, child)?;
                defs.push(ParsedDef::Building(def, ctx.origin(child)));
            }
            "QuestDef" => defs.push(ParsedDef::Quest(parse_quest_def(&ctx, child)?)),
            other => {
                return Err(ctx.error(
                    ContentErrorCode::UnknownDefType,
                    format!(
                        "unsupported def type <{other}>; expected <BuildingDef> or <QuestDef>"
                    ),
                    child,
                ))
            }
        }
    }

    Ok(defs)
}

struct ParseContext<'a, 'input> {
    mod_id: &'a str,
    file_path: &'a Path,
    doc: &'a Document<'input>,
}

impl ParseContext<'_, '_> {
    fn error(
        &self,
        code: ContentErrorCode,
        message: String,
        node: Node<'_, '_>,
    ) -> ContentCompileError {
        error_at_node(code, message, self.mod_id, self.file_path, self.doc, node)
    }

    fn origin(&self, node: Node<'_, '_>) -> Origin {
        let pos = self.doc.text_pos_at(node.range().start);
        Origin {
            mod_id: self.mod_id.to_string(),
            file_path: self.file_path.to_path_buf(),
            location: Some(SourceLocation {
                line: pos.row as usize,
                column: pos.col as usize,
            }),
        }
    }

    fn text(&self, node: Node<'_, '_>, field_name: &str) -> Result<String, ContentCompileError> {
        required_text(self.mod_id, self.file_path, self.doc, node, field_name)
    }

    fn number<T: FromStr>(
        &self,
        node: Node<'_, '_>,
        field_name: &str,
    ) -> Result<T, ContentCompileError> {
        let value = self.text(node, field_name)?;
        value.parse::<T>().map_err(|_| {
            self.error(
                ContentErrorCode::InvalidValue,
                format!("{field_name} '{value}' is not a valid number"),
                node,
            )
        })
    }

    /// Iterates element children, rejecting repeated field names.
    fn fields<'n, 'i>(
        &self,
        node: Node<'n, 'i>,
        def_type: &str,
    ) -> Result<Vec<Node<'n, 'i>>, ContentCompileError> {
        let mut seen = HashSet::<String>::new();
        let mut fields = Vec::new();
        for field in node.children().filter(|child| child.is_element()) {
            if !seen.insert(field.tag_name().name().to_string()) {
                return Err(self.error(
                    ContentErrorCode::DuplicateField,
                    format!(
                        "duplicate field <{}> in <{def_type}>",
                        field.tag_name().name()
                    ),
                    field,
                ));
            }
            fields.push(field);
        }
        Ok(fields)
    }

    fn require<T>(
        &self,
        value: Option<T>,
        field_name: &str,
        def_type: &str,
        node: Node<'_, '_>,
    ) -> Result<T, ContentCompileError> {
        value.ok_or_else(|| {
            self.error(
                ContentErrorCode::MissingField,
                format!("missing required field <{field_name}> in <{def_type}>"),
                node,
            )
        })
    }

    fn unknown_field(&self, field: Node<'_, '_>, def_type: &str) -> ContentCompileError {
        self.error(
            ContentErrorCode::UnknownField,
            format!(
                "unknown field <{}> in <{def_type}>",
                field.tag_name().name()
            ),
            field,
        )
    }
}

fn parse_building_def(
    ctx: &ParseContext<'_, '_>,
    node: Node<'_, '_>,
) -> Result<BuildingDef, ContentCompileError> {
    const DEF_TYPE: &str = "BuildingDef";
    let mut def_name: Option<String> = None;
    let mut label: Option<String> = None;
    let mut prefab: Option<String> = None;
    let mut tier: Option<BuildingTier> = None;
    let mut wood_cost = 0;
    let mut stone_cost = 0;
    let mut gold_cost = 0;
    let mut upgrade_to: Option<String> = None;

    for field in ctx.fields(node, DEF_TYPE)? {
        match field.tag_name().name() {
            "defName" => def_name = Some(ctx.text(field, "defName")?),
            "label" => label = Some(ctx.text(field, "label")?),
            "prefab" => prefab = Some(ctx.text(field, "prefab")?),
            "tier" => {
                let parsed = match ctx.number::<u32>(field, "tier")? {
                    1 => BuildingTier::Base,
                    2 => BuildingTier::Upgraded,
                    other => {
                        return Err(ctx.error(
                            ContentErrorCode::InvalidValue,
                            format!("invalid tier '{other}'; allowed values: 1, 2"),
                            field,
                        ))
                    }
                };
                tier = Some(parsed);
            }
            "woodCost" => wood_cost = ctx.number(field, "woodCost")?,
            "stoneCost" => stone_cost = ctx.number(field, "stoneCost")?,
            "goldCost" => gold_cost = ctx.number(field, "goldCost")?,
            "upgradeTo" => upgrade_to = Some(ctx.text(field, "upgradeTo")?),
            _ => return Err(ctx.unknown_field(field, DEF_TYPE)),
        }
    }

    let def_name = ctx.require(def_name, "defName", DEF_TYPE, node)?;
    let label = ctx.require(label, "label", DEF_TYPE, node)?;
    let prefab = ctx.require(prefab, "prefab", DEF_TYPE, node)?;
    let tier = ctx.require(tier, "tier", DEF_TYPE, node)?;

    Ok(BuildingDef {
        def_name,
        label,
        prefab,
        tier,
        wood_cost,
        stone_cost,
        gold_cost,
        upgrade_to,
    })
}

fn parse_quest_def(
    ctx: &ParseContext<'_, '_>,
    node: Node<'_, '_>,
) -> Result<QuestDef, ContentCompileError> {
    const DEF_TYPE: &str = "QuestDef";
    let mut id: Option<i32> = None;
    let mut title: Option<String> = None;
    let mut description = String::new();
    let mut experience_reward = 0;
    let mut gold_reward = 0;
    let mut objectives: Option<Vec<QuestObjectiveDef>> = None;

    for field in ctx.fields(node, DEF_TYPE)? {
        match field.tag_name().name() {
            "id" => id = Some(ctx.number(field, "id")?),
            "title" => title = Some(ctx.text(field, "title")?),
            "description" => {
                description = field.text().map(str::trim).unwrap_or_default().to_string();
            }
            "experienceReward" => experience_reward = ctx.number(field, "experienceReward")?,
            "goldReward" => gold_reward = ctx.number(field, "goldReward")?,
            "objectives" => objectives = Some(parse_objectives(ctx, field)?),
            _ => return Err(ctx.unknown_field(field, DEF_TYPE)),
        }
    }

    let id = ctx.require(id, "id", DEF_TYPE, node)?;
    let title = ctx.require(title, "title", DEF_TYPE, node)?;
    let objectives = ctx.require(objectives, "objectives", DEF_TYPE, node)?;
    if objectives.is_empty() {
        return Err(ctx.error(
            ContentErrorCode::MissingField,
            format!("QuestDef {id} must declare at least one <objective>"),
            node,
        ));
    }

    Ok(QuestDef {
        id,
        title,
        description,
        objectives,
        experience_reward,
        gold_reward,
    })
}

fn parse_objectives(
    ctx: &ParseContext<'_, '_>,
    node: Node<'_, '_>,
) -> Result<Vec<QuestObjectiveDef>, ContentCompileError> {
    const DEF_TYPE: &str = "objective";
    let mut objectives = Vec::new();
    for child in node.children().filter(|child| child.is_element()) {
        if child.tag_name().name() != "objective" {
            return Err(ctx.unknown_field(child, "objectives"));
        }
        let mut description: Option<String> = None;
        let mut target_amount: Option<u32> = None;
        for field in ctx.fields(child, DEF_TYPE)? {
            match field.tag_name().name() {
                "description" => description = Some(ctx.text(field, "description")?),
                "targetAmount" => {
                    let parsed = ctx.number::<u32>(field, "targetAmount")?;
                    if parsed == 0 {
                        return Err(ctx.error(
                            ContentErrorCode::InvalidValue,
                            "targetAmount must be >= 1".to_string(),
                            field,
                        ));
                    }
                    target_amount = Some(parsed);
                }
                _ => return Err(ctx.unknown_field(field, DEF_TYPE)),
            }
        }
        objectives.push(QuestObjectiveDef {
            description: ctx.require(description, "description", DEF_TYPE, child)?,
            target_amount: ctx.require(target_amount, "targetAmount", DEF_TYPE, child)?,
        });
    }
    Ok(objectives)
}

fn required_text(
    mod_id: &str,
    file_path: &Path,
    doc: &Document<'_>,
    node: Node<'_, '_>,
    field_name: &str,
) -> Result<String, ContentCompileError> {
    let value = node.text().map(str::trim).unwrap_or_default().to_string();
    if value.is_empty() {
        return Err(error_at_node(
            ContentErrorCode::MissingField,
            format!("field <{}> must not be empty", field_name),
            mod_id,
            file_path,
            doc,
            node,
        ));
    }
    Ok(value)
}

fn error_at_node(
    code: ContentErrorCode,
    message: String,
    mod_id: &str,
    file_path: &Path,
    doc: &Document<'_>,
    node: Node<'_, '_>,
) -> ContentCompileError {
    let pos = doc.text_pos_at(node.range().start);
    ContentCompileError {
        code,
        message,
        mod_id: mod_id.to_string(),
        file_path: file_path.to_path_buf(),
        location: Some(SourceLocation {
            line: pos.row as usize,
            column: pos.col as usize,
        }),
    }
}

fn duplicate_in_mod(what: String, mod_id: &str, file_path: &Path) -> ContentCompileError {
    ContentCompileError {
        code: ContentErrorCode::DuplicateDefInMod,
        message: format!("duplicate {what} in mod '{mod_id}'; each mod may define it only once"),
        mod_id: mod_id.to_string(),
        file_path: file_path.to_path_buf(),
        location: None,
    }
}

struct ReadError {
    path: PathBuf,
    source: std::io::Error,
}

fn collect_xml_files_sorted(root: &Path) -> Result<Vec<PathBuf>, ReadError> {
    let mut files = Vec::<PathBuf>::new();
    collect_recursive(root, &mut files)?;
    files.sort_by_key(|path| normalize_rel_path(path.strip_prefix(root).unwrap_or(path)));
    Ok(files)
}

fn collect_recursive(current: &Path, files: &mut Vec<PathBuf>) -> Result<(), ReadError> {
    let entries = fs::read_dir(current).map_err(|source| ReadError {
        path: current.to_path_buf(),
        source,
    })?;
    for entry in entries {
        let entry = entry.map_err(|source| ReadError {
            path: current.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_dir() {
            collect_recursive(&path, files)?;
        } else if path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"))
        {
            files.push(path);
        }
    }
    Ok(())
}

fn normalize_rel_path(path: &Path) -> String {
    path.components()
        .map(|component| component.as_os_str().to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join("/")
}

fn read_error(mod_id: &str, path: PathBuf, source: std::io::Error) -> ContentCompileError {
    ContentCompileError {
        code: ContentErrorCode::ReadFile,
        message: format!("failed to read XML file: {source}"),
        mod_id: mod_id.to_string(),
        file_path: path,
        location: None,
    }
}

fn map_discovery_error(error: ContentDiscoveryError, root: &Path) -> ContentCompileError {
    match error {
        ContentDiscoveryError::EnabledModMissing {
            mod_id,
            expected_dir,
        } => ContentCompileError {
            code: ContentErrorCode::Discovery,
            message: format!(
                "enabled mod '{}' not found at {}; check enabled mod list",
                mod_id,
                expected_dir.display()
            ),
            mod_id,
            file_path: expected_dir,
            location: None,
        },
        other => ContentCompileError {
            code: ContentErrorCode::Discovery,
            message: other.to_string(),
            mod_id: "<discovery>".to_string(),
            file_path: root.to_path_buf(),
            location: None,
        },
    }
}
