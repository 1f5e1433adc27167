//! Block type catalog.
//!
//! A [`BlockRegistry`] is assembled once through [`RegistryBuilder`] and then
//! shared read-only (behind an `Arc`) by the editor, the field renderer and the
//! page services. There is no way to register a type after `build`.

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use super::fields::serialize_edit;

const BUILTIN_CATALOG: &str = include_str!("catalog.toml");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Textarea,
    Richtext,
    Number,
    Select,
    Checkbox,
    Range,
}

impl FieldKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Textarea => "textarea",
            FieldKind::Richtext => "richtext",
            FieldKind::Number => "number",
            FieldKind::Select => "select",
            FieldKind::Checkbox => "checkbox",
            FieldKind::Range => "range",
        }
    }

    pub fn is_textual(self) -> bool {
        matches!(
            self,
            FieldKind::Text | FieldKind::Textarea | FieldKind::Richtext
        )
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, FieldKind::Number | FieldKind::Range)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldConstraints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<u32>,
    /// Select options, value → label, in display order.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub options: IndexMap<String, String>,
}

impl FieldConstraints {
    pub fn clamp(&self, value: f64) -> f64 {
        let lower = self.min.map_or(value, |min| value.max(min));
        self.max.map_or(lower, |max| lower.min(max))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub kind: FieldKind,
    pub label: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub constraints: FieldConstraints,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockTypeDefinition {
    pub type_id: String,
    pub label: String,
    pub icon: String,
    pub category: String,
    pub description: String,
    pub fields: IndexMap<String, FieldSchema>,
    pub defaults: Map<String, Value>,
}

impl BlockTypeDefinition {
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.get(name)
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RegistryError {
    #[error("block type `{type_id}` is not registered")]
    NotFound { type_id: String },
    #[error("block type `{type_id}` is registered twice")]
    Duplicate { type_id: String },
    #[error("block type `{type_id}` is invalid: {reason}")]
    InvalidDefinition { type_id: String, reason: String },
    #[error("failed to read block catalog: {0}")]
    Catalog(String),
}

impl RegistryError {
    fn invalid(type_id: &str, reason: impl Into<String>) -> Self {
        Self::InvalidDefinition {
            type_id: type_id.to_string(),
            reason: reason.into(),
        }
    }
}

/// Definitions sharing a category, in registration order.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryGroup<'a> {
    pub category: &'a str,
    pub blocks: Vec<&'a BlockTypeDefinition>,
}

#[derive(Debug, Default)]
pub struct RegistryBuilder {
    definitions: IndexMap<String, BlockTypeDefinition>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and add a definition. Defaults are normalised through the field
    /// rules so stored data starts out canonical.
    pub fn register(
        &mut self,
        mut definition: BlockTypeDefinition,
    ) -> Result<&mut Self, RegistryError> {
        let type_id = definition.type_id.clone();
        if type_id.trim().is_empty() {
            return Err(RegistryError::invalid(&type_id, "type_id must not be empty"));
        }
        if self.definitions.contains_key(&type_id) {
            return Err(RegistryError::Duplicate { type_id });
        }

        for (name, schema) in &definition.fields {
            validate_schema(&type_id, name, schema)?;
        }

        let mut defaults = Map::new();
        for (name, value) in &definition.defaults {
            let schema = definition.fields.get(name).ok_or_else(|| {
                RegistryError::invalid(&type_id, format!("default for unknown field `{name}`"))
            })?;
            let normalised = serialize_edit(schema, value).map_err(|err| {
                RegistryError::invalid(&type_id, format!("default for `{name}`: {err}"))
            })?;
            defaults.insert(name.clone(), normalised);
        }
        definition.defaults = defaults;

        self.definitions.insert(type_id, definition);
        Ok(self)
    }

    /// Register every block declared in a TOML catalog document.
    pub fn load_catalog_str(&mut self, source: &str) -> Result<&mut Self, RegistryError> {
        let catalog: CatalogFile =
            toml::from_str(source).map_err(|err| RegistryError::Catalog(err.to_string()))?;
        for block in catalog.block {
            self.register(block.into_definition())?;
        }
        Ok(self)
    }

    pub fn load_catalog_file(&mut self, path: &Path) -> Result<&mut Self, RegistryError> {
        let source = std::fs::read_to_string(path)
            .map_err(|err| RegistryError::Catalog(format!("{}: {err}", path.display())))?;
        self.load_catalog_str(&source)
    }

    pub fn with_builtin(&mut self) -> Result<&mut Self, RegistryError> {
        self.load_catalog_str(BUILTIN_CATALOG)
    }

    pub fn build(self) -> BlockRegistry {
        BlockRegistry {
            definitions: self.definitions,
        }
    }
}

fn validate_schema(type_id: &str, name: &str, schema: &FieldSchema) -> Result<(), RegistryError> {
    let constraints = &schema.constraints;
    match schema.kind {
        FieldKind::Select if constraints.options.is_empty() => Err(RegistryError::invalid(
            type_id,
            format!("select field `{name}` has no options"),
        )),
        FieldKind::Range if constraints.min.is_none() || constraints.max.is_none() => {
            Err(RegistryError::invalid(
                type_id,
                format!("range field `{name}` needs both min and max"),
            ))
        }
        _ => match (constraints.min, constraints.max) {
            (Some(min), Some(max)) if min > max => Err(RegistryError::invalid(
                type_id,
                format!("field `{name}` has min greater than max"),
            )),
            _ => Ok(()),
        },
    }
}

/// Immutable catalog of block types.
#[derive(Debug, Default)]
pub struct BlockRegistry {
    definitions: IndexMap<String, BlockTypeDefinition>,
}

impl BlockRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Registry holding only the built-in catalog.
    pub fn builtin() -> Result<Self, RegistryError> {
        let mut builder = RegistryBuilder::new();
        builder.with_builtin()?;
        Ok(builder.build())
    }

    pub fn get(&self, type_id: &str) -> Result<&BlockTypeDefinition, RegistryError> {
        self.definitions
            .get(type_id)
            .ok_or_else(|| RegistryError::NotFound {
                type_id: type_id.to_string(),
            })
    }

    pub fn contains(&self, type_id: &str) -> bool {
        self.definitions.contains_key(type_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &BlockTypeDefinition> {
        self.definitions.values()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Group definitions by category. Categories appear in first-seen order and
    /// definitions keep registration order within their category.
    pub fn list_by_category(&self) -> Vec<CategoryGroup<'_>> {
        let mut groups: IndexMap<&str, Vec<&BlockTypeDefinition>> = IndexMap::new();
        for definition in self.definitions.values() {
            groups
                .entry(definition.category.as_str())
                .or_default()
                .push(definition);
        }
        groups
            .into_iter()
            .map(|(category, blocks)| CategoryGroup { category, blocks })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    block: Vec<CatalogBlock>,
}

#[derive(Debug, Deserialize)]
struct CatalogBlock {
    type_id: String,
    label: String,
    #[serde(default)]
    icon: String,
    category: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    fields: Vec<CatalogField>,
}

#[derive(Debug, Deserialize)]
struct CatalogField {
    name: String,
    kind: FieldKind,
    label: String,
    #[serde(default)]
    required: bool,
    #[serde(default)]
    default: Option<Value>,
    #[serde(default)]
    min: Option<f64>,
    #[serde(default)]
    max: Option<f64>,
    #[serde(default)]
    step: Option<f64>,
    #[serde(default)]
    rows: Option<u32>,
    #[serde(default)]
    options: Vec<CatalogOption>,
}

#[derive(Debug, Deserialize)]
struct CatalogOption {
    value: String,
    label: String,
}

impl CatalogBlock {
    fn into_definition(self) -> BlockTypeDefinition {
        let mut fields = IndexMap::with_capacity(self.fields.len());
        let mut defaults = Map::new();

        for field in self.fields {
            if let Some(default) = field.default {
                defaults.insert(field.name.clone(), default);
            }
            let options = field
                .options
                .into_iter()
                .map(|option| (option.value, option.label))
                .collect();
            fields.insert(
                field.name,
                FieldSchema {
                    kind: field.kind,
                    label: field.label,
                    required: field.required,
                    constraints: FieldConstraints {
                        min: field.min,
                        max: field.max,
                        step: field.step,
                        rows: field.rows,
                        options,
                    },
                },
            );
        }

        BlockTypeDefinition {
            type_id: self.type_id,
            label: self.label,
            icon: self.icon,
            category: self.category,
            description: self.description,
            fields,
            defaults,
        }
    }
}
