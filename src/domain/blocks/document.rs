//! Stored form of a block-based page body.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::BlockEditError;
use super::fields::{FieldError, serialize_data};
use super::registry::BlockRegistry;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockInstance {
    pub type_id: String,
    #[serde(default)]
    pub data: Map<String, Value>,
}

/// The `content` payload of a page whose format is `blocks`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockDocument {
    #[serde(default)]
    pub blocks: Vec<BlockInstance>,
}

/// Problems that do not prevent storing or rendering a document but make it invalid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum BlockIssue {
    UnknownType { index: usize, type_id: String },
    UnknownField { index: usize, field: String },
    MissingRequired { index: usize, field: String },
}

impl fmt::Display for BlockIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockIssue::UnknownType { index, type_id } => {
                write!(f, "block {index}: unknown block type `{type_id}`")
            }
            BlockIssue::UnknownField { index, field } => {
                write!(f, "block {index}: unknown field `{field}`")
            }
            BlockIssue::MissingRequired { index, field } => {
                write!(f, "block {index}: required field `{field}` is empty")
            }
        }
    }
}

impl BlockDocument {
    /// Parse stored content. Blank content is an empty document.
    pub fn parse(content: &str) -> Result<Self, BlockEditError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(content).map_err(|err| BlockEditError::Malformed(err.to_string()))
    }

    pub fn to_content(&self) -> Result<String, BlockEditError> {
        serde_json::to_string(self).map_err(|err| BlockEditError::Malformed(err.to_string()))
    }

    /// Build a document from submitted blocks, normalising every field of known
    /// block types. Blocks of unregistered types are kept untouched so content
    /// written by a newer catalog survives a round trip.
    pub fn ingest(
        registry: &BlockRegistry,
        blocks: impl IntoIterator<Item = BlockInstance>,
    ) -> Result<Self, BlockEditError> {
        let mut normalised = Vec::new();
        for block in blocks {
            let Ok(definition) = registry.get(&block.type_id) else {
                normalised.push(block);
                continue;
            };
            let data = serialize_data(definition, &block.data).map_err(|(field, err)| match err {
                FieldError::UnknownField { .. } => BlockEditError::UnknownField {
                    type_id: block.type_id.clone(),
                    field,
                },
                source => BlockEditError::Field { field, source },
            })?;
            normalised.push(BlockInstance {
                type_id: block.type_id,
                data,
            });
        }
        Ok(Self { blocks: normalised })
    }

    /// Validation issues for rendering and display. Empty means valid.
    pub fn issues(&self, registry: &BlockRegistry) -> Vec<BlockIssue> {
        let mut issues = Vec::new();
        for (index, block) in self.blocks.iter().enumerate() {
            issues.extend(instance_issues(registry, index, block));
        }
        issues
    }
}

pub(crate) fn instance_issues(
    registry: &BlockRegistry,
    index: usize,
    block: &BlockInstance,
) -> Vec<BlockIssue> {
    let Ok(definition) = registry.get(&block.type_id) else {
        return vec![BlockIssue::UnknownType {
            index,
            type_id: block.type_id.clone(),
        }];
    };

    let mut issues: Vec<BlockIssue> = block
        .data
        .keys()
        .filter(|field| definition.field(field).is_none())
        .map(|field| BlockIssue::UnknownField {
            index,
            field: field.clone(),
        })
        .collect();

    for (name, schema) in &definition.fields {
        if !schema.required {
            continue;
        }
        let value = block.data.get(name).or_else(|| definition.defaults.get(name));
        let empty = match value {
            None | Some(Value::Null) => true,
            Some(Value::String(text)) => text.trim().is_empty(),
            Some(_) => false,
        };
        if empty {
            issues.push(BlockIssue::MissingRequired {
                index,
                field: name.clone(),
            });
        }
    }

    issues
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn block(type_id: &str, data: Value) -> BlockInstance {
        BlockInstance {
            type_id: type_id.to_string(),
            data: data.as_object().cloned().unwrap_or_default(),
        }
    }

    #[test]
    fn blank_content_is_empty_document() {
        assert_eq!(BlockDocument::parse("  ").unwrap(), BlockDocument::default());
        assert!(matches!(
            BlockDocument::parse("<p>html</p>"),
            Err(BlockEditError::Malformed(_))
        ));
    }

    #[test]
    fn ingest_normalises_known_blocks() {
        let registry = BlockRegistry::builtin().unwrap();
        let document = BlockDocument::ingest(
            &registry,
            vec![block("members-grid", json!({"limit": "250", "showBio": "yes"}))],
        )
        .unwrap();
        assert_eq!(document.blocks[0].data.get("limit"), Some(&json!(100)));
        assert_eq!(document.blocks[0].data.get("showBio"), Some(&json!(true)));
    }

    #[test]
    fn ingest_rejects_unknown_fields_and_bad_options() {
        let registry = BlockRegistry::builtin().unwrap();
        let err = BlockDocument::ingest(&registry, vec![block("hero", json!({"colour": "red"}))])
            .unwrap_err();
        assert!(matches!(err, BlockEditError::UnknownField { .. }));

        let err = BlockDocument::ingest(&registry, vec![block("hero", json!({"height": "huge"}))])
            .unwrap_err();
        assert!(matches!(err, BlockEditError::Field { .. }));
    }

    #[test]
    fn unknown_types_are_kept_but_flagged() {
        let registry = BlockRegistry::builtin().unwrap();
        let document =
            BlockDocument::ingest(&registry, vec![block("carousel", json!({"speed": 3}))]).unwrap();
        assert_eq!(document.blocks[0].data.get("speed"), Some(&json!(3)));
        assert_eq!(
            document.issues(&registry),
            vec![BlockIssue::UnknownType {
                index: 0,
                type_id: "carousel".into()
            }]
        );
    }

    #[test]
    fn empty_required_fields_are_flagged() {
        let registry = BlockRegistry::builtin().unwrap();
        let document = BlockDocument {
            blocks: vec![block("image", json!({"imageUrl": "  "}))],
        };
        assert_eq!(
            document.issues(&registry),
            vec![BlockIssue::MissingRequired {
                index: 0,
                field: "imageUrl".into()
            }]
        );
    }

    #[test]
    fn issues_serialise_with_a_tag() {
        let registry = BlockRegistry::builtin().unwrap();
        let document = BlockDocument {
            blocks: vec![
                block("hero", json!({"colour": "red", "title": " "})),
                block("carousel", json!({})),
            ],
        };
        insta::assert_json_snapshot!(document.issues(&registry), @r#"
        [
          {
            "issue": "unknown_field",
            "index": 0,
            "field": "colour"
          },
          {
            "issue": "missing_required",
            "index": 0,
            "field": "title"
          },
          {
            "issue": "unknown_type",
            "index": 1,
            "type_id": "carousel"
          }
        ]
        "#);
    }

    #[test]
    fn content_round_trips() {
        let registry = BlockRegistry::builtin().unwrap();
        let document =
            BlockDocument::ingest(&registry, vec![block("hero", json!({"title": "About"}))])
                .unwrap();
        let content = document.to_content().unwrap();
        assert_eq!(BlockDocument::parse(&content).unwrap(), document);
    }
}
