//! Editor support: per-field input affordances and read-only block previews.

use std::sync::Arc;

use askama::Template;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::application::error::ErrorKind;
use crate::domain::blocks::fields::resolve;
use crate::domain::blocks::{
    BlockDocument, BlockInstance, BlockRegistry, FieldError, FieldKind, FieldValue,
    serialize_edit,
};
use crate::domain::pages::sanitize_html;
use crate::presentation::editor::{
    BlockPreviewTemplate, FieldInputView, FieldTemplate, PreviewFieldView,
};

#[derive(Debug, Error)]
pub enum EditorError {
    #[error("unknown block type `{0}`")]
    UnknownBlockType(String),
    #[error("block type `{type_id}` has no field `{field}`")]
    UnknownField { type_id: String, field: String },
    #[error("invalid value for `{field}`: {source}")]
    Field {
        field: String,
        #[source]
        source: FieldError,
    },
    #[error("failed to render {template}")]
    Render {
        template: &'static str,
        #[source]
        source: askama::Error,
    },
}

impl EditorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EditorError::UnknownBlockType(_) | EditorError::UnknownField { .. } => {
                ErrorKind::NotFound
            }
            EditorError::Field { .. } => ErrorKind::Validation,
            EditorError::Render { .. } => ErrorKind::Internal,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldAffordance {
    pub type_id: String,
    pub field: String,
    pub kind: FieldKind,
    pub value: FieldValue,
    pub html: String,
}

#[derive(Debug, Clone)]
pub struct BlockPreview {
    pub html: String,
    pub issues: Vec<String>,
}

impl BlockPreview {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }
}

#[derive(Clone)]
pub struct EditorService {
    registry: Arc<BlockRegistry>,
}

impl EditorService {
    pub fn new(registry: Arc<BlockRegistry>) -> Self {
        Self { registry }
    }

    /// The input control for one field, showing `submitted` coerced the way it
    /// would be stored, or the field default when nothing was submitted.
    pub fn affordance(
        &self,
        type_id: &str,
        field: &str,
        submitted: Option<&Value>,
    ) -> Result<FieldAffordance, EditorError> {
        let definition = self
            .registry
            .get(type_id)
            .map_err(|_| EditorError::UnknownBlockType(type_id.to_string()))?;
        let schema = definition
            .field(field)
            .ok_or_else(|| EditorError::UnknownField {
                type_id: type_id.to_string(),
                field: field.to_string(),
            })?;

        let stored = submitted
            .map(|raw| serialize_edit(schema, raw))
            .transpose()
            .map_err(|source| EditorError::Field {
                field: field.to_string(),
                source,
            })?;
        let value = resolve(schema, stored.as_ref(), definition.defaults.get(field));

        let html = FieldTemplate {
            field: FieldInputView::new(field, schema, &value),
        }
        .render()
        .map_err(|source| EditorError::Render {
            template: "editor/field.html",
            source,
        })?;

        Ok(FieldAffordance {
            type_id: definition.type_id.clone(),
            field: field.to_string(),
            kind: schema.kind,
            value,
            html,
        })
    }

    /// Render a block as the editor shows it. Problems with the data are
    /// reported as issues rather than errors.
    pub fn preview(
        &self,
        type_id: &str,
        data: Map<String, Value>,
    ) -> Result<BlockPreview, EditorError> {
        let definition = self
            .registry
            .get(type_id)
            .map_err(|_| EditorError::UnknownBlockType(type_id.to_string()))?;

        let document = BlockDocument {
            blocks: vec![BlockInstance {
                type_id: type_id.to_string(),
                data,
            }],
        };
        let mut issues: Vec<String> = document
            .issues(&self.registry)
            .iter()
            .map(ToString::to_string)
            .collect();
        let instance = &document.blocks[0];

        let mut fields = Vec::with_capacity(definition.fields.len());
        for (name, schema) in &definition.fields {
            let stored = instance.data.get(name);
            if let Some(Err(err)) = stored.map(|raw| serialize_edit(schema, raw)) {
                issues.push(format!("field `{name}`: {err}"));
            }

            let value = resolve(schema, stored, definition.defaults.get(name));
            let rich = schema.kind == FieldKind::Richtext;
            let display = if rich {
                sanitize_html(&value.display())
            } else {
                value.display()
            };
            fields.push(PreviewFieldView {
                label: schema.label.clone(),
                display,
                rich,
            });
        }

        let html = BlockPreviewTemplate {
            type_id: definition.type_id.clone(),
            label: definition.label.clone(),
            icon: definition.icon.clone(),
            fields,
        }
        .render()
        .map_err(|source| EditorError::Render {
            template: "editor/block_preview.html",
            source,
        })?;

        Ok(BlockPreview { html, issues })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn service() -> EditorService {
        EditorService::new(Arc::new(BlockRegistry::builtin().expect("builtin catalog")))
    }

    #[test]
    fn affordance_clamps_submitted_numbers() {
        let affordance = service()
            .affordance("members-grid", "limit", Some(&json!("500")))
            .expect("affordance");

        assert_eq!(affordance.kind, FieldKind::Number);
        let FieldValue::Number(limit) = affordance.value else {
            panic!("expected number, got {:?}", affordance.value);
        };
        assert!(limit <= 100.0);
        assert!(affordance.html.contains("type=\"number\""));
    }

    #[test]
    fn affordance_rejects_unknown_option() {
        let err = service()
            .affordance("members-grid", "columns", Some(&json!("9")))
            .expect_err("invalid option");
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn affordance_for_unknown_field_is_not_found() {
        let err = service()
            .affordance("hero", "nope", None)
            .expect_err("unknown field");
        assert!(matches!(err, EditorError::UnknownField { .. }));
    }

    #[test]
    fn preview_sanitises_richtext_and_escapes_text() {
        let data = json!({
            "title": "<script>alert(1)</script>",
        });
        let preview = service()
            .preview("hero", data.as_object().cloned().unwrap_or_default())
            .expect("preview");

        assert!(!preview.html.contains("<script>"));
        assert!(preview.html.contains("&lt;script&gt;"));

        let rich = json!({ "content": "<p>ok</p><script>x()</script>" });
        let preview = service()
            .preview("richtext", rich.as_object().cloned().unwrap_or_default())
            .expect("preview");
        assert!(preview.html.contains("<p>ok</p>"));
        assert!(!preview.html.contains("<script>"));
    }

    #[test]
    fn preview_reports_unknown_fields() {
        let data = json!({ "bogus": 1 });
        let preview = service()
            .preview("spacer", data.as_object().cloned().unwrap_or_default())
            .expect("preview");
        assert!(!preview.is_valid());
    }
}
