use askama::Template;

use crate::domain::blocks::{FieldKind, FieldSchema, FieldValue};

#[derive(Clone)]
pub struct SelectOptionView {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

/// Everything the field template needs, flattened to strings.
#[derive(Clone)]
pub struct FieldInputView {
    pub name: String,
    pub label: String,
    pub input_type: &'static str,
    pub value: String,
    pub checked: bool,
    pub required: bool,
    pub min: String,
    pub max: String,
    pub step: String,
    pub rows: u32,
    pub options: Vec<SelectOptionView>,
}

impl FieldInputView {
    pub fn new(name: &str, schema: &FieldSchema, value: &FieldValue) -> Self {
        let constraints = &schema.constraints;
        let current = value.display();
        let bound = |bound: Option<f64>| {
            bound
                .map(|number| FieldValue::Number(number).display())
                .unwrap_or_default()
        };

        let options = constraints
            .options
            .iter()
            .map(|(option, label)| SelectOptionView {
                value: option.clone(),
                label: label.clone(),
                selected: *option == current,
            })
            .collect();

        Self {
            name: name.to_string(),
            label: schema.label.clone(),
            input_type: schema.kind.as_str(),
            checked: matches!(value, FieldValue::Bool(true)),
            required: schema.required,
            min: bound(constraints.min),
            max: bound(constraints.max),
            step: bound(constraints.step),
            rows: constraints
                .rows
                .unwrap_or(if schema.kind == FieldKind::Richtext { 8 } else { 4 }),
            options,
            value: current,
        }
    }
}

#[derive(Template)]
#[template(path = "editor/field.html")]
pub struct FieldTemplate {
    pub field: FieldInputView,
}

#[derive(Clone)]
pub struct PreviewFieldView {
    pub label: String,
    pub display: String,
    /// `display` holds sanitised markup.
    pub rich: bool,
}

#[derive(Template)]
#[template(path = "editor/block_preview.html")]
pub struct BlockPreviewTemplate {
    pub type_id: String,
    pub label: String,
    pub icon: String,
    pub fields: Vec<PreviewFieldView>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::blocks::{BlockRegistry, current_value};
    use crate::domain::blocks::document::BlockInstance;

    #[test]
    fn field_template_escapes_values() {
        let registry = BlockRegistry::builtin().expect("builtin catalog");
        let hero = registry.get("hero").expect("hero");
        let schema = hero.field("title").expect("title field");
        let value = FieldValue::Text("<b>\"Hi\"</b>".to_string());

        let html = FieldTemplate {
            field: FieldInputView::new("title", schema, &value),
        }
        .render()
        .expect("render");

        assert!(html.contains("&lt;b&gt;"));
        assert!(!html.contains("<b>"));
    }

    #[test]
    fn select_marks_current_option() {
        let registry = BlockRegistry::builtin().expect("builtin catalog");
        let grid = registry.get("members-grid").expect("members-grid");
        let instance = BlockInstance {
            type_id: "members-grid".to_string(),
            data: grid.defaults.clone(),
        };
        let value = current_value(grid, "columns", &instance).expect("columns");
        let schema = grid.field("columns").expect("columns field");

        let view = FieldInputView::new("columns", schema, &value);
        let selected: Vec<_> = view.options.iter().filter(|o| o.selected).collect();

        assert_eq!(view.input_type, "select");
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].value, "3");
    }
}
