//! Response shapes specific to the server and conversions into the shared
//! wire types.

use serde::Serialize;
use serde_json::{Map, Value};
use tessera_api_types::{
    BlockPayload, OrderResponse, PageOrderEntry, PageResponse, PageSeo as ApiPageSeo,
    PageVersionResponse, PageVersionSummary, RestoreResponse, SaveResponse, SessionResponse,
    WorkingCopyResponse,
};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::autosave::{SessionSnapshot, WorkingCopyView};
use crate::application::editor::FieldAffordance;
use crate::application::pages::SaveOutcome;
use crate::application::repos::RestoreOutcome;
use crate::domain::blocks::{
    BlockInstance, BlockTypeDefinition, CategoryGroup, FieldSchema, FieldValue,
};
use crate::domain::entities::{AuditLogRecord, PageRecord, PageVersionRecord};

#[derive(Debug, Serialize)]
pub struct FieldSchemaResponse {
    pub name: String,
    #[serde(flatten)]
    pub schema: FieldSchema,
}

#[derive(Debug, Serialize)]
pub struct BlockTypeResponse {
    pub type_id: String,
    pub label: String,
    pub icon: String,
    pub category: String,
    pub description: String,
    pub fields: Vec<FieldSchemaResponse>,
    pub defaults: Map<String, Value>,
}

impl From<&BlockTypeDefinition> for BlockTypeResponse {
    fn from(definition: &BlockTypeDefinition) -> Self {
        Self {
            type_id: definition.type_id.clone(),
            label: definition.label.clone(),
            icon: definition.icon.clone(),
            category: definition.category.clone(),
            description: definition.description.clone(),
            fields: definition
                .fields
                .iter()
                .map(|(name, schema)| FieldSchemaResponse {
                    name: name.clone(),
                    schema: schema.clone(),
                })
                .collect(),
            defaults: definition.defaults.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BlockCategoryResponse {
    pub category: String,
    pub blocks: Vec<BlockTypeResponse>,
}

impl From<CategoryGroup<'_>> for BlockCategoryResponse {
    fn from(group: CategoryGroup<'_>) -> Self {
        Self {
            category: group.category.to_string(),
            blocks: group.blocks.into_iter().map(BlockTypeResponse::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FieldAffordanceResponse {
    pub type_id: String,
    pub field: String,
    pub kind: &'static str,
    pub value: FieldValue,
    pub html: String,
}

impl From<FieldAffordance> for FieldAffordanceResponse {
    fn from(affordance: FieldAffordance) -> Self {
        Self {
            type_id: affordance.type_id,
            field: affordance.field,
            kind: affordance.kind.as_str(),
            value: affordance.value,
            html: affordance.html,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuditEntryResponse {
    pub id: Uuid,
    pub actor: String,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<String>,
    pub payload: Option<Value>,
    pub created_at: OffsetDateTime,
}

impl From<AuditLogRecord> for AuditEntryResponse {
    fn from(record: AuditLogRecord) -> Self {
        // Payloads are written as JSON; fall back to a string if one is not.
        let payload = record.payload_text.map(|text| {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        });
        Self {
            id: record.id,
            actor: record.actor,
            action: record.action,
            entity_type: record.entity_type,
            entity_id: record.entity_id,
            payload,
            created_at: record.created_at,
        }
    }
}

pub fn page_response(page: PageRecord) -> PageResponse {
    PageResponse {
        status: page.status(),
        id: page.id,
        title: page.title,
        slug: page.slug,
        content: page.content,
        content_format: page.content_format,
        is_published: page.is_published,
        publish_at: page.publish_at,
        show_in_menu: page.show_in_menu,
        menu_location: page.menu_location,
        seo: ApiPageSeo {
            meta_title: page.seo.meta_title,
            meta_description: page.seo.meta_description,
            noindex: page.seo.noindex,
        },
        position: page.position,
        created_at: page.created_at,
        updated_at: page.updated_at,
    }
}

pub fn version_response(version: PageVersionRecord) -> PageVersionResponse {
    PageVersionResponse {
        id: version.id,
        page_id: version.page_id,
        version_number: version.version_number,
        title: version.title,
        slug: version.slug,
        content: version.content,
        content_format: version.content_format,
        restore_note: version.restore_note,
        created_by: version.created_by,
        created_at: version.created_at,
    }
}

pub fn version_summary(version: PageVersionRecord) -> PageVersionSummary {
    PageVersionSummary {
        id: version.id,
        version_number: version.version_number,
        title: version.title,
        slug: version.slug,
        restore_note: version.restore_note,
        created_by: version.created_by,
        created_at: version.created_at,
    }
}

pub fn save_response(outcome: SaveOutcome) -> SaveResponse {
    SaveResponse {
        page: page_response(outcome.page),
        version: outcome.version.map(version_response),
    }
}

pub fn restore_response(outcome: RestoreOutcome) -> RestoreResponse {
    RestoreResponse {
        page: page_response(outcome.page),
        pre_restore: version_response(outcome.pre_restore),
        post_restore: version_response(outcome.post_restore),
    }
}

pub fn session_response(session: SessionSnapshot) -> SessionResponse {
    SessionResponse {
        page_id: session.page_id,
        phase: session.phase,
        revision: session.revision,
        saved_revision: session.saved_revision,
        last_error: session.last_error,
    }
}

pub fn order_response(entries: Vec<PageOrderEntry>) -> OrderResponse {
    OrderResponse { entries }
}

pub fn block_payload(block: BlockInstance) -> BlockPayload {
    BlockPayload {
        type_id: block.type_id,
        data: block.data,
    }
}

pub fn block_instance(payload: BlockPayload) -> BlockInstance {
    BlockInstance {
        type_id: payload.type_id,
        data: payload.data,
    }
}

pub fn working_copy_response(view: WorkingCopyView) -> WorkingCopyResponse {
    WorkingCopyResponse {
        session: session_response(view.session),
        blocks: view.blocks.into_iter().map(block_payload).collect(),
        issues: view.issues.iter().map(ToString::to_string).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audit_payload_is_parsed_when_json() {
        let record = AuditLogRecord {
            id: Uuid::new_v4(),
            actor: "editor".into(),
            action: "page.reorder".into(),
            entity_type: "page_order".into(),
            entity_id: None,
            payload_text: Some(r#"{"ids":[]}"#.into()),
            created_at: OffsetDateTime::now_utc(),
        };
        let response = AuditEntryResponse::from(record);
        assert_eq!(response.payload, Some(serde_json::json!({ "ids": [] })));
    }

    #[test]
    fn block_types_list_fields_in_catalog_order() {
        let registry = crate::domain::blocks::BlockRegistry::builtin().expect("builtin catalog");
        let definition = registry.iter().next().expect("at least one block type");
        let response = BlockTypeResponse::from(definition);
        let names: Vec<&str> = response.fields.iter().map(|f| f.name.as_str()).collect();
        let expected: Vec<&str> = definition.fields.keys().map(String::as_str).collect();
        assert_eq!(names, expected);
    }
}
