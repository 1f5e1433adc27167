//! Request and response types for the Tessera page-composition API.
//!
//! The server serialises these directly; API clients can depend on this crate
//! without pulling in the server's persistence or HTTP stack.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;
use uuid::Uuid;

/// Lifecycle status of a page. Always derived, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageStatus {
    Draft,
    Scheduled,
    Published,
}

impl PageStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PageStatus::Draft => "draft",
            PageStatus::Scheduled => "scheduled",
            PageStatus::Published => "published",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "content_format", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum ContentFormat {
    #[default]
    Html,
    Blocks,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "menu_location", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum MenuLocation {
    #[default]
    About,
    Main,
    Footer,
}

/// Phase of a page's edit session in the save coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Idle,
    Dirty,
    Saving,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSeo {
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    #[serde(default)]
    pub noindex: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResponse {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub status: PageStatus,
    pub content: String,
    pub content_format: ContentFormat,
    pub is_published: bool,
    pub publish_at: Option<OffsetDateTime>,
    pub show_in_menu: bool,
    pub menu_location: Option<MenuLocation>,
    pub seo: PageSeo,
    pub position: i32,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageVersionResponse {
    pub id: Uuid,
    pub page_id: Uuid,
    pub version_number: i32,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub content_format: ContentFormat,
    pub restore_note: Option<String>,
    pub created_by: String,
    pub created_at: OffsetDateTime,
}

/// Version list entry without the content payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageVersionSummary {
    pub id: Uuid,
    pub version_number: i32,
    pub title: String,
    pub slug: String,
    pub restore_note: Option<String>,
    pub created_by: String,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageCreateRequest {
    pub title: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub content_format: Option<ContentFormat>,
}

/// Partial settings update. Omitted fields stay unchanged; `publish_at: null`
/// clears the schedule.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageSettingsRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub is_published: Option<bool>,
    #[serde(
        default,
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    pub publish_at: Option<Option<OffsetDateTime>>,
    #[serde(default)]
    pub show_in_menu: Option<bool>,
    #[serde(default)]
    pub menu_location: Option<MenuLocation>,
}

/// Full "save page" payload, used both for staging a draft and for explicit saves.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageSaveRequest {
    pub title: String,
    pub slug: String,
    pub content: String,
    #[serde(default)]
    pub content_format: Option<ContentFormat>,
    #[serde(default)]
    pub is_published: Option<bool>,
    #[serde(
        default,
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    pub publish_at: Option<Option<OffsetDateTime>>,
    #[serde(default)]
    pub meta_title: Option<String>,
    #[serde(default)]
    pub meta_description: Option<String>,
    #[serde(default)]
    pub noindex: Option<bool>,
    #[serde(default)]
    pub show_in_menu: Option<bool>,
    #[serde(default)]
    pub menu_location: Option<MenuLocation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockPayload {
    pub type_id: String,
    #[serde(default)]
    pub data: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveBlocksRequest {
    pub blocks: Vec<BlockPayload>,
}

/// One edit against a page's block working copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum BlockOp {
    Add {
        type_id: String,
    },
    UpdateField {
        index: usize,
        field: String,
        value: Value,
    },
    MoveUp {
        index: usize,
    },
    MoveDown {
        index: usize,
    },
    Move {
        from: usize,
        to: usize,
    },
    Remove {
        index: usize,
    },
    Clear,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockOpsRequest {
    pub ops: Vec<BlockOp>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkingCopyResponse {
    pub session: SessionResponse,
    pub blocks: Vec<BlockPayload>,
    pub issues: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveResponse {
    pub page: PageResponse,
    pub version: Option<PageVersionResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreResponse {
    pub page: PageResponse,
    pub pre_restore: PageVersionResponse,
    pub post_restore: PageVersionResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReorderRequest {
    pub ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageOrderEntry {
    pub page_id: Uuid,
    pub position: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderResponse {
    pub entries: Vec<PageOrderEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub page_id: Uuid,
    pub phase: SessionPhase,
    pub revision: u64,
    pub saved_revision: u64,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockPreviewRequest {
    pub type_id: String,
    #[serde(default)]
    pub data: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockPreviewResponse {
    pub html: String,
    pub valid: bool,
    pub issues: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldAffordanceRequest {
    #[serde(default)]
    pub value: Option<Value>,
}

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`).
pub fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}
