//! Domain entities mirrored from persistent storage.

use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::pages::derive_status;
use crate::domain::types::{ContentFormat, MenuLocation, PageStatus};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PageSeo {
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub noindex: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageRecord {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
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

impl PageRecord {
    /// Status as of `now`. Never cached on the record.
    pub fn status_at(&self, now: OffsetDateTime) -> PageStatus {
        derive_status(self.is_published, self.publish_at, now)
    }

    pub fn status(&self) -> PageStatus {
        self.status_at(OffsetDateTime::now_utc())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageVersionRecord {
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

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditLogRecord {
    pub id: Uuid,
    pub actor: String,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<String>,
    pub payload_text: Option<String>,
    pub created_at: OffsetDateTime,
}
