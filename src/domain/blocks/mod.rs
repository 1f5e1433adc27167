//! Typed content blocks: the registry of block types, the field value rules,
//! the stored document format and the in-memory working copy the editor mutates.

pub mod document;
pub mod fields;
pub mod registry;
pub mod working_copy;

use thiserror::Error;

pub use document::{BlockDocument, BlockInstance, BlockIssue};
pub use fields::{FieldError, FieldValue, current_value, serialize_edit};
pub use registry::{
    BlockRegistry, BlockTypeDefinition, CategoryGroup, FieldConstraints, FieldKind, FieldSchema,
    RegistryBuilder, RegistryError,
};
pub use working_copy::BlockWorkingCopy;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum BlockEditError {
    #[error("unknown block type `{type_id}`")]
    UnknownBlockType { type_id: String },
    #[error("block index {index} is out of range for {len} blocks")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("block type `{type_id}` has no field `{field}`")]
    UnknownField { type_id: String, field: String },
    #[error("invalid value for `{field}`: {source}")]
    Field {
        field: String,
        #[source]
        source: FieldError,
    },
    #[error("malformed block document: {0}")]
    Malformed(String),
}
