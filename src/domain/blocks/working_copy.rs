//! In-memory ordered block list for one page edit session.

use std::sync::Arc;

use serde_json::Value;

use super::BlockEditError;
use super::document::{BlockDocument, BlockInstance, BlockIssue, instance_issues};
use super::fields::{FieldError, serialize_edit};
use super::registry::BlockRegistry;

/// The unit of work the editor mutates and a save serialises into page content.
///
/// Blocks have no identity beyond their index; moves use splice semantics.
#[derive(Debug, Clone)]
pub struct BlockWorkingCopy {
    registry: Arc<BlockRegistry>,
    blocks: Vec<BlockInstance>,
}

impl BlockWorkingCopy {
    pub fn new(registry: Arc<BlockRegistry>) -> Self {
        Self {
            registry,
            blocks: Vec::new(),
        }
    }

    pub fn from_document(registry: Arc<BlockRegistry>, document: BlockDocument) -> Self {
        Self {
            registry,
            blocks: document.blocks,
        }
    }

    pub fn blocks(&self) -> &[BlockInstance] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Append a block of `type_id` populated with the type's defaults. Returns its index.
    pub fn add_block(&mut self, type_id: &str) -> Result<usize, BlockEditError> {
        let definition =
            self.registry
                .get(type_id)
                .map_err(|_| BlockEditError::UnknownBlockType {
                    type_id: type_id.to_string(),
                })?;
        self.blocks.push(BlockInstance {
            type_id: definition.type_id.clone(),
            data: definition.defaults.clone(),
        });
        Ok(self.blocks.len() - 1)
    }

    pub fn update_field(
        &mut self,
        index: usize,
        field: &str,
        value: &Value,
    ) -> Result<(), BlockEditError> {
        let len = self.blocks.len();
        let block = self
            .blocks
            .get_mut(index)
            .ok_or(BlockEditError::IndexOutOfRange { index, len })?;
        let definition =
            self.registry
                .get(&block.type_id)
                .map_err(|_| BlockEditError::UnknownBlockType {
                    type_id: block.type_id.clone(),
                })?;
        let schema = definition
            .field(field)
            .ok_or_else(|| BlockEditError::UnknownField {
                type_id: block.type_id.clone(),
                field: field.to_string(),
            })?;
        let stored = serialize_edit(schema, value).map_err(|source: FieldError| {
            BlockEditError::Field {
                field: field.to_string(),
                source,
            }
        })?;
        block.data.insert(field.to_string(), stored);
        Ok(())
    }

    /// Swap with the previous block. No-op for the first block.
    pub fn move_up(&mut self, index: usize) -> Result<(), BlockEditError> {
        self.check_index(index)?;
        if index > 0 {
            self.blocks.swap(index - 1, index);
        }
        Ok(())
    }

    /// Swap with the next block. No-op for the last block.
    pub fn move_down(&mut self, index: usize) -> Result<(), BlockEditError> {
        self.check_index(index)?;
        if index + 1 < self.blocks.len() {
            self.blocks.swap(index, index + 1);
        }
        Ok(())
    }

    /// Drag placement: take the block at `from` out and insert it at `to`.
    pub fn move_to(&mut self, from: usize, to: usize) -> Result<(), BlockEditError> {
        self.check_index(from)?;
        self.check_index(to)?;
        let block = self.blocks.remove(from);
        self.blocks.insert(to, block);
        Ok(())
    }

    pub fn remove(&mut self, index: usize) -> Result<BlockInstance, BlockEditError> {
        self.check_index(index)?;
        Ok(self.blocks.remove(index))
    }

    pub fn clear(&mut self) {
        self.blocks.clear();
    }

    pub fn issues(&self) -> Vec<BlockIssue> {
        self.blocks
            .iter()
            .enumerate()
            .flat_map(|(index, block)| instance_issues(&self.registry, index, block))
            .collect()
    }

    pub fn to_document(&self) -> BlockDocument {
        BlockDocument {
            blocks: self.blocks.clone(),
        }
    }

    fn check_index(&self, index: usize) -> Result<(), BlockEditError> {
        if index < self.blocks.len() {
            Ok(())
        } else {
            Err(BlockEditError::IndexOutOfRange {
                index,
                len: self.blocks.len(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn working_copy() -> BlockWorkingCopy {
        BlockWorkingCopy::new(Arc::new(BlockRegistry::builtin().unwrap()))
    }

    fn order(copy: &BlockWorkingCopy) -> Vec<&str> {
        copy.blocks().iter().map(|b| b.type_id.as_str()).collect()
    }

    #[test]
    fn add_block_copies_defaults() {
        let mut copy = working_copy();
        let index = copy.add_block("hero").unwrap();
        assert_eq!(index, 0);
        assert_eq!(copy.blocks()[0].data.get("title"), Some(&json!("Welcome")));
    }

    #[test]
    fn add_unknown_block_fails() {
        let mut copy = working_copy();
        assert_eq!(
            copy.add_block("carousel"),
            Err(BlockEditError::UnknownBlockType {
                type_id: "carousel".into()
            })
        );
        assert!(copy.is_empty());
    }

    #[test]
    fn update_field_validates_index_and_name() {
        let mut copy = working_copy();
        copy.add_block("hero").unwrap();

        copy.update_field(0, "title", &json!("About us")).unwrap();
        assert_eq!(copy.blocks()[0].data.get("title"), Some(&json!("About us")));

        assert_eq!(
            copy.update_field(3, "title", &json!("x")),
            Err(BlockEditError::IndexOutOfRange { index: 3, len: 1 })
        );
        assert!(matches!(
            copy.update_field(0, "colour", &json!("red")),
            Err(BlockEditError::UnknownField { .. })
        ));
    }

    #[test]
    fn moves_are_noops_at_boundaries() {
        let mut copy = working_copy();
        for type_id in ["hero", "richtext", "spacer"] {
            copy.add_block(type_id).unwrap();
        }

        copy.move_up(0).unwrap();
        copy.move_down(2).unwrap();
        assert_eq!(order(&copy), ["hero", "richtext", "spacer"]);

        copy.move_down(0).unwrap();
        assert_eq!(order(&copy), ["richtext", "hero", "spacer"]);
        copy.move_up(2).unwrap();
        assert_eq!(order(&copy), ["richtext", "spacer", "hero"]);
    }

    #[test]
    fn move_to_splices() {
        let mut copy = working_copy();
        for type_id in ["hero", "richtext", "spacer", "image"] {
            copy.add_block(type_id).unwrap();
        }
        copy.move_to(0, 2).unwrap();
        assert_eq!(order(&copy), ["richtext", "spacer", "hero", "image"]);
        copy.move_to(3, 0).unwrap();
        assert_eq!(order(&copy), ["image", "richtext", "spacer", "hero"]);
    }

    #[test]
    fn remove_and_clear() {
        let mut copy = working_copy();
        copy.add_block("hero").unwrap();
        copy.add_block("spacer").unwrap();

        let removed = copy.remove(0).unwrap();
        assert_eq!(removed.type_id, "hero");
        assert_eq!(order(&copy), ["spacer"]);
        assert!(copy.remove(5).is_err());

        copy.clear();
        assert!(copy.is_empty());
    }
}
