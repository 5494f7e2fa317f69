//! Block types, aspects, and the JSON definition loader.
//!
//! Block behaviour is data-driven: a definitions file maps string block
//! ids (`"0"`..`"255"`) to attributes plus a named aspect with
//! aspect-specific arguments. Aspect names resolve against a
//! process-wide registry; the registry is built once at startup and
//! read-only afterwards.

use chunkwright_core::{BlockId, ItemTypeId, Slot};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Errors from loading block definitions. All are fatal at startup.
#[derive(Debug, Error)]
pub enum BlockDefError {
    #[error("i/o error reading block definitions")]
    Io(#[from] std::io::Error),
    #[error("block definitions are not valid JSON")]
    Parse(#[from] serde_json::Error),
    #[error("block id {0:?} is not an integer in [0, 255]")]
    IdOutOfRange(String),
    #[error("block id {0} defined more than once")]
    DuplicateBlockId(BlockId),
    #[error("unknown block aspect {0:?}")]
    UnknownAspect(String),
}

/// Static attributes shared by every aspect.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct BlockAttrs {
    pub name: String,
    /// Light opacity, 0 (transparent) to 15 (opaque).
    pub opacity: u8,
    pub destructable: bool,
    pub solid: bool,
    pub replaceable: bool,
    pub attachable: bool,
}

impl Default for BlockAttrs {
    fn default() -> Self {
        Self {
            name: String::new(),
            opacity: 15,
            destructable: true,
            solid: true,
            replaceable: false,
            attachable: true,
        }
    }
}

/// Shape of the inventory a container block exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerSpec {
    pub inv_type_id: i8,
    pub num_slots: u16,
}

/// Behavioural plug-in attached to a block type.
pub trait BlockAspect: Send + Sync {
    fn name(&self) -> &'static str;

    /// The pickup to spawn when a block of this type is destroyed, if any.
    fn dropped_item(&self) -> Option<Slot> {
        None
    }

    /// The inventory this block exposes when interacted with, if any.
    fn container(&self) -> Option<ContainerSpec> {
        None
    }
}

/// One dropped-item rule of a [`StandardAspect`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BlockDropItem {
    pub dropped_item: ItemTypeId,
    pub count: i8,
}

/// The ordinary block aspect: destructable, drops configured items, and
/// optionally exposes a container inventory.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct StandardAspect {
    pub dropped_items: Vec<BlockDropItem>,
    pub inventory_type_id: i8,
    pub inventory_slots: u16,
}

impl BlockAspect for StandardAspect {
    fn name(&self) -> &'static str {
        "Standard"
    }

    fn dropped_item(&self) -> Option<Slot> {
        self.dropped_items
            .first()
            .map(|drop| Slot::new(drop.dropped_item, drop.count, 0))
    }

    fn container(&self) -> Option<ContainerSpec> {
        (self.inventory_slots > 0).then_some(ContainerSpec {
            inv_type_id: self.inventory_type_id,
            num_slots: self.inventory_slots,
        })
    }
}

/// Aspect for blocks with no behaviour at all (air).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VoidAspect;

impl BlockAspect for VoidAspect {
    fn name(&self) -> &'static str {
        "Void"
    }
}

/// Resolve an aspect name against the process-wide registry, decoding
/// the aspect-specific arguments with the resolved type.
fn make_aspect(
    name: &str,
    args: serde_json::Value,
) -> Result<Box<dyn BlockAspect>, BlockDefError> {
    match name {
        "Standard" => Ok(Box::new(serde_json::from_value::<StandardAspect>(args)?)),
        "Void" => Ok(Box::new(serde_json::from_value::<VoidAspect>(args)?)),
        other => Err(BlockDefError::UnknownAspect(other.to_string())),
    }
}

/// A fully resolved block type.
pub struct BlockType {
    pub attrs: BlockAttrs,
    pub aspect: Box<dyn BlockAspect>,
}

/// JSON shape of one block definition.
#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BlockDef {
    #[serde(flatten)]
    attrs: BlockAttrs,
    aspect: String,
    #[serde(default)]
    aspect_args: serde_json::Value,
}

/// The immutable table of block types, indexed by block id.
pub struct BlockRegistry {
    types: Vec<Option<BlockType>>,
}

impl BlockRegistry {
    /// Load definitions from a JSON string.
    pub fn load_from_str(json: &str) -> Result<Self, BlockDefError> {
        let defs: HashMap<String, BlockDef> = serde_json::from_str(json)?;

        let mut types: Vec<Option<BlockType>> = Vec::new();
        types.resize_with(256, || None);
        for (id_str, def) in defs {
            let id: BlockId = id_str
                .parse()
                .map_err(|_| BlockDefError::IdOutOfRange(id_str.clone()))?;
            if types[id as usize].is_some() {
                return Err(BlockDefError::DuplicateBlockId(id));
            }
            let aspect = make_aspect(&def.aspect, def.aspect_args)?;
            types[id as usize] = Some(BlockType {
                attrs: def.attrs,
                aspect,
            });
        }
        Ok(Self { types })
    }

    /// Load definitions from a JSON file.
    pub fn load_from_path(path: &Path) -> Result<Self, BlockDefError> {
        let contents = std::fs::read_to_string(path)?;
        Self::load_from_str(&contents)
    }

    pub fn get(&self, id: BlockId) -> Option<&BlockType> {
        self.types[id as usize].as_ref()
    }

    /// Whether a cell holding this block may be overwritten by placement.
    pub fn is_replaceable(&self, id: BlockId) -> bool {
        self.get(id).map(|t| t.attrs.replaceable).unwrap_or(false)
    }

    pub fn is_destructable(&self, id: BlockId) -> bool {
        self.get(id).map(|t| t.attrs.destructable).unwrap_or(false)
    }

    /// Pickup to spawn when a block of this type breaks.
    pub fn dropped_item(&self, id: BlockId) -> Option<Slot> {
        self.get(id).and_then(|t| t.aspect.dropped_item())
    }

    /// The container this block type exposes, if it is one.
    pub fn container(&self, id: BlockId) -> Option<ContainerSpec> {
        self.get(id).and_then(|t| t.aspect.container())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFS: &str = r#"{
        "0": {"Name": "air", "Opacity": 0, "Destructable": false, "Solid": false,
              "Replaceable": true, "Attachable": false, "Aspect": "Void", "AspectArgs": {}},
        "1": {"Name": "stone", "Aspect": "Standard",
              "AspectArgs": {"DroppedItems": [{"DroppedItem": 4, "Count": 1}]}},
        "3": {"Name": "dirt", "Aspect": "Standard",
              "AspectArgs": {"DroppedItems": [{"DroppedItem": 3, "Count": 1}]}}
    }"#;

    #[test]
    fn loads_definitions_and_resolves_aspects() {
        let registry = BlockRegistry::load_from_str(DEFS).unwrap();

        let air = registry.get(0).unwrap();
        assert_eq!(air.attrs.name, "air");
        assert_eq!(air.aspect.name(), "Void");
        assert!(registry.is_replaceable(0));
        assert!(!registry.is_destructable(0));
        assert!(registry.dropped_item(0).is_none());

        let dirt = registry.get(3).unwrap();
        assert_eq!(dirt.aspect.name(), "Standard");
        assert_eq!(registry.dropped_item(3), Some(Slot::new(3, 1, 0)));

        assert!(registry.get(2).is_none());
    }

    #[test]
    fn unknown_aspect_is_fatal() {
        let json = r#"{"1": {"Name": "weird", "Aspect": "Imaginary", "AspectArgs": {}}}"#;
        assert!(matches!(
            BlockRegistry::load_from_str(json),
            Err(BlockDefError::UnknownAspect(name)) if name == "Imaginary"
        ));
    }

    #[test]
    fn out_of_range_id_is_fatal() {
        let json = r#"{"256": {"Name": "overflow", "Aspect": "Void"}}"#;
        assert!(matches!(
            BlockRegistry::load_from_str(json),
            Err(BlockDefError::IdOutOfRange(_))
        ));

        let json = r#"{"-1": {"Name": "negative", "Aspect": "Void"}}"#;
        assert!(matches!(
            BlockRegistry::load_from_str(json),
            Err(BlockDefError::IdOutOfRange(_))
        ));
    }

    #[test]
    fn container_spec_comes_from_aspect_args() {
        let json = r#"{"54": {"Name": "chest", "Aspect": "Standard",
            "AspectArgs": {"InventoryTypeId": 0, "InventorySlots": 27}}}"#;
        let registry = BlockRegistry::load_from_str(json).unwrap();
        assert_eq!(
            registry.container(54),
            Some(ContainerSpec {
                inv_type_id: 0,
                num_slots: 27
            })
        );
        assert!(registry.container(0).is_none());
    }

    #[test]
    fn duplicate_id_spellings_are_fatal() {
        // "1" and "01" parse to the same id.
        let json = r#"{
            "1": {"Name": "stone", "Aspect": "Void"},
            "01": {"Name": "stone again", "Aspect": "Void"}
        }"#;
        assert!(matches!(
            BlockRegistry::load_from_str(json),
            Err(BlockDefError::DuplicateBlockId(1))
        ));
    }

    #[test]
    fn default_attrs_fill_missing_fields() {
        let json = r#"{"9": {"Name": "plain", "Aspect": "Standard"}}"#;
        let registry = BlockRegistry::load_from_str(json).unwrap();
        let plain = registry.get(9).unwrap();
        assert!(plain.attrs.solid);
        assert!(plain.attrs.destructable);
        assert!(!plain.attrs.replaceable);
        assert_eq!(plain.attrs.opacity, 15);
    }
}
