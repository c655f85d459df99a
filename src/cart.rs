use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::graph::identity::Identity;

#[derive(Debug, Error)]
pub enum CartError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A pending change to the owner's list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum ListOp {
    Follow,
    Unfollow,
    Block,
    Unblock,
    Mute,
    Unmute,
    Tag { tag: String },
    Untag { tag: String },
}

impl ListOp {
    /// `follow`, `unmute`, `tag:irl`, ...
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        if let Some((op, tag)) = input.split_once(':') {
            let tag = tag.trim();
            if tag.is_empty() {
                return None;
            }
            // Tags match exactly, so only the op name is case-folded.
            return match op.to_ascii_lowercase().as_str() {
                "tag" => Some(ListOp::Tag { tag: tag.to_owned() }),
                "untag" => Some(ListOp::Untag { tag: tag.to_owned() }),
                _ => None,
            };
        }
        match input.to_ascii_lowercase().as_str() {
            "follow" => Some(ListOp::Follow),
            "unfollow" => Some(ListOp::Unfollow),
            "block" => Some(ListOp::Block),
            "unblock" => Some(ListOp::Unblock),
            "mute" => Some(ListOp::Mute),
            "unmute" => Some(ListOp::Unmute),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub address: String,
    #[serde(flatten)]
    pub op: ListOp,
}

impl CartItem {
    pub fn new(address: &str, op: ListOp) -> Self {
        Self {
            address: address.to_ascii_lowercase(),
            op,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CartFile {
    #[serde(default)]
    owner: Option<String>,
    #[serde(default)]
    items: Vec<CartItem>,
}

/// Owner-scoped working set of list operations waiting to be signed.
#[derive(Debug, Default)]
pub struct Cart {
    owner: Option<String>,
    items: Vec<CartItem>,
    path: Option<PathBuf>,
}

impl Cart {
    /// A cart that is never written to disk.
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".config/followgraph/cart.json"))
    }

    /// Load the cart stored at `path`; a missing file is an empty cart.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, CartError> {
        let path = path.into();
        let file = match fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str::<CartFile>(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => CartFile::default(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            owner: file.owner,
            items: file.items,
            path: Some(path),
        })
    }

    pub fn save(&self) -> Result<(), CartError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = CartFile {
            owner: self.owner.clone(),
            items: self.items.clone(),
        };
        fs::write(path, serde_json::to_string_pretty(&file)?)?;
        Ok(())
    }

    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    /// Stage an operation; staging the same operation twice is a no-op.
    pub fn add(&mut self, item: CartItem) -> bool {
        if self.items.contains(&item) {
            return false;
        }
        self.items.push(item);
        true
    }

    pub fn remove(&mut self, item: &CartItem) -> bool {
        let before = self.items.len();
        self.items.retain(|existing| existing != item);
        self.items.len() != before
    }

    pub fn is_owned_by(&self, identity: &Identity) -> bool {
        self.owner
            .as_deref()
            .is_some_and(|owner| identity.matches(owner))
    }

    /// Drop every staged item and hand the cart to `identity`.
    pub fn reset_for(&mut self, identity: &Identity) {
        tracing::debug!(
            previous = self.owner.as_deref().unwrap_or("-"),
            next = %identity,
            dropped = self.items.len(),
            "resetting cart"
        );
        self.items.clear();
        self.owner = Some(identity.to_string());
    }

    #[cfg(test)]
    pub(crate) fn with_owner(owner: &str) -> Self {
        Self {
            owner: Some(owner.to_owned()),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDR: &str = "0x983110309620d911731ac0932219af06091b6744";

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cart = Cart::load(dir.path().join("cart.json")).unwrap();
        assert!(cart.owner().is_none());
        assert!(cart.items().is_empty());
    }

    #[test]
    fn save_then_load_keeps_owner_and_items() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/cart.json");

        let mut cart = Cart::load(&path).unwrap();
        cart.reset_for(&Identity::parse(ADDR).unwrap());
        cart.add(CartItem::new(ADDR, ListOp::Tag { tag: "irl".into() }));
        cart.save().unwrap();

        let reloaded = Cart::load(&path).unwrap();
        assert_eq!(reloaded.owner(), Some(ADDR));
        assert_eq!(
            reloaded.items(),
            &[CartItem::new(ADDR, ListOp::Tag { tag: "irl".into() })]
        );
    }

    #[test]
    fn ops_parse_from_text() {
        assert_eq!(ListOp::parse("Follow"), Some(ListOp::Follow));
        assert_eq!(ListOp::parse("Tag:IRL"), Some(ListOp::Tag { tag: "IRL".into() }));
        assert_eq!(ListOp::parse("untag:"), None);
        assert_eq!(ListOp::parse("boost"), None);
    }

    #[test]
    fn items_serialize_flat() {
        let json = serde_json::to_value(CartItem::new(ADDR, ListOp::Untag { tag: "bff".into() })).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "address": ADDR, "op": "untag", "tag": "bff" })
        );
    }

    #[test]
    fn add_is_idempotent() {
        let mut cart = Cart::in_memory();
        assert!(cart.add(CartItem::new(ADDR, ListOp::Follow)));
        assert!(!cart.add(CartItem::new(&ADDR.to_ascii_uppercase(), ListOp::Follow)));
        assert_eq!(cart.items().len(), 1);
        assert!(cart.remove(&CartItem::new(ADDR, ListOp::Follow)));
        assert!(cart.items().is_empty());
    }
}
