//! Viewer identity, the identity source, and the coordinator that keeps the
//! owner-scoped working set in step with identity changes.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::api::ApiClientError;
use crate::cart::Cart;

/// An address (`0x` + 40 hex digits) or an ENS-style name.
///
/// Stored lowercased so that two spellings of the same address share cache
/// keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity(String);

impl Identity {
    pub fn parse(input: &str) -> Result<Self, ApiClientError> {
        let trimmed = input.trim();

        if let Some(digits) = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
        {
            if digits.len() == 40 && hex::decode(digits).is_ok() {
                return Ok(Self(format!("0x{}", digits.to_ascii_lowercase())));
            }
            return Err(ApiClientError::InvalidIdentity(trimmed.to_owned()));
        }

        let looks_like_name = trimmed.contains('.')
            && !trimmed.starts_with('.')
            && !trimmed.ends_with('.')
            && trimmed
                .chars()
                .all(|c| !c.is_whitespace() && c != '/' && c != '?' && c != '#');
        if looks_like_name {
            return Ok(Self(trimmed.to_lowercase()));
        }

        Err(ApiClientError::InvalidIdentity(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_address(&self) -> bool {
        self.0.starts_with("0x")
    }

    /// Case-insensitive comparison against an externally stored value.
    pub fn matches(&self, other: &str) -> bool {
        self.0.eq_ignore_ascii_case(other.trim())
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Identity {
    type Error = ApiClientError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Identity::parse(&value)
    }
}

impl From<Identity> for String {
    fn from(value: Identity) -> Self {
        value.0
    }
}

// ---------------------------------------------------------------------------
// Identity source
// ---------------------------------------------------------------------------

/// Publishes the connected viewer identity. Subscribers are only woken when
/// the value actually changes.
#[derive(Debug)]
pub struct IdentitySource {
    sender: watch::Sender<Option<Identity>>,
}

impl IdentitySource {
    pub fn new(initial: Option<Identity>) -> Self {
        let (sender, _) = watch::channel(initial);
        Self { sender }
    }

    pub fn connect(&self, identity: Identity) {
        self.publish(Some(identity));
    }

    pub fn disconnect(&self) {
        self.publish(None);
    }

    pub fn current(&self) -> Option<Identity> {
        self.sender.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
        self.sender.subscribe()
    }

    fn publish(&self, next: Option<Identity>) {
        self.sender.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityTransition {
    Unchanged,
    Changed { cart_cleared: bool },
}

/// Runs once per genuine identity change and resets the working set when it
/// belongs to somebody else.
#[derive(Debug, Default)]
pub struct IdentityCoordinator {
    last_seen: Option<Identity>,
}

impl IdentityCoordinator {
    pub fn new(initial: Option<&Identity>) -> Self {
        Self {
            last_seen: initial.cloned(),
        }
    }

    pub fn observe(&mut self, next: Option<&Identity>, cart: &mut Cart) -> IdentityTransition {
        if self.last_seen.as_ref() == next {
            return IdentityTransition::Unchanged;
        }
        self.last_seen = next.cloned();

        let Some(next) = next else {
            return IdentityTransition::Changed {
                cart_cleared: false,
            };
        };

        if cart.is_owned_by(next) {
            return IdentityTransition::Changed {
                cart_cleared: false,
            };
        }

        cart.reset_for(next);
        IdentityTransition::Changed { cart_cleared: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::{CartItem, ListOp};

    const A: &str = "0x983110309620D911731Ac0932219af06091b6744";
    const B: &str = "0x225f137127d9067788314bc7fcc1f36746a3c3B5";

    fn cart_owned_by(owner: &str) -> Cart {
        let mut cart = Cart::in_memory();
        cart.reset_for(&Identity::parse(owner).unwrap());
        cart.add(CartItem::new(B, ListOp::Follow));
        cart
    }

    #[test]
    fn parse_lowercases_addresses() {
        let id = Identity::parse(A).unwrap();
        assert_eq!(id.as_str(), A.to_ascii_lowercase());
        assert!(id.is_address());
        assert_eq!(id, Identity::parse(&A.to_ascii_lowercase()).unwrap());
    }

    #[test]
    fn parse_accepts_names() {
        let id = Identity::parse(" Vitalik.eth ").unwrap();
        assert_eq!(id.as_str(), "vitalik.eth");
        assert!(!id.is_address());
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(Identity::parse("0x1234").is_err());
        assert!(Identity::parse("0xzz3110309620d911731ac0932219af06091b6744").is_err());
        assert!(Identity::parse("alice").is_err());
        assert!(Identity::parse("").is_err());
    }

    #[test]
    fn change_to_other_identity_clears_cart() {
        let a = Identity::parse(A).unwrap();
        let b = Identity::parse(B).unwrap();
        let mut cart = cart_owned_by(A);
        let mut coordinator = IdentityCoordinator::new(Some(&a));

        let transition = coordinator.observe(Some(&b), &mut cart);

        assert_eq!(transition, IdentityTransition::Changed { cart_cleared: true });
        assert!(cart.items().is_empty());
        assert!(cart.is_owned_by(&b));
    }

    #[test]
    fn same_identity_is_a_no_op() {
        let a = Identity::parse(A).unwrap();
        let mut cart = cart_owned_by(A);
        let mut coordinator = IdentityCoordinator::new(Some(&a));

        assert_eq!(
            coordinator.observe(Some(&a), &mut cart),
            IdentityTransition::Unchanged
        );
        assert_eq!(cart.items().len(), 1);
    }

    #[test]
    fn owner_comparison_ignores_case() {
        let mut cart = Cart::with_owner(&A.to_ascii_uppercase().replacen("0X", "0x", 1));
        cart.add(CartItem::new(B, ListOp::Follow));
        let mut coordinator = IdentityCoordinator::default();

        let transition = coordinator.observe(Some(&Identity::parse(A).unwrap()), &mut cart);

        assert_eq!(transition, IdentityTransition::Changed { cart_cleared: false });
        assert_eq!(cart.items().len(), 1);
    }

    #[test]
    fn disconnect_keeps_cart_and_reconnect_does_not_clear() {
        let a = Identity::parse(A).unwrap();
        let mut cart = cart_owned_by(A);
        let mut coordinator = IdentityCoordinator::new(Some(&a));

        assert_eq!(
            coordinator.observe(None, &mut cart),
            IdentityTransition::Changed { cart_cleared: false }
        );
        assert_eq!(
            coordinator.observe(Some(&a), &mut cart),
            IdentityTransition::Changed { cart_cleared: false }
        );
        assert_eq!(cart.items().len(), 1);
    }

    #[test]
    fn identity_source_only_notifies_on_change() {
        let source = IdentitySource::new(None);
        let mut rx = source.subscribe();

        source.disconnect();
        assert!(!rx.has_changed().unwrap());

        source.connect(Identity::parse(A).unwrap());
        assert!(rx.has_changed().unwrap());
        let seen = rx.borrow_and_update().clone();
        assert_eq!(seen, Some(Identity::parse(A).unwrap()));

        source.connect(Identity::parse(A).unwrap());
        assert!(!rx.has_changed().unwrap());
    }
}
