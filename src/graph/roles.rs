//! Permissions of the viewer over the active profile's primary list.

use std::sync::Arc;

use crate::api::types::{ListDetails, RoleTuple};
use crate::api::{ApiClientError, GraphService};
use crate::event::ApiResult;
use crate::graph::identity::Identity;

/// What the resolver needs to do for a given identity/profile pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleLookup {
    /// No identity or no primary list: the viewer owns everything.
    Default(RoleTuple),
    Lookup { list: String, identity: Identity },
}

#[derive(Debug, Clone)]
pub struct RoleResolver {
    default_chain_id: u64,
    default_contract: String,
    chains: Vec<u64>,
}

impl RoleResolver {
    pub fn new(default_chain_id: u64, default_contract: impl Into<String>, chains: Vec<u64>) -> Self {
        Self {
            default_chain_id,
            default_contract: default_contract.into(),
            chains,
        }
    }

    pub fn full_owner(&self) -> RoleTuple {
        RoleTuple {
            is_owner: true,
            is_manager: true,
            is_user: true,
            list_chain_id: self.default_chain_id,
            list_records_contract: self.default_contract.clone(),
            list_slot: "0".to_owned(),
        }
    }

    pub fn plan(&self, identity: Option<&Identity>, primary_list: Option<&str>) -> RoleLookup {
        match (identity, primary_list) {
            (Some(identity), Some(list)) => RoleLookup::Lookup {
                list: list.to_owned(),
                identity: identity.clone(),
            },
            _ => RoleLookup::Default(self.full_owner()),
        }
    }

    /// Ask the backend. Failures are returned as-is, never replaced by the
    /// default tuple.
    pub async fn lookup(
        &self,
        service: Arc<dyn GraphService>,
        list: &str,
        identity: &Identity,
    ) -> ApiResult<RoleTuple> {
        service
            .fetch_roles(list, &self.chains, identity)
            .await
            .map_err(Arc::new)
    }
}

/// Derive the role tuple from a list's reported storage location and role
/// holders.
pub fn roles_from_details(
    details: &ListDetails,
    chains: &[u64],
    identity: &Identity,
) -> Result<RoleTuple, ApiClientError> {
    let location = &details.list_storage_location;
    if !chains.contains(&location.chain_id) {
        return Err(ApiClientError::UnsupportedChain {
            chain_id: location.chain_id,
        });
    }

    let holds = |holder: &Option<String>| holder.as_deref().is_some_and(|h| identity.matches(h));

    Ok(RoleTuple {
        is_owner: holds(&details.owner),
        is_manager: holds(&details.manager),
        is_user: holds(&details.user),
        list_chain_id: location.chain_id,
        list_records_contract: location.contract_address.clone(),
        list_slot: location.slot.clone(),
    })
}
