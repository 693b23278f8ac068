//! Approval chain configuration.
//!
//! Chains are an explicit, versioned table keyed by request type rather than
//! literals scattered across call sites. The last role of every chain is the
//! issuing stage; the roles before it are decision stages.

use serde::Serialize;
use thiserror::Error;

use crate::domain::request::RequestType;
use crate::domain::role::Role;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ChainPolicyError {
    #[error("approval chain for {request_type:?} needs a decision stage and an issuing stage")]
    ChainTooShort { request_type: RequestType },
    #[error("approval chain for {request_type:?} lists {role:?} more than once")]
    DuplicateRole { request_type: RequestType, role: Role },
    #[error("no approval chain configured for {request_type:?}")]
    MissingChain { request_type: RequestType },
}

/// One versioned chain table. Construction validates the chains, so lookups
/// never observe an empty or degenerate one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChainPolicy {
    version: u32,
    cash: Vec<Role>,
    material: Vec<Role>,
}

impl ChainPolicy {
    pub const BUILTIN_VERSION: u32 = 1;

    /// The chains the business runs on today.
    pub fn builtin() -> Self {
        Self {
            version: Self::BUILTIN_VERSION,
            cash: vec![Role::GeneralManager, Role::ManagingDirector, Role::Cashier],
            material: vec![Role::GeneralManager, Role::ManagingDirector, Role::StoreManager],
        }
    }

    /// Builds a policy from stored table rows.
    pub fn from_table(
        version: u32,
        cash: Vec<Role>,
        material: Vec<Role>,
    ) -> Result<Self, ChainPolicyError> {
        validate_chain(RequestType::Cash, &cash)?;
        validate_chain(RequestType::Material, &material)?;
        Ok(Self { version, cash, material })
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Full ordered chain, issuing stage included.
    pub fn chain(&self, request_type: RequestType) -> &[Role] {
        match request_type {
            RequestType::Cash => &self.cash,
            RequestType::Material => &self.material,
        }
    }

    /// Every stage that records a plain approve/reject decision.
    pub fn decision_stages(&self, request_type: RequestType) -> &[Role] {
        let chain = self.chain(request_type);
        &chain[..chain.len() - 1]
    }

    /// The role whose trail slot is consumed by issuance.
    pub fn issuing_role(&self, request_type: RequestType) -> Role {
        let chain = self.chain(request_type);
        chain[chain.len() - 1]
    }
}

fn validate_chain(request_type: RequestType, chain: &[Role]) -> Result<(), ChainPolicyError> {
    if chain.is_empty() {
        return Err(ChainPolicyError::MissingChain { request_type });
    }
    if chain.len() < 2 {
        return Err(ChainPolicyError::ChainTooShort { request_type });
    }
    for (index, role) in chain.iter().enumerate() {
        if chain[..index].contains(role) {
            return Err(ChainPolicyError::DuplicateRole { request_type, role: *role });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{ChainPolicy, ChainPolicyError};
    use crate::domain::request::RequestType;
    use crate::domain::role::Role;

    #[test]
    fn builtin_cash_chain_ends_at_the_cashier() {
        let policy = ChainPolicy::builtin();

        assert_eq!(
            policy.chain(RequestType::Cash),
            [Role::GeneralManager, Role::ManagingDirector, Role::Cashier]
        );
        assert_eq!(
            policy.decision_stages(RequestType::Cash),
            [Role::GeneralManager, Role::ManagingDirector]
        );
        assert_eq!(policy.issuing_role(RequestType::Cash), Role::Cashier);
    }

    #[test]
    fn builtin_material_chain_ends_at_the_store_manager() {
        let policy = ChainPolicy::builtin();

        assert_eq!(
            policy.chain(RequestType::Material),
            [Role::GeneralManager, Role::ManagingDirector, Role::StoreManager]
        );
        assert_eq!(policy.issuing_role(RequestType::Material), Role::StoreManager);
    }

    #[test]
    fn single_role_chains_are_rejected() {
        let error = ChainPolicy::from_table(
            2,
            vec![Role::GeneralManager],
            vec![Role::GeneralManager, Role::StoreManager],
        )
        .expect_err("single-role chain");

        assert_eq!(error, ChainPolicyError::ChainTooShort { request_type: RequestType::Cash });
    }

    #[test]
    fn repeated_roles_are_rejected() {
        let error = ChainPolicy::from_table(
            2,
            vec![Role::GeneralManager, Role::GeneralManager, Role::Cashier],
            vec![Role::GeneralManager, Role::StoreManager],
        )
        .expect_err("duplicate role");

        assert_eq!(
            error,
            ChainPolicyError::DuplicateRole {
                request_type: RequestType::Cash,
                role: Role::GeneralManager
            }
        );
    }

    #[test]
    fn from_table_accepts_the_builtin_shape() {
        let policy = ChainPolicy::from_table(
            1,
            vec![Role::GeneralManager, Role::ManagingDirector, Role::Cashier],
            vec![Role::GeneralManager, Role::ManagingDirector, Role::StoreManager],
        )
        .expect("builtin shape");

        assert_eq!(policy, ChainPolicy::builtin());
    }
}
