//! # Mode Key Hierarchy
//!
//! One root key per registry, one hardened child per [`GatewayMode`]:
//!
//! ```text
//! master ── m/12381'/8444'/12' ──> root ──┬── /1' tokenization
//!                                         ├── /2' detokenization
//!                                         └── /3' permissionless retirement
//! ```
//!
//! The root key never signs spends directly. At wallet construction it signs
//! one **delegation** per mode: the hash of the token index and the mode's
//! delegated script. The gateway spend demands that exact pair, so a
//! delegation authorizes one delegated script for one token and nothing
//! else. The retirement delegated script carries no key, which makes its
//! delegation alone sufficient to burn.

use chia::clvm_utils::tree_hash_atom;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::token::{GatewayMode, ModeMetadata, TokenIndex};
use crate::chain::{tree_hash, tree_hash_list, Bytes32, ClvmError, Program};
use crate::config::CLIMATE_ROOT_PATH;
use crate::crypto::{PublicKey, SecretKey, Signature};
use crate::scripts::{ScriptError, ScriptProvider};

/// Climate root key of a wallet master key.
pub fn master_to_root(master_key: &SecretKey) -> SecretKey {
    master_key.derive_path(&CLIMATE_ROOT_PATH)
}

/// Mode key below the root key.
pub fn root_to_mode(root_key: &SecretKey, mode: GatewayMode) -> SecretKey {
    root_key.derive_hardened(u32::from(mode.to_int()))
}

/// Message the root key signs to delegate `delegated_script` for one token:
/// the tree hash of `(index_hash delegated_script)`.
pub fn delegation_message(
    index_hash: &Bytes32,
    delegated_script: &Program,
) -> Result<Bytes32, ClvmError> {
    let delegated_hash = tree_hash(delegated_script)?;
    Ok(tree_hash_list(&[tree_hash_atom(index_hash.as_ref()), delegated_hash.into()]).into())
}

// ---------------------------------------------------------------------------
// Delegation
// ---------------------------------------------------------------------------

/// A root-signed delegation for one mode.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delegation {
    pub mode: GatewayMode,
    /// Mode public key bound into the delegated script, if any.
    pub public_key: Option<PublicKey>,
    pub message: Bytes32,
    pub signature: Signature,
}

impl Delegation {
    pub fn verify(&self, root_public_key: &PublicKey) -> bool {
        root_public_key.verify(self.message.as_ref(), &self.signature)
    }

    /// Public form handed to clients.
    pub fn to_metadata(&self, include_signature: bool) -> ModeMetadata {
        ModeMetadata {
            mod_hash: self.message,
            public_key: self.public_key.clone(),
            signature: include_signature.then(|| self.signature.clone()),
        }
    }

    /// Rebuild from published metadata. `None` when no signature was
    /// published for the mode.
    pub fn from_metadata(mode: GatewayMode, metadata: &ModeMetadata) -> Option<Self> {
        Some(Self {
            mode,
            public_key: metadata.public_key.clone(),
            message: metadata.mod_hash,
            signature: metadata.signature.clone()?,
        })
    }
}

/// Registry-side material: the mode secret key and its delegation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModeKeyMaterial {
    pub secret_key: SecretKey,
    pub delegation: Delegation,
}

impl ModeKeyMaterial {
    pub fn public_key(&self) -> PublicKey {
        self.secret_key.public_key()
    }
}

// ---------------------------------------------------------------------------
// ModeKeys
// ---------------------------------------------------------------------------

/// One value per [`GatewayMode`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModeKeys<T> {
    pub tokenization: T,
    pub detokenization: T,
    pub permissionless_retirement: T,
}

impl<T> ModeKeys<T> {
    pub fn from_fn(mut f: impl FnMut(GatewayMode) -> T) -> Self {
        Self {
            tokenization: f(GatewayMode::Tokenization),
            detokenization: f(GatewayMode::Detokenization),
            permissionless_retirement: f(GatewayMode::PermissionlessRetirement),
        }
    }

    pub fn try_from_fn<E>(mut f: impl FnMut(GatewayMode) -> Result<T, E>) -> Result<Self, E> {
        Ok(Self {
            tokenization: f(GatewayMode::Tokenization)?,
            detokenization: f(GatewayMode::Detokenization)?,
            permissionless_retirement: f(GatewayMode::PermissionlessRetirement)?,
        })
    }

    pub fn get(&self, mode: GatewayMode) -> &T {
        match mode {
            GatewayMode::Tokenization => &self.tokenization,
            GatewayMode::Detokenization => &self.detokenization,
            GatewayMode::PermissionlessRetirement => &self.permissionless_retirement,
        }
    }

    /// In [`GatewayMode::ALL`] order.
    pub fn iter(&self) -> impl Iterator<Item = (GatewayMode, &T)> {
        GatewayMode::ALL.into_iter().map(move |mode| (mode, self.get(mode)))
    }
}

/// Keys a wallet holds. A client never holds mode secret keys.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WalletKeys {
    Registry(ModeKeys<ModeKeyMaterial>),
    Client(ModeKeys<Option<Delegation>>),
}

impl WalletKeys {
    pub fn is_registry(&self) -> bool {
        matches!(self, Self::Registry(_))
    }

    pub fn delegation(&self, mode: GatewayMode) -> Option<&Delegation> {
        match self {
            Self::Registry(keys) => Some(&keys.get(mode).delegation),
            Self::Client(delegations) => delegations.get(mode).as_ref(),
        }
    }

    pub fn secret_key(&self, mode: GatewayMode) -> Option<&SecretKey> {
        match self {
            Self::Registry(keys) => Some(&keys.get(mode).secret_key),
            Self::Client(_) => None,
        }
    }

    /// Mode public key, from the secret key or the delegation.
    pub fn public_key(&self, mode: GatewayMode) -> Option<PublicKey> {
        match self {
            Self::Registry(keys) => Some(keys.get(mode).public_key()),
            Self::Client(delegations) => delegations.get(mode).as_ref()?.public_key.clone(),
        }
    }

    pub fn delegations(&self) -> impl Iterator<Item = &Delegation> {
        GatewayMode::ALL
            .into_iter()
            .filter_map(move |mode| self.delegation(mode))
    }
}

/// Derive every mode key of a token and have the root key sign each
/// mode's delegation. Deterministic.
pub fn derive_mode_keys(
    root_key: &SecretKey,
    token_index: &TokenIndex,
    scripts: &dyn ScriptProvider,
) -> Result<ModeKeys<ModeKeyMaterial>, ScriptError> {
    let index_hash = token_index.index_hash();
    let gateway_hash = tree_hash(&scripts.gateway_script()?)?;

    ModeKeys::try_from_fn(|mode| {
        let secret_key = root_to_mode(root_key, mode);
        let public_key = secret_key.public_key();
        let delegated_script = scripts.delegated_script(mode, &gateway_hash, Some(&public_key))?;
        let message = delegation_message(&index_hash, &delegated_script)?;
        let signature = root_key.sign(message.as_ref());

        info!(
            %mode,
            public_key = %public_key,
            delegated_script_hash = %tree_hash(&delegated_script)?,
            %message,
            signature = %signature.to_hex(),
            "signed delegated script"
        );

        // The retirement script is keyless, so the published delegation
        // carries no key either.
        let bound_key = (mode != GatewayMode::PermissionlessRetirement).then_some(public_key);
        Ok(ModeKeyMaterial {
            secret_key,
            delegation: Delegation {
                mode,
                public_key: bound_key,
                message,
                signature,
            },
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripts::reference::ReferenceScripts;

    fn root() -> SecretKey {
        SecretKey::from_seed(&[21; 32])
    }

    fn index() -> TokenIndex {
        TokenIndex::new("org", "project", 2022, 3)
    }

    #[test]
    fn derivation_is_deterministic() {
        let scripts = ReferenceScripts::new();
        assert_eq!(
            derive_mode_keys(&root(), &index(), &scripts).unwrap(),
            derive_mode_keys(&root(), &index(), &scripts).unwrap()
        );
    }

    #[test]
    fn mode_keys_are_distinct_and_differ_from_root() {
        let keys = derive_mode_keys(&root(), &index(), &ReferenceScripts::new()).unwrap();
        let publics: Vec<PublicKey> = keys.iter().map(|(_, material)| material.public_key()).collect();
        assert_ne!(publics[0], publics[1]);
        assert_ne!(publics[1], publics[2]);
        assert_ne!(publics[0], publics[2]);
        assert!(!publics.contains(&root().public_key()));
    }

    #[test]
    fn delegations_verify_under_the_root_key() {
        let keys = derive_mode_keys(&root(), &index(), &ReferenceScripts::new()).unwrap();
        for (mode, material) in keys.iter() {
            assert_eq!(material.delegation.mode, mode);
            assert!(material.delegation.verify(&root().public_key()));
            assert!(!material.delegation.verify(&material.public_key()));
        }
    }

    #[test]
    fn delegation_message_binds_the_token() {
        let scripts = ReferenceScripts::new();
        let a = derive_mode_keys(&root(), &index(), &scripts).unwrap();
        let other = TokenIndex::new("org", "project", 2022, 4);
        let b = derive_mode_keys(&root(), &other, &scripts).unwrap();
        assert_ne!(a.tokenization.delegation.message, b.tokenization.delegation.message);
        // Same root, same mode: the key is shared across tokens.
        assert_eq!(a.tokenization.public_key(), b.tokenization.public_key());
    }

    #[test]
    fn retirement_delegation_is_keyless() {
        let keys = derive_mode_keys(&root(), &index(), &ReferenceScripts::new()).unwrap();
        assert!(keys.permissionless_retirement.delegation.public_key.is_none());
        assert!(keys.detokenization.delegation.public_key.is_some());
    }

    #[test]
    fn metadata_roundtrips_a_delegation() {
        let keys = derive_mode_keys(&root(), &index(), &ReferenceScripts::new()).unwrap();
        let delegation = &keys.detokenization.delegation;
        let metadata = delegation.to_metadata(true);
        assert_eq!(
            Delegation::from_metadata(GatewayMode::Detokenization, &metadata).as_ref(),
            Some(delegation)
        );
        let unsigned = delegation.to_metadata(false);
        assert!(Delegation::from_metadata(GatewayMode::Detokenization, &unsigned).is_none());
    }

    #[test]
    fn client_keys_expose_no_secrets() {
        let registry = derive_mode_keys(&root(), &index(), &ReferenceScripts::new()).unwrap();
        let client = WalletKeys::Client(ModeKeys::from_fn(|mode| Some(registry.get(mode).delegation.clone())));
        assert!(!client.is_registry());
        assert!(client.secret_key(GatewayMode::Tokenization).is_none());
        assert_eq!(
            client.public_key(GatewayMode::Detokenization),
            Some(registry.detokenization.public_key())
        );
        assert_eq!(client.delegations().count(), 3);
    }

    #[test]
    fn master_to_root_follows_the_climate_path() {
        let master = SecretKey::from_seed(&[5; 32]);
        let expected = master
            .derive_hardened(12381)
            .derive_hardened(8444)
            .derive_hardened(12);
        assert_eq!(master_to_root(&master), expected);
    }
}
