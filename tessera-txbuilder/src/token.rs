use std::collections::BTreeSet;

use serde_json::Value as Json;
use tessera_primitives::{
    AddrKeyhash, AssetName, Metadatum, MetadatumLabel, MultiAsset, NativeScript, PolicyId, Slot,
    ValidationError,
};

use crate::TxBuilderError;

/// Metadata label reserved for token metadata (CIP-25)
pub const TOKEN_METADATA_LABEL: MetadatumLabel = 721;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Policy {
    /// The script is known and can witness the mint
    Script(NativeScript),

    /// Only the id is known, the script is provided elsewhere
    Id(PolicyId),
}

/// A named minting policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPolicy {
    pub name: String,
    pub policy: Policy,
}

impl TokenPolicy {
    pub fn new(name: impl Into<String>, script: NativeScript) -> Self {
        Self {
            name: name.into(),
            policy: Policy::Script(script),
        }
    }

    pub fn from_id(name: impl Into<String>, id: PolicyId) -> Self {
        Self {
            name: name.into(),
            policy: Policy::Id(id),
        }
    }

    /// Policy requiring every signer, optionally closed after `expiration`
    pub fn generate(
        name: impl Into<String>,
        signers: &[AddrKeyhash],
        expiration: Option<Slot>,
    ) -> Self {
        let mut scripts: Vec<_> = signers
            .iter()
            .map(|x| NativeScript::ScriptPubkey(*x))
            .collect();

        if let Some(slot) = expiration {
            scripts.push(NativeScript::InvalidHereafter(slot));
        }

        Self::new(name, NativeScript::ScriptAll(scripts))
    }

    pub fn policy_id(&self) -> Result<PolicyId, tessera_codec::Error> {
        match &self.policy {
            Policy::Script(x) => x.hash(),
            Policy::Id(x) => Ok(*x),
        }
    }

    pub fn script(&self) -> Option<&NativeScript> {
        match &self.policy {
            Policy::Script(x) => Some(x),
            Policy::Id(_) => None,
        }
    }

    /// Slot after which a policy shaped like [`TokenPolicy::generate`] can't
    /// mint anymore
    pub fn expiration_slot(&self) -> Option<Slot> {
        match self.script()? {
            NativeScript::ScriptAll(scripts) => scripts.iter().find_map(|x| match x {
                NativeScript::InvalidHereafter(slot) => Some(*slot),
                _ => None,
            }),
            _ => None,
        }
    }

    pub fn is_expired(&self, last_slot: Slot) -> bool {
        self.expiration_slot()
            .map(|slot| slot < last_slot)
            .unwrap_or(false)
    }

    pub fn required_signers(&self) -> BTreeSet<AddrKeyhash> {
        self.script().map(|x| x.key_hashes()).unwrap_or_default()
    }

    /// Dictionary form of the script, as stored in policy files
    pub fn to_json(&self) -> Option<Json> {
        self.script().map(NativeScript::to_json)
    }

    pub fn from_json(name: impl Into<String>, value: &Json) -> Result<Self, ValidationError> {
        Ok(Self::new(name, NativeScript::from_json(value)?))
    }
}

/// A quantity of one asset to mint, or burn when negative
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub policy: TokenPolicy,
    pub name: AssetName,
    pub amount: i64,
    pub metadata: Option<Metadatum>,
}

impl Token {
    pub fn new(policy: TokenPolicy, name: &str, amount: i64) -> Result<Self, ValidationError> {
        Ok(Self {
            policy,
            name: AssetName::try_from(name)?,
            amount,
            metadata: None,
        })
    }

    /// Attaches the token's metadata, checking every field fits on chain
    pub fn with_metadata(mut self, metadata: &Json) -> Result<Self, TxBuilderError> {
        self.metadata = Some(Metadatum::from_json(metadata)?);
        Ok(self)
    }
}

/// Mint entries of a batch of tokens
pub fn tokens_to_mint(tokens: &[Token]) -> Result<MultiAsset, tessera_codec::Error> {
    let mut mint = MultiAsset::new();

    for token in tokens {
        mint.add_asset(token.policy.policy_id()?, token.name.clone(), token.amount);
    }

    Ok(mint)
}

/// Token metadata entry `{policy_id: {asset_name: metadata}}` for the tokens
/// carrying metadata, if any
pub fn tokens_metadata(
    tokens: &[Token],
) -> Result<Option<(MetadatumLabel, Metadatum)>, TxBuilderError> {
    let mut policies: Vec<(String, Vec<(String, Metadatum)>)> = vec![];

    for token in tokens {
        let Some(metadata) = &token.metadata else {
            continue;
        };

        let policy = token.policy.policy_id()?.to_string();
        let asset = String::from_utf8_lossy(token.name.as_slice()).into_owned();

        match policies.iter_mut().find(|(p, _)| *p == policy) {
            Some((_, assets)) => assets.push((asset, metadata.clone())),
            None => policies.push((policy, vec![(asset, metadata.clone())])),
        }
    }

    if policies.is_empty() {
        return Ok(None);
    }

    let entries = policies
        .into_iter()
        .map(|(policy, assets)| Ok((policy, Metadatum::text_map(assets)?)))
        .collect::<Result<Vec<_>, TxBuilderError>>()?;

    Ok(Some((TOKEN_METADATA_LABEL, Metadatum::text_map(entries)?)))
}
