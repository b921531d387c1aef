//! On-chain governance: proposals, votes and delegated representatives

use std::collections::BTreeMap;

use tessera_codec::{
    codec_by_index,
    minicbor::{self, Decode, Encode},
    utils::{AnyCbor, Set},
};
use tessera_crypto::hash::Hash;

use crate::{
    AddrKeyhash, Coin, Epoch, RewardAccount, ScriptHash, StakeCredential, TransactionId,
    UnitInterval, ValidationError,
};

pub type ProtocolVersion = (u64, u64);

pub type CommitteeColdCredential = StakeCredential;

pub type CommitteeHotCredential = StakeCredential;

pub type DRepCredential = StakeCredential;

#[derive(Encode, Decode, Debug, PartialEq, PartialOrd, Eq, Ord, Clone, Hash)]
#[cfg_attr(feature = "json", derive(serde::Serialize, serde::Deserialize))]
pub struct Anchor {
    #[n(0)]
    pub url: String,
    #[n(1)]
    pub content_hash: Hash<32>,
}

#[derive(Debug, PartialEq, PartialOrd, Eq, Ord, Clone, Hash)]
#[cfg_attr(feature = "json", derive(serde::Serialize, serde::Deserialize))]
pub enum DRep {
    Key(AddrKeyhash),
    Script(ScriptHash),
    Abstain,
    NoConfidence,
}

codec_by_index! {
    DRep,
    0 => Key(hash),
    1 => Script(hash),
    2 => Abstain,
    3 => NoConfidence,
}

#[derive(Encode, Decode, Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash)]
#[cfg_attr(feature = "json", derive(serde::Serialize, serde::Deserialize))]
#[cbor(index_only)]
pub enum Vote {
    #[n(0)]
    No,
    #[n(1)]
    Yes,
    #[n(2)]
    Abstain,
}

#[derive(Debug, PartialEq, PartialOrd, Eq, Ord, Clone, Hash)]
#[cfg_attr(feature = "json", derive(serde::Serialize, serde::Deserialize))]
pub enum Voter {
    ConstitutionalCommitteeScript(ScriptHash),
    ConstitutionalCommitteeKey(AddrKeyhash),
    DRepScript(ScriptHash),
    DRepKey(AddrKeyhash),
    StakePoolKey(AddrKeyhash),
}

codec_by_index! {
    Voter,
    0 => ConstitutionalCommitteeKey(hash),
    1 => ConstitutionalCommitteeScript(hash),
    2 => DRepKey(hash),
    3 => DRepScript(hash),
    4 => StakePoolKey(hash),
}

impl Voter {
    /// Key hash that has to witness a vote cast by this voter
    pub fn key_hash(&self) -> Option<&AddrKeyhash> {
        match self {
            Voter::ConstitutionalCommitteeKey(x) | Voter::DRepKey(x) | Voter::StakePoolKey(x) => {
                Some(x)
            }
            Voter::ConstitutionalCommitteeScript(_) | Voter::DRepScript(_) => None,
        }
    }
}

/// Reference to a governance action: the proposing transaction and the
/// position of the proposal in it
#[derive(Debug, PartialEq, Eq, Clone, Copy, PartialOrd, Ord, Hash)]
pub struct GovActionId {
    pub transaction_id: TransactionId,
    pub action_index: u16,
}

impl GovActionId {
    pub fn new(transaction_id: TransactionId, action_index: u64) -> Result<Self, ValidationError> {
        let action_index = u16::try_from(action_index)
            .map_err(|_| ValidationError::GovActionIndexOutOfRange(action_index))?;

        Ok(Self {
            transaction_id,
            action_index,
        })
    }
}

impl<C> minicbor::Encode<C> for GovActionId {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.array(2)?;
        e.encode_with(self.transaction_id, ctx)?;
        e.u16(self.action_index)?;
        Ok(())
    }
}

impl<'b, C> minicbor::Decode<'b, C> for GovActionId {
    fn decode(d: &mut minicbor::Decoder<'b>, ctx: &mut C) -> Result<Self, minicbor::decode::Error> {
        let (transaction_id, index): (TransactionId, u64) = d.decode_with(ctx)?;
        let position = d.position();

        GovActionId::new(transaction_id, index)
            .map_err(|e| minicbor::decode::Error::message(e.to_string()).at(position))
    }
}

#[derive(Debug, PartialEq, Eq, Clone, PartialOrd, Ord, Hash)]
pub struct VotingProcedure {
    pub vote: Vote,
    pub anchor: Option<Anchor>,
}

impl<C> minicbor::Encode<C> for VotingProcedure {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.encode_with((&self.vote, &self.anchor), ctx)?;
        Ok(())
    }
}

impl<'b, C> minicbor::Decode<'b, C> for VotingProcedure {
    fn decode(d: &mut minicbor::Decoder<'b>, ctx: &mut C) -> Result<Self, minicbor::decode::Error> {
        let (vote, anchor) = d.decode_with(ctx)?;
        Ok(Self { vote, anchor })
    }
}

pub type VotingProcedures = BTreeMap<Voter, BTreeMap<GovActionId, VotingProcedure>>;

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Constitution {
    pub anchor: Anchor,
    pub guardrail_script: Option<ScriptHash>,
}

impl<C> minicbor::Encode<C> for Constitution {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.encode_with((&self.anchor, &self.guardrail_script), ctx)?;
        Ok(())
    }
}

impl<'b, C> minicbor::Decode<'b, C> for Constitution {
    fn decode(d: &mut minicbor::Decoder<'b>, ctx: &mut C) -> Result<Self, minicbor::decode::Error> {
        let (anchor, guardrail_script) = d.decode_with(ctx)?;
        Ok(Self {
            anchor,
            guardrail_script,
        })
    }
}

/// A governance proposal
///
/// Protocol parameter updates are carried as the opaque cbor map they were
/// built with.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum GovAction {
    ParameterChange(Option<GovActionId>, AnyCbor, Option<ScriptHash>),
    HardForkInitiation(Option<GovActionId>, ProtocolVersion),
    TreasuryWithdrawals(BTreeMap<RewardAccount, Coin>, Option<ScriptHash>),
    NoConfidence(Option<GovActionId>),
    UpdateCommittee(
        Option<GovActionId>,
        Set<CommitteeColdCredential>,
        BTreeMap<CommitteeColdCredential, Epoch>,
        UnitInterval,
    ),
    NewConstitution(Option<GovActionId>, Constitution),
    Information,
}

codec_by_index! {
    GovAction,
    0 => ParameterChange(previous, update, policy),
    1 => HardForkInitiation(previous, version),
    2 => TreasuryWithdrawals(withdrawals, policy),
    3 => NoConfidence(previous),
    4 => UpdateCommittee(previous, removed, added, threshold),
    5 => NewConstitution(previous, constitution),
    6 => Information,
}

#[derive(Encode, Decode, Debug, PartialEq, Eq, Clone)]
pub struct ProposalProcedure {
    #[n(0)]
    pub deposit: Coin,
    #[n(1)]
    pub reward_account: RewardAccount,
    #[n(2)]
    pub gov_action: GovAction,
    #[n(3)]
    pub anchor: Anchor,
}
