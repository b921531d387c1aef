//! Delegation, pool and governance certificates

use tessera_addresses::{StakeAddress, StakePayload};
use tessera_codec::{codec_by_index, minicbor};

use crate::{
    AddrKeyhash, Anchor, Coin, CommitteeColdCredential, CommitteeHotCredential, DRep,
    DRepCredential, Epoch, PoolKeyhash, PoolParams, ScriptHash,
};

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Hash)]
#[cfg_attr(feature = "json", derive(serde::Serialize, serde::Deserialize))]
pub enum StakeCredential {
    ScriptHash(ScriptHash),
    AddrKeyhash(AddrKeyhash),
}

codec_by_index! {
    StakeCredential,
    0 => AddrKeyhash(hash),
    1 => ScriptHash(hash),
}

impl StakeCredential {
    pub fn as_hash(&self) -> &ScriptHash {
        match self {
            StakeCredential::ScriptHash(x) | StakeCredential::AddrKeyhash(x) => x,
        }
    }

    pub fn key_hash(&self) -> Option<&AddrKeyhash> {
        match self {
            StakeCredential::AddrKeyhash(x) => Some(x),
            StakeCredential::ScriptHash(_) => None,
        }
    }

    pub fn is_script(&self) -> bool {
        matches!(self, StakeCredential::ScriptHash(_))
    }
}

impl From<&StakePayload> for StakeCredential {
    fn from(payload: &StakePayload) -> Self {
        match payload {
            StakePayload::Stake(x) => StakeCredential::AddrKeyhash(*x),
            StakePayload::Script(x) => StakeCredential::ScriptHash(*x),
        }
    }
}

impl From<&StakeAddress> for StakeCredential {
    fn from(address: &StakeAddress) -> Self {
        address.payload().into()
    }
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone)]
pub enum Certificate {
    StakeRegistration(StakeCredential),
    StakeDeregistration(StakeCredential),
    StakeDelegation(StakeCredential, PoolKeyhash),
    PoolRegistration(PoolParams),
    PoolRetirement(PoolKeyhash, Epoch),

    Reg(StakeCredential, Coin),
    UnReg(StakeCredential, Coin),
    VoteDeleg(StakeCredential, DRep),
    StakeVoteDeleg(StakeCredential, PoolKeyhash, DRep),
    StakeRegDeleg(StakeCredential, PoolKeyhash, Coin),
    VoteRegDeleg(StakeCredential, DRep, Coin),
    StakeVoteRegDeleg(StakeCredential, PoolKeyhash, DRep, Coin),

    AuthCommitteeHot(CommitteeColdCredential, CommitteeHotCredential),
    ResignCommitteeCold(CommitteeColdCredential, Option<Anchor>),
    RegDRepCert(DRepCredential, Coin, Option<Anchor>),
    UnRegDRepCert(DRepCredential, Coin),
    UpdateDRepCert(DRepCredential, Option<Anchor>),
}

impl Certificate {
    pub fn code(&self) -> u64 {
        match self {
            Certificate::StakeRegistration(..) => 0,
            Certificate::StakeDeregistration(..) => 1,
            Certificate::StakeDelegation(..) => 2,
            Certificate::PoolRegistration(..) => 3,
            Certificate::PoolRetirement(..) => 4,
            Certificate::Reg(..) => 7,
            Certificate::UnReg(..) => 8,
            Certificate::VoteDeleg(..) => 9,
            Certificate::StakeVoteDeleg(..) => 10,
            Certificate::StakeRegDeleg(..) => 11,
            Certificate::VoteRegDeleg(..) => 12,
            Certificate::StakeVoteRegDeleg(..) => 13,
            Certificate::AuthCommitteeHot(..) => 14,
            Certificate::ResignCommitteeCold(..) => 15,
            Certificate::RegDRepCert(..) => 16,
            Certificate::UnRegDRepCert(..) => 17,
            Certificate::UpdateDRepCert(..) => 18,
        }
    }

    /// Credential acted upon by this certificate, if it has one
    pub fn credential(&self) -> Option<&StakeCredential> {
        match self {
            Certificate::StakeRegistration(c)
            | Certificate::StakeDeregistration(c)
            | Certificate::StakeDelegation(c, _)
            | Certificate::Reg(c, _)
            | Certificate::UnReg(c, _)
            | Certificate::VoteDeleg(c, _)
            | Certificate::StakeVoteDeleg(c, _, _)
            | Certificate::StakeRegDeleg(c, _, _)
            | Certificate::VoteRegDeleg(c, _, _)
            | Certificate::StakeVoteRegDeleg(c, _, _, _)
            | Certificate::AuthCommitteeHot(c, _)
            | Certificate::ResignCommitteeCold(c, _)
            | Certificate::RegDRepCert(c, _, _)
            | Certificate::UnRegDRepCert(c, _)
            | Certificate::UpdateDRepCert(c, _) => Some(c),
            Certificate::PoolRegistration(_) | Certificate::PoolRetirement(..) => None,
        }
    }

    fn arity(code: u64) -> Option<u64> {
        let fields = match code {
            0 | 1 => 1,
            2 | 4 | 7 | 8 | 9 | 14 | 15 | 17 | 18 => 2,
            3 => crate::pool::PoolParams::FIELDS,
            10 | 11 | 12 | 16 => 3,
            13 => 4,
            _ => return None,
        };

        Some(fields + 1)
    }
}

impl<C> minicbor::Encode<C> for Certificate {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        let code = self.code();
        let len = Certificate::arity(code)
            .ok_or_else(|| minicbor::encode::Error::message("unknown certificate code"))?;

        e.array(len)?;
        e.u64(code)?;

        match self {
            Certificate::StakeRegistration(a) | Certificate::StakeDeregistration(a) => {
                e.encode_with(a, ctx)?;
            }
            Certificate::StakeDelegation(a, b) => {
                e.encode_with(a, ctx)?.encode_with(b, ctx)?;
            }
            Certificate::PoolRegistration(params) => {
                params.encode_fields(e, ctx)?;
            }
            Certificate::PoolRetirement(a, b) => {
                e.encode_with(a, ctx)?.encode_with(b, ctx)?;
            }
            Certificate::Reg(a, b) | Certificate::UnReg(a, b) | Certificate::UnRegDRepCert(a, b) => {
                e.encode_with(a, ctx)?.encode_with(b, ctx)?;
            }
            Certificate::VoteDeleg(a, b) => {
                e.encode_with(a, ctx)?.encode_with(b, ctx)?;
            }
            Certificate::StakeVoteDeleg(a, b, c) => {
                e.encode_with(a, ctx)?.encode_with(b, ctx)?.encode_with(c, ctx)?;
            }
            Certificate::StakeRegDeleg(a, b, c) => {
                e.encode_with(a, ctx)?.encode_with(b, ctx)?.encode_with(c, ctx)?;
            }
            Certificate::VoteRegDeleg(a, b, c) => {
                e.encode_with(a, ctx)?.encode_with(b, ctx)?.encode_with(c, ctx)?;
            }
            Certificate::StakeVoteRegDeleg(a, b, c, d) => {
                e.encode_with(a, ctx)?
                    .encode_with(b, ctx)?
                    .encode_with(c, ctx)?
                    .encode_with(d, ctx)?;
            }
            Certificate::AuthCommitteeHot(a, b) => {
                e.encode_with(a, ctx)?.encode_with(b, ctx)?;
            }
            Certificate::ResignCommitteeCold(a, b) | Certificate::UpdateDRepCert(a, b) => {
                e.encode_with(a, ctx)?.encode_with(b, ctx)?;
            }
            Certificate::RegDRepCert(a, b, c) => {
                e.encode_with(a, ctx)?.encode_with(b, ctx)?.encode_with(c, ctx)?;
            }
        }

        Ok(())
    }
}

impl<'b, C> minicbor::Decode<'b, C> for Certificate {
    fn decode(d: &mut minicbor::Decoder<'b>, ctx: &mut C) -> Result<Self, minicbor::decode::Error> {
        let position = d.position();
        let len = d.array()?.ok_or_else(|| {
            minicbor::decode::Error::message("Certificate can't be an indefinite array")
                .at(position)
        })?;
        let code = d.u64()?;

        let expected = Certificate::arity(code).ok_or_else(|| {
            minicbor::decode::Error::message(format!("unknown Certificate code {code}"))
                .at(position)
        })?;

        if len != expected {
            return Err(minicbor::decode::Error::message(format!(
                "Certificate code {code} expects {expected} elements, found {len}"
            ))
            .at(position));
        }

        let cert = match code {
            0 => Certificate::StakeRegistration(d.decode_with(ctx)?),
            1 => Certificate::StakeDeregistration(d.decode_with(ctx)?),
            2 => Certificate::StakeDelegation(d.decode_with(ctx)?, d.decode_with(ctx)?),
            3 => Certificate::PoolRegistration(PoolParams::decode_fields(d, ctx)?),
            4 => Certificate::PoolRetirement(d.decode_with(ctx)?, d.decode_with(ctx)?),
            7 => Certificate::Reg(d.decode_with(ctx)?, d.decode_with(ctx)?),
            8 => Certificate::UnReg(d.decode_with(ctx)?, d.decode_with(ctx)?),
            9 => Certificate::VoteDeleg(d.decode_with(ctx)?, d.decode_with(ctx)?),
            10 => Certificate::StakeVoteDeleg(
                d.decode_with(ctx)?,
                d.decode_with(ctx)?,
                d.decode_with(ctx)?,
            ),
            11 => Certificate::StakeRegDeleg(
                d.decode_with(ctx)?,
                d.decode_with(ctx)?,
                d.decode_with(ctx)?,
            ),
            12 => Certificate::VoteRegDeleg(
                d.decode_with(ctx)?,
                d.decode_with(ctx)?,
                d.decode_with(ctx)?,
            ),
            13 => Certificate::StakeVoteRegDeleg(
                d.decode_with(ctx)?,
                d.decode_with(ctx)?,
                d.decode_with(ctx)?,
                d.decode_with(ctx)?,
            ),
            14 => Certificate::AuthCommitteeHot(d.decode_with(ctx)?, d.decode_with(ctx)?),
            15 => Certificate::ResignCommitteeCold(d.decode_with(ctx)?, d.decode_with(ctx)?),
            16 => Certificate::RegDRepCert(
                d.decode_with(ctx)?,
                d.decode_with(ctx)?,
                d.decode_with(ctx)?,
            ),
            17 => Certificate::UnRegDRepCert(d.decode_with(ctx)?, d.decode_with(ctx)?),
            _ => Certificate::UpdateDRepCert(d.decode_with(ctx)?, d.decode_with(ctx)?),
        };

        Ok(cert)
    }
}
