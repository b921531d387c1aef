//! Transactions, their bodies, outputs and witnesses

use std::collections::BTreeMap;

use tessera_codec::{
    layout::{ArrayLayout, Field, MapLayout},
    minicbor::{self, data::Type, Decode, Encode},
    utils::{AnyCbor, Bytes, Set},
};
use tessera_crypto::{
    hash::{Hash, Hasher},
    key::ed25519::{PublicKey, Signature},
};

use crate::{
    script::{decode_script_ref, encode_script_ref},
    Address, AddrKeyhash, AuxiliaryData, Certificate, Coin, DatumHash, DatumOption, MultiAsset,
    NativeScript, NetworkId, PlutusScript, ProposalProcedure, RewardAccount, Script, Slot,
    ToHash, TransactionId, Value, VotingProcedures,
};

#[derive(Encode, Decode, Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Hash)]
pub struct TransactionInput {
    #[n(0)]
    pub transaction_id: TransactionId,

    #[n(1)]
    pub index: u64,
}

impl TransactionInput {
    pub fn new(transaction_id: TransactionId, index: u64) -> Self {
        Self {
            transaction_id,
            index,
        }
    }
}

/// Wire form an output was decoded from, or should be encoded with
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum OutputFormat {
    /// `[address, amount, ? datum_hash]`
    #[default]
    Legacy,
    /// `{0: address, 1: amount, ? 2: datum_option, ? 3: script_ref}`
    PostAlonzo,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransactionOutput {
    pub address: Address,
    pub amount: Value,
    pub datum: Option<DatumOption>,
    pub script_ref: Option<Script>,
    pub format: OutputFormat,
}

const LEGACY_OUTPUT: ArrayLayout = ArrayLayout::new(
    "legacy transaction output",
    &[
        Field::required(0, "address"),
        Field::required(1, "amount"),
        Field::optional(2, "datum_hash"),
    ],
);

const POST_ALONZO_OUTPUT: MapLayout = MapLayout::new(
    "transaction output",
    &[
        Field::required(0, "address"),
        Field::required(1, "amount"),
        Field::optional(2, "datum_option"),
        Field::optional(3, "script_ref"),
    ],
);

impl TransactionOutput {
    pub fn new(address: Address, amount: impl Into<Value>) -> Self {
        Self {
            address,
            amount: amount.into(),
            datum: None,
            script_ref: None,
            format: OutputFormat::Legacy,
        }
    }

    pub fn with_datum(mut self, datum: DatumOption) -> Self {
        self.datum = Some(datum);
        self
    }

    pub fn with_script_ref(mut self, script: Script) -> Self {
        self.script_ref = Some(script);
        self
    }

    /// Same output, forced into the map form
    pub fn post_alonzo(mut self) -> Self {
        self.format = OutputFormat::PostAlonzo;
        self
    }

    pub fn lovelace(&self) -> Coin {
        self.amount.coin
    }

    pub fn datum_hash(&self) -> Option<DatumHash> {
        self.datum.as_ref().map(DatumOption::hash)
    }

    /// True when the legacy array can carry every field of this output
    pub fn encodes_as_legacy(&self) -> bool {
        self.format == OutputFormat::Legacy
            && self.script_ref.is_none()
            && !matches!(self.datum, Some(DatumOption::Data(_)))
    }
}

impl<C> minicbor::Encode<C> for TransactionOutput {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if self.encodes_as_legacy() {
            let datum_hash = match &self.datum {
                Some(DatumOption::Hash(x)) => Some(x),
                _ => None,
            };

            e.array(LEGACY_OUTPUT.encoded_len(&[true, true, datum_hash.is_some()]))?;
            e.encode_with(&self.address, ctx)?;
            e.encode_with(&self.amount, ctx)?;

            if let Some(x) = datum_hash {
                e.encode_with(x, ctx)?;
            }

            return Ok(());
        }

        let len = 2 + self.datum.is_some() as u64 + self.script_ref.is_some() as u64;
        e.map(len)?;
        e.u8(0)?.encode_with(&self.address, ctx)?;
        e.u8(1)?.encode_with(&self.amount, ctx)?;

        if let Some(datum) = &self.datum {
            e.u8(2)?.encode_with(datum, ctx)?;
        }

        if let Some(script) = &self.script_ref {
            e.u8(3)?;
            encode_script_ref(script, e, ctx)?;
        }

        Ok(())
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TransactionOutput {
    fn decode(d: &mut minicbor::Decoder<'b>, ctx: &mut C) -> Result<Self, minicbor::decode::Error> {
        match d.datatype()? {
            Type::Array | Type::ArrayIndef => {
                let len = LEGACY_OUTPUT.decode_header(d)?;
                let address = d.decode_with(ctx)?;
                let amount = d.decode_with(ctx)?;
                let datum = match len {
                    3 => Some(DatumOption::Hash(d.decode_with(ctx)?)),
                    _ => None,
                };

                Ok(TransactionOutput {
                    address,
                    amount,
                    datum,
                    script_ref: None,
                    format: OutputFormat::Legacy,
                })
            }
            Type::Map | Type::MapIndef => {
                let mut address = None;
                let mut amount = None;
                let mut datum = None;
                let mut script_ref = None;

                POST_ALONZO_OUTPUT.decode_entries(d, |field, d| {
                    match field.key {
                        0 => address = Some(d.decode_with(ctx)?),
                        1 => amount = Some(d.decode_with(ctx)?),
                        2 => datum = Some(d.decode_with(ctx)?),
                        _ => script_ref = Some(decode_script_ref(d, ctx)?),
                    }
                    Ok(())
                })?;

                Ok(TransactionOutput {
                    address: address.ok_or_else(|| missing("address"))?,
                    amount: amount.ok_or_else(|| missing("amount"))?,
                    datum,
                    script_ref,
                    format: OutputFormat::PostAlonzo,
                })
            }
            other => Err(minicbor::decode::Error::message(format!(
                "unexpected cbor type {other} for TransactionOutput"
            ))),
        }
    }
}

fn missing(name: &str) -> minicbor::decode::Error {
    minicbor::decode::Error::message(format!("missing required field {name}"))
}

pub type Withdrawals = BTreeMap<RewardAccount, Coin>;

pub type Mint = MultiAsset;

pub type AuxiliaryDataHash = Hash<32>;

pub type ScriptDataHash = Hash<32>;

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct TransactionBody {
    pub inputs: Set<TransactionInput>,
    pub outputs: Vec<TransactionOutput>,
    pub fee: Coin,
    pub ttl: Option<Slot>,
    pub certificates: Option<Set<Certificate>>,
    pub withdrawals: Option<Withdrawals>,
    pub auxiliary_data_hash: Option<AuxiliaryDataHash>,
    pub validity_interval_start: Option<Slot>,
    pub mint: Option<Mint>,
    pub script_data_hash: Option<ScriptDataHash>,
    pub collateral: Option<Set<TransactionInput>>,
    pub required_signers: Option<Set<AddrKeyhash>>,
    pub network_id: Option<NetworkId>,
    pub collateral_return: Option<TransactionOutput>,
    pub total_collateral: Option<Coin>,
    pub reference_inputs: Option<Set<TransactionInput>>,
    pub voting_procedures: Option<VotingProcedures>,
    pub proposal_procedures: Option<Set<ProposalProcedure>>,
    pub treasury_value: Option<Coin>,
    pub donation: Option<Coin>,
}

const TRANSACTION_BODY: MapLayout = MapLayout::new(
    "transaction body",
    &[
        Field::required(0, "inputs"),
        Field::required(1, "outputs"),
        Field::required(2, "fee"),
        Field::optional(3, "ttl"),
        Field::optional(4, "certificates"),
        Field::optional(5, "withdrawals"),
        Field::optional(7, "auxiliary_data_hash"),
        Field::optional(8, "validity_interval_start"),
        Field::optional(9, "mint"),
        Field::optional(11, "script_data_hash"),
        Field::optional(13, "collateral"),
        Field::optional(14, "required_signers"),
        Field::optional(15, "network_id"),
        Field::optional(16, "collateral_return"),
        Field::optional(17, "total_collateral"),
        Field::optional(18, "reference_inputs"),
        Field::optional(19, "voting_procedures"),
        Field::optional(20, "proposal_procedures"),
        Field::optional(21, "treasury_value"),
        Field::optional(22, "donation"),
    ],
);

impl TransactionBody {
    pub fn new(inputs: Vec<TransactionInput>, outputs: Vec<TransactionOutput>, fee: Coin) -> Self {
        Self {
            inputs: Set::new(inputs),
            outputs,
            fee,
            ttl: None,
            certificates: None,
            withdrawals: None,
            auxiliary_data_hash: None,
            validity_interval_start: None,
            mint: None,
            script_data_hash: None,
            collateral: None,
            required_signers: None,
            network_id: None,
            collateral_return: None,
            total_collateral: None,
            reference_inputs: None,
            voting_procedures: None,
            proposal_procedures: None,
            treasury_value: None,
            donation: None,
        }
    }

    /// The transaction id
    pub fn hash(&self) -> Result<TransactionId, tessera_codec::Error> {
        Hasher::<256>::hash_cbor(self)
    }
}

impl ToHash<32> for TransactionBody {
    fn to_hash(&self) -> Result<TransactionId, tessera_codec::Error> {
        self.hash()
    }
}

impl<C> minicbor::Encode<C> for TransactionBody {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        let optional = [
            self.ttl.is_some(),
            self.certificates.is_some(),
            self.withdrawals.is_some(),
            self.auxiliary_data_hash.is_some(),
            self.validity_interval_start.is_some(),
            self.mint.is_some(),
            self.script_data_hash.is_some(),
            self.collateral.is_some(),
            self.required_signers.is_some(),
            self.network_id.is_some(),
            self.collateral_return.is_some(),
            self.total_collateral.is_some(),
            self.reference_inputs.is_some(),
            self.voting_procedures.is_some(),
            self.proposal_procedures.is_some(),
            self.treasury_value.is_some(),
            self.donation.is_some(),
        ];

        let len = 3 + optional.iter().filter(|x| **x).count() as u64;
        e.map(len)?;

        e.u8(0)?.encode_with(&self.inputs, ctx)?;
        e.u8(1)?.encode_with(&self.outputs, ctx)?;
        e.u8(2)?.u64(self.fee)?;

        if let Some(x) = &self.ttl {
            e.u8(3)?.encode_with(x, ctx)?;
        }
        if let Some(x) = &self.certificates {
            e.u8(4)?.encode_with(x, ctx)?;
        }
        if let Some(x) = &self.withdrawals {
            e.u8(5)?.encode_with(x, ctx)?;
        }
        if let Some(x) = &self.auxiliary_data_hash {
            e.u8(7)?.encode_with(x, ctx)?;
        }
        if let Some(x) = &self.validity_interval_start {
            e.u8(8)?.encode_with(x, ctx)?;
        }
        if let Some(x) = &self.mint {
            e.u8(9)?.encode_with(x, ctx)?;
        }
        if let Some(x) = &self.script_data_hash {
            e.u8(11)?.encode_with(x, ctx)?;
        }
        if let Some(x) = &self.collateral {
            e.u8(13)?.encode_with(x, ctx)?;
        }
        if let Some(x) = &self.required_signers {
            e.u8(14)?.encode_with(x, ctx)?;
        }
        if let Some(x) = &self.network_id {
            e.u8(15)?.encode_with(x, ctx)?;
        }
        if let Some(x) = &self.collateral_return {
            e.u8(16)?.encode_with(x, ctx)?;
        }
        if let Some(x) = &self.total_collateral {
            e.u8(17)?.encode_with(x, ctx)?;
        }
        if let Some(x) = &self.reference_inputs {
            e.u8(18)?.encode_with(x, ctx)?;
        }
        if let Some(x) = &self.voting_procedures {
            e.u8(19)?.encode_with(x, ctx)?;
        }
        if let Some(x) = &self.proposal_procedures {
            e.u8(20)?.encode_with(x, ctx)?;
        }
        if let Some(x) = &self.treasury_value {
            e.u8(21)?.encode_with(x, ctx)?;
        }
        if let Some(x) = &self.donation {
            e.u8(22)?.encode_with(x, ctx)?;
        }

        Ok(())
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TransactionBody {
    fn decode(d: &mut minicbor::Decoder<'b>, ctx: &mut C) -> Result<Self, minicbor::decode::Error> {
        let mut inputs = None;
        let mut outputs = None;
        let mut fee = None;
        let mut body = TransactionBody::new(vec![], vec![], 0);

        TRANSACTION_BODY.decode_entries(d, |field, d| {
            match field.key {
                0 => inputs = Some(d.decode_with(ctx)?),
                1 => outputs = Some(d.decode_with(ctx)?),
                2 => fee = Some(d.u64()?),
                3 => body.ttl = Some(d.decode_with(ctx)?),
                4 => body.certificates = Some(d.decode_with(ctx)?),
                5 => body.withdrawals = Some(d.decode_with(ctx)?),
                7 => body.auxiliary_data_hash = Some(d.decode_with(ctx)?),
                8 => body.validity_interval_start = Some(d.decode_with(ctx)?),
                9 => body.mint = Some(d.decode_with(ctx)?),
                11 => body.script_data_hash = Some(d.decode_with(ctx)?),
                13 => body.collateral = Some(d.decode_with(ctx)?),
                14 => body.required_signers = Some(d.decode_with(ctx)?),
                15 => body.network_id = Some(d.decode_with(ctx)?),
                16 => body.collateral_return = Some(d.decode_with(ctx)?),
                17 => body.total_collateral = Some(d.decode_with(ctx)?),
                18 => body.reference_inputs = Some(d.decode_with(ctx)?),
                19 => body.voting_procedures = Some(d.decode_with(ctx)?),
                20 => body.proposal_procedures = Some(d.decode_with(ctx)?),
                21 => body.treasury_value = Some(d.decode_with(ctx)?),
                _ => body.donation = Some(d.decode_with(ctx)?),
            }
            Ok(())
        })?;

        body.inputs = inputs.ok_or_else(|| missing("inputs"))?;
        body.outputs = outputs.ok_or_else(|| missing("outputs"))?;
        body.fee = fee.ok_or_else(|| missing("fee"))?;

        Ok(body)
    }
}

#[derive(Encode, Decode, Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Hash)]
pub struct VKeyWitness {
    #[n(0)]
    pub vkey: PublicKey,

    #[n(1)]
    pub signature: Signature,
}

#[derive(Encode, Decode, Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Hash)]
pub struct BootstrapWitness {
    #[n(0)]
    pub public_key: Bytes,

    #[n(1)]
    pub signature: Bytes,

    #[n(2)]
    pub chain_code: Bytes,

    #[n(3)]
    pub attributes: Bytes,
}

/// Witnesses of a transaction
///
/// Plutus data and redeemers are kept as the cbor they were given in.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct WitnessSet {
    pub vkeywitness: Option<Set<VKeyWitness>>,
    pub native_script: Option<Set<NativeScript>>,
    pub bootstrap_witness: Option<Set<BootstrapWitness>>,
    pub plutus_v1_script: Option<Set<PlutusScript<1>>>,
    pub plutus_data: Option<AnyCbor>,
    pub redeemer: Option<AnyCbor>,
    pub plutus_v2_script: Option<Set<PlutusScript<2>>>,
    pub plutus_v3_script: Option<Set<PlutusScript<3>>>,
}

const WITNESS_SET: MapLayout = MapLayout::new(
    "witness set",
    &[
        Field::optional(0, "vkeywitness"),
        Field::optional(1, "native_script"),
        Field::optional(2, "bootstrap_witness"),
        Field::optional(3, "plutus_v1_script"),
        Field::optional(4, "plutus_data"),
        Field::optional(5, "redeemer"),
        Field::optional(6, "plutus_v2_script"),
        Field::optional(7, "plutus_v3_script"),
    ],
);

impl WitnessSet {
    pub fn is_empty(&self) -> bool {
        self == &WitnessSet::default()
    }
}

impl<C> minicbor::Encode<C> for WitnessSet {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        let present = [
            self.vkeywitness.is_some(),
            self.native_script.is_some(),
            self.bootstrap_witness.is_some(),
            self.plutus_v1_script.is_some(),
            self.plutus_data.is_some(),
            self.redeemer.is_some(),
            self.plutus_v2_script.is_some(),
            self.plutus_v3_script.is_some(),
        ];

        e.map(present.iter().filter(|x| **x).count() as u64)?;

        if let Some(x) = &self.vkeywitness {
            e.u8(0)?.encode_with(x, ctx)?;
        }
        if let Some(x) = &self.native_script {
            e.u8(1)?.encode_with(x, ctx)?;
        }
        if let Some(x) = &self.bootstrap_witness {
            e.u8(2)?.encode_with(x, ctx)?;
        }
        if let Some(x) = &self.plutus_v1_script {
            e.u8(3)?.encode_with(x, ctx)?;
        }
        if let Some(x) = &self.plutus_data {
            e.u8(4)?.encode_with(x, ctx)?;
        }
        if let Some(x) = &self.redeemer {
            e.u8(5)?.encode_with(x, ctx)?;
        }
        if let Some(x) = &self.plutus_v2_script {
            e.u8(6)?.encode_with(x, ctx)?;
        }
        if let Some(x) = &self.plutus_v3_script {
            e.u8(7)?.encode_with(x, ctx)?;
        }

        Ok(())
    }
}

impl<'b, C> minicbor::Decode<'b, C> for WitnessSet {
    fn decode(d: &mut minicbor::Decoder<'b>, ctx: &mut C) -> Result<Self, minicbor::decode::Error> {
        let mut out = WitnessSet::default();

        WITNESS_SET.decode_entries(d, |field, d| {
            match field.key {
                0 => out.vkeywitness = Some(d.decode_with(ctx)?),
                1 => out.native_script = Some(d.decode_with(ctx)?),
                2 => out.bootstrap_witness = Some(d.decode_with(ctx)?),
                3 => out.plutus_v1_script = Some(d.decode_with(ctx)?),
                4 => out.plutus_data = Some(d.decode_with(ctx)?),
                5 => out.redeemer = Some(d.decode_with(ctx)?),
                6 => out.plutus_v2_script = Some(d.decode_with(ctx)?),
                _ => out.plutus_v3_script = Some(d.decode_with(ctx)?),
            }
            Ok(())
        })?;

        Ok(out)
    }
}

/// A complete transaction, ready to be submitted
#[derive(Debug, PartialEq, Clone)]
pub struct Transaction {
    pub transaction_body: TransactionBody,
    pub transaction_witness_set: WitnessSet,
    pub success: bool,
    pub auxiliary_data: Option<AuxiliaryData>,
}

impl Transaction {
    pub fn new(transaction_body: TransactionBody, transaction_witness_set: WitnessSet) -> Self {
        Self {
            transaction_body,
            transaction_witness_set,
            success: true,
            auxiliary_data: None,
        }
    }

    pub fn id(&self) -> Result<TransactionId, tessera_codec::Error> {
        self.transaction_body.hash()
    }
}

impl<C> minicbor::Encode<C> for Transaction {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.array(4)?;
        e.encode_with(&self.transaction_body, ctx)?;
        e.encode_with(&self.transaction_witness_set, ctx)?;
        e.bool(self.success)?;
        e.encode_with(&self.auxiliary_data, ctx)?;
        Ok(())
    }
}

impl<'b, C> minicbor::Decode<'b, C> for Transaction {
    fn decode(d: &mut minicbor::Decoder<'b>, ctx: &mut C) -> Result<Self, minicbor::decode::Error> {
        let position = d.position();
        let len = d.array()?;

        let transaction_body = d.decode_with(ctx)?;
        let transaction_witness_set = d.decode_with(ctx)?;

        let success = match len {
            Some(4) => d.bool()?,
            Some(3) => true,
            Some(n) => {
                return Err(minicbor::decode::Error::message(format!(
                    "transaction expects 3 or 4 elements, found {n}"
                ))
                .at(position))
            }
            None => {
                return Err(minicbor::decode::Error::message(
                    "transaction can't be an indefinite array",
                )
                .at(position))
            }
        };

        let auxiliary_data = d.decode_with(ctx)?;

        Ok(Transaction {
            transaction_body,
            transaction_witness_set,
            success,
            auxiliary_data,
        })
    }
}

/// An unspent output together with the input that references it
#[derive(Encode, Decode, Debug, PartialEq, Eq, Clone, Hash)]
pub struct UTxO {
    #[n(0)]
    pub input: TransactionInput,

    #[n(1)]
    pub output: TransactionOutput,
}

impl UTxO {
    pub fn new(input: TransactionInput, output: TransactionOutput) -> Self {
        Self { input, output }
    }
}
