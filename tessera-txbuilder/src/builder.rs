use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tessera_addresses::StakePayload;
use tessera_codec::Fragment;
use tessera_crypto::key::ed25519::{PublicKey, Signature};
use tessera_primitives::{
    AddrKeyhash, Address, AuxiliaryData, Certificate, Coin, GovActionId, KeyValuePairs, Metadatum,
    MetadatumLabel, MultiAsset, NativeScript, ProposalProcedure, RewardAccount, Set, Slot,
    StakeCredential, Transaction, TransactionBody, TransactionInput, TransactionOutput, UTxO,
    VKeyWitness, Value, Voter, VotingProcedure, VotingProcedures, Withdrawals, WitnessSet,
};

use crate::{
    fee, max_tx_fee, min_lovelace, tokens_metadata, tokens_to_mint, BuildEvent, BuildObserver,
    BuildStage, BuiltTransaction, ChainContext, LargestFirst, ProtocolParameters, RandomImprove,
    Selection, SelectionError, SelectionRequest, Selector, Signer, Token, TxBuilderError,
};

const DEFAULT_TTL_OFFSET: i64 = 10_000;

const MAX_FEE_PASSES: u8 = 5;

const DEFAULT_VALIDITY_START_OFFSET: i64 = -1_000;

const FAKE_VKEY: [u8; 32] = [
    0x57, 0x97, 0xdc, 0x2c, 0xc9, 0x19, 0xdf, 0xec,
    0x0b, 0xb8, 0x49, 0x55, 0x1e, 0xbd, 0xf3, 0x0d,
    0x96, 0xe5, 0xcb, 0xe0, 0xf3, 0x3f, 0x73, 0x4a,
    0x87, 0xfe, 0x82, 0x6d, 0xb3, 0x0f, 0x7e, 0xf9,
];

const FAKE_SIGNATURE: [u8; 64] = [
    0x57, 0x7c, 0xcb, 0x5b, 0x48, 0x7b, 0x64, 0xe3,
    0x96, 0xb0, 0x97, 0x6c, 0x6f, 0x71, 0x55, 0x8e,
    0x52, 0xe4, 0x4a, 0xd2, 0x54, 0xdb, 0x7d, 0x06,
    0xdf, 0xb7, 0x98, 0x43, 0xe5, 0x44, 0x1a, 0x5d,
    0x76, 0x3d, 0xd4, 0x2a, 0xdc, 0xf5, 0xe8, 0x80,
    0x5d, 0x70, 0x37, 0x37, 0x22, 0xeb, 0xbc, 0xe6,
    0x2a, 0x58, 0xe3, 0xf3, 0x0d, 0xd4, 0x56, 0x0b,
    0x9a, 0x89, 0x8b, 0x8c, 0xee, 0xab, 0x6a, 0x03,
];

/// Placeholder witness with the exact size of a real one
fn fake_vkey_witness(index: usize) -> VKeyWitness {
    let mut index_bytes = [0u8; 32];
    index_bytes[24..].copy_from_slice(&(index as u64).to_be_bytes());

    let mut vkey = FAKE_VKEY;
    for (byte, mask) in vkey.iter_mut().zip(index_bytes) {
        *byte &= mask;
    }

    let mut signature = FAKE_SIGNATURE;
    for (byte, mask) in signature
        .iter_mut()
        .zip(index_bytes.iter().chain(index_bytes.iter()))
    {
        *byte &= mask;
    }

    VKeyWitness {
        vkey: PublicKey::from(vkey),
        signature: Signature::from(signature),
    }
}

#[inline(always)]
fn non_empty_set<T: Clone>(v: &[T]) -> Option<Set<T>> {
    if v.is_empty() {
        None
    } else {
        Some(Set::new(v.to_vec()))
    }
}

/// Knobs of the balancing pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildOptions {
    /// Fold the change into an output already paying the change address
    pub merge_change: bool,

    /// Ttl relative to the tip, in slots
    pub auto_ttl_offset: Option<i64>,

    /// Validity start relative to the tip, in slots
    pub auto_validity_start_offset: Option<i64>,

    /// Added to every fee estimate
    pub fee_buffer: Coin,

    /// Number of key witnesses to size the fee for, instead of the number of
    /// keys the transaction visibly requires
    pub witness_override: Option<usize>,

    /// Charge the pool deposit for pool registration certificates
    pub initial_stake_pool_registration: bool,

    pub max_input_count: Option<usize>,
}

/// Accumulates the content of a transaction, then balances it
///
/// Every setter consumes and returns the builder. [`TransactionBuilder::build`]
/// consumes it for good: a builder produces a single transaction.
pub struct TransactionBuilder<'a> {
    context: &'a dyn ChainContext,
    options: BuildOptions,
    selectors: Vec<Box<dyn Selector + 'a>>,
    observer: Option<Box<dyn BuildObserver + 'a>>,

    inputs: Vec<UTxO>,
    input_addresses: Vec<Address>,
    excluded_inputs: Vec<TransactionInput>,
    reference_inputs: Vec<TransactionInput>,
    outputs: Vec<TransactionOutput>,
    mint: MultiAsset,
    tokens: Vec<Token>,
    native_scripts: Vec<NativeScript>,
    auxiliary_data: Option<AuxiliaryData>,
    certificates: Vec<Certificate>,
    withdrawals: Withdrawals,
    required_signers: Vec<AddrKeyhash>,
    ttl: Option<Slot>,
    validity_start: Option<Slot>,
    voting_procedures: VotingProcedures,
    proposal_procedures: Vec<ProposalProcedure>,
    treasury_value: Option<Coin>,
    donation: Option<Coin>,
}

impl<'a> TransactionBuilder<'a> {
    pub fn new(context: &'a dyn ChainContext) -> Self {
        Self {
            context,
            options: Default::default(),
            selectors: vec![Box::new(RandomImprove::new()), Box::new(LargestFirst)],
            observer: None,

            inputs: Default::default(),
            input_addresses: Default::default(),
            excluded_inputs: Default::default(),
            reference_inputs: Default::default(),
            outputs: Default::default(),
            mint: Default::default(),
            tokens: Default::default(),
            native_scripts: Default::default(),
            auxiliary_data: Default::default(),
            certificates: Default::default(),
            withdrawals: Default::default(),
            required_signers: Default::default(),
            ttl: Default::default(),
            validity_start: Default::default(),
            voting_procedures: Default::default(),
            proposal_procedures: Default::default(),
            treasury_value: Default::default(),
            donation: Default::default(),
        }
    }

    pub fn options(mut self, options: BuildOptions) -> Self {
        self.options = options;
        self
    }

    /// Replaces the selectors, tried in order until one succeeds
    pub fn selectors(mut self, selectors: Vec<Box<dyn Selector + 'a>>) -> Self {
        self.selectors = selectors;
        self
    }

    /// Attaches an observer, which first learns the builder is accumulating
    pub fn observer(mut self, observer: impl BuildObserver + 'a) -> Self {
        self.observer = Some(Box::new(observer));
        self.emit(BuildEvent::Stage(BuildStage::Accumulating));
        self
    }

    pub fn input(mut self, utxo: UTxO) -> Self {
        self.inputs.push(utxo);
        self
    }

    /// Address whose UTxOs may be selected to fund the transaction
    pub fn input_address(mut self, address: Address) -> Self {
        self.input_addresses.push(address);
        self
    }

    pub fn exclude_input(mut self, input: TransactionInput) -> Self {
        self.excluded_inputs.push(input);
        self
    }

    pub fn reference_input(mut self, input: TransactionInput) -> Self {
        self.reference_inputs.push(input);
        self
    }

    /// Adds an output. An output without coin gets exactly its min lovelace.
    pub fn output(mut self, output: TransactionOutput) -> Self {
        self.outputs.push(output);
        self
    }

    /// Mints the positive quantities and burns the negative ones
    pub fn mint(mut self, assets: MultiAsset) -> Self {
        self.mint += &assets;
        self
    }

    /// Mints a token, witnessing its policy and carrying its metadata
    pub fn token(mut self, token: Token) -> Self {
        self.tokens.push(token);
        self
    }

    pub fn native_script(mut self, script: NativeScript) -> Self {
        if !self.native_scripts.contains(&script) {
            self.native_scripts.push(script);
        }

        self
    }

    pub fn auxiliary_data(mut self, data: AuxiliaryData) -> Self {
        self.auxiliary_data = Some(data);
        self
    }

    pub fn metadata(mut self, label: MetadatumLabel, value: Metadatum) -> Self {
        self.auxiliary_data
            .get_or_insert_with(|| AuxiliaryData::from_metadata(KeyValuePairs::from(vec![])))
            .merge_metadata([(label, value)]);
        self
    }

    pub fn certificate(mut self, cert: Certificate) -> Self {
        self.certificates.push(cert);
        self
    }

    pub fn withdrawal(mut self, account: RewardAccount, amount: Coin) -> Self {
        self.withdrawals.insert(account, amount);
        self
    }

    pub fn require_signer(mut self, signer: AddrKeyhash) -> Self {
        self.required_signers.push(signer);
        self
    }

    pub fn valid_from(mut self, slot: Slot) -> Self {
        self.validity_start = Some(slot);
        self
    }

    pub fn valid_until(mut self, slot: Slot) -> Self {
        self.ttl = Some(slot);
        self
    }

    pub fn vote(mut self, voter: Voter, action: GovActionId, procedure: VotingProcedure) -> Self {
        self.voting_procedures
            .entry(voter)
            .or_default()
            .insert(action, procedure);
        self
    }

    pub fn proposal(mut self, proposal: ProposalProcedure) -> Self {
        self.proposal_procedures.push(proposal);
        self
    }

    pub fn treasury_value(mut self, value: Coin) -> Self {
        self.treasury_value = Some(value);
        self
    }

    pub fn donation(mut self, amount: Coin) -> Self {
        self.donation = Some(amount);
        self
    }

    /// Balances the transaction, sending the change to `change_address`
    ///
    /// Without a change address the whole coin surplus goes to the fee, and
    /// the inputs must carry exactly the assets the outputs need.
    pub fn build(self, change_address: Option<Address>) -> Result<BuiltTransaction, TxBuilderError> {
        self.build_inner(change_address).map(|(built, _)| built)
    }

    /// Builds, then signs with every given key the transaction requires
    ///
    /// Keys the transaction doesn't need are skipped: the fee was sized for
    /// the required ones only.
    pub fn build_and_sign(
        self,
        signers: &[&dyn Signer],
        change_address: Option<Address>,
    ) -> Result<Transaction, TxBuilderError> {
        let (mut built, required) = self.build_inner(change_address)?;

        for signer in signers {
            let key_hash = signer.key_hash();

            if !required.contains(&key_hash) {
                tracing::warn!(%key_hash, "signing key not required by the transaction, skipping");
                continue;
            }

            built = built.sign(*signer)?;
        }

        Ok(built.into())
    }

    fn emit(&mut self, event: BuildEvent) {
        if let Some(observer) = self.observer.as_mut() {
            observer.on_event(&event);
        }
    }

    fn build_inner(
        mut self,
        change_address: Option<Address>,
    ) -> Result<(BuiltTransaction, BTreeSet<AddrKeyhash>), TxBuilderError> {
        let params = self.context.protocol_parameters()?;

        if self.donation == Some(0) {
            return Err(TxBuilderError::TreasuryDonation);
        }

        if let Some(conflict) = self
            .inputs
            .iter()
            .find(|x| self.excluded_inputs.contains(&x.input))
        {
            return Err(TxBuilderError::InputConflict(format!(
                "{}#{}",
                conflict.input.transaction_id, conflict.input.index
            )));
        }

        self.apply_tokens()?;
        self.apply_auto_validity()?;
        self.fill_min_lovelace(&params)?;

        self.emit(BuildEvent::Stage(BuildStage::Balancing));

        let can_merge = change_address.as_ref().is_some_and(|address| {
            self.options.merge_change && self.outputs.iter().any(|x| &x.address == address)
        });

        let mut inputs = self.inputs.clone();

        let unfulfilled = self.unfulfilled(&params, &inputs, change_address.as_ref(), can_merge)?;

        if !unfulfilled.is_zero() {
            if inputs.is_empty() && self.input_addresses.is_empty() {
                return Err(TxBuilderError::NoInputs);
            }

            tracing::debug!(?unfulfilled, "selecting additional inputs");

            let selection =
                self.select(&params, &inputs, &unfulfilled, change_address.as_ref(), can_merge)?;
            inputs.extend(selection.selected);
        }

        inputs.sort_by(|a, b| a.input.cmp(&b.input));
        inputs.dedup_by(|a, b| a.input == b.input);

        if inputs.is_empty() {
            return Err(TxBuilderError::NoInputs);
        }

        let provided = self.provided(&params, &inputs);
        let requested = self.requested(&params);

        let (outputs, fee) = match &change_address {
            Some(address) => {
                let (size, first) =
                    self.estimate_fee(&params, &inputs, &self.outputs, max_tx_fee(&params))?;
                self.emit(BuildEvent::FeePass {
                    pass: 1,
                    size,
                    fee: first,
                });

                // later passes size the body with the previous estimate until
                // the fee settles
                let mut estimate = first;
                let mut pass = 1;

                loop {
                    let draft = self.outputs_with_change(
                        &params, &provided, &requested, estimate, address, can_merge,
                    )?;

                    let (size, next) = self.estimate_fee(&params, &inputs, &draft, estimate)?;
                    pass += 1;

                    // a pass confirming the previous estimate goes unreported
                    if pass == 2 || next != estimate {
                        self.emit(BuildEvent::FeePass {
                            pass,
                            size,
                            fee: next,
                        });
                    }

                    if next == estimate {
                        break (draft, next);
                    }

                    if pass >= MAX_FEE_PASSES {
                        let fee = next.max(estimate);
                        let outputs = self.outputs_with_change(
                            &params, &provided, &requested, fee, address, can_merge,
                        )?;
                        break (outputs, fee);
                    }

                    estimate = next;
                }
            }
            None => {
                let (size, estimate) =
                    self.estimate_fee(&params, &inputs, &self.outputs, max_tx_fee(&params))?;
                self.emit(BuildEvent::FeePass {
                    pass: 1,
                    size,
                    fee: estimate,
                });

                let fee = surplus_fee(&provided, &requested, estimate)?;
                (self.outputs.clone(), fee)
            }
        };

        let body = self.body(&inputs, outputs, fee)?;
        let required = self.required_vkeys(&inputs);
        let size = self.fake_size(body.clone(), &inputs)?;

        if size > params.max_tx_size {
            return Err(TxBuilderError::SizeExceeded {
                size,
                max: params.max_tx_size,
            });
        }

        self.emit(BuildEvent::Finalized { size, fee });
        self.emit(BuildEvent::Stage(BuildStage::Finalized));

        tracing::info!(
            inputs = inputs.len(),
            outputs = body.outputs.len(),
            fee,
            size,
            "transaction balanced"
        );

        let built = BuiltTransaction {
            body,
            witness_set: self.witness_set(),
            auxiliary_data: self.auxiliary_data.clone(),
        };

        Ok((built, required))
    }

    fn apply_tokens(&mut self) -> Result<(), TxBuilderError> {
        let tokens = std::mem::take(&mut self.tokens);

        if tokens.is_empty() {
            return Ok(());
        }

        self.mint += &tokens_to_mint(&tokens)?;

        for token in tokens.iter() {
            if let Some(script) = token.policy.script() {
                if !self.native_scripts.contains(script) {
                    self.native_scripts.push(script.clone());
                }
            }
        }

        if let Some(entry) = tokens_metadata(&tokens)? {
            self.auxiliary_data
                .get_or_insert_with(|| AuxiliaryData::from_metadata(KeyValuePairs::from(vec![])))
                .merge_metadata([entry]);
        }

        Ok(())
    }

    /// Fills the validity interval from the tip when an offset is configured
    /// or scripts are involved, keeping any explicit bound
    fn apply_auto_validity(&mut self) -> Result<(), TxBuilderError> {
        let has_scripts = !self.native_scripts.is_empty();

        let start_offset = self
            .options
            .auto_validity_start_offset
            .or(has_scripts.then_some(DEFAULT_VALIDITY_START_OFFSET))
            .filter(|_| self.validity_start.is_none());

        let ttl_offset = self
            .options
            .auto_ttl_offset
            .or(has_scripts.then_some(DEFAULT_TTL_OFFSET))
            .filter(|_| self.ttl.is_none());

        if start_offset.is_none() && ttl_offset.is_none() {
            return Ok(());
        }

        let last_slot = self.context.last_block_slot()? as i64;
        let relative = |offset: i64| last_slot.saturating_add(offset).max(0) as Slot;

        if let Some(offset) = start_offset {
            self.validity_start = Some(relative(offset));
        }

        if let Some(offset) = ttl_offset {
            self.ttl = Some(relative(offset));
        }

        Ok(())
    }

    fn fill_min_lovelace(&mut self, params: &ProtocolParameters) -> Result<(), TxBuilderError> {
        for (index, output) in self.outputs.iter_mut().enumerate() {
            let required = min_lovelace(output, params)?;

            if output.amount.coin == 0 {
                output.amount.coin = required;
            } else if output.amount.coin < required {
                return Err(TxBuilderError::OutputBelowMinimum {
                    index,
                    coin: output.amount.coin,
                    required,
                });
            }
        }

        Ok(())
    }

    fn deposits(&self, params: &ProtocolParameters) -> Coin {
        let certificates: Coin = self
            .certificates
            .iter()
            .map(|cert| match cert {
                Certificate::StakeRegistration(_) => params.key_deposit,
                Certificate::Reg(_, coin)
                | Certificate::StakeRegDeleg(_, _, coin)
                | Certificate::VoteRegDeleg(_, _, coin)
                | Certificate::StakeVoteRegDeleg(_, _, _, coin)
                | Certificate::RegDRepCert(_, coin, _) => *coin,
                Certificate::PoolRegistration(_) if self.options.initial_stake_pool_registration => {
                    params.pool_deposit
                }
                _ => 0,
            })
            .sum();

        let proposals: Coin = self.proposal_procedures.iter().map(|x| x.deposit).sum();

        certificates + proposals
    }

    fn refunds(&self, params: &ProtocolParameters) -> Coin {
        self.certificates
            .iter()
            .map(|cert| match cert {
                Certificate::StakeDeregistration(_) => params.key_deposit,
                Certificate::UnReg(_, coin) | Certificate::UnRegDRepCert(_, coin) => *coin,
                _ => 0,
            })
            .sum()
    }

    /// Everything flowing into the transaction
    fn provided(&self, params: &ProtocolParameters, inputs: &[UTxO]) -> Value {
        let mut provided: Value = inputs.iter().map(|x| &x.output.amount).sum();

        provided.multi_asset += &self.mint.positive();
        provided.coin += self.withdrawals.values().sum::<Coin>();
        provided.coin += self.refunds(params);

        provided
    }

    /// Everything flowing out of the transaction, except the fee
    fn requested(&self, params: &ProtocolParameters) -> Value {
        let mut requested: Value = self.outputs.iter().map(|x| &x.amount).sum();

        requested.multi_asset += &-&self.mint.negative();
        requested.coin += self.deposits(params);
        requested.coin += self.donation.unwrap_or_default();

        requested
    }

    /// What the current inputs can't cover, including room for the change
    /// output when one is going to be added
    fn unfulfilled(
        &self,
        params: &ProtocolParameters,
        inputs: &[UTxO],
        change_address: Option<&Address>,
        can_merge: bool,
    ) -> Result<Value, TxBuilderError> {
        let (_, estimate) =
            self.estimate_fee(params, inputs, &self.outputs, max_tx_fee(params))?;

        let mut requested = self.requested(params);
        requested.coin += estimate;

        let provided = self.provided(params, inputs);
        let trimmed = provided.filter(|policy, name, _| requested.multi_asset.get(policy, name) != 0);
        let untrimmed = &provided - &trimmed;

        let mut coin = requested.coin as i128 - trimmed.coin as i128;

        match change_address {
            Some(address) if !can_merge => {
                if coin < 0 {
                    let change = TransactionOutput::new(address.clone(), untrimmed);
                    coin = (coin + min_lovelace(&change, params)? as i128).max(0);
                }
            }
            _ => coin = coin.max(0),
        }

        let assets = (&requested.multi_asset - &trimmed.multi_asset).positive();

        Ok(Value::with_assets(coin as Coin, assets))
    }

    /// Spendable UTxOs of the input addresses not already in use
    fn selection_pool(&self, inputs: &[UTxO]) -> Result<Vec<UTxO>, TxBuilderError> {
        let mut pool: Vec<UTxO> = vec![];

        for address in self.input_addresses.iter() {
            for utxo in self.context.utxos(address)? {
                let seen = inputs.iter().chain(pool.iter()).any(|x| x.input == utxo.input);
                let excluded = self.excluded_inputs.contains(&utxo.input);

                if seen || excluded || utxo.output.script_ref.is_some() {
                    continue;
                }

                pool.push(utxo);
            }
        }

        Ok(pool)
    }

    fn select(
        &mut self,
        params: &ProtocolParameters,
        inputs: &[UTxO],
        unfulfilled: &Value,
        change_address: Option<&Address>,
        can_merge: bool,
    ) -> Result<Selection, TxBuilderError> {
        let pool = self.selection_pool(inputs)?;

        let address = change_address
            .or(self.input_addresses.first())
            .or(self.outputs.first().map(|x| &x.address))
            .cloned()
            .ok_or(TxBuilderError::NoInputs)?;

        let provided = self.provided(params, inputs);
        let requested = self.requested(params);
        let existing = provided.filter(|policy, name, _| requested.multi_asset.get(policy, name) == 0);

        let request = SelectionRequest {
            outputs: vec![TransactionOutput::new(address, unfulfilled.clone())],
            max_input_count: self.options.max_input_count,
            include_max_fee: false,
            respect_min_utxo: !can_merge,
            existing_amount: Some(Value::with_assets(0, existing.multi_asset)),
        };

        let mut selectors = std::mem::take(&mut self.selectors);

        for selector in selectors.iter_mut() {
            self.emit(BuildEvent::SelectorAttempt {
                selector: selector.name(),
                pool_size: pool.len(),
            });

            match selector.select(&pool, &request, params) {
                Ok(selection) => {
                    tracing::debug!(
                        selector = selector.name(),
                        selected = selection.selected.len(),
                        "inputs selected"
                    );

                    return Ok(selection);
                }
                Err(err) => {
                    tracing::warn!(selector = selector.name(), %err, "selector failed");

                    self.emit(BuildEvent::SelectorFailed {
                        selector: selector.name(),
                        reason: err.to_string(),
                    });
                }
            }
        }

        Err(SelectionError::AllSelectorsFailed {
            unfulfilled: unfulfilled.clone(),
        }
        .into())
    }

    /// The outputs plus a change output carrying the surplus left once `fee`
    /// is paid
    fn outputs_with_change(
        &mut self,
        params: &ProtocolParameters,
        provided: &Value,
        requested: &Value,
        fee: Coin,
        address: &Address,
        can_merge: bool,
    ) -> Result<Vec<TransactionOutput>, TxBuilderError> {
        let mut requested = requested.clone();
        requested.coin = requested.coin.saturating_add(fee);

        let change = change_of(provided, &requested)?;

        self.emit(BuildEvent::ChangeComputed {
            change: change.clone(),
        });

        let mut outputs = self.outputs.clone();

        if change.is_zero() {
            return Ok(outputs);
        }

        if can_merge {
            if let Some(output) = outputs.iter_mut().find(|x| &x.address == address) {
                output.amount += &change;
                return Ok(outputs);
            }
        }

        let output = TransactionOutput::new(address.clone(), change);
        let required = min_lovelace(&output, params)?;

        if output.amount.coin < required {
            return Err(TxBuilderError::InsufficientChange {
                available: output.amount.coin,
                required,
            });
        }

        outputs.push(output);

        Ok(outputs)
    }

    fn body(
        &self,
        inputs: &[UTxO],
        outputs: Vec<TransactionOutput>,
        fee: Coin,
    ) -> Result<TransactionBody, TxBuilderError> {
        let inputs = inputs.iter().map(|x| x.input.clone()).collect();
        let mut body = TransactionBody::new(inputs, outputs, fee);

        body.ttl = self.ttl;
        body.validity_interval_start = self.validity_start;
        body.certificates = non_empty_set(&self.certificates);
        body.withdrawals = (!self.withdrawals.is_empty()).then(|| self.withdrawals.clone());
        body.auxiliary_data_hash = self
            .auxiliary_data
            .as_ref()
            .map(AuxiliaryData::hash)
            .transpose()?;
        body.mint = (!self.mint.is_empty()).then(|| self.mint.clone());
        body.required_signers = non_empty_set(&self.required_signers);
        body.reference_inputs = non_empty_set(&self.reference_inputs);
        body.voting_procedures =
            (!self.voting_procedures.is_empty()).then(|| self.voting_procedures.clone());
        body.proposal_procedures = non_empty_set(&self.proposal_procedures);
        body.treasury_value = self.treasury_value;
        body.donation = self.donation;

        Ok(body)
    }

    fn witness_set(&self) -> WitnessSet {
        WitnessSet {
            native_script: non_empty_set(&self.native_scripts),
            ..Default::default()
        }
    }

    /// Key hashes that have to sign for the transaction to be valid
    fn required_vkeys(&self, inputs: &[UTxO]) -> BTreeSet<AddrKeyhash> {
        let mut keys = BTreeSet::new();

        for utxo in inputs {
            if let Some(hash) = utxo.output.address.payment_key_hash() {
                keys.insert(*hash);
            }
        }

        keys.extend(self.required_signers.iter().copied());

        for script in self.native_scripts.iter() {
            keys.extend(script.key_hashes());
        }

        for cert in self.certificates.iter() {
            match cert {
                Certificate::PoolRegistration(pool) => {
                    keys.insert(pool.operator);
                }
                Certificate::PoolRetirement(pool, _) => {
                    keys.insert(*pool);
                }
                Certificate::StakeRegistration(_)
                | Certificate::StakeDeregistration(_)
                | Certificate::StakeDelegation(..)
                | Certificate::Reg(..)
                | Certificate::UnReg(..)
                | Certificate::VoteDeleg(..)
                | Certificate::StakeVoteDeleg(..)
                | Certificate::StakeRegDeleg(..)
                | Certificate::VoteRegDeleg(..)
                | Certificate::StakeVoteRegDeleg(..)
                | Certificate::RegDRepCert(..) => {
                    if let Some(hash) = cert.credential().and_then(StakeCredential::key_hash) {
                        keys.insert(*hash);
                    }
                }
                _ => (),
            }
        }

        for account in self.withdrawals.keys() {
            if let StakePayload::Stake(hash) = account.payload() {
                keys.insert(*hash);
            }
        }

        for voter in self.voting_procedures.keys() {
            if let Some(hash) = voter.key_hash() {
                keys.insert(*hash);
            }
        }

        keys
    }

    /// Size of the transaction once signed, using placeholder witnesses
    fn fake_size(&self, body: TransactionBody, inputs: &[UTxO]) -> Result<u64, TxBuilderError> {
        let count = self
            .options
            .witness_override
            .unwrap_or_else(|| self.required_vkeys(inputs).len());

        let mut witness_set = self.witness_set();

        if count > 0 {
            let fakes = (0..count).map(fake_vkey_witness).collect();
            witness_set.vkeywitness = Some(Set::new(fakes));
        }

        let tx = Transaction {
            transaction_body: body,
            transaction_witness_set: witness_set,
            success: true,
            auxiliary_data: self.auxiliary_data.clone(),
        };

        Ok(tx.encode_fragment()?.len() as u64)
    }

    /// Fee of the transaction spending `inputs` into `outputs`, sized with
    /// `body_fee` in its fee field
    ///
    /// Passes without a prior estimate size with [`max_tx_fee`] so they never
    /// come short.
    fn estimate_fee(
        &self,
        params: &ProtocolParameters,
        inputs: &[UTxO],
        outputs: &[TransactionOutput],
        body_fee: Coin,
    ) -> Result<(u64, Coin), TxBuilderError> {
        let body = self.body(inputs, outputs.to_vec(), body_fee)?;
        let size = self.fake_size(body, inputs)?;

        Ok((size, fee(params, size, 0, 0) + self.options.fee_buffer))
    }
}

/// `provided - requested`, failing when anything is missing
fn change_of(provided: &Value, requested: &Value) -> Result<Value, TxBuilderError> {
    if provided.coin < requested.coin {
        return Err(TxBuilderError::InsufficientFunds(format!(
            "{} lovelace provided, {} requested",
            provided.coin, requested.coin
        )));
    }

    let assets = &provided.multi_asset - &requested.multi_asset;
    let missing = assets.negative();

    if !missing.is_empty() {
        return Err(TxBuilderError::InsufficientFunds(format!(
            "missing assets {:?}",
            -&missing
        )));
    }

    Ok(Value::with_assets(provided.coin - requested.coin, assets))
}

/// Fee of a transaction without change: the whole coin surplus
fn surplus_fee(provided: &Value, requested: &Value, estimate: Coin) -> Result<Coin, TxBuilderError> {
    let surplus = change_of(provided, requested)?;

    if !surplus.multi_asset.is_empty() {
        return Err(TxBuilderError::InsufficientFunds(format!(
            "assets {:?} left without a change address",
            surplus.multi_asset
        )));
    }

    if surplus.coin < estimate {
        return Err(TxBuilderError::InsufficientFunds(format!(
            "{} lovelace left for a fee of {}",
            surplus.coin, estimate
        )));
    }

    Ok(surplus.coin)
}
