use std::{cell::RefCell, rc::Rc, time::Duration};

use serde_json::json;
use tessera_addresses::{
    ShelleyAddress, ShelleyDelegationPart, ShelleyPaymentPart, StakeAddress, StakePayload,
};
use tessera_codec::Fragment;
use tessera_crypto::key::ed25519::SecretKey;
use tessera_primitives::{
    Address, Certificate, Coin, Hash, MetadataError, Metadatum, MultiAsset, Network,
    StakeCredential, Transaction, TransactionInput, TransactionOutput, UTxO, Value,
};
use test_case::test_case;
use tessera_txbuilder::{
    fee, min_lovelace, wait_for_confirmation, BuildEvent, BuildOptions, BuildStage, ChainContext,
    LargestFirst, MemoryContext, ProtocolParameters, SelectionError, Signer, Token, TokenPolicy,
    TransactionBuilder, TxBuilderError,
};

const ADA: Coin = 1_000_000;

fn key() -> SecretKey {
    SecretKey::from([7; 32])
}

fn stake_key() -> SecretKey {
    SecretKey::from([8; 32])
}

fn address_of(key: &SecretKey) -> Address {
    ShelleyAddress::new(
        Network::Testnet,
        ShelleyPaymentPart::Key(key.key_hash()),
        ShelleyDelegationPart::Null,
    )
    .into()
}

fn recipient() -> Address {
    ShelleyAddress::new(
        Network::Testnet,
        ShelleyPaymentPart::Key(Hash::new([2; 28])),
        ShelleyDelegationPart::Null,
    )
    .into()
}

fn utxo(index: u64, address: &Address, amount: Value) -> UTxO {
    UTxO::new(
        TransactionInput::new(Hash::new([5; 32]), index),
        TransactionOutput::new(address.clone(), amount),
    )
}

fn context() -> MemoryContext {
    MemoryContext::new(Network::Testnet, ProtocolParameters::default()).with_slot(50_000)
}

/// Coin paid by the linear fee for a transaction of this many bytes
fn linear_fee(tx: &Transaction) -> Coin {
    fee(
        &ProtocolParameters::default(),
        tx.encode_fragment().unwrap().len() as u64,
        0,
        0,
    )
}

fn output_total(tx: &Transaction) -> Value {
    tx.transaction_body.outputs.iter().map(|x| &x.amount).sum()
}

#[test]
fn single_input_pays_exact_fee() {
    let key = key();
    let address = address_of(&key);
    let context = context();

    let tx = TransactionBuilder::new(&context)
        .input(utxo(0, &address, Value::new(5 * ADA)))
        .build_and_sign(&[&key], Some(address.clone()))
        .unwrap();

    let body = &tx.transaction_body;

    assert_eq!(body.fee, linear_fee(&tx));
    assert_eq!(body.outputs.len(), 1);
    assert_eq!(body.outputs[0].address, address);
    assert_eq!(body.outputs[0].amount, Value::new(5 * ADA - body.fee));

    let witnesses = tx.transaction_witness_set.vkeywitness.as_ref().unwrap();
    assert_eq!(witnesses.len(), 1);
    assert!(witnesses[0].vkey.verify(tx.id().unwrap(), &witnesses[0].signature));
}

#[test_case(1_000 ; "fee fits in two bytes")]
#[test_case(50_000 ; "fee below the u32 range")]
#[test_case(155_381 ; "mainnet constant")]
fn fee_matches_final_size(min_fee_constant: Coin) {
    let key = key();
    let address = address_of(&key);

    let params = ProtocolParameters {
        min_fee_constant,
        ..Default::default()
    };

    let context = MemoryContext::new(Network::Testnet, params.clone());

    let tx = TransactionBuilder::new(&context)
        .input(utxo(0, &address, Value::new(5 * ADA)))
        .build_and_sign(&[&key], Some(address))
        .unwrap();

    let size = tx.encode_fragment().unwrap().len() as u64;
    let body = &tx.transaction_body;

    assert_eq!(body.fee, fee(&params, size, 0, 0));
    assert_eq!(body.outputs[0].amount, Value::new(5 * ADA - body.fee));
}

#[test]
fn fee_settles_when_it_crosses_u16() {
    let key = key();
    let address = address_of(&key);

    // the first estimates stay below 65536 while the final fee needs a u32
    for min_fee_constant in (55_000..59_000).step_by(37) {
        let params = ProtocolParameters {
            min_fee_constant,
            ..Default::default()
        };

        let context = MemoryContext::new(Network::Testnet, params.clone());

        let tx = TransactionBuilder::new(&context)
            .input(utxo(0, &address, Value::new(5 * ADA)))
            .build_and_sign(&[&key], Some(address.clone()))
            .unwrap();

        let size = tx.encode_fragment().unwrap().len() as u64;
        let body = &tx.transaction_body;

        assert_eq!(body.fee, fee(&params, size, 0, 0), "constant {min_fee_constant}");
        assert_eq!(body.outputs[0].amount, Value::new(5 * ADA - body.fee));
    }
}

#[test]
fn zero_coin_output_gets_min_lovelace() {
    let key = key();
    let address = address_of(&key);
    let context = context();

    let policy = Hash::new([3; 28]);
    let name = tessera_primitives::AssetName::try_from("Coin").unwrap();
    let held = MultiAsset::new().with_asset(policy, name.clone(), 500);
    let sent = MultiAsset::new().with_asset(policy, name.clone(), 200);

    let output = TransactionOutput::new(recipient(), Value::with_assets(0, sent.clone()));
    let required = min_lovelace(&output, &ProtocolParameters::default()).unwrap();

    let built = TransactionBuilder::new(&context)
        .input(utxo(0, &address, Value::with_assets(10 * ADA, held)))
        .output(output)
        .build(Some(address.clone()))
        .unwrap();

    let outputs = &built.body.outputs;
    assert_eq!(outputs[0].amount, Value::with_assets(required, sent));

    // the rest of the tokens come back as change
    assert_eq!(outputs[1].address, address);
    assert_eq!(outputs[1].amount.multi_asset.get(&policy, &name), 300);
    assert_eq!(
        outputs[1].amount.coin,
        10 * ADA - required - built.body.fee
    );
}

#[test]
fn output_below_minimum_is_rejected() {
    let key = key();
    let address = address_of(&key);
    let context = context();

    let err = TransactionBuilder::new(&context)
        .input(utxo(0, &address, Value::new(10 * ADA)))
        .output(TransactionOutput::new(recipient(), Value::new(100_000)))
        .build(Some(address))
        .unwrap_err();

    assert!(matches!(
        err,
        TxBuilderError::OutputBelowMinimum {
            index: 0,
            coin: 100_000,
            ..
        }
    ));
}

#[test]
fn oversized_metadata_is_rejected() {
    let err = Metadatum::from_json(&json!({ "note": "a".repeat(65) })).unwrap_err();
    assert!(matches!(err, MetadataError::TooLong { len: 65, .. }));

    let policy = TokenPolicy::generate("art", &[key().key_hash()], None);
    let token = Token::new(policy, "Art", 1).unwrap();

    let err = token
        .with_metadata(&json!({ "image": "b".repeat(64), "name": "c".repeat(70) }))
        .unwrap_err();

    assert!(matches!(
        err,
        TxBuilderError::Metadata(MetadataError::TooLong { len: 70, .. })
    ));
}

#[test]
fn oversized_transaction_is_rejected() {
    let key = key();
    let address = address_of(&key);

    let params = ProtocolParameters {
        max_tx_size: 200,
        ..Default::default()
    };

    let context = MemoryContext::new(Network::Testnet, params);

    let mut builder = TransactionBuilder::new(&context);

    for index in 0..5 {
        builder = builder.input(utxo(index, &address, Value::new(5 * ADA)));
    }

    let err = builder.build(Some(address)).unwrap_err();

    match err {
        TxBuilderError::SizeExceeded { size, max } => {
            assert_eq!(max, 200);
            assert!(size > 200);
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn excluded_input_conflicts() {
    let key = key();
    let address = address_of(&key);
    let context = context();

    let spent = utxo(0, &address, Value::new(5 * ADA));

    let err = TransactionBuilder::new(&context)
        .input(spent.clone())
        .exclude_input(spent.input.clone())
        .build(Some(address))
        .unwrap_err();

    assert!(matches!(err, TxBuilderError::InputConflict(_)));
}

#[test]
fn zero_donation_is_rejected() {
    let key = key();
    let address = address_of(&key);
    let context = context();

    let err = TransactionBuilder::new(&context)
        .input(utxo(0, &address, Value::new(5 * ADA)))
        .donation(0)
        .build(Some(address))
        .unwrap_err();

    assert!(matches!(err, TxBuilderError::TreasuryDonation));
}

#[test]
fn change_merges_into_existing_output() {
    let key = key();
    let address = address_of(&key);
    let context = context();

    let built = TransactionBuilder::new(&context)
        .options(BuildOptions {
            merge_change: true,
            ..Default::default()
        })
        .input(utxo(0, &address, Value::new(10 * ADA)))
        .output(TransactionOutput::new(recipient(), Value::new(3 * ADA)))
        .output(TransactionOutput::new(address.clone(), Value::new(2 * ADA)))
        .build(Some(address.clone()))
        .unwrap();

    let outputs = &built.body.outputs;
    assert_eq!(outputs.len(), 2);
    assert_eq!(outputs[0].amount, Value::new(3 * ADA));
    assert_eq!(outputs[1].address, address);
    assert_eq!(outputs[1].amount.coin, 7 * ADA - built.body.fee);
}

#[test]
fn whole_surplus_goes_to_fee_without_change_address() {
    let key = key();
    let address = address_of(&key);
    let context = context();

    let built = TransactionBuilder::new(&context)
        .input(utxo(0, &address, Value::new(5 * ADA)))
        .output(TransactionOutput::new(recipient(), Value::new(4_500_000)))
        .build(None)
        .unwrap();

    assert_eq!(built.body.fee, 500_000);
    assert_eq!(built.body.outputs.len(), 1);

    let err = TransactionBuilder::new(&context)
        .input(utxo(0, &address, Value::new(5 * ADA)))
        .output(TransactionOutput::new(recipient(), Value::new(4_950_000)))
        .build(None)
        .unwrap_err();

    // nothing left to select from
    assert!(matches!(
        err,
        TxBuilderError::Selection(SelectionError::AllSelectorsFailed { .. })
    ));
}

#[test]
fn observer_sees_every_stage() {
    let key = key();
    let address = address_of(&key);
    let context = context();

    let events = Rc::new(RefCell::new(vec![]));
    let sink = events.clone();

    let builder = TransactionBuilder::new(&context)
        .observer(move |e: &BuildEvent| sink.borrow_mut().push(e.clone()))
        .input(utxo(0, &address, Value::new(5 * ADA)))
        .output(TransactionOutput::new(recipient(), Value::new(2 * ADA)));

    assert_eq!(
        events.borrow().as_slice(),
        &[BuildEvent::Stage(BuildStage::Accumulating)]
    );

    let built = builder.build(Some(address)).unwrap();

    let events = events.borrow();

    assert_eq!(events[0], BuildEvent::Stage(BuildStage::Accumulating));
    assert_eq!(events[1], BuildEvent::Stage(BuildStage::Balancing));
    assert_eq!(
        events.last(),
        Some(&BuildEvent::Stage(BuildStage::Finalized))
    );

    let passes: Vec<u8> = events
        .iter()
        .filter_map(|e| match e {
            BuildEvent::FeePass { pass, .. } => Some(*pass),
            _ => None,
        })
        .collect();

    assert_eq!(passes, vec![1, 2]);

    let finalized = events
        .iter()
        .find_map(|e| match e {
            BuildEvent::Finalized { fee, .. } => Some(*fee),
            _ => None,
        })
        .unwrap();

    assert_eq!(finalized, built.body.fee);

    // explicit inputs were enough, no selector ran
    assert!(!events
        .iter()
        .any(|e| matches!(e, BuildEvent::SelectorAttempt { .. })));
}

#[test]
fn selects_from_input_address_and_submits() {
    let key = key();
    let address = address_of(&key);

    let context = context()
        .with_utxo(utxo(0, &address, Value::new(5 * ADA)))
        .with_utxo(utxo(1, &address, Value::new(4 * ADA)))
        .with_utxo(utxo(2, &address, Value::new(2 * ADA)));

    let tx = TransactionBuilder::new(&context)
        .selectors(vec![Box::new(LargestFirst)])
        .input_address(address.clone())
        .output(TransactionOutput::new(recipient(), Value::new(3 * ADA)))
        .build_and_sign(&[&key], Some(address.clone()))
        .unwrap();

    let body = &tx.transaction_body;
    assert_eq!(body.inputs.len(), 1);
    assert_eq!(body.inputs[0].index, 0);

    let mut spent = output_total(&tx);
    spent.coin += body.fee;
    assert_eq!(spent, Value::new(5 * ADA));

    let id = context.submit_tx(&tx.encode_fragment().unwrap()).unwrap();
    assert_eq!(id, tx.id().unwrap());

    let confirmed = wait_for_confirmation(&context, &recipient(), &id, 1, Duration::ZERO).unwrap();
    assert!(confirmed);

    let left: Vec<u64> = context
        .utxos(&address)
        .unwrap()
        .iter()
        .filter(|x| x.input.transaction_id != id)
        .map(|x| x.input.index)
        .collect();

    assert_eq!(left, vec![1, 2]);
}

#[test]
fn random_selection_balances() {
    let key = key();
    let address = address_of(&key);

    let mut context = context();

    for index in 0..8 {
        context = context.with_utxo(utxo(index, &address, Value::new((index + 1) * ADA)));
    }

    let tx = TransactionBuilder::new(&context)
        .input_address(address.clone())
        .output(TransactionOutput::new(recipient(), Value::new(12 * ADA)))
        .build_and_sign(&[&key], Some(address))
        .unwrap();

    let spent: Coin = tx
        .transaction_body
        .inputs
        .iter()
        .map(|x| (x.index + 1) * ADA)
        .sum();

    assert_eq!(spent, output_total(&tx).coin + tx.transaction_body.fee);
    assert!(tx.transaction_body.fee >= linear_fee(&tx));
}

#[test]
fn nothing_to_spend_fails() {
    let context = context();

    let err = TransactionBuilder::new(&context)
        .output(TransactionOutput::new(recipient(), Value::new(2 * ADA)))
        .build(None)
        .unwrap_err();

    assert!(matches!(err, TxBuilderError::NoInputs));
}

#[test]
fn stake_registration_charges_deposit() {
    let key = key();
    let stake = stake_key();
    let address = address_of(&key);
    let context = context();

    let credential = StakeCredential::AddrKeyhash(stake.key_hash());

    let tx = TransactionBuilder::new(&context)
        .input(utxo(0, &address, Value::new(10 * ADA)))
        .certificate(Certificate::StakeRegistration(credential.clone()))
        .certificate(Certificate::StakeDelegation(credential, Hash::new([9; 28])))
        .build_and_sign(&[&key, &stake], Some(address))
        .unwrap();

    let body = &tx.transaction_body;
    let deposit = ProtocolParameters::default().key_deposit;

    assert_eq!(body.outputs[0].amount.coin, 10 * ADA - deposit - body.fee);
    assert_eq!(body.fee, linear_fee(&tx));

    let witnesses = tx.transaction_witness_set.vkeywitness.as_ref().unwrap();
    assert_eq!(witnesses.len(), 2);
}

#[test]
fn withdrawal_adds_to_change() {
    let key = key();
    let stake = stake_key();
    let address = address_of(&key);
    let context = context();

    let account = StakeAddress::new(Network::Testnet, StakePayload::Stake(stake.key_hash()));

    let tx = TransactionBuilder::new(&context)
        .input(utxo(0, &address, Value::new(2 * ADA)))
        .withdrawal(account, 3 * ADA)
        .build_and_sign(&[&key, &stake], Some(address))
        .unwrap();

    let body = &tx.transaction_body;
    assert_eq!(body.outputs[0].amount.coin, 5 * ADA - body.fee);
    assert_eq!(body.fee, linear_fee(&tx));
}

#[test]
fn unneeded_signers_are_skipped() {
    let key = key();
    let address = address_of(&key);
    let context = context();

    let tx = TransactionBuilder::new(&context)
        .input(utxo(0, &address, Value::new(5 * ADA)))
        .build_and_sign(&[&key, &stake_key()], Some(address))
        .unwrap();

    let witnesses = tx.transaction_witness_set.vkeywitness.as_ref().unwrap();
    assert_eq!(witnesses.len(), 1);
    assert_eq!(witnesses[0].vkey, key.public_key());
}

#[test]
fn mints_tokens_with_metadata() {
    let key = key();
    let address = address_of(&key);
    let context = context();

    let policy = TokenPolicy::generate("art", &[key.key_hash()], Some(90_000));
    let policy_id = policy.policy_id().unwrap();

    let token = Token::new(policy, "Piece", 1)
        .unwrap()
        .with_metadata(&json!({ "name": "Piece #1" }))
        .unwrap();

    let tx = TransactionBuilder::new(&context)
        .input(utxo(0, &address, Value::new(5 * ADA)))
        .token(token)
        .build_and_sign(&[&key], Some(address))
        .unwrap();

    let body = &tx.transaction_body;
    let name = tessera_primitives::AssetName::try_from("Piece").unwrap();

    assert_eq!(body.mint.as_ref().unwrap().get(&policy_id, &name), 1);
    assert_eq!(body.outputs[0].amount.multi_asset.get(&policy_id, &name), 1);
    assert_eq!(body.outputs[0].amount.coin, 5 * ADA - body.fee);

    // scripts bound the validity around the tip
    assert_eq!(body.validity_interval_start, Some(49_000));
    assert_eq!(body.ttl, Some(60_000));

    let scripts = tx.transaction_witness_set.native_script.as_ref().unwrap();
    assert_eq!(scripts.len(), 1);

    let aux = tx.auxiliary_data.as_ref().unwrap();
    assert_eq!(body.auxiliary_data_hash, Some(aux.hash().unwrap()));
    assert!(aux.metadata().unwrap().iter().any(|(label, _)| *label == 721));

    assert_eq!(body.fee, linear_fee(&tx));
}
