use std::collections::BTreeSet;

use tessera_codec::Fragment;
use tessera_primitives::{Coin, MultiAsset, TransactionOutput, Value};

use crate::ProtocolParameters;

/// Overhead, in bytes, charged on top of every serialized output
const UTXO_CONSTANT_OVERHEAD: u64 = 160;

/// Size, in words, of a pre-Alonzo UTxO entry without assets
const UTXO_ENTRY_WORDS: u64 = 27;

/// Extra words charged for a datum hash on pre-Alonzo outputs
const DATUM_HASH_WORDS: u64 = 10;

const POLICY_ID_SIZE: u64 = 28;

/// Coin assumed while sizing an output that doesn't carry any yet
const PLACEHOLDER_COIN: Coin = 1_000_000;

/// Minimum fee for a transaction of `size` bytes running the given execution
/// budget
///
/// Linear in the size; the execution terms are priced with the protocol's
/// fractional prices and floored.
pub fn fee(params: &ProtocolParameters, size: u64, exec_steps: u64, exec_mem: u64) -> Coin {
    params
        .min_fee_constant
        .saturating_add(params.min_fee_coefficient.saturating_mul(size))
        .saturating_add(params.price_step.mul_floor(exec_steps))
        .saturating_add(params.price_mem.mul_floor(exec_mem))
}

/// Fee of the largest transaction the protocol accepts
pub fn max_tx_fee(params: &ProtocolParameters) -> Coin {
    fee(
        params,
        params.max_tx_size,
        params.max_tx_ex_steps,
        params.max_tx_ex_mem,
    )
}

/// Size of a multi-asset bundle in 8 byte words
///
/// Asset names shared by several policies are only counted once.
pub fn bundle_size(multi_asset: &MultiAsset) -> u64 {
    let num_policies = multi_asset.policy_count() as u64;
    let num_assets = multi_asset.asset_count() as u64;

    let unique_names: BTreeSet<&[u8]> = multi_asset
        .iter()
        .map(|(_, name, _)| name.as_slice())
        .collect();

    let names_len: u64 = unique_names.iter().map(|x| x.len() as u64).sum();

    let byte_len = num_assets * 12 + names_len + num_policies * POLICY_ID_SIZE;

    6 + (byte_len + 7) / 8
}

/// Minimum coin of an output under the pre-Alonzo rules
pub fn min_lovelace_pre_alonzo(amount: &Value, params: &ProtocolParameters, has_datum: bool) -> Coin {
    if amount.is_pure_coin() {
        return params.min_utxo;
    }

    let datum_words = if has_datum { DATUM_HASH_WORDS } else { 0 };
    let words = UTXO_ENTRY_WORDS + bundle_size(&amount.multi_asset) + datum_words;

    words.saturating_mul(params.coins_per_utxo_word)
}

/// Minimum coin an output must carry, priced by its serialized size
///
/// The output is sized in its post-Alonzo map form. An output without coin is
/// sized as if it held one ada so the coin field isn't underestimated.
pub fn min_lovelace_post_alonzo(
    output: &TransactionOutput,
    params: &ProtocolParameters,
) -> Result<Coin, tessera_codec::Error> {
    let mut sized = output.clone().post_alonzo();

    if sized.amount.coin == 0 {
        sized.amount.coin = PLACEHOLDER_COIN;
    }

    let len = sized.encode_fragment()?.len() as u64;

    Ok((UTXO_CONSTANT_OVERHEAD + len).saturating_mul(params.coins_per_utxo_byte))
}

/// Minimum coin an output must carry under the current rules
pub fn min_lovelace(
    output: &TransactionOutput,
    params: &ProtocolParameters,
) -> Result<Coin, tessera_codec::Error> {
    min_lovelace_post_alonzo(output, params)
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use proptest::prelude::*;
    use tessera_primitives::{Address, AssetName, Hash};
    use test_case::test_case;

    use super::*;

    const ADDRESS: &str = "addr_test1vrm9x2zsux7va6w892g38tvchnzahvcd9tykqf3ygnmwtaqyfg52x";

    fn policy(byte: u8) -> Hash<28> {
        Hash::new([byte; 28])
    }

    const LONG_1: &str = "11111111111111111111111111111111";
    const LONG_2: &str = "22222222222222222222222222222222";
    const LONG_3: &str = "33333333333333333333333333333333";

    #[test]
    fn linear_fee() {
        let params = ProtocolParameters::default();
        assert_eq!(fee(&params, 0, 0, 0), 155_381);
        assert_eq!(fee(&params, 200, 0, 0), 164_181);
        assert_eq!(fee(&params, 200, 10_000_000, 1_000), 164_181 + 721 + 57);
    }

    #[test]
    fn max_fee_covers_full_budget() {
        let params = ProtocolParameters::default();
        assert_eq!(max_tx_fee(&params), 720_896 + 155_381 + 721_000 + 577_000);
    }

    #[test_case(&[('1', "", 1_000_000)], false => 1_310_316; "one policy empty name")]
    #[test_case(&[('1', "1", 1_000_000)], false => 1_344_798; "one policy one char")]
    #[test_case(&[('1', "1", 1), ('1', "2", 2), ('1', "3", 3)], false => 1_448_244; "three assets")]
    #[test_case(&[('1', "", 1), ('2', "", 1)], false => 1_482_726; "two policies shared name")]
    #[test_case(&[('1', "1", 1), ('2', "2", 1)], false => 1_517_208; "two policies")]
    #[test_case(&[('1', "", 1_000_000)], true => 1_655_136; "with datum hash")]
    #[test_case(&[('1', LONG_1, 1), ('1', LONG_2, 1), ('1', LONG_3, 1)], true => 2_172_366; "long names with datum hash")]
    #[test_case(&[('1', "", 1), ('2', "", 1)], true => 1_827_546; "two policies with datum hash")]
    fn pre_alonzo_minimum(entries: &[(char, &str, i64)], has_datum: bool) -> Coin {
        let ma: MultiAsset = entries
            .iter()
            .map(|(p, n, q)| (policy(*p as u8), AssetName::try_from(*n).unwrap(), *q))
            .collect();

        let amount = Value::with_assets(2_000_000, ma);
        min_lovelace_pre_alonzo(&amount, &ProtocolParameters::default(), has_datum)
    }

    #[test]
    fn pre_alonzo_large_bundle() {
        let entries: Vec<(u8, Vec<u8>, i64)> = (0u8..96)
            .map(|i| (b'1' + i / 32, vec![i], 1_000_000 * i as i64 + 1))
            .collect();

        let ma: MultiAsset = entries
            .iter()
            .map(|(p, n, q)| (policy(*p), AssetName::new(n.clone()).unwrap(), *q))
            .collect();

        let amount = Value::with_assets(2_000_000, ma);
        let params = ProtocolParameters::default();
        assert_eq!(min_lovelace_pre_alonzo(&amount, &params, false), 6_896_400);
    }

    #[test]
    fn pre_alonzo_pure_coin() {
        let params = ProtocolParameters::default();
        assert_eq!(
            min_lovelace_pre_alonzo(&Value::new(5), &params, false),
            params.min_utxo
        );
    }

    #[test]
    fn post_alonzo_minimum() {
        let params = ProtocolParameters::default();
        let address = Address::from_str(ADDRESS).unwrap();

        let pure = TransactionOutput::new(address.clone(), Value::new(2_000_000));
        assert_eq!(min_lovelace(&pure, &params).unwrap(), (160 + 39) * 4_310);

        let empty = TransactionOutput::new(address.clone(), Value::new(0));
        assert_eq!(min_lovelace(&empty, &params).unwrap(), (160 + 39) * 4_310);

        let token = AssetName::try_from("token9").unwrap();
        let tokens = Value::with_assets(0, MultiAsset::new().with_asset(policy(b'1'), token, 1_000));
        let with_assets = TransactionOutput::new(address, tokens);
        assert_eq!(min_lovelace(&with_assets, &params).unwrap(), (160 + 82) * 4_310);
    }

    proptest! {
        #[test]
        fn fee_is_monotonic_in_size(a in 0u64..1_000_000, b in 0u64..1_000_000) {
            let params = ProtocolParameters::default();
            let (small, large) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(fee(&params, small, 0, 0) <= fee(&params, large, 0, 0));
        }

        #[test]
        fn minimum_grows_with_bundle(count in 1usize..40) {
            let params = ProtocolParameters::default();
            let address = Address::from_str(ADDRESS).unwrap();

            let make = |n: usize| {
                let ma: MultiAsset = (0..n)
                    .map(|i| (policy(7), AssetName::new(format!("asset{i}").into_bytes()).unwrap(), 1))
                    .collect();
                TransactionOutput::new(address.clone(), Value::with_assets(0, ma))
            };

            let smaller = min_lovelace(&make(count), &params).unwrap();
            let larger = min_lovelace(&make(count + 1), &params).unwrap();
            prop_assert!(smaller < larger);
            prop_assert_eq!(smaller, min_lovelace(&make(count), &params).unwrap());
        }
    }
}
