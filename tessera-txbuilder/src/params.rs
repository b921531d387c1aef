use serde::{Deserialize, Serialize};
use tessera_primitives::{Coin, RationalNumber};

/// Protocol parameters consulted while selecting inputs and estimating fees
///
/// Loads from the camelCase json documents served by chain indexers. The
/// [`Default`] preset matches the Babbage-era mainnet values and is meant for
/// offline builds and tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolParameters {
    pub min_fee_constant: Coin,
    pub min_fee_coefficient: Coin,
    pub max_block_size: u64,
    pub max_tx_size: u64,
    pub max_block_header_size: u64,
    pub key_deposit: Coin,
    pub pool_deposit: Coin,
    pub min_pool_cost: Coin,
    pub price_mem: RationalNumber,
    pub price_step: RationalNumber,
    pub max_tx_ex_mem: u64,
    pub max_tx_ex_steps: u64,
    pub max_val_size: u64,
    pub collateral_percent: u64,
    pub max_collateral_inputs: u64,
    /// Pre-Alonzo minimum for a pure coin output
    pub min_utxo: Coin,
    pub coins_per_utxo_word: Coin,
    pub coins_per_utxo_byte: Coin,
    pub protocol_major_version: u64,
    pub protocol_minor_version: u64,
}

impl ProtocolParameters {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl Default for ProtocolParameters {
    fn default() -> Self {
        Self {
            min_fee_constant: 155_381,
            min_fee_coefficient: 44,
            max_block_size: 73_728,
            max_tx_size: 16_384,
            max_block_header_size: 1_100,
            key_deposit: 2_000_000,
            pool_deposit: 500_000_000,
            min_pool_cost: 340_000_000,
            price_mem: RationalNumber::new(577, 10_000),
            price_step: RationalNumber::new(721, 10_000_000),
            max_tx_ex_mem: 10_000_000,
            max_tx_ex_steps: 10_000_000_000,
            max_val_size: 5_000,
            collateral_percent: 150,
            max_collateral_inputs: 3,
            min_utxo: 1_000_000,
            coins_per_utxo_word: 34_482,
            coins_per_utxo_byte: 4_310,
            protocol_major_version: 8,
            protocol_minor_version: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_camel_case_json() {
        let json = serde_json::to_string(&ProtocolParameters::default()).unwrap();
        assert!(json.contains("\"minFeeCoefficient\":44"));
        assert!(json.contains("\"coinsPerUtxoByte\":4310"));

        let params = ProtocolParameters::from_json(&json).unwrap();
        assert_eq!(params, ProtocolParameters::default());
    }

    #[test]
    fn rejects_missing_fields() {
        assert!(ProtocolParameters::from_json(r#"{"minFeeConstant": 1}"#).is_err());
    }

    #[test]
    fn prices_are_fractions() {
        let mut value = serde_json::to_value(ProtocolParameters::default()).unwrap();
        value["priceMem"] = serde_json::json!({"numerator": 1, "denominator": 20});

        let params: ProtocolParameters = serde_json::from_value(value).unwrap();
        assert_eq!(params.price_mem, RationalNumber::new(1, 20));
    }
}
