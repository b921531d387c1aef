use tessera_codec::Fragment;
use tessera_crypto::{
    hash::Hasher,
    key::ed25519::{PublicKey, SecretKey, SecretKeyExtended, Signature},
};
use tessera_primitives::{
    AddrKeyhash, AuxiliaryData, Set, Transaction, TransactionBody, TransactionId, VKeyWitness,
    WitnessSet,
};

/// A key able to witness transactions
pub trait Signer {
    fn public_key(&self) -> PublicKey;

    fn sign(&self, msg: &[u8]) -> Signature;

    /// Hash the ledger uses to identify this key
    fn key_hash(&self) -> AddrKeyhash {
        Hasher::<224>::hash(self.public_key().as_ref())
    }
}

impl Signer for SecretKey {
    fn public_key(&self) -> PublicKey {
        SecretKey::public_key(self)
    }

    fn sign(&self, msg: &[u8]) -> Signature {
        SecretKey::sign(self, msg)
    }
}

impl Signer for SecretKeyExtended {
    fn public_key(&self) -> PublicKey {
        SecretKeyExtended::public_key(self)
    }

    fn sign(&self, msg: &[u8]) -> Signature {
        SecretKeyExtended::sign(self, msg)
    }
}

/// A balanced transaction, waiting for its key witnesses
///
/// The body is final: adding or removing witnesses never changes the
/// transaction id.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltTransaction {
    pub body: TransactionBody,
    pub witness_set: WitnessSet,
    pub auxiliary_data: Option<AuxiliaryData>,
}

impl BuiltTransaction {
    /// The transaction id, which is also the message every key signs
    pub fn hash(&self) -> Result<TransactionId, tessera_codec::Error> {
        self.body.hash()
    }

    /// Adds a signature made elsewhere, replacing any previous signature of
    /// the same key
    pub fn add_signature(mut self, vkey: PublicKey, signature: Signature) -> Self {
        let mut witnesses = self
            .witness_set
            .vkeywitness
            .take()
            .map(Set::to_vec)
            .unwrap_or_default();

        witnesses.retain(|x| x.vkey != vkey);
        witnesses.push(VKeyWitness { vkey, signature });

        self.witness_set.vkeywitness = Some(Set::new(witnesses));
        self
    }

    pub fn remove_signature(mut self, vkey: &PublicKey) -> Self {
        let witnesses: Vec<_> = self
            .witness_set
            .vkeywitness
            .take()
            .map(Set::to_vec)
            .unwrap_or_default()
            .into_iter()
            .filter(|x| &x.vkey != vkey)
            .collect();

        if !witnesses.is_empty() {
            self.witness_set.vkeywitness = Some(Set::new(witnesses));
        }

        self
    }

    pub fn sign<S: Signer + ?Sized>(self, signer: &S) -> Result<Self, tessera_codec::Error> {
        let hash = self.hash()?;
        let signature = signer.sign(hash.as_ref());

        Ok(self.add_signature(signer.public_key(), signature))
    }

    pub fn signers(&self) -> Vec<PublicKey> {
        self.witness_set
            .vkeywitness
            .iter()
            .flat_map(|x| x.iter())
            .map(|x| x.vkey)
            .collect()
    }

    pub fn to_transaction(&self) -> Transaction {
        Transaction {
            transaction_body: self.body.clone(),
            transaction_witness_set: self.witness_set.clone(),
            success: true,
            auxiliary_data: self.auxiliary_data.clone(),
        }
    }

    /// Cbor of the complete transaction, ready for submission
    pub fn encode(&self) -> Result<Vec<u8>, tessera_codec::Error> {
        self.to_transaction().encode_fragment()
    }
}

impl From<BuiltTransaction> for Transaction {
    fn from(value: BuiltTransaction) -> Self {
        Transaction {
            transaction_body: value.body,
            transaction_witness_set: value.witness_set,
            success: true,
            auxiliary_data: value.auxiliary_data,
        }
    }
}
