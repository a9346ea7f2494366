/// Size of an ed25519 public key
const PUBKEY_LEN: usize = 32;

/// Check that an address is a transaction-capable wallet address.
///
/// Only addresses that decode from base-58 to exactly 32 bytes qualify.
/// Token-account receivers and other derived accounts are excluded upstream
/// by inferring the buyer from the payment side.
pub fn is_transactable(address: &str) -> bool {
    match bs58::decode(address).into_vec() {
        Ok(bytes) => bytes.len() == PUBKEY_LEN,
        Err(_) => false,
    }
}
