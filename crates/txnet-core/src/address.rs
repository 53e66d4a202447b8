//! Address identity and per-chain format checks.

use bitcoin::address::NetworkUnchecked;
use bitcoin::{Address, Network};

/// Case-fold an address into its graph identity.
///
/// Base58 addresses are case-sensitive on chain, so the folded form is only
/// ever used as a node id, never sent back to a data source.
pub fn normalize(address: &str) -> String {
    address.to_lowercase()
}

/// Case-insensitive address equality.
pub fn same_address(a: &str, b: &str) -> bool {
    normalize(a) == normalize(b)
}

/// Optional per-chain capability: a pass/fail address format check.
///
/// Chains without a meaningful format check (account-model chains accept
/// any string) simply do not expose one.
pub trait AddressCheck: Send + Sync {
    fn validate_address(&self, address: &str) -> bool;
}

/// Mainnet Bitcoin address check covering legacy (`1…`), script-hash
/// (`3…`) and segwit (`bc1…`) encodings, including checksums.
pub struct BitcoinAddressCheck;

impl AddressCheck for BitcoinAddressCheck {
    fn validate_address(&self, address: &str) -> bool {
        is_valid_bitcoin_address(address)
    }
}

pub fn is_valid_bitcoin_address(address: &str) -> bool {
    let has_known_prefix = address.starts_with('1')
        || address.starts_with('3')
        || address
            .get(..3)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("bc1"));
    if !has_known_prefix {
        return false;
    }

    address
        .parse::<Address<NetworkUnchecked>>()
        .map(|parsed| parsed.is_valid_for_network(Network::Bitcoin))
        .unwrap_or(false)
}
