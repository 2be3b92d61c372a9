//! ENS reverse resolution helpers.

use alloy_primitives::{Address, B256, address, hex, keccak256};
use alloy_sol_types::sol;

/// The ENS registry, deployed at the same address on mainnet and its testnets.
pub(crate) const ENS_REGISTRY: Address = address!("0x00000000000C2E074eC69A0dFb2997BA6C7d2e1e");

sol! {
    #[allow(missing_docs, unreachable_pub)]
    interface EnsRegistry {
        function resolver(bytes32 node) external view returns (address);
    }

    #[allow(missing_docs, unreachable_pub)]
    interface EnsResolver {
        function name(bytes32 node) external view returns (string);
        function addr(bytes32 node) external view returns (address);
    }
}

/// Computes the EIP-137 namehash of `name`.
pub(crate) fn namehash(name: &str) -> B256 {
    name.rsplit('.').filter(|label| !label.is_empty()).fold(B256::ZERO, |node, label| {
        let mut buf = [0u8; 64];
        buf[..32].copy_from_slice(node.as_slice());
        buf[32..].copy_from_slice(keccak256(label.as_bytes()).as_slice());
        keccak256(buf)
    })
}

/// Namehash of the reverse record of `address`.
pub(crate) fn reverse_node(address: Address) -> B256 {
    namehash(&format!("{}.addr.reverse", hex::encode(address)))
}
