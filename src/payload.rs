// Copyright 2022 Webb Technologies Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Assembly of the relay payload handed to the destination bridge contract.
//!
//! The byte layout here is a wire-format contract with the bridge proxy's
//! decoder: `[r_address (20)][signature (32)][message]`. A single wrong byte
//! produces a payload that fails on-chain signature verification, so this
//! module is covered by exact golden tests.

use crate::types::SigningResult;

/// Target width of the address-recovery component.
pub const R_ADDRESS_WIDTH: usize = 20;
/// Target width of the signature component.
pub const SIGNATURE_WIDTH: usize = 32;

/// The opaque byte string relayed to the destination bridge contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayPayload(Vec<u8>);

impl RelayPayload {
    /// Assembles the payload from the components of a finalized signing
    /// result.
    ///
    /// The address-recovery component is left-zero-padded to 20 bytes and
    /// the signature to 32 bytes. Inputs already wider than their target are
    /// passed through untouched: the signing protocol guarantees
    /// well-formed widths, and truncating here would silently corrupt a
    /// cryptographic payload.
    pub fn assemble(r_address: &[u8], signature: &[u8], message: &[u8]) -> Self {
        let mut bytes = Vec::with_capacity(
            R_ADDRESS_WIDTH + SIGNATURE_WIDTH + message.len(),
        );
        bytes.extend_from_slice(&left_pad(r_address, R_ADDRESS_WIDTH));
        bytes.extend_from_slice(&left_pad(signature, SIGNATURE_WIDTH));
        bytes.extend_from_slice(message);
        Self(bytes)
    }

    /// The raw payload bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The payload as a `0x`-prefixed lowercase hex string.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.0))
    }
}

impl From<&SigningResult> for RelayPayload {
    fn from(result: &SigningResult) -> Self {
        Self::assemble(&result.r_address, &result.signature, &result.message)
    }
}

impl std::fmt::Display for RelayPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

fn left_pad(bytes: &[u8], width: usize) -> Vec<u8> {
    if bytes.len() >= width {
        return bytes.to_vec();
    }
    let mut padded = vec![0u8; width - bytes.len()];
    padded.extend_from_slice(bytes);
    padded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn golden_vector() {
        let payload =
            RelayPayload::assemble(&[0x01, 0x02], &[0xff], &[0xab, 0xcd]);
        let expected = format!(
            "0x{}0102{}ff{}",
            "00".repeat(18),
            "00".repeat(31),
            "abcd"
        );
        assert_eq!(payload.to_hex(), expected);
    }

    #[test]
    fn component_layout() {
        let r_address = [0x11u8; 5];
        let signature = [0x22u8; 9];
        let message = [0xde, 0xad, 0xbe, 0xef];
        let payload = RelayPayload::assemble(&r_address, &signature, &message);
        let bytes = payload.as_bytes();
        assert_eq!(bytes.len(), 20 + 32 + 4);
        // first 20 bytes: r_address right-aligned behind zero padding.
        assert!(bytes[..15].iter().all(|b| *b == 0));
        assert_eq!(&bytes[15..20], &r_address);
        // next 32 bytes: signature right-aligned behind zero padding.
        assert!(bytes[20..43].iter().all(|b| *b == 0));
        assert_eq!(&bytes[43..52], &signature);
        // remainder: the message, verbatim.
        assert_eq!(&bytes[52..], &message);
    }

    #[test]
    fn full_width_inputs_are_untouched() {
        let r_address = [0xaau8; 20];
        let signature = [0xbbu8; 32];
        let payload = RelayPayload::assemble(&r_address, &signature, &[]);
        assert_eq!(&payload.as_bytes()[..20], &r_address);
        assert_eq!(&payload.as_bytes()[20..52], &signature);
    }

    #[test]
    fn oversized_inputs_are_never_truncated() {
        let r_address = [0x01u8; 25];
        let payload = RelayPayload::assemble(&r_address, &[0xff], &[]);
        assert_eq!(&payload.as_bytes()[..25], &r_address);
        assert_eq!(payload.as_bytes().len(), 25 + 32);
    }

    #[test]
    fn hex_round_trips() {
        let payload = RelayPayload::assemble(&[0x01, 0x02], &[0xff], &[0xab]);
        let hex_str = payload.to_hex();
        let decoded =
            hex::decode(hex_str.strip_prefix("0x").unwrap()).unwrap();
        assert_eq!(decoded, payload.as_bytes());
        assert_eq!(format!("0x{}", hex::encode(decoded)), hex_str);
    }

    #[test]
    fn output_is_lowercase_hex() {
        let payload = RelayPayload::assemble(&[0xAB], &[0xCD], &[0xEF]);
        let hex_str = payload.to_hex();
        assert!(hex_str.starts_with("0x"));
        assert!(hex_str[2..]
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    }
}
