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

//! Domain types crossing between the source-chain and destination-chain
//! halves of the relayer. All of these are cycle-scoped: created and
//! consumed within one relay cycle, never persisted.

use std::num::NonZeroU64;

use derive_more::Display;
use ethers::types::{H256, U64};

/// Identifier of one oracle request on the source chain.
///
/// Produced by the chain itself and extracted from the `request` event of
/// the submission transaction once the transaction is indexed.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
#[display(fmt = "{}", _0)]
pub struct RequestId(pub u64);

/// Identifier of the threshold-signing session assigned to a request.
///
/// Signing ids start at 1 on the source chain; zero on the wire means "not
/// assigned yet", which is why this is a [`NonZeroU64`] and raw values go
/// through [`SigningId::new`].
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
#[display(fmt = "{}", _0)]
pub struct SigningId(NonZeroU64);

impl SigningId {
    /// Converts a raw on-wire id, mapping the zero sentinel to `None`.
    pub fn new(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }

    /// The numeric id.
    pub fn get(self) -> u64 {
        self.0.get()
    }
}

/// One event emitted by a source-chain transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxEvent {
    /// The event type string, e.g. `request`.
    pub kind: String,
    /// Ordered key/value attribute pairs.
    pub attributes: Vec<(String, String)>,
}

/// Outcome of broadcasting the oracle request transaction.
#[derive(Debug, Clone)]
pub struct SourceTxResult {
    /// Hash of the accepted transaction, hex-encoded as returned by the chain.
    pub tx_hash: String,
    /// Events already attached to the broadcast response. Usually empty in
    /// sync broadcast mode; the full set becomes available once the
    /// transaction is indexed.
    pub events: Vec<TxEvent>,
}

/// The signing-related slice of an oracle request record.
#[derive(Debug, Clone, Copy)]
pub struct RequestStatus {
    /// The signing session assigned to the request, once the chain has
    /// assigned one.
    pub signing_id: Option<SigningId>,
}

/// The cryptographic artifact of a finalized threshold-signing session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningResult {
    /// Address-recovery component, at most 20 bytes.
    pub r_address: Vec<u8>,
    /// Signature component, at most 32 bytes. Empty while the signer group
    /// has not produced the signature yet.
    pub signature: Vec<u8>,
    /// The original signed message bytes.
    pub message: Vec<u8>,
}

impl SigningResult {
    /// Whether the signer group has produced the signature.
    ///
    /// A present record with an empty signature means the session is still
    /// pending, not that the signature is empty.
    pub fn is_complete(&self) -> bool {
        !self.signature.is_empty()
    }
}

/// Outcome of a successful destination-chain relay submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayReceipt {
    /// Hash of the mined relay transaction.
    pub tx_hash: H256,
    /// Block in which it was mined, if the node reported one.
    pub block_number: Option<U64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signing_id_zero_is_unassigned() {
        assert!(SigningId::new(0).is_none());
        assert_eq!(SigningId::new(7).unwrap().get(), 7);
    }

    #[test]
    fn empty_signature_means_pending() {
        let pending = SigningResult {
            r_address: vec![1, 2, 3],
            signature: vec![],
            message: vec![0xab],
        };
        assert!(!pending.is_complete());
        let complete = SigningResult {
            signature: vec![0xff],
            ..pending
        };
        assert!(complete.is_complete());
    }
}
