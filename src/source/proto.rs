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

//! Hand-declared protobuf types for the single BandChain message this
//! relayer broadcasts. Field numbers follow `band.oracle.v1`.

use cosmrs::proto::cosmos::base::v1beta1::Coin;

/// Protobuf type URL of [`MsgRequestData`].
pub const MSG_REQUEST_DATA_TYPE_URL: &str = "/band.oracle.v1.MsgRequestData";

/// `band.oracle.v1.MsgRequestData`: asks the oracle to execute a script and
/// (via `tss_encoder`) hand the result to a threshold-signing group.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MsgRequestData {
    /// Identifier of the oracle script to execute.
    #[prost(int64, tag = "1")]
    pub oracle_script_id: i64,
    /// Opaque calldata passed to the script.
    #[prost(bytes = "vec", tag = "2")]
    pub calldata: ::prost::alloc::vec::Vec<u8>,
    /// Number of validators asked to report.
    #[prost(uint64, tag = "3")]
    pub ask_count: u64,
    /// Minimum number of reports for the request to resolve.
    #[prost(uint64, tag = "4")]
    pub min_count: u64,
    /// Free-form client identifier echoed in the result.
    #[prost(string, tag = "5")]
    pub client_id: ::prost::alloc::string::String,
    /// Maximum fee the request may consume.
    #[prost(message, repeated, tag = "6")]
    pub fee_limit: ::prost::alloc::vec::Vec<Coin>,
    /// Gas reserved for the prepare phase.
    #[prost(uint64, tag = "7")]
    pub prepare_gas: u64,
    /// Gas reserved for the execute phase.
    #[prost(uint64, tag = "8")]
    pub execute_gas: u64,
    /// Bech32 address of the request sender.
    #[prost(string, tag = "9")]
    pub sender: ::prost::alloc::string::String,
    /// How the result is encoded before threshold signing.
    #[prost(enumeration = "Encoder", tag = "10")]
    pub tss_encoder: i32,
}

/// `band.oracle.v1.Encoder`: result encoding applied before signing.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    ::prost::Enumeration,
)]
#[repr(i32)]
pub enum Encoder {
    /// Unspecified; rejected by the chain.
    Unspecified = 0,
    /// Raw protobuf encoding.
    Proto = 1,
    /// Full ABI encoding.
    FullAbi = 2,
    /// Partial ABI encoding; what the EVM bridge decoder expects.
    PartialAbi = 3,
}

#[cfg(test)]
mod tests {
    use prost::Message;

    use super::*;

    #[test]
    fn encodes_every_field() {
        let msg = MsgRequestData {
            oracle_script_id: 14,
            calldata: vec![0],
            ask_count: 6,
            min_count: 5,
            client_id: "test".to_owned(),
            fee_limit: vec![Coin {
                denom: "uband".to_owned(),
                amount: "100000".to_owned(),
            }],
            prepare_gas: 1_000,
            execute_gas: 6_000,
            sender: "band1xyz".to_owned(),
            tss_encoder: Encoder::PartialAbi as i32,
        };
        let bytes = msg.encode_to_vec();
        let decoded = MsgRequestData::decode(bytes.as_slice()).unwrap();
        assert_eq!(decoded, msg);
        assert_eq!(decoded.tss_encoder(), Encoder::PartialAbi);
    }
}
