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

//! BandChain LCD (REST) implementation of [`SourceChainClient`].
//!
//! Transaction signing follows SIGN_MODE_DIRECT with a key derived from the
//! configured mnemonic. Broadcasts use sync mode, so CheckTx rejections
//! surface immediately as [`crate::Error::SubmissionFailed`] before any
//! polling starts.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use cosmrs::bip32;
use cosmrs::crypto::secp256k1::SigningKey;
use cosmrs::tendermint::chain;
use cosmrs::tx::{self, Fee, SignDoc, SignerInfo};
use cosmrs::{AccountId, Coin};
use prost::Message;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use super::proto;
use super::SourceChainClient;
use crate::config::{OracleRequestConfig, SourceChainConfig};
use crate::probe;
use crate::types::{
    RequestId, RequestStatus, SigningId, SigningResult, SourceTxResult,
    TxEvent,
};

const BROADCAST_MODE_SYNC: &str = "BROADCAST_MODE_SYNC";

/// A [`SourceChainClient`] speaking to a BandChain LCD endpoint.
pub struct BandLcdClient {
    http: reqwest::Client,
    lcd: String,
    chain_id: chain::Id,
    key: SigningKey,
    sender: AccountId,
    gas_limit: u64,
    fee: Coin,
}

impl BandLcdClient {
    /// Builds a client from the source-chain configuration, deriving the
    /// sender key from the configured mnemonic.
    pub fn new(config: &SourceChainConfig) -> crate::Result<Self> {
        let mnemonic = bip32::Mnemonic::new(
            config.mnemonic.phrase().trim(),
            bip32::Language::English,
        )
        .map_err(crate::Error::cosmos)?;
        let seed = mnemonic.to_seed("");
        let path = config
            .derivation_path
            .parse::<bip32::DerivationPath>()
            .map_err(crate::Error::cosmos)?;
        let key = SigningKey::derive_from_path(&seed, &path)
            .map_err(crate::Error::cosmos)?;
        let sender = key
            .public_key()
            .account_id(&config.account_prefix)
            .map_err(crate::Error::cosmos)?;
        let chain_id = config
            .chain_id
            .parse::<chain::Id>()
            .map_err(crate::Error::cosmos)?;
        // the fee the chain library would compute: ceil(limit * price).
        let fee_amount =
            (config.gas_limit as f64 * config.gas_price).ceil() as u128;
        let fee = Coin {
            denom: config
                .fee_denom
                .parse()
                .map_err(crate::Error::cosmos)?,
            amount: fee_amount,
        };
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        tracing::debug!(
            "Source chain sender address: {} on {}",
            sender,
            chain_id
        );
        Ok(Self {
            http,
            lcd: config.lcd_endpoint.as_str().trim_end_matches('/').to_owned(),
            chain_id,
            key,
            sender,
            gas_limit: config.gas_limit,
            fee,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.lcd, path)
    }

    /// Fetches the sender's account number and sequence.
    async fn account(&self) -> crate::Result<(u64, u64)> {
        let path = self
            .endpoint(&format!("cosmos/auth/v1beta1/accounts/{}", self.sender));
        let response: AccountResponse = self
            .get_json(&path)
            .await?
            .ok_or(crate::Error::Generic(
                "sender account not found on the source chain",
            ))?;
        let account_number = response
            .account
            .account_number
            .parse()
            .map_err(crate::Error::cosmos)?;
        let sequence = response
            .account
            .sequence
            .parse()
            .map_err(crate::Error::cosmos)?;
        Ok((account_number, sequence))
    }

    fn build_signed_tx(
        &self,
        request: &OracleRequestConfig,
        account_number: u64,
        sequence: u64,
    ) -> crate::Result<Vec<u8>> {
        let msg = proto::MsgRequestData {
            oracle_script_id: request.oracle_script_id,
            calldata: request.calldata.clone(),
            ask_count: request.ask_count,
            min_count: request.min_count,
            client_id: request.client_id.clone(),
            fee_limit: vec![cosmrs::proto::cosmos::base::v1beta1::Coin {
                denom: request.fee_limit_denom.clone(),
                amount: request.fee_limit_amount.to_string(),
            }],
            prepare_gas: request.prepare_gas,
            execute_gas: request.execute_gas,
            sender: self.sender.to_string(),
            tss_encoder: proto::Encoder::PartialAbi as i32,
        };
        let any = cosmrs::Any {
            type_url: proto::MSG_REQUEST_DATA_TYPE_URL.to_owned(),
            value: msg.encode_to_vec(),
        };
        let body = tx::Body::new(vec![any], "", 0u32);
        let signer_info =
            SignerInfo::single_direct(Some(self.key.public_key()), sequence);
        let auth_info = signer_info
            .auth_info(Fee::from_amount_and_gas(self.fee.clone(), self.gas_limit));
        let sign_doc =
            SignDoc::new(&body, &auth_info, &self.chain_id, account_number)
                .map_err(crate::Error::cosmos)?;
        let raw = sign_doc.sign(&self.key).map_err(crate::Error::cosmos)?;
        raw.to_bytes().map_err(crate::Error::cosmos)
    }

    /// GETs `path`, mapping 404/400 (resource not indexed/known yet) to
    /// `None` and any other non-success status to an error.
    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
    ) -> crate::Result<Option<T>> {
        let response = self.http.get(path).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(Some(response.json().await?));
        }
        if status == StatusCode::NOT_FOUND || status == StatusCode::BAD_REQUEST
        {
            return Ok(None);
        }
        Err(crate::Error::Lcd {
            status: status.as_u16(),
            body: response.text().await.unwrap_or_default(),
        })
    }
}

#[async_trait::async_trait]
impl SourceChainClient for BandLcdClient {
    async fn submit_request_tx(
        &self,
        request: &OracleRequestConfig,
    ) -> crate::Result<SourceTxResult> {
        let (account_number, sequence) = self.account().await?;
        let tx_bytes =
            self.build_signed_tx(request, account_number, sequence)?;
        let broadcast = BroadcastRequest {
            tx_bytes: BASE64.encode(tx_bytes),
            mode: BROADCAST_MODE_SYNC,
        };
        let response: BroadcastResponse = self
            .http
            .post(self.endpoint("cosmos/tx/v1beta1/txs"))
            .json(&broadcast)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let tx = response.tx_response;
        if tx.code != 0 {
            return Err(crate::Error::SubmissionFailed {
                code: tx.code,
                raw_log: tx.raw_log,
            });
        }
        tracing::event!(
            target: probe::TARGET,
            tracing::Level::DEBUG,
            kind = %probe::Kind::SourceTx,
            tx_hash = %tx.txhash,
            accepted = true,
        );
        Ok(SourceTxResult {
            tx_hash: tx.txhash,
            events: vec![],
        })
    }

    async fn tx_events(
        &self,
        tx_hash: &str,
    ) -> crate::Result<Option<Vec<TxEvent>>> {
        let path = self.endpoint(&format!("cosmos/tx/v1beta1/txs/{}", tx_hash));
        let response: Option<TxQueryResponse> = self.get_json(&path).await?;
        match response {
            Some(query) => {
                let tx = query.tx_response;
                if tx.code != 0 {
                    // the request tx was included but failed on delivery;
                    // no oracle request was created for it.
                    return Err(crate::Error::SubmissionFailed {
                        code: tx.code,
                        raw_log: tx.raw_log,
                    });
                }
                Ok(Some(events_from(tx.events)))
            }
            None => Ok(None),
        }
    }

    async fn request_status(
        &self,
        id: RequestId,
    ) -> crate::Result<Option<RequestStatus>> {
        let path = self.endpoint(&format!("oracle/v1/requests/{}", id));
        let response: Option<RequestQueryResponse> =
            self.get_json(&path).await?;
        match response {
            Some(query) => Ok(Some(status_from(query)?)),
            None => Ok(None),
        }
    }

    async fn signing_result(
        &self,
        id: SigningId,
    ) -> crate::Result<Option<SigningResult>> {
        let path =
            self.endpoint(&format!("bandtss/v1beta1/signings/{}", id.get()));
        let response: Option<SigningQueryResponse> =
            self.get_json(&path).await?;
        match response {
            Some(query) => Ok(Some(signing_from(query)?)),
            None => Ok(None),
        }
    }
}

fn events_from(events: Vec<RawEvent>) -> Vec<TxEvent> {
    events
        .into_iter()
        .map(|event| TxEvent {
            kind: event.kind,
            attributes: event
                .attributes
                .into_iter()
                .map(|attr| (attr.key, attr.value))
                .collect(),
        })
        .collect()
}

fn status_from(query: RequestQueryResponse) -> crate::Result<RequestStatus> {
    let signing_id = match query.signing {
        Some(signing) => {
            let raw: u64 =
                signing.signing_id.parse().map_err(crate::Error::cosmos)?;
            SigningId::new(raw)
        }
        None => None,
    };
    Ok(RequestStatus { signing_id })
}

fn signing_from(query: SigningQueryResponse) -> crate::Result<SigningResult> {
    let result = query.current_group_signing_result.unwrap_or_default();
    let signature = result
        .evm_signature
        .as_ref()
        .map(|sig| decode_b64(&sig.signature))
        .transpose()?
        .unwrap_or_default();
    let r_address = result
        .evm_signature
        .as_ref()
        .map(|sig| decode_b64(&sig.r_address))
        .transpose()?
        .unwrap_or_default();
    let message = result
        .signing
        .as_ref()
        .map(|signing| decode_b64(&signing.message))
        .transpose()?
        .unwrap_or_default();
    Ok(SigningResult {
        r_address,
        signature,
        message,
    })
}

fn decode_b64(value: &str) -> crate::Result<Vec<u8>> {
    if value.is_empty() {
        return Ok(vec![]);
    }
    Ok(BASE64.decode(value)?)
}

#[derive(Serialize)]
struct BroadcastRequest {
    tx_bytes: String,
    mode: &'static str,
}

#[derive(Deserialize)]
struct BroadcastResponse {
    tx_response: BroadcastTxResponse,
}

#[derive(Deserialize)]
struct BroadcastTxResponse {
    txhash: String,
    #[serde(default)]
    code: u32,
    #[serde(default)]
    raw_log: String,
}

#[derive(Deserialize)]
struct AccountResponse {
    account: BaseAccount,
}

#[derive(Deserialize)]
struct BaseAccount {
    account_number: String,
    sequence: String,
}

#[derive(Deserialize)]
struct TxQueryResponse {
    tx_response: TxResponse,
}

#[derive(Deserialize)]
struct TxResponse {
    #[serde(default)]
    code: u32,
    #[serde(default)]
    raw_log: String,
    #[serde(default)]
    events: Vec<RawEvent>,
}

#[derive(Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    attributes: Vec<RawAttribute>,
}

#[derive(Deserialize)]
struct RawAttribute {
    key: String,
    #[serde(default)]
    value: String,
}

#[derive(Deserialize)]
struct RequestQueryResponse {
    signing: Option<RawSigningStatus>,
}

#[derive(Deserialize)]
struct RawSigningStatus {
    signing_id: String,
}

#[derive(Deserialize)]
struct SigningQueryResponse {
    current_group_signing_result: Option<RawSigningResult>,
}

#[derive(Default, Deserialize)]
struct RawSigningResult {
    signing: Option<RawSigningInfo>,
    evm_signature: Option<RawEvmSignature>,
}

#[derive(Deserialize)]
struct RawSigningInfo {
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct RawEvmSignature {
    #[serde(default)]
    r_address: String,
    #[serde(default)]
    signature: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_tx_response_events() {
        let raw = r#"{
            "tx_response": {
                "code": 0,
                "events": [
                    {"type": "message", "attributes": [{"key": "action", "value": "request"}]},
                    {"type": "request", "attributes": [{"key": "id", "value": "42"}]}
                ]
            }
        }"#;
        let parsed: TxQueryResponse = serde_json::from_str(raw).unwrap();
        let events = events_from(parsed.tx_response.events);
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].kind, "request");
        assert_eq!(
            events[1].attributes,
            vec![("id".to_owned(), "42".to_owned())]
        );
    }

    #[test]
    fn zero_signing_id_maps_to_unassigned() {
        let raw = r#"{"signing": {"signing_id": "0"}}"#;
        let parsed: RequestQueryResponse = serde_json::from_str(raw).unwrap();
        let status = status_from(parsed).unwrap();
        assert!(status.signing_id.is_none());

        let raw = r#"{"signing": {"signing_id": "7"}}"#;
        let parsed: RequestQueryResponse = serde_json::from_str(raw).unwrap();
        let status = status_from(parsed).unwrap();
        assert_eq!(status.signing_id.unwrap().get(), 7);
    }

    #[test]
    fn missing_signing_section_maps_to_unassigned() {
        let raw = r#"{"signing": null}"#;
        let parsed: RequestQueryResponse = serde_json::from_str(raw).unwrap();
        assert!(status_from(parsed).unwrap().signing_id.is_none());
    }

    #[test]
    fn pending_signing_result_has_empty_signature() {
        let raw = r#"{
            "current_group_signing_result": {
                "signing": {"message": "q80="},
                "evm_signature": null
            }
        }"#;
        let parsed: SigningQueryResponse = serde_json::from_str(raw).unwrap();
        let result = signing_from(parsed).unwrap();
        assert!(!result.is_complete());
        assert_eq!(result.message, vec![0xab, 0xcd]);
    }

    #[test]
    fn finalized_signing_result_decodes_base64_components() {
        // r_address = 0x0102, signature = 0xff, message = 0xabcd
        let raw = r#"{
            "current_group_signing_result": {
                "signing": {"message": "q80="},
                "evm_signature": {"r_address": "AQI=", "signature": "/w=="}
            }
        }"#;
        let parsed: SigningQueryResponse = serde_json::from_str(raw).unwrap();
        let result = signing_from(parsed).unwrap();
        assert!(result.is_complete());
        assert_eq!(result.r_address, vec![0x01, 0x02]);
        assert_eq!(result.signature, vec![0xff]);
        assert_eq!(result.message, vec![0xab, 0xcd]);
    }

    #[test]
    fn broadcast_rejection_carries_the_raw_log() {
        let raw = r#"{
            "tx_response": {
                "txhash": "DEADBEEF",
                "code": 5,
                "raw_log": "insufficient funds"
            }
        }"#;
        let parsed: BroadcastResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.tx_response.code, 5);
        assert_eq!(parsed.tx_response.raw_log, "insufficient funds");
    }
}
