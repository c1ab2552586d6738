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

//! Relayer configuration: one source chain, one destination chain, one
//! request shape, and the polling knobs. All timing values are injected
//! here rather than hardcoded so tests can run without wall-clock delays.

use std::path::Path;

use serde::{Deserialize, Serialize};

const fn default_attempt_interval_ms() -> u64 {
    1_000
}

const fn default_max_attempts() -> usize {
    10
}

const fn default_cycle_interval_secs() -> u64 {
    15
}

const fn default_confirmation_timeout_secs() -> u64 {
    300
}

fn default_derivation_path() -> String {
    // BIP-44 with BandChain's registered coin type.
    "m/44'/494'/0'/0/0".to_owned()
}

fn default_account_prefix() -> String {
    "band".to_owned()
}

/// BandTssRelayerConfig is the configuration for the relayer.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct BandTssRelayerConfig {
    /// The source (BandChain) network configuration.
    pub source: SourceChainConfig,
    /// The oracle data request submitted each cycle.
    pub request: OracleRequestConfig,
    /// The destination (EVM) network configuration.
    pub destination: EvmChainConfig,
    /// Polling and scheduling intervals.
    #[serde(default)]
    pub poll: PollConfig,
}

impl BandTssRelayerConfig {
    /// Checks the configuration invariants that serde cannot express.
    pub fn validate(&self) -> crate::Result<()> {
        if self.request.min_count < 1 {
            return Err(crate::Error::Generic(
                "request.min-count must be at least 1",
            ));
        }
        if self.request.ask_count < self.request.min_count {
            return Err(crate::Error::Generic(
                "request.ask-count must be >= request.min-count",
            ));
        }
        if self.poll.max_attempts < 1 {
            return Err(crate::Error::Generic(
                "poll.max-attempts must be at least 1",
            ));
        }
        if self.source.gas_price <= 0.0 {
            return Err(crate::Error::Generic(
                "source.gas-price must be positive",
            ));
        }
        Ok(())
    }
}

/// SourceChainConfig is the configuration for the BandChain network.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct SourceChainConfig {
    /// The chain id of the network, e.g. `band-v3-testnet`.
    pub chain_id: String,
    /// Http(s) LCD (REST) endpoint for queries and broadcasts.
    #[serde(skip_serializing)]
    pub lcd_endpoint: url::Url,
    /// The BIP-39 mnemonic of the request sender account.
    ///
    /// Either the phrase itself, or `$SOME_ENV_VAR` to read the phrase from
    /// the environment.
    #[serde(skip_serializing)]
    pub mnemonic: Mnemonic,
    /// BIP-44 derivation path of the sender key.
    #[serde(default = "default_derivation_path")]
    pub derivation_path: String,
    /// Bech32 account prefix of the network.
    #[serde(default = "default_account_prefix")]
    pub account_prefix: String,
    /// Gas limit of the request transaction.
    pub gas_limit: u64,
    /// Gas price in `fee-denom` per gas unit; the tx fee is
    /// `ceil(gas-limit * gas-price)`.
    pub gas_price: f64,
    /// Denomination the transaction fee is paid in.
    pub fee_denom: String,
}

/// OracleRequestConfig describes the data request sent every relay cycle.
/// Invariant: `ask-count >= min-count >= 1`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct OracleRequestConfig {
    /// Identifier of the oracle script to execute.
    pub oracle_script_id: i64,
    /// Hex-encoded calldata passed to the oracle script.
    #[serde(with = "hex::serde", default)]
    pub calldata: Vec<u8>,
    /// How many validators are asked to report.
    pub ask_count: u64,
    /// Minimum number of reports for the request to resolve.
    pub min_count: u64,
    /// Free-form client identifier attached to the request.
    pub client_id: String,
    /// Maximum fee the request may consume, in `fee-limit-denom`.
    #[serde(deserialize_with = "deserialize_u128")]
    pub fee_limit_amount: u128,
    /// Denomination of the request fee limit.
    pub fee_limit_denom: String,
    /// Gas reserved for the oracle script's prepare phase.
    pub prepare_gas: u64,
    /// Gas reserved for the oracle script's execute phase.
    pub execute_gas: u64,
}

/// EvmChainConfig is the configuration for the destination EVM network.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct EvmChainConfig {
    /// Http(s) JSON-RPC endpoint.
    #[serde(skip_serializing)]
    pub http_endpoint: url::Url,
    /// Chain specific id.
    #[serde(rename(serialize = "chainId"))]
    pub chain_id: u64,
    /// The private key of the relaying account on this network.
    ///
    /// Either a raw `0x`-prefixed 32-byte hex key, or `$SOME_ENV_VAR` to
    /// read such a key from the environment.
    #[serde(skip_serializing)]
    pub private_key: PrivateKey,
    /// Address of the bridge proxy contract exposing `relay(address,bytes)`.
    pub bridge_address: ethers::types::Address,
    /// Address of the consumer contract the bridge forwards the data to.
    pub consumer_address: ethers::types::Address,
    /// Gas limit of the relay transaction.
    pub gas_limit: u64,
    /// Bounded wait for the relay transaction receipt, in seconds.
    #[serde(default = "default_confirmation_timeout_secs")]
    pub confirmation_timeout_secs: u64,
    /// Block Explorer for this chain.
    ///
    /// Optional, and only used for printing links for transactions.
    #[serde(skip_serializing)]
    pub explorer: Option<url::Url>,
}

/// Polling and scheduling intervals. All injected; never hardcode sleeps.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct PollConfig {
    /// Fixed wait between consecutive probe attempts, in milliseconds.
    #[serde(default = "default_attempt_interval_ms")]
    pub attempt_interval_ms: u64,
    /// Maximum probe attempts per polled resource.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    /// Fixed sleep between relay cycles, in seconds. Applied regardless of
    /// the previous cycle's outcome.
    #[serde(default = "default_cycle_interval_secs")]
    pub cycle_interval_secs: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            attempt_interval_ms: default_attempt_interval_ms(),
            max_attempts: default_max_attempts(),
            cycle_interval_secs: default_cycle_interval_secs(),
        }
    }
}

// The `config` crate's deserializer never implements `deserialize_u128`,
// so serde's default trait method rejects u128 fields outright. Route the
// value through `deserialize_any` instead, where integer kinds are visited
// directly.
fn deserialize_u128<'de, D>(deserializer: D) -> Result<u128, D::Error>
where
    D: serde::Deserializer<'de>,
{
    struct U128Visitor;
    impl<'de> serde::de::Visitor<'de> for U128Visitor {
        type Value = u128;

        fn expecting(
            &self,
            formatter: &mut std::fmt::Formatter,
        ) -> std::fmt::Result {
            formatter.write_str("a non-negative integer")
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value.into())
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            u128::try_from(value).map_err(serde::de::Error::custom)
        }

        fn visit_u128<E>(self, value: u128) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value)
        }

        fn visit_i128<E>(self, value: i128) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            u128::try_from(value).map_err(serde::de::Error::custom)
        }
    }

    deserializer.deserialize_any(U128Visitor)
}

/// A BIP-39 mnemonic phrase, possibly referenced via an environment
/// variable. The phrase is never serialized and never printed.
#[derive(Clone)]
pub struct Mnemonic(String);

impl Mnemonic {
    /// The mnemonic phrase.
    pub fn phrase(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Mnemonic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Mnemonic").finish()
    }
}

impl<'de> Deserialize<'de> for Mnemonic {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct MnemonicVisitor;
        impl<'de> serde::de::Visitor<'de> for MnemonicVisitor {
            type Value = String;

            fn expecting(
                &self,
                formatter: &mut std::fmt::Formatter,
            ) -> std::fmt::Result {
                formatter.write_str(
                    "mnemonic phrase or an env var containing the phrase",
                )
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                let phrase = if let Some(var) = value.strip_prefix('$') {
                    tracing::trace!("Reading {} from env", var);
                    std::env::var(var).map_err(|e| {
                        serde::de::Error::custom(format!(
                            "error while loading this env {}: {}",
                            var, e,
                        ))
                    })?
                } else {
                    value.to_owned()
                };
                if phrase.trim().is_empty() {
                    return Err(serde::de::Error::custom(
                        "mnemonic phrase is empty",
                    ));
                }
                Ok(phrase)
            }
        }

        let phrase = deserializer.deserialize_str(MnemonicVisitor)?;
        Ok(Self(phrase))
    }
}

/// A raw secp256k1 private key for the destination chain, possibly
/// referenced via an environment variable. Never serialized, never printed.
#[derive(Clone)]
pub struct PrivateKey(Vec<u8>);

impl PrivateKey {
    /// The raw 32 key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PrivateKey").finish()
    }
}

impl<'de> Deserialize<'de> for PrivateKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct PrivateKeyVisitor;
        impl<'de> serde::de::Visitor<'de> for PrivateKeyVisitor {
            type Value = Vec<u8>;

            fn expecting(
                &self,
                formatter: &mut std::fmt::Formatter,
            ) -> std::fmt::Result {
                formatter.write_str(
                    "hex string or an env var containing a hex string in it",
                )
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                let raw = if let Some(var) = value.strip_prefix('$') {
                    tracing::trace!("Reading {} from env", var);
                    std::env::var(var).map_err(|e| {
                        serde::de::Error::custom(format!(
                            "error while loading this env {}: {}",
                            var, e,
                        ))
                    })?
                } else {
                    value.to_owned()
                };
                let stripped = raw.trim().trim_start_matches("0x");
                let bytes = hex::decode(stripped).map_err(|e| {
                    serde::de::Error::custom(format!(
                        "invalid hex private key: {}",
                        e
                    ))
                })?;
                if bytes.len() != 32 {
                    return Err(serde::de::Error::custom(format!(
                        "expected a 32 byte private key, got {} bytes",
                        bytes.len()
                    )));
                }
                Ok(bytes)
            }
        }

        let secret = deserializer.deserialize_str(PrivateKeyVisitor)?;
        Ok(Self(secret))
    }
}

/// Loads and validates the configuration from a TOML file, with
/// `BANDTSS_RELAYER`-prefixed environment variables layered on top.
pub fn load<P: AsRef<Path>>(path: P) -> crate::Result<BandTssRelayerConfig> {
    tracing::trace!("Loading config file: {}", path.as_ref().display());
    let cfg = config::Config::builder()
        .add_source(config::File::from(path.as_ref()))
        .add_source(
            config::Environment::with_prefix("BANDTSS_RELAYER")
                .separator("__"),
        )
        .build()?;
    let config: BandTssRelayerConfig =
        serde_path_to_error::deserialize(cfg)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [source]
        chain-id = "band-v3-testnet"
        lcd-endpoint = "https://band-v3-testnet.bandchain.org/api/"
        mnemonic = "all all all all all all all all all all all all"
        gas-limit = 330000
        gas-price = 0.0025
        fee-denom = "uband"

        [request]
        oracle-script-id = 14
        calldata = "00"
        ask-count = 6
        min-count = 5
        client-id = "bandtss-relayer"
        fee-limit-amount = 100000
        fee-limit-denom = "uband"
        prepare-gas = 1000
        execute-gas = 6000

        [destination]
        http-endpoint = "https://rpc.testnet.xrplevm.org"
        chain-id = 1449000
        private-key = "0x000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f"
        bridge-address = "0x1bcE8bC03072932ff1941d8a9B026868b0265B7c"
        consumer-address = "0xA5461ED1740FD1eb190850BF94919e89AFFFb775"
        gas-limit = 250000
    "#;

    fn parse(toml: &str) -> BandTssRelayerConfig {
        let cfg = config::Config::builder()
            .add_source(config::File::from_str(
                toml,
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap();
        cfg.try_deserialize().unwrap()
    }

    #[test]
    fn parses_the_sample_and_applies_defaults() {
        let config = parse(SAMPLE);
        config.validate().unwrap();
        assert_eq!(config.request.calldata, vec![0u8]);
        assert_eq!(config.source.derivation_path, "m/44'/494'/0'/0/0");
        assert_eq!(config.source.account_prefix, "band");
        assert_eq!(config.poll.attempt_interval_ms, 1_000);
        assert_eq!(config.poll.max_attempts, 10);
        assert_eq!(config.poll.cycle_interval_secs, 15);
        assert_eq!(config.destination.confirmation_timeout_secs, 300);
        assert_eq!(config.destination.private_key.as_bytes().len(), 32);
    }

    #[test]
    fn rejects_ask_count_below_min_count() {
        let broken = SAMPLE.replace("ask-count = 6", "ask-count = 4");
        let config = parse(&broken);
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_min_count() {
        let broken = SAMPLE.replace("min-count = 5", "min-count = 0");
        let config = parse(&broken);
        assert!(config.validate().is_err());
    }

    #[test]
    fn private_key_must_be_32_bytes() {
        let broken = SAMPLE.replace(
            "0x000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f",
            "0xabcdef",
        );
        let cfg = config::Config::builder()
            .add_source(config::File::from_str(
                &broken,
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap();
        let parsed: Result<BandTssRelayerConfig, _> = cfg.try_deserialize();
        assert!(parsed.is_err());
    }
}
