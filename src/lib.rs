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

#![deny(unsafe_code)]
#![warn(missing_docs)]
//! # BandTSS Relayer 🕸️
//!
//! Requests threshold-signed oracle data on BandChain, waits for the signing
//! round to finalize, and relays the signed payload to a bridge proxy
//! contract on an EVM chain, forever, one cycle at a time.

/// Relayer configuration.
pub mod config;
/// Relayer context (configuration + shutdown signal).
pub mod context;
mod error;
/// Destination (EVM) chain client.
pub mod evm;
/// Relay payload assembly.
pub mod payload;
/// The source-side relay pipeline.
pub mod pipeline;
/// A module used for debugging relayer lifecycle, poll state, or other relayer state.
pub mod probe;
/// Poll/retry functionality.
pub mod retry;
/// The relay cycle scheduler.
pub mod service;
/// Source (BandChain) chain client.
pub mod source;
/// Domain types shared between the source and destination halves.
pub mod types;

pub use error::{Error, Result};
