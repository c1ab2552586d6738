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

use std::convert::TryFrom;

use ethers::providers::{Http, Provider};
use ethers::signers::{LocalWallet, Signer};
use tokio::sync::broadcast;

use crate::config::BandTssRelayerConfig;

/// RelayerContext contains the relayer's configuration and shutdown signal.
#[derive(Clone)]
pub struct RelayerContext {
    /// The configuration of the relayer.
    pub config: BandTssRelayerConfig,
    /// Broadcasts a shutdown signal to all active tasks.
    ///
    /// The initial `shutdown` trigger is provided by the signal handler in
    /// `main`. When a task is spawned, it is passed a broadcast receiver
    /// handle. When a graceful shutdown is initiated, a `()` value is sent
    /// via the broadcast::Sender; each task receives it, reaches a safe
    /// terminal state, and completes.
    notify_shutdown: broadcast::Sender<()>,
}

impl RelayerContext {
    /// Creates a new RelayerContext from a validated configuration.
    pub fn new(config: BandTssRelayerConfig) -> Self {
        let (notify_shutdown, _) = broadcast::channel(2);
        Self {
            config,
            notify_shutdown,
        }
    }

    /// Returns a new shutdown listener handle.
    pub fn shutdown_signal(&self) -> Shutdown {
        Shutdown::new(self.notify_shutdown.subscribe())
    }

    /// Sends the shutdown signal to all active tasks.
    pub fn shutdown(&self) {
        let _ = self.notify_shutdown.send(());
    }

    /// An Http provider for the destination chain.
    pub fn evm_provider(&self) -> crate::Result<Provider<Http>> {
        let provider = Provider::try_from(
            self.config.destination.http_endpoint.as_str(),
        )?;
        Ok(provider)
    }

    /// The relaying wallet on the destination chain, bound to its chain id.
    pub fn evm_wallet(&self) -> crate::Result<LocalWallet> {
        let wallet = LocalWallet::from_bytes(
            self.config.destination.private_key.as_bytes(),
        )?
        .with_chain_id(self.config.destination.chain_id);
        Ok(wallet)
    }
}

/// Listens for the relayer shutdown signal.
///
/// Shutdown is signalled using a `broadcast::Receiver`. Only a single value
/// is ever sent; once it has been sent, every task should stop.
///
/// The `Shutdown` struct listens for the signal and tracks that the signal
/// has been received, so callers may await it more than once.
#[derive(Debug)]
pub struct Shutdown {
    /// `true` if the shutdown signal has been received
    shutdown: bool,

    /// The receive half of the channel used to listen for shutdown.
    notify: broadcast::Receiver<()>,
}

impl Shutdown {
    /// Create a new `Shutdown` backed by the given `broadcast::Receiver`.
    pub fn new(notify: broadcast::Receiver<()>) -> Shutdown {
        Shutdown {
            shutdown: false,
            notify,
        }
    }

    /// Receive the shutdown notice, waiting if necessary.
    pub async fn recv(&mut self) {
        // If the shutdown signal has already been received, then return
        // immediately.
        if self.shutdown {
            return;
        }

        // Cannot receive a "lag error" as only one value is ever sent.
        let _ = self.notify.recv().await;

        // Remember that the signal has been received.
        self.shutdown = true;
    }
}
