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

//! The long-running relay service: run pipeline cycles forever, isolating
//! each cycle's failure from the next.

use std::time::Duration;

use crate::context::Shutdown;
use crate::evm::DestinationChainClient;
use crate::pipeline::RelayPipeline;
use crate::probe;
use crate::source::SourceChainClient;
use crate::types::RelayReceipt;
use crate::Error;

/// Which half of a relay cycle failed.
#[derive(Debug, Copy, Clone, PartialEq, Eq, derive_more::Display)]
pub enum CycleStage {
    /// Request submission or result polling on the source chain.
    #[display(fmt = "source")]
    Source,
    /// Relay transaction handling on the destination chain.
    #[display(fmt = "destination")]
    Destination,
}

/// The result of one relay cycle. Failures are data, not control flow;
/// the scheduler reports them and moves on.
#[derive(Debug)]
pub enum CycleOutcome {
    /// The payload was relayed and the transaction mined successfully.
    Relayed(RelayReceipt),
    /// The cycle was aborted at `stage`.
    Failed {
        /// Which half of the cycle failed.
        stage: CycleStage,
        /// The error that aborted it.
        error: Error,
    },
}

/// Drives [`RelayPipeline`] cycles forever with a fixed rest between them.
pub struct RelayCycleScheduler<S, D> {
    pipeline: RelayPipeline<S>,
    destination: D,
    cycle_interval: Duration,
}

impl<S, D> RelayCycleScheduler<S, D>
where
    S: SourceChainClient,
    D: DestinationChainClient,
{
    /// Creates a scheduler resting `cycle_interval` between cycles.
    pub fn new(
        pipeline: RelayPipeline<S>,
        destination: D,
        cycle_interval: Duration,
    ) -> Self {
        Self {
            pipeline,
            destination,
            cycle_interval,
        }
    }

    /// Runs a single relay cycle to completion.
    pub async fn run_cycle(&self) -> CycleOutcome {
        let payload = match self.pipeline.run().await {
            Ok(payload) => payload,
            Err(error) => {
                return CycleOutcome::Failed {
                    stage: CycleStage::Source,
                    error,
                }
            }
        };
        tracing::info!("Relaying payload: {}", payload);
        match self.destination.relay(&payload).await {
            Ok(receipt) => CycleOutcome::Relayed(receipt),
            Err(error) => CycleOutcome::Failed {
                stage: CycleStage::Destination,
                error,
            },
        }
    }

    /// Runs cycles until `shutdown` fires. Never returns on its own.
    pub async fn run(self, mut shutdown: Shutdown) {
        let mut cycle: u64 = 0;
        loop {
            cycle += 1;
            tracing::event!(
                target: probe::TARGET,
                tracing::Level::DEBUG,
                kind = %probe::Kind::RelayCycle,
                %cycle,
                started = true,
            );
            let outcome = self.run_cycle().await;
            report(cycle, &outcome);
            tokio::select! {
                _ = tokio::time::sleep(self.cycle_interval) => {},
                _ = shutdown.recv() => {
                    tracing::info!("Relay loop stopping after cycle {cycle}");
                    return;
                }
            }
        }
    }
}

fn report(cycle: u64, outcome: &CycleOutcome) {
    match outcome {
        CycleOutcome::Relayed(receipt) => {
            tracing::info!(
                "Cycle {cycle} relayed in tx 0x{:x} (block #{})",
                receipt.tx_hash,
                receipt.block_number.unwrap_or_default(),
            );
        }
        // a reverted relay tx spent gas; call that out louder than an
        // ordinary cycle failure.
        CycleOutcome::Failed {
            stage,
            error: Error::ReceiptFailed {
                tx_hash,
                block_number,
            },
        } => {
            tracing::error!(
                "Cycle {cycle} failed at {stage}: relay tx 0x{tx_hash:x} \
                 reverted in block #{} and spent gas",
                block_number.unwrap_or_default(),
            );
        }
        CycleOutcome::Failed { stage, error } => {
            tracing::warn!("Cycle {cycle} failed at {stage}: {error}");
        }
    }
}
