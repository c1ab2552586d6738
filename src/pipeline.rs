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

//! The source-side relay pipeline: submit a data request, then resolve
//! request id → signing id → signing result, each stage strictly gated on
//! the previous one and independently polled.

use crate::config::OracleRequestConfig;
use crate::payload::RelayPayload;
use crate::probe;
use crate::retry::{Poller, Probe};
use crate::source::SourceChainClient;
use crate::types::{RequestId, SigningId, SigningResult, TxEvent};

/// Four-stage state machine producing one relay payload per run.
///
/// Stage 1 (submit) has no retry at this layer: a broadcast failure is
/// fatal to the cycle. Stages 2-4 poll the eventually-consistent source
/// chain with the injected [`Poller`]; exhaustion aborts the cycle only.
pub struct RelayPipeline<S> {
    source: S,
    request: OracleRequestConfig,
    poller: Poller,
}

impl<S> RelayPipeline<S>
where
    S: SourceChainClient,
{
    /// Creates a pipeline over `source` submitting `request` every run.
    pub fn new(source: S, request: OracleRequestConfig, poller: Poller) -> Self {
        Self {
            source,
            request,
            poller,
        }
    }

    /// Runs one full pipeline pass and returns the assembled relay payload.
    pub async fn run(&self) -> crate::Result<RelayPayload> {
        let submitted = self.source.submit_request_tx(&self.request).await?;
        tracing::info!("Source request tx submitted: {}", submitted.tx_hash);
        // sync broadcasts rarely carry events, but when one does the
        // request id is already here and the first poll can be skipped.
        let request_id = match extract_request_id(&submitted.events) {
            Some(id) => id,
            None => self.resolve_request_id(&submitted.tx_hash).await?,
        };
        tracing::info!(%request_id, "Oracle request created");
        let signing_id = self.resolve_signing_id(request_id).await?;
        tracing::info!(%signing_id, "Signing session assigned");
        let signing = self.resolve_signing_result(signing_id).await?;
        let payload = RelayPayload::from(&signing);
        tracing::event!(
            target: probe::TARGET,
            tracing::Level::DEBUG,
            kind = %probe::Kind::Poll,
            %request_id,
            %signing_id,
            payload_bytes = payload.as_bytes().len(),
            assembled = true,
        );
        Ok(payload)
    }

    async fn resolve_request_id(
        &self,
        tx_hash: &str,
    ) -> crate::Result<RequestId> {
        let source = &self.source;
        self.poller
            .poll("oracle request id", move || async move {
                match source.tx_events(tx_hash).await? {
                    Some(events) => Ok(extract_request_id(&events).into()),
                    None => Ok(Probe::NotReady),
                }
            })
            .await
    }

    async fn resolve_signing_id(
        &self,
        request_id: RequestId,
    ) -> crate::Result<SigningId> {
        let source = &self.source;
        self.poller
            .poll("signing id", move || async move {
                match source.request_status(request_id).await? {
                    Some(status) => Ok(status.signing_id.into()),
                    None => Ok(Probe::NotReady),
                }
            })
            .await
    }

    async fn resolve_signing_result(
        &self,
        signing_id: SigningId,
    ) -> crate::Result<SigningResult> {
        let source = &self.source;
        self.poller
            .poll("signing result", move || async move {
                match source.signing_result(signing_id).await? {
                    Some(result) if result.is_complete() => {
                        Ok(Probe::Ready(result))
                    }
                    _ => Ok(Probe::NotReady),
                }
            })
            .await
    }
}

/// Extracts the oracle request id from the `request` event's `id`
/// attribute, if the transaction carries one.
///
/// A malformed or non-positive id attribute is logged and treated as
/// absent; request ids on the source chain start at 1.
pub fn extract_request_id(events: &[TxEvent]) -> Option<RequestId> {
    events
        .iter()
        .filter(|event| event.kind == "request")
        .flat_map(|event| event.attributes.iter())
        .find(|(key, _)| key == "id")
        .and_then(|(_, value)| match value.parse::<u64>() {
            Ok(id) if id > 0 => Some(RequestId(id)),
            _ => {
                tracing::warn!(
                    "Ignoring malformed request id attribute: {:?}",
                    value
                );
                None
            }
        })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;
    use crate::config::OracleRequestConfig;
    use crate::types::{RequestStatus, SourceTxResult};

    fn request_config() -> OracleRequestConfig {
        OracleRequestConfig {
            oracle_script_id: 14,
            calldata: vec![0],
            ask_count: 6,
            min_count: 5,
            client_id: "test".to_owned(),
            fee_limit_amount: 100_000,
            fee_limit_denom: "uband".to_owned(),
            prepare_gas: 1_000,
            execute_gas: 6_000,
        }
    }

    fn request_event(id: &str) -> TxEvent {
        TxEvent {
            kind: "request".to_owned(),
            attributes: vec![("id".to_owned(), id.to_owned())],
        }
    }

    /// Scripted source chain matching the reference scenario: the request
    /// event appears on the 4th tx query, the signing id on the 3rd status
    /// query, the signature on the 2nd signing query.
    #[derive(Default)]
    struct ScriptedSource {
        state: Mutex<ScriptedState>,
    }

    #[derive(Default)]
    struct ScriptedState {
        calls: Vec<&'static str>,
        tx_event_queries: usize,
        status_queries: usize,
        signing_queries: usize,
        queried_signing_ids: Vec<u64>,
    }

    #[async_trait::async_trait]
    impl SourceChainClient for ScriptedSource {
        async fn submit_request_tx(
            &self,
            _request: &OracleRequestConfig,
        ) -> crate::Result<SourceTxResult> {
            self.state.lock().unwrap().calls.push("submit");
            Ok(SourceTxResult {
                tx_hash: "C0FFEE".to_owned(),
                events: vec![],
            })
        }

        async fn tx_events(
            &self,
            _tx_hash: &str,
        ) -> crate::Result<Option<Vec<TxEvent>>> {
            let mut state = self.state.lock().unwrap();
            state.calls.push("tx_events");
            state.tx_event_queries += 1;
            if state.tx_event_queries <= 3 {
                Ok(Some(vec![]))
            } else {
                Ok(Some(vec![request_event("42")]))
            }
        }

        async fn request_status(
            &self,
            id: RequestId,
        ) -> crate::Result<Option<RequestStatus>> {
            assert_eq!(id, RequestId(42));
            let mut state = self.state.lock().unwrap();
            state.calls.push("request_status");
            state.status_queries += 1;
            let signing_id = if state.status_queries <= 2 {
                None
            } else {
                SigningId::new(7)
            };
            Ok(Some(RequestStatus { signing_id }))
        }

        async fn signing_result(
            &self,
            id: SigningId,
        ) -> crate::Result<Option<SigningResult>> {
            let mut state = self.state.lock().unwrap();
            state.calls.push("signing_result");
            state.signing_queries += 1;
            state.queried_signing_ids.push(id.get());
            if state.signing_queries == 1 {
                Ok(Some(SigningResult {
                    r_address: vec![],
                    signature: vec![],
                    message: vec![],
                }))
            } else {
                Ok(Some(SigningResult {
                    r_address: vec![0x01, 0x02],
                    signature: vec![0xff],
                    message: vec![0xab, 0xcd],
                }))
            }
        }
    }

    fn poller() -> Poller {
        Poller::new(Duration::ZERO, 10)
    }

    #[tokio::test]
    async fn resolves_the_scripted_scenario() {
        let pipeline =
            RelayPipeline::new(ScriptedSource::default(), request_config(), poller());
        let payload = pipeline.run().await.unwrap();
        let expected = format!(
            "0x{}0102{}ff{}",
            "00".repeat(18),
            "00".repeat(31),
            "abcd"
        );
        assert_eq!(payload.to_hex(), expected);

        let state = pipeline.source.state.lock().unwrap();
        assert_eq!(state.tx_event_queries, 4);
        assert_eq!(state.status_queries, 3);
        assert_eq!(state.signing_queries, 2);
        // the signing result must be queried with the assigned id, never
        // with the zero sentinel.
        assert_eq!(state.queried_signing_ids, vec![7, 7]);
    }

    #[tokio::test]
    async fn stages_run_strictly_in_order() {
        let pipeline =
            RelayPipeline::new(ScriptedSource::default(), request_config(), poller());
        pipeline.run().await.unwrap();
        let state = pipeline.source.state.lock().unwrap();
        let expected: Vec<&str> = std::iter::once("submit")
            .chain(std::iter::repeat("tx_events").take(4))
            .chain(std::iter::repeat("request_status").take(3))
            .chain(std::iter::repeat("signing_result").take(2))
            .collect();
        assert_eq!(state.calls, expected);
    }

    /// A source chain whose request tx never gets indexed.
    #[derive(Default)]
    struct StuckSource {
        state: Mutex<ScriptedState>,
    }

    #[async_trait::async_trait]
    impl SourceChainClient for StuckSource {
        async fn submit_request_tx(
            &self,
            _request: &OracleRequestConfig,
        ) -> crate::Result<SourceTxResult> {
            Ok(SourceTxResult {
                tx_hash: "C0FFEE".to_owned(),
                events: vec![],
            })
        }

        async fn tx_events(
            &self,
            _tx_hash: &str,
        ) -> crate::Result<Option<Vec<TxEvent>>> {
            self.state.lock().unwrap().tx_event_queries += 1;
            Ok(None)
        }

        async fn request_status(
            &self,
            _id: RequestId,
        ) -> crate::Result<Option<RequestStatus>> {
            self.state.lock().unwrap().status_queries += 1;
            Ok(None)
        }

        async fn signing_result(
            &self,
            _id: SigningId,
        ) -> crate::Result<Option<SigningResult>> {
            self.state.lock().unwrap().signing_queries += 1;
            Ok(None)
        }
    }

    #[tokio::test]
    async fn exhaustion_gates_later_stages() {
        let pipeline = RelayPipeline::new(
            StuckSource::default(),
            request_config(),
            Poller::new(Duration::ZERO, 3),
        );
        let result = pipeline.run().await;
        assert!(matches!(
            result,
            Err(crate::Error::PollExhausted {
                label: "oracle request id",
                attempts: 3,
            })
        ));
        let state = pipeline.source.state.lock().unwrap();
        assert_eq!(state.tx_event_queries, 3);
        // later stages never probed.
        assert_eq!(state.status_queries, 0);
        assert_eq!(state.signing_queries, 0);
    }

    #[tokio::test]
    async fn request_id_in_broadcast_events_skips_the_first_poll() {
        struct EagerSource {
            state: Mutex<ScriptedState>,
        }

        #[async_trait::async_trait]
        impl SourceChainClient for EagerSource {
            async fn submit_request_tx(
                &self,
                _request: &OracleRequestConfig,
            ) -> crate::Result<SourceTxResult> {
                Ok(SourceTxResult {
                    tx_hash: "C0FFEE".to_owned(),
                    events: vec![request_event("9")],
                })
            }

            async fn tx_events(
                &self,
                _tx_hash: &str,
            ) -> crate::Result<Option<Vec<TxEvent>>> {
                self.state.lock().unwrap().tx_event_queries += 1;
                Ok(None)
            }

            async fn request_status(
                &self,
                id: RequestId,
            ) -> crate::Result<Option<RequestStatus>> {
                assert_eq!(id, RequestId(9));
                Ok(Some(RequestStatus {
                    signing_id: SigningId::new(3),
                }))
            }

            async fn signing_result(
                &self,
                _id: SigningId,
            ) -> crate::Result<Option<SigningResult>> {
                Ok(Some(SigningResult {
                    r_address: vec![0xaa],
                    signature: vec![0xbb],
                    message: vec![],
                }))
            }
        }

        let pipeline = RelayPipeline::new(
            EagerSource {
                state: Mutex::default(),
            },
            request_config(),
            poller(),
        );
        pipeline.run().await.unwrap();
        let state = pipeline.source.state.lock().unwrap();
        assert_eq!(state.tx_event_queries, 0);
    }

    #[test]
    fn extract_request_id_ignores_other_events_and_garbage() {
        let events = vec![
            TxEvent {
                kind: "message".to_owned(),
                attributes: vec![("id".to_owned(), "999".to_owned())],
            },
            request_event("not-a-number"),
        ];
        assert!(extract_request_id(&events).is_none());

        let events = vec![request_event("0")];
        assert!(extract_request_id(&events).is_none());

        let events = vec![
            TxEvent {
                kind: "request".to_owned(),
                attributes: vec![("other".to_owned(), "x".to_owned())],
            },
            request_event("42"),
        ];
        assert_eq!(extract_request_id(&events), Some(RequestId(42)));
    }
}
