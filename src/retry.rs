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

//! Poll/retry logic for eventually-consistent source-chain resources.

use std::future::Future;
use std::time::Duration;

use backoff::backoff::Backoff;

use crate::probe;

/// The outcome of a single probe of an asynchronous resource.
///
/// Absence is always signalled explicitly with [`Probe::NotReady`], never by
/// an "empty" value: a signing id of zero and an empty signature both mean
/// "not produced yet" on the source chain (ids start at 1), and conflating
/// them with real values is how relay payloads get silently corrupted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe<T> {
    /// The resource exists; here is its value.
    Ready(T),
    /// The resource does not exist yet. Probe again later.
    NotReady,
}

impl<T> From<Option<T>> for Probe<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Probe::Ready(v),
            None => Probe::NotReady,
        }
    }
}

/// A backoff policy that always returns a constant duration, until it
/// exceeds the maximum retry count.
#[derive(Debug)]
pub struct ConstantWithMaxRetries {
    interval: Duration,
    max_retries: usize,
    count: usize,
}

impl ConstantWithMaxRetries {
    /// Creates a new constant backoff waiting `interval` between attempts
    /// and allowing at most `max_retries` retries before giving up.
    pub fn new(interval: Duration, max_retries: usize) -> Self {
        Self {
            interval,
            max_retries,
            count: 0,
        }
    }
}

impl Backoff for ConstantWithMaxRetries {
    fn next_backoff(&mut self) -> Option<Duration> {
        (self.count < self.max_retries).then(|| {
            self.count += 1;
            self.interval
        })
    }

    fn reset(&mut self) {
        self.count = 0;
    }
}

/// Polls an asynchronous probe until it reports [`Probe::Ready`] or the
/// attempt budget runs out.
///
/// Both the interval and the attempt budget are injected so tests can run
/// with a zero interval and a deterministic attempt count.
#[derive(Debug, Clone, Copy)]
pub struct Poller {
    interval: Duration,
    max_attempts: usize,
}

impl Poller {
    /// Creates a poller that probes at most `max_attempts` times, waiting
    /// `interval` between consecutive attempts.
    pub fn new(interval: Duration, max_attempts: usize) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    /// Runs `probe` until it yields a value.
    ///
    /// A probe that fails with an error consumes an attempt exactly like a
    /// `NotReady` outcome, but is logged at WARN so infrastructure hiccups
    /// stay visible in diagnostics. Exhausting the budget yields
    /// [`crate::Error::PollExhausted`] carrying `label`.
    pub async fn poll<T, F, Fut>(
        &self,
        label: &'static str,
        mut probe: F,
    ) -> crate::Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = crate::Result<Probe<T>>>,
    {
        // the first attempt is free; the policy only budgets the retries.
        let mut backoff = ConstantWithMaxRetries::new(
            self.interval,
            self.max_attempts.saturating_sub(1),
        );
        let mut attempt = 0usize;
        loop {
            attempt += 1;
            match probe().await {
                Ok(Probe::Ready(value)) => {
                    tracing::event!(
                        target: probe::TARGET,
                        tracing::Level::DEBUG,
                        kind = %probe::Kind::Poll,
                        %label,
                        attempt,
                        found = true,
                    );
                    tracing::debug!(
                        "Found {} after {} attempt(s)",
                        label,
                        attempt
                    );
                    return Ok(value);
                }
                Ok(Probe::NotReady) => {
                    tracing::trace!(%label, attempt, "not ready yet");
                }
                Err(e) => {
                    tracing::warn!(
                        "Retry {}/{} for {}: {}",
                        attempt,
                        self.max_attempts,
                        label,
                        e
                    );
                }
            }
            match backoff.next_backoff() {
                Some(delay) => tokio::time::sleep(delay).await,
                None => {
                    return Err(crate::Error::PollExhausted {
                        label,
                        attempts: self.max_attempts,
                    })
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[tokio::test]
    async fn yields_the_value_on_the_ready_attempt() {
        let poller = Poller::new(Duration::ZERO, 10);
        let calls = AtomicUsize::new(0);
        let calls_ref = &calls;
        let value = poller
            .poll("request id", move || async move {
                let n = calls_ref.fetch_add(1, Ordering::SeqCst) + 1;
                if n == 4 {
                    Ok(Probe::Ready(42u64))
                } else {
                    Ok(Probe::NotReady)
                }
            })
            .await
            .unwrap();
        assert_eq!(value, 42);
        // exactly four probes, no extra attempt after success.
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn exhausts_after_exactly_max_attempts() {
        let poller = Poller::new(Duration::ZERO, 5);
        let calls = AtomicUsize::new(0);
        let calls_ref = &calls;
        let result = poller
            .poll("signing id", move || async move {
                calls_ref.fetch_add(1, Ordering::SeqCst);
                Ok(Probe::<u64>::NotReady)
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        match result {
            Err(crate::Error::PollExhausted { label, attempts }) => {
                assert_eq!(label, "signing id");
                assert_eq!(attempts, 5);
            }
            other => panic!("expected PollExhausted, got {:?}", other.err()),
        }
    }

    #[tokio::test]
    async fn probe_errors_consume_attempts_without_aborting() {
        let poller = Poller::new(Duration::ZERO, 4);
        let calls = AtomicUsize::new(0);
        let calls_ref = &calls;
        let value = poller
            .poll("signing result", move || async move {
                let n = calls_ref.fetch_add(1, Ordering::SeqCst) + 1;
                match n {
                    1 => Err(crate::Error::Generic("rpc hiccup")),
                    2 => Ok(Probe::NotReady),
                    _ => Ok(Probe::Ready("done")),
                }
            })
            .await
            .unwrap();
        assert_eq!(value, "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn errors_alone_still_exhaust_the_budget() {
        let poller = Poller::new(Duration::ZERO, 3);
        let calls = AtomicUsize::new(0);
        let calls_ref = &calls;
        let result: crate::Result<()> = poller
            .poll("relay data", move || async move {
                calls_ref.fetch_add(1, Ordering::SeqCst);
                Err(crate::Error::Generic("down"))
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(matches!(
            result,
            Err(crate::Error::PollExhausted { attempts: 3, .. })
        ));
    }

    #[test]
    fn constant_policy_stops_after_the_retry_budget() {
        let mut policy =
            ConstantWithMaxRetries::new(Duration::from_millis(7), 2);
        assert_eq!(policy.next_backoff(), Some(Duration::from_millis(7)));
        assert_eq!(policy.next_backoff(), Some(Duration::from_millis(7)));
        assert_eq!(policy.next_backoff(), None);
        policy.reset();
        assert_eq!(policy.next_backoff(), Some(Duration::from_millis(7)));
    }
}
