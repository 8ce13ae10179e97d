//! Ordered fallback across several providers.
//!
//! The chain classifies a query once, skips members whose capabilities
//! exclude it, and returns the first non-empty collection. Failures are kept
//! as [`Attempt`]s so callers can see why each member did not answer.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::{join_all, BoxFuture};
use serde::Deserialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::support::reverse_description;
use super::{Capabilities, Operation, Provider};
use crate::classify::GeocodeRequest;
use crate::error::{Attempt, AttemptOutcome, ErrorKind, GeocodeError};
use crate::models::AddressCollection;

const CHAIN_NAME: &str = "chain";

/// How the chain runs its members.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchStrategy {
    /// One provider at a time, in priority order.
    #[default]
    Sequential,
    /// All eligible providers at once; the highest-priority non-empty answer wins.
    Concurrent,
}

type Call<'a> = BoxFuture<'a, Result<AddressCollection, GeocodeError>>;

/// Result of a chain call together with per-provider diagnostics.
#[derive(Debug)]
pub struct ChainOutcome {
    /// Name of the provider whose result was returned.
    pub winner: Option<String>,
    result: Result<AddressCollection, GeocodeError>,
    attempts: Vec<Attempt>,
}

impl ChainOutcome {
    fn success(winner: &str, collection: AddressCollection, attempts: Vec<Attempt>) -> Self {
        Self {
            winner: Some(winner.to_string()),
            result: Ok(collection),
            attempts,
        }
    }

    fn failure(error: GeocodeError, attempts: Vec<Attempt>) -> Self {
        Self {
            winner: None,
            result: Err(error),
            attempts,
        }
    }

    pub fn result(&self) -> &Result<AddressCollection, GeocodeError> {
        &self.result
    }

    /// Every provider considered during the call, in priority order.
    pub fn attempts(&self) -> &[Attempt] {
        match &self.result {
            Err(e) if self.attempts.is_empty() => e.attempts(),
            _ => &self.attempts,
        }
    }

    pub fn into_result(self) -> Result<AddressCollection, GeocodeError> {
        self.result
    }
}

/// Providers tried in caller-supplied priority order.
///
/// Holds no per-call state; one instance can serve concurrent callers.
#[derive(Clone, Default)]
pub struct ProviderChain {
    providers: Vec<Arc<dyn Provider>>,
    strategy: DispatchStrategy,
    deadline: Option<Duration>,
}

impl ProviderChain {
    pub fn new(providers: Vec<Arc<dyn Provider>>) -> Self {
        Self {
            providers,
            strategy: DispatchStrategy::default(),
            deadline: None,
        }
    }

    pub fn with_strategy(mut self, strategy: DispatchStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Bound each call; the same deadline covers every provider it reaches.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Append a provider with the lowest priority.
    pub fn push(&mut self, provider: Arc<dyn Provider>) {
        self.providers.push(provider);
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn strategy(&self) -> DispatchStrategy {
        self.strategy
    }

    pub async fn geocode_traced(&self, query: &str) -> ChainOutcome {
        let request = GeocodeRequest::new(query);
        self.geocode_request_traced(&request).await
    }

    pub async fn geocode_request_traced(&self, request: &GeocodeRequest) -> ChainOutcome {
        let description = format!("geocode({:?})", request.text());
        self.dispatch(
            Operation::Geocode(request.kind()),
            description,
            |provider| provider.geocode_request(request),
        )
        .await
    }

    pub async fn reverse_traced(&self, latitude: f64, longitude: f64) -> ChainOutcome {
        self.dispatch(
            Operation::Reverse,
            reverse_description(latitude, longitude),
            |provider| provider.reverse(latitude, longitude),
        )
        .await
    }

    async fn dispatch<'a, F>(&'a self, operation: Operation, description: String, call: F) -> ChainOutcome
    where
        F: Fn(&'a dyn Provider) -> Call<'a>,
    {
        if !self.capabilities().supports(operation) {
            let attempts = self
                .providers
                .iter()
                .map(|p| Attempt::skipped(p.name()))
                .collect();
            let error = GeocodeError::unsupported(
                CHAIN_NAME,
                description,
                format!("no provider supports {}", operation),
            );
            return ChainOutcome::failure(error, attempts);
        }

        let deadline = self.deadline.map(|d| Instant::now() + d);
        let outcome = match self.strategy {
            DispatchStrategy::Sequential => {
                self.dispatch_sequential(operation, &description, deadline, call)
                    .await
            }
            DispatchStrategy::Concurrent => {
                self.dispatch_concurrent(operation, &description, deadline, call)
                    .await
            }
        };
        self.finish(outcome)
    }

    async fn dispatch_sequential<'a, F>(
        &'a self,
        operation: Operation,
        description: &str,
        deadline: Option<Instant>,
        call: F,
    ) -> ChainOutcome
    where
        F: Fn(&'a dyn Provider) -> Call<'a>,
    {
        let mut attempts = Vec::with_capacity(self.providers.len());

        for provider in &self.providers {
            let name = provider.name();
            if !provider.capabilities().supports(operation) {
                debug!("chain: skipping {} ({} not supported)", name, operation);
                attempts.push(Attempt::skipped(name));
                continue;
            }

            match within(deadline, call(provider.as_ref())).await {
                Some(Ok(collection)) if !collection.is_empty() => {
                    info!("chain: {} answered {}", name, description);
                    return ChainOutcome::success(name, collection, attempts);
                }
                Some(Ok(_)) => {
                    debug!("chain: {} returned no addresses", name);
                    attempts.push(Attempt::empty(name));
                }
                Some(Err(error)) => {
                    log_failure(&error);
                    attempts.push(Attempt::failed(name, error));
                }
                None => {
                    warn!("chain: deadline reached while {} was running", name);
                    attempts.push(Attempt::failed(name, deadline_error(name, description)));
                    return ChainOutcome::failure(deadline_error(name, description), attempts);
                }
            }
        }

        exhausted(description, attempts)
    }

    async fn dispatch_concurrent<'a, F>(
        &'a self,
        operation: Operation,
        description: &str,
        deadline: Option<Instant>,
        call: F,
    ) -> ChainOutcome
    where
        F: Fn(&'a dyn Provider) -> Call<'a>,
    {
        let eligible: Vec<bool> = self
            .providers
            .iter()
            .map(|p| p.capabilities().supports(operation))
            .collect();

        let calls = self
            .providers
            .iter()
            .zip(&eligible)
            .filter(|(_, ok)| **ok)
            .map(|(provider, _)| within(deadline, call(provider.as_ref())));
        let mut results = join_all(calls).await.into_iter();

        let mut attempts = Vec::with_capacity(self.providers.len());
        let mut winner: Option<(&str, AddressCollection)> = None;
        let mut timed_out = None;

        for (provider, ok) in self.providers.iter().zip(eligible) {
            let name = provider.name();
            if !ok {
                attempts.push(Attempt::skipped(name));
                continue;
            }
            match results.next().flatten() {
                Some(Ok(collection)) if !collection.is_empty() => {
                    if winner.is_none() {
                        winner = Some((name, collection));
                    }
                }
                Some(Ok(_)) => attempts.push(Attempt::empty(name)),
                Some(Err(error)) => {
                    log_failure(&error);
                    attempts.push(Attempt::failed(name, error));
                }
                None => {
                    timed_out.get_or_insert(name);
                    attempts.push(Attempt::failed(name, deadline_error(name, description)));
                }
            }
        }

        match (winner, timed_out) {
            (Some((name, collection)), _) => {
                info!("chain: {} answered {}", name, description);
                ChainOutcome::success(name, collection, attempts)
            }
            (None, Some(name)) => {
                ChainOutcome::failure(deadline_error(name, description), attempts)
            }
            (None, None) => exhausted(description, attempts),
        }
    }

    /// A chain of one surfaces its member's own error.
    fn finish(&self, outcome: ChainOutcome) -> ChainOutcome {
        if self.providers.len() != 1 {
            return outcome;
        }
        match outcome.result {
            Err(GeocodeError::NoResult {
                provider,
                request,
                mut attempts,
            }) => match attempts.pop() {
                Some(Attempt {
                    outcome: AttemptOutcome::Failed(error),
                    ..
                }) if attempts.is_empty() => ChainOutcome::failure(error, Vec::new()),
                last => {
                    attempts.extend(last);
                    let error = GeocodeError::NoResult {
                        provider,
                        request,
                        attempts,
                    };
                    ChainOutcome::failure(error, outcome.attempts)
                }
            },
            result => ChainOutcome { result, ..outcome },
        }
    }
}

async fn within<T>(deadline: Option<Instant>, call: BoxFuture<'_, T>) -> Option<T> {
    match deadline {
        Some(at) => tokio::time::timeout_at(at, call).await.ok(),
        None => Some(call.await),
    }
}

fn deadline_error(provider: &str, description: &str) -> GeocodeError {
    GeocodeError::DeadlineExceeded {
        provider: provider.to_string(),
        request: description.to_string(),
    }
}

fn exhausted(description: &str, attempts: Vec<Attempt>) -> ChainOutcome {
    let error = GeocodeError::NoResult {
        provider: CHAIN_NAME.to_string(),
        request: description.to_string(),
        attempts,
    };
    ChainOutcome::failure(error, Vec::new())
}

fn log_failure(error: &GeocodeError) {
    match error.kind() {
        ErrorKind::InvalidCredentials | ErrorKind::QuotaExceeded => warn!("chain: {}", error),
        _ => debug!("chain: {}", error),
    }
}

#[async_trait]
impl Provider for ProviderChain {
    fn name(&self) -> &str {
        CHAIN_NAME
    }

    fn capabilities(&self) -> Capabilities {
        self.providers
            .iter()
            .fold(Capabilities::default(), |acc, p| acc.union(p.capabilities()))
    }

    async fn geocode_request(
        &self,
        request: &GeocodeRequest,
    ) -> Result<AddressCollection, GeocodeError> {
        self.geocode_request_traced(request).await.into_result()
    }

    async fn reverse(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<AddressCollection, GeocodeError> {
        self.reverse_traced(latitude, longitude).await.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::QueryKind;
    use crate::models::Address;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, Copy)]
    enum Reply {
        Found(f64, f64),
        Empty,
        Fail(ErrorKind),
    }

    struct Stub {
        name: &'static str,
        caps: Capabilities,
        reply: Reply,
        delay: Option<Duration>,
        calls: AtomicUsize,
    }

    impl Stub {
        fn new(name: &'static str, caps: Capabilities, reply: Reply) -> Arc<Self> {
            Arc::new(Self {
                name,
                caps,
                reply,
                delay: None,
                calls: AtomicUsize::new(0),
            })
        }

        fn slow(name: &'static str, reply: Reply, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                name,
                caps: Capabilities::ADDRESS,
                reply,
                delay: Some(delay),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        async fn answer(&self) -> Result<AddressCollection, GeocodeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let request = format!("GET {}", self.name);
            match self.reply {
                Reply::Found(lat, lon) => Ok(AddressCollection::new(vec![Address::builder(
                    self.name,
                )
                .coordinates(Some(lat), Some(lon))
                .build()])),
                Reply::Empty => Ok(AddressCollection::default()),
                Reply::Fail(ErrorKind::NoResult) => {
                    Err(GeocodeError::no_result(self.name, request))
                }
                Reply::Fail(ErrorKind::InvalidCredentials) => {
                    Err(GeocodeError::invalid_credentials(self.name, request))
                }
                Reply::Fail(ErrorKind::QuotaExceeded) => {
                    Err(GeocodeError::quota_exceeded(self.name, request))
                }
                Reply::Fail(_) => Err(GeocodeError::unsupported(self.name, request, "stub")),
            }
        }
    }

    #[async_trait]
    impl Provider for Stub {
        fn name(&self) -> &str {
            self.name
        }

        fn capabilities(&self) -> Capabilities {
            self.caps
        }

        async fn geocode_request(
            &self,
            _request: &GeocodeRequest,
        ) -> Result<AddressCollection, GeocodeError> {
            self.answer().await
        }

        async fn reverse(&self, _lat: f64, _lon: f64) -> Result<AddressCollection, GeocodeError> {
            self.answer().await
        }
    }

    fn chain(providers: Vec<Arc<Stub>>) -> ProviderChain {
        ProviderChain::new(
            providers
                .into_iter()
                .map(|p| p as Arc<dyn Provider>)
                .collect(),
        )
    }

    #[tokio::test]
    async fn test_falls_through_to_second_provider() {
        let a = Stub::new("a", Capabilities::ADDRESS, Reply::Fail(ErrorKind::NoResult));
        let b = Stub::new("b", Capabilities::ADDRESS, Reply::Found(48.86, 2.35));
        let chain = chain(vec![a.clone(), b.clone()]);

        let outcome = chain.geocode_traced("Paris").await;
        assert_eq!(outcome.winner.as_deref(), Some("b"));
        assert_eq!(outcome.attempts().len(), 1);
        assert!(outcome.attempts()[0].failed_with(ErrorKind::NoResult));

        let expected = b.answer().await.unwrap();
        assert_eq!(outcome.into_result().unwrap(), expected);
    }

    #[tokio::test]
    async fn test_first_success_stops_chain() {
        let a = Stub::new("a", Capabilities::ADDRESS, Reply::Found(1.0, 2.0));
        let b = Stub::new("b", Capabilities::ADDRESS, Reply::Found(3.0, 4.0));
        let chain = chain(vec![a.clone(), b.clone()]);

        let result = chain.geocode("Paris").await.unwrap();
        assert_eq!(result.first().unwrap().provided_by(), "a");
        assert_eq!(b.calls(), 0);
    }

    #[tokio::test]
    async fn test_sole_provider_error_surfaces_as_is() {
        let a = Stub::new(
            "a",
            Capabilities::ADDRESS,
            Reply::Fail(ErrorKind::InvalidCredentials),
        );
        let chain = chain(vec![a]);
        let err = chain.geocode("Paris").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidCredentials);
    }

    #[tokio::test]
    async fn test_sole_provider_empty_is_no_result() {
        let chain = chain(vec![Stub::new("a", Capabilities::ADDRESS, Reply::Empty)]);
        let outcome = chain.geocode_traced("Paris").await;
        let err = outcome.result().as_ref().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoResult);
        assert_eq!(outcome.attempts().len(), 1);
    }

    #[tokio::test]
    async fn test_exhausted_chain_reports_every_attempt() {
        let a = Stub::new(
            "a",
            Capabilities::ADDRESS,
            Reply::Fail(ErrorKind::InvalidCredentials),
        );
        let b = Stub::new("b", Capabilities::ADDRESS, Reply::Fail(ErrorKind::QuotaExceeded));
        let c = Stub::new("c", Capabilities::ADDRESS, Reply::Empty);
        let chain = chain(vec![a, b, c]);

        let err = chain.geocode("Paris").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoResult);
        assert_eq!(err.provider(), "chain");
        let names: Vec<&str> = err.attempts().iter().map(|a| a.provider.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(err.credential_failures(), vec!["a"]);
        assert!(matches!(err.attempts()[2].outcome, AttemptOutcome::Empty));
    }

    #[tokio::test]
    async fn test_ineligible_providers_are_skipped_not_called() {
        let a = Stub::new("a", Capabilities::IPV4, Reply::Found(1.0, 1.0));
        let b = Stub::new("b", Capabilities::IP, Reply::Found(2.0, 2.0));
        let chain = chain(vec![a.clone(), b.clone()]);

        let outcome = chain.geocode_traced("::ffff:88.188.221.14").await;
        assert_eq!(outcome.winner.as_deref(), Some("b"));
        assert_eq!(a.calls(), 0);
        assert!(matches!(outcome.attempts()[0].outcome, AttemptOutcome::Skipped));
        assert!(outcome.attempts()[0].error().is_none());
    }

    #[tokio::test]
    async fn test_reverse_skips_providers_without_reverse() {
        let a = Stub::new("a", Capabilities::IP, Reply::Found(1.0, 1.0));
        let b = Stub::new("b", Capabilities::ADDRESS, Reply::Found(2.0, 2.0));
        let chain = chain(vec![a.clone(), b]);
        let result = chain.reverse(48.86, 2.35).await.unwrap();
        assert_eq!(result.first().unwrap().provided_by(), "b");
        assert_eq!(a.calls(), 0);
    }

    #[tokio::test]
    async fn test_nothing_eligible_is_unsupported() {
        let a = Stub::new("a", Capabilities::ADDRESS, Reply::Found(1.0, 1.0));
        let b = Stub::new("b", Capabilities::ADDRESS, Reply::Found(2.0, 2.0));
        let chain = chain(vec![a.clone(), b]);

        let outcome = chain.geocode_traced("8.8.8.8").await;
        let err = outcome.result().as_ref().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedOperation);
        assert_eq!(err.request(), "geocode(\"8.8.8.8\")");
        assert_eq!(outcome.attempts().len(), 2);
        assert_eq!(a.calls(), 0);
    }

    #[tokio::test]
    async fn test_identical_calls_identical_order() {
        let a = Stub::new("a", Capabilities::ADDRESS, Reply::Fail(ErrorKind::NoResult));
        let b = Stub::new("b", Capabilities::ADDRESS, Reply::Found(48.86, 2.35));
        let chain = chain(vec![a, b]);
        let first = chain.geocode("Paris").await.unwrap();
        let second = chain.geocode("Paris").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_deadline_stops_before_next_provider() {
        let a = Stub::slow("a", Reply::Found(1.0, 1.0), Duration::from_secs(5));
        let b = Stub::new("b", Capabilities::ADDRESS, Reply::Found(2.0, 2.0));
        let chain = chain(vec![a, b.clone()]).with_deadline(Duration::from_millis(20));

        let err = chain.geocode("Paris").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DeadlineExceeded);
        assert_eq!(err.provider(), "a");
        assert_eq!(b.calls(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_call_never_reaches_next_provider() {
        let a = Stub::slow("a", Reply::Fail(ErrorKind::NoResult), Duration::from_secs(5));
        let b = Stub::new("b", Capabilities::ADDRESS, Reply::Found(2.0, 2.0));
        let chain = chain(vec![a, b.clone()]);

        let cancelled =
            tokio::time::timeout(Duration::from_millis(20), chain.geocode("Paris")).await;
        assert!(cancelled.is_err());
        assert_eq!(b.calls(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_prefers_priority_order() {
        let a = Stub::slow("a", Reply::Found(1.0, 1.0), Duration::from_millis(30));
        let b = Stub::new("b", Capabilities::ADDRESS, Reply::Found(2.0, 2.0));
        let c = Stub::new("c", Capabilities::ADDRESS, Reply::Fail(ErrorKind::QuotaExceeded));
        let chain = chain(vec![a, b.clone(), c.clone()]).with_strategy(DispatchStrategy::Concurrent);

        let outcome = chain.geocode_traced("Paris").await;
        assert_eq!(outcome.winner.as_deref(), Some("a"));
        assert_eq!(b.calls(), 1);
        assert_eq!(c.calls(), 1);
        assert_eq!(outcome.attempts().len(), 1);
        assert!(outcome.attempts()[0].failed_with(ErrorKind::QuotaExceeded));
    }

    #[tokio::test]
    async fn test_concurrent_collects_all_failures() {
        let a = Stub::new("a", Capabilities::ADDRESS, Reply::Fail(ErrorKind::NoResult));
        let b = Stub::new(
            "b",
            Capabilities::ADDRESS,
            Reply::Fail(ErrorKind::InvalidCredentials),
        );
        let chain = chain(vec![a, b]).with_strategy(DispatchStrategy::Concurrent);
        let err = chain.geocode("Paris").await.unwrap_err();
        assert_eq!(err.attempts().len(), 2);
        assert_eq!(err.credential_failures(), vec!["b"]);
    }

    #[tokio::test]
    async fn test_shared_chain_across_tasks() {
        let a = Stub::new("a", Capabilities::ADDRESS, Reply::Fail(ErrorKind::NoResult));
        let b = Stub::new("b", Capabilities::ADDRESS, Reply::Found(48.86, 2.35));
        let chain = Arc::new(chain(vec![a, b.clone()]));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let chain = Arc::clone(&chain);
                tokio::spawn(async move { chain.geocode("Paris").await })
            })
            .collect();
        for handle in handles {
            let result = handle.await.unwrap().unwrap();
            assert_eq!(result.first().unwrap().provided_by(), "b");
        }
        assert_eq!(b.calls(), 8);
    }

    #[test]
    fn test_chain_capabilities_union() {
        let a = Stub::new("a", Capabilities::ADDRESS, Reply::Empty);
        let b = Stub::new("b", Capabilities::IPV4, Reply::Empty);
        let chain = chain(vec![a, b]);
        let caps = chain.capabilities();
        assert!(caps.supports_kind(QueryKind::StreetAddress));
        assert!(caps.supports_kind(QueryKind::Ipv4));
        assert!(!caps.supports_kind(QueryKind::Ipv6));
        assert_eq!(chain.name(), "chain");
        assert_eq!(chain.provider_names(), vec!["a", "b"]);
    }
}
