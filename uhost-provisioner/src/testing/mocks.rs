//! Scripted provider for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;

use crate::errors::ProviderError;
use crate::provider::{CreateInstanceRequest, InstanceRecord, ProviderClient};

/// A provider call recorded by [`ScriptedProvider`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCall {
    /// `create_instance`.
    Create,
    /// `describe_instance` with the id.
    Describe(String),
    /// `stop_instance` with the id.
    Stop(String),
    /// `terminate_instance` with the id and release flags.
    Terminate {
        /// Instance id.
        id: String,
        /// Release attached disks.
        release_udisk: bool,
        /// Release the bound EIP.
        release_eip: bool,
    },
}

impl ProviderCall {
    /// Short name of the call, for ordering assertions.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Describe(_) => "describe",
            Self::Stop(_) => "stop",
            Self::Terminate { .. } => "terminate",
        }
    }
}

/// A provider that replays scripted answers and records every call.
///
/// Describe answers are consumed in order; the last one repeats forever.
/// With no describe answers scripted, every describe is not-found.
#[derive(Debug)]
pub struct ScriptedProvider {
    create: Mutex<Result<String, ProviderError>>,
    describes: Mutex<VecDeque<Result<InstanceRecord, ProviderError>>>,
    stop: Mutex<Result<(), ProviderError>>,
    terminate: Mutex<Result<(), ProviderError>>,
    calls: Mutex<Vec<ProviderCall>>,
    requests: Mutex<Vec<CreateInstanceRequest>>,
}

impl Default for ScriptedProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedProvider {
    /// Creates a provider whose create call returns `uhost-1`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            create: Mutex::new(Ok("uhost-1".to_string())),
            describes: Mutex::new(VecDeque::new()),
            stop: Mutex::new(Ok(())),
            terminate: Mutex::new(Ok(())),
            calls: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Sets the create answer.
    #[must_use]
    pub fn with_create(self, result: Result<String, ProviderError>) -> Self {
        *self.create.lock() = result;
        self
    }

    /// Appends describe answers.
    #[must_use]
    pub fn with_describes<I>(self, answers: I) -> Self
    where
        I: IntoIterator<Item = Result<InstanceRecord, ProviderError>>,
    {
        self.describes.lock().extend(answers);
        self
    }

    /// Sets the stop answer.
    #[must_use]
    pub fn with_stop(self, result: Result<(), ProviderError>) -> Self {
        *self.stop.lock() = result;
        self
    }

    /// Sets the terminate answer.
    #[must_use]
    pub fn with_terminate(self, result: Result<(), ProviderError>) -> Self {
        *self.terminate.lock() = result;
        self
    }

    /// Returns all recorded calls.
    #[must_use]
    pub fn calls(&self) -> Vec<ProviderCall> {
        self.calls.lock().clone()
    }

    /// Returns the kinds of all recorded calls, in order.
    #[must_use]
    pub fn call_kinds(&self) -> Vec<&'static str> {
        self.calls.lock().iter().map(ProviderCall::kind).collect()
    }

    /// Returns the number of describe calls.
    #[must_use]
    pub fn describe_count(&self) -> usize {
        self.count(|c| matches!(c, ProviderCall::Describe(_)))
    }

    /// Returns the number of stop calls.
    #[must_use]
    pub fn stop_count(&self) -> usize {
        self.count(|c| matches!(c, ProviderCall::Stop(_)))
    }

    /// Returns the number of terminate calls.
    #[must_use]
    pub fn terminate_count(&self) -> usize {
        self.count(|c| matches!(c, ProviderCall::Terminate { .. }))
    }

    /// Returns the create requests received.
    #[must_use]
    pub fn create_requests(&self) -> Vec<CreateInstanceRequest> {
        self.requests.lock().clone()
    }

    /// Resets call tracking.
    pub fn reset(&self) {
        self.calls.lock().clear();
        self.requests.lock().clear();
    }

    fn count(&self, pred: impl Fn(&ProviderCall) -> bool) -> usize {
        self.calls.lock().iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: ProviderCall) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl ProviderClient for ScriptedProvider {
    async fn create_instance(&self, request: &CreateInstanceRequest) -> Result<String, ProviderError> {
        self.record(ProviderCall::Create);
        self.requests.lock().push(request.clone());
        self.create.lock().clone()
    }

    async fn describe_instance(&self, id: &str) -> Result<InstanceRecord, ProviderError> {
        self.record(ProviderCall::Describe(id.to_string()));
        let mut describes = self.describes.lock();
        let answer = if describes.len() > 1 {
            describes.pop_front()
        } else {
            describes.front().cloned()
        };
        answer.unwrap_or_else(|| Err(ProviderError::instance_not_found(id)))
    }

    async fn stop_instance(&self, id: &str) -> Result<(), ProviderError> {
        self.record(ProviderCall::Stop(id.to_string()));
        self.stop.lock().clone()
    }

    async fn terminate_instance(
        &self,
        id: &str,
        release_udisk: bool,
        release_eip: bool,
    ) -> Result<(), ProviderError> {
        self.record(ProviderCall::Terminate {
            id: id.to_string(),
            release_udisk,
            release_eip,
        });
        self.terminate.lock().clone()
    }
}
