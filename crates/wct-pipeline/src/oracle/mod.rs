//! The reasoning oracle: a stateless text-completion service.
//!
//! The pipeline only needs `complete(system, user) -> text`. Concrete HTTP
//! backends live in [`backends`]; [`offline`] answers from the corpus itself
//! for demos, and [`MockOracle`] is a scripted double for tests.

pub mod backends;
pub mod offline;

use parking_lot::Mutex;

pub use backends::{build_oracle, BackendKind, LlmOracle, OracleSettings};
pub use offline::OfflineOracle;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OracleError {
    /// Transport, service or credential failure. Carries the upstream text.
    #[error("{0}")]
    Unavailable(String),
    #[error("{backend}: model returned no text")]
    EmptyResponse { backend: String },
}

pub trait Oracle {
    fn complete(&self, system: &str, user: &str) -> Result<String, OracleError>;

    /// Short label for logs and error messages.
    fn name(&self) -> &str {
        "oracle"
    }
}

impl<T: Oracle + ?Sized> Oracle for Box<T> {
    fn complete(&self, system: &str, user: &str) -> Result<String, OracleError> {
        (**self).complete(system, user)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<T: Oracle + ?Sized> Oracle for &T {
    fn complete(&self, system: &str, user: &str) -> Result<String, OracleError> {
        (**self).complete(system, user)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// One request as seen by an oracle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleCall {
    pub system: String,
    pub user: String,
}

type Responder = Box<dyn Fn(&OracleCall) -> Result<String, OracleError> + Send + Sync>;

/// Scripted oracle that records every call.
pub struct MockOracle {
    responder: Responder,
    calls: Mutex<Vec<OracleCall>>,
}

impl MockOracle {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&OracleCall) -> Result<String, OracleError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn always(response: &str) -> Self {
        let response = response.to_string();
        Self::new(move |_| Ok(response.clone()))
    }

    pub fn failing(message: &str) -> Self {
        let message = message.to_string();
        Self::new(move |_| Err(OracleError::Unavailable(message.clone())))
    }

    pub fn calls(&self) -> Vec<OracleCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

impl Oracle for MockOracle {
    fn complete(&self, system: &str, user: &str) -> Result<String, OracleError> {
        let call = OracleCall {
            system: system.to_string(),
            user: user.to_string(),
        };
        let response = (self.responder)(&call);
        self.calls.lock().push(call);
        response
    }

    fn name(&self) -> &str {
        "mock"
    }
}
