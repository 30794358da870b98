//! Invocation results and host response normalization.
//!
//! Hosts answer `invokeModuleAsync` with a tagged object:
//!
//! ```text
//! { "type": "ok",  "value": <T> }
//! { "type": "err", "message": <string> }
//! ```
//!
//! Nothing enforces that shape on the host side, so every response goes
//! through [`normalize_response`] before reaching typed code. Upper layers
//! only ever see [`InvocationResult`].

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

/// Failure message used when the host sends `err` without a message.
pub const UNKNOWN_ERROR: &str = "Unknown error";

/// Failure message for responses outside the tagged protocol.
pub const INVALID_RESPONSE: &str = "Invalid response";

/// Normalized outcome of a module method call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationResult<T> {
    Success(T),
    /// Human-readable reason, whatever shape the host used to report it.
    Failure(String),
}

impl<T> InvocationResult<T> {
    pub fn failure(message: impl Into<String>) -> Self {
        InvocationResult::Failure(message.into())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, InvocationResult::Success(_))
    }

    pub fn is_failure(&self) -> bool {
        !self.is_success()
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            InvocationResult::Success(value) => Some(value),
            InvocationResult::Failure(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            InvocationResult::Success(_) => None,
            InvocationResult::Failure(message) => Some(message),
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> InvocationResult<U> {
        match self {
            InvocationResult::Success(value) => InvocationResult::Success(f(value)),
            InvocationResult::Failure(message) => InvocationResult::Failure(message),
        }
    }

    pub fn into_result(self) -> Result<T, String> {
        self.into()
    }
}

impl<T> From<InvocationResult<T>> for Result<T, String> {
    fn from(result: InvocationResult<T>) -> Self {
        match result {
            InvocationResult::Success(value) => Ok(value),
            InvocationResult::Failure(message) => Err(message),
        }
    }
}

/// Map a raw host response onto the two recognized shapes.
///
/// A missing `value` on success is `null`, the JSON image of `undefined`.
/// A non-string `message` is rendered as JSON rather than discarded.
pub fn normalize_response(raw: Value) -> InvocationResult<Value> {
    let Value::Object(mut response) = raw else {
        return InvocationResult::failure(INVALID_RESPONSE);
    };

    match response.get("type").and_then(Value::as_str) {
        Some("ok") => InvocationResult::Success(response.remove("value").unwrap_or(Value::Null)),
        Some("err") => match response.remove("message") {
            None | Some(Value::Null) => InvocationResult::failure(UNKNOWN_ERROR),
            Some(Value::String(message)) => InvocationResult::Failure(message),
            Some(other) => InvocationResult::Failure(other.to_string()),
        },
        _ => InvocationResult::failure(INVALID_RESPONSE),
    }
}

/// Normalize and decode a raw host response into `T`.
///
/// A successful response whose value does not fit `T` is a protocol
/// violation and reported as [`INVALID_RESPONSE`].
pub fn decode_response<T: DeserializeOwned>(raw: Value) -> InvocationResult<T> {
    match normalize_response(raw) {
        InvocationResult::Success(value) => match serde_json::from_value(value) {
            Ok(decoded) => InvocationResult::Success(decoded),
            Err(err) => {
                warn!(
                    error = %err,
                    expected = std::any::type_name::<T>(),
                    "Host value does not match the declared return type"
                );
                InvocationResult::failure(INVALID_RESPONSE)
            }
        },
        InvocationResult::Failure(message) => InvocationResult::Failure(message),
    }
}
