//! Module invoker
//!
//! A [`ModuleInvoker`] is bound to a single module name and turns
//! `invoke(method, args)` into a call to the host's `invokeModuleAsync`,
//! normalizing whatever comes back into an [`InvocationResult`].
//!
//! Three outcomes are kept apart:
//!
//! - `Ok(Success(_))` / `Ok(Failure(_))`: the host answered, or there is no
//!   host to answer. A missing host is a normal condition and reported as a
//!   failure value, never as an error.
//! - `Err(Error::Transport(_))`: the call itself broke. This is not folded
//!   into the failure value.

use std::sync::Arc;

use bridge_traits::host::{HostLocator, HostPrimitive};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::config::BridgeConfig;
use crate::error::Result;
use crate::host::default_locator;
use crate::result::{decode_response, InvocationResult};

/// Invoker bound to one module name.
///
/// Cloning is cheap; the host is looked up again on every call.
#[derive(Clone)]
pub struct ModuleInvoker {
    module_name: String,
    locator: Arc<dyn HostLocator>,
}

impl std::fmt::Debug for ModuleInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleInvoker")
            .field("module_name", &self.module_name)
            .finish_non_exhaustive()
    }
}

/// Create an invoker for `module_name` using the platform's default locator.
pub fn create_invoker(module_name: impl Into<String>) -> ModuleInvoker {
    ModuleInvoker::new(module_name)
}

impl ModuleInvoker {
    pub fn new(module_name: impl Into<String>) -> Self {
        Self::with_locator(module_name, default_locator())
    }

    pub fn with_locator(module_name: impl Into<String>, locator: Arc<dyn HostLocator>) -> Self {
        Self {
            module_name: module_name.into(),
            locator,
        }
    }

    pub fn from_config(module_name: impl Into<String>, config: &BridgeConfig) -> Self {
        Self::with_locator(module_name, Arc::clone(&config.host_locator))
    }

    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    /// Call `method` with positional `args` and decode the value into `T`.
    ///
    /// Use `T = ()` for methods without a meaningful return value and
    /// `T = serde_json::Value` to keep the raw value.
    #[instrument(skip(self, args), fields(module = %self.module_name), level = "debug")]
    pub async fn invoke<T: DeserializeOwned>(
        &self,
        method: &str,
        args: Vec<Value>,
    ) -> Result<InvocationResult<T>> {
        let host = match self.locator.locate_host() {
            Some(host) if host.supports(HostPrimitive::InvokeModuleAsync) => host,
            _ => {
                warn!(
                    module = %self.module_name,
                    method,
                    "Module host unavailable, returning failure"
                );
                return Ok(InvocationResult::failure(format!(
                    "WebF {} is not available",
                    HostPrimitive::InvokeModuleAsync
                )));
            }
        };

        let raw = host
            .invoke_module_async(&self.module_name, method, args)
            .await?;
        debug!(module = %self.module_name, method, "Received host response");

        Ok(decode_response(raw))
    }
}

/// Encode one call argument as JSON.
pub fn encode_arg<T: Serialize + ?Sized>(arg: &T) -> Result<Value> {
    Ok(serde_json::to_value(arg)?)
}

/// Build the positional argument list for [`ModuleInvoker::invoke`].
///
/// Must be used inside a function returning `core_bridge::Result`.
///
/// ```ignore
/// let args = module_args![remote_id, options];
/// invoker.invoke::<()>("connect", args).await?;
/// ```
#[macro_export]
macro_rules! module_args {
    () => {
        ::std::vec::Vec::<$crate::__private::Value>::new()
    };
    ($($arg:expr),+ $(,)?) => {
        vec![$($crate::invoker::encode_arg(&$arg)?),+]
    };
}
