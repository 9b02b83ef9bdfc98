//! Bridge context
//!
//! `JsBridgeContext` ties one engine backend to one host runtime. It owns the
//! converter provider and configuration, binds descriptors into callable
//! methods in both directions, and runs invocations.

use std::fmt;
use std::sync::Arc;

use jsbridge_sdk::{
    BridgeError, DescriptorSource, HostRuntime, JValue, JsBridgeError, LocalRef, MethodDescriptor, MethodId,
    Phase,
};
use tracing::debug;

use crate::config::BridgeConfig;
use crate::engine::{Backend, HandleEngine, StackEngine};
use crate::java_method::JavaMethod;
use crate::java_types::JavaTypeProvider;
use crate::method::JavaScriptMethod;
use crate::script::ScriptValue;

/// What every converter needs: the host runtime and the numeric policy
#[derive(Clone)]
pub struct ConversionContext {
    host: Arc<dyn HostRuntime>,
    strict_numbers: bool,
}

impl ConversionContext {
    /// Context over `host`
    pub fn new(host: Arc<dyn HostRuntime>, strict_numbers: bool) -> Self {
        Self { host, strict_numbers }
    }

    /// The host runtime
    #[inline]
    pub fn host(&self) -> &dyn HostRuntime {
        self.host.as_ref()
    }

    /// Whether integer targets reject fractional numbers
    #[inline]
    pub fn strict_numbers(&self) -> bool {
        self.strict_numbers
    }
}

impl fmt::Debug for ConversionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionContext")
            .field("runtime", &self.host.runtime_id())
            .field("strict_numbers", &self.strict_numbers)
            .finish()
    }
}

/// One script context bridged to one host runtime
pub struct JsBridgeContext<B: Backend> {
    backend: B,
    conversion: ConversionContext,
    provider: JavaTypeProvider,
    config: BridgeConfig,
}

impl JsBridgeContext<StackEngine> {
    /// Context over a fresh operand-stack engine sized by `config.stack_limit`
    pub fn with_stack_engine(host: Arc<dyn HostRuntime>, config: BridgeConfig) -> Self {
        let engine = StackEngine::with_limit(config.stack_limit);
        Self::new(engine, host, config)
    }
}

impl JsBridgeContext<HandleEngine> {
    /// Context over a fresh handle engine
    pub fn with_handle_engine(host: Arc<dyn HostRuntime>, config: BridgeConfig) -> Self {
        Self::new(HandleEngine::new(), host, config)
    }
}

impl<B: Backend> JsBridgeContext<B> {
    /// Create a context
    pub fn new(backend: B, host: Arc<dyn HostRuntime>, config: BridgeConfig) -> Self {
        let conversion = ConversionContext::new(host, config.strict_numbers);
        Self {
            backend,
            conversion,
            provider: JavaTypeProvider::new(),
            config,
        }
    }

    /// The engine backend
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The engine backend, mutably (to build targets and inspect state)
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Conversion context shared by all converters of this bridge
    pub fn conversion(&self) -> &ConversionContext {
        &self.conversion
    }

    /// The host runtime
    pub fn host(&self) -> &dyn HostRuntime {
        self.conversion.host()
    }

    /// Active configuration
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Converter provider
    pub fn provider(&self) -> &JavaTypeProvider {
        &self.provider
    }

    // ========================================================================
    // Host → script calls
    // ========================================================================

    /// Bind a script method described by `descriptor`.
    ///
    /// # Errors
    ///
    /// `UnsupportedOperation` in the `Bind` phase when the descriptor is
    /// malformed (a variadic method whose last parameter is not an array).
    pub fn bind_method(&self, descriptor: &MethodDescriptor) -> Result<JavaScriptMethod, JsBridgeError> {
        JavaScriptMethod::bind(&self.provider, descriptor)
            .map_err(|err| JsBridgeError::new(err, Phase::Bind, None, false))
    }

    /// Bind the method `id` as described by `source`
    pub fn bind_from_source(
        &self,
        source: &dyn DescriptorSource,
        id: MethodId,
    ) -> Result<JavaScriptMethod, JsBridgeError> {
        let descriptor = source.method_descriptor(id).ok_or_else(|| {
            JsBridgeError::new(
                BridgeError::unsupported(format!("no descriptor for method {}", id.0)),
                Phase::Bind,
                None,
                false,
            )
        })?;
        self.bind_method(&descriptor)
    }

    /// Call `method` on `target`, consuming `args`.
    ///
    /// With `await_result` set, a promise result is driven to completion
    /// before the return value is converted. A script error left pending by
    /// a job during the call is rethrown afterwards.
    pub fn invoke(
        &mut self,
        method: &JavaScriptMethod,
        target: &B::Target,
        args: Vec<JValue>,
        await_result: bool,
    ) -> Result<JValue, JsBridgeError> {
        let result = method.invoke(
            &mut self.backend,
            &self.conversion,
            target,
            args,
            await_result,
            self.config.await_job_limit,
        );
        match result {
            Ok(value) => {
                self.check_rethrow_js_error()?;
                Ok(value)
            }
            Err(err) => {
                // The call already failed; a job error behind it is dropped.
                if let Some(thrown) = self.backend.take_pending_error() {
                    debug!(
                        error = %thrown.describe(),
                        failure = %err,
                        "dropping pending script error behind a failed call"
                    );
                }
                Err(err)
            }
        }
    }

    /// Turn a script error left pending by a job into a host-visible error
    pub fn check_rethrow_js_error(&mut self) -> Result<(), JsBridgeError> {
        match self.backend.take_pending_error() {
            Some(thrown) => {
                debug!(error = %thrown.describe(), "rethrowing pending script error");
                Err(JsBridgeError::new(
                    BridgeError::Script(thrown.to_exception()),
                    Phase::Invocation,
                    None,
                    true,
                ))
            }
            None => Ok(()),
        }
    }

    // ========================================================================
    // Script → host calls
    // ========================================================================

    /// Bind the host method `id` described by `descriptor` for exposure to
    /// script
    pub fn bind_java_method(
        &self,
        descriptor: &MethodDescriptor,
        id: MethodId,
    ) -> Result<JavaMethod, JsBridgeError> {
        JavaMethod::bind(&self.provider, descriptor, id)
            .map_err(|err| JsBridgeError::new(err, Phase::Bind, None, true))
    }

    /// Script function calling `method` on `receiver`
    pub fn export_java_method(&self, method: JavaMethod, receiver: &LocalRef) -> ScriptValue {
        let receiver = self.host().new_global_ref(receiver);
        ScriptValue::Function(method.into_script_function(self.conversion.clone(), receiver))
    }
}
