//! Host → script method invocation
//!
//! A [`JavaScriptMethod`] is bound once from a [`MethodDescriptor`] and then
//! invoked any number of times against any backend:
//!
//! ```text
//! begin_call ─► push_argument × n ─► call ─► [await_outcome] ─► read_outcome
//!      │               │               │            │                │
//!  Invocation   ArgumentConversion  Invocation    Await      ReturnConversion
//! ```
//!
//! The first failing step aborts the call. Host arguments are released once
//! they have been pushed, whether or not the call goes ahead.

use jsbridge_sdk::{BridgeError, BridgeResult, JValue, JsBridgeError, MethodDescriptor, Phase, Position, TypeIdentity};
use tracing::{debug, trace};

use crate::context::ConversionContext;
use crate::engine::Backend;
use crate::java_types::{JavaTypeProvider, Loader};

/// A script method bound to its loader set
#[derive(Debug)]
pub struct JavaScriptMethod {
    name: String,
    is_lambda: bool,
    is_varargs: bool,
    return_loader: Loader,
    argument_loaders: Vec<Loader>,
}

impl JavaScriptMethod {
    /// Build the loader set for `descriptor`.
    ///
    /// # Errors
    ///
    /// `UnsupportedOperation` for a variadic descriptor whose last parameter
    /// is not an array.
    pub fn bind(provider: &JavaTypeProvider, descriptor: &MethodDescriptor) -> BridgeResult<Self> {
        check_varargs(descriptor)?;
        let method = Self {
            name: descriptor.name.clone(),
            is_lambda: descriptor.is_lambda,
            is_varargs: descriptor.is_varargs,
            return_loader: provider.loader(descriptor.return_type),
            argument_loaders: descriptor.parameters.iter().map(|p| provider.loader(*p)).collect(),
        };
        debug!(
            method = %method.name,
            signature = %descriptor.signature(),
            lambda = method.is_lambda,
            varargs = method.is_varargs,
            "bound script method"
        );
        Ok(method)
    }

    /// Script-side method name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the target itself is the callable
    pub fn is_lambda(&self) -> bool {
        self.is_lambda
    }

    /// Whether the last parameter is variadic
    pub fn is_varargs(&self) -> bool {
        self.is_varargs
    }

    /// Declared return type
    pub fn return_type(&self) -> TypeIdentity {
        self.return_loader.identity()
    }

    /// Declared parameter types
    pub fn parameter_types(&self) -> Vec<TypeIdentity> {
        self.argument_loaders.iter().map(Loader::identity).collect()
    }

    fn fixed_arity(&self) -> usize {
        self.argument_loaders.len() - usize::from(self.is_varargs)
    }

    /// Call the method on `target`, consuming `args`.
    ///
    /// # Errors
    ///
    /// A [`JsBridgeError`] recording the phase of the first failing step and,
    /// for conversions, the argument index or the return value.
    pub fn invoke<B: Backend>(
        &self,
        backend: &mut B,
        cx: &ConversionContext,
        target: &B::Target,
        mut args: Vec<JValue>,
        await_result: bool,
        job_limit: usize,
    ) -> Result<JValue, JsBridgeError> {
        debug!(method = %self.name, nargs = args.len(), await_result, "invoking script method");

        let arity_ok = if self.is_varargs {
            args.len() >= self.fixed_arity()
        } else {
            args.len() == self.argument_loaders.len()
        };
        if !arity_ok {
            let err = BridgeError::unsupported(format!(
                "{} expects {} arguments, got {}",
                self.name,
                self.argument_loaders.len(),
                args.len()
            ));
            JValue::release_all(&mut args);
            return Err(envelope(err, Phase::ArgumentConversion, None));
        }

        let mut site = match backend.begin_call(target, &self.name, self.is_lambda) {
            Ok(site) => site,
            Err(err) => {
                JValue::release_all(&mut args);
                return Err(envelope(err, Phase::Invocation, None));
            }
        };

        let pushed = self.push_arguments(backend, &mut site, cx, &args);
        JValue::release_all(&mut args);
        if let Err((index, err)) = pushed {
            trace!(method = %self.name, index, error = %err, "argument conversion failed");
            backend.abandon_call(site);
            return Err(envelope(err, Phase::ArgumentConversion, Some(Position::Argument(index))));
        }

        let outcome = backend
            .call(site)
            .map_err(|err| envelope(err, Phase::Invocation, None))?;
        let outcome = if await_result {
            backend
                .await_outcome(outcome, job_limit)
                .map_err(|err| envelope(err, Phase::Await, None))?
        } else {
            outcome
        };
        backend
            .read_outcome(outcome, cx, &self.return_loader)
            .map_err(|err| envelope(err, Phase::ReturnConversion, Some(Position::ReturnValue)))
    }

    /// Push every argument left to right, reporting the failing index.
    ///
    /// Trailing variadic arguments are pushed one by one, except for a
    /// single host array at the variadic position, which goes over packed.
    fn push_arguments<B: Backend>(
        &self,
        backend: &mut B,
        site: &mut B::CallSite,
        cx: &ConversionContext,
        args: &[JValue],
    ) -> Result<(), (usize, BridgeError)> {
        let fixed = self.fixed_arity();
        for (index, (loader, value)) in self.argument_loaders.iter().zip(args).take(fixed).enumerate() {
            backend
                .push_argument(site, cx, loader, value)
                .map_err(|err| (index, err))?;
        }

        let Some(variadic) = self.argument_loaders.last().filter(|_| self.is_varargs) else {
            return Ok(());
        };
        let trailing = args.get(fixed..).unwrap_or_default();
        if let [packed @ JValue::Array(_)] = trailing {
            return backend
                .push_argument(site, cx, variadic, packed)
                .map_err(|err| (fixed, err));
        }
        let element = variadic.element();
        for (offset, value) in trailing.iter().enumerate() {
            backend
                .push_argument(site, cx, &element, value)
                .map_err(|err| (fixed + offset, err))?;
        }
        Ok(())
    }
}

pub(crate) fn check_varargs(descriptor: &MethodDescriptor) -> BridgeResult<()> {
    if descriptor.is_varargs && !descriptor.parameters.last().is_some_and(|p| p.is_array()) {
        return Err(BridgeError::unsupported(format!(
            "variadic method {} must end with an array parameter",
            descriptor.name
        )));
    }
    Ok(())
}

/// Whether a failure originated in script evaluation
pub(crate) fn in_script(err: &BridgeError) -> bool {
    match err {
        BridgeError::TypeConversion { in_script, .. } => *in_script,
        // A rejected await surfaces a script-land exception.
        BridgeError::Script(_) | BridgeError::AsyncRejection { .. } => true,
        _ => false,
    }
}

fn envelope(err: BridgeError, phase: Phase, position: Option<Position>) -> JsBridgeError {
    let origin = in_script(&err);
    JsBridgeError::new(err, phase, position, origin)
}
