//! Script → host method exposure
//!
//! A [`JavaMethod`] is a host method bound from its descriptor and handed to
//! script as a function. Arguments arrive as script values and are read with
//! `in_script` set; trailing arguments of a variadic method are collected into
//! one host array. Failures never cross back into host code: they become
//! script error values thrown at the caller.

use jsbridge_sdk::{BridgeError, BridgeResult, GlobalRef, JValue, LocalRef, MethodDescriptor, MethodId};
use tracing::{debug, trace};

use crate::context::ConversionContext;
use crate::engine::SliceSource;
use crate::java_types::{JavaTypeProvider, Loader};
use crate::method::check_varargs;
use crate::script::{ScriptFunction, ScriptValue};

/// A host method callable from script
#[derive(Debug)]
pub struct JavaMethod {
    name: String,
    method: MethodId,
    is_varargs: bool,
    return_loader: Loader,
    argument_loaders: Vec<Loader>,
}

impl JavaMethod {
    /// Bind the host method `method` described by `descriptor`
    pub fn bind(provider: &JavaTypeProvider, descriptor: &MethodDescriptor, method: MethodId) -> BridgeResult<Self> {
        check_varargs(descriptor)?;
        debug!(method = %descriptor.name, signature = %descriptor.signature(), "bound host method");
        Ok(Self {
            name: descriptor.name.clone(),
            method,
            is_varargs: descriptor.is_varargs,
            return_loader: provider.loader(descriptor.return_type),
            argument_loaders: descriptor.parameters.iter().map(|p| provider.loader(*p)).collect(),
        })
    }

    /// Method name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Host method identity
    pub fn method_id(&self) -> MethodId {
        self.method
    }

    /// Call the host method on `this` with script arguments.
    ///
    /// Missing arguments read as `undefined`; extra arguments of a
    /// non-variadic method are ignored.
    pub fn invoke(&self, cx: &ConversionContext, this: &LocalRef, args: &[ScriptValue]) -> BridgeResult<ScriptValue> {
        trace!(method = %self.name, nargs = args.len(), "script call into host");
        let mut host_args = Vec::with_capacity(self.argument_loaders.len());
        if let Err(err) = self.read_arguments(cx, args, &mut host_args) {
            JValue::release_all(&mut host_args);
            return Err(err);
        }
        let result = self
            .return_loader
            .converter()
            .call_method(cx, self.method, this, host_args)?;
        let script = self.return_loader.from_host(cx, &result, true)?;
        Ok(script.unwrap_or(ScriptValue::Undefined))
    }

    fn read_arguments(&self, cx: &ConversionContext, args: &[ScriptValue], out: &mut Vec<JValue>) -> BridgeResult<()> {
        let fixed = self.argument_loaders.len() - usize::from(self.is_varargs);
        for (index, loader) in self.argument_loaders.iter().take(fixed).enumerate() {
            let value = args.get(index).unwrap_or(&ScriptValue::Undefined);
            out.push(loader.to_host(cx, value, true)?);
        }
        if let Some(variadic) = self.argument_loaders.last().filter(|_| self.is_varargs) {
            let trailing = args.get(fixed..).unwrap_or_default();
            let mut source = SliceSource::new(trailing);
            out.push(variadic.converter().to_host_array(cx, &mut source, true)?);
        }
        Ok(())
    }

    /// Wrap the method as a script function bound to `receiver`
    pub fn into_script_function(self, cx: ConversionContext, receiver: GlobalRef) -> ScriptFunction {
        let name = self.name.clone();
        ScriptFunction::new(&name, move |_, _, args| {
            let this = cx.host().new_local_ref(&receiver);
            self.invoke(&cx, &this, args).map_err(|err| to_script_error(&err))
        })
    }
}

/// Script error value reporting a bridge failure inside script code
pub fn to_script_error(err: &BridgeError) -> ScriptValue {
    match err {
        BridgeError::Script(exception) => ScriptValue::Error(exception.clone()),
        other => ScriptValue::error(other.script_error_name(), other.to_string()),
    }
}
