//! Native model of the invocation boundary between a host and a contract.
//!
//! A [`Module`] is an export table mapping symbols to entry points. The
//! [`Host`] resolves a symbol, hands it the call data and returns the result
//! code. Panics inside an entry point are caught and reported as traps so
//! they never unwind into the caller.

use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use log::{debug, warn};

use crate::error::{HostError, Result};
use crate::{contract, DEFAULT_ENTRY_POINT};

/// Opaque call data supplied by the host for a single invocation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CallArguments(Vec<u8>);

impl CallArguments {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Call data viewed as text. Invalid UTF-8 is replaced, never rejected.
    pub fn to_str_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for CallArguments {
    fn from(value: &str) -> Self {
        CallArguments(value.as_bytes().to_vec())
    }
}

impl From<String> for CallArguments {
    fn from(value: String) -> Self {
        CallArguments(value.into_bytes())
    }
}

impl From<Vec<u8>> for CallArguments {
    fn from(value: Vec<u8>) -> Self {
        CallArguments(value)
    }
}

impl From<&[u8]> for CallArguments {
    fn from(value: &[u8]) -> Self {
        CallArguments(value.to_vec())
    }
}

/// 32-bit status returned by an entry point.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ResultCode(i32);

impl ResultCode {
    pub const SUCCESS: ResultCode = ResultCode(0);

    pub const fn new(code: i32) -> Self {
        ResultCode(code)
    }

    pub const fn code(self) -> i32 {
        self.0
    }

    /// Zero is the host's success convention; any other value is an
    /// application-defined status.
    pub const fn is_success(self) -> bool {
        self.0 == 0
    }
}

impl From<i32> for ResultCode {
    fn from(value: i32) -> Self {
        ResultCode(value)
    }
}

impl From<ResultCode> for i32 {
    fn from(value: ResultCode) -> Self {
        value.0
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Signature every exported entry point must have.
pub type EntryPoint = fn(&CallArguments) -> ResultCode;

/// A loaded contract: its name and exported entry points.
#[derive(Clone, Debug)]
pub struct Module {
    name: String,
    exports: BTreeMap<String, EntryPoint>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Module {
            name: name.into(),
            exports: BTreeMap::new(),
        }
    }

    pub fn with_export(mut self, symbol: impl Into<String>, entry: EntryPoint) -> Self {
        self.exports.insert(symbol.into(), entry);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn export(&self, symbol: &str) -> Option<EntryPoint> {
        self.exports.get(symbol).copied()
    }

    /// Exported symbols in lexical order
    pub fn exports(&self) -> impl Iterator<Item = &str> {
        self.exports.keys().map(String::as_str)
    }
}

/// Invokes entry points of loaded modules.
///
/// The host keeps no state between invocations: each call borrows the module,
/// runs the entry point to completion and drops the call data.
///
/// Panics are contained but the process panic hook is left alone, so a trap
/// still prints the usual panic message to stderr before it is returned as
/// [`HostError::Trap`].
#[derive(Clone, Copy, Debug, Default)]
pub struct Host;

impl Host {
    pub fn new() -> Self {
        Host
    }

    /// Invoke the module's default entry point.
    pub fn invoke(&self, module: &Module, args: impl Into<CallArguments>) -> Result<ResultCode> {
        self.invoke_function(module, DEFAULT_ENTRY_POINT, args)
    }

    /// Invoke a named export of the module.
    pub fn invoke_function(
        &self,
        module: &Module,
        symbol: &str,
        args: impl Into<CallArguments>,
    ) -> Result<ResultCode> {
        let entry = module
            .export(symbol)
            .ok_or_else(|| HostError::MissingEntryPoint {
                module: module.name().to_string(),
                symbol: symbol.to_string(),
            })?;

        let args = args.into();
        debug!(
            "Invoking {}::{symbol} with {} bytes of call data",
            module.name(),
            args.len()
        );

        match panic::catch_unwind(AssertUnwindSafe(|| entry(&args))) {
            Ok(code) => {
                debug!("{}::{symbol} returned {code}", module.name());
                Ok(code)
            }
            Err(payload) => {
                let reason = panic_reason(payload.as_ref());
                warn!("{}::{symbol} trapped: {reason}", module.name());
                Err(HostError::Trap {
                    symbol: symbol.to_string(),
                    reason,
                })
            }
        }
    }
}

fn panic_reason(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Contracts compiled natively into this crate.
pub fn builtin_modules() -> Vec<Module> {
    vec![contract::module()]
}

pub fn find_builtin(name: &str) -> Option<Module> {
    builtin_modules().into_iter().find(|m| m.name() == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trapping(_args: &CallArguments) -> ResultCode {
        panic!("unreachable instruction")
    }

    fn echo_len(args: &CallArguments) -> ResultCode {
        ResultCode::new(args.len() as i32)
    }

    #[test]
    fn test_invoke_default_entry_point() {
        let host = Host::new();
        let module = contract::module();
        assert_eq!(host.invoke(&module, "").unwrap(), ResultCode::new(12));
    }

    #[test]
    fn test_invoke_named_function() {
        let host = Host::new();
        let module = Module::new("test").with_export("len", echo_len);
        let code = host.invoke_function(&module, "len", "abcd").unwrap();
        assert_eq!(code.code(), 4);
    }

    #[test]
    fn test_missing_entry_point() {
        let host = Host::new();
        let module = Module::new("empty");
        let err = host.invoke(&module, "x").unwrap_err();
        assert_eq!(
            err,
            HostError::MissingEntryPoint {
                module: "empty".to_string(),
                symbol: "main".to_string(),
            }
        );
    }

    #[test]
    fn test_trap_is_contained() {
        let host = Host::new();
        let module = Module::new("bad").with_export("main", trapping);
        match host.invoke(&module, "") {
            Err(HostError::Trap { symbol, reason }) => {
                assert_eq!(symbol, "main");
                assert_eq!(reason, "unreachable instruction");
            }
            other => panic!("expected trap, got {other:?}"),
        }
    }

    #[test]
    fn test_call_arguments_lossy_view() {
        let args = CallArguments::from(vec![b'h', b'i', 0xff]);
        assert_eq!(args.len(), 3);
        assert_eq!(args.as_bytes(), &[b'h', b'i', 0xff]);
        assert_eq!(CallArguments::from("hi").as_bytes(), b"hi");
        assert_eq!(args.to_str_lossy(), "hi\u{fffd}");
        assert!(CallArguments::default().is_empty());
    }

    #[test]
    fn test_result_code_success_convention() {
        assert!(ResultCode::SUCCESS.is_success());
        assert!(!ResultCode::new(12).is_success());
        assert_eq!(i32::from(ResultCode::from(-3)), -3);
        assert_eq!(ResultCode::new(12).to_string(), "12");
    }

    #[test]
    fn test_builtin_registry() {
        let hello = find_builtin("hello").unwrap();
        assert_eq!(hello.exports().collect::<Vec<_>>(), vec!["main"]);
        assert!(find_builtin("missing").is_none());
    }
}
