//! The hello contract.
//!
//! Ignores its call data and always returns [`RESULT_CODE`]. The deployable
//! build of the same entry point ships as the `hello` template.

use crate::host::{CallArguments, Module, ResultCode};
use crate::DEFAULT_ENTRY_POINT;

/// Name the contract is registered under
pub const NAME: &str = "hello";

/// Status returned by every invocation
pub const RESULT_CODE: i32 = 12;

pub fn main(_args: &str) -> i32 {
    RESULT_CODE
}

/// Adapter from raw call data to [`main`].
pub fn entry(args: &CallArguments) -> ResultCode {
    ResultCode::new(main(&args.to_str_lossy()))
}

pub fn module() -> Module {
    Module::new(NAME).with_export(DEFAULT_ENTRY_POINT, entry)
}
