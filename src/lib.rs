//! Hello smart contract and a native model of the host boundary it is
//! invoked through.
//!
//! The contract exports a single entry point, `main`, which takes opaque call
//! data and returns a 32-bit result code:
//!
//! ```
//! use sc_hello::{contract, Host};
//!
//! let host = Host::new();
//! let code = host.invoke(&contract::module(), "anything").unwrap();
//! assert_eq!(code.code(), 12);
//! ```

pub mod contract;
pub mod error;
pub mod host;

pub use error::{HostError, Result};
pub use host::{builtin_modules, find_builtin, CallArguments, EntryPoint, Host, Module, ResultCode};

/// Symbol the host looks up when no function is named explicitly
pub const DEFAULT_ENTRY_POINT: &str = "main";
