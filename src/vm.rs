//! Loading and calling linked PolkaVM contract blobs.
//!
//! Call data is copied into the module's auxiliary data region and the entry
//! point receives `(args_ptr, args_len)`, matching the export shape of the
//! `hello` template. Gas metering is left disabled.

use anyhow::{Context, Result};
use log::debug;
use polkavm::{CallError, Config, Engine, Linker, Module, ModuleConfig, ProgramBlob};
use sc_hello::{CallArguments, HostError, ResultCode, DEFAULT_ENTRY_POINT};
use std::{fs, path::Path};

/// Extension of blobs written by `build` and accepted by `call`
pub const BLOB_EXTENSION: &str = "polkavm";

/// Read a `.polkavm` file. Any other extension is rejected before reading.
pub fn read_blob(path: &Path) -> Result<ProgramBlob> {
    if path.extension().and_then(|ext| ext.to_str()) != Some(BLOB_EXTENSION) {
        anyhow::bail!("{} should be .{BLOB_EXTENSION}", path.display());
    }

    let bytes = fs::read(path).with_context(|| format!("Failed to read blob from {path:?}"))?;
    debug!("Read {} bytes from {path:?}", bytes.len());
    parse_blob(bytes)
}

pub fn parse_blob(bytes: Vec<u8>) -> Result<ProgramBlob> {
    ProgramBlob::parse(bytes.into())
        .map_err(|err| anyhow::anyhow!("Failed to parse PolkaVM blob: {err:?}"))
}

pub fn exported_symbols(blob: &ProgramBlob) -> Vec<String> {
    blob.exports()
        .map(|export| String::from_utf8_lossy(export.symbol().as_bytes()).into_owned())
        .collect()
}

/// The host only looks for `main`; a contract exporting anything else, or
/// nothing, is not deployable.
pub fn ensure_single_entry_point(symbols: &[String]) -> Result<()> {
    match symbols {
        [only] if only == DEFAULT_ENTRY_POINT => Ok(()),
        _ => anyhow::bail!(
            "Contract must export exactly `{DEFAULT_ENTRY_POINT}`, found: [{}]",
            symbols.join(", ")
        ),
    }
}

/// Instantiate the blob and invoke `function` with the call data.
pub fn call_blob(
    blob: ProgramBlob,
    name: &str,
    function: &str,
    args: &CallArguments,
) -> Result<ResultCode> {
    if !exported_symbols(&blob).iter().any(|symbol| symbol == function) {
        return Err(HostError::MissingEntryPoint {
            module: name.to_string(),
            symbol: function.to_string(),
        }
        .into());
    }

    let args_len = u32::try_from(args.len()).context("Call data does not fit in guest memory")?;

    let config = Config::from_env().map_err(|err| anyhow::anyhow!("Invalid VM config: {err}"))?;
    let engine =
        Engine::new(&config).map_err(|err| anyhow::anyhow!("Failed to start VM: {err}"))?;

    let mut module_config = ModuleConfig::new();
    module_config.set_aux_data_size(args_len);
    let module = Module::from_blob(&engine, &module_config, blob)
        .map_err(|err| anyhow::anyhow!("Failed to load module {name}: {err}"))?;

    let linker: Linker = Linker::new();
    let instance_pre = linker
        .instantiate_pre(&module)
        .map_err(|err| anyhow::anyhow!("Failed to link module {name}: {err}"))?;
    let mut instance = instance_pre
        .instantiate()
        .map_err(|err| anyhow::anyhow!("Failed to instantiate module {name}: {err}"))?;

    let args_ptr = module.memory_map().aux_data_address();
    if !args.is_empty() {
        instance
            .write_memory(args_ptr, args.as_bytes())
            .map_err(|err| anyhow::anyhow!("Failed to copy call data: {err:?}"))?;
    }

    debug!("Invoking {name}::{function} with {args_len} bytes of call data at {args_ptr:#x}");
    match instance.call_typed_and_get_result::<i32, (u32, u32)>(
        &mut (),
        function,
        (args_ptr, args_len),
    ) {
        Ok(code) => Ok(ResultCode::new(code)),
        Err(CallError::Trap) => Err(HostError::Trap {
            symbol: function.to_string(),
            reason: "guest executed a trapping instruction".to_string(),
        }
        .into()),
        Err(err) => Err(anyhow::anyhow!("Call to {name}::{function} failed: {err:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn symbols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_read_blob_rejects_other_extensions() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("contract.wasm");
        fs::write(&path, b"\0asm").unwrap();

        let err = read_blob(&path).err().unwrap();
        assert!(err.to_string().ends_with("contract.wasm should be .polkavm"));
    }

    #[test]
    fn test_read_blob_rejects_missing_extension() {
        let err = read_blob(Path::new("contract")).err().unwrap();
        assert_eq!(err.to_string(), "contract should be .polkavm");
    }

    #[test]
    fn test_read_blob_rejects_garbage() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("contract.polkavm");
        fs::write(&path, b"not a program blob").unwrap();

        let err = read_blob(&path).err().unwrap();
        assert!(err.to_string().contains("Failed to parse PolkaVM blob"));
    }

    #[test]
    fn test_single_main_export_accepted() {
        ensure_single_entry_point(&symbols(&["main"])).unwrap();
    }

    #[test]
    fn test_revive_exports_rejected() {
        let err = ensure_single_entry_point(&symbols(&["call", "deploy"])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Contract must export exactly `main`, found: [call, deploy]"
        );
    }

    #[test]
    fn test_extra_export_rejected() {
        assert!(ensure_single_entry_point(&symbols(&["main", "debug"])).is_err());
        assert!(ensure_single_entry_point(&[]).is_err());
    }
}
