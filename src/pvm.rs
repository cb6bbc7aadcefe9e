//! Compiles a contract project and links it into a deployable PolkaVM blob.
//!
//! Blobs are linked for the `ReviveV1` instruction set, which only fixes the
//! ISA. Export names are a host convention: this tool's host looks for `main`,
//! so a linked blob must export `main` and nothing else. Hosts that expect the
//! `deploy`/`call` pair cannot run these contracts.

use anyhow::{Context, Result};
use log::{debug, info};
use std::{
    fs,
    path::{Path, PathBuf},
    process::Command,
};

use crate::vm;

/// Directory cargo writes PolkaVM target artifacts to, relative to `target/`
const TARGET_RELEASE_DIR: &str = "riscv64emac-unknown-none-polkavm/release";

/// A contract binary resolved from a project manifest.
#[derive(Debug)]
pub struct Contract {
    pub manifest_path: PathBuf,
    pub bin_name: String,
}

impl Contract {
    /// Locate the project enclosing `start_dir`; without an explicit name the
    /// first `[[bin]]` target is built.
    pub fn locate(start_dir: &Path, bin_name: Option<String>) -> Result<Self> {
        let manifest_path = find_manifest(start_dir)?
            .context("Could not find Cargo.toml in current directory or parent directories")?;
        debug!("Found Cargo.toml at: {}", manifest_path.display());

        let bin_name = match bin_name {
            Some(name) => name,
            None => {
                let manifest = fs::read_to_string(&manifest_path)
                    .with_context(|| format!("Failed to read Cargo.toml at {manifest_path:?}"))?;
                first_bin_name(&manifest)?
            }
        };
        debug!("Building binary: {bin_name}");

        Ok(Contract {
            manifest_path,
            bin_name,
        })
    }

    fn work_dir(&self) -> Result<&Path> {
        self.manifest_path
            .parent()
            .with_context(|| format!("Manifest has no parent directory: {:?}", self.manifest_path))
    }

    pub fn default_output(&self) -> PathBuf {
        PathBuf::from(format!("./{}.{}", self.bin_name, vm::BLOB_EXTENSION))
    }

    /// Compile, link and verify; returns the size of the written blob.
    pub fn build(&self, output_path: &Path) -> Result<usize> {
        let elf_path = self.compile()?;
        let elf_bytes =
            fs::read(&elf_path).with_context(|| format!("Failed to read ELF from {elf_path:?}"))?;

        let linked = link(&elf_bytes)?;
        verify_exports(&linked)?;

        fs::write(output_path, &linked)
            .with_context(|| format!("Failed to write PolkaVM bytecode to {output_path:?}"))?;
        info!("Wrote {} bytes to {output_path:?}", linked.len());
        Ok(linked.len())
    }

    fn compile(&self) -> Result<PathBuf> {
        let mut target = polkavm_linker::TargetJsonArgs::default();
        target.is_64_bit = true;
        let target_json =
            polkavm_linker::target_json_path(target).map_err(|e| anyhow::anyhow!(e))?;

        let work_dir = self.work_dir()?;
        let mut command = self.cargo_command(work_dir, &target_json);
        debug!("Running: {command:?}");

        let status = command
            .status()
            .context("Failed to execute cargo build")?;
        if !status.success() {
            anyhow::bail!("Failed to build binary {}", self.bin_name);
        }

        let elf_path = elf_output_path(work_dir, &self.bin_name);
        if !elf_path.exists() {
            anyhow::bail!("ELF binary was not generated at: {elf_path:?}");
        }
        Ok(elf_path)
    }

    fn cargo_command(&self, work_dir: &Path, target_json: &Path) -> Command {
        let mut command = Command::new("cargo");
        command
            .current_dir(work_dir)
            .env("RUSTC_BOOTSTRAP", "1")
            .args(["build", "--release", "--manifest-path"])
            .arg(&self.manifest_path)
            .args([
                "-Zbuild-std=core,alloc",
                "-Zbuild-std-features=panic_immediate_abort",
                "--bin",
                self.bin_name.as_str(),
                "--target",
            ])
            .arg(target_json);
        command
    }
}

/// Walk up from `start_dir` until a `Cargo.toml` is found.
pub fn find_manifest(start_dir: &Path) -> Result<Option<PathBuf>> {
    let start = start_dir.canonicalize()?;
    Ok(start
        .ancestors()
        .map(|dir| dir.join("Cargo.toml"))
        .find(|manifest| manifest.exists()))
}

/// Name of the first `[[bin]]` target declared in the manifest.
pub fn first_bin_name(manifest: &str) -> Result<String> {
    let doc = manifest
        .parse::<toml_edit::DocumentMut>()
        .context("Failed to parse Cargo.toml")?;

    let name = doc
        .get("bin")
        .and_then(|b| b.as_array_of_tables())
        .and_then(|arr| arr.get(0))
        .and_then(|bin| bin.get("name"))
        .and_then(|name| name.as_str())
        .context("No [[bin]] section found in Cargo.toml. Please specify a binary name.")?;

    Ok(name.to_string())
}

fn elf_output_path(work_dir: &Path, bin_name: &str) -> PathBuf {
    work_dir.join("target").join(TARGET_RELEASE_DIR).join(bin_name)
}

fn link(elf_bytes: &[u8]) -> Result<Vec<u8>> {
    let mut config = polkavm_linker::Config::default();
    config.set_strip(true);
    config.set_optimize(true);

    polkavm_linker::program_from_elf(
        config,
        polkavm_linker::TargetInstructionSet::ReviveV1,
        elf_bytes,
    )
    .map_err(|err| anyhow::anyhow!("Failed to link PolkaVM program: {err:?}"))
}

/// Reject linked blobs whose exports the host would not find.
pub fn verify_exports(linked: &[u8]) -> Result<()> {
    let blob = vm::parse_blob(linked.to_vec())?;
    let symbols = vm::exported_symbols(&blob);
    debug!("Linked exports: {symbols:?}");
    vm::ensure_single_entry_point(&symbols)
}
