use anyhow::{Context, Result};
use include_dir::{include_dir, Dir};
use log::debug;
use std::io::Write;
use std::{
    fs,
    path::{Path, PathBuf},
};

// Embed the templates directory into the binary
static TEMPLATES_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/templates");

pub const DEFAULT_TEMPLATE: &str = "hello";

/// Names of the embedded templates, sorted.
pub fn available_templates() -> Vec<String> {
    let mut names: Vec<String> = TEMPLATES_DIR
        .dirs()
        .filter_map(|d| d.path().file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// Create `<parent>/<name>` from the named template and return its path.
pub fn init_project(parent: &Path, name: &str, template: &str) -> Result<PathBuf> {
    debug!("Initializing new contract project: {name} with template: {template}");

    let template_dir = TEMPLATES_DIR.get_dir(template).ok_or_else(|| {
        anyhow::anyhow!(
            "Template '{template}' not found. Available templates: {}",
            available_templates().join(", ")
        )
    })?;

    let target_dir = parent.join(name);
    if target_dir.exists() {
        anyhow::bail!("Directory already exists: {target_dir:?}");
    }

    fs::create_dir(&target_dir)
        .with_context(|| format!("Failed to create directory: {target_dir:?}"))?;

    copy_embedded_template(template_dir, &target_dir, name)?;
    Ok(target_dir)
}

fn copy_embedded_template(template_dir: &Dir, target_dir: &Path, project_name: &str) -> Result<()> {
    extract_embedded_dir(template_dir, target_dir)?;
    debug!("Extracted template files from {:?}", template_dir.path());

    let cargo_toml_path = template_dir.path().join("_Cargo.toml");
    let cargo_toml_file = template_dir
        .get_file(&cargo_toml_path)
        .ok_or_else(|| anyhow::anyhow!("Template missing _Cargo.toml at {cargo_toml_path:?}"))?;

    let cargo_toml_content = std::str::from_utf8(cargo_toml_file.contents())
        .context("Invalid UTF-8 in template Cargo.toml")?;

    let updated_cargo_toml = rename_package(cargo_toml_content, project_name)?;
    let cargo_toml_path = target_dir.join("Cargo.toml");

    debug!("Creating Cargo.toml at {cargo_toml_path:?}");
    let mut file = fs::File::create(&cargo_toml_path)
        .with_context(|| format!("Failed to create Cargo.toml at {cargo_toml_path:?}"))?;
    file.write_all(updated_cargo_toml.as_bytes())
        .context("Failed to write Cargo.toml")?;

    Ok(())
}

fn rename_package(manifest: &str, project_name: &str) -> Result<String> {
    let mut doc = manifest
        .parse::<toml_edit::DocumentMut>()
        .context("Failed to parse template Cargo.toml")?;

    doc["package"]["name"] = toml_edit::value(project_name);
    Ok(doc.to_string())
}

fn extract_embedded_dir(embedded_dir: &Dir, target_dir: &Path) -> Result<()> {
    extract_embedded_dir_impl(embedded_dir, target_dir, embedded_dir.path())
}

fn extract_embedded_dir_impl(
    embedded_dir: &Dir,
    target_dir: &Path,
    base_path: &Path,
) -> Result<()> {
    for file in embedded_dir.files() {
        let relative_path = file
            .path()
            .strip_prefix(base_path)
            .context("Failed to strip template prefix from file path")?;

        // _Cargo.toml is renamed and rewritten by copy_embedded_template
        if relative_path.file_name().and_then(|n| n.to_str()) == Some("_Cargo.toml") {
            continue;
        }

        let file_path = target_dir.join(relative_path);
        debug!("Extracting file: {relative_path:?}");

        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {parent:?}"))?;
        }

        let mut output_file = fs::File::create(&file_path)
            .with_context(|| format!("Failed to create file: {file_path:?}"))?;
        output_file
            .write_all(file.contents())
            .with_context(|| format!("Failed to write file: {file_path:?}"))?;
    }

    for subdir in embedded_dir.dirs() {
        extract_embedded_dir_impl(subdir, target_dir, base_path)?;
    }

    Ok(())
}
