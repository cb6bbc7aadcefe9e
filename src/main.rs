use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sc_hello::{
    builtin_modules, find_builtin, CallArguments, Host, ResultCode, DEFAULT_ENTRY_POINT,
};
use std::path::{Path, PathBuf};

mod pvm;
mod template;
mod vm;

/// Scaffold, build and call hello smart contracts
#[derive(Parser, Debug)]
#[command(name = "cargo")]
#[command(bin_name = "cargo")]
enum CargoCli {
    ScHello(ScHelloArgs),
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct ScHelloArgs {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build a contract to PolkaVM bytecode
    Build {
        /// Name of the binary to build (defaults to first binary in Cargo.toml)
        #[arg(short, long)]
        bin_name: Option<String>,

        /// Output path for the PolkaVM bytecode (defaults to ./<bin_name>.polkavm)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Initialize a new contract project from template
    Init {
        /// Name of the contract
        #[arg(value_name = "CONTRACT_NAME")]
        name: String,

        /// Template to use
        #[arg(short, long, default_value = template::DEFAULT_TEMPLATE)]
        template: String,
    },
    /// Invoke a linked contract blob or a builtin contract
    Call {
        /// Linked contract to load (must end in .polkavm)
        #[arg(value_name = "FILE", conflicts_with = "contract")]
        file: Option<PathBuf>,

        /// Builtin contract to call when no file is given (defaults to hello)
        #[arg(short, long)]
        contract: Option<String>,

        /// Exported function to invoke
        #[arg(short, long, default_value = DEFAULT_ENTRY_POINT)]
        function: String,

        /// Call data passed to the entry point
        #[arg(short, long, default_value = "")]
        arg: String,

        /// Number of consecutive invocations
        #[arg(
            short,
            long,
            default_value_t = 1,
            value_parser = clap::value_parser!(u32).range(1..)
        )]
        repeat: u32,
    },
}

fn main() -> Result<()> {
    env_logger::init();

    let CargoCli::ScHello(args) = CargoCli::parse();

    match args.command {
        Commands::Build { bin_name, output } => build_command(bin_name, output),
        Commands::Init { name, template } => init_command(name, template),
        Commands::Call {
            file,
            contract,
            function,
            arg,
            repeat,
        } => match file {
            Some(path) => call_file_command(&path, function, arg, repeat),
            None => call_command(contract, function, arg, repeat),
        },
    }
}

fn build_command(bin_name: Option<String>, output: Option<PathBuf>) -> Result<()> {
    let current_dir = std::env::current_dir().context("Failed to get current directory")?;
    let contract = pvm::Contract::locate(&current_dir, bin_name)?;

    let output_path = output.unwrap_or_else(|| contract.default_output());
    contract.build(&output_path)?;

    println!("Successfully built contract: {output_path:?}");
    Ok(())
}

fn init_command(name: String, template: String) -> Result<()> {
    let parent = std::env::current_dir().context("Failed to get current directory")?;
    let target_dir = template::init_project(&parent, &name, &template)?;

    println!("Successfully initialized contract project: {target_dir:?}");
    println!("\nNext steps:");
    println!("  cd {name}");
    println!("  cargo sc-hello build");
    Ok(())
}

fn call_command(
    contract: Option<String>,
    function: String,
    arg: String,
    repeat: u32,
) -> Result<()> {
    let contract = contract.unwrap_or_else(|| sc_hello::contract::NAME.to_string());
    let module = find_builtin(&contract).ok_or_else(|| {
        anyhow::anyhow!(
            "Contract '{contract}' not found. Available contracts: {}",
            builtin_modules()
                .iter()
                .map(|m| m.name().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        )
    })?;

    let host = Host::new();
    let args = CallArguments::from(arg);
    invoke_repeatedly(&contract, &function, repeat, || {
        host.invoke_function(&module, &function, args.clone())
            .map_err(anyhow::Error::from)
    })
}

fn call_file_command(path: &Path, function: String, arg: String, repeat: u32) -> Result<()> {
    let blob = vm::read_blob(path)?;
    let name = path.display().to_string();
    println!("run file {name}");

    let args = CallArguments::from(arg);
    invoke_repeatedly(&name, &function, repeat, || {
        vm::call_blob(blob.clone(), &name, &function, &args)
    })
}

/// Each round gets a fresh invocation; nothing carries over between rounds.
fn invoke_repeatedly(
    contract: &str,
    function: &str,
    repeat: u32,
    mut invoke: impl FnMut() -> Result<ResultCode>,
) -> Result<()> {
    for round in 1..=repeat {
        let code = invoke()
            .with_context(|| format!("Call {round} of {contract}::{function} failed"))?;
        println!("{contract}::{function} returned {code}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn parse(args: &[&str]) -> Result<Commands, clap::Error> {
        let argv = ["cargo", "sc-hello"].iter().chain(args).copied();
        CargoCli::try_parse_from(argv).map(|CargoCli::ScHello(args)| args.command)
    }

    #[test]
    fn test_parse_call_defaults() {
        match parse(&["call"]).unwrap() {
            Commands::Call {
                file,
                contract,
                function,
                arg,
                repeat,
            } => {
                assert_eq!(file, None);
                assert_eq!(contract, None);
                assert_eq!(function, "main");
                assert_eq!(arg, "");
                assert_eq!(repeat, 1);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_call_file() {
        match parse(&["call", "contract.polkavm", "-f", "main", "-a", "hi"]).unwrap() {
            Commands::Call { file, arg, .. } => {
                assert_eq!(file, Some(PathBuf::from("contract.polkavm")));
                assert_eq!(arg, "hi");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_call_file_and_contract_conflict() {
        assert!(parse(&["call", "contract.polkavm", "--contract", "hello"]).is_err());
    }

    #[test]
    fn test_parse_repeat_must_be_positive() {
        let err = parse(&["call", "--repeat", "0"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
        assert!(parse(&["call", "--repeat", "3"]).is_ok());
    }

    #[test]
    fn test_parse_init_default_template() {
        match parse(&["init", "greeter"]).unwrap() {
            Commands::Init { name, template } => {
                assert_eq!(name, "greeter");
                assert_eq!(template, "hello");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_call_builtin_twice() {
        call_command(None, "main".into(), "payload".into(), 2).unwrap();
    }

    #[test]
    fn test_call_unknown_contract() {
        let err = call_command(Some("nope".into()), "main".into(), String::new(), 1).unwrap_err();
        assert!(err.to_string().contains("Available contracts: hello"));
    }

    #[test]
    fn test_call_unknown_function() {
        let err = call_command(None, "deploy".into(), String::new(), 1).unwrap_err();
        assert!(err.to_string().contains("Call 1 of hello::deploy failed"));
    }

    #[test]
    fn test_call_file_rejects_wasm() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("main.wasm");
        std::fs::write(&path, b"\0asm").unwrap();

        let err = call_file_command(&path, "main".into(), String::new(), 1).unwrap_err();
        assert!(err.to_string().ends_with("should be .polkavm"));
    }

    #[test]
    fn test_invoke_repeatedly_runs_every_round() {
        let mut calls = 0;
        invoke_repeatedly("hello", "main", 3, || {
            calls += 1;
            Ok(ResultCode::new(12))
        })
        .unwrap();
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_invoke_repeatedly_stops_on_failure() {
        let mut calls = 0;
        let err = invoke_repeatedly("hello", "main", 3, || {
            calls += 1;
            if calls == 2 {
                anyhow::bail!("trap");
            }
            Ok(ResultCode::new(12))
        })
        .unwrap_err();
        assert_eq!(calls, 2);
        assert_eq!(err.to_string(), "Call 2 of hello::main failed");
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        CargoCli::command().debug_assert();
    }
}
