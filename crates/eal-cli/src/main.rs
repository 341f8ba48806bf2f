//! EAL CLI - Command-line interface for the EAL pseudo-assembly language

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use eal_core::advisory::TextVisualizer;
use eal_core::bytecode::{disassemble_program, Compiler};
use eal_core::monitor::render_log;
use eal_core::{EngineConfig, Executor, Response, Status};

#[derive(Parser)]
#[command(name = "eal")]
#[command(version = eal_core::VERSION)]
#[command(about = "Compile and run EAL pseudo-assembly", long_about = None)]
struct Cli {
    /// Configuration file (defaults apply when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile and run an EAL source file
    Run {
        /// Path to the source file
        file: PathBuf,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Run EAL source given on the command line
    Eval {
        /// Source text; statements may be separated with ';'
        source: String,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Compile a source file and report diagnostics without running it
    Check {
        /// Path to the source file
        file: PathBuf,

        /// Print the disassembled program
        #[arg(long)]
        bytecode: bool,
    },
}

#[derive(clap::Args)]
struct OutputArgs {
    /// Print the boundary response as JSON
    #[arg(long)]
    json: bool,

    /// Print the execution log
    #[arg(long)]
    trace: bool,

    /// Print the disassembled program before running
    #[arg(long)]
    bytecode: bool,

    /// Render an execution timeline on stderr
    #[arg(long)]
    visualize: bool,
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info,eal_core=debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run { file, output } => {
            let source = read_source(&file)?;
            run_source(&source, config, &output)
        }
        Commands::Eval { source, output } => run_source(&source, config, &output),
        Commands::Check { file, bytecode } => check_file(&file, bytecode),
    }
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("Failed to load config '{}'", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

fn read_source(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .map_err(|e| anyhow!("Failed to read file '{}': {}", path.display(), e))
}

/// Execute source and print the response
fn run_source(source: &str, config: EngineConfig, args: &OutputArgs) -> Result<()> {
    if args.bytecode {
        let program = Compiler::new().compile(source)?;
        println!("{}", disassemble_program(&program));
    }

    let mut executor = Executor::from_config(config);
    if args.visualize {
        executor = executor.with_visualizer(Box::new(TextVisualizer::new(std::io::stderr())));
    }

    let report = executor.execute_code(source);
    let response = match &report {
        Ok(report) => report.to_response(executor.config().trace.include_in_response),
        Err(err) => Response::failure(err),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        println!("{}", response.output);
        if args.trace {
            if let Ok(report) = &report {
                print!("{}", render_log(&report.trace));
            }
        }
        for suggestion in &response.suggestions {
            println!("suggestion: {suggestion}");
        }
    }

    match response.status {
        Status::Success => Ok(()),
        Status::Error => Err(anyhow!("execution failed")),
    }
}

/// Compile only and report diagnostics
fn check_file(path: &Path, bytecode: bool) -> Result<()> {
    let source = read_source(path)?;
    let program = Compiler::new().compile(&source)?;

    if bytecode {
        println!("{}", disassemble_program(&program));
    }
    for diagnostic in &program.diagnostics {
        eprintln!("{}: {diagnostic}", path.display());
    }

    if program.diagnostics.is_empty() {
        println!(
            "{}: {} instruction(s), {} function(s), no diagnostics",
            path.display(),
            program.code.len(),
            program.functions.len()
        );
        Ok(())
    } else {
        Err(anyhow!(
            "{} diagnostic(s) in '{}'",
            program.diagnostics.len(),
            path.display()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["eal", "-v", "eval", "mov r1, 1; print r1", "--json"]).unwrap();
        assert_eq!(cli.verbose, 1);
        assert!(matches!(cli.command, Commands::Eval { ref output, .. } if output.json));
    }

    #[test]
    fn missing_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(Some(&dir.path().join("absent.toml"))).is_err());
        assert_eq!(load_config(None).unwrap(), EngineConfig::default());
    }

    #[test]
    fn check_reports_diagnostics() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.eal");
        let bad = dir.path().join("bad.eal");
        std::fs::write(&good, "mov r1, 1\nprint r1\n").unwrap();
        std::fs::write(&bad, "mov r1, 1\n???\n").unwrap();

        assert!(check_file(&good, false).is_ok());
        let err = check_file(&bad, false).unwrap_err();
        assert!(err.to_string().contains("1 diagnostic(s)"));
    }
}
