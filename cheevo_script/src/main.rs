//! CLI entry point for cheevo_script.
//! Usage: cargo run -p cheevo_script -- compile sets/example.cheevo

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand};
use log::{debug, info};

use cheevo_script::{
    Config, Interpreter, PrintOptions, Progress, RunOutcome, ScriptOutput, Trigger, ValueExpression, decompile,
    decompile_value, parse_program,
};

#[derive(Parser)]
#[command(author, version, about = "Compile achievement scripts and decompile triggers.")]
struct Cli {
    /// Configuration file (defaults to ./cheevo.toml when present).
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a script and write the assets it declares as TOML.
    Compile(CompileArgs),
    /// Print a serialized trigger or value as script source.
    Decompile(DecompileArgs),
    /// Run a script and report problems without writing output.
    Check {
        /// Script to check.
        file: PathBuf,
    },
}

#[derive(Args)]
struct CompileArgs {
    /// Script to compile.
    file: PathBuf,
    /// Write the TOML here instead of stdout.
    #[arg(long, value_name = "FILE")]
    out: Option<PathBuf>,
}

#[derive(Args)]
struct DecompileArgs {
    /// Serialized trigger, e.g. `0xH001234=5_R:0xH001235=1`.
    trigger: String,
    /// Treat the input as a leaderboard or rich presence value.
    #[arg(long)]
    value: bool,
    /// Print constants in hexadecimal.
    #[arg(long)]
    hex: bool,
    /// Wrap lines at this width.
    #[arg(long, value_name = "COLUMNS")]
    width: Option<usize>,
}

/// Logs progress of long scripts.
struct LogProgress;

impl Progress for LogProgress {
    fn report(&mut self, percent: u8, line: usize) {
        debug!("{percent}% done (line {line})");
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).context("while loading configuration")?;

    match cli.command {
        Commands::Compile(args) => run_compile(&args),
        Commands::Decompile(args) => run_decompile(&args, config.print),
        Commands::Check { file } => run_check(&file),
    }
}

fn run_script(path: &Path) -> Result<ScriptOutput> {
    let source = fs::read_to_string(path).with_context(|| format!("unable to read '{}'", path.display()))?;
    let program = parse_program(&source).with_context(|| format!("while parsing '{}'", path.display()))?;
    info!("running {} top-level statements from {}", program.len(), path.display());

    let interpreter = Interpreter::new();
    let outcome = interpreter
        .run(&program, Some(&mut LogProgress))
        .with_context(|| format!("while running '{}'", path.display()))?;
    if outcome == RunOutcome::Aborted {
        return Err(anyhow!("script run was aborted"));
    }
    Ok(interpreter.into_output())
}

fn run_compile(args: &CompileArgs) -> Result<()> {
    let output = run_script(&args.file)?;
    if output.is_empty() {
        eprintln!("warning: '{}' declares no assets", args.file.display());
    }
    let toml = output.to_toml();
    match &args.out {
        Some(out) => {
            fs::write(out, toml).with_context(|| format!("writing '{}'", out.display()))?;
            info!("wrote {}", out.display());
        },
        None => println!("{toml}"),
    }
    Ok(())
}

fn run_check(path: &Path) -> Result<()> {
    let output = run_script(path)?;
    println!(
        "{}: OK ({} achievements, {} leaderboards, {} rich presence displays)",
        path.display(),
        output.achievements.len(),
        output.leaderboards.len(),
        output.rich_presence.displays.len()
    );
    Ok(())
}

fn run_decompile(args: &DecompileArgs, mut options: PrintOptions) -> Result<()> {
    if args.hex {
        options.hex_values = true;
    }
    if let Some(width) = args.width {
        options.width = width;
    }
    let text = if args.value {
        let value: ValueExpression = args.trigger.parse().context("while parsing value")?;
        decompile_value(&value, &options)
    } else {
        let trigger: Trigger = args.trigger.parse().context("while parsing trigger")?;
        decompile(&trigger, &options)
    };
    println!("{text}");
    Ok(())
}
