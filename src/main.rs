use std::io::IsTerminal as _;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context as _, Result};
use clap::{ArgAction, Parser};
use tracing::{debug, warn};

use elm_bench::config::{BenchConfig, CONFIG_FILE, ColorChoice};
use elm_bench::error::{BenchError, ErrorCategory};
use elm_bench::pipeline::{self, BenchRequest};
use elm_bench::report::{self, OutputFormat};
use elm_bench::telemetry;
use elm_bench::toolchain::{ElmToolchain, Interrupt};

/// Benchmark several Elm implementations of the same function
///
/// Each CANDIDATE is an Elm application directory whose entry module
/// (default `Main`) exposes FUNCTION. All candidates are compiled together
/// into one benchmark, called with the same ARG expressions, and compared
/// against the first candidate.
///
/// EXAMPLE:
///
///   elm-bench -f sort ./old ./new -- "List.range 1 1000 |> List.reverse"
///
/// EXIT CODES:
///
///   0 success, 2 input error, 3 candidates cannot be merged,
///   4 toolchain failure, 70 internal error, 74 workspace I/O failure,
///   130 interrupted
#[derive(Parser, Debug)]
#[command(name = "elm-bench")]
#[command(version, about)]
struct Cli {
    /// Function exposed by each candidate's entry module
    #[arg(short = 'f', long = "function", value_name = "FUNCTION")]
    function: String,

    /// Entry module in each candidate [default: Main, or [harness] entry]
    #[arg(long, value_name = "MODULE")]
    entry: Option<String>,

    /// Benchmark label shown in the report [default: FUNCTION]
    #[arg(long, value_name = "LABEL")]
    label: Option<String>,

    /// Extra module the ARG expressions refer to (repeatable)
    #[arg(long = "import", value_name = "MODULE")]
    imports: Vec<String>,

    /// Configuration file [default: ./elm-bench.toml if present]
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Compile without --optimize (needed when candidates use Debug)
    #[arg(long)]
    no_optimize: bool,

    /// Report format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Emphasize the fastest candidate with color
    #[arg(long, value_enum, value_name = "WHEN")]
    color: Option<ColorChoice>,

    /// Elm compiler to use
    #[arg(long, env = "ELM_BENCH_ELM", value_name = "PATH")]
    elm: Option<PathBuf>,

    /// Node.js binary to use
    #[arg(long, env = "ELM_BENCH_NODE", value_name = "PATH")]
    node: Option<PathBuf>,

    /// More logging on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Candidate project directories; the first is the baseline
    #[arg(value_name = "CANDIDATE", required = true)]
    candidates: Vec<String>,

    /// Elm expressions passed to FUNCTION, after `--`
    #[arg(last = true, value_name = "ARG")]
    args: Vec<String>,
}

fn load_config(cli: &Cli) -> Result<BenchConfig> {
    let (path, required) = cli
        .config
        .as_ref()
        .map_or_else(|| (PathBuf::from(CONFIG_FILE), false), |p| (p.clone(), true));
    let mut config = BenchConfig::load(&path, required)
        .with_context(|| format!("loading configuration from {}", path.display()))?;

    if cli.no_optimize {
        config.toolchain.optimize = false;
    }
    if let Some(elm) = &cli.elm {
        config.toolchain.elm.clone_from(elm);
    }
    if let Some(node) = &cli.node {
        config.toolchain.node.clone_from(node);
    }
    if let Some(entry) = &cli.entry {
        config.harness.entry.clone_from(entry);
    }
    if let Some(color) = cli.color {
        config.report.color = color;
    }
    debug!(?config, "resolved configuration");
    Ok(config)
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;

    let interrupt = Interrupt::new();
    let handler = interrupt.clone();
    if let Err(e) = ctrlc::set_handler(move || handler.trigger()) {
        warn!(error = %e, "cannot install Ctrl-C handler");
    }

    let request = BenchRequest {
        candidates: cli.candidates,
        function: cli.function,
        label: cli.label,
        arguments: cli.args,
        entry: config.harness.entry.clone(),
        imports: cli.imports,
    };
    let toolchain = ElmToolchain::new(&config.toolchain);
    let report = pipeline::run(&request, &toolchain, &interrupt)?;

    let color = config.report.color.enabled(std::io::stdout().is_terminal());
    print!("{}", report::render(&report, cli.format, color)?);
    Ok(())
}

fn exit_code(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<BenchError>()
        .map_or(ErrorCategory::Input, BenchError::category)
        .exit_code()
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    telemetry::init(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<BenchError>() {
                Some(bench) => eprintln!("error: {bench}"),
                None => eprintln!("error: {err:#}"),
            }
            ExitCode::from(exit_code(&err))
        }
    }
}
