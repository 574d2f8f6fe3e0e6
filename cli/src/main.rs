use std::io::Write as _;
use std::path::{Component, Path, PathBuf};
use std::sync::Once;

static TRACE_INIT: Once = Once::new();
const DEFAULT_TRACE_FILTER: &str = "neonx::loader=debug,neonx::vm::exception=debug,neonx_core=info,neonx_cli=info";
const INSTRUCTION_TRACE_FILTER: &str = "neonx::vm::trace=debug,neonx::vm::call=debug,neonx::vm::exception=debug";

use anyhow::Context;
use clap::{Parser, Subcommand};
use neonx_core::vm::{
    DEFAULT_RECURSION_LIMIT, RunOutcome, Vm, VmContext, VmOptions, assemble, decode_module, disassemble, encode_module,
};
use tracing::info;


#[derive(Debug, Parser)]
#[command(
    name = "neonx",
    author,
    version,
    about = "Runs compiled Neon bytecode modules",
    long_about = None,
    args_conflicts_with_subcommands = true
)]
struct CliArgs {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log every executed instruction (target `neonx::vm::trace`)
    #[arg(short = 'D', long)]
    trace: bool,

    /// Print instruction and depth counters to stderr after the run
    #[arg(short = 'd', long)]
    stats: bool,

    /// Report assertions as disabled to the program
    #[arg(short = 'n', long = "no-assert")]
    no_assert: bool,

    /// Maximum call depth before StackOverflowException
    #[arg(long, value_name = "N", default_value_t = DEFAULT_RECURSION_LIMIT)]
    recursion_limit: usize,

    /// Compiled module to execute
    #[arg(value_name = "MODULE", value_parser = parse_sanitized_path)]
    module: Option<PathBuf>,

    /// Arguments visible to the program as `sys.args`
    #[arg(value_name = "ARGS", trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the module tables and an instruction listing.
    Disasm {
        #[arg(value_name = "MODULE", value_parser = parse_sanitized_path)]
        module: PathBuf,
    },
    /// Assemble a textual listing into a binary module.
    Asm {
        #[arg(value_name = "SOURCE", value_parser = parse_sanitized_path)]
        source: PathBuf,
        /// 输出路径（默认与源文件同名，扩展名 `.neonx`）
        #[arg(short, long, value_parser = parse_sanitized_path)]
        output: Option<PathBuf>,
    },
    /// List the builtin functions `CALLP` can reach.
    Builtins,
}

fn sanitize_path(raw: &str) -> anyhow::Result<PathBuf> {
    let p = Path::new(raw);

    for comp in p.components() {
        if matches!(comp, Component::ParentDir) {
            return Err(anyhow::anyhow!(
                "Parent directory components ('..') are not allowed in file paths."
            ));
        }
    }

    Ok(p.to_path_buf())
}

fn parse_sanitized_path(raw: &str) -> Result<PathBuf, String> {
    sanitize_path(raw).map_err(|e| e.to_string())
}

fn env_toggle_enabled(raw: &str) -> bool {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return false;
    }
    !(trimmed.eq_ignore_ascii_case("0") || trimmed.eq_ignore_ascii_case("false") || trimmed.eq_ignore_ascii_case("off"))
}

fn filter_expr_from(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty()
        || trimmed.eq_ignore_ascii_case("1")
        || trimmed.eq_ignore_ascii_case("true")
        || trimmed.eq_ignore_ascii_case("on")
    {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Installs a stderr subscriber when `NEONX_TRACE` is set or `--trace` asks
/// for the instruction log.
fn maybe_init_tracing(force_instruction_trace: bool) {
    let raw = std::env::var("NEONX_TRACE").ok();
    let enabled = raw.as_deref().is_some_and(env_toggle_enabled);
    if !enabled && !force_instruction_trace {
        return;
    }

    TRACE_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        use tracing_subscriber::fmt;

        let filter_expr = raw
            .as_deref()
            .filter(|_| enabled)
            .and_then(filter_expr_from)
            .or_else(|| std::env::var("RUST_LOG").ok());

        let mut filter = match filter_expr.and_then(|expr| EnvFilter::try_new(expr).ok()) {
            Some(filter) => filter,
            None => EnvFilter::new(DEFAULT_TRACE_FILTER),
        };
        if force_instruction_trace {
            for directive in INSTRUCTION_TRACE_FILTER.split(',') {
                if let Ok(d) = directive.parse() {
                    filter = filter.add_directive(d);
                }
            }
        }

        let _ = fmt().with_writer(std::io::stderr).with_env_filter(filter).try_init();
    });
}

fn read_module(path: &Path) -> anyhow::Result<neonx_core::vm::Module> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read module '{}'", path.display()))?;
    decode_module(&bytes).with_context(|| format!("Failed to load module '{}'", path.display()))
}

/// Runs `path` and maps the outcome to a process exit code.
fn run_module(path: &Path, args: Vec<String>, options: VmOptions) -> anyhow::Result<i32> {
    let module = read_module(path)?;
    let registry = neonx_stdlib::default_registry()?;
    let stats_enabled = options.stats;
    let context = VmContext::new().with_args(args).with_options(options);
    let mut vm = Vm::new(module, registry, context);

    let outcome = vm.run();
    vm.stdout().flush().context("Failed to flush stdout")?;
    let outcome = outcome?;

    if stats_enabled {
        let stats = vm.stats();
        eprintln!("instructions executed: {}", stats.instructions);
        eprintln!("max operand stack depth: {}", stats.max_stack_depth);
        eprintln!("max call depth: {}", stats.max_call_depth);
    }

    Ok(exit_code(&outcome))
}

fn exit_code(outcome: &RunOutcome) -> i32 {
    match outcome {
        RunOutcome::Completed => 0,
        RunOutcome::Exit(code) => *code,
        RunOutcome::Unhandled(e) => {
            eprintln!("Unhandled exception {}", e);
            1
        }
    }
}

fn default_output_path(source: &Path) -> PathBuf {
    source.with_extension("neonx")
}

fn assemble_file(source: &Path, output: &Path) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(source)
        .with_context(|| format!("Failed to read listing '{}'", source.display()))?;
    let module = assemble(&text).with_context(|| format!("Failed to assemble '{}'", source.display()))?;
    let bytes = encode_module(&module);
    std::fs::write(output, &bytes).with_context(|| format!("Failed to write module '{}'", output.display()))?;
    info!(target: "neonx_cli", output = %output.display(), bytes = bytes.len(), "module written");
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = CliArgs::parse();
    maybe_init_tracing(cli.trace);

    match cli.command {
        Some(Commands::Disasm { module }) => {
            let module = read_module(&module)?;
            print!("{}", disassemble(&module));
            Ok(())
        }
        Some(Commands::Builtins) => {
            let registry = neonx_stdlib::default_registry()?;
            for name in registry.builtin_names() {
                println!("{}", name);
            }
            Ok(())
        }
        Some(Commands::Asm { source, output }) => {
            let output = output.unwrap_or_else(|| default_output_path(&source));
            assemble_file(&source, &output)
        }
        None => {
            let Some(module) = cli.module else {
                anyhow::bail!("no module given; run `neonx --help` for usage");
            };
            let options = VmOptions {
                recursion_limit: cli.recursion_limit,
                assertions_enabled: !cli.no_assert,
                trace: cli.trace,
                stats: cli.stats,
            };
            let code = run_module(&module, cli.args, options)?;
            std::process::exit(code);
        }
    }
}
