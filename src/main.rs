//! gocalls CLI binary
//!
//! This is the main entry point for the gocalls command-line interface.
//! The CLI is a thin adapter over the library - no analysis happens here.

use gocalls::cli::{CliErrorPayload, Commands, OutputFormat};
use gocalls::config::{Config, ConfigOverrides};
use gocalls::GocallsError;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = gocalls::cli::parse_args();
    init_logging(cli.debug);

    let overrides = cli.command.config_overrides();
    let Commands::Refs {
        package,
        patterns,
        fmt,
        ..
    } = cli.command;

    match execute_refs(&overrides, &package, &patterns, fmt) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report_error(&e, fmt);
            ExitCode::from(1)
        }
    }
}

/// `RUST_LOG` wins; otherwise `--debug` selects debug output.
fn init_logging(debug: bool) {
    let default = if debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default)).init();
}

/// Execute the refs command.
///
/// This function is a thin adapter that:
/// 1. Discovers the workspace and tools
/// 2. Starts gopls
/// 3. Correlates definitions with references
/// 4. Shuts gopls down, whatever happened
/// 5. Renders the sorted entries to stdout
fn execute_refs(
    overrides: &ConfigOverrides,
    package: &str,
    patterns: &[String],
    fmt: OutputFormat,
) -> Result<(), GocallsError> {
    use gocalls::analyze::Analyzer;
    use gocalls::correlate::Matcher;
    use gocalls::lsp::GoplsClient;
    use gocalls::render;
    use gocalls::resolve::GoListResolver;

    let config = Config::discover(overrides)?;

    let resolver = GoListResolver::new(config.go.clone(), config.workspace_root.clone());
    let analyzer = Analyzer::new(Box::new(resolver));
    let client = GoplsClient::start(&config)?;
    let mut matcher = Matcher::new(analyzer, client, config.workspace_root.clone());

    let found = matcher.find_references(package, patterns);
    let closed = matcher.provider_mut().close();
    found?;
    if let Err(e) = closed {
        log::warn!("gopls did not shut down cleanly: {}", e);
    }

    matcher.sort();
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match fmt {
        OutputFormat::Json => render::json_lines(matcher.entries(), &mut out),
        OutputFormat::Print => render::pretty(matcher.entries(), &mut out),
    }
}

fn report_error(error: &GocallsError, fmt: OutputFormat) {
    if fmt == OutputFormat::Json {
        match serde_json::to_string(&CliErrorPayload::from_error(error)) {
            Ok(payload) => {
                eprintln!("{}", payload);
                return;
            }
            Err(e) => log::warn!("failed to encode error payload: {}", e),
        }
    }
    eprintln!("Error: {}", error);
}
