//! sigdb CLI

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::{Path, PathBuf};

use sigdb::Environment;
use sigdb::config::Config;
use sigdb::error::{Diagnostic, report_diagnostic};
use sigdb::logging::{LogFormat, LogLevel, LogSettings, init_logging};
use sigdb::query::QueryEngine;

#[derive(Parser)]
#[command(name = "sigdb", version, about = "Signature database and resolver")]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level: error, warn, info, debug, trace
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log output format
    #[arg(long, global = true, value_enum)]
    log_format: Option<FormatArg>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Load and validate declaration files
    Check {
        /// Declaration files
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Parse and dump AST (debug)
    Parse {
        /// Declaration file to parse
        file: PathBuf,
    },
    /// Tokenize and dump tokens (debug)
    Tokens {
        /// Declaration file to tokenize
        file: PathBuf,
    },
    /// Resolve a declaration name
    Resolve {
        #[arg(long = "type")]
        name: String,
        files: Vec<PathBuf>,
    },
    /// Print the ancestor chain of a declaration
    Ancestors {
        #[arg(long = "type")]
        name: String,
        /// Class-level chain instead of the instance chain
        #[arg(long)]
        singleton: bool,
        files: Vec<PathBuf>,
    },
    /// Look up a method along the ancestor chain
    Method {
        #[arg(long = "type")]
        type_name: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        singleton: bool,
        files: Vec<PathBuf>,
    },
    /// Check whether SUB is a subtype of SUPER
    Subtype {
        sub: String,
        sup: String,
        files: Vec<PathBuf>,
    },
    /// Select the overload of a method for argument types
    Call {
        #[arg(long)]
        receiver: String,
        #[arg(long)]
        name: String,
        /// Positional argument type, repeatable
        #[arg(long = "arg")]
        args: Vec<String>,
        files: Vec<PathBuf>,
    },
}

type CliResult = Result<bool, Box<dyn std::error::Error>>;

fn main() {
    let cli = Cli::parse();

    let config = match cli.config.as_deref().map(Config::load).transpose() {
        Ok(config) => config.unwrap_or_default(),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(2);
        }
    };
    if let Err(e) = setup_logging(&cli, &config) {
        eprintln!("Error: {e}");
        std::process::exit(2);
    }

    let result = match cli.command {
        Command::Check { files } => check_files(config, &files),
        Command::Parse { file } => parse_file(&file),
        Command::Tokens { file } => tokenize_file(&file),
        Command::Resolve { name, files } => {
            query(config, &files, |engine| print_json(&engine.query_decl(&name)))
        }
        Command::Ancestors {
            name,
            singleton,
            files,
        } => query(config, &files, |engine| {
            print_json(&engine.query_ancestors(&name, singleton))
        }),
        Command::Method {
            type_name,
            name,
            singleton,
            files,
        } => query(config, &files, |engine| {
            print_json(&engine.query_method(&type_name, &name, singleton))
        }),
        Command::Subtype { sub, sup, files } => {
            query(config, &files, |engine| print_json(&engine.query_subtype(&sub, &sup)))
        }
        Command::Call {
            receiver,
            name,
            args,
            files,
        } => query(config, &files, |engine| {
            print_json(&engine.query_call(&receiver, &name, &args))
        }),
    };

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(2);
        }
    }
}

/// Env, then the config file, then command-line flags
fn setup_logging(cli: &Cli, config: &Config) -> sigdb::Result<()> {
    let from_file = LogSettings::from_config(&config.log)?;
    let level = match cli.log_level.as_deref() {
        Some(spec) => Some(LogLevel::parse(spec).ok_or_else(|| {
            sigdb::SigError::config_error(format!("unknown log level `{spec}`"))
        })?),
        None => None,
    };
    let from_flags = LogSettings {
        format: cli.log_format.map(|format| match format {
            FormatArg::Text => LogFormat::Text,
            FormatArg::Json => LogFormat::Json,
        }),
        level,
    };
    init_logging(LogSettings::from_env().layer(from_file).layer(from_flags));
    Ok(())
}

/// Load `files`, rendering every diagnostic. Returns the environment and
/// whether loading was clean.
fn load(config: Config, files: &[PathBuf]) -> Result<(Environment, bool), Box<dyn std::error::Error>> {
    let mut env = Environment::new(config);
    let mut clean = true;
    for path in files {
        let diagnostics = env.load_file(path)?;
        clean &= diagnostics.is_empty();
        report_all(&env, &diagnostics)?;
    }
    Ok((env, clean))
}

fn report_all(env: &Environment, diagnostics: &[Diagnostic]) -> std::io::Result<()> {
    for diagnostic in diagnostics {
        let source = diagnostic
            .location
            .as_ref()
            .and_then(|l| env.source(&l.file))
            .unwrap_or("");
        report_diagnostic(source, diagnostic)?;
    }
    Ok(())
}

fn check_files(config: Config, files: &[PathBuf]) -> CliResult {
    let (env, loaded_clean) = load(config, files)?;
    let diagnostics = env.validate();
    report_all(&env, &diagnostics)?;

    let ok = loaded_clean && diagnostics.is_empty();
    tracing::info!(
        files = files.len(),
        declarations = env.graph().len(),
        diagnostics = diagnostics.len(),
        "check finished"
    );
    if ok {
        println!("✓ {} file(s), {} declaration(s) check successfully", files.len(), env.graph().len());
    }
    Ok(ok)
}

fn query(
    config: Config,
    files: &[PathBuf],
    run: impl FnOnce(&QueryEngine<'_>) -> CliResult,
) -> CliResult {
    let (env, clean) = load(config, files)?;
    let engine = QueryEngine::new(&env);
    let ok = run(&engine)?;
    Ok(clean && ok)
}

fn print_json<T: Serialize>(result: &sigdb::query::QueryResult<T>) -> CliResult {
    println!("{}", serde_json::to_string_pretty(result)?);
    Ok(result.is_ok())
}

fn parse_file(path: &Path) -> CliResult {
    let source = std::fs::read_to_string(path)?;
    let filename = path.display().to_string();

    let tokens = sigdb::lexer::tokenize(&source)?;
    let ast = sigdb::parser::parse(&filename, &source, tokens)?;

    println!("{}", serde_json::to_string_pretty(&ast)?);
    Ok(true)
}

fn tokenize_file(path: &Path) -> CliResult {
    let source = std::fs::read_to_string(path)?;

    let tokens = sigdb::lexer::tokenize(&source)?;
    for (tok, span) in &tokens {
        println!("{:?} @ {}..{}", tok, span.start, span.end);
    }

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_corpus(dir: &str, files: &[(&str, &str)]) -> Vec<PathBuf> {
        let root = std::env::temp_dir().join(format!("sigdb-{dir}-{}", std::process::id()));
        std::fs::create_dir_all(&root).unwrap();
        files
            .iter()
            .map(|(name, source)| {
                let path = root.join(name);
                std::fs::write(&path, source).unwrap();
                path
            })
            .collect()
    }

    #[test]
    fn test_query_succeeds_on_clean_corpus() {
        let files = write_corpus("clean", &[("good.sig", "class Foo end")]);
        let ok = query(Config::default(), &files, |engine| print_json(&engine.query_decl("Foo")));
        assert!(ok.unwrap());
    }

    #[test]
    fn test_query_fails_after_load_diagnostics() {
        let files = write_corpus(
            "broken",
            &[("good.sig", "class Foo end"), ("bad.sig", "class Bar < end")],
        );
        let ok = query(Config::default(), &files, |engine| print_json(&engine.query_decl("Foo")));
        assert!(!ok.unwrap());
    }

    #[test]
    fn test_query_fails_on_unknown_name() {
        let files = write_corpus("unknown", &[("good.sig", "class Foo end")]);
        let ok = query(Config::default(), &files, |engine| print_json(&engine.query_decl("Nope")));
        assert!(!ok.unwrap());
    }
}
