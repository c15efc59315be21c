//! CQL CLI - compile and run CQL queries
//!
//! Usage:
//!   cql parse <query>
//!   cql compile <query> [--schema <file.toml>] [--format sql|json|tree]
//!   cql meta [--schema <file.toml>]
//!   cql run <query> [--schema <file.toml>] [--data <file.json>]
//!
//! Examples:
//!   cql compile "MODEL: project SELECT: (name, owner.login)" --schema demos/github.toml
//!   cql run "MODEL: user SELECT: (login) WHERE: company == 'Acme'" \
//!       --schema demos/github.toml --data demos/github_data.json

use ariadne::{Color, Label, Report, ReportKind, Source};
use clap::{Parser, Subcommand, ValueEnum};
use cql::catalog::SchemaCatalog;
use cql::compile::{compile, query, CompileOptions};
use cql::config::Settings;
use cql::exec::MemoryStore;
use cql::lang::{self, SyntaxError};
use cql::CqlError;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

/// Exit code for malformed or unresolvable queries.
const EXIT_CLIENT_ERROR: u8 = 2;

#[derive(Parser)]
#[command(name = "cql")]
#[command(about = "CQL - query nested relational data without writing joins")]
#[command(version)]
struct Cli {
    /// Settings file (defaults to $CQL_CONFIG, ./cql.toml, then the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a query and print it back in canonical form
    Parse {
        /// The CQL query text
        query: String,
    },

    /// Compile a query against a schema
    Compile {
        /// The CQL query text
        query: String,

        /// Schema declaration (TOML)
        #[arg(short, long)]
        schema: Option<PathBuf>,

        /// Output format
        #[arg(short, long, default_value = "sql")]
        format: OutputFormat,
    },

    /// List the names of the queryable models
    Models {
        /// Schema declaration (TOML)
        #[arg(short, long)]
        schema: Option<PathBuf>,
    },

    /// Print the metadata of every queryable model
    Meta {
        /// Schema declaration (TOML)
        #[arg(short, long)]
        schema: Option<PathBuf>,
    },

    /// Run a query against a JSON dataset
    Run {
        /// The CQL query text
        query: String,

        /// Schema declaration (TOML)
        #[arg(short, long)]
        schema: Option<PathBuf>,

        /// Dataset (JSON object of entity → records)
        #[arg(short, long)]
        data: Option<PathBuf>,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Rendered SQL
    Sql,
    /// The compiled spec as JSON
    Json,
    /// The query tree
    Tree,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::from_file(path),
        None => Settings::load(),
    };
    let settings = match settings {
        Ok(s) => s,
        Err(e) => {
            init_logging("warn");
            eprintln!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    init_logging(&settings.log.filter);

    match cli.command {
        Commands::Parse { query } => cmd_parse(&query),
        Commands::Compile {
            query,
            schema,
            format,
        } => cmd_compile(&settings, &query, schema, format),
        Commands::Models { schema } => cmd_models(&settings, schema),
        Commands::Meta { schema } => cmd_meta(&settings, schema),
        Commands::Run {
            query,
            schema,
            data,
        } => cmd_run(&settings, &query, schema, data),
    }
}

fn init_logging(default_filter: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_parse(source: &str) -> ExitCode {
    match lang::parse(source) {
        Ok(query) => {
            println!("{}", query);
            ExitCode::SUCCESS
        }
        Err(e) => {
            report_syntax_error(source, &e);
            ExitCode::from(EXIT_CLIENT_ERROR)
        }
    }
}

fn cmd_compile(
    settings: &Settings,
    source: &str,
    schema: Option<PathBuf>,
    format: OutputFormat,
) -> ExitCode {
    let catalog = match load_catalog(settings, schema) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let options = CompileOptions {
        planner: settings.planner_options(),
    };

    match compile(source, &catalog, &options) {
        Ok(output) => {
            match format {
                OutputFormat::Sql => println!("{}", output.sql),
                OutputFormat::Json => match serde_json::to_string_pretty(&output.spec) {
                    Ok(json) => println!("{}", json),
                    Err(e) => {
                        eprintln!("Error serializing compiled query: {}", e);
                        return ExitCode::FAILURE;
                    }
                },
                OutputFormat::Tree => print!("{}", output.tree),
            }
            ExitCode::SUCCESS
        }
        Err(e) => report_error(source, &e),
    }
}

fn cmd_models(settings: &Settings, schema: Option<PathBuf>) -> ExitCode {
    let catalog = match load_catalog(settings, schema) {
        Ok(c) => c,
        Err(code) => return code,
    };

    for name in catalog.model_names() {
        println!("{}", name);
    }
    ExitCode::SUCCESS
}

fn cmd_meta(settings: &Settings, schema: Option<PathBuf>) -> ExitCode {
    let catalog = match load_catalog(settings, schema) {
        Ok(c) => c,
        Err(code) => return code,
    };

    match serde_json::to_string_pretty(&catalog.metadata()) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error serializing metadata: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn cmd_run(
    settings: &Settings,
    source: &str,
    schema: Option<PathBuf>,
    data: Option<PathBuf>,
) -> ExitCode {
    let catalog = match load_catalog(settings, schema) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let data = match data.map(Ok).or_else(|| settings.data_path().transpose()) {
        Some(Ok(path)) => path,
        Some(Err(e)) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
        None => {
            eprintln!("No dataset given: pass --data or set `data` in the settings file");
            return ExitCode::FAILURE;
        }
    };
    let json = match fs::read_to_string(&data) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error reading file '{}': {}", data.display(), e);
            return ExitCode::FAILURE;
        }
    };
    let store = match MemoryStore::from_json(catalog.clone(), &json) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error loading dataset '{}': {}", data.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let options = CompileOptions {
        planner: settings.planner_options(),
    };
    match query(source, &catalog, &&store, &options) {
        Ok(results) => match serde_json::to_string_pretty(&results) {
            Ok(json) => {
                println!("{}", json);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Error serializing results: {}", e);
                ExitCode::FAILURE
            }
        },
        Err(e) => report_error(source, &e),
    }
}

fn load_catalog(settings: &Settings, schema: Option<PathBuf>) -> Result<SchemaCatalog, ExitCode> {
    let path = match schema.map(Ok).or_else(|| settings.schema_path().transpose()) {
        Some(Ok(path)) => path,
        Some(Err(e)) => {
            eprintln!("Configuration error: {}", e);
            return Err(ExitCode::FAILURE);
        }
        None => {
            eprintln!("No schema given: pass --schema or set `schema` in the settings file");
            return Err(ExitCode::FAILURE);
        }
    };

    SchemaCatalog::from_path(&path).map_err(|e| {
        eprintln!("Error loading schema '{}': {}", path.display(), e);
        ExitCode::FAILURE
    })
}

fn report_error(source: &str, err: &CqlError) -> ExitCode {
    match err {
        CqlError::Syntax(e) => report_syntax_error(source, e),
        other => eprintln!("Error: {}", other),
    }
    if err.is_client_error() {
        ExitCode::from(EXIT_CLIENT_ERROR)
    } else {
        ExitCode::FAILURE
    }
}

fn report_syntax_error(source: &str, err: &SyntaxError) {
    let label = if err.expected.is_empty() {
        err.message.clone()
    } else {
        format!("expected one of: {}", err.expected.join(", "))
    };

    let printed = Report::build(ReportKind::Error, ("query", err.span.clone()))
        .with_message("Syntax error")
        .with_label(
            Label::new(("query", err.span.clone()))
                .with_message(label)
                .with_color(Color::Red),
        )
        .finish()
        .eprint(("query", Source::from(source)));

    if printed.is_err() {
        eprintln!("{}", err);
    }
}
