use clap::{ArgAction, Parser, Subcommand};
use std::path::Path;

use astro_parser::{CompileOptions, Compiler};

#[derive(Parser)]
#[command(name = "astro-compiler")]
#[command(about = "Inspect and check Astro component templates")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// JSON file with compile options ({ "injectDoctype": bool, "hmrScript": string })
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse an .astro file and print its AST as JSON
    Parse {
        /// Input .astro file
        path: String,

        /// Print compact JSON
        #[arg(long)]
        compact: bool,
    },

    /// Check an .astro file for errors and warnings
    Check {
        /// Input .astro file
        path: String,
    },

    /// Print the token stream of an .astro file
    Tokens {
        /// Input .astro file
        path: String,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    let options = match &cli.config {
        Some(path) => load_options(path),
        None => CompileOptions::default(),
    };

    match cli.command {
        Command::Parse { path, compact } => cmd_parse(&path, options, compact),
        Command::Check { path } => cmd_check(&path, options),
        Command::Tokens { path } => cmd_tokens(&path),
    }
}

fn init_logger(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .init();
}

fn read_source(path: &str) -> String {
    let p = Path::new(path);
    if !p.exists() {
        eprintln!("Error: file not found: {path}");
        std::process::exit(1);
    }
    match std::fs::read_to_string(p) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Error reading {path}: {e}");
            std::process::exit(1);
        }
    }
}

fn load_options(path: &str) -> CompileOptions {
    let text = read_source(path);
    match serde_json::from_str(&text) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("Invalid config {path}: {e}");
            std::process::exit(1);
        }
    }
}

fn compile(path: &str, options: CompileOptions) -> std::sync::Arc<astro_parser::Ast> {
    let source = read_source(path);
    match Compiler::new(options).compile(path, &source) {
        Ok(ast) => ast,
        Err(e) => {
            eprintln!("{path}: {e}\n{}", e.frame);
            std::process::exit(1);
        }
    }
}

fn cmd_parse(path: &str, options: CompileOptions, compact: bool) {
    let ast = compile(path, options);
    let json = if compact {
        serde_json::to_string(&*ast)
    } else {
        serde_json::to_string_pretty(&*ast)
    };
    match json {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("Error serializing AST: {e}");
            std::process::exit(1);
        }
    }
}

fn cmd_check(path: &str, options: CompileOptions) {
    let ast = compile(path, options);
    for diagnostic in &ast.diagnostics {
        eprintln!(
            "{path}:{}: {} [{}]",
            diagnostic.start, diagnostic.message, diagnostic.code
        );
    }
    eprintln!("OK: {path} ({} warnings)", ast.diagnostics.len());
}

fn cmd_tokens(path: &str) {
    let source = read_source(path);
    let tokens = match astro_lexer::Scanner::tokenize(&source) {
        Ok(tokens) => tokens,
        Err(e) => {
            eprintln!("{path}: {e}\n{}", e.frame);
            std::process::exit(1);
        }
    };
    for token in tokens {
        println!(
            "{}:{}\t{:?}\t{:?}",
            token.span.line, token.span.column, token.kind, token.raw
        );
    }
}
