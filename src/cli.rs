//! Command-line interface for the smelt compiler.

use clap::{Parser, Subcommand};
use smelt_base::Style;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "smelt")]
#[command(about = "Compiler for the SRC systems language", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compile each input file to C source written alongside it
    Forge {
        /// Input files
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

/// Entry point for the CLI. Returns the process exit code.
pub fn run_cli() -> i32 {
    let cli = Cli::parse();

    match cli.command {
        Commands::Forge { files } => {
            for file in files {
                eprintln!("{} {}", Style::cyan("forging"), file.display());
                match smelt_compile::compile_file(&file) {
                    Ok(target) => {
                        eprintln!("{} {}", Style::cyan("wrote"), target.display());
                    }
                    Err(error) => {
                        let rendered = match std::fs::read_to_string(&file) {
                            Ok(source) => error.display_with_source(&source),
                            Err(_) => format!("{}", error),
                        };
                        eprintln!("{}", rendered);
                        return 1;
                    }
                }
            }
            0
        }
    }
}
