use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(about = "A LOLCODE interpreter", version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a LOLCODE source file
    Run {
        /// Path to the source file
        file: PathBuf,

        /// Directory to write tokens.jsonl, symbol_table.txt and transcript.txt into
        #[arg(long, value_name = "DIR")]
        emit: Option<PathBuf>,

        /// Abort any loop that runs more than N iterations
        #[arg(long, value_name = "N")]
        max_iterations: Option<usize>,

        /// Maximum nesting of function calls
        #[arg(long, value_name = "N", default_value_t = 512)]
        max_depth: usize,
    },

    /// Check a source file for syntax errors
    Check {
        /// Path to the source file to check
        file: PathBuf,
    },

    /// Print the token stream of a source file as JSON lines
    Tokens {
        /// Path to the source file
        file: PathBuf,
    },

    /// Start an interactive REPL session
    Repl,
}
