use std::path::PathBuf;

use clap::{ArgGroup, Parser};

#[derive(Parser, Debug, Clone)]
#[command(name = "wren-live", about = "Live preview runner for Wren scripts", version)]
#[command(group(ArgGroup::new("mode").args(["run", "watch", "show_config"]).multiple(false)))]
pub struct Cli {
    /// Script to edit, run, or watch.
    #[arg(value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Run FILE once and print the result instead of opening the editor.
    #[arg(short = 'r', long)]
    pub run: bool,

    /// Re-run FILE whenever it changes on disk.
    #[arg(short = 'w', long)]
    pub watch: bool,

    /// Print preview updates as JSON lines (with --run or --watch).
    #[arg(long)]
    pub json: bool,

    /// Interpreter binary to use instead of the discovered one.
    #[arg(long, value_name = "PATH")]
    pub wren: Option<PathBuf>,

    /// Maximum run time in milliseconds.
    #[arg(long = "max-time", value_name = "MS")]
    pub max_time: Option<u64>,

    /// Print the resolved interpreter and directories, then exit.
    #[arg(long = "show-config")]
    pub show_config: bool,
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }
}
