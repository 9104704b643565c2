mod cli;
mod handlers;
mod printer;
mod tui;

use std::time::Duration;

use anyhow::{bail, Result};
use is_terminal::IsTerminal;
use wren_live::{config::Config, logging, store::SourceStore, SupervisorSettings};

use handlers::{RunHandler, WatchHandler};
use printer::PreviewPrinter;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    // Load config
    let cfg = Config::load();

    let program = cfg.interpreter_path(args.wren.as_deref());
    let mut settings = SupervisorSettings::from_config(&cfg, program);
    // CLI overrides config
    if let Some(ms) = args.max_time {
        settings = settings.max_duration(Duration::from_millis(ms));
    }

    if args.show_config {
        show_config(&cfg, &settings);
        return Ok(());
    }

    // Without a terminal there is nothing to draw the editor on
    let headless = args.run || args.watch || !std::io::stdout().is_terminal();
    if !headless {
        let log_path = cfg.user_data_path().join("wren-live.log");
        logging::init_file(&cfg.log_level(), &log_path)?;
        let store = SourceStore::from_config(&cfg);
        return tui::run_tui(settings, store, args.file).await;
    }

    logging::init_stderr(&cfg.log_level());
    let Some(file) = args.file.as_deref() else {
        bail!("a FILE is required with --run, --watch, or when output is not a terminal");
    };

    let color = std::io::stdout().is_terminal() && !args.json;
    let mut printer = PreviewPrinter::new(args.json, color);

    if args.watch {
        return WatchHandler::run(settings, file, &mut printer).await;
    }

    if !RunHandler::run(settings, file, &mut printer).await? {
        std::process::exit(1);
    }
    Ok(())
}

fn show_config(cfg: &Config, settings: &SupervisorSettings) {
    println!("config file:  {}", cfg.config_path.display());
    println!("interpreter:  {}", settings.program.display());
    println!("max time:     {} ms", settings.max_duration.as_millis());
    println!("user data:    {}", settings.roots.user_data.display());
    println!("library:      {}", settings.roots.library.display());
    println!("home:         {}", settings.roots.home.display());
    match &settings.scratch_dir {
        Some(dir) => println!("scratch:      {}", dir.display()),
        None => println!("scratch:      {}", std::env::temp_dir().display()),
    }
}
