use std::fs::File;
use std::io::{self, BufReader, IsTerminal};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;
use simplelog::{Config as LogConfig, LevelFilter, SimpleLogger};

mod lang;
mod input;

use input::ConsoleSource;
use lang::runtime::Runtime;
use lang::source::{ScriptSource, Source};

const HISTORY_FILE: &str = ".toast_history";

#[derive(Parser)]
#[command(version, about)]
struct Opt {
    /// Script to run instead of the interactive prompt
    script: Option<PathBuf>,
    /// Show debug output
    #[arg(short, long)]
    debug: bool,
    /// Halt on the first exception, as if the program started with `#STRICT yes`
    #[arg(short, long)]
    strict: bool,
    /// Neither load nor save the prompt history
    #[arg(long)]
    no_history: bool,
}

fn init_logging(debug: bool) -> Result<()> {
    let filter = if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Error
    };

    match SimpleLogger::init(filter, LogConfig::default()) {
        Ok(_) => Ok(()),
        Err(e) => bail!("Failed to init logger: {}", e),
    }
}

fn welcome() {
    println!(r#"toast (the Toast interpreter) v{}"#, env!("CARGO_PKG_VERSION"));
    println!("Type 'quit' or press Ctrl-D to quit");
    println!();
}

/// Picks the input: a script file, piped stdin, or the interactive prompt
fn init_source(opts: &Opt) -> Result<(Box<dyn Source>, bool)> {
    if let Some(path) = &opts.script {
        let file =
            File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        info!("running {}", path.display());

        return Ok((Box::new(ScriptSource::new(BufReader::new(file))), false));
    }

    let stdin = io::stdin();
    if !stdin.is_terminal() {
        info!("reading program from stdin");
        return Ok((Box::new(ScriptSource::new(stdin.lock())), false));
    }

    let history = if opts.no_history {
        None
    } else {
        Some(PathBuf::from(HISTORY_FILE))
    };
    let console = ConsoleSource::new(history)?;
    welcome();

    Ok((Box::new(console), true))
}

fn main() -> Result<()> {
    let opts = Opt::parse();
    init_logging(opts.debug)?;

    let (source, interactive) = init_source(&opts)?;
    let mut stdout = io::stdout();
    let mut runtime = Runtime::new(&mut stdout, source, interactive);
    runtime.set_strict(opts.strict);
    runtime.run()?;

    Ok(())
}
