use clap::Parser;
use dirs::home_dir;
use kthxbye::{
    artifacts::{emit_outcome, emit_tokens, write_tokens},
    cli::{Args, Commands},
    error::Result,
    parser::parse,
    repl::{REPLPrompt, REPLValidator, SyntaxHighlighter},
    runtime::{run, Options},
    tokenizer::tokenize,
};
use log::{debug, info};
use nu_ansi_term::{Color, Style};
use reedline::{DefaultHinter, FileBackedHistory, Reedline, Signal};
use std::{
    fs,
    io,
    path::{Path, PathBuf},
    process::ExitCode,
};

fn run_file(file: PathBuf, emit: Option<PathBuf>, options: Options) -> Result<()> {
    let source = fs::read_to_string(file)?;

    let tokens = tokenize(&source);
    if let Some(dir) = emit.as_deref() {
        emit_tokens(dir, &tokens)?;
    }

    let program = parse(&tokens)?;
    let outcome = run(&program, options)?;

    if let Some(dir) = emit.as_deref() {
        emit_outcome(dir, &outcome)?;
    }

    Ok(())
}

fn check_file(file: PathBuf) -> Result<()> {
    let source = fs::read_to_string(file)?;

    let program = parse(&tokenize(&source))?;
    println!("Syntax is valid!");
    println!(
        "{} functions, {} declarations, {} statements",
        program.functions.len(),
        program.declarations.len(),
        program.body.len()
    );

    Ok(())
}

fn print_tokens(file: &Path) -> Result<()> {
    let source = fs::read_to_string(file)?;
    write_tokens(io::stdout().lock(), &tokenize(&source))
}

fn run_repl() -> Result<()> {
    let mut line_editor = Reedline::create()
        .with_hinter(Box::new(
            DefaultHinter::default().with_style(Style::new().italic().fg(Color::LightGray)),
        ))
        .with_highlighter(Box::new(SyntaxHighlighter))
        .with_validator(Box::new(REPLValidator));

    // Add file-backed history if possible
    if let Some(history) = home_dir()
        .map(|home| home.join(".kthxbye_history"))
        .and_then(|path| FileBackedHistory::with_file(20, path).ok())
        .map(Box::new)
    {
        line_editor = line_editor.with_history(history);
    } else {
        eprintln!("NOTE: Failed to load history. Persistence is now disabled.")
    }

    let prompt = REPLPrompt;

    loop {
        match line_editor.read_line(&prompt)? {
            Signal::Success(buffer) => {
                if buffer.trim().is_empty() {
                    continue;
                }
                // Each submitted program gets a fresh interpreter
                parse(&tokenize(&buffer))
                    .and_then(|program| run(&program, Options::default()))
                    .inspect(|outcome| {
                        debug!("{} variables after run", outcome.variables.len());
                    })
                    .inspect_err(|err| {
                        eprintln!("{}", err);
                    })
                    .ok();
            }
            Signal::CtrlD | Signal::CtrlC => {
                break Ok(());
            }
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let result = match args.command {
        Commands::Run {
            file,
            emit,
            max_iterations,
            max_depth,
        } => {
            info!("FILE MODE");
            debug!("file: {:?}", file);
            debug!("emit: {:?}", emit);

            let options = Options {
                max_iterations,
                max_call_depth: max_depth,
            };
            run_file(file, emit, options)
        }
        Commands::Check { file } => {
            info!("CHECK MODE");
            debug!("file: {:?}", file);

            check_file(file)
        }
        Commands::Tokens { file } => {
            info!("TOKENS MODE");
            debug!("file: {:?}", file);

            print_tokens(&file)
        }
        Commands::Repl => {
            info!("REPL MODE");

            run_repl()
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}", err);
            ExitCode::FAILURE
        }
    }
}
