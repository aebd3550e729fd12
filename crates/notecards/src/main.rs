//! `notecards` - CLI for writing, dictating and finding notes.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::io::{self, BufRead, IsTerminal, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;
use tracing::{debug, info};

use notecards::cli::{Cli, Command, ConfigCommand, NewCommand, OutputFormat};
use notecards::render::{local_date, render_card, render_notes};
use notecards::{
    init_logging, Config, ConsoleNotifier, DictationController, LocalNoteStore, NoteDialog,
    Notebook, Notifier,
};

/// How often dictation updates are drained.
const DICTATION_TICK: Duration = Duration::from_millis(100);

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Load configuration
    let config = Config::load_from(cli.config.clone())?;

    // Execute the command
    match cli.command {
        Command::List(cmd) => handle_list(&config, cmd.query.as_deref(), cmd.format),
        Command::Search(cmd) => handle_list(&config, Some(&cmd.query), cmd.format),
        Command::New(cmd) => handle_new(&config, cmd),
        Command::Delete(cmd) => handle_delete(&config, &cmd.id),
        Command::Status(cmd) => handle_status(&config, cmd.json),
        Command::Config(cmd) => handle_config(&config, cmd),
    }
}

fn open_notebook(config: &Config) -> Result<Notebook<LocalNoteStore>, Box<dyn std::error::Error>> {
    let store = LocalNoteStore::from_config(config)?;
    Ok(Notebook::open(store)?)
}

fn handle_list(
    config: &Config,
    query: Option<&str>,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let notebook = open_notebook(config)?;
    let notes = notebook.search(query.unwrap_or_default());
    debug!(total = notebook.len(), shown = notes.len(), "Listing notes");
    println!("{}", render_notes(&notes, format)?);
    Ok(())
}

fn handle_new(config: &Config, cmd: NewCommand) -> Result<(), Box<dyn std::error::Error>> {
    let mut notebook = open_notebook(config)?;
    let mut dialog = NoteDialog::new(
        DictationController::from_config(&config.dictation),
        ConsoleNotifier::new(),
    );

    dialog.open();
    let mut dictated = false;
    if cmd.dictate {
        dialog.start_dictation();
        if dialog.is_dictating() {
            run_dictation(&mut dialog)?;
            dictated = true;
        }
    } else {
        dialog.use_text_only();
    }

    if !dictated {
        let text = match cmd.text {
            Some(text) => text,
            None => read_note_text()?,
        };
        dialog.set_content(text);
    }

    if let Some(note) = dialog.submit(&mut notebook)? {
        println!("{}", render_card(&note));
    } else {
        dialog.close();
        println!("Nothing to save.");
    }
    Ok(())
}

/// Pump dictation into the dialog until Enter is pressed or the recognizer
/// finishes, then keep the transcript.
fn run_dictation<N: Notifier>(dialog: &mut NoteDialog<N>) -> io::Result<()> {
    let stop = Arc::new(AtomicBool::new(false));
    let signal = Arc::clone(&stop);
    thread::Builder::new()
        .name("notecards-stop".to_string())
        .spawn(move || {
            let mut line = String::new();
            let _ = io::stdin().lock().read_line(&mut line);
            signal.store(true, Ordering::SeqCst);
        })?;

    eprintln!("Listening... press Enter to stop.");
    let mut stderr = io::stderr();
    while !stop.load(Ordering::SeqCst) {
        if dialog.pump() {
            write!(stderr, "\r\x1b[2K{}", dialog.content())?;
            stderr.flush()?;
        }
        if dialog.dictation_ended() {
            info!("Recognizer finished");
            break;
        }
        thread::sleep(DICTATION_TICK);
    }
    writeln!(stderr)?;

    dialog.stop_dictation();
    Ok(())
}

fn read_note_text() -> io::Result<String> {
    let mut stdin = io::stdin();
    if stdin.is_terminal() {
        eprintln!("Type the note, then press Ctrl-D:");
    }
    let mut text = String::new();
    stdin.read_to_string(&mut text)?;
    Ok(text.trim_end_matches(['\n', '\r']).to_string())
}

fn handle_delete(config: &Config, id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut notebook = open_notebook(config)?;
    if notebook.delete(id)? {
        println!("Deleted note {id}");
    } else {
        println!("Note {id} not found");
    }
    Ok(())
}

fn handle_status(config: &Config, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let notebook = open_notebook(config)?;
    let backend = notebook.store().backend();
    let dictation = DictationController::from_config(&config.dictation);

    let newest = notebook.notes().first();
    let oldest = notebook.notes().last();

    if json {
        let status = serde_json::json!({
            "backend": backend.name(),
            "location": backend.location(),
            "key": notebook.store().key(),
            "notes": notebook.len(),
            "newest": newest.map(|note| note.date),
            "oldest": oldest.map(|note| note.date),
            "dictation": {
                "supported": dictation.is_supported(),
                "recognizer": dictation.recognizer_name(),
                "language": &dictation.options().language,
            },
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        let none = || "-".to_string();
        println!("notecards status");
        println!("----------------");
        println!("Backend:       {}", backend.name());
        println!("Location:      {}", backend.location());
        println!("Key:           {}", notebook.store().key());
        println!("Notes:         {}", notebook.len());
        println!("Newest:        {}", newest.map_or_else(none, local_date));
        println!("Oldest:        {}", oldest.map_or_else(none, local_date));
        println!(
            "Dictation:     {} ({})",
            if dictation.is_supported() {
                "available"
            } else {
                "unavailable"
            },
            dictation.recognizer_name()
        );
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> Result<(), Box<dyn std::error::Error>> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Backend:            {}", config.storage.backend);
                println!("  Data directory:     {}", config.data_dir().display());
                println!("  Key:                {}", config.storage.key);
                println!();
                println!("[Dictation]");
                println!("  Language:           {}", config.dictation.language);
                println!("  Continuous:         {}", config.dictation.continuous);
                println!("  Interim results:    {}", config.dictation.interim_results);
                println!("  Max alternatives:   {}", config.dictation.max_alternatives);
                println!(
                    "  Command:            {}",
                    config.dictation.command.as_deref().unwrap_or("(none)")
                );
                if !config.dictation.args.is_empty() {
                    println!("  Arguments:          {}", config.dictation.args.join(" "));
                }
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
