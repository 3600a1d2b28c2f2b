//! Command-line driver for a SQLite-backed notes store.
//!
//! # Responsibility
//! - Open one execution context on a store file and run one command.
//! - Keep output line-oriented so it can be scripted.
//!
//! Usage: `localnotes_cli <store.db> <command> [args...]`

use localnotes_core::{
    init_logging_from_config, CoreConfig, KeyValueStore, NoteId, NotePatch, NoteService, NotesView,
    StorageConfig, Theme,
};
use std::path::PathBuf;
use std::process::ExitCode;

const LOG_DIR_ENV: &str = "LOCALNOTES_LOG_DIR";
const EXCERPT_CHARS: usize = 48;

const USAGE: &str = "usage: localnotes_cli <store.db> <command> [args...]

commands:
  list [query]                 list notes, newest first
  new <title> <content>        create a note and print its id
  edit <id> <title> <content>  replace title and content of a note
  delete <id>                  delete a note (no confirmation)
  theme [light|dark]           print or set the theme";

fn main() -> ExitCode {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let Some((store_path, command_args)) = args.split_first() else {
        eprintln!("{USAGE}");
        return ExitCode::from(2);
    };

    let config = CoreConfig {
        storage: StorageConfig::Sqlite {
            path: PathBuf::from(store_path),
        },
        ..CoreConfig::default()
    };
    if let Ok(log_dir) = std::env::var(LOG_DIR_ENV) {
        if let Err(err) = init_logging_from_config(&config, &log_dir) {
            eprintln!("logging disabled: {err}");
        }
    }

    let mut service = NoteService::from_config(&config);
    match run(&mut service, command_args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{message}");
            ExitCode::from(2)
        }
    }
}

fn run<S: KeyValueStore>(service: &mut NoteService<S>, args: &[String]) -> Result<(), String> {
    let Some((command, rest)) = args.split_first() else {
        return Err(USAGE.to_string());
    };

    match (command.as_str(), rest) {
        ("list", []) => print_lines(&listing_lines(service.view())),
        ("list", [query]) => {
            // Computed locally so a scripted search never touches the stored query.
            let repo = service.repository();
            let view = NotesView::compute(
                repo.notes(),
                repo.selected_note_id(),
                query,
                repo.theme(),
            );
            print_lines(&listing_lines(&view));
        }
        ("new", [title, content]) => {
            let note = service.create_note();
            service.update_note(&note.id, NotePatch::title_and_content(title, content));
            println!("{}", note.id);
        }
        ("edit", [id, title, content]) => {
            let id = NoteId::new(id.as_str());
            if !service.update_note(&id, NotePatch::title_and_content(title, content)) {
                return Err(format!("note not found: {id}"));
            }
        }
        ("delete", [id]) => {
            let id = NoteId::new(id.as_str());
            if !service.delete_note(&id) {
                return Err(format!("note not found: {id}"));
            }
        }
        ("theme", []) => println!("{}", service.theme()),
        ("theme", [value]) => {
            let theme = value.parse::<Theme>()?;
            service.set_theme(theme);
        }
        _ => return Err(USAGE.to_string()),
    }
    Ok(())
}

fn listing_lines(view: &NotesView) -> Vec<String> {
    if view.has_no_notes() {
        return vec!["No notes yet.".to_string()];
    }
    if view.visible.is_empty() {
        return vec![format!("No notes match \"{}\".", view.query)];
    }
    view.visible
        .iter()
        .map(|note| {
            format!(
                "{}\t{}\t{}\t{}",
                note.id,
                note.updated_at.to_rfc3339(),
                note.display_title(),
                note.display_excerpt(EXCERPT_CHARS)
            )
        })
        .collect()
}

fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{line}");
    }
}
