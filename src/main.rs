mod db;
mod models;
mod session;
mod srs;
mod text;
mod tui;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use db::Database;
use models::{Direction, JsonOutput, SelectionPolicy};
use session::SessionConfig;

const DEFAULT_DB_NAME: &str = "revoir.db";
const DEFAULT_SESSION_LIMIT: usize = 20;

#[derive(Parser)]
#[command(name = "revoir")]
#[command(about = "French-Korean flashcard trainer with spaced repetition and timed practice runs")]
#[command(version)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Manage notes (Korean/French prompt pairs)
    #[command(subcommand)]
    Note(NoteCommands),

    /// Show card statistics and best scores
    Stats,

    /// Run an interactive practice session
    Practice {
        /// Review direction: fr-ko (type Korean) or ko-fr (recall French)
        #[arg(long, short, default_value = "fr-ko")]
        dir: String,

        /// Selection policy: due (due-first) or streak (lowest mastery first)
        #[arg(long, short, default_value = "due")]
        policy: String,

        /// Maximum number of cards in the session
        #[arg(long, short = 'n', default_value_t = DEFAULT_SESSION_LIMIT)]
        limit: usize,

        /// Countdown in seconds; omit for an untimed session
        #[arg(long, short)]
        timed: Option<i64>,
    },
}

#[derive(Subcommand)]
enum NoteCommands {
    /// Add a note; cards for both directions are created with it
    Add {
        /// Korean text
        korean: String,

        /// French text
        french: String,
    },

    /// List all notes
    List,

    /// Delete a note and its cards
    Delete {
        /// Note ID
        id: i64,
    },
}

fn get_db_path() -> PathBuf {
    if let Ok(path) = std::env::var("REVOIR_DB") {
        return PathBuf::from(path);
    }

    let config_dir = dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("revoir");

    std::fs::create_dir_all(&config_dir).ok();
    config_dir.join(DEFAULT_DB_NAME)
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let db_path = get_db_path();
    let db = Database::open(&db_path)?;

    match cli.command {
        Commands::Init => {
            db.init()?;
            if cli.json {
                println!("{}", serde_json::to_string(&JsonOutput::<()>::ok(()))?);
            } else {
                println!("Database initialized at: {}", db_path.display());
            }
        }

        Commands::Note(note_cmd) => match note_cmd {
            NoteCommands::Add { korean, french } => {
                let id = db.add_note(&korean, &french)?;
                if cli.json {
                    println!(
                        "{}",
                        serde_json::to_string(&JsonOutput::ok(serde_json::json!({
                            "id": id,
                            "korean": korean,
                            "french": french
                        })))?
                    );
                } else {
                    println!("Added note '{} / {}' with ID: {}", korean, french, id);
                }
            }

            NoteCommands::List => {
                let notes = db.list_notes()?;
                if cli.json {
                    println!("{}", serde_json::to_string(&JsonOutput::ok(&notes))?);
                } else if notes.is_empty() {
                    println!("No notes found.");
                } else {
                    println!("{:<5} {:<30} FRENCH", "ID", "KOREAN");
                    println!("{}", "-".repeat(70));
                    for note in notes {
                        println!(
                            "{:<5} {:<30} {}",
                            note.id,
                            truncate(&note.korean, 28),
                            truncate(&note.french, 34)
                        );
                    }
                }
            }

            NoteCommands::Delete { id } => {
                if db.delete_note(id)? {
                    if cli.json {
                        println!("{}", serde_json::to_string(&JsonOutput::<()>::ok(()))?);
                    } else {
                        println!("Note {} deleted.", id);
                    }
                } else if cli.json {
                    println!(
                        "{}",
                        serde_json::to_string(&JsonOutput::<()>::err("Note not found"))?
                    );
                } else {
                    println!("Note not found.");
                }
            }
        },

        Commands::Stats => {
            let stats = db.get_stats()?;
            if cli.json {
                println!("{}", serde_json::to_string(&JsonOutput::ok(&stats))?);
            } else {
                println!("=== Card Statistics ===");
                println!("Total notes: {}", stats.total_notes);
                for dir_stats in [&stats.fr_ko, &stats.ko_fr] {
                    println!();
                    println!("--- {} ---", dir_stats.direction.label());
                    println!("Cards: {}", dir_stats.total);
                    println!(
                        "New: {}  Learning: {}  Review: {}  Relearning: {}",
                        dir_stats.new,
                        dir_stats.learning,
                        dir_stats.review,
                        dir_stats.relearning
                    );
                    println!("Due now: {}", dir_stats.due_now);
                }
                if !stats.best.is_empty() {
                    println!();
                    println!("--- Best Scores ---");
                    for best in &stats.best {
                        println!(
                            "{} / {}: {} ({})",
                            best.policy.as_str(),
                            best.direction.as_str(),
                            best.score,
                            best.achieved_at
                        );
                    }
                }
            }
        }

        Commands::Practice {
            dir,
            policy,
            limit,
            timed,
        } => {
            let direction = Direction::from_str(&dir)
                .ok_or_else(|| format!("Invalid direction '{}'. Use: fr-ko or ko-fr", dir))?;
            let policy = SelectionPolicy::from_str(&policy)
                .ok_or_else(|| format!("Invalid policy '{}'. Use: due or streak", policy))?;

            if let Some(secs) = timed {
                if secs <= 0 {
                    return Err("Timed sessions need a positive number of seconds".into());
                }
            }

            let config = SessionConfig {
                direction,
                policy,
                limit,
                timer: timed,
            };
            tui::run(db, config)?;
        }
    }

    Ok(())
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    mod truncate_tests {
        use super::*;

        #[test]
        fn truncate_short_string() {
            assert_eq!(truncate("hello", 10), "hello");
        }

        #[test]
        fn truncate_exact_length() {
            assert_eq!(truncate("hello", 5), "hello");
        }

        #[test]
        fn truncate_long_string() {
            assert_eq!(truncate("hello world", 8), "hello...");
        }

        #[test]
        fn truncate_counts_chars_not_bytes() {
            // Hangul syllables are multi-byte; truncation must not split them.
            assert_eq!(truncate("안녕하세요", 10), "안녕하세요");
            assert_eq!(truncate("안녕하세요 여러분", 8), "안녕하세요...");
        }

        #[test]
        fn truncate_empty_string() {
            assert_eq!(truncate("", 10), "");
        }
    }

    mod cli_parsing_tests {
        use super::*;

        #[test]
        fn parse_init_command() {
            let cli = Cli::try_parse_from(["revoir", "init"]).unwrap();
            assert!(!cli.json);
            assert!(matches!(cli.command, Commands::Init));
        }

        #[test]
        fn parse_init_with_json() {
            let cli = Cli::try_parse_from(["revoir", "--json", "init"]).unwrap();
            assert!(cli.json);
            assert!(matches!(cli.command, Commands::Init));
        }

        #[test]
        fn parse_note_add() {
            let cli = Cli::try_parse_from(["revoir", "note", "add", "안녕", "bonjour"]).unwrap();
            match cli.command {
                Commands::Note(NoteCommands::Add { korean, french }) => {
                    assert_eq!(korean, "안녕");
                    assert_eq!(french, "bonjour");
                }
                _ => panic!("Expected Note Add command"),
            }
        }

        #[test]
        fn parse_note_list() {
            let cli = Cli::try_parse_from(["revoir", "note", "list"]).unwrap();
            assert!(matches!(cli.command, Commands::Note(NoteCommands::List)));
        }

        #[test]
        fn parse_note_delete() {
            let cli = Cli::try_parse_from(["revoir", "note", "delete", "5"]).unwrap();
            match cli.command {
                Commands::Note(NoteCommands::Delete { id }) => {
                    assert_eq!(id, 5);
                }
                _ => panic!("Expected Note Delete command"),
            }
        }

        #[test]
        fn parse_stats_command() {
            let cli = Cli::try_parse_from(["revoir", "stats"]).unwrap();
            assert!(matches!(cli.command, Commands::Stats));
        }

        #[test]
        fn parse_practice_defaults() {
            let cli = Cli::try_parse_from(["revoir", "practice"]).unwrap();
            match cli.command {
                Commands::Practice {
                    dir,
                    policy,
                    limit,
                    timed,
                } => {
                    assert_eq!(dir, "fr-ko");
                    assert_eq!(policy, "due");
                    assert_eq!(limit, DEFAULT_SESSION_LIMIT);
                    assert!(timed.is_none());
                }
                _ => panic!("Expected Practice command"),
            }
        }

        #[test]
        fn parse_practice_full() {
            let cli = Cli::try_parse_from([
                "revoir",
                "practice",
                "--dir",
                "ko-fr",
                "--policy",
                "streak",
                "-n",
                "10",
                "--timed",
                "90",
            ])
            .unwrap();
            match cli.command {
                Commands::Practice {
                    dir,
                    policy,
                    limit,
                    timed,
                } => {
                    assert_eq!(dir, "ko-fr");
                    assert_eq!(policy, "streak");
                    assert_eq!(limit, 10);
                    assert_eq!(timed, Some(90));
                }
                _ => panic!("Expected Practice command"),
            }
        }

        #[test]
        fn parse_practice_short_flags() {
            let cli =
                Cli::try_parse_from(["revoir", "practice", "-d", "ko-fr", "-p", "streak", "-t", "60"])
                    .unwrap();
            match cli.command {
                Commands::Practice {
                    dir, policy, timed, ..
                } => {
                    assert_eq!(dir, "ko-fr");
                    assert_eq!(policy, "streak");
                    assert_eq!(timed, Some(60));
                }
                _ => panic!("Expected Practice command"),
            }
        }

        #[test]
        fn parse_invalid_command_fails() {
            let result = Cli::try_parse_from(["revoir", "invalid"]);
            assert!(result.is_err());
        }

        #[test]
        fn parse_missing_required_arg_fails() {
            // note add requires both texts
            let result = Cli::try_parse_from(["revoir", "note", "add"]);
            assert!(result.is_err());

            let result = Cli::try_parse_from(["revoir", "note", "add", "안녕"]);
            assert!(result.is_err());

            // note delete requires an id
            let result = Cli::try_parse_from(["revoir", "note", "delete"]);
            assert!(result.is_err());
        }
    }

    mod db_path_tests {
        use super::*;
        use std::env;

        #[test]
        fn get_db_path_uses_env_var() {
            let test_path = "/tmp/test_revoir.db";
            env::set_var("REVOIR_DB", test_path);

            let path = get_db_path();
            assert_eq!(path.to_str().unwrap(), test_path);

            env::remove_var("REVOIR_DB");
        }

        #[test]
        fn get_db_path_default_includes_revoir_db() {
            env::remove_var("REVOIR_DB");

            let path = get_db_path();
            let path_str = path.to_str().unwrap();

            assert!(path_str.ends_with("revoir.db"));
            assert!(path_str.contains("revoir"));
        }
    }
}
