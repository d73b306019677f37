//! CLI application handler
//!
//! Translates parsed commands into note store and trash manager calls and
//! prints the results.
use std::{
    fs::read_to_string,
    io::{stdin, stdout, Write},
    path::PathBuf,
    sync::Arc,
};

use log::{info, warn};
use tokio::time::Duration;

use crate::{
    parse_retention_days, Clock, Commands, Config, FileDocument, Note, NoteColor, NoteDraft,
    NoteError, NoteKind, NoteStore, Persisting, PurgeScheduler, Result, RetentionPolicyStore,
    Session, SystemClock, Task, TrashEntry, TrashManager, TrashView,
};

/// CLI Application handler - processes CLI commands against the note store
pub struct App {
    /// The note store backend
    store: Arc<NoteStore>,

    /// Trash view and retention handling
    trash: Arc<TrashManager>,

    /// Optional periodic expiry check
    scheduler: PurgeScheduler,

    session: Session,

    /// Whether to display verbose output
    verbose: bool,
}

impl App {
    /// Opens the documents named by `config` and wires the components together
    pub async fn open(config: &Config, verbose: bool) -> Result<Self> {
        Self::open_with_clock(config, Arc::new(SystemClock), verbose).await
    }

    pub async fn open_with_clock(
        config: &Config,
        clock: Arc<dyn Clock>,
        verbose: bool,
    ) -> Result<Self> {
        info!("Opening note data in {}", config.data_dir.display());

        let notes_doc = Arc::new(FileDocument::new(config.notes_path()));
        let settings_doc = Arc::new(FileDocument::new(config.settings_path()));

        let store =
            Arc::new(NoteStore::open(notes_doc, Arc::clone(&clock), config.max_history).await?);
        let policy = Arc::new(RetentionPolicyStore::open(settings_doc).await?);
        let trash = Arc::new(TrashManager::new(
            Arc::clone(&store),
            policy,
            Arc::clone(&clock),
        ));

        let mut scheduler = PurgeScheduler::new(
            Arc::clone(&trash),
            Duration::from_secs(config.purge_interval_minutes * 60),
        );
        scheduler.start().await?;

        Ok(Self {
            store,
            trash,
            scheduler,
            session: Session::start(clock),
            verbose,
        })
    }

    /// Run the CLI application with the given command
    pub async fn run(&self, command: Commands) -> Result<()> {
        match command {
            Commands::Add {
                title,
                content,
                tasks,
                media,
                color,
            } => self.handle_add(title, content, tasks, media, color).await?,

            Commands::List {
                favorites,
                hidden,
                limit,
                json,
            } => self.handle_list(favorites, hidden, limit, json).await?,

            Commands::Show { id, json } => self.handle_show(&id, json).await?,

            Commands::Edit {
                id,
                title,
                content,
                color,
                file,
            } => self.handle_edit(&id, title, content, color, file).await?,

            Commands::Search { query, limit, json } => {
                let mut results = self.store.search_notes(&query).await;
                results.truncate(limit);
                if results.is_empty() && !json {
                    println!("No notes found matching query: \"{}\"", query);
                } else {
                    self.display_notes(&results, json)?;
                }
            }

            Commands::Favorite { id, off } => {
                let note = self.store.set_favorite(&id, !off).await?;
                let state = if note.is_favorite { "marked" } else { "unmarked" };
                println!("Note {} {} as favorite", note.id, state);
            }

            Commands::Hide { id, off } => {
                let note = self.store.set_hidden(&id, !off).await?;
                let state = if note.is_hidden { "hidden" } else { "visible" };
                println!("Note {} is now {}", note.id, state);
            }

            Commands::Task { id, index } => {
                let note = self.store.toggle_task(&id, index).await?;
                self.display_tasks(&note.tasks);
            }

            Commands::Delete { id } => {
                self.store.delete_note(&id).await?;
                println!(
                    "Note {} moved to trash. It will be kept for {} days.",
                    id,
                    self.trash.retention_days()
                );
            }

            Commands::Trash { json } => self.handle_trash(json).await?,

            Commands::Restore { id } => {
                if self.trash.restore(&id).await? {
                    println!("Note {} restored", id);
                } else {
                    println!("Note {} is not in the trash", id);
                }
            }

            Commands::Purge { id, force } => self.handle_purge(id, force).await?,

            Commands::EmptyTrash { force } => self.handle_empty_trash(force).await?,

            Commands::Retention { set } => match set {
                Some(value) => {
                    let days = self
                        .trash
                        .update_trash_retention_days_from_input(&value)
                        .await?;
                    if parse_retention_days(&value).is_err() {
                        println!("'{}' is not a valid number of days.", value);
                    }
                    println!("Trash retention set to {} days", days);
                }
                None => println!("Trash retention: {} days", self.trash.retention_days()),
            },

            Commands::History { id } => self.handle_history(&id).await?,

            Commands::Revert { id, index } => {
                let note = self.store.restore_version(&id, index).await?;
                println!("Note {} restored to version {}", note.id, index);
            }
        }

        Ok(())
    }

    /// Stops background work before the process exits
    pub async fn shutdown(&mut self) -> Result<()> {
        self.scheduler.stop().await?;
        info!(
            "Session ended after {} ms",
            self.session.elapsed().num_milliseconds()
        );
        Ok(())
    }

    async fn handle_add(
        &self,
        title: String,
        content: Option<String>,
        tasks: Option<String>,
        media: Option<String>,
        color: Option<String>,
    ) -> Result<()> {
        let mut draft = match (parse_tasks(tasks), media) {
            (Some(tasks), _) => NoteDraft {
                title,
                kind: NoteKind::Checklist,
                tasks,
                ..Default::default()
            },
            (None, Some(uri)) => NoteDraft::media(title, uri),
            (None, None) => NoteDraft::text(title, ""),
        };
        draft.content = content.unwrap_or_default();
        if let Some(color) = color {
            draft.color = color.parse::<NoteColor>()?;
        }

        let note = self.store.add_note(draft).await?;
        println!("Note created with ID: {}", note.id);
        Ok(())
    }

    async fn handle_list(
        &self,
        favorites: bool,
        hidden: bool,
        limit: usize,
        json: bool,
    ) -> Result<()> {
        let mut notes = match (favorites, hidden) {
            (_, true) => self.store.hidden_notes().await,
            (true, false) => self.store.favorite_notes().await,
            (false, false) => self.store.active_notes().await,
        };
        notes.truncate(limit);

        if notes.is_empty() && !json {
            println!("No notes found.");
            return Ok(());
        }
        self.display_notes(&notes, json)
    }

    async fn handle_show(&self, id: &str, json: bool) -> Result<()> {
        let note = self
            .store
            .get_note(id)
            .await
            .ok_or_else(|| NoteError::NoteNotFound { id: id.to_string() })?;

        if json {
            println!("{}", serde_json::to_string_pretty(&note)?);
            return Ok(());
        }

        self.display_note(&note, true);
        if note.is_trashed() {
            println!(
                "\n{}",
                console::style(format!(
                    "In trash, {} days left",
                    self.trash.days_left(&note)
                ))
                .red()
            );
        }
        Ok(())
    }

    async fn handle_edit(
        &self,
        id: &str,
        title: Option<String>,
        content: Option<String>,
        color: Option<String>,
        file: Option<PathBuf>,
    ) -> Result<()> {
        let mut note = self
            .store
            .get_note(id)
            .await
            .ok_or_else(|| NoteError::NoteNotFound { id: id.to_string() })?;

        if let Some(title) = title {
            note.title = title;
        }
        match (content, file) {
            (Some(content), _) => note.content = content,
            (None, Some(path)) => {
                if !path.exists() {
                    return Err(NoteError::ApplicationError {
                        message: format!("File not found: {}", path.display()),
                    });
                }
                note.content = read_to_string(&path)?;
                if self.verbose {
                    println!("Content updated from file: {}", path.display());
                }
            }
            (None, None) => {}
        }
        if let Some(color) = color {
            note.color = color.parse()?;
        }

        let note = self.store.update_note(note).await?;
        println!("Note {} updated successfully", note.id);
        Ok(())
    }

    async fn handle_trash(&self, json: bool) -> Result<()> {
        let view = TrashView::load(&self.trash).await?;

        if json {
            println!("{}", serde_json::to_string_pretty(view.entries())?);
            return Ok(());
        }
        if view.is_empty() {
            println!("Trash is empty.");
            return Ok(());
        }

        println!(
            "Notes in trash are removed after {} days.\n",
            self.trash.retention_days()
        );
        self.display_trash(view.entries());
        Ok(())
    }

    async fn handle_purge(&self, id: String, force: bool) -> Result<()> {
        let mut view = TrashView::load(&self.trash).await?;
        let Some(entry) = view.remove_local(&id) else {
            match self.store.get_note(&id).await {
                Some(_) => return Err(NoteError::NoteNotInTrash { id }),
                None => {
                    println!("Note {} is already gone", id);
                    return Ok(());
                }
            }
        };

        if !force && !confirm(&format!(
            "Permanently delete '{}' ({})? This action cannot be undone! [y/N]: ",
            entry.note.title, entry.note.id
        ))? {
            println!("Deletion cancelled.");
            return Ok(());
        }

        let trash = Arc::clone(&self.trash);
        let target = id.clone();
        let pending = Persisting::spawn("permanent delete", async move {
            trash.delete_permanently(&target).await
        });

        if let Err(e) = pending.confirmed().await {
            warn!("Permanent delete of {} failed: {}", id, e);
            view.refresh(&self.trash).await;
            return Err(e);
        }

        println!(
            "Note '{}' ({}) has been permanently deleted.",
            entry.note.title, entry.note.id
        );
        if self.verbose {
            println!("{} notes left in trash", view.entries().len());
        }
        Ok(())
    }

    async fn handle_empty_trash(&self, force: bool) -> Result<()> {
        let count = self.store.get_trash_notes().await.len();
        if count == 0 {
            println!("Trash is empty.");
            return Ok(());
        }

        if !force
            && !confirm(&format!(
                "Permanently delete {} notes in the trash? This action cannot be undone! [y/N]: ",
                count
            ))?
        {
            println!("Deletion cancelled.");
            return Ok(());
        }

        let removed = self.trash.empty_trash().await?;
        println!("Removed {} notes from the trash.", removed);
        Ok(())
    }

    async fn handle_history(&self, id: &str) -> Result<()> {
        let history = self.store.note_history(id).await?;
        if history.is_empty() {
            println!("Note {} has no earlier versions.", id);
            return Ok(());
        }

        for (index, revision) in history.iter().enumerate() {
            println!(
                "[{}] {} | {}",
                index,
                revision.saved_at.format("%Y-%m-%d %H:%M"),
                console::style(&revision.title).bold()
            );
            let preview = content_preview(&revision.content, 80);
            if !preview.is_empty() {
                println!("    {}", preview);
            }
        }
        Ok(())
    }

    fn display_notes(&self, notes: &[Note], json: bool) -> Result<()> {
        if json {
            println!("{}", serde_json::to_string_pretty(notes)?);
            return Ok(());
        }

        let width = separator_width();
        for (i, note) in notes.iter().enumerate() {
            if i > 0 {
                println!("{}", "-".repeat(width));
            }
            self.display_note(note, self.verbose);
        }
        Ok(())
    }

    fn display_note(&self, note: &Note, detailed: bool) {
        let star = if note.is_favorite { " *" } else { "" };
        println!(
            "ID: {} | Updated: {}{}",
            note.id,
            note.updated_at.format("%Y-%m-%d %H:%M"),
            star
        );
        println!("Title: {}", console::style(&note.title).bold());
        if note.color != NoteColor::Default {
            println!("Color: {}", console::style(note.color).cyan());
        }

        match note.kind {
            NoteKind::Checklist => self.display_tasks(&note.tasks),
            NoteKind::Media => {
                if let Some(uri) = &note.media_uri {
                    println!("Media: {}", uri);
                }
            }
            NoteKind::Text => {}
        }

        if detailed {
            if !note.content.is_empty() {
                println!("\n{}", note.content);
            }
        } else {
            let preview = content_preview(&note.content, 100);
            if !preview.is_empty() {
                println!("\n{}", preview);
            }
        }
    }

    fn display_tasks(&self, tasks: &[Task]) {
        for (i, task) in tasks.iter().enumerate() {
            let mark = if task.done { "x" } else { " " };
            println!("  {}. [{}] {}", i, mark, task.text);
        }
    }

    fn display_trash(&self, entries: &[TrashEntry]) {
        let width = separator_width();
        for (i, entry) in entries.iter().enumerate() {
            if i > 0 {
                println!("{}", "-".repeat(width));
            }
            let deleted = entry
                .note
                .deleted_at
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_default();
            println!("ID: {} | Deleted: {}", entry.note.id, deleted);
            println!("Title: {}", console::style(&entry.note.title).bold());

            let days = match entry.days_left {
                1 => "1 day left".to_string(),
                n => format!("{} days left", n),
            };
            let days = if entry.days_left <= 3 {
                console::style(days).red()
            } else {
                console::style(days).yellow()
            };
            println!("{}", days);
        }
    }
}

/// Splits comma-separated task text; `None` when no tasks were given
fn parse_tasks(tasks: Option<String>) -> Option<Vec<Task>> {
    let tasks: Vec<Task> = tasks?
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(Task::new)
        .collect();
    Some(tasks)
}

/// First non-empty line, shortened to `max_chars`
fn content_preview(content: &str, max_chars: usize) -> String {
    let first_line = content
        .lines()
        .find(|line| !line.trim().is_empty())
        .unwrap_or("");

    if first_line.chars().count() <= max_chars {
        first_line.to_string()
    } else {
        let cut: String = first_line.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}

fn separator_width() -> usize {
    terminal_size::terminal_size()
        .map(|(w, _)| w.0 as usize)
        .unwrap_or(80)
        .min(50)
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{}", prompt);
    stdout().flush().map_err(NoteError::Io)?;

    let mut input = String::new();
    stdin().read_line(&mut input).map_err(NoteError::Io)?;

    let input = input.trim().to_lowercase();
    Ok(input == "y" || input == "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_tasks_skips_blank_entries() {
        let tasks = parse_tasks(Some("milk, ,eggs,".to_string())).unwrap();
        let texts: Vec<_> = tasks.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, ["milk", "eggs"]);
        assert!(parse_tasks(None).is_none());
    }

    #[test]
    fn preview_uses_first_non_empty_line() {
        assert_eq!(content_preview("\n\n  \nhello\nworld", 100), "hello");
        assert_eq!(content_preview("abcdef", 3), "abc...");
        assert_eq!(content_preview("", 10), "");
    }
}
