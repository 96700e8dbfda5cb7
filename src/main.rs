use clap::{Arg, ArgAction, ArgMatches, Command};
use color_eyre::Result;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

mod adapters;
mod application;
mod domain;
mod ports;

use adapters::{
    api::{RemoteTaskStore, RestClient, SessionAuth},
    config::FileConfigStore,
    local::LocalTaskStore,
};
use application::{AppError, Confirmation, TaskCoordinator};
use domain::{parse_due_date, FilterType, Task, TaskDraft, TaskId, TaskPatch, ViewParams};
use ports::{AppConfig, AuthProvider, Backend, ConfigError, ConfigStore, StoreError, TaskStore};

fn id_arg() -> Arg {
    Arg::new("id")
        .help("Task ID (a unique prefix is enough)")
        .required(true)
        .index(1)
}

fn cli() -> Command {
    Command::new("taskdeck")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Personal task tracker with local or remote storage")
        .arg_required_else_help(true)
        .arg(
            Arg::new("backend")
                .long("backend")
                .value_name("local|remote")
                .help("Storage backend (defaults to the configured one, then local)")
                .global(true),
        )
        .arg(
            Arg::new("url")
                .long("url")
                .value_name("URL")
                .help("Remote backend URL (can also be set via TASKDECK_URL env var)")
                .global(true),
        )
        .arg(
            Arg::new("anon_key")
                .long("anon-key")
                .value_name("KEY")
                .help("Remote backend public key (can also be set via TASKDECK_ANON_KEY env var)")
                .global(true),
        )
        .arg(
            Arg::new("data_file")
                .long("data-file")
                .value_name("PATH")
                .help("Task file for the local backend")
                .global(true),
        )
        .subcommand(
            Command::new("list")
                .about("List tasks as JSON")
                .arg(
                    Arg::new("trash")
                        .long("trash")
                        .action(ArgAction::SetTrue)
                        .help("Show soft-deleted tasks instead"),
                )
                .arg(
                    Arg::new("search")
                        .long("search")
                        .short('s')
                        .value_name("TERM")
                        .help("Only tasks whose text or details contain TERM"),
                )
                .arg(
                    Arg::new("favorites")
                        .long("favorites")
                        .short('f')
                        .action(ArgAction::SetTrue)
                        .help("Only favorite tasks"),
                )
                .arg(
                    Arg::new("tag")
                        .long("tag")
                        .short('t')
                        .value_name("TAG")
                        .action(ArgAction::Append)
                        .help("Only tasks with this tag (repeatable)"),
                )
                .arg(
                    Arg::new("sort")
                        .long("sort")
                        .value_name("CATEGORY")
                        .help("created_at, due_date, last_updated, text, favorite or tag_name"),
                )
                .arg(
                    Arg::new("direction")
                        .long("direction")
                        .value_name("asc|desc")
                        .help("Sort direction"),
                ),
        )
        .subcommand(Command::new("tags").about("Show tag usage across active tasks"))
        .subcommand(
            Command::new("add")
                .about("Create a task")
                .arg(Arg::new("text").required(true).index(1).help("Task title"))
                .arg(Arg::new("details").long("details").short('d').value_name("TEXT"))
                .arg(Arg::new("due").long("due").value_name("YYYY-MM-DD"))
                .arg(Arg::new("tag").long("tag").short('t').value_name("TAG")),
        )
        .subcommand(Command::new("done").about("Toggle completion").arg(id_arg()))
        .subcommand(Command::new("fav").about("Toggle favorite").arg(id_arg()))
        .subcommand(Command::new("delete").about("Move a task to the trash").arg(id_arg()))
        .subcommand(Command::new("restore").about("Bring a task back from the trash").arg(id_arg()))
        .subcommand(
            Command::new("purge")
                .about("Delete a task permanently (cannot be undone)")
                .arg(id_arg())
                .arg(
                    Arg::new("yes")
                        .long("yes")
                        .action(ArgAction::SetTrue)
                        .help("Confirm the permanent deletion"),
                ),
        )
        .subcommand(
            Command::new("edit")
                .about("Edit fields of a task; only given fields change")
                .arg(id_arg())
                .arg(Arg::new("text").long("text").value_name("TEXT"))
                .arg(Arg::new("details").long("details").short('d').value_name("TEXT"))
                .arg(
                    Arg::new("due")
                        .long("due")
                        .value_name("YYYY-MM-DD")
                        .conflicts_with("clear_due"),
                )
                .arg(
                    Arg::new("clear_due")
                        .long("clear-due")
                        .action(ArgAction::SetTrue)
                        .help("Remove the due date"),
                )
                .arg(
                    Arg::new("tag")
                        .long("tag")
                        .short('t')
                        .value_name("TAG")
                        .help("New tag; pass an empty string to remove it"),
                ),
        )
        .subcommand(
            Command::new("login")
                .about("Sign in to the remote backend")
                .arg(Arg::new("email").long("email").required(true).value_name("EMAIL"))
                .arg(
                    Arg::new("password")
                        .long("password")
                        .value_name("PASSWORD")
                        .help("Password (can also be set via TASKDECK_PASSWORD env var)"),
                ),
        )
        .subcommand(Command::new("logout").about("Sign out of the remote backend"))
}

fn init_logging() -> Result<()> {
    let log_dir = dirs::data_dir()
        .map(|dir| dir.join("taskdeck"))
        .unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("taskdeck.log"))?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .init();

    Ok(())
}

fn apply_overrides(config: &mut AppConfig, matches: &ArgMatches) -> Result<()> {
    if let Some(backend) = matches.get_one::<String>("backend") {
        config.backend = backend.parse()?;
    }
    if let Some(url) = matches.get_one::<String>("url") {
        config.remote_url = Some(url.clone());
    }
    if let Some(key) = matches.get_one::<String>("anon_key") {
        config.anon_key = Some(key.clone());
    }
    if let Some(path) = matches.get_one::<String>("data_file") {
        config.data_file = Some(PathBuf::from(path));
    }
    Ok(())
}

fn view_params(config: &AppConfig, matches: &ArgMatches) -> Result<ViewParams> {
    let mut params = ViewParams {
        sort_category: config.default_sort,
        sort_direction: config.default_direction,
        ..Default::default()
    };

    if matches.get_flag("trash") {
        params.filter = FilterType::Trash;
    }
    if let Some(term) = matches.get_one::<String>("search") {
        params.search_term = term.clone();
    }
    params.show_only_favorites = matches.get_flag("favorites");
    if let Some(tags) = matches.get_many::<String>("tag") {
        params.selected_tags = tags.cloned().collect();
    }
    if let Some(sort) = matches.get_one::<String>("sort") {
        params.sort_category = sort.parse()?;
    }
    if let Some(direction) = matches.get_one::<String>("direction") {
        params.sort_direction = direction.parse()?;
    }

    Ok(params)
}

/// Match an exact ID first, then a unique prefix. Anything else is passed through
/// and reported as not found by the coordinator.
fn resolve_id(tasks: &[Task], raw: &str) -> TaskId {
    if tasks.iter().any(|t| t.id.0 == raw) {
        return TaskId::from(raw);
    }

    let mut candidates = tasks.iter().filter(|t| t.id.0.starts_with(raw));
    match (candidates.next(), candidates.next()) {
        (Some(task), None) => task.id.clone(),
        _ => TaskId::from(raw),
    }
}

fn print_task(action: &str, task: &Task) {
    println!("{action}: {} ({})", task.text, task.id);
}

/// Print the outcome of a mutation. A persistence failure still leaves the local
/// change in place, so it is reported as a warning about divergence.
fn report(action: &str, result: Result<Task, AppError>) -> Result<()> {
    match result {
        Ok(task) => {
            print_task(action, &task);
            Ok(())
        }
        Err(AppError::Persistence(e)) => {
            eprintln!("⚠️  {action} was applied locally but could not be saved: {e}");
            std::process::exit(1);
        }
        Err(AppError::NotFound(id)) => {
            eprintln!("❌ No task with ID {id}");
            std::process::exit(1);
        }
        Err(AppError::AuthenticationRequired) => {
            eprintln!("❌ Not signed in. Run: taskdeck login --email <EMAIL>");
            std::process::exit(1);
        }
        Err(e) => Err(e.into()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    init_logging()?;

    let matches = cli().get_matches();

    let config_store = FileConfigStore::new()?;
    let mut config = config_store.load_config().await?;
    apply_overrides(&mut config, &matches)?;

    let persist_timeout = Duration::from_secs(config.persist_timeout_seconds);

    let (store, session): (Arc<dyn TaskStore>, Option<Arc<SessionAuth>>) = match config.backend {
        Backend::Local => {
            let path = match config.data_file.clone() {
                Some(path) => path,
                None => LocalTaskStore::default_path()?,
            };
            let store = LocalTaskStore::new(path);
            tracing::info!("Using local task file {}", store.path().display());
            let store: Arc<dyn TaskStore> = Arc::new(store);
            (store, None)
        }
        Backend::Remote => {
            let url = config
                .remote_url
                .clone()
                .ok_or(ConfigError::Missing("remote URL (--url or TASKDECK_URL)"))?;
            let anon_key = config
                .anon_key
                .clone()
                .ok_or(ConfigError::Missing("anon key (--anon-key or TASKDECK_ANON_KEY)"))?;
            tracing::info!("Using remote backend {}", url);

            let client = RestClient::new(url, anon_key)?;
            let session = Arc::new(SessionAuth::new(
                client.clone(),
                config_store.load_session().await?,
            ));
            let store: Arc<dyn TaskStore> =
                Arc::new(RemoteTaskStore::new(client, session.clone()));
            (store, Some(session))
        }
    };

    let auth = session
        .clone()
        .map(|session| session as Arc<dyn AuthProvider>);
    let coordinator = TaskCoordinator::new(store, auth, persist_timeout);

    match matches.subcommand() {
        Some(("login", login_matches)) => {
            let Some(session) = session else {
                eprintln!("❌ login needs the remote backend (--backend remote)");
                std::process::exit(1);
            };
            let email = login_matches
                .get_one::<String>("email")
                .cloned()
                .unwrap_or_default();
            let password = match login_matches.get_one::<String>("password") {
                Some(password) => password.clone(),
                None => std::env::var("TASKDECK_PASSWORD")
                    .map_err(|_| ConfigError::Missing("password (--password or TASKDECK_PASSWORD)"))?,
            };

            let mut sessions = session.subscribe();
            let principal = session.sign_in(&email, &password).await?;
            config_store.save_session(&principal).await?;
            config_store.save_config(&config).await?;

            let count = coordinator.sync_session(&mut sessions).await?;
            println!("Signed in as {email}; {count} tasks loaded");
        }
        Some(("logout", _)) => {
            if let Some(session) = session {
                let mut sessions = session.subscribe();
                session.sign_out();
                coordinator.sync_session(&mut sessions).await?;
            }
            config_store.clear_session().await?;
            println!("Signed out");
        }
        Some((command, sub_matches)) => {
            if let Err(e) = coordinator.load().await {
                match e {
                    AppError::AuthenticationRequired => {
                        eprintln!("❌ Not signed in. Run: taskdeck login --email <EMAIL>");
                        std::process::exit(1);
                    }
                    AppError::Store(StoreError::Authentication(reason)) => {
                        if let Some(session) = &session {
                            let mut sessions = session.subscribe();
                            session.expire();
                            coordinator.sync_session(&mut sessions).await?;
                        }
                        config_store.clear_session().await?;
                        eprintln!("❌ Session expired ({reason}). Run: taskdeck login --email <EMAIL>");
                        std::process::exit(1);
                    }
                    other => return Err(other.into()),
                }
            }

            let tasks = coordinator.tasks().await;
            let id = || {
                sub_matches
                    .get_one::<String>("id")
                    .map(|raw| resolve_id(&tasks, raw))
                    .unwrap_or_else(|| TaskId::from(""))
            };

            match command {
                "list" => {
                    let params = view_params(&config, sub_matches)?;
                    let view = coordinator.view(&params).await;
                    println!("{}", serde_json::to_string_pretty(&view.tasks)?);
                }
                "tags" => {
                    let view = coordinator.view(&ViewParams::default()).await;
                    println!("{}", serde_json::to_string_pretty(&view.tag_counts)?);
                }
                "add" => {
                    let due_date = sub_matches
                        .get_one::<String>("due")
                        .map(|raw| parse_due_date(raw))
                        .transpose()?;
                    let draft = TaskDraft {
                        text: sub_matches
                            .get_one::<String>("text")
                            .cloned()
                            .unwrap_or_default(),
                        details: sub_matches
                            .get_one::<String>("details")
                            .cloned()
                            .unwrap_or_default(),
                        due_date,
                        tag: sub_matches
                            .get_one::<String>("tag")
                            .cloned()
                            .unwrap_or_default(),
                    };
                    report("Created", coordinator.create(draft).await)?;
                }
                "done" => report("Toggled completion", coordinator.toggle_complete(&id()).await)?,
                "fav" => report("Toggled favorite", coordinator.toggle_favorite(&id()).await)?,
                "delete" => report("Moved to trash", coordinator.soft_delete(&id()).await)?,
                "restore" => report("Restored", coordinator.restore(&id()).await)?,
                "purge" => {
                    let confirmation = if sub_matches.get_flag("yes") {
                        Confirmation::Confirmed
                    } else {
                        Confirmation::Declined
                    };
                    match coordinator.permanent_delete(&id(), confirmation).await {
                        Ok(Some(task)) => print_task("Deleted permanently", &task),
                        Ok(None) => {
                            eprintln!("This cannot be undone. Re-run with --yes to confirm.");
                        }
                        Err(e) => report("Delete", Err(e))?,
                    }
                }
                "edit" => {
                    let due_date = if sub_matches.get_flag("clear_due") {
                        Some(None)
                    } else {
                        sub_matches
                            .get_one::<String>("due")
                            .map(|raw| parse_due_date(raw).map(Some))
                            .transpose()?
                    };
                    let patch = TaskPatch {
                        text: sub_matches.get_one::<String>("text").cloned(),
                        details: sub_matches.get_one::<String>("details").cloned(),
                        due_date,
                        tag: sub_matches.get_one::<String>("tag").cloned(),
                        ..Default::default()
                    };
                    if patch.is_empty() {
                        eprintln!("Nothing to change; pass at least one field to edit");
                        std::process::exit(1);
                    }
                    report("Updated", coordinator.update(&id(), patch).await)?;
                }
                _ => {
                    eprintln!("❌ Unknown command");
                    std::process::exit(1);
                }
            }
        }
        None => {
            cli().print_help()?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn task(id: &str) -> Task {
        Task::new(TaskId::from(id), TaskDraft::new("x"), Utc::now())
    }

    #[test]
    fn resolves_exact_and_unique_prefix_ids() {
        let tasks = vec![task("abc123"), task("abd456"), task("abc")];

        assert_eq!(resolve_id(&tasks, "abc"), TaskId::from("abc"));
        assert_eq!(resolve_id(&tasks, "abd"), TaskId::from("abd456"));
        // Ambiguous prefix is passed through untouched
        assert_eq!(resolve_id(&tasks, "ab"), TaskId::from("ab"));
        assert_eq!(resolve_id(&tasks, "zzz"), TaskId::from("zzz"));
    }

    #[test]
    fn list_flags_build_view_params() {
        let matches = cli().get_matches_from([
            "taskdeck", "list", "--favorites", "--tag", "work", "--tag", "home", "--sort",
            "due_date", "--direction", "asc", "--search", "milk",
        ]);
        let (_, list) = matches.subcommand().unwrap();
        let params = view_params(&AppConfig::default(), list).unwrap();

        assert!(params.show_only_favorites);
        assert_eq!(params.selected_tags.len(), 2);
        assert_eq!(params.sort_category, domain::SortCategory::DueDate);
        assert_eq!(params.sort_direction, domain::SortDirection::Asc);
        assert_eq!(params.search_term, "milk");
        assert_eq!(params.filter, FilterType::Home);
    }

    #[test]
    fn list_defaults_come_from_config() {
        let config = AppConfig {
            default_sort: domain::SortCategory::Text,
            ..Default::default()
        };
        let matches = cli().get_matches_from(["taskdeck", "list", "--trash"]);
        let (_, list) = matches.subcommand().unwrap();
        let params = view_params(&config, list).unwrap();

        assert_eq!(params.filter, FilterType::Trash);
        assert_eq!(params.sort_category, domain::SortCategory::Text);
        assert_eq!(params.sort_direction, domain::SortDirection::Desc);
    }

    #[test]
    fn cli_definition_is_consistent() {
        cli().debug_assert();
    }
}
