use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::stream::{FuturesUnordered, StreamExt};
use secrecy::SecretString;
use std::path::PathBuf;

use fakeflix::app::App;
use fakeflix::catalog::{CategoryBinding, Item, MediaType, PageCursor, Slice};
use fakeflix::config::{config_dir, Config};
use fakeflix::favourites::FavouritesSet;
use fakeflix::search::{search, SearchState};
use fakeflix::session::UserSnapshot;
use fakeflix::storage::{Database, DatabaseError};
use fakeflix::util::{capitalize_first, display_width, truncate_to_width};

const TITLE_WIDTH: usize = 48;

#[derive(Parser, Debug)]
#[command(name = "fakeflix", about = "Browse movie and TV catalog rows from the terminal")]
struct Args {
    /// Config file (default: ~/.config/fakeflix/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Database file (default: ~/.config/fakeflix/fakeflix.db)
    #[arg(long, value_name = "FILE")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch every home row of a context (movies, series, popular, browse)
    Rows { context: String },

    /// Fetch one category, then load more pages
    Category {
        context: String,
        genre: String,
        /// Total pages to load, including the first
        #[arg(long, default_value_t = 1)]
        pages: u32,
    },

    /// Search movies and series
    Search { query: String },

    /// Manage the signed-in user's favourites
    #[command(subcommand)]
    Favourites(FavouritesCommand),

    /// Sign in, sign up or sign out
    #[command(subcommand)]
    Auth(AuthCommand),
}

#[derive(Subcommand, Debug)]
enum FavouritesCommand {
    List,
    Add {
        #[arg(value_parser = parse_media_type)]
        media: MediaType,
        id: u64,
    },
    Remove { id: u64 },
}

#[derive(Subcommand, Debug)]
enum AuthCommand {
    /// Sign in with email; the password is read from FAKEFLIX_PASSWORD
    SignIn { email: String },
    /// Create an account; the password is read from FAKEFLIX_PASSWORD
    SignUp { name: String, email: String },
    Anonymous,
    SignOut,
    Whoami,
}

fn parse_media_type(s: &str) -> Result<MediaType, String> {
    match s {
        "movie" => Ok(MediaType::Movie),
        "tv" => Ok(MediaType::Tv),
        other => Err(format!("expected 'movie' or 'tv', got '{}'", other)),
    }
}

fn password_from_env() -> Result<SecretString> {
    let password = std::env::var("FAKEFLIX_PASSWORD")
        .context("Set FAKEFLIX_PASSWORD to the account password")?;
    Ok(SecretString::from(password))
}

// ============================================================================
// Output
// ============================================================================

fn print_items(items: &[Item]) {
    for item in items {
        let title = truncate_to_width(item.fallback_title(), TITLE_WIDTH);
        let pad = TITLE_WIDTH.saturating_sub(display_width(&title));
        let star = if item.is_favourite { "*" } else { " " };
        println!(
            "  {} {:>8}  {}{}  {:>4}  {}",
            star,
            item.id,
            title,
            " ".repeat(pad),
            item.year().unwrap_or("----"),
            item.genre_names().join(", ")
        );
    }
}

fn print_slice(heading: &str, slice: &Slice, favourites: &FavouritesSet) {
    println!("{}", heading);
    if let Some(error) = slice.error() {
        println!("  An error occurred: {}", error);
        return;
    }
    if slice.data().is_empty() {
        println!("  (nothing here)");
        return;
    }
    print_items(&favourites.decorated(slice.data()));
}

fn print_user(user: &UserSnapshot) {
    let kind = if user.is_anonymous { " (guest)" } else { "" };
    println!("Signed in as {}{} [{}]", user.label(), kind, user.id);
}

// ============================================================================
// Commands
// ============================================================================

async fn current_favourites(app: &App) -> Result<FavouritesSet> {
    Ok(app
        .favourites()
        .await?
        .map(|f| f.set().clone())
        .unwrap_or_default())
}

async fn run_rows(app: &App, context: &str) -> Result<()> {
    let view = app.catalog()?;
    let favourites = current_favourites(app).await?;
    let rows = view.retrieve_rows(context)?;

    let mut pending: FuturesUnordered<_> = rows
        .into_iter()
        .map(|(row, handle)| async move { (row, handle.await) })
        .collect();

    while let Some((row, joined)) = pending.next().await {
        if let Err(e) = joined {
            tracing::warn!(row = row.title, error = %e, "Row fetch task failed");
            continue;
        }
        let slice = view.store().snapshot(row.selector).unwrap_or_default();
        let heading = if row.is_large {
            format!("== {} ==", row.title)
        } else {
            row.title.to_string()
        };
        print_slice(&heading, &slice, &favourites);
    }
    Ok(())
}

async fn run_category(app: &App, context: &str, genre: &str, pages: u32) -> Result<()> {
    let view = app.catalog()?;
    let favourites = current_favourites(app).await?;
    let mut binding = CategoryBinding::new(view.clone());

    if let Some(fetch) = binding.update(context, genre, 1)? {
        fetch.handle.await?;
    }
    let mut cursor = PageCursor::default();
    for _ in 1..pages {
        if let Some(fetch) = binding.update(context, genre, cursor.page())? {
            fetch.handle.await?;
        }
        cursor.load_more();
    }

    let descriptor = binding
        .descriptor()
        .context("Category binding lost its descriptor")?;
    let slice = view.store().snapshot(descriptor.selector).unwrap_or_default();
    let heading = format!(
        "{} / {} ({} items)",
        capitalize_first(descriptor.genre_key),
        descriptor.title,
        slice.data().len()
    );
    print_slice(&heading, &slice, &favourites);
    Ok(())
}

async fn run_search(app: &App, query: &str) -> Result<()> {
    let view = app.catalog()?;
    let favourites = current_favourites(app).await?;
    let mut state = SearchState::default();
    search(view.client(), &mut state, query).await;

    if let Some(error) = state.error() {
        anyhow::bail!("Search failed: {}", error);
    }
    if state.results().is_empty() {
        println!("No results for \"{}\"", state.input().trim());
        return Ok(());
    }
    print_items(&favourites.decorated(state.results()));
    Ok(())
}

async fn run_favourites(app: &App, command: FavouritesCommand) -> Result<()> {
    let mut favourites = app
        .favourites()
        .await?
        .context("Sign in first: fakeflix auth sign-in <email>")?;

    match command {
        FavouritesCommand::List => {
            if favourites.set().is_empty() {
                println!("No favourites yet");
            }
            print_items(favourites.set().items());
            for item in favourites.set().items() {
                tracing::debug!(
                    id = item.id,
                    poster = %item.poster_url(&app.config().image_base_url, ""),
                    "Favourite poster"
                );
            }
        }
        FavouritesCommand::Add { media, id } => {
            let item = app.catalog()?.client().fetch_detail(media, id).await?;
            if favourites.add(&item).await? {
                println!("Added {}", item.fallback_title());
            } else {
                println!("{} is already a favourite", item.fallback_title());
            }
        }
        FavouritesCommand::Remove { id } => {
            if favourites.remove(id).await? {
                println!("Removed {}", id);
            } else {
                println!("{} is not a favourite", id);
            }
        }
    }
    Ok(())
}

async fn run_auth(app: &App, command: AuthCommand) -> Result<()> {
    let auth = app.auth()?;
    let user = match command {
        AuthCommand::SignIn { email } => {
            Some(auth.sign_in_with_email(&email, &password_from_env()?).await?)
        }
        AuthCommand::SignUp { name, email } => {
            Some(auth.sign_up(&name, &email, &password_from_env()?).await?)
        }
        AuthCommand::Anonymous => Some(auth.sign_in_anonymously().await?),
        AuthCommand::SignOut => {
            auth.sign_out().await?;
            println!("Signed out");
            return Ok(());
        }
        AuthCommand::Whoami => auth.check_session().await?,
    };

    match user {
        Some(user) => print_user(&user),
        None => println!("Not signed in"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_dir = config_dir()?;
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) =
            std::fs::set_permissions(&config_dir, std::fs::Permissions::from_mode(0o700))
        {
            tracing::warn!(
                path = %config_dir.display(),
                error = %e,
                "Failed to set config directory permissions to 0700"
            );
        }
    }

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?
        .with_env_overrides();
    tracing::debug!(config = ?config, "Effective configuration");

    let db_path = args
        .db
        .clone()
        .unwrap_or_else(|| config_dir.join("fakeflix.db"));
    let db_path = db_path.to_str().context("Database path is not valid UTF-8")?;
    let db = match Database::open(db_path).await {
        Ok(db) => db,
        Err(DatabaseError::InstanceLocked) => {
            eprintln!("Error: {}", DatabaseError::InstanceLocked);
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };

    let app = App::new(config, db)?;

    match args.command {
        Command::Rows { context } => run_rows(&app, &context).await,
        Command::Category {
            context,
            genre,
            pages,
        } => run_category(&app, &context, &genre, pages).await,
        Command::Search { query } => run_search(&app, &query).await,
        Command::Favourites(command) => run_favourites(&app, command).await,
        Command::Auth(command) => run_auth(&app, command).await,
    }
}
