use std::io::{BufRead, Write};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{self, eyre};
use serde::Serialize;

use crate::api::ApiClient;
use crate::app::AppSession;
use crate::auth::Credentials;
use crate::auth::session::{SessionManager, SessionOptions};
use crate::auth::storage::FileStore;
use crate::config::{AppConfig, load_config};
use crate::list::optimistic::{FollowAction, PostAction};
use crate::list::sources::{PostSource, UserSource};
use crate::list::{ActionSink, IncrementalList, ItemSource, ListItem, fetch_batch};

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "fixit", about = "TUI and CLI for the FixIt social network")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

#[derive(Subcommand)]
pub enum CliCommand {
    /// Launch the interactive TUI (default)
    Tui,
    /// Log in with email and password (password from FIXIT_PASSWORD or stdin)
    Login {
        #[arg(long)]
        email: Option<String>,
    },
    /// Forget the stored session
    Logout,
    /// Print the logged-in user (JSON)
    Whoami,
    /// Fetch posts from the feed (JSONL)
    Feed {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Fetch users to explore (JSONL)
    Explore {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Look up a profile (JSON)
    Profile {
        /// User ID, `#ID` or profile URL
        user: String,
    },
    /// Follow a user
    Follow { user_id: u64 },
    /// Unfollow a user
    Unfollow { user_id: u64 },
    /// Like a post
    Like { post_id: u64 },
    /// Remove a like
    Unlike { post_id: u64 },
    /// Save a post
    Save { post_id: u64 },
    /// Remove a post from saved
    Unsave { post_id: u64 },
}

// ---------------------------------------------------------------------------
// Output helpers
// ---------------------------------------------------------------------------

/// Print items as JSONL to stdout.
fn print_jsonl<T: Serialize>(items: &[T]) -> eyre::Result<()> {
    let mut out = std::io::stdout().lock();
    for item in items {
        writeln!(out, "{}", serde_json::to_string(item)?)?;
    }
    Ok(())
}

fn print_json(value: &serde_json::Value) -> eyre::Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// Client and session construction (shared with main.rs TUI path)
// ---------------------------------------------------------------------------

pub fn build_session(config: &AppConfig) -> eyre::Result<(Arc<ApiClient>, AppSession)> {
    let api = Arc::new(ApiClient::new(config)?);
    let store = FileStore::default();
    tracing::debug!(path = %store.path().display(), "session store");
    let session = SessionManager::new(
        Arc::clone(&api),
        Arc::new(store),
        SessionOptions::from(config),
    );
    Ok((api, session))
}

fn require_token(session: &AppSession) -> eyre::Result<String> {
    session
        .access_token()
        .ok_or_else(|| eyre!("not logged in; run `fixit login`"))
}

// ---------------------------------------------------------------------------
// Paging
// ---------------------------------------------------------------------------

/// Page through `ids` with the list controller until `limit` items are loaded
/// or the IDs run out. Items that fail to load are skipped.
async fn collect<T, S>(source: &S, ids: Vec<u64>, batch_size: usize, limit: usize) -> Vec<T>
where
    T: ListItem + Clone,
    S: ItemSource<T>,
{
    let mut list = IncrementalList::new(batch_size, 0);
    if let Some(request) = list.initialize(ids) {
        let batch = fetch_batch(source, request).await;
        list.complete_batch(batch);
    }
    while list.len() < limit && list.load_next(source).await.is_some() {}
    list.items().iter().take(limit).cloned().collect()
}

// ---------------------------------------------------------------------------
// Login prompts
// ---------------------------------------------------------------------------

fn prompt(label: &str) -> eyre::Result<String> {
    eprint!("{label}: ");
    std::io::stderr().flush()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    let value = line.trim().to_string();
    if value.is_empty() {
        return Err(eyre!("{label} is required"));
    }
    Ok(value)
}

fn password() -> eyre::Result<String> {
    match std::env::var("FIXIT_PASSWORD") {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => prompt("Password"),
    }
}

// ---------------------------------------------------------------------------
// Command execution
// ---------------------------------------------------------------------------

pub async fn run_command(cmd: CliCommand) -> eyre::Result<()> {
    let config = load_config();
    let (api, session) = build_session(&config)?;

    match cmd {
        CliCommand::Tui => unreachable!("tui is handled in main"),

        CliCommand::Login { email } => {
            let email = match email {
                Some(email) => email,
                None => prompt("Email")?,
            };
            let password = password()?;
            let logged_in = session.login_with_password(&email, &password).await?;
            eprintln!("Logged in as {}", logged_in.user.name);
            print_json(&serde_json::to_value(&logged_in.user)?)?;
        }

        CliCommand::Logout => {
            session.logout();
            eprintln!("Logged out.");
        }

        CliCommand::Whoami => {
            session.restore().await;
            let user = session
                .current_user()
                .ok_or_else(|| eyre!("not logged in; run `fixit login`"))?;
            print_json(&serde_json::to_value(&user)?)?;
        }

        CliCommand::Feed { limit } => {
            session.restore().await;
            let ids = api.get_post_ids().await?;
            let source = PostSource::new(Arc::clone(&api), Arc::new(session.clone()));
            let posts = collect(&source, ids, config.post_batch_size, limit).await;
            print_jsonl(&posts)?;
        }

        CliCommand::Explore { limit } => {
            session.restore().await;
            let token = session.access_token();
            let viewer = session.user_id();
            let ids: Vec<u64> = api
                .get_user_ids(token.as_deref())
                .await?
                .into_iter()
                .filter(|id| Some(*id) != viewer)
                .collect();
            let source = UserSource::new(Arc::clone(&api), Arc::new(session.clone()));
            let users = collect(&source, ids, config.user_batch_size, limit).await;
            print_jsonl(&users)?;
        }

        CliCommand::Profile { user } => {
            let user_id = crate::command::parse_user_id(&user)
                .ok_or_else(|| eyre!("not a user ID or profile URL: {user}"))?;
            session.restore().await;
            let token = session.access_token();
            let own = session.user_id() == Some(user_id);

            let profile = match (&token, own) {
                (Some(token), true) => api.get_own_profile(user_id, token).await?,
                _ => api.get_profile(user_id).await?,
            };
            let follow = match (&token, own) {
                (Some(token), false) => Some(api.get_follow_status(user_id, token).await?),
                _ => None,
            };
            print_json(&serde_json::json!({
                "userId": user_id,
                "profile": profile,
                "follow": follow,
            }))?;
        }

        CliCommand::Follow { user_id } => {
            follow_command(&api, &session, user_id, FollowAction::Follow).await?;
        }
        CliCommand::Unfollow { user_id } => {
            follow_command(&api, &session, user_id, FollowAction::Unfollow).await?;
        }
        CliCommand::Like { post_id } => {
            post_command(&api, &session, post_id, PostAction::Like).await?;
        }
        CliCommand::Unlike { post_id } => {
            post_command(&api, &session, post_id, PostAction::Unlike).await?;
        }
        CliCommand::Save { post_id } => {
            post_command(&api, &session, post_id, PostAction::Save).await?;
        }
        CliCommand::Unsave { post_id } => {
            post_command(&api, &session, post_id, PostAction::Unsave).await?;
        }
    }

    Ok(())
}

async fn follow_command(
    api: &Arc<ApiClient>,
    session: &AppSession,
    user_id: u64,
    action: FollowAction,
) -> eyre::Result<()> {
    session.restore().await;
    require_token(session)?;
    if session.user_id() == Some(user_id) {
        return Err(eyre!("cannot follow yourself"));
    }
    let sink = UserSource::new(Arc::clone(api), Arc::new(session.clone()));
    sink.commit(user_id, &action).await?;
    print_json(&serde_json::json!({ "userId": user_id, "action": action, "ok": true }))
}

async fn post_command(
    api: &Arc<ApiClient>,
    session: &AppSession,
    post_id: u64,
    action: PostAction,
) -> eyre::Result<()> {
    session.restore().await;
    require_token(session)?;
    let sink = PostSource::new(Arc::clone(api), Arc::new(session.clone()));
    sink.commit(post_id, &action).await?;
    print_json(&serde_json::json!({ "postId": post_id, "action": action, "ok": true }))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
