//! The `sessions` subcommand family: list, show, rename, delete.

use clap::Subcommand;
use uuid::Uuid;

use kwlens_core::AppConfig;

use crate::app::build_pipeline;
use crate::research::print_session;

#[derive(Debug, Subcommand)]
pub enum SessionCommands {
    /// List stored sessions, newest first.
    List,
    /// Load one session (from cache, or rebuilt from the store) and print it.
    Show { session_id: Uuid },
    /// Rename a stored session.
    Rename { session_id: Uuid, name: String },
    /// Delete a stored session.
    Delete { session_id: Uuid },
}

pub async fn run(config: &AppConfig, user: &str, command: SessionCommands) -> anyhow::Result<()> {
    let pipeline = build_pipeline(config).await?;

    match command {
        SessionCommands::List => {
            let sessions = pipeline.list_sessions(user).await?;
            if sessions.is_empty() {
                println!("no stored sessions for user '{user}'");
                return Ok(());
            }
            for session in sessions {
                println!(
                    "{}  {}  [{}]  {}",
                    session.id,
                    session.created_at.format("%Y-%m-%d %H:%M"),
                    session.products.join(", "),
                    session.name.as_deref().unwrap_or("-"),
                );
            }
        }
        SessionCommands::Show { session_id } => {
            let session = pipeline.load_session(user, session_id).await?;
            print_session(&session);
        }
        SessionCommands::Rename { session_id, name } => {
            pipeline.rename_session(user, session_id, &name).await?;
            println!("session {session_id} renamed to '{name}'");
        }
        SessionCommands::Delete { session_id } => {
            pipeline.delete_session(user, session_id).await?;
            println!("session {session_id} deleted");
        }
    }
    Ok(())
}
