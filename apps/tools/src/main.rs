use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use shared::domain::ChatId;
use storage::{load_timestamps, store_timestamp, timestamp_prefix, KeyValueStore, Storage};

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://./db/users.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Lists the last delivered timestamp of every chat in a session.
    Timestamps { session: String },
    SetTimestamp {
        session: String,
        chat_id: String,
        timestamp: i64,
    },
    /// Forgets all history markers of a session.
    Clear { session: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let storage = Storage::new(&cli.database_url)
        .await
        .with_context(|| format!("failed to open {}", cli.database_url))?;

    match cli.command {
        Command::Timestamps { session } => {
            let mut timestamps: Vec<_> = load_timestamps(&storage, &session)
                .await?
                .into_iter()
                .collect();
            timestamps.sort();
            for (chat_id, timestamp) in timestamps {
                println!("{chat_id}\t{timestamp}");
            }
        }
        Command::SetTimestamp {
            session,
            chat_id,
            timestamp,
        } => {
            store_timestamp(&storage, &session, &ChatId::new(chat_id.as_str()), timestamp).await?;
            println!("set {chat_id}={timestamp} for session {session}");
        }
        Command::Clear { session } => {
            let removed = storage.remove_prefix(&timestamp_prefix(&session)).await?;
            println!("removed {removed} timestamps for session {session}");
        }
    }

    Ok(())
}
