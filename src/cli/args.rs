//! CLI argument definitions.

use clap::{Parser, Subcommand};
use uuid::Uuid;

/// Users, matchings and the queued user deletion pipeline
#[derive(Parser, Debug)]
#[command(name = "matching-api")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP server
    Serve(ServeArgs),

    /// Run database migrations
    Migrate(MigrateArgs),

    /// Run or feed the user deletion pipeline
    Jobs(JobsArgs),
}

/// Arguments for the serve command
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Host to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0", env = "SERVER_HOST")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "3000", env = "SERVER_PORT")]
    pub port: u16,

    /// Also run the deletion worker inside the server process
    #[arg(long)]
    pub with_worker: bool,
}

/// Arguments for the migrate command
#[derive(Parser, Debug)]
pub struct MigrateArgs {
    #[command(subcommand)]
    pub action: MigrateAction,
}

/// Migration actions
#[derive(Subcommand, Debug)]
pub enum MigrateAction {
    /// Run pending migrations
    Up,
    /// Rollback last migration
    Down,
    /// Show migration status
    Status,
    /// Reset and re-run all migrations
    Fresh,
}

/// Arguments for the jobs command
#[derive(Parser, Debug)]
pub struct JobsArgs {
    #[command(subcommand)]
    pub action: JobsAction,
}

/// Deletion pipeline actions
#[derive(Subcommand, Debug)]
pub enum JobsAction {
    /// Poll the deletion queue until Ctrl+C
    Work,
    /// Queue one user for deletion
    EnqueueDeletion {
        /// ID of the user to delete
        user_id: Uuid,
    },
    /// Process a single batch and exit
    Drain {
        /// Messages to receive, clamped to 1..=10
        #[arg(short, long)]
        batch_size: Option<i64>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_enqueue_deletion() {
        let id = Uuid::now_v7();
        let cli = Cli::parse_from(["matching-api", "jobs", "enqueue-deletion", &id.to_string()]);

        match cli.command {
            Commands::Jobs(JobsArgs {
                action: JobsAction::EnqueueDeletion { user_id },
            }) => assert_eq!(user_id, id),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_rejects_malformed_user_id() {
        let parsed = Cli::try_parse_from(["matching-api", "jobs", "enqueue-deletion", "nope"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_verbose_is_global() {
        let cli = Cli::parse_from(["matching-api", "migrate", "status", "-v"]);
        assert!(cli.verbose);
    }
}
