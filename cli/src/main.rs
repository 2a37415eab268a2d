mod auth;
mod commands;
mod config;
mod server;
mod tls;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::process;

use crate::commands::{
    cmd_entry_edit, cmd_entry_list, cmd_entry_log, cmd_entry_remove, cmd_goal_add, cmd_goal_edit,
    cmd_goal_list, cmd_goal_remove, cmd_import, cmd_profile_add, cmd_profile_list,
    cmd_profile_remove, cmd_profile_show, cmd_profile_update, cmd_progress,
};
use crate::config::Config;
use caliper_core::service::CaliperService;

#[derive(Parser)]
#[command(
    name = "caliper",
    version,
    about = "A simple body-measurement tracker CLI",
    long_about = "\n\n   ██████╗  █████╗  ██╗      ██╗ ██████╗  ███████╗ ██████╗
  ██╔════╝ ██╔══██╗ ██║      ██║ ██╔══██╗ ██╔════╝ ██╔══██╗
  ██║      ███████║ ██║      ██║ ██████╔╝ █████╗   ██████╔╝
  ██║      ██╔══██║ ██║      ██║ ██╔═══╝  ██╔══╝   ██╔══██╗
  ╚██████╗ ██║  ██║ ███████╗ ██║ ██║      ███████╗ ██║  ██║
   ╚═════╝ ╚═╝  ╚═╝ ╚══════╝ ╚═╝ ╚═╝      ╚══════╝ ╚═╝  ╚═╝
               know what you're made of.
"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage measurement profiles
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },
    /// Log and manage measurement entries
    Entry {
        #[command(subcommand)]
        command: EntryCommands,
    },
    /// Manage goals
    Goal {
        #[command(subcommand)]
        command: GoalCommands,
    },
    /// Show progress toward active goals
    Progress {
        /// Profile name or ID (default: the only profile)
        #[arg(short, long)]
        profile: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Import measurements from a CSV export
    Import {
        /// Path to the CSV file
        file: std::path::PathBuf,
        /// Profile name or ID (default: the only profile)
        #[arg(short, long)]
        profile: Option<String>,
        /// Preview import without making changes
        #[arg(long)]
        dry_run: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Start the REST API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
        /// Address to bind to (default: 127.0.0.1, use 0.0.0.0 to expose to network)
        #[arg(short, long, default_value = "127.0.0.1")]
        bind: String,
        /// Disable authentication; all requests act as the local account
        #[arg(long)]
        no_auth: bool,
        /// Enable TLS (HTTPS). Generates a self-signed certificate on first use.
        #[arg(long)]
        tls: bool,
        /// Path to TLS certificate file (PEM). Implies --tls.
        #[arg(long, value_name = "PATH")]
        tls_cert: Option<std::path::PathBuf>,
        /// Path to TLS private key file (PEM). Implies --tls.
        #[arg(long, value_name = "PATH")]
        tls_key: Option<std::path::PathBuf>,
    },
}

#[derive(Subcommand)]
enum ProfileCommands {
    /// Create a profile
    Add {
        /// Profile name
        name: String,
        /// Age in years
        #[arg(long)]
        age: Option<i64>,
        /// Sex: male, female, other (affects body-fat estimation)
        #[arg(long)]
        sex: Option<String>,
        /// Height in cm (affects body-fat estimation)
        #[arg(long)]
        height: Option<f64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List all profiles
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a profile
    Show {
        /// Profile name or ID
        profile: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Update a profile
    Update {
        /// Profile name or ID
        profile: String,
        /// New name
        #[arg(long)]
        name: Option<String>,
        /// New age in years
        #[arg(long)]
        age: Option<i64>,
        /// New sex: male, female, other
        #[arg(long)]
        sex: Option<String>,
        /// New height in cm
        #[arg(long)]
        height: Option<f64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove a profile and all its entries and goals
    Remove {
        /// Profile name or ID
        profile: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum EntryCommands {
    /// Log a measurement entry
    Log {
        /// Body weight in kg
        #[arg(short, long)]
        weight: f64,
        /// Neck circumference in cm
        #[arg(long)]
        neck: Option<f64>,
        /// Belly circumference in cm
        #[arg(long)]
        belly: Option<f64>,
        /// Hip circumference in cm
        #[arg(long)]
        hip: Option<f64>,
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Profile name or ID (default: the only profile)
        #[arg(short, long)]
        profile: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List entries, newest first
    List {
        /// Profile name or ID (default: the only profile)
        #[arg(short, long)]
        profile: Option<String>,
        /// Maximum number of entries to show
        #[arg(short, long)]
        limit: Option<u32>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Edit an entry
    Edit {
        /// Entry ID
        entry_id: i64,
        /// New weight in kg
        #[arg(short, long)]
        weight: Option<f64>,
        /// New neck circumference in cm
        #[arg(long)]
        neck: Option<f64>,
        /// New belly circumference in cm
        #[arg(long)]
        belly: Option<f64>,
        /// New hip circumference in cm
        #[arg(long)]
        hip: Option<f64>,
        /// New date (YYYY-MM-DD or today/yesterday/tomorrow)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove an entry
    Remove {
        /// Entry ID
        entry_id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum GoalCommands {
    /// Add a goal (at least one target required)
    Add {
        /// Target weight in kg
        #[arg(long)]
        weight: Option<f64>,
        /// Target body-fat percentage
        #[arg(long)]
        fat: Option<f64>,
        /// Target muscle mass in kg
        #[arg(long)]
        muscle: Option<f64>,
        /// Target date (YYYY-MM-DD, default: 30 days from today)
        #[arg(long)]
        date: Option<String>,
        /// Start date for progress tracking (default: goal creation date)
        #[arg(long)]
        start: Option<String>,
        /// Free-form description
        #[arg(long)]
        describe: Option<String>,
        /// Profile name or ID (default: the only profile)
        #[arg(short, long)]
        profile: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List goals in target-date order
    List {
        /// Profile name or ID (default: the only profile)
        #[arg(short, long)]
        profile: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Edit a goal
    Edit {
        /// Goal ID
        goal_id: i64,
        /// New target weight in kg
        #[arg(long)]
        weight: Option<f64>,
        /// New target body-fat percentage
        #[arg(long)]
        fat: Option<f64>,
        /// New target muscle mass in kg
        #[arg(long)]
        muscle: Option<f64>,
        /// New target date (YYYY-MM-DD or today/yesterday/tomorrow)
        #[arg(long)]
        date: Option<String>,
        /// New start date (YYYY-MM-DD)
        #[arg(long)]
        start: Option<String>,
        /// New description
        #[arg(long)]
        describe: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove a goal
    Remove {
        /// Goal ID
        goal_id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

#[allow(clippy::too_many_lines)]
async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let svc = CaliperService::new(&config.db_path)?;
    let account = svc.ensure_account("local")?;

    match cli.command {
        Commands::Profile { command } => match command {
            ProfileCommands::Add {
                name,
                age,
                sex,
                height,
                json,
            } => cmd_profile_add(&svc, account.id, &name, age, sex, height, json),
            ProfileCommands::List { json } => cmd_profile_list(&svc, account.id, json),
            ProfileCommands::Show { profile, json } => {
                cmd_profile_show(&svc, account.id, &profile, json)
            }
            ProfileCommands::Update {
                profile,
                name,
                age,
                sex,
                height,
                json,
            } => cmd_profile_update(&svc, account.id, &profile, name, age, sex, height, json),
            ProfileCommands::Remove { profile, json } => {
                cmd_profile_remove(&svc, account.id, &profile, json)
            }
        },
        Commands::Entry { command } => match command {
            EntryCommands::Log {
                weight,
                neck,
                belly,
                hip,
                date,
                profile,
                json,
            } => cmd_entry_log(
                &svc,
                account.id,
                profile.as_deref(),
                weight,
                neck,
                belly,
                hip,
                date,
                json,
            ),
            EntryCommands::List {
                profile,
                limit,
                json,
            } => cmd_entry_list(&svc, account.id, profile.as_deref(), limit, json),
            EntryCommands::Edit {
                entry_id,
                weight,
                neck,
                belly,
                hip,
                date,
                json,
            } => cmd_entry_edit(
                &svc, account.id, entry_id, weight, neck, belly, hip, date, json,
            ),
            EntryCommands::Remove { entry_id, json } => {
                cmd_entry_remove(&svc, account.id, entry_id, json)
            }
        },
        Commands::Goal { command } => match command {
            GoalCommands::Add {
                weight,
                fat,
                muscle,
                date,
                start,
                describe,
                profile,
                json,
            } => cmd_goal_add(
                &svc,
                account.id,
                profile.as_deref(),
                weight,
                fat,
                muscle,
                date,
                start,
                describe,
                json,
            ),
            GoalCommands::List { profile, json } => {
                cmd_goal_list(&svc, account.id, profile.as_deref(), json)
            }
            GoalCommands::Edit {
                goal_id,
                weight,
                fat,
                muscle,
                date,
                start,
                describe,
                json,
            } => cmd_goal_edit(
                &svc, account.id, goal_id, weight, fat, muscle, date, start, describe, json,
            ),
            GoalCommands::Remove { goal_id, json } => {
                cmd_goal_remove(&svc, account.id, goal_id, json)
            }
        },
        Commands::Progress { profile, json } => {
            cmd_progress(&svc, account.id, profile.as_deref(), json)
        }
        Commands::Import {
            file,
            profile,
            dry_run,
            json,
        } => cmd_import(&svc, account.id, profile.as_deref(), &file, dry_run, json),
        Commands::Serve {
            port,
            bind,
            no_auth,
            tls,
            tls_cert,
            tls_key,
        } => {
            let tls_config = if tls || tls_cert.is_some() || tls_key.is_some() {
                let cert_path = tls_cert.map_or_else(tls::default_cert_path, Ok)?;
                let key_path = tls_key.map_or_else(tls::default_key_path, Ok)?;
                Some(server::TlsConfig {
                    cert_path,
                    key_path,
                })
            } else {
                None
            };
            server::start_server(svc, port, &bind, no_auth, tls_config).await
        }
    }
}
