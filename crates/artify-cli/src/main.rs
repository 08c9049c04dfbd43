// SPDX-License-Identifier: AGPL-3.0
// Artify CLI - Main entry point
//
// Command-line frontend over artify-core. Every subcommand maps to one
// session, gateway or library call.

use artify_core::{
    AppError, AppState, AuthStatus, ClientSettings, FileSecretStore, GatewayEvent, ImageRecord,
    OperationTable, ProfileUpdate, SettingsStore,
};
use clap::{Parser, Subcommand};
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "artify", version, about = "Edit images with the Artify service")]
struct Cli {
    /// Override the API origin for this invocation
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show whether a session is stored
    Status,
    /// Sign in with email and password
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Create an account
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        confirm: String,
        #[arg(long)]
        name: String,
    },
    /// Forget the stored session
    Logout,
    /// Show the signed-in user's profile
    Profile,
    /// Change name, email and password
    UpdateProfile {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        password: String,
    },
    /// Email a password reset code
    ResetRequest {
        #[arg(long)]
        email: String,
    },
    /// Set a new password with the emailed code
    Reset {
        #[arg(long)]
        email: String,
        #[arg(long)]
        code: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        confirm: String,
    },
    /// List every image in the library
    List,
    /// Most recent images first
    Recent {
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Favorite images
    Favorites,
    /// Processed outputs kept by the server
    History {
        /// Only the server's favorite outputs
        #[arg(long)]
        favorites: bool,
    },
    /// Upload local image files
    Upload {
        #[arg(required = true)]
        files: Vec<String>,
    },
    /// Available operations and their parameters
    Operations,
    /// Apply a named operation to an image
    Apply {
        operation: String,
        image_id: String,
        #[arg(allow_negative_numbers = true)]
        params: Vec<f64>,
    },
    /// Toggle the favorite flag of an image
    Favorite { image_id: String },
    /// Delete an image
    Delete { image_id: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("artify_cli=info,artify_core=info")
            }),
        )
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_settings(api_url: Option<String>) -> Result<ClientSettings, AppError> {
    let mut settings = SettingsStore::new()
        .map(|store| store.get())
        .unwrap_or_else(|e| {
            tracing::warn!("Using default settings: {}", e);
            ClientSettings::default()
        });

    if let Some(url) = api_url {
        settings.api_base_url = url;
    }
    settings.base_url()?;
    Ok(settings)
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let settings = load_settings(cli.api_url)?;
    let secrets = Arc::new(FileSecretStore::new()?);
    let state = AppState::new(settings, secrets)?;

    match cli.command {
        Command::Status => {
            match state.status() {
                AuthStatus::Authenticated => {
                    let name = state.session.cached_username().unwrap_or_default();
                    println!("signed in {}", name);
                }
                _ => println!("signed out"),
            }
            println!("api: {}", state.gateway.base_url());
        }
        Command::Login { email, password } => {
            state.login(&email, &password).await?;
            println!("signed in");
        }
        Command::Register {
            email,
            password,
            confirm,
            name,
        } => {
            state
                .session
                .register_confirmed(&state.gateway, &email, &password, &confirm, &name)
                .await?;
            println!("account created, signed in as {}", name);
        }
        Command::Logout => {
            state.logout()?;
            println!("signed out");
        }
        Command::Profile => {
            let profile = state.session.fetch_profile(&state.gateway).await?;
            println!("{} <{}>", profile.name, profile.email);
        }
        Command::UpdateProfile {
            email,
            name,
            password,
        } => {
            let update = ProfileUpdate {
                email,
                name,
                password,
            };
            state.session.update_profile(&state.gateway, &update).await?;
            println!("profile updated");
        }
        Command::ResetRequest { email } => {
            state
                .session
                .request_password_reset(&state.gateway, &email)
                .await?;
            println!("reset code sent to {}", email);
        }
        Command::Reset {
            email,
            code,
            password,
            confirm,
        } => {
            state
                .session
                .reset_password(&state.gateway, &email, &code, &password, &confirm)
                .await?;
            println!("password changed");
        }
        Command::List => {
            state.library.refresh().await?;
            print_records(&state.library.snapshot());
        }
        Command::Recent { limit } => {
            state.library.refresh().await?;
            let limit = limit.unwrap_or(state.settings.recent_limit);
            print_records(&state.library.recent(limit));
        }
        Command::Favorites => {
            state.library.refresh().await?;
            print_records(&state.library.favorites());
        }
        Command::History { favorites } => {
            let records = if favorites {
                state.gateway.favorite_processes().await?
            } else {
                state.gateway.recent_processes().await?
            };
            print_records(&records);
        }
        Command::Upload { files } => {
            let mut events = state.gateway.activity().subscribe();
            let report = state.library.upload(&files).await?;

            while let Ok(event) = events.try_recv() {
                if let GatewayEvent::UploadProgress {
                    index,
                    total,
                    uri,
                    id: Some(id),
                } = event
                {
                    println!("[{}/{}] {} -> {}", index + 1, total, uri, id);
                }
            }

            for failure in &report.failures {
                eprintln!("#{} {}: {}", failure.index, failure.uri, failure.error);
            }
            println!(
                "uploaded {} of {} file(s)",
                report.uploaded.len(),
                files.len()
            );
            if !report.is_complete() {
                return Err(AppError::Validation(format!(
                    "{} upload(s) failed",
                    report.failures.len()
                )));
            }
        }
        Command::Operations => {
            for kind in state.gateway.operations().kinds() {
                let params = kind.param_names().join(", ");
                println!("{:<20} {:<36} ({})", kind.slug(), kind.label(), params);
            }
        }
        Command::Apply {
            operation,
            image_id,
            params,
        } => {
            check_operation(state.gateway.operations(), &operation, &params)?;
            state.library.refresh().await?;
            let outcome = state.library.apply(&operation, &image_id, &params).await?;
            println!("created {}", outcome.id);
        }
        Command::Favorite { image_id } => {
            state.library.refresh().await?;
            let record = state.library.toggle_favorite(&image_id).await?;
            println!(
                "{} is {}",
                record.id,
                if record.is_favorite {
                    "a favorite"
                } else {
                    "no longer a favorite"
                }
            );
        }
        Command::Delete { image_id } => {
            state.library.refresh().await?;
            state.library.delete(&image_id).await?;
            println!("deleted {}", image_id);
        }
    }

    Ok(())
}

/// Bad names and parameter counts fail before any request
fn check_operation(table: &OperationTable, name: &str, params: &[f64]) -> Result<(), AppError> {
    table.resolve(name, params).map(|_| ())
}

fn print_records(records: &[ImageRecord]) {
    if records.is_empty() {
        println!("no images");
        return;
    }
    for record in records {
        println!(
            "{}  {:<9} {}  {:<10} {}",
            if record.is_favorite { "*" } else { " " },
            record.kind.label(),
            record.id,
            record.created_at_display,
            record.filename
        );
    }
}
