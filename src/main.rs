use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use cactus_upload::{
    app::{select_view, View, APP_TITLE},
    auth::{EnvCredentialProvider, IdentityProvider, StaticCredentialProvider},
    client::UploadClient,
    config::AppConfig,
    file::{Preview, SelectedFile},
    notify::{ConsoleNotifier, Notice, Notifier},
    session::{FileSessionStore, Session},
    workflow::{UploadOutcome, UploadWorkflow},
};
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cactus", about = APP_TITLE)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in with a credential from the identity provider
    Login {
        /// Credential to sign in with. Read from CACTUS_ID_TOKEN when omitted.
        #[arg(long)]
        credential: Option<String>,
    },
    /// Forget the stored credential
    Logout,
    /// Show the signed in profile
    Whoami,
    /// Show how a file would be previewed
    Preview { file: PathBuf },
    /// Upload a file
    Upload {
        file: PathBuf,
        /// Free text stored with the file
        #[arg(long, default_value = "")]
        location: String,
    },
}

#[tokio::main]
async fn main() {
    dotenv().ok();
    init_tracing();

    match app_main().await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(err) => {
            error!(?err, "application error");
            std::process::exit(1);
        }
    }
}

async fn app_main() -> Result<bool> {
    let cli = Cli::parse();
    let config = AppConfig::from_env();
    let store = Arc::new(FileSessionStore::new(&config.data_dir));
    let mut session = Session::restore(store);
    let notifier = ConsoleNotifier;

    match cli.command {
        Command::Login { credential } => {
            let provider: Box<dyn IdentityProvider> = match credential {
                Some(credential) => Box::new(StaticCredentialProvider::new(credential)),
                None => match EnvCredentialProvider::try_new(EnvCredentialProvider::DEFAULT_VAR) {
                    Ok(provider) => Box::new(provider),
                    Err(err) => {
                        notifier.notify(Notice::LoginFailed(err.to_string()));
                        return Ok(false);
                    }
                },
            };
            match session.sign_in(provider.as_ref(), &config.google_client_id).await {
                Ok(profile) => {
                    println!("Signed in as {} <{}>", profile.name, profile.email);
                    Ok(true)
                }
                Err(err) => {
                    notifier.notify(Notice::LoginFailed(err.to_string()));
                    Ok(false)
                }
            }
        }
        Command::Logout => {
            session.logout().context("failed to remove the stored session")?;
            println!("Signed out");
            Ok(true)
        }
        Command::Whoami => {
            match session.profile() {
                Some(profile) => {
                    println!("{} <{}>", profile.name, profile.email);
                    if !profile.picture.is_empty() {
                        println!("picture: {}", profile.picture);
                    }
                    println!("expires: {}", profile.expires_at);
                }
                None => println!("Not signed in"),
            }
            Ok(true)
        }
        Command::Preview { file } => {
            let file = SelectedFile::open(&file)
                .with_context(|| format!("cannot open {}", file.display()))?;
            print_preview(&file, &Preview::for_file(&file));
            Ok(true)
        }
        Command::Upload { file, location } => {
            session.check_expiry();
            if select_view(&config, &session) == View::Login {
                eprintln!("{APP_TITLE}: sign in with `cactus login` before uploading");
                return Ok(false);
            }

            let selected = SelectedFile::open(&file)
                .with_context(|| format!("cannot open {}", file.display()))?;
            let client = UploadClient::from_config(&config)
                .with_credential(session.credential().map(str::to_string));

            let mut workflow = UploadWorkflow::new();
            workflow.select(selected);
            workflow.set_location(location);
            if let Some(preview) = workflow.preview() {
                if let Some(selected) = workflow.file() {
                    print_preview(selected, preview);
                }
            }

            println!("Uploading...");
            match workflow.upload(&client, &notifier).await {
                UploadOutcome::Succeeded => Ok(true),
                UploadOutcome::Failed(err) => {
                    eprintln!("{err}");
                    Ok(false)
                }
                UploadOutcome::Skipped => Ok(false),
            }
        }
    }
}

fn print_preview(file: &SelectedFile, preview: &Preview) {
    println!("{} ({} bytes, {})", file.name(), file.size(), display_type(file));
    match (&preview.glyph, preview.is_zoomable()) {
        (_, true) => println!("preview: {}", preview.url),
        (Some(glyph), false) => println!("[{}] {}", glyph.icon, preview.caption),
        (None, false) => println!("{}", preview.caption),
    }
}

fn display_type(file: &SelectedFile) -> &str {
    if file.content_type().is_empty() {
        "unknown type"
    } else {
        file.content_type()
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}
