//! retiscan - diabetic retinopathy screening client
//!
//! Terminal front end over the session store, the upload/analyze flow and
//! the history views. Notices go to stderr, cards to stdout.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use retiscan_common::config::{AppConfig, BackendMode, Overrides};
use retiscan_common::events::{AppEvent, Route};
use retiscan_common::PredictionId;
use retiscan_ui::flow::reveal::DEFAULT_REVEAL_INTERVAL;
use retiscan_ui::flow::{AnalysisOutcome, SaveOutcome};
use retiscan_ui::render;
use retiscan_ui::session::{Credentials, OAuthProvider, Profile, SignUpForm, SignUpOutcome};
use retiscan_ui::Services;
use std::io::Write;
use std::path::PathBuf;
use tokio::sync::broadcast;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "retiscan")]
#[command(about = "Retina image screening client for diabetic retinopathy")]
#[command(version)]
struct Cli {
    /// Config file (default: <config dir>/retiscan/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Folder holding the local database and saved session
    #[arg(long, global = true)]
    root_folder: Option<PathBuf>,

    /// Prediction service base URL
    #[arg(long, global = true)]
    predict_url: Option<String>,

    /// `hosted` or `local`
    #[arg(long, global = true)]
    backend: Option<BackendMode>,

    /// trace, debug, info, warn or error (RUST_LOG wins)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an account
    Signup {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        confirm_password: String,
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
    },
    /// Sign in with email and password
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Print the URL for signing in with a social provider
    LoginProvider {
        #[arg(long)]
        provider: String,
    },
    /// Finish social sign-in with the returned access token
    LoginToken {
        #[arg(long)]
        access_token: String,
        #[arg(long)]
        refresh_token: Option<String>,
    },
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Analyze a retina image
    Analyze {
        file: PathBuf,
        /// Save the result to history
        #[arg(long)]
        save: bool,
        /// Print the explanation at once
        #[arg(long)]
        no_reveal: bool,
    },
    /// List saved predictions, newest first
    History,
    /// Show one saved prediction
    Show { id: String },
    /// Delete a saved prediction (cannot be undone)
    Delete {
        id: String,
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
}

fn init_tracing(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Print pending notices; returns the last navigation request, if any
fn drain_events(rx: &mut broadcast::Receiver<AppEvent>) -> Option<Route> {
    let mut route = None;
    loop {
        match rx.try_recv() {
            Ok(AppEvent::Notice(notice)) => eprintln!("{}", render::notice_line(&notice)),
            Ok(AppEvent::Navigate(next)) => route = Some(next),
            Ok(_) => {}
            Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
    if route == Some(Route::Login) {
        eprintln!("Sign in first: retiscan login --email <EMAIL> --password <PASSWORD>");
    }
    route
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let overrides = Overrides {
        config_path: cli.config.clone(),
        root_folder: cli.root_folder.clone(),
        predict_url: cli.predict_url.clone(),
        backend_mode: cli.backend,
        log_level: cli.log_level.clone(),
        ..Default::default()
    };
    let config = AppConfig::resolve(&overrides);

    let level = match &config {
        Ok(config) => config.log_level.clone(),
        Err(_) => cli.log_level.clone().unwrap_or_else(|| "info".to_string()),
    };
    init_tracing(&level);

    info!(
        "Starting retiscan v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let config = config.context("Failed to resolve configuration")?;
    info!("Root folder: {}", config.root_folder.display());

    let services = Services::start(config).await.context("Failed to start services")?;
    let mut events = services.events.subscribe();

    let result = run(cli.command, &services, &mut events).await;
    drain_events(&mut events);
    result
}

async fn run(
    command: Command,
    services: &Services,
    events: &mut broadcast::Receiver<AppEvent>,
) -> Result<()> {
    let session = &services.session;

    match command {
        Command::Signup { email, password, confirm_password, first_name, last_name } => {
            let form = SignUpForm {
                credentials: Credentials::new(email, password),
                confirm_password,
                profile: Profile { first_name, last_name },
            };
            match session.sign_up(&form).await? {
                SignUpOutcome::SignedIn(s) => {
                    println!("Account created. Signed in as {}", s.user.email.as_deref().unwrap_or(&s.user.id));
                }
                SignUpOutcome::ConfirmationPending { email } => {
                    println!("Account created. Check {} for a confirmation link, then log in.", email);
                }
            }
        }

        Command::Login { email, password } => {
            let s = session.sign_in(&Credentials::new(email, password)).await?;
            println!("Signed in as {}", s.user.email.as_deref().unwrap_or(&s.user.id));
        }

        Command::LoginProvider { provider } => {
            let provider: OAuthProvider = provider.parse()?;
            let redirect = session.sign_in_with_provider(provider)?;
            println!("Open this URL to sign in with {}:", redirect.provider);
            println!("  {}", redirect.url);
            println!("Then run: retiscan login-token --access-token <TOKEN>");
        }

        Command::LoginToken { access_token, refresh_token } => {
            let s = session.complete_provider_sign_in(&access_token, refresh_token).await?;
            println!("Signed in as {}", s.user.email.as_deref().unwrap_or(&s.user.id));
        }

        Command::Logout => {
            session.sign_out().await?;
            println!("Signed out");
        }

        Command::Whoami => match session.user() {
            Some(user) => println!(
                "{} ({}) via {} backend",
                user.email.as_deref().unwrap_or("<no email>"),
                user.id,
                session.provider_name()
            ),
            None => println!("Not signed in"),
        },

        Command::Analyze { file, save, no_reveal } => {
            analyze(services, events, file, save, no_reveal).await?;
        }

        Command::History => {
            let entries = match services.history().list().await {
                Ok(entries) => entries,
                Err(e) => {
                    drain_events(events);
                    return Err(e.into());
                }
            };
            print!("{}", render::history_list(&entries));
        }

        Command::Show { id } => {
            let detail = services.history().detail(&PredictionId::new(id)).await;
            drain_events(events);
            print!("{}", render::detail_card(&detail?));
        }

        Command::Delete { id, yes } => {
            if !yes {
                bail!("Deleting a prediction cannot be undone; pass --yes to confirm");
            }
            services.history().delete(&PredictionId::new(id)).await?;
        }
    }

    Ok(())
}

async fn analyze(
    services: &Services,
    events: &mut broadcast::Receiver<AppEvent>,
    file: PathBuf,
    save: bool,
    no_reveal: bool,
) -> Result<()> {
    let controller = services.upload_controller();

    let selected = controller.select_file(&file).await;
    drain_events(events);
    selected.with_context(|| format!("Cannot use {}", file.display()))?;

    eprintln!("Analyzing {} ...", file.display());
    let outcome = controller.start_analysis().await;
    drain_events(events);
    let result = match outcome? {
        AnalysisOutcome::Complete(result) => result,
        AnalysisOutcome::Ignored | AnalysisOutcome::Discarded => return Ok(()),
    };

    let state = controller.state();
    if let Some(image) = state.image() {
        print!("{}", render::result_card(image, &result));
    }

    println!();
    match controller.reveal_explanation(DEFAULT_REVEAL_INTERVAL) {
        Some(frames) if !no_reveal => {
            let mut stdout = std::io::stdout();
            let mut shown = 0;
            let mut frames = Box::pin(frames);
            while let Some(frame) = frames.next().await {
                write!(stdout, "{}", &frame[shown..])?;
                stdout.flush()?;
                shown = frame.len();
            }
            writeln!(stdout)?;
        }
        _ => println!("{}", result.explanation),
    }

    if !save {
        return Ok(());
    }

    let saved = controller.save().await;
    let route = drain_events(events);
    if let SaveOutcome::Saved(record) = saved? {
        if route == Some(Route::PredictionDetail(record.id.clone())) {
            println!();
            let detail = services.history().detail(&record.id).await;
            drain_events(events);
            print!("{}", render::detail_card(&detail?));
        }
    }

    Ok(())
}
