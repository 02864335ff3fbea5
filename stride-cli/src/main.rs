use std::path::PathBuf;

use anyhow::{Context, bail};
use chrono::{NaiveDate, NaiveTime};
use clap::{Parser, Subcommand};
use colored::*;
use url::Url;

use stride_api as api;
use stride_session::{
    IdentityPatch, Session, SessionConfig, SessionError, SessionState,
};

#[derive(Parser, Debug)]
#[command(name = "stride", author, version, about = "Career activity recommendations from your terminal", long_about = None)]
struct Args {
    /// Base URL of the Stride backend
    #[arg(long, env = "STRIDE_BASE_URL", default_value = "https://api.stride.example")]
    base_url: String,

    /// Path of the persisted session record
    #[arg(long, env = "STRIDE_SESSION_FILE")]
    session_file: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Complete a sign-in started in the browser by pasting the redirect URL
    Login {
        /// The full redirect URL (or just its #fragment)
        redirect: String,
    },
    /// Show the current session state
    Status,
    /// Show the signed-in identity
    Whoami,
    /// Ask for activity recommendations
    Recommend {
        /// Free-text query, e.g. "data internships for this summer"
        query: Vec<String>,
    },
    /// Show or finish your career profile
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },
    /// List or add schedule entries
    Schedule {
        #[command(subcommand)]
        action: ScheduleAction,
    },
    /// Sign out and clear the stored session
    Logout,
}

#[derive(Subcommand, Debug)]
enum ProfileAction {
    /// Show the stored profile
    Show,
    /// Save the profile and mark it complete
    Complete {
        #[arg(long)]
        education: Option<String>,
        /// May be given multiple times
        #[arg(long = "skill")]
        skills: Vec<String>,
        /// May be given multiple times
        #[arg(long = "experience")]
        experiences: Vec<String>,
        #[arg(long)]
        headline: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum ScheduleAction {
    /// List upcoming schedule entries
    List,
    /// Add an activity to the schedule
    Add {
        #[arg(long)]
        activity_id: String,
        /// Date in YYYY-MM-DD form
        #[arg(long)]
        date: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let base_url = Url::parse(&args.base_url)
        .with_context(|| format!("invalid base url: {}", args.base_url))?;
    let mut config = SessionConfig::new(base_url);
    if let Some(path) = args.session_file.clone().or_else(default_session_file) {
        tracing::debug!(path = %path.display(), "using session file");
        config = config.with_storage_path(path);
    }
    let session = Session::new(config)?;

    match args.command {
        Commands::Login { redirect } => login(&session, &redirect).await,
        Commands::Status => status(&session).await,
        Commands::Whoami => {
            ensure_signed_in(&session).await?;
            whoami(&session)
        }
        Commands::Recommend { query } => {
            ensure_signed_in(&session).await?;
            recommend(&session, &query.join(" ")).await
        }
        Commands::Profile { action } => {
            ensure_signed_in(&session).await?;
            profile(&session, action).await
        }
        Commands::Schedule { action } => {
            ensure_signed_in(&session).await?;
            schedule(&session, action).await
        }
        Commands::Logout => {
            session.logout().await;
            println!("{}", "Signed out.".green());
            Ok(())
        }
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn default_session_file() -> Option<PathBuf> {
    dirs::data_local_dir().map(|dir| dir.join("stride").join("session.json"))
}

/// Establish the session state, translating the degraded verify case
/// into a retry hint instead of a sign-in prompt.
async fn ensure_signed_in(session: &Session) -> anyhow::Result<()> {
    match session.initialize().await {
        Ok(SessionState::AuthenticatedComplete | SessionState::AuthenticatedIncomplete) => Ok(()),
        Ok(_) => bail!("not signed in - run `stride login <redirect-url>` first"),
        Err(e) if e.is_retryable() => {
            bail!("could not reach the backend ({e}); your session is untouched - try again")
        }
        Err(e) => Err(e.into()),
    }
}

async fn login(session: &Session, redirect: &str) -> anyhow::Result<()> {
    let state = session
        .login_from_redirect(redirect)
        .await
        .context("sign-in failed")?;

    match state {
        SessionState::AuthenticatedComplete => {
            println!("{}", "Signed in. You're all set.".green().bold());
        }
        SessionState::AuthenticatedIncomplete => {
            println!("{}", "Signed in.".green().bold());
            println!(
                "Your profile is not finished yet - run {} to get tailored recommendations.",
                "stride profile complete".cyan()
            );
        }
        other => println!("Session state: {other}"),
    }
    Ok(())
}

async fn status(session: &Session) -> anyhow::Result<()> {
    match session.initialize().await {
        Ok(state) => {
            println!("{} {}", "Session:".green(), state.to_string().cyan());
            if let Some(identity) = session.identity() {
                println!("{} {}", "Signed in as:".green(), identity.display_name.cyan());
            }
        }
        Err(e) if e.is_retryable() => {
            println!(
                "{} {}",
                "Backend unreachable:".yellow().bold(),
                "your session is untouched, try again in a moment.".yellow()
            );
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

fn whoami(session: &Session) -> anyhow::Result<()> {
    let Some(identity) = session.identity() else {
        bail!("no identity established");
    };
    println!("{} {}", "User:".green(), identity.display_name.cyan());
    println!("{} {}", "Id:".green(), identity.user_id.cyan());
    if let Some(email) = &identity.email {
        println!("{} {}", "Email:".green(), email.cyan());
    }
    if let Some(headline) = &identity.headline {
        println!("{} {}", "Headline:".green(), headline.cyan());
    }
    println!(
        "{} {}",
        "Profile:".green(),
        if identity.profile_complete {
            "complete".cyan()
        } else {
            "incomplete".yellow()
        }
    );
    Ok(())
}

async fn recommend(session: &Session, query: &str) -> anyhow::Result<()> {
    if query.trim().is_empty() {
        bail!("tell me what you're looking for, e.g. `stride recommend data internships`");
    }

    let identity = session.identity();
    let mut request = api::RecommendRequest::new(query);
    if let Some(identity) = &identity {
        request = request.for_user(&identity.user_id);
    }

    let dispatcher = session.dispatcher();
    let response = api::recommend(&dispatcher, &request)
        .await
        .map_err(friendly)?;

    if response.items.is_empty() {
        println!("No recommendations found for that query.");
        return Ok(());
    }

    for item in &response.items {
        println!("{}", item.activity.title.green().bold());
        if let Some(organization) = &item.activity.organization {
            println!("  {}", organization.cyan());
        }
        println!("  {}", item.reason);
        if let Some(url) = &item.activity.url {
            println!("  {}", url.blue());
        }
        println!();
    }
    Ok(())
}

async fn profile(session: &Session, action: ProfileAction) -> anyhow::Result<()> {
    let Some(identity) = session.identity() else {
        bail!("no identity established");
    };
    let dispatcher = session.dispatcher();

    match action {
        ProfileAction::Show => {
            let profile = api::fetch_profile(&dispatcher, &identity.user_id)
                .await
                .map_err(friendly)?;
            if let Some(education) = &profile.education {
                println!("{} {}", "Education:".green(), education.cyan());
            }
            if !profile.skills.is_empty() {
                println!("{} {}", "Skills:".green(), profile.skills.join(", ").cyan());
            }
            if !profile.experiences.is_empty() {
                println!(
                    "{} {}",
                    "Experience:".green(),
                    profile.experiences.join(", ").cyan()
                );
            }
            Ok(())
        }
        ProfileAction::Complete {
            education,
            skills,
            experiences,
            headline,
        } => {
            let upsert = api::UserProfileUpsert {
                education,
                skills,
                experiences,
                headline,
            };
            api::save_profile(&dispatcher, &identity.user_id, &upsert)
                .await
                .map_err(friendly)?;
            let state = session.complete_profile(IdentityPatch::completed()).await?;
            println!("{} ({state})", "Profile saved.".green().bold());
            Ok(())
        }
    }
}

async fn schedule(session: &Session, action: ScheduleAction) -> anyhow::Result<()> {
    let Some(identity) = session.identity() else {
        bail!("no identity established");
    };
    let dispatcher = session.dispatcher();

    match action {
        ScheduleAction::List => {
            let events = api::list_calendar_events(&dispatcher, &identity.user_id)
                .await
                .map_err(friendly)?;
            if events.is_empty() {
                println!("Nothing scheduled.");
                return Ok(());
            }
            for event in &events {
                println!(
                    "{}  {}",
                    event.start_at.format("%Y-%m-%d").to_string().cyan(),
                    event.title()
                );
            }
            Ok(())
        }
        ScheduleAction::Add { activity_id, date } => {
            let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
                .with_context(|| format!("invalid date: {date} (expected YYYY-MM-DD)"))?;
            let start_at = date.and_time(NaiveTime::MIN).and_utc();
            let event = api::CalendarEventUpsert {
                activity_id,
                start_at,
            };
            let created = api::create_calendar_event(&dispatcher, &identity.user_id, &event)
                .await
                .map_err(friendly)?;
            println!(
                "{} {} on {}",
                "Scheduled".green(),
                created.title().cyan(),
                created.start_at.format("%Y-%m-%d").to_string().cyan()
            );
            Ok(())
        }
    }
}

/// Translate session errors into user-facing guidance.
fn friendly(error: SessionError) -> anyhow::Error {
    match &error {
        SessionError::RefreshExhausted => {
            anyhow::anyhow!("your session expired - run `stride login` to sign in again")
        }
        SessionError::Unreachable(_) => {
            anyhow::anyhow!("could not reach the backend ({error}); try again in a moment")
        }
        _ => error.into(),
    }
}
