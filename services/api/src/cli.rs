use crate::demo::{run_demo, DemoArgs};
use crate::infra::{open_store, parse_role, parse_student_type};
use crate::server;
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use skill_portal::auth::TokenAuthority;
use skill_portal::config::AppConfig;
use skill_portal::domain::{ExternalIdentity, Role, StudentType};
use skill_portal::error::AppError;
use skill_portal::workflows::SkillPortal;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(
    name = "Skill Portal",
    about = "Run and administer the academic skill portal from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Create or update an account and print a bearer token for it
    ProvisionUser(ProvisionArgs),
    /// Run an in-memory walkthrough of a skill from budget to assessment
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

#[derive(Args, Debug)]
pub(crate) struct ProvisionArgs {
    /// Institutional e-mail address of the account
    #[arg(long)]
    pub(crate) email: String,
    /// Display name
    #[arg(long)]
    pub(crate) name: String,
    /// Identity-provider subject; derived from the e-mail when omitted
    #[arg(long)]
    pub(crate) google_id: Option<String>,
    /// student, faculty or skillTeam
    #[arg(long, value_parser = parse_role)]
    pub(crate) role: Role,
    /// dayScholar or hosteller; students only
    #[arg(long, value_parser = parse_student_type)]
    pub(crate) student_type: Option<StudentType>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::ProvisionUser(args) => provision_user(args),
        Command::Demo(args) => run_demo(args),
    }
}

fn provision_user(args: ProvisionArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    if args.role == Role::Student && args.student_type.is_none() {
        return Err(AppError::BadRequest(
            "--student-type is required for student accounts".to_string(),
        ));
    }

    let store = Arc::new(open_store(&config.storage)?);
    let portal = SkillPortal::new(store, config.workflow.clone());
    let tokens = TokenAuthority::new(config.auth.jwt_secret.as_bytes(), config.auth.token_ttl());

    let now = Utc::now();
    let google_id = args
        .google_id
        .unwrap_or_else(|| format!("local-{}", args.email.trim().to_lowercase()));
    let user = portal.identity().provision_with_role(
        ExternalIdentity {
            google_id,
            email: args.email,
            name: args.name,
        },
        args.role,
        args.student_type,
        now,
    )?;
    let token = tokens.issue(&user, now)?;

    let output = json!({ "user": user, "token": token });
    let rendered = serde_json::to_string_pretty(&output).map_err(std::io::Error::from)?;
    println!("{rendered}");
    Ok(())
}
