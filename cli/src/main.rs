use std::path::{Path, PathBuf};
use std::rc::Rc;

use brainmapper::app::AppContext;
use brainmapper::config::{
    ClientConfig, ConfigError, DEFAULT_API_BASE_URL, DEFAULT_CONNECT_TIMEOUT_SECS, Timeouts, parse_threshold,
};
use brainmapper::events::ClientEvent;
use brainmapper::net::api::{Upload, content_type_for};
use brainmapper::net::client::ApiError;
use brainmapper::net::transport::TransportError;
use brainmapper::net::types::{
    AuditEntry, AuditLogQuery, Credentials, Grouping, NewScene, NewUser, PasswordChange, ProfileUpdate, Registration,
};
use brainmapper::router::{NavigationOutcome, RouterError};
use brainmapper::state::auth::SessionError;
use brainmapper::state::backend::DEFAULT_SERVER_ERROR_THRESHOLD;
use brainmapper::state::metadata::{MetadataError, class_count_summary, detected_boxes};
use brainmapper::storage::{FileStore, StorageError};
use clap::{ArgAction, Args, Parser, Subcommand};
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("session error: {0}")]
    Session(#[from] SessionError),
    #[error(transparent)]
    Router(#[from] RouterError),
    #[error(transparent)]
    Metadata(#[from] MetadataError),
    #[error("login rejected: wrong email or password")]
    LoginRejected,
    #[error("registration was not accepted")]
    RegistrationRejected,
    #[error("refusing to delete the account without --yes")]
    NotConfirmed,
    #[error("not logged in; run `brainmapper login` first")]
    NotLoggedIn,
    #[error("failed to read {path}: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "brainmapper", about = "Brain Mapper platform client")]
struct Cli {
    #[arg(long, env = "BRAINMAPPER_API_BASE_URL", default_value = DEFAULT_API_BASE_URL)]
    base_url: String,

    #[arg(long, env = "BRAINMAPPER_REQUEST_TIMEOUT_SECS")]
    request_timeout_secs: Option<u64>,

    #[arg(long, env = "BRAINMAPPER_CONNECT_TIMEOUT_SECS", default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS)]
    connect_timeout_secs: u64,

    #[arg(
        long,
        env = "BRAINMAPPER_SERVER_ERROR_THRESHOLD",
        default_value_t = DEFAULT_SERVER_ERROR_THRESHOLD,
        value_parser = parse_threshold
    )]
    server_error_threshold: u32,

    #[arg(long, env = "BRAINMAPPER_STATE_FILE", default_value = ".brainmapper/state.json")]
    state_file: PathBuf,

    /// Raise log level to debug.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "BRAINMAPPER_PASSWORD", hide_env_values = true)]
        password: String,
    },
    Logout,
    /// Backend reachability and session state.
    Status,
    Whoami,
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "BRAINMAPPER_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Run guarded navigations in order and print where each one lands.
    Navigate {
        #[arg(required = true)]
        paths: Vec<String>,
    },
    Scenes(ScenesCommand),
    Inference(InferenceCommand),
    Models(ModelsCommand),
    Metrics(MetricsCommand),
    Admin(AdminCommand),
    Profile(ProfileCommand),
    Audit(AuditCommand),
}

#[derive(Args, Debug)]
struct ScenesCommand {
    #[command(subcommand)]
    command: ScenesSubcommand,
}

#[derive(Subcommand, Debug)]
enum ScenesSubcommand {
    Presign,
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        image_url: String,
        #[arg(long)]
        map_url: String,
    },
    /// Upload image and map files, then register the scene.
    Upload {
        #[arg(long)]
        name: String,
        #[arg(long)]
        image: PathBuf,
        #[arg(long)]
        map: PathBuf,
    },
    List,
    Delete {
        scene_id: i64,
    },
}

#[derive(Args, Debug)]
struct InferenceCommand {
    #[command(subcommand)]
    command: InferenceSubcommand,
}

#[derive(Subcommand, Debug)]
enum InferenceSubcommand {
    Run {
        #[arg(long)]
        file: PathBuf,
    },
    /// Detections for one inference, with normalized boxes and class counts.
    Metadata {
        inference_id: i64,
        /// Include every detected box in the output.
        #[arg(long)]
        boxes: bool,
    },
}

#[derive(Args, Debug)]
struct ModelsCommand {
    #[command(subcommand)]
    command: ModelsSubcommand,
}

#[derive(Subcommand, Debug)]
enum ModelsSubcommand {
    List,
}

#[derive(Args, Debug)]
struct MetricsCommand {
    #[command(subcommand)]
    command: MetricsSubcommand,
}

#[derive(Subcommand, Debug)]
enum MetricsSubcommand {
    Summary,
    ClassDetections,
    TimeSeries {
        #[arg(long, default_value = "day")]
        grouping: Grouping,
        #[arg(long, default_value_t = 30)]
        days: u32,
    },
}

#[derive(Args, Debug)]
struct AdminCommand {
    #[command(subcommand)]
    command: AdminSubcommand,
}

#[derive(Subcommand, Debug)]
enum AdminSubcommand {
    Users,
    Roles,
    SetRole {
        user_id: i64,
        role_id: i64,
    },
    DeleteUser {
        user_id: i64,
    },
    Stats {
        user_id: i64,
    },
    AddUser {
        #[arg(long)]
        name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "BRAINMAPPER_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long)]
        role_id: i64,
    },
}

#[derive(Args, Debug)]
struct ProfileCommand {
    #[command(subcommand)]
    command: ProfileSubcommand,
}

#[derive(Subcommand, Debug)]
enum ProfileSubcommand {
    Stats,
    Inferences {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 20)]
        limit: u32,
        /// Show a single inference instead of a page.
        #[arg(long)]
        id: Option<i64>,
    },
    Update {
        #[arg(long)]
        name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        email: String,
    },
    ChangePassword {
        #[arg(long, env = "BRAINMAPPER_PASSWORD", hide_env_values = true)]
        current: String,
        #[arg(long, env = "BRAINMAPPER_NEW_PASSWORD", hide_env_values = true)]
        new: String,
    },
    DeleteAccount {
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Args, Debug)]
struct AuditCommand {
    #[command(subcommand)]
    command: AuditSubcommand,
}

#[derive(Subcommand, Debug)]
enum AuditSubcommand {
    Logs {
        #[arg(long)]
        page: Option<u32>,
        #[arg(long)]
        per_page: Option<u32>,
        #[arg(long)]
        action: Option<String>,
        #[arg(long)]
        entity_type: Option<String>,
        #[arg(long)]
        user_id: Option<i64>,
    },
    Show {
        log_id: i64,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = ClientConfig {
        api_base_url: cli.base_url.trim_end_matches('/').to_owned(),
        timeouts: Timeouts { request_secs: cli.request_timeout_secs, connect_secs: cli.connect_timeout_secs },
        server_error_threshold: cli.server_error_threshold,
    };
    let storage = Rc::new(FileStore::open(&cli.state_file)?);
    let ctx = AppContext::native(config, storage)?;
    ctx.auth.subscribe_session_expired(|| tracing::warn!("session expired; log in again"));
    ctx.events.on(ClientEvent::ServerError, || tracing::warn!("backend did not respond"));

    match cli.command {
        Command::Login { email, password } => run_login(&ctx, email, password).await,
        Command::Logout => run_logout(&ctx).await,
        Command::Status => run_status(&ctx).await,
        Command::Whoami => run_whoami(&ctx).await,
        Command::Register { name, last_name, email, password } => {
            let registration = Registration { name, last_name, email, passwd: password };
            if !ctx.auth.register(&registration).await {
                return Err(CliError::RegistrationRejected);
            }
            print_json(&json!({ "registered": registration.email }))
        }
        Command::Navigate { paths } => run_navigate(&ctx, &paths).await,
        Command::Scenes(scenes) => run_scenes(&ctx, scenes).await,
        Command::Inference(inference) => run_inference(&ctx, inference).await,
        Command::Models(models) => match models.command {
            ModelsSubcommand::List => {
                require_session(&ctx).await?;
                let models = ctx.platform.models().await?;
                let labelled: Vec<Value> = models.iter().map(|m| json!({ "id": m.id, "label": m.label() })).collect();
                print_json(&Value::Array(labelled))
            }
        },
        Command::Metrics(metrics) => run_metrics(&ctx, metrics).await,
        Command::Admin(admin) => run_admin(&ctx, admin).await,
        Command::Profile(profile) => run_profile(&ctx, profile).await,
        Command::Audit(audit) => run_audit(&ctx, audit).await,
    }
}

fn init_tracing(verbose: u8) {
    let filter = if verbose > 0 {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

/// Restore the persisted session and fail unless it is still valid.
async fn require_session(ctx: &AppContext) -> Result<(), CliError> {
    ctx.auth.bootstrap_session().await?;
    if !ctx.auth.is_session_active() {
        return Err(CliError::NotLoggedIn);
    }
    Ok(())
}

async fn run_login(ctx: &AppContext, email: String, password: String) -> Result<(), CliError> {
    if !ctx.auth.login(&Credentials::new(email, password)).await? {
        return Err(CliError::LoginRejected);
    }
    print_session(ctx)
}

async fn run_logout(ctx: &AppContext) -> Result<(), CliError> {
    if let Err(e) = ctx.auth.bootstrap_session().await {
        tracing::warn!(error = %e, "could not restore session before logout");
    }
    let confirmed = ctx.auth.logout().await;
    print_json(&json!({ "loggedOut": true, "serverConfirmed": confirmed }))
}

async fn run_status(ctx: &AppContext) -> Result<(), CliError> {
    ctx.csrf.initialize().await;
    let bootstrap = ctx.auth.bootstrap_session().await;
    if let Err(e) = &bootstrap {
        tracing::warn!(error = %e, "session bootstrap failed");
        ctx.backend.mark_unavailable();
    }
    let session = ctx.auth.session();
    print_json(&json!({
        "apiBaseUrl": ctx.api.base_url(),
        "backendAvailable": ctx.backend.is_available(),
        "csrfToken": ctx.csrf.token().is_some(),
        "loggedIn": session.active,
        "user": session.user_name,
        "role": session.role.map(|r| r.to_string()),
    }))
}

async fn run_whoami(ctx: &AppContext) -> Result<(), CliError> {
    require_session(ctx).await?;
    print_session(ctx)
}

async fn run_navigate(ctx: &AppContext, paths: &[String]) -> Result<(), CliError> {
    let mut results = Vec::with_capacity(paths.len());
    for (index, path) in paths.iter().enumerate() {
        let outcome = if index == 0 { ctx.start(path).await? } else { ctx.router.navigate(path).await? };
        results.push(match outcome {
            NavigationOutcome::Completed { path: landed, redirects } => {
                json!({ "requested": path, "landed": landed, "redirects": redirects })
            }
            NavigationOutcome::Superseded => json!({ "requested": path, "superseded": true }),
        });
    }
    print_json(&Value::Array(results))
}

async fn run_scenes(ctx: &AppContext, scenes: ScenesCommand) -> Result<(), CliError> {
    require_session(ctx).await?;
    match scenes.command {
        ScenesSubcommand::Presign => print_json(&serde_json::to_value(ctx.platform.scene_presigned_urls().await?)?),
        ScenesSubcommand::Add { name, image_url, map_url } => {
            let reply = ctx.platform.add_scene(&NewScene { name, image_url, map_url }).await?;
            print_json(&serde_json::to_value(reply)?)
        }
        ScenesSubcommand::Upload { name, image, map } => {
            let image = read_upload(&image)?;
            let map = read_upload(&map)?;
            let scene = ctx.platform.upload_scene(&name, &image, &map).await?;
            print_json(&serde_json::to_value(scene)?)
        }
        ScenesSubcommand::List => print_json(&serde_json::to_value(ctx.platform.user_scenes().await?)?),
        ScenesSubcommand::Delete { scene_id } => {
            print_json(&serde_json::to_value(ctx.platform.delete_scene(scene_id).await?)?)
        }
    }
}

async fn run_inference(ctx: &AppContext, inference: InferenceCommand) -> Result<(), CliError> {
    require_session(ctx).await?;
    match inference.command {
        InferenceSubcommand::Run { file } => {
            let upload = read_upload(&file)?;
            let result = ctx.platform.run_inference(&upload).await?;
            let entry = AuditEntry::new("INFERENCE_CREATED", "INFERENCE")
                .details(json!({ "name": upload.file_name, "generatedImgUrl": result.generated_img_url }));
            ctx.platform.log_audit(&entry).await;
            print_json(&serde_json::to_value(result)?)
        }
        InferenceSubcommand::Metadata { inference_id, boxes } => {
            let metadata = ctx.metadata.fetch(inference_id, false).await?;
            let detected = detected_boxes(inference_id, &metadata);
            let mut out = json!({
                "inferenceId": inference_id,
                "detections": detected.len(),
                "averageConfidence": ctx.metadata.cached_confidence(inference_id),
                "classCounts": class_count_summary(&detected),
            });
            if boxes {
                out["boxes"] = serde_json::to_value(&detected)?;
            }
            print_json(&out)
        }
    }
}

async fn run_profile(ctx: &AppContext, profile: ProfileCommand) -> Result<(), CliError> {
    require_session(ctx).await?;
    let value = match profile.command {
        ProfileSubcommand::Stats => serde_json::to_value(ctx.platform.my_stats().await?)?,
        ProfileSubcommand::Inferences { id: Some(id), .. } => serde_json::to_value(ctx.platform.my_inference(id).await?)?,
        ProfileSubcommand::Inferences { page, limit, id: None } => {
            serde_json::to_value(ctx.platform.my_inferences(page, limit).await?)?
        }
        ProfileSubcommand::Update { name, last_name, email } => {
            let reply = ctx.platform.update_profile(&ProfileUpdate { name, last_name, email }).await?;
            serde_json::to_value(reply)?
        }
        ProfileSubcommand::ChangePassword { current, new } => {
            let change = PasswordChange { current_password: current, new_password: new };
            serde_json::to_value(ctx.platform.change_password(&change).await?)?
        }
        ProfileSubcommand::DeleteAccount { yes } => {
            if !yes {
                return Err(CliError::NotConfirmed);
            }
            let reply = ctx.platform.delete_account().await?;
            // The server already closed every session; this only clears local state.
            ctx.auth.logout().await;
            serde_json::to_value(reply)?
        }
    };
    print_json(&value)
}

async fn run_audit(ctx: &AppContext, audit: AuditCommand) -> Result<(), CliError> {
    require_session(ctx).await?;
    let value = match audit.command {
        AuditSubcommand::Logs { page, per_page, action, entity_type, user_id } => {
            let query = AuditLogQuery { page, per_page, action, entity_type, user_id };
            serde_json::to_value(ctx.platform.audit_logs(&query).await?)?
        }
        AuditSubcommand::Show { log_id } => serde_json::to_value(ctx.platform.audit_log(log_id).await?)?,
    };
    print_json(&value)
}

async fn run_metrics(ctx: &AppContext, metrics: MetricsCommand) -> Result<(), CliError> {
    require_session(ctx).await?;
    let value = match metrics.command {
        MetricsSubcommand::Summary => ctx.platform.metrics_summary().await?,
        MetricsSubcommand::ClassDetections => ctx.platform.class_detections().await?,
        MetricsSubcommand::TimeSeries { grouping, days } => ctx.platform.time_series(grouping, days).await?,
    };
    print_json(&value)
}

async fn run_admin(ctx: &AppContext, admin: AdminCommand) -> Result<(), CliError> {
    require_session(ctx).await?;
    let value = match admin.command {
        AdminSubcommand::Users => serde_json::to_value(ctx.platform.users().await?)?,
        AdminSubcommand::Roles => serde_json::to_value(ctx.platform.roles().await?)?,
        AdminSubcommand::SetRole { user_id, role_id } => {
            let reply = ctx.platform.set_user_role(user_id, role_id).await?;
            ctx.platform
                .log_audit(&AuditEntry::new("USER_ROLE_CHANGED", "USER").entity_id(user_id).details(json!({ "roleId": role_id })))
                .await;
            serde_json::to_value(reply)?
        }
        AdminSubcommand::DeleteUser { user_id } => {
            let reply = ctx.platform.delete_user(user_id).await?;
            ctx.platform.log_audit(&AuditEntry::new("USER_DELETED", "USER").entity_id(user_id)).await;
            serde_json::to_value(reply)?
        }
        AdminSubcommand::Stats { user_id } => ctx.platform.user_stats(user_id).await?,
        AdminSubcommand::AddUser { name, last_name, email, password, role_id } => {
            let user = NewUser { name, last_name, email, passwd: password, role_id };
            serde_json::to_value(ctx.platform.add_user(&user).await?)?
        }
    };
    print_json(&value)
}

fn read_upload(path: &Path) -> Result<Upload, CliError> {
    let data = std::fs::read(path).map_err(|source| CliError::ReadFile { path: path.to_path_buf(), source })?;
    let file_name = path
        .file_name()
        .map_or_else(|| path.to_string_lossy().into_owned(), |n| n.to_string_lossy().into_owned());
    let content_type = content_type_for(&file_name);
    Ok(Upload::new(file_name, content_type, data))
}

fn print_session(ctx: &AppContext) -> Result<(), CliError> {
    let session = ctx.auth.session();
    print_json(&json!({
        "name": session.user_name,
        "email": session.email,
        "role": session.role.as_ref().map(ToString::to_string),
        "admin": session.is_admin(),
    }))
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
