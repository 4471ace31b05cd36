use std::sync::Arc;

use canvas::placement::PlacementAllocator;
use clap::{Parser, Subcommand};
use genboard::api::{ApiError, CanvasApi, HttpCanvasApi, OfflineCanvasApi, ProjectId};
use genboard::config::{ConfigError, SessionConfig, parse_api_url};
use genboard::images::{HttpImageFetcher, ImageError};
use genboard::session::{CanvasSession, SessionError};
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("missing project; pass --project or set GENBOARD_PROJECT_ID")]
    MissingProject,
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Image(#[from] ImageError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "genboard", about = "Image canvas session tools")]
struct Cli {
    /// Persistence backend. Without it the canvas runs offline.
    #[arg(long, env = "GENBOARD_API_URL")]
    api_url: Option<String>,

    #[arg(long, env = "GENBOARD_PROJECT_ID")]
    project: Option<Uuid>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Open a project and summarize what loaded.
    Inspect,
    /// Show where new images of the given size would be placed.
    Place {
        #[arg(long, default_value_t = 1)]
        count: usize,
        #[arg(long, default_value_t = 512.0)]
        width: f64,
        #[arg(long, default_value_t = 512.0)]
        height: f64,
    },
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = SessionConfig::from_env();
    config.validate()?;

    let api: Arc<dyn CanvasApi> = match cli.api_url.as_deref() {
        Some(raw) => Arc::new(HttpCanvasApi::new(parse_api_url(raw)?, config.timeouts)?),
        None => {
            tracing::info!("no API URL configured, running offline");
            Arc::new(OfflineCanvasApi)
        }
    };
    let fetcher = Arc::new(HttpImageFetcher::new(config.timeouts)?);
    let mut session = CanvasSession::new(api, fetcher, &config);

    match cli.command {
        Command::Inspect => {
            let project = cli.project.ok_or(CliError::MissingProject)?;
            run_inspect(&mut session, project).await
        }
        Command::Place { count, width, height } => {
            run_place(&mut session, &config, cli.project, count, width, height).await
        }
    }
}

async fn run_inspect(session: &mut CanvasSession, project: ProjectId) -> Result<(), CliError> {
    session.open(project).await?;
    let engine = session.engine();
    let newest = engine.store.newest().map(|e| {
        json!({
            "id": e.id,
            "x": e.x,
            "y": e.y,
            "width": e.width,
            "height": e.height,
            "createdAt": e.created_at,
            "prompt": e.prompt(),
        })
    });
    print_json(&json!({
        "project": project,
        "entities": engine.store.len(),
        "viewport": engine.camera(),
        "newest": newest,
    }))
}

async fn run_place(
    session: &mut CanvasSession,
    config: &SessionConfig,
    project: Option<ProjectId>,
    count: usize,
    width: f64,
    height: f64,
) -> Result<(), CliError> {
    if let Some(project) = project {
        session.open(project).await?;
    }
    let allocator = PlacementAllocator::new(config.engine_config().placement);
    let positions = allocator.allocate(&session.engine().store.bounds(), width, height, count);
    let boxes: Vec<Value> = positions
        .iter()
        .map(|p| json!({ "x": p.x, "y": p.y, "width": width, "height": height }))
        .collect();
    print_json(&Value::Array(boxes))
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
