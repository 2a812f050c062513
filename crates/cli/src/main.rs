use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use collage::{Asset, CollageSession, CollageSettings, DragPayload, Grid};
use fusion::{
    drive_to_completion, DriveOutcome, FusionBackend, FusionConfig, HttpFusionClient,
    JobController, JobId, JobSpec, JobState,
};
use gallery::GalleryDb;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "fuser")]
#[command(about = "Fuser - compose asset collages and render them remotely")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, global = true)]
    verbose: bool,

    /// Session file holding the grid being edited
    #[arg(short, long, global = true, default_value = "collage.json")]
    session: PathBuf,

    /// Fusion client configuration (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the fusion service URL
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Gallery database (defaults to the app data directory)
    #[arg(long, global = true)]
    db: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a new collage session
    New {
        #[arg(long, default_value = "3")]
        columns: usize,

        #[arg(long, default_value = "2")]
        rows: usize,

        /// Replace an existing session file
        #[arg(long)]
        force: bool,
    },

    /// Print the grid and its settings
    Show {
        /// Print the session as JSON
        #[arg(long)]
        json: bool,
    },

    /// Place an asset on a cell, or on the first empty cell
    Place {
        asset_id: String,

        image_url: String,

        /// Motion tag of the placed rendering
        #[arg(long)]
        motion_tag: Option<String>,

        #[arg(long, requires = "column")]
        row: Option<usize>,

        #[arg(long, requires = "row")]
        column: Option<usize>,
    },

    /// Copy an occupied cell onto another cell
    Copy {
        from_row: usize,
        from_column: usize,
        to_row: usize,
        to_column: usize,
    },

    /// Empty a cell
    Clear { row: usize, column: usize },

    /// Change the grid shape, keeping placed assets
    Resize {
        #[arg(long)]
        columns: Option<usize>,

        #[arg(long)]
        rows: Option<usize>,
    },

    /// Change border and overlay settings
    Style {
        #[arg(long)]
        border_width: Option<usize>,

        /// Color such as #10b981
        #[arg(long)]
        border_color: Option<String>,

        #[arg(long)]
        overlay: Option<bool>,
    },

    /// Undo the last placement
    Undo,

    /// Submit the collage for rendering and wait for the result
    Fuse {
        #[arg(short, long)]
        owner: String,

        /// Save the collage to the gallery once rendered
        #[arg(long)]
        save: bool,
    },

    /// Check a fusion job once
    Status { job_id: String },

    /// Upload a supplementary file
    Upload {
        #[arg(short, long)]
        owner: String,

        file: PathBuf,
    },

    /// Save the collage to the gallery
    Save {
        #[arg(short, long)]
        owner: String,

        #[arg(long)]
        result_url: Option<String>,
    },

    /// List saved collages of an owner
    Collages {
        owner: String,

        /// Include hidden collages
        #[arg(long)]
        all: bool,
    },

    /// Hide a saved collage from other users
    Hide {
        id: String,

        /// Make the collage visible again
        #[arg(long)]
        unhide: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt().with_max_level(level).init();

    let session_path = cli.session.clone();
    match cli.command {
        Commands::New {
            columns,
            rows,
            force,
        } => new_command(&session_path, columns, rows, force).await,
        Commands::Show { json } => show_command(&session_path, json).await,
        Commands::Place {
            asset_id,
            image_url,
            motion_tag,
            row,
            column,
        } => {
            let mut asset = Asset::new(asset_id, image_url);
            if let Some(tag) = motion_tag {
                asset = asset.with_motion_tag(tag);
            }
            let target = row.zip(column);
            place_command(&session_path, DragPayload::from(&asset), target).await
        }
        Commands::Copy {
            from_row,
            from_column,
            to_row,
            to_column,
        } => copy_command(&session_path, (from_row, from_column), (to_row, to_column)).await,
        Commands::Clear { row, column } => edit_session(&session_path, |session| {
            session.clear_cell(row, column)?;
            info!("Cleared cell ({}, {})", row, column);
            Ok(())
        }),
        Commands::Resize { columns, rows } => edit_session(&session_path, |session| {
            if let Some(columns) = columns {
                session.set_columns(columns)?;
            }
            if let Some(rows) = rows {
                session.set_rows(rows)?;
            }
            info!(
                "Grid is now {}x{}",
                session.settings().rows(),
                session.settings().columns()
            );
            Ok(())
        }),
        Commands::Style {
            border_width,
            border_color,
            overlay,
        } => edit_session(&session_path, |session| {
            if let Some(width) = border_width {
                session.set_border_width(width)?;
            }
            if let Some(color) = border_color {
                session.set_border_color(color)?;
            }
            if let Some(enabled) = overlay {
                session.set_overlay_enabled(enabled);
                if enabled && !session.settings().overlay_applies() {
                    warn!("Overlay only applies to grids with more than one row");
                }
            }
            Ok(())
        }),
        Commands::Undo => edit_session(&session_path, |session| {
            session.undo()?;
            Ok(())
        }),
        Commands::Fuse { owner, save } => {
            let config = load_config(cli.config.as_deref(), cli.api_url.as_deref())?;
            fuse_command(&session_path, config, &owner, save.then_some(cli.db)).await
        }
        Commands::Status { job_id } => {
            let config = load_config(cli.config.as_deref(), cli.api_url.as_deref())?;
            status_command(config, job_id).await
        }
        Commands::Upload { owner, file } => {
            let config = load_config(cli.config.as_deref(), cli.api_url.as_deref())?;
            upload_command(config, &owner, &file).await
        }
        Commands::Save { owner, result_url } => {
            let db = open_gallery(cli.db.as_deref())?;
            let session = load_session(&session_path)?;
            let (grid, settings) = session.snapshot();
            let id = db.save_collage(&owner, &grid, &settings, result_url.as_deref())?;
            println!("{}", id);
            Ok(())
        }
        Commands::Collages { owner, all } => collages_command(cli.db.as_deref(), &owner, all).await,
        Commands::Hide { id, unhide } => {
            let db = open_gallery(cli.db.as_deref())?;
            if !db.set_collage_hidden(&id, !unhide)? {
                bail!("No saved collage with id {}", id);
            }
            info!("Collage {} is now {}", id, if unhide { "visible" } else { "hidden" });
            Ok(())
        }
    }
}

async fn new_command(path: &Path, columns: usize, rows: usize, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{:?} already exists (use --force to replace it)", path);
    }

    let mut settings = CollageSettings::default();
    settings.set_columns(columns)?;
    settings.set_rows(rows)?;
    let session = CollageSession::new(settings)?;
    store_session(path, &session)?;

    info!("Created {}x{} collage session: {:?}", rows, columns, path);
    Ok(())
}

async fn show_command(path: &Path, json: bool) -> Result<()> {
    let session = load_session(path)?;
    if json {
        println!("{}", session.to_json()?);
        return Ok(());
    }

    let settings = session.settings();
    println!(
        "{}x{} grid, border {}px {}, overlay {}",
        settings.rows(),
        settings.columns(),
        settings.border_width(),
        settings.border_color(),
        if settings.overlay_applies() { "on" } else { "off" }
    );
    print!("{}", render_grid(session.grid()));
    Ok(())
}

async fn place_command(
    path: &Path,
    payload: DragPayload,
    target: Option<(usize, usize)>,
) -> Result<()> {
    edit_session(path, |session| {
        match target {
            Some((row, column)) => {
                session.drop_on_cell(row, column, payload)?;
                info!("Placed on cell ({}, {})", row, column);
            }
            None => {
                session.place_next(payload)?;
                info!("Placed on the first empty cell");
            }
        }
        Ok(())
    })
}

async fn copy_command(path: &Path, from: (usize, usize), to: (usize, usize)) -> Result<()> {
    edit_session(path, |session| {
        let payload = collage::drag_from_cell(session.grid(), from.0, from.1)
            .ok_or_else(|| anyhow!("Cell ({}, {}) is empty", from.0, from.1))?;
        session.drop_on_cell(to.0, to.1, payload)?;
        Ok(())
    })
}

async fn fuse_command(
    path: &Path,
    config: FusionConfig,
    owner: &str,
    save_to: Option<Option<PathBuf>>,
) -> Result<()> {
    let session = load_session(path)?;
    if session.grid().occupied().next().is_none() {
        warn!("Submitting a collage with no placed assets");
    }

    let policy = config.poll.clone();
    let backend: Arc<dyn FusionBackend> = Arc::new(HttpFusionClient::new(config)?);
    let mut controller = JobController::new(backend);

    let spec = JobSpec::from_session(owner, &session);
    let job_id = controller.submit(&spec).await?;
    info!("Submitted fusion job {}", job_id);

    match drive_to_completion(&mut controller, &policy).await? {
        DriveOutcome::Finished(JobState::Succeeded { result_url, .. }) => {
            println!("{}", result_url);
            if let Some(db_path) = save_to {
                let db = open_gallery(db_path.as_deref())?;
                let (grid, settings) = session.snapshot();
                let id = db.save_collage(owner, &grid, &settings, Some(&result_url))?;
                info!("Saved collage {}", id);
            }
            Ok(())
        }
        DriveOutcome::Finished(JobState::Failed { failure, .. }) => {
            bail!("Fusion job {} failed: {}", job_id, failure)
        }
        DriveOutcome::Finished(state) => {
            bail!("Fusion job {} stopped while {}", job_id, state.phase())
        }
        DriveOutcome::Abandoned { job_id, attempts } => {
            bail!("Gave up on fusion job {} after {} polls", job_id, attempts)
        }
    }
}

#[derive(Serialize)]
struct StatusReport {
    job_id: String,
    status: String,
    progress: Option<f32>,
    result_url: Option<String>,
    error_message: Option<String>,
}

async fn status_command(config: FusionConfig, job_id: String) -> Result<()> {
    let client = HttpFusionClient::new(config)?;
    let job = client.poll(&JobId::new(job_id)).await?;
    let report = StatusReport {
        job_id: job.id.to_string(),
        status: job.status.to_string(),
        progress: job.progress,
        result_url: job.result_url,
        error_message: job.error_message,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn upload_command(config: FusionConfig, owner: &str, file: &Path) -> Result<()> {
    let client = HttpFusionClient::new(config)?;
    let ack = client.upload_asset(file, owner).await?;
    info!("Uploaded {} ({} bytes)", ack.file_name, ack.bytes);
    Ok(())
}

async fn collages_command(db_path: Option<&Path>, owner: &str, all: bool) -> Result<()> {
    let db = open_gallery(db_path)?;
    let collages = db.collages_for(owner, all)?;
    if collages.is_empty() {
        println!("No collages saved for {}", owner);
        return Ok(());
    }

    for saved in collages {
        let created = chrono::DateTime::from_timestamp(saved.created_at, 0)
            .map(|at| at.to_rfc3339())
            .unwrap_or_default();
        println!(
            "{}  {}x{}  {}{}  {}",
            saved.id,
            saved.grid.rows(),
            saved.grid.columns(),
            created,
            if saved.hidden { "  (hidden)" } else { "" },
            saved.result_url.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

fn load_session(path: &Path) -> Result<CollageSession> {
    let blob = std::fs::read_to_string(path)
        .with_context(|| format!("reading session {:?} (run `fuser new` first)", path))?;
    let session = CollageSession::from_json(&blob)
        .with_context(|| format!("parsing session {:?}", path))?;
    Ok(session)
}

fn store_session(path: &Path, session: &CollageSession) -> Result<()> {
    std::fs::write(path, session.to_json()?)
        .with_context(|| format!("writing session {:?}", path))?;
    Ok(())
}

/// Loads the session, applies `edit`, and writes it back only if the edit
/// succeeded.
fn edit_session<F>(path: &Path, edit: F) -> Result<()>
where
    F: FnOnce(&mut CollageSession) -> Result<()>,
{
    let mut session = load_session(path)?;
    edit(&mut session)?;
    store_session(path, &session)
}

fn load_config(path: Option<&Path>, api_url: Option<&str>) -> Result<FusionConfig> {
    let mut config = match path {
        Some(path) => FusionConfig::load(path)
            .with_context(|| format!("loading config {:?}", path))?,
        None => FusionConfig::default(),
    };
    if let Some(url) = api_url {
        config = config.with_api_url(url);
    }
    Ok(config)
}

fn open_gallery(path: Option<&Path>) -> Result<GalleryDb> {
    let path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(gallery::default_db_path);
    GalleryDb::open_or_create(&path)
}

/// Text rendering of the grid: asset ids in occupied cells, the 1-based
/// placeholder number in empty ones.
fn render_grid(grid: &Grid) -> String {
    let labels: Vec<Vec<String>> = grid
        .iter_rows()
        .enumerate()
        .map(|(row, cells)| {
            cells
                .iter()
                .enumerate()
                .map(|(column, cell)| match cell.asset() {
                    Some(asset) => asset.asset_id.clone(),
                    None => grid
                        .display_number(row, column)
                        .map(|n| format!("({})", n))
                        .unwrap_or_default(),
                })
                .collect()
        })
        .collect();

    let width = labels
        .iter()
        .flatten()
        .map(|label| label.len())
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    for row in labels {
        let line: Vec<String> = row
            .iter()
            .map(|label| format!("{:<width$}", label, width = width))
            .collect();
        out.push_str(&format!("| {} |\n", line.join(" | ")));
    }
    out
}
