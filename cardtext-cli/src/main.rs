//! cardtext: renders the text boxes of a card to PNG.
//!
//! Usage: `cardtext <job.json>`. The job lists the canvas size, the symbol
//! asset directory and one entry per text box; see [`job::RenderJob`].
//! Fonts come from the system database, with the built-in width table as a
//! fallback when no fonts are installed.

mod job;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use cardtext_core::geometry::Rect;
use cardtext_core::markup::SymbolTable;
use cardtext_core::paint::Painter;
use cardtext_layout::SymbolAssets;
use cardtext_render::{missing_assets, AssetError, Canvas, LoadAssets, TextItem};
use cardtext_text::{CosmicMeasurer, FontError, TableMeasurer, TextMeasurer};
use log::{info, warn};

use job::RenderJob;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("usage: cardtext <job.json>")]
    Usage,
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid job file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to write image: {0}")]
    Image(#[from] image::ImageError),
    #[error(transparent)]
    Asset(#[from] AssetError),
    #[error(transparent)]
    Font(#[from] FontError),
}

fn load_job(path: &Path) -> Result<RenderJob, CliError> {
    let text = std::fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&text)?)
}

fn open_measurer(job: &RenderJob) -> Result<Box<dyn TextMeasurer>, CliError> {
    match CosmicMeasurer::new() {
        Ok(mut m) => {
            for file in &job.font_files {
                m.load_font_file(file)?;
            }
            Ok(Box::new(m))
        }
        Err(e) => {
            warn!("{e}; measuring with the built-in width table");
            Ok(Box::new(TableMeasurer::new()))
        }
    }
}

fn render(job: &RenderJob) -> Result<(), CliError> {
    let assets = match &job.asset_dir {
        Some(dir) => SymbolAssets::load_dir(dir)?,
        None => SymbolAssets::new(),
    };
    for name in missing_assets(&SymbolTable::default(), &assets) {
        warn!("no bitmap for symbol asset \"{name}\"");
    }

    let mut canvas = Canvas::new(job.width, job.height);
    canvas.clear(job.background);
    let mut measurer = open_measurer(job)?;
    for text_box in &job.boxes {
        let mut item = TextItem::new(measurer, assets.clone());
        text_box.configure(&mut item);
        let position = item.position();
        let size = item.bounding_rect().size();
        info!(
            "{:?} box: {} paragraph(s) at {}pt, {}x{}",
            text_box.role,
            text_box.paragraphs.len(),
            item.calculated_point_size(),
            size.width,
            size.height
        );
        let bitmap = item.paint();
        let dest = Rect::new(position.x, position.y, bitmap.width() as f32, bitmap.height() as f32);
        canvas.draw_image(dest, bitmap);
        measurer = item.into_measurer();
    }

    canvas.image().save(&job.output)?;
    info!("wrote {}", job.output.display());
    Ok(())
}

fn run() -> Result<(), CliError> {
    let path = std::env::args().nth(1).ok_or(CliError::Usage)?;
    let job = load_job(Path::new(&path))?;
    render(&job)
}

fn main() -> ExitCode {
    env_logger::init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("cardtext: {e}");
            ExitCode::FAILURE
        }
    }
}
