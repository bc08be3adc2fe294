//! Loading symbol bitmaps from disk.

use std::path::{Path, PathBuf};

use cardtext_core::markup::SymbolTable;
use cardtext_layout::SymbolAssets;
use image::RgbaImage;

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Decodes one bitmap into RGBA.
pub fn load_file(path: &Path) -> Result<RgbaImage, AssetError> {
    let bytes = std::fs::read(path).map_err(|source| AssetError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let image = image::load_from_memory(&bytes).map_err(|source| AssetError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(image.to_rgba8())
}

pub trait LoadAssets: Sized {
    /// Loads every `*.png` in `dir`, keyed by file stem. Files that fail to
    /// decode are skipped with a warning; an unreadable directory is an
    /// error.
    fn load_dir(dir: impl AsRef<Path>) -> Result<Self, AssetError>;
}

impl LoadAssets for SymbolAssets {
    fn load_dir(dir: impl AsRef<Path>) -> Result<Self, AssetError> {
        let dir = dir.as_ref();
        let io_err = |source| AssetError::Io {
            path: dir.to_path_buf(),
            source,
        };
        let mut assets = SymbolAssets::new();
        for entry in std::fs::read_dir(dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            let is_png = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("png"));
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()).filter(|_| is_png) else {
                continue;
            };
            match load_file(&path) {
                Ok(image) => assets.insert(stem, image),
                Err(e) => log::warn!("skipping symbol asset: {e}"),
            }
        }
        log::debug!("loaded {} symbol assets from {}", assets.len(), dir.display());
        Ok(assets)
    }
}

/// Assets `symbols` can emit that `assets` does not provide, sorted.
pub fn missing_assets(symbols: &SymbolTable, assets: &SymbolAssets) -> Vec<String> {
    let mut missing: Vec<String> = symbols
        .asset_names()
        .into_iter()
        .filter(|name| !assets.contains(name))
        .collect();
    missing.sort();
    missing.dedup();
    missing
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba};

    #[test]
    fn test_load_dir_keys_by_stem() {
        let dir = tempfile::tempdir().unwrap();
        RgbaImage::from_pixel(4, 4, Rgba([255, 0, 0, 255]))
            .save(dir.path().join("attribute-fire.png"))
            .unwrap();
        RgbaImage::from_pixel(2, 2, Rgba([0, 0, 255, 255]))
            .save_with_format(dir.path().join("attribute-water.PNG"), ImageFormat::Png)
            .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let assets = SymbolAssets::load_dir(dir.path()).unwrap();
        assert_eq!(assets.len(), 2);
        assert_eq!(assets.get("attribute-fire").unwrap().dimensions(), (4, 4));
        assert!(assets.contains("attribute-water"));
    }

    #[test]
    fn test_undecodable_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.png"), b"not a png").unwrap();
        RgbaImage::new(1, 1).save(dir.path().join("symbol-rest.png")).unwrap();
        let assets = SymbolAssets::load_dir(dir.path()).unwrap();
        assert_eq!(assets.names().collect::<Vec<_>>(), vec!["symbol-rest"]);
    }

    #[test]
    fn test_missing_dir_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = SymbolAssets::load_dir(dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, AssetError::Io { .. }));
        let err = load_file(&dir.path().join("nope.png")).unwrap_err();
        assert!(err.to_string().contains("nope.png"));
    }

    #[test]
    fn test_missing_assets() {
        let symbols = SymbolTable::default();
        let mut assets = SymbolAssets::new();
        assets.insert("attribute-fire", RgbaImage::new(1, 1));
        let missing = missing_assets(&symbols, &assets);
        assert!(!missing.contains(&"attribute-fire".to_string()));
        assert!(missing.contains(&"symbol-voidcost".to_string()));
        assert!(missing.windows(2).all(|w| w[0] < w[1]));
    }
}
