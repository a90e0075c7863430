//! Tile sources.

use crate::{DemError, DemTile, Result, TileKey};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Loads the tile for a key.
///
/// `Ok(None)` means no tile exists for that cell; errors are reserved for
/// tiles that exist but cannot be read.
pub trait TileLoader: Send + Sync {
    /// Loads one tile.
    fn load(&self, key: TileKey) -> Result<Option<DemTile>>;
}

impl<F> TileLoader for F
where
    F: Fn(TileKey) -> Result<Option<DemTile>> + Send + Sync,
{
    fn load(&self, key: TileKey) -> Result<Option<DemTile>> {
        self(key)
    }
}

/// Loads tiles from `.hgt` and GeoTIFF files indexed by their names.
///
/// Indexing only reads directory entries; tile data is read on demand.
#[derive(Debug, Default)]
pub struct DirectoryLoader {
    files: HashMap<TileKey, PathBuf>,
}

impl DirectoryLoader {
    /// Creates an empty loader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Indexes every tile file in a directory (non-recursive).
    ///
    /// Returns the number of files indexed.
    pub fn add_directory<P: AsRef<Path>>(&mut self, dir: P) -> Result<usize> {
        let mut count = 0;
        for entry in std::fs::read_dir(dir.as_ref())? {
            let path = entry?.path();
            if !path.is_file() || tile_format(&path).is_none() {
                continue;
            }
            match self.add_file(&path) {
                Ok(()) => count += 1,
                Err(e) => debug!(path = %path.display(), error = %e, "skipping unrecognised tile file"),
            }
        }
        debug!(dir = %dir.as_ref().display(), count, "indexed elevation tiles");
        Ok(count)
    }

    /// Indexes a single tile file.
    pub fn add_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        let key = path
            .file_name()
            .and_then(|s| s.to_str())
            .and_then(TileKey::from_filename)
            .ok_or_else(|| DemError::UnrecognisedName(path.into()))?;

        if let Some(existing) = self.files.get(&key) {
            debug!(tile = %key, kept = %existing.display(), ignored = %path.display(), "duplicate tile");
            return Ok(());
        }
        self.files.insert(key, path.to_path_buf());
        Ok(())
    }

    /// Number of indexed tiles.
    pub fn tile_count(&self) -> usize {
        self.files.len()
    }

    /// Whether a file is indexed for `key`.
    pub fn has_tile(&self, key: TileKey) -> bool {
        self.files.contains_key(&key)
    }
}

impl TileLoader for DirectoryLoader {
    fn load(&self, key: TileKey) -> Result<Option<DemTile>> {
        let Some(path) = self.files.get(&key) else {
            return Ok(None);
        };
        let tile = match tile_format(path) {
            Some(TileFormat::Hgt) => DemTile::from_hgt_file(path)?,
            _ => DemTile::from_geotiff(path)?,
        };
        Ok(Some(tile))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TileFormat {
    Hgt,
    GeoTiff,
}

fn tile_format(path: &Path) -> Option<TileFormat> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "hgt" => Some(TileFormat::Hgt),
        "tif" | "tiff" => Some(TileFormat::GeoTiff),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_format() {
        assert_eq!(tile_format(Path::new("N47W123.hgt")), Some(TileFormat::Hgt));
        assert_eq!(tile_format(Path::new("N47W123.HGT")), Some(TileFormat::Hgt));
        assert_eq!(tile_format(Path::new("USGS_13_n48w123.tif")), Some(TileFormat::GeoTiff));
        assert_eq!(tile_format(Path::new("notes.txt")), None);
    }

    #[test]
    fn test_add_file_indexes_by_name() {
        let mut loader = DirectoryLoader::new();
        loader.add_file("tiles/N47W123.hgt").unwrap();
        assert!(loader.has_tile(TileKey::new(47, -123)));
        assert_eq!(loader.tile_count(), 1);
        assert!(loader.add_file("tiles/unnamed.hgt").is_err());
    }

    #[test]
    fn test_missing_key_loads_none() {
        let loader = DirectoryLoader::new();
        assert!(loader.load(TileKey::new(0, 0)).unwrap().is_none());
    }

    #[test]
    fn test_closure_loader() {
        let loader = |key: TileKey| -> Result<Option<DemTile>> {
            if key == TileKey::new(1, 1) {
                DemTile::from_grid(key.bounds(), 2, 2, vec![5.0; 4], None).map(Some)
            } else {
                Ok(None)
            }
        };
        assert!(loader.load(TileKey::new(1, 1)).unwrap().is_some());
        assert!(loader.load(TileKey::new(2, 2)).unwrap().is_none());
    }
}
