// =============================================================================
// Persistent series store — one JSON document per symbol key
// =============================================================================
//
// Writes use an atomic tmp + rename pattern so a crash mid-write never
// corrupts the previous value. All writers for a given key are serialised
// through the selection controller, so last-writer-wins is safe.
// =============================================================================

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::market_data::Series;

/// Durable cache of candle series, keyed by the exchange pair code.
pub struct SeriesStore {
    dir: PathBuf,
}

impl SeriesStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create cache dir {}", dir.display()))?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Load the series stored under `key`.
    ///
    /// Unknown keys yield an empty series. An unreadable or corrupt cache
    /// file degrades the same way, with a warning.
    pub fn load(&self, key: &str) -> Series {
        let path = self.path_for(key);
        match try_load(&path) {
            Ok(Some(series)) => {
                debug!(key = %key, candles = series.len(), "series loaded from cache");
                series
            }
            Ok(None) => Series::default(),
            Err(e) => {
                warn!(key = %key, error = %e, "unreadable series cache, starting empty");
                Series::default()
            }
        }
    }

    /// Persist `series` under `key`, replacing the prior value wholesale.
    pub fn save(&self, key: &str, series: &Series) -> Result<()> {
        let path = self.path_for(key);
        let content =
            serde_json::to_string(series).context("failed to serialise series to JSON")?;

        // Atomic write: write to a temporary sibling file, then rename.
        let tmp_path = path.with_extension("json.tmp");

        fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp cache to {}", tmp_path.display()))?;

        fs::rename(&tmp_path, &path)
            .with_context(|| format!("failed to rename tmp cache to {}", path.display()))?;

        debug!(key = %key, candles = series.len(), "series saved");
        Ok(())
    }
}

fn try_load(path: &Path) -> Result<Option<Series>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(e).with_context(|| format!("failed to read {}", path.display()));
        }
    };

    let series = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(Some(series))
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::Candle;

    fn temp_store() -> SeriesStore {
        let dir = std::env::temp_dir().join(format!("candleview-test-{}", uuid::Uuid::new_v4()));
        SeriesStore::open(dir).unwrap()
    }

    fn sample_series(closes: &[&str]) -> Series {
        let mut series = Series::new();
        for close in closes {
            series.push(Candle {
                time: "22:13:20".into(),
                open: "100".into(),
                high: "105".into(),
                low: "99".into(),
                close: (*close).into(),
            });
        }
        series
    }

    #[test]
    fn unknown_key_loads_empty() {
        let store = temp_store();
        assert!(store.load("ethusdt").is_empty());
    }

    #[test]
    fn save_load_roundtrip() {
        let store = temp_store();
        let series = sample_series(&["104", "106"]);

        store.save("ethusdt", &series).unwrap();
        assert_eq!(store.load("ethusdt"), series);
    }

    #[test]
    fn save_overwrites_prior_value() {
        let store = temp_store();

        store.save("bnbusdt", &sample_series(&["1"])).unwrap();
        store.save("bnbusdt", &sample_series(&["1", "2", "3"])).unwrap();

        assert_eq!(store.load("bnbusdt").len(), 3);
    }

    #[test]
    fn keys_are_independent() {
        let store = temp_store();

        store.save("ethusdt", &sample_series(&["104"])).unwrap();
        assert!(store.load("bnbusdt").is_empty());
        assert_eq!(store.load("ethusdt").len(), 1);
    }

    #[test]
    fn corrupt_file_loads_empty() {
        let store = temp_store();
        fs::write(store.path_for("dotusdt"), "not json at all").unwrap();
        assert!(store.load("dotusdt").is_empty());
    }
}
