// ============================================================
// Layer 4 — California Housing Download
// ============================================================
// Fetches the 1990 census block-group table once and caches it
// on disk in the layout CsvLoader reads. The public CSV carries
// raw block totals, so the per-household features are derived
// the same way the scikit-learn loader derives them:
//
//   AveRooms    = total_rooms    / households
//   AveBedrms   = total_bedrooms / households
//   AveOccup    = population     / households
//   MedHouseVal = median_house_value / 100 000
//
// Rows with a blank cell (total_bedrooms is missing for a few
// hundred blocks) are dropped with a warning. Later runs read
// the cached file and never touch the network.

use std::{fs, path::PathBuf};

use anyhow::{bail, Context, Result};

use crate::data::dataset::{Dataset, DatasetSource};
use crate::data::loader::CsvLoader;
use crate::domain::feature_record::{MODEL_COLUMNS, TARGET_COLUMN};

pub const DEFAULT_DATASET_URL: &str =
    "https://raw.githubusercontent.com/ageron/handson-ml2/master/datasets/housing/housing.csv";

pub const CACHE_FILE: &str = "california_housing.csv";

/// Raw census columns, in the order they are converted.
const CENSUS_COLUMNS: [&str; 9] = [
    "median_income",
    "housing_median_age",
    "total_rooms",
    "total_bedrooms",
    "population",
    "households",
    "latitude",
    "longitude",
    "median_house_value",
];

/// Downloads (once) and loads the California Housing table.
pub struct CaliforniaHousing {
    cache_dir: PathBuf,
    url:       String,
}

impl CaliforniaHousing {
    pub fn new(cache_dir: impl Into<PathBuf>, url: impl Into<String>) -> Self {
        Self { cache_dir: cache_dir.into(), url: url.into() }
    }

    pub fn cache_path(&self) -> PathBuf {
        self.cache_dir.join(CACHE_FILE)
    }

    /// Return the cached file, downloading and converting it first if absent.
    fn ensure_cached(&self) -> Result<PathBuf> {
        let path = self.cache_path();
        if path.exists() {
            tracing::debug!("Using cached dataset '{}'", path.display());
            return Ok(path);
        }

        tracing::info!("Downloading California Housing from {}", self.url);
        let raw = reqwest::blocking::get(&self.url)
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.text())
            .with_context(|| format!("Cannot download dataset from {}", self.url))?;
        let converted = convert_census_csv(&raw)
            .with_context(|| format!("Unexpected dataset layout at {}", self.url))?;

        fs::create_dir_all(&self.cache_dir)
            .with_context(|| format!("Cannot create cache dir '{}'", self.cache_dir.display()))?;
        // Written beside the target, then renamed into place.
        let partial = self.cache_dir.join(format!("{CACHE_FILE}.part"));
        fs::write(&partial, converted)
            .with_context(|| format!("Cannot write '{}'", partial.display()))?;
        fs::rename(&partial, &path)
            .with_context(|| format!("Cannot move dataset into '{}'", path.display()))?;

        tracing::info!("Cached dataset at '{}'", path.display());
        Ok(path)
    }
}

impl DatasetSource for CaliforniaHousing {
    fn load(&self) -> Result<Dataset> {
        CsvLoader::new(self.ensure_cached()?).load()
    }
}

/// Convert the raw census CSV into MODEL_COLUMNS + TARGET_COLUMN text.
pub fn convert_census_csv(text: &str) -> Result<String> {
    let mut lines = text.lines().enumerate().filter(|(_, l)| !l.trim().is_empty());

    let (_, header) = match lines.next() {
        Some(h) => h,
        None => bail!("file is empty"),
    };
    let header: Vec<&str> = header.split(',').map(|h| h.trim().trim_matches('"')).collect();
    let idx: Vec<usize> = CENSUS_COLUMNS
        .iter()
        .map(|&name| {
            header
                .iter()
                .position(|h| *h == name)
                .with_context(|| format!("missing column '{name}'"))
        })
        .collect::<Result<_>>()?;

    let mut out = format!("{},{}\n", MODEL_COLUMNS.join(","), TARGET_COLUMN);
    let mut kept    = 0usize;
    let mut skipped = 0usize;

    for (line_no, line) in lines {
        let cells: Vec<&str> = line.split(',').map(str::trim).collect();
        if cells.len() != header.len() {
            bail!("line {}: expected {} cells, found {}", line_no + 1, header.len(), cells.len());
        }
        if idx.iter().any(|&i| cells[i].is_empty()) {
            skipped += 1;
            continue;
        }

        let mut v = [0.0f64; 9];
        for (slot, &i) in v.iter_mut().zip(&idx) {
            *slot = cells[i].parse().with_context(|| {
                format!("line {}: '{}' in column '{}' is not a number", line_no + 1, cells[i], header[i])
            })?;
        }
        let [income, age, rooms, bedrooms, population, households, lat, lon, value] = v;
        if households <= 0.0 {
            skipped += 1;
            continue;
        }

        out.push_str(&format!(
            "{},{},{},{},{},{},{},{},{}\n",
            income,
            age,
            rooms / households,
            bedrooms / households,
            population,
            population / households,
            lat,
            lon,
            value / 100_000.0,
        ));
        kept += 1;
    }

    if kept == 0 {
        bail!("no complete rows");
    }
    if skipped > 0 {
        tracing::warn!("Dropped {} incomplete census rows, kept {}", skipped, kept);
    }
    Ok(out)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::parse_csv;

    const RAW_HEADER: &str = "longitude,latitude,housing_median_age,total_rooms,total_bedrooms,\
                              population,households,median_income,median_house_value,ocean_proximity";

    #[test]
    fn test_converts_block_totals_to_household_averages() {
        let raw = format!(
            "{RAW_HEADER}\n\
             -122.23,37.88,41.0,880.0,129.0,322.0,126.0,8.3252,452600.0,NEAR BAY\n\
             -122.25,37.85,52.0,919.0,,413.0,193.0,4.0368,269700.0,NEAR BAY\n"
        );
        let ds = parse_csv(&convert_census_csv(&raw).unwrap()).unwrap();
        assert_eq!(ds.len(), 1);

        let row = ds.features().row(0).to_vec();
        assert_eq!(row[0], 8.3252);
        assert_eq!(row[1], 41.0);
        assert!((row[2] - 880.0 / 126.0).abs() < 1e-12);
        assert!((row[3] - 129.0 / 126.0).abs() < 1e-12);
        assert_eq!(row[4], 322.0);
        assert!((row[5] - 322.0 / 126.0).abs() < 1e-12);
        assert_eq!(row[6], 37.88);
        assert_eq!(row[7], -122.23);
        assert!((ds.targets()[0] - 4.526).abs() < 1e-12);
    }

    #[test]
    fn test_conversion_errors() {
        assert!(convert_census_csv("").is_err());
        assert!(convert_census_csv("longitude,latitude\n1,2\n").is_err());
        assert!(convert_census_csv(&format!("{RAW_HEADER}\n1,2,3\n")).is_err());
        assert!(convert_census_csv(&format!("{RAW_HEADER}\n1,2,3,4,5,6,7,x,9,NEAR BAY\n")).is_err());
        assert!(convert_census_csv(&format!("{RAW_HEADER}\n1,2,3,4,,6,7,8,9,NEAR BAY\n")).is_err());
    }

    #[test]
    fn test_cached_file_is_used_without_network() {
        let tmp = tempfile::tempdir().unwrap();
        let raw = format!("{RAW_HEADER}\n-122.23,37.88,41.0,880.0,129.0,322.0,126.0,8.3252,452600.0,NEAR BAY\n");
        fs::write(tmp.path().join(CACHE_FILE), convert_census_csv(&raw).unwrap()).unwrap();

        let source = CaliforniaHousing::new(tmp.path(), "http://127.0.0.1:9/unreachable.csv");
        let ds = source.load().unwrap();
        assert_eq!(ds.len(), 1);
        assert_eq!(ds.columns(), MODEL_COLUMNS);
    }

    #[test]
    fn test_failed_download_caches_nothing() {
        let tmp    = tempfile::tempdir().unwrap();
        let source = CaliforniaHousing::new(tmp.path().join("cache"), "http://127.0.0.1:9/unreachable.csv");
        assert!(source.load().is_err());
        assert!(!source.cache_path().exists());
    }
}
