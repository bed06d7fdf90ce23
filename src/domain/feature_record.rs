// ============================================================
// Layer 3 — Feature Record
// ============================================================
// The fixed-shape input to a single prediction.
//
// Two naming schemes exist for the same eight values:
//   - wire names (lowercase) used by the HTTP body and the form
//   - model columns (CamelCase) the estimator was trained on
//
// Both lists are declared once here, in the same order, and
// everything that builds a row for the model goes through
// `FeatureRecord::to_frame` so the order cannot drift.

use serde::{Deserialize, Deserializer, Serialize};

/// Wire field names, in model column order.
pub const FIELD_NAMES: [&str; 8] = [
    "medinc",
    "houseage",
    "averooms",
    "avebedrms",
    "population",
    "aveoccup",
    "latitude",
    "longitude",
];

/// Column names the estimator is trained on.
pub const MODEL_COLUMNS: [&str; 8] = [
    "MedInc",
    "HouseAge",
    "AveRooms",
    "AveBedrms",
    "Population",
    "AveOccup",
    "Latitude",
    "Longitude",
];

/// Name of the regression target column in the dataset.
pub const TARGET_COLUMN: &str = "MedHouseVal";

/// One block of house features, as sent to `POST /predict`.
///
/// Each field accepts a JSON number or a string holding a number,
/// and must be finite. Unknown extra fields are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    #[serde(deserialize_with = "numeric")]
    pub medinc: f64,
    #[serde(deserialize_with = "numeric")]
    pub houseage: f64,
    #[serde(deserialize_with = "numeric")]
    pub averooms: f64,
    #[serde(deserialize_with = "numeric")]
    pub avebedrms: f64,
    #[serde(deserialize_with = "numeric")]
    pub population: f64,
    #[serde(deserialize_with = "numeric")]
    pub aveoccup: f64,
    #[serde(deserialize_with = "numeric")]
    pub latitude: f64,
    #[serde(deserialize_with = "numeric")]
    pub longitude: f64,
}

impl FeatureRecord {
    /// Build a record from values already in `FIELD_NAMES` order.
    pub fn from_values(v: [f64; 8]) -> Self {
        Self {
            medinc:     v[0],
            houseage:   v[1],
            averooms:   v[2],
            avebedrms:  v[3],
            population: v[4],
            aveoccup:   v[5],
            latitude:   v[6],
            longitude:  v[7],
        }
    }

    /// Values in `FIELD_NAMES` / `MODEL_COLUMNS` order.
    pub fn values(&self) -> [f64; 8] {
        [
            self.medinc,
            self.houseage,
            self.averooms,
            self.avebedrms,
            self.population,
            self.aveoccup,
            self.latitude,
            self.longitude,
        ]
    }

    /// Assemble the single-row table handed to the model.
    pub fn to_frame(&self) -> FeatureFrame {
        FeatureFrame {
            columns: MODEL_COLUMNS.iter().map(|c| c.to_string()).collect(),
            values:  self.values().to_vec(),
        }
    }
}

/// A single-row structured table: column names plus one value per column.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureFrame {
    pub columns: Vec<String>,
    pub values:  Vec<f64>,
}

// ─── Lenient numeric parsing ──────────────────────────────────────────────────
// Accepts `8.3` and `"8.3"`; rejects anything else, including NaN and
// infinities, so the request never reaches the model.
#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(f64),
    Text(String),
}

fn numeric<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let value = match NumberOrText::deserialize(deserializer)
        .map_err(|_| D::Error::custom("value is not a valid float"))?
    {
        NumberOrText::Number(n) => n,
        NumberOrText::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| D::Error::custom(format!("'{s}' is not a valid float")))?,
    };

    if !value.is_finite() {
        return Err(D::Error::custom("value must be a finite float"));
    }
    Ok(value)
}
