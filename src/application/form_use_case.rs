// ============================================================
// Layer 2 — Form Use Case
// ============================================================
// A terminal form for the prediction service.
//
// Each submission prompts for the eight features (an empty
// answer keeps the default 0.0), then:
//
//   any field not a finite number → "Please enter valid numbers…"
//                                    nothing is sent
//   request fails / non-2xx       → "Error: the model could not…"
//   otherwise                     → prediction × display_scale
//
// One blocking call per submission, no retries. The session
// keeps going after every outcome until input ends.

use std::io::{BufRead, Write};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::serve_use_case::PredictionResponse;
use crate::domain::feature_record::{FeatureRecord, FIELD_NAMES};

/// Prompt labels, in `FIELD_NAMES` order.
pub const FIELD_LABELS: [&str; 8] = [
    "Median income",
    "House age",
    "Average number of rooms per household",
    "Average number of bedrooms per household",
    "Population",
    "Average number of household members",
    "Latitude",
    "Longitude",
];

pub const INVALID_INPUT_MESSAGE: &str = "Please enter valid numbers in all fields.";
pub const UNAVAILABLE_MESSAGE: &str   = "Error: the model could not make a prediction.";

const TITLE: &str = "California Housing Price Prediction";
const INTRO: &str = "Provide the following information to predict the price of a house in California.";
const DEFAULT_VALUE: &str = "0.0";

// ─── Form Configuration ──────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormConfig {
    /// Base URL of the prediction service.
    pub url:           String,
    /// The target is in units of $100 000.
    pub display_scale: f64,
}

impl Default for FormConfig {
    fn default() -> Self {
        Self { url: "http://localhost:8000".to_string(), display_scale: 100_000.0 }
    }
}

// ─── Transport ────────────────────────────────────────────────────────────────
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("service returned {status}: {message}")]
    Status { status: u16, message: String },
}

/// Sends one feature record to the prediction service.
pub trait PredictionTransport {
    fn predict(&self, record: &FeatureRecord) -> Result<f64, TransportError>;
}

/// Blocking HTTP transport posting to `{base_url}/predict`.
pub struct HttpTransport {
    client:   reqwest::blocking::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str) -> Result<Self, TransportError> {
        Ok(Self {
            client:   reqwest::blocking::Client::builder().build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

impl PredictionTransport for HttpTransport {
    fn predict(&self, record: &FeatureRecord) -> Result<f64, TransportError> {
        let url  = format!("{}/predict", self.base_url);
        let resp = self.client.post(&url).json(record).send()?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = resp.text().unwrap_or_default();
            return Err(TransportError::Status { status, message });
        }
        Ok(resp.json::<PredictionResponse>()?.prediction)
    }
}

// ─── FormClient ───────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Outcome {
    InvalidInput,
    Unavailable,
    /// Raw model output, before display scaling.
    Prediction(f64),
}

impl Outcome {
    pub fn message(&self, display_scale: f64) -> String {
        match self {
            Outcome::InvalidInput => INVALID_INPUT_MESSAGE.to_string(),
            Outcome::Unavailable => UNAVAILABLE_MESSAGE.to_string(),
            Outcome::Prediction(p) => {
                format!("The predicted housing price is: {:.2} dollars.", p * display_scale)
            }
        }
    }
}

pub struct FormClient<T: PredictionTransport> {
    transport:     T,
    display_scale: f64,
}

impl<T: PredictionTransport> FormClient<T> {
    pub fn new(transport: T, display_scale: f64) -> Self {
        Self { transport, display_scale }
    }

    /// Parse the eight raw fields and, if all are valid, request a prediction.
    pub fn submit(&self, fields: &[String; 8]) -> Outcome {
        let mut values = [0.0; 8];
        for (i, raw) in fields.iter().enumerate() {
            match raw.trim().parse::<f64>() {
                Ok(v) if v.is_finite() => values[i] = v,
                _ => {
                    tracing::debug!("Field '{}' is not a number: {:?}", FIELD_NAMES[i], raw);
                    return Outcome::InvalidInput;
                }
            }
        }

        match self.transport.predict(&FeatureRecord::from_values(values)) {
            Ok(p) => Outcome::Prediction(p),
            Err(e) => {
                tracing::warn!("Prediction request failed: {}", e);
                Outcome::Unavailable
            }
        }
    }

    /// Run submissions from `input` until it is exhausted.
    /// Returns the number of completed submissions.
    pub fn run_session<R: BufRead, W: Write>(&self, mut input: R, mut output: W) -> Result<usize> {
        writeln!(output, "# {TITLE}")?;
        writeln!(output, "{INTRO}")?;

        let mut submissions = 0;
        loop {
            writeln!(output)?;
            let mut fields: [String; 8] = Default::default();
            for (label, field) in FIELD_LABELS.iter().zip(fields.iter_mut()) {
                write!(output, "{label} [{DEFAULT_VALUE}]: ")?;
                output.flush()?;

                let mut line = String::new();
                if input.read_line(&mut line)? == 0 {
                    writeln!(output)?;
                    return Ok(submissions);
                }
                let answer = line.trim();
                *field = if answer.is_empty() { DEFAULT_VALUE.to_string() } else { answer.to_string() };
            }

            let outcome = self.submit(&fields);
            writeln!(output, "{}", outcome.message(self.display_scale))?;
            submissions += 1;
        }
    }
}

// ─── FormUseCase ──────────────────────────────────────────────────────────────
pub struct FormUseCase {
    config: FormConfig,
}

impl FormUseCase {
    pub fn new(config: FormConfig) -> Self {
        Self { config }
    }

    /// Interactive session on stdin/stdout.
    pub fn execute(&self) -> Result<()> {
        let transport = HttpTransport::new(&self.config.url)?;
        let client    = FormClient::new(transport, self.config.display_scale);
        tracing::info!("Sending predictions to {}", self.config.url);

        let stdin  = std::io::stdin();
        let stdout = std::io::stdout();
        let n = client.run_session(stdin.lock(), stdout.lock())?;
        tracing::info!("Session ended after {} submissions", n);
        Ok(())
    }
}
