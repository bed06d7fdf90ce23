// ============================================================
// Layer 6 — CV Results Log
// ============================================================
// Renders a search report as CSV, one row per candidate, in
// evaluation order:
//
//   params,split0_test_score,...,mean_test_score,std_test_score,
//   rank_test_score,mean_fit_time,mean_score_time
//
// `params` is `name=value` pairs joined with ';' so the column
// never needs quoting. Rank 1 is the best score; equal scores
// share a rank.

use std::fmt::Write;

use anyhow::Result;

use crate::ml::search::{Candidate, SearchReport};

pub const CV_RESULTS_FILE: &str = "cv_results.csv";

pub fn format_params(params: &Candidate) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(";")
}

fn ranks(report: &SearchReport) -> Vec<usize> {
    let scores: Vec<f64> = report.results.iter().map(|r| r.mean_test_score).collect();
    scores
        .iter()
        .map(|&s| 1 + scores.iter().filter(|&&o| o > s || (o.is_finite() && !s.is_finite())).count())
        .collect()
}

pub fn cv_results_csv(report: &SearchReport) -> Result<String> {
    let folds = report.results.first().map_or(0, |r| r.fold_scores.len());
    let mut out = String::new();

    write!(out, "params")?;
    for i in 0..folds {
        write!(out, ",split{i}_test_score")?;
    }
    writeln!(out, ",mean_test_score,std_test_score,rank_test_score,mean_fit_time,mean_score_time")?;

    for (r, rank) in report.results.iter().zip(ranks(report)) {
        write!(out, "{}", format_params(&r.params))?;
        for s in &r.fold_scores {
            write!(out, ",{s:.6}")?;
        }
        writeln!(
            out,
            ",{:.6},{:.6},{},{:.6},{:.6}",
            r.mean_test_score, r.std_test_score, rank, r.mean_fit_time, r.mean_score_time
        )?;
    }

    tracing::debug!("Rendered {} cv result rows", report.results.len());
    Ok(out)
}
