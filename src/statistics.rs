//! Summary counts for verbal autopsy data: demographics and causes of death.
//!
//! Columns are located by header name patterns, so these work on raw or
//! decoded record sets alike.

use std::collections::HashMap;

use serde::Serialize;

use crate::record::RecordSet;

pub const SITE_PATTERNS: &[&str] = &["site", "location", "region", "area", "place"];
pub const SEX_PATTERNS: &[&str] = &["sex", "gender", "g1_05", "male", "female"];
pub const AGE_PATTERNS: &[&str] = &["age", "g1_04", "years", "old"];
pub const CAUSE_PATTERNS: &[&str] = &["cause", "cod", "death", "diagnosis", "disease", "condition"];
pub const IMMEDIATE_PATTERNS: &[&str] = &["immediate", "direct", "primary"];
pub const UNDERLYING_PATTERNS: &[&str] = &["underlying", "fundamental", "basic"];

/// Causes kept in [`CauseSummary::top_causes`].
pub const TOP_CAUSES: usize = 15;

const UNKNOWN: &str = "Unknown";

pub const AGE_BUCKETS: [&str; 4] = ["0-18", "19-40", "41-65", "65+"];

/// First header whose lower-cased name contains any of `patterns`.
pub fn find_column<'a>(headers: &'a [String], patterns: &[&str]) -> Option<&'a str> {
    headers
        .iter()
        .find(|header| {
            let lower = header.to_lowercase();
            patterns.iter().any(|p| lower.contains(&p.to_lowercase()))
        })
        .map(String::as_str)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DemographicSummary {
    pub total: usize,
    pub site_column: Option<String>,
    pub sex_column: Option<String>,
    pub age_column: Option<String>,
    /// Sorted by count descending, then label.
    pub sites: Vec<(String, usize)>,
    pub sexes: Vec<(String, usize)>,
    /// Always the four buckets of [`AGE_BUCKETS`], in order.
    pub ages: Vec<(String, usize)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CauseSummary {
    pub cause_column: Option<String>,
    pub immediate_column: Option<String>,
    pub underlying_column: Option<String>,
    /// Records with a non-blank cause.
    pub total_with_cause: usize,
    pub distinct_causes: usize,
    pub top_causes: Vec<(String, usize)>,
}

fn ranked(counts: HashMap<String, usize>) -> Vec<(String, usize)> {
    let mut ranked: Vec<_> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked
}

fn normalize_sex(raw: &str) -> String {
    let lower = raw.to_lowercase();
    if raw.is_empty() {
        UNKNOWN.to_string()
    } else if raw == "2" || lower.contains("female") {
        "Female".to_string()
    } else if raw == "1" || lower.contains("male") {
        "Male".to_string()
    } else {
        raw.to_string()
    }
}

fn age_bucket(age: i64) -> usize {
    match age {
        a if a <= 18 => 0,
        a if a <= 40 => 1,
        a if a <= 65 => 2,
        _ => 3,
    }
}

pub fn demographics(set: &RecordSet) -> DemographicSummary {
    let headers = set.headers();
    let site_column = find_column(headers, SITE_PATTERNS);
    let sex_column = find_column(headers, SEX_PATTERNS);
    let age_column = find_column(headers, AGE_PATTERNS);

    let mut sites: HashMap<String, usize> = HashMap::new();
    let mut sexes: HashMap<String, usize> = HashMap::new();
    let mut ages = [0usize; 4];

    for pos in 0..set.len() {
        if let Some(column) = site_column {
            let value = set.value(pos, column).as_str();
            let site = if value.is_empty() {
                UNKNOWN.to_string()
            } else {
                value.into_owned()
            };
            *sites.entry(site).or_default() += 1;
        }
        if let Some(column) = sex_column {
            let sex = normalize_sex(&set.value(pos, column).as_str());
            *sexes.entry(sex).or_default() += 1;
        }
        if let Some(column) = age_column {
            if let Some(age) = set.value(pos, column).as_number() {
                ages[age_bucket(age.trunc() as i64)] += 1;
            }
        }
    }

    DemographicSummary {
        total: set.len(),
        site_column: site_column.map(str::to_string),
        sex_column: sex_column.map(str::to_string),
        age_column: age_column.map(str::to_string),
        sites: ranked(sites),
        sexes: ranked(sexes),
        ages: AGE_BUCKETS
            .iter()
            .zip(ages)
            .map(|(bucket, n)| (bucket.to_string(), n))
            .collect(),
    }
}

pub fn causes_of_death(set: &RecordSet) -> CauseSummary {
    let headers = set.headers();
    let cause_column = find_column(headers, CAUSE_PATTERNS);
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut total_with_cause = 0;
    if let Some(column) = cause_column {
        for pos in 0..set.len() {
            let value = set.value(pos, column).as_str();
            let cause = value.trim();
            if !cause.is_empty() {
                total_with_cause += 1;
                *counts.entry(cause.to_string()).or_default() += 1;
            }
        }
    }
    let distinct_causes = counts.len();
    let mut top_causes = ranked(counts);
    top_causes.truncate(TOP_CAUSES);
    CauseSummary {
        cause_column: cause_column.map(str::to_string),
        immediate_column: find_column(headers, IMMEDIATE_PATTERNS).map(str::to_string),
        underlying_column: find_column(headers, UNDERLYING_PATTERNS).map(str::to_string),
        total_with_cause,
        distinct_causes,
        top_causes,
    }
}
