use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;

use crate::error::NormalizeError;
use crate::models::{JobListing, RawListing};

/// Parsed salary text. Units are normalized to a numeric range plus a
/// pay period; currency is inferred from the symbol when present.
#[derive(Debug, Clone, PartialEq)]
pub struct SalaryRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub currency: Option<String>,
    pub period: Option<String>,
}

static AMOUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([$€£])?\s*([0-9][0-9,]*(?:\.[0-9]+)?)\s*([kK])?").unwrap()
});

/// Map a source-specific capture into the canonical record shape.
///
/// Pure: the output depends only on the arguments, so feeding the same
/// raw listing through twice yields identical records. Fails when the
/// fields every accepted record needs are absent; everything optional
/// degrades to `None`.
pub fn normalize(raw: &RawListing, fetched_at: DateTime<Utc>) -> Result<JobListing, NormalizeError> {
    let source = raw.source.ok_or(NormalizeError::MissingField("source"))?;

    let title = clean(raw.title.as_deref().unwrap_or(""));
    if title.is_empty() {
        return Err(NormalizeError::MissingField("title"));
    }

    let url = raw.url.as_deref().unwrap_or("").trim();
    if url.is_empty() {
        return Err(NormalizeError::MissingField("url"));
    }
    let url = url::Url::parse(url)
        .map_err(|_| NormalizeError::InvalidUrl(url.to_string()))?
        .to_string();

    let company = clean(raw.company.as_deref().unwrap_or(""));
    let location = clean(raw.location.as_deref().unwrap_or(""));
    if company.is_empty() && location.is_empty() {
        return Err(NormalizeError::MissingField("company"));
    }

    let snippet = raw.snippet.as_deref().map(clean).filter(|s| !s.is_empty());
    let haystack = format!("{} {}", title, snippet.as_deref().unwrap_or("")).to_lowercase();
    // Sites often mark remote roles only in the location field.
    let remote_haystack = format!("{haystack} {}", location.to_lowercase());

    // Structured salary data from an API beats text parsed off a page.
    let salary = if raw.salary_min.is_some() || raw.salary_max.is_some() {
        Some(SalaryRange {
            min: raw.salary_min,
            max: raw.salary_max,
            currency: raw.salary_currency.clone().or_else(|| Some("USD".into())),
            period: Some("yearly".to_string()),
        })
    } else {
        raw.salary_text.as_deref().and_then(parse_salary)
    };

    Ok(JobListing {
        source,
        source_id: raw.source_id.clone(),
        title,
        company,
        location,
        url,
        salary_min: salary.as_ref().and_then(|s| s.min),
        salary_max: salary.as_ref().and_then(|s| s.max),
        salary_currency: salary.as_ref().and_then(|s| s.currency.clone()),
        salary_period: salary.as_ref().and_then(|s| s.period.clone()),
        job_type: job_type(raw.employment_type.as_deref(), &haystack),
        experience_level: Some(experience_level(&haystack).to_string()),
        remote_type: Some(remote_type(raw.is_remote, &remote_haystack).to_string()),
        description_snippet: snippet,
        posted_date: raw.posted_at.as_deref().and_then(parse_posted_date),
        fetched_at,
    })
}

/// Trim and collapse internal whitespace runs.
fn clean(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Accepts RFC 3339 timestamps and plain `YYYY-MM-DD` dates; anything
/// else is treated as unknown rather than an error.
pub fn parse_posted_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.date_naive());
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()
}

/// Parse free-form salary text such as "$70,000 - $90,000 a year",
/// "Up to $55 an hour" or "From $120K".
pub fn parse_salary(text: &str) -> Option<SalaryRange> {
    let lower = text.to_lowercase();
    let mut amounts = Vec::new();
    let mut currency = None;

    for caps in AMOUNT_RE.captures_iter(text) {
        let digits = caps.get(2)?.as_str().replace(',', "");
        let mut value: f64 = digits.parse().ok()?;
        if caps.get(3).is_some() {
            value *= 1000.0;
        }
        if currency.is_none() {
            currency = caps.get(1).map(|sym| {
                match sym.as_str() {
                    "€" => "EUR",
                    "£" => "GBP",
                    _ => "USD",
                }
                .to_string()
            });
        }
        amounts.push(value);
    }

    if amounts.is_empty() {
        return None;
    }

    let period = if lower.contains("hour") {
        Some("hourly".to_string())
    } else if lower.contains("year") || lower.contains("annual") {
        Some("yearly".to_string())
    } else if lower.contains("month") {
        Some("monthly".to_string())
    } else {
        None
    };

    let (min, max) = if lower.contains("up to") {
        (None, Some(amounts[0]))
    } else if lower.contains("from") && amounts.len() == 1 {
        (Some(amounts[0]), None)
    } else if amounts.len() >= 2 {
        (Some(amounts[0]), Some(amounts[1]))
    } else {
        (Some(amounts[0]), Some(amounts[0]))
    };

    Some(SalaryRange {
        min,
        max,
        currency,
        period,
    })
}

fn job_type(employment_type: Option<&str>, haystack: &str) -> Option<String> {
    if let Some(et) = employment_type {
        let mapped = match et.to_uppercase().as_str() {
            "FULLTIME" | "FULL-TIME" | "FULL_TIME" => "full-time",
            "PARTTIME" | "PART-TIME" | "PART_TIME" => "part-time",
            "CONTRACTOR" | "CONTRACT" => "contract",
            "INTERN" | "INTERNSHIP" => "internship",
            _ => return Some("full-time".to_string()),
        };
        return Some(mapped.to_string());
    }

    if haystack.contains("part-time") || haystack.contains("part time") {
        Some("part-time".to_string())
    } else if haystack.contains("contract") {
        Some("contract".to_string())
    } else if haystack.contains("intern") {
        Some("internship".to_string())
    } else {
        Some("full-time".to_string())
    }
}

fn experience_level(haystack: &str) -> &'static str {
    const SENIOR: [&str; 7] = [
        "senior", "sr.", "lead", "principal", "staff", "architect", "director",
    ];
    const ENTRY: [&str; 6] = ["junior", "jr.", "entry", "associate", "graduate", "intern"];

    if SENIOR.iter().any(|kw| haystack.contains(kw)) {
        "senior"
    } else if ENTRY.iter().any(|kw| haystack.contains(kw)) {
        "entry"
    } else {
        "mid"
    }
}

fn remote_type(is_remote: Option<bool>, haystack: &str) -> &'static str {
    if haystack.contains("hybrid") {
        return "hybrid";
    }
    match is_remote {
        Some(true) => "remote",
        Some(false) => "on-site",
        None => {
            if haystack.contains("remote") || haystack.contains("work from home") {
                "remote"
            } else {
                "on-site"
            }
        }
    }
}
