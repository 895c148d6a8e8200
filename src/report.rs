//! Plain-text rendering of check results for the terminal.

use chrono::NaiveDate;
use std::fmt::Write;

use crate::models::{CheckResponse, CheckStatus, MunicipalityInfo, MunicipalityResult, Outcome, Summary, VehicleInfo};

fn status_label(status: CheckStatus) -> &'static str {
    match status {
        CheckStatus::Clean => "CLEAN ",
        CheckStatus::Fine => "FINES ",
        CheckStatus::Failed => "FAILED",
    }
}

/// One line per municipality, with fine details indented underneath.
pub fn render_result(result: &MunicipalityResult) -> String {
    let mut out = String::new();
    let _ = write!(out, "[{}] {}", status_label(result.status()), result.name);

    match &result.outcome {
        Outcome::Clean => {}
        Outcome::Fine {
            count,
            amount,
            fines,
        } => {
            let _ = write!(out, "  {} fine(s), ₪{}", count, amount);
            for fine in fines {
                out.push_str("\n    ");
                let mut parts = Vec::new();
                if let Some(number) = &fine.number {
                    parts.push(format!("#{}", number));
                }
                if let Some(date) = &fine.date {
                    parts.push(date.clone());
                }
                if let Some(time) = &fine.time {
                    parts.push(time.clone());
                }
                if let Some(location) = &fine.location {
                    parts.push(location.clone());
                }
                if let Some(price) = fine.display_price() {
                    parts.push(price);
                }
                out.push_str(&parts.join("  "));
            }
            if let Some(url) = &result.payment_url {
                let _ = write!(out, "\n    pay: {}", url);
            }
        }
        Outcome::Failed { error } => {
            if !error.is_empty() {
                let _ = write!(out, "  ({})", error);
            }
        }
    }

    out
}

pub fn render_summary(summary: &Summary) -> String {
    format!(
        "{} clean | {} with fines | {} unavailable",
        summary.clean, summary.fine, summary.failed
    )
}

/// Full report: results (optionally filtered by status) followed by the summary.
pub fn render_response(response: &CheckResponse, filter: Option<CheckStatus>) -> String {
    let mut out = String::new();
    let shown = response.filtered(filter);

    for result in &shown {
        out.push_str(&render_result(result));
        out.push('\n');
    }
    if shown.is_empty() {
        out.push_str("No municipalities match this filter.\n");
    }

    out.push('\n');
    out.push_str(&render_summary(&response.summary));
    out.push('\n');

    if response.summary.fine > 0 {
        let _ = writeln!(
            out,
            "Open fines found in {} {}.",
            response.summary.fine,
            if response.summary.fine == 1 {
                "municipality"
            } else {
                "municipalities"
            }
        );
    } else {
        out.push_str("No open fines found.\n");
    }

    out
}

pub fn render_vehicle(vehicle: &VehicleInfo, today: NaiveDate) -> String {
    let mut out = String::new();
    let title = [vehicle.manufacturer.as_deref(), vehicle.model.as_deref()]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");
    let _ = write!(out, "Vehicle: {}", if title.is_empty() { "unknown" } else { title.as_str() });
    if let Some(year) = vehicle.year {
        let _ = write!(out, " ({})", year);
    }
    out.push('\n');

    let fields = [
        ("Color", vehicle.color.as_deref()),
        ("Fuel", vehicle.fuel.as_deref()),
        ("Trim", vehicle.trim.as_deref()),
        ("Ownership", vehicle.ownership.as_deref()),
        ("Engine", vehicle.engine.as_deref()),
        ("Last test", vehicle.last_test.as_deref()),
        ("Test valid until", vehicle.test_expiry.as_deref()),
        ("On road since", vehicle.on_road_since.as_deref()),
        ("Chassis", vehicle.chassis.as_deref()),
    ];
    for (label, value) in fields {
        if let Some(value) = value {
            let _ = writeln!(out, "  {:<17}{}", label, value);
        }
    }

    if vehicle.test_expiry.is_some() {
        if vehicle.test_expired(today) {
            out.push_str("  Roadworthiness test EXPIRED\n");
        } else {
            out.push_str("  Roadworthiness test valid\n");
        }
    }

    out
}

pub fn render_municipality(info: &MunicipalityInfo, image: Option<&str>) -> String {
    match image {
        Some(url) => format!("{:<4} {}  {}", info.initials, info.name, url),
        None => format!("{:<4} {}", info.initials, info.name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Fine;

    fn fine(number: &str, amount: f64) -> Fine {
        Fine {
            number: Some(number.to_string()),
            amount: Some(amount),
            price_display: None,
            date: Some("2026-01-02".to_string()),
            time: None,
            location: None,
            comments: None,
        }
    }

    #[test]
    fn test_render_fine_result() {
        let result = MunicipalityResult::with_fines("B", "100.00", vec![fine("1", 100.0)]);
        let text = render_result(&result);
        assert!(text.starts_with("[FINES ] B  1 fine(s), ₪100.00"));
        assert!(text.contains("#1  2026-01-02  ₪100"));
    }

    #[test]
    fn test_render_response_filters() {
        let response = CheckResponse {
            results: vec![
                MunicipalityResult::clean("A"),
                MunicipalityResult::failed("C", "site down"),
            ],
            summary: Summary {
                clean: 1,
                fine: 0,
                failed: 1,
            },
        };

        let text = render_response(&response, Some(CheckStatus::Failed));
        assert!(text.contains("[FAILED] C  (site down)"));
        assert!(!text.contains("[CLEAN ] A"));
        assert!(text.contains("No open fines found."));

        let text = render_response(&response, Some(CheckStatus::Fine));
        assert!(text.contains("No municipalities match this filter."));
    }

    #[test]
    fn test_render_vehicle_marks_expired_test() {
        let vehicle = VehicleInfo {
            found: true,
            manufacturer: Some("Toyota".to_string()),
            model: Some("Corolla".to_string()),
            year: Some(2018),
            test_expiry: Some("2025-01-01".to_string()),
            ..Default::default()
        };
        let today = NaiveDate::from_ymd_opt(2026, 10, 17).unwrap();
        let text = render_vehicle(&vehicle, today);

        assert!(text.starts_with("Vehicle: Toyota Corolla (2018)"));
        assert!(text.contains("EXPIRED"));
    }
}
