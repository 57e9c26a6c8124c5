use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use axum::{Json, extract::State, response::IntoResponse};
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

use crate::auth::RequireAdmin;
use crate::server::AppState;
use crate::server::dto::{
    ActivityInfo, CategoryAverage, ChallengeSuggestion, DailyRange, EmissionEstimates,
    GenerateChallengeRequest, GeneratedChallenges,
};
use crate::server::response::{ApiError, ApiResponse, StoreResultExt};
use crate::types::ActivityPoint;

const OVERVIEW_LIMIT: i64 = 200;
const CATEGORY_WINDOW_DAYS: i64 = 30;

/// Used when nobody has logged anything yet.
const FALLBACK_DAILY: DailyRange = DailyRange {
    avg_daily: 10.0,
    min_daily: 2.0,
    max_daily: 20.0,
};

const TARGET_SUGGESTIONS: [(&str, f64); 7] = [
    ("daily_limit_low", 3.0),
    ("daily_limit_moderate", 7.0),
    ("daily_limit_high", 12.0),
    ("total_week_low", 21.0),
    ("total_week_moderate", 49.0),
    ("total_month_low", 90.0),
    ("total_month_moderate", 210.0),
];

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Per-user daily averages: total emissions over the days between the
/// first and last activity (at least one).
fn daily_range(points: &[ActivityPoint]) -> DailyRange {
    let mut per_user: HashMap<i64, (f64, DateTime<Utc>, DateTime<Utc>)> = HashMap::new();
    for p in points {
        per_user
            .entry(p.user_id)
            .and_modify(|(sum, first, last)| {
                *sum += p.co2e_amount;
                *first = (*first).min(p.created_at);
                *last = (*last).max(p.created_at);
            })
            .or_insert((p.co2e_amount, p.created_at, p.created_at));
    }
    if per_user.is_empty() {
        return FALLBACK_DAILY;
    }

    let daily: Vec<f64> = per_user
        .values()
        .map(|(sum, first, last)| {
            let days = (last.date_naive() - first.date_naive()).num_days().max(1);
            sum / days as f64
        })
        .collect();

    DailyRange {
        avg_daily: round2(daily.iter().sum::<f64>() / daily.len() as f64),
        min_daily: round2(daily.iter().copied().fold(f64::INFINITY, f64::min)),
        max_daily: round2(daily.iter().copied().fold(f64::NEG_INFINITY, f64::max)),
    }
}

fn category_averages(
    points: &[ActivityPoint],
    since: DateTime<Utc>,
) -> BTreeMap<String, CategoryAverage> {
    let mut totals: BTreeMap<String, (f64, i64)> = BTreeMap::new();
    for p in points.iter().filter(|p| p.created_at >= since) {
        let slot = totals.entry(p.category.to_string()).or_default();
        slot.0 += p.co2e_amount;
        slot.1 += 1;
    }
    totals
        .into_iter()
        .map(|(category, (sum, count))| {
            (
                category,
                CategoryAverage {
                    avg_emission: round2(sum / count as f64),
                    activity_count: count,
                },
            )
        })
        .collect()
}

/// Accepts numbers and numeric strings.
fn factor_value(value: Option<&Value>) -> Option<f64> {
    let parsed = match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite() && *v != 0.0)
}

fn suggestions(name: &str, factor: f64) -> BTreeMap<&'static str, ChallengeSuggestion> {
    let word = name.split(' ').next().unwrap_or(name);
    let lower = name.to_lowercase();
    let limit = |multiplier: f64| factor * multiplier;

    BTreeMap::from([
        (
            "daily_limit",
            ChallengeSuggestion {
                name: format!("Daily {name} Limit"),
                description: format!(
                    "Keep your daily {lower} emissions under {:.1} kg CO2e",
                    limit(10.0)
                ),
                challenge_type: "daily_limit",
                target_value: round2(limit(10.0)),
                target_unit: "kg_co2e",
                duration_days: 7,
                badge_name: format!("{word} Saver"),
                reasoning: format!("Based on {factor} kg CO2e per unit, allowing ~10 units/day"),
            },
        ),
        (
            "weekly_total",
            ChallengeSuggestion {
                name: format!("Weekly {name} Challenge"),
                description: format!(
                    "Limit total {lower} to {:.1} kg CO2e this week",
                    limit(50.0)
                ),
                challenge_type: "total_limit",
                target_value: round2(limit(50.0)),
                target_unit: "kg_co2e",
                duration_days: 7,
                badge_name: format!("{word} Warrior"),
                reasoning: "Weekly target allowing ~50 units total".to_string(),
            },
        ),
        (
            "monthly_total",
            ChallengeSuggestion {
                name: format!("Month of {name} Awareness"),
                description: format!(
                    "Stay under {:.1} kg CO2e from {lower} this month",
                    limit(200.0)
                ),
                challenge_type: "total_limit",
                target_value: round2(limit(200.0)),
                target_unit: "kg_co2e",
                duration_days: 30,
                badge_name: format!("{word} Champion"),
                reasoning: "Monthly target for sustainable habits".to_string(),
            },
        ),
        (
            "activity_tracker",
            ChallengeSuggestion {
                name: format!("Track {name}"),
                description: format!("Log 15 {lower} activities to build awareness"),
                challenge_type: "activity_count",
                target_value: 15.0,
                target_unit: "activities",
                duration_days: 14,
                badge_name: format!("{word} Tracker"),
                reasoning: "Focus on tracking behavior before reduction".to_string(),
            },
        ),
    ])
}

pub async fn scenarios_overview(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let scenarios = state
        .store
        .list_active_scenarios_with_owner(OVERVIEW_LIMIT)
        .api_err("Failed to load scenarios")?;
    Ok(Json(ApiResponse::success(scenarios)))
}

pub async fn emission_estimates(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let points = state
        .store
        .list_activity_points(None, None)
        .api_err("Failed to load estimates")?;
    let since = Utc::now() - Duration::days(CATEGORY_WINDOW_DAYS);

    Ok(Json(ApiResponse::success(EmissionEstimates {
        overall: daily_range(&points),
        by_category: category_averages(&points, since),
        suggestions: TARGET_SUGGESTIONS.into_iter().collect(),
    })))
}

/// Challenge templates scaled by an activity's emission factor.
pub async fn generate_challenge(
    _admin: RequireAdmin,
    Json(req): Json<GenerateChallengeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = req
        .activity_name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty());
    let (Some(name), Some(factor)) = (name, factor_value(req.co2e_per_unit.as_ref())) else {
        return Err(ApiError::bad_request(
            "Missing required fields: activity_name, co2e_per_unit",
        ));
    };

    Ok(Json(ApiResponse::success(GeneratedChallenges {
        suggestions: suggestions(name, factor),
        activity_info: ActivityInfo {
            activity_id: req.activity_id,
            activity_name: name.to_string(),
            co2e_per_unit: factor,
            unit: req.unit,
            category: req.category,
        },
    })))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;
    use crate::types::Category;

    fn point(user_id: i64, co2e: f64, day: u32) -> ActivityPoint {
        ActivityPoint {
            user_id,
            scenario_id: user_id,
            category: Category::Transport,
            activity_type: "bus".to_string(),
            co2e_amount: co2e,
            created_at: Utc.with_ymd_and_hms(2025, 5, day, 9, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_daily_range_without_data_uses_defaults() {
        let range = daily_range(&[]);
        assert_eq!(range.avg_daily, 10.0);
        assert_eq!(range.min_daily, 2.0);
        assert_eq!(range.max_daily, 20.0);
    }

    #[test]
    fn test_daily_range_spreads_over_active_days() {
        // User 1: 30 kg over 3 days. User 2: 4 kg on a single day.
        let points = vec![point(1, 10.0, 1), point(1, 20.0, 4), point(2, 4.0, 2)];
        let range = daily_range(&points);
        assert_eq!(range.max_daily, 10.0);
        assert_eq!(range.min_daily, 4.0);
        assert_eq!(range.avg_daily, 7.0);
    }

    #[test]
    fn test_category_averages_respect_window() {
        let points = vec![point(1, 2.0, 1), point(1, 4.0, 10), point(2, 6.0, 11)];
        let since = Utc.with_ymd_and_hms(2025, 5, 5, 0, 0, 0).unwrap();
        let averages = category_averages(&points, since);
        let transport = &averages["transport"];
        assert_eq!(transport.activity_count, 2);
        assert_eq!(transport.avg_emission, 5.0);
    }

    #[test]
    fn test_factor_value_accepts_numeric_strings() {
        assert_eq!(factor_value(Some(&json!(0.21))), Some(0.21));
        assert_eq!(factor_value(Some(&json!("0.5"))), Some(0.5));
        assert_eq!(factor_value(Some(&json!(0))), None);
        assert_eq!(factor_value(Some(&json!("abc"))), None);
        assert_eq!(factor_value(None), None);
    }

    #[test]
    fn test_suggestions_scale_with_factor() {
        let s = suggestions("Car Travel", 0.2);
        let daily = &s["daily_limit"];
        assert_eq!(daily.name, "Daily Car Travel Limit");
        assert_eq!(daily.target_value, 2.0);
        assert_eq!(daily.badge_name, "Car Saver");
        assert_eq!(
            daily.description,
            "Keep your daily car travel emissions under 2.0 kg CO2e"
        );
        assert_eq!(s["weekly_total"].target_value, 10.0);
        assert_eq!(s["monthly_total"].duration_days, 30);
        assert_eq!(s["activity_tracker"].target_unit, "activities");
    }
}
