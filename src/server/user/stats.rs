use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use axum::{Json, extract::State, response::IntoResponse};
use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::auth::RequireUser;
use crate::gamification::level_info;
use crate::server::AppState;
use crate::server::dto::{
    ActivityTypeTotal, CategoryChange, Report, ReportTotals, StatsSummary, UserSummary,
    WeeklyChart, WeeklyComparison,
};
use crate::server::response::{ApiError, ApiResponse, StoreResultExt};
use crate::types::{ActivityPoint, Category};

const CHART_DAYS: i64 = 7;
const TOP_ACTIVITIES: usize = 5;
/// Active scenarios are capped per user, so one page holds them all.
const REPORT_SCENARIOS: i64 = 50;

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

fn change_pct(current: f64, previous: f64) -> Option<f64> {
    (previous > 0.0).then(|| round2((current - previous) / previous * 100.0))
}

/// Daily totals for the seven days ending `today`, oldest first.
fn daily_series(points: &[ActivityPoint], today: NaiveDate) -> WeeklyChart {
    let mut per_day: HashMap<NaiveDate, f64> = HashMap::new();
    for p in points {
        *per_day.entry(p.created_at.date_naive()).or_default() += p.co2e_amount;
    }

    let (labels, values) = (0..CHART_DAYS)
        .rev()
        .map(|offset| {
            let day = today - Duration::days(offset);
            (
                day.format("%a").to_string(),
                round3(per_day.get(&day).copied().unwrap_or(0.0)),
            )
        })
        .unzip();

    WeeklyChart { labels, values }
}

/// The last seven days against the seven days before them.
fn compare_weeks(points: &[ActivityPoint], now: DateTime<Utc>) -> WeeklyComparison {
    let current_start = now - Duration::days(7);
    let previous_start = now - Duration::days(14);

    let mut current: HashMap<Category, f64> = HashMap::new();
    let mut previous: HashMap<Category, f64> = HashMap::new();
    for p in points {
        if p.created_at >= current_start && p.created_at <= now {
            *current.entry(p.category).or_default() += p.co2e_amount;
        } else if p.created_at >= previous_start && p.created_at < current_start {
            *previous.entry(p.category).or_default() += p.co2e_amount;
        }
    }

    let categories = Category::ALL
        .iter()
        .map(|category| {
            let cur = current.get(category).copied().unwrap_or(0.0);
            let prev = previous.get(category).copied().unwrap_or(0.0);
            CategoryChange {
                category: category.to_string(),
                current: round3(cur),
                previous: round3(prev),
                change_pct: change_pct(cur, prev),
            }
        })
        .collect();

    let current_total: f64 = current.values().sum();
    let previous_total: f64 = previous.values().sum();

    WeeklyComparison {
        current_start,
        previous_start,
        current_total: round3(current_total),
        previous_total: round3(previous_total),
        change_pct: change_pct(current_total, previous_total),
        categories,
    }
}

/// Per-category totals and the activity types with the highest emissions.
fn breakdown(points: &[ActivityPoint]) -> (BTreeMap<String, f64>, Vec<ActivityTypeTotal>) {
    let mut by_category: BTreeMap<String, f64> = Category::ALL
        .iter()
        .map(|c| (c.to_string(), 0.0))
        .collect();
    let mut by_type: HashMap<(Category, &str), (i64, f64)> = HashMap::new();

    for p in points {
        *by_category.entry(p.category.to_string()).or_default() += p.co2e_amount;
        let slot = by_type.entry((p.category, p.activity_type.as_str())).or_default();
        slot.0 += 1;
        slot.1 += p.co2e_amount;
    }
    for total in by_category.values_mut() {
        *total = round3(*total);
    }

    let mut top: Vec<ActivityTypeTotal> = by_type
        .into_iter()
        .map(|((category, activity_type), (count, co2e))| ActivityTypeTotal {
            category: category.to_string(),
            activity_type: activity_type.to_string(),
            count,
            co2e: round3(co2e),
        })
        .collect();
    top.sort_by(|a, b| {
        b.co2e
            .total_cmp(&a.co2e)
            .then_with(|| a.activity_type.cmp(&b.activity_type))
    });
    top.truncate(TOP_ACTIVITIES);

    (by_category, top)
}

pub async fn summary(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = auth.user.id;
    let scenarios = state
        .store
        .count_active_scenarios(user_id)
        .api_err("Failed to load stats")?;
    let activities = state
        .store
        .count_user_activities(user_id)
        .api_err("Failed to load stats")?;
    let badges = state
        .store
        .count_completed_challenges(user_id)
        .api_err("Failed to load stats")?;
    let xp = state.store.get_xp(user_id).api_err("Failed to load stats")?;

    Ok(Json(ApiResponse::success(StatsSummary {
        scenarios,
        activities,
        badges,
        level: level_info(xp.xp_total),
    })))
}

pub async fn weekly_chart(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let today = Utc::now().date_naive();
    let since = start_of_day(today - Duration::days(CHART_DAYS - 1));
    let points = state
        .store
        .list_activity_points(Some(auth.user.id), Some(since))
        .api_err("Failed to load chart data")?;

    Ok(Json(ApiResponse::success(daily_series(&points, today))))
}

pub async fn weekly_comparison(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let now = Utc::now();
    let points = state
        .store
        .list_activity_points(Some(auth.user.id), Some(now - Duration::days(14)))
        .api_err("Failed to load weekly comparison")?;

    Ok(Json(ApiResponse::success(compare_weeks(&points, now))))
}

pub async fn report(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = auth.user.id;
    let now = Utc::now();

    let profile = state
        .store
        .get_profile_by_user(user_id)
        .api_err("Failed to build report")?;
    let xp = state.store.get_xp(user_id).api_err("Failed to build report")?;
    let scenarios = state
        .store
        .list_scenarios(user_id, REPORT_SCENARIOS, 0)
        .api_err("Failed to build report")?;
    let points = state
        .store
        .list_activity_points(Some(user_id), None)
        .api_err("Failed to build report")?;

    let co2e: f64 = scenarios.iter().map(|s| s.total_co2e).sum();
    let last_7_days: f64 = points
        .iter()
        .filter(|p| p.created_at >= now - Duration::days(7))
        .map(|p| p.co2e_amount)
        .sum();
    let scenario_count = scenarios.len() as i64;
    let (by_category, top_activities) = breakdown(&points);

    let totals = ReportTotals {
        scenarios: scenario_count,
        activities: points.len() as i64,
        co2e: round3(co2e),
        avg_per_scenario: if scenario_count > 0 {
            round3(co2e / scenario_count as f64)
        } else {
            0.0
        },
        last_7_days: round3(last_7_days),
    };

    Ok(Json(ApiResponse::success(Report {
        user: UserSummary::from(&auth.user),
        profile,
        level: level_info(xp.xp_total),
        totals,
        by_category,
        top_activities,
        scenarios,
        generated_at: now,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(category: Category, activity_type: &str, co2e: f64, at: DateTime<Utc>) -> ActivityPoint {
        ActivityPoint {
            user_id: 1,
            scenario_id: 1,
            category,
            activity_type: activity_type.to_string(),
            co2e_amount: co2e,
            created_at: at,
        }
    }

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
            .and_utc()
    }

    #[test]
    fn test_daily_series_is_oldest_first_with_zero_days() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 9).unwrap(); // a Sunday
        let points = vec![
            point(Category::Transport, "bus", 1.5, at(2025, 3, 9, 8)),
            point(Category::Diet, "beef", 2.0, at(2025, 3, 9, 12)),
            point(Category::Energy, "electricity", 4.0, at(2025, 3, 3, 20)),
        ];
        let chart = daily_series(&points, today);
        assert_eq!(chart.labels, vec!["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"]);
        assert_eq!(chart.values, vec![4.0, 0.0, 0.0, 0.0, 0.0, 0.0, 3.5]);
    }

    #[test]
    fn test_compare_weeks() {
        let now = at(2025, 3, 15, 12);
        let points = vec![
            point(Category::Transport, "bus", 10.0, at(2025, 3, 14, 9)),
            point(Category::Transport, "bus", 5.0, at(2025, 3, 5, 9)),
            point(Category::Diet, "beef", 3.0, at(2025, 3, 6, 9)),
        ];
        let cmp = compare_weeks(&points, now);
        assert_eq!(cmp.current_total, 10.0);
        assert_eq!(cmp.previous_total, 8.0);
        assert_eq!(cmp.change_pct, Some(25.0));

        let transport = cmp.categories.iter().find(|c| c.category == "transport").unwrap();
        assert_eq!(transport.change_pct, Some(100.0));
        let diet = cmp.categories.iter().find(|c| c.category == "diet").unwrap();
        assert_eq!(diet.change_pct, Some(-100.0));
        let waste = cmp.categories.iter().find(|c| c.category == "waste").unwrap();
        assert_eq!(waste.change_pct, None);
    }

    #[test]
    fn test_breakdown_orders_top_activities() {
        let t = at(2025, 3, 1, 0);
        let points = vec![
            point(Category::Diet, "beef", 27.0, t),
            point(Category::Transport, "bus", 0.9, t),
            point(Category::Transport, "bus", 0.9, t),
            point(Category::Energy, "electricity", 3.85, t),
        ];
        let (by_category, top) = breakdown(&points);
        assert_eq!(by_category["diet"], 27.0);
        assert_eq!(by_category["transport"], 1.8);
        assert_eq!(by_category["waste"], 0.0);
        assert_eq!(top[0].activity_type, "beef");
        assert_eq!(top[2].activity_type, "bus");
        assert_eq!(top[2].count, 2);
    }
}
