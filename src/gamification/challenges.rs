use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;

use crate::types::{ActivityPoint, Challenge, ChallengeType};

/// Longest accepted challenge window, in days.
pub const MAX_DURATION_DAYS: i64 = 3650;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeStatus {
    InProgress,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChallengeProgress {
    pub status: ChallengeStatus,
    /// Activity count, window total, or worst day, depending on the type.
    pub current: f64,
    pub target: f64,
    pub progress_pct: f64,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub days_remaining: i64,
}

/// Evaluates a joined challenge against the user's activities.
///
/// The window runs from `joined_at` for `duration_days`. Counting challenges
/// complete as soon as the target is reached. Limit challenges fail as soon
/// as the limit is exceeded and complete once the window closes.
#[must_use]
pub fn evaluate(
    challenge: &Challenge,
    joined_at: DateTime<Utc>,
    points: &[ActivityPoint],
    now: DateTime<Utc>,
) -> ChallengeProgress {
    let days = challenge.duration_days.clamp(1, MAX_DURATION_DAYS);
    let window_end = joined_at
        .checked_add_signed(Duration::days(days))
        .unwrap_or(DateTime::<Utc>::MAX_UTC);
    let window_closed = now >= window_end;
    let in_window: Vec<&ActivityPoint> = points
        .iter()
        .filter(|p| p.created_at >= joined_at && p.created_at < window_end)
        .collect();
    let target = challenge.target_value;

    let (current, status) = match challenge.challenge_type {
        ChallengeType::ActivityCount => {
            let count = in_window.len() as f64;
            let status = if count >= target {
                ChallengeStatus::Completed
            } else if window_closed {
                ChallengeStatus::Failed
            } else {
                ChallengeStatus::InProgress
            };
            (count, status)
        }
        ChallengeType::TotalLimit => {
            let total: f64 = in_window.iter().map(|p| p.co2e_amount).sum();
            (total, limit_status(total > target, window_closed))
        }
        ChallengeType::DailyLimit => {
            let mut per_day: BTreeMap<NaiveDate, f64> = BTreeMap::new();
            for p in &in_window {
                *per_day.entry(p.created_at.date_naive()).or_default() += p.co2e_amount;
            }
            let worst = per_day.values().copied().fold(0.0, f64::max);
            (worst, limit_status(worst > target, window_closed))
        }
    };

    let progress_pct = match challenge.challenge_type {
        ChallengeType::ActivityCount if target > 0.0 => (current / target * 100.0).min(100.0),
        ChallengeType::ActivityCount => 100.0,
        _ => {
            let total = (window_end - joined_at).num_seconds().max(1) as f64;
            let elapsed = (now.min(window_end) - joined_at).num_seconds().max(0) as f64;
            (elapsed / total * 100.0).min(100.0)
        }
    };

    ChallengeProgress {
        status,
        current: (current * 1000.0).round() / 1000.0,
        target,
        progress_pct: progress_pct.round(),
        window_start: joined_at,
        window_end,
        days_remaining: (window_end - now).num_days().max(0),
    }
}

fn limit_status(exceeded: bool, window_closed: bool) -> ChallengeStatus {
    if exceeded {
        ChallengeStatus::Failed
    } else if window_closed {
        ChallengeStatus::Completed
    } else {
        ChallengeStatus::InProgress
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Category;

    fn challenge(challenge_type: ChallengeType, target_value: f64) -> Challenge {
        Challenge {
            id: 1,
            name: "Test".to_string(),
            description: None,
            challenge_type,
            target_value,
            target_unit: "kg_co2e".to_string(),
            duration_days: 7,
            badge_name: None,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    fn point(at: DateTime<Utc>, co2e: f64) -> ActivityPoint {
        ActivityPoint {
            user_id: 1,
            scenario_id: 1,
            category: Category::Transport,
            activity_type: "bus".to_string(),
            co2e_amount: co2e,
            created_at: at,
        }
    }

    fn joined() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-03-04T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_activity_count_completes_early() {
        let c = challenge(ChallengeType::ActivityCount, 2.0);
        let j = joined();
        let points = vec![point(j + Duration::hours(1), 1.0), point(j + Duration::hours(2), 1.0)];
        let progress = evaluate(&c, j, &points, j + Duration::days(1));
        assert_eq!(progress.status, ChallengeStatus::Completed);
        assert_eq!(progress.current, 2.0);
        assert_eq!(progress.progress_pct, 100.0);
    }

    #[test]
    fn test_activities_before_joining_ignored() {
        let c = challenge(ChallengeType::ActivityCount, 1.0);
        let j = joined();
        let points = vec![point(j - Duration::hours(1), 1.0)];
        let progress = evaluate(&c, j, &points, j + Duration::days(8));
        assert_eq!(progress.status, ChallengeStatus::Failed);
        assert_eq!(progress.current, 0.0);
    }

    #[test]
    fn test_total_limit() {
        let c = challenge(ChallengeType::TotalLimit, 10.0);
        let j = joined();
        let points = vec![point(j + Duration::days(1), 4.0), point(j + Duration::days(2), 5.0)];

        let mid = evaluate(&c, j, &points, j + Duration::days(3));
        assert_eq!(mid.status, ChallengeStatus::InProgress);
        assert_eq!(mid.days_remaining, 4);

        let end = evaluate(&c, j, &points, j + Duration::days(7));
        assert_eq!(end.status, ChallengeStatus::Completed);

        let mut over = points.clone();
        over.push(point(j + Duration::days(3), 2.0));
        let failed = evaluate(&c, j, &over, j + Duration::days(4));
        assert_eq!(failed.status, ChallengeStatus::Failed);
        assert_eq!(failed.current, 11.0);
    }

    #[test]
    fn test_oversized_duration_is_capped() {
        let mut c = challenge(ChallengeType::ActivityCount, 1.0);
        c.duration_days = 200_000_000;
        let j = joined();
        let progress = evaluate(&c, j, &[], j + Duration::days(1));
        assert_eq!(progress.status, ChallengeStatus::InProgress);
        assert_eq!(progress.window_end, j + Duration::days(MAX_DURATION_DAYS));
    }

    #[test]
    fn test_daily_limit_checks_each_day() {
        let c = challenge(ChallengeType::DailyLimit, 5.0);
        let j = joined();
        let points = vec![
            point(j + Duration::hours(1), 3.0),
            point(j + Duration::days(1), 4.0),
            point(j + Duration::days(1) + Duration::hours(1), 0.5),
        ];
        let ok = evaluate(&c, j, &points, j + Duration::days(8));
        assert_eq!(ok.status, ChallengeStatus::Completed);
        assert_eq!(ok.current, 4.5);

        let mut bad = points.clone();
        bad.push(point(j + Duration::hours(2), 2.5));
        let failed = evaluate(&c, j, &bad, j + Duration::days(2));
        assert_eq!(failed.status, ChallengeStatus::Failed);
    }
}
