use std::collections::HashMap;

use chrono::{Datelike, NaiveDate};
use uuid::Uuid;

use crate::models::{
    MetricRamp, MetricSummary, RampActualRow, RampExpectationRow, RampMetric, RampMonthView,
    RepRampView, RepRecord, TeamRampSummary,
};
use crate::scores::round_tenth;

/// Length of the onboarding window, in months.
pub const RAMP_MONTHS: usize = 6;

/// A metric's target curve: one expected count per ramp month, with an
/// optional admin note on each.
#[derive(Debug, Clone, Default)]
pub struct TargetCurve {
    pub expected: [i32; RAMP_MONTHS],
    pub notes: [Option<String>; RAMP_MONTHS],
}

pub fn build_target_curves(rows: &[RampExpectationRow]) -> HashMap<RampMetric, TargetCurve> {
    let mut curves: HashMap<RampMetric, TargetCurve> = HashMap::new();
    for row in rows {
        let Some(metric) = RampMetric::parse(&row.metric) else {
            continue;
        };
        if row.month < 1 || row.month as usize > RAMP_MONTHS {
            continue;
        }
        let curve = curves.entry(metric).or_default();
        curve.expected[row.month as usize - 1] = row.expected;
        curve.notes[row.month as usize - 1] = row.note.clone();
    }
    curves
}

/// Which ramp month a rep is in as of the given date: 1 throughout the
/// first month on the job, clamped to the ramp window afterwards, 0
/// before the start date.
pub fn ramp_month(start: NaiveDate, as_of: NaiveDate) -> usize {
    if as_of < start {
        return 0;
    }
    let mut elapsed =
        (as_of.year() - start.year()) * 12 + as_of.month() as i32 - start.month() as i32;
    if as_of.day() < start.day() {
        elapsed -= 1;
    }
    ((elapsed + 1).max(1) as usize).min(RAMP_MONTHS)
}

/// Pairs each rep's recorded actuals with the target curves, month by
/// month. A month with no recorded actual counts as 0 but keeps
/// `recorded: false` so dashboards can show it as pending.
pub fn rep_ramp_views(
    reps: &[RepRecord],
    actuals: &[RampActualRow],
    curves: &HashMap<RampMetric, TargetCurve>,
    as_of: NaiveDate,
) -> Vec<RepRampView> {
    let mut recorded: HashMap<(Uuid, RampMetric), [Option<i32>; RAMP_MONTHS]> = HashMap::new();
    for row in actuals {
        let Some(metric) = RampMetric::parse(&row.metric) else {
            continue;
        };
        if row.month < 1 || row.month as usize > RAMP_MONTHS {
            continue;
        }
        recorded
            .entry((row.rep_id, metric))
            .or_insert([None; RAMP_MONTHS])[row.month as usize - 1] = Some(row.count);
    }

    reps.iter()
        .map(|rep| {
            let metrics = RampMetric::ALL
                .iter()
                .map(|metric| {
                    let counts = recorded
                        .get(&(rep.id, *metric))
                        .copied()
                        .unwrap_or([None; RAMP_MONTHS]);
                    let curve = curves.get(metric);
                    let months = (0..RAMP_MONTHS)
                        .map(|idx| {
                            let target = curve.map_or(0, |c| c.expected[idx]);
                            let actual = counts[idx].unwrap_or(0);
                            RampMonthView {
                                month: idx as i32 + 1,
                                target,
                                note: curve.and_then(|c| c.notes[idx].clone()),
                                actual,
                                recorded: counts[idx].is_some(),
                                achieved: actual >= target,
                            }
                        })
                        .collect();
                    MetricRamp {
                        metric: *metric,
                        months,
                    }
                })
                .collect();

            RepRampView {
                rep_id: rep.id,
                name: rep.full_name.clone(),
                email: rep.email.clone(),
                ramp_month: ramp_month(rep.start_date, as_of),
                metrics,
            }
        })
        .collect()
}

/// Team rollup: per metric, the share of achieved rep-months (only
/// counting months each rep has actually been ramping) and the mean ramp
/// month of the first positive actual. Empty teams produce zeroed rates.
pub fn team_ramp_summary(views: &[RepRampView]) -> TeamRampSummary {
    let metrics = RampMetric::ALL
        .iter()
        .map(|metric| {
            let mut achieved = 0usize;
            let mut considered = 0usize;
            let mut first_months: Vec<usize> = Vec::new();

            for view in views {
                let Some(metric_ramp) = view.metrics.iter().find(|m| m.metric == *metric) else {
                    continue;
                };
                for month in metric_ramp.months.iter().take(view.ramp_month) {
                    considered += 1;
                    if month.achieved {
                        achieved += 1;
                    }
                }
                if let Some(first) = metric_ramp.months.iter().find(|m| m.actual > 0) {
                    first_months.push(first.month as usize);
                }
            }

            let achievement_rate = if considered == 0 {
                0.0
            } else {
                round_tenth(achieved as f64 / considered as f64 * 100.0)
            };
            let mean_months_to_first = if first_months.is_empty() {
                None
            } else {
                Some(round_tenth(
                    first_months.iter().sum::<usize>() as f64 / first_months.len() as f64,
                ))
            };

            MetricSummary {
                metric: *metric,
                achievement_rate,
                mean_months_to_first,
            }
        })
        .collect();

    TeamRampSummary {
        rep_count: views.len(),
        metrics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn rep(start: NaiveDate) -> RepRecord {
        RepRecord {
            id: Uuid::new_v4(),
            full_name: "Avery Quinn".to_string(),
            email: "avery.quinn@example.com".to_string(),
            role: Role::SalesRep,
            manager_email: None,
            start_date: start,
        }
    }

    fn expectations(metric: RampMetric, targets: [i32; RAMP_MONTHS]) -> Vec<RampExpectationRow> {
        targets
            .iter()
            .enumerate()
            .map(|(idx, expected)| RampExpectationRow {
                metric: metric.as_str().to_string(),
                month: idx as i32 + 1,
                expected: *expected,
                note: None,
            })
            .collect()
    }

    fn actuals(rep_id: Uuid, metric: RampMetric, counts: [i32; RAMP_MONTHS]) -> Vec<RampActualRow> {
        counts
            .iter()
            .enumerate()
            .map(|(idx, count)| RampActualRow {
                rep_id,
                metric: metric.as_str().to_string(),
                month: idx as i32 + 1,
                count: *count,
            })
            .collect()
    }

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    #[test]
    fn ramp_month_clamps_to_the_window() {
        let start = date(2026, 1, 15);
        assert_eq!(ramp_month(start, date(2026, 1, 10)), 0);
        assert_eq!(ramp_month(start, date(2026, 1, 20)), 1);
        assert_eq!(ramp_month(start, date(2026, 2, 10)), 1);
        assert_eq!(ramp_month(start, date(2026, 2, 20)), 2);
        assert_eq!(ramp_month(start, date(2027, 6, 1)), RAMP_MONTHS);
    }

    #[test]
    fn rep_meeting_every_target_scores_full_achievement() {
        let rep = rep(date(2025, 1, 1));
        let curves = build_target_curves(&expectations(
            RampMetric::DemosBooked,
            [5, 10, 15, 20, 20, 20],
        ));
        let rows = actuals(rep.id, RampMetric::DemosBooked, [6, 11, 16, 21, 21, 21]);

        let views = rep_ramp_views(&[rep], &rows, &curves, date(2026, 6, 1));
        let demos = views[0]
            .metrics
            .iter()
            .find(|m| m.metric == RampMetric::DemosBooked)
            .expect("demos metric present");
        assert!(demos.months.iter().all(|month| month.achieved));

        let summary = team_ramp_summary(&views);
        let demos_summary = summary
            .metrics
            .iter()
            .find(|m| m.metric == RampMetric::DemosBooked)
            .expect("demos summary present");
        assert_eq!(demos_summary.achievement_rate, 100.0);
        assert_eq!(demos_summary.mean_months_to_first, Some(1.0));
    }

    #[test]
    fn unrecorded_months_count_as_zero_but_stay_marked() {
        let rep = rep(date(2025, 1, 1));
        let curves = build_target_curves(&expectations(
            RampMetric::MeetingsBooked,
            [8, 16, 24, 30, 30, 30],
        ));
        let rows = vec![RampActualRow {
            rep_id: rep.id,
            metric: RampMetric::MeetingsBooked.as_str().to_string(),
            month: 1,
            count: 9,
        }];

        let views = rep_ramp_views(&[rep], &rows, &curves, date(2026, 6, 1));
        let meetings = &views[0].metrics[0];
        assert!(meetings.months[0].recorded);
        assert!(meetings.months[0].achieved);
        assert!(!meetings.months[1].recorded);
        assert_eq!(meetings.months[1].actual, 0);
        assert!(!meetings.months[1].achieved);
    }

    #[test]
    fn team_rate_only_counts_months_on_ramp() {
        // Started recently: only month 1 has elapsed, so months 2-6 do not
        // drag the rate down.
        let rep = rep(date(2026, 5, 20));
        let curves = build_target_curves(&expectations(
            RampMetric::DealsOpened,
            [2, 5, 8, 10, 12, 12],
        ));
        let rows = actuals(rep.id, RampMetric::DealsOpened, [3, 0, 0, 0, 0, 0]);

        let views = rep_ramp_views(&[rep], &rows, &curves, date(2026, 6, 1));
        assert_eq!(views[0].ramp_month, 1);

        let summary = team_ramp_summary(&views);
        let deals = summary
            .metrics
            .iter()
            .find(|m| m.metric == RampMetric::DealsOpened)
            .expect("deals summary present");
        assert_eq!(deals.achievement_rate, 100.0);
    }

    #[test]
    fn empty_team_produces_zeroed_summary() {
        let summary = team_ramp_summary(&[]);
        assert_eq!(summary.rep_count, 0);
        assert_eq!(summary.metrics.len(), RampMetric::ALL.len());
        for metric in &summary.metrics {
            assert_eq!(metric.achievement_rate, 0.0);
            assert!(metric.mean_months_to_first.is_none());
        }
    }
}
