use std::collections::HashMap;

use uuid::Uuid;

use crate::models::{
    AssessmentCatalog, DistributionBucket, MonthlyScore, RepPerformance, RepRecord, RepScores,
    ScoreRow,
};

pub const MAX_SCORE: f64 = 5.0;

/// Mean of the strictly-positive entries, rounded to one decimal. A score
/// of 0 means "not yet assessed" and never counts against the average;
/// empty or fully-unassessed input yields 0.
pub fn average(scores: &[f64]) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for score in scores {
        if *score > 0.0 {
            sum += *score;
            count += 1;
        }
    }
    if count == 0 {
        0.0
    } else {
        round_tenth(sum / count as f64)
    }
}

pub fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Shapes raw score rows into one dense array per month per rep, sized
/// exactly like the catalog. Missing or non-positive entries become 0.0;
/// rows pointing outside the catalog are dropped.
pub fn normalize(
    reps: &[RepRecord],
    rows: &[ScoreRow],
    catalog: &AssessmentCatalog,
) -> Vec<RepScores> {
    let mut by_rep: HashMap<Uuid, Vec<Vec<f64>>> = HashMap::new();
    for rep in reps {
        let months = (1..=catalog.month_count())
            .map(|month| vec![0.0; catalog.assessments_in_month(month)])
            .collect();
        by_rep.insert(rep.id, months);
    }

    for row in rows {
        if row.month < 1 || row.position < 1 {
            continue;
        }
        let Some(months) = by_rep.get_mut(&row.rep_id) else {
            continue;
        };
        let slot = months
            .get_mut(row.month as usize - 1)
            .and_then(|scores| scores.get_mut(row.position as usize - 1));
        if let Some(slot) = slot {
            *slot = if row.score.is_finite() && row.score > 0.0 {
                row.score
            } else {
                0.0
            };
        }
    }

    reps.iter()
        .map(|rep| RepScores {
            rep: rep.clone(),
            months: by_rep.remove(&rep.id).unwrap_or_default(),
        })
        .collect()
}

/// Signed improvement across the months that have any recorded scores:
/// last valid month's average minus the first valid month's. None when
/// fewer than two months qualify, so "no change" and "nothing to compare
/// yet" stay distinguishable.
pub fn improvement(months: &[Vec<f64>]) -> Option<f64> {
    let valid: Vec<f64> = months
        .iter()
        .map(|scores| average(scores))
        .filter(|avg| *avg > 0.0)
        .collect();
    if valid.len() < 2 {
        return None;
    }
    Some(round_tenth(valid[valid.len() - 1] - valid[0]))
}

/// A rep's average across every assessed score in their history.
pub fn overall_average(months: &[Vec<f64>]) -> f64 {
    let all: Vec<f64> = months.iter().flatten().copied().collect();
    average(&all)
}

pub fn team_performance(rep_scores: &[RepScores]) -> Vec<RepPerformance> {
    let mut performances: Vec<RepPerformance> = rep_scores
        .iter()
        .map(|entry| RepPerformance {
            rep_id: entry.rep.id,
            name: entry.rep.full_name.clone(),
            email: entry.rep.email.clone(),
            monthly: entry
                .months
                .iter()
                .enumerate()
                .map(|(idx, scores)| MonthlyScore {
                    month: idx as i32 + 1,
                    average: average(scores),
                })
                .collect(),
            overall_average: overall_average(&entry.months),
            improvement: improvement(&entry.months),
        })
        .collect();

    performances.sort_by(|a, b| {
        b.overall_average
            .partial_cmp(&a.overall_average)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    performances
}

pub struct ScoreBand {
    pub label: &'static str,
    pub lower: f64,
    pub upper: f64,
    pub closed_upper: bool,
}

impl ScoreBand {
    /// Lower-inclusive, upper-exclusive, except the top band which is
    /// closed at the score ceiling.
    pub fn contains(&self, value: f64) -> bool {
        if value < self.lower {
            return false;
        }
        if self.closed_upper {
            value <= self.upper
        } else {
            value < self.upper
        }
    }
}

/// Contiguous partition of [0, 5]; boundary values fall in the band where
/// they are the lower bound.
pub const SCORE_BANDS: [ScoreBand; 3] = [
    ScoreBand {
        label: "Developing (below 3.0)",
        lower: 0.0,
        upper: 3.0,
        closed_upper: false,
    },
    ScoreBand {
        label: "Solid (3.0 to 3.9)",
        lower: 3.0,
        upper: 4.0,
        closed_upper: false,
    },
    ScoreBand {
        label: "Strong (4.0 to 5.0)",
        lower: 4.0,
        upper: MAX_SCORE,
        closed_upper: true,
    },
];

/// Counts reps per score band by overall average. Reps with no positive
/// score anywhere are left out entirely, so the counts sum to the number
/// of reps assessed at least once.
pub fn score_distribution(rep_scores: &[RepScores]) -> Vec<DistributionBucket> {
    let mut buckets: Vec<DistributionBucket> = SCORE_BANDS
        .iter()
        .map(|band| DistributionBucket {
            label: band.label.to_string(),
            count: 0,
        })
        .collect();

    for entry in rep_scores {
        let overall = overall_average(&entry.months);
        if overall <= 0.0 {
            continue;
        }
        for (band, bucket) in SCORE_BANDS.iter().zip(buckets.iter_mut()) {
            if band.contains(overall) {
                bucket.count += 1;
                break;
            }
        }
    }

    buckets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AssessmentDef, Role};
    use chrono::NaiveDate;

    fn catalog() -> AssessmentCatalog {
        let mut rows = Vec::new();
        let months = [5usize, 6, 6];
        for (month_idx, count) in months.iter().enumerate() {
            for position in 1..=*count {
                rows.push(AssessmentDef {
                    month: month_idx as i32 + 1,
                    position: position as i32,
                    name: format!("Skill {}-{}", month_idx + 1, position),
                    label: format!("S{}-{}", month_idx + 1, position),
                });
            }
        }
        AssessmentCatalog::from_rows(rows)
    }

    fn sample_rep(name: &str) -> RepRecord {
        RepRecord {
            id: Uuid::new_v4(),
            full_name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase().replace(' ', ".")),
            role: Role::SalesRep,
            manager_email: Some("dana.reyes@example.com".to_string()),
            start_date: NaiveDate::from_ymd_opt(2026, 1, 5).expect("valid date"),
        }
    }

    fn sheet(rep: RepRecord, months: Vec<Vec<f64>>) -> RepScores {
        RepScores { rep, months }
    }

    #[test]
    fn average_skips_unassessed_entries() {
        assert_eq!(average(&[2.0, 0.0, 4.0]), 3.0);
        assert_eq!(average(&[]), 0.0);
        assert_eq!(average(&[0.0, 0.0]), 0.0);
    }

    #[test]
    fn average_rounds_to_one_decimal() {
        assert_eq!(average(&[2.0, 3.0, 3.0]), 2.7);
        assert_eq!(average(&[4.25, 4.25]), 4.3);
    }

    #[test]
    fn normalize_shapes_rows_like_the_catalog() {
        let catalog = catalog();
        let rep = sample_rep("Avery Quinn");
        let rows = vec![
            ScoreRow {
                rep_id: rep.id,
                month: 1,
                position: 2,
                score: 4.5,
            },
            ScoreRow {
                rep_id: rep.id,
                month: 3,
                position: 6,
                score: 3.0,
            },
            // Outside the catalog, dropped.
            ScoreRow {
                rep_id: rep.id,
                month: 9,
                position: 1,
                score: 5.0,
            },
        ];

        let sheets = normalize(&[rep], &rows, &catalog);
        assert_eq!(sheets.len(), 1);
        let months = &sheets[0].months;
        assert_eq!(months.len(), 3);
        assert_eq!(months[0].len(), 5);
        assert_eq!(months[1].len(), 6);
        assert_eq!(months[2].len(), 6);
        assert_eq!(months[0][1], 4.5);
        assert_eq!(months[0][0], 0.0);
        assert_eq!(months[2][5], 3.0);
    }

    #[test]
    fn improvement_spans_first_to_last_assessed_month() {
        let months = vec![
            vec![2.0, 2.0, 2.0, 2.0, 2.0],
            vec![2.0, 2.0, 2.0, 2.0, 2.0, 2.0],
            vec![5.0, 5.0, 5.0, 5.0, 5.0, 5.0],
        ];
        assert_eq!(average(&months[0]), 2.0);
        assert_eq!(average(&months[1]), 2.0);
        assert_eq!(average(&months[2]), 5.0);
        assert_eq!(improvement(&months), Some(3.0));
    }

    #[test]
    fn improvement_needs_two_assessed_months() {
        let one_month = vec![vec![4.0, 4.0], vec![0.0, 0.0], vec![0.0, 0.0]];
        assert_eq!(improvement(&one_month), None);

        let flat = vec![vec![3.0], vec![3.0]];
        assert_eq!(improvement(&flat), Some(0.0));
    }

    #[test]
    fn improvement_skips_unassessed_middle_months() {
        let months = vec![vec![2.5, 2.5], vec![0.0, 0.0], vec![4.0, 4.0]];
        assert_eq!(improvement(&months), Some(1.5));
    }

    #[test]
    fn team_performance_sorts_by_overall_descending() {
        let strong = sheet(sample_rep("Noa Kim"), vec![vec![4.5, 4.5], vec![5.0]]);
        let developing = sheet(sample_rep("Sam Ortiz"), vec![vec![2.0, 2.5], vec![2.5]]);
        let performances = team_performance(&[developing, strong]);

        assert_eq!(performances[0].name, "Noa Kim");
        assert_eq!(performances[0].overall_average, 4.7);
        assert_eq!(performances[1].name, "Sam Ortiz");
        assert_eq!(performances[1].monthly[0].average, 2.3);
    }

    #[test]
    fn distribution_boundaries_belong_to_the_lower_band() {
        let entries = vec![
            sheet(sample_rep("A One"), vec![vec![2.9]]),
            sheet(sample_rep("B Two"), vec![vec![3.0]]),
            sheet(sample_rep("C Three"), vec![vec![4.0]]),
            sheet(sample_rep("D Four"), vec![vec![5.0]]),
        ];
        let buckets = score_distribution(&entries);
        assert_eq!(buckets[0].count, 1);
        assert_eq!(buckets[1].count, 1);
        assert_eq!(buckets[2].count, 2);
    }

    #[test]
    fn distribution_excludes_unassessed_reps() {
        let entries = vec![
            sheet(sample_rep("A One"), vec![vec![0.0, 0.0], vec![0.0]]),
            sheet(sample_rep("B Two"), vec![vec![3.5, 0.0], vec![0.0]]),
        ];
        let buckets = score_distribution(&entries);
        let total: usize = buckets.iter().map(|bucket| bucket.count).sum();
        assert_eq!(total, 1);
    }
}
