use std::collections::HashMap;

use crate::models::{
    AssessmentCatalog, AttentionReport, CommonChallenge, FlaggedRep, LowScoreItem, RepScores,
};
use crate::scores::{average, round_tenth};

/// A recorded score below this counts as low, both for individual
/// assessments and for monthly averages.
pub const LOW_SCORE_THRESHOLD: f64 = 3.0;
/// How many consecutive below-threshold monthly averages flag a rep.
pub const CONSECUTIVE_LOW_MONTHS: usize = 2;
/// Flagged reps with fewer qualifying individual low scores are dropped.
pub const MIN_LOW_SCORE_ITEMS: usize = 2;

/// Scans every rep for sustained low performance and rolls the survivors'
/// weak assessments up into a ranked list of common challenges. Empty
/// input produces an empty report.
pub fn find_attention(rep_scores: &[RepScores], catalog: &AssessmentCatalog) -> AttentionReport {
    let mut flagged = Vec::new();

    for entry in rep_scores {
        let averages: Vec<f64> = entry.months.iter().map(|scores| average(scores)).collect();
        if !has_consecutive_low(&averages) {
            continue;
        }

        let low_scores = collect_low_scores(entry, catalog);
        if low_scores.len() < MIN_LOW_SCORE_ITEMS {
            continue;
        }

        let total: f64 = low_scores.iter().map(|item| item.score).sum();
        flagged.push(FlaggedRep {
            rep_id: entry.rep.id,
            name: entry.rep.full_name.clone(),
            low_score_count: low_scores.len(),
            average_low_score: round_tenth(total / low_scores.len() as f64),
            low_scores,
        });
    }

    let common_challenges = rank_challenges(&flagged);
    AttentionReport {
        flagged,
        common_challenges,
    }
}

/// An average of 0 means the month was never assessed, which is not the
/// same as scoring low, so only months in (0, threshold) qualify.
fn has_consecutive_low(averages: &[f64]) -> bool {
    averages
        .windows(CONSECUTIVE_LOW_MONTHS)
        .any(|window| window.iter().all(|avg| *avg > 0.0 && *avg < LOW_SCORE_THRESHOLD))
}

fn collect_low_scores(entry: &RepScores, catalog: &AssessmentCatalog) -> Vec<LowScoreItem> {
    let mut items = Vec::new();
    for (month_idx, scores) in entry.months.iter().enumerate() {
        let month = month_idx + 1;
        for (pos_idx, score) in scores.iter().enumerate() {
            if *score <= 0.0 || *score >= LOW_SCORE_THRESHOLD {
                continue;
            }
            let assessment = catalog
                .name_at(month, pos_idx + 1)
                .unwrap_or("Unknown assessment")
                .to_string();
            items.push(LowScoreItem {
                assessment,
                score: *score,
                month_label: format!("Month {month}"),
            });
        }
    }
    items
}

/// Ranked by how many flagged reps' low scores name the assessment,
/// descending; ties keep first-encountered order.
fn rank_challenges(flagged: &[FlaggedRep]) -> Vec<CommonChallenge> {
    let mut stats: HashMap<&str, (usize, usize, f64)> = HashMap::new();

    for rep in flagged {
        for item in &rep.low_scores {
            let first_seen = stats.len();
            let entry = stats
                .entry(item.assessment.as_str())
                .or_insert((first_seen, 0, 0.0));
            entry.1 += 1;
            entry.2 += item.score;
        }
    }

    let mut ranked: Vec<(usize, CommonChallenge)> = stats
        .into_iter()
        .map(|(assessment, (first_seen, count, total))| {
            (
                first_seen,
                CommonChallenge {
                    assessment: assessment.to_string(),
                    count,
                    average_score: round_tenth(total / count as f64),
                },
            )
        })
        .collect();

    ranked.sort_by(|a, b| b.1.count.cmp(&a.1.count).then(a.0.cmp(&b.0)));
    ranked.into_iter().map(|(_, challenge)| challenge).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AssessmentDef, RepRecord, Role};
    use chrono::NaiveDate;
    use uuid::Uuid;

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

    fn rep_with_months(name: &str, months: Vec<Vec<f64>>) -> RepScores {
        RepScores {
            rep: RepRecord {
                id: Uuid::new_v4(),
                full_name: name.to_string(),
                email: format!("{}@example.com", name.to_lowercase().replace(' ', ".")),
                role: Role::SalesRep,
                manager_email: None,
                start_date: NaiveDate::from_ymd_opt(2026, 1, 5).expect("valid date"),
            },
            months,
        }
    }

    #[test]
    fn flags_two_consecutive_low_months() {
        let entry = rep_with_months(
            "Avery Quinn",
            vec![
                vec![2.0, 2.0, 2.0, 2.0, 2.0],
                vec![2.0, 2.0, 2.0, 2.0, 2.0, 2.0],
                vec![5.0, 5.0, 5.0, 5.0, 5.0, 5.0],
            ],
        );
        let report = find_attention(&[entry], &catalog());

        assert_eq!(report.flagged.len(), 1);
        let flagged = &report.flagged[0];
        assert_eq!(flagged.low_score_count, 11);
        assert_eq!(flagged.average_low_score, 2.0);
        assert!(flagged.low_score_count >= MIN_LOW_SCORE_ITEMS);
        assert_eq!(flagged.low_scores[0].month_label, "Month 1");
        assert_eq!(flagged.low_scores[0].assessment, "Skill 1-1");
    }

    #[test]
    fn does_not_flag_non_consecutive_low_months() {
        let entry = rep_with_months(
            "Noa Kim",
            vec![
                vec![2.0, 2.0, 2.0, 2.0, 2.0],
                vec![4.0, 4.0, 4.0, 4.0, 4.0, 4.0],
                vec![2.0, 2.0, 2.0, 2.0, 2.0, 2.0],
            ],
        );
        let report = find_attention(&[entry], &catalog());
        assert!(report.flagged.is_empty());
        assert!(report.common_challenges.is_empty());
    }

    #[test]
    fn unassessed_months_are_not_low_months() {
        // All-zero months average to 0, which is "not assessed", never "low".
        let entry = rep_with_months(
            "Sam Ortiz",
            vec![
                vec![0.0, 0.0, 0.0, 0.0, 0.0],
                vec![0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
                vec![0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            ],
        );
        let report = find_attention(&[entry], &catalog());
        assert!(report.flagged.is_empty());
    }

    #[test]
    fn a_single_low_month_next_to_an_unassessed_month_does_not_flag() {
        let entry = rep_with_months(
            "Ira Bell",
            vec![
                vec![2.0, 2.0, 0.0, 0.0, 0.0],
                vec![0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
                vec![0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            ],
        );
        let report = find_attention(&[entry], &catalog());
        assert!(report.flagged.is_empty());
    }

    #[test]
    fn every_flagged_rep_carries_enough_low_scores() {
        let sparse = rep_with_months(
            "Ira Bell",
            vec![vec![2.5, 0.0, 0.0, 0.0, 0.0], vec![2.5, 0.0, 0.0, 0.0, 0.0, 0.0], vec![]],
        );
        let report = find_attention(&[sparse], &catalog());
        for flagged in &report.flagged {
            assert!(flagged.low_score_count >= MIN_LOW_SCORE_ITEMS);
        }
    }

    #[test]
    fn challenges_rank_by_count_then_first_encounter() {
        let first = rep_with_months(
            "Avery Quinn",
            vec![
                vec![2.0, 2.5, 0.0, 0.0, 0.0],
                vec![2.0, 0.0, 0.0, 0.0, 0.0, 0.0],
                vec![],
            ],
        );
        let second = rep_with_months(
            "Noa Kim",
            vec![
                vec![2.0, 0.0, 0.0, 0.0, 0.0],
                vec![2.5, 0.0, 0.0, 0.0, 0.0, 0.0],
                vec![],
            ],
        );
        let report = find_attention(&[first, second], &catalog());
        assert_eq!(report.flagged.len(), 2);

        // Skill 1-1 and Skill 2-1 tie at two mentions each; Skill 1-1 was
        // encountered first and stays ahead.
        assert_eq!(report.common_challenges[0].assessment, "Skill 1-1");
        assert_eq!(report.common_challenges[0].count, 2);
        assert_eq!(report.common_challenges[1].assessment, "Skill 2-1");
        assert_eq!(report.common_challenges[1].count, 2);
        assert_eq!(report.common_challenges[2].assessment, "Skill 1-2");
        assert_eq!(report.common_challenges[2].count, 1);
    }

    #[test]
    fn empty_input_yields_empty_report() {
        let report = find_attention(&[], &catalog());
        assert!(report.flagged.is_empty());
        assert!(report.common_challenges.is_empty());
    }
}
