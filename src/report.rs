use std::fmt::Write;

use chrono::NaiveDate;

use crate::models::{
    AttentionReport, DistributionBucket, RepPerformance, RepRampView, TeamRampSummary,
};
use crate::ramping::RAMP_MONTHS;

pub fn format_improvement(improvement: Option<f64>) -> String {
    match improvement {
        Some(delta) => format!("{delta:+.1}"),
        None => "n/a".to_string(),
    }
}

fn monthly_line(performance: &RepPerformance) -> String {
    performance
        .monthly
        .iter()
        .map(|month| {
            if month.average > 0.0 {
                format!("{:.1}", month.average)
            } else {
                "-".to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" / ")
}

pub fn build_report(
    scope: Option<&str>,
    as_of: NaiveDate,
    performances: &[RepPerformance],
    distribution: &[DistributionBucket],
    attention: &AttentionReport,
    ramp_views: &[RepRampView],
    team_ramp: &TeamRampSummary,
) -> String {
    let mut output = String::new();
    let scope_label = scope.unwrap_or("all reps");

    let _ = writeln!(output, "# Sales Performance Report");
    let _ = writeln!(output, "Generated for {} (as of {})", scope_label, as_of);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Team Performance");

    if performances.is_empty() {
        let _ = writeln!(output, "No reps in scope.");
    } else {
        for performance in performances {
            let _ = writeln!(
                output,
                "- {} ({}): months {} | overall {:.1} | change {}",
                performance.name,
                performance.email,
                monthly_line(performance),
                performance.overall_average,
                format_improvement(performance.improvement)
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Score Distribution");

    let assessed: usize = distribution.iter().map(|bucket| bucket.count).sum();
    if assessed == 0 {
        let _ = writeln!(output, "No reps assessed yet.");
    } else {
        for bucket in distribution {
            let _ = writeln!(output, "- {}: {} reps", bucket.label, bucket.count);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Reps Needing Attention");

    if attention.flagged.is_empty() {
        let _ = writeln!(output, "No reps flagged this period.");
    } else {
        for flagged in &attention.flagged {
            let _ = writeln!(
                output,
                "- {}: {} low scores, averaging {:.1}",
                flagged.name, flagged.low_score_count, flagged.average_low_score
            );
            for item in flagged.low_scores.iter().take(5) {
                let _ = writeln!(
                    output,
                    "  - {} ({}): {:.1}",
                    item.assessment, item.month_label, item.score
                );
            }
        }

        let _ = writeln!(output);
        let _ = writeln!(output, "### Common Challenges");
        for challenge in &attention.common_challenges {
            let _ = writeln!(
                output,
                "- {}: {} low scores (avg {:.1})",
                challenge.assessment, challenge.count, challenge.average_score
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Ramping Progress");

    if team_ramp.rep_count == 0 {
        let _ = writeln!(output, "No reps in scope.");
    } else {
        for metric in &team_ramp.metrics {
            let first = metric
                .mean_months_to_first
                .map(|months| format!("{months:.1} months to first"))
                .unwrap_or_else(|| "no activity yet".to_string());
            let _ = writeln!(
                output,
                "- {}: {:.1}% of rep-months on target ({})",
                metric.metric.label(),
                metric.achievement_rate,
                first
            );
        }

        for view in ramp_views {
            let _ = writeln!(output);
            let month_label = if view.ramp_month == 0 {
                "starts soon".to_string()
            } else {
                format!("month {} of {}", view.ramp_month, RAMP_MONTHS)
            };
            let _ = writeln!(output, "### {} ({})", view.name, month_label);
            for metric in &view.metrics {
                let on_target = metric
                    .months
                    .iter()
                    .take(view.ramp_month)
                    .filter(|month| month.achieved)
                    .count();
                let pending = metric
                    .months
                    .iter()
                    .take(view.ramp_month)
                    .filter(|month| !month.recorded)
                    .count();
                let _ = write!(
                    output,
                    "- {}: {}/{} months on target",
                    metric.metric.label(),
                    on_target,
                    view.ramp_month
                );
                if pending > 0 {
                    let _ = write!(output, " ({pending} pending)");
                }
                let _ = writeln!(output);
            }
        }
    }

    output
}
