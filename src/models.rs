use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Director,
    Manager,
    SalesRep,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Director => "director",
            Role::Manager => "manager",
            Role::SalesRep => "sales_rep",
        }
    }

    pub fn parse(value: &str) -> Option<Role> {
        match value {
            "admin" => Some(Role::Admin),
            "director" => Some(Role::Director),
            "manager" => Some(Role::Manager),
            "sales_rep" => Some(Role::SalesRep),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RepRecord {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub role: Role,
    pub manager_email: Option<String>,
    pub start_date: NaiveDate,
}

/// One recorded score, referencing the assessment catalog by position.
#[derive(Debug, Clone)]
pub struct ScoreRow {
    pub rep_id: Uuid,
    pub month: i32,
    pub position: i32,
    pub score: f64,
}

#[derive(Debug, Clone)]
pub struct AssessmentDef {
    pub month: i32,
    pub position: i32,
    pub name: String,
    pub label: String,
}

/// The per-month assessment tables, ordered by position. Score arrays are
/// linked to assessments purely by index, so lookups here must line up
/// with the positions the rows were recorded under.
#[derive(Debug, Clone, Default)]
pub struct AssessmentCatalog {
    months: Vec<Vec<AssessmentDef>>,
}

impl AssessmentCatalog {
    pub fn from_rows(mut rows: Vec<AssessmentDef>) -> Self {
        rows.sort_by_key(|def| (def.month, def.position));
        let mut months: Vec<Vec<AssessmentDef>> = Vec::new();
        for def in rows {
            if def.month < 1 {
                continue;
            }
            let idx = def.month as usize;
            while months.len() < idx {
                months.push(Vec::new());
            }
            months[idx - 1].push(def);
        }
        AssessmentCatalog { months }
    }

    pub fn month_count(&self) -> usize {
        self.months.len()
    }

    pub fn assessments_in_month(&self, month: usize) -> usize {
        if month == 0 {
            return 0;
        }
        self.months.get(month - 1).map_or(0, |defs| defs.len())
    }

    pub fn name_at(&self, month: usize, position: usize) -> Option<&str> {
        if month == 0 {
            return None;
        }
        self.months
            .get(month - 1)?
            .iter()
            .find(|def| def.position as usize == position)
            .map(|def| def.name.as_str())
    }

    pub fn position_of(&self, month: usize, name: &str) -> Option<i32> {
        if month == 0 {
            return None;
        }
        self.months
            .get(month - 1)?
            .iter()
            .find(|def| def.name.eq_ignore_ascii_case(name))
            .map(|def| def.position)
    }
}

/// A rep's scores shaped like the catalog: one dense array per month,
/// 0.0 standing in for "not yet assessed".
#[derive(Debug, Clone)]
pub struct RepScores {
    pub rep: RepRecord,
    pub months: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthlyScore {
    pub month: i32,
    pub average: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RepPerformance {
    pub rep_id: Uuid,
    pub name: String,
    pub email: String,
    pub monthly: Vec<MonthlyScore>,
    pub overall_average: f64,
    /// None when fewer than two months have any recorded scores.
    pub improvement: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DistributionBucket {
    pub label: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct LowScoreItem {
    pub assessment: String,
    pub score: f64,
    pub month_label: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FlaggedRep {
    pub rep_id: Uuid,
    pub name: String,
    pub low_score_count: usize,
    pub average_low_score: f64,
    pub low_scores: Vec<LowScoreItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommonChallenge {
    pub assessment: String,
    pub count: usize,
    pub average_score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttentionReport {
    pub flagged: Vec<FlaggedRep>,
    pub common_challenges: Vec<CommonChallenge>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum RampMetric {
    MeetingsBooked,
    DemosBooked,
    DealsOpened,
    DealsClosed,
}

impl RampMetric {
    pub const ALL: [RampMetric; 4] = [
        RampMetric::MeetingsBooked,
        RampMetric::DemosBooked,
        RampMetric::DealsOpened,
        RampMetric::DealsClosed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RampMetric::MeetingsBooked => "meetings_booked",
            RampMetric::DemosBooked => "demos_booked",
            RampMetric::DealsOpened => "deals_opened",
            RampMetric::DealsClosed => "deals_closed",
        }
    }

    pub fn parse(value: &str) -> Option<RampMetric> {
        match value {
            "meetings_booked" => Some(RampMetric::MeetingsBooked),
            "demos_booked" => Some(RampMetric::DemosBooked),
            "deals_opened" => Some(RampMetric::DealsOpened),
            "deals_closed" => Some(RampMetric::DealsClosed),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RampMetric::MeetingsBooked => "Meetings booked",
            RampMetric::DemosBooked => "Demos booked",
            RampMetric::DealsOpened => "Deals opened",
            RampMetric::DealsClosed => "Deals closed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RampExpectationRow {
    pub metric: String,
    pub month: i32,
    pub expected: i32,
    pub note: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RampActualRow {
    pub rep_id: Uuid,
    pub metric: String,
    pub month: i32,
    pub count: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct RampMonthView {
    pub month: i32,
    pub target: i32,
    pub note: Option<String>,
    pub actual: i32,
    /// False when no actual was ever entered for this month; the actual
    /// still counts as 0 toward achievement.
    pub recorded: bool,
    pub achieved: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricRamp {
    pub metric: RampMetric,
    pub months: Vec<RampMonthView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RepRampView {
    pub rep_id: Uuid,
    pub name: String,
    pub email: String,
    /// Current ramp month (1-based, clamped to the ramp window); 0 before
    /// the rep's start date.
    pub ramp_month: usize,
    pub metrics: Vec<MetricRamp>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricSummary {
    pub metric: RampMetric,
    pub achievement_rate: f64,
    pub mean_months_to_first: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TeamRampSummary {
    pub rep_count: usize,
    pub metrics: Vec<MetricSummary>,
}
