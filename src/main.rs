use std::path::PathBuf;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{ArgGroup, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing_subscriber::EnvFilter;

mod attention;
mod db;
mod models;
mod ramping;
mod report;
mod scores;

use models::{AssessmentCatalog, RampMetric, RepScores, Role};

#[derive(Parser)]
#[command(name = "rep-performance-tracker")]
#[command(about = "Sales rep performance and ramping tracker", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Provision a rep, or update one by email
    AddRep {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, value_enum, default_value_t = Role::SalesRep)]
        role: Role,
        #[arg(long)]
        manager: Option<String>,
        #[arg(long)]
        start_date: NaiveDate,
    },
    /// Remove a rep along with their scores and ramp data
    RemoveRep {
        #[arg(long)]
        email: String,
    },
    /// Record one assessment score for a rep
    RecordScore {
        #[arg(long)]
        email: String,
        #[arg(long)]
        month: i32,
        #[arg(long)]
        assessment: String,
        #[arg(long)]
        score: f64,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Update the target curve for a ramp metric
    SetRampTarget {
        #[arg(long, value_enum)]
        metric: RampMetric,
        #[arg(long)]
        month: i32,
        #[arg(long)]
        expected: i32,
        #[arg(long)]
        note: Option<String>,
    },
    /// Import assessment scores from a CSV file
    ImportScores {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Import ramp-metric actuals from a CSV file
    ImportRamp {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Team performance overview
    #[command(group(
        ArgGroup::new("scope")
            .args(["manager", "rep"])
            .multiple(false)
    ))]
    Team {
        #[arg(long)]
        manager: Option<String>,
        #[arg(long)]
        rep: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Score distribution across the fixed bands
    #[command(group(
        ArgGroup::new("scope")
            .args(["manager", "rep"])
            .multiple(false)
    ))]
    Distribution {
        #[arg(long)]
        manager: Option<String>,
        #[arg(long)]
        rep: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Reps needing attention and their common challenges
    #[command(group(
        ArgGroup::new("scope")
            .args(["manager", "rep"])
            .multiple(false)
    ))]
    Attention {
        #[arg(long)]
        manager: Option<String>,
        #[arg(long)]
        rep: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Ramping progress against the target curves
    #[command(group(
        ArgGroup::new("scope")
            .args(["manager", "rep"])
            .multiple(false)
    ))]
    Ramping {
        #[arg(long)]
        manager: Option<String>,
        #[arg(long)]
        rep: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Generate a full markdown report
    #[command(group(
        ArgGroup::new("scope")
            .args(["manager", "rep"])
            .multiple(false)
    ))]
    Report {
        #[arg(long)]
        manager: Option<String>,
        #[arg(long)]
        rep: Option<String>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::AddRep {
            name,
            email,
            role,
            manager,
            start_date,
        } => {
            db::provision_rep(&pool, &name, &email, role, manager.as_deref(), start_date).await?;
            println!("Provisioned {name} ({email}) as {}.", role.as_str());
        }
        Commands::RemoveRep { email } => {
            if db::remove_rep(&pool, &email).await? {
                println!("Removed {email} and their scores.");
            } else {
                println!("No rep with email {email}.");
            }
        }
        Commands::RecordScore {
            email,
            month,
            assessment,
            score,
            date,
        } => {
            let recorded_at = date.unwrap_or_else(|| Utc::now().date_naive());
            db::record_score(&pool, &email, month, &assessment, score, recorded_at).await?;
            println!("Recorded {assessment} = {score:.1} for {email} (month {month}).");
        }
        Commands::SetRampTarget {
            metric,
            month,
            expected,
            note,
        } => {
            db::set_ramp_target(&pool, metric, month, expected, note.as_deref()).await?;
            println!("Set {} month {month} target to {expected}.", metric.as_str());
        }
        Commands::ImportScores { csv } => {
            let inserted = db::import_scores_csv(&pool, &csv).await?;
            println!("Imported {inserted} scores from {}.", csv.display());
        }
        Commands::ImportRamp { csv } => {
            let inserted = db::import_ramp_csv(&pool, &csv).await?;
            println!("Imported {inserted} ramp actuals from {}.", csv.display());
        }
        Commands::Team { manager, rep, json } => {
            team_overview(&pool, manager.as_deref(), rep.as_deref(), json).await?;
        }
        Commands::Distribution { manager, rep, json } => {
            distribution_overview(&pool, manager.as_deref(), rep.as_deref(), json).await?;
        }
        Commands::Attention { manager, rep, json } => {
            attention_overview(&pool, manager.as_deref(), rep.as_deref(), json).await?;
        }
        Commands::Ramping { manager, rep, json } => {
            ramping_overview(&pool, manager.as_deref(), rep.as_deref(), json).await?;
        }
        Commands::Report { manager, rep, out } => {
            write_report(&pool, manager.as_deref(), rep.as_deref(), &out).await?;
        }
    }

    Ok(())
}

/// Fetches the scoped reps and their scores, shaped like the catalog.
/// Only reps whose role is tracked on dashboards are included.
async fn load_scores(
    pool: &PgPool,
    manager: Option<&str>,
    email: Option<&str>,
) -> anyhow::Result<(AssessmentCatalog, Vec<RepScores>)> {
    let reps: Vec<_> = db::fetch_reps(pool, manager, email)
        .await?
        .into_iter()
        .filter(|rep| is_tracked(rep.role))
        .collect();
    let catalog = db::fetch_assessment_catalog(pool).await?;
    let rows = db::fetch_scores(pool, manager, email).await?;
    let rep_scores = scores::normalize(&reps, &rows, &catalog);
    Ok((catalog, rep_scores))
}

fn is_tracked(role: Role) -> bool {
    match role {
        Role::SalesRep => true,
        Role::Admin | Role::Director | Role::Manager => false,
    }
}

async fn team_overview(
    pool: &PgPool,
    manager: Option<&str>,
    rep: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let (_, rep_scores) = load_scores(pool, manager, rep).await?;
    let performances = scores::team_performance(&rep_scores);

    if json {
        println!("{}", serde_json::to_string_pretty(&performances)?);
        return Ok(());
    }

    if performances.is_empty() {
        println!("No reps in scope.");
        return Ok(());
    }

    println!("Team performance:");
    for performance in &performances {
        let monthly: Vec<String> = performance
            .monthly
            .iter()
            .map(|month| {
                if month.average > 0.0 {
                    format!("{:.1}", month.average)
                } else {
                    "-".to_string()
                }
            })
            .collect();
        println!(
            "- {} ({}): months {} | overall {:.1} | change {}",
            performance.name,
            performance.email,
            monthly.join(" / "),
            performance.overall_average,
            report::format_improvement(performance.improvement)
        );
    }
    Ok(())
}

async fn distribution_overview(
    pool: &PgPool,
    manager: Option<&str>,
    rep: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let (_, rep_scores) = load_scores(pool, manager, rep).await?;
    let buckets = scores::score_distribution(&rep_scores);

    if json {
        println!("{}", serde_json::to_string_pretty(&buckets)?);
        return Ok(());
    }

    let assessed: usize = buckets.iter().map(|bucket| bucket.count).sum();
    if assessed == 0 {
        println!("No reps assessed yet.");
        return Ok(());
    }

    println!("Score distribution ({assessed} reps assessed):");
    for bucket in &buckets {
        println!("- {}: {} reps", bucket.label, bucket.count);
    }
    Ok(())
}

async fn attention_overview(
    pool: &PgPool,
    manager: Option<&str>,
    rep: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let (catalog, rep_scores) = load_scores(pool, manager, rep).await?;
    let attention = attention::find_attention(&rep_scores, &catalog);

    if json {
        println!("{}", serde_json::to_string_pretty(&attention)?);
        return Ok(());
    }

    if attention.flagged.is_empty() {
        println!("No reps flagged this period.");
        return Ok(());
    }

    println!("Reps needing attention:");
    for flagged in &attention.flagged {
        println!(
            "- {}: {} low scores, averaging {:.1}",
            flagged.name, flagged.low_score_count, flagged.average_low_score
        );
    }

    println!();
    println!("Common challenges:");
    for challenge in &attention.common_challenges {
        println!(
            "- {}: {} low scores (avg {:.1})",
            challenge.assessment, challenge.count, challenge.average_score
        );
    }
    Ok(())
}

async fn load_ramp(
    pool: &PgPool,
    manager: Option<&str>,
    email: Option<&str>,
) -> anyhow::Result<Vec<models::RepRampView>> {
    let reps: Vec<_> = db::fetch_reps(pool, manager, email)
        .await?
        .into_iter()
        .filter(|rep| is_tracked(rep.role))
        .collect();
    let expectations = db::fetch_ramp_expectations(pool).await?;
    let actuals = db::fetch_ramp_actuals(pool, manager, email).await?;
    let curves = ramping::build_target_curves(&expectations);
    Ok(ramping::rep_ramp_views(
        &reps,
        &actuals,
        &curves,
        Utc::now().date_naive(),
    ))
}

async fn ramping_overview(
    pool: &PgPool,
    manager: Option<&str>,
    rep: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let views = load_ramp(pool, manager, rep).await?;
    let summary = ramping::team_ramp_summary(&views);

    if json {
        let payload = serde_json::json!({ "team": summary, "reps": views });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    if views.is_empty() {
        println!("No reps in scope.");
        return Ok(());
    }

    println!("Team ramping:");
    for metric in &summary.metrics {
        let first = metric
            .mean_months_to_first
            .map(|months| format!("{months:.1} months to first"))
            .unwrap_or_else(|| "no activity yet".to_string());
        println!(
            "- {}: {:.1}% of rep-months on target ({})",
            metric.metric.label(),
            metric.achievement_rate,
            first
        );
    }

    for view in &views {
        println!();
        if view.ramp_month == 0 {
            println!("{} (starts soon)", view.name);
            continue;
        }
        println!("{} (month {} of {})", view.name, view.ramp_month, ramping::RAMP_MONTHS);
        for metric in &view.metrics {
            let on_target = metric
                .months
                .iter()
                .take(view.ramp_month)
                .filter(|month| month.achieved)
                .count();
            println!(
                "- {}: {}/{} months on target",
                metric.metric.label(),
                on_target,
                view.ramp_month
            );
        }
    }
    Ok(())
}

async fn write_report(
    pool: &PgPool,
    manager: Option<&str>,
    rep: Option<&str>,
    out: &std::path::Path,
) -> anyhow::Result<()> {
    let (catalog, rep_scores) = load_scores(pool, manager, rep).await?;
    let performances = scores::team_performance(&rep_scores);
    let distribution = scores::score_distribution(&rep_scores);
    let attention = attention::find_attention(&rep_scores, &catalog);
    let ramp_views = load_ramp(pool, manager, rep).await?;
    let team_ramp = ramping::team_ramp_summary(&ramp_views);

    let report = report::build_report(
        manager.or(rep),
        Utc::now().date_naive(),
        &performances,
        &distribution,
        &attention,
        &ramp_views,
        &team_ramp,
    );
    std::fs::write(out, report)?;
    println!("Report written to {}.", out.display());
    Ok(())
}
