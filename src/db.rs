use anyhow::Context;
use chrono::NaiveDate;
use sqlx::{PgPool, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{
    AssessmentCatalog, AssessmentDef, RampActualRow, RampExpectationRow, RampMetric, RepRecord,
    Role, ScoreRow,
};
use crate::ramping::RAMP_MONTHS;
use crate::scores::MAX_SCORE;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn provision_rep(
    pool: &PgPool,
    full_name: &str,
    email: &str,
    role: Role,
    manager_email: Option<&str>,
    start_date: NaiveDate,
) -> anyhow::Result<Uuid> {
    let id: Uuid = sqlx::query(
        r#"
        INSERT INTO sales_performance.reps (id, full_name, email, role, manager_email, start_date)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (email) DO UPDATE
        SET full_name = EXCLUDED.full_name,
            role = EXCLUDED.role,
            manager_email = EXCLUDED.manager_email,
            start_date = EXCLUDED.start_date
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(full_name)
    .bind(email)
    .bind(role.as_str())
    .bind(manager_email)
    .bind(start_date)
    .fetch_one(pool)
    .await?
    .get("id");

    info!(email, role = role.as_str(), "provisioned rep");
    Ok(id)
}

/// Deletes a rep; scores and ramp actuals go with it via the cascade.
pub async fn remove_rep(pool: &PgPool, email: &str) -> anyhow::Result<bool> {
    let result = sqlx::query("DELETE FROM sales_performance.reps WHERE email = $1")
        .bind(email)
        .execute(pool)
        .await?;
    let removed = result.rows_affected() > 0;
    if removed {
        info!(email, "removed rep");
    }
    Ok(removed)
}

pub async fn rep_id_by_email(pool: &PgPool, email: &str) -> anyhow::Result<Uuid> {
    let row = sqlx::query("SELECT id FROM sales_performance.reps WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await?
        .with_context(|| format!("no rep with email {email}"))?;
    Ok(row.get("id"))
}

pub async fn fetch_reps(
    pool: &PgPool,
    manager: Option<&str>,
    email: Option<&str>,
) -> anyhow::Result<Vec<RepRecord>> {
    let mut query = String::from(
        "SELECT id, full_name, email, role, manager_email, start_date \
         FROM sales_performance.reps",
    );

    if manager.is_some() {
        query.push_str(" WHERE manager_email = $1");
    } else if email.is_some() {
        query.push_str(" WHERE email = $1");
    }
    query.push_str(" ORDER BY full_name");

    let mut rows = sqlx::query(&query);
    if let Some(value) = manager.or(email) {
        rows = rows.bind(value);
    }

    let records = rows.fetch_all(pool).await?;
    debug!(count = records.len(), "fetched reps");

    let mut reps = Vec::new();
    for row in records {
        let role_text: String = row.get("role");
        let role = Role::parse(&role_text)
            .with_context(|| format!("unknown role '{role_text}' in reps table"))?;
        reps.push(RepRecord {
            id: row.get("id"),
            full_name: row.get("full_name"),
            email: row.get("email"),
            role,
            manager_email: row.get("manager_email"),
            start_date: row.get("start_date"),
        });
    }

    Ok(reps)
}

pub async fn fetch_assessment_catalog(pool: &PgPool) -> anyhow::Result<AssessmentCatalog> {
    let records = sqlx::query(
        "SELECT month, position, name, label FROM sales_performance.assessments \
         ORDER BY month, position",
    )
    .fetch_all(pool)
    .await?;

    let defs = records
        .into_iter()
        .map(|row| AssessmentDef {
            month: row.get("month"),
            position: row.get("position"),
            name: row.get("name"),
            label: row.get("label"),
        })
        .collect();

    Ok(AssessmentCatalog::from_rows(defs))
}

pub async fn fetch_scores(
    pool: &PgPool,
    manager: Option<&str>,
    email: Option<&str>,
) -> anyhow::Result<Vec<ScoreRow>> {
    let mut query = String::from(
        "SELECT s.rep_id, s.month, s.position, s.score \
         FROM sales_performance.scores s \
         JOIN sales_performance.reps r ON r.id = s.rep_id",
    );

    if manager.is_some() {
        query.push_str(" WHERE r.manager_email = $1");
    } else if email.is_some() {
        query.push_str(" WHERE r.email = $1");
    }

    let mut rows = sqlx::query(&query);
    if let Some(value) = manager.or(email) {
        rows = rows.bind(value);
    }

    let records = rows.fetch_all(pool).await?;
    debug!(count = records.len(), "fetched score rows");

    Ok(records
        .into_iter()
        .map(|row| ScoreRow {
            rep_id: row.get("rep_id"),
            month: row.get("month"),
            position: row.get("position"),
            score: row.get("score"),
        })
        .collect())
}

pub async fn record_score(
    pool: &PgPool,
    email: &str,
    month: i32,
    assessment: &str,
    score: f64,
    recorded_at: NaiveDate,
) -> anyhow::Result<()> {
    anyhow::ensure!(
        (0.0..=MAX_SCORE).contains(&score),
        "score {score} is outside the 0..={MAX_SCORE} range"
    );

    let catalog = fetch_assessment_catalog(pool).await?;
    anyhow::ensure!(
        month >= 1 && month as usize <= catalog.month_count(),
        "month {month} is outside the assessment calendar"
    );
    let position = catalog
        .position_of(month as usize, assessment)
        .with_context(|| format!("no assessment named '{assessment}' in month {month}"))?;

    let rep_id = rep_id_by_email(pool, email).await?;

    sqlx::query(
        r#"
        INSERT INTO sales_performance.scores (id, rep_id, month, position, score, recorded_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (rep_id, month, position) DO UPDATE
        SET score = EXCLUDED.score, recorded_at = EXCLUDED.recorded_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(rep_id)
    .bind(month)
    .bind(position)
    .bind(score)
    .bind(recorded_at)
    .execute(pool)
    .await?;

    info!(email, month, assessment, score, "recorded score");
    Ok(())
}

pub async fn fetch_ramp_expectations(pool: &PgPool) -> anyhow::Result<Vec<RampExpectationRow>> {
    let records = sqlx::query(
        "SELECT metric, month, expected, note FROM sales_performance.ramp_expectations \
         ORDER BY metric, month",
    )
    .fetch_all(pool)
    .await?;

    Ok(records
        .into_iter()
        .map(|row| RampExpectationRow {
            metric: row.get("metric"),
            month: row.get("month"),
            expected: row.get("expected"),
            note: row.get("note"),
        })
        .collect())
}

pub async fn set_ramp_target(
    pool: &PgPool,
    metric: RampMetric,
    month: i32,
    expected: i32,
    note: Option<&str>,
) -> anyhow::Result<()> {
    anyhow::ensure!(
        (1..=RAMP_MONTHS as i32).contains(&month),
        "ramp month {month} is outside 1..={RAMP_MONTHS}"
    );
    sqlx::query(
        r#"
        INSERT INTO sales_performance.ramp_expectations (metric, month, expected, note)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (metric, month) DO UPDATE
        SET expected = EXCLUDED.expected, note = EXCLUDED.note
        "#,
    )
    .bind(metric.as_str())
    .bind(month)
    .bind(expected)
    .bind(note)
    .execute(pool)
    .await?;

    info!(metric = metric.as_str(), month, expected, "updated ramp target");
    Ok(())
}

pub async fn fetch_ramp_actuals(
    pool: &PgPool,
    manager: Option<&str>,
    email: Option<&str>,
) -> anyhow::Result<Vec<RampActualRow>> {
    let mut query = String::from(
        "SELECT a.rep_id, a.metric, a.month, a.count \
         FROM sales_performance.ramp_actuals a \
         JOIN sales_performance.reps r ON r.id = a.rep_id",
    );

    if manager.is_some() {
        query.push_str(" WHERE r.manager_email = $1");
    } else if email.is_some() {
        query.push_str(" WHERE r.email = $1");
    }

    let mut rows = sqlx::query(&query);
    if let Some(value) = manager.or(email) {
        rows = rows.bind(value);
    }

    let records = rows.fetch_all(pool).await?;
    debug!(count = records.len(), "fetched ramp actuals");

    Ok(records
        .into_iter()
        .map(|row| RampActualRow {
            rep_id: row.get("rep_id"),
            metric: row.get("metric"),
            month: row.get("month"),
            count: row.get("count"),
        })
        .collect())
}

pub async fn record_ramp_actual(
    pool: &PgPool,
    rep_id: Uuid,
    metric: RampMetric,
    month: i32,
    count: i32,
) -> anyhow::Result<()> {
    anyhow::ensure!(
        (1..=RAMP_MONTHS as i32).contains(&month),
        "ramp month {month} is outside 1..={RAMP_MONTHS}"
    );
    sqlx::query(
        r#"
        INSERT INTO sales_performance.ramp_actuals (id, rep_id, metric, month, count)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (rep_id, metric, month) DO UPDATE
        SET count = EXCLUDED.count
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(rep_id)
    .bind(metric.as_str())
    .bind(month)
    .bind(count)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn import_scores_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        full_name: String,
        email: String,
        start_date: NaiveDate,
        month: i32,
        assessment: String,
        score: f64,
        recorded_at: Option<NaiveDate>,
    }

    let catalog = fetch_assessment_catalog(pool).await?;
    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut inserted = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        anyhow::ensure!(
            (0.0..=MAX_SCORE).contains(&row.score),
            "score {} for {} is outside the 0..={MAX_SCORE} range",
            row.score,
            row.email
        );
        let position = catalog
            .position_of(row.month as usize, &row.assessment)
            .with_context(|| {
                format!(
                    "no assessment named '{}' in month {}",
                    row.assessment, row.month
                )
            })?;

        let rep_id = provision_rep(
            pool,
            &row.full_name,
            &row.email,
            Role::SalesRep,
            None,
            row.start_date,
        )
        .await?;

        let recorded_at = row
            .recorded_at
            .unwrap_or_else(|| chrono::Utc::now().date_naive());

        let result = sqlx::query(
            r#"
            INSERT INTO sales_performance.scores (id, rep_id, month, position, score, recorded_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (rep_id, month, position) DO UPDATE
            SET score = EXCLUDED.score, recorded_at = EXCLUDED.recorded_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(rep_id)
        .bind(row.month)
        .bind(position)
        .bind(row.score)
        .bind(recorded_at)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }

    info!(count = inserted, "imported score rows");
    Ok(inserted)
}

pub async fn import_ramp_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        email: String,
        metric: String,
        month: i32,
        count: i32,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut inserted = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        let metric = RampMetric::parse(&row.metric)
            .with_context(|| format!("unknown ramp metric '{}'", row.metric))?;
        let rep_id = rep_id_by_email(pool, &row.email).await?;
        record_ramp_actual(pool, rep_id, metric, row.month, row.count).await?;
        inserted += 1;
    }

    info!(count = inserted, "imported ramp actuals");
    Ok(inserted)
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let manager_email = "dana.reyes@example.com";
    provision_rep(
        pool,
        "Dana Reyes",
        manager_email,
        Role::Manager,
        None,
        NaiveDate::from_ymd_opt(2024, 6, 3).context("invalid date")?,
    )
    .await?;

    let reps = vec![
        ("Avery Quinn", "avery.quinn@example.com", 2026, 1, 5),
        ("Noa Kim", "noa.kim@example.com", 2025, 11, 3),
        ("Sam Ortiz", "sam.ortiz@example.com", 2026, 3, 2),
    ];

    let mut ids = Vec::new();
    for (name, email, year, month, day) in reps {
        let start = NaiveDate::from_ymd_opt(year, month, day).context("invalid date")?;
        let id = provision_rep(pool, name, email, Role::SalesRep, Some(manager_email), start)
            .await?;
        ids.push(id);
    }

    // Avery: started weak, finished strong. Noa: consistently strong.
    // Sam: two low months and still mid-ramp.
    let score_sets: [(&[f64], &[f64], &[f64]); 3] = [
        (
            &[2.0, 2.5, 2.0, 2.5, 2.0],
            &[3.0, 3.5, 3.0, 2.5, 3.0, 3.5],
            &[4.5, 4.0, 4.5, 5.0, 4.5, 4.0],
        ),
        (
            &[4.0, 4.5, 4.0, 4.5, 5.0],
            &[4.5, 4.0, 4.5, 4.5, 4.0, 5.0],
            &[5.0, 4.5, 5.0, 4.5, 5.0, 4.5],
        ),
        (&[2.5, 2.0, 2.0, 2.5, 2.5], &[2.0, 2.5, 2.0, 2.0, 2.5, 2.0], &[]),
    ];

    let catalog = fetch_assessment_catalog(pool).await?;
    for (rep_id, months) in ids.iter().zip(score_sets.iter()) {
        let months = [months.0, months.1, months.2];
        for (month_idx, scores) in months.iter().enumerate() {
            let month = month_idx as i32 + 1;
            let recorded_at = NaiveDate::from_ymd_opt(2026, month as u32 + 1, 28)
                .context("invalid date")?;
            for (pos_idx, score) in scores.iter().enumerate() {
                if *score <= 0.0 {
                    continue;
                }
                let position = pos_idx as i32 + 1;
                if catalog.name_at(month as usize, position as usize).is_none() {
                    continue;
                }
                sqlx::query(
                    r#"
                    INSERT INTO sales_performance.scores
                    (id, rep_id, month, position, score, recorded_at)
                    VALUES ($1, $2, $3, $4, $5, $6)
                    ON CONFLICT (rep_id, month, position) DO UPDATE
                    SET score = EXCLUDED.score, recorded_at = EXCLUDED.recorded_at
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(*rep_id)
                .bind(month)
                .bind(position)
                .bind(*score)
                .bind(recorded_at)
                .execute(pool)
                .await?;
            }
        }
    }

    // Sam is mid-ramp, so only the first two months have actuals.
    let ramp_rows: [(usize, RampMetric, &[i32]); 6] = [
        (0, RampMetric::MeetingsBooked, &[9, 17, 25, 31, 30, 32]),
        (0, RampMetric::DemosBooked, &[6, 11, 16, 21, 21, 21]),
        (0, RampMetric::DealsOpened, &[2, 4, 8, 11, 12, 13]),
        (1, RampMetric::MeetingsBooked, &[10, 18, 26, 32, 33, 31]),
        (1, RampMetric::DealsClosed, &[0, 1, 2, 3, 4, 5]),
        (2, RampMetric::MeetingsBooked, &[7, 15]),
    ];
    for (rep_idx, metric, counts) in ramp_rows {
        for (idx, count) in counts.iter().enumerate() {
            record_ramp_actual(pool, ids[rep_idx], metric, idx as i32 + 1, *count).await?;
        }
    }

    info!("seed data inserted");
    Ok(())
}
