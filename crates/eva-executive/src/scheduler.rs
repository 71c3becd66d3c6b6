//! Cron-driven job scheduler (spec §4.3, §4.10): fires compaction and
//! promotion on the schedules named in `config.jobs`, sharing the same run
//! path (`handlers::jobs_run::run_job`) `/jobs/run` uses for manual triggers,
//! so a scheduled firing and an operator-triggered one are indistinguishable
//! once admitted.

use std::str::FromStr;

use chrono::Utc;
use cron::Schedule;
use eva_model::ModelClient;

use crate::handlers::jobs_run::run_job;
use crate::jobs::JobName;
use crate::state::AppState;

/// Spawn one background task per configured job. A no-op when
/// `config.jobs.enabled` is false.
pub fn spawn<M: ModelClient + 'static>(state: AppState<M>) {
    if !state.config.jobs.enabled {
        tracing::info!("scheduler disabled via config.jobs.enabled=false");
        return;
    }

    spawn_job(state.clone(), JobName::Compaction, state.config.jobs.compaction.cron.clone());
    spawn_job(state, JobName::Promotion, state.config.jobs.promotion.cron.clone());
}

fn spawn_job<M: ModelClient + 'static>(state: AppState<M>, job: JobName, cron_expr: String) {
    tokio::spawn(async move {
        let schedule = match Schedule::from_str(&cron_expr) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(job = job.as_str(), cron = %cron_expr, error = %e, "invalid cron expression; scheduler for this job is disabled");
                return;
            }
        };

        loop {
            let Some(next) = schedule.upcoming(Utc).next() else {
                tracing::error!(job = job.as_str(), "cron schedule produced no upcoming fire time; stopping");
                return;
            };
            let delay = (next - Utc::now()).to_std().unwrap_or(std::time::Duration::ZERO);
            tokio::time::sleep(delay).await;

            let now_ms = Utc::now().timestamp_millis();
            let (_, error_code) = run_job(&state, job, now_ms).await;
            match error_code {
                Some(code) => tracing::warn!(job = job.as_str(), code = code.as_str(), "scheduled job run failed"),
                None => tracing::info!(job = job.as_str(), "scheduled job run completed"),
            }
        }
    });
}
