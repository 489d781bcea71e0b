//! Recurring-expense generation trigger

use std::{sync::Arc, time::Duration};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info};

use crate::{error::GatewayError, gateway::RestGateway, state::AppState};

/// Stored procedure that books the month's recurring expenses
pub const MONTHLY_EXPENSES_PROCEDURE: &str = "run_monthly_expenses";

/// Outcome of one trigger, with an HTTP-style status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskReport {
    pub status: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    pub ran_at: DateTime<Utc>,
}

impl TaskReport {
    pub fn success(result: Value) -> Self {
        Self {
            status: 200,
            message: "Monthly expenses processed".to_string(),
            result: Some(result),
            ran_at: Utc::now(),
        }
    }

    pub fn failure(error: &GatewayError) -> Self {
        Self {
            status: 500,
            message: error.to_string(),
            result: None,
            ran_at: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == 200
    }
}

/// Call the monthly-expenses procedure once; failures are not retried
pub async fn run_monthly_expenses(gateway: Option<&RestGateway>) -> TaskReport {
    let outcome = match gateway {
        Some(gateway) => gateway
            .call_procedure(MONTHLY_EXPENSES_PROCEDURE, &json!({}))
            .await,
        None => Err(GatewayError::NotConfigured),
    };

    match outcome {
        Ok(result) => {
            info!("{} completed", MONTHLY_EXPENSES_PROCEDURE);
            TaskReport::success(result)
        }
        Err(e) => {
            error!("{} failed: {}", MONTHLY_EXPENSES_PROCEDURE, e);
            TaskReport::failure(&e)
        }
    }
}

/// Background task that triggers the procedure every `every`
pub async fn monthly_expenses_task(state: Arc<AppState>, every: Duration) {
    info!("Starting monthly expenses task (every {}h)", every.as_secs() / 3600);

    let mut interval = interval_at(Instant::now() + every, every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        interval.tick().await;
        let report = run_monthly_expenses(state.gateway.as_ref()).await;
        info!("Monthly expenses trigger finished with status {}", report.status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{audio::SoundLibrary, state::TimerPool};

    #[tokio::test]
    async fn reports_500_without_a_database() {
        let report = run_monthly_expenses(None).await;
        assert_eq!(report.status, 500);
        assert!(!report.is_success());
        assert_eq!(report.message, "no database is configured");
    }

    #[tokio::test]
    async fn reports_200_when_the_procedure_succeeds() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/rest/v1/rpc/run_monthly_expenses")
            .match_body(mockito::Matcher::Json(json!({})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"inserted":3}"#)
            .expect(1)
            .create_async()
            .await;

        let gateway = RestGateway::new(server.url(), None).unwrap();
        let report = run_monthly_expenses(Some(&gateway)).await;

        assert!(report.is_success());
        assert_eq!(report.result, Some(json!({"inserted": 3})));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn reports_500_with_the_remote_message() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/rest/v1/rpc/run_monthly_expenses")
            .with_status(400)
            .with_body(r#"{"message":"relation \"expenses\" does not exist"}"#)
            .expect(1)
            .create_async()
            .await;

        let gateway = RestGateway::new(server.url(), None).unwrap();
        let report = run_monthly_expenses(Some(&gateway)).await;

        assert_eq!(report.status, 500);
        assert!(report.message.contains("relation \"expenses\" does not exist"));
        // Called exactly once: no retry
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn triggers_the_procedure_once_per_period() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/rest/v1/rpc/run_monthly_expenses")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"inserted":0}"#)
            .expect_at_least(2)
            .create_async()
            .await;

        let sounds = SoundLibrary::headless();
        let pool = TimerPool::initialize(1, Arc::new(sounds.clone()), "alarm").unwrap();
        let gateway = RestGateway::new(server.url(), None).unwrap();
        let state = Arc::new(AppState::new(
            pool,
            sounds,
            Some(gateway),
            0,
            "127.0.0.1".to_string(),
        ));

        let task = tokio::spawn(monthly_expenses_task(state, Duration::from_millis(200)));

        // Nothing fires before the first period has elapsed
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!mock.matched_async().await);

        tokio::time::sleep(Duration::from_millis(600)).await;
        task.abort();
        mock.assert_async().await;
    }
}
