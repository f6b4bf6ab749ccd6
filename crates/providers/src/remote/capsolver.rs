use serde::Deserialize;
use serde_json::json;
use tracing::info;

use captcha_resolver_core::SolveError;

use super::poll::{poll_until_ready, PollOutcome, PollSchedule};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateTaskResponse {
    #[serde(default)]
    error_id: i64,
    error_description: Option<String>,
    task_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskResultResponse {
    #[serde(default)]
    error_id: i64,
    error_description: Option<String>,
    status: Option<String>,
    solution: Option<Solution>,
}

#[derive(Deserialize)]
struct Solution {
    #[serde(default)]
    text: String,
}

pub(super) async fn solve(
    client: &reqwest::Client,
    base_url: &str,
    api_key: &str,
    encoded_image: &str,
    schedule: PollSchedule,
) -> Result<String, SolveError> {
    let resp = client
        .post(crate::endpoint(base_url, "createTask"))
        .json(&json!({
            "clientKey": api_key,
            "task": {
                "type": "ImageToTextTask",
                "body": encoded_image,
                "module": "common",
                "score": 0.8,
                "case": true
            }
        }))
        .send()
        .await
        .map_err(crate::transport_error)?;

    if !resp.status().is_success() {
        return Err(SolveError::Rejected(format!(
            "capsolver createTask HTTP {}",
            resp.status().as_u16()
        )));
    }

    let created: CreateTaskResponse = resp
        .json()
        .await
        .map_err(|e| SolveError::Transport(format!("capsolver: malformed createTask response: {}", e)))?;

    if created.error_id != 0 {
        return Err(SolveError::Rejected(
            created
                .error_description
                .unwrap_or_else(|| format!("errorId {}", created.error_id)),
        ));
    }

    let task_id = created
        .task_id
        .ok_or_else(|| SolveError::Transport("capsolver: createTask returned no taskId".into()))?;
    info!(task_id = %task_id, "capsolver task created");

    let url = crate::endpoint(base_url, "getTaskResult");
    let url = url.as_str();
    let task_id = task_id.as_str();
    poll_until_ready("capsolver", schedule, move |_| async move {
        check(client, url, api_key, task_id).await
    })
    .await
}

async fn check(
    client: &reqwest::Client,
    url: &str,
    api_key: &str,
    task_id: &str,
) -> Result<PollOutcome, SolveError> {
    let resp = client
        .post(url)
        .json(&json!({ "clientKey": api_key, "taskId": task_id }))
        .send()
        .await
        .map_err(crate::transport_error)?;

    // non-2xx status polls are retried like a pending task
    if !resp.status().is_success() {
        return Ok(PollOutcome::Pending);
    }

    let result: TaskResultResponse = resp
        .json()
        .await
        .map_err(|e| SolveError::Transport(format!("capsolver: malformed getTaskResult response: {}", e)))?;

    if result.error_id != 0 {
        return Ok(PollOutcome::Failed(
            result
                .error_description
                .unwrap_or_else(|| format!("errorId {}", result.error_id)),
        ));
    }

    Ok(match result.status.as_deref() {
        Some("ready") => PollOutcome::Ready(result.solution.map(|s| s.text).unwrap_or_default()),
        Some("failed") => PollOutcome::Failed("capsolver task failed".to_string()),
        _ => PollOutcome::Pending,
    })
}
