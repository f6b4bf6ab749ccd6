use serde::Deserialize;
use tracing::info;

use captcha_resolver_core::SolveError;

use super::poll::{poll_until_ready, PollOutcome, PollSchedule};

const NOT_READY: &str = "CAPCHA_NOT_READY";

/// Both `in.php` and `res.php` answer with this shape when `json=1`.
#[derive(Deserialize)]
struct ApiResponse {
    status: i64,
    #[serde(default)]
    request: String,
}

pub(super) async fn solve(
    client: &reqwest::Client,
    base_url: &str,
    api_key: &str,
    encoded_image: &str,
    schedule: PollSchedule,
) -> Result<String, SolveError> {
    let resp = client
        .post(crate::endpoint(base_url, "in.php"))
        .form(&[
            ("key", api_key),
            ("method", "base64"),
            ("body", encoded_image),
            ("json", "1"),
        ])
        .send()
        .await
        .map_err(crate::transport_error)?;

    if !resp.status().is_success() {
        return Err(SolveError::Rejected(format!(
            "2captcha in.php HTTP {}",
            resp.status().as_u16()
        )));
    }

    let submitted: ApiResponse = resp
        .json()
        .await
        .map_err(|e| SolveError::Transport(format!("2captcha: malformed in.php response: {}", e)))?;

    if submitted.status != 1 {
        return Err(SolveError::Rejected(submitted.request));
    }

    let captcha_id = submitted.request;
    info!(captcha_id = %captcha_id, "2captcha task created");

    let url = crate::endpoint(base_url, "res.php");
    let url = url.as_str();
    let captcha_id = captcha_id.as_str();
    poll_until_ready("2captcha", schedule, move |_| async move {
        check(client, url, api_key, captcha_id).await
    })
    .await
}

async fn check(
    client: &reqwest::Client,
    url: &str,
    api_key: &str,
    captcha_id: &str,
) -> Result<PollOutcome, SolveError> {
    let resp = client
        .get(url)
        .query(&[
            ("key", api_key),
            ("action", "get"),
            ("id", captcha_id),
            ("json", "1"),
        ])
        .send()
        .await
        .map_err(crate::transport_error)?;

    if !resp.status().is_success() {
        return Ok(PollOutcome::Pending);
    }

    let result: ApiResponse = resp
        .json()
        .await
        .map_err(|e| SolveError::Transport(format!("2captcha: malformed res.php response: {}", e)))?;

    Ok(if result.status == 1 {
        PollOutcome::Ready(result.request)
    } else if result.request == NOT_READY {
        PollOutcome::Pending
    } else {
        PollOutcome::Failed(result.request)
    })
}
