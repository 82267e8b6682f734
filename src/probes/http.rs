use crate::error::{Result, VerifyError};
use crate::utils::error::compact_error_message;
use crate::utils::retry::{poll_until, Attempt, PollPolicy};
use reqwest::Client;

const HTTP_ERR_MAX_LEN: usize = 200;

/// One GET. `Ok` only for a 2xx status; anything else is a retryable observation.
pub async fn fetch_success_body(client: &Client, url: &str) -> std::result::Result<String, String> {
    let resp = client
        .get(url)
        .send()
        .await
        .map_err(|e| compact_error_message(&e.to_string(), HTTP_ERR_MAX_LEN))?;
    let status = resp.status();
    if !status.is_success() {
        return Err(format!("HTTP {status}"));
    }
    resp.text()
        .await
        .map_err(|e| compact_error_message(&e.to_string(), HTTP_ERR_MAX_LEN))
}

/// GET `url` until it answers 2xx and return the body. Connection errors and non-2xx statuses
/// are retried until the policy deadline.
pub async fn wait_for_http_success(client: &Client, url: &str, policy: PollPolicy) -> Result<String> {
    poll_until(policy, |_| async move {
        match fetch_success_body(client, url).await {
            Ok(body) => Attempt::Ready(body),
            Err(failure) => Attempt::Pending(failure),
        }
    })
    .await
    .map_err(|failure| {
        failure.into_error(|exhausted| VerifyError::EndpointTimeout {
            url: url.to_string(),
            waited: exhausted.waited,
            last_failure: exhausted.last_observation,
        })
    })
}
