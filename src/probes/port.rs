use crate::error::{Result, VerifyError};
use crate::utils::retry::{poll_until, Attempt, PollPolicy};
use tokio::net::TcpStream;

/// Wait until `host:port` accepts a TCP connection.
pub async fn wait_for_port_open(host: &str, port: u16, policy: PollPolicy) -> Result<()> {
    poll_until(policy, |_| async move {
        match TcpStream::connect((host, port)).await {
            Ok(_) => Attempt::Ready(()),
            Err(err) => Attempt::Pending(err.to_string()),
        }
    })
    .await
    .map_err(|failure| {
        failure.into_error(|exhausted| VerifyError::PortUnreachable {
            host: host.to_string(),
            port,
            waited: exhausted.waited,
        })
    })?;
    tracing::info!("[READY] ✓ port {} is open on {}", port, host);
    Ok(())
}
