use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeArgs {
    /// Env file loaded before the run configuration is resolved.
    pub env_file: PathBuf,
    /// Print the resolved configuration and exit without probing anything.
    pub explain_config: bool,
}

fn parse_bool_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_runtime_args_from_iter<I, S>(args: I) -> anyhow::Result<RuntimeArgs>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let supplied_args = args
        .into_iter()
        .map(|arg| arg.as_ref().to_string())
        .collect::<Vec<_>>();
    if !supplied_args.is_empty() {
        let joined = supplied_args.join(" ");
        return Err(anyhow::anyhow!(
            "CLI arguments are not accepted. Configure the run through environment keys or a .env file instead (BASE_URL, *_PORT, *_CONTRACT, *_SERVICE, *_TIMEOUT, VERIFY_ENV_FILE, VERIFY_EXPLAIN_CONFIG). Received args: {}",
            joined
        ));
    }

    let env_file = std::env::var("VERIFY_ENV_FILE")
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(".env"));
    let explain_config = match std::env::var("VERIFY_EXPLAIN_CONFIG") {
        Ok(raw) => parse_bool_flag(&raw).ok_or_else(|| {
            anyhow::anyhow!("invalid VERIFY_EXPLAIN_CONFIG '{}': expected a boolean flag", raw)
        })?,
        Err(_) => false,
    };

    Ok(RuntimeArgs {
        env_file,
        explain_config,
    })
}

pub fn parse_runtime_args() -> anyhow::Result<RuntimeArgs> {
    parse_runtime_args_from_iter(std::env::args().skip(1))
}
