use alloy::primitives::{keccak256, Bytes, U256};

pub const TRUNCATE_LEN: usize = 50;

pub fn is_raw_calldata(call_data: &str) -> bool {
    call_data
        .strip_prefix("0x")
        .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_hexdigit()))
}

/// Only zero-argument signatures such as `latestAnswer()` are accepted.
pub fn encode_call_input(call_data: &str) -> Result<Bytes, String> {
    if is_raw_calldata(call_data) {
        return alloy::hex::decode(call_data)
            .map(Bytes::from)
            .map_err(|e| format!("invalid raw calldata `{call_data}`: {e}"));
    }

    let signature = call_data.trim();
    let Some(open) = signature.find('(') else {
        return Err(format!("invalid call signature `{signature}`: missing `(`"));
    };
    if !signature.ends_with(')') || open == 0 {
        return Err(format!("invalid call signature `{signature}`"));
    }
    let params = &signature[open + 1..signature.len() - 1];
    if !params.trim().is_empty() {
        return Err(format!(
            "call signature `{signature}` takes arguments; pass raw calldata instead"
        ));
    }
    let hash = keccak256(signature.as_bytes());
    Ok(Bytes::copy_from_slice(&hash[..4]))
}

/// Truncation happens before hex-to-decimal conversion.
pub fn normalize_call_output(raw: &str, truncate: bool) -> Result<String, String> {
    let mut processed = raw.trim_end();
    if truncate {
        processed = match processed.char_indices().nth(TRUNCATE_LEN) {
            Some((idx, _)) => &processed[..idx],
            None => processed,
        };
    }

    let Some(digits) = processed.strip_prefix("0x") else {
        return Ok(processed.to_string());
    };
    hex_to_decimal(digits)
        .map_err(|e| format!("failed to convert hex output '{processed}' to decimal: {e}"))
}

fn hex_to_decimal(digits: &str) -> Result<String, String> {
    if digits.is_empty() {
        return Err("no hex digits".to_string());
    }
    if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err("not a hexadecimal number".to_string());
    }
    let significant = digits.trim_start_matches('0');
    if significant.len() > 64 {
        return Err(format!(
            "value has {} significant hex digits, more than 256 bits",
            significant.len()
        ));
    }
    if significant.is_empty() {
        return Ok("0".to_string());
    }
    U256::from_str_radix(significant, 16)
        .map(|value| value.to_string())
        .map_err(|e| e.to_string())
}
