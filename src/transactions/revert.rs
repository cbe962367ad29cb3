//! Revert reason extraction from node error messages
//!
//! Nodes report failed `eth_estimateGas` / `eth_call` simulations as an
//! error string. This pulls out the human-readable reason when there is one.

/// `Error(string)` selector
const ERROR_SELECTOR: &str = "0x08c379a0";
/// selector (10 chars) + offset word (64) + length word (64)
const ERROR_STRING_DATA_START: usize = 138;

/// Parse revert reason from RPC error message
pub fn parse_revert_reason(error: &str) -> String {
    if !error.contains("execution reverted") {
        return error.to_string();
    }

    if let Some(start) = error.find("revert: ") {
        let reason = &error[start + "revert: ".len()..];
        return match reason.find('"') {
            Some(end) => reason[..end].to_string(),
            None => reason.to_string(),
        };
    }

    if let Some(data) = revert_data(error) {
        if let Some(reason) = decode_error_string(data) {
            return reason;
        }
        return format!("Reverted with data: {}", data);
    }

    if let Some(start) = error.find("execution reverted: ") {
        let reason = error[start + "execution reverted: ".len()..].trim();
        if !reason.is_empty() {
            return reason.to_string();
        }
    }

    "execution reverted".to_string()
}

/// First `0x…` hex run in the message
fn revert_data(error: &str) -> Option<&str> {
    let start = error.find("0x")?;
    let tail = &error[start..];
    let end = tail[2..]
        .find(|c: char| !c.is_ascii_hexdigit())
        .map_or(tail.len(), |i| i + 2);
    let data = &tail[..end];
    (data.len() > 2).then_some(data)
}

fn decode_error_string(data: &str) -> Option<String> {
    if !data.starts_with(ERROR_SELECTOR) || data.len() <= ERROR_STRING_DATA_START {
        return None;
    }
    let length = usize::from_str_radix(&data[ERROR_STRING_DATA_START - 64..ERROR_STRING_DATA_START], 16).ok()?;
    let bytes = hex::decode(&data[ERROR_STRING_DATA_START..]).ok()?;
    let text = bytes.get(..length)?;
    String::from_utf8(text.to_vec()).ok()
}
