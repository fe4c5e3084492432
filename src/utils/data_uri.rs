use base64::Engine;
use base64::engine::general_purpose::STANDARD;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    pub media_type: String,
    /// Base64 payload, kept encoded; the gateway never needs the raw pixels.
    pub data: String,
}

/// Parses `data:<media-type>;base64,<payload>`. Non-base64 data URIs are
/// not produced by any provider here and are rejected.
pub fn parse(input: &str) -> Option<DataUri> {
    let rest = input.strip_prefix("data:")?;
    let (header, data) = rest.split_once(',')?;
    let media_type = header.strip_suffix(";base64")?;
    if data.is_empty() {
        return None;
    }
    Some(DataUri {
        media_type: if media_type.is_empty() {
            "application/octet-stream".to_string()
        } else {
            media_type.to_string()
        },
        data: data.to_string(),
    })
}

pub fn format(media_type: &str, base64_data: &str) -> String {
    format!("data:{media_type};base64,{base64_data}")
}

pub fn encode_bytes(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}
