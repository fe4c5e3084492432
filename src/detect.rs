use serde::Deserialize;

use crate::types::DetectedObject;

/// Instruction sent to every analysis-capable model. Models are not
/// contractually obligated to honor the format, hence the two-stage
/// extraction below.
pub(crate) const ANALYSIS_PROMPT: &str = "You are a home-renovation assistant. \
Identify the notable objects and surfaces in this room photo. \
Respond with only a JSON object of the form \
{\"objects\": [{\"name\": \"...\", \"confidence\": 0.0, \"location\": \"...\", \
\"suggestion\": \"...\", \"estimated_cost\": \"...\", \"timeline\": \"...\"}]} \
with confidence between 0 and 1. No prose, no markdown fences.";

/// Outcome of trying to recover a detections list from free-form model
/// text. `Unparseable` is a normal state, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionParse {
    Parsed(Vec<DetectedObject>),
    Unparseable { reason: String },
}

#[derive(Debug, Deserialize)]
struct DetectionEnvelope {
    #[serde(default, alias = "detections", alias = "items")]
    objects: Vec<DetectedObject>,
}

/// Two-stage extraction: first the whole reply as JSON, then the outermost
/// brace-delimited slice (which also strips markdown fences and prose).
pub fn extract_detections(text: &str) -> DetectionParse {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return DetectionParse::Unparseable {
            reason: "empty model reply".to_string(),
        };
    }

    match parse_stage(trimmed) {
        Ok(objects) => return DetectionParse::Parsed(objects),
        Err(first_err) => {
            if let Some(slice) = outermost_object(trimmed) {
                if let Ok(objects) = parse_stage(slice) {
                    return DetectionParse::Parsed(objects);
                }
            }
            DetectionParse::Unparseable {
                reason: format!("no detections object recoverable from reply: {first_err}"),
            }
        }
    }
}

fn parse_stage(text: &str) -> serde_json::Result<Vec<DetectedObject>> {
    // A bare array is accepted as well; some models skip the envelope.
    if text.starts_with('[') {
        return serde_json::from_str::<Vec<DetectedObject>>(text);
    }
    serde_json::from_str::<DetectionEnvelope>(text).map(|envelope| envelope.objects)
}

fn outermost_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Shared normalizer step for analysis replies: parsed detections when the
/// model honored the format, the fallback set when it did not.
pub(crate) fn detections_or_fallback(provider: &str, reply: &str) -> Vec<DetectedObject> {
    match extract_detections(reply) {
        DetectionParse::Parsed(objects) => objects,
        DetectionParse::Unparseable { reason } => {
            tracing::warn!(provider, %reason, "degrading to fallback detections");
            fallback_detections()
        }
    }
}

/// Minimal detection set used when extraction fails: keeps the user-facing
/// flow moving instead of surfacing a hard failure.
pub fn fallback_detections() -> Vec<DetectedObject> {
    vec![
        DetectedObject {
            name: "walls".to_string(),
            confidence: 0.5,
            location: "room perimeter".to_string(),
            suggestion: Some("Fresh coat of paint".to_string()),
            estimated_cost: Some("$200-600".to_string()),
            timeline: Some("1-2 days".to_string()),
            shopping_links: None,
        },
        DetectedObject {
            name: "flooring".to_string(),
            confidence: 0.5,
            location: "floor".to_string(),
            suggestion: Some("Refinish or replace flooring".to_string()),
            estimated_cost: Some("$1,000-4,000".to_string()),
            timeline: Some("3-5 days".to_string()),
            shopping_links: None,
        },
        DetectedObject {
            name: "lighting".to_string(),
            confidence: 0.5,
            location: "ceiling".to_string(),
            suggestion: Some("Update light fixtures".to_string()),
            estimated_cost: Some("$100-500".to_string()),
            timeline: Some("1 day".to_string()),
            shopping_links: None,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_clean_json_envelope() {
        let reply = r#"{"objects": [{"name": "sofa", "confidence": 0.9, "location": "left wall"}]}"#;
        match extract_detections(reply) {
            DetectionParse::Parsed(objects) => {
                assert_eq!(objects.len(), 1);
                assert_eq!(objects[0].name, "sofa");
            }
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn recovers_object_from_fenced_prose() {
        let reply = "Sure! Here is the analysis you asked for:\n```json\n{\"objects\": [{\"name\": \"window\", \"confidence\": 0.7, \"location\": \"north wall\"}]}\n```\nLet me know if you need more.";
        match extract_detections(reply) {
            DetectionParse::Parsed(objects) => assert_eq!(objects[0].name, "window"),
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn accepts_bare_array_replies() {
        let reply = r#"[{"name": "rug", "confidence": 0.8, "location": "center"}]"#;
        match extract_detections(reply) {
            DetectionParse::Parsed(objects) => assert_eq!(objects[0].name, "rug"),
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn prose_without_json_is_unparseable() {
        let parse = extract_detections("This room has a lovely sofa and two windows.");
        assert!(matches!(parse, DetectionParse::Unparseable { .. }));
    }

    #[test]
    fn fallback_set_is_nonempty_and_bounded() {
        let fallback = fallback_detections();
        assert!(!fallback.is_empty());
        for object in &fallback {
            assert!((0.0..=1.0).contains(&object.confidence));
        }
    }
}
