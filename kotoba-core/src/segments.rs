//! Segment normalization for the transcription engine collaborator's
//! output (SPEC_FULL.md §16). Ported from `original_source/src/
//! constants.py`'s `normalize_segments`: the inference collaborator may
//! key its output `chunks` or `segments`, and may give timestamps either
//! as a `[start, end]` pair under `timestamp` or as separate `start`/`end`
//! fields directly. Shared by the transcription, batch, and realtime
//! workers so all three report the same shape to subscribers.

use serde_json::Value;

/// One normalized transcript segment.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Segment {
    pub text: String,
    pub start: f64,
    pub end: f64,
}

/// Normalizes whatever shape the engine collaborator returned under
/// `result["chunks"]` or `result["segments"]` into a uniform `Segment`
/// list. Unrecognized segment shapes degrade to an empty-timed entry
/// rather than being dropped, matching the original's behavior.
pub fn normalize_segments(result: &Value) -> Vec<Segment> {
    let raw = result
        .get("chunks")
        .or_else(|| result.get("segments"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    raw.iter().map(normalize_one).collect()
}

fn normalize_one(seg: &Value) -> Segment {
    let text = seg
        .get("text")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();

    if let Some(ts) = seg.get("timestamp").and_then(Value::as_array) {
        let start = ts.first().and_then(Value::as_f64).unwrap_or(0.0);
        let end = ts.get(1).and_then(Value::as_f64).unwrap_or(0.0);
        return Segment { text, start, end };
    }

    if seg.get("start").is_some() {
        let start = seg.get("start").and_then(Value::as_f64).unwrap_or(0.0);
        let end = seg.get("end").and_then(Value::as_f64).unwrap_or(0.0);
        return Segment { text, start, end };
    }

    Segment {
        text,
        start: 0.0,
        end: 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_chunks_key_with_timestamp_pair() {
        let result = json!({
            "chunks": [
                {"text": "hello", "timestamp": [0.0, 1.5]},
                {"text": "world", "timestamp": [1.5, 3.0]},
            ]
        });
        let segments = normalize_segments(&result);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].start, 0.0);
        assert_eq!(segments[1].end, 3.0);
    }

    #[test]
    fn falls_back_to_segments_key_with_direct_start_end_fields() {
        let result = json!({
            "segments": [{"text": "hi", "start": 0.2, "end": 1.0}]
        });
        let segments = normalize_segments(&result);
        assert_eq!(segments, vec![Segment { text: "hi".into(), start: 0.2, end: 1.0 }]);
    }

    #[test]
    fn unrecognized_shape_degrades_to_zeroed_timestamps() {
        let result = json!({ "chunks": [{"text": "orphan"}] });
        let segments = normalize_segments(&result);
        assert_eq!(segments[0].start, 0.0);
        assert_eq!(segments[0].end, 0.0);
    }

    #[test]
    fn incomplete_timestamp_pair_defaults_missing_end_to_zero() {
        let result = json!({ "chunks": [{"text": "partial", "timestamp": [2.0]}] });
        let segments = normalize_segments(&result);
        assert_eq!(segments[0].start, 2.0);
        assert_eq!(segments[0].end, 0.0);
    }

    #[test]
    fn missing_chunks_and_segments_yields_empty_list() {
        let result = json!({});
        assert!(normalize_segments(&result).is_empty());
    }
}
