//! Result extraction from heterogeneous terminal responses.
//!
//! Providers have returned finished jobs in several shapes over time. The
//! known shapes live in one ordered rule list; the first rule that finds a
//! non-empty URI wins, even when a later rule would also match.

use serde_json::Value;
use vstudio_models::{ErrorInfo, JobStatus, RawStatus, ResultLocator};

use crate::error::TrackerError;

/// Top-level field a rule reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Root {
    Response,
    Result,
}

/// One known location of a result URI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShapeRule {
    /// Name used in logs
    pub name: &'static str,
    pub root: Root,
    /// JSON pointer below the root
    pub pointer: &'static str,
}

impl ShapeRule {
    pub const fn new(name: &'static str, root: Root, pointer: &'static str) -> Self {
        Self {
            name,
            root,
            pointer,
        }
    }

    fn apply(&self, raw: &RawStatus) -> Option<ResultLocator> {
        let root = match self.root {
            Root::Response => raw.response.as_ref(),
            Root::Result => raw.result.as_ref(),
        }?;

        root.pointer(self.pointer)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|uri| !uri.is_empty())
            .map(ResultLocator::new)
    }
}

/// Known shapes, most specific first.
pub const DEFAULT_RULES: &[ShapeRule] = &[
    ShapeRule::new("response.generatedVideos", Root::Response, "/generatedVideos/0/video/uri"),
    ShapeRule::new(
        "response.generateVideoResponse",
        Root::Response,
        "/generateVideoResponse/generatedSamples/0/video/uri",
    ),
    ShapeRule::new("response.video", Root::Response, "/video/uri"),
    ShapeRule::new("result.generatedVideos", Root::Result, "/generatedVideos/0/video/uri"),
    ShapeRule::new("result.video", Root::Result, "/video/uri"),
    ShapeRule::new("response.generatedImages", Root::Response, "/generatedImages/0/image/uri"),
    ShapeRule::new("result.generatedImages", Root::Result, "/generatedImages/0/image/uri"),
];

const FILTER_POINTERS: &[&str] = &[
    "/raiMediaFilteredReasons",
    "/generateVideoResponse/raiMediaFilteredReasons",
];

/// Ordered-rule resolver for terminal responses. Pure; no I/O.
#[derive(Debug, Clone)]
pub struct ResponseShapeResolver {
    rules: Vec<ShapeRule>,
}

impl Default for ResponseShapeResolver {
    fn default() -> Self {
        Self {
            rules: DEFAULT_RULES.to_vec(),
        }
    }
}

impl ResponseShapeResolver {
    pub fn with_rules(rules: Vec<ShapeRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[ShapeRule] {
        &self.rules
    }

    /// First matching locator and the rule that produced it.
    pub fn extract(&self, raw: &RawStatus) -> Option<(ResultLocator, &'static str)> {
        self.rules
            .iter()
            .find_map(|rule| rule.apply(raw).map(|locator| (locator, rule.name)))
    }

    /// Turn a raw status into a canonical one.
    ///
    /// A done status with an `error` is a failure regardless of any result
    /// it also carries. A done status with neither a locator nor a safety
    /// filter reason is a `Resolution` error.
    pub fn resolve(&self, raw: &RawStatus) -> Result<JobStatus, TrackerError> {
        if !raw.done {
            return Ok(JobStatus::Pending);
        }

        if let Some(error) = raw.error.as_ref().filter(|e| !e.is_null()) {
            return Ok(JobStatus::Failed(ErrorInfo::from_value(error)));
        }

        if let Some((locator, _)) = self.extract(raw) {
            return Ok(JobStatus::Succeeded(locator));
        }

        if let Some(reasons) = filter_reasons(raw) {
            return Ok(JobStatus::Failed(ErrorInfo::new(reasons)));
        }

        Err(TrackerError::resolution(describe_shape(raw)))
    }
}

fn filter_reasons(raw: &RawStatus) -> Option<String> {
    let response = raw.response.as_ref()?;
    FILTER_POINTERS.iter().find_map(|pointer| {
        let reasons: Vec<&str> = response
            .pointer(pointer)?
            .as_array()?
            .iter()
            .filter_map(Value::as_str)
            .collect();
        (!reasons.is_empty()).then(|| format!("Content filtered: {}", reasons.join("; ")))
    })
}

fn describe_shape(raw: &RawStatus) -> String {
    let keys = |v: Option<&Value>| -> String {
        match v.and_then(Value::as_object) {
            Some(map) => map.keys().cloned().collect::<Vec<_>>().join(","),
            None => "-".to_string(),
        }
    };
    format!(
        "no result URI (response keys: [{}], result keys: [{}])",
        keys(raw.response.as_ref()),
        keys(raw.result.as_ref())
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn done(body: Value) -> RawStatus {
        serde_json::from_value(body).unwrap()
    }

    fn resolve(body: Value) -> Result<JobStatus, TrackerError> {
        ResponseShapeResolver::default().resolve(&done(body))
    }

    fn locator(s: &str) -> JobStatus {
        JobStatus::Succeeded(ResultLocator::new(s))
    }

    #[test]
    fn test_not_done_is_pending() {
        assert_eq!(resolve(json!({ "done": false })).unwrap(), JobStatus::Pending);
        assert_eq!(resolve(json!({})).unwrap(), JobStatus::Pending);
    }

    #[test]
    fn test_generated_videos_preferred_over_legacy_video() {
        let status = resolve(json!({
            "done": true,
            "response": {
                "video": { "uri": "https://legacy" },
                "generatedVideos": [{ "video": { "uri": "https://newer" } }]
            }
        }))
        .unwrap();
        assert_eq!(status, locator("https://newer"));
    }

    #[test]
    fn test_each_shape_resolves() {
        let cases = [
            (json!({ "response": { "generatedVideos": [{ "video": { "uri": "a" } }] } }), "a"),
            (
                json!({ "response": { "generateVideoResponse": { "generatedSamples": [{ "video": { "uri": "b" } }] } } }),
                "b",
            ),
            (json!({ "response": { "video": { "uri": "c" } } }), "c"),
            (json!({ "result": { "generatedVideos": [{ "video": { "uri": "d" } }] } }), "d"),
            (json!({ "result": { "video": { "uri": "e" } } }), "e"),
            (json!({ "response": { "generatedImages": [{ "image": { "uri": "f" } }] } }), "f"),
            (json!({ "result": { "generatedImages": [{ "image": { "uri": "g" } }] } }), "g"),
        ];

        for (mut body, expected) in cases {
            body["done"] = json!(true);
            assert_eq!(resolve(body).unwrap(), locator(expected));
        }
    }

    #[test]
    fn test_response_root_beats_result_root() {
        let status = resolve(json!({
            "done": true,
            "response": { "video": { "uri": "from-response" } },
            "result": { "generatedVideos": [{ "video": { "uri": "from-result" } }] }
        }))
        .unwrap();
        assert_eq!(status, locator("from-response"));
    }

    #[test]
    fn test_empty_uri_falls_through() {
        let status = resolve(json!({
            "done": true,
            "response": {
                "generatedVideos": [{ "video": { "uri": "" } }],
                "video": { "uri": "fallback" }
            }
        }))
        .unwrap();
        assert_eq!(status, locator("fallback"));
    }

    #[test]
    fn test_error_wins_over_result() {
        let status = resolve(json!({
            "done": true,
            "error": { "code": 13, "message": "internal" },
            "response": { "generatedVideos": [{ "video": { "uri": "x" } }] }
        }))
        .unwrap();
        assert_eq!(status, JobStatus::Failed(ErrorInfo::new("internal").with_code(13)));
    }

    #[test]
    fn test_filtered_response_is_failure() {
        let status = resolve(json!({
            "done": true,
            "response": { "generateVideoResponse": { "raiMediaFilteredReasons": ["celebrity"] } }
        }))
        .unwrap();
        match status {
            JobStatus::Failed(info) => assert!(info.message.contains("celebrity")),
            other => panic!("unexpected status: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_shape_is_resolution_error() {
        let err = resolve(json!({ "done": true, "response": { "somethingElse": 1 } })).unwrap_err();
        assert!(matches!(err, TrackerError::Resolution(ref m) if m.contains("somethingElse")));

        let err = resolve(json!({ "done": true })).unwrap_err();
        assert_eq!(err.stage(), "resolution");
    }

    #[test]
    fn test_custom_rules() {
        let resolver = ResponseShapeResolver::with_rules(vec![ShapeRule::new(
            "custom",
            Root::Response,
            "/output/url",
        )]);
        let raw = done(json!({ "done": true, "response": { "output": { "url": "z" } } }));
        assert_eq!(resolver.extract(&raw), Some((ResultLocator::new("z"), "custom")));
    }
}
