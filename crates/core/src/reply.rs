//! Reply Decoder
//!
//! Turns the model's raw text into an ordered list of [`ReplySegment`]s.
//! The decoder is total: whatever the model sends back, the caller gets at
//! least one renderable segment.

use crate::vocabulary::{Animation, FacialExpression};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// One unit of a reply: an expression, an animation clip and the text spoken
/// while they play.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplySegment {
    pub facial_expression: String,
    pub animation: String,
    pub text: String,
}

impl ReplySegment {
    /// The segment used when a reply cannot be decoded.
    pub fn fallback(raw: &str) -> Self {
        Self {
            facial_expression: FacialExpression::Neutral.as_str().to_string(),
            animation: Animation::StandingIdle.as_str().to_string(),
            text: raw.to_string(),
        }
    }

    /// The expression as a known vocabulary entry, if it is one.
    pub fn expression(&self) -> Option<FacialExpression> {
        self.facial_expression.parse().ok()
    }

    /// The animation as a known vocabulary entry, if it is one.
    pub fn clip(&self) -> Option<Animation> {
        self.animation.parse().ok()
    }
}

/// A decoded reply. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    segments: Vec<ReplySegment>,
    fallback: bool,
}

impl Reply {
    pub fn segments(&self) -> &[ReplySegment] {
        &self.segments
    }

    pub fn into_segments(self) -> Vec<ReplySegment> {
        self.segments
    }

    /// True when the raw text could not be decoded and the reply carries the
    /// single fallback segment.
    pub fn is_fallback(&self) -> bool {
        self.fallback
    }

    fn fallback(raw: &str) -> Self {
        Self {
            segments: vec![ReplySegment::fallback(raw)],
            fallback: true,
        }
    }
}

/// How unknown vocabulary labels are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodePolicy {
    /// Unknown expressions and animations pass through unchanged.
    #[default]
    Lenient,
    /// Any unknown label fails the whole reply, which then falls back.
    Strict,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReplyDecoder {
    policy: DecodePolicy,
}

impl ReplyDecoder {
    pub fn new(policy: DecodePolicy) -> Self {
        Self { policy }
    }

    /// Decodes raw model output. Always returns at least one segment.
    pub fn decode(&self, raw: &str) -> Reply {
        for candidate in candidates(raw) {
            let Ok(value) = serde_json::from_str::<Value>(&candidate) else {
                continue;
            };
            match self.segments_from(value) {
                Some(segments) => {
                    debug!(segments = segments.len(), "Decoded structured reply");
                    return Reply {
                        segments,
                        fallback: false,
                    };
                }
                // Parsed but wrong shape, e.g. a bracketed note in prose.
                None => continue,
            }
        }
        warn!(
            raw_len = raw.len(),
            "Reply did not match the segment schema; using fallback"
        );
        Reply::fallback(raw)
    }

    fn segments_from(&self, value: Value) -> Option<Vec<ReplySegment>> {
        let elements = match value {
            Value::Array(items) => items,
            obj @ Value::Object(_) => vec![obj],
            _ => return None,
        };
        if elements.is_empty() {
            return None;
        }
        elements
            .into_iter()
            .map(|element| self.segment_from(element))
            .collect()
    }

    fn segment_from(&self, element: Value) -> Option<ReplySegment> {
        let field = |name: &str| -> Option<String> {
            let text = element.get(name)?.as_str()?.trim();
            (!text.is_empty()).then(|| text.to_string())
        };
        let segment = ReplySegment {
            facial_expression: field("facialExpression")?,
            animation: field("animation")?,
            text: field("text")?,
        };
        if self.policy == DecodePolicy::Strict
            && (segment.expression().is_none() || segment.clip().is_none())
        {
            debug!(
                expression = %segment.facial_expression,
                animation = %segment.animation,
                "Rejecting segment with unknown vocabulary"
            );
            return None;
        }
        Some(segment)
    }
}

/// Convenience for the default lenient decoder.
pub fn decode(raw: &str) -> Reply {
    ReplyDecoder::default().decode(raw)
}

/// Progressively looser readings of the raw text, tried in order.
fn candidates(raw: &str) -> Vec<String> {
    let trimmed = raw.trim();
    let unfenced = strip_code_fence(trimmed);

    let mut bodies = vec![unfenced];
    if let Some(end) = unfenced.rfind(']') {
        // Widest span first, then the one opening on an array of objects.
        for start in [unfenced.find('['), object_array_start(unfenced)]
            .into_iter()
            .flatten()
        {
            if start < end {
                bodies.push(&unfenced[start..=end]);
            }
        }
    }

    let mut out = vec![trimmed.to_string()];
    let mut push = |candidate: String| {
        if !out.contains(&candidate) {
            out.push(candidate);
        }
    };
    for body in &bodies {
        push(body.to_string());
    }
    for body in bodies.iter().filter(|body| body.contains('\'')) {
        push(requote(body));
    }
    out
}

/// Byte offset of the first `[` whose next non-blank character is `{`.
fn object_array_start(text: &str) -> Option<usize> {
    text.match_indices('[')
        .map(|(i, _)| i)
        .find(|&i| text[i + 1..].trim_start().starts_with('{'))
}

/// Rewrites single-quoted strings as double-quoted ones. Double-quoted
/// strings are copied as they are, apostrophes included.
fn requote(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut quote: Option<char> = None;
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        match (quote, c) {
            (None, '\'') => {
                quote = Some('\'');
                out.push('"');
            }
            (None, '"') => {
                quote = Some('"');
                out.push('"');
            }
            (None, _) => out.push(c),
            (Some(q), '\\') => match chars.next() {
                Some('\'') if q == '\'' => out.push('\''),
                Some(escaped) => {
                    out.push('\\');
                    out.push(escaped);
                }
                None => out.push('\\'),
            },
            (Some('\''), '"') => out.push_str("\\\""),
            (Some(q), _) if c == q => {
                quote = None;
                out.push('"');
            }
            (Some(_), _) => out.push(c),
        }
    }
    out
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the language tag line, e.g. "```json".
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or(rest);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}
