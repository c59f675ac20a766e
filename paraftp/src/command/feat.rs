use crate::types::{Features, Response};

/// Parses the FEAT reply into the feature map.
///
/// RFC is specified [RFC 2389](https://datatracker.ietf.org/doc/html/rfc2389#section-3.2).
///
/// This is the syntax of the FEAT response:
///
/// - no-features: "211 [SP] ..."
/// - features-list: "211-...":
///     - SP "feature-label" [SP "description"]
///     - "211 END"
///
/// Only indented lines carry a feature; any other line of the block is ignored.
pub fn parse_features(response: &Response) -> Features {
    let mut features = Features::with_capacity(response.lines.len());
    for line in response.lines.iter().skip(1) {
        parse_feature(line, &mut features);
    }
    features
}

/// Parses a single `SP feature-label [SP description]` line.
fn parse_feature(line: &str, features: &mut Features) {
    if !line.starts_with(' ') {
        return;
    }
    let line = line.trim();
    if line.is_empty() {
        return;
    }
    let (name, description) = match line.split_once(' ') {
        Some((name, description)) => (name, Some(description.trim().to_string())),
        None => (line, None),
    };
    debug!("found supported feature: {name}: {description:?}");
    features.insert(name.to_string(), description);
}
