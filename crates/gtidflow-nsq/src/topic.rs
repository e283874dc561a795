use crate::error::{NsqError, NsqResult};

const MAX_TOPIC_LEN: usize = 64;
const EPHEMERAL_SUFFIX: &str = "#ephemeral";

/// Check a name against nsqd's topic rules: 1 to 64 characters of
/// `[.a-zA-Z0-9_-]`, optionally ending in `#ephemeral`.
pub fn validate_topic(topic: &str) -> NsqResult<()> {
    let invalid = |reason: &str| NsqError::InvalidTopic {
        topic: topic.to_string(),
        reason: reason.to_string(),
    };

    if topic.is_empty() {
        return Err(invalid("topic name is empty"));
    }
    if topic.len() > MAX_TOPIC_LEN {
        return Err(invalid("topic name is longer than 64 characters"));
    }

    let base = topic.strip_suffix(EPHEMERAL_SUFFIX).unwrap_or(topic);
    if base.is_empty() {
        return Err(invalid("topic name is empty"));
    }
    if let Some(c) = base
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
    {
        return Err(invalid(&format!("character '{}' is not allowed", c)));
    }

    Ok(())
}
