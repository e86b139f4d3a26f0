//! Fixed instructions for the fuse and verify stages

use crate::llm::Message;
use serde_json::Value;

const MERGE_SYSTEM: &str = "You merge similar pieces of content into one, keeping every important \
piece of information and removing redundancy.
Rules:
1. Combine overlapping information
2. Preserve unique details from both sources
3. Maintain the structure of the inputs
4. Respond with valid JSON only
5. Ensure the result is semantically consistent";

const VERIFY_SYSTEM: &str = "You verify merged content. Compare the two originals with the merged \
result and check that:
1. All critical information is preserved
2. No semantic conflicts exist
3. Context and relationships are maintained
4. The structure is valid
5. The result is logically consistent
Respond with JSON only, in exactly this shape:
{\"success\": true|false, \"confidence\": <number between 0 and 1>, \"issues\": [<string>], \"suggestions\": [<string>]}";

/// Messages asking the backend to fuse two contents
pub fn merge_messages(first: &Value, second: &Value) -> Vec<Message> {
    vec![
        Message::system(MERGE_SYSTEM),
        Message::user(format!(
            "Merge these two pieces of content:\nContent 1: {first}\nContent 2: {second}\n\
             Respond with only the merged content in the same JSON structure as the inputs."
        )),
    ]
}

/// Messages asking the backend to judge a fused candidate
pub fn verify_messages(first: &Value, second: &Value, merged: &Value) -> Vec<Message> {
    vec![
        Message::system(VERIFY_SYSTEM),
        Message::user(format!(
            "Verify this merge:\nOriginal 1: {first}\nOriginal 2: {second}\nMerged result: {merged}"
        )),
    ]
}

/// Strip a surrounding markdown code fence, if the backend added one
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // Drop an info string such as "json" on the opening fence line, but
    // not a first line of JSON when the fence has no info string
    match body.split_once('\n') {
        Some((info, inner)) if is_info_string(info) => inner.trim(),
        _ => body.trim(),
    }
}

fn is_info_string(line: &str) -> bool {
    let line = line.trim();
    !line.contains(char::is_whitespace) && !line.starts_with(['{', '[', '"'])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Role;
    use serde_json::json;

    #[test]
    fn merge_messages_embed_both_contents() {
        let msgs = merge_messages(&json!({"a": 1}), &json!({"b": 2}));
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].role, Role::System);
        assert!(msgs[0].content.contains("valid JSON only"));
        assert!(msgs[1].content.contains("{\"a\":1}"));
        assert!(msgs[1].content.contains("{\"b\":2}"));
    }

    #[test]
    fn verify_messages_request_structured_judgement() {
        let msgs = verify_messages(&json!(1), &json!(2), &json!({"m": 3}));
        assert!(msgs[0].content.contains("\"confidence\""));
        assert!(msgs[1].content.contains("Merged result: {\"m\":3}"));
    }

    #[test]
    fn strips_fences_with_and_without_info_string() {
        assert_eq!(strip_code_fence("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fence("```\n[1, 2]\n```"), "[1, 2]");
        assert_eq!(strip_code_fence("  {\"a\": 1} "), "{\"a\": 1}");
    }

    #[test]
    fn json_on_the_opening_fence_line_is_kept() {
        let text = "```{\"a\":1,\n\"b\":2}```";
        let stripped = strip_code_fence(text);
        assert_eq!(stripped, "{\"a\":1,\n\"b\":2}");
        let parsed: Value = serde_json::from_str(stripped).unwrap();
        assert_eq!(parsed, json!({"a": 1, "b": 2}));

        assert_eq!(strip_code_fence("```[1,\n2]\n```"), "[1,\n2]");
    }
}
