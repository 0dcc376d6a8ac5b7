//! Locating the fenced YAML block inside a manifest markdown document

use toc_core::{Result, TocError};

const OPEN_FENCE: &str = "```yaml";
const CLOSE_FENCE: &str = "\n```";

/// Return the body of the first `yaml` fenced block.
///
/// The opening fence must be followed by optional whitespace and a newline.
/// The body ends at the first line that starts with a closing fence.
pub fn extract_yaml_block(text: &str) -> Result<&str> {
    let mut search_from = 0;
    while let Some(pos) = text[search_from..].find(OPEN_FENCE) {
        let after_tag = search_from + pos + OPEN_FENCE.len();
        if let Some(body_start) = body_start(text, after_tag) {
            if let Some(end) = text[body_start..].find(CLOSE_FENCE) {
                return Ok(&text[body_start..body_start + end]);
            }
        }
        search_from = after_tag;
    }
    Err(TocError::NoYamlBlock)
}

/// Position just past the last newline in the whitespace run after the fence tag
fn body_start(text: &str, after_tag: usize) -> Option<usize> {
    let rest = &text[after_tag..];
    let ws_len = rest
        .char_indices()
        .find(|(_, c)| !c.is_whitespace())
        .map(|(i, _)| i)
        .unwrap_or(rest.len());
    rest[..ws_len].rfind('\n').map(|nl| after_tag + nl + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_first_block() {
        let md = "# Manifest\n\n```yaml\nscenes:\n  - scene_id: 1\n```\n\n```yaml\nother: true\n```\n";
        assert_eq!(extract_yaml_block(md).unwrap(), "scenes:\n  - scene_id: 1");
    }

    #[test]
    fn test_skips_fence_without_newline() {
        let md = "```yamlish\nnope\n```\n```yaml  \nkey: v\n```";
        assert_eq!(extract_yaml_block(md).unwrap(), "key: v");
    }

    #[test]
    fn test_missing_block() {
        let err = extract_yaml_block("no fences here").unwrap_err();
        assert!(matches!(err, TocError::NoYamlBlock));
        assert!(extract_yaml_block("```yaml\nunterminated").is_err());
    }
}
