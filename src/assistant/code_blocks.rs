//! Fenced code block extraction from free-form assistant answers.

use std::sync::OnceLock;

use regex::Regex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    pub language: Option<String>,
    pub code: String,
}

fn fence() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"```([\w+#-]+)?[^\S\n]*\n([\s\S]*?)```").expect("fence regex is valid")
    })
}

/// All fenced blocks in order of appearance. An unterminated fence is ignored.
pub fn extract_code_blocks(text: &str) -> Vec<CodeBlock> {
    fence()
        .captures_iter(text)
        .map(|caps| CodeBlock {
            language: caps.get(1).map(|m| m.as_str().to_string()),
            code: caps
                .get(2)
                .map(|m| m.as_str().trim_end_matches('\n').to_string())
                .unwrap_or_default(),
        })
        .collect()
}

/// Last block in the answer, usually the final version of the code.
pub fn last_code_block(text: &str) -> Option<CodeBlock> {
    extract_code_blocks(text).pop()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_tagged_and_untagged_blocks() {
        let text = "Try this:\n```python\nprint('hi')\n```\nor\n```\necho hi\n```\n";
        let blocks = extract_code_blocks(text);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].language.as_deref(), Some("python"));
        assert_eq!(blocks[0].code, "print('hi')");
        assert_eq!(blocks[1].language, None);
        assert_eq!(blocks[1].code, "echo hi");
    }

    #[test]
    fn handles_symbol_language_tags() {
        let blocks = extract_code_blocks("```c++\nint main(){}\n```\n```c#\nclass A {}\n```");
        assert_eq!(blocks[0].language.as_deref(), Some("c++"));
        assert_eq!(blocks[1].language.as_deref(), Some("c#"));
    }

    #[test]
    fn keeps_inner_blank_lines_and_indentation() {
        let blocks = extract_code_blocks("```rust\nfn main() {\n\n    let x = 1;\n}\n```");
        assert_eq!(blocks[0].code, "fn main() {\n\n    let x = 1;\n}");
    }

    #[test]
    fn no_blocks_or_unterminated() {
        assert!(extract_code_blocks("plain answer").is_empty());
        assert!(extract_code_blocks("```js\nconsole.log(1)\n").is_empty());
        assert_eq!(last_code_block("plain"), None);
    }

    #[test]
    fn last_block_wins() {
        let text = "```py\na = 1\n```\nthen\n```py\na = 2\n```";
        assert_eq!(last_code_block(text).unwrap().code, "a = 2");
    }
}
