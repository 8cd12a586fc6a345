use regex::Regex;
use std::sync::LazyLock;

static BLOCK_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/").expect("block comment pattern is valid"));

static LINE_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"//[^\n]*").expect("line comment pattern is valid"));

/// Strips comments and blank lines from contract source.
///
/// Block comments go first, then line comments, then lines that are empty
/// or whitespace-only. Remaining lines keep their order and are joined with
/// `\n`. The result is a fixed point: cleaning it again changes nothing.
pub fn clean(code: &str) -> String {
    let mut text = code.to_owned();
    // Removing one comment can splice `/` and `/* .. */` into a new one.
    while BLOCK_COMMENT.is_match(&text) {
        text = BLOCK_COMMENT.replace_all(&text, "").into_owned();
    }
    let text = LINE_COMMENT.replace_all(&text, "");

    text.split('\n')
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_leading_line_comment_and_blank_lines() {
        assert_eq!(clean("// comment\nfunction f() {}\n\n"), "function f() {}");
    }

    #[test]
    fn strips_block_comments_across_lines() {
        let code = "pragma solidity ^0.4.24;\n/* owner\n * only\n */\ncontract A {\n    uint x; /* inline */\n}";
        assert_eq!(
            clean(code),
            "pragma solidity ^0.4.24;\ncontract A {\n    uint x; \n}"
        );
    }

    #[test]
    fn block_comment_is_non_greedy() {
        assert_eq!(clean("a /* one */ b /* two */ c"), "a  b  c");
    }

    #[test]
    fn keeps_line_order() {
        let code = "contract A {\n\n  // state\n  uint a;\n\t\n  uint b;\n}";
        assert_eq!(clean(code), "contract A {\n  uint a;\n  uint b;\n}");
    }

    #[test]
    fn unterminated_block_comment_is_left_alone() {
        assert_eq!(clean("uint a;\n/* open"), "uint a;\n/* open");
    }

    #[test]
    fn spliced_comment_is_removed_in_one_pass() {
        // Dropping the inner comment leaves `/* b */` behind.
        let code = "//* a */* b */x";
        assert_eq!(clean(code), "x");
    }

    #[test]
    fn clean_is_idempotent() {
        let inputs = [
            "",
            "   \n\t\n",
            "// only a comment",
            "//* a */* b */x",
            "a // b /* c\n d */ e",
            "/* a // */ b */ c",
            "// x /*\n */ y",
            "x /\n\n* y */",
            "uint a;\r\n// note\r\nuint b;\r\n",
            "function f() public {\n    msg.sender.call.value(1)(); // reentrant\n}\n",
        ];
        for input in inputs {
            let once = clean(input);
            assert_eq!(clean(&once), once, "input: {input:?}");
            assert!(!BLOCK_COMMENT.is_match(&once), "input: {input:?}");
            assert!(!once.contains("//"), "input: {input:?}");
            assert!(once.split('\n').all(|line| !line.trim().is_empty()) || once.is_empty());
        }
    }
}
