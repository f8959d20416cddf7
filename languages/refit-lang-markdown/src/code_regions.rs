//! Spans of a markdown document that are not prose
//!
//! Links inside fenced code blocks, inline code spans and HTML comments are
//! examples or commented out, and are never treated as references.

use regex::Regex;
use std::sync::LazyLock;

static HTML_COMMENT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());

/// Byte ranges holding code or comments, sorted by start.
#[derive(Debug, Default)]
pub struct CodeRegions {
    ranges: Vec<(usize, usize)>,
}

impl CodeRegions {
    pub fn scan(content: &str) -> Self {
        let mut ranges = Vec::new();
        // (fence char, fence length, block start)
        let mut fence: Option<(char, usize, usize)> = None;
        let mut offset = 0;

        for line in content.split_inclusive('\n') {
            let trimmed = line.trim_start_matches(' ');
            let indent = line.len() - trimmed.len();
            let run = fence_run(trimmed);

            match fence {
                Some((ch, len, start)) => {
                    let closes = indent <= 3
                        && run.is_some_and(|(c, l)| c == ch && l >= len && trimmed[l..].trim().is_empty());
                    if closes {
                        ranges.push((start, offset + line.len()));
                        fence = None;
                    }
                }
                None => match run {
                    Some((ch, len)) if indent <= 3 => fence = Some((ch, len, offset)),
                    _ => inline_code(line, offset, &mut ranges),
                },
            }
            offset += line.len();
        }
        if let Some((_, _, start)) = fence {
            ranges.push((start, content.len()));
        }

        ranges.extend(HTML_COMMENT_REGEX.find_iter(content).map(|m| (m.start(), m.end())));
        ranges.sort_unstable();
        Self { ranges }
    }

    pub fn contains(&self, offset: usize) -> bool {
        self.ranges
            .iter()
            .take_while(|(start, _)| *start <= offset)
            .any(|(_, end)| offset < *end)
    }
}

/// A line opening or closing a fence: three or more backticks or tildes.
fn fence_run(line: &str) -> Option<(char, usize)> {
    let ch = line.chars().next().filter(|c| *c == '`' || *c == '~')?;
    let len = line.chars().take_while(|c| *c == ch).count();
    (len >= 3).then_some((ch, len))
}

/// Inline code spans on one line: a backtick run closed by a run of equal length.
fn inline_code(line: &str, offset: usize, ranges: &mut Vec<(usize, usize)>) {
    let bytes = line.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'`' {
            i += 1;
            continue;
        }
        let open_len = bytes[i..].iter().take_while(|b| **b == b'`').count();
        let mut j = i + open_len;
        let mut closed = None;
        while j < bytes.len() {
            if bytes[j] == b'`' {
                let run = bytes[j..].iter().take_while(|b| **b == b'`').count();
                if run == open_len {
                    closed = Some(j + run);
                    break;
                }
                j += run;
            } else {
                j += 1;
            }
        }
        match closed {
            Some(end) => {
                ranges.push((offset + i, offset + end));
                i = end;
            }
            None => i += open_len,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fenced_block_is_code() {
        let content = "intro\n```ts\n[a](a.md)\n```\noutro [b](b.md)\n";
        let regions = CodeRegions::scan(content);
        assert!(regions.contains(content.find("[a]").unwrap()));
        assert!(!regions.contains(content.find("[b]").unwrap()));
        assert!(!regions.contains(0));
    }

    #[test]
    fn test_tilde_fence_needs_matching_close() {
        let content = "~~~~\n```\n[a](a.md)\n~~~~\n[b](b.md)\n";
        let regions = CodeRegions::scan(content);
        assert!(regions.contains(content.find("[a]").unwrap()));
        assert!(!regions.contains(content.find("[b]").unwrap()));
    }

    #[test]
    fn test_unclosed_fence_runs_to_end() {
        let content = "```\n[a](a.md)\n";
        assert!(CodeRegions::scan(content).contains(content.find("[a]").unwrap()));
    }

    #[test]
    fn test_inline_code_and_comments() {
        let content = "see `[a](a.md)` and ``x ` y`` then <!-- [c](c.md) --> [d](d.md)\n";
        let regions = CodeRegions::scan(content);
        assert!(regions.contains(content.find("[a]").unwrap()));
        assert!(regions.contains(content.find("x ` y").unwrap()));
        assert!(regions.contains(content.find("[c]").unwrap()));
        assert!(!regions.contains(content.find("[d]").unwrap()));
    }
}
