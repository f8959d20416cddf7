//! Generic literal-path detection for text-like files
//!
//! Used for files no language plugin claims. Code, comments and (in prose)
//! quoted strings are blanked out first, keeping byte offsets, and path-like
//! tokens are collected from what remains. A token only becomes a reference
//! once it resolves to a known project path.

use refit_foundation::{position_at, EditLocation};
use regex::Regex;
use std::sync::LazyLock;

static PATH_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9_.~@/+\-]+(?:[#?][A-Za-z0-9_.~/=&%+\-]*)?").unwrap()
});

/// A path-like token found in plain text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMention {
    pub text: String,
    pub location: EditLocation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineComment {
    Hash,
    DoubleSlash,
}

#[derive(Debug, Clone, Copy)]
struct Syntax {
    fences: bool,
    inline_code: bool,
    block_comment: Option<(&'static str, &'static str)>,
    line_comment: Option<LineComment>,
    mask_strings: bool,
    single_quotes: bool,
}

impl Syntax {
    fn for_extension(extension: &str) -> Self {
        match extension.to_ascii_lowercase().as_str() {
            "md" | "markdown" | "mdx" => Self {
                fences: true,
                inline_code: true,
                block_comment: Some(("<!--", "-->")),
                line_comment: None,
                mask_strings: true,
                single_quotes: false,
            },
            // Paths in config files live in string values
            "toml" | "yaml" | "yml" => Self {
                fences: false,
                inline_code: false,
                block_comment: None,
                line_comment: Some(LineComment::Hash),
                mask_strings: false,
                single_quotes: true,
            },
            "json" => Self {
                fences: false,
                inline_code: false,
                block_comment: None,
                line_comment: None,
                mask_strings: false,
                single_quotes: false,
            },
            _ => Self {
                fences: true,
                inline_code: true,
                block_comment: Some(("/*", "*/")),
                line_comment: Some(LineComment::DoubleSlash),
                mask_strings: true,
                single_quotes: false,
            },
        }
    }
}

/// Path-like mentions in `content` outside code, comments and prose strings.
pub fn find_path_mentions(content: &str, extension: &str) -> Vec<PathMention> {
    let masked = mask(content, Syntax::for_extension(extension));

    let mut mentions = Vec::new();
    for m in PATH_TOKEN.find_iter(&masked) {
        let Some(text) = clean_token(m.as_str()) else {
            continue;
        };
        let start = m.start();
        let end = start + text.len();
        let from = position_at(content, start);
        let to = position_at(content, end);
        mentions.push(PathMention {
            text: text.to_string(),
            location: EditLocation::new(from.line, from.character, to.line, to.character),
        });
    }
    mentions
}

/// Trim sentence punctuation and reject tokens that cannot be paths.
fn clean_token(token: &str) -> Option<&str> {
    let (path_len, has_suffix) = match token.find(['#', '?']) {
        Some(idx) => (idx, true),
        None => (token.len(), false),
    };
    let token = if has_suffix {
        token
    } else {
        token.trim_end_matches(['.', ',', ';', ':'])
    };
    let path = &token[..path_len.min(token.len())];

    if path.is_empty() || path.starts_with("//") {
        return None;
    }
    if !path.chars().any(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    let last = path.trim_end_matches('/').rsplit('/').next().unwrap_or("");
    let has_extension = last
        .rsplit_once('.')
        .is_some_and(|(_, ext)| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()));
    if !path.contains('/') && !has_extension {
        return None;
    }
    Some(token)
}

fn mask(content: &str, syntax: Syntax) -> String {
    let mut bytes = content.as_bytes().to_vec();

    if let Some((open, close)) = syntax.block_comment {
        let mut search = 0;
        while let Some(rel) = content[search..].find(open) {
            let start = search + rel;
            let end = match content[start + open.len()..].find(close) {
                Some(rel_end) => start + open.len() + rel_end + close.len(),
                None => content.len(),
            };
            blank(&mut bytes, start, end);
            search = end;
        }
    }

    let mut offset = 0;
    let mut fence: Option<&str> = None;
    for line in content.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();
        let trimmed = line.trim_start();

        if syntax.fences {
            let marker = if trimmed.starts_with("```") {
                Some("```")
            } else if trimmed.starts_with("~~~") {
                Some("~~~")
            } else {
                None
            };
            match (fence, marker) {
                (None, Some(m)) => {
                    fence = Some(m);
                    blank(&mut bytes, line_start, offset);
                    continue;
                }
                (Some(open), Some(m)) if open == m => {
                    fence = None;
                    blank(&mut bytes, line_start, offset);
                    continue;
                }
                (Some(_), _) => {
                    blank(&mut bytes, line_start, offset);
                    continue;
                }
                (None, None) => {}
            }
        }

        mask_line(line, line_start, syntax, &mut bytes);
    }

    // Only ASCII bytes are written and whole characters are replaced
    String::from_utf8(bytes).unwrap_or_default()
}

fn mask_line(line: &str, line_start: usize, syntax: Syntax, bytes: &mut [u8]) {
    let raw = line.as_bytes();
    let mut i = 0;
    let mut quote: Option<(u8, usize)> = None;

    while i < raw.len() {
        let c = raw[i];

        if let Some((q, open_at)) = quote {
            if c == b'\\' {
                i += 2;
                continue;
            }
            if c == q {
                if syntax.mask_strings {
                    blank(bytes, line_start + open_at, line_start + i + 1);
                }
                quote = None;
            }
            i += 1;
            continue;
        }

        if syntax.inline_code && c == b'`' {
            let run = raw[i..].iter().take_while(|&&b| b == b'`').count();
            if let Some(close) = find_backtick_run(&raw[i + run..], run) {
                let end = i + run + close + run;
                blank(bytes, line_start + i, line_start + end);
                i = end;
                continue;
            }
            i += run;
            continue;
        }

        let preceded_by_space = i == 0 || raw[i - 1].is_ascii_whitespace();
        match syntax.line_comment {
            Some(LineComment::Hash) if c == b'#' && preceded_by_space => {
                blank(bytes, line_start + i, line_start + raw.len());
                return;
            }
            Some(LineComment::DoubleSlash)
                if c == b'/' && raw.get(i + 1) == Some(&b'/') && preceded_by_space =>
            {
                blank(bytes, line_start + i, line_start + raw.len());
                return;
            }
            _ => {}
        }

        let opens_single = syntax.single_quotes
            && c == b'\''
            && (i == 0 || matches!(raw[i - 1], b' ' | b'\t' | b':' | b'=' | b'[' | b','));
        if c == b'"' || opens_single {
            quote = Some((c, i));
        }
        i += 1;
    }
}

fn find_backtick_run(rest: &[u8], run: usize) -> Option<usize> {
    let mut i = 0;
    while i < rest.len() {
        if rest[i] == b'\n' {
            return None;
        }
        if rest[i] == b'`' {
            let len = rest[i..].iter().take_while(|&&b| b == b'`').count();
            if len == run {
                return Some(i);
            }
            i += len;
            continue;
        }
        i += 1;
    }
    None
}

fn blank(bytes: &mut [u8], start: usize, end: usize) {
    let end = end.min(bytes.len());
    for byte in &mut bytes[start..end] {
        if *byte != b'\n' {
            *byte = b' ';
        }
    }
}
