//! Glob matching for the KEYS command.
//!
//! Supported syntax: `*`, `?`, `[abc]`, `[^abc]`, `[a-z]` and `\x` escapes.
//! Matching is done on raw bytes, so binary keys are handled too.

/// A compiled glob pattern.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    pattern: Vec<u8>,
}

impl GlobPattern {
    pub fn new(pattern: &[u8]) -> Self {
        Self {
            pattern: pattern.to_vec(),
        }
    }

    pub fn matches(&self, text: &[u8]) -> bool {
        match_from(&self.pattern, text)
    }
}

/// Iterative matcher: on a mismatch, the most recent `*` absorbs one more
/// byte and matching resumes after it. Every other token consumes exactly one
/// byte, so the cost is bounded by `pattern.len() * text.len()`.
fn match_from(pattern: &[u8], text: &[u8]) -> bool {
    let (mut p, mut t) = (0, 0);
    // Pattern position after the last `*`, and the text position it resumes at.
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        if pattern.get(p) == Some(&b'*') {
            p += 1;
            star = Some((p, t));
            continue;
        }

        if let Some(next) = match_token(pattern, p, text[t]) {
            p = next;
            t += 1;
            continue;
        }

        match star {
            Some((after_star, resume)) => {
                p = after_star;
                t = resume + 1;
                star = Some((after_star, t));
            }
            None => return false,
        }
    }

    pattern[p..].iter().all(|&c| c == b'*')
}

/// Matches the single-byte token at `pattern[p]` against `c`.
///
/// Returns the position just past the token on a match.
fn match_token(pattern: &[u8], p: usize, c: u8) -> Option<usize> {
    let token = *pattern.get(p)?;

    match token {
        b'?' => Some(p + 1),
        b'[' => {
            let (matched, after) = match_class(&pattern[p + 1..], c)?;
            matched.then_some(pattern.len() - after.len())
        }
        b'\\' if p + 1 < pattern.len() => (pattern[p + 1] == c).then_some(p + 2),
        _ => (token == c).then_some(p + 1),
    }
}

/// Matches `c` against a character class whose body starts right after `[`.
///
/// Returns whether it matched and the pattern remaining after the closing `]`,
/// or None for an unterminated class.
fn match_class(class: &[u8], c: u8) -> Option<(bool, &[u8])> {
    let (negate, mut i) = match class.first() {
        Some(b'^') => (true, 1),
        _ => (false, 0),
    };
    let mut matched = false;

    while i < class.len() && class[i] != b']' {
        if class[i] == b'\\' && i + 1 < class.len() {
            i += 1;
            matched |= class[i] == c;
        } else if i + 2 < class.len() && class[i + 1] == b'-' && class[i + 2] != b']' {
            let (lo, hi) = (class[i].min(class[i + 2]), class[i].max(class[i + 2]));
            matched |= (lo..=hi).contains(&c);
            i += 2;
        } else {
            matched |= class[i] == c;
        }
        i += 1;
    }

    if i >= class.len() {
        return None;
    }

    Some((matched != negate, &class[i + 1..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn glob(p: &str) -> GlobPattern {
        GlobPattern::new(p.as_bytes())
    }

    #[test]
    fn test_star() {
        let pattern = glob("h*llo");
        assert!(pattern.matches(b"hello"));
        assert!(pattern.matches(b"hllo"));
        assert!(pattern.matches(b"heeeello"));
        assert!(!pattern.matches(b"helloo"));
        assert!(glob("*").matches(b""));
        assert!(glob("**a").matches(b"xya"));
    }

    #[test]
    fn test_question_mark() {
        let pattern = glob("h?llo");
        assert!(pattern.matches(b"hallo"));
        assert!(!pattern.matches(b"hllo"));
    }

    #[test]
    fn test_classes() {
        assert!(glob("h[ae]llo").matches(b"hello"));
        assert!(!glob("h[ae]llo").matches(b"hillo"));
        assert!(glob("h[^e]llo").matches(b"hallo"));
        assert!(!glob("h[^e]llo").matches(b"hello"));
        assert!(glob("key[0-9]").matches(b"key7"));
        assert!(!glob("key[0-9]").matches(b"keyx"));
        assert!(!glob("key[0-9").matches(b"key1"));
    }

    #[test]
    fn test_many_stars_stay_linear() {
        let text = vec![b'a'; 4096];
        let pattern = glob("*a*a*a*a*a*a*a*a*a*a*a*a*a*a*a*a*a*a*a*a*b");
        assert!(!pattern.matches(&text));
        assert!(glob("*a*a*a*a*a*a*a*a*a*a*a*a*a*a*a*a*a*a*a*a").matches(&text));
    }

    #[test]
    fn test_star_backtracks_past_partial_match() {
        assert!(glob("*abc").matches(b"ababc"));
        assert!(glob("a*b?d").matches(b"abxbcd"));
        assert!(!glob("a*b?d").matches(b"abxbd"));
        assert!(glob("*[0-9]").matches(b"key12"));
    }

    #[test]
    fn test_escape() {
        assert!(glob("a\\*b").matches(b"a*b"));
        assert!(!glob("a\\*b").matches(b"axb"));
    }
}
