use scraper::Html;

const REPLACEMENTS: &[(char, &str)] = &[
    ('\u{2013}', "-"),
    ('\u{2014}', "-"),
    ('\u{2212}', "-"),
    ('\u{2018}', "'"),
    ('\u{2019}', "'"),
    ('\u{201C}', "\""),
    ('\u{201D}', "\""),
    ('\u{2026}', "..."),
    ('\u{00A0}', " "),
];

/// Normalize typographic punctuation to ASCII and collapse whitespace.
pub fn sanitize(text: &str) -> String {
    let mut replaced = String::with_capacity(text.len());
    for c in text.chars() {
        match REPLACEMENTS.iter().find(|(needle, _)| *needle == c) {
            Some((_, replacement)) => replaced.push_str(replacement),
            None => replaced.push(c),
        }
    }
    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Sanitize and cap at `max_chars` characters, ending with an ellipsis when cut.
pub fn truncate(text: &str, max_chars: usize) -> String {
    let clean = sanitize(text);
    if clean.chars().count() <= max_chars {
        return clean;
    }
    let kept: String = clean.chars().take(max_chars.saturating_sub(1)).collect();
    format!("{}…", kept.trim())
}

fn is_terminator(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

/// Split text into sentence-like units on `.`, `!` and `?`.
///
/// A trailing fragment without punctuation still counts as a sentence.
pub fn split_sentences(text: &str) -> Vec<String> {
    let clean = sanitize(text);
    if clean.is_empty() {
        return Vec::new();
    }

    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = clean.chars().peekable();

    while let Some(c) = chars.next() {
        if is_terminator(c) || c == '\r' || c == '\n' {
            // A terminator closes a run of at least one other character,
            // even if that run is only whitespace.
            if !current.is_empty() && is_terminator(c) {
                current.push(c);
            }
            push_sentence(&mut sentences, &mut current);
            continue;
        }
        current.push(c);
        if chars.peek().is_none() {
            push_sentence(&mut sentences, &mut current);
        }
    }

    if sentences.is_empty() {
        return vec![clean];
    }
    sentences
}

fn push_sentence(sentences: &mut Vec<String>, current: &mut String) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }
    current.clear();
}

/// Key used to detect near-duplicate headlines across feeds.
pub fn normalize_title(title: &str) -> String {
    let mut key = String::with_capacity(title.len());
    let mut pending_space = false;
    for c in title.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            if pending_space && !key.is_empty() {
                key.push(' ');
            }
            pending_space = false;
            key.push(c);
        } else {
            pending_space = true;
        }
    }
    key
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Strip markup from a feed-provided HTML fragment.
pub fn html_to_text(fragment: &str) -> String {
    if !fragment.contains('<') {
        return sanitize(fragment);
    }
    let parsed = Html::parse_fragment(fragment);
    let text: Vec<&str> = parsed.root_element().text().collect();
    sanitize(&text.join(" "))
}
