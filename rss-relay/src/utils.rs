/// Check if a word is a common stop word
pub fn is_stop_word(word: &str) -> bool {
    matches!(
        word,
        "the" | "and" | "or" | "but" | "in" | "on" | "at" | "to" | "for" | "of" | "with" | "by" |
        "a" | "an" | "is" | "are" | "was" | "were" | "be" | "been" | "have" | "has" | "had" |
        "do" | "does" | "did" | "will" | "would" | "could" | "should" | "may" | "might" | "must" |
        "can" | "this" | "that" | "these" | "those" | "as" | "it" | "its" | "from"
    )
}

/// Text processing utilities
pub mod text {
    use super::is_stop_word;

    /// Lower-cased alphanumeric tokens with stop words removed
    pub fn tokenize(text: &str) -> Vec<String> {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|word| !word.is_empty())
            .map(|word| word.to_lowercase())
            .filter(|word| !is_stop_word(word))
            .collect()
    }

    pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
        haystack.to_lowercase().contains(&needle.to_lowercase())
    }
}

/// URL utilities
pub mod url {
    use url::Url;

    /// Drop query and fragment. Unparseable input is cut at the first `?` or `#`.
    pub fn strip_query(url_str: &str) -> String {
        match Url::parse(url_str) {
            Ok(mut url) => {
                url.set_query(None);
                url.set_fragment(None);
                url.to_string()
            }
            Err(_) => url_str.split(['?', '#']).next().unwrap_or(url_str).to_string(),
        }
    }

    /// Validate feed URL format
    pub fn is_valid_feed_url(url_str: &str) -> bool {
        if let Ok(url) = Url::parse(url_str) {
            (url.scheme() == "http" || url.scheme() == "https") && url.host().is_some()
        } else {
            false
        }
    }
}

/// File utilities
pub mod fs {
    use std::io;
    use std::path::{Path, PathBuf};

    /// Write `contents` through a `.tmp` sibling renamed over `path`, creating parent directories.
    pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
            }
        }

        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        std::fs::write(&tmp, contents)?;
        std::fs::rename(&tmp, path)
    }
}

/// Time utilities
pub mod time {
    use chrono::{DateTime, Duration, Utc};

    pub fn now_timestamp() -> i64 {
        Utc::now().timestamp()
    }

    /// Render a unix timestamp for log lines
    pub fn format_timestamp(ts: i64) -> String {
        DateTime::<Utc>::from_timestamp(ts, 0)
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| ts.to_string())
    }

    /// Next sleep slice given the seconds remaining until a deadline.
    /// Long waits are taken an hour at a time, medium ones halve, the last five minutes in one go.
    pub fn sleep_increment(remaining: i64) -> i64 {
        if remaining <= 0 {
            0
        } else if remaining > 7200 {
            3600
        } else if remaining > 300 {
            remaining / 2
        } else {
            remaining
        }
    }

    /// Format duration in human-readable form
    pub fn format_duration(duration: Duration) -> String {
        let total_seconds = duration.num_seconds();

        if total_seconds < 60 {
            format!("{}s", total_seconds)
        } else if total_seconds < 3600 {
            format!("{}m", total_seconds / 60)
        } else if total_seconds < 86400 {
            format!("{}h", total_seconds / 3600)
        } else {
            format!("{}d", total_seconds / 86400)
        }
    }
}
