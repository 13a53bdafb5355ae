// Downstream text scrubbing
//
// Optional collaborator for roster passthrough columns and other stray
// free text. The core transform never calls this: message bodies are
// dropped at ingestion, not inspected. Consumers hand in a list of text
// fields and get one redacted text back per field.

use regex::Regex;

pub trait TextScrubber {
    fn scrub(&self, fields: &[String]) -> Vec<String>;
}

/// Regex-based scrubber covering the identifier shapes that actually
/// show up in HR exports: emails, URLs, and phone-like digit runs.
pub struct RegexScrubber {
    email_regex: Regex,
    url_regex: Regex,
    phone_regex: Regex,
}

impl Default for RegexScrubber {
    fn default() -> Self {
        Self::new()
    }
}

impl RegexScrubber {
    pub fn new() -> Self {
        Self {
            email_regex: Regex::new(r"(?i)[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}")
                .expect("static regex"),
            url_regex: Regex::new(r"https?://[^\s<>]+").expect("static regex"),
            phone_regex: Regex::new(r"\b\+?\d[\d\s().-]{6,}\d\b").expect("static regex"),
        }
    }

    fn scrub_one(&self, text: &str) -> String {
        let text = self.email_regex.replace_all(text, "[EMAIL]");
        let text = self.url_regex.replace_all(&text, "[URL]");
        self.phone_regex.replace_all(&text, "[PHONE]").into_owned()
    }
}

impl TextScrubber for RegexScrubber {
    fn scrub(&self, fields: &[String]) -> Vec<String> {
        fields.iter().map(|f| self.scrub_one(f)).collect()
    }
}
