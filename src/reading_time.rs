//! Reading-time estimate for a post's content blocks

use std::fmt;

use crate::content::rich_text::as_text;
use crate::content::ContentBlock;
use crate::helpers::minutes_to_hours;
use crate::i18n::I18n;

/// Average reading speed the estimate assumes
pub const WORDS_PER_MINUTE: usize = 200;

/// Count the words of every heading and every body
pub fn count_words(blocks: &[ContentBlock]) -> usize {
    let headings: usize = blocks
        .iter()
        .map(|b| b.heading.split_whitespace().count())
        .sum();
    let bodies: usize = blocks
        .iter()
        .map(|b| as_text(&b.body).split_whitespace().count())
        .sum();
    headings + bodies
}

/// Minutes needed to read the blocks, rounded up
pub fn estimate_minutes(blocks: &[ContentBlock]) -> u64 {
    count_words(blocks).div_ceil(WORDS_PER_MINUTE) as u64
}

/// A reading-time estimate ready for display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadingTime {
    QuickRead,
    Minutes(u64),
    Hours(u64),
}

impl ReadingTime {
    pub fn from_minutes(minutes: u64) -> Self {
        match minutes {
            0 => ReadingTime::QuickRead,
            1..=59 => ReadingTime::Minutes(minutes),
            _ => ReadingTime::Hours(minutes_to_hours(minutes)),
        }
    }

    pub fn estimate(blocks: &[ContentBlock]) -> Self {
        Self::from_minutes(estimate_minutes(blocks))
    }

    /// Label in the handler's language
    pub fn label(&self, i18n: &I18n) -> String {
        match self {
            ReadingTime::QuickRead => i18n.get("reading_time.quick"),
            ReadingTime::Minutes(m) => i18n.get_count("reading_time.minutes", *m),
            ReadingTime::Hours(h) => i18n.get_count("reading_time.hours", *h),
        }
    }
}

impl fmt::Display for ReadingTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadingTime::QuickRead => write!(f, "quick read"),
            ReadingTime::Minutes(m) => write!(f, "{} min", m),
            ReadingTime::Hours(h) => write!(f, "{} hours", h),
        }
    }
}
