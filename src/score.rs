//! Berg-scale score extraction from noisy transcripts.
//!
//! Speech-to-text output has no reliable structure, so the score is found
//! with a single tolerant pattern instead of any grammar: the first mention
//! of the scale ("берг", "берга", "шкала берга", or the Latin
//! transliterations) followed by the first run of one or two digits. The
//! digit-length cap and first-match tie-break are load-bearing; changing
//! them silently changes extraction results on real transcripts.

use regex::Regex;
use std::sync::LazyLock;

/// Trigger phrase followed by the first 1-2 digit run after it.
///
/// Digits are ASCII-only on both sides of the capture, so every match is
/// guaranteed to parse as `u8`; Unicode digit codepoints are skipped like
/// any other non-score text. Longer digit runs are captured only up to two
/// digits; a 0-56 scale has no 3-digit scores, and out-of-range captures
/// are knowingly not validated here.
static BERG_SCORE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:шкала берга|берг[а]?|shkala berga|berg[a]?)[^0-9]*([0-9]{1,2})")
        .expect("berg score pattern is valid")
});

/// Scan a transcript for a Berg-scale score.
///
/// Case-insensitive; returns the first matching score, or `None` when the
/// transcript never mentions the scale followed by a number. Absence is a
/// normal outcome, not an error.
pub fn extract_berg_score(text: &str) -> Option<u8> {
    let lowered = text.to_lowercase();
    let captures = BERG_SCORE.captures(&lowered)?;
    // The capture is 1-2 ASCII digits, so it always fits in u8
    captures.get(1)?.as_str().parse().ok()
}
