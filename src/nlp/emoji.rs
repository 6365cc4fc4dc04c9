use once_cell::sync::Lazy;
use regex::Regex;

// Pictographs, presentation-form emoji, skin tone modifiers, flags, and the
// joiners/selectors/tags that glue emoji sequences together.
static EMOJI: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"[\p{Extended_Pictographic}\p{Emoji_Presentation}\p{Emoji_Modifier}\u{1F1E6}-\u{1F1FF}\u{200D}\u{FE0F}\u{20E3}\u{E0020}-\u{E007F}]",
    )
    .expect("valid emoji regex")
});

/// Remove emoji (including multi-codepoint sequences) from `text`.
pub fn strip_emoji(text: &str) -> String {
    EMOJI.replace_all(text, "").into_owned()
}
