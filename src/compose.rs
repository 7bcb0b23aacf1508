//! Fits a message and an optional link into one tweet.

/// Hard limit of a tweet, in characters.
pub const MAX_MESSAGE_LEN: usize = 140;
/// Width the platform gives any link once it wraps it in a short link.
pub const SHORT_LINK_WIDTH: usize = 24;
/// A truncated message shorter than this is not worth posting.
const MIN_TRUNCATED_LEN: usize = 30;
const ELLIPSIS_SEP: &str = "... ";
const ELLIPSIS: &str = "...";

/// Builds the text to post for `message` and `link`, assuming the link takes
/// `link_width` characters once posted. A zero width means "no link".
///
/// Preference order, first that fits wins:
/// - message + " " + link
/// - message truncated to at least 30 characters + "... " + link
/// - link
/// - message
/// - message truncated
pub fn compose(message: &str, link: &str, link_width: usize) -> String {
    let len = message.chars().count();
    if link_width == 0 {
        if len > MAX_MESSAGE_LEN {
            return format!("{}{}", take(message, MAX_MESSAGE_LEN - ELLIPSIS_SEP.len()), ELLIPSIS);
        }
        return message.to_string();
    }
    if len + 1 + link_width <= MAX_MESSAGE_LEN {
        return format!("{message} {link}");
    }
    // Positive: the branch above failed and the separator is longer.
    let overflow = len + ELLIPSIS_SEP.len() + link_width - MAX_MESSAGE_LEN;
    if len.saturating_sub(overflow) >= MIN_TRUNCATED_LEN {
        return format!("{}{}{}", take(message, len - overflow), ELLIPSIS_SEP, link);
    }
    if link_width <= MAX_MESSAGE_LEN {
        return link.to_string();
    }
    if len <= MAX_MESSAGE_LEN {
        return message.to_string();
    }
    take(message, MAX_MESSAGE_LEN - 1).to_string()
}

fn take(text: &str, chars: usize) -> &str {
    match text.char_indices().nth(chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}
