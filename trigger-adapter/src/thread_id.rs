//! Deterministic `thread_id` derivation (P1: thread determinism).
//!
//! `sandbox_runtime::util::is_valid_dns1123_label` validates the final
//! result; this module is what produces a value that already satisfies it
//! from the surface-specific pieces an adapter has in hand (a channel/DM id
//! and a root-message id), stripping per-reply suffixes so follow-ups in one
//! thread always collapse to the same `thread_id`.

/// Total thread_id length budget named in the spec. Leaves headroom for the
/// `investigation-` sandbox-name prefix under the 63-char DNS-1123 label cap.
const MAX_THREAD_ID_LEN: usize = 57;

/// Lowercase `s` and replace every run of characters outside `[a-z0-9-]`
/// with a single `-`, then trim leading/trailing `-`.
fn slugify(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_was_dash = false;
    for ch in s.chars() {
        let lower = ch.to_ascii_lowercase();
        if lower.is_ascii_lowercase() || lower.is_ascii_digit() {
            out.push(lower);
            last_was_dash = false;
        } else if !last_was_dash && !out.is_empty() {
            out.push('-');
            last_was_dash = true;
        }
    }
    out.trim_end_matches('-').to_string()
}

/// Derive a deterministic, DNS-1123-safe `thread_id` from a surface name, a
/// conversation/channel anchor, and a thread-root anchor. Message-level
/// suffixes (per-reply ids) must already be stripped by the caller before
/// `thread_root` is passed in — this function only slugs and clamps.
pub fn derive_thread_id(surface: &str, conversation_anchor: &str, thread_root: &str) -> String {
    let surface = slugify(surface);
    let conversation = slugify(conversation_anchor);
    let root = slugify(thread_root);

    // Budget evenly, but never starve the thread root: it carries the most
    // entropy and is what actually distinguishes two threads in the same
    // conversation.
    let separators = 2; // joining "-" between the three segments
    let budget = MAX_THREAD_ID_LEN.saturating_sub(separators);
    let per_segment = budget / 3;

    let surface = clamp(&surface, per_segment.max(4));
    let conversation = clamp(&conversation, per_segment.max(4));
    let root = clamp(&root, budget.saturating_sub(surface.len() + conversation.len()).max(4));

    let joined = [surface, conversation, root]
        .into_iter()
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    clamp(&joined, MAX_THREAD_ID_LEN)
}

fn clamp(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        s[..max_len].trim_end_matches('-').to_string()
    }
}
