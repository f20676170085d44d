/// Emoji accepted by `toggleReaction`. Clients validate against the same
/// list; the server is authoritative.
pub const ALLOWED_REACTIONS: [&str; 12] = [
    "👍", "❤️", "😂", "😮", "😢", "👏", "🔥", "😡", "🙏", "🎉", "💯", "🤝",
];

/// How long a typing indicator stays active after the last `setTyping(true)`.
pub const TYPING_TTL_MS: i64 = 2_000;

/// Interval at which clients re-publish their online status.
pub const PRESENCE_HEARTBEAT_SECS: u64 = 30;

/// Presence older than this (2x heartbeat) is reported as offline.
pub const DEFAULT_PRESENCE_STALE_SECS: u64 = 2 * PRESENCE_HEARTBEAT_SECS;

/// Minimum member count of a group conversation, creator included.
pub const MIN_GROUP_MEMBERS: usize = 3;

/// Display name used when the identity provider has none.
pub const DEFAULT_DISPLAY_NAME: &str = "No Name";

/// Maximum uploaded file size in bytes (50 MiB)
pub const MAX_FILE_SIZE: usize = 50 * 1024 * 1024;

/// Default HTTP API port (server)
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Returns `true` if `emoji` is one of [`ALLOWED_REACTIONS`].
pub fn is_allowed_reaction(emoji: &str) -> bool {
    ALLOWED_REACTIONS.contains(&emoji)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reaction_set_is_exact() {
        assert!(is_allowed_reaction("❤️"));
        assert!(is_allowed_reaction("🤝"));
        // Bare heart without the variation selector is a different string.
        assert!(!is_allowed_reaction("❤"));
        assert!(!is_allowed_reaction("💩"));
        assert!(!is_allowed_reaction(""));
    }
}
