use ulid::Ulid;

/// Generates a new ULID-based token with the given prefix.
///
/// # Examples
/// ```
/// let token = chalkboard_common::id::prefixed_ulid("sub");
/// assert!(token.starts_with("sub_"));
/// ```
pub fn prefixed_ulid(prefix: &str) -> String {
    format!("{}_{}", prefix, Ulid::new())
}

/// Marker trait for types that are keyed by a prefixed token.
pub trait PrefixedId {
    const PREFIX: &'static str;

    fn generate() -> String {
        prefixed_ulid(Self::PREFIX)
    }
}

/// Well-known token prefixes.
pub mod prefix {
    /// One open event-stream connection.
    pub const SUBSCRIBER: &str = "sub";
}
