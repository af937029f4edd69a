use ulid::Ulid;

/// Generates a new ULID-based ID with the given prefix.
///
/// # Examples
/// ```
/// let id = clinic_common::id::prefixed_ulid("apt");
/// assert!(id.starts_with("apt_"));
/// ```
pub fn prefixed_ulid(prefix: &str) -> String {
    format!("{}_{}", prefix, Ulid::new().to_string())
}

/// Marker trait for types that represent a prefixed ID.
pub trait PrefixedId {
    const PREFIX: &'static str;

    fn generate() -> String {
        prefixed_ulid(Self::PREFIX)
    }
}

/// Well-known ID prefixes.
pub mod prefix {
    pub const APPOINTMENT: &str = "apt";
    pub const PATIENT: &str = "pat";
    pub const PAYMENT: &str = "pay";
    pub const CONVERSATION: &str = "conv";
    pub const MESSAGE: &str = "msg";
    pub const CONNECTION: &str = "conn";
}
