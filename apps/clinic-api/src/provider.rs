//! Stand-in for the external payment/video provider.
//!
//! Demo mode attaches provider references (payment ids, meeting links) to
//! responses without calling any real vendor; this stub issues the opaque
//! identifiers those responses carry.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::Rng;

/// Number of random bytes per issued reference.
const REFERENCE_BYTES: usize = 9;

pub struct ExternalProviderStub;

impl ExternalProviderStub {
    pub fn new() -> Self {
        Self
    }

    /// Issue an opaque provider reference with the given prefix, e.g.
    /// `pay_ref_x3K...` or `meet_Qb9...`.
    pub fn issue_reference(&self, prefix: &str) -> String {
        let mut buf = [0u8; REFERENCE_BYTES];
        rand::thread_rng().fill(&mut buf[..]);
        format!("{}_{}", prefix, URL_SAFE_NO_PAD.encode(buf))
    }
}

impl Default for ExternalProviderStub {
    fn default() -> Self {
        Self::new()
    }
}
