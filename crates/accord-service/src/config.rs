use accord_canonical::{Canonicalizer, ProfileId};
use accord_core::CoreError;
use serde::{Deserialize, Serialize};

/// Default canonicalization profile.
pub const DEFAULT_PROFILE: &str = "accord-canonical-v1";

/// Service settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Canonicalization profile id.
    pub profile: String,
    /// Random bytes per negotiation id, before base64url encoding.
    pub negotiation_id_bytes: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            profile: DEFAULT_PROFILE.to_string(),
            negotiation_id_bytes: 32,
        }
    }
}

impl ServiceConfig {
    /// Checks the settings and builds the canonicalizer they describe.
    pub fn canonicalizer(&self) -> Result<Canonicalizer, CoreError> {
        // Encoded ids must fit the NegotiationId pattern (8..=128 chars).
        if !(6..=96).contains(&self.negotiation_id_bytes) {
            return Err(CoreError::Validation(format!(
                "negotiation_id_bytes must be within 6..=96, got {}",
                self.negotiation_id_bytes
            )));
        }
        Ok(Canonicalizer::new(ProfileId::parse(self.profile.as_str())?))
    }
}
