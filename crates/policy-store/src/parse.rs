use regostore_core_types::{
    AttackTrack, Control, CustomerConfig, Framework, PolicyRule, PostureExceptionPolicy,
};
use serde::de::DeserializeOwned;

use crate::errors::ParseError;

/// Turns fetched bytes into domain collections, one method per category.
///
/// The provided methods decode JSON; implementors override only the
/// categories whose payload format differs.
pub trait ArtifactParser: Send + Sync {
    fn parse_frameworks(&self, bytes: &[u8]) -> Result<Vec<Framework>, ParseError> {
        decode_json(bytes)
    }

    fn parse_controls(&self, bytes: &[u8]) -> Result<Vec<Control>, ParseError> {
        decode_json(bytes)
    }

    fn parse_rules(&self, bytes: &[u8]) -> Result<Vec<PolicyRule>, ParseError> {
        decode_json(bytes)
    }

    fn parse_attack_tracks(&self, bytes: &[u8]) -> Result<Vec<AttackTrack>, ParseError> {
        decode_json(bytes)
    }

    fn parse_exception_policies(
        &self,
        bytes: &[u8],
    ) -> Result<Vec<PostureExceptionPolicy>, ParseError> {
        decode_json(bytes)
    }

    fn parse_default_config_inputs(&self, bytes: &[u8]) -> Result<CustomerConfig, ParseError> {
        decode_json(bytes)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct JsonArtifactParser;

impl ArtifactParser for JsonArtifactParser {}

pub fn decode_json<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ParseError> {
    serde_json::from_slice(bytes).map_err(ParseError::from)
}
