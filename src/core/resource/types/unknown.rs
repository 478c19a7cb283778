use super::{content_uri, ResourceParser, ANY_EXTENSION};
use crate::core::error::ResourceResult;
use crate::core::resource::archive::ArchiveView;
use crate::core::resource::model::{ResourceDomain, ResourceMetadata, ResourceType};

/// Universal fallback: accepts anything, knows nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnknownParser;

impl ResourceParser for UnknownParser {
    fn resource_type(&self) -> ResourceType {
        ResourceType::Unknown
    }

    fn domain(&self) -> ResourceDomain {
        ResourceDomain::Unknown
    }

    fn extension(&self) -> &'static str {
        ANY_EXTENSION
    }

    fn parse_metadata(&self, _view: &mut ArchiveView) -> ResourceResult<ResourceMetadata> {
        Ok(ResourceMetadata::Unknown)
    }

    fn suggest_name(&self, _metadata: &ResourceMetadata) -> String {
        String::new()
    }

    fn derive_uri(&self, _metadata: &ResourceMetadata, hash: &str) -> String {
        content_uri(ResourceType::Unknown, hash)
    }
}
