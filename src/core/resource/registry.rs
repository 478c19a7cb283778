use std::fmt;
use std::str::FromStr;

use tracing::{debug, warn};

use super::archive::ArchiveView;
use super::model::{ResourceDomain, ResourceMetadata, ResourceType};
use super::types::{ResourceParser, TypeDescriptor, UnknownParser};
use crate::core::error::{ResourceError, ResourceResult};

/// Narrows the candidates tried by [`TypeRegistry::resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TypeHint {
    /// Pick candidates by file extension.
    #[default]
    Any,
    Type(ResourceType),
    Domain(ResourceDomain),
}

impl TypeHint {
    fn admits(&self, descriptor: &TypeDescriptor) -> bool {
        match self {
            TypeHint::Any => true,
            TypeHint::Type(t) => descriptor.resource_type() == *t,
            TypeHint::Domain(d) => descriptor.domain() == *d,
        }
    }
}

impl FromStr for TypeHint {
    type Err = ResourceError;

    /// `*` (or empty) is the wildcard; otherwise a type name, then a domain name.
    fn from_str(s: &str) -> ResourceResult<Self> {
        let s = s.trim();
        if s.is_empty() || s == "*" {
            return Ok(TypeHint::Any);
        }
        if let Ok(t) = s.parse::<ResourceType>() {
            return Ok(TypeHint::Type(t));
        }
        if let Ok(d) = s.parse::<ResourceDomain>() {
            return Ok(TypeHint::Domain(d));
        }
        Err(ResourceError::Other(format!("Unknown type hint: {}", s)))
    }
}

impl fmt::Display for TypeHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeHint::Any => f.write_str("*"),
            TypeHint::Type(t) => write!(f, "{}", t),
            TypeHint::Domain(d) => write!(f, "{}", d),
        }
    }
}

/// Outcome of a resolution: the winning descriptor and what it parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub descriptor: TypeDescriptor,
    pub metadata: ResourceMetadata,
    pub icon: Option<Vec<u8>>,
}

impl Resolution {
    pub fn unknown() -> Self {
        Self {
            descriptor: TypeDescriptor::Unknown(UnknownParser),
            metadata: ResourceMetadata::Unknown,
            icon: None,
        }
    }

    pub fn resource_type(&self) -> ResourceType {
        self.descriptor.resource_type()
    }

    pub fn domain(&self) -> ResourceDomain {
        self.descriptor.domain()
    }

    pub fn suggested_name(&self) -> String {
        self.descriptor.suggest_name(&self.metadata)
    }

    pub fn uri(&self, hash: &str) -> String {
        self.descriptor.derive_uri(&self.metadata, hash)
    }
}

/// Ordered list of type descriptors. Order is probing priority.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    descriptors: Vec<TypeDescriptor>,
}

impl TypeRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry holding every built-in type, most specific first.
    pub fn with_defaults() -> Self {
        Self {
            descriptors: TypeDescriptor::defaults(),
        }
    }

    /// Append a descriptor. An already registered unknown descriptor stays last.
    pub fn register(&mut self, descriptor: TypeDescriptor) -> ResourceResult<()> {
        let resource_type = descriptor.resource_type();
        if self
            .descriptors
            .iter()
            .any(|d| d.resource_type() == resource_type)
        {
            return Err(ResourceError::DuplicateType(resource_type));
        }

        match self.descriptors.last() {
            Some(last) if last.resource_type() == ResourceType::Unknown => {
                let at = self.descriptors.len() - 1;
                self.descriptors.insert(at, descriptor);
            }
            _ => self.descriptors.push(descriptor),
        }
        Ok(())
    }

    pub fn descriptors(&self) -> &[TypeDescriptor] {
        &self.descriptors
    }

    pub fn get(&self, resource_type: ResourceType) -> Option<&TypeDescriptor> {
        self.descriptors
            .iter()
            .find(|d| d.resource_type() == resource_type)
    }

    /// Descriptors to try, in order. The unknown fallback is always last.
    pub fn candidates(&self, ext: &str, hint: TypeHint) -> Vec<TypeDescriptor> {
        let mut candidates: Vec<TypeDescriptor> = self
            .descriptors
            .iter()
            .filter(|d| d.resource_type() != ResourceType::Unknown)
            .filter(|d| match hint {
                TypeHint::Any => d.matches_extension(ext),
                _ => hint.admits(d),
            })
            .copied()
            .collect();
        candidates.push(
            self.get(ResourceType::Unknown)
                .copied()
                .unwrap_or(TypeDescriptor::Unknown(UnknownParser)),
        );
        candidates
    }

    /// Try each candidate in order; the first accepted parse wins.
    ///
    /// Never fails: when every candidate rejects the content the result is
    /// the unknown type with empty metadata. Icon failures only drop the icon.
    pub fn resolve(&self, view: &mut ArchiveView, ext: &str, hint: TypeHint) -> Resolution {
        for descriptor in self.candidates(ext, hint) {
            let metadata = match descriptor.parse_metadata(view) {
                Ok(metadata) => metadata,
                Err(e) => {
                    debug!("Not a {}: {}", descriptor.resource_type(), e);
                    continue;
                }
            };

            let icon = match descriptor.parse_icon(&metadata, view) {
                Ok(icon) => icon,
                Err(e) => {
                    warn!("Ignoring unreadable {} icon: {}", descriptor.resource_type(), e);
                    None
                }
            };

            debug!("Resolved as {} ({})", descriptor.resource_type(), ext);
            return Resolution {
                descriptor,
                metadata,
                icon,
            };
        }

        Resolution::unknown()
    }

    /// Open `bytes` as an archive and resolve it. Content that is not an
    /// archive resolves to unknown.
    pub fn resolve_bytes(&self, bytes: Vec<u8>, ext: &str, hint: TypeHint) -> Resolution {
        match ArchiveView::from_bytes(bytes) {
            Ok(mut view) => self.resolve(&mut view, ext, hint),
            Err(e) => {
                debug!("Content is not an archive ({}), resolving as unknown", e);
                Resolution::unknown()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::resource::test_support::zip_bytes;
    use crate::core::resource::types::{FabricParser, ForgeParser, ResourcepackParser};

    fn forge_fabric_unknown() -> TypeRegistry {
        let mut registry = TypeRegistry::empty();
        registry.register(TypeDescriptor::Forge(ForgeParser)).unwrap();
        registry.register(TypeDescriptor::Fabric(FabricParser)).unwrap();
        registry.register(TypeDescriptor::Unknown(UnknownParser)).unwrap();
        registry
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut registry = forge_fabric_unknown();
        let err = registry
            .register(TypeDescriptor::Forge(ForgeParser))
            .unwrap_err();
        assert!(matches!(err, ResourceError::DuplicateType(ResourceType::Forge)));
    }

    #[test]
    fn unknown_stays_last_after_later_registrations() {
        let mut registry = forge_fabric_unknown();
        registry
            .register(TypeDescriptor::Resourcepack(ResourcepackParser))
            .unwrap();
        let order: Vec<_> = registry.descriptors().iter().map(|d| d.resource_type()).collect();
        assert_eq!(
            order,
            vec![
                ResourceType::Forge,
                ResourceType::Fabric,
                ResourceType::Resourcepack,
                ResourceType::Unknown
            ]
        );
    }

    #[test]
    fn falls_through_to_the_first_accepting_parser() {
        let registry = forge_fabric_unknown();
        let bytes = zip_bytes(&[("fabric.mod.json", r#"{"id":"lithium","version":"0.11.2"}"#)]);

        let resolution = registry.resolve_bytes(bytes, ".jar", TypeHint::Any);
        assert_eq!(resolution.resource_type(), ResourceType::Fabric);
        assert_eq!(resolution.uri("x"), "fabric://lithium/0.11.2");
    }

    #[test]
    fn first_match_wins_over_later_matches() {
        let registry = forge_fabric_unknown();
        let bytes = zip_bytes(&[
            ("mcmod.info", r#"[{"modid":"both","version":"1"}]"#),
            ("fabric.mod.json", r#"{"id":"both","version":"1"}"#),
        ]);
        let resolution = registry.resolve_bytes(bytes, ".jar", TypeHint::Any);
        assert_eq!(resolution.resource_type(), ResourceType::Forge);
    }

    #[test]
    fn everything_rejected_resolves_to_unknown() {
        let registry = forge_fabric_unknown();
        let resolution = registry.resolve_bytes(zip_bytes(&[("readme.txt", "hi")]), ".jar", TypeHint::Any);
        assert_eq!(resolution, Resolution::unknown());
        assert_eq!(resolution.domain(), ResourceDomain::Unknown);
    }

    #[test]
    fn unopenable_content_resolves_to_unknown() {
        let registry = TypeRegistry::with_defaults();
        let resolution = registry.resolve_bytes(b"0123456789".to_vec(), ".jar", TypeHint::Any);
        assert_eq!(resolution.resource_type(), ResourceType::Unknown);
        assert!(resolution.icon.is_none());
    }

    #[test]
    fn candidates_follow_extension_or_hint() {
        let registry = TypeRegistry::with_defaults();
        let types = |c: Vec<TypeDescriptor>| c.iter().map(|d| d.resource_type()).collect::<Vec<_>>();

        assert_eq!(
            types(registry.candidates(".jar", TypeHint::Any)),
            vec![ResourceType::Forge, ResourceType::Fabric, ResourceType::Unknown]
        );
        assert_eq!(
            types(registry.candidates(".zip", TypeHint::Domain(ResourceDomain::Modpacks))),
            vec![ResourceType::Modpack, ResourceType::CommonModpack, ResourceType::Unknown]
        );
        assert_eq!(
            types(registry.candidates(".zip", TypeHint::Type(ResourceType::Liteloader))),
            vec![ResourceType::Liteloader, ResourceType::Unknown]
        );
        assert_eq!(
            types(registry.candidates(".exe", TypeHint::Any)),
            vec![ResourceType::Unknown]
        );
    }

    #[test]
    fn hint_parsing() {
        assert_eq!("*".parse::<TypeHint>().unwrap(), TypeHint::Any);
        assert_eq!("fabric".parse::<TypeHint>().unwrap(), TypeHint::Type(ResourceType::Fabric));
        assert_eq!(
            "resourcepacks".parse::<TypeHint>().unwrap(),
            TypeHint::Domain(ResourceDomain::Resourcepacks)
        );
        assert!("plugins".parse::<TypeHint>().is_err());
    }

    #[test]
    fn hint_overrides_extension() {
        let registry = TypeRegistry::with_defaults();
        let bytes = zip_bytes(&[("pack.mcmeta", r#"{"pack":{"pack_format":4,"description":"x"}}"#)]);
        let resolution = registry.resolve_bytes(bytes, ".jar", TypeHint::Domain(ResourceDomain::Resourcepacks));
        assert_eq!(resolution.resource_type(), ResourceType::Resourcepack);
    }
}
