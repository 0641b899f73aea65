use tracing::debug;

use super::{DeviceDescriptor, DeviceVariant};

/// Model-family tokens that identify the alternate protocol family.
pub const DEFAULT_ALTERNATE_MARKERS: &[&str] = &["bp2w", "bp2a", "er2"];

/// Classifies a device into a protocol variant from its advertised name/model.
///
/// Matching is a case-insensitive substring search, markers are checked in order
/// and the first hit wins. Unknown devices fall back to [`DeviceVariant::Primary`];
/// a wrong guess shows up later as decode failures, never as an error here.
#[derive(Debug, Clone)]
pub struct CapabilityResolver {
    markers: Vec<(String, DeviceVariant)>,
}

impl Default for CapabilityResolver {
    fn default() -> Self {
        Self::with_alternate_markers(DEFAULT_ALTERNATE_MARKERS.iter().copied())
    }
}

impl CapabilityResolver {
    pub fn new(markers: Vec<(String, DeviceVariant)>) -> Self {
        let markers = markers
            .into_iter()
            .filter(|(token, _)| !token.trim().is_empty())
            .map(|(token, variant)| (token.trim().to_lowercase(), variant))
            .collect();
        Self { markers }
    }

    pub fn with_alternate_markers<S: AsRef<str>>(markers: impl IntoIterator<Item = S>) -> Self {
        Self::new(
            markers
                .into_iter()
                .map(|m| (m.as_ref().to_owned(), DeviceVariant::Alternate))
                .collect(),
        )
    }

    pub fn resolve(&self, device: &DeviceDescriptor) -> DeviceVariant {
        let haystacks = [device.name.as_deref(), device.model.as_deref()];
        for (token, variant) in &self.markers {
            let hit = haystacks
                .iter()
                .flatten()
                .any(|text| text.to_lowercase().contains(token.as_str()));
            if hit {
                debug!("Device {} matched marker \"{token}\" -> {variant:?}", device.id);
                return *variant;
            }
        }
        DeviceVariant::Primary
    }
}
