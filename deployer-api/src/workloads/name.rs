use std::fmt;

/// Tag docker assumes when an image reference carries none.
pub const DEFAULT_IMAGE_TAG: &str = "latest";

/// Suffix appended to a workload name to name its node port service.
const SERVICE_NAME_SUFFIX: &str = "-service";

/// Canonical name of a workload, used for its deployment, its container and
/// its pod label.
///
/// Only contains characters in `[a-z0-9-]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkloadName(String);

impl WorkloadName {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the service exposing this workload.
    pub fn service_name(&self) -> String {
        format!("{}{SERVICE_NAME_SUFFIX}", self.0)
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    /// Returns `true` if the image yielded no usable character, e.g.
    /// `repo/:v1`.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for WorkloadName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derives the workload name of an image.
///
/// Takes everything before the first `:`, keeps the part after the last `/`,
/// lowercases it and replaces every character outside `[a-z0-9-]` with `-`.
/// The tag never takes part in the name, so redeploying an image with a new
/// tag targets the same workload.
///
/// Note that the first `:` of the whole reference is used, so a registry
/// with a port (`registry:5000/app`) yields the registry host as name.
pub fn derive_workload_name(image: &str) -> WorkloadName {
    let untagged = image.split(':').next().unwrap_or(image);
    let last_segment = untagged.rsplit('/').next().unwrap_or(untagged);

    let name = last_segment
        .chars()
        .flat_map(char::to_lowercase)
        .map(|c| match c {
            'a'..='z' | '0'..='9' | '-' => c,
            _ => '-',
        })
        .collect();

    WorkloadName(name)
}

/// Returns the tag of an image reference, [`DEFAULT_IMAGE_TAG`] when none
/// is given.
///
/// Expected format: `HOST[:PORT]/NAMESPACE/REPOSITORY[:TAG][@DIGEST]`.
pub fn image_tag(image: &str) -> &str {
    let segment = image.rsplit('/').next().unwrap_or(image);
    // A digest may contain `:` itself, so split it off first.
    let segment = segment.split_once('@').map_or(segment, |(segment, _)| segment);

    match segment.split_once(':') {
        Some((_, tag)) if !tag.is_empty() => tag,
        _ => DEFAULT_IMAGE_TAG,
    }
}
