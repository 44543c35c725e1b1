use tkl_schemas::{RegistryVersion, MAX_MAJOR, MAX_MINOR_PATCH};

/// One step forward: patch, carrying into minor and major. At the ceiling
/// (`999.9.9`) the version is returned unchanged.
pub fn bump(v: RegistryVersion) -> RegistryVersion {
    if v.patch < MAX_MINOR_PATCH {
        return RegistryVersion::new(v.major, v.minor, v.patch + 1);
    }
    if v.minor < MAX_MINOR_PATCH {
        return RegistryVersion::new(v.major, v.minor + 1, 0);
    }
    if v.major < MAX_MAJOR {
        return RegistryVersion::new(v.major + 1, 0, 0);
    }
    v
}

/// Next registry version: bumped only when something changed.
pub fn next_version(current: RegistryVersion, changed: bool) -> RegistryVersion {
    if changed {
        bump(current)
    } else {
        current
    }
}
