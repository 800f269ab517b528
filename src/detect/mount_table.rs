//! Parsing of the mount-listing utility's output.
//!
//! Each line describes one mounted filesystem:
//!
//! ```text
//! //user@host/ShareName on /Volumes/ShareName (smbfs, nodev, nosuid, mounted by user)
//! ```
//!
//! Only lines containing the network filesystem marker are considered.

use std::collections::BTreeMap;
use std::path::PathBuf;

use url::Url;

/// Marker identifying SMB mounts in the listing.
pub const DEFAULT_NETWORK_MARKER: &str = "smbfs";

/// A network filesystem currently attached to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountedVolume {
    /// Remote locator, always carrying a scheme (`smb://host/Share`).
    pub locator: String,
    /// Local path the volume is attached at.
    pub mount_path: PathBuf,
    /// Last path component of the locator.
    pub name: String,
}

impl MountedVolume {
    pub fn new(locator: impl Into<String>, mount_path: impl Into<PathBuf>) -> Self {
        let locator = normalize_locator(&locator.into());
        let name = volume_name(&locator);
        Self {
            locator,
            mount_path: mount_path.into(),
            name,
        }
    }

    /// The string that share hosts and paths are matched against.
    pub fn descriptor(&self) -> &str {
        &self.locator
    }
}

/// Parse one listing line. Returns `None` for non-network or malformed lines.
pub fn parse_mount_line(line: &str, marker: &str) -> Option<MountedVolume> {
    if !line.contains(marker) {
        return None;
    }

    let (locator, rest) = line.split_once(" on ")?;
    let mount_path = rest.split(" (").next()?.trim();
    // util-linux prints `<path> type <fstype>` before the options
    let mount_path = match mount_path.rsplit_once(" type ") {
        Some((path, _)) => path,
        None => mount_path,
    };
    let locator = locator.trim();

    if locator.is_empty() || mount_path.is_empty() {
        return None;
    }

    Some(MountedVolume::new(locator, mount_path))
}

/// Parse the whole listing, keeping network mounts in listing order.
pub fn parse_mount_table(output: &str, marker: &str) -> Vec<MountedVolume> {
    output
        .lines()
        .filter_map(|line| parse_mount_line(line, marker))
        .collect()
}

/// Prefix the `smb:` scheme onto locators that lack one.
pub fn normalize_locator(raw: &str) -> String {
    if raw.contains("://") {
        raw.to_string()
    } else if raw.starts_with("//") {
        format!("smb:{}", raw)
    } else {
        format!("smb://{}", raw)
    }
}

fn volume_name(locator: &str) -> String {
    locator
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Currently mounted network shares keyed by volume name.
///
/// Entries whose locator is not a valid URL are skipped.
pub fn discover_system_shares(volumes: &[MountedVolume]) -> BTreeMap<String, Url> {
    volumes
        .iter()
        .filter_map(|v| Url::parse(&v.locator).ok().map(|url| (v.name.clone(), url)))
        .collect()
}

/// Mount path of the first network volume whose locator mentions `share_name`.
pub fn locate_mount_point(volumes: &[MountedVolume], share_name: &str) -> Option<PathBuf> {
    volumes
        .iter()
        .find(|v| v.locator.contains(share_name))
        .map(|v| v.mount_path.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = "\
/dev/disk3s1s1 on / (apfs, sealed, local, read-only, journaled)
devfs on /dev (devfs, local, nobrowse)
//user@host/ShareName on /Volumes/ShareName (smbfs, nodev, nosuid)
//guest@nas.local/Media%20Files on /Volumes/Media Files (smbfs, nodev, nosuid, mounted by me)
map auto_home on /System/Volumes/Data/home (autofs, automounted, nobrowse)
";

    #[test]
    fn test_parse_line() {
        let volume = parse_mount_line(
            "//user@host/ShareName on /Volumes/ShareName (smbfs, nodev, nosuid)",
            DEFAULT_NETWORK_MARKER,
        )
        .unwrap();

        assert_eq!(volume.locator, "smb://user@host/ShareName");
        assert_eq!(volume.mount_path, PathBuf::from("/Volumes/ShareName"));
        assert_eq!(volume.name, "ShareName");
    }

    #[test]
    fn test_parse_line_ignores_local_filesystems() {
        assert!(parse_mount_line("/dev/disk1 on / (apfs, local)", DEFAULT_NETWORK_MARKER).is_none());
    }

    #[test]
    fn test_parse_line_without_on() {
        assert!(parse_mount_line("garbage smbfs line", DEFAULT_NETWORK_MARKER).is_none());
    }

    #[test]
    fn test_parse_line_path_with_spaces() {
        let volume = parse_mount_line(
            "//guest@nas.local/Media%20Files on /Volumes/Media Files (smbfs, nodev)",
            DEFAULT_NETWORK_MARKER,
        )
        .unwrap();
        assert_eq!(volume.mount_path, PathBuf::from("/Volumes/Media Files"));
        assert_eq!(volume.name, "Media%20Files");
    }

    #[test]
    fn test_parse_line_custom_marker() {
        let volume = parse_mount_line(
            "//nas.local/media on /mnt/media type cifs (rw,relatime)",
            "cifs",
        )
        .unwrap();
        assert_eq!(volume.locator, "smb://nas.local/media");
        assert_eq!(volume.mount_path, PathBuf::from("/mnt/media"));
    }

    #[test]
    fn test_parse_table() {
        let volumes = parse_mount_table(LISTING, DEFAULT_NETWORK_MARKER);
        assert_eq!(volumes.len(), 2);
        assert_eq!(volumes[0].name, "ShareName");
        assert_eq!(volumes[1].mount_path, PathBuf::from("/Volumes/Media Files"));
    }

    #[test]
    fn test_normalize_locator() {
        assert_eq!(normalize_locator("smb://host/a"), "smb://host/a");
        assert_eq!(normalize_locator("//host/a"), "smb://host/a");
        assert_eq!(normalize_locator("host/a"), "smb://host/a");
        assert_eq!(normalize_locator("afp://host/a"), "afp://host/a");
    }

    #[test]
    fn test_discover_system_shares() {
        let volumes = parse_mount_table(LISTING, DEFAULT_NETWORK_MARKER);
        let shares = discover_system_shares(&volumes);

        assert_eq!(shares.len(), 2);
        assert_eq!(
            shares["ShareName"].as_str(),
            "smb://user@host/ShareName"
        );
        assert_eq!(shares["Media%20Files"].host_str(), Some("nas.local"));
    }

    #[test]
    fn test_locate_mount_point() {
        let volumes = parse_mount_table(LISTING, DEFAULT_NETWORK_MARKER);
        assert_eq!(
            locate_mount_point(&volumes, "ShareName"),
            Some(PathBuf::from("/Volumes/ShareName"))
        );
        assert_eq!(locate_mount_point(&volumes, "Backups"), None);
    }
}
