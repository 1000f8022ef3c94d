use crate::config::ProofConfig;
use serde::Serialize;
use std::path::PathBuf;
use strum::{Display, EnumString, IntoStaticStr};

/// Subdirectories of each base directory searched after the base itself.
const SEARCH_SUBDIRS: [&str; 2] = ["lib", "dist"];

/// Platforms the capability module is published for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, EnumString, IntoStaticStr, Serialize)]
pub enum Platform {
    #[strum(serialize = "linux-x64")]
    #[serde(rename = "linux-x64")]
    LinuxX64,
    #[strum(serialize = "darwin-x64")]
    #[serde(rename = "darwin-x64")]
    DarwinX64,
    #[strum(serialize = "darwin-arm64")]
    #[serde(rename = "darwin-arm64")]
    DarwinArm64,
    #[strum(serialize = "win32-x64")]
    #[serde(rename = "win32-x64")]
    Win32X64,
}

impl Platform {
    pub const ALL: [Platform; 4] = [
        Platform::LinuxX64,
        Platform::DarwinX64,
        Platform::DarwinArm64,
        Platform::Win32X64,
    ];

    /// The platform this process runs on, if a module is published for it.
    pub fn current() -> Option<Self> {
        Self::detect(std::env::consts::OS, std::env::consts::ARCH)
    }

    fn detect(os: &str, arch: &str) -> Option<Self> {
        match (os, arch) {
            ("linux", "x86_64") => Some(Self::LinuxX64),
            ("macos", "x86_64") => Some(Self::DarwinX64),
            ("macos", "aarch64") => Some(Self::DarwinArm64),
            ("windows", "x86_64") => Some(Self::Win32X64),
            _ => None,
        }
    }

    /// File name of the module build for this platform.
    pub fn module_file_name(self) -> &'static str {
        match self {
            Self::LinuxX64 => "libweb_proof_engine.linux-x64-gnu.so",
            Self::DarwinX64 => "libweb_proof_engine.darwin-x64.dylib",
            Self::DarwinArm64 => "libweb_proof_engine.darwin-arm64.dylib",
            Self::Win32X64 => "web_proof_engine.win32-x64-msvc.dll",
        }
    }
}

/// Ordered list of locations probed for the capability module.
///
/// An explicit `candidate_locations` list in the config is used as is.
/// Otherwise every base directory (configured module directory, directory of
/// the running executable, working directory) is searched for the current
/// platform's file and then the linux-x64 build.
pub fn candidate_locations(config: &ProofConfig) -> Vec<PathBuf> {
    if let Some(explicit) = &config.candidate_locations {
        return explicit.clone();
    }

    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(PathBuf::from));
    let cwd = std::env::current_dir().ok();

    let mut bases: Vec<PathBuf> = Vec::new();
    for base in [config.module_dir.clone(), exe_dir, cwd].into_iter().flatten() {
        if !bases.contains(&base) {
            bases.push(base);
        }
    }

    locations_for(&bases, Platform::current())
}

fn locations_for(bases: &[PathBuf], platform: Option<Platform>) -> Vec<PathBuf> {
    let mut file_names = Vec::new();
    if let Some(platform) = platform {
        file_names.push(platform.module_file_name());
    }
    if platform != Some(Platform::LinuxX64) {
        file_names.push(Platform::LinuxX64.module_file_name());
    }

    let mut locations = Vec::new();
    for base in bases {
        for file_name in &file_names {
            locations.push(base.join(file_name));
            for subdir in SEARCH_SUBDIRS {
                locations.push(base.join(subdir).join(file_name));
            }
        }
    }
    locations
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_platform_identifiers() {
        let ids: Vec<String> = Platform::ALL.iter().map(|p| p.to_string()).collect();
        assert_eq!(ids, ["linux-x64", "darwin-x64", "darwin-arm64", "win32-x64"]);
        assert_eq!(Platform::from_str("darwin-arm64").unwrap(), Platform::DarwinArm64);
        assert!(Platform::from_str("freebsd-x64").is_err());
    }

    #[test]
    fn test_detect() {
        assert_eq!(Platform::detect("linux", "x86_64"), Some(Platform::LinuxX64));
        assert_eq!(Platform::detect("macos", "aarch64"), Some(Platform::DarwinArm64));
        assert_eq!(Platform::detect("linux", "aarch64"), None);
    }

    #[test]
    fn test_locations_on_linux() {
        let bases = vec![PathBuf::from("/opt/app")];
        let locations = locations_for(&bases, Some(Platform::LinuxX64));
        assert_eq!(
            locations,
            vec![
                PathBuf::from("/opt/app/libweb_proof_engine.linux-x64-gnu.so"),
                PathBuf::from("/opt/app/lib/libweb_proof_engine.linux-x64-gnu.so"),
                PathBuf::from("/opt/app/dist/libweb_proof_engine.linux-x64-gnu.so"),
            ]
        );
    }

    #[test]
    fn test_locations_fall_back_to_linux_build() {
        let bases = vec![PathBuf::from("a"), PathBuf::from("b")];
        let locations = locations_for(&bases, Some(Platform::DarwinArm64));
        assert_eq!(locations.len(), 12);
        assert_eq!(
            locations[0],
            PathBuf::from("a/libweb_proof_engine.darwin-arm64.dylib")
        );
        assert_eq!(
            locations[3],
            PathBuf::from("a/libweb_proof_engine.linux-x64-gnu.so")
        );
        assert!(locations[6].starts_with("b"));
    }

    #[test]
    fn test_explicit_candidates_override_defaults() {
        let config = ProofConfig::builder()
            .candidate_locations(vec![PathBuf::from("custom/engine.so")])
            .build()
            .unwrap();
        assert_eq!(
            candidate_locations(&config),
            vec![PathBuf::from("custom/engine.so")]
        );
    }

    #[test]
    fn test_module_dir_searched_first() {
        let config = ProofConfig::builder()
            .module_dir("/srv/engine")
            .build()
            .unwrap();
        let locations = candidate_locations(&config);
        assert!(locations[0].starts_with("/srv/engine"));
    }
}
