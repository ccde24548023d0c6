use std::path::PathBuf;

use serde::Serialize;

use crate::naming::wheel_component;

/// Headers copied from an existing metadata directory into the generated
/// `METADATA`, in this order.
pub const CARRIED_HEADERS: [&str; 8] = [
    "Home-page",
    "Author",
    "Author-email",
    "License",
    "Requires-Python",
    "Classifier",
    "Provides-Extra",
    "Requires-Dist",
];

/// Parsed `PKG-INFO`/`METADATA` headers (RFC 822 style, continuation lines
/// folded into the previous value).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoreMetadata {
    headers: Vec<(String, String)>,
}

impl CoreMetadata {
    pub fn parse(text: &str) -> Self {
        let mut headers: Vec<(String, String)> = Vec::new();
        for line in text.lines() {
            if line.is_empty() {
                break;
            }
            if line.starts_with(char::is_whitespace) {
                if let Some((_, value)) = headers.last_mut() {
                    value.push('\n');
                    value.push_str(line.trim());
                }
                continue;
            }
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            headers.push((key.trim().to_string(), value.trim().to_string()));
        }
        Self { headers }
    }

    /// First value for `key`, compared case-insensitively; empty values are
    /// treated as absent.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.get_all(key).into_iter().next()
    }

    pub fn get_all(&self, key: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(name, value)| name.eq_ignore_ascii_case(key) && !value.is_empty())
            .map(|(_, value)| value.as_str())
            .collect()
    }

    pub fn name(&self) -> Option<&str> {
        self.get("Name")
    }

    pub fn version(&self) -> Option<&str> {
        self.get("Version")
    }
}

/// Where a [`DistributionIdentity`] came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum IdentitySource {
    MetadataDir(PathBuf),
    OsPackage(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DistributionIdentity {
    /// Lowercased declared name; filename escaping happens in [`Self::wheel_name`].
    pub name: String,
    /// Name as declared, used for the `Name:` header.
    pub display_name: String,
    pub version: String,
    pub summary: Option<String>,
    pub carried: Vec<(String, String)>,
    pub source: IdentitySource,
}

impl DistributionIdentity {
    pub fn new(
        display_name: impl Into<String>,
        version: impl Into<String>,
        source: IdentitySource,
    ) -> Self {
        let display_name = display_name.into();
        Self {
            name: display_name.trim().to_ascii_lowercase(),
            display_name,
            version: version.into(),
            summary: None,
            carried: Vec::new(),
            source,
        }
    }

    #[must_use]
    pub fn with_summary(mut self, summary: Option<String>) -> Self {
        self.summary = summary.filter(|value| !value.trim().is_empty());
        self
    }

    /// Copies [`CARRIED_HEADERS`] from an existing metadata file.
    #[must_use]
    pub fn with_carried(mut self, metadata: &CoreMetadata) -> Self {
        for key in CARRIED_HEADERS {
            for value in metadata.get_all(key) {
                self.carried.push((key.to_string(), value.to_string()));
            }
        }
        self
    }

    /// Name component of the wheel filename and dist-info directory.
    pub fn wheel_name(&self) -> String {
        wheel_component(&self.name)
    }

    pub fn wheel_version(&self) -> String {
        wheel_component(&self.version)
    }

    pub fn dist_info_dir(&self) -> String {
        format!("{}-{}.dist-info", self.wheel_name(), self.wheel_version())
    }

    pub fn data_dir(&self) -> String {
        format!("{}-{}.data", self.wheel_name(), self.wheel_version())
    }

    pub fn render_metadata(&self) -> String {
        let mut lines = vec![
            "Metadata-Version: 2.1".to_string(),
            format!("Name: {}", self.display_name),
            format!("Version: {}", self.version),
        ];
        if let Some(summary) = &self.summary {
            lines.push(format!("Summary: {}", fold(summary)));
        }
        for (key, value) in &self.carried {
            lines.push(format!("{key}: {}", fold(value)));
        }
        lines.push(String::new());
        lines.join("\n")
    }
}

fn fold(value: &str) -> String {
    value.replace('\n', "\n        ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PKG_INFO: &str = concat!(
        "Metadata-Version: 1.1\n",
        "Name: PyYAML\n",
        "Version: 5.3.1\n",
        "Summary: YAML parser and emitter for Python\n",
        "Home-page: https://github.com/yaml/pyyaml\n",
        "License: MIT\n",
        "Description: YAML is a data serialization format\n",
        "        designed for human readability.\n",
        "Classifier: Programming Language :: Python\n",
        "Classifier: Programming Language :: Python :: 3\n",
        "\n",
        "body text Version: 9\n",
    );

    #[test]
    fn parses_headers_and_continuations() {
        let metadata = CoreMetadata::parse(PKG_INFO);
        assert_eq!(metadata.name(), Some("PyYAML"));
        assert_eq!(metadata.version(), Some("5.3.1"));
        assert_eq!(
            metadata.get("description"),
            Some("YAML is a data serialization format\ndesigned for human readability.")
        );
        assert_eq!(metadata.get_all("Classifier").len(), 2);
    }

    #[test]
    fn body_is_not_parsed_as_headers() {
        let metadata = CoreMetadata::parse(PKG_INFO);
        assert_eq!(metadata.get_all("Version"), vec!["5.3.1"]);
    }

    #[test]
    fn identity_names_and_rendering() {
        let metadata = CoreMetadata::parse(PKG_INFO);
        let identity = DistributionIdentity::new(
            "PyYAML",
            "5.3.1",
            IdentitySource::MetadataDir(PathBuf::from("/x/PyYAML-5.3.1.egg-info")),
        )
        .with_summary(metadata.get("Summary").map(ToString::to_string))
        .with_carried(&metadata);

        assert_eq!(identity.name, "pyyaml");
        assert_eq!(identity.dist_info_dir(), "pyyaml-5.3.1.dist-info");
        assert_eq!(identity.data_dir(), "pyyaml-5.3.1.data");

        let rendered = identity.render_metadata();
        assert!(rendered.starts_with("Metadata-Version: 2.1\nName: PyYAML\nVersion: 5.3.1\n"));
        assert!(rendered.contains("Summary: YAML parser and emitter for Python\n"));
        assert!(rendered.contains("Home-page: https://github.com/yaml/pyyaml\n"));
        assert!(rendered.contains("Classifier: Programming Language :: Python :: 3\n"));
        assert!(!rendered.contains("Description"));
        assert!(rendered.ends_with('\n'));
    }

    #[test]
    fn separators_collapse_in_wheel_name() {
        let identity = DistributionIdentity::new(
            "pkg-resources",
            "44.1.1",
            IdentitySource::OsPackage("python3-pkg-resources".into()),
        );
        assert_eq!(identity.name, "pkg-resources");
        assert_eq!(identity.wheel_name(), "pkg_resources");
        assert_eq!(identity.dist_info_dir(), "pkg_resources-44.1.1.dist-info");
    }

    #[test]
    fn dotted_names_keep_their_dots() {
        let identity = DistributionIdentity::new(
            "zope.interface",
            "5.4.0",
            IdentitySource::OsPackage("python3-zope.interface".into()),
        );
        assert_eq!(identity.name, "zope.interface");
        assert_eq!(identity.dist_info_dir(), "zope.interface-5.4.0.dist-info");
        assert_eq!(
            crate::wheel::wheel_filename(&identity, &crate::wheel::WheelTag::universal()),
            "zope.interface-5.4.0-py2.py3-none-any.whl"
        );
    }

    #[test]
    fn verbatim_versions_are_escaped_for_filenames() {
        let identity = DistributionIdentity::new(
            "stupid",
            "2.0 beta/1-r2",
            IdentitySource::MetadataDir(PathBuf::from("/x/stupid.egg-info")),
        );
        assert_eq!(identity.wheel_version(), "2.0_beta_1_r2");
        assert_eq!(identity.dist_info_dir(), "stupid-2.0_beta_1_r2.dist-info");
        assert!(identity.render_metadata().contains("Version: 2.0 beta/1-r2\n"));
    }

    #[test]
    fn whitespace_only_description_lines_continue_the_header() {
        let metadata = CoreMetadata::parse(concat!(
            "Metadata-Version: 1.1\n",
            "Name: stupid\n",
            "Version: 1.0\n",
            "Description: first paragraph\n",
            "        \n",
            "        second paragraph\n",
            "Classifier: Programming Language :: Python :: 3\n",
            "Requires-Python: >=2.7\n",
        ));
        assert_eq!(
            metadata.get("Classifier"),
            Some("Programming Language :: Python :: 3")
        );
        assert_eq!(metadata.get("Requires-Python"), Some(">=2.7"));
        assert_eq!(
            metadata.get("Description"),
            Some("first paragraph\n\nsecond paragraph")
        );
    }
}
