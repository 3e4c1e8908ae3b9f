// src/core/manifest.rs

//! Extracts ordering and descriptive metadata from a module file.
//!
//! Two sources feed a [`ModuleManifest`]:
//!
//! - **Filename**: `NN-name.sh` carries the default priority (`NN`) and the module name.
//! - **Header comments**: `# priority: N`, `# version: X`, `# description: ...` inside
//!   the leading comment block. A header priority wins over the filename prefix.

use crate::{constants::DEFAULT_PRIORITY, models::ModuleManifest};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref FILENAME_RE: Regex =
        Regex::new(r"^(?:(\d+)[-_])?([^.]+?)(?:\.(sh|zsh|bash))?$").expect("valid filename regex");
    static ref HEADER_RE: Regex =
        Regex::new(r"^#\s*(priority|version|description)\s*:\s*(.*?)\s*$")
            .expect("valid header regex");
}

/// Name and optional priority prefix taken from a filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileNameParts {
    pub name: String,
    pub priority: Option<i64>,
}

/// Splits `NN-name.ext` into its parts. Returns `None` for files that are not modules
/// (hidden files, editor leftovers, foreign extensions).
pub fn parse_file_name(file_name: &str) -> Option<FileNameParts> {
    if file_name.starts_with('.') || file_name.ends_with('~') {
        return None;
    }
    let caps = FILENAME_RE.captures(file_name)?;
    let name = caps.get(2)?.as_str().to_string();
    if name.is_empty() {
        return None;
    }
    let priority = caps.get(1).and_then(|m| m.as_str().parse::<i64>().ok());
    Some(FileNameParts { name, priority })
}

/// Header values found in the leading comment block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderFields {
    pub priority: Option<i64>,
    pub version: Option<String>,
    pub description: Option<String>,
}

/// Reads `key: value` comments until the first line of code.
pub fn parse_header(content: &str) -> HeaderFields {
    let mut fields = HeaderFields::default();

    for line in content.lines().map(str::trim) {
        if line.is_empty() || line.starts_with("#!") {
            continue;
        }
        if !line.starts_with('#') {
            break;
        }
        let Some(caps) = HEADER_RE.captures(line) else {
            continue;
        };
        let (Some(key), Some(value)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        let value = value.as_str();
        if value.is_empty() {
            continue;
        }
        match key.as_str() {
            "priority" => match value.parse::<i64>() {
                Ok(p) => fields.priority = Some(p),
                Err(_) => log::warn!("Ignoring non-numeric priority header '{}'", value),
            },
            "version" => fields.version = Some(value.to_string()),
            "description" => fields.description = Some(value.to_string()),
            _ => {}
        }
    }
    fields
}

/// Combines filename and header metadata into the manifest used for ordering.
pub fn build_manifest(parts: FileNameParts, content: &str) -> ModuleManifest {
    let header = parse_header(content);
    ModuleManifest {
        name: parts.name,
        priority: header
            .priority
            .or(parts.priority)
            .unwrap_or(DEFAULT_PRIORITY),
        version: header.version,
        description: header.description,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_file_name_with_prefix() {
        let parts = parse_file_name("10-aliases.zsh").unwrap();
        assert_eq!(parts.name, "aliases");
        assert_eq!(parts.priority, Some(10));

        let parts = parse_file_name("05_path.sh").unwrap();
        assert_eq!(parts.name, "path");
        assert_eq!(parts.priority, Some(5));
    }

    #[test]
    fn test_parse_file_name_without_prefix_or_extension() {
        let parts = parse_file_name("git-helpers").unwrap();
        assert_eq!(parts.name, "git-helpers");
        assert_eq!(parts.priority, None);
    }

    #[test]
    fn test_parse_file_name_rejects_non_modules() {
        assert!(parse_file_name(".hidden.sh").is_none());
        assert!(parse_file_name("10-git.sh~").is_none());
        assert!(parse_file_name("10-git.sh.bak").is_none());
        assert!(parse_file_name("README.md").is_none());
        assert!(parse_file_name("20-prompt.zsh.disabled").is_none());
    }

    #[test]
    fn test_parse_header_reads_leading_comments_only() {
        let content = "#!/usr/bin/env zsh\n# priority: 15\n# version: 1.2.0\n# description: Git shortcuts\n\nalias g=git\n# version: 9.9\n";
        let header = parse_header(content);
        assert_eq!(header.priority, Some(15));
        assert_eq!(header.version.as_deref(), Some("1.2.0"));
        assert_eq!(header.description.as_deref(), Some("Git shortcuts"));
    }

    #[test]
    fn test_header_priority_overrides_filename() {
        let parts = parse_file_name("90-late.sh").unwrap();
        let manifest = build_manifest(parts, "# priority: 1\n");
        assert_eq!(manifest.priority, 1);
    }

    #[test]
    fn test_default_priority_and_bad_header() {
        let parts = parse_file_name("misc.sh").unwrap();
        let manifest = build_manifest(parts, "# priority: soon\nexport A=1\n");
        assert_eq!(manifest.priority, DEFAULT_PRIORITY);
        assert_eq!(manifest.version, None);
    }
}
