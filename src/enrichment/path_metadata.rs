//! Derive `category`/`nasServer`/`rootFolder`/`nasPath` from an object key
//! and optional original NAS path.
//!
//! Ported behavior-for-behavior from `worker.py::_extract_path_metadata`,
//! plus the authoritative server→category correction this system always
//! applies afterward (§3 invariant 4 of the governing design).

use std::sync::OnceLock;

use regex::Regex;

use crate::model::{Category, PathMetadata};

fn primary_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:documents|processed|docuworks-converted)/(road|structure)/(ts-server\d+)/([^/]+)/")
            .expect("primary path-metadata pattern is valid")
    })
}

fn fallback_category_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/(road|structure)/").expect("fallback category pattern is valid"))
}

fn server_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"ts-server(\d+)").expect("server pattern is valid"))
}

fn category_for_server(server: &str) -> Option<Category> {
    let digits: String = server.chars().filter(|c| c.is_ascii_digit()).collect();
    match digits.parse::<u32>().ok()? {
        3 | 5 => Some(Category::Road),
        6 | 7 => Some(Category::Structure),
        _ => None,
    }
}

/// Convert a source-system path (POSIX mount or already-UNC) into the
/// canonical `\\server\share\...` form.
fn convert_original_to_nas_path(original_path: &str) -> Option<String> {
    if original_path.starts_with("\\\\") {
        return Some(original_path.to_string());
    }

    let normalized = original_path.replace('\\', "/");
    let caps = server_pattern().captures(&normalized)?;
    let server_match = caps.get(0)?.as_str();

    let marker = format!("{server_match}/");
    let idx = normalized.find(&marker)?;
    let mut remaining = &normalized[idx + marker.len()..];
    if let Some(stripped) = remaining.strip_prefix("share/") {
        remaining = stripped;
    }

    let windows_path = remaining.replace('/', "\\");
    Some(format!("\\\\{server_match}\\share\\{windows_path}"))
}

fn nas_path_from_key(key: &str, server: &str) -> Option<String> {
    let marker = format!("{server}/");
    let idx = key.find(&marker)?;
    let remaining = &key[idx + marker.len()..];
    if remaining.is_empty() {
        return None;
    }
    Some(format!("\\\\{server}\\share\\{}", remaining.replace('/', "\\")))
}

/// Derive path metadata for an indexed document, applying the authoritative
/// server→category override regardless of which branch produced `category`.
pub fn extract_path_metadata(key: &str, original_path: Option<&str>) -> PathMetadata {
    let mut meta = PathMetadata::default();

    if let Some(caps) = primary_pattern().captures(key) {
        let category_str = &caps[1];
        let server = caps[2].to_string();
        let root_folder = caps[3].to_string();

        meta.category = match category_str {
            "road" => Some(Category::Road),
            "structure" => Some(Category::Structure),
            _ => None,
        };
        meta.nas_server = Some(server.clone());
        meta.root_folder = Some(root_folder);
        meta.nas_path = original_path
            .and_then(convert_original_to_nas_path)
            .or_else(|| nas_path_from_key(key, &server));
    } else {
        if let Some(caps) = server_pattern().captures(key) {
            let server = caps.get(0).unwrap().as_str().to_string();
            meta.category = category_for_server(&server);
            meta.nas_server = Some(server.clone());
            meta.nas_path = original_path
                .and_then(convert_original_to_nas_path)
                .or_else(|| nas_path_from_key(key, &server));
        } else if let Some(caps) = fallback_category_pattern().captures(key) {
            meta.category = match &caps[1] {
                "road" => Some(Category::Road),
                "structure" => Some(Category::Structure),
                _ => None,
            };
            if meta.nas_path.is_none() {
                meta.nas_path = original_path.and_then(convert_original_to_nas_path);
            }
        } else if let Some(path) = original_path {
            meta.nas_path = convert_original_to_nas_path(path);
        }
    }

    // Authoritative correction: a known server always wins over whatever
    // category the path segment suggested.
    if let Some(server) = meta.nas_server.as_deref() {
        if let Some(authoritative) = category_for_server(server) {
            meta.category = Some(authoritative);
        }
    }

    meta.category_display = meta.category.map(|c| c.display_label().to_string());
    meta
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_pdf_ingest() {
        let meta = extract_path_metadata("documents/road/ts-server3/R06_JOB/sub/report.pdf", None);
        assert_eq!(meta.category, Some(Category::Road));
        assert_eq!(meta.category_display.as_deref(), Some("道路"));
        assert_eq!(meta.nas_server.as_deref(), Some("ts-server3"));
        assert_eq!(meta.root_folder.as_deref(), Some("R06_JOB"));
        assert_eq!(
            meta.nas_path.as_deref(),
            Some("\\\\ts-server3\\share\\R06_JOB\\sub\\report.pdf")
        );
    }

    #[test]
    fn category_correction_overrides_path_segment() {
        let meta = extract_path_metadata("documents/road/ts-server6/H22/foo.pdf", None);
        // path segment says "road" but ts-server6 is authoritative "structure"
        assert_eq!(meta.category, Some(Category::Structure));
        assert_eq!(meta.category_display.as_deref(), Some("構造"));
    }

    #[test]
    fn prefers_original_path_for_nas_path() {
        let meta = extract_path_metadata(
            "documents/road/ts-server3/R06_JOB/report.pdf",
            Some("/mnt/nas/ts-server3/R06_JOB/report.pdf"),
        );
        assert_eq!(
            meta.nas_path.as_deref(),
            Some("\\\\ts-server3\\share\\R06_JOB\\report.pdf")
        );
    }

    #[test]
    fn fallback_extracts_server_without_prefixed_category() {
        let meta = extract_path_metadata("processed/ts-server5/misc/file.doc", None);
        assert_eq!(meta.nas_server.as_deref(), Some("ts-server5"));
        assert_eq!(meta.category, Some(Category::Road));
    }

    #[test]
    fn fallback_category_only_without_server() {
        let meta = extract_path_metadata("archive/road/legacy/file.doc", None);
        assert_eq!(meta.category, Some(Category::Road));
        assert!(meta.nas_server.is_none());
    }

    #[test]
    fn unmatched_key_yields_empty_metadata() {
        let meta = extract_path_metadata("misc/whatever.bin", None);
        assert!(meta.category.is_none());
        assert!(meta.nas_server.is_none());
        assert!(meta.nas_path.is_none());
    }

    #[test]
    fn already_unc_original_path_passes_through() {
        let meta = extract_path_metadata(
            "documents/structure/ts-server7/H1/file.pdf",
            Some("\\\\ts-server7\\share\\H1\\file.pdf"),
        );
        assert_eq!(
            meta.nas_path.as_deref(),
            Some("\\\\ts-server7\\share\\H1\\file.pdf")
        );
    }
}
