//! Hangul Font Lookup
//! Finds a font that can draw Korean site names and column labels, for the
//! dashboard and for the chart images.

use crate::config::FontSettings;
use egui::{FontData, FontDefinitions, FontFamily};
use font_kit::family_name::FamilyName;
use font_kit::handle::Handle;
use font_kit::properties::Properties;
use font_kit::source::SystemSource;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Korean families tried in order after the configured one.
pub const HANGUL_FAMILIES: [&str; 6] = [
    "Noto Sans CJK KR",
    "Noto Sans KR",
    "NanumGothic",
    "Malgun Gothic",
    "Apple SD Gothic Neo",
    "AppleGothic",
];

/// Used by the chart renderer when no Hangul family is installed
pub const FALLBACK_CHART_FAMILY: &str = "sans-serif";

const HANGUL_FONT_KEY: &str = "hangul";

/// Raw font file plus the face index inside a collection (`.ttc`).
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedFont {
    pub name: String,
    pub bytes: Vec<u8>,
    pub index: u32,
}

fn family_candidates(settings: &FontSettings) -> Vec<&str> {
    settings
        .family
        .as_deref()
        .into_iter()
        .chain(HANGUL_FAMILIES)
        .collect()
}

/// First candidate the predicate accepts.
pub fn pick_family<'a>(
    candidates: impl IntoIterator<Item = &'a str>,
    is_available: impl Fn(&str) -> bool,
) -> Option<&'a str> {
    candidates.into_iter().find(|name| is_available(name))
}

fn find_system_family(name: &str) -> Option<Handle> {
    SystemSource::new()
        .select_best_match(&[FamilyName::Title(name.to_string())], &Properties::new())
        .ok()
}

fn read_handle(name: &str, handle: Handle) -> io::Result<LoadedFont> {
    match handle {
        Handle::Path { path, font_index } => Ok(LoadedFont {
            name: name.to_string(),
            bytes: fs::read(path)?,
            index: font_index,
        }),
        Handle::Memory { bytes, font_index } => Ok(LoadedFont {
            name: name.to_string(),
            bytes: bytes.to_vec(),
            index: font_index,
        }),
    }
}

fn read_font_file(path: &Path) -> io::Result<LoadedFont> {
    Ok(LoadedFont {
        name: path.display().to_string(),
        bytes: fs::read(path)?,
        index: 0,
    })
}

/// Font for the dashboard: the configured file, else the first installed
/// Korean family.
pub fn load_hangul_font(settings: &FontSettings) -> Option<LoadedFont> {
    if let Some(path) = &settings.path {
        match read_font_file(path) {
            Ok(font) => return Some(font),
            Err(e) => warn!(path = %path.display(), "configured font unreadable: {}", e),
        }
    }

    for name in family_candidates(settings) {
        let Some(handle) = find_system_family(name) else {
            debug!(family = name, "font family not installed");
            continue;
        };
        match read_handle(name, handle) {
            Ok(font) => return Some(font),
            Err(e) => warn!(family = name, "font family unreadable: {}", e),
        }
    }
    None
}

/// egui's default fonts with the Hangul face appended as a fallback, so Latin
/// text keeps its usual look.
pub fn hangul_font_definitions(font: LoadedFont) -> FontDefinitions {
    let mut fonts = FontDefinitions::default();
    let mut data = FontData::from_owned(font.bytes);
    data.index = font.index;
    fonts
        .font_data
        .insert(HANGUL_FONT_KEY.to_string(), Arc::new(data));
    for family in [FontFamily::Proportional, FontFamily::Monospace] {
        fonts
            .families
            .entry(family)
            .or_default()
            .push(HANGUL_FONT_KEY.to_string());
    }
    fonts
}

/// Register a Hangul font with the dashboard context.
pub fn install_hangul_font(ctx: &egui::Context, settings: &FontSettings) {
    match load_hangul_font(settings) {
        Some(font) => {
            info!(font = %font.name, "Hangul font loaded");
            ctx.set_fonts(hangul_font_definitions(font));
        }
        None => warn!(
            "no Hangul font found; set fonts.path in the config to a Korean .ttf/.otf file"
        ),
    }
}

/// Family name for plotters text. plotters silently substitutes sans-serif for
/// unknown names, so availability is checked against the system source first.
pub fn chart_font_family(settings: &FontSettings) -> String {
    let family = pick_family(family_candidates(settings), |name| {
        find_system_family(name).is_some()
    })
    .unwrap_or(FALLBACK_CHART_FAMILY);
    debug!(family, "chart font family");
    family.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_pick_family_prefers_configured() {
        let settings = FontSettings {
            path: None,
            family: Some("Custom Gothic".to_string()),
        };
        let candidates = family_candidates(&settings);
        assert_eq!(candidates[0], "Custom Gothic");
        assert_eq!(candidates.len(), HANGUL_FAMILIES.len() + 1);

        assert_eq!(pick_family(candidates.clone(), |_| true), Some("Custom Gothic"));
        assert_eq!(
            pick_family(candidates.clone(), |name| name == "NanumGothic"),
            Some("NanumGothic")
        );
        assert_eq!(pick_family(candidates, |_| false), None);
    }

    #[test]
    fn test_configured_font_file_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Korean.ttf");
        fs::write(&path, b"font bytes").unwrap();

        let settings = FontSettings {
            path: Some(path.clone()),
            family: None,
        };
        let font = load_hangul_font(&settings).unwrap();
        assert_eq!(font.bytes, b"font bytes");
        assert_eq!(font.index, 0);
        assert_eq!(font.name, path.display().to_string());
    }

    #[test]
    fn test_missing_font_file_is_an_error() {
        assert!(read_font_file(&PathBuf::from("/nonexistent/Korean.ttf")).is_err());
    }

    #[test]
    fn test_font_definitions_append_hangul_fallback() {
        let fonts = hangul_font_definitions(LoadedFont {
            name: "test".to_string(),
            bytes: vec![0, 1, 2],
            index: 3,
        });
        let data = fonts.font_data.get(HANGUL_FONT_KEY).unwrap();
        assert_eq!(data.index, 3);
        for family in [FontFamily::Proportional, FontFamily::Monospace] {
            let names = &fonts.families[&family];
            assert!(names.len() > 1);
            assert_eq!(names.last().map(String::as_str), Some(HANGUL_FONT_KEY));
        }
    }

    #[test]
    fn test_chart_family_falls_back_to_sans_serif() {
        let family = chart_font_family(&FontSettings::default());
        assert!(family == FALLBACK_CHART_FAMILY || HANGUL_FAMILIES.contains(&family.as_str()));
    }
}
