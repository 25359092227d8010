// rust/src/i18n.rs
//
// Runtime string tables:
// - English is compiled in and is always the fallback
// - Other languages load from assets/i18n/<lang>.json next to the exe or in
//   the working directory
// - Lookup: tr("key") / tr_with("key", &[("name", ...)]) with {name} placeholders
//
// Language selection:
// - CLI: --lang <code> (e.g. en, zh-Hans)
// - Env: DOME_LANG
// - Default: en

use once_cell::sync::{Lazy, OnceCell};
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::RwLock,
};

pub const FALLBACK_LANG: &str = "en";

static EMBEDDED_EN: Lazy<HashMap<String, String>> = Lazy::new(|| {
    serde_json::from_str(include_str!("../assets/i18n/en.json")).unwrap_or_else(|e| {
        log::error!("embedded English strings are malformed: {e}");
        HashMap::new()
    })
});

#[derive(Debug, Clone)]
pub struct I18n {
    pub lang: String,
    map: HashMap<String, String>,
}

static I18N: OnceCell<RwLock<I18n>> = OnceCell::new();

fn load_json_map(path: &Path) -> Option<HashMap<String, String>> {
    let text = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&text) {
        Ok(map) => Some(map),
        Err(e) => {
            log::warn!("ignoring {}: {e}", path.display());
            None
        }
    }
}

/// 1) <exe_dir>/assets/i18n/<lang>.json
/// 2) ./assets/i18n/<lang>.json
fn find_lang_file(lang: &str) -> Option<PathBuf> {
    let rel = PathBuf::from("assets").join("i18n").join(format!("{lang}.json"));

    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf));
    exe_dir
        .map(|dir| dir.join(&rel))
        .into_iter()
        .chain(std::iter::once(rel))
        .find(|p| p.exists())
}

fn load_lang(lang: &str) -> HashMap<String, String> {
    if lang == FALLBACK_LANG {
        return HashMap::new();
    }
    match find_lang_file(lang).and_then(|p| load_json_map(&p)) {
        Some(m) => m,
        None => {
            log::warn!("no strings for language {lang:?}, using English");
            HashMap::new()
        }
    }
}

/// Initialize global i18n. Safe to call again to switch languages.
pub fn init(lang: impl Into<String>) {
    let lang = lang.into();
    let map = load_lang(&lang);
    let i = I18n { lang, map };

    if let Some(lock) = I18N.get() {
        if let Ok(mut w) = lock.write() {
            *w = i;
        }
    } else {
        let _ = I18N.set(RwLock::new(i));
    }
}

pub fn current_lang() -> String {
    I18N.get()
        .and_then(|l| l.read().ok().map(|i| i.lang.clone()))
        .unwrap_or_else(|| FALLBACK_LANG.to_string())
}

/// Localized text for `key`; the key itself when no table has it.
pub fn tr(key: &str) -> String {
    let selected = I18N
        .get()
        .and_then(|l| l.read().ok())
        .and_then(|i| i.map.get(key).cloned());

    selected
        .or_else(|| EMBEDDED_EN.get(key).cloned())
        .unwrap_or_else(|| key.to_string())
}

/// Localized text with `{name}` placeholders substituted.
/// Placeholders not provided are kept as-is.
pub fn tr_with(key: &str, args: &[(&str, String)]) -> String {
    let mut s = tr(key);
    for (k, v) in args {
        s = s.replace(&format!("{{{k}}}"), v);
    }
    s
}

/// Choose language from CLI/env.
pub fn resolve_lang<I>(args: I) -> String
where
    I: IntoIterator<Item = String>,
{
    let mut it = args.into_iter();
    while let Some(a) = it.next() {
        if a == "--lang" {
            if let Some(v) = it.next() {
                return v;
            }
        }
    }

    match std::env::var("DOME_LANG") {
        Ok(v) if !v.trim().is_empty() => v,
        _ => FALLBACK_LANG.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn english_is_embedded() {
        assert_eq!(tr("control.play"), "Play Video");
        assert_eq!(tr("no.such.key"), "no.such.key");
    }

    #[test]
    fn placeholders_are_substituted() {
        assert_eq!(tr_with("status.scale", &[("scale", "2.5".into())]), "Scale: 2.5");
    }

    #[test]
    fn lang_from_cli() {
        let args = ["dome", "--lang", "zh-Hans"].map(String::from);
        assert_eq!(resolve_lang(args), "zh-Hans");
    }
}
