//! Internationalization (i18n) support
//!
//! English and Brazilian Portuguese strings are built in. A site can
//! override or extend them with `languages/<lang>.yml` files.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::Result;

const FALLBACK_LANGUAGE: &str = "en";

const EN: &[(&str, &str)] = &[
    ("reading_time.quick", "quick read"),
    ("reading_time.minutes", "%d min"),
    ("reading_time.hours", "%d hours"),
    ("listing.load_more", "Load more posts"),
    ("listing.loading", "Loading..."),
    ("listing.load_error", "Could not load more posts. Try again."),
    ("listing.empty", "No posts published yet."),
    ("post.loading", "Loading..."),
    ("post.back", "Back to all posts"),
    ("not_found.title", "Post not found"),
    ("not_found.message", "There is no post at this address."),
    ("error.title", "Something went wrong"),
];

const PT_BR: &[(&str, &str)] = &[
    ("reading_time.quick", "Rápida leitura"),
    ("reading_time.minutes", "%d min"),
    ("reading_time.hours", "%d horas"),
    ("listing.load_more", "Carregar mais posts"),
    ("listing.loading", "Carregando..."),
    ("listing.load_error", "Não foi possível carregar mais posts. Tente novamente."),
    ("listing.empty", "Nenhum post publicado ainda."),
    ("post.loading", "Carregando..."),
    ("post.back", "Voltar para todos os posts"),
    ("not_found.title", "Post não encontrado"),
    ("not_found.message", "Não existe nenhum post neste endereço."),
    ("error.title", "Algo deu errado"),
];

/// Internationalization handler
#[derive(Debug, Clone)]
pub struct I18n {
    /// Current language
    language: String,
    /// Language data: lang -> key -> translation
    translations: HashMap<String, HashMap<String, String>>,
}

impl I18n {
    /// Create a handler with the built-in dictionaries
    pub fn new(language: &str) -> Self {
        let mut translations = HashMap::new();
        translations.insert("en".to_string(), dictionary(EN));
        translations.insert("pt-BR".to_string(), dictionary(PT_BR));

        Self {
            language: normalize(language),
            translations,
        }
    }

    /// Load language override files (`<lang>.yml`) from a directory
    pub fn load_languages<P: AsRef<Path>>(&mut self, dir: P) -> Result<()> {
        let dir = dir.as_ref();
        if !dir.exists() {
            return Ok(());
        }

        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            let ext = path.extension().and_then(|e| e.to_str());
            if !path.is_file() || !matches!(ext, Some("yml") | Some("yaml")) {
                continue;
            }

            let Some(lang) = path.file_stem().and_then(|s| s.to_str()).map(normalize) else {
                continue;
            };

            let content = fs::read_to_string(&path)?;
            match serde_yaml::from_str::<serde_yaml::Value>(&content) {
                Ok(data) => {
                    let mut flat = HashMap::new();
                    flatten_translations(&data, "", &mut flat);
                    self.translations.entry(lang).or_default().extend(flat);
                    tracing::debug!("Loaded language file: {:?}", path);
                }
                Err(e) => {
                    tracing::warn!("Failed to parse language file {:?}: {}", path, e);
                }
            }
        }

        Ok(())
    }

    /// Get the current language
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Get a translation by key, falling back to English and then the key
    pub fn get(&self, key: &str) -> String {
        let lookup = |lang: &str| {
            self.translations
                .get(lang)
                .and_then(|data| data.get(key))
                .cloned()
        };

        lookup(&self.language)
            .or_else(|| lookup(base_language(&self.language)))
            .or_else(|| lookup(FALLBACK_LANGUAGE))
            .unwrap_or_else(|| key.to_string())
    }

    /// Get a translation with `%d` replaced by a count
    pub fn get_count(&self, key: &str, count: u64) -> String {
        self.get(key).replace("%d", &count.to_string())
    }

    /// All translations for the current language, English filling the gaps
    pub fn get_all_translations(&self) -> HashMap<String, String> {
        let mut result = HashMap::new();
        for lang in [
            self.language.as_str(),
            base_language(&self.language),
            FALLBACK_LANGUAGE,
        ] {
            if let Some(data) = self.translations.get(lang) {
                for (k, v) in data {
                    result.entry(k.clone()).or_insert_with(|| v.clone());
                }
            }
        }
        result
    }
}

impl Default for I18n {
    fn default() -> Self {
        Self::new(FALLBACK_LANGUAGE)
    }
}

fn dictionary(entries: &[(&str, &str)]) -> HashMap<String, String> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// `pt_br` / `pt-br` -> `pt-BR`
fn normalize(tag: &str) -> String {
    let tag = tag.trim().replace('_', "-");
    match tag.split_once('-') {
        Some((lang, region)) => format!("{}-{}", lang.to_lowercase(), region.to_uppercase()),
        None => tag.to_lowercase(),
    }
}

fn base_language(tag: &str) -> &str {
    tag.split('-').next().unwrap_or(tag)
}

/// Flatten nested YAML into dot-separated keys
fn flatten_translations(value: &serde_yaml::Value, prefix: &str, out: &mut HashMap<String, String>) {
    match value {
        serde_yaml::Value::Mapping(map) => {
            for (k, v) in map {
                let Some(k) = k.as_str() else { continue };
                let key = if prefix.is_empty() {
                    k.to_string()
                } else {
                    format!("{}.{}", prefix, k)
                };
                flatten_translations(v, &key, out);
            }
        }
        serde_yaml::Value::String(s) => {
            out.insert(prefix.to_string(), s.clone());
        }
        serde_yaml::Value::Number(n) => {
            out.insert(prefix.to_string(), n.to_string());
        }
        serde_yaml::Value::Bool(b) => {
            out.insert(prefix.to_string(), b.to_string());
        }
        _ => {}
    }
}
