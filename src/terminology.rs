use std::collections::HashMap;
use std::path::Path;

use tracing::info;

use crate::error::{KoyuError, Result};
use crate::language::Language;

/// Fixed per-language storage, one optional slot per supported language
#[derive(Debug, Clone)]
pub struct LanguageMap<T> {
    slots: [Option<T>; 4],
}

impl<T> Default for LanguageMap<T> {
    fn default() -> Self {
        Self {
            slots: [None, None, None, None],
        }
    }
}

impl<T> LanguageMap<T> {
    pub fn get(&self, language: Language) -> Option<&T> {
        self.slots[language.index()].as_ref()
    }

    pub fn insert(&mut self, language: Language, value: T) -> Option<T> {
        self.slots[language.index()].replace(value)
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Present values in canonical language order
    pub fn iter(&self) -> impl Iterator<Item = (Language, &T)> + '_ {
        Language::ALL
            .iter()
            .filter_map(|language| self.slots[language.index()].as_ref().map(|v| (*language, v)))
    }
}

/// Index of an entry within its table, stable for the table's lifetime
pub type EntryId = usize;

/// One domain concept: per-language surface forms and descriptions
#[derive(Debug, Clone, Default)]
pub struct TermEntry {
    pub category: Option<String>,
    pub surface_forms: LanguageMap<String>,
    pub descriptions: LanguageMap<String>,
}

impl TermEntry {
    pub fn surface(&self, language: Language) -> Option<&str> {
        self.surface_forms.get(language).map(String::as_str)
    }

    pub fn description(&self, language: Language) -> Option<&str> {
        self.descriptions.get(language).map(String::as_str)
    }

    /// English surface form, the cross-language identifier when present
    pub fn canonical_key(&self) -> Option<&str> {
        self.surface(Language::English)
    }

    /// Replacement text for a language: its own surface form, else the English one
    pub fn replacement(&self, language: Language) -> Option<&str> {
        self.surface(language).or_else(|| self.canonical_key())
    }

    /// Distinct surface forms across all languages, longest first.
    /// The sort is stable, so equal-length variants keep canonical language order.
    pub fn variants_longest_first(&self) -> Vec<&str> {
        let mut variants: Vec<&str> = Vec::new();
        for (_, form) in self.surface_forms.iter() {
            if !variants.contains(&form.as_str()) {
                variants.push(form);
            }
        }
        variants.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()));
        variants
    }
}

/// Immutable terminology table shared by all per-language pipelines
#[derive(Debug, Clone, Default)]
pub struct TermTable {
    entries: Vec<TermEntry>,
    // lowercased surface form -> entry; later entries win collisions
    reverse: HashMap<String, EntryId>,
}

struct SheetRow {
    surface: Option<String>,
    category: Option<String>,
    description: Option<String>,
}

impl TermTable {
    /// Build a table from entries, dropping any entry without a surface form
    pub fn from_entries(entries: Vec<TermEntry>) -> Self {
        let entries: Vec<TermEntry> = entries
            .into_iter()
            .filter(|entry| !entry.surface_forms.is_empty())
            .collect();

        let mut reverse = HashMap::new();
        for (id, entry) in entries.iter().enumerate() {
            for (_, form) in entry.surface_forms.iter() {
                reverse.insert(form.trim().to_lowercase(), id);
            }
        }

        Self { entries, reverse }
    }

    /// Load one CSV sheet per language from a directory, rows aligned by position.
    /// Expected files: `cmn-Hant-TW.csv`, `en-US.csv`, `ja-JP.csv`, `de-DE.csv`,
    /// each with columns `proper_noun,type,description`.
    pub fn load_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(KoyuError::FileNotFound(dir.display().to_string()));
        }

        let mut sheets = Vec::with_capacity(Language::ALL.len());
        for language in Language::ALL {
            let path = dir.join(format!("{}.csv", language.code()));
            if !path.exists() {
                return Err(KoyuError::Terminology(format!(
                    "Missing terminology sheet: {}",
                    path.display()
                )));
            }
            sheets.push(load_sheet(&path)?);
        }

        let row_count = sheets.iter().map(Vec::len).max().unwrap_or(0);
        let mut entries = Vec::with_capacity(row_count);
        for row_idx in 0..row_count {
            let mut entry = TermEntry::default();
            let mut categories: LanguageMap<String> = LanguageMap::default();
            for (sheet, language) in sheets.iter().zip(Language::ALL) {
                let Some(row) = sheet.get(row_idx) else { continue };
                if let Some(surface) = &row.surface {
                    entry.surface_forms.insert(language, surface.clone());
                }
                if let Some(description) = &row.description {
                    entry.descriptions.insert(language, description.clone());
                }
                if let Some(category) = &row.category {
                    categories.insert(language, category.clone());
                }
            }
            // English sheet labels the concept; any other sheet's label fills a gap
            entry.category = categories
                .get(Language::English)
                .or_else(|| categories.iter().next().map(|(_, c)| c))
                .cloned();
            entries.push(entry);
        }

        let table = Self::from_entries(entries);
        info!(
            "Loaded {} terminology entries from {}",
            table.len(),
            dir.display()
        );
        Ok(table)
    }

    pub fn entries(&self) -> &[TermEntry] {
        &self.entries
    }

    pub fn entry(&self, id: EntryId) -> &TermEntry {
        &self.entries[id]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve any surface form, in any language and casing, to its entry
    pub fn resolve(&self, surface: &str) -> Option<EntryId> {
        self.reverse.get(&surface.trim().to_lowercase()).copied()
    }

    /// Canonical target-language form for a claimed term.
    /// Unresolved claims pass through unchanged; they are never an error.
    pub fn canonical_target(&self, claimed: &str, language: Language) -> String {
        let trimmed = claimed.trim();
        match self.resolve(trimmed) {
            Some(id) => self
                .entry(id)
                .surface(language)
                .unwrap_or(trimmed)
                .to_string(),
            None => trimmed.to_string(),
        }
    }

    /// Every distinct surface form across all entries and languages, longest first
    pub fn all_surface_forms_longest_first(&self) -> Vec<&str> {
        let mut forms: Vec<&str> = Vec::new();
        for entry in &self.entries {
            for (_, form) in entry.surface_forms.iter() {
                if !forms.contains(&form.as_str()) {
                    forms.push(form);
                }
            }
        }
        forms.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()));
        forms
    }

    /// Rows for the description artifact: `(target surface, description)` per
    /// distinct detected term, insertion-ordered by first occurrence.
    pub fn description_rows(
        &self,
        terms: &[String],
        language: Language,
    ) -> Vec<(String, Option<String>)> {
        let mut rows: Vec<(String, Option<String>)> = Vec::new();
        for term in terms {
            let (surface, description) = match self.resolve(term) {
                Some(id) => {
                    let entry = self.entry(id);
                    (
                        entry.surface(language).unwrap_or(term.trim()).to_string(),
                        entry.description(language).map(String::from),
                    )
                }
                None => (term.trim().to_string(), None),
            };
            if !rows.iter().any(|(existing, _)| *existing == surface) {
                rows.push((surface, description));
            }
        }
        rows
    }
}

fn load_sheet(path: &Path) -> Result<Vec<SheetRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let field = |idx: usize| {
            record
                .get(idx)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
        };
        rows.push(SheetRow {
            surface: field(0),
            category: field(1),
            description: field(2),
        });
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(
        zh: Option<&str>,
        en: Option<&str>,
        ja: Option<&str>,
        de: Option<&str>,
    ) -> TermEntry {
        let mut e = TermEntry::default();
        let forms = [
            (Language::ChineseTraditional, zh),
            (Language::English, en),
            (Language::Japanese, ja),
            (Language::German, de),
        ];
        for (language, form) in forms {
            if let Some(form) = form {
                e.surface_forms.insert(language, form.to_string());
            }
        }
        e
    }

    #[test]
    fn test_language_map_keeps_canonical_order() {
        let mut map: LanguageMap<i32> = LanguageMap::default();
        map.insert(Language::German, 4);
        map.insert(Language::ChineseTraditional, 1);
        let collected: Vec<(Language, i32)> = map.iter().map(|(l, v)| (l, *v)).collect();
        assert_eq!(
            collected,
            vec![(Language::ChineseTraditional, 1), (Language::German, 4)]
        );
    }

    #[test]
    fn test_variants_longest_first() {
        let e = entry(Some("大查詢"), Some("BigQuery"), Some("ビッグクエリ"), Some("BigQuery"));
        let variants = e.variants_longest_first();
        // character length ordering, duplicates collapsed
        assert_eq!(variants, vec!["BigQuery", "ビッグクエリ", "大查詢"]);
    }

    #[test]
    fn test_replacement_falls_back_to_english() {
        let e = entry(None, Some("Kubernetes"), None, None);
        assert_eq!(e.replacement(Language::Japanese), Some("Kubernetes"));
        let no_en = entry(Some("邊緣運算"), None, None, None);
        assert_eq!(no_en.replacement(Language::Japanese), None);
    }

    #[test]
    fn test_resolve_is_case_insensitive() {
        let table = TermTable::from_entries(vec![entry(
            Some("容器"),
            Some("Docker"),
            None,
            None,
        )]);
        assert_eq!(table.resolve("docker"), Some(0));
        assert_eq!(table.resolve("  DOCKER "), Some(0));
        assert_eq!(table.resolve("容器"), Some(0));
        assert_eq!(table.resolve("podman"), None);
    }

    #[test]
    fn test_canonical_target_passes_unknown_terms_through() {
        let table = TermTable::from_entries(vec![entry(
            Some("容器"),
            Some("Docker"),
            Some("ドッカー"),
            None,
        )]);
        assert_eq!(
            table.canonical_target("docker", Language::Japanese),
            "ドッカー"
        );
        // target form absent: the claim itself comes back
        assert_eq!(table.canonical_target("容器", Language::German), "容器");
        assert_eq!(
            table.canonical_target("NotInTable", Language::Japanese),
            "NotInTable"
        );
    }

    #[test]
    fn test_entries_without_surfaces_are_dropped() {
        let table = TermTable::from_entries(vec![
            entry(None, None, None, None),
            entry(None, Some("Redis"), None, None),
        ]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.entry(0).canonical_key(), Some("Redis"));
    }

    #[test]
    fn test_description_rows_dedup_insertion_order() {
        let mut e = entry(Some("容器"), Some("Docker"), None, None);
        e.descriptions
            .insert(Language::English, "Container runtime".to_string());
        let table = TermTable::from_entries(vec![e]);

        let terms = vec![
            "Docker".to_string(),
            "Ghost".to_string(),
            "容器".to_string(),
        ];
        let rows = table.description_rows(&terms, Language::English);
        assert_eq!(
            rows,
            vec![
                ("Docker".to_string(), Some("Container runtime".to_string())),
                ("Ghost".to_string(), None),
            ]
        );
    }

    #[test]
    fn test_load_dir_aligns_rows_across_sheets() {
        let dir = tempfile::tempdir().unwrap();
        let write = |name: &str, body: &str| {
            std::fs::write(dir.path().join(name), body).unwrap();
        };
        write(
            "cmn-Hant-TW.csv",
            "proper_noun,type,description\n大查詢,產品,雲端資料倉儲\n,,\n",
        );
        write(
            "en-US.csv",
            "proper_noun,type,description\nBigQuery,Product,Cloud data warehouse\nEdgeTPU,Hardware,\n",
        );
        write("ja-JP.csv", "proper_noun,type,description\nビッグクエリ,,\n");
        write("de-DE.csv", "proper_noun,type,description\n,,\n,,\n");

        let table = TermTable::load_dir(dir.path()).unwrap();
        assert_eq!(table.len(), 2);

        let first = table.entry(0);
        assert_eq!(first.canonical_key(), Some("BigQuery"));
        assert_eq!(first.surface(Language::ChineseTraditional), Some("大查詢"));
        assert_eq!(first.surface(Language::Japanese), Some("ビッグクエリ"));
        assert_eq!(first.category.as_deref(), Some("Product"));
        assert_eq!(
            first.description(Language::ChineseTraditional),
            Some("雲端資料倉儲")
        );
        assert_eq!(first.description(Language::German), None);

        // second row exists only in the English sheet
        let second = table.entry(1);
        assert_eq!(second.canonical_key(), Some("EdgeTPU"));
        assert_eq!(second.surface(Language::ChineseTraditional), None);

        assert_eq!(table.resolve("ビッグクエリ"), Some(0));
        assert_eq!(table.resolve("edgetpu"), Some(1));
    }

    #[test]
    fn test_load_dir_missing_sheet_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("en-US.csv"), "proper_noun,type,description\n").unwrap();
        assert!(TermTable::load_dir(dir.path()).is_err());
    }
}
