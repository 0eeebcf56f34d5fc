//! File-per-record artifacts shared between the pipeline stages.
//!
//! Layout:
//!   `responses/{id}.html` — raw detail page, written verbatim
//!   `json/{id}.json`      — parsed [`DetailRecord`]
//!   `ids.json`            — id set produced by the listing stage

use crate::config::StorageConfig;
use crate::models::{DetailRecord, Identifier};
use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct ArtifactStore {
    responses_dir: PathBuf,
    json_dir: PathBuf,
    ids_path: PathBuf,
}

impl ArtifactStore {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            responses_dir: config.responses_dir.clone(),
            json_dir: config.json_dir.clone(),
            ids_path: config.ids_path.clone(),
        }
    }

    /// Store rooted in one directory, used by tests and ad-hoc runs.
    pub fn rooted_at(root: &Path) -> Self {
        Self {
            responses_dir: root.join("responses"),
            json_dir: root.join("json"),
            ids_path: root.join("ids.json"),
        }
    }

    pub fn html_path(&self, id: &Identifier) -> PathBuf {
        self.responses_dir.join(format!("{}.html", id))
    }

    pub fn json_path(&self, id: &Identifier) -> PathBuf {
        self.json_dir.join(format!("{}.json", id))
    }

    // ── Id set ────────────────────────────────────────────────────────────────

    pub fn save_ids(&self, ids: &BTreeSet<Identifier>) -> Result<()> {
        ensure_parent(&self.ids_path)?;
        let json = serde_json::to_string_pretty(ids)?;
        fs::write(&self.ids_path, json)
            .with_context(|| format!("Could not write {:?}", self.ids_path))?;
        debug!("Wrote {} ids to {:?}", ids.len(), self.ids_path);
        Ok(())
    }

    pub fn load_ids(&self) -> Result<BTreeSet<Identifier>> {
        let raw = fs::read_to_string(&self.ids_path)
            .with_context(|| format!("Could not read {:?} (run `list` first)", self.ids_path))?;
        serde_json::from_str(&raw).with_context(|| format!("Bad id list in {:?}", self.ids_path))
    }

    pub fn has_ids(&self) -> bool {
        self.ids_path.is_file()
    }

    // ── Raw pages ─────────────────────────────────────────────────────────────

    pub fn save_html(&self, id: &Identifier, html: &str) -> Result<()> {
        fs::create_dir_all(&self.responses_dir)
            .with_context(|| format!("Could not create dir {:?}", self.responses_dir))?;
        let path = self.html_path(id);
        fs::write(&path, html).with_context(|| format!("Could not write {:?}", path))
    }

    pub fn read_html(&self, id: &Identifier) -> Result<String> {
        let path = self.html_path(id);
        fs::read_to_string(&path).with_context(|| format!("Could not read {:?}", path))
    }

    pub fn html_ids(&self) -> Result<Vec<Identifier>> {
        ids_with_extension(&self.responses_dir, "html")
    }

    // ── Parsed records ────────────────────────────────────────────────────────

    pub fn save_record(&self, record: &DetailRecord) -> Result<()> {
        fs::create_dir_all(&self.json_dir)
            .with_context(|| format!("Could not create dir {:?}", self.json_dir))?;
        let path = self.json_path(&record.id);
        let json = serde_json::to_string(record)?;
        fs::write(&path, json).with_context(|| format!("Could not write {:?}", path))
    }

    /// Read a parsed record. Files written without an `id` take it from the
    /// file name.
    pub fn read_record(&self, id: &Identifier) -> Result<DetailRecord> {
        let path = self.json_path(id);
        let raw = fs::read_to_string(&path).with_context(|| format!("Could not read {:?}", path))?;
        let mut record: DetailRecord =
            serde_json::from_str(&raw).with_context(|| format!("Bad record in {:?}", path))?;
        if record.id.is_empty() {
            record.id = id.clone();
        }
        Ok(record)
    }

    pub fn json_ids(&self) -> Result<Vec<Identifier>> {
        ids_with_extension(&self.json_dir, "json")
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("Could not create dir {:?}", parent))?;
    }
    Ok(())
}

/// Ids of `*.{ext}` files in `dir`, sorted. A missing directory is empty.
fn ids_with_extension(dir: &Path, ext: &str) -> Result<Vec<Identifier>> {
    if !dir.exists() {
        return Ok(vec![]);
    }

    let mut ids = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("Could not list {:?}", dir))? {
        let path = entry?.path();
        if !path.is_file() || path.extension().map(|e| e != ext).unwrap_or(true) {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            ids.push(Identifier::new(stem));
        }
    }
    ids.sort();
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    #[test]
    fn ids_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::rooted_at(dir.path());
        assert!(!store.has_ids());

        let ids: BTreeSet<Identifier> = ["7", "3", "7"].into_iter().map(Identifier::from).collect();
        assert_ok!(store.save_ids(&ids));

        let back = store.load_ids().unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back, ids);
    }

    #[test]
    fn missing_ids_file_mentions_list_command() {
        let dir = tempfile::tempdir().unwrap();
        let err = ArtifactStore::rooted_at(dir.path()).load_ids().unwrap_err();
        assert!(format!("{:#}", err).contains("run `list` first"));
    }

    #[test]
    fn html_written_verbatim_and_listed() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::rooted_at(dir.path());
        let id = Identifier::new("42");

        assert_ok!(store.save_html(&id, "<h3>Nome</h3>\n"));
        fs::write(dir.path().join("responses").join("notes.txt"), "x").unwrap();

        assert_eq!(store.read_html(&id).unwrap(), "<h3>Nome</h3>\n");
        assert_eq!(store.html_ids().unwrap(), vec![id]);
    }

    #[test]
    fn records_saved_as_json() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::rooted_at(dir.path());
        let record = DetailRecord::unpopulated(Identifier::new("9"));

        assert_ok!(store.save_record(&record));
        assert_eq!(store.json_ids().unwrap(), vec![Identifier::new("9")]);
        assert_eq!(store.read_record(&Identifier::new("9")).unwrap(), record);
    }

    #[test]
    fn legacy_artifacts_take_id_from_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::rooted_at(dir.path());
        let json_dir = dir.path().join("json");
        fs::create_dir_all(&json_dir).unwrap();

        fs::write(
            json_dir.join("77.json"),
            r#"{"name": "Calçados Sul", "address": "Rua D, 4", "district": "Centro",
                "city": "Novo Hamburgo", "state": "RS", "cep": "93000-000",
                "phones": [{"type": "tel", "number": "51 3000-0000"}],
                "emails": ["sul@calcados.com.br"], "site": null, "contact_name": "Rui",
                "export_price_range": "até US$ 1 milhão", "activity": "Calçados",
                "countries": ["Chile"], "products": [{"code": "6403", "name": "Calçados"}]}"#,
        )
        .unwrap();
        fs::write(
            json_dir.join("78.json"),
            r#"{"name": null, "address": null, "district": null, "city": null,
                "state": null, "cep": null, "phones": null, "emails": null, "site": null,
                "contact_name": null, "export_price_range": null, "activity": null,
                "countries": [], "products": []}"#,
        )
        .unwrap();

        let full = store.read_record(&Identifier::new("77")).unwrap();
        assert_eq!(full.id, Identifier::new("77"));
        assert_eq!(full.city, "Novo Hamburgo");
        assert_eq!(full.phones[0].kind, "tel");

        let empty = store.read_record(&Identifier::new("78")).unwrap();
        assert_eq!(empty.id, Identifier::new("78"));
        assert!(empty.is_unpopulated());
    }

    #[test]
    fn missing_dirs_list_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::rooted_at(&dir.path().join("absent"));
        assert!(store.html_ids().unwrap().is_empty());
        assert!(store.json_ids().unwrap().is_empty());
    }
}
