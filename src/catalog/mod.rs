use std::collections::HashSet;
use std::fs;
use std::path::Path;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::util::title_case;

const EMBEDDED_CATALOG: &str = include_str!("apps.json");

#[derive(Debug, Clone, Deserialize)]
struct RawApp {
    id: String,
    #[serde(default)]
    name: Option<String>,
    url: String,
}

#[derive(Debug, Clone, Deserialize)]
struct RawCatalog {
    store_name: String,
    #[serde(default)]
    publisher: String,
    apps: Vec<RawApp>,
}

/// One web application the store offers as a desktop download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppDescriptor {
    pub id: String,
    pub name: String,
    pub url: String,
}

impl AppDescriptor {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        let id = id.into();
        let name = title_case(&id);
        Self {
            id,
            name,
            url: url.into(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// Store-wide wording substituted into every generated file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreInfo {
    pub store_name: String,
    pub publisher: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Catalog {
    pub store: StoreInfo,
    pub apps: Vec<AppDescriptor>,
}

impl Catalog {
    pub fn new(store: StoreInfo, apps: Vec<AppDescriptor>) -> Result<Self, String> {
        let catalog = Self { store, apps };
        catalog.validate()?;
        Ok(catalog)
    }

    /// The app table compiled into the binary.
    pub fn embedded() -> Result<Self, String> {
        Self::from_json(EMBEDDED_CATALOG).map_err(|e| format!("embedded catalog is invalid: {e}"))
    }

    pub fn from_json(text: &str) -> Result<Self, String> {
        let raw: RawCatalog =
            serde_json::from_str(text).map_err(|e| format!("catalog parse error: {e}"))?;
        let apps = raw
            .apps
            .into_iter()
            .map(|app| {
                let name = app
                    .name
                    .as_deref()
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(str::to_owned);
                let descriptor = AppDescriptor::new(app.id, app.url);
                match name {
                    Some(name) => descriptor.with_name(name),
                    None => descriptor,
                }
            })
            .collect();
        Self::new(
            StoreInfo {
                store_name: raw.store_name,
                publisher: raw.publisher,
            },
            apps,
        )
    }

    pub fn load(path: &Path) -> Result<Self, String> {
        info!("catalog: loading {}", path.display());
        let contents = fs::read_to_string(path)
            .map_err(|e| format!("failed to read catalog {}: {e}", path.display()))?;
        Self::from_json(&contents)
    }

    /// Load `path` when given, otherwise the embedded table.
    pub fn load_or_embedded(path: Option<&Path>) -> Result<Self, String> {
        match path {
            Some(path) => Self::load(path),
            None => {
                debug!("catalog: using embedded app table");
                Self::embedded()
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&AppDescriptor> {
        self.apps.iter().find(|app| app.id == id)
    }

    /// Narrow the catalog to a single app, keeping the store wording.
    pub fn only(&self, id: &str) -> Result<Self, String> {
        let app = self
            .get(id)
            .ok_or_else(|| format!("unknown app id '{id}'"))?
            .clone();
        Ok(Self {
            store: self.store.clone(),
            apps: vec![app],
        })
    }

    fn validate(&self) -> Result<(), String> {
        if self.apps.is_empty() {
            return Err("catalog contains no apps".into());
        }
        let mut seen = HashSet::new();
        for app in &self.apps {
            validate_id(&app.id)?;
            if !seen.insert(app.id.as_str()) {
                return Err(format!("duplicate app id '{}'", app.id));
            }
        }
        Ok(())
    }
}

/// Ids become file-name components, so they must not carry separators.
pub fn validate_id(id: &str) -> Result<(), String> {
    if id.is_empty() {
        return Err("app id must not be empty".into());
    }
    if id == "." || id == ".." {
        return Err(format!("app id '{id}' is not a valid file name"));
    }
    if let Some(bad) = id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        return Err(format!("app id '{id}' contains unsupported character {bad:?}"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_catalog_loads() {
        let catalog = Catalog::embedded().unwrap();
        assert_eq!(catalog.apps.len(), 31);
        assert_eq!(catalog.store.store_name, "Cosmic App Store");
        let akan = catalog.get("akan-wise-saying").unwrap();
        assert_eq!(akan.name, "Akan Wise Saying");
        assert_eq!(akan.url, "https://onetwo346.github.io/wise-saying");
        assert_eq!(catalog.get("glow-radio").unwrap().name, "Glow Radio");
    }

    #[test]
    fn derives_names_when_missing_or_blank() {
        let catalog = Catalog::from_json(
            r#"{"store_name":"S","apps":[
                {"id":"demo-app","url":"https://example.com/demo"},
                {"id":"other","name":"  ","url":"https://example.com/other"},
                {"id":"named","name":"Custom Name","url":"https://example.com/n"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(catalog.apps[0].name, "Demo App");
        assert_eq!(catalog.apps[1].name, "Other");
        assert_eq!(catalog.apps[2].name, "Custom Name");
        assert_eq!(catalog.store.publisher, "");
    }

    #[test]
    fn rejects_duplicate_and_unsafe_ids() {
        let dup = Catalog::from_json(
            r#"{"store_name":"S","apps":[
                {"id":"a","url":"u"},{"id":"a","url":"v"}]}"#,
        );
        assert!(dup.unwrap_err().contains("duplicate"));

        let unsafe_id =
            Catalog::from_json(r#"{"store_name":"S","apps":[{"id":"../evil","url":"u"}]}"#);
        assert!(unsafe_id.is_err());

        let empty = Catalog::from_json(r#"{"store_name":"S","apps":[]}"#);
        assert!(empty.unwrap_err().contains("no apps"));
    }

    #[test]
    fn validates_ids() {
        assert!(validate_id("demo-app").is_ok());
        assert!(validate_id("v1.2_beta").is_ok());
        assert!(validate_id("").is_err());
        assert!(validate_id("..").is_err());
        assert!(validate_id("a/b").is_err());
        assert!(validate_id("a b").is_err());
    }

    #[test]
    fn narrows_to_one_app() {
        let catalog = Catalog::embedded().unwrap();
        let one = catalog.only("xowars").unwrap();
        assert_eq!(one.apps.len(), 1);
        assert_eq!(one.store, catalog.store);
        assert!(catalog.only("missing").is_err());
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("apps.json");
        fs::write(
            &path,
            r#"{"store_name":"Local","publisher":"Me","apps":[{"id":"demo-app","url":"https://example.com/demo"}]}"#,
        )
        .unwrap();
        let catalog = Catalog::load_or_embedded(Some(&path)).unwrap();
        assert_eq!(catalog.store.store_name, "Local");
        assert_eq!(catalog.apps[0].url, "https://example.com/demo");
        assert!(Catalog::load(&dir.path().join("missing.json")).is_err());
    }
}
