use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::fs::file_id;
use crate::core::instance::{Instance, LoaderType};
use crate::core::resource::service::file_uri;
use crate::core::resource::{
    ImportOptions, IndexKey, Resource, ResourceDomain, ResourceQuery, TypeHint,
};
use crate::core::state::AppState;

// Commands return `Result<T, String>` so the shell can print or forward the
// error message as is.

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ImportReport {
    Imported {
        resource: Arc<Resource>,
        was_newly_imported: bool,
    },
    Failed {
        path: PathBuf,
        error: String,
    },
}

#[derive(Debug, Deserialize)]
pub struct CreateInstancePayload {
    pub name: String,
    pub minecraft_version: String,
    pub loader_type: LoaderType,
    pub loader_version: Option<String>,
}

/// Interpret a user supplied reference: a 40 digit SHA-1, a URI, or a local
/// path (matched through its `file://` source URI).
pub fn parse_key(raw: &str) -> IndexKey {
    let raw = raw.trim();
    if raw.len() == 40 && raw.chars().all(|c| c.is_ascii_hexdigit()) {
        IndexKey::Hash(raw.to_ascii_lowercase())
    } else if raw.contains("://") {
        IndexKey::Uri(raw.to_string())
    } else {
        IndexKey::Uri(file_uri(Path::new(raw)))
    }
}

fn parse_hint(hint: Option<&str>) -> Result<TypeHint, String> {
    hint.map(str::parse::<TypeHint>)
        .transpose()
        .map(Option::unwrap_or_default)
        .map_err(|e| e.to_string())
}

pub async fn import_files(
    state: &AppState,
    paths: Vec<PathBuf>,
    hint: Option<&str>,
) -> Result<Vec<ImportReport>, String> {
    let hint = parse_hint(hint)?;
    let mut files = Vec::new();
    let mut folders = Vec::new();
    for path in paths {
        if path.is_dir() {
            folders.push(path);
        } else {
            files.push(path);
        }
    }

    let options: Vec<ImportOptions> = files
        .iter()
        .map(|p| ImportOptions::new(p).with_type_hint(hint))
        .collect();
    let mut reports: Vec<ImportReport> = files
        .into_iter()
        .zip(state.resources.import_resources(options).await)
        .map(|(path, result)| report(path, result))
        .collect();

    for folder in folders {
        let result = state
            .resources
            .import_directory(&folder, Vec::new(), hint)
            .await;
        reports.push(report(folder, result));
    }

    let failed = reports
        .iter()
        .filter(|r| matches!(r, ImportReport::Failed { .. }))
        .count();
    info!("Import finished: {} ok, {} failed", reports.len() - failed, failed);
    Ok(reports)
}

fn report(
    path: PathBuf,
    result: crate::core::error::ResourceResult<crate::core::resource::ImportOutcome>,
) -> ImportReport {
    match result {
        Ok(outcome) => ImportReport::Imported {
            resource: outcome.resource,
            was_newly_imported: outcome.was_newly_imported,
        },
        Err(e) => {
            warn!("Import of {:?} failed: {}", path, e);
            ImportReport::Failed {
                path,
                error: e.to_string(),
            }
        }
    }
}

pub async fn import_url(
    state: &AppState,
    url: &str,
    sha1: Option<&str>,
    hint: Option<&str>,
) -> Result<ImportReport, String> {
    let hint = parse_hint(hint)?;
    let result = state.resources.import_from_url(url, sha1, hint, None).await;
    Ok(report(PathBuf::from(url), result))
}

pub async fn list_resources(
    state: &AppState,
    domain: Option<&str>,
) -> Result<Vec<Arc<Resource>>, String> {
    let domain = domain
        .map(str::parse::<ResourceDomain>)
        .transpose()
        .map_err(|e| e.to_string())?;
    Ok(state.resources.list(domain).await)
}

/// Look a resource up by hash, URI, or a local file it was imported from.
pub async fn find_resource(
    state: &AppState,
    hash: Option<String>,
    uri: Option<String>,
    file: Option<PathBuf>,
) -> Result<Option<Arc<Resource>>, String> {
    let file = match file {
        Some(path) => {
            let metadata = tokio::fs::metadata(&path)
                .await
                .map_err(|e| format!("Cannot stat {:?}: {}", path, e))?;
            file_id(&metadata)
        }
        None => None,
    };
    Ok(state.resources.query(&ResourceQuery { hash, uri, file }).await)
}

pub async fn remove_resource(state: &AppState, key: &str) -> Result<Option<Arc<Resource>>, String> {
    state
        .resources
        .remove_resource(&parse_key(key))
        .await
        .map_err(|e| e.to_string())
}

pub async fn rename_resource(state: &AppState, key: &str, name: &str) -> Result<Arc<Resource>, String> {
    state
        .resources
        .rename_resource(&parse_key(key), name)
        .await
        .map_err(|e| e.to_string())
}

pub async fn refresh_resource(state: &AppState, key: &str) -> Result<Option<Arc<Resource>>, String> {
    state
        .resources
        .refresh_resource(&parse_key(key))
        .await
        .map_err(|e| e.to_string())
}

pub async fn export_resources(
    state: &AppState,
    keys: &[String],
    target_dir: &Path,
) -> Result<Vec<PathBuf>, String> {
    let keys: Vec<IndexKey> = keys.iter().map(|k| parse_key(k)).collect();
    state
        .resources
        .export_resource(&keys, target_dir)
        .await
        .map_err(|e| e.to_string())
}

pub async fn create_instance(
    state: &AppState,
    payload: CreateInstancePayload,
) -> Result<Instance, String> {
    let instance = Instance::new(
        payload.name,
        payload.minecraft_version,
        payload.loader_type,
        payload.loader_version,
        &state.instances_dir(),
    );
    state
        .instance_manager
        .create(instance)
        .await
        .map_err(|e| e.to_string())
}

pub async fn list_instances(state: &AppState) -> Result<Vec<Instance>, String> {
    state
        .instance_manager
        .list()
        .await
        .map_err(|e| e.to_string())
}

pub async fn delete_instance(state: &AppState, id: &str) -> Result<(), String> {
    state
        .instance_manager
        .delete(id)
        .await
        .map_err(|e| e.to_string())
}

pub async fn deploy_resource(state: &AppState, instance_id: &str, key: &str) -> Result<Instance, String> {
    state
        .deploy(instance_id, &parse_key(key))
        .await
        .map_err(|e| e.to_string())
}

pub async fn undeploy_resource(state: &AppState, instance_id: &str, key: &str) -> Result<Instance, String> {
    let hash = match parse_key(key) {
        IndexKey::Hash(hash) => hash,
        other => state
            .resources
            .get_by_key(&other)
            .await
            .map(|r| r.hash.clone())
            .ok_or_else(|| format!("Resource not found: {}", key))?,
    };
    state
        .undeploy(instance_id, &hash)
        .await
        .map_err(|e| e.to_string())
}

pub async fn list_deployed(state: &AppState, instance_id: &str) -> Result<Vec<Arc<Resource>>, String> {
    let mut instance = state
        .instance_manager
        .load(instance_id)
        .await
        .map_err(|e| e.to_string())?;
    state
        .instance_manager
        .deployed(&mut instance, &state.resources)
        .await
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::resource::test_support::fabric_jar;
    use crate::core::resource::NoopSink;

    #[test]
    fn keys_are_recognized_by_shape() {
        let sha = "a94a8fe5ccb19ba61c4c0873d391e987982fbbd3";
        assert_eq!(parse_key(sha), IndexKey::Hash(sha.into()));
        assert_eq!(
            parse_key("curseforge://id/1/2"),
            IndexKey::Uri("curseforge://id/1/2".into())
        );
        assert!(matches!(parse_key("/tmp/x.jar"), IndexKey::Uri(u) if u.starts_with("file://")));
    }

    #[tokio::test]
    async fn import_reports_failures_per_path() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::load_from(dir.path().join("data"), Arc::new(NoopSink))
            .await
            .unwrap();
        let jar = dir.path().join("sodium.jar");
        std::fs::write(&jar, fabric_jar()).unwrap();

        let reports = import_files(
            &state,
            vec![jar.clone(), dir.path().join("missing.jar")],
            None,
        )
        .await
        .unwrap();
        assert!(matches!(reports[0], ImportReport::Imported { was_newly_imported: true, .. }));
        assert!(matches!(reports[1], ImportReport::Failed { .. }));

        let found = list_resources(&state, Some("mods")).await.unwrap();
        assert_eq!(found.len(), 1);
        assert!(import_files(&state, vec![jar], Some("plugins")).await.is_err());

        let by_path = rename_resource(&state, dir.path().join("sodium.jar").to_str().unwrap(), "S")
            .await
            .unwrap();
        assert_eq!(by_path.name, "S");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn find_by_source_file() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::load_from(dir.path().join("data"), Arc::new(NoopSink))
            .await
            .unwrap();
        let jar = dir.path().join("sodium.jar");
        std::fs::write(&jar, fabric_jar()).unwrap();
        import_files(&state, vec![jar.clone()], None).await.unwrap();

        let found = find_resource(&state, None, None, Some(jar)).await.unwrap();
        assert_eq!(found.unwrap().name, "Sodium-0.5.8");

        let other = dir.path().join("other.jar");
        std::fs::write(&other, b"x").unwrap();
        assert!(find_resource(&state, None, None, Some(other)).await.unwrap().is_none());
        assert!(find_resource(&state, None, None, Some(dir.path().join("gone")))
            .await
            .is_err());
    }
}
