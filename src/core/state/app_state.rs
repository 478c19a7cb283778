use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::error::{ResourceError, ResourceResult};
use crate::core::fs::{create_dir_safe, write_atomic, DeployMode};
use crate::core::instance::{Instance, InstanceManager};
use crate::core::resource::{IndexKey, ResourceEventSink, ResourceService, TypeRegistry};

const APP_DIR_NAME: &str = "LauncherResources";
const BOOTSTRAP_FILE: &str = "launcher_bootstrap.json";
const SETTINGS_FILE: &str = "resource_settings.json";

/// User tunables for the resource backend, stored as `resource_settings.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ResourceSettings {
    /// How stored resources are deployed into instances.
    pub deploy_mode: DeployMode,
    /// Upper bound on imports running at once in a batch.
    pub import_concurrency: usize,
}

impl Default for ResourceSettings {
    fn default() -> Self {
        Self {
            deploy_mode: DeployMode::Link,
            import_concurrency: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct BootstrapConfig {
    data_dir: PathBuf,
}

/// Everything the launcher shell needs: the resource service, the instance
/// manager and the settings they were opened with.
pub struct AppState {
    pub data_dir: PathBuf,
    pub resources: Arc<ResourceService>,
    pub instance_manager: InstanceManager,
    pub settings: ResourceSettings,
}

impl AppState {
    /// Open the default data directory (or the one the bootstrap file names).
    pub async fn load(sink: Arc<dyn ResourceEventSink>) -> ResourceResult<Self> {
        Self::load_from(default_data_dir(), sink).await
    }

    pub async fn load_from(data_dir: PathBuf, sink: Arc<dyn ResourceEventSink>) -> ResourceResult<Self> {
        create_dir_safe(&data_dir).await?;
        let settings = load_settings_from_disk(&data_dir).unwrap_or_default();

        let resources = ResourceService::open(
            data_dir.join("resources"),
            TypeRegistry::with_defaults(),
            sink,
            settings.clone(),
        )
        .await?;

        let instances_dir = data_dir.join("instances");
        create_dir_safe(&instances_dir).await?;
        let instance_manager = InstanceManager::new(instances_dir);

        info!("Data directory: {:?}", data_dir);
        Ok(Self {
            data_dir,
            resources: Arc::new(resources),
            instance_manager,
            settings,
        })
    }

    pub fn resources_dir(&self) -> PathBuf {
        self.data_dir.join("resources")
    }

    pub fn instances_dir(&self) -> PathBuf {
        self.data_dir.join("instances")
    }

    pub async fn save_settings(&self) -> ResourceResult<()> {
        let json = serde_json::to_vec_pretty(&self.settings)?;
        write_atomic(&self.data_dir.join(SETTINGS_FILE), &json).await
    }

    /// Deploy the resource behind `key` into the instance with `instance_id`,
    /// using the configured deploy mode.
    pub async fn deploy(&self, instance_id: &str, key: &IndexKey) -> ResourceResult<Instance> {
        let resource = self
            .resources
            .get_by_key(key)
            .await
            .ok_or_else(|| ResourceError::ResourceNotFound(format!("{:?}", key)))?;
        let mut instance = self.instance_manager.load(instance_id).await?;
        self.instance_manager
            .deploy(&mut instance, &resource, self.settings.deploy_mode)
            .await?;
        Ok(instance)
    }

    pub async fn undeploy(&self, instance_id: &str, hash: &str) -> ResourceResult<Instance> {
        let mut instance = self.instance_manager.load(instance_id).await?;
        self.instance_manager.undeploy(&mut instance, hash).await?;
        Ok(instance)
    }
}

fn load_settings_from_disk(data_dir: &Path) -> Option<ResourceSettings> {
    let path = data_dir.join(SETTINGS_FILE);
    let raw = std::fs::read_to_string(&path).ok()?;
    match serde_json::from_str(&raw) {
        Ok(settings) => Some(settings),
        Err(e) => {
            warn!("Ignoring unreadable {:?}: {}", path, e);
            None
        }
    }
}

fn default_base_dir() -> PathBuf {
    dirs::data_dir().unwrap_or_else(|| PathBuf::from("."))
}

fn default_data_dir() -> PathBuf {
    data_dir_in(&default_base_dir())
}

/// Data directory under `base`, honoring a bootstrap file that relocates it.
fn data_dir_in(base: &Path) -> PathBuf {
    let bootstrap_path = base.join(BOOTSTRAP_FILE);

    if let Ok(raw) = std::fs::read_to_string(&bootstrap_path) {
        if let Ok(cfg) = serde_json::from_str::<BootstrapConfig>(&raw) {
            return cfg.data_dir;
        }
        warn!("Ignoring malformed {:?}", bootstrap_path);
    }

    base.join(APP_DIR_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::instance::LoaderType;
    use crate::core::resource::test_support::fabric_jar;
    use crate::core::resource::{ImportOptions, NoopSink};

    #[test]
    fn bootstrap_file_relocates_the_data_dir() {
        let base = tempfile::tempdir().unwrap();
        assert_eq!(data_dir_in(base.path()), base.path().join(APP_DIR_NAME));

        let elsewhere = base.path().join("D/Games");
        let json = serde_json::to_string(&BootstrapConfig {
            data_dir: elsewhere.clone(),
        })
        .unwrap();
        std::fs::write(base.path().join(BOOTSTRAP_FILE), json).unwrap();
        assert_eq!(data_dir_in(base.path()), elsewhere);
    }

    #[test]
    fn partial_settings_fill_in_defaults() {
        let settings: ResourceSettings = serde_json::from_str(r#"{"deploy_mode":"copy"}"#).unwrap();
        assert_eq!(settings.deploy_mode, DeployMode::Copy);
        assert_eq!(settings.import_concurrency, 4);
    }

    #[tokio::test]
    async fn settings_persist_across_loads() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = AppState::load_from(dir.path().to_path_buf(), Arc::new(NoopSink))
            .await
            .unwrap();
        assert_eq!(state.settings, ResourceSettings::default());
        assert!(state.resources_dir().join("mods").is_dir());
        assert!(state.instances_dir().is_dir());

        state.settings.deploy_mode = DeployMode::Copy;
        state.save_settings().await.unwrap();

        let reloaded = AppState::load_from(dir.path().to_path_buf(), Arc::new(NoopSink))
            .await
            .unwrap();
        assert_eq!(reloaded.settings.deploy_mode, DeployMode::Copy);
        assert_eq!(reloaded.resources.settings().deploy_mode, DeployMode::Copy);
    }

    #[tokio::test]
    async fn deploy_by_key_goes_through_the_index() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::load_from(dir.path().join("data"), Arc::new(NoopSink))
            .await
            .unwrap();
        let instance = state
            .instance_manager
            .create(Instance::new(
                "Pack".into(),
                "1.20.1".into(),
                LoaderType::Fabric,
                None,
                &state.instances_dir(),
            ))
            .await
            .unwrap();

        let jar = dir.path().join("sodium.jar");
        std::fs::write(&jar, fabric_jar()).unwrap();
        let imported = state
            .resources
            .import_resource(ImportOptions::new(&jar))
            .await
            .unwrap();

        let key = IndexKey::Hash(imported.resource.hash.clone());
        let deployed = state.deploy(&instance.id, &key).await.unwrap();
        assert!(deployed.is_deployed(&imported.resource.hash));

        let undeployed = state
            .undeploy(&instance.id, &imported.resource.hash)
            .await
            .unwrap();
        assert!(undeployed.deployed.is_empty());

        assert!(matches!(
            state.deploy(&instance.id, &IndexKey::Hash("missing".into())).await,
            Err(ResourceError::ResourceNotFound(_))
        ));
    }
}
