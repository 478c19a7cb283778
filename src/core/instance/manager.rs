use std::path::PathBuf;

use tracing::{info, warn};

use super::model::Instance;
use crate::core::error::{ResourceError, ResourceResult};
use crate::core::fs::{create_dir_safe, write_atomic};

/// Manages the lifecycle of instances on disk.
pub struct InstanceManager {
    /// Root directory where all instances live.
    instances_dir: PathBuf,
}

impl InstanceManager {
    pub fn new(instances_dir: PathBuf) -> Self {
        Self { instances_dir }
    }

    pub fn instances_dir(&self) -> &PathBuf {
        &self.instances_dir
    }

    /// Create a new instance on disk with its deploy folders.
    ///
    /// Creates:
    /// - `<instance>/mods/`
    /// - `<instance>/resourcepacks/`
    /// - `<instance>/instance.json`
    pub async fn create(&self, mut instance: Instance) -> ResourceResult<Instance> {
        instance.path = self.instances_dir.join(&instance.id);

        if instance.path.exists() {
            return Err(ResourceError::InstanceAlreadyExists(instance.id.clone()));
        }

        let (mods, packs) = (instance.mods_dir(), instance.resourcepacks_dir());
        tokio::try_join!(create_dir_safe(&mods), create_dir_safe(&packs))?;

        self.verify_structure(&instance).await?;
        self.save(&instance).await?;

        info!("Created instance '{}' ({})", instance.name, instance.id);
        Ok(instance)
    }

    pub async fn verify_structure(&self, instance: &Instance) -> ResourceResult<()> {
        for path in [instance.mods_dir(), instance.resourcepacks_dir()] {
            let metadata = tokio::fs::metadata(&path)
                .await
                .map_err(|e| ResourceError::io(&path, e))?;
            if !metadata.is_dir() {
                return Err(ResourceError::Other(format!(
                    "Invalid instance layout: {:?} is not a directory",
                    path
                )));
            }
        }

        Ok(())
    }

    /// Save instance metadata to disk.
    pub async fn save(&self, instance: &Instance) -> ResourceResult<()> {
        let json = serde_json::to_vec_pretty(instance)?;
        write_atomic(&instance.config_path(), &json).await
    }

    /// Load a single instance by ID.
    pub async fn load(&self, id: &str) -> ResourceResult<Instance> {
        let config_path = self.instances_dir.join(id).join("instance.json");
        if !config_path.exists() {
            return Err(ResourceError::InstanceNotFound(id.to_string()));
        }

        let json = tokio::fs::read_to_string(&config_path)
            .await
            .map_err(|e| ResourceError::io(&config_path, e))?;

        let instance: Instance = serde_json::from_str(&json)?;
        Ok(instance)
    }

    /// List all instances. Unreadable ones are logged and skipped.
    pub async fn list(&self) -> ResourceResult<Vec<Instance>> {
        let mut instances = Vec::new();

        if !self.instances_dir.exists() {
            return Ok(instances);
        }

        let mut entries = tokio::fs::read_dir(&self.instances_dir)
            .await
            .map_err(|e| ResourceError::io(&self.instances_dir, e))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ResourceError::io(&self.instances_dir, e))?
        {
            let path = entry.path();
            if path.is_dir() {
                let config_path = path.join("instance.json");
                if config_path.exists() {
                    match tokio::fs::read_to_string(&config_path).await {
                        Ok(json) => match serde_json::from_str::<Instance>(&json) {
                            Ok(inst) => instances.push(inst),
                            Err(e) => {
                                warn!("Corrupt instance.json at {:?}: {}", config_path, e);
                            }
                        },
                        Err(e) => {
                            warn!("Cannot read {:?}: {}", config_path, e);
                        }
                    }
                }
            }
        }

        instances.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(instances)
    }

    /// Delete an instance from disk.
    pub async fn delete(&self, id: &str) -> ResourceResult<()> {
        let instance_dir = self.instances_dir.join(id);
        if !instance_dir.exists() {
            return Err(ResourceError::InstanceNotFound(id.to_string()));
        }

        tokio::fs::remove_dir_all(&instance_dir)
            .await
            .map_err(|e| ResourceError::io(&instance_dir, e))?;

        info!("Deleted instance {}", id);
        Ok(())
    }
}
