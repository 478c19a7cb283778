use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::manager::InstanceManager;
use super::model::Instance;
use crate::core::error::{ResourceError, ResourceResult};
use crate::core::fs::{link_or_copy, remove_path, DeployMode};
use crate::core::resource::{IndexKey, Resource, ResourceService};

// ── Deployment ──────────────────────────────────────────
// An instance's deployed set lives in `instance.json` and is saved on every
// change. Entries whose resource left the index count as undeployed and are
// pruned the next time the set is read.

impl InstanceManager {
    /// Materialize `resource` into the instance. Deploying twice is a no-op.
    ///
    /// Returns the path of the deployed file.
    pub async fn deploy(
        &self,
        instance: &mut Instance,
        resource: &Resource,
        mode: DeployMode,
    ) -> ResourceResult<PathBuf> {
        let dir = instance
            .domain_dir(resource.domain)
            .ok_or(ResourceError::NotDeployable(resource.domain))?;

        if let Some(relative) = instance.deployed.get(&resource.hash) {
            let target = instance.path.join(relative);
            if target.exists() {
                debug!("{} already deployed to {}", resource.hash, instance.id);
                return Ok(target);
            }
        }

        if !instance.loader.accepts(resource.resource_type) {
            warn!(
                "Deploying {} mod '{}' into {} instance '{}'",
                resource.resource_type, resource.name, instance.loader, instance.name
            );
        }

        let mut target = dir.join(&resource.file_name);
        if target.exists() {
            target = dir.join(format!(
                "{}-{}{}",
                resource.storage_stem(),
                &resource.hash[..resource.hash.len().min(8)],
                resource.ext
            ));
        }
        if !target.exists() {
            let used = link_or_copy(&resource.path, &target, mode).await?;
            debug!("Deployed {:?} -> {:?} ({:?})", resource.path, target, used);
        }

        let relative = target
            .strip_prefix(&instance.path)
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|_| target.clone());
        instance.deployed.insert(resource.hash.clone(), relative);
        self.save(instance).await?;

        info!("Deployed '{}' to instance '{}'", resource.name, instance.name);
        Ok(target)
    }

    /// Remove a deployed resource from the instance. Undeploying something
    /// that is not deployed is a no-op; returns whether anything changed.
    pub async fn undeploy(&self, instance: &mut Instance, hash: &str) -> ResourceResult<bool> {
        let Some(relative) = instance.deployed.remove(hash) else {
            return Ok(false);
        };

        remove_path(&instance.path.join(&relative)).await?;
        self.save(instance).await?;

        info!("Undeployed {} from instance '{}'", hash, instance.name);
        Ok(true)
    }

    /// Resources currently deployed into `instance`.
    ///
    /// Entries whose resource is no longer indexed are dropped, their files
    /// removed, and the instance saved.
    pub async fn deployed(
        &self,
        instance: &mut Instance,
        resources: &ResourceService,
    ) -> ResourceResult<Vec<Arc<Resource>>> {
        let mut live = Vec::with_capacity(instance.deployed.len());
        let mut stale = Vec::new();

        for hash in instance.deployed.keys() {
            match resources.get_by_key(&IndexKey::Hash(hash.clone())).await {
                Some(resource) => live.push(resource),
                None => stale.push(hash.clone()),
            }
        }

        if !stale.is_empty() {
            for hash in &stale {
                if let Some(relative) = instance.deployed.remove(hash) {
                    remove_path(&instance.path.join(relative)).await?;
                }
            }
            self.save(instance).await?;
            info!(
                "Pruned {} stale deployments from instance '{}'",
                stale.len(),
                instance.name
            );
        }

        Ok(live)
    }
}
