//! Model Binding Registry
//!
//! Local list of model bindings, persisted in the key-value store under
//! namespace `models`.

use std::sync::{Arc, RwLock};

use tracing::info;

use crate::models::model_binding::{ModelBinding, ModelBindingUpdate};
use crate::storage::kv_store::{load_json, save_json, KeyValueStore};
use crate::utils::error::{AppError, AppResult};

const NAMESPACE: &str = "models";
const LIST_KEY: &str = "list";

/// CRUD over model bindings
pub struct ModelRegistry {
    store: Arc<dyn KeyValueStore>,
    models: RwLock<Vec<ModelBinding>>,
}

impl ModelRegistry {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            models: RwLock::new(Vec::new()),
        }
    }

    /// Replace the in-memory list with the persisted one
    pub fn load(&self) -> AppResult<usize> {
        let models: Vec<ModelBinding> = load_json(self.store.as_ref(), NAMESPACE, LIST_KEY)?.unwrap_or_default();
        let count = models.len();
        *self.write()? = models;
        Ok(count)
    }

    pub fn list(&self) -> Vec<ModelBinding> {
        self.models.read().map(|m| m.clone()).unwrap_or_default()
    }

    pub fn get(&self, id: &str) -> Option<ModelBinding> {
        self.models
            .read()
            .ok()
            .and_then(|m| m.iter().find(|b| b.id == id).cloned())
    }

    /// Look up a binding usable for a run
    pub fn resolve(&self, id: &str) -> AppResult<ModelBinding> {
        let binding = self
            .get(id)
            .ok_or_else(|| AppError::ModelNotFound(id.to_string()))?;
        if !binding.enabled {
            return Err(AppError::validation(format!(
                "Model {} ({}) is disabled",
                binding.name, binding.id
            )));
        }
        Ok(binding)
    }

    /// Add a binding under a fresh id
    pub fn add(&self, mut binding: ModelBinding) -> AppResult<ModelBinding> {
        binding.validate().map_err(AppError::validation)?;
        binding.id = uuid::Uuid::new_v4().to_string();

        let mut models = self.write()?;
        let mut next = models.clone();
        next.push(binding.clone());
        self.persist(&next)?;
        *models = next;

        info!(model_id = %binding.id, name = %binding.name, "model binding added");
        Ok(binding)
    }

    pub fn update(&self, id: &str, update: ModelBindingUpdate) -> AppResult<ModelBinding> {
        let mut models = self.write()?;
        let mut next = models.clone();
        let binding = next
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| AppError::ModelNotFound(id.to_string()))?;
        update.apply_to(binding);
        binding.validate().map_err(AppError::validation)?;
        let updated = binding.clone();

        self.persist(&next)?;
        *models = next;
        Ok(updated)
    }

    pub fn delete(&self, id: &str) -> AppResult<()> {
        let mut models = self.write()?;
        if !models.iter().any(|b| b.id == id) {
            return Err(AppError::ModelNotFound(id.to_string()));
        }
        let next: Vec<_> = models.iter().filter(|b| b.id != id).cloned().collect();
        self.persist(&next)?;
        *models = next;
        info!(model_id = %id, "model binding deleted");
        Ok(())
    }

    fn persist(&self, models: &[ModelBinding]) -> AppResult<()> {
        save_json(self.store.as_ref(), NAMESPACE, LIST_KEY, &models)
    }

    fn write(&self) -> AppResult<std::sync::RwLockWriteGuard<'_, Vec<ModelBinding>>> {
        self.models
            .write()
            .map_err(|_| AppError::internal("model registry lock poisoned"))
    }
}
