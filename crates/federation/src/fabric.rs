//! The fabric: registers `FederatedProtocol` backends and routes requests,
//! broadcasts and translations across them.

use std::collections::HashMap;
use std::sync::Arc;

use core::AppError;
use dashmap::DashMap;
use parking_lot::RwLock;

use crate::protocol::{FederatedProtocol, FederatedRequest, FederatedResponse};
use crate::translator::{self, TranslationRule};

pub struct ProtocolFabric {
    protocols: DashMap<String, Arc<dyn FederatedProtocol>>,
    order: RwLock<Vec<String>>,
    translators: DashMap<(String, String), Vec<TranslationRule>>,
}

impl Default for ProtocolFabric {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtocolFabric {
    pub fn new() -> Self {
        Self { protocols: DashMap::new(), order: RwLock::new(Vec::new()), translators: DashMap::new() }
    }

    pub fn register(&self, protocol: Arc<dyn FederatedProtocol>) -> Result<(), AppError> {
        let name = protocol.name().to_string();
        if self.protocols.contains_key(&name) {
            return Err(AppError::DuplicateProtocol(name));
        }
        self.protocols.insert(name.clone(), protocol);
        self.order.write().push(name);
        Ok(())
    }

    pub fn capabilities(&self, name: &str) -> Option<HashMap<String, String>> {
        self.protocols.get(name).map(|p| p.capabilities())
    }

    pub async fn send_federated_request(&self, req: FederatedRequest) -> Result<FederatedResponse, AppError> {
        let protocol = self
            .protocols
            .get(&req.target)
            .map(|p| p.clone())
            .ok_or_else(|| AppError::ProtocolNotRegistered(req.target.clone()))?;
        protocol.handle_federated_request(&req).await
    }

    /// Fans out `action`/`data` to every registered protocol concurrently,
    /// preserving registration order in the returned vector. Failures never
    /// abort sibling calls.
    pub async fn broadcast_request(
        &self,
        action: &str,
        data: serde_json::Value,
    ) -> Vec<(String, Result<FederatedResponse, AppError>)> {
        let order = self.order.read().clone();
        let calls = order.iter().map(|name| {
            let protocol = self.protocols.get(name).map(|p| p.clone());
            let name = name.clone();
            let req = FederatedRequest {
                source: "fabric".to_string(),
                target: name.clone(),
                action: action.to_string(),
                data: data.clone(),
                correlation_id: uuid::Uuid::new_v4(),
            };
            async move {
                match protocol {
                    Some(p) => (name, p.handle_federated_request(&req).await),
                    None => (name.clone(), Err(AppError::ProtocolNotRegistered(name))),
                }
            }
        });
        futures::future::join_all(calls).await
    }

    pub fn add_data_translator(&self, source: impl Into<String>, target: impl Into<String>, rules: Vec<TranslationRule>) {
        self.translators.insert((source.into(), target.into()), rules);
    }

    pub fn translate(&self, source: &str, target: &str, input: &serde_json::Value) -> Result<serde_json::Value, AppError> {
        let key = (source.to_string(), target.to_string());
        let rules = self
            .translators
            .get(&key)
            .ok_or_else(|| AppError::Configuration(format!("no translator registered for {source} -> {target}")))?;
        translator::translate(rules.value(), input)
    }
}
