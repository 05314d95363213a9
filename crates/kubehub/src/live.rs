//! kube-rs backed [`ClusterAccess`].

use k8s_openapi::api::core::v1::{Event as CoreEvent, Namespace};
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::{
    api::{Api, ListParams},
    config::{KubeConfigOptions, Kubeconfig},
    core::{ApiResource, DynamicObject, GroupVersionKind},
    discovery::{Discovery, Scope},
    Client, Config,
};
use serde_json::Value;
use tracing::{debug, info};

use driftscope_core::CrdInfo;

use crate::{is_custom_group, sort_crds, ClusterAccess, ClusterError, ClusterResult, RawPage, Selector};

/// Build a client from an explicit kubeconfig path and/or context, falling
/// back to in-cluster / default kubeconfig inference.
pub async fn connect(kubeconfig: Option<&str>, context: Option<&str>) -> ClusterResult<Client> {
    let options = KubeConfigOptions { context: context.map(str::to_string), ..Default::default() };
    let config = match kubeconfig {
        Some(path) => {
            let kc = Kubeconfig::read_from(path)?;
            Config::from_custom_kubeconfig(kc, &options).await?
        }
        None if context.is_some() => Config::from_kubeconfig(&options).await?,
        None => Config::infer().await.map_err(|e| ClusterError::Other(e.to_string()))?,
    };
    Ok(Client::try_from(config)?)
}

#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
}

impl KubeCluster {
    pub fn new(client: Client) -> Self { Self { client } }

    pub fn client(&self) -> &Client { &self.client }

    /// Namespace of the active kubeconfig context.
    pub fn default_namespace(&self) -> &str { self.client.default_namespace() }

    fn dynamic_api(&self, selector: &Selector) -> Api<DynamicObject> {
        let gvk = GroupVersionKind::gvk(&selector.gvr.group, &selector.gvr.version, &selector.kind);
        let ar = ApiResource::from_gvk_with_plural(&gvk, &selector.gvr.resource);
        match selector.effective_namespace() {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, &ar),
            None => Api::all_with(self.client.clone(), &ar),
        }
    }

    /// Discover served custom resource kinds (preferred version per group).
    pub async fn discover_crds(&self) -> ClusterResult<Vec<CrdInfo>> {
        let discovery = Discovery::new(self.client.clone()).run().await?;
        let mut out = Vec::new();
        for group in discovery.groups() {
            for (ar, caps) in group.recommended_resources() {
                if !is_custom_group(&ar.group) {
                    continue;
                }
                out.push(CrdInfo {
                    name: format!("{}.{}", ar.plural, ar.group),
                    group: ar.group.clone(),
                    version: ar.version.clone(),
                    kind: ar.kind.clone(),
                    plural: ar.plural.clone(),
                    namespaced: matches!(caps.scope, Scope::Namespaced),
                });
            }
        }
        sort_crds(&mut out);
        info!(count = out.len(), "discovered custom resource kinds");
        Ok(out)
    }
}

#[async_trait::async_trait]
impl ClusterAccess for KubeCluster {
    async fn list_page(
        &self,
        selector: &Selector,
        limit: Option<u32>,
        continue_token: Option<&str>,
    ) -> ClusterResult<RawPage> {
        let mut lp = ListParams::default();
        if let Some(limit) = limit {
            lp = lp.limit(limit);
        }
        if let Some(token) = continue_token.filter(|t| !t.is_empty()) {
            lp = lp.continue_token(token);
        }
        let list = self.dynamic_api(selector).list(&lp).await?;
        let items = list.items.iter().map(serde_json::to_value).collect::<Result<Vec<_>, _>>()?;
        let page = RawPage {
            items,
            continue_token: list.metadata.continue_.unwrap_or_default(),
            remaining: list.metadata.remaining_item_count,
        };
        debug!(selector = %selector, items = page.items.len(), more = !page.continue_token.is_empty(), "listed page");
        Ok(page)
    }

    async fn get(&self, selector: &Selector, name: &str) -> ClusterResult<Value> {
        let obj = self.dynamic_api(selector).get(name).await?;
        Ok(serde_json::to_value(&obj)?)
    }

    async fn list_events(&self, namespace: Option<&str>, uid: &str) -> ClusterResult<Vec<Value>> {
        let api: Api<CoreEvent> = match namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        };
        let lp = ListParams::default().fields(&format!("involvedObject.uid={}", uid));
        let list = api.list(&lp).await?;
        let events = list.items.iter().map(serde_json::to_value).collect::<Result<Vec<_>, _>>()?;
        debug!(uid, count = events.len(), "listed events");
        Ok(events)
    }

    async fn get_crd(&self, name: &str) -> ClusterResult<Value> {
        let api: Api<CustomResourceDefinition> = Api::all(self.client.clone());
        let crd = api.get(name).await?;
        Ok(serde_json::to_value(&crd)?)
    }

    async fn list_namespaces(&self) -> ClusterResult<Vec<String>> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let list = api.list(&ListParams::default()).await?;
        let mut names: Vec<String> = list.items.into_iter().filter_map(|ns| ns.metadata.name).collect();
        names.sort();
        debug!(count = names.len(), "listed namespaces");
        Ok(names)
    }
}
