use std::sync::Arc;

use driftscope_core::GroupVersionResource;
use driftscope_kubehub::{MockCluster, Selector};
use driftscope_store::{Paginator, ResourceList};
use rustc_hash::FxHashSet;
use serde_json::json;

fn gvr() -> GroupVersionResource { GroupVersionResource::new("demo.example.com", "v1alpha1", "gadgets") }

fn selector() -> Selector {
    Selector { gvr: gvr(), kind: "Gadget".into(), namespace: Some("default".into()), namespaced: true }
}

fn cluster(n: usize) -> Arc<MockCluster> {
    let items = (0..n)
        .map(|i| {
            json!({
                "metadata": {"name": format!("g{:04}", i), "namespace": "default", "uid": format!("uid-{}", i), "generation": 2},
                "status": {"observedGeneration": 1}
            })
        })
        .collect();
    Arc::new(MockCluster::new().with_objects(gvr(), items).reporting_remaining(true))
}

#[tokio::test]
async fn walks_250_items_in_three_pages() {
    let p = Paginator::new(cluster(250));
    let sel = selector();

    let first = p.fetch_page(&sel, None, 100).await.expect("page 1");
    assert_eq!(first.items.len(), 100);
    assert_eq!(first.approx_remaining(), Some(150));
    let second = p.fetch_page(&sel, first.next.as_ref(), 100).await.expect("page 2");
    assert_eq!(second.items.len(), 100);
    let third = p.fetch_page(&sel, second.next.as_ref(), 100).await.expect("page 3");
    assert_eq!(third.items.len(), 50);
    assert!(third.next.is_none());

    let uids: FxHashSet<_> = first.items.iter().chain(&second.items).chain(&third.items).map(|r| r.uid.clone()).collect();
    assert_eq!(uids.len(), 250);
    assert!(third.items.iter().all(|r| r.drift() == 1 && r.kind == "Gadget"));
}

#[tokio::test]
async fn resource_list_reaches_the_end() {
    let p = Paginator::new(cluster(250));
    let mut list = ResourceList::new(selector(), 100);
    let mut next = list.refresh();
    let mut pages = 0;
    while let Some(req) = next {
        let result = p.fetch_page(&req.selector, req.cursor.as_ref(), req.page_size).await;
        list.apply(req.ticket, result);
        pages += 1;
        next = list.request_more();
    }
    assert_eq!(pages, 3);
    assert_eq!(list.len(), 250);
    assert_eq!(list.approx_total(), Some(250));
}
