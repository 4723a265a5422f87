#[cfg(test)]
mod tests {
    mod memory_store_tests {
        use std::sync::Arc;
        use sworker_cache::{
            CacheError, HttpRequest, HttpResponse, InMemoryPartitionStore,
            PartitionRegistry, PartitionRole, PartitionStore,
        };

        fn get(url: &str) -> HttpRequest {
            HttpRequest::parse_get(url).unwrap()
        }

        #[tokio::test]
        async fn test_partition_basic_operations() {
            let registry = PartitionRegistry::new("carfix", 3);
            let store = InMemoryPartitionStore::new();
            let api = registry.name(PartitionRole::Api);

            let req = get("https://garage.test/api/cars?page=1");
            let body = r#"[{"id":1,"model":"Corolla"}]"#;
            let response = HttpResponse::new(200, body)
                .with_header("Content-Type", "application/json");

            // Test set
            store.put(&api, &req, response.clone()).await.unwrap();

            // Test get
            let entry = store.get(&api, &req).await.unwrap().unwrap();
            assert_eq!(entry.key, "https://garage.test/api/cars?page=1");
            assert_eq!(entry.response, response);
            assert_eq!(entry.response.header("content-type"), Some("application/json"));

            // A fragment does not change the identity
            let with_fragment = get("https://garage.test/api/cars?page=1#list");
            assert!(store.get(&api, &with_fragment).await.unwrap().is_some());

            // Test remove
            assert!(store.remove(&api, &req).await.unwrap());
            assert!(!store.remove(&api, &req).await.unwrap());
            assert!(store.get(&api, &req).await.unwrap().is_none());
            assert_eq!(store.entry_count(&api).await.unwrap(), 0);
        }

        #[tokio::test]
        async fn test_partitions_keep_entry_order() {
            let store = InMemoryPartitionStore::new();
            for path in ["/a.png", "/b.png", "/c.png"] {
                let req = get(&format!("https://garage.test{path}"));
                store
                    .put("carfix-images-v3", &req, HttpResponse::new(200, path))
                    .await
                    .unwrap();
            }
            assert_eq!(store.entry_count("carfix-images-v3").await.unwrap(), 3);

            assert!(store.delete("carfix-images-v3").await.unwrap());
            assert!(!store.delete("carfix-images-v3").await.unwrap());
        }

        #[tokio::test]
        async fn test_concurrent_writes_last_one_wins() {
            let store = Arc::new(InMemoryPartitionStore::new());
            let req = get("https://garage.test/logo.svg");

            let mut handles = Vec::new();
            for i in 0..8 {
                let store = store.clone();
                let req = req.clone();
                handles.push(tokio::spawn(async move {
                    store
                        .put("img", &req, HttpResponse::new(200, format!("v{i}")))
                        .await
                }));
            }
            for handle in handles {
                handle.await.unwrap().unwrap();
            }

            assert_eq!(store.entry_count("img").await.unwrap(), 1);
            let entry = store.get("img", &req).await.unwrap().unwrap();
            assert!(entry.response.body_text().starts_with('v'));
        }

        #[tokio::test]
        async fn test_quota_error_is_reported() {
            let store = InMemoryPartitionStore::with_quota(2);
            store
                .put("p", &get("https://garage.test/1"), HttpResponse::new(200, ""))
                .await
                .unwrap();
            store
                .put("p", &get("https://garage.test/2"), HttpResponse::new(200, ""))
                .await
                .unwrap();
            let err = store
                .put("p", &get("https://garage.test/3"), HttpResponse::new(200, ""))
                .await
                .unwrap_err();

            assert!(matches!(err, CacheError::QuotaExceeded { .. }));
            assert_eq!(
                err.to_string(),
                "Quota exceeded for partition p: limit is 2 entries"
            );
        }

        #[tokio::test]
        async fn test_clear_all_is_idempotent() {
            let registry = PartitionRegistry::new("carfix", 3);
            let store = InMemoryPartitionStore::new();
            store
                .put(
                    &registry.name(PartitionRole::Static),
                    &get("https://garage.test/"),
                    HttpResponse::new(200, "home"),
                )
                .await
                .unwrap();
            store.open(&registry.name(PartitionRole::Api)).await.unwrap();

            assert_eq!(store.clear_all().await.unwrap(), 2);
            assert_eq!(store.clear_all().await.unwrap(), 0);
            assert!(store.partitions().await.unwrap().is_empty());
        }
    }
}
