#[cfg(test)]
mod tests {
    mod control_tests {
        use serde_json::json;
        use std::sync::Arc;
        use std::time::Duration;
        use sworker::cache::{InMemoryPartitionStore, PartitionStore};
        use sworker::config::WorkerConfig;
        use sworker::control::{ControlHandle, ControlMessage, spawn_control_server};
        use sworker::reset::{CacheClearPath, ResetStep, ResetUtility};
        use sworker::test_utils::{
            FakeRegistrations, HostEvent, MemoryPageStorage, RecordingPageHost, ScriptedNetwork,
        };
        use sworker::worker::ServiceWorker;

        async fn populated_store() -> Arc<InMemoryPartitionStore> {
            let store = Arc::new(InMemoryPartitionStore::new());
            for name in ["carfix-static-v3", "carfix-api-v3", "carfix-images-v3"] {
                store.open(name).await.unwrap();
            }
            store
        }

        fn worker(store: Arc<InMemoryPartitionStore>) -> ServiceWorker {
            ServiceWorker::from_config(
                &WorkerConfig::default(),
                store,
                Arc::new(ScriptedNetwork::new()),
            )
            .unwrap()
        }

        #[tokio::test]
        async fn test_clear_all_twice_over_channel() {
            let store = populated_store().await;
            let (handle, _task) = worker(store.clone()).spawn_control_server();

            let first = handle.request(ControlMessage::clear_cache(None)).await.unwrap();
            let second = handle.request(ControlMessage::clear_cache(None)).await.unwrap();

            assert!(first.success);
            assert_eq!(first.result, Some(json!({"cleared": 3})));
            assert!(second.success);
            assert_eq!(second.result, Some(json!({"cleared": 0})));
            assert!(store.partitions().await.unwrap().is_empty());
        }

        #[tokio::test]
        async fn test_every_request_gets_one_reply() {
            let store = populated_store().await;
            let server = Arc::new(worker(store).control_server());
            let (handle, _task) = spawn_control_server(server, 2);

            let mut pending = Vec::new();
            for action in ["ping", "cacheSize", "bogus", "ping"] {
                let handle = handle.clone();
                pending.push(tokio::spawn(async move {
                    handle.request(ControlMessage::new(action)).await
                }));
            }
            let mut successes = 0;
            for reply in pending {
                if reply.await.unwrap().unwrap().success {
                    successes += 1;
                }
            }
            assert_eq!(successes, 3);
        }

        #[tokio::test]
        async fn test_reset_through_control_channel() {
            let store = populated_store().await;
            let (handle, _task) = worker(store.clone()).spawn_control_server();
            let host = Arc::new(RecordingPageHost::new());
            let local = Arc::new(MemoryPageStorage::with_items([("token", "abc"), ("filters", "{}")]));

            let reset = ResetUtility::new(
                store.clone(),
                local.clone(),
                Arc::new(MemoryPageStorage::new()),
                Arc::new(FakeRegistrations::new(1)),
                host.clone(),
                &WorkerConfig::default().reset,
            )
            .with_control(handle);
            let report = reset.run().await.unwrap();

            assert_eq!(report.caches, CacheClearPath::ControlChannel);
            assert!(store.partitions().await.unwrap().is_empty());
            assert_eq!(local.get_item("token").as_deref(), Some("abc"));
            assert_eq!(local.get_item("filters"), None);
            assert_eq!(
                host.events(),
                vec![
                    HostEvent::Overlay("Resetting application data...".to_string()),
                    HostEvent::Progress(ResetStep::ClearingCaches),
                    HostEvent::Progress(ResetStep::ClearingStorage),
                    HostEvent::Progress(ResetStep::Unregistering),
                    HostEvent::Progress(ResetStep::Reloading),
                    HostEvent::Reload,
                ]
            );
        }

        #[tokio::test(start_paused = true)]
        async fn test_reset_falls_back_when_controller_is_silent() {
            let store = populated_store().await;
            // Nobody answers on this channel.
            let (handle, _rx) = ControlHandle::channel(8);
            let host = Arc::new(RecordingPageHost::new());

            let reset = ResetUtility::new(
                store.clone(),
                Arc::new(MemoryPageStorage::new()),
                Arc::new(MemoryPageStorage::new()),
                Arc::new(FakeRegistrations::new(1)),
                host.clone(),
                &WorkerConfig::default().reset,
            )
            .with_control(handle);

            let started = tokio::time::Instant::now();
            let report = reset.run().await.unwrap();

            assert_eq!(report.caches, CacheClearPath::Direct);
            assert_eq!(started.elapsed(), Duration::from_millis(3000));
            assert!(store.partitions().await.unwrap().is_empty());
            assert_eq!(host.events().last(), Some(&HostEvent::Reload));
        }

        #[tokio::test]
        async fn test_reset_reports_unregister_failure() {
            let host = Arc::new(RecordingPageHost::new());
            let reset = ResetUtility::new(
                populated_store().await,
                Arc::new(MemoryPageStorage::new()),
                Arc::new(MemoryPageStorage::new()),
                Arc::new(FakeRegistrations::failing()),
                host.clone(),
                &WorkerConfig::default().reset,
            );

            assert!(reset.run().await.is_err());
            let events = host.events();
            assert_eq!(
                events.last(),
                Some(&HostEvent::Error(
                    "Failed to unregister: Registration error: unregister rejected".to_string()
                ))
            );
            assert!(!events.contains(&HostEvent::Reload));
        }
    }
}
