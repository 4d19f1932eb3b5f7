//! Tests for retrieval fusion

#[cfg(test)]
mod tests {
    use std::{future::Future, pin::Pin, sync::Arc, time::Duration};

    use tokio::time::Instant;

    use crate::{
        retrieval::{fuse, CoverageStatus, ProviderAdapter, ProviderError, ProviderResult, RetrievalFusionEngine},
        test_support::{as_adapters, items, Behavior, FakeProvider},
        types::{EvidenceClass, Topic},
    };

    fn topic() -> Topic {
        Topic::new("t-fusion", "AI chip export controls")
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_provider_and_cross_provider_duplicate() {
        let providers = vec![
            FakeProvider::new(
                "p1",
                EvidenceClass::Hard,
                Behavior::Items(items("wire", &["Export rules tightened", "Nvidia guidance cut"])),
            ),
            FakeProvider::new(
                "p2",
                EvidenceClass::Hard,
                Behavior::Delayed(Duration::from_secs(30), items("slow", &["Never seen"])),
            ),
            FakeProvider::new(
                "p3",
                EvidenceClass::Soft,
                Behavior::Items(items("weibo", &["  export RULES   tightened ", "Gamers worry about prices"])),
            ),
        ];

        let pack = fuse(
            &topic(),
            &as_adapters(&providers),
            Duration::from_secs(2),
            Duration::from_secs(5),
        )
        .await;

        assert_eq!(pack.evidence_count(), 3);
        let headlines: Vec<&str> = pack.evidence().map(|e| e.headline.as_str()).collect();
        assert_eq!(
            headlines,
            vec!["Export rules tightened", "Nvidia guidance cut", "Gamers worry about prices"]
        );

        let statuses: Vec<_> = pack.provider_coverage.iter().map(|c| c.status).collect();
        assert_eq!(
            statuses,
            vec![CoverageStatus::Ok, CoverageStatus::Failed, CoverageStatus::Ok]
        );

        let p2 = pack.coverage_for("p2").unwrap();
        assert!(p2.error.as_deref().unwrap().contains("Timed out after 2000ms"));
        assert_eq!(pack.coverage_for("p3").unwrap().item_count, 1);
        assert!(pack.is_degraded());
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_provider_cannot_block_past_global_deadline() {
        let providers = vec![
            FakeProvider::new("fast", EvidenceClass::Hard, Behavior::Items(items("wire", &["One"]))),
            FakeProvider::new("stuck", EvidenceClass::Soft, Behavior::Hang),
        ];

        let started = Instant::now();
        let pack = fuse(
            &topic(),
            &as_adapters(&providers),
            Duration::from_secs(60),
            Duration::from_secs(3),
        )
        .await;
        let elapsed = started.elapsed();

        assert!(elapsed >= Duration::from_secs(3));
        assert!(elapsed <= Duration::from_secs(3) + Duration::from_millis(50));
        assert_eq!(pack.coverage_for("fast").unwrap().status, CoverageStatus::Ok);
        assert_eq!(pack.coverage_for("stuck").unwrap().status, CoverageStatus::TimedOut);
        assert_eq!(pack.evidence_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_result_never_reaches_pack() {
        let providers = vec![FakeProvider::new(
            "late",
            EvidenceClass::Hard,
            Behavior::Delayed(Duration::from_secs(4), items("wire", &["Too late"])),
        )];

        let pack = fuse(
            &topic(),
            &as_adapters(&providers),
            Duration::from_secs(10),
            Duration::from_secs(1),
        )
        .await;
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert!(pack.is_empty());
        assert_eq!(pack.provider_coverage[0].status, CoverageStatus::TimedOut);
    }

    #[tokio::test]
    async fn test_every_failure_mode_gets_coverage() {
        let providers = vec![
            FakeProvider::new(
                "transport",
                EvidenceClass::Hard,
                Behavior::Fail(ProviderError::Transport("connection reset".to_string())),
            ),
            FakeProvider::new(
                "http",
                EvidenceClass::Hard,
                Behavior::Fail(ProviderError::Http {
                    status: 503,
                    message: "unavailable".to_string(),
                }),
            ),
            FakeProvider::new("panics", EvidenceClass::Soft, Behavior::Panic),
            FakeProvider::new(
                "bad-confidence",
                EvidenceClass::Soft,
                Behavior::Items(vec![crate::types::EvidenceItem::new("x", "Headline", 1.5)]),
            ),
            FakeProvider::new(
                "blank-headline",
                EvidenceClass::Soft,
                Behavior::Items(vec![crate::types::EvidenceItem::new("x", "   ", 0.5)]),
            ),
        ];

        let pack = fuse(
            &topic(),
            &as_adapters(&providers),
            Duration::from_secs(1),
            Duration::from_secs(2),
        )
        .await;

        assert!(pack.is_empty());
        assert_eq!(pack.provider_coverage.len(), providers.len());
        for (coverage, provider) in pack.provider_coverage.iter().zip(&providers) {
            assert_eq!(coverage.provider_id, provider.id());
            assert_eq!(coverage.status, CoverageStatus::Failed);
            assert!(coverage.error.is_some());
        }
        assert!(pack
            .coverage_for("panics")
            .unwrap()
            .error
            .as_deref()
            .unwrap()
            .contains("exploded"));
        assert_eq!(pack.status_label(), "empty");
    }

    /// Panics while building its future, outside the per-fetch unwind guard
    struct PanicsOnCall;

    impl ProviderAdapter for PanicsOnCall {
        fn id(&self) -> &str {
            "eager"
        }

        fn class(&self) -> EvidenceClass {
            EvidenceClass::Hard
        }

        fn fetch<'a, 'b, 'async_trait>(
            &'a self,
            _query: &'b str,
            _timeout: Duration,
        ) -> Pin<Box<dyn Future<Output = Result<ProviderResult, ProviderError>> + Send + 'async_trait>>
        where
            'a: 'async_trait,
            'b: 'async_trait,
            Self: 'async_trait,
        {
            panic!("failed before yielding a future")
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_aborted_task_is_attributed_to_its_provider() {
        let hanging = FakeProvider::new("hangs", EvidenceClass::Soft, Behavior::Hang);
        let providers: Vec<Arc<dyn ProviderAdapter>> = vec![Arc::new(PanicsOnCall), hanging];

        let pack = fuse(&topic(), &providers, Duration::from_secs(10), Duration::from_secs(1)).await;

        let eager = pack.coverage_for("eager").unwrap();
        assert_eq!(eager.status, CoverageStatus::Failed);
        assert!(eager.error.as_deref().unwrap().contains("failed before yielding"));
        assert_eq!(pack.coverage_for("hangs").unwrap().status, CoverageStatus::TimedOut);
    }

    #[tokio::test]
    async fn test_partial_results_are_degraded_but_kept() {
        let providers = vec![FakeProvider::new(
            "mock",
            EvidenceClass::Soft,
            Behavior::Partial(items("mock", &["Placeholder trend"])),
        )];

        let pack = fuse(
            &topic(),
            &as_adapters(&providers),
            Duration::from_secs(1),
            Duration::from_secs(2),
        )
        .await;

        assert_eq!(pack.soft.len(), 1);
        assert_eq!(pack.provider_coverage[0].status, CoverageStatus::Degraded);
        assert_eq!(pack.status_label(), "degraded");
    }

    #[tokio::test]
    async fn test_fusion_is_deterministic() {
        let providers = vec![
            FakeProvider::new(
                "a",
                EvidenceClass::Hard,
                Behavior::Items(items("a", &["Alpha", "Beta", "alpha"])),
            ),
            FakeProvider::new(
                "b",
                EvidenceClass::Soft,
                Behavior::Items(items("b", &["BETA", "Gamma"])),
            ),
        ];
        let adapters = as_adapters(&providers);

        let first = fuse(&topic(), &adapters, Duration::from_secs(1), Duration::from_secs(2)).await;
        let second = fuse(&topic(), &adapters, Duration::from_secs(1), Duration::from_secs(2)).await;

        assert_eq!(first.hard, second.hard);
        assert_eq!(first.soft, second.soft);
        assert_eq!(
            first.hard.iter().map(|e| e.headline.as_str()).collect::<Vec<_>>(),
            vec!["Alpha", "Beta"]
        );
        assert_eq!(
            first.soft.iter().map(|e| e.headline.as_str()).collect::<Vec<_>>(),
            vec!["Gamma"]
        );
        assert_ne!(first.id, second.id);
    }

    #[tokio::test]
    async fn test_max_results_cap_applies_before_dedup() {
        let providers = vec![
            FakeProvider::new(
                "a",
                EvidenceClass::Hard,
                Behavior::Items(items("a", &["One", "Two", "Three"])),
            ),
            FakeProvider::new(
                "b",
                EvidenceClass::Hard,
                Behavior::Items(items("b", &["One", "Four", "Five"])),
            ),
        ];

        let engine = RetrievalFusionEngine::new(Duration::from_secs(1), Duration::from_secs(2)).with_max_results(2);
        let pack = engine.fuse(&topic(), &as_adapters(&providers)).await;

        let headlines: Vec<&str> = pack.hard.iter().map(|e| e.headline.as_str()).collect();
        assert_eq!(headlines, vec!["One", "Two", "Four"]);
        assert_eq!(pack.coverage_for("b").unwrap().item_count, 1);
    }

    #[tokio::test]
    async fn test_no_providers_yields_empty_ready_pack() {
        let pack = fuse(&topic(), &[], Duration::from_secs(1), Duration::from_secs(2)).await;
        assert!(pack.is_empty());
        assert!(pack.provider_coverage.is_empty());
        assert!(!pack.is_degraded());
    }
}
