//! Quota enforcement across the service and store seams

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use advoca_shared::{default_plans, EventPublisher, MemoryPublisher, PlanType, TenantId, UserId};
use advoca_tenant::memory::{
    MemoryPlanStore, MemoryQuotaStore, MemorySubscriptionStore, MemoryTenantStore,
};
use advoca_tenant::service::QuotaService;
use advoca_tenant::store::{QuotaStore, TenantStore};
use advoca_tenant::{QuotaKind, Tenant, TenantError};

struct World {
    service: QuotaService,
    quotas: Arc<MemoryQuotaStore>,
    tenants: Arc<MemoryTenantStore>,
    publisher: Arc<MemoryPublisher>,
}

fn world() -> World {
    let publisher = Arc::new(MemoryPublisher::new());
    let quotas = Arc::new(MemoryQuotaStore::new());
    let tenants = Arc::new(MemoryTenantStore::new());
    let plans = Arc::new(MemoryPlanStore::new());
    for plan in default_plans() {
        plans.insert(plan).unwrap();
    }
    World {
        service: QuotaService::new(
            quotas.clone(),
            tenants.clone(),
            Arc::new(MemorySubscriptionStore::new()),
            plans,
            publisher.clone() as Arc<dyn EventPublisher>,
        ),
        quotas,
        tenants,
        publisher,
    }
}

async fn seed_tenant(w: &World, plan_type: PlanType) -> TenantId {
    let tenant = Tenant::new("Moraes Jurídico", "adm@moraes.adv.br", plan_type, UserId::new());
    w.tenants.insert(&tenant).await.unwrap();
    tenant.id
}

#[tokio::test]
async fn concurrent_consumers_cannot_overshoot_the_limit() {
    let w = world();
    // Starter allows 20 clients
    let tenant_id = seed_tenant(&w, PlanType::Starter).await;

    let mut handles = Vec::new();
    let service = Arc::new(w.service);
    for _ in 0..40 {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            service.consume(tenant_id, QuotaKind::Clients, 1).await
        }));
    }

    let mut granted = 0;
    let mut rejected = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => granted += 1,
            Err(TenantError::QuotaExceeded { .. }) => rejected += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(granted, 20);
    assert_eq!(rejected, 20);
    assert_eq!(w.quotas.get(tenant_id).await.unwrap().clients, 20);
}

#[tokio::test]
async fn datajud_daily_resets_while_monthly_accumulates() {
    let w = world();
    // Starter allows 100 DataJud queries per day
    let tenant_id = seed_tenant(&w, PlanType::Starter).await;

    for _ in 0..3 {
        w.service
            .consume(tenant_id, QuotaKind::DatajudDaily, 30)
            .await
            .unwrap();
    }
    // 90 used, 30 more would pass 100
    let err = w
        .service
        .consume(tenant_id, QuotaKind::DatajudDaily, 30)
        .await
        .unwrap_err();
    assert!(matches!(err, TenantError::QuotaExceeded { .. }));

    w.service.reset_daily().await.unwrap();
    w.service
        .consume(tenant_id, QuotaKind::DatajudDaily, 30)
        .await
        .unwrap();

    let usage = w.service.usage(tenant_id).await.unwrap();
    assert_eq!(usage.datajud_daily, 30);
    assert_eq!(usage.datajud_monthly, 120);

    w.service.reset_monthly().await.unwrap();
    let usage = w.service.usage(tenant_id).await.unwrap();
    assert_eq!(usage.datajud_monthly, 0);
}

#[tokio::test]
async fn warning_fires_once_usage_crosses_eighty_percent() {
    let w = world();
    // Professional allows 50 AI queries per month; 80% is 40
    let tenant_id = seed_tenant(&w, PlanType::Professional).await;

    let check = w
        .service
        .consume(tenant_id, QuotaKind::AiMonthly, 39)
        .await
        .unwrap();
    assert!(!check.is_warning);

    let check = w
        .service
        .consume(tenant_id, QuotaKind::AiMonthly, 1)
        .await
        .unwrap();
    assert!(check.is_warning);
    assert!(!check.is_exceeded);
    assert_eq!(check.percentage, 80.0);
    assert_eq!(w.publisher.event_types(), vec!["tenant.quota_warning"]);
}

#[tokio::test]
async fn enterprise_unlimited_dimensions_never_reject() {
    let w = world();
    let tenant_id = seed_tenant(&w, PlanType::Enterprise).await;

    for kind in [QuotaKind::Processes, QuotaKind::Users, QuotaKind::Clients] {
        let check = w.service.consume(tenant_id, kind, 1_000_000).await.unwrap();
        assert!(check.is_unlimited);
    }
    // DataJud stays capped even on Enterprise
    let check = w
        .service
        .check_quota(tenant_id, QuotaKind::DatajudDaily)
        .await
        .unwrap();
    assert!(!check.is_unlimited);
    assert_eq!(check.limit, 10_000);
}

#[tokio::test]
async fn starter_process_limit_rejects_the_fifty_first() {
    let w = world();
    // Starter allows 50 processes
    let tenant_id = seed_tenant(&w, PlanType::Starter).await;

    for _ in 0..49 {
        w.service
            .consume(tenant_id, QuotaKind::Processes, 1)
            .await
            .unwrap();
    }
    let check = w
        .service
        .check_quota(tenant_id, QuotaKind::Processes)
        .await
        .unwrap();
    assert!(!check.is_exceeded);
    assert_eq!(check.available, 1);

    // The 50th consumes the last slot; the 51st is rejected
    w.service
        .consume(tenant_id, QuotaKind::Processes, 1)
        .await
        .unwrap();
    let err = w
        .service
        .consume(tenant_id, QuotaKind::Processes, 1)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TenantError::QuotaExceeded {
            current: 50,
            limit: 50,
            ..
        }
    ));
}
