use std::time::Duration;

use eyre::Result;
use ticket_market_core::{Config, ConfigUpdate};
use ticket_market_engine::LogKind;
use ticket_market_tests::{ApiError, TestCtxBuilder};
use util::eventually;

mod util;

const WAIT: Duration = Duration::from_secs(5);

#[tokio::test]
#[ntest::timeout(20_000)]
async fn configure_start_and_watch() -> Result<()> {
    let ctx = TestCtxBuilder::new().build().await?;

    let msg = ctx
        .api
        .configure(&ConfigUpdate {
            total_tickets: Some(20),
            max_ticket_capacity: Some(10),
            ticket_release_rate: Some(2),
            customer_retrieval_rate: Some(1),
            ..ConfigUpdate::default()
        })
        .await??;
    assert_eq!(msg, "Configuration updated successfully");
    assert_eq!(ctx.api.start().await??, "System started successfully");

    let status = ctx.api.status().await??;
    assert!(status.running);
    assert_eq!(status.capacity, 10);
    assert_eq!(status.active_vendor_count, 2);
    assert_eq!(status.active_customer_count, 1);

    let supervisor = ctx.supervisor.clone();
    eventually(WAIT, || supervisor.status().total_processed > 0).await?;
    assert!(ctx.api.status().await??.pool_size <= 10);

    assert_eq!(ctx.api.stop().await??, "System stopped successfully");
    let status = ctx.api.status().await??;
    assert!(!status.running);
    assert_eq!(status.active_vendor_count, 0);

    let logs = ctx.api.logs().await??;
    assert!(logs.iter().any(|e| e.message == "System started"));
    assert!(logs
        .iter()
        .all(|e| e.kind == LogKind::SystemStatus || e.actor_id.is_some()));

    drop(supervisor);
    ctx.finish().await;
    Ok(())
}

#[tokio::test]
#[ntest::timeout(20_000)]
async fn invalid_configuration_is_a_bad_request() -> Result<()> {
    let ctx = TestCtxBuilder::new()
        .with_total_tickets(20)
        .with_capacity(10)
        .build()
        .await?;

    let err = ctx
        .api
        .configure(&ConfigUpdate {
            total_tickets: Some(5),
            ..ConfigUpdate::default()
        })
        .await?
        .unwrap_err();
    assert!(matches!(err, ApiError::BadRequest(_)));
    assert!(err.message().contains("must be greater than"));

    let err = ctx.api.configure_raw("not json").await?.unwrap_err();
    assert!(matches!(err, ApiError::BadRequest(_)));

    let err = ctx
        .api
        .configure_raw(r#"{"ticketReleaseRate": -2}"#)
        .await?
        .unwrap_err();
    assert_eq!(err.message(), "Ticket release rate cannot be negative");

    assert_eq!(ctx.supervisor.configuration().total_tickets, 20);
    ctx.finish().await;
    Ok(())
}

#[tokio::test]
#[ntest::timeout(20_000)]
async fn start_without_configuration_fails() -> Result<()> {
    let ctx = TestCtxBuilder::new().build().await?;

    let err = ctx.api.start().await?.unwrap_err();
    assert!(matches!(err, ApiError::BadRequest(_)));
    assert!(err.message().contains("Please configure the system first"));
    assert!(!ctx.api.status().await??.running);

    ctx.finish().await;
    Ok(())
}

#[tokio::test]
#[ntest::timeout(20_000)]
async fn vendors_and_customers_on_demand() -> Result<()> {
    let ctx = TestCtxBuilder::new()
        .with_total_tickets(20)
        .with_capacity(5)
        .with_rates(1, 1)
        .build()
        .await?;

    let vendor = ctx.api.start_vendor().await??;
    let customer = ctx.api.start_customer().await??;
    assert!(vendor.starts_with("V-"));
    assert!(customer.starts_with("C-"));

    let status = ctx.api.status().await??;
    assert!(!status.running);
    assert_eq!(status.vendors.len(), 1);
    assert_eq!(status.vendors[0].id, vendor);
    assert_eq!(status.customers[0].id, customer);

    assert_eq!(
        ctx.api.stop_vendors().await??,
        "All vendor threads stopped"
    );
    assert_eq!(ctx.api.status().await??.active_vendor_count, 0);
    assert_eq!(
        ctx.api.stop_customers().await??,
        "All customer threads stopped"
    );
    assert_eq!(ctx.api.status().await??.active_customer_count, 0);

    ctx.finish().await;
    Ok(())
}

#[tokio::test]
#[ntest::timeout(20_000)]
async fn reset_via_api() -> Result<()> {
    let ctx = TestCtxBuilder::new()
        .with_total_tickets(20)
        .with_capacity(4)
        .with_rates(3, 1)
        .with_intervals(1, 60_000)
        .build()
        .await?;

    ctx.api.start().await??;
    let supervisor = ctx.supervisor.clone();
    eventually(WAIT, || supervisor.status().pool_size == 4).await?;

    assert_eq!(ctx.api.reset().await??, "System reset successfully");
    let status = ctx.api.status().await??;
    assert!(!status.running);
    assert_eq!(status.pool_size, 0);
    assert_eq!(status.peak_size, 0);
    assert_eq!(status.capacity, 4);

    drop(supervisor);
    ctx.finish().await;
    Ok(())
}

#[tokio::test]
#[ntest::timeout(20_000)]
async fn saved_configurations() -> Result<()> {
    let ctx = TestCtxBuilder::new().build().await?;

    assert_eq!(ctx.api.latest_configuration().await??, Config::default());

    let first = Config {
        total_tickets: 100,
        max_ticket_capacity: 10,
        ticket_release_rate: 2,
        customer_retrieval_rate: 3,
        ..Config::default()
    };
    let record = ctx.api.save_configuration(&first).await??;
    assert_eq!(record.id, 1);
    assert_eq!(record.config, first);

    let second = Config {
        total_tickets: 200,
        ..first
    };
    assert_eq!(ctx.api.save_configuration(&second).await??.id, 2);
    assert_eq!(ctx.api.latest_configuration().await??, second);

    // saving does not apply the configuration
    assert_eq!(ctx.supervisor.configuration().total_tickets, 0);

    let err = ctx
        .api
        .save_configuration_raw(r#"{"totalTickets": "many"}"#)
        .await?
        .unwrap_err();
    assert!(matches!(err, ApiError::BadRequest(_)));

    ctx.finish().await;
    Ok(())
}

#[tokio::test]
#[ntest::timeout(20_000)]
async fn handler_threads_share_one_market() -> Result<()> {
    let ctx = TestCtxBuilder::new()
        .with_total_tickets(20)
        .with_capacity(5)
        .with_rates(1, 1)
        .with_handler_threads(4)
        .build()
        .await?;

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let api = ctx.api.clone();
        tasks.push(tokio::spawn(async move { api.start_vendor().await }));
    }
    for task in tasks {
        task.await???;
    }
    assert_eq!(ctx.api.status().await??.active_vendor_count, 8);

    ctx.finish().await;
    Ok(())
}
