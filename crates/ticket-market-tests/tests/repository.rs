use std::path::PathBuf;

use eyre::Result;
use ticket_market_core::Config;
use ticket_market_engine::{ConfigurationRepository, RepositoryError};

fn store_path(name: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "ticket-market-{name}-{}.json",
        std::process::id()
    ));
    let _ = std::fs::remove_file(&path);
    path
}

fn config(total_tickets: u32) -> Config {
    Config {
        total_tickets,
        max_ticket_capacity: 5,
        ticket_release_rate: 1,
        customer_retrieval_rate: 1,
        ..Config::default()
    }
}

#[test]
fn ids_count_up_from_one() -> Result<()> {
    let mut repository = ConfigurationRepository::new();
    assert!(repository.is_empty());
    assert!(repository.latest().is_none());

    assert_eq!(repository.save(config(10))?.id, 1);
    assert_eq!(repository.save(config(20))?.id, 2);
    assert_eq!(repository.save(config(30))?.id, 3);

    assert_eq!(repository.len(), 3);
    assert_eq!(repository.latest().map(|r| r.id), Some(3));
    assert_eq!(repository.find(2).map(|r| r.config), Some(config(20)));
    assert!(repository.find(4).is_none());
    Ok(())
}

#[test]
fn records_survive_reopening() -> Result<()> {
    let path = store_path("reopen");
    {
        let mut repository = ConfigurationRepository::open(&path)?;
        assert!(repository.is_empty());
        repository.save(config(10))?;
        repository.save(config(20))?;
    }

    let mut repository = ConfigurationRepository::open(&path)?;
    assert_eq!(repository.len(), 2);
    let latest = repository.latest().unwrap();
    assert_eq!(latest.id, 2);
    assert_eq!(latest.config, config(20));

    // ids keep counting after the highest stored one
    assert_eq!(repository.save(config(30))?.id, 3);
    assert_eq!(ConfigurationRepository::open(&path)?.len(), 3);

    std::fs::remove_file(&path)?;
    Ok(())
}

#[test]
fn records_are_stored_flat() -> Result<()> {
    let path = store_path("flat");
    ConfigurationRepository::open(&path)?.save(config(10))?;

    let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
    let record = &json[0];
    assert_eq!(record["id"], 1);
    assert_eq!(record["totalTickets"], 10);
    assert_eq!(record["maxTicketCapacity"], 5);

    std::fs::remove_file(&path)?;
    Ok(())
}

#[test]
fn malformed_file_is_rejected() -> Result<()> {
    let path = store_path("malformed");
    std::fs::write(&path, "{ not a list")?;
    assert!(matches!(
        ConfigurationRepository::open(&path),
        Err(RepositoryError::Json(_))
    ));
    std::fs::remove_file(&path)?;
    Ok(())
}
