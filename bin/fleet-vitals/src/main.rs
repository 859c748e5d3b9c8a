//! # Fleet Vitals Binary
//!
//! Assembles config, logging and a store backend chosen at compile time,
//! then prints the fleet's upcoming maintenance.

use std::sync::Arc;

use anyhow::{bail, Context};
use chrono::{Days, NaiveDate};
use fv_config::{LogFormat, Settings, StoreBackend};
use fv_core::clock::{ManualClock, SystemClock};
use fv_core::models::MachineDraft;
use fv_core::schedule::DeadlineStatus;
use fv_core::traits::{Clock, FleetStore};
use fv_engine::FleetService;
use secrecy::ExposeSecret;

// Feature-gated imports
#[cfg(feature = "store-sqlite")]
use fv_store_sqlite::SqliteFleetStore;

#[cfg(feature = "store-memory")]
use fv_store_memory::MemoryFleetStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load layered settings and start logging
    let settings = Settings::load()?;
    init_tracing(&settings);

    // 2. Initialize Store Implementation
    let store = open_store(&settings).await?;

    // 3. Pick the clock (pinned date or real UTC day)
    let clock: Arc<dyn Clock> = match settings.report.today {
        Some(today) => Arc::new(ManualClock::new(today)),
        None => Arc::new(SystemClock),
    };

    // 4. Load the fleet into the service
    let mut service = FleetService::open(store, clock).await?;
    if settings.seed_demo && service.list_machines().is_empty() {
        seed_demo(&mut service).await?;
    }

    // 5. Report
    print_report(&mut service, settings.report.horizon_days).await
}

fn init_tracing(settings: &Settings) {
    let filter = tracing_subscriber::EnvFilter::try_new(&settings.log.filter)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match settings.log.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

async fn open_store(settings: &Settings) -> anyhow::Result<Arc<dyn FleetStore>> {
    match settings.store.backend {
        #[cfg(feature = "store-sqlite")]
        StoreBackend::Sqlite => {
            let url = settings.store.database_url.expose_secret();
            let store = SqliteFleetStore::new(url)
                .await
                .context("failed to init SQLite store")?;
            Ok(Arc::new(store))
        }
        #[cfg(feature = "store-memory")]
        StoreBackend::Memory => {
            tracing::warn!("using the in-memory store; nothing will be persisted");
            Ok(Arc::new(MemoryFleetStore::new()))
        }
        #[allow(unreachable_patterns)]
        other => bail!("store backend {other:?} was not compiled into this binary"),
    }
}

const DEMO_TYPES: [&str; 3] = ["Torque Check", "Gas Certificate", "Oil Change"];

/// Three demo machines with deadlines spread across every tier.
/// Deadline types survive machine deletion, so existing ones are reused.
async fn seed_demo(service: &mut FleetService) -> anyhow::Result<()> {
    let today = service.today();
    let mut types = Vec::new();
    for name in DEMO_TYPES {
        let existing = service
            .list_deadline_types()
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
            .map(|t| t.id);
        let id = match existing {
            Some(id) => id,
            None => service.add_deadline_type(name).await?.id,
        };
        types.push(id);
    }

    let machines = [
        ("CAT Backhoe Loader", "Heavy", "420F", "Operational"),
        ("Liebherr Concrete Mixer", "Concrete", "HTM 604", "Under Maintenance"),
        ("Manitou Telehandler", "Telescopic", "MT-X 1840", "Operational"),
    ];
    // (days since last performed, frequency) per machine, one per type
    let schedules: [[(u64, i64); 3]; 3] = [
        [(170, 180), (200, 365), (20, 90)],
        [(95, 90), (340, 365), (60, 90)],
        [(10, 180), (100, 365), (85, 90)],
    ];

    for ((name, machine_type, model, status), schedule) in machines.into_iter().zip(schedules) {
        let machine = service
            .add_machine(MachineDraft {
                name: name.into(),
                machine_type: machine_type.into(),
                model: model.into(),
                status: status.into(),
                ..Default::default()
            })
            .await?;
        for (type_id, (ago, frequency)) in types.iter().zip(schedule) {
            let performed = days_before(today, ago)?;
            service
                .add_deadline(machine.id, *type_id, &performed.to_string(), frequency)
                .await?;
        }
    }
    tracing::info!("demo fleet seeded");
    Ok(())
}

fn days_before(today: NaiveDate, days: u64) -> anyhow::Result<NaiveDate> {
    today
        .checked_sub_days(Days::new(days))
        .with_context(|| format!("{today} minus {days} days is out of range"))
}

async fn print_report(service: &mut FleetService, horizon_days: i64) -> anyhow::Result<()> {
    let today = service.today();
    println!("Fleet Vitals as of {today}");
    println!();

    println!("Machines Overview");
    for machine in service.list_machines() {
        let health = service
            .machine_health(machine.id)?
            .map_or("-", |tier| tier.as_str());
        println!(
            "  [{health:>8}] {} ({}, model {}) - {}",
            machine.name, machine.machine_type, machine.model, machine.status
        );
    }
    println!();

    let upcoming = service.upcoming(horizon_days).await?;
    println!("Upcoming Maintenance (next {horizon_days} days)");
    if upcoming.is_empty() {
        println!("  nothing due");
    }
    for item in &upcoming {
        let status = &item.deadline.status;
        println!(
            "  [{:>8}] {} - {}: due {} ({})",
            status.tier,
            item.machine_name,
            item.deadline.entry.type_label(),
            status.due_date,
            describe_due(status),
        );
    }
    Ok(())
}

fn describe_due(status: &DeadlineStatus) -> String {
    match status.days_remaining {
        0 => "due today".to_string(),
        days if status.is_overdue() => format!("overdue by {} days", -days),
        days => format!("in {days} days"),
    }
}

#[cfg(all(test, feature = "store-memory"))]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn memory_service(today: NaiveDate) -> FleetService {
        let store: Arc<dyn FleetStore> = Arc::new(MemoryFleetStore::new());
        FleetService::open(store, Arc::new(ManualClock::new(today))).await.unwrap()
    }

    #[tokio::test]
    async fn test_seed_demo_on_empty_store() {
        let mut service = memory_service(date(2024, 6, 20)).await;
        seed_demo(&mut service).await.unwrap();

        assert_eq!(service.list_machines().len(), 3);
        assert_eq!(service.list_deadline_types().len(), DEMO_TYPES.len());
        assert_eq!(service.upcoming(i64::MAX).await.unwrap().len(), 9);
    }

    #[tokio::test]
    async fn test_seed_demo_reuses_surviving_types() {
        let mut service = memory_service(date(2024, 6, 20)).await;
        let kept = service.add_deadline_type("torque check").await.unwrap();

        seed_demo(&mut service).await.unwrap();

        let types = service.list_deadline_types();
        assert_eq!(types.len(), DEMO_TYPES.len());
        assert_eq!(types.iter().filter(|t| t.id == kept.id).count(), 1);
        assert_eq!(service.list_machines().len(), 3);
    }

    #[test]
    fn test_describe_due() {
        let today = date(2024, 6, 20);
        assert_eq!(describe_due(&DeadlineStatus::evaluate(today, today)), "due today");
        assert_eq!(
            describe_due(&DeadlineStatus::evaluate(date(2024, 6, 15), today)),
            "overdue by 5 days"
        );
        assert_eq!(
            describe_due(&DeadlineStatus::evaluate(date(2024, 6, 29), today)),
            "in 9 days"
        );
    }
}
