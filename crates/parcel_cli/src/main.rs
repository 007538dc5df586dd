//! Demo entry point for the parcel tracker.
//!
//! # Responsibility
//! - Wire config, logging and storage the way an embedding application would.
//! - Walk one parcel through the delivery flow and print each step.

use parcel_core::db::open_db;
use parcel_core::{
    init_logging, ClientId, ParcelService, RepoError, SqliteParcelRepository, TrackerConfig,
};
use std::error::Error;
use std::process::ExitCode;

const DEMO_CLIENT: ClientId = 1000;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("event=cli_run module=cli status=error error={err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let config = TrackerConfig::from_env()?;
    if let Some(log_dir) = config.log_dir.as_deref() {
        init_logging(&config.log_level, log_dir)?;
    }

    let conn = open_db(&config.db_path)?;
    let repo = SqliteParcelRepository::try_new(&conn)?.with_gate_mode(config.gate_mode);
    let service = ParcelService::new(repo);

    let parcel = service.register(DEMO_CLIENT, "Pskov, Sadovaya 1")?;
    println!(
        "registered parcel {} for client {} at {} (status {})",
        parcel.number, parcel.client, parcel.created_at, parcel.status
    );

    service.change_address(parcel.number, "Saratov, Lenina 10")?;
    println!("parcel {} address changed", parcel.number);

    let status = service.advance_status(parcel.number)?;
    println!("parcel {} status is now {status}", parcel.number);

    for stored in service.parcels_for_client(DEMO_CLIENT)? {
        println!(
            "  #{} {} [{}] created {}",
            stored.number, stored.address, stored.status, stored.created_at
        );
    }

    match service.cancel(parcel.number) {
        Err(RepoError::InvalidStateTransition { status, .. }) => {
            println!("parcel {} cannot be cancelled while {status}", parcel.number);
        }
        Err(err) => return Err(err.into()),
        Ok(()) => println!("parcel {} cancelled", parcel.number),
    }

    Ok(())
}
