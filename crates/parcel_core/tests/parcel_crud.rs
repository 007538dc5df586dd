use parcel_core::db::open_db_in_memory;
use parcel_core::{
    ClientId, Parcel, ParcelRepository, ParcelStatus, ParcelValidationError, RepoError,
    SqliteParcelRepository,
};
use rusqlite::{params, Connection};
use std::collections::HashMap;

const FIXED_CREATED_AT: &str = "2024-03-01T10:15:00Z";

fn test_parcel(client: ClientId) -> Parcel {
    Parcel::with_created_at(client, "test", FIXED_CREATED_AT)
}

#[test]
fn add_get_roundtrip_assigns_fresh_number() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteParcelRepository::try_new(&conn).unwrap();

    let mut parcel = test_parcel(1000);
    let number = repo.add(&parcel).unwrap();
    assert!(number > 0);

    parcel.number = number;
    assert_eq!(repo.get(number).unwrap(), parcel);
}

#[test]
fn add_assigns_distinct_numbers() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteParcelRepository::try_new(&conn).unwrap();

    let first = repo.add(&test_parcel(1)).unwrap();
    let second = repo.add(&test_parcel(1)).unwrap();
    assert_ne!(first, second);
}

#[test]
fn add_rejects_preassigned_number_and_bad_timestamp() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteParcelRepository::try_new(&conn).unwrap();

    let mut numbered = test_parcel(1);
    numbered.number = 42;
    let err = repo.add(&numbered).unwrap_err();
    assert!(matches!(
        err,
        RepoError::Validation(ParcelValidationError::NumberAlreadyAssigned(42))
    ));

    let undated = Parcel::with_created_at(1, "test", "last tuesday");
    let err = repo.add(&undated).unwrap_err();
    assert!(matches!(
        err,
        RepoError::Validation(ParcelValidationError::InvalidCreatedAt(_))
    ));
    assert_eq!(row_count(&conn), 0);
}

#[test]
fn add_reports_missing_assigned_number_as_storage_error() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteParcelRepository::try_new(&conn).unwrap();
    conn.execute_batch(
        "CREATE TRIGGER swallow_parcel_insert BEFORE INSERT ON parcel
         BEGIN SELECT RAISE(IGNORE); END;",
    )
    .unwrap();

    let err = repo.add(&test_parcel(1000)).unwrap_err();
    assert!(matches!(err, RepoError::Db(_)), "unexpected error: {err}");
    assert_eq!(row_count(&conn), 0);
}

#[test]
fn iso8601_row_without_offset_is_readable_and_gated_normally() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteParcelRepository::try_new(&conn).unwrap();
    conn.execute(
        "INSERT INTO parcel (client, status, address, created_at)
         VALUES (9, 'registered', 'a', '2024-03-01 10:00:00');",
        [],
    )
    .unwrap();
    let number = conn.last_insert_rowid();

    let loaded = repo.get(number).unwrap();
    assert_eq!(loaded.created_at, "2024-03-01 10:00:00");
    assert_eq!(repo.get_by_client(9).unwrap(), vec![loaded]);

    repo.set_address(number, "b").unwrap();
    assert_eq!(repo.get(number).unwrap().address, "b");
    repo.delete(number).unwrap();
    assert!(matches!(repo.get(number), Err(RepoError::NotFound(_))));

    let local = Parcel::with_created_at(9, "c", "2024-03-01T10:00:00");
    let added = repo.add(&local).unwrap();
    assert_eq!(repo.get(added).unwrap().created_at, "2024-03-01T10:00:00");
}

#[test]
fn get_missing_returns_not_found() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteParcelRepository::try_new(&conn).unwrap();

    let err = repo.get(9999).unwrap_err();
    assert!(matches!(err, RepoError::NotFound(9999)));
}

#[test]
fn set_status_is_unconditional() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteParcelRepository::try_new(&conn).unwrap();
    let number = repo.add(&test_parcel(1000)).unwrap();

    for status in [
        ParcelStatus::Sent,
        ParcelStatus::Delivered,
        ParcelStatus::Registered,
        ParcelStatus::Other("returned".to_string()),
        ParcelStatus::Delivered,
    ] {
        repo.set_status(number, &status).unwrap();
        assert_eq!(repo.get(number).unwrap().status, status);
    }
}

#[test]
fn set_status_on_missing_parcel_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteParcelRepository::try_new(&conn).unwrap();

    let err = repo.set_status(404, &ParcelStatus::Sent).unwrap_err();
    assert!(matches!(err, RepoError::NotFound(404)));
}

#[test]
fn set_status_rejects_blank_status() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteParcelRepository::try_new(&conn).unwrap();
    let number = repo.add(&test_parcel(1000)).unwrap();

    let err = repo
        .set_status(number, &ParcelStatus::Other(String::new()))
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::Validation(ParcelValidationError::EmptyStatus)
    ));
    assert_eq!(repo.get(number).unwrap().status, ParcelStatus::Registered);
}

#[test]
fn get_by_client_returns_exactly_the_clients_parcels() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteParcelRepository::try_new(&conn).unwrap();
    let client: ClientId = 4_815_162;

    let mut expected = HashMap::new();
    for (index, owner) in [client, 7, client, 8, 7, client].into_iter().enumerate() {
        let mut parcel = Parcel::with_created_at(
            owner,
            format!("address {index}"),
            format!("2024-03-0{}T10:00:00+03:00", index + 1),
        );
        parcel.number = repo.add(&parcel).unwrap();
        if owner == client {
            expected.insert(parcel.number, parcel);
        }
    }

    let stored = repo.get_by_client(client).unwrap();
    assert_eq!(stored.len(), 3);
    for parcel in &stored {
        assert_eq!(expected.get(&parcel.number), Some(parcel));
    }

    let numbers: Vec<_> = stored.iter().map(|parcel| parcel.number).collect();
    let mut sorted = numbers.clone();
    sorted.sort_unstable();
    assert_eq!(numbers, sorted, "parcels come back in insertion order");
}

#[test]
fn get_by_client_without_parcels_is_empty() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteParcelRepository::try_new(&conn).unwrap();
    repo.add(&test_parcel(1)).unwrap();

    assert!(repo.get_by_client(2).unwrap().is_empty());
}

#[test]
fn get_by_client_aborts_on_undecodable_status() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteParcelRepository::try_new(&conn).unwrap();
    repo.add(&test_parcel(77)).unwrap();
    conn.execute(
        "INSERT INTO parcel (client, status, address, created_at) VALUES (?1, X'00FF', 'x', ?2);",
        params![77, FIXED_CREATED_AT],
    )
    .unwrap();
    repo.add(&test_parcel(77)).unwrap();

    let err = repo.get_by_client(77).unwrap_err();
    match err {
        RepoError::InvalidData(message) => assert!(message.contains("status")),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn get_by_client_aborts_on_malformed_timestamp() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteParcelRepository::try_new(&conn).unwrap();
    repo.add(&test_parcel(78)).unwrap();
    conn.execute(
        "INSERT INTO parcel (client, status, address, created_at) VALUES (78, 'sent', 'x', 'soon');",
        [],
    )
    .unwrap();

    let err = repo.get_by_client(78).unwrap_err();
    assert!(matches!(err, RepoError::InvalidData(_)));
}

#[test]
fn get_reports_corrupt_row_instead_of_empty_parcel() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteParcelRepository::try_new(&conn).unwrap();
    let number = repo.add(&test_parcel(5)).unwrap();
    conn.execute(
        "UPDATE parcel SET client = 'nobody' WHERE number = ?1;",
        [number],
    )
    .unwrap();

    let err = repo.get(number).unwrap_err();
    match err {
        RepoError::InvalidData(message) => assert!(message.contains("client")),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn unknown_status_text_survives_roundtrip() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteParcelRepository::try_new(&conn).unwrap();

    let mut parcel = test_parcel(3);
    parcel.status = ParcelStatus::from("held_at_customs");
    let number = repo.add(&parcel).unwrap();

    let loaded = repo.get(number).unwrap();
    assert_eq!(
        loaded.status,
        ParcelStatus::Other("held_at_customs".to_string())
    );
    assert!(!loaded.is_mutable());
}

fn row_count(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM parcel;", [], |row| row.get(0))
        .unwrap()
}
