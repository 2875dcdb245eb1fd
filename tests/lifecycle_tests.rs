mod common;

use rust_decimal::Decimal;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use common::{harness, harness_with, test_config, tomorrow};
use washflow::backend::{MemoryBackend, Operation};
use washflow::dto::AcceptJobRequest;
use washflow::models::{NewWashRequest, UserRole, WashRequestPatch, WashStatus};
use washflow::services::{NotificationKind, RefreshOutcome};
use washflow::AppError;

#[tokio::test(start_paused = true)]
async fn test_accept_job_confirms_with_technician() {
    let h = harness();
    let customer = Uuid::new_v4();
    let id = h.seed_request(customer, "pending", None, &[Uuid::new_v4()]);
    let tech = h.sign_in_as(UserRole::Technician, None).await;

    let accepted = h
        .state
        .wash_requests
        .accept_job(AcceptJobRequest::new(id, tech.id))
        .await
        .unwrap();
    assert_eq!(accepted.status, WashStatus::Confirmed);
    assert_eq!(accepted.technician_id, Some(tech.id));

    let row = h.request_row(id);
    assert_eq!(row["status"], "confirmed");
    assert_eq!(row["technician_id"], json!(tech.id));
    assert_eq!(h.backend.count_calls(Operation::Update, "wash_requests"), 2);
    assert!(h.state.outbox.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_accept_job_second_step_failure_is_recoverable() {
    let h = harness();
    let id = h.seed_request(Uuid::new_v4(), "pending", None, &[Uuid::new_v4()]);
    let tech = h.sign_in_as(UserRole::Technician, None).await;

    // el primer PATCH pasa, el segundo falla
    h.backend.fail_after(Operation::Update, Some("wash_requests"), 1, 1);
    let result = h
        .state
        .wash_requests
        .accept_job(AcceptJobRequest::new(id, tech.id))
        .await;
    assert!(matches!(result, Err(AppError::ExternalApi(_))));

    let row = h.request_row(id);
    assert_eq!(row["status"], "pending");
    assert_eq!(row["technician_id"], json!(tech.id));
    let local = h.state.wash_requests.get_by_id(id).unwrap();
    assert_eq!(local.status, WashStatus::Pending);
    assert_eq!(local.technician_id, Some(tech.id));
    assert_eq!(h.state.outbox.pending().len(), 1);

    let retried = h
        .state
        .wash_requests
        .accept_job(AcceptJobRequest::new(id, tech.id))
        .await
        .unwrap();
    assert_eq!(retried.status, WashStatus::Confirmed);
    assert_eq!(h.request_row(id)["status"], "confirmed");

    // la entrada del intento fallido se reejecuta como no-op
    let report = h.state.reconcile_pending().await;
    assert_eq!(report.replayed, 1);
    assert!(h.state.outbox.is_empty());
    assert_eq!(h.request_row(id)["status"], "confirmed");
}

#[tokio::test(start_paused = true)]
async fn test_accept_job_single_patch_mode() {
    let config = washflow::config::EnvironmentConfig {
        accept_job_split_updates: false,
        ..test_config()
    };
    let h = harness_with(config, Arc::new(MemoryBackend::new()));
    let id = h.seed_request(Uuid::new_v4(), "pending", None, &[Uuid::new_v4()]);
    let tech = h.sign_in_as(UserRole::Technician, None).await;

    let start = tomorrow() + chrono::Duration::hours(2);
    h.state
        .wash_requests
        .accept_job(AcceptJobRequest::new(id, tech.id).scheduled(start, None))
        .await
        .unwrap();

    assert_eq!(h.backend.count_calls(Operation::Update, "wash_requests"), 1);
    let row = h.request_row(id);
    assert_eq!(row["status"], "confirmed");
    assert_eq!(row["preferred_date_start"], json!(start));
}

#[tokio::test(start_paused = true)]
async fn test_taken_job_is_a_conflict() {
    let h = harness();
    let other = Uuid::new_v4();
    let id = h.seed_request(Uuid::new_v4(), "pending", Some(other), &[Uuid::new_v4()]);
    let tech = h.sign_in_as(UserRole::Technician, None).await;

    let result = h
        .state
        .wash_requests
        .accept_job(AcceptJobRequest::new(id, tech.id))
        .await;
    assert!(matches!(result, Err(AppError::Conflict(_))));
    assert_eq!(h.request_row(id)["technician_id"], json!(other));
    assert_eq!(h.backend.count_calls(Operation::Update, "wash_requests"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_generic_update_cannot_take_an_assigned_job() {
    let h = harness();
    let other = Uuid::new_v4();
    let id = h.seed_request(Uuid::new_v4(), "pending", Some(other), &[Uuid::new_v4()]);
    let tech = h.sign_in_as(UserRole::Technician, None).await;

    let confirm = WashRequestPatch {
        status: Some(WashStatus::Confirmed),
        technician_id: Some(Some(tech.id)),
        ..Default::default()
    };
    let result = h.state.wash_requests.update_request(id, confirm).await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));

    let claim = WashRequestPatch {
        technician_id: Some(Some(tech.id)),
        ..Default::default()
    };
    let result = h.state.wash_requests.update_request(id, claim).await;
    assert!(matches!(result, Err(AppError::Conflict(_))));

    let row = h.request_row(id);
    assert_eq!(row["status"], "pending");
    assert_eq!(row["technician_id"], json!(other));
    assert_eq!(h.backend.count_calls(Operation::Update, "wash_requests"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_customer_cannot_accept_jobs() {
    let h = harness();
    let customer = h.sign_in_as(UserRole::Customer, None).await;
    let id = h.seed_request(customer.id, "pending", None, &[Uuid::new_v4()]);

    let result = h
        .state
        .wash_requests
        .accept_job(AcceptJobRequest::new(id, customer.id))
        .await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));
}

#[tokio::test(start_paused = true)]
async fn test_full_lifecycle_and_terminal_states() {
    let h = harness();
    let id = h.seed_request(Uuid::new_v4(), "pending", None, &[Uuid::new_v4()]);
    let tech = h.sign_in_as(UserRole::Technician, None).await;
    let service = &h.state.wash_requests;

    service.accept_job(AcceptJobRequest::new(id, tech.id)).await.unwrap();
    assert_eq!(service.start_wash(id).await.unwrap().status, WashStatus::InProgress);
    assert_eq!(service.complete_wash(id).await.unwrap().status, WashStatus::Completed);
    assert_eq!(h.request_row(id)["status"], "completed");

    let updates = h.backend.count_calls(Operation::Update, "wash_requests");
    assert!(matches!(
        service.cancel(id).await,
        Err(AppError::IllegalTransition { .. })
    ));
    assert!(matches!(
        service.start_wash(id).await,
        Err(AppError::IllegalTransition { .. })
    ));
    assert_eq!(h.backend.count_calls(Operation::Update, "wash_requests"), updates);
}

#[tokio::test(start_paused = true)]
async fn test_illegal_start_from_pending_is_rejected() {
    let h = harness();
    let id = h.seed_request(Uuid::new_v4(), "pending", None, &[Uuid::new_v4()]);
    h.sign_in_as(UserRole::Technician, None).await;
    h.state.wash_requests.refresh(true).await.unwrap();

    let result = h.state.wash_requests.start_wash(id).await;
    assert!(matches!(result, Err(AppError::IllegalTransition { .. })));
    assert_eq!(h.state.wash_requests.get_by_id(id).unwrap().status, WashStatus::Pending);
    assert_eq!(h.backend.count_calls(Operation::Update, "wash_requests"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_failed_update_rolls_back_local_entry() {
    let h = harness();
    let tech = h.sign_in_as(UserRole::Technician, None).await;
    let id = h.seed_request(Uuid::new_v4(), "confirmed", Some(tech.id), &[Uuid::new_v4()]);
    h.state.wash_requests.refresh(true).await.unwrap();

    // falla la escritura y también el resync, así solo queda el rollback local
    h.backend.fail_next(Operation::Update, Some("wash_requests"), 1);
    h.backend.fail_next(Operation::Select, Some("wash_requests"), 1);
    let result = h.state.wash_requests.start_wash(id).await;

    assert!(matches!(result, Err(AppError::ExternalApi(_))));
    assert_eq!(h.state.wash_requests.get_by_id(id).unwrap().status, WashStatus::Confirmed);
    assert_eq!(h.request_row(id)["status"], "confirmed");
}

#[tokio::test(start_paused = true)]
async fn test_failed_update_shows_a_single_error() {
    let h = harness();
    let tech = h.sign_in_as(UserRole::Technician, None).await;
    let id = h.seed_request(Uuid::new_v4(), "confirmed", Some(tech.id), &[Uuid::new_v4()]);
    h.state.wash_requests.refresh(true).await.unwrap();
    let mut notifications = h.state.notifier.subscribe();

    h.backend.fail_next(Operation::Update, Some("wash_requests"), 1);
    h.backend.fail_next(Operation::Select, Some("wash_requests"), 1);
    assert!(h.state.wash_requests.start_wash(id).await.is_err());

    let mut errors = Vec::new();
    while let Ok(notification) = notifications.try_recv() {
        if notification.kind == NotificationKind::Error {
            errors.push(notification.title);
        }
    }
    assert_eq!(errors.len(), 1, "{:?}", errors);
    assert_ne!(errors[0], "Could not load wash requests");
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_update_is_busy() {
    let h = harness();
    let tech = h.sign_in_as(UserRole::Technician, None).await;
    let id = h.seed_request(Uuid::new_v4(), "confirmed", Some(tech.id), &[Uuid::new_v4()]);
    h.state.wash_requests.refresh(true).await.unwrap();

    h.backend.set_latency(Some(Duration::from_millis(50)));
    let service = h.state.wash_requests.clone();
    let first = tokio::spawn(async move { service.start_wash(id).await });
    tokio::time::sleep(Duration::from_millis(1)).await;

    let second = h.state.wash_requests.cancel(id).await;
    assert!(matches!(second, Err(AppError::Busy)));

    let first = first.await.unwrap().unwrap();
    assert_eq!(first.status, WashStatus::InProgress);
    assert_eq!(h.backend.count_calls(Operation::Update, "wash_requests"), 1);
    assert_eq!(h.request_row(id)["status"], "in_progress");
}

#[tokio::test(start_paused = true)]
async fn test_update_vehicles_rewrites_membership() {
    let h = harness();
    let customer = h.sign_in_as(UserRole::Customer, None).await;
    let (a, b, c, d) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    let id = h.seed_request(customer.id, "pending", None, &[a, b]);
    let other = h.seed_request(customer.id, "pending", None, &[a]);

    let updated = h
        .state
        .wash_requests
        .update_vehicles(id, vec![c, d, c])
        .await
        .unwrap();
    assert_eq!(updated.vehicle_ids, vec![c, d]);
    assert_eq!(updated.price, Decimal::new(5000, 2));

    let mut linked = h.linked_vehicles(id);
    linked.sort();
    let mut expected = vec![c, d];
    expected.sort();
    assert_eq!(linked, expected);
    assert_eq!(h.linked_vehicles(other), vec![a]);
    assert!(h.state.outbox.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_update_vehicles_requires_one_vehicle() {
    let h = harness();
    let customer = h.sign_in_as(UserRole::Customer, None).await;
    let id = h.seed_request(customer.id, "pending", None, &[Uuid::new_v4()]);

    let result = h.state.wash_requests.update_vehicles(id, Vec::new()).await;
    assert!(matches!(result, Err(AppError::InvalidInput(_))));
    assert_eq!(h.linked_vehicles(id).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_refresh_within_window_is_deferred() {
    let h = harness();
    let admin = h.sign_in_as(UserRole::Admin, None).await;
    h.seed_request(admin.id, "pending", None, &[Uuid::new_v4()]);

    let service = &h.state.wash_requests;
    assert_eq!(service.refresh(false).await.unwrap(), RefreshOutcome::Refreshed(1));

    h.seed_request(admin.id, "pending", None, &[Uuid::new_v4()]);
    assert_eq!(service.refresh(false).await.unwrap(), RefreshOutcome::Deferred);
    assert_eq!(service.refresh(false).await.unwrap(), RefreshOutcome::Deferred);
    assert_eq!(service.list().len(), 1);

    tokio::time::sleep(Duration::from_millis(2100)).await;
    assert_eq!(service.list().len(), 2);
    // dos pedidos diferidos se ejecutan una sola vez
    assert_eq!(h.backend.count_calls(Operation::Select, "wash_requests"), 2);

    h.seed_request(admin.id, "pending", None, &[Uuid::new_v4()]);
    assert_eq!(service.refresh(true).await.unwrap(), RefreshOutcome::Refreshed(3));
}

#[tokio::test(start_paused = true)]
async fn test_technician_sees_own_and_open_jobs() {
    let h = harness();
    let tech = h.sign_in_as(UserRole::Technician, None).await;
    let mine = h.seed_request(Uuid::new_v4(), "confirmed", Some(tech.id), &[Uuid::new_v4()]);
    let open = h.seed_request(Uuid::new_v4(), "pending", None, &[Uuid::new_v4()]);
    h.seed_request(Uuid::new_v4(), "confirmed", Some(Uuid::new_v4()), &[Uuid::new_v4()]);

    h.state.wash_requests.refresh(true).await.unwrap();
    let mut ids: Vec<Uuid> = h.state.wash_requests.list().iter().map(|r| r.id).collect();
    ids.sort();
    let mut expected = vec![mine, open];
    expected.sort();
    assert_eq!(ids, expected);

    let available = h.state.wash_requests.available_jobs().await.unwrap();
    assert_eq!(available.len(), 1);
    assert_eq!(available[0].id, open);
}

fn new_request(vehicle_ids: Vec<Uuid>, location_id: Uuid) -> NewWashRequest {
    NewWashRequest {
        vehicle_ids,
        preferred_date_start: Some(tomorrow()),
        location_id: Some(location_id),
        ..Default::default()
    }
}

#[tokio::test(start_paused = true)]
async fn test_create_links_vehicles_and_prices() {
    let h = harness();
    let customer = h.sign_in_as(UserRole::Customer, None).await;
    let location = h.seed_location(None, customer.id, "Depot", true);
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

    let created = h
        .state
        .wash_requests
        .create(new_request(vec![a, b, a], location))
        .await
        .unwrap();
    assert_eq!(created.status, WashStatus::Pending);
    assert_eq!(created.vehicle_ids, vec![a, b]);
    assert_eq!(created.price, Decimal::new(5000, 2));
    assert_eq!(created.location.as_ref().map(|l| l.name.as_str()), Some("Depot"));
    assert_eq!(h.linked_vehicles(created.id).len(), 2);
    assert!(h.state.wash_requests.get_by_id(created.id).is_some());
}

#[tokio::test(start_paused = true)]
async fn test_create_falls_back_to_direct_insert() {
    let h = harness();
    let customer = h.sign_in_as(UserRole::Customer, None).await;
    let location = Uuid::new_v4();
    h.backend.fail_next(Operation::Insert, Some("wash_requests"), 1);

    let created = h
        .state
        .wash_requests
        .create(new_request(vec![Uuid::new_v4()], location))
        .await
        .unwrap();
    assert_eq!(h.backend.count_calls(Operation::InsertDirect, "wash_requests"), 1);
    assert_eq!(created.location_id, Some(location));
    // la fila de la ubicación no existe: se muestra un placeholder
    assert!(created.location.as_ref().map_or(false, |l| l.placeholder));
}

#[tokio::test(start_paused = true)]
async fn test_create_last_resort_drops_location() {
    let h = harness();
    h.sign_in_as(UserRole::Customer, None).await;
    h.backend.fail_next(Operation::Insert, Some("wash_requests"), 1);
    h.backend.fail_next(Operation::InsertDirect, Some("wash_requests"), 1);

    let created = h
        .state
        .wash_requests
        .create(new_request(vec![Uuid::new_v4()], Uuid::new_v4()))
        .await
        .unwrap();
    assert_eq!(created.location_id, None);
    assert_eq!(h.request_row(created.id)["location_id"], json!(null));
}

#[tokio::test(start_paused = true)]
async fn test_create_survives_a_failed_vehicle_link() {
    let h = harness();
    h.sign_in_as(UserRole::Customer, None).await;
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
    h.backend.fail_next(Operation::Insert, Some("wash_request_vehicles"), 1);

    let created = h
        .state
        .wash_requests
        .create(new_request(vec![a, b], Uuid::new_v4()))
        .await
        .unwrap();
    assert_eq!(created.vehicle_ids, vec![b]);
    assert_eq!(h.linked_vehicles(created.id), vec![b]);
}

#[tokio::test(start_paused = true)]
async fn test_create_validates_input() {
    let h = harness();
    h.sign_in_as(UserRole::Customer, None).await;

    let no_vehicles = h
        .state
        .wash_requests
        .create(new_request(Vec::new(), Uuid::new_v4()))
        .await;
    assert!(matches!(no_vehicles, Err(AppError::Validation(_))));

    let mut backwards = new_request(vec![Uuid::new_v4()], Uuid::new_v4());
    backwards.preferred_date_end = Some(tomorrow() - chrono::Duration::days(3));
    let result = h.state.wash_requests.create(backwards).await;
    assert!(matches!(result, Err(AppError::InvalidInput(_))));
    assert!(h.backend.rows("wash_requests").is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_wash_progress_flow_uploads_photos_and_completes() {
    let h = harness();
    let tech = h.sign_in_as(UserRole::Technician, None).await;
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
    let id = h.seed_request(Uuid::new_v4(), "in_progress", Some(tech.id), &[a, b]);
    let progress = &h.state.progress;

    let entries = progress.open(id).await.unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| !e.completed && !e.is_persisted()));

    progress.set_completed(id, a, true).unwrap();
    let incomplete = progress.complete(id).await;
    assert!(matches!(incomplete, Err(AppError::InvalidInput(_))));

    assert!(progress.attach_photo(id, b, "not a photo".to_string()).is_err());
    progress
        .attach_photo(id, b, "data:image/png;base64,aGVsbG8=".to_string())
        .unwrap();
    progress.set_notes(id, b, Some("Rear bumper scratched".to_string())).unwrap();
    progress.set_completed(id, b, true).unwrap();

    let completed = progress.complete(id).await.unwrap();
    assert_eq!(completed.status, WashStatus::Completed);
    assert_eq!(h.request_row(id)["status"], "completed");

    let rows = h.backend.rows("vehicle_wash_statuses");
    assert_eq!(rows.len(), 2);
    let photo_row = rows
        .iter()
        .find(|row| row["vehicle_id"] == json!(b))
        .unwrap();
    let path = photo_row["post_wash_photo"].as_str().unwrap();
    assert!(path.starts_with(&id.to_string()));
    assert!(path.ends_with(".png"));
    assert_eq!(h.backend.object("wash-photos", path), Some(b"hello".to_vec()));
    assert_eq!(photo_row["notes"], "Rear bumper scratched");
}

#[tokio::test(start_paused = true)]
async fn test_progress_complete_requires_started_wash() {
    let h = harness();
    let tech = h.sign_in_as(UserRole::Technician, None).await;
    let vehicle = Uuid::new_v4();
    let id = h.seed_request(Uuid::new_v4(), "confirmed", Some(tech.id), &[vehicle]);
    let progress = &h.state.progress;

    progress.open(id).await.unwrap();
    progress.set_completed(id, vehicle, true).unwrap();

    let result = progress.complete(id).await;
    assert!(matches!(result, Err(AppError::IllegalTransition { .. })));
    assert!(h.backend.rows("vehicle_wash_statuses").is_empty());
    let entries = progress.entries(id);
    assert_eq!(entries.len(), 1);
    assert!(entries[0].completed);
}

#[tokio::test(start_paused = true)]
async fn test_progress_survives_a_failed_completion() {
    let h = harness();
    let tech = h.sign_in_as(UserRole::Technician, None).await;
    let vehicle = Uuid::new_v4();
    let id = h.seed_request(Uuid::new_v4(), "in_progress", Some(tech.id), &[vehicle]);
    let progress = &h.state.progress;

    progress.open(id).await.unwrap();
    progress.set_completed(id, vehicle, true).unwrap();
    h.backend.fail_next(Operation::Update, Some("wash_requests"), 1);

    assert!(progress.complete(id).await.is_err());
    assert_eq!(h.request_row(id)["status"], "in_progress");
    let entries = progress.entries(id);
    assert_eq!(entries.len(), 1);
    assert!(entries[0].is_persisted());

    // el reintento no duplica filas
    let completed = progress.complete(id).await.unwrap();
    assert_eq!(completed.status, WashStatus::Completed);
    assert_eq!(h.backend.rows("vehicle_wash_statuses").len(), 1);
    assert!(progress.entries(id).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_save_and_exit_keeps_photo_inline_when_upload_fails() {
    let h = harness();
    let tech = h.sign_in_as(UserRole::Technician, None).await;
    let vehicle = Uuid::new_v4();
    let id = h.seed_request(Uuid::new_v4(), "in_progress", Some(tech.id), &[vehicle]);
    let progress = &h.state.progress;
    let photo = "data:image/jpeg;base64,aGVsbG8=".to_string();

    progress.open(id).await.unwrap();
    progress.attach_photo(id, vehicle, photo.clone()).unwrap();
    h.backend.fail_next(Operation::Upload, Some("wash-photos"), 1);

    let saved = progress.save_and_exit(id).await.unwrap();
    assert_eq!(saved[0].post_wash_photo.as_deref(), Some(photo.as_str()));
    assert!(saved[0].is_persisted());
    assert!(progress.entries(id).is_empty());

    // al reabrir se reutiliza la fila guardada
    let reopened = progress.open(id).await.unwrap();
    assert_eq!(reopened[0].id, saved[0].id);
    progress.set_completed(id, vehicle, true).unwrap();
    progress.save_and_exit(id).await.unwrap();
    assert_eq!(h.backend.rows("vehicle_wash_statuses").len(), 1);
    assert_eq!(h.request_row(id)["status"], "in_progress");
}
