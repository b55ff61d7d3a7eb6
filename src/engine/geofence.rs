use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::AppError;
use crate::geo::haversine_m;
use crate::models::event::{Alert, FleetEvent, Severity};
use crate::models::geofence::{
    GeoPoint, Geofence, GeofenceEvent, GeofenceEventKind, GeofenceKind,
};
use crate::state::FleetState;

/// Radius of the auto-provisioned delivery-area geofence around a customer.
const CUSTOMER_GEOFENCE_RADIUS_M: f64 = 50.0;

#[derive(Debug, Clone)]
pub struct ProximityPing {
    pub position: GeoPoint,
    pub driver_id: Option<Uuid>,
    pub vehicle_id: Option<Uuid>,
    pub job_id: Option<Uuid>,
}

/// Evaluates one position against every active geofence independently; a
/// single ping can enter several overlapping fences. A fence fires when the
/// position is inside its radius (boundary inclusive), it alerts on entry,
/// and the (geofence, driver) pair is past its cool-down window — the
/// cool-down claim is atomic, so jittery GPS samples near a boundary cannot
/// double-record.
pub fn check_proximity(
    state: &FleetState,
    ping: &ProximityPing,
    at: DateTime<Utc>,
) -> Vec<GeofenceEvent> {
    let active: Vec<Geofence> = state
        .geofences
        .iter()
        .filter(|entry| entry.value().active)
        .map(|entry| entry.value().clone())
        .collect();

    let mut events = Vec::new();
    for fence in active {
        let distance = haversine_m(&ping.position, &fence.center);
        if distance > fence.radius_m || !fence.alert_on_entry {
            continue;
        }

        if !state.claim_geofence_entry(fence.id, ping.driver_id, at) {
            debug!(
                geofence_id = %fence.id,
                driver_id = ?ping.driver_id,
                "entry suppressed inside cool-down window"
            );
            continue;
        }

        let alert = entry_alert(state, &fence);
        let alert_sent = state
            .events_tx
            .send(FleetEvent::GeofenceAlert {
                alert: alert.clone(),
            })
            .is_ok();

        let event = GeofenceEvent {
            id: Uuid::new_v4(),
            geofence_id: fence.id,
            driver_id: ping.driver_id,
            vehicle_id: ping.vehicle_id,
            job_id: ping.job_id,
            kind: GeofenceEventKind::Entry,
            position: ping.position,
            recorded_at: at,
            alert_sent,
        };
        state.geofence_events.insert(event.id, event.clone());
        state
            .metrics
            .geofence_entries_total
            .with_label_values(&[fence.kind.as_label()])
            .inc();

        info!(
            geofence_id = %fence.id,
            driver_id = ?ping.driver_id,
            distance_m = distance,
            "geofence entry recorded"
        );
        events.push(event);
    }

    events
}

fn entry_alert(state: &FleetState, fence: &Geofence) -> Alert {
    let customer_name = fence
        .customer_id
        .and_then(|id| state.customers.get(&id).map(|c| c.name.clone()));

    let message = match (fence.kind, customer_name) {
        (GeofenceKind::CustomerAddress, Some(name)) => {
            format!("Driver entered {name} delivery area")
        }
        _ => format!("Driver entered geofence: {}", fence.name),
    };
    let severity = if fence.kind == GeofenceKind::RestrictedArea {
        Severity::Urgent
    } else {
        Severity::Medium
    };

    Alert {
        kind: "geofence_entry".to_string(),
        message,
        severity,
        related_entity_type: "geofence".to_string(),
        related_entity_id: fence.id,
    }
}

/// Finds or creates the 50 m delivery-area geofence for a customer. The
/// customer row lock is held across the lookup and the insert, so two
/// concurrent calls cannot provision duplicates.
pub fn ensure_customer_geofence(
    state: &FleetState,
    customer_id: Uuid,
) -> Result<Geofence, AppError> {
    let customer = state
        .customers
        .get_mut(&customer_id)
        .ok_or_else(|| AppError::NotFound(format!("customer {customer_id} not found")))?;

    let Some(center) = customer.location else {
        return Err(AppError::InvalidArgument(format!(
            "customer {customer_id} has no coordinates"
        )));
    };

    if let Some(existing) = state.geofences.iter().find(|entry| {
        let fence = entry.value();
        fence.customer_id == Some(customer_id) && fence.kind == GeofenceKind::CustomerAddress
    }) {
        return Ok(existing.value().clone());
    }

    let fence = Geofence {
        id: Uuid::new_v4(),
        name: format!("{} delivery area", customer.name),
        kind: GeofenceKind::CustomerAddress,
        center,
        radius_m: CUSTOMER_GEOFENCE_RADIUS_M,
        active: true,
        alert_on_entry: true,
        alert_on_exit: false,
        alert_on_dwell: false,
        customer_id: Some(customer_id),
    };
    state.geofences.insert(fence.id, fence.clone());
    info!(customer_id = %customer_id, geofence_id = %fence.id, "provisioned customer geofence");

    Ok(fence)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    use super::{check_proximity, ensure_customer_geofence, ProximityPing};
    use crate::error::AppError;
    use crate::geo::haversine_m;
    use crate::models::customer::Customer;
    use crate::models::event::{FleetEvent, Severity};
    use crate::models::geofence::{GeoPoint, Geofence, GeofenceKind};
    use crate::state::FleetState;

    const CENTER: GeoPoint = GeoPoint {
        lat: 52.5200,
        lng: 13.4050,
    };
    const NEARBY: GeoPoint = GeoPoint {
        lat: 52.5204,
        lng: 13.4050,
    };

    fn state() -> FleetState {
        FleetState::new(16, 300)
    }

    fn add_fence(state: &FleetState, kind: GeofenceKind, radius_m: f64) -> Uuid {
        let fence = Geofence {
            id: Uuid::new_v4(),
            name: "Harbor depot".to_string(),
            kind,
            center: CENTER,
            radius_m,
            active: true,
            alert_on_entry: true,
            alert_on_exit: false,
            alert_on_dwell: false,
            customer_id: None,
        };
        let id = fence.id;
        state.geofences.insert(id, fence);
        id
    }

    fn ping(driver_id: Uuid) -> ProximityPing {
        ProximityPing {
            position: NEARBY,
            driver_id: Some(driver_id),
            vehicle_id: None,
            job_id: None,
        }
    }

    #[test]
    fn position_inside_radius_records_an_entry() {
        let state = state();
        let fence_id = add_fence(&state, GeofenceKind::Depot, 100.0);
        let driver_id = Uuid::new_v4();

        let events = check_proximity(&state, &ping(driver_id), Utc::now());

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].geofence_id, fence_id);
        assert_eq!(events[0].driver_id, Some(driver_id));
        assert_eq!(state.events_for_geofence(fence_id).len(), 1);
    }

    #[test]
    fn boundary_is_inclusive() {
        let state = state();
        let exact = haversine_m(&NEARBY, &CENTER);

        add_fence(&state, GeofenceKind::Depot, exact);
        let events = check_proximity(&state, &ping(Uuid::new_v4()), Utc::now());
        assert_eq!(events.len(), 1);

        let tight = FleetState::new(16, 300);
        add_fence(&tight, GeofenceKind::Depot, exact - 0.01);
        let events = check_proximity(&tight, &ping(Uuid::new_v4()), Utc::now());
        assert!(events.is_empty());
    }

    #[test]
    fn repeat_ping_inside_cooldown_is_suppressed() {
        let state = state();
        add_fence(&state, GeofenceKind::Depot, 100.0);
        let driver_id = Uuid::new_v4();
        let first_at = Utc::now();

        let first = check_proximity(&state, &ping(driver_id), first_at);
        let second = check_proximity(&state, &ping(driver_id), first_at + Duration::minutes(2));

        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
        assert_eq!(state.geofence_events.len(), 1);
    }

    #[test]
    fn ping_after_cooldown_records_again() {
        let state = state();
        add_fence(&state, GeofenceKind::Depot, 100.0);
        let driver_id = Uuid::new_v4();
        let first_at = Utc::now();

        check_proximity(&state, &ping(driver_id), first_at);
        let later = check_proximity(&state, &ping(driver_id), first_at + Duration::minutes(6));

        assert_eq!(later.len(), 1);
        assert_eq!(state.geofence_events.len(), 2);
    }

    #[test]
    fn other_drivers_are_deduplicated_independently() {
        let state = state();
        add_fence(&state, GeofenceKind::Depot, 100.0);
        let at = Utc::now();

        check_proximity(&state, &ping(Uuid::new_v4()), at);
        let other = check_proximity(&state, &ping(Uuid::new_v4()), at + Duration::minutes(1));

        assert_eq!(other.len(), 1);
    }

    #[test]
    fn overlapping_fences_all_fire() {
        let state = state();
        add_fence(&state, GeofenceKind::Depot, 100.0);
        add_fence(&state, GeofenceKind::RestrictedArea, 200.0);

        let events = check_proximity(&state, &ping(Uuid::new_v4()), Utc::now());
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn inactive_fence_never_fires() {
        let state = state();
        let fence_id = add_fence(&state, GeofenceKind::Depot, 100.0);
        state.geofences.get_mut(&fence_id).unwrap().active = false;

        let events = check_proximity(&state, &ping(Uuid::new_v4()), Utc::now());
        assert!(events.is_empty());
    }

    #[test]
    fn customer_fence_alert_names_the_customer() {
        let state = state();
        let customer = Customer {
            id: Uuid::new_v4(),
            name: "Nordsee Kontor".to_string(),
            address: "Kaistrasse 1".to_string(),
            location: Some(CENTER),
        };
        let customer_id = customer.id;
        state.customers.insert(customer_id, customer);
        ensure_customer_geofence(&state, customer_id).unwrap();

        let mut rx = state.events_tx.subscribe();
        let at_center = ProximityPing {
            position: CENTER,
            driver_id: Some(Uuid::new_v4()),
            vehicle_id: None,
            job_id: None,
        };
        let events = check_proximity(&state, &at_center, Utc::now());

        assert_eq!(events.len(), 1);
        assert!(events[0].alert_sent);
        match rx.try_recv().unwrap() {
            FleetEvent::GeofenceAlert { alert } => {
                assert_eq!(alert.message, "Driver entered Nordsee Kontor delivery area");
                assert_eq!(alert.severity, Severity::Medium);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn restricted_area_alert_is_urgent() {
        let state = state();
        let fence_id = add_fence(&state, GeofenceKind::RestrictedArea, 100.0);

        let mut rx = state.events_tx.subscribe();
        check_proximity(&state, &ping(Uuid::new_v4()), Utc::now());

        match rx.try_recv().unwrap() {
            FleetEvent::GeofenceAlert { alert } => {
                assert_eq!(alert.severity, Severity::Urgent);
                assert_eq!(alert.message, "Driver entered geofence: Harbor depot");
                assert_eq!(alert.related_entity_id, fence_id);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn customer_geofence_provisioning_is_idempotent() {
        let state = state();
        let customer = Customer {
            id: Uuid::new_v4(),
            name: "Nordsee Kontor".to_string(),
            address: "Kaistrasse 1".to_string(),
            location: Some(CENTER),
        };
        let customer_id = customer.id;
        state.customers.insert(customer_id, customer);

        let first = ensure_customer_geofence(&state, customer_id).unwrap();
        let second = ensure_customer_geofence(&state, customer_id).unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.radius_m, 50.0);
        assert_eq!(first.kind, GeofenceKind::CustomerAddress);
        assert!(first.name.contains("Nordsee Kontor"));
        assert_eq!(state.geofences.len(), 1);
    }

    #[test]
    fn customer_without_coordinates_is_rejected() {
        let state = state();
        let customer = Customer {
            id: Uuid::new_v4(),
            name: "Nordsee Kontor".to_string(),
            address: "Kaistrasse 1".to_string(),
            location: None,
        };
        let customer_id = customer.id;
        state.customers.insert(customer_id, customer);

        let err = ensure_customer_geofence(&state, customer_id).unwrap_err();
        assert!(matches!(err, AppError::InvalidArgument(_)));

        let err = ensure_customer_geofence(&state, Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
