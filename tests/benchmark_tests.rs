//! Performance benchmarks for dispatch and registry hot paths

use client::network::{client_dispatcher, ClientCtx};
use client::store::ClientStore;
use server::network::{server_dispatcher, ServerState};
use shared::{procedures, Call, DeviceInfo, RegisterDevice};
use std::time::Instant;
use tokio::sync::mpsc;

/// Benchmarks server-push dispatch through the client store
#[test]
fn benchmark_push_dispatch_throughput() {
    let mut dispatcher = client_dispatcher();
    let mut ctx = ClientCtx::new(ClientStore::new());
    ctx.store.subscribe(|_| {});

    let iterations: u64 = 10_000;
    let start = Instant::now();

    for age in 0..iterations {
        let call = Call::new(procedures::ON_UPDATE_AGE, &age).unwrap();
        dispatcher.dispatch(&mut ctx, &call).unwrap();
    }

    let duration = start.elapsed();
    println!(
        "Push dispatch: {} calls in {:?} ({:.2} µs/call)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert_eq!(ctx.store.get_client_state().server_call_count, iterations);
    assert_eq!(ctx.store.get_client_state().last_update_age, iterations - 1);

    // Decode, validate, apply, and notify should stay well under a second
    assert!(duration.as_millis() < 1000);
}

/// Benchmarks session creation including the uniqueness guarantee
#[test]
fn benchmark_session_creation_throughput() {
    let (out_tx, _out_rx) = mpsc::unbounded_channel();
    let mut state = ServerState::new(out_tx);
    let device = DeviceInfo {
        device_id: "d1".to_string(),
        device_name: "Judge Phone".to_string(),
        connected_at: 1,
        is_online: true,
    };

    let iterations = 1_000;
    let start = Instant::now();

    for _ in 0..iterations {
        state
            .registry
            .create_session(&device, "Judge Phone")
            .unwrap();
    }

    let duration = start.elapsed();
    println!(
        "Session creation: {} sessions in {:?} ({:.2} µs/session)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert_eq!(state.registry.len(), iterations);
    assert_eq!(
        state.registry.sessions_for_device("d1").len(),
        iterations
    );
    assert!(duration.as_millis() < 1000);
}

/// Benchmarks full request dispatch including decode and validation
#[test]
fn benchmark_registration_dispatch_throughput() {
    let (out_tx, mut out_rx) = mpsc::unbounded_channel();
    let mut state = ServerState::new(out_tx);
    let mut dispatcher = server_dispatcher();
    state.reply_to = Some("127.0.0.1:9100".parse().unwrap());

    let iterations = 5_000;
    let start = Instant::now();

    for i in 0..iterations {
        let call = Call::new(
            procedures::REGISTER_DEVICE,
            &RegisterDevice {
                device_id: format!("d{}", i),
                device_name: "Judge Phone".to_string(),
            },
        )
        .unwrap();
        dispatcher.dispatch(&mut state, &call).unwrap();
    }

    let duration = start.elapsed();
    println!(
        "Registration dispatch: {} calls in {:?} ({:.2} µs/call)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert_eq!(state.presence.len(), iterations);
    let mut replies = 0;
    while out_rx.try_recv().is_ok() {
        replies += 1;
    }
    assert_eq!(replies, iterations);
    assert!(duration.as_millis() < 2000);
}
