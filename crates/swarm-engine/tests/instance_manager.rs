use glam::{Affine3A, Vec3};
use swarm_engine::backend::headless::{BufferWrite, HeadlessBackend, Release};
use swarm_engine::backend::BackendError;
use swarm_engine::instancing::{
    BufferKind, InstanceConfig, InstanceField, InstanceManager, InstanceRecord, InstancingError,
    ShadowCasting,
};

fn init(backend: &mut HeadlessBackend, max_instances: u32) -> InstanceManager {
    InstanceManager::init(
        backend,
        &"cell".to_string(),
        &"unlit".to_string(),
        InstanceConfig::new("test", max_instances),
    )
    .unwrap()
}

fn fill(manager: &mut InstanceManager, count: u32) {
    let mut mirror = manager.mirror_mut();
    for i in 0..count {
        let record = InstanceRecord::from_affine(
            Affine3A::from_translation(Vec3::new(i as f32, 0.0, 0.0)),
            [1.0, 0.0, 0.0, 1.0],
        );
        mirror.write(i, &record);
    }
}

// ── init ──────────────────────────────────────────────────────────────────

#[test]
fn unbounded_init_registers_one_batch() {
    let mut backend = HeadlessBackend::unbounded();
    let manager = init(&mut backend, 1000);

    let layout = manager.layout();
    assert_eq!(layout.capacity_per_window, 1000);
    assert_eq!(layout.window_count, 1);
    assert_eq!(layout.total_buffer_size, 112_000);

    assert_eq!(backend.live_batches(), 1);
    assert_eq!(backend.live_meshes(), 1);
    assert_eq!(backend.live_materials(), 1);
    assert_eq!(backend.buffer_bytes(manager.buffer()).unwrap().len(), 112_000);
    assert_eq!(manager.mirror().size_bytes(), 112_000);
}

#[test]
fn bounded_init_registers_batch_per_window() {
    let mut backend = HeadlessBackend::bounded(65536);
    let manager = init(&mut backend, 1200);

    assert_eq!(manager.batches().len(), 3);
    for (window, &batch) in manager.batches().iter().enumerate() {
        let desc = backend.batch(batch).unwrap();
        assert_eq!(desc.offset, window as u64 * 65536);
        assert_eq!(desc.window_size, 65536);
        assert_eq!(desc.capacity, 585);
        assert!(desc.bounds.is_infinite());
        assert_eq!(desc.attributes[0].field, InstanceField::ObjectToWorld);
        assert_eq!(desc.attributes[0].offset, 0);
        assert_eq!(desc.attributes[1].offset, 585 * 48);
        assert_eq!(desc.attributes[2].offset, 585 * 96);
        assert!(desc.attributes.iter().all(|a| a.per_instance));
    }
}

#[test]
fn buffer_size_respects_allocation_granularity() {
    let mut backend = HeadlessBackend::unbounded().with_granularity(256);
    let manager = init(&mut backend, 1000);
    assert_eq!(backend.buffer_bytes(manager.buffer()).unwrap().len(), 112_128);
    assert_eq!(manager.mirror().size_bytes(), 112_000);
}

#[test]
fn config_override_beats_backend_preference() {
    let mut backend = HeadlessBackend::unbounded();
    let config = InstanceConfig {
        buffer_kind: Some(BufferKind::Bounded { window_byte_limit: 16_384 }),
        ..InstanceConfig::new("override", 500)
    };
    let manager = InstanceManager::init(&mut backend, &String::new(), &String::new(), config).unwrap();
    assert_eq!(manager.layout().capacity_per_window, 146);
    assert_eq!(manager.batches().len(), 4);
}

#[test]
fn record_larger_than_window_fails_without_registering() {
    let mut backend = HeadlessBackend::bounded(64);
    let err = InstanceManager::init(
        &mut backend,
        &String::new(),
        &String::new(),
        InstanceConfig::new("too-big", 10),
    )
    .unwrap_err();

    assert!(matches!(err, InstancingError::RecordExceedsWindow { .. }));
    assert_eq!(backend.live_buffers(), 0);
    assert_eq!(backend.live_batches(), 0);
}

#[test]
fn oversized_buffer_reports_backend_error() {
    let mut backend = HeadlessBackend::unbounded().with_max_buffer_size(1024);
    let err = InstanceManager::init(
        &mut backend,
        &String::new(),
        &String::new(),
        InstanceConfig::new("huge", 1000),
    )
    .unwrap_err();
    assert_eq!(
        err,
        InstancingError::Backend(BackendError::BufferTooLarge { size: 112_000, limit: 1024 })
    );
}

// ── upload ────────────────────────────────────────────────────────────────

#[test]
fn full_unbounded_upload_is_single_bulk_copy() {
    let mut backend = HeadlessBackend::unbounded();
    let mut manager = init(&mut backend, 1000);
    fill(&mut manager, 1000);

    let plan = manager.upload(&mut backend, 1000).unwrap();
    assert_eq!(plan.copy_count(), 1);
    assert_eq!(
        backend.writes(),
        &[BufferWrite { buffer: manager.buffer(), offset: 0, len: 112_000 }]
    );
    assert_eq!(backend.buffer_bytes(manager.buffer()).unwrap(), manager.mirror().as_bytes());
    manager.shutdown(&mut backend);
}

#[test]
fn exact_window_multiple_uploads_without_field_copies() {
    let mut backend = HeadlessBackend::bounded(65536);
    let mut manager = init(&mut backend, 1200);

    let plan = manager.upload(&mut backend, 1170).unwrap();
    assert_eq!(plan.complete_windows, 2);
    assert_eq!(plan.remainder, 0);
    assert_eq!(backend.writes().len(), 1);
    assert_eq!(backend.writes()[0].len, 2 * 65536);
    manager.shutdown(&mut backend);
}

#[test]
fn one_past_window_multiple_adds_three_field_copies() {
    let mut backend = HeadlessBackend::bounded(65536);
    let mut manager = init(&mut backend, 1200);

    manager.upload(&mut backend, 1171).unwrap();
    let writes = backend.take_writes();
    assert_eq!(writes.len(), 4);
    let tail: Vec<(u64, u64)> = writes[1..].iter().map(|w| (w.offset, w.len)).collect();
    assert_eq!(
        tail,
        vec![
            (2 * 65536, 48),
            (2 * 65536 + 585 * 48, 48),
            (2 * 65536 + 585 * 96, 16),
        ]
    );
    manager.shutdown(&mut backend);
}

#[test]
fn partial_upload_leaves_slots_past_count_untouched() {
    let mut backend = HeadlessBackend::bounded(65536);
    let mut manager = init(&mut backend, 1200);
    fill(&mut manager, 20);

    manager.upload(&mut backend, 10).unwrap();
    let gpu = backend.buffer_bytes(manager.buffer()).unwrap();
    let mirror = manager.mirror();

    let color = |slot: u64| 585 * 96 + slot * 16;
    assert_eq!(&gpu[color(9) as usize..color(10) as usize], mirror.bytes(color(9), 16));
    assert!(gpu[color(10) as usize..color(11) as usize].iter().all(|&b| b == 0));
    manager.shutdown(&mut backend);
}

#[test]
fn over_capacity_upload_fails_and_keeps_state() {
    let mut backend = HeadlessBackend::bounded(65536);
    let mut manager = init(&mut backend, 1200);
    manager.upload(&mut backend, 40).unwrap();
    backend.take_writes();

    let err = manager.upload(&mut backend, 1201).unwrap_err();
    assert_eq!(err, InstancingError::OverCapacity { requested: 1201, max: 1200 });
    assert_eq!(manager.instance_count(), 40);
    assert!(backend.writes().is_empty());
    manager.shutdown(&mut backend);
}

#[test]
fn zero_instance_upload_is_a_successful_no_op() {
    let mut backend = HeadlessBackend::bounded(65536);
    let mut manager = init(&mut backend, 1200);
    let plan = manager.upload(&mut backend, 0).unwrap();
    assert_eq!(plan.copy_count(), 0);
    assert!(backend.writes().is_empty());
    manager.shutdown(&mut backend);
}

#[test]
fn full_write_log_keeps_buffer_current() {
    let mut backend = HeadlessBackend::bounded(65536).with_write_log_limit(4);
    let mut manager = init(&mut backend, 1200);
    fill(&mut manager, 1171);

    manager.upload(&mut backend, 1171).unwrap();
    assert_eq!(backend.writes().len(), 4);
    assert_eq!(backend.dropped_writes(), 0);

    manager.upload(&mut backend, 1171).unwrap();
    assert_eq!(backend.writes().len(), 4);
    assert_eq!(backend.dropped_writes(), 4);
    assert_eq!(backend.buffer_bytes(manager.buffer()).unwrap(), manager.mirror().as_bytes());

    backend.take_writes();
    let plan = manager.upload(&mut backend, 10).unwrap();
    assert_eq!(backend.writes().len(), plan.copy_count());
    manager.shutdown(&mut backend);
}

#[test]
fn repeated_upload_is_idempotent() {
    let mut backend = HeadlessBackend::bounded(65536);
    let mut manager = init(&mut backend, 1200);
    fill(&mut manager, 900);

    manager.upload(&mut backend, 900).unwrap();
    let first = backend.buffer_bytes(manager.buffer()).unwrap().to_vec();
    manager.upload(&mut backend, 900).unwrap();
    let second = backend.buffer_bytes(manager.buffer()).unwrap();
    assert_eq!(first, second);
    manager.shutdown(&mut backend);
}

// ── synthesis ─────────────────────────────────────────────────────────────

#[test]
fn upload_then_synthesis_partitions_by_window() {
    let mut backend = HeadlessBackend::bounded(65536);
    let mut manager = init(&mut backend, 1200);

    for n in [0u32, 1, 584, 585, 586, 1170, 1171, 1200] {
        manager.upload(&mut backend, n).unwrap();
        let frame = backend.render_frame(&[&manager]);
        let source = &frame.sources[0];
        assert_eq!(source.commands.len(), n.div_ceil(585) as usize, "n = {n}");
        assert_eq!(source.total_visible(), n as u64, "n = {n}");
        assert_eq!(source.visible_len, n.min(585) as usize);
    }
    manager.shutdown(&mut backend);
}

#[test]
fn empty_frame_makes_no_visibility_allocation() {
    let mut backend = HeadlessBackend::unbounded();
    let mut manager = init(&mut backend, 1000);
    manager.upload(&mut backend, 0).unwrap();

    let frame = backend.render_frame(&[&manager]);
    assert!(frame.sources[0].commands.is_empty());
    assert_eq!(backend.arena_stats().visible_allocations, 0);
    assert_eq!(backend.arena_stats().scopes_released, 1);
    manager.shutdown(&mut backend);
}

#[test]
fn shadow_setting_reaches_draw_range() {
    let mut backend = HeadlessBackend::unbounded();
    let config = InstanceConfig {
        cast_shadows: true,
        layer_mask: 0b100,
        ..InstanceConfig::new("debris", 64)
    };
    let mut manager =
        InstanceManager::init(&mut backend, &String::new(), &String::new(), config).unwrap();
    manager.upload(&mut backend, 8).unwrap();

    let frame = backend.render_frame(&[&manager]);
    let range = frame.sources[0].ranges[0];
    assert_eq!(range.filter.shadow_casting, ShadowCasting::On);
    assert_eq!(range.filter.layer_mask, 0b100);
    manager.shutdown(&mut backend);
}

#[test]
fn two_managers_share_one_frame_scope() {
    let mut backend = HeadlessBackend::bounded(65536);
    let mut cells = init(&mut backend, 1200);
    let mut debris = init(&mut backend, 300);
    cells.upload(&mut backend, 700).unwrap();
    debris.upload(&mut backend, 50).unwrap();

    let frame = backend.render_frame(&[&cells, &debris]);
    assert_eq!(frame.sources.len(), 2);
    assert_eq!(frame.sources[0].commands.len(), 2);
    assert_eq!(frame.sources[1].commands.len(), 1);
    assert_ne!(frame.sources[0].commands[0].mesh, frame.sources[1].commands[0].mesh);
    assert_eq!(backend.arena_stats().scopes_opened, 1);

    cells.shutdown(&mut backend);
    debris.shutdown(&mut backend);
}

// ── shutdown ──────────────────────────────────────────────────────────────

#[test]
fn shutdown_releases_in_order() {
    let mut backend = HeadlessBackend::bounded(65536);
    let mut manager = init(&mut backend, 1200);
    let batches = manager.batches().to_vec();
    let (mesh, material, buffer) = (manager.mesh(), manager.material(), manager.buffer());

    manager.shutdown(&mut backend);

    let mut expected: Vec<Release> = batches.into_iter().map(Release::Batch).collect();
    expected.extend([Release::Material(material), Release::Mesh(mesh), Release::Buffer(buffer)]);
    assert_eq!(backend.releases(), expected.as_slice());
    assert_eq!(manager.mirror().size_bytes(), 0);
    assert!(!manager.is_initialized());
}

#[test]
fn second_shutdown_is_a_no_op() {
    let mut backend = HeadlessBackend::unbounded();
    let mut manager = init(&mut backend, 10);
    manager.shutdown(&mut backend);
    let released = backend.releases().len();
    manager.shutdown(&mut backend);
    assert_eq!(backend.releases().len(), released);
}

#[test]
fn use_after_shutdown_is_defensive() {
    let mut backend = HeadlessBackend::unbounded();
    let mut manager = init(&mut backend, 10);
    manager.upload(&mut backend, 5).unwrap();
    manager.shutdown(&mut backend);

    assert_eq!(manager.upload(&mut backend, 1), Err(InstancingError::NotInitialized));
    let frame = backend.render_frame(&[&manager]);
    assert!(frame.sources[0].commands.is_empty());
}
