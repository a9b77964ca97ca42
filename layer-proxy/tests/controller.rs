mod common;

use std::io;
use std::sync::Arc;

use common::{FakeChecker, Harness, ms, refused};
use layer_proxy::{
    AddressFamily, AppSettings, ConnectionState, ControllerConfig, FormTarget, InMemoryBackend,
    ItemState, ItemView, ProxiesController, ProxyConfig, ProxyForm, ProxyKind, ProxyMode,
    SettingsBackend,
};
use tokio::time::Instant;

const SECRET: &str = "0123456789abcdef0123456789abcdef";

fn a() -> ProxyConfig { ProxyConfig::socks5("203.0.113.5", 1080) }
fn b() -> ProxyConfig { ProxyConfig::http("198.51.100.7", 3128) }
fn c() -> ProxyConfig { ProxyConfig::mtproto("192.0.2.9", 443, SECRET) }

fn seeded(proxies: Vec<ProxyConfig>) -> Harness {
    Harness::with_backend(InMemoryBackend::with_settings(AppSettings {
        proxies,
        try_ipv6: true,
        ..Default::default()
    }))
}

fn add(h: &mut Harness, config: ProxyConfig) -> bool {
    let form = h.controller.add_new_item_box();
    h.controller.accept_form(form, config)
}

fn edit(h: &mut Harness, id: u32, config: ProxyConfig) -> bool {
    let form = h.controller.edit_item_box(id).unwrap();
    h.controller.accept_form(form, config)
}

fn selected(views: &[ItemView]) -> Vec<u32> {
    views.iter().filter(|v| v.selected).map(|v| v.id).collect()
}

// ─── Testable properties ─────────────────────────────────────────────────────

#[test]
fn added_ids_are_unique() {
    let mut h = Harness::new();
    for port in 1000..1020 {
        assert!(add(&mut h, ProxyConfig::socks5("203.0.113.5", port)));
    }
    let mut ids: Vec<u32> = h.controller.current_views().iter().map(|v| v.id).collect();
    assert_eq!(ids.len(), 20);
    ids.dedup();
    assert_eq!(ids.len(), 20);
    assert_eq!(ids, (1..=20).collect::<Vec<_>>());
}

#[test]
fn ids_are_not_reused_after_merge() {
    let mut h = Harness::new();
    add(&mut h, a());
    add(&mut h, b());
    edit(&mut h, 2, a());
    add(&mut h, c());
    let ids: Vec<u32> = h.controller.current_views().iter().map(|v| v.id).collect();
    assert_eq!(ids, vec![1, 3]);
}

#[test]
fn delete_then_restore_restarts_probes() {
    let mut h = seeded(vec![a()]);
    let first = h.checker.take();
    assert_eq!(first.len(), 2);
    for (_, sink) in first {
        sink.fail(refused());
    }
    h.pump();
    assert_eq!(h.controller.view(1).unwrap().state, ItemState::Unavailable);

    h.controller.delete_item(1);
    let deleted = h.controller.view(1).unwrap();
    assert!(deleted.deleted);
    assert!(deleted.supports_share);
    assert_eq!(h.checker.pending(), 0);

    h.controller.restore_item(1);
    let restored = h.controller.view(1).unwrap();
    assert_eq!(restored.id, 1);
    assert_eq!((restored.host.as_str(), restored.port), ("203.0.113.5", 1080));
    assert!(!restored.deleted);
    assert_eq!(restored.state, ItemState::Connecting);
    assert_eq!(h.checker.pending(), 2);
}

#[test]
fn at_most_one_selected() {
    let mut h = seeded(vec![a(), b(), c()]);
    for id in [1, 2, 3, 1] {
        h.controller.apply_item(id);
        assert_eq!(selected(&h.controller.current_views()), vec![id]);
    }

    h.controller.delete_item(2);
    h.controller.apply_item(2);
    assert_eq!(selected(&h.controller.current_views()), vec![1]);

    h.controller.apply_item(42);
    assert_eq!(selected(&h.controller.current_views()), vec![1]);
}

#[test]
fn apply_reemits_previous_selection() {
    let mut h = seeded(vec![a(), b()]);
    h.controller.apply_item(1);
    let mut views = h.controller.views();
    h.controller.apply_item(2);

    let events = views.drain();
    assert_eq!(events.len(), 2);
    assert_eq!((events[0].id, events[0].selected), (1, false));
    assert_eq!((events[1].id, events[1].selected), (2, true));

    // Already in use.
    h.controller.apply_item(2);
    assert!(views.drain().is_empty());
}

#[test]
fn reports_from_before_an_edit_are_ignored() {
    let mut h = seeded(vec![a()]);
    let stale = h.checker.take();

    assert!(edit(&mut h, 1, ProxyConfig::socks5("203.0.113.5", 1081)));
    let mut views = h.controller.views();
    for (_, sink) in stale {
        sink.connected();
        sink.succeed(ms(10));
    }
    h.pump();

    assert!(views.drain().is_empty());
    let view = h.controller.view(1).unwrap();
    assert_eq!(view.state, ItemState::Connecting);
    assert_eq!(view.ping, 0);
    assert_eq!(view.port, 1081);

    h.checker.take_family(AddressFamily::Ipv4).succeed(ms(77));
    h.pump();
    let view = h.controller.view(1).unwrap();
    assert_eq!(view.state, ItemState::Available);
    assert_eq!(view.ping, 77);
}

#[test]
fn debounced_writes_collapse() {
    let mut h = seeded(vec![a()]);
    assert_eq!(h.controller.save_deadline(), None);

    h.controller.delete_item(1);
    h.controller.restore_item(1);
    h.controller.delete_item(1);

    let deadline = h.controller.save_deadline().unwrap();
    assert!(!h.controller.flush_due(deadline - ms(1)));
    assert_eq!(h.backend.saves(), 0);

    assert!(h.controller.flush_due(deadline));
    assert_eq!(h.backend.saves(), 1);
    assert!(h.backend.stored().unwrap().proxies.is_empty());

    assert!(!h.controller.flush_due(deadline + ms(10_000)));
    assert_eq!(h.backend.saves(), 1);
}

#[test]
fn each_mutation_pushes_the_deadline_back() {
    let mut h = seeded(vec![a()]);
    h.controller.delete_item(1);
    let first = h.controller.save_deadline().unwrap();
    std::thread::sleep(std::time::Duration::from_millis(5));
    h.controller.restore_item(1);
    let second = h.controller.save_deadline().unwrap();
    assert!(second > first);
    assert!(!h.controller.flush_due(first));
}

#[test]
fn deleting_selected_falls_back_to_no_proxy() {
    let mut h = Harness::with_backend(InMemoryBackend::with_settings(AppSettings {
        proxies:  vec![a(), b()],
        selected: Some(a()),
        mode:     ProxyMode::Enabled,
        ..Default::default()
    }));
    let mut modes = h.controller.proxy_settings_value();
    assert_eq!(modes.try_next(), Some(ProxyMode::Enabled));

    h.controller.delete_item(1);
    assert_eq!(modes.try_next(), Some(ProxyMode::System));
    assert_eq!(h.controller.settings().selected, None);
    assert!(!h.controller.view(1).unwrap().selected);

    // Undo brings the selection back, and re-enables it.
    h.controller.restore_item(1);
    assert_eq!(modes.try_next(), Some(ProxyMode::Enabled));
    assert_eq!(h.controller.settings().selected, Some(a()));
    assert!(h.controller.view(1).unwrap().selected);
}

#[test]
fn restore_does_not_override_a_newer_selection() {
    let mut h = Harness::with_backend(InMemoryBackend::with_settings(AppSettings {
        proxies:  vec![a(), b()],
        selected: Some(a()),
        mode:     ProxyMode::Enabled,
        ..Default::default()
    }));
    h.controller.delete_item(1);
    h.controller.apply_item(2);
    h.controller.restore_item(1);
    assert_eq!(selected(&h.controller.current_views()), vec![2]);
}

#[test]
fn add_probe_apply_scenario() {
    let mut h = Harness::new();
    let mut views = h.controller.views();
    let mut modes = h.controller.proxy_settings_value();
    assert_eq!(modes.try_next(), Some(ProxyMode::System));

    assert!(add(&mut h, ProxyConfig::socks5("203.0.113.5", 1080)));
    let view = views.try_next().unwrap();
    assert_eq!(view.id, 1);
    assert_eq!(view.type_label, "SOCKS5");
    assert_eq!(view.state, ItemState::Connecting);

    let sink = h.checker.take_family(AddressFamily::Ipv4);
    sink.connected();
    h.pump();
    assert_eq!(views.try_next().unwrap().state, ItemState::Checking);

    sink.succeed(ms(42));
    h.pump();
    let view = views.try_next().unwrap();
    assert_eq!(view.state, ItemState::Available);
    assert_eq!(view.ping, 42);

    h.controller.apply_item(1);
    assert_eq!(modes.try_next(), Some(ProxyMode::Enabled));
    let view = views.try_next().unwrap();
    assert_eq!(view.id, 1);
    assert!(view.selected);
    assert!(views.try_next().is_none());
}

// ─── Probing ──────────────────────────────────────────────────────────────────

#[test]
fn unavailable_only_after_every_family_fails() {
    let mut h = seeded(vec![a()]);
    let probes = h.checker.take();
    let (v4, v6): (Vec<_>, Vec<_>) = probes.into_iter().partition(|(t, _)| t.family == AddressFamily::Ipv4);
    let (_, v4) = v4.into_iter().next().unwrap();
    let (_, v6) = v6.into_iter().next().unwrap();

    v4.fail(refused());
    h.pump();
    assert_eq!(h.controller.view(1).unwrap().state, ItemState::Connecting);

    v6.fail(refused());
    h.pump();
    assert_eq!(h.controller.view(1).unwrap().state, ItemState::Unavailable);
}

#[test]
fn first_success_wins_within_a_cycle() {
    let mut h = seeded(vec![a()]);
    let probes = h.checker.take();
    let mut sinks = probes.into_iter().map(|(_, s)| s);
    let first = sinks.next().unwrap();
    let second = sinks.next().unwrap();

    first.fail(refused());
    second.succeed(ms(120));
    h.pump();
    let view = h.controller.view(1).unwrap();
    assert_eq!(view.state, ItemState::Available);
    assert_eq!(view.ping, 120);
}

#[test]
fn mtproto_probes_the_proxy_once() {
    let h = seeded(vec![c()]);
    let probes = h.checker.take();
    assert_eq!(probes.len(), 1);
    let (target, _) = &probes[0];
    assert_eq!(target.family, AddressFamily::Ipv4);
    assert_eq!(target.endpoint, None);
    assert_eq!(target.proxy, c());
}

#[test]
fn probes_target_the_configured_dc() {
    let h = seeded(vec![a(), b()]);
    let probes = h.checker.take();
    assert_eq!(probes.len(), 4);
    for (target, _) in &probes {
        let endpoint = target.endpoint.unwrap();
        match (target.proxy.kind, target.family) {
            (ProxyKind::Socks5, AddressFamily::Ipv4) => assert_eq!(endpoint.to_string(), "149.154.167.51:443"),
            (ProxyKind::Http, AddressFamily::Ipv4)   => assert_eq!(endpoint.to_string(), "149.154.167.51:80"),
            (_, AddressFamily::Ipv6)                 => assert!(endpoint.is_ipv6()),
            other => panic!("unexpected probe {other:?}"),
        }
        assert_eq!(target.dc_id, 2);
    }
}

#[test]
fn no_dc_address_means_unavailable() {
    let checker = FakeChecker::new();
    let mut config = ControllerConfig::default();
    config.probe.ipv4.clear();
    config.probe.ipv6.clear();
    let backend = Arc::new(InMemoryBackend::with_settings(AppSettings {
        proxies: vec![a()],
        ..Default::default()
    }));
    let (controller, _reports) = ProxiesController::new(config, checker.clone(), backend);
    assert_eq!(checker.pending(), 0);
    assert_eq!(controller.view(1).unwrap().state, ItemState::Unavailable);
}

#[test]
fn reports_for_deleted_items_are_ignored() {
    let mut h = seeded(vec![a()]);
    let sink = h.checker.take_family(AddressFamily::Ipv4);
    h.controller.delete_item(1);
    sink.succeed(ms(5));
    h.pump();
    let view = h.controller.view(1).unwrap();
    assert_eq!(view.state, ItemState::Connecting);
    assert_eq!(view.ping, 0);
}

// ─── Forms & merges ───────────────────────────────────────────────────────────

#[test]
fn forms_describe_their_target() {
    let h = seeded(vec![a()]);
    assert_eq!(
        h.controller.edit_item_box(1),
        Some(ProxyForm { target: FormTarget::Edit(1), initial: a() })
    );
    assert_eq!(h.controller.edit_item_box(9), None);
    assert_eq!(h.controller.add_new_item_box().target, FormTarget::Add);
}

#[test]
fn invalid_configs_are_rejected() {
    let mut h = Harness::new();
    assert!(!add(&mut h, ProxyConfig::socks5("", 1080)));
    assert!(!add(&mut h, ProxyConfig::socks5("203.0.113.5", 0)));
    assert!(!add(&mut h, ProxyConfig::mtproto("192.0.2.9", 443, format!("ee{SECRET}"))));
    assert!(!add(&mut h, ProxyConfig::mtproto("192.0.2.9", 443, "xyz")));
    assert!(h.controller.current_views().is_empty());
    assert_eq!(h.controller.save_deadline(), None);
}

#[test]
fn adding_a_duplicate_restores_and_applies_it() {
    let mut h = seeded(vec![a()]);
    h.controller.delete_item(1);
    let mut modes = h.controller.proxy_settings_value();
    modes.drain();

    assert!(add(&mut h, a()));
    assert_eq!(h.controller.current_views().len(), 1);
    let view = h.controller.view(1).unwrap();
    assert!(!view.deleted);
    assert!(view.selected);
    assert_eq!(modes.drain(), vec![ProxyMode::Enabled]);
}

#[test]
fn editing_into_a_duplicate_merges() {
    let mut h = seeded(vec![a(), b()]);
    let mut views = h.controller.views();

    assert!(edit(&mut h, 2, a()));
    let events = views.drain();
    let gone = events.iter().find(|v| v.id == 2).unwrap();
    assert!(gone.removed);
    assert!(events.iter().any(|v| v.id == 1 && v.selected && !v.removed));

    let rows = h.controller.current_views();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, 1);
    assert_eq!(h.controller.mode(), ProxyMode::Enabled);
    assert_eq!(h.controller.view(2), None);
}

#[test]
fn editing_keeps_id_position_and_selection() {
    let mut h = Harness::with_backend(InMemoryBackend::with_settings(AppSettings {
        proxies:  vec![a(), b()],
        selected: Some(a()),
        mode:     ProxyMode::Enabled,
        ..Default::default()
    }));
    let moved = ProxyConfig::socks5("203.0.113.6", 1080).with_auth("u", "p");
    assert!(edit(&mut h, 1, moved.clone()));

    let rows = h.controller.current_views();
    assert_eq!(rows.iter().map(|v| v.id).collect::<Vec<_>>(), vec![1, 2]);
    assert_eq!(rows[0].host, "203.0.113.6");
    assert!(rows[0].selected);
    assert_eq!(h.controller.settings().selected, Some(moved));
}

#[test]
fn editing_a_deleted_entry_restores_it() {
    let mut h = seeded(vec![a()]);
    h.controller.delete_item(1);
    assert!(edit(&mut h, 1, b()));
    let view = h.controller.view(1).unwrap();
    assert!(!view.deleted);
    assert_eq!(view.type_label, "HTTP");
    assert_eq!(view.state, ItemState::Connecting);
}

// ─── Modes & toggles ──────────────────────────────────────────────────────────

#[test]
fn enabling_needs_a_candidate() {
    let mut h = Harness::new();
    assert!(!h.controller.set_proxy_settings(ProxyMode::Enabled));
    assert_eq!(h.controller.mode(), ProxyMode::System);
    assert!(h.controller.set_proxy_settings(ProxyMode::System));
    assert_eq!(h.controller.save_deadline(), None);
}

#[test]
fn enabling_picks_the_last_candidate() {
    let mut h = seeded(vec![a(), b(), c()]);
    h.controller.delete_item(3);
    let mut modes = h.controller.proxy_settings_value();
    modes.drain();

    assert!(h.controller.set_proxy_settings(ProxyMode::Enabled));
    assert_eq!(modes.drain(), vec![ProxyMode::Enabled]);
    assert_eq!(h.controller.settings().selected, Some(b()));
    assert_eq!(selected(&h.controller.current_views()), vec![2]);

    assert!(h.controller.set_proxy_settings(ProxyMode::Disabled));
    assert_eq!(modes.drain(), vec![ProxyMode::Disabled]);
    // Selection survives disabling.
    assert_eq!(selected(&h.controller.current_views()), vec![2]);
}

#[test]
fn calls_toggle_notifies_only_for_call_capable_selection() {
    let mut h = Harness::with_backend(InMemoryBackend::with_settings(AppSettings {
        proxies:  vec![a(), b()],
        selected: Some(b()),
        mode:     ProxyMode::Enabled,
        ..Default::default()
    }));
    let mut modes = h.controller.proxy_settings_value();
    modes.drain();

    h.controller.set_proxy_for_calls(true);
    assert!(modes.drain().is_empty());
    assert!(h.controller.settings().use_proxy_for_calls);

    h.controller.apply_item(1);
    modes.drain();
    h.controller.set_proxy_for_calls(false);
    assert_eq!(modes.drain(), vec![ProxyMode::Enabled]);
}

#[test]
fn disabling_ipv6_keeps_results_and_resolves_leftovers() {
    let mut h = seeded(vec![a(), b()]);
    let probes = h.checker.take();
    let mut late_v6 = None;
    for (target, sink) in probes {
        match (target.proxy.kind, target.family) {
            (ProxyKind::Socks5, AddressFamily::Ipv4) => sink.succeed(ms(30)),
            (ProxyKind::Http, AddressFamily::Ipv4)   => sink.fail(refused()),
            (ProxyKind::Http, AddressFamily::Ipv6)   => late_v6 = Some(sink),
            _ => {}
        }
    }
    h.pump();
    assert_eq!(h.controller.view(1).unwrap().state, ItemState::Available);
    assert_eq!(h.controller.view(2).unwrap().state, ItemState::Connecting);

    h.controller.set_try_ipv6(false);
    assert_eq!(h.controller.view(1).unwrap().state, ItemState::Available);
    assert_eq!(h.controller.view(1).unwrap().ping, 30);
    assert_eq!(h.controller.view(2).unwrap().state, ItemState::Unavailable);

    // The released IPv6 probe can no longer change anything.
    late_v6.unwrap().succeed(ms(9));
    h.pump();
    assert_eq!(h.controller.view(2).unwrap().state, ItemState::Unavailable);
    assert!(!h.controller.settings().try_ipv6);
}

#[test]
fn reenabling_ipv6_reprobes_only_stale_entries() {
    let mut h = seeded(vec![a(), b()]);
    h.controller.set_try_ipv6(false);
    for (target, sink) in h.checker.take() {
        if target.proxy == a() && target.family == AddressFamily::Ipv4 {
            sink.succeed(ms(30));
        }
    }
    h.pump();

    h.controller.set_try_ipv6(true);
    let probes = h.checker.take();
    assert_eq!(probes.len(), 2);
    assert!(probes.iter().all(|(t, _)| t.proxy == b()));
    assert!(probes.iter().any(|(t, _)| t.family == AddressFamily::Ipv6));
    assert_eq!(h.controller.view(1).unwrap().state, ItemState::Available);
}

#[tokio::test(start_paused = true)]
async fn reenabling_ipv6_reprobes_aged_successes() {
    let mut h = seeded(vec![a()]);
    h.controller.set_try_ipv6(false);
    h.checker.take_family(AddressFamily::Ipv4).succeed(ms(30));
    h.pump();
    assert_eq!(h.controller.view(1).unwrap().state, ItemState::Available);

    tokio::time::advance(ControllerConfig::default().ipv6_refresh_after + ms(1000)).await;
    h.controller.set_try_ipv6(true);

    let probes = h.checker.take();
    assert_eq!(probes.len(), 2);
    assert!(probes.iter().any(|(t, _)| t.family == AddressFamily::Ipv4));
    assert!(probes.iter().any(|(t, _)| t.family == AddressFamily::Ipv6));
    assert_eq!(h.controller.view(1).unwrap().state, ItemState::Connecting);
}

#[test]
fn in_use_entry_follows_the_connection() {
    let mut h = Harness::with_backend(InMemoryBackend::with_settings(AppSettings {
        proxies:  vec![a()],
        selected: Some(a()),
        mode:     ProxyMode::Enabled,
        try_ipv6: false,
        ..Default::default()
    }));
    let mut views = h.controller.views();

    h.controller.set_connection_state(ConnectionState::Connected);
    assert_eq!(views.try_next().unwrap().state, ItemState::Online);
    h.controller.set_connection_state(ConnectionState::Connected);
    assert!(views.try_next().is_none());

    // Probe results land underneath the Online display.
    h.checker.take_family(AddressFamily::Ipv4).succeed(ms(64));
    h.pump();
    assert_eq!(views.try_next().unwrap().state, ItemState::Online);

    h.controller.set_connection_state(ConnectionState::Connecting);
    assert_eq!(views.try_next().unwrap().state, ItemState::Connecting);

    assert!(h.controller.set_proxy_settings(ProxyMode::Disabled));
    let view = h.controller.view(1).unwrap();
    assert_eq!(view.state, ItemState::Available);
    assert_eq!(view.ping, 64);
}

// ─── Loading, sharing, persistence ────────────────────────────────────────────

#[test]
fn loading_assigns_ids_in_order_and_starts_probes() {
    let h = Harness::with_backend(InMemoryBackend::with_settings(AppSettings {
        proxies:  vec![a(), ProxyConfig::default(), a(), b()],
        selected: Some(c()),
        mode:     ProxyMode::Disabled,
        try_ipv6: true,
        ..Default::default()
    }));
    let rows = h.controller.current_views();
    let hosts: Vec<(u32, &str)> = rows.iter().map(|v| (v.id, v.host.as_str())).collect();
    assert_eq!(hosts, vec![(1, "203.0.113.5"), (2, "198.51.100.7"), (3, "192.0.2.9")]);
    assert_eq!(selected(&rows), vec![3]);
    assert_eq!(h.checker.pending(), 5);
    assert_eq!(h.controller.save_deadline(), None);
}

#[test]
fn share_links_for_shareable_entries() {
    let mut h = seeded(vec![a().with_auth("u", "p"), b(), c()]);
    assert_eq!(
        h.controller.share_item(1).as_deref(),
        Some("https://t.me/socks?server=203.0.113.5&port=1080&user=u&pass=p")
    );
    assert_eq!(h.controller.share_item(2), None);
    assert_eq!(
        h.controller.share_item(3),
        Some(format!("https://t.me/proxy?server=192.0.2.9&port=443&secret={SECRET}"))
    );
    assert_eq!(h.controller.share_item(7), None);

    h.controller.delete_item(1);
    assert_eq!(
        h.controller.share_item(1).as_deref(),
        Some("https://t.me/socks?server=203.0.113.5&port=1080&user=u&pass=p")
    );
}

#[test]
fn persisted_settings_reflect_the_list() {
    let mut h = seeded(vec![a(), b()]);
    h.controller.apply_item(2);
    h.controller.delete_item(1);
    add(&mut h, c());
    h.controller.flush();

    let stored = h.backend.stored().unwrap();
    assert_eq!(stored.proxies, vec![b(), c()]);
    assert_eq!(stored.selected, Some(b()));
    assert_eq!(stored.mode, ProxyMode::Enabled);
    assert_eq!(h.controller.save_deadline(), None);
}

#[test]
fn pending_write_is_flushed_on_drop() {
    let mut h = seeded(vec![a()]);
    h.controller.delete_item(1);
    let Harness { controller, backend, .. } = h;
    assert_eq!(backend.saves(), 0);
    drop(controller);
    assert_eq!(backend.saves(), 1);
    assert!(backend.stored().unwrap().proxies.is_empty());
}

struct BrokenBackend;

impl SettingsBackend for BrokenBackend {
    fn save(&self, _: &AppSettings) -> io::Result<()> {
        Err(io::Error::other("disk full"))
    }
    fn load(&self) -> io::Result<Option<AppSettings>> {
        Err(io::Error::other("corrupt"))
    }
    fn name(&self) -> &str { "broken" }
}

#[test]
fn storage_failures_do_not_block_mutation() {
    let checker = FakeChecker::new();
    let (mut controller, _reports) =
        ProxiesController::new(ControllerConfig::default(), checker, Arc::new(BrokenBackend));
    assert!(controller.current_views().is_empty());

    let form = controller.add_new_item_box();
    assert!(controller.accept_form(form, a()));
    controller.flush();
    assert_eq!(controller.save_deadline(), None);

    controller.apply_item(1);
    assert_eq!(controller.mode(), ProxyMode::Enabled);
    let deadline = controller.save_deadline().unwrap();
    assert!(deadline > Instant::now() - ms(1));
}

#[test]
fn enabled_mode_without_selection_loads_as_system() {
    let mut h = Harness::with_backend(InMemoryBackend::with_settings(AppSettings {
        proxies:  vec![a()],
        selected: None,
        mode:     ProxyMode::Enabled,
        ..Default::default()
    }));
    assert_eq!(h.controller.mode(), ProxyMode::System);
    assert_eq!(h.controller.settings().proxy_in_use(), None);

    assert!(h.controller.set_proxy_settings(ProxyMode::Enabled));
    assert_eq!(h.controller.settings().proxy_in_use(), Some(&a()));
    assert!(h.controller.view(1).unwrap().selected);
}

#[test]
fn enabled_mode_with_sentinel_selection_loads_as_system() {
    let h = Harness::with_backend(InMemoryBackend::with_settings(AppSettings {
        proxies:  vec![a()],
        selected: Some(ProxyConfig::default()),
        mode:     ProxyMode::Enabled,
        ..Default::default()
    }));
    assert_eq!(h.controller.mode(), ProxyMode::System);
    assert_eq!(h.controller.settings().selected, None);
}
