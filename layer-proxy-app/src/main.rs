//! layer-proxy-app: interactive proxy list demo.
//!
//! Loads the saved proxy list, probes every entry and prints each view
//! update. Run:
//!   cargo run -p layer-proxy-app -- [settings.json]
//!
//! Then type commands on stdin:
//!   add <link>            add a tg:// or t.me proxy link
//!   delete <id>           soft-delete an entry
//!   restore <id>          undo a delete
//!   apply <id>            route traffic through an entry
//!   share <id>            print a share link
//!   mode <system|enabled|disabled>
//!   ipv6 on|off           probe over IPv6 too
//!   calls on|off          use the proxy for calls
//!   list                  print every entry
//!   quit

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};

use layer_proxy::{
    ControllerConfig, ItemView, JsonFileBackend, MtprotoChecker, ProxiesHandle, ProxiesService,
    ProxyMode, parse_link,
};

fn main() {
    // Enable logging: RUST_LOG=layer_proxy=debug cargo run -p layer-proxy-app
    if std::env::var("RUST_LOG").is_err() {
        // SAFETY: runs before the tokio runtime exists, so no other thread reads env
        unsafe { std::env::set_var("RUST_LOG", "layer_proxy=info,layer_proxy_app=info"); }
    }
    env_logger::init();

    let result = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(Into::into)
        .and_then(|rt| rt.block_on(run()));
    if let Err(e) = result {
        eprintln!("\n✗ {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args().nth(1).unwrap_or_else(|| "proxies.json".to_string());
    let config = ControllerConfig::default();
    let checker = Arc::new(MtprotoChecker::new(config.probe.timeout));
    let backend = Arc::new(JsonFileBackend::new(&path));

    let (proxies, _task) = ProxiesService::spawn(config, checker, backend);
    let mut views = proxies.views();

    println!("📂 Settings: {path}");
    for view in proxies.current_views().await? {
        print_view(&view);
    }

    let mut modes = proxies.proxy_settings_value().await?;
    tokio::spawn(async move {
        while let Some(view) = views.next().await {
            print_view(&view);
        }
    });
    tokio::spawn(async move {
        while let Some(mode) = modes.next().await {
            println!("⚙️  Mode: {mode}");
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let mut words = line.split_whitespace();
        let Some(cmd) = words.next() else { continue };
        let arg = words.next().unwrap_or_default();
        match cmd {
            "add"     => add(&proxies, arg).await?,
            "delete"  => with_id(arg, |id| proxies.delete_item(id)),
            "restore" => with_id(arg, |id| proxies.restore_item(id)),
            "apply"   => with_id(arg, |id| proxies.apply_item(id)),
            "share"   => match arg.parse() {
                Ok(id) => match proxies.share_item(id).await? {
                    Some(link) => println!("🔗 {link}"),
                    None       => println!("✗ Entry {id} cannot be shared"),
                },
                Err(_) => println!("✗ Expected an entry id"),
            },
            "mode"    => {
                let mode = match arg {
                    "system"   => ProxyMode::System,
                    "enabled"  => ProxyMode::Enabled,
                    "disabled" => ProxyMode::Disabled,
                    _ => {
                        println!("✗ Expected system, enabled or disabled");
                        continue;
                    }
                };
                if !proxies.set_proxy_settings(mode).await? {
                    println!("✗ No proxy to enable");
                }
            }
            "ipv6"    => with_toggle(arg, |on| proxies.set_try_ipv6(on)),
            "calls"   => with_toggle(arg, |on| proxies.set_proxy_for_calls(on)),
            "list"    => {
                for view in proxies.current_views().await? {
                    print_view(&view);
                }
            }
            "quit" | "exit" => break,
            other     => println!("✗ Unknown command: {other}"),
        }
    }

    proxies.shutdown().await?;
    println!("💾 Settings saved");
    Ok(())
}

async fn add(proxies: &ProxiesHandle, link: &str) -> Result<(), Box<dyn std::error::Error>> {
    let Some(confirmation) = parse_link(link) else {
        println!("✗ Not a proxy link");
        return Ok(());
    };
    if !confirmation.is_valid() {
        println!("✗ {} is {:?}", confirmation.config, confirmation.status);
        return Ok(());
    }
    let form = proxies.add_new_item_box().await?;
    proxies.accept_form(form, confirmation.config).await?;
    Ok(())
}

fn with_id(arg: &str, f: impl FnOnce(u32)) {
    match arg.parse() {
        Ok(id) => f(id),
        Err(_) => println!("✗ Expected an entry id"),
    }
}

fn with_toggle(arg: &str, f: impl FnOnce(bool)) {
    match arg {
        "on"  => f(true),
        "off" => f(false),
        _     => println!("✗ Expected on or off"),
    }
}

fn print_view(view: &ItemView) {
    let mut flags = Vec::new();
    if view.selected { flags.push("selected"); }
    if view.deleted  { flags.push("deleted"); }
    if view.removed  { flags.push("removed"); }
    println!(
        "  [{}] {:<7} {}:{}  {:?}  {} ms  {}",
        view.id,
        view.type_label,
        view.host,
        view.port,
        view.state,
        view.ping,
        flags.join(", "),
    );
}
