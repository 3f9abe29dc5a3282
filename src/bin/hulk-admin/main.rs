use std::sync::Arc;

use clap::{crate_authors, App, Arg, ArgMatches};
use hulk_admin::config::{self, Config};
use hulk_admin::logger::{self, ConsoleLogSys};

mod server;

use server::*;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let version_info = hulk_admin::version::version_info();

    let matches = App::new("hulk-admin")
        .about("Admin control plane of a Hulk object storage cluster")
        .author(crate_authors!())
        .version(hulk_admin::version::VERSION)
        .long_version(version_info.as_str())
        .arg(
            Arg::new("address")
                .short('a')
                .long("address")
                .takes_value(true)
                .help("Listen address, host:port"),
        )
        .arg(
            Arg::new("node-name")
                .long("node-name")
                .takes_value(true)
                .help("Name of this node as known by its peers"),
        )
        .arg(
            Arg::new("peers")
                .short('p')
                .long("peers")
                .takes_value(true)
                .help("Comma separated peer addresses"),
        )
        .arg(
            Arg::new("admin-token")
                .long("admin-token")
                .takes_value(true)
                .help("Bearer token required by admin and peer routes"),
        )
        .arg(
            Arg::new("backend")
                .long("backend")
                .takes_value(true)
                .possible_values(["erasure", "fs"])
                .help("In-memory backend type"),
        )
        .arg(
            Arg::new("profiling")
                .long("profiling")
                .help("Allow profiling through the admin API"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .takes_value(true)
                .help("Minimum level of logged records"),
        )
        .help_template(
            "\
            {before-help}{bin} - {about}\n\
            {version}\n\n\
            {usage-heading}\n    {usage}\n\
            \n\
            {all-args}{after-help}\
        ",
        )
        .get_matches();

    let mut config = config::lookup_config()?;
    handle_cli_args(&mut config, &matches)?;

    let console = Arc::new(ConsoleLogSys::new(
        &config.node_name,
        config.console_log_size,
    ));
    let _log_guard = logger::init(config.log_level, Some(console.clone()))?;

    Server::new(config, console).run().await
}

// Command line flags override the environment.
fn handle_cli_args(config: &mut Config, m: &ArgMatches) -> anyhow::Result<()> {
    if let Some(address) = m.value_of("address") {
        config.address = address.to_owned();
    }
    if let Some(node_name) = m.value_of("node-name") {
        config.node_name = node_name.to_owned();
    }
    if let Some(peers) = m.value_of("peers") {
        config.peers = config::parse_peers(peers);
    }
    if let Some(token) = m.value_of("admin-token").filter(|t| !t.is_empty()) {
        config.admin_token = Some(token.to_owned());
    }
    if let Some(backend) = m.value_of("backend") {
        config.erasure = backend == "erasure";
    }
    if m.is_present("profiling") {
        config.profiling = true;
    }
    if let Some(level) = m.value_of("log-level") {
        config.log_level = level
            .parse::<slog::Level>()
            .map_err(|_| anyhow::anyhow!("invalid log level: {}", level))?;
    }
    if config
        .peers
        .iter()
        .any(|p| p.eq_ignore_ascii_case(&config.node_name))
    {
        anyhow::bail!("peer list must not contain this node: {}", config.node_name);
    }
    Ok(())
}
