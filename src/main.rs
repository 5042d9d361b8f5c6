// Copyright (c) 2022 Unfolded Circle ApS, Markus Zehnder <markus.z@unfoldedcircle.com>
// SPDX-License-Identifier: MPL-2.0

#![forbid(non_ascii_idents)]
#![deny(unsafe_code)]

use actix::Actor;
use actix_web::{App, HttpServer, middleware, web};
use clap::{Arg, Command};
use intg_vendors::configuration::{DEF_CONFIG_FILE, get_configuration};
use intg_vendors::server::{self, json_error_handler};
use intg_vendors::{APP_VERSION, Controller, built_info};
use log::info;
use std::io;
use std::net::TcpListener;
use std::path::Path;

#[actix_web::main]
async fn main() -> io::Result<()> {
    let args = Command::new(built_info::PKG_NAME)
        .author("Unfolded Circle ApS")
        .version(APP_VERSION)
        .about("Hive alarm, PowerView shade and Rachio irrigation integrations")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file"),
        )
        .get_matches();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cfg_file = match args.get_one::<String>("config") {
        None => {
            if Path::new(DEF_CONFIG_FILE).exists() {
                info!("Loading default configuration file: {DEF_CONFIG_FILE}");
                Some(DEF_CONFIG_FILE)
            } else {
                None
            }
        }
        Some(c) => Some(c.as_str()),
    };
    let cfg = get_configuration(cfg_file).map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Failed to read configuration: {e}"),
        )
    })?;

    let address = format!("{}:{}", cfg.http.interface, cfg.http.port);
    let listener = TcpListener::bind(&address)?;
    info!("{} {APP_VERSION} listening on: {address}", built_info::PKG_NAME);

    let controller = web::Data::new(Controller::new(&cfg).start());

    HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .app_data(
                web::JsonConfig::default()
                    .limit(16 * 1024) // limit size of the payload (global configuration)
                    .error_handler(json_error_handler),
            )
            .app_data(controller.clone())
            .configure(server::configure)
    })
    // the controller and all entity actors live in the main system arbiter
    .workers(1)
    .listen(listener)?
    .run()
    .await
}
