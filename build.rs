// build.rs

use clap::{Arg, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn build_cli() -> Command {
    Command::new("loadout")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Loadout Contributors")
        .about("Workload manifest resolver and updater for modular SDK installations")
        .subcommand_required(false)
        .subcommand(
            Command::new("search")
                .about("List workloads available for the host SDK version")
                .arg(Arg::new("filter").help("Workload id substring to match (optional)"))
                .arg(
                    Arg::new("sdk_version")
                        .short('s')
                        .long("sdk-version")
                        .value_name("VERSION")
                        .help("Host SDK version (defaults to LOADOUT_SDK_VERSION)"),
                )
                .arg(
                    Arg::new("manifest_root")
                        .short('m')
                        .long("manifest-root")
                        .default_value("/usr/lib/loadout/sdk-manifests")
                        .help("Installed manifest root directory"),
                )
                .arg(
                    Arg::new("verbosity")
                        .short('v')
                        .long("verbosity")
                        .value_parser(["quiet", "minimal", "normal", "detailed", "diagnostic"])
                        .default_value("normal")
                        .help("Output verbosity"),
                ),
        )
        .subcommand(
            Command::new("update")
                .about("Download and stage newer workload manifests")
                .arg(
                    Arg::new("feed_url")
                        .long("feed-url")
                        .required(true)
                        .value_name("URL")
                        .help("Base URL of the workload package feed"),
                )
                .arg(
                    Arg::new("sdk_version")
                        .short('s')
                        .long("sdk-version")
                        .value_name("VERSION")
                        .help("Host SDK version (defaults to LOADOUT_SDK_VERSION)"),
                )
                .arg(
                    Arg::new("manifest_root")
                        .short('m')
                        .long("manifest-root")
                        .default_value("/usr/lib/loadout/sdk-manifests")
                        .help("Installed manifest root directory"),
                )
                .arg(
                    Arg::new("cache_path")
                        .long("cache-path")
                        .default_value("/var/lib/loadout/advertising.db")
                        .help("Advertising cache store path"),
                )
                .arg(
                    Arg::new("download_path")
                        .long("download-path")
                        .default_value("/var/cache/loadout/downloads")
                        .help("Directory for downloaded manifest packages"),
                )
                .arg(
                    Arg::new("temp_root")
                        .long("temp-root")
                        .default_value("/var/cache/loadout/staging")
                        .help("Staging root for extracted packages"),
                )
                .arg(
                    Arg::new("include_preview")
                        .long("include-preview")
                        .action(clap::ArgAction::SetTrue)
                        .help("Consider preview manifest versions"),
                )
                .arg(
                    Arg::new("force_refresh")
                        .short('f')
                        .long("force-refresh")
                        .action(clap::ArgAction::SetTrue)
                        .help("Refresh the advertising cache even if it is fresh"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Create man directory
    let out_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let man_dir = out_dir.join("man");
    fs::create_dir_all(&man_dir).expect("Failed to create man directory");

    // Generate main man page
    let cmd = build_cli();
    let man = Man::new(cmd);
    let mut buffer = Vec::new();
    man.render(&mut buffer)
        .expect("Failed to render man page");

    let man_path = man_dir.join("loadout.1");
    fs::write(&man_path, buffer).expect("Failed to write man page");

    println!("cargo:warning=Man page generated at {}", man_path.display());
}
