// civic_zone_rust\src\main_zone.rs
//! 管理 CLI – authority 登録 / GeoJSON 取込 / zone 一覧・削除 / 点の振り分け
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use civic_zone_rust::configs::Config;
use civic_zone_rust::gps;
use civic_zone_rust::import;
use civic_zone_rust::resolver::{Resolution, Resolver};
use civic_zone_rust::snapshot::SnapshotFile;
use civic_zone_rust::trace::init_tracing;
use civic_zone_rust::{AuthorityDraft, AuthorityId, Point, ZoneId, ZoneIndex};

#[derive(Parser)]
#[command(name = "main_zone", about = "Zone-based authority assignment admin CLI")]
struct Cli {
    /// TOML config (missing file = defaults)
    #[arg(long, default_value = "zone.toml")]
    config: PathBuf,
    /// Overrides `state_path` from the config
    #[arg(long)]
    state: Option<PathBuf>,
    /// Drop persisted zones that fail to load instead of writing them back
    #[arg(long)]
    prune: bool,
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a civic authority
    AuthorityAdd {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "")]
        phone: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Import Polygon / MultiPolygon features from a GeoJSON file
    Import {
        #[arg(short, long)]
        file: PathBuf,
        /// Target authority id
        #[arg(long, conflicts_with = "authority_name")]
        authority: Option<u64>,
        /// Target authority name; registered on first use
        #[arg(long)]
        authority_name: Option<String>,
    },
    /// List active zones
    Zones {
        #[arg(long)]
        authority: Option<u64>,
    },
    /// Remove one zone (no-op if already gone)
    RemoveZone {
        #[arg(long)]
        id: u64,
    },
    /// Resolve a point to its authority
    Resolve {
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        #[arg(long, allow_negative_numbers = true)]
        lon: f64,
    },
    /// Read the GPS location of an image (manual fallback) and resolve it
    Locate {
        #[arg(long)]
        image: Option<PathBuf>,
        #[arg(long, allow_negative_numbers = true, requires = "lon")]
        lat: Option<f64>,
        #[arg(long, allow_negative_numbers = true, requires = "lat")]
        lon: Option<f64>,
    },
}

fn contact_for(name: &str) -> String {
    let slug: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();
    format!("{}@example.com", slug.trim_matches('-'))
}

fn print_resolution(index: &ZoneIndex, res: &Resolution) {
    match res {
        Resolution::Assigned { authority, .. } => {
            let name = index.authority(*authority).map(|a| a.name).unwrap_or_default();
            println!("assigned\t{authority}\t{name}");
        }
        Resolution::Unassigned { reason, nearest } => match nearest {
            Some(hint) => println!(
                "unassigned\t{reason}\tnearest={}\tdistance={:.6}",
                hint.authority, hint.distance
            ),
            None => println!("unassigned\t{reason}"),
        },
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let mut cfg = Config::load_from(&cli.config).context("load config")?;
    if let Some(state) = cli.state {
        cfg.state_path = state;
    }
    init_tracing(&cfg.log_filter, cfg.log_json)?;

    let file = SnapshotFile::load_from(&cfg.state_path).context("load zone state")?;
    let (index, report) = ZoneIndex::from_snapshot(file, cfg.validation_options());
    for r in &report.rejected {
        eprintln!("skipped persisted zone {}: {}", r.zone, r.reason);
    }
    let pruned = cli.prune && !index.prune_rejected().is_empty();
    if !report.rejected.is_empty() && !pruned {
        eprintln!(
            "{} persisted zone(s) kept unchanged in the state file; pass --prune to drop them",
            report.rejected.len()
        );
    }
    let index = Arc::new(index);

    let mutated = match cli.cmd {
        Commands::AuthorityAdd { name, email, phone, description } => {
            let id = index.register_authority(AuthorityDraft {
                name: name.clone(),
                contact_email: email,
                contact_phone: phone,
                description,
            })?;
            println!("authority\t{id}\t{name}");
            true
        }
        Commands::Import { file, authority, authority_name } => {
            let id = match (authority, authority_name) {
                (Some(id), _) => AuthorityId(id),
                (None, Some(name)) => match index.authority_by_name(&name) {
                    Some(a) => a.id,
                    None => {
                        let email = contact_for(&name);
                        index.register_authority(AuthorityDraft::new(name, email))?
                    }
                },
                (None, None) => bail!("either --authority or --authority-name is required"),
            };
            let report = import::import_file(&index, id, &file)
                .with_context(|| format!("import `{}`", file.display()))?;
            for (name, ids) in &report.created {
                let ids: Vec<String> = ids.iter().map(ToString::to_string).collect();
                println!("created\t{name}\t{}", ids.join(","));
            }
            for s in &report.skipped {
                println!(
                    "skipped\t{}\t{}\t{}",
                    s.index,
                    s.name.as_deref().unwrap_or("-"),
                    s.reason
                );
            }
            println!(
                "imported\t{}\tskipped\t{}",
                report.zone_count(),
                report.skipped.len()
            );
            true
        }
        Commands::Zones { authority } => {
            let zones = match authority {
                Some(a) => index.zones_for_authority(AuthorityId(a)),
                None => index.zones(),
            };
            for z in zones {
                println!("{}\t{}\t{}\t{:.6}", z.id, z.authority, z.name, z.area);
            }
            false
        }
        Commands::RemoveZone { id } => {
            let removed = index.remove_zone(ZoneId(id));
            println!("{}\t{id}", if removed { "removed" } else { "absent" });
            removed
        }
        Commands::Resolve { lat, lon } => {
            let resolver = Resolver::new(Arc::clone(&index));
            print_resolution(&index, &resolver.resolve(&Point::new(lat, lon)));
            false
        }
        Commands::Locate { image, lat, lon } => {
            let manual = lat.zip(lon).map(|(lat, lon)| Point::new(lat, lon));
            let located = gps::locate_file(image.as_deref(), manual)?;
            println!(
                "location\t{}\t{}\t{}",
                located.source.as_str(),
                located.point.lat,
                located.point.lon
            );
            let resolver = Resolver::new(Arc::clone(&index));
            print_resolution(&index, &resolver.resolve(&located.point));
            false
        }
    };

    if mutated || pruned {
        index
            .to_snapshot()
            .save_to(&cfg.state_path)
            .context("save zone state")?;
    }
    Ok(())
}

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
