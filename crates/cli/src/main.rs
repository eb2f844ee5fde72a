use clap::{Parser, Subcommand};
use namaste_core::config::{
    bundle_data_dir_from_env_value, search_default_limit_from_env_value,
    terminology_file_from_env_value,
};
use namaste_core::{CodeSystem, CoreConfig, DiagnosisService, EncounterRequest, Resolution};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "namaste")]
#[command(about = "NAMASTE to ICD-11 coding and FHIR bundle CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show terminology index health
    Health,
    /// Search display names and synonyms
    Search {
        /// Free text to match
        query: String,
        /// Restrict to one code system (NAMASTE or ICD11)
        #[arg(long)]
        system: Option<String>,
        /// Maximum number of results
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Resolve a NAMASTE code to its best ICD-11 mapping
    Resolve {
        /// NAMASTE code
        code: String,
    },
    /// List every ICD-11 candidate for a NAMASTE code
    Candidates {
        /// NAMASTE code
        code: String,
    },
    /// Build and store a Bundle from an encounter JSON file
    Build {
        /// Path to the encounter request (camelCase JSON)
        encounter: PathBuf,
    },
    /// Validate and store a FHIR Bundle JSON file
    Upload {
        /// Path to the Bundle JSON
        bundle: PathBuf,
    },
    /// Print a stored Bundle
    Get {
        /// Bundle id
        id: String,
    },
}

fn service() -> Result<DiagnosisService, Box<dyn std::error::Error>> {
    let cfg = CoreConfig::new(
        bundle_data_dir_from_env_value(std::env::var("BUNDLE_DATA_DIR").ok()),
        terminology_file_from_env_value(std::env::var("TERMINOLOGY_FILE").ok()),
        search_default_limit_from_env_value(std::env::var("SEARCH_DEFAULT_LIMIT").ok())?,
    )?;
    std::fs::create_dir_all(cfg.bundle_data_dir())?;
    Ok(DiagnosisService::from_config(Arc::new(cfg))?)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("Use 'namaste --help' for commands");
        return Ok(());
    };
    let service = service()?;

    match command {
        Commands::Health => {
            let health = api_shared::HealthService::check_health(service.index());
            println!(
                "{} (NAMASTE: {}, ICD-11: {}, mappings: {})",
                health.message, health.namaste_entries, health.icd_entries, health.mappings
            );
        }
        Commands::Search {
            query,
            system,
            limit,
        } => {
            let limit = Some(service.search_limit(limit));
            let hits = match system {
                Some(system) => {
                    let system: CodeSystem = system.parse()?;
                    service.index().search(system, &query, limit)
                }
                None => service.resolver().suggest(&query, limit),
            };
            if hits.is_empty() {
                println!("No matches found.");
            }
            for hit in hits {
                println!(
                    "{:<8} {:<8} {:.1}  {}",
                    hit.entry.system, hit.entry.code, hit.score, hit.entry.display_name
                );
            }
        }
        Commands::Resolve { code } => {
            service.index().lookup(CodeSystem::Namaste, &code)?;
            match service.resolver().resolve(&code) {
                Resolution::Mapped(m) => println!(
                    "{} -> {} {} ({}, {})",
                    m.namaste_code,
                    m.icd_code,
                    m.icd_display,
                    m.mapping_type,
                    m.confidence.value()
                ),
                Resolution::Unmapped => println!("{code} has no ICD-11 mapping"),
            }
        }
        Commands::Candidates { code } => {
            service.index().lookup(CodeSystem::Namaste, &code)?;
            let candidates = service.resolver().candidates(&code);
            if candidates.is_empty() {
                println!("{code} has no ICD-11 mapping");
            }
            for m in candidates {
                println!(
                    "{:<8} {:<9} {:.2}  {}",
                    m.icd_code,
                    m.mapping_type,
                    m.confidence.value(),
                    m.icd_display
                );
            }
        }
        Commands::Build { encounter } => {
            let text = std::fs::read_to_string(&encounter)?;
            let request = EncounterRequest::from_json_str(&text)?;
            let submitted = service.submit_encounter(&request)?;
            println!("Stored bundle {}", submitted.id);
            for code in submitted.incomplete_diagnoses {
                println!("Incomplete coding: {code}");
            }
        }
        Commands::Upload { bundle } => {
            let text = std::fs::read_to_string(&bundle)?;
            let id = service.store().upload_json(&text)?;
            println!("Stored bundle {id}");
        }
        Commands::Get { id } => {
            println!("{}", service.store().get_json(&id)?);
        }
    }

    Ok(())
}
