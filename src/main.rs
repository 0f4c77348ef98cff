use certissue::cli::ExportFormat;
use certissue::{
    export, import, verify, CertificateForm, CertificateQuery, CertissueError, Cli, Commands,
    Config, Issuer, Result, SheetFormat, Store, TemplateVariant, DEFAULT_BULK_TEMPLATE,
};
use clap::Parser;
use log::{error, info};
use std::path::Path;
use std::sync::Arc;

fn main() {
    if let Err(e) = run() {
        error!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    let mut config = Config::load()?;
    if let Some(database) = cli.database {
        config.database = database;
    }

    match cli.command {
        Commands::Serve { port } => {
            let port = port.unwrap_or(config.port);
            let issuer = open_issuer(&config)?;
            let state = Arc::new(certissue::web::AppState {
                issuer,
                admin_token: config.admin_token.clone(),
            });
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(certissue::web::serve(state, port))?;
        }

        Commands::Issue {
            name,
            course,
            roll_number,
            college,
            affiliated,
            start_date,
            end_date,
            email,
            template,
        } => {
            info!("Issuing single certificate");
            let form = CertificateForm {
                full_name: name,
                course,
                roll_number,
                college_name: college,
                affiliated_name: affiliated,
                start_date,
                end_date,
                email,
                template,
            };
            let cert = open_issuer(&config)?.issue(&form)?;
            println!("✓ Certificate {} issued for {}", cert.certificate_id, cert.full_name);
            println!("  Verify at {}", cert.verification_url);
        }

        Commands::Import { file } => {
            let format = SheetFormat::from_path(&file).ok_or_else(|| {
                CertissueError::Config(format!("unsupported sheet type: {}", file.display()))
            })?;
            let bytes = std::fs::read(&file)?;
            let store = Store::open(&config.database)?;
            let report = import::import_students(&store, &bytes, format)?;
            println!(
                "✓ {} imported, {} already pending, {} rejected",
                report.imported,
                report.skipped,
                report.errors.len()
            );
            for e in &report.errors {
                println!("  row {}: {}", e.row, e.message);
            }
        }

        Commands::Pending => {
            let store = Store::open(&config.database)?;
            let pending = store.pending_students()?;
            for s in &pending {
                println!("{:>5}  {:<15} {:<30} {}", s.id, s.roll_number, s.full_name, s.course);
            }
            println!("{} pending", pending.len());
        }

        Commands::Generate { template } => {
            let template = match template {
                Some(name) => name.parse::<TemplateVariant>()?,
                None => DEFAULT_BULK_TEMPLATE,
            };
            let report = open_issuer(&config)?.generate_pending(template)?;
            println!(
                "✓ {} generated, {} failed, {} duplicates",
                report.generated, report.failed, report.duplicates
            );
        }

        Commands::Verify { method, value } => {
            let store = Store::open(&config.database)?;
            let outcome = verify::verify(&store, &method, &value);
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            if !outcome.is_verified {
                std::process::exit(2);
            }
        }

        Commands::Email { ids } => {
            report_batch("emailed", open_issuer(&config)?.send_emails(&ids));
        }

        Commands::Upload { ids } => {
            report_batch("uploaded", open_issuer(&config)?.upload(&ids));
        }

        Commands::Regenerate { ids } => {
            report_batch("regenerated", open_issuer(&config)?.regenerate(&ids));
        }

        Commands::Export {
            format,
            output,
            course,
            college,
            search,
        } => {
            let store = Store::open(&config.database)?;
            let query = CertificateQuery {
                search_query: search.unwrap_or_default(),
                course_filter: course.unwrap_or_default(),
                college_filter: college.unwrap_or_default(),
            }
            .trimmed();
            let certs = store.export_selection(&query)?;
            let written = write_export(format, &certs, &config.media_dir, &output)?;
            println!("✓ Exported {} certificates to {}", certs.len(), written);
        }

        Commands::Stats => {
            let stats = Store::open(&config.database)?.stats()?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }

        Commands::Templates => {
            for t in TemplateVariant::ALL {
                println!("{:<12} {}", t.name(), config.templates_dir.join(t.image_filename()).display());
            }
        }

        Commands::SampleSheet { output } => {
            std::fs::write(&output, import::sample_sheet()?)?;
            println!("✓ Sample sheet written: {}", output.display());
        }
    }

    Ok(())
}

fn open_issuer(config: &Config) -> Result<Issuer> {
    let store = Store::open(&config.database)?;
    Issuer::from_config(config, store)
}

fn report_batch(verb: &str, outcome: certissue::BatchOutcome) {
    println!(
        "✓ {} {}, {} skipped, {} failed",
        outcome.succeeded,
        verb,
        outcome.skipped,
        outcome.failures.len()
    );
    for (id, message) in &outcome.failures {
        println!("  {}: {}", id, message);
    }
}

fn write_export(
    format: ExportFormat,
    certs: &[certissue::Certificate],
    media_dir: &Path,
    output: &Path,
) -> Result<String> {
    let (path, bytes) = match format {
        ExportFormat::Csv => (output.to_path_buf(), export::export_csv(certs)?),
        ExportFormat::Zip => {
            let (name, bytes) = export::export_zip(certs, media_dir)?;
            let path = if output.is_dir() {
                output.join(name)
            } else {
                output.to_path_buf()
            };
            (path, bytes)
        }
    };
    std::fs::write(&path, bytes)?;
    Ok(path.display().to_string())
}
