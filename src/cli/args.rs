use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "certissue")]
#[command(author, version, long_about = None)]
#[command(about = "Issue, mail and verify internship certificates")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Database file (overrides CERTISSUE_DATABASE)
    #[arg(long, global = true, env = "CERTISSUE_DATABASE")]
    pub database: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Csv,
    Zip,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP server
    Serve {
        /// Port to listen on (overrides CERTISSUE_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Issue a single certificate
    Issue {
        /// Student's full name
        #[arg(short, long)]
        name: String,

        #[arg(short, long)]
        course: String,

        #[arg(short, long)]
        roll_number: String,

        #[arg(long)]
        college: String,

        /// Affiliated university
        #[arg(short, long)]
        affiliated: String,

        /// Internship start date (YYYY-MM-DD or DD-MM-YYYY)
        #[arg(long)]
        start_date: String,

        /// Internship end date
        #[arg(long)]
        end_date: String,

        #[arg(short, long)]
        email: String,

        /// Template variant, e.g. DataValley
        #[arg(short, long)]
        template: Option<String>,
    },

    /// Queue students from a CSV or XLSX sheet
    Import {
        /// Spreadsheet file
        file: PathBuf,
    },

    /// List students waiting for their certificate
    Pending,

    /// Issue certificates for all pending students
    Generate {
        /// Template variant (default Pragna)
        #[arg(short, long)]
        template: Option<String>,
    },

    /// Look up a certificate like the public verification page
    Verify {
        /// certificate_id, email or roll_number
        #[arg(short, long, default_value = "certificate_id")]
        method: String,

        #[arg(short = 'V', long)]
        value: String,
    },

    /// Mail certificates to their students
    Email {
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Upload certificates to the configured storage
    Upload {
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Re-render certificates with their stored template
    Regenerate {
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Export certificates as CSV or as a ZIP of images
    Export {
        #[arg(short, long, value_enum, default_value_t = ExportFormat::Csv)]
        format: ExportFormat,

        /// Output file (for ZIP, a directory is also accepted)
        #[arg(short, long)]
        output: PathBuf,

        /// Only this course (exact, case-insensitive)
        #[arg(long)]
        course: Option<String>,

        /// Only this college (exact, case-insensitive)
        #[arg(long)]
        college: Option<String>,

        /// Name, email, roll number or ID contains this
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Show issuing statistics
    Stats,

    /// List template variants
    Templates,

    /// Write a sample student sheet
    SampleSheet {
        #[arg(short, long, default_value = "student_template.csv")]
        output: PathBuf,
    },
}
