//! Certificate template variants, their layouts and the placeholder
//! replacer used for mail bodies.

pub mod layout;
pub mod replacer;

pub use layout::{Anchor, CertificateField, FieldPlacement, FontRole, LayoutSet, QrPlacement, TemplateLayout};
pub use replacer::{PlaceholderReplacer, Escaping};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{CertissueError, Result};

/// Background designs a certificate can be rendered on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TemplateVariant {
    Pragna,
    #[serde(rename = "CSCIndia")]
    CscIndia,
    DataValley,
    #[serde(rename = "IGIATPragna")]
    IgiatPragna,
    UrChoice,
    Proplore,
}

/// Variant preselected on the single-certificate form.
pub const DEFAULT_FORM_TEMPLATE: TemplateVariant = TemplateVariant::DataValley;

/// Variant used by bulk generation when none is chosen.
pub const DEFAULT_BULK_TEMPLATE: TemplateVariant = TemplateVariant::Pragna;

impl TemplateVariant {
    pub const ALL: [TemplateVariant; 6] = [
        TemplateVariant::Pragna,
        TemplateVariant::CscIndia,
        TemplateVariant::DataValley,
        TemplateVariant::IgiatPragna,
        TemplateVariant::UrChoice,
        TemplateVariant::Proplore,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TemplateVariant::Pragna => "Pragna",
            TemplateVariant::CscIndia => "CSCIndia",
            TemplateVariant::DataValley => "DataValley",
            TemplateVariant::IgiatPragna => "IGIATPragna",
            TemplateVariant::UrChoice => "UrChoice",
            TemplateVariant::Proplore => "Proplore",
        }
    }

    /// Background image file name, e.g. `original_certificate_datavalley.jpg`.
    pub fn image_filename(&self) -> String {
        format!("original_certificate_{}.jpg", normalize(self.name()))
    }

    /// Locates the background image below `templates_dir`.
    pub fn image_path(&self, templates_dir: &Path) -> Result<PathBuf> {
        let path = templates_dir.join(self.image_filename());
        if !path.exists() {
            return Err(CertissueError::TemplateNotFound(path.display().to_string()));
        }
        Ok(path)
    }
}

impl FromStr for TemplateVariant {
    type Err = CertissueError;

    /// Case- and whitespace-insensitive: `"csc india"` is `CSCIndia`.
    fn from_str(s: &str) -> Result<Self> {
        let wanted = normalize(s);
        TemplateVariant::ALL
            .into_iter()
            .find(|v| normalize(v.name()) == wanted)
            .ok_or_else(|| CertissueError::UnknownTemplate(s.trim().to_string()))
    }
}

impl std::fmt::Display for TemplateVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}
