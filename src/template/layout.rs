use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use super::TemplateVariant;
use crate::error::Result;
use crate::record::Certificate;

/// A piece of certificate data that can be printed on a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificateField {
    FullName,
    CollegeName,
    AffiliatedName,
    RollNumber,
    Course,
    StartDate,
    EndDate,
    CertificateId,
    IssueDate,
    /// "Verify at <base>/" line below the signatures
    VerifyNotice,
}

impl CertificateField {
    /// Text printed for this field. `verify_base` is the public site root, scheme included.
    pub fn text_for(&self, cert: &Certificate, verify_base: &str) -> String {
        match self {
            CertificateField::FullName => cert.full_name.clone(),
            CertificateField::CollegeName => cert.college_name.clone(),
            CertificateField::AffiliatedName => cert.affiliated_name.clone(),
            CertificateField::RollNumber => cert.roll_number.clone(),
            CertificateField::Course => cert.course.clone(),
            CertificateField::StartDate => cert.start_date.format("%d-%m-%Y").to_string(),
            CertificateField::EndDate => cert.end_date.format("%d-%m-%Y").to_string(),
            CertificateField::CertificateId => cert.certificate_id.clone(),
            CertificateField::IssueDate => cert.issue_date_short(),
            CertificateField::VerifyNotice => {
                format!("Verify at {}/", verify_base.trim_end_matches('/'))
            }
        }
    }
}

/// Where a text field goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Anchor {
    /// Horizontally centred between `x_start` and `x_end`, top edge at `y`
    Centered { y: i32, x_start: i32, x_end: i32 },
    /// Left edge at `x`, top edge at `y`
    Left { x: i32, y: i32 },
}

impl Anchor {
    /// Top-left drawing position for text `text_width` pixels wide.
    pub fn origin(&self, text_width: u32) -> (i32, i32) {
        match *self {
            Anchor::Centered { y, x_start, x_end } => {
                (x_start + (x_end - x_start - text_width as i32) / 2, y)
            }
            Anchor::Left { x, y } => (x, y),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FontRole {
    #[default]
    Regular,
    Small,
}

impl FontRole {
    /// Pixel size derived from the configured base size.
    pub fn size(&self, base: u32) -> u32 {
        match self {
            FontRole::Regular => base,
            FontRole::Small => base * 4 / 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldPlacement {
    pub field: CertificateField,
    pub anchor: Anchor,
    #[serde(default)]
    pub font: FontRole,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QrPlacement {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

/// Pixel coordinates for every element drawn on one template image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateLayout {
    pub fields: Vec<FieldPlacement>,
    pub qr: QrPlacement,
}

impl Default for TemplateLayout {
    fn default() -> Self {
        use Anchor::{Centered, Left};
        use CertificateField::*;

        let regular = |field, anchor| FieldPlacement { field, anchor, font: FontRole::Regular };
        let small = |field, anchor| FieldPlacement { field, anchor, font: FontRole::Small };

        Self {
            fields: vec![
                regular(FullName, Centered { y: 375, x_start: 460, x_end: 1080 }),
                regular(CollegeName, Centered { y: 415, x_start: 245, x_end: 1065 }),
                regular(AffiliatedName, Centered { y: 462, x_start: 290, x_end: 670 }),
                regular(RollNumber, Centered { y: 458, x_start: 915, x_end: 1080 }),
                regular(Course, Centered { y: 512, x_start: 690, x_end: 1130 }),
                regular(StartDate, Centered { y: 605, x_start: 600, x_end: 830 }),
                regular(EndDate, Centered { y: 605, x_start: 910, x_end: 1130 }),
                small(CertificateId, Left { x: 296, y: 665 }),
                small(IssueDate, Left { x: 229, y: 700 }),
                small(VerifyNotice, Centered { y: 805, x_start: 292, x_end: 1080 }),
            ],
            qr: QrPlacement {
                x: 963,
                y: 278,
                width: 110,
                height: 80,
            },
        }
    }
}

/// Layouts per variant; variants without an override use the default.
#[derive(Debug, Clone, Default)]
pub struct LayoutSet {
    default: TemplateLayout,
    overrides: HashMap<TemplateVariant, TemplateLayout>,
}

impl LayoutSet {
    /// Built-in layouts plus the overrides in a JSON file mapping variant
    /// names to layouts.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let raw: HashMap<String, TemplateLayout> = serde_json::from_str(&content)?;
        let overrides = raw
            .into_iter()
            .map(|(name, layout)| Ok((name.parse::<TemplateVariant>()?, layout)))
            .collect::<Result<HashMap<_, _>>>()?;
        log::info!("Loaded {} layout override(s) from {}", overrides.len(), path.display());
        Ok(Self {
            default: TemplateLayout::default(),
            overrides,
        })
    }

    pub fn layout_for(&self, variant: TemplateVariant) -> &TemplateLayout {
        self.overrides.get(&variant).unwrap_or(&self.default)
    }
}
