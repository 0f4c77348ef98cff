use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

use base64::{engine::general_purpose, Engine as _};
use chrono::Utc;
use lettre::address::Envelope;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, SmtpTransport, Transport};
use log::{debug, info};

use crate::error::{CertissueError, Result};
use crate::record::Certificate;
use crate::template::{Escaping, PlaceholderReplacer};

/// A file attached to a mail.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// An outgoing mail with a text body, an optional HTML alternative and
/// attachments.
#[derive(Debug, Clone)]
pub struct MailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub text_body: String,
    pub html_body: Option<String>,
    pub attachments: Vec<Attachment>,
}

/// Base64 with RFC 2045 line length (76 characters).
fn push_base64(out: &mut String, bytes: &[u8]) {
    let b64 = general_purpose::STANDARD.encode(bytes);
    for chunk in b64.as_bytes().chunks(76) {
        // base64 output is ASCII
        out.push_str(&String::from_utf8_lossy(chunk));
        out.push_str("\r\n");
    }
}

/// RFC 2047 encoded-word for header values that are not plain ASCII.
fn encode_header(value: &str) -> String {
    if value.is_ascii() {
        value.to_string()
    } else {
        format!("=?utf-8?B?{}?=", general_purpose::STANDARD.encode(value.as_bytes()))
    }
}

fn quoted_filename(name: &str) -> String {
    name.replace(['"', '\\', '\r', '\n'], "_")
}

impl MailMessage {
    /// Renders the message as RFC 5322 text with MIME parts.
    pub fn to_eml(&self) -> String {
        let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let mixed = format!("----=_CERTISSUE_MIXED_{}", nanos);
        let alternative = format!("----=_CERTISSUE_ALT_{}", nanos);

        let mut eml = String::new();
        eml.push_str(&format!("From: {}\r\n", self.from));
        eml.push_str(&format!("To: {}\r\n", self.to));
        eml.push_str(&format!("Subject: {}\r\n", encode_header(&self.subject)));
        eml.push_str(&format!("Date: {}\r\n", Utc::now().to_rfc2822()));
        eml.push_str("MIME-Version: 1.0\r\n");
        eml.push_str(&format!(
            "Content-Type: multipart/mixed; boundary=\"{}\"\r\n",
            mixed
        ));
        eml.push_str("\r\n");

        eml.push_str(&format!("--{}\r\n", mixed));
        match &self.html_body {
            Some(html) => {
                eml.push_str(&format!(
                    "Content-Type: multipart/alternative; boundary=\"{}\"\r\n\r\n",
                    alternative
                ));
                self.push_text_part(&mut eml, &alternative, "text/plain", &self.text_body);
                self.push_text_part(&mut eml, &alternative, "text/html", html);
                eml.push_str(&format!("--{}--\r\n", alternative));
            }
            None => {
                eml.push_str("Content-Type: text/plain; charset=\"utf-8\"\r\n");
                eml.push_str("Content-Transfer-Encoding: base64\r\n\r\n");
                push_base64(&mut eml, self.text_body.as_bytes());
            }
        }

        for attachment in &self.attachments {
            let filename = quoted_filename(&attachment.filename);
            eml.push_str(&format!("--{}\r\n", mixed));
            eml.push_str(&format!(
                "Content-Type: {}; name=\"{}\"\r\n",
                attachment.content_type, filename
            ));
            eml.push_str(&format!(
                "Content-Disposition: attachment; filename=\"{}\"\r\n",
                filename
            ));
            eml.push_str("Content-Transfer-Encoding: base64\r\n\r\n");
            push_base64(&mut eml, &attachment.bytes);
        }

        eml.push_str(&format!("--{}--\r\n", mixed));
        eml
    }

    fn push_text_part(&self, eml: &mut String, boundary: &str, content_type: &str, body: &str) {
        eml.push_str(&format!("--{}\r\n", boundary));
        eml.push_str(&format!("Content-Type: {}; charset=\"utf-8\"\r\n", content_type));
        eml.push_str("Content-Transfer-Encoding: base64\r\n\r\n");
        push_base64(eml, body.as_bytes());
    }
}

/// Sender identity and body templates for certificate mails.
#[derive(Debug, Clone)]
pub struct MailSettings {
    pub from: String,
    pub organization: String,
    /// Public site root shown in the mail, e.g. `https://verify.example.org`
    pub verify_site: String,
    pub text_template: String,
    pub html_template: String,
}

pub const DEFAULT_TEXT_TEMPLATE: &str = "Dear {{FULL_NAME}},

Greetings from {{ORGANIZATION}}!

We are delighted to inform you that you have successfully completed the internship program titled \"{{COURSE}}\".

Your official internship certificate is attached with this email. You may also verify the certificate using the unique Certificate ID or through the link provided below.
Verify your certificate at \"{{VERIFY_SITE}}/\".

Certificate Details:
- Course: {{COURSE}}
- College: {{COLLEGE}}
- Roll Number: {{ROLL_NUMBER}}
- Certificate ID: {{CERTIFICATE_ID}}
- Issue Date: {{ISSUE_DATE}}

Verify your certificate here: {{VERIFICATION_URL}}

We congratulate you on this achievement and wish you continued success in your academic and professional journey.

Warm regards,
{{ORGANIZATION}}
";

pub const DEFAULT_HTML_TEMPLATE: &str = r#"<html>
<body style="font-family: 'Segoe UI', Tahoma, sans-serif; background-color: #f9fafc; color: #333; padding: 30px;">
  <div style="background: #fff; border-radius: 12px; max-width: 600px; margin: auto; padding: 30px;">
    <h2 style="text-align: center; color: #2c3e50;">Congratulations, {{FULL_NAME}}!</h2>
    <p>We are pleased to inform you that you have successfully completed the internship program titled
    <strong>"{{COURSE}}"</strong>.</p>
    <p>Your internship completion certificate is attached for your reference. You may also verify the
    authenticity of this certificate using the Certificate ID below or by visiting the verification link.</p>
    <table style="width: 100%; border-collapse: collapse; margin: 20px 0;">
      <tr><th colspan="2" style="background-color: #004c97; color: white; padding: 10px; text-align: left;">Certificate Summary</th></tr>
      <tr><td><strong>Full Name</strong></td><td>{{FULL_NAME}}</td></tr>
      <tr><td><strong>Course</strong></td><td>{{COURSE}}</td></tr>
      <tr><td><strong>College</strong></td><td>{{COLLEGE}}</td></tr>
      <tr><td><strong>Roll Number</strong></td><td>{{ROLL_NUMBER}}</td></tr>
      <tr><td><strong>Certificate ID</strong></td><td>{{CERTIFICATE_ID}}</td></tr>
      <tr><td><strong>Issue Date</strong></td><td>{{ISSUE_DATE}}</td></tr>
    </table>
    <a href="{{VERIFICATION_URL}}" style="display: block; width: max-content; margin: 20px auto; padding: 12px 20px; background-color: #28a745; color: white; text-decoration: none; font-weight: bold; border-radius: 5px;">Verify Certificate</a>
    <p style="font-size: 13px; text-align: center; margin-top: 30px;">
      Best Regards,<br><strong>{{ORGANIZATION}}</strong><br>
      Credentials can be verified at <a href="{{VERIFY_SITE}}/">{{VERIFY_SITE}}</a>
    </p>
  </div>
</body>
</html>
"#;

impl MailSettings {
    pub fn new(from: impl Into<String>, organization: impl Into<String>, verify_site: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            organization: organization.into(),
            verify_site: verify_site.into().trim_end_matches('/').to_string(),
            text_template: DEFAULT_TEXT_TEMPLATE.to_string(),
            html_template: DEFAULT_HTML_TEMPLATE.to_string(),
        }
    }
}

fn certificate_values(cert: &Certificate, settings: &MailSettings) -> HashMap<String, String> {
    [
        ("FULL_NAME", cert.full_name.clone()),
        ("COURSE", cert.course.clone()),
        ("COLLEGE", cert.college_name.clone()),
        ("AFFILIATED", cert.affiliated_name.clone()),
        ("ROLL_NUMBER", cert.roll_number.clone()),
        ("CERTIFICATE_ID", cert.certificate_id.clone()),
        ("ISSUE_DATE", cert.issue_date()),
        ("VERIFICATION_URL", cert.verification_url.clone()),
        ("ORGANIZATION", settings.organization.clone()),
        ("VERIFY_SITE", settings.verify_site.clone()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

/// Builds the mail that delivers a rendered certificate to its student.
pub fn compose_certificate_email(
    cert: &Certificate,
    image_png: Vec<u8>,
    settings: &MailSettings,
) -> MailMessage {
    let values = certificate_values(cert, settings);
    let text_body = PlaceholderReplacer::new(Escaping::Plain).replace_all(&settings.text_template, &values);
    let html_body = PlaceholderReplacer::new(Escaping::Html).replace_all(&settings.html_template, &values);

    MailMessage {
        from: settings.from.clone(),
        to: cert.email.clone(),
        subject: format!("Internship Completion Certificate – {}", cert.course),
        text_body,
        html_body: Some(html_body),
        attachments: vec![Attachment {
            filename: cert.image_filename(),
            content_type: "image/png".to_string(),
            bytes: image_png,
        }],
    }
}

/// Hands mails over for delivery.
pub trait Mailer: Send + Sync {
    fn deliver(&self, message: &MailMessage) -> Result<()>;
}

/// Writes every mail as an `.eml` file into an outbox directory.
pub struct SpoolMailer {
    outbox: PathBuf,
}

impl SpoolMailer {
    pub fn new(outbox: impl Into<PathBuf>) -> Self {
        Self { outbox: outbox.into() }
    }
}

impl Mailer for SpoolMailer {
    fn deliver(&self, message: &MailMessage) -> Result<()> {
        fs::create_dir_all(&self.outbox)?;

        let recipient: String = message
            .to
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' { c } else { '_' })
            .collect();
        let path = self.outbox.join(format!(
            "{}_{}.eml",
            Utc::now().format("%Y%m%dT%H%M%S%.f"),
            recipient
        ));

        let mut f = fs::File::create(&path)?;
        f.write_all(message.to_eml().as_bytes())?;
        f.flush()?;

        info!("Spooled mail for {} to {}", message.to, path.display());
        Ok(())
    }
}

/// Relays mails through an SMTP server.
pub struct SmtpMailer {
    transport: SmtpTransport,
}

impl SmtpMailer {
    /// STARTTLS/TLS relay to `host`; credentials are optional.
    pub fn new(host: &str, port: u16, credentials: Option<(String, String)>) -> Result<Self> {
        let mut builder = SmtpTransport::relay(host)?.port(port);
        if let Some((user, password)) = credentials {
            builder = builder.credentials(Credentials::new(user, password));
        }
        Ok(Self {
            transport: builder.build(),
        })
    }
}

fn parse_address(raw: &str) -> Result<Address> {
    // accept "Name <addr>" as well as a bare address
    let bare = match (raw.find('<'), raw.rfind('>')) {
        (Some(start), Some(end)) if start < end => &raw[start + 1..end],
        _ => raw,
    };
    bare.trim()
        .parse::<Address>()
        .map_err(|e| CertissueError::Mail(format!("invalid address '{}': {}", raw, e)))
}

impl Mailer for SmtpMailer {
    fn deliver(&self, message: &MailMessage) -> Result<()> {
        let envelope = Envelope::new(Some(parse_address(&message.from)?), vec![parse_address(&message.to)?])
            .map_err(|e| CertissueError::Mail(e.to_string()))?;
        debug!("Relaying mail for {}", message.to);
        self.transport.send_raw(&envelope, message.to_eml().as_bytes())?;
        info!("Certificate email sent successfully to {}", message.to);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::sample_certificate;

    fn settings() -> MailSettings {
        MailSettings::new("Certificates <certs@example.org>", "Example Org", "https://verify.example.org/")
    }

    #[test]
    fn test_compose_fills_templates() {
        let cert = sample_certificate();
        let mail = compose_certificate_email(&cert, vec![1, 2, 3], &settings());

        assert_eq!(mail.to, "john@example.com");
        assert_eq!(mail.subject, "Internship Completion Certificate – Data Science");
        assert!(mail.text_body.contains("Dear JOHN DOE,"));
        assert!(mail.text_body.contains("Certificate ID: CERT-ab12cd34"));
        assert!(mail.text_body.contains("Issue Date: 05 March 2024"));
        assert!(mail.html_body.as_ref().unwrap().contains("https://verify.example.org/verify/CERT-ab12cd34/"));
        assert!(!mail.text_body.contains("{{"));
        assert_eq!(mail.attachments[0].filename, "CS_2024_001.png");
    }

    #[test]
    fn test_eml_structure() {
        let cert = sample_certificate();
        let eml = compose_certificate_email(&cert, vec![0u8; 200], &settings()).to_eml();

        assert!(eml.contains("To: john@example.com\r\n"));
        assert!(eml.contains("Subject: =?utf-8?B?"));
        assert!(eml.contains("multipart/alternative"));
        assert!(eml.contains("Content-Type: text/html; charset=\"utf-8\""));
        assert!(eml.contains("Content-Disposition: attachment; filename=\"CS_2024_001.png\""));
        assert!(eml.lines().all(|l| l.len() <= 998));
        assert!(eml.trim_end().ends_with("--"));
    }

    #[test]
    fn test_spool_writes_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let mailer = SpoolMailer::new(dir.path().join("outbox"));
        let mail = MailMessage {
            from: "a@example.org".to_string(),
            to: "b@example.org".to_string(),
            subject: "Hi".to_string(),
            text_body: "Hello".to_string(),
            html_body: None,
            attachments: Vec::new(),
        };
        mailer.deliver(&mail).unwrap();

        let files: Vec<_> = fs::read_dir(dir.path().join("outbox")).unwrap().collect();
        assert_eq!(files.len(), 1);
        let content = fs::read_to_string(files[0].as_ref().unwrap().path()).unwrap();
        assert!(content.contains("Subject: Hi\r\n"));
    }

    #[test]
    fn test_parse_address_forms() {
        assert_eq!(parse_address("Certs <certs@example.org>").unwrap().to_string(), "certs@example.org");
        assert!(parse_address("not an address").is_err());
    }
}
