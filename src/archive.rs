//! On-the-fly ZIP assembly for purchased templates.
//!
//! The archive is built in memory (template payloads are small website
//! sources, not binaries) and handed to the response as a single body, so a
//! failed assembly is a clean 500 and never a half-written stream.

use std::io::{Cursor, Write};

use chrono::{DateTime, Utc};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{AppError, Result};
use crate::models::{Purchase, Template};

/// A named file destined for the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveFile {
    pub name: String,
    pub content: String,
}

impl ArchiveFile {
    fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

/// Split a template's `code` payload into the files it ships as.
///
/// `code` is either a JSON bundle with `html` / `css` / `js` (or
/// `javascript`) keys plus an optional `files: [{name, content}]` array of
/// extras, or a single raw HTML document. Anything that does not parse as a
/// recognizable bundle is shipped verbatim as `index.html`.
pub fn split_template_code(code: &str) -> Vec<ArchiveFile> {
    let parsed: serde_json::Value = match serde_json::from_str(code) {
        Ok(v) => v,
        Err(_) => return vec![ArchiveFile::new("index.html", code)],
    };

    let Some(bundle) = parsed.as_object() else {
        return vec![ArchiveFile::new("index.html", code)];
    };

    let mut files = Vec::new();

    if let Some(html) = bundle.get("html").and_then(|v| v.as_str()) {
        files.push(ArchiveFile::new("index.html", html));
    }
    if let Some(css) = bundle.get("css").and_then(|v| v.as_str()) {
        files.push(ArchiveFile::new("styles.css", css));
    }
    let js = bundle
        .get("js")
        .or_else(|| bundle.get("javascript"))
        .and_then(|v| v.as_str());
    if let Some(js) = js {
        files.push(ArchiveFile::new("script.js", js));
    }

    if let Some(extras) = bundle.get("files").and_then(|v| v.as_array()) {
        for extra in extras {
            let name = extra.get("name").and_then(|v| v.as_str());
            let content = extra.get("content").and_then(|v| v.as_str());
            if let (Some(name), Some(content)) = (name, content) {
                files.push(ArchiveFile::new(name, content));
            }
        }
    }

    // A JSON document with none of the recognized keys is not a bundle.
    if files.is_empty() {
        return vec![ArchiveFile::new("index.html", code)];
    }

    files
}

/// Assemble the full download archive for a purchase.
///
/// Contents: `README.md`, the template's code files, `package.json` for
/// SaaS/booking products, and a `LICENSE` bound to the buyer.
pub fn build_template_archive(
    template: &Template,
    purchase: &Purchase,
    support_email: &str,
) -> Result<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(9));

    let write_file = |zip: &mut ZipWriter<Cursor<Vec<u8>>>, name: &str, content: &str| {
        zip.start_file(name, options)
            .map_err(|e| AppError::Internal(format!("Failed to add {} to archive: {}", name, e)))?;
        zip.write_all(content.as_bytes())
            .map_err(|e| AppError::Internal(format!("Failed to write {} to archive: {}", name, e)))
    };

    write_file(&mut zip, "README.md", &readme_text(template, support_email))?;

    for file in split_template_code(&template.code) {
        write_file(&mut zip, &file.name, &file.content)?;
    }

    if template.is_saas_or_booking() {
        write_file(&mut zip, "package.json", &package_json_text(template))?;
    }

    write_file(&mut zip, "LICENSE", &license_text(template, purchase))?;

    let cursor = zip
        .finish()
        .map_err(|e| AppError::Internal(format!("Failed to finalize archive: {}", e)))?;

    Ok(cursor.into_inner())
}

fn readme_text(template: &Template, support_email: &str) -> String {
    format!(
        "# {name}\n\n\
         Thank you for purchasing this template on Run Your Trip.\n\n\
         ## What's included\n\n\
         - `index.html` and any accompanying stylesheets and scripts\n\
         - A `LICENSE` file with your usage grant\n\n\
         ## Getting started\n\n\
         Open `index.html` in a browser, or deploy the folder to any static\n\
         host. Replace the placeholder copy and imagery with your own.\n\n\
         Category: {category}\n\n\
         ## Support\n\n\
         Questions or issues? Contact {support}.\n",
        name = template.name,
        category = template.category,
        support = support_email,
    )
}

fn package_json_text(template: &Template) -> String {
    serde_json::json!({
        "name": template.slug(),
        "version": "1.0.0",
        "private": true,
        "description": format!("{} - a Run Your Trip template", template.name),
        "scripts": {
            "start": "npx serve ."
        }
    })
    .to_string()
}

fn license_text(template: &Template, purchase: &Purchase) -> String {
    let purchase_date = DateTime::<Utc>::from_timestamp(purchase.created_at, 0)
        .map(|dt| dt.format("%b %d, %Y").to_string())
        .unwrap_or_else(|| "Unknown date".to_string());

    format!(
        "Run Your Trip Template License\n\
         ==============================\n\n\
         Template: {name}\n\
         Licensed to buyer: {buyer}\n\
         Purchase date: {date}\n\n\
         This license grants the buyer a non-exclusive, non-transferable\n\
         right to use and modify this template for their own websites.\n\
         Resale or redistribution of the template, modified or not, is not\n\
         permitted.\n",
        name = template.name,
        buyer = purchase.user_id,
        date = purchase_date,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_json_bundle() {
        let code = r#"{"html":"<h1>A</h1>","css":"body{}","js":"console.log(1)"}"#;
        let files = split_template_code(code);
        assert_eq!(
            files,
            vec![
                ArchiveFile::new("index.html", "<h1>A</h1>"),
                ArchiveFile::new("styles.css", "body{}"),
                ArchiveFile::new("script.js", "console.log(1)"),
            ]
        );
    }

    #[test]
    fn test_split_accepts_javascript_key() {
        let code = r#"{"html":"<p>x</p>","javascript":"alert(1)"}"#;
        let files = split_template_code(code);
        assert_eq!(files.len(), 2);
        assert_eq!(files[1], ArchiveFile::new("script.js", "alert(1)"));
    }

    #[test]
    fn test_split_bundle_with_extra_files() {
        let code = r#"{"html":"<p>x</p>","files":[{"name":"about.html","content":"<p>about</p>"}]}"#;
        let files = split_template_code(code);
        assert_eq!(files.len(), 2);
        assert_eq!(files[1], ArchiveFile::new("about.html", "<p>about</p>"));
    }

    #[test]
    fn test_raw_html_falls_back_to_index() {
        let code = "<!doctype html><html><body>hi</body></html>";
        let files = split_template_code(code);
        assert_eq!(files, vec![ArchiveFile::new("index.html", code)]);
    }

    #[test]
    fn test_unrecognized_json_falls_back_to_index() {
        // Parses as JSON but is not a bundle - ship verbatim
        let code = r#"{"title":"not a bundle"}"#;
        let files = split_template_code(code);
        assert_eq!(files, vec![ArchiveFile::new("index.html", code)]);
    }
}
