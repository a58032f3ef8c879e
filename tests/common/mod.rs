//! Helpers shared by the integration test binaries.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

/// Build a PDF with one page per entry. An empty entry produces a page with
/// an empty content stream.
pub fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
    let n = pages.len();
    let kids = (0..n)
        .map(|i| format!("{} 0 R", 4 + 2 * i))
        .collect::<Vec<_>>()
        .join(" ");

    let mut bodies = vec![
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        format!("<< /Type /Pages /Kids [{}] /Count {} >>", kids, n),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
    ];
    for (i, text) in pages.iter().enumerate() {
        let content_id = 5 + 2 * i;
        bodies.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
             /Contents {} 0 R /Resources << /Font << /F1 3 0 R >> >> >>",
            content_id
        ));
        let stream = if text.is_empty() {
            String::new()
        } else {
            format!("BT /F1 12 Tf 72 720 Td ({}) Tj ET", text)
        };
        bodies.push(format!(
            "<< /Length {} >>\nstream\n{}\nendstream",
            stream.len(),
            stream
        ));
    }

    let bodies: Vec<&str> = bodies.iter().map(String::as_str).collect();
    pdf_from_objects(&bodies)
}

/// Assemble a PDF from object bodies numbered from 1; object 1 is the root.
pub fn pdf_from_objects(bodies: &[&str]) -> Vec<u8> {
    let mut pdf = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(bodies.len());
    for (i, body) in bodies.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
    }

    let xref_offset = pdf.len();
    pdf.extend_from_slice(format!("xref\n0 {}\n", bodies.len() + 1).as_bytes());
    pdf.extend_from_slice(b"0000000000 65535 f \n");
    for off in &offsets {
        pdf.extend_from_slice(format!("{:010} 00000 n \n", off).as_bytes());
    }
    pdf.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            bodies.len() + 1,
            xref_offset
        )
        .as_bytes(),
    );
    pdf
}

/// A structurally valid PDF whose only page has no `/MediaBox` anywhere in
/// its tree, which the text extractor cannot lay out.
pub fn pdf_without_media_box() -> Vec<u8> {
    pdf_from_objects(&[
        "<< /Type /Catalog /Pages 2 0 R >>",
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>",
        "<< /Type /Page /Parent 2 0 R /Contents 4 0 R \
         /Resources << /Font << /F1 5 0 R >> >> >>",
        "<< /Length 36 >>\nstream\nBT /F1 12 Tf 72 720 Td (Hello) Tj ET\nendstream",
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>",
    ])
}

/// Three pages where the middle one carries no text.
pub fn sample_book() -> Vec<u8> {
    pdf_with_pages(&[
        "The whale rose from the deep water and the sailors watched in wonder.",
        "",
        "Captain Ahab explained the voyage. The crew was happy and the sea was calm.",
    ])
}

/// Write `config/bka.toml` under `root` with storage inside the temp dir,
/// embeddings disabled, and generation pointed at `generation_url`.
pub fn write_config(root: &Path, generation_url: &str, api_key: Option<&str>) -> PathBuf {
    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    let data_dir = root.join("data");

    let key_line = api_key
        .map(|k| format!("api_key = \"{}\"\n", k))
        .unwrap_or_default();
    let config = format!(
        r#"[db]
path = "{db}"

[context]
path = "{ctx}"

[embedding]
provider = "disabled"

[generation]
base_url = "{url}"
timeout_secs = 5
{key_line}
[server]
bind = "127.0.0.1:0"
"#,
        db = data_dir.join("users.db").display(),
        ctx = data_dir.join("user_context.json").display(),
        url = generation_url,
        key_line = key_line,
    );

    let path = config_dir.join("bka.toml");
    fs::write(&path, config).unwrap();
    path
}
