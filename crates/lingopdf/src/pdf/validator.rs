//! Pre-flight validation of input PDFs.
//!
//! Reads only the first and last KiB of the file: enough for the header
//! magic, the `%%EOF` marker, the `startxref` pointer, and the common
//! placement of the encryption dictionary reference in the trailer.
//! Documents whose trailer dictionary is not visible in the tail
//! (cross-reference streams) get a real trailer parse via lopdf.

use lopdf::Document;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::{LingoError, Result};

/// Bytes inspected at each end of the file.
const PROBE_BYTES: u64 = 1024;

/// Validate that `path` points at a readable, unencrypted, structurally
/// plausible PDF no larger than `max_file_size_mb`.
pub fn validate(path: &Path, max_file_size_mb: u64) -> Result<()> {
    if !path.exists() {
        return Err(LingoError::NotFound {
            what: format!("input file {}", path.display()),
        });
    }

    if path
        .extension()
        .and_then(|e| e.to_str())
        .is_none_or(|e| !e.eq_ignore_ascii_case("pdf"))
    {
        return Err(LingoError::FormatUnsupported {
            message: "expected a .pdf file".to_string(),
        });
    }

    let mut file = File::open(path)?;
    let size = file.metadata()?.len();
    if size > max_file_size_mb * 1024 * 1024 {
        return Err(LingoError::invalid_input(format!(
            "file is {size} bytes, exceeding the {max_file_size_mb} MiB limit"
        )));
    }

    let mut head = vec![0u8; PROBE_BYTES.min(size) as usize];
    file.read_exact(&mut head)?;
    if !head.starts_with(b"%PDF-") {
        return Err(LingoError::FormatUnsupported {
            message: "missing %PDF- header".to_string(),
        });
    }

    let tail_start = size.saturating_sub(PROBE_BYTES);
    file.seek(SeekFrom::Start(tail_start))?;
    let mut tail = Vec::with_capacity((size - tail_start) as usize);
    file.read_to_end(&mut tail)?;

    if !contains(&tail, b"%%EOF") {
        return Err(LingoError::Corrupted {
            message: "missing %%EOF marker".to_string(),
        });
    }
    if !contains(&tail, b"startxref") && !contains(&tail, b"xref") {
        return Err(LingoError::Corrupted {
            message: "missing cross-reference table pointer".to_string(),
        });
    }

    // The trailer of an encrypted document references its encryption
    // dictionary; for ordinary single-revision files it sits in the tail.
    if contains(&tail, b"/Encrypt") {
        return Err(LingoError::Encrypted);
    }

    // Cross-reference-stream documents keep the trailer dictionary inside
    // a compressed stream where the tail scan cannot see it; parse the
    // trailer for real before declaring the document unencrypted.
    if !contains(&tail, b"trailer") {
        load_trailer_probe(path)?;
    }

    Ok(())
}

/// Load the document and inspect its parsed trailer.
fn load_trailer_probe(path: &Path) -> Result<()> {
    let doc = Document::load(path).map_err(|err| {
        let detail = err.to_string();
        let lowered = detail.to_lowercase();
        if lowered.contains("encrypt") || lowered.contains("password") || lowered.contains("decrypt")
        {
            LingoError::Encrypted
        } else {
            LingoError::Corrupted { message: detail }
        }
    })?;
    probe_trailer(&doc)
}

fn probe_trailer(doc: &Document) -> Result<()> {
    if doc.trailer.get(b"Encrypt").is_ok() {
        return Err(LingoError::Encrypted);
    }
    Ok(())
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, content: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(content).unwrap();
        path
    }

    fn minimal_pdf() -> Vec<u8> {
        b"%PDF-1.5\n1 0 obj\n<< /Type /Catalog >>\nendobj\nxref\n0 1\ntrailer\n<< /Size 1 >>\nstartxref\n9\n%%EOF\n".to_vec()
    }

    #[test]
    fn test_accepts_minimal_pdf() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "ok.pdf", &minimal_pdf());
        assert!(validate(&path, 50).is_ok());
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = validate(&dir.path().join("absent.pdf"), 50).unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[test]
    fn test_wrong_extension() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "doc.docx", &minimal_pdf());
        let err = validate(&path, 50).unwrap_err();
        assert_eq!(err.code(), "FORMAT_UNSUPPORTED");
    }

    #[test]
    fn test_wrong_header() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "fake.pdf", b"PK\x03\x04 this is a zip\n%%EOF\nstartxref");
        let err = validate(&path, 50).unwrap_err();
        assert_eq!(err.code(), "FORMAT_UNSUPPORTED");
    }

    #[test]
    fn test_missing_eof() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "cut.pdf", b"%PDF-1.5\nstartxref\n9\n");
        let err = validate(&path, 50).unwrap_err();
        assert_eq!(err.code(), "CORRUPTED");
    }

    #[test]
    fn test_missing_xref() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "noxref.pdf", b"%PDF-1.5\nsome body\n%%EOF\n");
        let err = validate(&path, 50).unwrap_err();
        assert_eq!(err.code(), "CORRUPTED");
    }

    #[test]
    fn test_encrypted_trailer_detected() {
        let dir = TempDir::new().unwrap();
        let content = b"%PDF-1.5\nbody\ntrailer\n<< /Encrypt 5 0 R /Size 6 >>\nstartxref\n99\n%%EOF\n";
        let path = write_file(&dir, "locked.pdf", content);
        let err = validate(&path, 50).unwrap_err();
        assert_eq!(err.code(), "ENCRYPTED");
    }

    fn build_lopdf_document() -> lopdf::Document {
        use lopdf::{Dictionary, Object};

        let mut doc = lopdf::Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let page_id = doc.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Page".to_vec())),
            ("Parent", Object::Reference(pages_id)),
            (
                "MediaBox",
                Object::Array(vec![0.into(), 0.into(), 612.into(), 792.into()]),
            ),
        ]));
        let pages = Dictionary::from_iter([
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Kids", Object::Array(vec![Object::Reference(page_id)])),
            ("Count", Object::Integer(1)),
        ]);
        doc.objects.insert(pages_id, Object::Dictionary(pages));
        let catalog_id = doc.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(pages_id)),
        ]));
        doc.trailer.set("Root", Object::Reference(catalog_id));
        doc
    }

    #[test]
    fn test_probe_trailer_plain_document() {
        let doc = build_lopdf_document();
        assert!(probe_trailer(&doc).is_ok());
    }

    #[test]
    fn test_probe_trailer_flags_encrypt_entry() {
        let mut doc = build_lopdf_document();
        doc.trailer
            .set("Encrypt", lopdf::Object::Reference((99, 0)));
        let err = probe_trailer(&doc).unwrap_err();
        assert_eq!(err.code(), "ENCRYPTED");
    }

    #[test]
    fn test_load_trailer_probe_accepts_saved_document() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("plain.pdf");
        build_lopdf_document().save(&path).unwrap();
        assert!(load_trailer_probe(&path).is_ok());
        // A document lopdf itself wrote passes full validation too.
        assert!(validate(&path, 50).is_ok());
    }

    #[test]
    fn test_oversized_file_rejected() {
        let dir = TempDir::new().unwrap();
        let mut content = minimal_pdf();
        content.resize(2 * 1024 * 1024, b' ');
        // Keep the EOF marker at the end after resizing.
        let len = content.len();
        content[len - 6..].copy_from_slice(b"%%EOF\n");
        let path = write_file(&dir, "big.pdf", &content);
        let err = validate(&path, 1).unwrap_err();
        assert_eq!(err.code(), "INVALID_INPUT");
    }
}
