use std::path::Path;

use docx_rs::{DocumentChild, Paragraph, ParagraphChild, RunChild};

use super::ExtractionError;

const FORMAT: &str = "DOCX";

/// Paragraph texts in document order, one per line. Empty paragraphs keep
/// their (empty) line.
pub(super) fn extract_docx(path: &Path) -> Result<String, ExtractionError> {
    let bytes = std::fs::read(path)?;
    let docx = docx_rs::read_docx(&bytes).map_err(|e| ExtractionError::parse(FORMAT, e))?;

    let paragraphs: Vec<String> = docx
        .document
        .children
        .iter()
        .filter_map(|child| match child {
            DocumentChild::Paragraph(paragraph) => Some(paragraph_text(paragraph)),
            _ => None,
        })
        .collect();

    Ok(paragraphs.join("\n"))
}

fn paragraph_text(paragraph: &Paragraph) -> String {
    let mut text = String::new();
    for child in &paragraph.children {
        if let ParagraphChild::Run(run) = child {
            for run_child in &run.children {
                match run_child {
                    RunChild::Text(t) => text.push_str(&t.text),
                    RunChild::Tab(_) => text.push('\t'),
                    _ => {}
                }
            }
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use docx_rs::{Docx, Run};

    fn write_docx(path: &Path, paragraphs: &[&str]) {
        let mut docx = Docx::new();
        for p in paragraphs {
            let paragraph = if p.is_empty() {
                Paragraph::new()
            } else {
                Paragraph::new().add_run(Run::new().add_text(*p))
            };
            docx = docx.add_paragraph(paragraph);
        }
        let file = std::fs::File::create(path).unwrap();
        docx.build().pack(file).unwrap();
    }

    #[test]
    fn joins_paragraphs_with_newlines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("letter.docx");
        write_docx(&path, &["Dear team,", "", "Contact ops@example.com"]);

        let text = extract_docx(&path).unwrap();
        assert_eq!(text, "Dear team,\n\nContact ops@example.com");
    }

    #[test]
    fn not_a_zip_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.docx");
        std::fs::write(&path, b"plain bytes").unwrap();

        assert!(matches!(
            extract_docx(&path),
            Err(ExtractionError::Parse { format: "DOCX", .. })
        ));
    }
}
