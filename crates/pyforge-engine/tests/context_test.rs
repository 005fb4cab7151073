use pyforge_engine::{Attachment, NO_FILES_CONTEXT, render_attachments};
use std::fs;

#[test]
fn test_empty_attachment_list() {
    assert_eq!(render_attachments(&[]), NO_FILES_CONTEXT);
}

#[test]
fn test_text_and_python_embedded_verbatim() {
    let dir = tempfile::tempdir().unwrap();
    let notes = dir.path().join("notes.txt");
    let helper = dir.path().join("helper.py");
    fs::write(&notes, "columns are in USD").unwrap();
    fs::write(&helper, "def add(a, b):\n    return a + b\n").unwrap();

    let rendered = render_attachments(&[
        Attachment::from_path(&notes),
        Attachment::from_path(&helper),
    ]);
    assert_eq!(
        rendered,
        "--- START OF FILE: notes.txt ---\n\
         columns are in USD\n\
         --- END OF FILE: notes.txt ---\n\n\
         --- START OF FILE: helper.py ---\n\
         def add(a, b):\n    return a + b\n\n\
         --- END OF FILE: helper.py ---\n\n"
    );
}

#[test]
fn test_csv_rendered_as_aligned_table() {
    let dir = tempfile::tempdir().unwrap();
    let sales = dir.path().join("sales.csv");
    fs::write(&sales, "region,revenue\nnorth,1200\nsouth,87\n").unwrap();

    let rendered = render_attachments(&[Attachment::from_path(&sales)]);
    assert_eq!(
        rendered,
        "--- START OF FILE: sales.csv ---\n\
         region  revenue\n\
         north   1200\n\
         south   87\n\
         --- END OF FILE: sales.csv ---\n\n"
    );
}

#[test]
fn test_unsupported_type_noted() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = dir.path().join("report.pdf");
    fs::write(&pdf, b"%PDF-1.4").unwrap();

    let rendered = render_attachments(&[Attachment::from_path(&pdf)]);
    assert!(rendered.contains("--- START OF FILE: report.pdf ---\nUnsupported file type.\n"));
}

#[test]
fn test_read_errors_rendered_inline() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("gone.txt");
    let bogus = dir.path().join("book.xlsx");
    fs::write(&bogus, "not a zip archive").unwrap();

    let rendered = render_attachments(&[
        Attachment::from_path(&missing),
        Attachment::from_path(&bogus),
    ]);
    assert!(rendered.contains("--- START OF FILE: gone.txt ---\nError reading file: "));
    assert!(rendered.contains("--- START OF FILE: book.xlsx ---\nError reading file: "));
    assert!(rendered.ends_with("--- END OF FILE: book.xlsx ---\n\n"));
}
