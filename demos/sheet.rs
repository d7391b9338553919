use std::path::PathBuf;
use std::sync::Arc;

use qrlabels::{read_records, FontResolver, GridConfig, LabelConfig, LabelSheet, PdfConfig};

/// Example: build a printable label sheet from a CSV/TSV/TXT file
/// - Reads and decodes the input file
/// - Renders one label per record (text + QR code)
/// - Packs labels into grid pages and writes `<input>.pdf`
/// - Saves the first label as `<input>-preview.png`
///
/// Usage: cargo run --example sheet -- samples.csv [out.pdf]
/// Set RUST_LOG=debug to see font and layout diagnostics.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let Some(input) = args.next().map(PathBuf::from) else {
        eprintln!("usage: sheet <input.csv|tsv|txt> [output.pdf]");
        return Ok(());
    };
    let output = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| input.with_extension("pdf"));

    let bytes = std::fs::read(&input)?;
    let ingest = read_records(&bytes)?;
    if ingest.is_lossy() {
        eprintln!("File encoding issue: some bytes were replaced. Save your file as UTF-8.");
    }
    println!("{} records found in {}", ingest.records.len(), input.display());
    for (idx, record) in ingest.records.iter().take(10).enumerate() {
        let preview: String = record.qr_text.replace('\n', " | ").chars().take(50).collect();
        println!("  {}. Label: '{}' | QR: {}", idx + 1, record.label_text, preview);
    }

    let sheet = LabelSheet::new(LabelConfig::default(), Arc::new(FontResolver::system()))?;
    let labels = sheet.render(&ingest.records);
    if let Some(first) = labels.first() {
        let preview = input.with_file_name(format!(
            "{}-preview.png",
            input.file_stem().and_then(|s| s.to_str()).unwrap_or("labels")
        ));
        first.save(&preview)?;
        println!("Preview written to {}", preview.display());
    }

    let grid = GridConfig::default();
    let pages = sheet.paginate(&labels, grid)?;
    println!("{} labels & {} pages generated", labels.len(), pages.len());

    match qrlabels::pdf::assemble(&pages, PdfConfig::default())? {
        Some(pdf) => {
            std::fs::write(&output, pdf)?;
            println!("PDF written to {}", output.display());
        }
        None => println!("No labels to print."),
    }
    Ok(())
}
