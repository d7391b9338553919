use std::sync::Arc;

use image::RgbaImage;
use log::info;
use rayon::prelude::*;

use crate::config::{GridConfig, LabelConfig, PdfConfig};
use crate::error::Result;
use crate::font::FontResolver;
use crate::grid;
use crate::label::LabelRenderer;
use crate::pdf;
use crate::records::Record;

/// Batch pipeline: records → labels → grid pages → PDF.
///
/// - `config`: validated once, read-only afterwards
/// - `resolver`: shared font resolver (its font lookup runs once)
pub struct LabelSheet {
    config: LabelConfig,
    resolver: Arc<FontResolver>,
}

impl LabelSheet {
    pub fn new(config: LabelConfig, resolver: Arc<FontResolver>) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, resolver })
    }

    pub fn config(&self) -> &LabelConfig {
        &self.config
    }

    /// Renders every record, in input order. Records are independent, so
    /// they are rendered across the rayon pool.
    pub fn render(&self, records: &[Record]) -> Vec<RgbaImage> {
        let renderer = LabelRenderer::new(&self.resolver);
        let labels: Vec<RgbaImage> = records
            .par_iter()
            .map(|record| renderer.render(record, &self.config))
            .collect();
        info!("{} labels rendered", labels.len());
        labels
    }

    pub fn paginate(&self, labels: &[RgbaImage], grid: GridConfig) -> Result<Vec<RgbaImage>> {
        grid::paginate(labels, grid)
    }

    /// Full run. `Ok(None)` when there were no records to print.
    pub fn build_pdf(
        &self,
        records: &[Record],
        grid: GridConfig,
        settings: PdfConfig,
    ) -> Result<Option<Vec<u8>>> {
        let labels = self.render(records);
        let pages = self.paginate(&labels, grid)?;
        pdf::assemble(&pages, settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn sheet() -> LabelSheet {
        LabelSheet::new(LabelConfig::default(), Arc::new(FontResolver::bitmap_only())).unwrap()
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = LabelConfig { qr_size: 700, ..LabelConfig::default() };
        let result = LabelSheet::new(config, Arc::new(FontResolver::bitmap_only()));
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn render_keeps_order_and_size() {
        let records: Vec<Record> = (0..9)
            .map(|i| Record::new(format!("item {i}"), format!("code-{i}")))
            .collect();
        let sheet = sheet();
        let labels = sheet.render(&records);
        assert_eq!(labels.len(), 9);
        assert!(labels.iter().all(|l| l.dimensions() == (600, 200)));

        let again = LabelRenderer::new(&FontResolver::bitmap_only())
            .render(&records[4], sheet.config());
        assert_eq!(labels[4], again);
    }

    #[test]
    fn empty_batch_has_no_document() {
        let pdf = sheet()
            .build_pdf(&[], GridConfig::default(), PdfConfig::default())
            .unwrap();
        assert!(pdf.is_none());
    }
}
