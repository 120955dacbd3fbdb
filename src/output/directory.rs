use super::OutputSink;
use crate::segmentation::SegmentationOutput;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// `<prefix>_<YYYYmmdd_HHMMSS>` using local time
pub fn timestamp_name(prefix: &str) -> String {
    format!("{}_{}", prefix, chrono::Local::now().format("%Y%m%d_%H%M%S"))
}

/// Writes PNG renderings into a directory, creating it on first use
pub struct DirectorySink {
    dir: PathBuf,
    prefix: String,
    save_mask: bool,
}

impl DirectorySink {
    pub fn new<P: AsRef<Path>>(dir: P, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            prefix: prefix.into(),
            save_mask: false,
        }
    }

    /// Also write the binary mask next to the composites
    pub fn with_mask(mut self, save_mask: bool) -> Self {
        self.save_mask = save_mask;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl OutputSink for DirectorySink {
    fn write_result(&mut self, result: &SegmentationOutput) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create output directory {}", self.dir.display()))?;

        let stem = timestamp_name(&self.prefix);
        let mut written = Vec::new();

        if let Some(white) = &result.white {
            let path = self.dir.join(format!("{stem}_white.png"));
            white
                .save(&path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            written.push(path);
        }
        if let Some(transparent) = &result.transparent {
            let path = self.dir.join(format!("{stem}_transparent.png"));
            transparent
                .save(&path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            written.push(path);
        }
        if self.save_mask {
            let path = self.dir.join(format!("{stem}_mask.png"));
            result
                .mask
                .save(&path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            written.push(path);
        }

        for path in &written {
            tracing::info!("Wrote {}", path.display());
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segmentation::Analysis;
    use image::{GrayImage, RgbImage, RgbaImage};

    fn result(white: bool, transparent: bool) -> SegmentationOutput {
        SegmentationOutput {
            original: RgbImage::new(4, 4),
            mask: GrayImage::new(4, 4),
            white: white.then(|| RgbImage::new(4, 4)),
            transparent: transparent.then(|| RgbaImage::new(4, 4)),
            analysis: Analysis {
                cluster_delta_lab: 0.0,
                foreground_edge_density: 0.0,
                foreground_border_touch: 0.0,
            },
        }
    }

    #[test]
    fn timestamp_names_carry_the_prefix() {
        let name = timestamp_name("seg_k2");
        assert!(name.starts_with("seg_k2_"));
        assert_eq!(name.len(), "seg_k2_".len() + 15);
    }

    #[test]
    fn writes_requested_renderings() {
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().join("outputs");
        let mut sink = DirectorySink::new(&out_dir, "seg_k2");

        let written = sink.write_result(&result(true, true)).unwrap();
        assert_eq!(written.len(), 2);
        assert!(written.iter().all(|p| p.exists()));
        assert!(written[0].to_string_lossy().ends_with("_white.png"));
        assert!(written[1].to_string_lossy().ends_with("_transparent.png"));
    }

    #[test]
    fn mask_is_optional() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = DirectorySink::new(dir.path(), "run").with_mask(true);
        let written = sink.write_result(&result(false, true)).unwrap();
        assert_eq!(written.len(), 2);
        assert!(written[1].to_string_lossy().ends_with("_mask.png"));
        assert_eq!(sink.dir(), dir.path());
    }
}
