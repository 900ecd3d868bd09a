//! PDF page splitting using lopdf.
//!
//! The scanned reports alternate a housing-units page and a valuation page
//! for the same set of rows. Each such page pair is cut out into its own
//! small PDF before it is sent to the model, which keeps uploads small and
//! prevents the model from mixing rows of neighbouring tables.
//!
//! ## Usage
//!
//! ```no_run
//! use permit_extract::pdf::{page_pairs, ScannedReport};
//! use std::path::Path;
//!
//! # fn example() -> anyhow::Result<()> {
//! let report = ScannedReport::open(Path::new("scans/MSA_Annual 1967.pdf"))?;
//!
//! for pair in page_pairs(report.page_count()) {
//!     let bytes = report.extract_pages(&[pair.first, pair.second])?;
//!     println!("pages {pair}: {} KB", bytes.len() / 1024);
//! }
//! # Ok(())
//! # }
//! ```

use anyhow::{Context, Result};
use lopdf::Document;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Two consecutive 1-based pages describing the same table rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PagePair {
    /// Housing-units page
    pub first: u32,
    /// Valuation page
    pub second: u32,
}

impl PagePair {
    /// The pair starting at `first`.
    #[inline]
    #[must_use = "creates a page pair"]
    pub const fn starting_at(first: u32) -> Self {
        Self {
            first,
            second: first + 1,
        }
    }

    /// File name of the pair's cached output, e.g. `pages_03_04.json`.
    #[must_use = "returns the output file name"]
    pub fn output_file_name(&self) -> String {
        format!("pages_{:02}_{:02}.json", self.first, self.second)
    }
}

impl fmt::Display for PagePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.first, self.second)
    }
}

/// Page pairs `(1,2), (3,4), ...` of a document; a trailing odd page is ignored.
#[must_use = "returns the page pairs"]
pub fn page_pairs(page_count: usize) -> Vec<PagePair> {
    (0..page_count / 2)
        .filter_map(|i| u32::try_from(i * 2 + 1).ok())
        .map(PagePair::starting_at)
        .collect()
}

/// A scanned report loaded into memory.
#[derive(Debug, Clone)]
pub struct ScannedReport {
    path: PathBuf,
    document: Document,
}

impl ScannedReport {
    /// Load a PDF from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed as a PDF.
    pub fn open(path: &Path) -> Result<Self> {
        let document = Document::load(path)
            .with_context(|| format!("Failed to load PDF {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            document,
        })
    }

    /// Load a PDF from bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a PDF.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let document = Document::load_mem(bytes).context("Failed to parse PDF")?;
        Ok(Self {
            path: PathBuf::new(),
            document,
        })
    }

    /// Number of pages.
    #[inline]
    #[must_use = "returns the page count"]
    pub fn page_count(&self) -> usize {
        self.document.get_pages().len()
    }

    /// Build a standalone PDF containing only `pages` (1-based).
    ///
    /// # Errors
    ///
    /// Returns an error if a page is out of range or serialization fails.
    pub fn extract_pages(&self, pages: &[u32]) -> Result<Vec<u8>> {
        let all_pages: Vec<u32> = self.document.get_pages().keys().copied().collect();
        if let Some(missing) = pages.iter().find(|p| !all_pages.contains(p)) {
            anyhow::bail!(
                "Page {missing} not found in {} ({} pages)",
                self.path.display(),
                all_pages.len()
            );
        }

        let mut document = self.document.clone();
        let unwanted: Vec<u32> = all_pages
            .into_iter()
            .filter(|p| !pages.contains(p))
            .collect();
        document.delete_pages(&unwanted);
        document.prune_objects();
        document.renumber_objects();

        let mut bytes = Vec::new();
        document
            .save_to(&mut bytes)
            .context("Failed to write extracted pages")?;
        Ok(bytes)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use lopdf::{dictionary, Document, Object, Stream};

    /// A minimal PDF whose page `n` has the content stream `% page n`.
    pub fn sample_pdf(pages: u32) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let kids: Vec<Object> = (1..=pages)
            .map(|n| {
                let content_id = doc.add_object(Stream::new(
                    dictionary! {},
                    format!("% page {n}").into_bytes(),
                ));
                doc.add_object(dictionary! {
                    "Type" => "Page",
                    "Parent" => pages_id,
                    "Contents" => content_id,
                })
                .into()
            })
            .collect();

        let page_tree = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => i64::from(pages),
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        };
        doc.objects.insert(pages_id, Object::Dictionary(page_tree));

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::sample_pdf;
    use super::*;

    #[test]
    fn test_page_pairs() {
        assert_eq!(
            page_pairs(5),
            vec![PagePair::starting_at(1), PagePair::starting_at(3)]
        );
        assert!(page_pairs(1).is_empty());
        assert!(page_pairs(0).is_empty());
    }

    #[test]
    fn test_page_pair_names() {
        let pair = PagePair::starting_at(9);
        assert_eq!(pair.to_string(), "9-10");
        assert_eq!(pair.output_file_name(), "pages_09_10.json");
        assert_eq!(
            PagePair::starting_at(101).output_file_name(),
            "pages_101_102.json"
        );
    }

    #[test]
    fn test_extract_pair() {
        let report = ScannedReport::from_bytes(&sample_pdf(6)).unwrap();
        assert_eq!(report.page_count(), 6);

        let bytes = report.extract_pages(&[3, 4]).unwrap();
        let pair = Document::load_mem(&bytes).unwrap();
        let pages = pair.get_pages();
        assert_eq!(pages.len(), 2);

        let first = pair.get_page_content(pages[&1]).unwrap();
        let second = pair.get_page_content(pages[&2]).unwrap();
        assert_eq!(first, b"% page 3");
        assert_eq!(second, b"% page 4");
    }

    #[test]
    fn test_extract_out_of_range() {
        let report = ScannedReport::from_bytes(&sample_pdf(2)).unwrap();
        let err = report.extract_pages(&[3, 4]).unwrap_err();
        assert!(err.to_string().contains("Page 3 not found"));
    }

    #[test]
    fn test_open_from_disk() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("MSA_Annual 1967.pdf");
        std::fs::write(&path, sample_pdf(4)).unwrap();
        assert_eq!(ScannedReport::open(&path).unwrap().page_count(), 4);

        let err = ScannedReport::open(&dir.path().join("missing.pdf")).unwrap_err();
        assert!(err.to_string().contains("missing.pdf"));
    }
}
