//! Input and output tables.
//!
//! The input table is CSV with a header row naming at least the
//! [`COL_SEQUENCE`], [`COL_PRODUCT`] and [`COL_IMAGES`] columns. The images
//! column holds a comma-separated list of references, optionally wrapped in
//! quotes. The output table mirrors each row with a second list holding the
//! processed image locations.
//!
//! Both directions go through the `csv` crate, so list fields that contain
//! commas or quotes are escaped by the encoder rather than by hand.

use std::io::{Read, Write};
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// Column names
// ---------------------------------------------------------------------------

/// Sequence number column of the input table.
pub const COL_SEQUENCE: &str = "S.No";
/// Product name column (input and output).
pub const COL_PRODUCT: &str = "Product Name";
/// Image reference list column (input and output).
pub const COL_IMAGES: &str = "Input Image Urls";

/// Sequence number column of the output table.
pub const OUT_COL_SEQUENCE: &str = "S.No.";
/// Processed image list column of the output table.
pub const OUT_COL_OUTPUTS: &str = "Output Image Urls";

/// Placed in an output slot when that image could not be processed.
pub const IMAGE_ERROR_SENTINEL: &str = "Error processing image";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A single row could not be turned into an [`InputRow`]. The row is skipped.
#[derive(Debug, thiserror::Error)]
pub enum RowParseError {
    #[error("Row {ordinal}: missing or empty image reference column")]
    MissingImages { ordinal: usize },

    #[error("Row {ordinal}: malformed record: {reason}")]
    Malformed { ordinal: usize, reason: String },
}

/// Failure while reading the input table.
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    /// Recoverable: only the current row is lost.
    #[error(transparent)]
    Row(#[from] RowParseError),

    /// Fatal: the table cannot be read any further.
    #[error("Failed to read table: {0}")]
    Read(#[source] csv::Error),
}

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

/// One parsed line of the input table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputRow {
    /// Zero-based position of the row among the table's data rows.
    pub ordinal: usize,
    pub sequence: String,
    pub product_name: String,
    /// Image references in input order.
    pub image_refs: Vec<String>,
}

/// Outcome of processing one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageOutcome {
    Processed(PathBuf),
    Failed,
}

impl ImageOutcome {
    /// Value written into the output table for this slot.
    pub fn render(&self) -> String {
        match self {
            ImageOutcome::Processed(path) => path.display().to_string(),
            ImageOutcome::Failed => IMAGE_ERROR_SENTINEL.to_string(),
        }
    }

    pub fn is_processed(&self) -> bool {
        matches!(self, ImageOutcome::Processed(_))
    }
}

/// A fully processed row. `outputs[i]` belongs to `input_refs[i]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowResult {
    pub ordinal: usize,
    pub sequence: String,
    pub product_name: String,
    pub input_refs: Vec<String>,
    pub outputs: Vec<ImageOutcome>,
}

/// Split a raw image column into references.
///
/// Quote characters are removed, the remainder is split on commas and each
/// piece trimmed. Empty pieces are dropped.
pub fn split_image_refs(raw: &str) -> Vec<String> {
    raw.replace('"', "")
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// Column positions resolved from the header row.
#[derive(Debug, Clone, Copy)]
struct Columns {
    sequence: Option<usize>,
    product: Option<usize>,
    images: Option<usize>,
    width: usize,
}

/// Streaming reader over the input table.
///
/// Yields one item per data row. Rows that cannot be used come back as
/// [`TableError::Row`]; the iterator stops after the first
/// [`TableError::Read`].
pub struct TableReader<R> {
    records: csv::StringRecordsIntoIter<R>,
    columns: Columns,
    ordinal: usize,
    done: bool,
}

impl<R: Read> TableReader<R> {
    /// Read the header row and prepare to stream data rows.
    ///
    /// Header names are trimmed; matching is case-sensitive. Rows may carry
    /// more or fewer fields than the header.
    pub fn new(input: R) -> Result<Self, TableError> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::Headers)
            .from_reader(input);

        let headers = reader.headers().map_err(TableError::Read)?;
        let position = |name: &str| headers.iter().position(|h| h == name);
        let columns = Columns {
            sequence: position(COL_SEQUENCE),
            product: position(COL_PRODUCT),
            images: position(COL_IMAGES),
            width: headers.len(),
        };

        if columns.images.is_none() {
            tracing::warn!(
                headers = ?headers,
                column = COL_IMAGES,
                "Input table has no image reference column; every row will be skipped",
            );
        }

        Ok(Self {
            records: reader.into_records(),
            columns,
            ordinal: 0,
            done: false,
        })
    }

    fn parse(&self, ordinal: usize, record: &csv::StringRecord) -> Result<InputRow, RowParseError> {
        let field = |idx: Option<usize>| {
            idx.and_then(|i| record.get(i))
                .unwrap_or_default()
                .to_string()
        };

        let images_idx = self
            .columns
            .images
            .ok_or(RowParseError::MissingImages { ordinal })?;

        // When the images column is the last one, unquoted overflow fields
        // are a continuation of the list.
        let raw_images = if images_idx + 1 == self.columns.width && record.len() > self.columns.width {
            record.iter().skip(images_idx).collect::<Vec<_>>().join(",")
        } else {
            field(Some(images_idx))
        };

        let image_refs = split_image_refs(&raw_images);
        if image_refs.is_empty() {
            return Err(RowParseError::MissingImages { ordinal });
        }

        Ok(InputRow {
            ordinal,
            sequence: field(self.columns.sequence),
            product_name: field(self.columns.product),
            image_refs,
        })
    }
}

impl<R: Read> Iterator for TableReader<R> {
    type Item = Result<InputRow, TableError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let record = self.records.next()?;
        let ordinal = self.ordinal;
        self.ordinal += 1;

        match record {
            Ok(record) => Some(self.parse(ordinal, &record).map_err(TableError::from)),
            Err(err) if err.is_io_error() => {
                self.done = true;
                Some(Err(TableError::Read(err)))
            }
            Err(err) => Some(Err(TableError::Row(RowParseError::Malformed {
                ordinal,
                reason: err.to_string(),
            }))),
        }
    }
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Write the output table: a header followed by one line per result, in the
/// order given.
///
/// The header is quoted only where needed. Data records quote every
/// non-numeric field, so both list columns are always wrapped in quotes even
/// when they hold a single entry.
pub fn write_table<W: Write>(output: W, results: &[RowResult]) -> Result<(), csv::Error> {
    let mut header = csv::Writer::from_writer(output);
    header.write_record([OUT_COL_SEQUENCE, COL_PRODUCT, COL_IMAGES, OUT_COL_OUTPUTS])?;
    let output = header.into_inner().map_err(|e| e.into_error())?;

    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::NonNumeric)
        .from_writer(output);

    for result in results {
        let outputs: Vec<String> = result.outputs.iter().map(ImageOutcome::render).collect();
        writer.write_record([
            result.sequence.as_str(),
            result.product_name.as_str(),
            result.input_refs.join(",").as_str(),
            outputs.join(",").as_str(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn read_all(input: &str) -> Vec<Result<InputRow, TableError>> {
        TableReader::new(input.as_bytes()).unwrap().collect()
    }

    // -- split_image_refs -----------------------------------------------------

    #[test]
    fn split_strips_quotes_and_whitespace() {
        assert_eq!(
            split_image_refs("\"https://x/a.png, https://x/b.png \""),
            vec!["https://x/a.png", "https://x/b.png"]
        );
    }

    #[test]
    fn split_drops_empty_pieces() {
        assert_eq!(split_image_refs("a.png,,b.png,"), vec!["a.png", "b.png"]);
        assert!(split_image_refs(" , ").is_empty());
    }

    // -- TableReader ----------------------------------------------------------

    #[test]
    fn reads_quoted_image_list() {
        let rows = read_all(
            "S.No,Product Name,Input Image Urls\n\
             1,Widget,\"https://x/a.png,https://x/b.png\"\n",
        );

        assert_eq!(rows.len(), 1);
        let row = rows[0].as_ref().unwrap();
        assert_eq!(row.ordinal, 0);
        assert_eq!(row.sequence, "1");
        assert_eq!(row.product_name, "Widget");
        assert_eq!(row.image_refs, vec!["https://x/a.png", "https://x/b.png"]);
    }

    #[test]
    fn header_whitespace_is_trimmed() {
        let rows = read_all(" S.No , Product Name ,  Input Image Urls \n7,Shoe,a.png\n");
        let row = rows[0].as_ref().unwrap();
        assert_eq!(row.sequence, "7");
        assert_eq!(row.image_refs, vec!["a.png"]);
    }

    #[test]
    fn header_matching_is_case_sensitive() {
        let rows = read_all("S.No,Product Name,input image urls\n1,Shoe,a.png\n");
        assert_matches!(
            rows[0],
            Err(TableError::Row(RowParseError::MissingImages { ordinal: 0 }))
        );
    }

    #[test]
    fn unquoted_overflow_fields_join_the_image_list() {
        let rows = read_all(
            "S.No,Product Name,Input Image Urls\n\
             1,\"Widget\",https://x/a.png,https://x/missing.png\n",
        );
        let row = rows[0].as_ref().unwrap();
        assert_eq!(row.product_name, "Widget");
        assert_eq!(row.image_refs, vec!["https://x/a.png", "https://x/missing.png"]);
    }

    #[test]
    fn empty_image_column_is_a_row_error() {
        let rows = read_all(
            "S.No,Product Name,Input Image Urls\n\
             1,Widget,\n\
             2,Gadget,b.png\n",
        );
        assert_eq!(rows.len(), 2);
        assert_matches!(
            rows[0],
            Err(TableError::Row(RowParseError::MissingImages { ordinal: 0 }))
        );
        assert_eq!(rows[1].as_ref().unwrap().ordinal, 1);
    }

    #[test]
    fn short_row_is_a_row_error() {
        let rows = read_all("S.No,Product Name,Input Image Urls\n1,Widget\n");
        assert_matches!(rows[0], Err(TableError::Row(RowParseError::MissingImages { .. })));
    }

    #[test]
    fn header_only_yields_nothing() {
        assert!(read_all("S.No,Product Name,Input Image Urls\n").is_empty());
        assert!(read_all("").is_empty());
    }

    #[test]
    fn invalid_utf8_record_is_skipped_not_fatal() {
        let mut input = b"S.No,Product Name,Input Image Urls\n1,".to_vec();
        input.extend_from_slice(&[0xff, 0xfe]);
        input.extend_from_slice(b",a.png\n2,Ok,b.png\n");

        let rows: Vec<_> = TableReader::new(input.as_slice()).unwrap().collect();
        assert_eq!(rows.len(), 2);
        assert_matches!(rows[0], Err(TableError::Row(RowParseError::Malformed { ordinal: 0, .. })));
        assert_eq!(rows[1].as_ref().unwrap().product_name, "Ok");
    }

    // -- write_table ----------------------------------------------------------

    #[test]
    fn writes_header_and_escapes_lists() {
        let results = vec![RowResult {
            ordinal: 0,
            sequence: "1".into(),
            product_name: "Widget".into(),
            input_refs: vec!["https://x/a.png".into(), "https://x/missing.png".into()],
            outputs: vec![
                ImageOutcome::Processed(PathBuf::from("out/compressed-1.png")),
                ImageOutcome::Failed,
            ],
        }];

        let mut buf = Vec::new();
        write_table(&mut buf, &results).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "S.No.,Product Name,Input Image Urls,Output Image Urls");
        assert_eq!(
            lines[1],
            "1,\"Widget\",\"https://x/a.png,https://x/missing.png\",\"out/compressed-1.png,Error processing image\""
        );
    }

    #[test]
    fn single_entry_lists_are_still_quoted() {
        let results = vec![RowResult {
            ordinal: 0,
            sequence: "7".into(),
            product_name: "Lamp".into(),
            input_refs: vec!["https://x/lamp.png".into()],
            outputs: vec![ImageOutcome::Processed(PathBuf::from("out/lamp.png"))],
        }];

        let mut buf = Vec::new();
        write_table(&mut buf, &results).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert_eq!(
            text.lines().nth(1),
            Some("7,\"Lamp\",\"https://x/lamp.png\",\"out/lamp.png\"")
        );
    }

    #[test]
    fn written_lists_survive_a_csv_reader() {
        let results = vec![RowResult {
            ordinal: 0,
            sequence: "1".into(),
            product_name: "Say \"hi\"".into(),
            input_refs: vec!["a.png".into()],
            outputs: vec![ImageOutcome::Failed],
        }];

        let mut buf = Vec::new();
        write_table(&mut buf, &results).unwrap();

        let mut reader = csv::Reader::from_reader(buf.as_slice());
        let record = reader.records().next().unwrap().unwrap();
        assert_eq!(&record[1], "Say \"hi\"");
        assert_eq!(&record[3], IMAGE_ERROR_SENTINEL);
    }
}
