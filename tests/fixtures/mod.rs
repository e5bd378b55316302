//! Test fixtures for generating XLSX and ODS documents in memory.
//!
//! # Example
//!
//! ```rust
//! use fixtures::{OdsBuilder, OdsCell, SheetBuilder, XlsxBuilder};
//!
//! let xlsx = XlsxBuilder::new()
//!     .sheet(
//!         SheetBuilder::new("Week 1")
//!             .cell("A1", "Day")
//!             .formatted("B2", 72.5, "0.0"),
//!     )
//!     .build();
//!
//! let ods = OdsBuilder::new("Week 1")
//!     .row([OdsCell::text("Day"), OdsCell::float(72.5)])
//!     .build();
//! ```
#![allow(
    dead_code,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::float_cmp,
    clippy::panic,
    clippy::cast_possible_truncation,
    clippy::cast_lossless
)]

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use xlsnap::cell_ref::col_to_letter;
use zip::write::FileOptions;
use zip::ZipWriter;

/// Escape text for XML content and attribute values.
pub fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Write `bytes` to `<dir>/<name>` and return the path.
pub fn write_fixture(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).expect("Failed to write fixture");
    path
}

fn zip_parts(parts: &[(&str, String)]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    for (name, content) in parts {
        zip.start_file(*name, options).expect("Failed to start ZIP entry");
        zip.write_all(content.as_bytes()).expect("Failed to write ZIP entry");
    }
    zip.finish().expect("Failed to finish ZIP").into_inner()
}

// ============================================================================
// XLSX
// ============================================================================

/// Value of an XLSX fixture cell.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    /// Shared string (t="s")
    String(String),
    /// Inline string (t="inlineStr")
    InlineString(String),
    Number(f64),
    Boolean(bool),
    Error(String),
    /// Arbitrary `t` attribute and `<v>` text, for malformed input
    Raw { cell_type: String, value: String },
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::String(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::String(s)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<i32> for CellValue {
    fn from(n: i32) -> Self {
        CellValue::Number(f64::from(n))
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Boolean(b)
    }
}

#[derive(Debug, Clone)]
pub struct CellEntry {
    pub cell_ref: String,
    pub value: CellValue,
    pub number_format: Option<String>,
}

impl CellEntry {
    /// 1-based row number from the reference's digits.
    fn row(&self) -> u32 {
        let digits: String = self.cell_ref.chars().filter(char::is_ascii_digit).collect();
        digits.parse().expect("cell reference has a row number")
    }
}

/// Builder for a single worksheet.
#[derive(Debug, Clone, Default)]
pub struct SheetBuilder {
    pub name: String,
    pub cells: Vec<CellEntry>,
    /// 1-based rows written as `<row r="N"/>`
    pub empty_rows: Vec<u32>,
}

impl SheetBuilder {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn cell<V: Into<CellValue>>(mut self, cell_ref: &str, value: V) -> Self {
        self.cells.push(CellEntry {
            cell_ref: cell_ref.to_string(),
            value: value.into(),
            number_format: None,
        });
        self
    }

    /// Number cell styled with a custom number format code.
    #[must_use]
    pub fn formatted(mut self, cell_ref: &str, value: f64, format_code: &str) -> Self {
        self.cells.push(CellEntry {
            cell_ref: cell_ref.to_string(),
            value: CellValue::Number(value),
            number_format: Some(format_code.to_string()),
        });
        self
    }

    #[must_use]
    pub fn raw(self, cell_ref: &str, cell_type: &str, value: &str) -> Self {
        self.cell(
            cell_ref,
            CellValue::Raw {
                cell_type: cell_type.to_string(),
                value: value.to_string(),
            },
        )
    }

    #[must_use]
    pub fn empty_row(mut self, row: u32) -> Self {
        self.empty_rows.push(row);
        self
    }

    /// Fill `rows` x `cols` cells starting at A1; the first row holds labels.
    #[must_use]
    pub fn grid(mut self, rows: u32, cols: u32) -> Self {
        for r in 1..=rows {
            for c in 0..cols {
                let cell_ref = format!("{}{r}", col_to_letter(c));
                self = if r == 1 {
                    self.cell(&cell_ref, format!("Col {}", c + 1))
                } else {
                    self.cell(&cell_ref, f64::from(r * 10 + c))
                };
            }
        }
        self
    }
}

/// Builder for creating XLSX packages in memory.
#[derive(Debug, Clone, Default)]
pub struct XlsxBuilder {
    sheets: Vec<SheetBuilder>,
    omit_sheet_parts: bool,
    omit_relationships: bool,
}

impl XlsxBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn sheet(mut self, sheet: SheetBuilder) -> Self {
        self.sheets.push(sheet);
        self
    }

    /// List the sheets in the workbook but leave out their worksheet parts.
    #[must_use]
    pub fn without_sheet_parts(mut self) -> Self {
        self.omit_sheet_parts = true;
        self
    }

    /// Leave out `xl/_rels/workbook.xml.rels`.
    #[must_use]
    pub fn without_relationships(mut self) -> Self {
        self.omit_relationships = true;
        self
    }

    #[must_use]
    pub fn build(self) -> Vec<u8> {
        let mut shared_strings: Vec<String> = Vec::new();
        let mut formats: Vec<String> = Vec::new();
        for cell in self.sheets.iter().flat_map(|s| &s.cells) {
            if let CellValue::String(ref s) = cell.value {
                if !shared_strings.contains(s) {
                    shared_strings.push(s.clone());
                }
            }
            if let Some(ref f) = cell.number_format {
                if !formats.contains(f) {
                    formats.push(f.clone());
                }
            }
        }

        let sheet_paths: Vec<String> = (1..=self.sheets.len())
            .map(|i| format!("xl/worksheets/sheet{i}.xml"))
            .collect();
        let mut parts = vec![
            ("[Content_Types].xml", generate_content_types(self.sheets.len())),
            ("_rels/.rels", generate_rels()),
            ("xl/workbook.xml", generate_workbook(&self.sheets)),
            ("xl/styles.xml", generate_styles(&formats)),
        ];
        if !self.omit_relationships {
            parts.push(("xl/_rels/workbook.xml.rels", generate_workbook_rels(self.sheets.len())));
        }
        if !shared_strings.is_empty() {
            parts.push(("xl/sharedStrings.xml", generate_shared_strings(&shared_strings)));
        }
        if !self.omit_sheet_parts {
            for (sheet, path) in self.sheets.iter().zip(&sheet_paths) {
                parts.push((path.as_str(), generate_sheet(sheet, &shared_strings, &formats)));
            }
        }
        zip_parts(&parts)
    }
}

fn generate_content_types(sheet_count: usize) -> String {
    let mut xml = String::new();
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    xml.push_str(r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#);
    xml.push_str(r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#);
    xml.push_str(r#"<Default Extension="xml" ContentType="application/xml"/>"#);
    xml.push_str(r#"<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>"#);
    for i in 1..=sheet_count {
        xml.push_str(&format!(
            r#"<Override PartName="/xl/worksheets/sheet{i}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#
        ));
    }
    xml.push_str("</Types>");
    xml
}

fn generate_rels() -> String {
    let mut xml = String::new();
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    xml.push_str(r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#);
    xml.push_str(r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>"#);
    xml.push_str("</Relationships>");
    xml
}

fn generate_workbook_rels(sheet_count: usize) -> String {
    let mut xml = String::new();
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    xml.push_str(r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#);
    for i in 1..=sheet_count {
        xml.push_str(&format!(
            r#"<Relationship Id="rId{i}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{i}.xml"/>"#
        ));
    }
    let next = sheet_count + 1;
    xml.push_str(&format!(
        r#"<Relationship Id="rId{next}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>"#
    ));
    xml.push_str(&format!(
        r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings" Target="sharedStrings.xml"/>"#,
        next + 1
    ));
    xml.push_str("</Relationships>");
    xml
}

fn generate_workbook(sheets: &[SheetBuilder]) -> String {
    let mut xml = String::new();
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    xml.push_str(r#"<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">"#);
    xml.push_str("<sheets>");
    for (i, sheet) in sheets.iter().enumerate() {
        xml.push_str(&format!(
            r#"<sheet name="{}" sheetId="{}" r:id="rId{}"/>"#,
            escape(&sheet.name),
            i + 1,
            i + 1
        ));
    }
    xml.push_str("</sheets></workbook>");
    xml
}

/// Custom formats get ids from 164 and one `cellXfs` entry each, after the
/// default entry at index 0.
fn generate_styles(formats: &[String]) -> String {
    let mut xml = String::new();
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    xml.push_str(r#"<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">"#);
    if !formats.is_empty() {
        xml.push_str(&format!(r#"<numFmts count="{}">"#, formats.len()));
        for (i, code) in formats.iter().enumerate() {
            xml.push_str(&format!(
                r#"<numFmt numFmtId="{}" formatCode="{}"/>"#,
                164 + i,
                escape(code)
            ));
        }
        xml.push_str("</numFmts>");
    }
    xml.push_str(r#"<fonts count="1"><font><sz val="11"/><name val="Calibri"/></font></fonts>"#);
    xml.push_str(r#"<cellStyleXfs count="1"><xf numFmtId="0" fontId="0"/></cellStyleXfs>"#);
    xml.push_str(&format!(r#"<cellXfs count="{}">"#, formats.len() + 1));
    xml.push_str(r#"<xf numFmtId="0" fontId="0" xfId="0"/>"#);
    for i in 0..formats.len() {
        xml.push_str(&format!(
            r#"<xf numFmtId="{}" fontId="0" xfId="0" applyNumberFormat="1"/>"#,
            164 + i
        ));
    }
    xml.push_str("</cellXfs></styleSheet>");
    xml
}

fn generate_shared_strings(strings: &[String]) -> String {
    let mut xml = String::new();
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    xml.push_str(&format!(
        r#"<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="{0}" uniqueCount="{0}">"#,
        strings.len()
    ));
    for s in strings {
        xml.push_str(&format!(r#"<si><t xml:space="preserve">{}</t></si>"#, escape(s)));
    }
    xml.push_str("</sst>");
    xml
}

fn generate_cell(cell: &CellEntry, shared_strings: &[String], formats: &[String]) -> String {
    let style = cell
        .number_format
        .as_ref()
        .and_then(|f| formats.iter().position(|x| x == f))
        .map(|i| format!(r#" s="{}""#, i + 1))
        .unwrap_or_default();
    let r = &cell.cell_ref;
    match &cell.value {
        CellValue::String(s) => {
            let idx = shared_strings.iter().position(|x| x == s).unwrap_or(0);
            format!(r#"<c r="{r}" t="s"{style}><v>{idx}</v></c>"#)
        }
        CellValue::InlineString(s) => {
            format!(r#"<c r="{r}" t="inlineStr"{style}><is><t>{}</t></is></c>"#, escape(s))
        }
        CellValue::Number(n) => format!(r#"<c r="{r}"{style}><v>{n}</v></c>"#),
        CellValue::Boolean(b) => format!(r#"<c r="{r}" t="b"{style}><v>{}</v></c>"#, u8::from(*b)),
        CellValue::Error(e) => format!(r#"<c r="{r}" t="e"{style}><v>{}</v></c>"#, escape(e)),
        CellValue::Raw { cell_type, value } => format!(
            r#"<c r="{r}" t="{}"{style}><v>{}</v></c>"#,
            escape(cell_type),
            escape(value)
        ),
    }
}

fn generate_sheet(sheet: &SheetBuilder, shared_strings: &[String], formats: &[String]) -> String {
    let mut rows: Vec<u32> = sheet.cells.iter().map(CellEntry::row).collect();
    rows.extend(&sheet.empty_rows);
    rows.sort_unstable();
    rows.dedup();

    let mut xml = String::new();
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    xml.push_str(r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">"#);
    xml.push_str("<sheetData>");
    for row in rows {
        let cells: Vec<&CellEntry> = sheet.cells.iter().filter(|c| c.row() == row).collect();
        if cells.is_empty() {
            xml.push_str(&format!(r#"<row r="{row}"/>"#));
            continue;
        }
        xml.push_str(&format!(r#"<row r="{row}">"#));
        for cell in cells {
            xml.push_str(&generate_cell(cell, shared_strings, formats));
        }
        xml.push_str("</row>");
    }
    xml.push_str("</sheetData></worksheet>");
    xml
}

// ============================================================================
// ODS
// ============================================================================

/// A `table:table-cell` in an ODS fixture.
#[derive(Debug, Clone, PartialEq)]
pub struct OdsCell {
    value_type: Option<String>,
    attrs: Vec<(String, String)>,
    paragraphs: Vec<String>,
    repeat: u32,
}

impl OdsCell {
    pub fn empty() -> Self {
        Self {
            value_type: None,
            attrs: Vec::new(),
            paragraphs: Vec::new(),
            repeat: 1,
        }
    }

    pub fn text(s: &str) -> Self {
        Self {
            value_type: Some("string".to_string()),
            paragraphs: s.split('\n').map(str::to_string).collect(),
            ..Self::empty()
        }
    }

    /// Float cell whose shown text is the plain value.
    pub fn float(n: f64) -> Self {
        Self::float_shown(n, &n.to_string())
    }

    /// Float cell with the text the authoring application displayed.
    pub fn float_shown(n: f64, shown: &str) -> Self {
        Self::typed("float", "value", &n.to_string(), shown)
    }

    pub fn percentage(n: f64, shown: &str) -> Self {
        Self::typed("percentage", "value", &n.to_string(), shown)
    }

    pub fn boolean(b: bool) -> Self {
        Self::typed("boolean", "boolean-value", &b.to_string(), if b { "TRUE" } else { "FALSE" })
    }

    pub fn date(iso: &str, shown: &str) -> Self {
        Self::typed("date", "date-value", iso, shown)
    }

    /// Typed cell with an arbitrary value attribute, for malformed input.
    pub fn typed(value_type: &str, attr: &str, value: &str, shown: &str) -> Self {
        Self {
            value_type: Some(value_type.to_string()),
            attrs: vec![(attr.to_string(), value.to_string())],
            paragraphs: if shown.is_empty() { Vec::new() } else { vec![shown.to_string()] },
            repeat: 1,
        }
    }

    #[must_use]
    pub fn repeated(mut self, times: u32) -> Self {
        self.repeat = times;
        self
    }

    fn to_xml(&self) -> String {
        let mut xml = String::from("<table:table-cell");
        if let Some(ref t) = self.value_type {
            xml.push_str(&format!(r#" office:value-type="{t}""#));
        }
        for (name, value) in &self.attrs {
            xml.push_str(&format!(r#" office:{name}="{}""#, escape(value)));
        }
        if self.repeat > 1 {
            xml.push_str(&format!(r#" table:number-columns-repeated="{}""#, self.repeat));
        }
        if self.paragraphs.is_empty() {
            xml.push_str("/>");
            return xml;
        }
        xml.push('>');
        for p in &self.paragraphs {
            xml.push_str(&format!("<text:p>{}</text:p>", escape(p)));
        }
        xml.push_str("</table:table-cell>");
        xml
    }
}

#[derive(Debug, Clone)]
struct OdsRow {
    cells: Vec<OdsCell>,
    repeat: u32,
}

/// Builder for a single-table ODS package.
#[derive(Debug, Clone)]
pub struct OdsBuilder {
    name: String,
    rows: Vec<OdsRow>,
    extra_tables: Vec<String>,
    omit_table: bool,
}

impl OdsBuilder {
    pub fn new(table_name: &str) -> Self {
        Self {
            name: table_name.to_string(),
            rows: Vec::new(),
            extra_tables: Vec::new(),
            omit_table: false,
        }
    }

    #[must_use]
    pub fn row(mut self, cells: impl IntoIterator<Item = OdsCell>) -> Self {
        self.rows.push(OdsRow {
            cells: cells.into_iter().collect(),
            repeat: 1,
        });
        self
    }

    #[must_use]
    pub fn repeated_row(mut self, times: u32, cells: impl IntoIterator<Item = OdsCell>) -> Self {
        self.rows.push(OdsRow {
            cells: cells.into_iter().collect(),
            repeat: times,
        });
        self
    }

    #[must_use]
    pub fn empty_rows(self, times: u32) -> Self {
        self.repeated_row(times, [OdsCell::empty()])
    }

    /// A second table after the first; never read.
    #[must_use]
    pub fn extra_table(mut self, name: &str) -> Self {
        self.extra_tables.push(name.to_string());
        self
    }

    /// A spreadsheet body with no tables at all.
    #[must_use]
    pub fn without_tables(mut self) -> Self {
        self.omit_table = true;
        self
    }

    fn content_xml(&self) -> String {
        let mut xml = String::new();
        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
        xml.push_str(concat!(
            r#"<office:document-content xmlns:office="urn:oasis:names:tc:opendocument:xmlns:office:1.0""#,
            r#" xmlns:table="urn:oasis:names:tc:opendocument:xmlns:table:1.0""#,
            r#" xmlns:text="urn:oasis:names:tc:opendocument:xmlns:text:1.0" office:version="1.3">"#,
        ));
        xml.push_str("<office:body><office:spreadsheet>");
        if !self.omit_table {
            xml.push_str(&format!(r#"<table:table table:name="{}">"#, escape(&self.name)));
            xml.push_str("<table:table-column/>");
            for row in &self.rows {
                if row.repeat > 1 {
                    xml.push_str(&format!(
                        r#"<table:table-row table:number-rows-repeated="{}">"#,
                        row.repeat
                    ));
                } else {
                    xml.push_str("<table:table-row>");
                }
                for cell in &row.cells {
                    xml.push_str(&cell.to_xml());
                }
                xml.push_str("</table:table-row>");
            }
            xml.push_str("</table:table>");
            for name in &self.extra_tables {
                xml.push_str(&format!(
                    r#"<table:table table:name="{}"><table:table-row><table:table-cell office:value-type="string"><text:p>other</text:p></table:table-cell></table:table-row></table:table>"#,
                    escape(name)
                ));
            }
        }
        xml.push_str("</office:spreadsheet></office:body></office:document-content>");
        xml
    }

    #[must_use]
    pub fn build(self) -> Vec<u8> {
        zip_parts(&[
            ("mimetype", "application/vnd.oasis.opendocument.spreadsheet".to_string()),
            ("content.xml", self.content_xml()),
        ])
    }
}
