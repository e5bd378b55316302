//! OpenDocument spreadsheet reader.
//!
//! Streams `content.xml` and extracts the first `table:table`. Repeated
//! rows and cells are expanded, except trailing empty repeats that office
//! suites emit to pad a sheet out to its size limit.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::io::{BufReader, Read, Seek};
use zip::ZipArchive;

use crate::error::{Result, XlsnapError};
use crate::types::{
    Cell, CellValue, Row, TableDocument, MAX_SHEET_COLUMNS as MAX_COLUMNS, MAX_SHEET_ROWS as MAX_ROWS,
};
use crate::xml_helpers::{attr_string_local, attr_u32_local, unescape_attr};

const CONTENT_PATH: &str = "content.xml";

/// Attributes of the `table:table-cell` being read.
#[derive(Debug, Default)]
struct PendingCell {
    repeat: u32,
    value_type: Option<String>,
    value: Option<String>,
    boolean_value: Option<String>,
    date_value: Option<String>,
    time_value: Option<String>,
    paragraphs: Vec<String>,
}

impl PendingCell {
    fn from_element(e: &BytesStart) -> Self {
        Self {
            repeat: attr_u32_local(e, b"number-columns-repeated").unwrap_or(1).max(1),
            value_type: attr_string_local(e, b"value-type"),
            value: attr_string_local(e, b"value"),
            boolean_value: attr_string_local(e, b"boolean-value"),
            date_value: attr_string_local(e, b"date-value").map(|v| unescape_attr(&v)),
            time_value: attr_string_local(e, b"time-value"),
            paragraphs: Vec::new(),
        }
    }

    fn text(&self) -> Option<String> {
        if self.paragraphs.is_empty() {
            None
        } else {
            Some(self.paragraphs.join("\n"))
        }
    }

    /// Convert to a cell value; the document's own `text:p` rendering is
    /// kept as display text for typed values.
    fn into_value(self) -> (CellValue, Option<String>) {
        let text = self.text();
        match self.value_type.as_deref() {
            Some("float" | "percentage" | "currency") => {
                let raw = self.value.unwrap_or_default();
                match raw.trim().parse::<f64>() {
                    Ok(n) if n.is_finite() => (CellValue::Number(n), text),
                    _ => (CellValue::Malformed(text.unwrap_or(raw)), None),
                }
            }
            Some("boolean") => match self.boolean_value.as_deref().map(str::trim) {
                Some("true") => (CellValue::Boolean(true), text),
                Some("false") => (CellValue::Boolean(false), text),
                other => (
                    CellValue::Malformed(text.or(other.map(str::to_string)).unwrap_or_default()),
                    None,
                ),
            },
            Some("date") => (
                CellValue::Text(text.or(self.date_value).unwrap_or_default()),
                None,
            ),
            Some("time") => (
                CellValue::Text(text.or(self.time_value).unwrap_or_default()),
                None,
            ),
            _ => match text {
                Some(t) if !t.is_empty() => (CellValue::Text(t), None),
                _ => (CellValue::Empty, None),
            },
        }
    }
}

/// Accumulates rows of the first table, expanding repeats.
#[derive(Debug, Default)]
struct TableBuilder {
    rows: Vec<Row>,
    next_row: u32,
    /// Empty rows seen since the last populated row; only materialised
    /// once another populated row follows.
    pending_empty_rows: u32,
    current: Option<Row>,
    current_repeat: u32,
    next_column: u32,
}

impl TableBuilder {
    fn start_row(&mut self, repeat: u32) {
        self.current = Some(Row::new(self.next_row));
        self.current_repeat = repeat.max(1);
        self.next_column = 0;
    }

    fn push_cell(&mut self, pending: PendingCell) {
        let repeat = pending.repeat;
        let (value, display) = pending.into_value();
        if let (false, Some(row)) = (value.is_empty(), self.current.as_mut()) {
            let end = self.next_column.saturating_add(repeat).min(MAX_COLUMNS);
            for column in self.next_column..end {
                let mut cell = Cell::new(column, value.clone());
                if let Some(ref d) = display {
                    cell = cell.with_display(d.clone());
                }
                row.insert(cell);
            }
        }
        self.next_column = self.next_column.saturating_add(repeat);
    }

    fn end_row(&mut self) {
        let Some(row) = self.current.take() else {
            return;
        };
        let repeat = self.current_repeat;
        if row.is_blank() {
            self.pending_empty_rows = self.pending_empty_rows.saturating_add(repeat);
            self.next_row = self.next_row.saturating_add(repeat);
            return;
        }

        let first_index = self.next_row;
        let gap_start = first_index.saturating_sub(self.pending_empty_rows);
        for index in gap_start..first_index.min(MAX_ROWS) {
            self.rows.push(Row::new(index));
        }
        self.pending_empty_rows = 0;

        let end = first_index.saturating_add(repeat).min(MAX_ROWS);
        for index in first_index..end {
            self.rows.push(Row::from_cells(index, row.cells().iter().cloned()));
        }
        self.next_row = first_index.saturating_add(repeat);
    }
}

pub(super) fn parse<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<TableDocument> {
    let file = archive.by_name(CONTENT_PATH)?;
    let mut xml = Reader::from_reader(BufReader::new(file));
    xml.trim_text(false);

    let mut sheet_name: Option<String> = None;
    let mut table = TableBuilder::default();
    let mut table_depth: u32 = 0;
    let mut cell: Option<PendingCell> = None;
    let mut paragraph: Option<String> = None;
    let mut buf = Vec::new();

    loop {
        let event = xml.read_event_into(&mut buf)?;
        let is_empty_element = matches!(event, Event::Empty(_));
        match event {
            Event::Start(ref e) | Event::Empty(ref e) => match e.local_name().as_ref() {
                b"table" if sheet_name.is_none() => {
                    let name = attr_string_local(e, b"name").map(|n| unescape_attr(&n));
                    sheet_name = Some(name.unwrap_or_default());
                    if is_empty_element {
                        break;
                    }
                    table_depth = 1;
                }
                // Nested tables inside cells are not part of the grid.
                b"table" if table_depth > 0 && !is_empty_element => table_depth += 1,
                b"table-row" if table_depth == 1 => {
                    table.start_row(attr_u32_local(e, b"number-rows-repeated").unwrap_or(1));
                    if is_empty_element {
                        table.end_row();
                    }
                }
                b"table-cell" | b"covered-table-cell" if table_depth == 1 => {
                    let pending = PendingCell::from_element(e);
                    if is_empty_element {
                        table.push_cell(pending);
                    } else {
                        cell = Some(pending);
                    }
                }
                b"p" if cell.is_some() && table_depth == 1 => {
                    if is_empty_element {
                        if let Some(c) = cell.as_mut() {
                            c.paragraphs.push(String::new());
                        }
                    } else {
                        paragraph = Some(String::new());
                    }
                }
                b"s" if paragraph.is_some() => {
                    let count = attr_u32_local(e, b"c").unwrap_or(1).min(1024) as usize;
                    if let Some(p) = paragraph.as_mut() {
                        p.push_str(&" ".repeat(count));
                    }
                }
                b"tab" if paragraph.is_some() => {
                    if let Some(p) = paragraph.as_mut() {
                        p.push('\t');
                    }
                }
                b"line-break" if paragraph.is_some() => {
                    if let Some(p) = paragraph.as_mut() {
                        p.push('\n');
                    }
                }
                _ => {}
            },
            Event::Text(ref t) => {
                if let Some(p) = paragraph.as_mut() {
                    p.push_str(&t.unescape()?);
                }
            }
            Event::End(ref e) => match e.local_name().as_ref() {
                b"p" if table_depth == 1 => {
                    if let (Some(p), Some(c)) = (paragraph.take(), cell.as_mut()) {
                        c.paragraphs.push(p);
                    }
                }
                b"table-cell" | b"covered-table-cell" if table_depth == 1 => {
                    if let Some(pending) = cell.take() {
                        table.push_cell(pending);
                    }
                }
                b"table-row" if table_depth == 1 => table.end_row(),
                b"table" if table_depth > 0 => {
                    table_depth -= 1;
                    if table_depth == 0 {
                        break;
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    let name = sheet_name.ok_or(XlsnapError::EmptyDocument)?;
    Ok(TableDocument::new(name, table.rows))
}
