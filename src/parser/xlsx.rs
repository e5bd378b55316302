//! Office Open XML spreadsheet reader.
//!
//! Reads the workbook relationships, the sheet list, shared strings and the
//! number-format part of the stylesheet, then streams the first worksheet.

use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashMap;
use std::io::{BufReader, Read, Seek};
use zip::ZipArchive;

use crate::cell_ref::parse_cell_ref;
use crate::error::{Result, XlsnapError};
use crate::numfmt::builtin_format;
use crate::types::{Cell, CellValue, Row, TableDocument, MAX_SHEET_COLUMNS, MAX_SHEET_ROWS};
use crate::xml_helpers::{attr_string, attr_string_local, attr_u32, unescape_attr};

const WORKBOOK_PATH: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PATH: &str = "xl/_rels/workbook.xml.rels";
const DEFAULT_SHARED_STRINGS: &str = "xl/sharedStrings.xml";
const DEFAULT_STYLES: &str = "xl/styles.xml";

/// Paths from `xl/_rels/workbook.xml.rels`, resolved against `xl/`.
#[derive(Debug, Default)]
struct WorkbookRelationships {
    /// rId -> part path, e.g. "rId1" -> "xl/worksheets/sheet1.xml"
    worksheets: HashMap<String, String>,
    shared_strings: Option<String>,
    styles: Option<String>,
}

/// A `<sheet>` entry from `xl/workbook.xml`.
#[derive(Debug)]
struct SheetEntry {
    name: String,
    rel_id: Option<String>,
}

pub(super) fn parse<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<TableDocument> {
    let rels = parse_relationships(archive);
    let sheets = parse_sheet_list(archive)?;
    let first = sheets.into_iter().next().ok_or(XlsnapError::EmptyDocument)?;

    let path = first
        .rel_id
        .as_ref()
        .and_then(|id| rels.worksheets.get(id))
        .cloned()
        .ok_or_else(|| XlsnapError::SheetNotFound(first.name.clone()))?;
    if archive.by_name(&path).is_err() {
        return Err(XlsnapError::SheetNotFound(first.name));
    }

    let shared_strings = parse_shared_strings(
        archive,
        rels.shared_strings.as_deref().unwrap_or(DEFAULT_SHARED_STRINGS),
    )?;
    let formats = parse_cell_formats(archive, rels.styles.as_deref().unwrap_or(DEFAULT_STYLES))?;

    let rows = parse_worksheet(archive, &path, &shared_strings, &formats)?;
    Ok(TableDocument::new(first.name, rows))
}

fn parse_relationships<R: Read + Seek>(archive: &mut ZipArchive<R>) -> WorkbookRelationships {
    let mut rels = WorkbookRelationships::default();

    let Ok(file) = archive.by_name(WORKBOOK_RELS_PATH) else {
        return rels;
    };

    let mut xml = Reader::from_reader(BufReader::new(file));
    xml.trim_text(true);
    let mut buf = Vec::new();

    loop {
        match xml.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e) | Event::Start(ref e))
                if e.local_name().as_ref() == b"Relationship" =>
            {
                let id = attr_string(e, b"Id").unwrap_or_default();
                let target = attr_string(e, b"Target").unwrap_or_default();
                let rel_type = attr_string(e, b"Type").unwrap_or_default();
                if target.is_empty() {
                    buf.clear();
                    continue;
                }

                let full_path = match target.strip_prefix('/') {
                    Some(stripped) => stripped.to_string(),
                    None => format!("xl/{target}"),
                };

                if rel_type.ends_with("/worksheet") && !id.is_empty() {
                    rels.worksheets.insert(id, full_path);
                } else if rel_type.ends_with("/sharedStrings") {
                    rels.shared_strings = Some(full_path);
                } else if rel_type.ends_with("/styles") {
                    rels.styles = Some(full_path);
                }
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    rels
}

fn parse_sheet_list<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<Vec<SheetEntry>> {
    let file = archive.by_name(WORKBOOK_PATH)?;
    let mut xml = Reader::from_reader(BufReader::new(file));
    xml.trim_text(true);

    let mut sheets = Vec::new();
    let mut buf = Vec::new();

    loop {
        match xml.read_event_into(&mut buf)? {
            Event::Empty(ref e) | Event::Start(ref e) if e.local_name().as_ref() == b"sheet" => {
                let name = attr_string(e, b"name")
                    .map(|n| unescape_attr(&n))
                    .unwrap_or_default();
                sheets.push(SheetEntry {
                    name,
                    rel_id: attr_string_local(e, b"id"),
                });
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(sheets)
}

/// Shared string table. Rich-text runs are concatenated; phonetic runs skipped.
fn parse_shared_strings<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    path: &str,
) -> Result<Vec<String>> {
    let Ok(file) = archive.by_name(path) else {
        return Ok(Vec::new());
    };

    let mut xml = Reader::from_reader(BufReader::new(file));
    xml.trim_text(false);

    let mut strings = Vec::new();
    let mut current = String::new();
    let mut in_si = false;
    let mut in_t = false;
    let mut in_phonetic = false;
    let mut buf = Vec::new();

    loop {
        match xml.read_event_into(&mut buf)? {
            Event::Start(ref e) => match e.local_name().as_ref() {
                b"si" => {
                    in_si = true;
                    current.clear();
                }
                b"t" if in_si && !in_phonetic => in_t = true,
                b"rPh" => in_phonetic = true,
                _ => {}
            },
            Event::Empty(ref e) if e.local_name().as_ref() == b"si" => strings.push(String::new()),
            Event::Text(ref t) if in_t => current.push_str(&t.unescape()?),
            Event::CData(ref t) if in_t => {
                current.push_str(&String::from_utf8_lossy(t.as_ref()));
            }
            Event::End(ref e) => match e.local_name().as_ref() {
                b"si" => {
                    strings.push(std::mem::take(&mut current));
                    in_si = false;
                }
                b"t" => in_t = false,
                b"rPh" => in_phonetic = false,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(strings)
}

/// Number format code per `cellXfs` index (`None` for General).
fn parse_cell_formats<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    path: &str,
) -> Result<Vec<Option<String>>> {
    let Ok(file) = archive.by_name(path) else {
        return Ok(Vec::new());
    };

    let mut xml = Reader::from_reader(BufReader::new(file));
    xml.trim_text(true);

    let mut custom: HashMap<u32, String> = HashMap::new();
    let mut xf_format_ids: Vec<u32> = Vec::new();
    let mut in_cell_xfs = false;
    let mut buf = Vec::new();

    loop {
        let event = xml.read_event_into(&mut buf)?;
        let is_start = matches!(event, Event::Start(_));
        match event {
            Event::Start(ref e) | Event::Empty(ref e) => match e.local_name().as_ref() {
                b"numFmt" => {
                    if let (Some(id), Some(code)) =
                        (attr_u32(e, b"numFmtId"), attr_string(e, b"formatCode"))
                    {
                        custom.insert(id, unescape_attr(&code));
                    }
                }
                // A self-closing <cellXfs/> opens no section.
                b"cellXfs" => in_cell_xfs = is_start,
                b"xf" if in_cell_xfs => xf_format_ids.push(attr_u32(e, b"numFmtId").unwrap_or(0)),
                _ => {}
            },
            Event::End(ref e) if e.local_name().as_ref() == b"cellXfs" => in_cell_xfs = false,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(xf_format_ids
        .into_iter()
        .map(|id| {
            custom
                .get(&id)
                .cloned()
                .or_else(|| builtin_format(id).map(str::to_string))
                .filter(|code| !code.eq_ignore_ascii_case("General"))
        })
        .collect())
}

/// Per-cell state while streaming `<c>` elements.
#[derive(Default)]
struct PendingCell {
    column: u32,
    cell_type: String,
    style: Option<u32>,
    value: String,
    has_value: bool,
}

fn parse_worksheet<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    path: &str,
    shared_strings: &[String],
    formats: &[Option<String>],
) -> Result<Vec<Row>> {
    let file = archive.by_name(path)?;
    let mut xml = Reader::from_reader(BufReader::new(file));
    xml.trim_text(false);

    let mut rows: Vec<Row> = Vec::new();
    let mut current_row: Option<Row> = None;
    let mut next_row_index: u32 = 0;
    let mut next_column: u32 = 0;
    let mut cell: Option<PendingCell> = None;
    let mut in_value = false;
    let mut in_inline_text = false;
    let mut buf = Vec::new();

    loop {
        let event = xml.read_event_into(&mut buf)?;
        let is_empty_element = matches!(event, Event::Empty(_));
        match event {
            Event::Start(ref e) | Event::Empty(ref e) => match e.local_name().as_ref() {
                b"row" => {
                    let index = attr_u32(e, b"r")
                        .and_then(|r| r.checked_sub(1))
                        .unwrap_or(next_row_index);
                    next_row_index = index.saturating_add(1);
                    next_column = 0;
                    if index >= MAX_SHEET_ROWS {
                        tracing::warn!(row = index, "row beyond the sheet limit skipped");
                    } else if is_empty_element {
                        push_row(&mut rows, Row::new(index));
                    } else {
                        current_row = Some(Row::new(index));
                    }
                }
                b"c" => {
                    let column = attr_string(e, b"r")
                        .and_then(|r| parse_cell_ref(&r))
                        .map_or(next_column, |(col, _)| col);
                    next_column = column.saturating_add(1);
                    if column >= MAX_SHEET_COLUMNS {
                        tracing::warn!(column, "cell beyond the last sheet column skipped");
                    } else if !is_empty_element {
                        cell = Some(PendingCell {
                            column,
                            cell_type: attr_string(e, b"t").unwrap_or_default(),
                            style: attr_u32(e, b"s"),
                            ..PendingCell::default()
                        });
                    }
                }
                b"v" if cell.is_some() && !is_empty_element => in_value = true,
                b"t" if cell.is_some() && !is_empty_element => in_inline_text = true,
                _ => {}
            },
            Event::Text(ref t) if in_value || in_inline_text => {
                if let Some(pending) = cell.as_mut() {
                    pending.value.push_str(&t.unescape()?);
                    pending.has_value = true;
                }
            }
            Event::End(ref e) => match e.local_name().as_ref() {
                b"v" => {
                    in_value = false;
                    if let Some(pending) = cell.as_mut() {
                        pending.has_value = true;
                    }
                }
                b"t" => {
                    in_inline_text = false;
                    if let Some(pending) = cell.as_mut() {
                        pending.has_value = true;
                    }
                }
                b"c" => {
                    if let (Some(pending), Some(row)) = (cell.take(), current_row.as_mut()) {
                        if let Some(built) = build_cell(pending, shared_strings, formats) {
                            row.insert(built);
                        }
                    }
                }
                b"row" => {
                    if let Some(row) = current_row.take() {
                        push_row(&mut rows, row);
                    }
                }
                b"sheetData" => break,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(rows)
}

/// Append a row, first filling any gap since the previous row with blank
/// rows so positions follow the sheet. Writers omit rows without cells.
fn push_row(rows: &mut Vec<Row>, row: Row) {
    let next = rows.last().map_or(0, |last| last.index.saturating_add(1));
    rows.extend((next..row.index).map(Row::new));
    rows.push(row);
}

fn build_cell(
    pending: PendingCell,
    shared_strings: &[String],
    formats: &[Option<String>],
) -> Option<Cell> {
    if !pending.has_value {
        return None;
    }
    let raw = pending.value;
    let value = match pending.cell_type.as_str() {
        "s" => raw
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|idx| shared_strings.get(idx))
            .map_or_else(|| CellValue::Malformed(raw.clone()), |s| CellValue::Text(s.clone())),
        "inlineStr" | "str" | "d" => CellValue::Text(raw),
        "b" => match raw.trim() {
            "1" | "true" => CellValue::Boolean(true),
            "0" | "false" => CellValue::Boolean(false),
            _ => CellValue::Malformed(raw),
        },
        "e" => CellValue::Error(raw),
        _ => match raw.trim().parse::<f64>() {
            Ok(n) if n.is_finite() => CellValue::Number(n),
            _ => CellValue::Malformed(raw),
        },
    };

    let mut cell = Cell::new(pending.column, value);
    if matches!(cell.value, CellValue::Number(_)) {
        let format = pending
            .style
            .and_then(|s| formats.get(s as usize))
            .and_then(Clone::clone);
        if let Some(code) = format {
            cell = cell.with_format(code);
        }
    }
    Some(cell)
}
