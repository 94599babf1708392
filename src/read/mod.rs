use std::{collections::{HashMap, HashSet}, fs, io::{BufReader, Cursor, Read}, path::Path};
use anyhow::{anyhow, Context, Result};
use zip::ZipArchive;
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use quick_xml::{events::{BytesStart, Event}, reader::Reader};
use lazy_static::lazy_static;
use tracing::debug;

use crate::{book::{Sheet, Workbook}, error::Error, get_tuple_from_ord, CellValue, ColNum, RowNum, MAX_COL_NUM, MAX_ROW_NUM};

// ooxml： http://www.officeopenxml.com/

macro_rules! get_attr_val {
    ($e:expr, $tag:expr) => {
        match $e.try_get_attribute($tag)? {
            Some(v) => {v.unescape_value()?},
            None => return Err(anyhow!("attribute {} not exist", $tag))
        }
    };
    ($e:expr, $tag:expr, parse) => {
        match $e.try_get_attribute($tag)? {
            Some(v) => {v.unescape_value()?.parse()?},
            None => return Err(anyhow!("attribute {} not exist", $tag))
        }
    };
    ($e:expr, $tag:expr, to_string) => {
        match $e.try_get_attribute($tag)? {
            Some(v) => {v.unescape_value()?.to_string()},
            None => return Err(anyhow!("attribute {} not exist", $tag))
        }
    };
}

/// Decode an xlsx/xlsm file held in memory. Every sheet is read, hidden ones included, in workbook order.
pub fn decode(bytes: &[u8]) -> crate::Result<Workbook> {
    XlsxBook::new(bytes)
        .and_then(XlsxBook::into_workbook)
        .map_err(Error::Decode)
}

/// Decode and remember the source file name, which the merge classifier looks at.
pub fn decode_named<S: Into<String>>(name: S, bytes: &[u8]) -> crate::Result<Workbook> {
    Ok(decode(bytes)?.named(name))
}

/// Read and decode a file from disk, named after its file name.
pub fn decode_file<P: AsRef<Path>>(path: P) -> crate::Result<Workbook> {
    let path = path.as_ref();
    let bytes = fs::read(path)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    decode_named(name, &bytes)
}

/// resolve a relationship target of workbook.xml to a part name inside the package
fn part_path(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(abs) => abs.to_owned(),
        None => format!("xl/{}", target),
    }
}

/// which date/time family a custom number format belongs to, if any
fn classify_num_fmt(code: &str) -> Option<u8> {
    // literals, escapes, padding and [..] sections (colors, locales, elapsed markers) do not count
    let mut plain = String::with_capacity(code.len());
    let (mut in_quote, mut in_bracket) = (false, false);
    let mut chars = code.chars();
    while let Some(c) = chars.next() {
        match c {
            '"' => in_quote = !in_quote,
            _ if in_quote => {},
            '\\' | '_' | '*' => {chars.next();},
            '[' => in_bracket = true,
            ']' => in_bracket = false,
            _ if in_bracket => {},
            c => plain.push(c.to_ascii_lowercase()),
        }
    }
    let has_date = plain.contains('y') || plain.contains('d');
    let has_time = plain.contains('h') || plain.contains("ss");
    match (has_date, has_time) {
        (true, true) => Some(FMT_DATETIME),
        (true, false) => Some(FMT_DATE),
        (false, true) => Some(FMT_TIME),
        _ => None,
    }
}

/// xlsx book reader over an in-memory package
pub struct XlsxBook<'a> {
    str_share: Vec<String>,
    sheets: Vec<(String, String)>,
    map_style: HashMap<u32, u32>,
    datetime_fmts: HashMap<u32, u8>,
    zip_archive: ZipArchive<Cursor<&'a [u8]>>,
}

impl<'a> XlsxBook<'a> {
    /// open the package and load relationships, sheet list, styles and shared strings
    pub fn new(bytes: &'a [u8]) -> Result<XlsxBook<'a>> {
        let mut zip_archive = ZipArchive::new(Cursor::new(bytes))
            .context("not an xlsx/xlsm (zip) container")?;

        let book_refs = {
            let file = zip_archive.by_name("xl/_rels/workbook.xml.rels")
                .context("xl/_rels/workbook.xml.rels not found")?;

            let mut buf = Vec::new();
            let mut refs = HashMap::new();
            let mut reader = Reader::from_reader(BufReader::new(file));
            loop {
                match reader.read_event_into(&mut buf) {
                    Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) => {
                        if e.local_name().as_ref() == b"Relationship" {
                            refs.insert(get_attr_val!(e, "Id", to_string), get_attr_val!(e, "Target", to_string));
                        };
                    },
                    Ok(Event::Eof) => break,
                    Err(e) => return Err(anyhow!("workbook.xml.rels broken: {:?}", e)),
                    _ => ()
                }
                buf.clear();
            };
            refs
        };

        // sheet list, document order
        let sheets = {
            let file = zip_archive.by_name("xl/workbook.xml")
                .context("xl/workbook.xml not found")?;
            let mut reader = Reader::from_reader(BufReader::new(file));

            let mut buf = Vec::new();
            let mut sheets: Vec<(String, String)> = Vec::new();
            loop {
                match reader.read_event_into(&mut buf) {
                    Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) => {
                        if e.local_name().as_ref() == b"sheet" {
                            let name = get_attr_val!(e, "name", to_string);
                            let rid = get_attr_val!(e, "r:id", to_string);
                            let part = match book_refs.get(&rid) {
                                Some(target) => part_path(target),
                                None => return Err(anyhow!("Relationship of sheet-{rid} not found")),
                            };
                            sheets.push((name, part));
                        };
                    },
                    Ok(Event::Eof) => break,
                    Err(e) => return Err(anyhow!("workbook.xml is broken: {:?}", e)),
                    _ => ()
                }
                buf.clear();
            };
            sheets
        };

        // cell style index -> number format id, plus custom date formats
        let mut datetime_fmts = DATETIME_FMTS.clone();
        let map_style = {
            match zip_archive.by_name("xl/styles.xml") {
                Ok(file) => {
                    let mut reader = Reader::from_reader(BufReader::new(file));

                    let mut inx: u32 = 0;
                    let mut act = false;
                    let mut buf = Vec::new();
                    let mut map_style: HashMap<u32, u32> = HashMap::new();
                    loop {
                        match reader.read_event_into(&mut buf) {
                            Ok(Event::Start(ref e)) if matches!(e.local_name().as_ref(), b"cellXfs" | b"numFmts") => {
                                act = true;
                            },
                            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                                let name = e.local_name();
                                if act && name.as_ref() == b"numFmt" {
                                    let code = get_attr_val!(e, "formatCode", to_string);
                                    if let Some(kind) = classify_num_fmt(&code) {
                                        datetime_fmts.insert(get_attr_val!(e, "numFmtId", parse), kind);
                                    }
                                } else if act && name.as_ref() == b"xf" {
                                    let fmt_id = match e.try_get_attribute("numFmtId")? {
                                        Some(v) => v.unescape_value()?.parse()?,
                                        None => 0,
                                    };
                                    map_style.insert(inx, fmt_id);
                                    inx += 1;
                                };
                            },
                            Ok(Event::End(ref e)) => {
                                if e.local_name().as_ref() == b"numFmts" {
                                    act = false;
                                } else if e.local_name().as_ref() == b"cellXfs" {
                                    break;
                                };
                            },
                            Ok(Event::Eof) => break,
                            Err(e) => return Err(anyhow!("styles.xml is broken: {:?}", e)),
                            _ => ()
                        }
                        buf.clear();
                    };
                    map_style
                },
                Err(_) => {
                    HashMap::new()
                }
            }
        };

        let mut book = XlsxBook {
            str_share: Vec::new(),
            sheets,
            map_style,
            datetime_fmts,
            zip_archive,
        };
        book.load_share_strings()?;
        Ok(book)
    }
    fn load_share_strings(&mut self) -> Result<()> {
        let file = match self.zip_archive.by_name("xl/sharedStrings.xml") {
            Ok(file) => file,
            Err(_) => return Ok(()),
        };
        let mut reader = Reader::from_reader(BufReader::new(file));

        let mut buf = Vec::with_capacity(3069);
        let (mut insert, mut phonetic) = (false, false);
        let mut shstring = String::new();
        let mut vec_share: Vec<String> = Vec::new();
        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) => {
                    match e.local_name().as_ref() {
                        b"sst" => {
                            if let Some(cnt) = e.try_get_attribute("uniqueCount")? {
                                vec_share.reserve(cnt.unescape_value()?.parse().unwrap_or(0));
                            }
                        },
                        b"si" => shstring.clear(),
                        b"t" => insert = !phonetic,
                        b"rPh" => phonetic = true,
                        _ => {},
                    }
                },
                Ok(Event::Empty(ref e)) => {
                    if e.local_name().as_ref() == b"si" {
                        vec_share.push(String::new());
                    }
                },
                Ok(Event::Text(ref t)) => {
                    if insert {
                        shstring += &t.unescape()?;
                    }
                },
                Ok(Event::End(ref e)) => {
                    match e.local_name().as_ref() {
                        b"t" => insert = false,
                        b"rPh" => phonetic = false,
                        b"si" => vec_share.push(std::mem::take(&mut shstring)),
                        _ => {},
                    }
                },
                Ok(Event::Eof) => break,
                Err(e) => return Err(anyhow!("sharedStrings.xml is broken: {:?}", e)),
                _ => ()
            }
            buf.clear();
        };
        debug!(count = vec_share.len(), "shared strings loaded");
        self.str_share = vec_share;
        Ok(())
    }
    /// read all rows of one sheet part
    fn read_sheet_rows(&mut self, part: &str) -> Result<Vec<Vec<CellValue>>> {
        let mut xml = Vec::new();
        self.zip_archive.by_name(part)
            .map_err(|e| anyhow!("sheet part {} lost: {}", part, e))?
            .read_to_end(&mut xml)?;
        let mut reader = Reader::from_reader(xml.as_slice());

        let mut buf = Vec::with_capacity(8 * 1024);
        let mut rows: Vec<Vec<CellValue>> = Vec::new();
        let mut in_data = false;
        let mut next_row: RowNum = 1;
        let mut next_col: ColNum = 1;
        let mut cell: Option<PendingCell> = None;
        let mut text = String::new();
        let (mut in_text, mut phonetic) = (false, false);
        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) => {
                    match e.local_name().as_ref() {
                        b"sheetData" => in_data = true,
                        b"row" if in_data => {
                            next_row = row_number(e, next_row)?;
                            next_col = 1;
                        },
                        b"c" if in_data => {
                            let pending = self.start_cell(e, next_row, next_col)?;
                            (next_row, next_col) = (pending.row, pending.col.saturating_add(1));
                            cell = Some(pending);
                            text.clear();
                        },
                        b"v" | b"t" if cell.is_some() && !phonetic => {
                            in_text = true;
                            if let Some(c) = cell.as_mut() {
                                c.has_value = true;
                            }
                        },
                        b"rPh" => phonetic = true,
                        _ => {},
                    }
                },
                Ok(Event::Empty(ref e)) => {
                    match e.local_name().as_ref() {
                        b"sheetData" => break,
                        b"row" if in_data => {
                            next_row = row_number(e, next_row)?.saturating_add(1);
                            next_col = 1;
                        },
                        b"c" if in_data => {
                            let pending = self.start_cell(e, next_row, next_col)?;
                            (next_row, next_col) = (pending.row, pending.col.saturating_add(1));
                        },
                        _ => {},
                    }
                },
                Ok(Event::Text(ref t)) => {
                    if in_text {
                        text += &t.unescape()?;
                    }
                },
                Ok(Event::End(ref e)) => {
                    match e.local_name().as_ref() {
                        b"v" | b"t" => in_text = false,
                        b"rPh" => phonetic = false,
                        b"c" => {
                            if let Some(pending) = cell.take() {
                                let value = self.cell_value(&pending, &text)?;
                                if !value.is_blank() {
                                    place_cell(&mut rows, pending.row, pending.col, value);
                                }
                            }
                        },
                        b"row" if in_data => {
                            next_row = next_row.saturating_add(1);
                            next_col = 1;
                        },
                        b"sheetData" => break,
                        _ => {},
                    }
                },
                Ok(Event::Eof) => break,
                Err(e) => return Err(anyhow!("sheet data is broken: {:?}", e)),
                _ => ()
            }
            buf.clear();
        }
        Ok(rows)
    }
    fn start_cell(&self, e: &BytesStart<'_>, row: RowNum, col: ColNum) -> Result<PendingCell> {
        let (row, col) = match e.try_get_attribute("r")? {
            Some(addr) => get_tuple_from_ord(addr.unescape_value()?.as_bytes())?,
            None => (row, col),
        };
        if row == 0 || row > MAX_ROW_NUM {
            return Err(anyhow!("row {} outside the worksheet", row));
        }
        if col == 0 || col > MAX_COL_NUM {
            return Err(anyhow!("column {} outside the worksheet", col));
        }
        let kind = match e.try_get_attribute("t")? {
            Some(attr) => attr.unescape_value()?.as_bytes().to_owned(),
            None => b"n".to_vec(),
        };
        let num_fmt_id = match e.try_get_attribute("s")? {
            Some(attr) => self.map_style.get(&attr.unescape_value()?.parse::<u32>()?).copied().unwrap_or(0),
            None => 0,
        };
        Ok(PendingCell { row, col, kind, num_fmt_id, has_value: false })
    }
    // b for boolean
    // d for date
    // e for error
    // inlineStr for an inline string (i.e., not stored in the shared strings part, but directly in the cell)
    // n for number
    // s for shared string (so stored in the shared strings part and not in the cell)
    // str for a formula (a string representing the formula)
    fn cell_value(&self, cell: &PendingCell, text: &str) -> Result<CellValue> {
        if !cell.has_value {
            return Ok(CellValue::Blank);
        }
        let val = match cell.kind.as_slice() {
            b"s" => {
                let inx: usize = text.trim().parse()?;
                match self.str_share.get(inx) {
                    Some(s) => CellValue::String(s.clone()),
                    None => return Err(anyhow!("shared string {} out of range", inx)),
                }
            },
            b"inlineStr" | b"str" | b"d" => CellValue::String(text.to_owned()),
            b"b" => CellValue::Bool(text.trim() == "1"),
            b"e" => CellValue::Error(text.to_owned()),
            b"n" => {
                if text.trim().is_empty() {
                    return Ok(CellValue::Blank);
                }
                let n = text.trim().parse::<f64>()
                    .with_context(|| format!("invalid number {:?}", text))?;
                match self.datetime_fmts.get(&cell.num_fmt_id).copied().unwrap_or(FMT_DEFAULT) {
                    FMT_DATE => CellValue::Date(n),
                    FMT_DATETIME => CellValue::Datetime(n),
                    FMT_TIME => CellValue::Time(n),
                    _ => CellValue::Number(n),
                }
            },
            _ => CellValue::Blank,
        };
        Ok(val)
    }
    /// read every sheet into the in-memory model
    pub fn into_workbook(mut self) -> Result<Workbook> {
        let mut book = Workbook::default();
        for (name, part) in std::mem::take(&mut self.sheets) {
            let rows = self.read_sheet_rows(&part)
                .with_context(|| format!("sheet {}", name))?;
            debug!(sheet = %name, rows = rows.len(), "sheet decoded");
            book.push_sheet(Sheet::with_rows(name, rows));
        }
        Ok(book)
    }
}

struct PendingCell {
    row: RowNum,
    col: ColNum,
    kind: Vec<u8>,
    num_fmt_id: u32,
    has_value: bool,
}

fn row_number(e: &BytesStart<'_>, fallback: RowNum) -> Result<RowNum> {
    let row = match e.try_get_attribute("r")? {
        Some(attr) => attr.unescape_value()?.parse()?,
        None => fallback,
    };
    if row == 0 {
        return Err(anyhow!("row numbers start from 1"));
    }
    Ok(row)
}

/// put a value at 1-based (row, col), filling gaps with blanks
fn place_cell(rows: &mut Vec<Vec<CellValue>>, row: RowNum, col: ColNum, value: CellValue) {
    let (r, c) = (row as usize - 1, col as usize - 1);
    if rows.len() <= r {
        rows.resize_with(r + 1, Vec::new);
    }
    let cells = &mut rows[r];
    if cells.len() <= c {
        cells.resize(c + 1, CellValue::Blank);
    }
    cells[c] = value;
}

/// get another type of data from cell value
pub trait FromCellValue {
    fn try_from_cval(val: &CellValue) -> Result<Option<Self>>
        where Self: Sized;
}

fn serial_to_datetime(n: f64) -> Result<NaiveDateTime> {
    let days = Duration::try_days(n.trunc() as i64).ok_or(anyhow!("invalid date"))?;
    let secs = Duration::try_seconds(((n - n.trunc()) * 86400.0).round() as i64).ok_or(anyhow!("invalid date"))?;
    BASE_DATETIME.checked_add_signed(days + secs).ok_or(anyhow!("invalid date-{}", n))
}

impl FromCellValue for String {
    fn try_from_cval(val: &CellValue) -> Result<Option<Self>> {
        match val {
            CellValue::Number(n) => Ok(Some(n.to_string())),
            CellValue::Date(n) => Ok(Some(serial_to_datetime(*n)?.date().to_string())),
            CellValue::Time(n) => Ok(Some(serial_to_datetime(*n)?.time().format("%H:%M:%S").to_string())),
            CellValue::Datetime(n) => Ok(Some(serial_to_datetime(*n)?.to_string())),
            CellValue::String(s) => Ok(Some(s.to_owned())),
            CellValue::Error(s) => Ok(Some(s.to_owned())),
            CellValue::Bool(b) => Ok(Some(b.to_string())),
            CellValue::Blank => Ok(Some("".to_string())),
        }
    }
}

impl FromCellValue for f64 {
    fn try_from_cval(val: &CellValue) -> Result<Option<Self>> {
        match val {
            CellValue::Number(n) | CellValue::Date(n) | CellValue::Time(n) | CellValue::Datetime(n) => Ok(Some(*n)),
            CellValue::String(s) => {
                match s.trim().parse::<f64>() {
                    Ok(n) => Ok(Some(n)),
                    Err(_) => {
                        if NULL_STRING.contains(s.trim()) {
                            Ok(None)
                        } else if let Ok(n) = s.trim().replace(',', "").parse::<f64>() {
                            Ok(Some(n))
                        } else {
                            Err(anyhow!("invalid value-{:?}", val))
                        }
                    }
                }
            },
            CellValue::Error(_) => Err(anyhow!("invalid value-{:?}", val)),
            CellValue::Bool(b) => Ok(Some(if *b {1.0} else {0.0})),
            CellValue::Blank => Ok(None),
        }
    }
}

impl FromCellValue for i64 {
    fn try_from_cval(val: &CellValue) -> Result<Option<Self>> {
        match val {
            CellValue::String(s) if s.trim().parse::<i64>().is_ok() => Ok(s.trim().parse().ok()),
            _ => Ok(f64::try_from_cval(val)?.map(|n| n as i64)),
        }
    }
}

impl FromCellValue for bool {
    fn try_from_cval(val: &CellValue) -> Result<Option<Self>> {
        match val {
            CellValue::Number(n) | CellValue::Date(n) | CellValue::Time(n) | CellValue::Datetime(n) => Ok(Some(n.abs() > 0.009)),
            CellValue::String(s) => {
                match s.trim().parse::<bool>() {
                    Ok(b) => Ok(Some(b)),
                    Err(_) if NULL_STRING.contains(s.trim()) => Ok(None),
                    Err(_) => Err(anyhow!("invalid value-{:?}", val)),
                }
            },
            CellValue::Error(_) => Err(anyhow!("invalid value-{:?}", val)),
            CellValue::Bool(b) => Ok(Some(*b)),
            CellValue::Blank => Ok(None),
        }
    }
}

impl FromCellValue for NaiveDateTime {
    fn try_from_cval(val: &CellValue) -> Result<Option<Self>> {
        match val {
            CellValue::Number(n) | CellValue::Date(n) | CellValue::Time(n) | CellValue::Datetime(n) => Ok(Some(serial_to_datetime(*n)?)),
            CellValue::String(s) => {
                let s = s.trim();
                for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y/%m/%d %H:%M:%S"] {
                    if let Ok(v) = NaiveDateTime::parse_from_str(s, fmt) {
                        return Ok(Some(v));
                    }
                }
                match NaiveDate::try_from_cval(val)? {
                    Some(d) => Ok(d.and_hms_opt(0, 0, 0)),
                    None => Ok(None),
                }
            },
            CellValue::Error(_) | CellValue::Bool(_) => Err(anyhow!("invalid datetime-{:?}", val)),
            CellValue::Blank => Ok(None),
        }
    }
}

impl FromCellValue for NaiveDate {
    fn try_from_cval(val: &CellValue) -> Result<Option<Self>> {
        match val {
            CellValue::String(s) => {
                let s = s.trim();
                match NaiveDate::parse_from_str(s, "%Y-%m-%d").or_else(|_| NaiveDate::parse_from_str(s, "%Y/%m/%d")) {
                    Ok(v) => Ok(Some(v)),
                    Err(_) if NULL_STRING.contains(s) => Ok(None),
                    Err(_) => Err(anyhow!("invalid date-{:?}", val)),
                }
            },
            _ => Ok(NaiveDateTime::try_from_cval(val)?.map(|v| v.date())),
        }
    }
}

impl FromCellValue for NaiveTime {
    fn try_from_cval(val: &CellValue) -> Result<Option<Self>> {
        match val {
            CellValue::String(s) => {
                let s = s.trim();
                match NaiveTime::parse_from_str(s, "%H:%M:%S") {
                    Ok(v) => Ok(Some(v)),
                    Err(_) if NULL_STRING.contains(s) => Ok(None),
                    Err(_) => Err(anyhow!("invalid time-{:?}", val)),
                }
            },
            _ => Ok(NaiveDateTime::try_from_cval(val)?.map(|v| v.time())),
        }
    }
}

/// make another type of data into cell value
pub trait IntoCellValue {
    fn try_into_cval(self) -> Result<CellValue>;
}

impl IntoCellValue for NaiveDate {
    fn try_into_cval(self) -> Result<CellValue> {
        Ok(CellValue::Date((self.signed_duration_since(*BASE_DATE).num_days()) as f64))
    }
}

impl IntoCellValue for NaiveDateTime {
    fn try_into_cval(self) -> Result<CellValue> {
        let (dt, tm) = (self.date(), self.time());
        Ok(CellValue::Datetime(((dt.signed_duration_since(*BASE_DATE).num_days()) as f64) + ((tm.num_seconds_from_midnight() as f64) / 86400.0)))
    }
}

impl IntoCellValue for NaiveTime {
    fn try_into_cval(self) -> Result<CellValue> {
        Ok(CellValue::Time((self.num_seconds_from_midnight() as f64) / 86400.0))
    }
}

// datetime sign
const FMT_DATE: u8 = 0;
const FMT_TIME: u8 = 1;
const FMT_DATETIME: u8 = 2;
const FMT_DEFAULT: u8 = 255;

lazy_static! {
    static ref BASE_DATE: NaiveDate = NaiveDate::from_ymd_opt(1899, 12, 30).unwrap_or_default();
    static ref BASE_DATETIME: NaiveDateTime = BASE_DATE.and_hms_opt(0, 0, 0).unwrap_or_default();
    static ref NULL_STRING: HashSet<&'static str> = ["", "-", "--", "#N/A"].into_iter().collect();
    static ref DATETIME_FMTS: HashMap<u32, u8> = {
        let mut v = HashMap::new();
        v.extend((14..18).map(|n| (n, FMT_DATE)));
        v.extend((27..32).map(|n| (n, FMT_DATE)));
        v.extend((34..37).map(|n| (n, FMT_DATE)));
        v.extend((50..59).map(|n| (n, FMT_DATE)));
        v.extend((18..22).map(|n| (n, FMT_TIME)));
        v.extend((32..34).map(|n| (n, FMT_TIME)));
        v.extend((45..48).map(|n| (n, FMT_TIME)));
        v.insert(22, FMT_DATETIME);
        v
    };
}
