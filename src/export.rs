//! Spreadsheet export of the grade table.
//!
//! The workbook mirrors the Grades tab: a metadata block with the editable
//! category weights, a two-row header, the "Highest Possible Score" row and
//! one row per student. Percentage, weighted and quarterly cells are live
//! formulas with the computed value cached next to them, so the file opens
//! with the same numbers the app showed and recalculates when a teacher edits
//! a score or a weight.
//!
//! The package is assembled in memory and only then written to disk.
use crate::gradebook::{GradeRow, GradeTable};
use chrono::NaiveDate;
use log::{error, info};
use std::collections::BTreeMap;
use std::error::Error;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

const SHEET_NAME: &str = "Grades";

const TITLE_ROW: usize = 1;
const CLASS_ROW: usize = 2;
const CODE_ROW: usize = 3;
const DATE_ROW: usize = 4;
const ATTENDANCE_WEIGHT_ROW: usize = 5;
const ACTIVITY_WEIGHT_ROW: usize = 6;
const MIDTERM_WEIGHT_ROW: usize = 7;
const FINAL_WEIGHT_ROW: usize = 8;
const GROUP_HEADER_ROW: usize = 10;
const SUB_HEADER_ROW: usize = 11;
const HPS_ROW: usize = 12;
const FIRST_STUDENT_ROW: usize = 13;

/// Column holding the weight values of the metadata block.
const WEIGHT_COL: usize = 1;

const COL_NUMBER: usize = 0;
const COL_NAME: usize = 1;
const COL_PRESENT: usize = 2;
const COL_EXCUSED: usize = 3;
const COL_LATE: usize = 4;
const COL_ABSENT: usize = 5;
const COL_ATTENDANCE_RS: usize = 6;
const COL_ATTENDANCE_PS: usize = 7;
const COL_ATTENDANCE_WS: usize = 8;
const FIRST_TASK_COL: usize = 9;

/// Number of references per `SUM(...)` call; longer lists are chained with `+`.
const SUM_CHUNK: usize = 100;

const STYLE_DEFAULT: u8 = 0;
const STYLE_BOLD: u8 = 1;
const STYLE_DECIMAL: u8 = 2;

/// Spreadsheet column letters for a 0-based index (0 -> A, 25 -> Z, 26 -> AA).
pub fn column_letter(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// A1-style reference; `row` is 1-based.
pub fn cell_ref(col: usize, row: usize) -> String {
    format!("{}{}", column_letter(col), row)
}

/// Reference with the row pinned (`G$12`).
fn row_locked(col: usize, row: usize) -> String {
    format!("{}${}", column_letter(col), row)
}

/// Fully pinned reference (`$B$5`).
fn absolute(col: usize, row: usize) -> String {
    format!("${}${}", column_letter(col), row)
}

/// Column positions of the grade sheet for a given number of activity tasks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SheetLayout {
    pub task_count: usize,
}

impl SheetLayout {
    pub fn task_raw(&self, index: usize) -> usize {
        FIRST_TASK_COL + 2 * index
    }

    pub fn task_percent(&self, index: usize) -> usize {
        FIRST_TASK_COL + 2 * index + 1
    }

    pub fn activity_rs(&self) -> usize {
        FIRST_TASK_COL + 2 * self.task_count
    }

    pub fn activity_ps(&self) -> usize {
        self.activity_rs() + 1
    }

    pub fn activity_ws(&self) -> usize {
        self.activity_rs() + 2
    }

    pub fn midterm_rs(&self) -> usize {
        self.activity_rs() + 3
    }

    pub fn midterm_ps(&self) -> usize {
        self.activity_rs() + 4
    }

    pub fn midterm_ws(&self) -> usize {
        self.activity_rs() + 5
    }

    pub fn final_rs(&self) -> usize {
        self.activity_rs() + 6
    }

    pub fn final_ps(&self) -> usize {
        self.activity_rs() + 7
    }

    pub fn final_ws(&self) -> usize {
        self.activity_rs() + 8
    }

    pub fn quarterly(&self) -> usize {
        self.activity_rs() + 9
    }

    pub fn rounded(&self) -> usize {
        self.activity_rs() + 10
    }

    pub fn last_col(&self) -> usize {
        self.rounded()
    }
}

#[derive(Debug, Clone, PartialEq)]
enum CellValue {
    Text(String),
    Number(f64),
    Formula { formula: String, cached: f64 },
}

#[derive(Debug, Clone, PartialEq)]
struct Cell {
    value: CellValue,
    style: u8,
}

/// In-memory worksheet: sparse rows of cells plus merged ranges.
#[derive(Debug, Default)]
struct Sheet {
    rows: BTreeMap<usize, BTreeMap<usize, Cell>>,
    merges: Vec<String>,
}

impl Sheet {
    fn put(&mut self, col: usize, row: usize, value: CellValue, style: u8) {
        self.rows
            .entry(row)
            .or_default()
            .insert(col, Cell { value, style });
    }

    fn text(&mut self, col: usize, row: usize, text: &str, style: u8) {
        self.put(col, row, CellValue::Text(text.to_string()), style);
    }

    fn number(&mut self, col: usize, row: usize, value: f64, style: u8) {
        self.put(col, row, CellValue::Number(value), style);
    }

    fn formula(&mut self, col: usize, row: usize, formula: String, cached: f64) {
        self.put(col, row, CellValue::Formula { formula, cached }, STYLE_DECIMAL);
    }

    fn merge(&mut self, from_col: usize, from_row: usize, to_col: usize, to_row: usize) {
        if from_col != to_col || from_row != to_row {
            self.merges
                .push(format!("{}:{}", cell_ref(from_col, from_row), cell_ref(to_col, to_row)));
        }
    }

    fn to_xml(&self, last_col: usize) -> String {
        let mut xml = String::from(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n\
             <worksheet xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\" \
             xmlns:r=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships\">",
        );
        let last_row = self.rows.keys().next_back().copied().unwrap_or(1);
        xml.push_str(&format!(
            "<dimension ref=\"A1:{}\"/>",
            cell_ref(last_col, last_row)
        ));
        xml.push_str(&format!(
            "<sheetViews><sheetView workbookViewId=\"0\"><pane xSplit=\"{}\" ySplit=\"{}\" \
             topLeftCell=\"{}\" activePane=\"bottomRight\" state=\"frozen\"/></sheetView></sheetViews>",
            COL_NAME + 1,
            HPS_ROW,
            cell_ref(COL_NAME + 1, FIRST_STUDENT_ROW)
        ));
        xml.push_str(&format!(
            "<cols><col min=\"1\" max=\"1\" width=\"6\" customWidth=\"1\"/>\
             <col min=\"2\" max=\"2\" width=\"32\" customWidth=\"1\"/>\
             <col min=\"3\" max=\"{}\" width=\"10\" customWidth=\"1\"/></cols>",
            last_col + 1
        ));
        xml.push_str("<sheetData>");
        for (row, cells) in &self.rows {
            xml.push_str(&format!("<row r=\"{}\">", row));
            for (col, cell) in cells {
                let reference = cell_ref(*col, *row);
                let style = if cell.style == STYLE_DEFAULT {
                    String::new()
                } else {
                    format!(" s=\"{}\"", cell.style)
                };
                match &cell.value {
                    CellValue::Text(text) => xml.push_str(&format!(
                        "<c r=\"{}\"{} t=\"inlineStr\"><is><t>{}</t></is></c>",
                        reference,
                        style,
                        escape_xml(text)
                    )),
                    CellValue::Number(n) => xml.push_str(&format!(
                        "<c r=\"{}\"{}><v>{}</v></c>",
                        reference,
                        style,
                        number_text(*n)
                    )),
                    CellValue::Formula { formula, cached } => xml.push_str(&format!(
                        "<c r=\"{}\"{}><f>{}</f><v>{}</v></c>",
                        reference,
                        style,
                        escape_xml(formula),
                        number_text(*cached)
                    )),
                }
            }
            xml.push_str("</row>");
        }
        xml.push_str("</sheetData>");
        if !self.merges.is_empty() {
            xml.push_str(&format!("<mergeCells count=\"{}\">", self.merges.len()));
            for range in &self.merges {
                xml.push_str(&format!("<mergeCell ref=\"{}\"/>", range));
            }
            xml.push_str("</mergeCells>");
        }
        xml.push_str("</worksheet>");
        xml
    }
}

fn number_text(n: f64) -> String {
    if n.is_finite() {
        format!("{}", n)
    } else {
        "0".to_string()
    }
}

pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            // Control characters are not allowed in XML 1.0.
            c if (c as u32) < 0x20 && c != '\n' && c != '\t' && c != '\r' => {}
            c => out.push(c),
        }
    }
    out
}

fn percent_formula(raw_col: usize, row: usize) -> String {
    let max = row_locked(raw_col, HPS_ROW);
    format!(
        "IF({}=0,0,{}/{}*100)",
        max,
        cell_ref(raw_col, row),
        max
    )
}

fn weighted_formula(ps_col: usize, row: usize, weight_row: usize) -> String {
    format!(
        "{}*{}/100",
        cell_ref(ps_col, row),
        absolute(WEIGHT_COL, weight_row)
    )
}

fn sum_formula(cols: &[usize], row: usize) -> String {
    if cols.is_empty() {
        return "0".to_string();
    }
    cols.chunks(SUM_CHUNK)
        .map(|chunk| {
            let refs: Vec<String> = chunk.iter().map(|c| cell_ref(*c, row)).collect();
            format!("SUM({})", refs.join(","))
        })
        .collect::<Vec<_>>()
        .join("+")
}

fn quarterly_formula(layout: &SheetLayout, row: usize) -> String {
    format!(
        "{}+{}+{}",
        cell_ref(COL_ATTENDANCE_WS, row),
        cell_ref(layout.activity_ws(), row),
        cell_ref(layout.midterm_ws(), row)
    )
}

fn write_metadata(sheet: &mut Sheet, table: &GradeTable, exported_on: NaiveDate) {
    let b = &table.breakdown;
    sheet.text(0, TITLE_ROW, "SCMS Class Record", STYLE_BOLD);
    sheet.text(0, CLASS_ROW, "Class", STYLE_BOLD);
    sheet.text(WEIGHT_COL, CLASS_ROW, &table.class_name, STYLE_DEFAULT);
    sheet.text(0, CODE_ROW, "Class Code", STYLE_BOLD);
    sheet.text(WEIGHT_COL, CODE_ROW, &table.class_code, STYLE_DEFAULT);
    sheet.text(0, DATE_ROW, "Exported", STYLE_BOLD);
    sheet.text(
        WEIGHT_COL,
        DATE_ROW,
        &exported_on.format("%Y-%m-%d").to_string(),
        STYLE_DEFAULT,
    );
    for (row, label, weight) in [
        (ATTENDANCE_WEIGHT_ROW, "Attendance Weight (%)", b.attendance),
        (ACTIVITY_WEIGHT_ROW, "Activity Weight (%)", b.activity),
        (MIDTERM_WEIGHT_ROW, "Midterm Exam Weight (%)", b.midterm_exam),
        (FINAL_WEIGHT_ROW, "Final Exam Weight (%)", b.final_exam),
    ] {
        sheet.text(0, row, label, STYLE_BOLD);
        sheet.number(WEIGHT_COL, row, weight, STYLE_DEFAULT);
    }
}

fn write_headers(sheet: &mut Sheet, table: &GradeTable, layout: &SheetLayout) {
    let (g, s) = (GROUP_HEADER_ROW, SUB_HEADER_ROW);
    sheet.text(COL_NUMBER, g, "No.", STYLE_BOLD);
    sheet.merge(COL_NUMBER, g, COL_NUMBER, s);
    sheet.text(COL_NAME, g, "Student Name", STYLE_BOLD);
    sheet.merge(COL_NAME, g, COL_NAME, s);

    sheet.text(COL_PRESENT, g, "Attendance", STYLE_BOLD);
    sheet.merge(COL_PRESENT, g, COL_ATTENDANCE_WS, g);
    for (col, label) in [
        (COL_PRESENT, "Present"),
        (COL_EXCUSED, "Excused"),
        (COL_LATE, "Late"),
        (COL_ABSENT, "Absent"),
        (COL_ATTENDANCE_RS, "RS"),
        (COL_ATTENDANCE_PS, "PS"),
        (COL_ATTENDANCE_WS, "WS"),
    ] {
        sheet.text(col, s, label, STYLE_BOLD);
    }

    for (index, task) in table.activity_tasks.iter().enumerate() {
        sheet.text(layout.task_raw(index), g, &task.title, STYLE_BOLD);
        sheet.merge(layout.task_raw(index), g, layout.task_percent(index), g);
        sheet.text(layout.task_raw(index), s, "RS", STYLE_BOLD);
        sheet.text(layout.task_percent(index), s, "%", STYLE_BOLD);
    }

    let midterm_title = table
        .midterm_task
        .as_ref()
        .map_or("Midterm Exam", |t| t.title.as_str());
    let final_title = table
        .final_task
        .as_ref()
        .map_or("Final Exam", |t| t.title.as_str());
    for (first, title) in [
        (layout.activity_rs(), "Activities"),
        (layout.midterm_rs(), midterm_title),
        (layout.final_rs(), final_title),
    ] {
        sheet.text(first, g, title, STYLE_BOLD);
        sheet.merge(first, g, first + 2, g);
        sheet.text(first, s, "RS", STYLE_BOLD);
        sheet.text(first + 1, s, "PS", STYLE_BOLD);
        sheet.text(first + 2, s, "WS", STYLE_BOLD);
    }

    sheet.text(layout.quarterly(), g, "Quarterly Grade", STYLE_BOLD);
    sheet.merge(layout.quarterly(), g, layout.quarterly(), s);
    sheet.text(layout.rounded(), g, "Rounded Grade", STYLE_BOLD);
    sheet.merge(layout.rounded(), g, layout.rounded(), s);
}

fn write_hps_row(sheet: &mut Sheet, table: &GradeTable, layout: &SheetLayout) {
    let r = HPS_ROW;
    let b = &table.breakdown;
    sheet.text(COL_NAME, r, "Highest Possible Score", STYLE_BOLD);

    sheet.number(COL_ATTENDANCE_RS, r, table.attendance_max(), STYLE_DECIMAL);
    sheet.number(COL_ATTENDANCE_PS, r, 100.0, STYLE_DECIMAL);
    sheet.formula(
        COL_ATTENDANCE_WS,
        r,
        absolute(WEIGHT_COL, ATTENDANCE_WEIGHT_ROW),
        b.attendance,
    );

    let raw_cols: Vec<usize> = (0..layout.task_count).map(|i| layout.task_raw(i)).collect();
    for (index, task) in table.activity_tasks.iter().enumerate() {
        sheet.number(layout.task_raw(index), r, task.max_points(), STYLE_DECIMAL);
        sheet.number(layout.task_percent(index), r, 100.0, STYLE_DECIMAL);
    }
    sheet.formula(
        layout.activity_rs(),
        r,
        sum_formula(&raw_cols, r),
        table.activity_max(),
    );
    sheet.number(layout.activity_ps(), r, 100.0, STYLE_DECIMAL);
    sheet.formula(
        layout.activity_ws(),
        r,
        absolute(WEIGHT_COL, ACTIVITY_WEIGHT_ROW),
        b.activity,
    );

    sheet.number(layout.midterm_rs(), r, table.midterm_max(), STYLE_DECIMAL);
    sheet.number(layout.midterm_ps(), r, 100.0, STYLE_DECIMAL);
    sheet.formula(
        layout.midterm_ws(),
        r,
        absolute(WEIGHT_COL, MIDTERM_WEIGHT_ROW),
        b.midterm_exam,
    );

    sheet.number(layout.final_rs(), r, table.final_max(), STYLE_DECIMAL);
    sheet.number(layout.final_ps(), r, 100.0, STYLE_DECIMAL);
    sheet.formula(
        layout.final_ws(),
        r,
        absolute(WEIGHT_COL, FINAL_WEIGHT_ROW),
        b.final_exam,
    );

    sheet.formula(
        layout.quarterly(),
        r,
        quarterly_formula(layout, r),
        b.quarterly_weight_total(),
    );
}

fn write_student_row(sheet: &mut Sheet, layout: &SheetLayout, number: usize, row: &GradeRow) {
    let r = FIRST_STUDENT_ROW + number - 1;
    sheet.number(COL_NUMBER, r, number as f64, STYLE_DEFAULT);
    sheet.text(COL_NAME, r, &row.record.student.name, STYLE_DEFAULT);

    let attendance = row.record.attendance.unwrap_or_default();
    sheet.number(COL_PRESENT, r, attendance.present_sessions, STYLE_DEFAULT);
    sheet.number(COL_EXCUSED, r, attendance.excused_sessions, STYLE_DEFAULT);
    sheet.number(COL_LATE, r, attendance.late_sessions, STYLE_DEFAULT);
    sheet.number(COL_ABSENT, r, attendance.absent_sessions, STYLE_DEFAULT);
    sheet.formula(
        COL_ATTENDANCE_RS,
        r,
        format!(
            "{}+{}+{}*0.7",
            cell_ref(COL_PRESENT, r),
            cell_ref(COL_EXCUSED, r),
            cell_ref(COL_LATE, r)
        ),
        row.attendance.raw_score,
    );
    sheet.formula(
        COL_ATTENDANCE_PS,
        r,
        percent_formula(COL_ATTENDANCE_RS, r),
        row.attendance.percentage,
    );
    sheet.formula(
        COL_ATTENDANCE_WS,
        r,
        weighted_formula(COL_ATTENDANCE_PS, r, ATTENDANCE_WEIGHT_ROW),
        row.attendance.weighted,
    );

    for (index, cell) in row.tasks.iter().enumerate() {
        if let Some(raw) = cell.raw {
            sheet.number(layout.task_raw(index), r, raw, STYLE_DEFAULT);
        }
        sheet.formula(
            layout.task_percent(index),
            r,
            percent_formula(layout.task_raw(index), r),
            cell.percentage,
        );
    }

    let raw_cols: Vec<usize> = (0..layout.task_count).map(|i| layout.task_raw(i)).collect();
    sheet.formula(
        layout.activity_rs(),
        r,
        sum_formula(&raw_cols, r),
        row.activity.raw_score,
    );
    sheet.formula(
        layout.activity_ps(),
        r,
        percent_formula(layout.activity_rs(), r),
        row.activity.percentage,
    );
    sheet.formula(
        layout.activity_ws(),
        r,
        weighted_formula(layout.activity_ps(), r, ACTIVITY_WEIGHT_ROW),
        row.activity.weighted,
    );

    for (rs, exam, weight_row) in [
        (layout.midterm_rs(), &row.midterm, MIDTERM_WEIGHT_ROW),
        (layout.final_rs(), &row.final_exam, FINAL_WEIGHT_ROW),
    ] {
        sheet.number(rs, r, exam.raw_score, STYLE_DEFAULT);
        sheet.formula(rs + 1, r, percent_formula(rs, r), exam.percentage);
        sheet.formula(rs + 2, r, weighted_formula(rs + 1, r, weight_row), exam.weighted);
    }

    sheet.formula(
        layout.quarterly(),
        r,
        quarterly_formula(layout, r),
        row.quarterly.exact,
    );
    sheet.put(
        layout.rounded(),
        r,
        CellValue::Formula {
            formula: format!("ROUND({},0)", cell_ref(layout.quarterly(), r)),
            cached: row.quarterly.rounded as f64,
        },
        STYLE_BOLD,
    );
}

fn build_sheet(table: &GradeTable, exported_on: NaiveDate) -> (Sheet, SheetLayout) {
    let layout = SheetLayout {
        task_count: table.activity_tasks.len(),
    };
    let mut sheet = Sheet::default();
    write_metadata(&mut sheet, table, exported_on);
    write_headers(&mut sheet, table, &layout);
    write_hps_row(&mut sheet, table, &layout);
    for (index, row) in table.rows.iter().enumerate() {
        write_student_row(&mut sheet, &layout, index + 1, row);
    }
    (sheet, layout)
}

const CONTENT_TYPES_XML: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n\
<Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">\
<Default Extension=\"rels\" ContentType=\"application/vnd.openxmlformats-package.relationships+xml\"/>\
<Default Extension=\"xml\" ContentType=\"application/xml\"/>\
<Override PartName=\"/xl/workbook.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml\"/>\
<Override PartName=\"/xl/worksheets/sheet1.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml\"/>\
<Override PartName=\"/xl/styles.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml\"/>\
</Types>";

const ROOT_RELS_XML: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n\
<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">\
<Relationship Id=\"rId1\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument\" Target=\"xl/workbook.xml\"/>\
</Relationships>";

const WORKBOOK_RELS_XML: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n\
<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">\
<Relationship Id=\"rId1\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet\" Target=\"worksheets/sheet1.xml\"/>\
<Relationship Id=\"rId2\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles\" Target=\"styles.xml\"/>\
</Relationships>";

// Style indices: 0 default, 1 bold, 2 two decimals (built-in format 2, "0.00").
const STYLES_XML: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n\
<styleSheet xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\">\
<fonts count=\"2\"><font><sz val=\"11\"/><name val=\"Calibri\"/></font>\
<font><b/><sz val=\"11\"/><name val=\"Calibri\"/></font></fonts>\
<fills count=\"2\"><fill><patternFill patternType=\"none\"/></fill><fill><patternFill patternType=\"gray125\"/></fill></fills>\
<borders count=\"1\"><border><left/><right/><top/><bottom/><diagonal/></border></borders>\
<cellStyleXfs count=\"1\"><xf numFmtId=\"0\" fontId=\"0\" fillId=\"0\" borderId=\"0\"/></cellStyleXfs>\
<cellXfs count=\"3\">\
<xf numFmtId=\"0\" fontId=\"0\" fillId=\"0\" borderId=\"0\" xfId=\"0\"/>\
<xf numFmtId=\"0\" fontId=\"1\" fillId=\"0\" borderId=\"0\" xfId=\"0\" applyFont=\"1\"/>\
<xf numFmtId=\"2\" fontId=\"0\" fillId=\"0\" borderId=\"0\" xfId=\"0\" applyNumberFormat=\"1\"/>\
</cellXfs>\
<cellStyles count=\"1\"><cellStyle name=\"Normal\" xfId=\"0\" builtinId=\"0\"/></cellStyles>\
</styleSheet>";

fn workbook_xml() -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n\
         <workbook xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\" \
         xmlns:r=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships\">\
         <sheets><sheet name=\"{}\" sheetId=\"1\" r:id=\"rId1\"/></sheets>\
         <calcPr calcId=\"191029\" fullCalcOnLoad=\"1\"/></workbook>",
        SHEET_NAME
    )
}

/// Builds the complete `.xlsx` package in memory.
pub fn build_workbook(table: &GradeTable, exported_on: NaiveDate) -> Result<Vec<u8>, Box<dyn Error>> {
    let (sheet, layout) = build_sheet(table, exported_on);
    let sheet_xml = sheet.to_xml(layout.last_col());

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);
    let workbook = workbook_xml();
    for (name, content) in [
        ("[Content_Types].xml", CONTENT_TYPES_XML),
        ("_rels/.rels", ROOT_RELS_XML),
        ("xl/workbook.xml", workbook.as_str()),
        ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS_XML),
        ("xl/styles.xml", STYLES_XML),
        ("xl/worksheets/sheet1.xml", sheet_xml.as_str()),
    ] {
        zip.start_file(name, opts)
            .map_err(|e| format!("failed to start {}: {}", name, e))?;
        zip.write_all(content.as_bytes())
            .map_err(|e| format!("failed to write {}: {}", name, e))?;
    }
    let cursor = zip.finish().map_err(|e| format!("failed to finish workbook: {}", e))?;
    Ok(cursor.into_inner())
}

/// `SCMS_Grades_<class_code>_<YYYY-MM-DD>.xlsx`, with path-hostile characters replaced.
pub fn export_file_name(class_code: &str, exported_on: NaiveDate) -> String {
    let code: String = class_code
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("SCMS_Grades_{}_{}.xlsx", code, exported_on.format("%Y-%m-%d"))
}

/// Exports the grade table into `output_dir` and returns the written path.
///
/// Bytes go to a temporary sibling first and are renamed into place, so a
/// failed export never leaves a file under the final name.
pub fn export_grade_table(
    table: &GradeTable,
    output_dir: &Path,
    exported_on: NaiveDate,
) -> Result<PathBuf, Box<dyn Error>> {
    let result = (|| -> Result<PathBuf, Box<dyn Error>> {
        let bytes = build_workbook(table, exported_on)?;
        std::fs::create_dir_all(output_dir)?;
        let path = output_dir.join(export_file_name(&table.class_code, exported_on));
        let temp = path.with_extension("xlsx.part");
        if let Err(e) = std::fs::write(&temp, &bytes) {
            let _ = std::fs::remove_file(&temp);
            return Err(e.into());
        }
        std::fs::rename(&temp, &path)?;
        Ok(path)
    })();

    match &result {
        Ok(path) => info!(
            "exported grades of {} ({} students) to {}",
            table.class_code,
            table.rows.len(),
            path.display()
        ),
        Err(e) => error!("grade export for {} failed: {}", table.class_code, e),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grading::GradingBreakdown;
    use crate::student::{AttendanceRecord, Student, StudentAssignmentRecord, StudentGradeRecord};
    use crate::task::{Task, TaskType};
    use regex::Regex;
    use std::collections::HashMap;
    use std::io::Read;

    fn task(id: u64, title: &str, task_type: TaskType, points: f64) -> Task {
        Task {
            id,
            title: title.to_string(),
            task_type,
            points: Some(points),
            ..Default::default()
        }
    }

    fn student(id: u64, name: &str, grades: &[(u64, f64)], attendance: Option<AttendanceRecord>) -> StudentGradeRecord {
        StudentGradeRecord {
            student: Student {
                id,
                name: name.to_string(),
                ..Default::default()
            },
            assignments: grades
                .iter()
                .map(|&(task_id, g)| StudentAssignmentRecord {
                    task_id,
                    grade: Some(g),
                    points: None,
                })
                .collect(),
            attendance,
        }
    }

    fn sample_table() -> GradeTable {
        let tasks = vec![
            task(1, "Quiz 1", TaskType::Quiz, 20.0),
            task(2, "Lab & Report", TaskType::Activity, 30.0),
            task(3, "Midterm Exam", TaskType::MidtermExam, 100.0),
            task(4, "Essay", TaskType::Assignment, 50.0),
            task(5, "Final Exam", TaskType::FinalExam, 80.0),
        ];
        let breakdown = GradingBreakdown {
            attendance: 10.0,
            activity: 50.0,
            midterm_exam: 40.0,
            final_exam: 40.0,
            max_attendance_score: 6.0,
            max_midterm_score: 68.0,
            ..Default::default()
        };
        let records = vec![
            student(
                10,
                "Ana Lim",
                &[(1, 17.0), (2, 26.5), (3, 51.0), (5, 70.0)],
                Some(AttendanceRecord {
                    present_sessions: 5.0,
                    late_sessions: 1.0,
                    ..Default::default()
                }),
            ),
            student(11, "Ben <Cruz>", &[(4, 44.0)], None),
            student(
                12,
                "Carla Reyes",
                &[(1, 20.0), (2, 30.0), (3, 70.0), (4, 50.0), (5, 80.0)],
                Some(AttendanceRecord {
                    present_sessions: 4.0,
                    excused_sessions: 1.0,
                    late_sessions: 0.0,
                    absent_sessions: 1.0,
                }),
            ),
        ];
        GradeTable::build("Science 7 - Rizal", "SCI7AB", &tasks, records, breakdown)
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()
    }

    #[derive(Debug, Clone)]
    struct ReadCell {
        formula: Option<String>,
        value: Option<String>,
    }

    fn read_sheet(bytes: &[u8]) -> HashMap<String, ReadCell> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap();
        let mut xml = String::new();
        archive
            .by_name("xl/worksheets/sheet1.xml")
            .unwrap()
            .read_to_string(&mut xml)
            .unwrap();
        let cell_re = Regex::new(r#"<c r="([A-Z]+[0-9]+)"[^>]*>(.*?)</c>"#).unwrap();
        let f_re = Regex::new(r"<f>(.*?)</f>").unwrap();
        let v_re = Regex::new(r"<v>(.*?)</v>").unwrap();
        let t_re = Regex::new(r"<t>(.*?)</t>").unwrap();
        cell_re
            .captures_iter(&xml)
            .map(|c| {
                let inner = c.get(2).unwrap().as_str();
                let value = v_re
                    .captures(inner)
                    .or_else(|| t_re.captures(inner))
                    .map(|m| m[1].to_string());
                (
                    c[1].to_string(),
                    ReadCell {
                        formula: f_re.captures(inner).map(|m| m[1].to_string()),
                        value,
                    },
                )
            })
            .collect()
    }

    /// Evaluates the small formula subset the export writes:
    /// `+ - * /`, `=` inside `IF`, `SUM`, `ROUND`, numbers and references.
    struct Evaluator<'a> {
        cells: &'a HashMap<String, ReadCell>,
    }

    impl<'a> Evaluator<'a> {
        fn cell(&self, reference: &str) -> f64 {
            let reference = reference.replace('$', "");
            match self.cells.get(&reference) {
                Some(ReadCell { formula: Some(f), .. }) => self.eval(f),
                Some(ReadCell { value: Some(v), .. }) => v.parse().unwrap_or(0.0),
                _ => 0.0,
            }
        }

        fn eval(&self, formula: &str) -> f64 {
            let tokens: Vec<char> = formula.chars().filter(|c| !c.is_whitespace()).collect();
            let mut pos = 0;
            let value = self.expr(&tokens, &mut pos);
            assert_eq!(pos, tokens.len(), "trailing input in {}", formula);
            value
        }

        fn comparison(&self, t: &[char], pos: &mut usize) -> bool {
            let left = self.expr(t, pos);
            assert_eq!(t[*pos], '=');
            *pos += 1;
            let right = self.expr(t, pos);
            left == right
        }

        fn expr(&self, t: &[char], pos: &mut usize) -> f64 {
            let mut value = self.term(t, pos);
            while *pos < t.len() && (t[*pos] == '+' || t[*pos] == '-') {
                let op = t[*pos];
                *pos += 1;
                let rhs = self.term(t, pos);
                value = if op == '+' { value + rhs } else { value - rhs };
            }
            value
        }

        fn term(&self, t: &[char], pos: &mut usize) -> f64 {
            let mut value = self.factor(t, pos);
            while *pos < t.len() && (t[*pos] == '*' || t[*pos] == '/') {
                let op = t[*pos];
                *pos += 1;
                let rhs = self.factor(t, pos);
                value = if op == '*' { value * rhs } else { value / rhs };
            }
            value
        }

        fn args(&self, t: &[char], pos: &mut usize) -> Vec<f64> {
            let mut values = vec![self.expr(t, pos)];
            while t[*pos] == ',' {
                *pos += 1;
                values.push(self.expr(t, pos));
            }
            assert_eq!(t[*pos], ')');
            *pos += 1;
            values
        }

        fn factor(&self, t: &[char], pos: &mut usize) -> f64 {
            let c = t[*pos];
            if c == '-' {
                *pos += 1;
                return -self.factor(t, pos);
            }
            if c == '(' {
                *pos += 1;
                let v = self.expr(t, pos);
                assert_eq!(t[*pos], ')');
                *pos += 1;
                return v;
            }
            if c.is_ascii_digit() || c == '.' {
                let start = *pos;
                while *pos < t.len() && (t[*pos].is_ascii_digit() || t[*pos] == '.') {
                    *pos += 1;
                }
                return t[start..*pos].iter().collect::<String>().parse().unwrap();
            }
            let start = *pos;
            while *pos < t.len() && (t[*pos].is_ascii_alphanumeric() || t[*pos] == '$') {
                *pos += 1;
            }
            let word: String = t[start..*pos].iter().collect();
            if *pos < t.len() && t[*pos] == '(' {
                *pos += 1;
                return match word.as_str() {
                    "IF" => {
                        let cond = self.comparison(t, pos);
                        assert_eq!(t[*pos], ',');
                        *pos += 1;
                        let if_true = self.expr(t, pos);
                        assert_eq!(t[*pos], ',');
                        *pos += 1;
                        let if_false = self.expr(t, pos);
                        assert_eq!(t[*pos], ')');
                        *pos += 1;
                        if cond {
                            if_true
                        } else {
                            if_false
                        }
                    }
                    "SUM" => self.args(t, pos).into_iter().fold(0.0, |acc, v| acc + v),
                    "ROUND" => {
                        let a = self.args(t, pos);
                        let scale = 10f64.powi(a[1] as i32);
                        (a[0] * scale).round() / scale
                    }
                    other => panic!("unsupported function {}", other),
                };
            }
            self.cell(&word)
        }
    }

    fn number(cells: &HashMap<String, ReadCell>, reference: &str) -> f64 {
        cells[reference].value.as_ref().unwrap().parse().unwrap()
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_column_letters() {
        assert_eq!(column_letter(0), "A");
        assert_eq!(column_letter(25), "Z");
        assert_eq!(column_letter(26), "AA");
        assert_eq!(column_letter(51), "AZ");
        assert_eq!(column_letter(52), "BA");
        assert_eq!(column_letter(701), "ZZ");
        assert_eq!(column_letter(702), "AAA");
        assert_eq!(cell_ref(6, 13), "G13");
    }

    #[test]
    fn test_layout_positions_follow_task_count() {
        let layout = SheetLayout { task_count: 3 };
        assert_eq!(layout.task_raw(0), 9);
        assert_eq!(layout.task_percent(2), 14);
        assert_eq!(layout.activity_rs(), 15);
        assert_eq!(layout.midterm_rs(), 18);
        assert_eq!(layout.final_ws(), 23);
        assert_eq!(layout.rounded(), 25);

        let empty = SheetLayout { task_count: 0 };
        assert_eq!(empty.activity_rs(), FIRST_TASK_COL);
    }

    #[test]
    fn test_sum_formula_chunks() {
        assert_eq!(sum_formula(&[], 13), "0");
        assert_eq!(sum_formula(&[9, 11], 13), "SUM(J13,L13)");
        let many: Vec<usize> = (0..150).map(|i| 9 + 2 * i).collect();
        let formula = sum_formula(&many, 13);
        assert_eq!(formula.matches("SUM(").count(), 2);
        assert!(formula.contains(")+SUM("));
    }

    #[test]
    fn test_export_file_name() {
        assert_eq!(export_file_name("SCI7AB", day()), "SCMS_Grades_SCI7AB_2025-03-10.xlsx");
        assert_eq!(export_file_name("a/b c", day()), "SCMS_Grades_a_b_c_2025-03-10.xlsx");
    }

    #[test]
    fn test_workbook_package_parts() {
        let bytes = build_workbook(&sample_table(), day()).unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        for part in [
            "[Content_Types].xml",
            "_rels/.rels",
            "xl/workbook.xml",
            "xl/_rels/workbook.xml.rels",
            "xl/styles.xml",
            "xl/worksheets/sheet1.xml",
        ] {
            assert!(archive.by_name(part).is_ok(), "missing {}", part);
        }
        let mut workbook = String::new();
        archive
            .by_name("xl/workbook.xml")
            .unwrap()
            .read_to_string(&mut workbook)
            .unwrap();
        assert!(workbook.contains("fullCalcOnLoad=\"1\""));
    }

    #[test]
    fn test_sheet_layout_and_metadata() {
        let table = sample_table();
        let cells = read_sheet(&build_workbook(&table, day()).unwrap());
        assert_eq!(cells["B2"].value.as_deref(), Some("Science 7 - Rizal"));
        assert_eq!(cells["B3"].value.as_deref(), Some("SCI7AB"));
        assert_eq!(cells["B4"].value.as_deref(), Some("2025-03-10"));
        assert_eq!(number(&cells, "B5"), 10.0);
        assert_eq!(number(&cells, "B7"), 40.0);
        assert_eq!(cells["B12"].value.as_deref(), Some("Highest Possible Score"));
        assert_eq!(cells["J10"].value.as_deref(), Some("Quiz 1"));
        assert_eq!(cells["L10"].value.as_deref(), Some("Lab &amp; Report"));
        assert_eq!(cells["B14"].value.as_deref(), Some("Ben &lt;Cruz&gt;"));

        // Three activity tasks -> activity block at P, midterm at S, final at V.
        assert_eq!(cells["P10"].value.as_deref(), Some("Activities"));
        assert_eq!(cells["S10"].value.as_deref(), Some("Midterm Exam"));
        assert_eq!(cells["V10"].value.as_deref(), Some("Final Exam"));
        assert_eq!(cells["Y10"].value.as_deref(), Some("Quarterly Grade"));
        assert_eq!(number(&cells, "S12"), 68.0);
        assert_eq!(number(&cells, "V12"), 80.0);
        assert_eq!(number(&cells, "P12"), 100.0);

        assert_eq!(
            cells["H13"].formula.as_deref(),
            Some("IF(G$12=0,0,G13/G$12*100)")
        );
        assert_eq!(cells["I13"].formula.as_deref(), Some("H13*$B$5/100"));
        assert_eq!(cells["P13"].formula.as_deref(), Some("SUM(J13,L13,N13)"));
        assert_eq!(cells["Y13"].formula.as_deref(), Some("I13+R13+U13"));
        assert_eq!(cells["Z13"].formula.as_deref(), Some("ROUND(Y13,0)"));
        // Ungraded task cells stay empty.
        assert!(!cells.contains_key("J14"));
    }

    #[test]
    fn test_formulas_evaluate_to_displayed_values() {
        let table = sample_table();
        let cells = read_sheet(&build_workbook(&table, day()).unwrap());
        let eval = Evaluator { cells: &cells };
        let layout = SheetLayout {
            task_count: table.activity_tasks.len(),
        };

        for (reference, cell) in &cells {
            if let Some(formula) = &cell.formula {
                let cached: f64 = cell.value.as_ref().unwrap().parse().unwrap();
                assert!(
                    close(eval.eval(formula), cached),
                    "{} = {} evaluated {} but cached {}",
                    reference,
                    formula,
                    eval.eval(formula),
                    cached
                );
            }
        }

        for (index, row) in table.rows.iter().enumerate() {
            let r = FIRST_STUDENT_ROW + index;
            let at = |col: usize| eval.cell(&cell_ref(col, r));
            assert!(close(at(COL_ATTENDANCE_PS), row.attendance.percentage));
            assert!(close(at(COL_ATTENDANCE_WS), row.attendance.weighted));
            assert!(close(at(layout.activity_ps()), row.activity.percentage));
            assert!(close(at(layout.activity_ws()), row.activity.weighted));
            assert!(close(at(layout.midterm_ps()), row.midterm.percentage));
            assert!(close(at(layout.midterm_ws()), row.midterm.weighted));
            assert!(close(at(layout.final_ws()), row.final_exam.weighted));
            assert!(close(at(layout.quarterly()), row.quarterly.exact));
            assert_eq!(at(layout.rounded()), row.quarterly.rounded as f64);
        }

        // First student: attendance 5.7/6 -> 9.5, midterm 51/68 -> 30.
        assert!(close(eval.cell("I13"), 9.5));
        assert!(close(eval.cell("U13"), 30.0));
    }

    #[test]
    fn test_editing_a_weight_recomputes() {
        let table = sample_table();
        let mut cells = read_sheet(&build_workbook(&table, day()).unwrap());
        cells.insert(
            "B6".to_string(),
            ReadCell {
                formula: None,
                value: Some("25".to_string()),
            },
        );
        let eval = Evaluator { cells: &cells };
        let expected = table.rows[0].activity.percentage * 25.0 / 100.0;
        assert!(close(eval.cell("R13"), expected));
    }

    #[test]
    fn test_export_writes_named_file() {
        let dir = std::env::temp_dir().join(format!(
            "scms-export-{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        let path = export_grade_table(&sample_table(), &dir, day()).unwrap();
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "SCMS_Grades_SCI7AB_2025-03-10.xlsx"
        );
        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"PK"));
        assert!(!path.with_extension("xlsx.part").exists());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_export_without_tasks_or_students() {
        let table = GradeTable::build("Empty", "EMPTY1", &[], Vec::new(), GradingBreakdown::default());
        let cells = read_sheet(&build_workbook(&table, day()).unwrap());
        assert_eq!(cells["J10"].value.as_deref(), Some("Activities"));
        assert_eq!(cells["J12"].formula.as_deref(), Some("0"));
        assert!(!cells.contains_key("A13"));
    }
}
