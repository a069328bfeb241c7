//! Spreadsheet report (`.xlsx`).
//!
//! Writes a minimal Office Open XML workbook with three sheets:
//!
//! | Sheet | Rows |
//! |-------|------|
//! | `commit_analysis` | per-repository commit and contributor counts, plus a summary row |
//! | `organization_commits` | every commit of every repository |
//! | `keyword_search_results` | the ranked findings file |
//!
//! The package is assembled by hand with `zip` and `quick-xml`: strings are
//! stored inline (no shared string table) and styling is limited to a bold
//! grey header, thin borders, wrapped message cells and an italic summary.

use anyhow::{Context, Result};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::{Seek, Write};
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::findings::{self, FindingRecord};
use crate::models::{RecordGroup, UNKNOWN};
use crate::summary::{self, CommitSummary};
use crate::traits::RecordSource;

const NS_MAIN: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const NS_REL: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_PKG_REL: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

/// Longest string a spreadsheet cell can hold.
const MAX_CELL_CHARS: usize = 32_767;

const SUMMARY_MAX_WIDTH_PX: f64 = 500.0;
const DETAIL_MAX_WIDTH_PX: f64 = 800.0;

/// Cell formats, indices into `cellXfs` of the styles part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellStyle {
    Plain = 0,
    Header = 1,
    Bordered = 2,
    Summary = 3,
    SummaryLead = 4,
    Wrap = 5,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(i64),
}

impl CellValue {
    fn display_len(&self) -> usize {
        match self {
            CellValue::Text(s) => s.chars().count(),
            CellValue::Number(n) => n.to_string().len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub value: CellValue,
    pub style: CellStyle,
}

impl Cell {
    pub fn text(s: impl Into<String>, style: CellStyle) -> Self {
        Self {
            value: CellValue::Text(s.into()),
            style,
        }
    }

    pub fn number(n: impl TryInto<i64>, style: CellStyle) -> Self {
        Self {
            value: CellValue::Number(n.try_into().unwrap_or(i64::MAX)),
            style,
        }
    }
}

/// One worksheet. Rows may be sparse: `None` leaves a blank row.
#[derive(Debug, Clone)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Option<Vec<Cell>>>,
    pub max_width_px: f64,
}

impl Sheet {
    pub fn new(name: impl Into<String>, max_width_px: f64) -> Self {
        Self {
            name: name.into(),
            rows: Vec::new(),
            max_width_px,
        }
    }

    pub fn push_row(&mut self, cells: Vec<Cell>) {
        self.rows.push(Some(cells));
    }

    pub fn push_blank(&mut self) {
        self.rows.push(None);
    }

    /// Width per column: `min((longest + 2) * 1.2, max_width_px / 7)`.
    pub fn column_widths(&self) -> Vec<f64> {
        let mut longest: Vec<usize> = Vec::new();
        for cells in self.rows.iter().flatten() {
            for (col, cell) in cells.iter().enumerate() {
                if longest.len() <= col {
                    longest.resize(col + 1, 0);
                }
                longest[col] = longest[col].max(cell.value.display_len());
            }
        }
        longest
            .into_iter()
            .map(|len| ((len + 2) as f64 * 1.2).min(self.max_width_px / 7.0))
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sheet(&mut self, sheet: Sheet) {
        self.sheets.push(sheet);
    }

    /// Write the package to `out`.
    pub fn write_to<W: Write + Seek>(&self, out: W) -> Result<()> {
        let mut zip = zip::ZipWriter::new(out);
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);

        let mut parts: Vec<(String, Vec<u8>)> = vec![
            ("[Content_Types].xml".to_string(), self.content_types()?),
            ("_rels/.rels".to_string(), root_rels()?),
            ("xl/workbook.xml".to_string(), self.workbook_xml()?),
            ("xl/_rels/workbook.xml.rels".to_string(), self.workbook_rels()?),
            ("xl/styles.xml".to_string(), styles_xml()?),
        ];
        for (i, sheet) in self.sheets.iter().enumerate() {
            parts.push((format!("xl/worksheets/sheet{}.xml", i + 1), sheet_xml(sheet)?));
        }

        for (name, bytes) in parts {
            zip.start_file(name.as_str(), options)?;
            zip.write_all(&bytes)?;
        }
        zip.finish()?;
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create report: {}", path.display()))?;
        let mut writer = std::io::BufWriter::new(file);
        self.write_to(&mut writer)
            .and_then(|_| Ok(writer.flush()?))
            .with_context(|| format!("Failed to write report: {}", path.display()))
    }

    fn content_types(&self) -> Result<Vec<u8>> {
        xml_part(|w| {
            start(
                w,
                "Types",
                &[("xmlns", "http://schemas.openxmlformats.org/package/2006/content-types")],
            )?;
            empty(
                w,
                "Default",
                &[
                    ("Extension", "rels"),
                    ("ContentType", "application/vnd.openxmlformats-package.relationships+xml"),
                ],
            )?;
            empty(
                w,
                "Default",
                &[("Extension", "xml"), ("ContentType", "application/xml")],
            )?;
            empty(
                w,
                "Override",
                &[
                    ("PartName", "/xl/workbook.xml"),
                    (
                        "ContentType",
                        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml",
                    ),
                ],
            )?;
            empty(
                w,
                "Override",
                &[
                    ("PartName", "/xl/styles.xml"),
                    (
                        "ContentType",
                        "application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml",
                    ),
                ],
            )?;
            for i in 1..=self.sheets.len() {
                let part = format!("/xl/worksheets/sheet{}.xml", i);
                empty(
                    w,
                    "Override",
                    &[
                        ("PartName", part.as_str()),
                        (
                            "ContentType",
                            "application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml",
                        ),
                    ],
                )?;
            }
            end(w, "Types")
        })
    }

    fn workbook_xml(&self) -> Result<Vec<u8>> {
        xml_part(|w| {
            start(w, "workbook", &[("xmlns", NS_MAIN), ("xmlns:r", NS_REL)])?;
            start(w, "sheets", &[])?;
            for (i, sheet) in self.sheets.iter().enumerate() {
                let id = (i + 1).to_string();
                let rid = format!("rId{}", i + 1);
                empty(
                    w,
                    "sheet",
                    &[
                        ("name", sheet.name.as_str()),
                        ("sheetId", id.as_str()),
                        ("r:id", rid.as_str()),
                    ],
                )?;
            }
            end(w, "sheets")?;
            end(w, "workbook")
        })
    }

    fn workbook_rels(&self) -> Result<Vec<u8>> {
        xml_part(|w| {
            start(w, "Relationships", &[("xmlns", NS_PKG_REL)])?;
            for i in 1..=self.sheets.len() {
                let rid = format!("rId{}", i);
                let target = format!("worksheets/sheet{}.xml", i);
                empty(
                    w,
                    "Relationship",
                    &[
                        ("Id", rid.as_str()),
                        ("Type", format!("{}/worksheet", NS_REL).as_str()),
                        ("Target", target.as_str()),
                    ],
                )?;
            }
            let rid = format!("rId{}", self.sheets.len() + 1);
            empty(
                w,
                "Relationship",
                &[
                    ("Id", rid.as_str()),
                    ("Type", format!("{}/styles", NS_REL).as_str()),
                    ("Target", "styles.xml"),
                ],
            )?;
            end(w, "Relationships")
        })
    }
}

fn root_rels() -> Result<Vec<u8>> {
    xml_part(|w| {
        start(w, "Relationships", &[("xmlns", NS_PKG_REL)])?;
        empty(
            w,
            "Relationship",
            &[
                ("Id", "rId1"),
                ("Type", format!("{}/officeDocument", NS_REL).as_str()),
                ("Target", "xl/workbook.xml"),
            ],
        )?;
        end(w, "Relationships")
    })
}

/// Fonts, fills, borders and the `cellXfs` list [`CellStyle`] indexes into.
fn styles_xml() -> Result<Vec<u8>> {
    xml_part(|w| {
        start(w, "styleSheet", &[("xmlns", NS_MAIN)])?;

        // fonts: regular, bold, italic
        start(w, "fonts", &[("count", "3")])?;
        for variant in [None, Some("b"), Some("i")] {
            start(w, "font", &[])?;
            if let Some(tag) = variant {
                empty(w, tag, &[])?;
            }
            empty(w, "sz", &[("val", "11")])?;
            empty(w, "name", &[("val", "Calibri")])?;
            end(w, "font")?;
        }
        end(w, "fonts")?;

        // fills: the two reserved ones, then light grey
        start(w, "fills", &[("count", "3")])?;
        for pattern in ["none", "gray125"] {
            start(w, "fill", &[])?;
            empty(w, "patternFill", &[("patternType", pattern)])?;
            end(w, "fill")?;
        }
        start(w, "fill", &[])?;
        start(w, "patternFill", &[("patternType", "solid")])?;
        empty(w, "fgColor", &[("rgb", "FFD3D3D3")])?;
        empty(w, "bgColor", &[("indexed", "64")])?;
        end(w, "patternFill")?;
        end(w, "fill")?;
        end(w, "fills")?;

        // borders: none, thin all round, thick top
        start(w, "borders", &[("count", "3")])?;
        border(w, &["left", "right", "top", "bottom"], None)?;
        border(w, &["left", "right", "top", "bottom"], Some("thin"))?;
        start(w, "border", &[])?;
        empty(w, "left", &[])?;
        empty(w, "right", &[])?;
        start(w, "top", &[("style", "thick")])?;
        empty(w, "color", &[("indexed", "64")])?;
        end(w, "top")?;
        empty(w, "bottom", &[])?;
        empty(w, "diagonal", &[])?;
        end(w, "border")?;
        end(w, "borders")?;

        start(w, "cellStyleXfs", &[("count", "1")])?;
        empty(
            w,
            "xf",
            &[("numFmtId", "0"), ("fontId", "0"), ("fillId", "0"), ("borderId", "0")],
        )?;
        end(w, "cellStyleXfs")?;

        // Order must match CellStyle
        start(w, "cellXfs", &[("count", "6")])?;
        xf(w, "0", "0", "0", None, false)?;
        xf(w, "1", "2", "1", None, false)?;
        xf(w, "0", "0", "1", Some("center"), false)?;
        xf(w, "2", "0", "0", Some("center"), false)?;
        xf(w, "2", "0", "2", Some("center"), false)?;
        xf(w, "0", "0", "0", None, true)?;
        end(w, "cellXfs")?;

        end(w, "styleSheet")
    })
}

fn border(w: &mut Writer<Vec<u8>>, sides: &[&str], style: Option<&str>) -> Result<()> {
    start(w, "border", &[])?;
    for side in sides {
        match style {
            Some(style) => {
                start(w, side, &[("style", style)])?;
                empty(w, "color", &[("indexed", "64")])?;
                end(w, side)?;
            }
            None => empty(w, side, &[])?,
        }
    }
    empty(w, "diagonal", &[])?;
    end(w, "border")
}

fn xf(
    w: &mut Writer<Vec<u8>>,
    font: &str,
    fill: &str,
    border: &str,
    horizontal: Option<&str>,
    wrap: bool,
) -> Result<()> {
    let mut attrs = vec![
        ("numFmtId", "0"),
        ("fontId", font),
        ("fillId", fill),
        ("borderId", border),
        ("xfId", "0"),
    ];
    if font != "0" {
        attrs.push(("applyFont", "1"));
    }
    if fill != "0" {
        attrs.push(("applyFill", "1"));
    }
    if border != "0" {
        attrs.push(("applyBorder", "1"));
    }
    if horizontal.is_none() && !wrap {
        return empty(w, "xf", &attrs);
    }

    attrs.push(("applyAlignment", "1"));
    start(w, "xf", &attrs)?;
    let mut align = Vec::new();
    if let Some(h) = horizontal {
        align.push(("horizontal", h));
    }
    if wrap {
        align.push(("vertical", "top"));
        align.push(("wrapText", "1"));
    }
    empty(w, "alignment", &align)?;
    end(w, "xf")
}

fn sheet_xml(sheet: &Sheet) -> Result<Vec<u8>> {
    xml_part(|w| {
        start(w, "worksheet", &[("xmlns", NS_MAIN)])?;

        let widths = sheet.column_widths();
        if !widths.is_empty() {
            start(w, "cols", &[])?;
            for (i, width) in widths.iter().enumerate() {
                let index = (i + 1).to_string();
                let width = format!("{:.2}", width);
                empty(
                    w,
                    "col",
                    &[
                        ("min", index.as_str()),
                        ("max", index.as_str()),
                        ("width", width.as_str()),
                        ("customWidth", "1"),
                    ],
                )?;
            }
            end(w, "cols")?;
        }

        start(w, "sheetData", &[])?;
        for (r, cells) in sheet.rows.iter().enumerate() {
            let Some(cells) = cells else { continue };
            let row_ref = (r + 1).to_string();
            start(w, "row", &[("r", row_ref.as_str())])?;
            for (c, cell) in cells.iter().enumerate() {
                write_cell(w, &format!("{}{}", col_letter(c), r + 1), cell)?;
            }
            end(w, "row")?;
        }
        end(w, "sheetData")?;

        end(w, "worksheet")
    })
}

fn write_cell(w: &mut Writer<Vec<u8>>, reference: &str, cell: &Cell) -> Result<()> {
    let style = (cell.style as u8).to_string();
    match &cell.value {
        CellValue::Number(n) => {
            start(w, "c", &[("r", reference), ("s", style.as_str())])?;
            start(w, "v", &[])?;
            w.write_event(Event::Text(BytesText::new(&n.to_string())))?;
            end(w, "v")?;
        }
        CellValue::Text(s) => {
            start(
                w,
                "c",
                &[("r", reference), ("s", style.as_str()), ("t", "inlineStr")],
            )?;
            start(w, "is", &[])?;
            start(w, "t", &[("xml:space", "preserve")])?;
            w.write_event(Event::Text(BytesText::new(&cell_text(s))))?;
            end(w, "t")?;
            end(w, "is")?;
        }
    }
    end(w, "c")
}

/// Strip characters XML 1.0 cannot carry and clamp to the cell limit.
fn cell_text(s: &str) -> String {
    s.chars()
        .filter(|&c| c == '\t' || c == '\n' || c == '\r' || c >= ' ')
        .take(MAX_CELL_CHARS)
        .collect()
}

/// Zero-based column index to spreadsheet letters: 0 → A, 26 → AA.
pub fn col_letter(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8_lossy(&letters).into_owned()
}

/// `2021-03-04T05:06:07Z` → `2021-03-04 05:06:07`.
pub fn format_date(timestamp: &str) -> String {
    let spaced = timestamp.replacen('T', " ", 1);
    spaced
        .strip_suffix('Z')
        .map(str::to_string)
        .unwrap_or(spaced)
}

fn xml_part<F>(build: F) -> Result<Vec<u8>>
where
    F: FnOnce(&mut Writer<Vec<u8>>) -> Result<()>,
{
    let mut writer = Writer::new(Vec::new());
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
    build(&mut writer)?;
    Ok(writer.into_inner())
}

fn start(w: &mut Writer<Vec<u8>>, name: &str, attrs: &[(&str, &str)]) -> Result<()> {
    let elem = BytesStart::new(name).with_attributes(attrs.iter().copied());
    w.write_event(Event::Start(elem))?;
    Ok(())
}

fn empty(w: &mut Writer<Vec<u8>>, name: &str, attrs: &[(&str, &str)]) -> Result<()> {
    let elem = BytesStart::new(name).with_attributes(attrs.iter().copied());
    w.write_event(Event::Empty(elem))?;
    Ok(())
}

fn end(w: &mut Writer<Vec<u8>>, name: &str) -> Result<()> {
    w.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

// ============ Sheets ============

pub fn commit_analysis_sheet(summary: &CommitSummary) -> Sheet {
    let mut sheet = Sheet::new("commit_analysis", SUMMARY_MAX_WIDTH_PX);
    sheet.push_row(header(&[
        "Repository",
        "Total Commits",
        "Unique Committers",
        "Unique Authors",
    ]));

    for repo in &summary.repos {
        sheet.push_row(vec![
            Cell::text(repo.repository.as_str(), CellStyle::Bordered),
            Cell::number(repo.commit_count, CellStyle::Bordered),
            Cell::number(repo.committer_count, CellStyle::Bordered),
            Cell::number(repo.author_count, CellStyle::Bordered),
        ]);
    }

    sheet.push_blank();
    sheet.push_row(vec![
        Cell::text("Summary", CellStyle::SummaryLead),
        Cell::text(
            format!("Total commits: {}", summary.total_commits),
            CellStyle::Summary,
        ),
        Cell::text(
            format!("Unique committers: {}", summary.total_committers),
            CellStyle::Summary,
        ),
        Cell::text(
            format!("Unique authors: {}", summary.total_authors),
            CellStyle::Summary,
        ),
    ]);

    sheet
}

pub fn organization_commits_sheet(groups: &[RecordGroup]) -> Sheet {
    let mut sheet = Sheet::new("organization_commits", DETAIL_MAX_WIDTH_PX);
    sheet.push_row(header(&[
        "Repository",
        "Message",
        "Committer",
        "Author",
        "SHA",
        "Date",
    ]));

    for group in groups {
        for record in &group.records {
            sheet.push_row(vec![
                Cell::text(group.name.as_str(), CellStyle::Plain),
                Cell::text(record.message.as_str(), CellStyle::Wrap),
                Cell::text(record.committer_name(), CellStyle::Plain),
                Cell::text(record.author_name(), CellStyle::Plain),
                Cell::text(record.id.as_str(), CellStyle::Plain),
                Cell::text(format_date(record.timestamp_or_unknown()), CellStyle::Plain),
            ]);
        }
    }

    sheet
}

pub fn keyword_results_sheet(findings: &[FindingRecord]) -> Sheet {
    let mut sheet = Sheet::new("keyword_search_results", DETAIL_MAX_WIDTH_PX);
    sheet.push_row(header(&[
        "Commit Date",
        "Repository",
        "Message",
        "Unique Finds",
        "Total Instances",
        "Committer",
        "Author",
        "SHA",
        "Keywords",
    ]));

    let or_unknown = |v: &Option<String>| v.clone().unwrap_or_else(|| UNKNOWN.to_string());

    for finding in findings {
        sheet.push_row(vec![
            Cell::text(format_date(&finding.commit_date), CellStyle::Plain),
            Cell::text(finding.group.as_str(), CellStyle::Plain),
            Cell::text(finding.message.as_str(), CellStyle::Wrap),
            Cell::number(finding.unique_finds, CellStyle::Plain),
            Cell::number(finding.instances.total, CellStyle::Plain),
            Cell::text(or_unknown(&finding.committer), CellStyle::Plain),
            Cell::text(or_unknown(&finding.author), CellStyle::Plain),
            Cell::text(finding.sha.as_str(), CellStyle::Plain),
            Cell::text(finding.keyword_list(), CellStyle::Plain),
        ]);
    }

    sheet
}

fn header(titles: &[&str]) -> Vec<Cell> {
    titles
        .iter()
        .map(|t| Cell::text(*t, CellStyle::Header))
        .collect()
}

// ============ Command ============

#[derive(Debug, Default, Clone)]
pub struct ReportOptions {
    /// Findings file to read (default: the configured one).
    pub findings: Option<PathBuf>,
    /// Workbook to write (default: the configured one).
    pub output: Option<PathBuf>,
}

pub async fn run_report(
    config: &Config,
    source: &dyn RecordSource,
    options: &ReportOptions,
) -> Result<PathBuf> {
    let findings_path = options
        .findings
        .clone()
        .unwrap_or_else(|| config.files.findings_path());
    let findings = findings::read_findings(&findings_path)?;

    let groups = source.load_groups().await?;
    let summary = summary::summarize(&groups);

    let mut workbook = Workbook::new();
    workbook.add_sheet(commit_analysis_sheet(&summary));
    workbook.add_sheet(organization_commits_sheet(&groups));
    workbook.add_sheet(keyword_results_sheet(&findings));

    let path = options
        .output
        .clone()
        .unwrap_or_else(|| config.files.report_path());
    workbook.save(&path)?;

    println!("report {}", path.display());
    println!("  repositories: {}", summary.repos.len());
    println!("  commits: {}", summary.total_commits);
    println!("  findings: {}", findings.len());
    println!("ok");

    Ok(path)
}
