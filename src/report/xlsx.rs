//! The evaluation as a single-sheet XLSX workbook.
//!
//! The package is written by hand with inline-string cells; every zip entry
//! carries the same fixed timestamp so the bytes depend on content only.

use super::{format_date_fr, ReportInput};
use crate::error::AppResult;
use crate::rubric::{RatingLevel, CLUSTERS, LEVELS};
use std::io::{Cursor, Write};
use zip::write::FileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

pub const SHEET_NAME: &str = "Évaluation PFMP";
pub const TITLE: &str = "PFMP - Évaluation des compétences";
pub const COLUMN_HEADERS: [&str; 4] = ["Compétence", "Sous-compétence", "Niveau", "Commentaire"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellStyle {
    Plain,
    Bold,
    Level(RatingLevel),
}

impl CellStyle {
    /// Index into `cellXfs` of the generated styles part.
    fn xf(self) -> usize {
        match self {
            CellStyle::Plain => 0,
            CellStyle::Bold => 1,
            CellStyle::Level(l) => 2 + l.index(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub text: String,
    pub style: CellStyle,
}

impl Cell {
    fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style: CellStyle::Plain,
        }
    }

    fn bold(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style: CellStyle::Bold,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<Cell>>,
}

impl Sheet {
    pub fn text_rows(&self) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|r| r.iter().map(|c| c.text.clone()).collect())
            .collect()
    }
}

fn key_value(key: &str, value: impl Into<String>) -> Vec<Cell> {
    vec![Cell::bold(key), Cell::plain(value)]
}

fn blank() -> Vec<Cell> {
    vec![Cell::plain("")]
}

pub fn build_sheet(input: &ReportInput) -> Sheet {
    let eval = input.evaluation.as_ref();
    let opt = |v: Option<&Option<String>>| v.and_then(|s| s.clone()).unwrap_or_default();

    let mut rows = vec![
        vec![Cell::bold(TITLE)],
        blank(),
        key_value("Élève:", input.student.display_name()),
        key_value("Classe:", input.class_name()),
        key_value("Période:", input.period.name.as_str()),
        key_value("Du:", format_date_fr(&input.period.start_date)),
        key_value("Au:", format_date_fr(&input.period.end_date)),
        key_value("Entreprise:", opt(eval.map(|e| &e.company_name))),
        key_value("Domaine d'activité:", opt(eval.map(|e| &e.activity_domain))),
        key_value("Tuteur:", opt(eval.map(|e| &e.tutor_name))),
        blank(),
        COLUMN_HEADERS.iter().map(|h| Cell::bold(*h)).collect(),
    ];

    for cluster in CLUSTERS.iter() {
        for (i, sub) in cluster.items.iter().enumerate() {
            let rating = eval
                .and_then(|e| e.competences.get(sub.key))
                .cloned()
                .unwrap_or_default();
            rows.push(vec![
                Cell::plain(if i == 0 { cluster.sheet_label } else { "" }),
                Cell::plain(sub.short_label),
                Cell {
                    text: rating.level.symbol().to_string(),
                    style: CellStyle::Level(rating.level),
                },
                Cell::plain(rating.comment),
            ]);
        }
    }

    rows.push(blank());
    rows.push(key_value(
        "Commentaire général:",
        eval.map(|e| e.general_comment.clone()).unwrap_or_default(),
    ));
    rows.push(key_value(
        "Recommandations:",
        eval.map(|e| e.recommendations.clone()).unwrap_or_default(),
    ));

    Sheet {
        name: SHEET_NAME.to_string(),
        rows,
    }
}

fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            // Control characters other than tab and newline are not valid XML.
            c if (c as u32) < 0x20 && c != '\t' && c != '\n' => {}
            c => out.push(c),
        }
    }
    out
}

pub fn column_letter(mut index: usize) -> String {
    let mut out = Vec::new();
    loop {
        out.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

const XML_HEADER: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;
const MAIN_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";

fn worksheet_xml(sheet: &Sheet) -> String {
    let mut s = format!(
        "{XML_HEADER}\n<worksheet xmlns=\"{MAIN_NS}\"><cols>\
         <col min=\"1\" max=\"1\" width=\"24\" customWidth=\"1\"/>\
         <col min=\"2\" max=\"2\" width=\"32\" customWidth=\"1\"/>\
         <col min=\"3\" max=\"3\" width=\"8\" customWidth=\"1\"/>\
         <col min=\"4\" max=\"4\" width=\"48\" customWidth=\"1\"/>\
         </cols><sheetData>"
    );
    for (r, row) in sheet.rows.iter().enumerate() {
        s.push_str(&format!("<row r=\"{}\">", r + 1));
        for (c, cell) in row.iter().enumerate() {
            let is_level = matches!(cell.style, CellStyle::Level(_));
            if cell.text.is_empty() && !is_level {
                continue;
            }
            let reference = format!("{}{}", column_letter(c), r + 1);
            let style = match cell.style.xf() {
                0 => String::new(),
                n => format!(" s=\"{n}\""),
            };
            if cell.text.is_empty() {
                s.push_str(&format!("<c r=\"{reference}\"{style}/>"));
            } else {
                s.push_str(&format!(
                    "<c r=\"{reference}\"{style} t=\"inlineStr\"><is><t xml:space=\"preserve\">{}</t></is></c>",
                    xml_escape(&cell.text)
                ));
            }
        }
        s.push_str("</row>");
    }
    s.push_str("</sheetData></worksheet>");
    s
}

fn styles_xml() -> String {
    let fills: String = LEVELS
        .iter()
        .map(|l| {
            format!(
                "<fill><patternFill patternType=\"solid\"><fgColor rgb=\"FF{}\"/><bgColor indexed=\"64\"/></patternFill></fill>",
                l.color.trim_start_matches('#').to_ascii_uppercase()
            )
        })
        .collect();
    let level_xfs: String = (0..LEVELS.len())
        .map(|i| {
            format!(
                "<xf numFmtId=\"0\" fontId=\"1\" fillId=\"{}\" borderId=\"0\" xfId=\"0\" applyFont=\"1\" applyFill=\"1\" applyAlignment=\"1\"><alignment horizontal=\"center\"/></xf>",
                2 + i
            )
        })
        .collect();
    format!(
        "{XML_HEADER}\n<styleSheet xmlns=\"{MAIN_NS}\">\
         <fonts count=\"2\"><font><sz val=\"11\"/><name val=\"Calibri\"/></font>\
         <font><b/><sz val=\"11\"/><name val=\"Calibri\"/></font></fonts>\
         <fills count=\"{}\"><fill><patternFill patternType=\"none\"/></fill>\
         <fill><patternFill patternType=\"gray125\"/></fill>{fills}</fills>\
         <borders count=\"1\"><border><left/><right/><top/><bottom/><diagonal/></border></borders>\
         <cellStyleXfs count=\"1\"><xf numFmtId=\"0\" fontId=\"0\" fillId=\"0\" borderId=\"0\"/></cellStyleXfs>\
         <cellXfs count=\"{}\"><xf numFmtId=\"0\" fontId=\"0\" fillId=\"0\" borderId=\"0\" xfId=\"0\"/>\
         <xf numFmtId=\"0\" fontId=\"1\" fillId=\"0\" borderId=\"0\" xfId=\"0\" applyFont=\"1\"/>{level_xfs}</cellXfs>\
         </styleSheet>",
        2 + LEVELS.len(),
        2 + LEVELS.len()
    )
}

fn workbook_xml(sheet: &Sheet) -> String {
    format!(
        "{XML_HEADER}\n<workbook xmlns=\"{MAIN_NS}\" \
         xmlns:r=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships\">\
         <sheets><sheet name=\"{}\" sheetId=\"1\" r:id=\"rId1\"/></sheets></workbook>",
        xml_escape(&sheet.name)
    )
}

const CONTENT_TYPES: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    "\n",
    r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
    r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#,
    r#"<Default Extension="xml" ContentType="application/xml"/>"#,
    r#"<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>"#,
    r#"<Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#,
    r#"<Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>"#,
    "</Types>"
);

const ROOT_RELS: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    "\n",
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>"#,
    "</Relationships>"
);

const WORKBOOK_RELS: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    "\n",
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>"#,
    r#"<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>"#,
    "</Relationships>"
);

pub fn write_workbook(sheet: &Sheet) -> AppResult<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let opts = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default());

    let entries: [(&str, String); 5] = [
        ("[Content_Types].xml", CONTENT_TYPES.to_string()),
        ("_rels/.rels", ROOT_RELS.to_string()),
        ("xl/workbook.xml", workbook_xml(sheet)),
        ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS.to_string()),
        ("xl/styles.xml", styles_xml()),
    ];
    for (name, body) in &entries {
        zip.start_file(*name, opts)?;
        zip.write_all(body.as_bytes())?;
    }
    zip.start_file("xl/worksheets/sheet1.xml", opts)?;
    zip.write_all(worksheet_xml(sheet).as_bytes())?;

    let cursor = zip.finish()?;
    Ok(cursor.into_inner())
}

pub fn render(input: &ReportInput) -> AppResult<Vec<u8>> {
    write_workbook(&build_sheet(input))
}
